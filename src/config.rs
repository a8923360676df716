//! Configuration for a tutoring session.
//!
//! Settings come from three layers, later layers winning: built-in defaults,
//! an optional YAML file, and command-line flags parsed with `arrrg`.  The
//! API key is the only setting without a usable default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::client::{Gemini, InstructionMode};
use crate::error::{Error, Result};
use crate::types::Model;

/// The instruction sent ahead of every question unless overridden.
pub const DEFAULT_INSTRUCTION: &str = "You are a patient mathematics teacher. \
Use LaTeX notation for formulas. Explain the solution step by step.";

/// Command-line arguments for the tutor-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct TutorArgs {
    /// Model to use.
    #[arrrg(optional, "Model to use (default: gemini-1.5-flash)", "MODEL")]
    pub model: Option<String>,

    /// Instruction sent ahead of every question.
    #[arrrg(optional, "Instruction sent ahead of every question", "TEXT")]
    pub instruction: Option<String>,

    /// Send no instruction at all.
    #[arrrg(flag, "Send no instruction")]
    pub no_instruction: bool,

    /// How the instruction is delivered.
    #[arrrg(optional, "Instruction delivery: system or prefix (default: system)", "MODE")]
    pub instruction_mode: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-2.0", "TEMP")]
    pub temperature: Option<String>,

    /// Maximum generated tokens per answer.
    #[arrrg(optional, "Maximum generated tokens per answer", "TOKENS")]
    pub max_output_tokens: Option<u32>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// API base URL.
    #[arrrg(optional, "API base URL", "URL")]
    pub base_url: Option<String>,

    /// Transport timeout.
    #[arrrg(optional, "Transport timeout in seconds (default: 60)", "SECONDS")]
    pub timeout_secs: Option<u32>,

    /// API key; otherwise read from GEMINI_API_KEY or GOOGLE_API_KEY.
    #[arrrg(optional, "API key (default: $GEMINI_API_KEY or $GOOGLE_API_KEY)", "KEY")]
    pub api_key: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Settings read from a YAML configuration file.
///
/// Every field is optional; absent fields keep their defaults.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub model: Option<String>,
    pub instruction: Option<String>,
    pub instruction_mode: Option<InstructionMode>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub color: Option<bool>,
}

impl ConfigFile {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|err| Error::configuration(format!("invalid configuration file: {err}")))
    }

    /// Read and parse a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|err| {
            Error::configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_yaml(&yaml)
    }
}

/// Configuration for a tutoring session.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorConfig {
    /// The model to use for generating answers.
    pub model: Model,

    /// Instruction sent ahead of every question.
    pub instruction: Option<String>,

    /// How the instruction reaches the provider.  Only read by
    /// [`TutorConfig::client`]; the client owns the mode afterwards.
    pub instruction_mode: InstructionMode,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional cap on generated tokens.
    pub max_output_tokens: Option<u32>,

    /// Explicit API key; `None` falls back to the environment.
    pub api_key: Option<String>,

    /// Explicit API base URL.
    pub base_url: Option<String>,

    /// Explicit transport timeout.
    pub timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl TutorConfig {
    /// Creates a new TutorConfig with default values.
    ///
    /// Defaults:
    /// - Model: gemini-1.5-flash
    /// - Instruction: the mathematics tutor instruction, as a system field
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: Model::default(),
            instruction: Some(DEFAULT_INSTRUCTION.to_string()),
            instruction_mode: InstructionMode::System,
            temperature: None,
            max_output_tokens: None,
            api_key: None,
            base_url: None,
            timeout: None,
            use_color: true,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets or clears the instruction.
    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = instruction;
        self
    }

    /// Sets how the instruction is delivered.
    pub fn with_instruction_mode(mut self, mode: InstructionMode) -> Self {
        self.instruction_mode = mode;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the output token cap.
    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Applies the settings present in a configuration file.
    pub fn merge_file(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(model) = file.model {
            self.model = parse_model(&model);
        }
        if let Some(instruction) = file.instruction {
            self.instruction = non_empty(instruction);
        }
        if let Some(mode) = file.instruction_mode {
            self.instruction_mode = mode;
        }
        if let Some(temperature) = file.temperature {
            self.temperature = Some(check_temperature(temperature)?);
        }
        if let Some(max_output_tokens) = file.max_output_tokens {
            self.max_output_tokens = Some(max_output_tokens);
        }
        if let Some(base_url) = file.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(timeout_secs) = file.timeout_secs {
            self.timeout = Some(Duration::from_secs(timeout_secs));
        }
        if let Some(color) = file.color {
            self.use_color = color;
        }
        Ok(self)
    }

    /// Builds the Gemini client described by this configuration.
    ///
    /// Fails with a configuration error when no API key can be found.
    pub fn client(&self) -> Result<Gemini> {
        Ok(Gemini::with_options(
            self.api_key.clone(),
            self.base_url.clone(),
            self.timeout,
        )?
        .with_instruction_mode(self.instruction_mode))
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<TutorArgs> for TutorConfig {
    type Error = Error;

    fn try_from(args: TutorArgs) -> Result<Self> {
        let mut config = TutorConfig::new();
        if let Some(path) = &args.config {
            config = config.merge_file(ConfigFile::from_path(path)?)?;
        }
        if let Some(model) = args.model {
            config.model = parse_model(&model);
        }
        if let Some(instruction) = args.instruction {
            config.instruction = non_empty(instruction);
        }
        if args.no_instruction {
            config.instruction = None;
        }
        if let Some(mode) = args.instruction_mode {
            config.instruction_mode = mode.parse().map_err(Error::configuration)?;
        }
        if let Some(temperature) = args.temperature {
            let value = temperature.trim().parse::<f32>().map_err(|_| {
                Error::configuration(format!("invalid temperature '{temperature}'"))
            })?;
            config.temperature = Some(check_temperature(value)?);
        }
        if let Some(max_output_tokens) = args.max_output_tokens {
            config.max_output_tokens = Some(max_output_tokens);
        }
        if let Some(base_url) = args.base_url {
            config.base_url = Some(base_url);
        }
        if let Some(timeout_secs) = args.timeout_secs {
            config.timeout = Some(Duration::from_secs(u64::from(timeout_secs)));
        }
        if args.api_key.is_some() {
            config.api_key = args.api_key;
        }
        if args.no_color {
            config.use_color = false;
        }
        Ok(config)
    }
}

fn parse_model(name: &str) -> Model {
    name.parse()
        .unwrap_or_else(|_| Model::Custom(name.to_string()))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

fn check_temperature(value: f32) -> Result<f32> {
    if value.is_finite() && (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::configuration(format!(
            "temperature {value} is outside 0.0-2.0"
        )))
    }
}
