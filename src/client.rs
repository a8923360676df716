use std::env;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, GenerationError, GenerationErrorKind, Result};
use crate::generator::Generator;
use crate::observability::{
    CLIENT_IMAGE_PARTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::types::{GenerateRequest, Model, Part};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// How a configured instruction reaches the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionMode {
    /// Send it in the structured `systemInstruction` field.
    #[default]
    System,

    /// Prepend it to the first text part as `"{instruction}\n\nUser: {text}"`.
    Prefix,
}

impl std::str::FromStr for InstructionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(InstructionMode::System),
            "prefix" => Ok(InstructionMode::Prefix),
            other => Err(format!(
                "unknown instruction mode '{other}' (use 'system' or 'prefix')"
            )),
        }
    }
}

impl std::fmt::Display for InstructionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstructionMode::System => write!(f, "system"),
            InstructionMode::Prefix => write!(f, "prefix"),
        }
    }
}

/// Client for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct Gemini {
    api_key: HeaderValue,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    instruction_mode: InstructionMode,
}

impl Gemini {
    /// Create a new Gemini client.
    ///
    /// The API key can be provided directly or read from the GEMINI_API_KEY
    /// (or GOOGLE_API_KEY) environment variable.  A missing key is a
    /// configuration error.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(api_key)?;
        let mut api_key = HeaderValue::from_str(&api_key)
            .map_err(|_| Error::configuration("API key contains invalid characters"))?;
        api_key.set_sensitive(true);

        let base_url = parse_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
            instruction_mode: InstructionMode::default(),
        })
    }

    /// Sets how the instruction is delivered.
    pub fn with_instruction_mode(mut self, mode: InstructionMode) -> Self {
        self.instruction_mode = mode;
        self
    }

    /// Returns how the instruction is delivered.
    pub fn instruction_mode(&self) -> InstructionMode {
        self.instruction_mode
    }

    /// Returns the configured transport timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", self.api_key.clone());
        headers
    }

    fn endpoint(&self, model: &Model) -> std::result::Result<Url, GenerationError> {
        let path = format!("models/{model}:generateContent");
        self.base_url.join(&path).map_err(|e| {
            GenerationError::new(
                GenerationErrorKind::BadRequest,
                format!("invalid model name '{model}': {e}"),
            )
        })
    }

    fn build_body(&self, request: &GenerateRequest) -> WireRequest {
        let mut parts: Vec<WirePart> = request.parts.iter().map(WirePart::from).collect();
        let mut system_instruction = None;

        if let Some(instruction) = &request.instruction {
            match self.instruction_mode {
                InstructionMode::System => {
                    system_instruction = Some(WireContent {
                        role: None,
                        parts: vec![WirePart::Text {
                            text: instruction.clone(),
                        }],
                    });
                }
                InstructionMode::Prefix => match parts.first_mut() {
                    Some(WirePart::Text { text }) => {
                        *text = format!("{instruction}\n\nUser: {text}");
                    }
                    _ => parts.insert(
                        0,
                        WirePart::Text {
                            text: instruction.clone(),
                        },
                    ),
                },
            }
        }

        let generation_config =
            if request.temperature.is_some() || request.max_output_tokens.is_some() {
                Some(WireGenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_output_tokens,
                })
            } else {
                None
            };

        WireRequest {
            contents: vec![WireContent {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction,
            generation_config,
        }
    }

    /// Process API response errors and convert to a generation error.
    async fn process_error_response(response: Response) -> GenerationError {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return GenerationError::new(
                    GenerationErrorKind::Connection,
                    format!("Failed to read error response: {e}"),
                )
                .with_status_code(status_code);
            }
        };

        let detail = serde_json::from_str::<WireErrorResponse>(&error_body)
            .ok()
            .map(|e| e.error);
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| error_body.trim().to_string());

        let mut err = GenerationError::from_status(status_code, message);
        // Gemini reports a rejected key as a 400 INVALID_ARGUMENT.
        if status_code == 400 && err.message.contains("API key not valid") {
            err.kind = GenerationErrorKind::Authentication;
        }
        err.with_retry_after(retry_after)
    }

    /// Send one request and return the generated text unaltered.
    pub async fn send(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<String, GenerationError> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_inner(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            tracing::warn!(
                model = %request.model,
                kind = %err.kind,
                status = ?err.status_code,
                "generation failed"
            );
        }
        result
    }

    async fn send_inner(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<String, GenerationError> {
        let url = self.endpoint(&request.model)?;
        let body = self.build_body(request);
        let image_parts = request
            .parts
            .iter()
            .filter(|p| matches!(p, Part::Image(_)))
            .count();
        CLIENT_IMAGE_PARTS.count(image_parts as u64);
        tracing::debug!(
            model = %request.model,
            parts = request.parts.len(),
            image_parts,
            instruction_mode = %self.instruction_mode,
            "sending generateContent request"
        );

        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::new(
                        GenerationErrorKind::Timeout,
                        format!(
                            "Request timed out after {} seconds: {e}",
                            self.timeout.as_secs_f64()
                        ),
                    )
                } else {
                    GenerationError::new(
                        GenerationErrorKind::Connection,
                        format!("Connection error: {e}"),
                    )
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let response = response.json::<WireResponse>().await.map_err(|e| {
            GenerationError::new(
                GenerationErrorKind::Malformed,
                format!("Failed to parse response: {e}"),
            )
        })?;
        extract_text(response)
    }
}

#[async_trait]
impl Generator for Gemini {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<String, GenerationError> {
        self.send(request).await
    }
}

fn resolve_api_key(api_key: Option<String>) -> Result<String> {
    let candidate = api_key.or_else(|| {
        API_KEY_ENV_VARS
            .iter()
            .find_map(|var| env::var(var).ok())
    });
    match candidate {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(Error::configuration(format!(
            "API key not provided and neither {} nor {} is set",
            API_KEY_ENV_VARS[0], API_KEY_ENV_VARS[1]
        ))),
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut base_url = base_url.trim().to_string();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    Url::parse(&base_url)
        .map_err(|e| Error::configuration(format!("invalid base URL '{base_url}': {e}")))
}

/// Pull the generated text out of a response, or explain why there is none.
fn extract_text(response: WireResponse) -> std::result::Result<String, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => GenerationError::new(
                GenerationErrorKind::Blocked,
                format!("prompt was blocked ({reason})"),
            ),
            None => GenerationError::new(
                GenerationErrorKind::Malformed,
                "response contained no candidates",
            ),
        });
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if !texts.is_empty() {
        return Ok(texts.concat());
    }

    match candidate.finish_reason.as_deref() {
        Some(reason) if reason != "STOP" => Err(GenerationError::new(
            GenerationErrorKind::Blocked,
            format!("response stopped without text ({reason})"),
        )),
        _ => Err(GenerationError::new(
            GenerationErrorKind::Malformed,
            "candidate contained no text",
        )),
    }
}

// Gemini wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: WireBlob,
    },
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => WirePart::Text { text: text.clone() },
            Part::Image(image) => WirePart::InlineData {
                inline_data: WireBlob {
                    mime_type: image.media_type().mime_type().to_string(),
                    data: image.to_base64(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Debug, Deserialize)]
struct WireResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::image_data::tests::TINY_PNG;
    use crate::types::{ImageData, PendingRequest};
    use serde_json::{json, to_value};
    use std::sync::Arc;

    fn client() -> Gemini {
        Gemini::new(Some("test-key".to_string())).unwrap()
    }

    fn text_request(instruction: Option<&str>, text: &str) -> GenerateRequest {
        GenerateRequest::new(
            Model::default(),
            instruction.map(str::to_string),
            PendingRequest::Text(text.to_string()),
        )
    }

    #[test]
    fn client_creation() {
        let client = client();
        assert_eq!(client.base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(client.instruction_mode(), InstructionMode::System);

        let client = Gemini::with_options(
            Some("test-key".to_string()),
            Some("http://127.0.0.1:8080/v1".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap()
        .with_instruction_mode(InstructionMode::Prefix);
        assert_eq!(client.base_url.as_str(), "http://127.0.0.1:8080/v1/");
        assert_eq!(client.timeout(), Duration::from_secs(5));
        assert_eq!(client.instruction_mode(), InstructionMode::Prefix);
    }

    #[test]
    fn blank_api_key_is_a_configuration_error() {
        let err = Gemini::new(Some("   ".to_string())).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn bad_base_url_is_a_configuration_error() {
        let err = Gemini::with_options(Some("k".into()), Some("not a url".into()), None)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn api_key_header_is_sensitive() {
        let client = client();
        let headers = client.default_headers();
        let key = headers.get("x-goog-api-key").unwrap();
        assert!(key.is_sensitive());
        assert!(!format!("{client:?}").contains("test-key"));
    }

    #[test]
    fn endpoint_includes_model() {
        let url = client().endpoint(&Model::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn system_instruction_field() {
        let body = client().build_body(&text_request(Some("Be a patient tutor."), "2+2"));
        assert_eq!(
            to_value(&body).unwrap(),
            json!({
                "contents": [{"role": "user", "parts": [{"text": "2+2"}]}],
                "systemInstruction": {"parts": [{"text": "Be a patient tutor."}]}
            })
        );
    }

    #[test]
    fn prefix_instruction() {
        let client = client().with_instruction_mode(InstructionMode::Prefix);
        let body = client.build_body(&text_request(Some("Be a patient tutor."), "2+2"));
        assert_eq!(
            to_value(&body).unwrap(),
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [{"text": "Be a patient tutor.\n\nUser: 2+2"}]
                }]
            })
        );
    }

    #[test]
    fn prefix_instruction_before_bare_image() {
        let client = client().with_instruction_mode(InstructionMode::Prefix);
        let image = ImageData::from_bytes(TINY_PNG.to_vec()).unwrap();
        let request = GenerateRequest::new(
            Model::default(),
            Some("Read the sketch.".to_string()),
            PendingRequest::WithImage {
                text: String::new(),
                image: Arc::new(image),
            },
        );
        let body = to_value(client.build_body(&request)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0], json!({"text": "Read the sketch."}));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
    }

    #[test]
    fn image_is_inline_data_part() {
        let image = ImageData::from_bytes(TINY_PNG.to_vec()).unwrap();
        let encoded = image.to_base64();
        let request = GenerateRequest::new(
            Model::default(),
            None,
            PendingRequest::WithImage {
                text: "solve this".to_string(),
                image: Arc::new(image),
            },
        )
        .with_temperature(Some(0.5))
        .with_max_output_tokens(Some(256));
        assert_eq!(
            to_value(client().build_body(&request)).unwrap(),
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "solve this"},
                        {"inlineData": {"mimeType": "image/png", "data": encoded}}
                    ]
                }],
                "generationConfig": {"temperature": 0.5, "maxOutputTokens": 256}
            })
        );
    }

    fn response(value: serde_json::Value) -> WireResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extract_concatenates_text_parts_verbatim() {
        let text = extract_text(response(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "x = "}, {"text": "4 \n"}]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap();
        assert_eq!(text, "x = 4 \n");
    }

    #[test]
    fn extract_blocked_prompt() {
        let err = extract_text(response(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Blocked);
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn extract_stopped_candidate() {
        let err = extract_text(response(json!({
            "candidates": [{"finishReason": "RECITATION"}]
        })))
        .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Blocked);
    }

    #[test]
    fn extract_empty_response() {
        let err = extract_text(response(json!({}))).unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Malformed);
    }

    #[test]
    fn instruction_mode_parse() {
        assert_eq!(
            "prefix".parse::<InstructionMode>(),
            Ok(InstructionMode::Prefix)
        );
        assert_eq!(
            " SYSTEM ".parse::<InstructionMode>(),
            Ok(InstructionMode::System)
        );
        assert!("inline".parse::<InstructionMode>().is_err());
    }
}
