//! Slash command parsing for the chat application.
//!
//! Commands start with `/` and control the session or attach an upload to
//! the next question.  Everything else is a plain text question.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Ask about an image file (uploaded photo or exported sketch).
    Image {
        /// Path of the image.
        path: String,
        /// Question asked alongside, possibly empty.
        question: String,
    },

    /// Ask about a CSV file.
    Csv {
        /// Path of the CSV file.
        path: String,
        /// Question asked alongside, possibly empty.
        question: String,
    },

    /// Re-send the last unanswered question.
    Retry,

    /// Set or clear the instruction.
    /// `None` clears the current instruction.
    Instruction(Option<String>),

    /// Change the model.
    Model(String),

    /// Export the transcript to a Markdown file.
    Export(String),

    /// Print the transcript.
    History,

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a question.
///
/// # Examples
///
/// ```
/// # use tutorchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/image graph.png what is the slope?").is_some());
/// assert!(parse_command("What is 2+2?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "reset" => ChatCommand::Clear,
        "image" | "sketch" => match split_path(argument) {
            Some((path, question)) => ChatCommand::Image { path, question },
            None => ChatCommand::Invalid(format!("/{command} requires a file path")),
        },
        "csv" => match split_path(argument) {
            Some((path, question)) => ChatCommand::Csv { path, question },
            None => ChatCommand::Invalid("/csv requires a file path".to_string()),
        },
        "retry" => ChatCommand::Retry,
        "instruction" | "system" => ChatCommand::Instruction(argument.map(str::to_string)),
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "export" => match argument {
            Some(path) => ChatCommand::Export(path.to_string()),
            None => ChatCommand::Invalid("/export requires a file path".to_string()),
        },
        "history" => ChatCommand::History,
        "stats" | "status" => ChatCommand::Stats,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn split_path(argument: Option<&str>) -> Option<(String, String)> {
    let argument = argument?;
    let (path, question) = match argument.split_once(char::is_whitespace) {
        Some((path, question)) => (path, question.trim()),
        None => (argument, ""),
    };
    Some((path.to_string(), question.to_string()))
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /image <file> [question]   Ask about an image or exported sketch
  /csv <file> [question]     Ask about a CSV table (sent as a summary)
  /retry                     Re-send the last unanswered question
  /clear                     Clear conversation history
  /instruction [text]        Set the instruction (no argument clears it)
  /model <name>              Change the model (e.g., /model gemini-1.5-pro)
  /export <file>             Export the transcript as Markdown
  /history                   Show the transcript
  /stats                     Show session statistics
  /help                      Show this help message
  /quit                      Exit the chat"#
}
