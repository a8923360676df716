//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows
//! for different output styles.  The default implementation writes plain
//! text with optional ANSI escape codes.

use std::io::{self, Write};

use crate::types::{Role, Turn, TurnContent};

/// ANSI escape code for dim text (used for the busy indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for speaker labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for attachments).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print the assistant's answer.
    fn print_reply(&mut self, text: &str);

    /// Show that a question has been dispatched and an answer is awaited.
    fn print_waiting(&mut self);

    /// Print a transcript turn, e.g. when listing the history.
    fn print_turn(&mut self, turn: &Turn);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self { out, use_color }
    }

    fn label(&mut self, role: Role) {
        let label = match role {
            Role::User => "You",
            Role::Assistant => "Tutor",
        };
        if self.use_color {
            let _ = write!(self.out, "{ANSI_CYAN}{label}:{ANSI_RESET} ");
        } else {
            let _ = write!(self.out, "{label}: ");
        }
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_reply(&mut self, text: &str) {
        self.label(Role::Assistant);
        let _ = writeln!(self.out, "{text}");
        self.flush();
    }

    fn print_waiting(&mut self) {
        if self.use_color {
            let _ = writeln!(self.out, "{ANSI_DIM}(thinking...){ANSI_RESET}");
        } else {
            let _ = writeln!(self.out, "(thinking...)");
        }
        self.flush();
    }

    fn print_turn(&mut self, turn: &Turn) {
        self.label(turn.role);
        let attachment = match &turn.content {
            TurnContent::Text(_) => None,
            TurnContent::Image { image, .. } => {
                Some(format!("[image: {}, {} bytes]", image.media_type(), image.len()))
            }
            TurnContent::Summary { summary, .. } => Some(format!(
                "[table: {} rows, {} columns]",
                summary.rows,
                summary.columns.len()
            )),
        };
        if let Some(attachment) = attachment {
            if self.use_color {
                let _ = write!(self.out, "{ANSI_YELLOW}{attachment}{ANSI_RESET} ");
            } else {
                let _ = write!(self.out, "{attachment} ");
            }
        }
        let _ = writeln!(self.out, "{}", turn.text());
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            let _ = writeln!(self.out, "{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            let _ = writeln!(self.out, "Error: {error}");
        }
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        let _ = writeln!(self.out, "{info}");
        self.flush();
    }
}
