use std::sync::Arc;

use crate::types::{ImageData, Model, Role, TabularSummary, Turn, TurnContent};

/// One ordered piece of request content.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// A text part.
    Text(String),

    /// An inline image part.
    Image(Arc<ImageData>),
}

/// The next outbound call, derived from the latest unresolved user turn.
///
/// Exists only for the duration of one dispatch cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingRequest {
    /// A text question.
    Text(String),

    /// A question about an attached image.
    WithImage {
        /// The question.
        text: String,
        /// The image.
        image: Arc<ImageData>,
    },

    /// A question about an uploaded table.
    WithSummary {
        /// The question.
        text: String,
        /// The table summary.
        summary: Arc<TabularSummary>,
    },
}

impl PendingRequest {
    /// Derive the request from a user turn.  Assistant turns yield `None`.
    pub fn from_turn(turn: &Turn) -> Option<Self> {
        if turn.role != Role::User {
            return None;
        }
        Some(match &turn.content {
            TurnContent::Text(text) => PendingRequest::Text(text.clone()),
            TurnContent::Image { text, image } => PendingRequest::WithImage {
                text: text.clone(),
                image: Arc::clone(image),
            },
            TurnContent::Summary { text, summary } => PendingRequest::WithSummary {
                text: text.clone(),
                summary: Arc::clone(summary),
            },
        })
    }

    /// The question text.
    pub fn text(&self) -> &str {
        match self {
            PendingRequest::Text(text) => text,
            PendingRequest::WithImage { text, .. } => text,
            PendingRequest::WithSummary { text, .. } => text,
        }
    }

    /// Flatten into ordered content parts.
    ///
    /// The question text always comes first.  An empty question is dropped
    /// when an attachment carries the content on its own.
    pub fn into_parts(self) -> Vec<Part> {
        match self {
            PendingRequest::Text(text) => vec![Part::Text(text)],
            PendingRequest::WithImage { text, image } => {
                let mut parts = Vec::with_capacity(2);
                if !text.is_empty() {
                    parts.push(Part::Text(text));
                }
                parts.push(Part::Image(image));
                parts
            }
            PendingRequest::WithSummary { text, summary } => {
                let mut parts = Vec::with_capacity(2);
                if !text.is_empty() {
                    parts.push(Part::Text(text));
                }
                parts.push(Part::Text(summary.to_string()));
                parts
            }
        }
    }
}

/// A fully built generation request: optional instruction plus ordered
/// content parts, addressed to one model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// The model to address.
    pub model: Model,

    /// The fixed instruction configured for the session, if any.
    pub instruction: Option<String>,

    /// The ordered content parts.
    pub parts: Vec<Part>,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional cap on generated tokens.
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    /// Build a request from a pending request.
    pub fn new(model: Model, instruction: Option<String>, pending: PendingRequest) -> Self {
        Self {
            model,
            instruction: instruction.filter(|s| !s.trim().is_empty()),
            parts: pending.into_parts(),
            temperature: None,
            max_output_tokens: None,
        }
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

    /// Returns true if any part is an image.
    pub fn has_image(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Image(_)))
    }
}
