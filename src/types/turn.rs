use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{ImageData, TabularSummary};

/// Who produced a turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,

    /// The model answering.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// The content of a turn.
///
/// Image and summary turns also carry the text the user typed alongside
/// the upload, so a pending request can always be rebuilt from the turn
/// alone.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnContent {
    /// Plain text.
    Text(String),

    /// Text with an attached image.
    Image {
        /// The accompanying question.
        text: String,
        /// Shared reference to the image bytes.
        image: Arc<ImageData>,
    },

    /// Text with a pre-rendered tabular summary.
    Summary {
        /// The accompanying question.
        text: String,
        /// The summary of the uploaded table.
        summary: Arc<TabularSummary>,
    },
}

impl TurnContent {
    /// The text portion of the content.
    pub fn text(&self) -> &str {
        match self {
            TurnContent::Text(text) => text,
            TurnContent::Image { text, .. } => text,
            TurnContent::Summary { text, .. } => text,
        }
    }
}

impl From<&str> for TurnContent {
    fn from(text: &str) -> Self {
        TurnContent::Text(text.to_string())
    }
}

impl From<String> for TurnContent {
    fn from(text: String) -> Self {
        TurnContent::Text(text)
    }
}

/// One message unit of the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Who produced it.
    pub role: Role,

    /// What was said.
    pub content: TurnContent,
}

impl Turn {
    /// Create a new turn.
    pub fn new(role: Role, content: TurnContent) -> Self {
        Self { role, content }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<TurnContent>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant turn with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnContent::Text(text.into()))
    }

    /// Create a user turn asking about an image.
    pub fn user_with_image(text: impl Into<String>, image: ImageData) -> Self {
        Self::new(
            Role::User,
            TurnContent::Image {
                text: text.into(),
                image: Arc::new(image),
            },
        )
    }

    /// Create a user turn asking about a table.
    pub fn user_with_summary(text: impl Into<String>, summary: TabularSummary) -> Self {
        Self::new(
            Role::User,
            TurnContent::Summary {
                text: text.into(),
                summary: Arc::new(summary),
            },
        )
    }

    /// The text portion of the content.
    pub fn text(&self) -> &str {
        self.content.text()
    }

    /// Returns true if the user produced this turn.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::image_data::tests::TINY_PNG;

    #[test]
    fn constructors() {
        let turn = Turn::user("2+2");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, TurnContent::Text("2+2".to_string()));
        assert!(turn.is_user());

        let turn = Turn::assistant("4");
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.text(), "4");
        assert!(!turn.is_user());
    }

    #[test]
    fn image_turn_keeps_text() {
        let image = ImageData::from_bytes(TINY_PNG.to_vec()).unwrap();
        let turn = Turn::user_with_image("what is this graph?", image);
        assert_eq!(turn.text(), "what is this graph?");
        assert!(matches!(turn.content, TurnContent::Image { .. }));
    }

    #[test]
    fn cloned_image_turn_shares_bytes() {
        let image = ImageData::from_bytes(TINY_PNG.to_vec()).unwrap();
        let turn = Turn::user_with_image("solve", image);
        let copy = turn.clone();
        match (&turn.content, &copy.content) {
            (TurnContent::Image { image: a, .. }, TurnContent::Image { image: b, .. }) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected image turns"),
        }
    }

    #[test]
    fn role_display_and_serde() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
    }
}
