//! Terminal front end for the tutor.
//!
//! This module provides the pieces the `tutor-chat` binary assembles into a
//! REPL:
//!
//! - [`commands`]: slash command parsing
//! - [`render`]: output rendering behind the [`Renderer`] trait
//! - [`export`]: Markdown transcript export
//!
//! Uploads are decoded here, before a turn is built.  A file that cannot be
//! decoded is reported as an input error and never reaches the session.

mod commands;
mod export;
mod render;

use std::path::Path;

use crate::error::Result;
use crate::observability::INPUT_DECODE_ERRORS;
use crate::types::{ImageData, TabularSummary, Turn};

pub use commands::{ChatCommand, help_text, parse_command};
pub use export::{export_markdown, to_markdown};
pub use render::{PlainTextRenderer, Renderer};

/// Builds a user turn from an image file and the question asked about it.
pub fn image_turn(path: impl AsRef<Path>, question: &str) -> Result<Turn> {
    let image = ImageData::from_path(path).inspect_err(|_| INPUT_DECODE_ERRORS.click())?;
    Ok(Turn::user_with_image(question, image))
}

/// Builds a user turn from a CSV file and the question asked about it.
pub fn table_turn(path: impl AsRef<Path>, question: &str) -> Result<Turn> {
    let summary = TabularSummary::from_path(path).inspect_err(|_| INPUT_DECODE_ERRORS.click())?;
    Ok(Turn::user_with_summary(question, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputKind;
    use crate::types::TurnContent;
    use crate::types::image_data::tests::TINY_PNG;
    use std::path::PathBuf;

    fn scratch(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tutorchat-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn image_turn_from_png() {
        let path = scratch("sketch.png", TINY_PNG);
        let turn = image_turn(&path, "what is drawn here?").unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(turn.is_user());
        assert_eq!(turn.text(), "what is drawn here?");
        assert!(matches!(turn.content, TurnContent::Image { .. }));
    }

    #[test]
    fn image_turn_rejects_text_file() {
        let path = scratch("not-an-image.png", b"hello");
        let err = image_turn(&path, "?").unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            err,
            crate::Error::InputDecode {
                kind: InputKind::Image,
                ..
            }
        ));
    }

    #[test]
    fn table_turn_from_csv() {
        let path = scratch("scores.csv", b"name,score\nA,80\nB,100\n");
        let turn = table_turn(&path, "average score?").unwrap();
        let _ = std::fs::remove_file(&path);
        match &turn.content {
            TurnContent::Summary { summary, .. } => assert_eq!(summary.rows, 2),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn table_turn_missing_file() {
        let err = table_turn("/nonexistent/tutorchat/scores.csv", "?").unwrap_err();
        assert!(err.is_input_decode());
    }
}
