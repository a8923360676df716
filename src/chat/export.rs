//! Markdown export of a transcript.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::{Role, TurnContent};

/// Renders the transcript as a Markdown document.
///
/// Turn text is copied verbatim, so LaTeX in answers survives for any
/// Markdown viewer that understands math.
pub fn to_markdown(session: &Session, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {title}");
    if session.is_empty() {
        let _ = writeln!(out, "\n_No messages._");
        return out;
    }
    for turn in session {
        let speaker = match turn.role {
            Role::User => "You",
            Role::Assistant => "Tutor",
        };
        let _ = writeln!(out, "\n## {speaker}\n");
        match &turn.content {
            TurnContent::Text(_) => {}
            TurnContent::Image { image, .. } => {
                let _ = writeln!(
                    out,
                    "_Attached image: {}, {} bytes_\n",
                    image.media_type(),
                    image.len()
                );
            }
            TurnContent::Summary { summary, .. } => {
                let _ = writeln!(out, "_Attached table:_\n\n```text\n{summary}```\n");
            }
        }
        let _ = writeln!(out, "{}", turn.text());
    }
    out
}

/// Writes the transcript to `path` as Markdown.
pub fn export_markdown(session: &Session, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let markdown = to_markdown(session, "Math tutoring session");
    std::fs::write(path, markdown)
        .map_err(|err| Error::io(format!("could not write {}", path.display()), err))?;
    tracing::info!(path = %path.display(), turns = session.len(), "transcript exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::image_data::tests::TINY_PNG;
    use crate::types::{ImageData, TabularSummary, Turn};

    #[test]
    fn empty_session() {
        let markdown = to_markdown(&Session::new(), "Notes");
        assert_eq!(markdown, "# Notes\n\n_No messages._\n");
    }

    #[test]
    fn text_turns_in_order() {
        let mut session = Session::new();
        session.append(Turn::user("2+2"));
        session.append(Turn::assistant("$2 + 2 = 4$"));
        let markdown = to_markdown(&session, "Notes");
        assert_eq!(
            markdown,
            "# Notes\n\n## You\n\n2+2\n\n## Tutor\n\n$2 + 2 = 4$\n"
        );
    }

    #[test]
    fn attachments_are_described() {
        let mut session = Session::new();
        let image = ImageData::from_bytes(TINY_PNG.to_vec()).unwrap();
        session.append(Turn::user_with_image("what shape?", image));
        let summary = TabularSummary::from_reader("score\n80\n100\n".as_bytes()).unwrap();
        session.append(Turn::user_with_summary("average?", summary));
        let markdown = to_markdown(&session, "Notes");
        assert!(markdown.contains("_Attached image: image/png, "));
        assert!(markdown.contains("```text\nTable summary: 2 rows, 1 columns\n"));
        assert!(markdown.contains("average?"));
    }

    #[test]
    fn export_writes_file() {
        let mut session = Session::new();
        session.append(Turn::user("derivative of x^2"));
        session.append(Turn::assistant("$2x$"));
        let path = std::env::temp_dir().join(format!(
            "tutorchat-export-{}.md",
            std::process::id()
        ));
        export_markdown(&session, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(written.starts_with("# Math tutoring session\n"));
        assert!(written.contains("$2x$"));
    }

    #[test]
    fn export_to_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join("tutorchat-no-such-dir")
            .join("deeper")
            .join("out.md");
        let err = export_markdown(&Session::new(), &path).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
