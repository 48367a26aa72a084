//! Collecting facts the user did not pass as flags

use crate::workflows::{StageError, WorkflowFacts};
use std::io::{BufRead, Read, Write};

/// Source of user-supplied facts.
///
/// Known values are returned as-is; only a missing fact reaches the user.
pub trait FactProvider {
    fn get_or_prompt(&mut self, known: &WorkflowFacts, name: &str, question: &str) -> Result<String, StageError>;

    /// Multi-line text read until end of input. `None` when nothing was
    /// entered or nobody is at the terminal.
    fn read_multiline(&mut self, question: &str) -> Result<Option<String>, StageError>;
}

/// Prompts on a terminal, or refuses when the session is not interactive.
pub struct TerminalFactProvider<R, W> {
    input: R,
    output: W,
    interactive: bool,
}

impl TerminalFactProvider<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        use std::io::IsTerminal;
        let interactive = std::io::stdin().is_terminal();
        Self::new(std::io::stdin().lock(), std::io::stdout(), interactive)
    }
}

impl<R: BufRead, W: Write> TerminalFactProvider<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        Self {
            input,
            output,
            interactive,
        }
    }
}

fn flag_for(name: &str) -> String {
    match name {
        "repo_name" => "--extension-repo-name".to_string(),
        "description" => "--extension-short-description".to_string(),
        "author" => "--extension-author".to_string(),
        other => format!("--{}", other.replace('_', "-")),
    }
}

impl<R: BufRead, W: Write> FactProvider for TerminalFactProvider<R, W> {
    fn get_or_prompt(&mut self, known: &WorkflowFacts, name: &str, question: &str) -> Result<String, StageError> {
        if let Some(value) = known.get(name) {
            return Ok(value.to_string());
        }

        if !self.interactive {
            return Err(StageError::user_input(format!(
                "{question} is required; pass {}",
                flag_for(name)
            )));
        }

        let io_error = |e: std::io::Error| StageError::Io {
            message: format!("failed to read {name} from terminal: {e}"),
        };

        write!(self.output, "{question}: ").map_err(io_error)?;
        self.output.flush().map_err(io_error)?;

        let mut line = String::new();
        self.input.read_line(&mut line).map_err(io_error)?;

        let value = line.trim();
        if value.is_empty() {
            return Err(StageError::user_input(format!("{question} must not be empty")));
        }
        Ok(value.to_string())
    }

    fn read_multiline(&mut self, question: &str) -> Result<Option<String>, StageError> {
        if !self.interactive {
            return Ok(None);
        }

        let io_error = |e: std::io::Error| StageError::Io {
            message: format!("failed to read from terminal: {e}"),
        };

        writeln!(self.output, "{question} (finish with Ctrl+D; leave empty for the starter template):")
            .map_err(io_error)?;
        self.output.flush().map_err(io_error)?;

        let mut text = String::new();
        self.input.read_to_string(&mut text).map_err(io_error)?;

        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_known_value_is_not_prompted() {
        let mut output = Vec::new();
        let mut provider = TerminalFactProvider::new(Cursor::new(""), &mut output, true);
        let known = WorkflowFacts::new().with("author", "Ada");

        let value = provider.get_or_prompt(&known, "author", "Author").unwrap();
        assert_eq!(value, "Ada");
        drop(provider);
        assert!(output.is_empty());
    }

    #[test]
    fn test_prompt_reads_trimmed_line() {
        let mut output = Vec::new();
        let mut provider = TerminalFactProvider::new(Cursor::new("  My Ext \n"), &mut output, true);

        let value = provider
            .get_or_prompt(&WorkflowFacts::new(), "extension_name", "Extension name")
            .unwrap();
        assert_eq!(value, "My Ext");
        drop(provider);
        assert_eq!(String::from_utf8(output).unwrap(), "Extension name: ");
    }

    #[test]
    fn test_empty_answer_is_rejected() {
        let mut provider = TerminalFactProvider::new(Cursor::new("\n"), Vec::new(), true);
        let err = provider
            .get_or_prompt(&WorkflowFacts::new(), "author", "Author")
            .unwrap_err();
        assert!(matches!(err, StageError::UserInput { .. }));
    }

    #[test]
    fn test_non_interactive_names_the_flag() {
        let mut provider = TerminalFactProvider::new(Cursor::new("ignored\n"), Vec::new(), false);
        let err = provider
            .get_or_prompt(&WorkflowFacts::new(), "description", "Short description")
            .unwrap_err();
        assert!(err.to_string().contains("--extension-short-description"));
    }

    #[test]
    fn test_multiline_reads_until_end_of_input() {
        let mut output = Vec::new();
        let pasted = "export default {\n  onload() {}\n};\n";
        let mut provider = TerminalFactProvider::new(Cursor::new(pasted), &mut output, true);

        let code = provider.read_multiline("Paste extension.js").unwrap();
        assert_eq!(code.as_deref(), Some(pasted));
        drop(provider);
        assert!(String::from_utf8(output).unwrap().starts_with("Paste extension.js"));
    }

    #[test]
    fn test_multiline_blank_input_is_none() {
        let mut provider = TerminalFactProvider::new(Cursor::new("\n  \n"), Vec::new(), true);
        assert_eq!(provider.read_multiline("Paste extension.js").unwrap(), None);
    }

    #[test]
    fn test_multiline_without_terminal_reads_nothing() {
        let mut provider = TerminalFactProvider::new(Cursor::new("console.log(1);\n"), Vec::new(), false);
        assert_eq!(provider.read_multiline("Paste extension.js").unwrap(), None);
    }
}
