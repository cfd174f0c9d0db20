//! Shared output layer for human/JSON parity across CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and either writes
//! labelled text for people or one stable JSON document to stdout. Errors
//! go to stderr in the same mode.

use serde::Serialize;
use std::io::{self, Write};

use inforequests_core::error::{ErrorCode, classify};

/// Shared width for human separators.
pub const RULE_WIDTH: usize = 72;

/// Write a horizontal separator.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// A structured error with its stable code and an optional hint.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        let code: ErrorCode = classify(err);
        Self {
            code: code.code(),
            message: format!("{err:#}"),
            hint: code.hint(),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode the value is serialized with `serde_json`; otherwise
/// `human_fn` writes the text form.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
    } else {
        human_fn(value, &mut out)?;
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)?;
    Ok(())
}

fn write_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut *w, &wrapper)?;
            writeln!(w)?;
        }
        OutputMode::Human => {
            writeln!(w, "error[{}]: {}", error.code, error.message)?;
            if let Some(hint) = error.hint {
                writeln!(w, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CliError, OutputMode, pretty_kv, write_error};
    use inforequests_core::error::WorkflowError;

    fn rendered(mode: OutputMode, error: &CliError) -> String {
        let mut buf = Vec::new();
        write_error(&mut buf, mode, error).expect("write error");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn cli_error_carries_code_and_hint() {
        let err = anyhow::Error::from(WorkflowError::ObligeeMandatory);
        let cli = CliError::from(&err);
        assert_eq!(cli.code, "E3001");
        assert_eq!(cli.message, "Branch.obligee is mandatory");
        assert!(cli.hint.is_some());
    }

    #[test]
    fn human_error_has_code_prefix() {
        let err = anyhow::Error::from(WorkflowError::BranchNotFound(7));
        let text = rendered(OutputMode::Human, &CliError::from(&err));
        assert_eq!(text, "error[E2003]: branch 7 not found\n");
    }

    #[test]
    fn json_error_is_wrapped() {
        let err = anyhow::anyhow!("boom");
        let text = rendered(OutputMode::Json, &CliError::from(&err));
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["error"]["code"], "E9001");
        assert_eq!(value["error"]["message"], "boom");
    }

    #[test]
    fn kv_lines_are_aligned() {
        let mut buf = Vec::new();
        pretty_kv(&mut buf, "obligee", "Town Hall").expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "obligee:       Town Hall\n");
    }
}
