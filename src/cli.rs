use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::query::{Logic, TableQuery, ensure_supported, translate_with_logic, unsupported_option};
use crate::utils::json::parse_json_object;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

/// Programmatic mirror of the `tableshim` binary's subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Render the native filter for an options object.
    Translate { table: String, options_json: String, or: bool },
    /// Report whether an options object passes the unsupported-operation gate.
    Check { options_json: String },
    /// Print the resolved configuration, secret redacted.
    Config { path: Option<PathBuf> },
}

/// Runs `cmd`, writing its output to `out`.
///
/// # Errors
/// JSON, gate, translation or configuration errors; `Io` if `out` fails.
pub fn run<W: Write>(cmd: Command, out: &mut W) -> Result<(), AdapterError> {
    match cmd {
        Command::Translate { table, options_json, or } => {
            let options = parse_json_object(&options_json)?;
            ensure_supported("translate", &options)?;
            let logic = if or { Logic::Or } else { Logic::And };
            let q = translate_with_logic(TableQuery::from_table(&table), &options, logic)?;
            let line = json!({ "table": q.table, "filter": q.filter_expression(), "top": q.top });
            writeln!(out, "{line}").map_err(io)
        }
        Command::Check { options_json } => {
            let options = parse_json_object(&options_json)?;
            match unsupported_option(&options) {
                None => writeln!(out, "supported"),
                Some(key) => writeln!(out, "unsupported: {key}"),
            }
            .map_err(io)
        }
        Command::Config { path } => {
            let cfg = AdapterConfig::load(path.as_deref())?;
            let s = serde_json::to_string_pretty(&cfg.redacted())?;
            writeln!(out, "{s}").map_err(io)
        }
    }
}

fn io(e: std::io::Error) -> AdapterError {
    AdapterError::Io(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_string(cmd: Command) -> Result<String, AdapterError> {
        let mut buf = Vec::new();
        run(cmd, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap())
    }

    #[test]
    fn translate_prints_filter_and_top() {
        let out = run_to_string(Command::Translate {
            table: "users".into(),
            options_json: r#"{"where":{"age":{">":30},"name":"ann"},"limit":5}"#.into(),
            or: true,
        })
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(v["filter"], "age gt 30 or name eq 'ann'");
        assert_eq!(v["top"], 5);
    }

    #[test]
    fn check_names_unsupported_key() {
        let out = run_to_string(Command::Check { options_json: r#"{"groupBy":["a"]}"#.into() }).unwrap();
        assert_eq!(out.trim(), "unsupported: groupBy");
        let out = run_to_string(Command::Check { options_json: r#"{"where":{}}"#.into() }).unwrap();
        assert_eq!(out.trim(), "supported");
    }

    #[test]
    fn translate_rejects_unsupported() {
        let err = run_to_string(Command::Translate {
            table: "users".into(),
            options_json: r#"{"sum":"age"}"#.into(),
            or: false,
        })
        .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported { .. }));
    }
}
