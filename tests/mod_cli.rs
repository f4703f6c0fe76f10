use std::io::Write;
use tableshim::AdapterError;
use tableshim::cli::{Command, run};

fn output(cmd: Command) -> Result<String, AdapterError> {
    let mut buf = Vec::new();
    run(cmd, &mut buf)?;
    Ok(String::from_utf8(buf).unwrap())
}

#[test]
fn translate_defaults_to_and_chain() {
    let out = output(Command::Translate {
        table: "orders".into(),
        options_json: r#"{"where":{"PartitionKey":"eu","total":{">=":100}}}"#.into(),
        or: false,
    })
    .unwrap();
    let v: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(v["table"], "orders");
    assert_eq!(v["filter"], "PartitionKey eq 'eu' and total ge 100");
    assert!(v["top"].is_null());
}

#[test]
fn malformed_options_are_errors() {
    let err = output(Command::Check { options_json: "{not json".into() }).unwrap_err();
    assert!(matches!(err, AdapterError::Json(_) | AdapterError::Query(_)));
    let err = output(Command::Translate { table: "t".into(), options_json: "[1]".into(), or: false }).unwrap_err();
    assert!(matches!(err, AdapterError::Json(_) | AdapterError::Query(_)));
}

#[test]
fn config_prints_redacted_file_contents() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "account = \"acct\"\nsecret = \"hunter2\"\nmax_connections = 3").unwrap();
    let out = output(Command::Config { path: Some(f.path().to_path_buf()) }).unwrap();
    let v: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["account"], "acct");
    assert_eq!(v["secret"], "***");
    assert_eq!(v["max_connections"], 3);
}
