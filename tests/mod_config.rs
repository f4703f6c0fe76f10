use std::io::Write;
use tableshim::config::{DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_MAX_CONNECTIONS};
use tableshim::{AdapterConfig, AdapterError, RetryPolicy};

fn write_toml(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f
}

#[test]
fn load_reads_file_and_keeps_defaults_for_missing_keys() {
    let f = write_toml("account = \"acct\"\nsecret = \"k\"\nretry_policy = \"linear\"\n");
    let cfg = AdapterConfig::load(Some(f.path())).unwrap();
    assert_eq!(cfg.account.as_deref(), Some("acct"));
    assert_eq!(cfg.retry_policy, RetryPolicy::Linear);
    assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
    assert_eq!(cfg.idle_timeout_ms, DEFAULT_IDLE_TIMEOUT_MS);
    assert!(cfg.has_credentials());
}

#[test]
fn load_reports_missing_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(AdapterConfig::load(Some(&missing)), Err(AdapterError::Io(_))));

    let f = write_toml("max_connections = [1, 2]");
    assert!(matches!(AdapterConfig::load(Some(f.path())), Err(AdapterError::Toml(_))));

    let f = write_toml("retry_policy = \"sometimes\"");
    assert!(AdapterConfig::load(Some(f.path())).is_err());
}

#[test]
fn blank_credentials_do_not_count() {
    let cfg = AdapterConfig { account: Some("acct".into()), secret: Some("  ".into()), ..Default::default() };
    assert!(!cfg.has_credentials());
}

#[test]
fn redacted_masks_secret_only() {
    let cfg = AdapterConfig { account: Some("acct".into()), secret: Some("hunter2".into()), ..Default::default() };
    let shown = serde_json::to_string(&cfg.redacted()).unwrap();
    assert!(shown.contains("acct"));
    assert!(!shown.contains("hunter2"));
    assert!(shown.contains("ExponentialRetryPolicyFilter"));
    assert_eq!(AdapterConfig::default().redacted().secret, None);
}

#[test]
fn retry_policy_parses_either_spelling() {
    assert_eq!("ExponentialRetryPolicyFilter".parse::<RetryPolicy>().unwrap(), RetryPolicy::Exponential);
    assert_eq!(" NoRetry ".parse::<RetryPolicy>().unwrap(), RetryPolicy::NoRetry);
    assert_eq!("LINEAR".parse::<RetryPolicy>().unwrap(), RetryPolicy::Linear);
    assert!(matches!("fibonacci".parse::<RetryPolicy>(), Err(AdapterError::Config(_))));
    assert_eq!(RetryPolicy::Linear.to_string(), "LinearRetryPolicyFilter");
}
