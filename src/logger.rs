//! log4rs setup.
//!
//! Application logs go to `tableshim.log`; translated filters (target
//! `tableshim::queries`) and operational notices (target `tableshim::notice`)
//! get their own rolling files.

use crate::errors::AdapterError;
use crate::utils::devlog::NOTICE_TARGET;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

pub const QUERY_TARGET: &str = "tableshim::queries";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Fails if the file is missing, malformed, or a logger is already installed.
pub fn init() -> Result<(), AdapterError> {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// See [`init`].
pub fn init_path(path: &Path) -> Result<(), AdapterError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| AdapterError::Config(format!("log4rs {}: {e}", path.display())))
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, AdapterError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| AdapterError::Config(format!("log roller: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(|e| AdapterError::Io(e.to_string()))
}

/// Builds the rolling-file configuration without installing it.
///
/// # Errors
/// `Io` if the directory or files cannot be created.
pub fn build_config(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> Result<Config, AdapterError> {
    let base = match dir {
        Some(d) => PathBuf::from(d),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base).map_err(|e| AdapterError::Io(format!("{}: {e}", base.display())))?;
    let keep = retention.and_then(|r| u32::try_from(r).ok()).unwrap_or(DEFAULT_RETENTION).max(1);
    let lvl = parse_level(level);
    Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "tableshim", keep)?)))
        .appender(Appender::builder().build("queries", Box::new(rolling(&base, "queries", keep)?)))
        .appender(Appender::builder().build("notices", Box::new(rolling(&base, "notices", keep)?)))
        .logger(Logger::builder().appender("queries").additive(false).build(QUERY_TARGET, lvl))
        .logger(Logger::builder().appender("notices").appender("app").additive(false).build(NOTICE_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| AdapterError::Config(format!("log4rs config: {e}")))
}

/// Installs rolling-file logging for the process.
/// - dir: base directory for logs; current directory if `None`
/// - level: off|error|warn|info|debug|trace (default info)
/// - retention: rolled files kept per log (default 7)
///
/// # Errors
/// See [`build_config`]; also fails if another logger is already installed.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> Result<(), AdapterError> {
    let config = build_config(dir, level, retention)?;
    log4rs::init_config(config).map_err(|e| AdapterError::Config(format!("logger: {e}")))?;
    Ok(())
}

/// Configure logging from `TABLESHIM_LOG_DIR`, `TABLESHIM_LOG_LEVEL` and
/// `TABLESHIM_LOG_RETENTION`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), AdapterError> {
    let dir = std::env::var("TABLESHIM_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("TABLESHIM_LOG_LEVEL").ok();
    let retention = std::env::var("TABLESHIM_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let cfg = build_config(Some(&dir), Some("warn"), Some(3)).unwrap();
        assert!(dir.is_dir());
        assert_eq!(cfg.root().level(), LevelFilter::Warn);
        assert_eq!(cfg.loggers().len(), 2);
    }
}
