use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{cleanup::MAX_CLEANUP_DELAY, errors::Error, Result};

const DEFAULT_WELCOME_MESSAGE: &str = "Hi! Send me an SVG as text or as a <b>.svg</b> file \
and I'll send back a minified version.";
const DEFAULT_CLEANUP_DELAY_SECS: u64 = 60 * 60;
// Bot API refuses getFile above 20MB.
const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
const DEFAULT_FLOAT_PRECISION: u8 = 3;
const MAX_FLOAT_PRECISION: u8 = 8;

/// Typed configuration, passed explicitly into the dispatcher and router.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub welcome_message: String,
    pub start_command: String,

    // Transient storage
    pub storage_dir: PathBuf,
    pub cleanup_delay: Duration,
    pub max_file_size: u64,

    // Minifier
    pub float_precision: u8,

    // Health endpoint
    pub health_port: Option<u16>,
}

/// Optional `config.json` next to the binary: `{"token": "...", "welcomeMessage": "..."}`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub token: Option<String>,
    pub welcome_message: Option<String>,
}

impl FileConfig {
    /// Missing file is not an error; a file that fails to parse is.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // `.env` never overrides variables that are already set.
        let _ = dotenvy::dotenv();

        let file_path = env_str("CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.json"));
        let file = FileConfig::read(&file_path)?.unwrap_or_default();

        Self::from_sources(env_str, file)
    }

    /// Build a config from a variable lookup plus the optional config file.
    /// Variables win over the file.
    pub fn from_sources(lookup: impl Fn(&str) -> Option<String>, file: FileConfig) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("TOKEN"))
            .or_else(|| file.token.clone().and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(
                    "TELEGRAM_BOT_TOKEN (or TOKEN, or `token` in config.json) is required"
                        .to_string(),
                )
            })?;

        let welcome_message = get("WELCOME_MESSAGE")
            .or_else(|| file.welcome_message.clone().and_then(non_empty))
            .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string());

        let start_command = get("START_COMMAND").unwrap_or_else(|| "/start".to_string());
        if !start_command.starts_with('/') {
            return Err(Error::Config(format!(
                "START_COMMAND must start with '/': {start_command}"
            )));
        }

        let storage_dir = get("SVG_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("svgs"));
        let cleanup_delay = Duration::from_secs(
            parse_num(&get, "CLEANUP_DELAY_SECS")?.unwrap_or(DEFAULT_CLEANUP_DELAY_SECS),
        );
        if cleanup_delay > MAX_CLEANUP_DELAY {
            return Err(Error::Config(format!(
                "CLEANUP_DELAY_SECS must be at most {}, got {}",
                MAX_CLEANUP_DELAY.as_secs(),
                cleanup_delay.as_secs()
            )));
        }
        let max_file_size = parse_num(&get, "MAX_FILE_SIZE")?.unwrap_or(DEFAULT_MAX_FILE_SIZE);

        let float_precision = parse_num::<u8>(&get, "FLOAT_PRECISION")?
            .unwrap_or(DEFAULT_FLOAT_PRECISION)
            .min(MAX_FLOAT_PRECISION);

        let health_port = parse_num(&get, "PORT")?;

        Ok(Self {
            telegram_bot_token,
            welcome_message,
            start_command,
            storage_dir,
            cleanup_delay,
            max_file_size,
            float_precision,
            health_port,
        })
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got {raw:?}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let cfg = Config::from_sources(lookup(&[("TOKEN", "123:abc")]), FileConfig::default())
            .unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.start_command, "/start");
        assert_eq!(cfg.storage_dir, PathBuf::from("svgs"));
        assert_eq!(cfg.cleanup_delay, Duration::from_secs(3600));
        assert_eq!(cfg.float_precision, 3);
        assert_eq!(cfg.health_port, None);
        assert_eq!(cfg.welcome_message, DEFAULT_WELCOME_MESSAGE);
    }

    #[test]
    fn env_overrides_config_file() {
        let file = FileConfig {
            token: Some("from-file".to_string()),
            welcome_message: Some("hello from file".to_string()),
        };
        let cfg = Config::from_sources(
            lookup(&[("TELEGRAM_BOT_TOKEN", "from-env"), ("PORT", "8080")]),
            file,
        )
        .unwrap();
        assert_eq!(cfg.telegram_bot_token, "from-env");
        assert_eq!(cfg.welcome_message, "hello from file");
        assert_eq!(cfg.health_port, Some(8080));
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = Config::from_sources(lookup(&[("TOKEN", "  ")]), FileConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_numbers_are_rejected_and_precision_is_clamped() {
        let err = Config::from_sources(
            lookup(&[("TOKEN", "t"), ("CLEANUP_DELAY_SECS", "soon")]),
            FileConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("CLEANUP_DELAY_SECS"));

        let cfg = Config::from_sources(
            lookup(&[("TOKEN", "t"), ("FLOAT_PRECISION", "42")]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.float_precision, MAX_FLOAT_PRECISION);
    }

    #[test]
    fn cleanup_delay_has_an_upper_bound() {
        let err = Config::from_sources(
            lookup(&[("TOKEN", "t"), ("CLEANUP_DELAY_SECS", "18446744073709551615")]),
            FileConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("at most"));

        let max = MAX_CLEANUP_DELAY.as_secs().to_string();
        let cfg = Config::from_sources(
            lookup(&[("TOKEN", "t"), ("CLEANUP_DELAY_SECS", max.as_str())]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.cleanup_delay, MAX_CLEANUP_DELAY);
    }

    #[test]
    fn config_file_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"token":"t","welcomeMessage":"hi"}"#).unwrap();

        let file = FileConfig::read(&path).unwrap().unwrap();
        assert_eq!(file.token.as_deref(), Some("t"));
        assert_eq!(file.welcome_message.as_deref(), Some("hi"));

        assert!(FileConfig::read(&dir.path().join("missing.json"))
            .unwrap()
            .is_none());
    }
}
