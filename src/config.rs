//! Configuration constants and profile loading for sendline
//!
//! Profiles live in an INI file, one section per profile:
//!
//! ```ini
//! [default]
//! timeout = 30s
//! max_redirects = 5
//! header.Accept = application/json
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::models::NameValueMap;
use crate::services::ClientConfig;

/// Default profile file path for sendline
pub const DEFAULT_PROFILE_PATH: &str = "~/.sendline/profile";

/// Environment variable name for overriding the profile path
pub const PROFILE_PATH_ENV_VAR: &str = "SENDLINE_PROFILE_PATH";

/// Default location of the history file
pub const DEFAULT_HISTORY_PATH: &str = "~/.sendline/history.jsonl";

/// Default location of the saved requests file
pub const DEFAULT_REQUESTS_PATH: &str = "~/.sendline/requests.jsonl";

const HEADER_KEY_PREFIX: &str = "header.";

/// Get the profile file path, checking environment variable first, then falling back to default
pub fn get_profile_path() -> String {
    std::env::var_os(PROFILE_PATH_ENV_VAR)
        .and_then(|val| val.into_string().ok())
        .unwrap_or_else(|| DEFAULT_PROFILE_PATH.to_string())
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::Path {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot resolve path {path}: {reason}")]
    Path { path: String, reason: String },

    #[error("failed to read profile file {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: ini::Error,
    },

    #[error("invalid value for {key} in profile {profile}: {value:?} ({reason})")]
    InvalidValue {
        profile: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// One named profile, resolved against defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    name: String,
    client: ClientConfig,
    headers: NameValueMap,
    history_path: Option<PathBuf>,
    requests_path: Option<PathBuf>,
    log_level: Option<String>,
}

impl Profile {
    /// Defaults only.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            client: ClientConfig::default(),
            headers: NameValueMap::new(),
            history_path: None,
            requests_path: None,
            log_level: None,
        }
    }

    /// Load `name` from the profile file at `path`.
    ///
    /// A missing file or section gives the defaults.
    pub fn load(path: &str, name: &str) -> Result<Self, ConfigError> {
        let resolved = expand_path(path)?;
        if !resolved.exists() {
            tracing::debug!("Profile file {} not found, using defaults", resolved.display());
            return Ok(Self::new(name));
        }

        let ini = Ini::load_from_file(&resolved).map_err(|source| ConfigError::Load {
            path: resolved.display().to_string(),
            source,
        })?;
        Self::from_ini(&ini, name)
    }

    pub fn from_ini(ini: &Ini, name: &str) -> Result<Self, ConfigError> {
        let mut profile = Self::new(name);
        let Some(section) = ini.section(Some(name)) else {
            tracing::debug!("Profile {} not configured, using defaults", name);
            return Ok(profile);
        };

        for (key, value) in section.iter() {
            profile.apply(key, value.trim())?;
        }
        Ok(profile)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        if let Some(header) = key.strip_prefix(HEADER_KEY_PREFIX) {
            if header.trim().is_empty() {
                return Err(self.invalid(key, value, "header name is empty".to_string()));
            }
            self.headers.insert(header.trim().to_string(), value.to_string());
            return Ok(());
        }

        let client = &mut self.client;
        let result = match key {
            "timeout" => parse_duration(value).map(|d| client.timeout = d),
            "dial_timeout" => parse_duration(value).map(|d| client.dial_timeout = d),
            "tls_handshake_timeout" => {
                parse_duration(value).map(|d| client.tls_handshake_timeout = d)
            }
            "response_header_timeout" => {
                parse_duration(value).map(|d| client.response_header_timeout = d)
            }
            "keep_alive" => parse_duration(value).map(|d| client.keep_alive = d),
            "idle_conn_timeout" => parse_duration(value).map(|d| client.idle_conn_timeout = d),
            "max_redirects" => parse_number(value).map(|n| client.max_redirects = n),
            "follow_redirects" => parse_bool(value).map(|b| client.follow_redirects = b),
            "insecure" => parse_bool(value).map(|b| client.danger_skip_tls_verify = b),
            "history_path" => {
                expand_path(value).map(|p| self.history_path = Some(p))?;
                Ok(())
            }
            "requests_path" => {
                expand_path(value).map(|p| self.requests_path = Some(p))?;
                Ok(())
            }
            "log_level" => {
                self.log_level = Some(value.to_string());
                Ok(())
            }
            _ => {
                tracing::warn!("Ignoring unknown key {} in profile {}", key, self.name);
                Ok(())
            }
        };

        result.map_err(|reason| self.invalid(key, value, reason))
    }

    fn invalid(&self, key: &str, value: &str, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            profile: self.name.clone(),
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    pub fn into_client(self) -> ClientConfig {
        self.client
    }

    /// Headers sent with every request unless the request sets its own.
    pub fn headers(&self) -> &NameValueMap {
        &self.headers
    }

    pub fn history_path(&self) -> Option<&Path> {
        self.history_path.as_deref()
    }

    pub fn requests_path(&self) -> Option<&Path> {
        self.requests_path.as_deref()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }
}

/// Parse `500ms`, `30s`, `2m`, `1h` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    if amount.is_empty() {
        return Err("expected a number followed by ms, s, m or h".to_string());
    }
    let amount: u64 = amount.parse().map_err(|e| format!("{e}"))?;

    let seconds = |factor: u64| {
        amount
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| "duration is too large".to_string())
    };

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => seconds(60),
        "h" => seconds(3600),
        other => Err(format!("unknown duration unit {other:?}")),
    }
}

fn parse_number<T: FromStr>(value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| e.to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_profile_path() {
        assert_eq!(DEFAULT_PROFILE_PATH, "~/.sendline/profile");
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(PROFILE_PATH_ENV_VAR, "SENDLINE_PROFILE_PATH");
    }

    #[test]
    fn test_get_profile_path_default() {
        // Save current env var state
        let original = std::env::var_os(PROFILE_PATH_ENV_VAR);

        std::env::remove_var(PROFILE_PATH_ENV_VAR);
        assert_eq!(get_profile_path(), DEFAULT_PROFILE_PATH);

        // Restore original state
        if let Some(val) = original {
            std::env::set_var(PROFILE_PATH_ENV_VAR, val);
        }
    }

    #[test]
    fn test_get_profile_path_env_override() {
        // Save current env var state
        let original = std::env::var_os(PROFILE_PATH_ENV_VAR);

        let test_path = "/custom/profile/path";
        std::env::set_var(PROFILE_PATH_ENV_VAR, test_path);
        assert_eq!(get_profile_path(), test_path);

        // Restore original state
        match original {
            Some(val) => std::env::set_var(PROFILE_PATH_ENV_VAR, val),
            None => std::env::remove_var(PROFILE_PATH_ENV_VAR),
        }
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("15"), Ok(Duration::from_secs(15)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10 days").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert_eq!(
            parse_duration("9999999999999999999h"),
            Err("duration is too large".to_string())
        );
        assert!(parse_duration("9999999999999999999m").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn test_overflowing_duration_names_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[default]\ntimeout = 9999999999999999999h").unwrap();

        let err = Profile::load(file.path().to_str().unwrap(), "default").unwrap_err();
        assert!(err.to_string().contains("timeout"), "{err}");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let profile = Profile::load(path.to_str().unwrap(), "default").unwrap();
        assert_eq!(profile, Profile::new("default"));
    }

    #[test]
    fn test_load_profile_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[default]\ntimeout = 5s\n\n[staging]\ntimeout = 500ms\nmax_redirects = 2\n\
             follow_redirects = false\ninsecure = yes\nkeep_alive = 0\n\
             log_level = debug\nhistory_path = /tmp/sendline-history.jsonl\n\
             requests_path = /tmp/sendline-requests.jsonl\n\
             header.Accept = application/json\nheader.X-Env = staging"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let staging = Profile::load(path, "staging").unwrap();
        assert_eq!(staging.name(), "staging");
        assert_eq!(staging.client().timeout, Duration::from_millis(500));
        assert_eq!(staging.client().max_redirects, 2);
        assert!(!staging.client().follow_redirects);
        assert!(staging.client().danger_skip_tls_verify);
        assert_eq!(staging.client().keep_alive, Duration::ZERO);
        assert_eq!(staging.client().dial_timeout, Duration::from_secs(10));
        assert_eq!(staging.log_level(), Some("debug"));
        assert_eq!(
            staging.history_path(),
            Some(Path::new("/tmp/sendline-history.jsonl"))
        );
        assert_eq!(
            staging.requests_path(),
            Some(Path::new("/tmp/sendline-requests.jsonl"))
        );
        assert_eq!(
            staging.headers().get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(staging.headers().len(), 2);

        let default = Profile::load(path, "default").unwrap();
        assert_eq!(default.client().timeout, Duration::from_secs(5));

        let missing = Profile::load(path, "prod").unwrap();
        assert_eq!(missing.into_client(), ClientConfig::default());
    }

    #[test]
    fn test_malformed_value_names_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[default]\nmax_redirects = many").unwrap();

        let err = Profile::load(file.path().to_str().unwrap(), "default").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("max_redirects"), "{message}");
        assert!(message.contains("many"), "{message}");
    }
}
