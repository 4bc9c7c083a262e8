use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CareResult;

/// Returns the data directory holding every clinitask file.
///
/// The path is determined in the following order:
/// 1. `CLINITASK_DATA` environment variable.
/// 2. `~/.local/share/clinitask` (on Linux).
/// 3. `.` (fallback).
pub fn data_dir() -> PathBuf {
    std::env::var("CLINITASK_DATA").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("clinitask");
        p
    })
}

/// User settings read from `config.json`. Missing fields take defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Assignments per page.
    pub page_size: u32,
    /// Base URL referral links point at.
    pub origin: String,
    pub app_name: String,
    /// Countdown refresh interval.
    pub tick_ms: u64,
    /// How long the "copied" acknowledgment stays up.
    pub copy_notice_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: 10,
            origin: "https://app.example".to_string(),
            app_name: "Clinitask".to_string(),
            tick_ms: 1_000,
            copy_notice_ms: 2_000,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Loads `config.json`, or the defaults when it does not exist.
    pub fn load() -> CareResult<Config> {
        let path = Config::path();
        if !path.exists() {
            return Ok(Config::default());
        }
        let s = fs::read_to_string(&path)?;
        let cfg: Config = serde_json::from_str(&s)?;
        Ok(cfg.sanitized())
    }

    fn sanitized(mut self) -> Config {
        self.page_size = self.page_size.max(1);
        self.tick_ms = self.tick_ms.max(100);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn copy_notice_ttl(&self) -> Duration {
        Duration::from_millis(self.copy_notice_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_takes_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"page_size": 0, "origin": "https://clinic.test"}"#).unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.page_size, 1);
        assert_eq!(cfg.origin, "https://clinic.test");
        assert_eq!(cfg.copy_notice_ttl(), Duration::from_secs(2));
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
    }
}
