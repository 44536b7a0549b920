use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};

pub const BIND_ENV: &str = "TASKFOCUS_BIND";
pub const DB_ENV: &str = "TASKFOCUS_DB";
pub const USER_ENV: &str = "TASKFOCUS_USER";

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_USER: &str = "local";

/// Application data directory, e.g. `~/.local/share/taskfocus`.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskfocus")
}

/// Everything `serve` needs; CLI flags override the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub default_user: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(BIND_ENV).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .with_context(|| format!("invalid {BIND_ENV} address {bind_raw:?}"))?;

        let db_path = lookup(DB_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("taskfocus.sqlite3"));

        let default_user = lookup(USER_ENV)
            .map(|user| user.trim().to_string())
            .filter(|user| !user.is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        Ok(Self {
            bind,
            db_path,
            default_user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND.parse().unwrap());
        assert_eq!(config.default_user, DEFAULT_USER);
        assert!(config.db_path.ends_with("taskfocus.sqlite3"));
    }

    #[test]
    fn environment_values_are_used() {
        let config = ServerConfig::from_lookup(|key| match key {
            BIND_ENV => Some("0.0.0.0:8080".into()),
            DB_ENV => Some("/tmp/focus.db".into()),
            USER_ENV => Some(" bob ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/focus.db"));
        assert_eq!(config.default_user, "bob");
    }

    #[test]
    fn bad_bind_address_is_an_error() {
        let result = ServerConfig::from_lookup(|key| (key == BIND_ENV).then(|| "nowhere".into()));
        assert!(result.is_err());
    }
}
