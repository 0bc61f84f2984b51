use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

pub(crate) const fn default_true() -> bool {
    true
}

/// On-disk configuration, `~/.gavel/config.toml` unless `GAVEL_CONFIG` points
/// elsewhere.
///
/// ```toml
/// [app]
/// env = "production"
///
/// [store]
/// path = "${HOME}/.gavel/gavel.db"
/// busy_timeout_ms = 5000
///
/// [api]
/// operation_timeout_ms = 10000
/// default_page_size = 20
/// max_page_size = 100
///
/// [audit]
/// enabled = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GavelConfig {
    pub app: Option<AppConfig>,
    pub store: Option<StoreConfig>,
    pub api: Option<ApiConfig>,
    pub audit: Option<AuditConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub env: Environment,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file. Supports `${VAR}` expansion.
    pub path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Upper bound on a single API operation, store waits included.
    pub operation_timeout_ms: Option<u64>,
    pub default_page_size: Option<u32>,
    pub max_page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Effective settings after defaults and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub environment: Environment,
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub operation_timeout: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub audit_enabled: bool,
}

impl Settings {
    pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
}

impl Default for Settings {
    fn default() -> Self {
        GavelConfig::default().resolve_with(|_| None)
    }
}

/// Replace `${VAR}` with the variable's value. Unset variables expand to the
/// empty string; unterminated `${` is kept as-is.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let var = &after[..close];
        if var.is_empty() {
            out.push_str("${}");
        } else {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

impl GavelConfig {
    /// Load from [`config_path`]. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {}", path.display(), source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {}", path.display(), source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Apply defaults and the `GAVEL_ENV` / `GAVEL_DB_PATH` overrides.
    pub fn resolve(&self) -> Settings {
        self.resolve_with(|name| env::var(name).ok())
    }

    fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let mut environment = self.app.as_ref().map(|app| app.env).unwrap_or_default();
        if let Some(raw) = lookup("GAVEL_ENV") {
            match Environment::parse(&raw) {
                Some(env) => environment = env,
                None => tracing::warn!(value = %raw, "ignoring unrecognised GAVEL_ENV"),
            }
        }

        let store = self.store.as_ref();
        let db_path = lookup("GAVEL_DB_PATH")
            .filter(|path| !path.trim().is_empty())
            .or_else(|| store.and_then(|s| s.path.clone()))
            .map(|path| PathBuf::from(expand_env_vars(&path)))
            .unwrap_or_else(default_db_path);
        let busy_timeout_ms = store
            .and_then(|s| s.busy_timeout_ms)
            .unwrap_or(Settings::DEFAULT_BUSY_TIMEOUT_MS);

        let api = self.api.as_ref();
        let operation_timeout_ms = api
            .and_then(|a| a.operation_timeout_ms)
            .filter(|ms| *ms > 0)
            .unwrap_or(Settings::DEFAULT_OPERATION_TIMEOUT_MS);
        let max_page_size = api
            .and_then(|a| a.max_page_size)
            .filter(|n| *n > 0)
            .unwrap_or(Settings::DEFAULT_MAX_PAGE_SIZE);
        let default_page_size = api
            .and_then(|a| a.default_page_size)
            .filter(|n| *n > 0)
            .unwrap_or(Settings::DEFAULT_PAGE_SIZE)
            .min(max_page_size);

        Settings {
            environment,
            db_path,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            operation_timeout: Duration::from_millis(operation_timeout_ms),
            default_page_size,
            max_page_size,
            audit_enabled: self.audit.as_ref().is_none_or(|audit| audit.enabled),
        }
    }
}

/// `$GAVEL_CONFIG` if set, else `~/.gavel/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("GAVEL_CONFIG").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    gavel_dir().map(|dir| dir.join("config.toml"))
}

pub fn gavel_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gavel"))
}

fn default_db_path() -> PathBuf {
    gavel_dir().map_or_else(|| PathBuf::from("gavel.db"), |dir| dir.join("gavel.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("hello world"), "hello world");
    }

    #[test]
    fn expand_env_vars_single_var() {
        unsafe {
            std::env::set_var("GAVEL_TEST_EXPAND_ONE", "replaced");
        }
        assert_eq!(
            expand_env_vars("pre-${GAVEL_TEST_EXPAND_ONE}-post"),
            "pre-replaced-post"
        );
        unsafe {
            std::env::remove_var("GAVEL_TEST_EXPAND_ONE");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        assert_eq!(expand_env_vars("a${GAVEL_TEST_DEFINITELY_UNSET}b"), "ab");
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("path/${HOME"), "path/${HOME");
    }

    #[test]
    fn expand_env_vars_empty_var_name_preserved() {
        assert_eq!(expand_env_vars("x${}y"), "x${}y");
    }

    #[test]
    fn parse_empty_config() {
        let config: GavelConfig = toml::from_str("").unwrap();
        let settings = config.resolve_with(|_| None);
        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.busy_timeout, Duration::from_secs(5));
        assert_eq!(settings.operation_timeout, Duration::from_secs(10));
        assert_eq!(settings.default_page_size, 20);
        assert_eq!(settings.max_page_size, 100);
        assert!(settings.audit_enabled);
        assert!(settings.db_path.ends_with("gavel.db"));
    }

    #[test]
    fn parse_full_config() {
        let config: GavelConfig = toml::from_str(
            r#"
            [app]
            env = "production"

            [store]
            path = "/var/lib/gavel/gavel.db"
            busy_timeout_ms = 250

            [api]
            operation_timeout_ms = 2000
            default_page_size = 50
            max_page_size = 40

            [audit]
            enabled = false
            "#,
        )
        .unwrap();
        let settings = config.resolve_with(|_| None);
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.db_path, PathBuf::from("/var/lib/gavel/gavel.db"));
        assert_eq!(settings.busy_timeout, Duration::from_millis(250));
        assert_eq!(settings.operation_timeout, Duration::from_secs(2));
        // Default page size never exceeds the maximum.
        assert_eq!(settings.default_page_size, 40);
        assert_eq!(settings.max_page_size, 40);
        assert!(!settings.audit_enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<GavelConfig>("[store]\nfile = \"x\"").is_err());
    }

    #[test]
    fn environment_overrides_win() {
        let config: GavelConfig =
            toml::from_str("[app]\nenv = \"development\"\n[store]\npath = \"a.db\"").unwrap();
        let vars = [("GAVEL_ENV", "prod"), ("GAVEL_DB_PATH", "/tmp/override.db")];
        let settings = config.resolve_with(lookup(&vars));
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.db_path, PathBuf::from("/tmp/override.db"));
    }

    #[test]
    fn unrecognised_environment_is_ignored() {
        let vars = [("GAVEL_ENV", "staging")];
        let settings = GavelConfig::default().resolve_with(lookup(&vars));
        assert_eq!(settings.environment, Environment::Development);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GavelConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.store.is_none());
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store\npath = 1").unwrap();
        let err = GavelConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }
}
