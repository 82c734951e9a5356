use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthFileConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root of the date-routed acquisition tree (`MAIN_DIR`).
    #[serde(default = "default_main_dir")]
    pub main_dir: PathBuf,
    /// Root holding `configurations/` (`ANALYSIS_DIR`).
    #[serde(default = "default_analysis_dir")]
    pub analysis_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            main_dir: default_main_dir(),
            analysis_dir: default_analysis_dir(),
        }
    }
}

fn default_main_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_analysis_dir() -> PathBuf {
    PathBuf::from("./analysis")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_python")]
    pub python: PathBuf,
    /// Defaults to `<analysis_dir>/analysis.py` when unset.
    #[serde(default)]
    pub script: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            script: None,
        }
    }
}

fn default_python() -> PathBuf {
    PathBuf::from("python3")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthFileConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    /// Lowercase hex SHA-256 of the password.
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default = "default_session_hours")]
    pub session_hours: u32,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            login: None,
            password_hash: None,
            session_hours: default_session_hours(),
        }
    }
}

fn default_session_hours() -> u32 {
    8
}

/// Fully specified credentials, present only when login is enabled.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub login: String,
    pub password_hash: String,
    pub session_hours: u32,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn script_path(&self) -> PathBuf {
        self.analysis
            .script
            .clone()
            .unwrap_or_else(|| self.data.analysis_dir.join("analysis.py"))
    }

    /// `Some` when all three credentials are configured.
    pub fn auth_settings(&self) -> Option<AuthSettings> {
        let a = &self.auth;
        match (&a.jwt_secret, &a.login, &a.password_hash) {
            (Some(secret), Some(login), Some(hash)) => Some(AuthSettings {
                jwt_secret: secret.clone(),
                login: login.clone(),
                password_hash: hash.to_ascii_lowercase(),
                session_hours: a.session_hours,
            }),
            _ => None,
        }
    }

    /// Applies environment overrides read through `get`.
    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = get("MAIN_DIR") {
            self.data.main_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ANALYSIS_DIR") {
            self.data.analysis_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PYTHON_PATH") {
            self.analysis.python = PathBuf::from(v);
        }
        if let Some(v) = get("ANALYSIS_SCRIPT") {
            self.analysis.script = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", v))?;
        }
        if let Some(v) = get("BIND_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("JWT_SECRET") {
            self.auth.jwt_secret = Some(v);
        }
        if let Some(v) = get("USER_LOGIN") {
            self.auth.login = Some(v);
        }
        if let Some(v) = get("USER_PASSWORD_HASH") {
            self.auth.password_hash = Some(v);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be > 0");
        }

        let a = &self.auth;
        let set = [
            a.jwt_secret.is_some(),
            a.login.is_some(),
            a.password_hash.is_some(),
        ];
        if set.iter().any(|s| *s) && !set.iter().all(|s| *s) {
            anyhow::bail!(
                "auth is partially configured: JWT_SECRET, USER_LOGIN and USER_PASSWORD_HASH must all be set"
            );
        }
        if let Some(secret) = &a.jwt_secret {
            if secret.len() < 16 {
                anyhow::bail!("JWT_SECRET must be at least 16 bytes");
            }
        }
        if let Some(hash) = &a.password_hash {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                anyhow::bail!("USER_PASSWORD_HASH must be a hex SHA-256 digest");
            }
        }
        if a.session_hours == 0 {
            anyhow::bail!("auth.session_hours must be > 0");
        }
        Ok(())
    }
}

/// Loads `path` if it exists, then applies environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

pub fn load_config_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_env(env)?;
    config.validate()?;
    Ok(config)
}
