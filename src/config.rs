use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/videosvc-env";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_DATA_ROOT: &str = "videos";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 100;
pub const PORT_ENV_VAR: &str = "VIDEOSVC_PORT";

/// Values found in the env-style config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
    /// `MAX_UPLOAD_MB` converted to bytes.
    pub max_upload_bytes: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_root: PathBuf,
    pub public_base_url: Option<String>,
    pub max_upload_bytes: usize,
    pub request_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            public_base_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            request_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Base used for `dataUrl` when neither a public URL nor a `Host` header
    /// is available. Port 80 is left implicit.
    pub fn listen_base_url(&self) -> String {
        if self.port == 80 {
            format!("http://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let cfg =
        parse_env_config(&content).with_context(|| format!("Parsing {}", path.display()))?;
    Ok(Some(cfg))
}

fn parse_env_config(content: &str) -> Result<EnvConfig> {
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value_raw)) = trimmed.split_once('=') else {
            continue;
        };
        let value = value_raw.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "VIDEOSVC_HOST" => cfg.host = Some(value.to_string()),
            "VIDEOSVC_PORT" => {
                cfg.port = Some(value.parse().context("VIDEOSVC_PORT is not a port")?);
            }
            "DATA_ROOT" => cfg.data_root = Some(PathBuf::from(value)),
            "PUBLIC_BASE_URL" => cfg.public_base_url = Some(value.to_string()),
            "MAX_UPLOAD_MB" => {
                let mb: usize = value.parse().context("MAX_UPLOAD_MB is not a number")?;
                let bytes = mb
                    .checked_mul(1024 * 1024)
                    .ok_or_else(|| anyhow!("{mb} MiB does not fit in usize"))
                    .context("MAX_UPLOAD_MB is too large")?;
                cfg.max_upload_bytes = Some(bytes);
            }
            "REQUEST_TIMEOUT_SECS" => {
                cfg.request_timeout_secs = Some(
                    value
                        .parse()
                        .context("REQUEST_TIMEOUT_SECS is not a number")?,
                );
            }
            _ => {}
        }
    }
    Ok(cfg)
}

/// Resolves the server settings: CLI overrides, then the `VIDEOSVC_PORT`
/// environment variable, then the config file, then defaults.
///
/// A missing file is only tolerated at [`DEFAULT_CONFIG_PATH`]; an explicitly
/// requested file has to exist.
pub fn load_server_config(path: &Path, overrides: Overrides) -> Result<ServerConfig> {
    let file = match read_env_config(path)? {
        Some(cfg) => cfg,
        None if path == Path::new(DEFAULT_CONFIG_PATH) => EnvConfig::default(),
        None => return Err(anyhow!("Missing config file at {}", path.display())),
    };
    let env_port = match std::env::var(PORT_ENV_VAR) {
        Ok(value) => Some(
            value
                .parse::<u16>()
                .with_context(|| format!("Parsing {PORT_ENV_VAR}={value}"))?,
        ),
        Err(_) => None,
    };
    Ok(resolve(file, env_port, overrides))
}

fn resolve(file: EnvConfig, env_port: Option<u16>, overrides: Overrides) -> ServerConfig {
    let defaults = ServerConfig::default();
    ServerConfig {
        host: overrides.host.or(file.host).unwrap_or(defaults.host),
        port: overrides
            .port
            .or(env_port)
            .or(file.port)
            .unwrap_or(defaults.port),
        data_root: overrides
            .data_root
            .or(file.data_root)
            .unwrap_or(defaults.data_root),
        public_base_url: overrides.public_base_url.or(file.public_base_url),
        max_upload_bytes: file
            .max_upload_bytes
            .unwrap_or(defaults.max_upload_bytes),
        request_timeout: file
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    }
}
