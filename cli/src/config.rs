use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use dirs::home_dir;
use serde::Deserialize;
use taskboard_attachments_api::OwnerId;

const CONFIG_TOML_FILE: &str = "config.toml";
const DEFAULT_BUCKET: &str = "task-images";
const DEFAULT_TABLE: &str = "tasks";
const DEFAULT_LOG_LEVEL: &str = "warn";
const MOCK_OWNER: &str = "mock-user";

pub const TASKBOARD_HOME_ENV_VAR: &str = "TASKBOARD_HOME";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Online,
    Mock,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigToml {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub bucket: Option<String>,
    pub table: Option<String>,
    pub owner_id: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub mode: Option<Mode>,
}

/// Values that take precedence over `config.toml`, from the environment or flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub owner_id: Option<String>,
    pub mode: Option<Mode>,
}

impl ConfigOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            base_url: get("TASKBOARD_BASE_URL"),
            api_key: get("TASKBOARD_API_KEY"),
            access_token: get("TASKBOARD_ACCESS_TOKEN"),
            owner_id: get("TASKBOARD_OWNER_ID"),
            mode: get("TASKBOARD_MODE").and_then(|m| match m.to_ascii_lowercase().as_str() {
                "mock" => Some(Mode::Mock),
                "online" => Some(Mode::Online),
                other => {
                    tracing::warn!("ignoring unknown TASKBOARD_MODE={other}");
                    None
                }
            }),
        }
    }

    /// Layer `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: ConfigOverrides) -> Self {
        Self {
            base_url: other.base_url.or(self.base_url),
            api_key: other.api_key.or(self.api_key),
            access_token: other.access_token.or(self.access_token),
            owner_id: other.owner_id.or(self.owner_id),
            mode: other.mode.or(self.mode),
        }
    }
}

/// Resolved settings used to build the stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub base_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub bucket: String,
    pub table: String,
    pub owner_id: OwnerId,
    pub request_timeout: Option<Duration>,
    pub log_level: String,
}

impl Config {
    pub fn load(home: &Path, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let toml = load_config_toml(home)
            .with_context(|| format!("failed to load {}", home.join(CONFIG_TOML_FILE).display()))?;
        Self::from_toml(toml, overrides)
    }

    pub fn from_toml(toml: ConfigToml, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let mode = overrides.mode.or(toml.mode).unwrap_or_default();
        let base_url = overrides.base_url.or(toml.base_url);
        let owner_id = overrides.owner_id.or(toml.owner_id);

        let (base_url, owner_id) = match mode {
            Mode::Mock => (
                base_url.unwrap_or_else(|| "mock://local".to_string()),
                owner_id.unwrap_or_else(|| MOCK_OWNER.to_string()),
            ),
            Mode::Online => {
                let base_url = base_url.context(
                    "base_url is not configured; set it in config.toml or TASKBOARD_BASE_URL",
                )?;
                let base_url = normalize_base_url(&base_url)?;
                let owner_id = owner_id.context(
                    "owner_id is not configured; set it in config.toml or TASKBOARD_OWNER_ID",
                )?;
                (base_url, owner_id)
            }
        };

        Ok(Self {
            mode,
            base_url,
            api_key: overrides.api_key.or(toml.api_key),
            access_token: overrides.access_token.or(toml.access_token),
            bucket: toml.bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            table: toml.table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            owner_id: OwnerId::new(owner_id),
            request_timeout: toml.request_timeout_ms.map(Duration::from_millis),
            log_level: toml
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

/// `TASKBOARD_HOME` when set, otherwise `~/.taskboard`.
pub fn find_taskboard_home() -> io::Result<PathBuf> {
    if let Ok(val) = std::env::var(TASKBOARD_HOME_ENV_VAR)
        && !val.is_empty()
    {
        return Ok(PathBuf::from(val));
    }
    let mut p = home_dir().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "could not find home directory; set TASKBOARD_HOME",
        )
    })?;
    p.push(".taskboard");
    Ok(p)
}

pub fn load_config_toml(home: &Path) -> io::Result<ConfigToml> {
    let path = home.join(CONFIG_TOML_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) => toml::from_str::<ConfigToml>(&contents).map_err(|err| {
            tracing::error!("Failed to parse {}: {err}", path.display());
            io::Error::new(io::ErrorKind::InvalidData, err)
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::info!("{} not found, using defaults", path.display());
            Ok(ConfigToml::default())
        }
        Err(err) => {
            tracing::error!("Failed to read {}: {err}", path.display());
            Err(err)
        }
    }
}

/// Trim trailing '/' and reject anything that is not an absolute http(s) URL.
pub fn normalize_base_url(input: &str) -> anyhow::Result<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let parsed =
        url::Url::parse(trimmed).with_context(|| format!("invalid base_url: {input}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("base_url must be http or https: {input}");
    }
    Ok(trimmed.to_string())
}
