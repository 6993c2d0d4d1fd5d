//! Loader for harvest configuration: built-in YAML defaults, optional config
//! files, then `HARVEST__`-prefixed environment overrides.
//!
//! String values are run through `${VAR}` expansion after merging, which is how
//! the credentials reach the config: the defaults point at
//! `${TWITTER_BEARER_TOKEN}`, `${SUPABASE_URL}` and `${SUPABASE_ANON_KEY}`.
//! Later sources win, so `HARVEST__STORAGE__TABLE=tweets_test` overrides both
//! the defaults and any file.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

const DEFAULTS_YAML: &str = r#"
twitter:
  bearer_token: "${TWITTER_BEARER_TOKEN}"
  base_url: "https://api.twitter.com"
storage:
  url: "${SUPABASE_URL}"
  anon_key: "${SUPABASE_ANON_KEY}"
  table: "tweets_nosql"
export:
  enabled: true
  path: "tweets.csv"
http:
  timeout_secs: 15
  max_retries: 0
logging:
  format: "text"
  filter: "info"
  stderr: true
"#;

#[derive(Debug, Deserialize)]
pub struct HarvestConfig {
    pub twitter: TwitterConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    /// Overrides for the run parameters baked into the binary.
    #[serde(default)]
    pub run: Option<RunOverrides>,
}

#[derive(Deserialize)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub base_url: String,
}

#[derive(Deserialize)]
pub struct StorageConfig {
    pub url: String,
    pub anon_key: String,
    pub table: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub format: String,
    pub filter: String,
    pub stderr: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunOverrides {
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub max_tweets: Option<u32>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("bearer_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("table", &self.table)
            .finish()
    }
}

impl HarvestConfig {
    /// Reject credentials that are empty or whose `${VAR}` never resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("twitter.bearer_token", &self.twitter.bearer_token)?;
        require("twitter.base_url", &self.twitter.base_url)?;
        require("storage.url", &self.storage.url)?;
        require("storage.anon_key", &self.storage.anon_key)?;
        require("storage.table", &self.storage.table)?;
        Ok(())
    }
}

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Message(format!("{key} is empty")));
    }
    if let Some(start) = trimmed.find("${") {
        let var = trimmed[start + 2..].split('}').next().unwrap_or_default();
        return Err(ConfigError::Message(format!(
            "{key} is not set: environment variable {var} is missing"
        )));
    }
    Ok(())
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

enum Source {
    File { path: PathBuf, required: bool },
    Yaml(String),
}

/// Builder that hides the `config` crate wiring.
pub struct HarvestConfigLoader {
    sources: Vec<Source>,
}

impl Default for HarvestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestConfigLoader {
    /// Start from the built-in defaults; environment overrides are applied last.
    ///
    /// ```
    /// use harvest_config::HarvestConfigLoader;
    ///
    /// let cfg = HarvestConfigLoader::new()
    ///     .with_yaml_str("storage:\n  table: tweets_archive")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.storage.table, "tweets_archive");
    /// assert_eq!(cfg.export.path.to_str(), Some("tweets.csv"));
    /// assert_eq!(cfg.http.max_retries, 0);
    /// ```
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(Source::File {
            path: path.as_ref().to_path_buf(),
            required: true,
        });
        self
    }

    /// Attach a file that is skipped when missing, so env-only runs still work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(Source::File {
            path: path.as_ref().to_path_buf(),
            required: false,
        });
        self
    }

    /// Merge an inline YAML snippet (tests, embedded presets).
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.sources.push(Source::Yaml(yaml.to_string()));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    ///
    /// ```
    /// use harvest_config::HarvestConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_BEARER", "from-env"); }
    ///
    /// let cfg = HarvestConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// twitter:
    ///   bearer_token: "${DOC_BEARER}"
    /// run:
    ///   accounts: ["rafalejov"]
    ///   max_tweets: 5
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(cfg.twitter.bearer_token, "from-env");
    /// let run = cfg.run.expect("run section");
    /// assert_eq!(run.accounts.as_deref(), Some(&["rafalejov".to_string()][..]));
    /// assert_eq!(run.max_tweets, Some(5));
    ///
    /// unsafe { std::env::remove_var("DOC_BEARER"); }
    /// ```
    pub fn load(self) -> Result<HarvestConfig, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULTS_YAML, FileFormat::Yaml));
        for source in self.sources {
            builder = match source {
                Source::File { path, required } => {
                    builder.add_source(File::from(path).required(required))
                }
                Source::Yaml(yaml) => builder.add_source(File::from_str(&yaml, FileFormat::Yaml)),
            };
        }
        builder = builder.add_source(
            Environment::with_prefix("HARVEST")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("run.accounts"),
        );

        let mut v: Value = builder.build()?.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
