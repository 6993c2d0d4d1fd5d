use harvest_common::observability::{LogConfig, LogFormat, init_logging};
use harvest_common::{HarvestError, Result};
use harvest_config::{
    HarvestConfig, HarvestConfigLoader, HttpConfig, LoggingConfig, RunOverrides,
};
use harvest_http::HttpClient;
use harvest_pipeline::RunParams;
use harvest_social::TwitterApi;
use harvest_store::{SupabaseStore, supabase::rest_base};
use std::time::Duration;

const ACCOUNTS: &[&str] = &["rafalejov"];
const MAX_TWEETS: i64 = 5;
const START_DATE: &str = "2025-03-20";
const END_DATE: &str = "2025-03-21";
const CONFIG_FILE: &str = "harvest.yaml";

/// Both external clients, built once per run.
pub struct Clients {
    pub social: TwitterApi,
    pub store: SupabaseStore,
}

/// Defaults, then `harvest.yaml` if present, then `HARVEST__*` variables.
pub fn load_config() -> Result<HarvestConfig> {
    HarvestConfigLoader::new()
        .with_optional_file(CONFIG_FILE)
        .load()
        .map_err(|e| HarvestError::Config(e.to_string()))
}

/// Errors escaping a run are logged once here; the exit status stays 0.
pub fn finish(outcome: anyhow::Result<()>) -> anyhow::Result<()> {
    let Err(err) = outcome else {
        return Ok(());
    };
    // No-op when the run already installed its own subscriber
    if let Err(log_err) = init_logging(LogConfig::default()) {
        eprintln!("harvest: logging unavailable: {log_err:#}");
        eprintln!("harvest: run aborted: {err:#}");
    }
    tracing::error!(error = %format!("{err:#}"), "run aborted: {err:#}");
    Ok(())
}

pub fn log_config(cfg: &LoggingConfig) -> Result<LogConfig> {
    let format: LogFormat = cfg.format.parse().map_err(HarvestError::Config)?;
    Ok(LogConfig {
        log_dir: cfg.dir.clone(),
        emit_stderr: cfg.stderr,
        format,
        default_filter: match cfg.filter.trim() {
            "" => "info".to_string(),
            filter => filter.to_string(),
        },
        ..LogConfig::default()
    })
}

fn http_client(base: &str, http: &HttpConfig) -> Result<HttpClient> {
    let client = HttpClient::new(base).map_err(|e| HarvestError::Client(e.into()))?;
    Ok(client
        .with_timeout(Duration::from_secs(http.timeout_secs))
        .with_retries(http.max_retries))
}

pub fn build_clients(cfg: &HarvestConfig) -> Result<Clients> {
    let social = TwitterApi::from_http(
        http_client(&cfg.twitter.base_url, &cfg.http)?,
        cfg.twitter.bearer_token.clone(),
    );
    let store = SupabaseStore::from_http(
        http_client(&rest_base(&cfg.storage.url), &cfg.http)?,
        cfg.storage.anon_key.clone(),
    );
    Ok(Clients { social, store })
}

/// The literal run, with any field from the `run:` section taking precedence.
pub fn run_params(overrides: Option<&RunOverrides>) -> RunParams {
    let mut params = RunParams::new(ACCOUNTS.iter().copied(), MAX_TWEETS, START_DATE, END_DATE);
    let Some(o) = overrides else {
        return params;
    };
    if let Some(accounts) = &o.accounts {
        params.accounts = accounts.clone();
    }
    if let Some(max) = o.max_tweets {
        params.max_tweets = Some(i64::from(max));
    }
    if let Some(start) = &o.start_date {
        params.start_date = Some(start.clone());
    }
    if let Some(end) = &o.end_date {
        params.end_date = Some(end.clone());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CREDENTIALS: [(&str, Option<&str>); 3] = [
        ("TWITTER_BEARER_TOKEN", None),
        ("SUPABASE_URL", None),
        ("SUPABASE_ANON_KEY", None),
    ];

    #[test]
    #[serial]
    fn dotenv_file_supplies_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(
            &env_file,
            "TWITTER_BEARER_TOKEN=bearer-from-file\n\
             SUPABASE_URL=https://demo.supabase.co\n\
             SUPABASE_ANON_KEY=anon-from-file\n",
        )
        .unwrap();

        temp_env::with_vars(CREDENTIALS, || {
            assert!(load_config().unwrap().validate().is_err());

            dotenv::from_path(&env_file).unwrap();
            let cfg = load_config().unwrap();
            cfg.validate().expect("credentials from .env");
            assert_eq!(cfg.twitter.bearer_token, "bearer-from-file");
            assert_eq!(cfg.storage.anon_key, "anon-from-file");
        });
    }

    #[test]
    #[serial]
    fn dotenv_does_not_override_exported_variables() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "TWITTER_BEARER_TOKEN=bearer-from-file\n").unwrap();

        temp_env::with_var("TWITTER_BEARER_TOKEN", Some("bearer-from-shell"), || {
            dotenv::from_path(&env_file).unwrap();
            assert_eq!(
                std::env::var("TWITTER_BEARER_TOKEN").as_deref(),
                Ok("bearer-from-shell")
            );
        });
    }

    #[test]
    #[serial]
    fn startup_failure_is_logged_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();
        temp_env::with_vars([("HARVEST_LOG_DIR", Some(log_dir))], || {
            let failure = anyhow::Error::new(HarvestError::Config(
                "storage.url is not set".into(),
            ));
            assert!(finish(Err(failure)).is_ok());
            assert!(finish(Ok(())).is_ok());
        });
        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 1, "fallback logging should open one daily file");
    }

    #[test]
    fn literal_run_without_overrides() {
        let params = run_params(None);
        assert_eq!(params.accounts, vec!["rafalejov"]);
        assert_eq!(params.max_tweets, Some(5));
        assert_eq!(params.start_date.as_deref(), Some("2025-03-20"));
        assert_eq!(params.end_date.as_deref(), Some("2025-03-21"));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = RunOverrides {
            accounts: Some(vec!["userA".into(), "userB".into()]),
            max_tweets: Some(20),
            ..RunOverrides::default()
        };
        let params = run_params(Some(&overrides));
        assert_eq!(params.accounts, vec!["userA", "userB"]);
        assert_eq!(params.max_tweets, Some(20));
        assert_eq!(params.start_date.as_deref(), Some("2025-03-20"));
    }

    #[test]
    fn empty_account_override_is_left_to_validation() {
        let overrides = RunOverrides {
            accounts: Some(vec![]),
            ..RunOverrides::default()
        };
        assert!(run_params(Some(&overrides)).validate().is_err());
    }

    #[test]
    fn log_config_rejects_unknown_format() {
        let cfg = LoggingConfig {
            format: "xml".into(),
            filter: "info".into(),
            stderr: true,
            dir: None,
        };
        assert!(matches!(log_config(&cfg), Err(HarvestError::Config(_))));
    }
}
