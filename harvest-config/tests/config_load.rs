use harvest_config::HarvestConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

fn write_file(tmp: &TempDir, name: &str, contents: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, contents).expect("write config file");
    p
}

const CREDENTIALS: [(&str, Option<&str>); 3] = [
    ("TWITTER_BEARER_TOKEN", Some("bearer-from-env")),
    ("SUPABASE_URL", Some("https://demo.supabase.co")),
    ("SUPABASE_ANON_KEY", Some("anon-from-env")),
];

#[test]
#[serial]
fn defaults_resolve_credentials_from_environment() {
    temp_env::with_vars(CREDENTIALS, || {
        let cfg = HarvestConfigLoader::new().load().expect("load defaults");
        cfg.validate().expect("credentials present");

        assert_eq!(cfg.twitter.bearer_token, "bearer-from-env");
        assert_eq!(cfg.twitter.base_url, "https://api.twitter.com");
        assert_eq!(cfg.storage.url, "https://demo.supabase.co");
        assert_eq!(cfg.storage.anon_key, "anon-from-env");
        assert_eq!(cfg.storage.table, "tweets_nosql");
        assert!(cfg.export.enabled);
        assert_eq!(cfg.http.timeout_secs, 15);
        assert!(cfg.run.is_none());
    });
}

#[test]
#[serial]
fn missing_credentials_fail_validation() {
    temp_env::with_vars(
        [
            ("TWITTER_BEARER_TOKEN", None::<&str>),
            ("SUPABASE_URL", Some("https://demo.supabase.co")),
            ("SUPABASE_ANON_KEY", Some("anon")),
        ],
        || {
            let cfg = HarvestConfigLoader::new().load().expect("load defaults");
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("TWITTER_BEARER_TOKEN"));
        },
    );
}

#[test]
#[serial]
fn file_then_environment_precedence() {
    let tmp = TempDir::new().unwrap();
    let p = write_file(
        &tmp,
        "harvest.yaml",
        r#"
storage:
  table: "from_file"
export:
  path: "out/file.csv"
run:
  accounts: ["rafalejov", "other"]
  max_tweets: 20
  start_date: "2025-03-20"
  end_date: "2025-03-21"
"#,
    );

    let mut vars: Vec<(&str, Option<&str>)> = CREDENTIALS.to_vec();
    vars.push(("HARVEST__STORAGE__TABLE", Some("from_env")));
    vars.push(("HARVEST__RUN__MAX_TWEETS", Some("7")));

    temp_env::with_vars(vars, || {
        let cfg = HarvestConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load file + env");

        assert_eq!(cfg.storage.table, "from_env");
        assert_eq!(cfg.export.path, PathBuf::from("out/file.csv"));
        let run = cfg.run.expect("run section");
        assert_eq!(run.max_tweets, Some(7));
        assert_eq!(
            run.accounts,
            Some(vec!["rafalejov".to_string(), "other".to_string()])
        );
        assert_eq!(run.start_date.as_deref(), Some("2025-03-20"));
    });
}

#[test]
#[serial]
fn optional_file_may_be_absent() {
    temp_env::with_vars(CREDENTIALS, || {
        let cfg = HarvestConfigLoader::new()
            .with_optional_file("definitely-not-here.yaml")
            .load()
            .expect("missing optional file is fine");
        assert_eq!(cfg.storage.table, "tweets_nosql");
    });
}

#[test]
#[serial]
fn required_file_must_exist() {
    let result = HarvestConfigLoader::new()
        .with_file("definitely-not-here.yaml")
        .load();
    assert!(result.is_err());
}
