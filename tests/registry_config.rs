// tests/registry_config.rs
//
// Registry document loading, validation, atomic rewrite, and env-based paths.

use std::env;
use std::fs;

use serial_test::serial;

use news_curator::registry::{SourceDescriptor, SourceRegistry};
use news_curator::store::{Paths, DEFAULT_SOURCES_PATH, ENV_HISTORY_PATH, ENV_SOURCES_PATH};

const MINIMAL: &str = r#"
[selection]
lookback_hours = 48
max_articles = 12
max_per_source = 3
"#;

#[test]
fn defaults_fill_everything_but_selection() {
    let reg = SourceRegistry::from_toml_str(MINIMAL).unwrap();
    let cfg = reg.config();
    assert_eq!(cfg.lookback_hours, 48);
    assert_eq!(cfg.keyword_score_cap, 5);
    assert_eq!(cfg.max_fail_count, 3);
    assert_eq!(cfg.per_language_cap, 8);
    assert_eq!(reg.maintenance().auto_discover_languages, vec!["en", "ja", "zh"]);
    assert!(reg.feeds().is_empty());
    assert!(reg.keywords().is_empty());
}

#[test]
fn invalid_documents_are_rejected() {
    assert!(SourceRegistry::from_toml_str("keywords = []").is_err(), "selection is required");
    assert!(SourceRegistry::from_toml_str(&MINIMAL.replace("max_articles = 12", "max_articles = 0")).is_err());

    let dup = format!(
        "{MINIMAL}\n[[feeds]]\nname = \"A\"\nurl = \"https://a.test/rss\"\n[[feeds]]\nname = \"B\"\nurl = \"https://a.test/rss\"\n"
    );
    assert!(SourceRegistry::from_toml_str(&dup).is_err());

    let negative = format!("{MINIMAL}\n[[feeds]]\nname = \"A\"\nurl = \"https://a.test/rss\"\nweight = -1.0\n");
    assert!(SourceRegistry::from_toml_str(&negative).is_err());

    let not_http = format!("{MINIMAL}\n[[feeds]]\nname = \"A\"\nurl = \"file:///etc/passwd\"\n");
    assert!(SourceRegistry::from_toml_str(&not_http).is_err());
}

#[test]
fn missing_registry_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SourceRegistry::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(format!("{err:#}").contains("absent.toml"));
}

#[test]
fn commit_round_trips_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sources.toml");
    fs::write(&path, MINIMAL).unwrap();

    let mut reg = SourceRegistry::load(&path).unwrap();
    assert!(reg.push(SourceDescriptor::new("Ars", "https://ars.test/rss", "en", 1.1)));
    assert!(!reg.push(SourceDescriptor::new("Ars again", "https://ars.test/rss", "en", 1.0)));
    reg.commit().unwrap();

    let again = SourceRegistry::load(&path).unwrap();
    assert_eq!(again.document(), reg.document());

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["sources.toml"]);

    // fixed key order: keywords, selection, maintenance, search, feeds
    let text = fs::read_to_string(&path).unwrap();
    let pos = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("{needle} missing"));
    assert!(pos("[selection]") < pos("[maintenance]"));
    assert!(pos("[maintenance]") < pos("[search]"));
    assert!(pos("[search]") < pos("[[feeds]]"));
}

#[test]
#[serial]
fn paths_follow_env_overrides() {
    env::set_var(ENV_SOURCES_PATH, "/tmp/curator/sources.toml");
    env::set_var(ENV_HISTORY_PATH, "  ");
    let paths = Paths::from_env();
    env::remove_var(ENV_SOURCES_PATH);
    env::remove_var(ENV_HISTORY_PATH);

    assert_eq!(paths.sources.to_str(), Some("/tmp/curator/sources.toml"));
    assert_eq!(paths.history.to_str(), Some("state/seen_urls.txt"));

    let paths = Paths::from_env();
    assert_eq!(paths.sources.to_str(), Some(DEFAULT_SOURCES_PATH));
}
