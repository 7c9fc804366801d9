//! ---
//! refdata_section: "01-core-functionality"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Configuration loading tests."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use refdata_common::{AppConfig, LogFormat};

const SAMPLE: &str = r#"
[database]
path = "data/refdata.db"
max_connections = 4

[api]
listen = "127.0.0.1:18080"
default_page_size = 50
max_page_size = 500

[logging]
directory = "logs"
format = "pretty"

[right_assignments]
generate_on_startup = true
regenerate_on_change = false

[auth]
token_ttl = 3600
"#;

#[test]
fn parses_full_document() {
    let config: AppConfig = SAMPLE.parse().expect("sample parses");
    assert_eq!(config.database.max_connections, 4);
    assert!(config.database.auto_migrate);
    assert_eq!(config.api.listen.port(), 18080);
    assert_eq!(config.api.default_page_size, 50);
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert!(config.right_assignments.generate_on_startup);
    assert!(!config.right_assignments.regenerate_on_change);
    assert_eq!(config.auth.token_ttl, Some(Duration::from_secs(3600)));
    assert!(config.audit.enabled);
}

#[test]
fn rejects_page_size_above_maximum() {
    let err = "[api]\ndefault_page_size = 100\nmax_page_size = 10\n"
        .parse::<AppConfig>()
        .expect_err("invalid page sizes");
    assert!(err.to_string().contains("max_page_size"));
}

#[test]
fn rejects_zero_connections() {
    let err = "[database]\nmax_connections = 0\n"
        .parse::<AppConfig>()
        .expect_err("zero connections");
    assert!(err.to_string().contains("max_connections"));
}

#[test]
fn loads_first_existing_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("refdata.toml");
    fs::write(&present, SAMPLE).unwrap();

    let loaded = AppConfig::load_with_source(&[&missing, &present]).expect("config loads");
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.api.max_page_size, 500);
}

#[test]
fn reports_inspected_paths_when_nothing_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = AppConfig::load_with_source(&[&missing]).expect_err("nothing to load");
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn shipped_configs_parse() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs");
    for name in ["refdata.toml", "refdata.dev.toml"] {
        let contents = fs::read_to_string(root.join(name)).unwrap();
        let config: AppConfig = contents
            .parse()
            .unwrap_or_else(|err| panic!("{name}: {err:#}"));
        assert!(config.api.enabled, "{name}");
    }
}
