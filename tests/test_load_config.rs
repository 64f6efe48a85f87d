use fleet_publish::load_config::{load_config, PORTAL_PASSWORD_VAR, SFTP_PASSWORD_VAR};
use fleet_publish::select::Freshness;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
sftp:
  host: sftp.example.gov
  port: 2222
  username: fleet
  known_hosts: /etc/fleet/known_hosts
  remote_dir: outgoing
portal:
  url: https://example.maps.arcgis.com
  username: publisher
  feature_service_name: FleetVehicles
  sd_item_id: 0123456789abcdef
  features_item_id: fedcba9876543210
staging:
  scratch_dir: ./tmp/scratch
selection:
  freshness_days: 3
retry:
  max_retries: 2
  backoff_unit_secs: 5
"#;

const MINIMAL_CONFIG: &str = r#"
sftp:
  host: sftp.example.gov
  username: fleet
  known_hosts: /etc/fleet/known_hosts
portal:
  username: publisher
  feature_service_name: FleetVehicles
  sd_item_id: sd1
  features_item_id: fs1
staging:
  scratch_dir: ./tmp/scratch
"#;

fn config_file(contents: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), contents).unwrap();
    file
}

fn set_secrets() {
    env::set_var(SFTP_PASSWORD_VAR, "sftp-secret");
    env::set_var(PORTAL_PASSWORD_VAR, "portal-secret");
}

#[test]
#[serial]
fn full_config_loads_with_env_secrets() {
    set_secrets();
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.sftp.host, "sftp.example.gov");
    assert_eq!(config.sftp.port, 2222);
    assert_eq!(config.sftp.remote_dir, "outgoing");
    assert_eq!(config.sftp.password.expose(), "sftp-secret");
    assert_eq!(config.portal.url, "https://example.maps.arcgis.com");
    assert_eq!(config.portal.password.expose(), "portal-secret");
    assert_eq!(config.staging.scratch_dir, PathBuf::from("./tmp/scratch"));
    assert_eq!(config.selection.freshness(), Freshness::WithinDays(3));
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.retry.backoff_unit_secs, 5);
}

#[test]
#[serial]
fn minimal_config_gets_defaults() {
    set_secrets();
    let file = config_file(MINIMAL_CONFIG);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.sftp.port, 22);
    assert_eq!(config.sftp.remote_dir, "upload");
    assert_eq!(config.portal.url, "https://www.arcgis.com");
    assert_eq!(
        config.portal.description_prefix,
        "Vehicle location data obtained from Fleet"
    );
    assert_eq!(config.selection.freshness_days, 7);
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.backoff_unit_secs, 1);
}

#[test]
#[serial]
fn negative_freshness_disables_the_window() {
    set_secrets();
    let yaml = format!("{MINIMAL_CONFIG}selection:\n  freshness_days: -1\n");
    let file = config_file(&yaml);
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.selection.freshness(), Freshness::Unlimited);
}

#[test]
#[serial]
fn missing_portal_password_fails() {
    set_secrets();
    env::remove_var(PORTAL_PASSWORD_VAR);
    let file = config_file(MINIMAL_CONFIG);

    let err = load_config(file.path()).unwrap_err();
    assert!(
        err.to_string().contains(PORTAL_PASSWORD_VAR),
        "error should name the variable, got: {err}"
    );
}

#[test]
#[serial]
fn secrets_are_not_in_debug_output() {
    set_secrets();
    let file = config_file(MINIMAL_CONFIG);
    let config = load_config(file.path()).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("sftp-secret"));
    assert!(!debug.contains("portal-secret"));
}

#[test]
#[serial]
fn invalid_yaml_reports_parse_error() {
    set_secrets();
    let file = config_file("not-yaml: [:::");
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn missing_file_reports_read_error() {
    set_secrets();
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
