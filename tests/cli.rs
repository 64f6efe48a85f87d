use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::tempdir;

#[test]
fn latest_prints_newest_file_and_date() {
    let dir = tempdir().unwrap();
    for name in [
        "vehicle_data_20230101.csv",
        "vehicle_data_20230115.csv",
        "vehicle_data_20230110.csv",
    ] {
        write(dir.path().join(name), "LONGITUDE,LATITUDE\n").unwrap();
    }

    let mut cmd = Command::cargo_bin("fleet-publish").expect("Binary exists");
    cmd.arg("latest").arg("--dir").arg(dir.path());

    cmd.assert().success().stdout(
        predicate::str::contains("vehicle_data_20230115.csv")
            .and(predicate::str::contains("2023-01-15")),
    );
}

#[test]
fn latest_fails_on_stale_file_within_window() {
    let dir = tempdir().unwrap();
    write(dir.path().join("vehicle_data_20000101.csv"), "LONGITUDE,LATITUDE\n").unwrap();

    let mut cmd = Command::cargo_bin("fleet-publish").expect("Binary exists");
    cmd.arg("latest")
        .arg("--dir")
        .arg(dir.path())
        .arg("--freshness-days")
        .arg("7");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not within 7 days"));
}

#[test]
fn latest_fails_without_candidates() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("fleet-publish").expect("Binary exists");
    cmd.arg("latest").arg("--dir").arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("vehicle_data_*.csv"));
}

#[test]
fn publish_with_missing_config_exits_nonzero() {
    let mut cmd = Command::cargo_bin("fleet-publish").expect("Binary exists");
    cmd.arg("publish")
        .arg("--config")
        .arg("/definitely/not/here.yaml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[tokio::test]
async fn run_announces_tracing_before_doing_work() {
    use fleet_publish::cli::{run, Cli, Commands};
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};

    #[derive(Clone, Default)]
    struct Messages(Arc<Mutex<Vec<String>>>);

    impl Visit for Messages {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0.lock().unwrap().push(format!("{value:?}"));
            }
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Messages {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            event.record(&mut self.clone());
        }
    }

    let messages = Messages::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(messages.clone()));

    let cli = Cli {
        command: Commands::Latest {
            dir: std::path::PathBuf::from("does-not-exist"),
            freshness_days: 0,
        },
    };
    assert!(run(cli).await.is_err());

    let seen = messages.0.lock().unwrap();
    assert_eq!(seen.first().map(String::as_str), Some("trace_initialised"));
}
