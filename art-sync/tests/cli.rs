//! End-to-end CLI tests over the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;

const LOCATION_VARS: [&str; 3] = [
    "LOCATION_LATITUDE",
    "LOCATION_LONGITUDE",
    "LOCATION_TIMEZONE",
];

fn art_sync() -> Command {
    let mut cmd = Command::cargo_bin("art-sync").expect("binary builds");
    // Isolate from any ambient configuration on the host.
    for var in LOCATION_VARS {
        cmd.env_remove(var);
    }
    for var in [
        "TV_IPS",
        "BRIGHTNESS",
        "BRIGHTNESS_MIN",
        "BRIGHTNESS_MAX",
        "SOLAR_BRIGHTNESS_ENABLED",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_lists_both_subcommands() {
    art_sync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("solar-preview"));
}

#[test]
fn solar_preview_prints_all_three_dates() {
    art_sync()
        .arg("solar-preview")
        .env("LOCATION_LATITUDE", "42.3601")
        .env("LOCATION_LONGITUDE", "-71.0589")
        .env("LOCATION_TIMEZONE", "America/New_York")
        .assert()
        .success()
        .stdout(predicate::str::contains("March Equinox"))
        .stdout(predicate::str::contains("June Solstice"))
        .stdout(predicate::str::contains("December Solstice"))
        .stdout(predicate::str::contains("Kasten-Young"));
}

#[test]
fn solar_preview_without_location_explains_what_to_set() {
    art_sync()
        .arg("solar-preview")
        .assert()
        .failure()
        .stdout(predicate::str::contains("LOCATION_LATITUDE"))
        .stderr(predicate::str::contains("solar preview unavailable"));
}

#[test]
fn sync_refuses_to_start_without_devices() {
    art_sync()
        .args(["sync", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TV_IPS"));
}

#[test]
fn sync_refuses_an_inverted_brightness_range() {
    art_sync()
        .args(["sync", "--once"])
        .env("TV_IPS", "203.0.113.10")
        .env("SOLAR_BRIGHTNESS_ENABLED", "true")
        .env("LOCATION_LATITUDE", "42.3601")
        .env("LOCATION_LONGITUDE", "-71.0589")
        .env("LOCATION_TIMEZONE", "America/New_York")
        .env("BRIGHTNESS_MIN", "10")
        .env("BRIGHTNESS_MAX", "2")
        .assert()
        .failure()
        .stderr(predicate::str::contains("strictly below"));
}
