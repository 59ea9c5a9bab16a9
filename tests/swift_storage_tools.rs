// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::predicate;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const SEEDED_LEDGER: &str = r#"{"vdb@env1": {"blkid": "808bc298", "status": "active"}}"#;

// Write a ledger database laid out like the charm helpers' unit data store,
// with the ledger JSON encoded under the devices key.
fn seed_ledger(path: &Path, ledger: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute(
        "create table if not exists kv (key text, data text, primary key (key))",
        [],
    )?;
    conn.execute(
        "insert into kv (key, data) values ('devices', ?1)",
        [serde_json::to_string(ledger)?],
    )?;
    Ok(())
}

fn tools() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("swift-storage-tools")?;
    cmd.env_remove("RUST_LOG")
        .env_remove("JUJU_ENV_UUID")
        .env_remove("JUJU_MODEL_UUID")
        .env_remove("JUJU_UNIT_NAME");
    Ok(cmd)
}

// swift-storage-tools parser tests

#[test]
// Test swift-storage-tools -V produces version string.
fn test_swift_storage_tools_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tools()?;
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(VERSION));
    Ok(())
}

#[test]
// Test swift-storage-tools when no subcommand is given.
fn test_swift_storage_tools_no_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tools()?;
    cmd.assert().failure().code(2);
    Ok(())
}

#[test]
// Test that swift-storage-tools rejects an unknown subcommand.
fn test_swift_storage_tools_bad_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tools()?;
    cmd.arg("notasub");
    cmd.assert().failure().code(2);
    Ok(())
}

#[test]
// Test that swift-storage-tools recognizes a good subcommand.
fn test_swift_storage_tools_good_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tools()?;
    cmd.arg("swift-storage-in-ring").arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--skip-relation-check"));
    Ok(())
}

#[test]
// Test that a missing mandatory argument is a usage error.
fn test_in_ring_requires_device() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tools()?;
    cmd.arg("swift-storage-in-ring");
    cmd.assert().failure().code(2);
    Ok(())
}

// swift-storage-ledger tests

#[test]
// Test that a ledger that was never written prints as empty.
fn test_ledger_missing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-ledger")
        .arg("--ledger")
        .arg(dir.path().join("swift_storage").join("kv.db"));
    cmd.assert()
        .success()
        .stdout(predicate::str::diff("{}\n"));
    Ok(())
}

#[test]
// Test that the ledger is printed with its records.
fn test_ledger_contents() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let ledger = dir.path().join("kv.db");
    seed_ledger(&ledger, SEEDED_LEDGER)?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-ledger").arg("--ledger").arg(&ledger);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("vdb@env1"))
        .stdout(predicate::str::contains("808bc298"))
        .stdout(predicate::str::contains("active"));
    Ok(())
}

#[test]
// Test that a corrupt ledger is an error, never an empty ledger.
fn test_ledger_corrupt() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let ledger = dir.path().join("kv.db");
    seed_ledger(&ledger, r#"{"vdb@env1": "#)?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-ledger").arg("--ledger").arg(&ledger);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error encountered"));
    Ok(())
}

// swift-storage-remember and swift-storage-in-ring tests

#[test]
// Test that a file which is not a database is an error.
fn test_ledger_not_a_database() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let ledger = dir.path().join("kv.db");
    fs::write(&ledger, r#"{"devices": "{}"}"#.repeat(64))?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-ledger").arg("--ledger").arg(&ledger);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unreadable or corrupt"));
    Ok(())
}

#[test]
// Test that remembering a device adds a record under the deployment.
fn test_remember() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let ledger = dir.path().join("swift_storage").join("kv.db");

    let mut cmd = tools()?;
    cmd.arg("swift-storage-remember")
        .arg("--ledger")
        .arg(&ledger)
        .arg("--deployment-id")
        .arg("env1")
        .arg("swift-storage-test-absent");
    cmd.assert().success();

    let mut cmd = tools()?;
    cmd.arg("swift-storage-ledger").arg("--ledger").arg(&ledger);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("swift-storage-test-absent@env1"))
        .stdout(predicate::str::contains("active"));
    Ok(())
}

#[test]
// Test that a device with unknown identity is never reported as in the ring.
fn test_in_ring_unknown_identity() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let ledger = dir.path().join("kv.db");
    seed_ledger(&ledger, SEEDED_LEDGER)?;

    let mut cmd = tools()?;
    cmd.arg("swift-storage-in-ring")
        .arg("--ledger")
        .arg(&ledger)
        .arg("--deployment-id")
        .arg("env1")
        .arg("--skip-relation-check")
        .arg("swift-storage-test-absent");
    cmd.assert().success().stdout(predicate::str::diff("false\n"));
    Ok(())
}

#[test]
// Test that a missing deployment identity is an error.
fn test_in_ring_no_deployment() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-in-ring")
        .arg("--ledger")
        .arg(dir.path().join("kv.db"))
        .arg("--skip-relation-check")
        .arg("vdb");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("JUJU_MODEL_UUID"));
    Ok(())
}

#[test]
// Test that an invalid device name is rejected.
fn test_remember_bad_device() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-remember")
        .arg("--ledger")
        .arg(dir.path().join("kv.db"))
        .arg("--deployment-id")
        .arg("env1")
        .arg("vdb@env2");
    cmd.assert().failure().code(1);
    Ok(())
}

// swift-storage-devices tests

#[test]
// Test that no devices are selected when block-device is none.
fn test_devices_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"block-device": "none", "overwrite": false}"#)?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-devices").arg("--config").arg(&config);
    cmd.assert().success().stdout(predicate::str::is_empty());
    Ok(())
}

#[test]
// Test that entries which are not block devices are dropped.
fn test_devices_drops_non_block_devices() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        format!(
            r#"{{"block-device": "swift-storage-test-absent {}"}}"#,
            config.display()
        ),
    )?;
    let mut cmd = tools()?;
    cmd.arg("swift-storage-devices").arg("--config").arg(&config);
    cmd.assert().success().stdout(predicate::str::is_empty());
    Ok(())
}
