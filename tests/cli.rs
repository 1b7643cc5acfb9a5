use std::fs;

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

fn log_archiver() -> Command {
    let mut cmd = Command::cargo_bin("log-archiver").expect("binary builds");
    cmd.env_clear();
    cmd
}

#[test]
fn cli_help_lists_subcommands() {
    log_archiver()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn validate_reports_every_missing_setting() {
    let workdir = tempdir().unwrap();
    log_archiver()
        .current_dir(workdir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SMB_SERVER"))
        .stderr(predicate::str::contains("SMB_SHARE"))
        .stderr(predicate::str::contains("SMB_USERNAME"))
        .stderr(predicate::str::contains("SMB_PASSWORD"))
        .stderr(predicate::str::contains("STORAGE_CONNECTION_STRING"))
        .stderr(predicate::str::contains("BLOB_CONTAINER_NAME"));
}

#[test]
fn validate_accepts_key_vault_mode() {
    let workdir = tempdir().unwrap();
    log_archiver()
        .current_dir(workdir.path())
        .env("KEY_VAULT_URL", "https://logs-vault.vault.azure.net/")
        .env("BLOB_CONTAINER_NAME", "processed-logs")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Configuration OK (key vault mode: https://logs-vault.vault.azure.net/)",
        ));
}

#[test]
fn run_archives_mounted_share_to_blob_endpoint() {
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(PUT)
            .path_matches(regex::Regex::new(r"^/acct/processed-logs/processed_\d{8}_\d{6}_a\.log$").unwrap())
            .header("x-ms-blob-type", "BlockBlob")
            .header_exists("authorization")
            .body("login ok\nlogout\n");
        then.status(201);
    });

    let workdir = tempdir().unwrap();
    let share_dir = workdir.path().join("mnt").join("srv").join("logs");
    fs::create_dir_all(&share_dir).unwrap();
    fs::write(share_dir.join("a.log"), "boot\nlogin ok\nidle\nlogout\n").unwrap();
    fs::write(share_dir.join("b.log"), "nothing to see\n").unwrap();
    fs::write(share_dir.join("c.csv"), "login\n").unwrap();

    let options = workdir.path().join("options.yaml");
    fs::write(
        &options,
        format!(
            "share:\n  mount_root: {}\nstaging_dir: {}\n",
            workdir.path().join("mnt").display(),
            workdir.path().display()
        ),
    )
    .unwrap();

    log_archiver()
        .current_dir(workdir.path())
        .env("SMB_SERVER", "srv")
        .env("SMB_SHARE", "logs")
        .env("SMB_USERNAME", "svc-logs")
        .env("SMB_PASSWORD", "pw")
        .env(
            "STORAGE_CONNECTION_STRING",
            format!(
                "BlobEndpoint={}/acct;AccountName=acct;AccountKey=a2V5",
                server.base_url()
            ),
        )
        .env("BLOB_CONTAINER_NAME", "processed-logs")
        .args(["run", "--config"])
        .arg(&options)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Processing complete. 1 files processed.",
        ));

    upload.assert();
    assert!(!share_dir.join("a.log").exists(), "archived file is deleted");
    assert!(share_dir.join("b.log").exists(), "unmatched file is kept");
    assert!(share_dir.join("c.csv").exists(), "non-log file is ignored");
}

#[test]
fn run_fails_when_share_is_not_mounted() {
    let workdir = tempdir().unwrap();
    let options = workdir.path().join("options.yaml");
    fs::write(
        &options,
        format!("share:\n  mount_root: {}\n", workdir.path().join("absent").display()),
    )
    .unwrap();

    log_archiver()
        .current_dir(workdir.path())
        .env("SMB_SERVER", "srv")
        .env("SMB_SHARE", "logs")
        .env("SMB_USERNAME", "svc-logs")
        .env("SMB_PASSWORD", "pw")
        .env("STORAGE_CONNECTION_STRING", "UseDevelopmentStorage=true")
        .env("BLOB_CONTAINER_NAME", "processed-logs")
        .args(["run", "--config"])
        .arg(&options)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not mounted"));
}
