// tests/integration.rs
use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

#[test]
fn test_cli_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.arg("--help");
    cmd.assert().success();
    Ok(())
}

#[test]
fn test_cli_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("v0.1.0"));
    Ok(())
}

#[test]
fn test_cli_list_no_backups() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = assert_fs::TempDir::new()?;

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args(["--dir", temp_dir.path().to_str().unwrap(), "list"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("No backups found!"));
    Ok(())
}

#[test]
fn test_cli_backup_empty_dir_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = assert_fs::TempDir::new()?;

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args([
        "--dir",
        temp_dir.path().to_str().unwrap(),
        "backup",
        "--comment",
        "v1",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("no files to backup"));

    // Архив не создан
    let store = temp_dir.child("user_backup");
    let zips: Vec<_> = std::fs::read_dir(store.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".zip"))
        .collect();
    assert!(zips.is_empty());
    Ok(())
}

#[test]
fn test_cli_ignore_add_and_show() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = assert_fs::TempDir::new()?;
    let dir = temp_dir.path().to_str().unwrap().to_string();

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args(["--dir", &dir, "ignore", "add", "/core"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("added to ignore list"));

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args(["--dir", &dir, "ignore", "add-size", "50MB"]);
    cmd.assert().success();

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args(["--dir", &dir, "ignore", "show"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("/core").and(predicates::str::contains("50MB")));

    // Файл правил отсортирован, по одному правилу на строку
    temp_dir
        .child("user_backup/ignored_items.log")
        .assert(predicates::str::contains("/core\n50MB\n"));
    Ok(())
}

#[test]
fn test_cli_ignore_rejects_bad_size() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = assert_fs::TempDir::new()?;

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args([
        "--dir",
        temp_dir.path().to_str().unwrap(),
        "ignore",
        "add-size",
        "lots",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("invalid size limit format"));
    Ok(())
}

#[test]
fn test_cli_store_flag_overrides_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = assert_fs::TempDir::new()?;
    temp_dir.child("data.txt").write_str("payload")?;

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args([
        "--dir",
        temp_dir.path().to_str().unwrap(),
        "--store",
        "snapshots",
        "backup",
        "--comment",
        "v1",
    ]);
    cmd.assert().success();

    temp_dir
        .child("snapshots/01__v1.zip")
        .assert(predicate::path::exists());
    Ok(())
}

#[test]
fn test_cli_custom_store_dir_from_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = assert_fs::TempDir::new()?;
    temp_dir
        .child("arkhiv.toml")
        .write_str("store_dir = \"vault\"\n")?;
    temp_dir.child("data.txt").write_str("payload")?;

    let mut cmd = Command::cargo_bin("arkhiv")?;
    cmd.args([
        "--dir",
        temp_dir.path().to_str().unwrap(),
        "backup",
        "--comment",
        "v1",
    ]);
    cmd.assert().success();

    temp_dir
        .child("vault/01__v1.zip")
        .assert(predicate::path::exists());
    Ok(())
}
