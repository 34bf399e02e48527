use predicates::prelude::*;

#[test]
fn help_lists_the_subcommands() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("higbook");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("markdown"));
}

#[test]
fn missing_taxonomy_file_fails_before_launching_a_browser() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("higbook");
    cmd.env("RUST_LOG", "debug")
        .args(["discover", "--taxonomy"])
        .arg(dir.path().join("missing.yaml"))
        .arg("--out")
        .arg(dir.path().join("tree.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"))
        .stderr(predicate::str::contains("missing.yaml"));
    assert!(!dir.path().join("tree.yaml").exists());
}

#[test]
fn non_http_url_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("higbook");
    cmd.args(["discover", "--url", "ftp://example.com/", "--out"])
        .arg(dir.path().join("tree.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("http/https"));
}

#[test]
fn json_log_format_emits_json_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("higbook");
    cmd.env("RUST_LOG", "debug")
        .args(["--log-format", "json", "discover", "--taxonomy"])
        .arg(dir.path().join("missing.yaml"))
        .arg("--out")
        .arg(dir.path().join("tree.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""message":"parsed cli""#));
}
