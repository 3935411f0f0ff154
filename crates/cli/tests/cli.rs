use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("bookshelf")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for subcommand in ["serve", "migrate", "seed"] {
        assert!(stdout.contains(subcommand), "missing {subcommand} in:\n{stdout}");
    }
}

#[test]
fn migrate_and_seed_create_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cli.db");
    let url = format!("sqlite://{}", db_path.display());

    for subcommand in ["migrate", "seed", "seed"] {
        Command::cargo_bin("bookshelf")
            .unwrap()
            .current_dir(dir.path())
            .env("BOOKSHELF_DATABASE__URL", &url)
            .env("BOOKSHELF_CONFIG_DIR", dir.path())
            .arg(subcommand)
            .assert()
            .success();
    }

    assert!(db_path.exists());
}

#[test]
fn unknown_environment_fails() {
    Command::cargo_bin("bookshelf")
        .unwrap()
        .env("BOOKSHELF_ENV", "qa")
        .arg("migrate")
        .assert()
        .failure();
}
