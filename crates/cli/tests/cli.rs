use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("bookstore")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for subcommand in ["serve", "migrate", "create-user"] {
        assert!(stdout.contains(subcommand), "missing {subcommand}");
    }
}

#[test]
fn create_user_requires_a_username() {
    Command::cargo_bin("bookstore")
        .unwrap()
        .args(["create-user", "--password", "secret"])
        .assert()
        .failure();
}
