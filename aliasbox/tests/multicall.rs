use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Setup {
    home: TempDir,
    bin: TempDir,
}

impl Setup {
    fn new(index: &str) -> Setup {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join("commands.idx"), index).unwrap();
        Setup {
            home,
            bin: tempfile::tempdir().unwrap(),
        }
    }

    fn settings(self, yaml: &str) -> Setup {
        fs::write(self.home.path().join("aliasbox.yaml"), yaml).unwrap();
        self
    }

    /// A link to the aliasbox binary named `name`.
    fn link(&self, name: &str) -> PathBuf {
        let link = self.bin.path().join(name);
        if !link.exists() {
            symlink(assert_cmd::cargo::cargo_bin("aliasbox"), &link).unwrap();
        }
        link
    }

    fn run(&self, name: &str, args: &[&str]) -> Output {
        command(&self.link(name), self.home.path())
            .args(args)
            .output()
            .unwrap()
    }
}

fn command(program: &Path, home: &Path) -> Command {
    let mut c = Command::new(program);
    c.env("ALIASBOX_HOME", home).env_remove("ALIASBOX_LOG");
    c
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn runs_command_named_by_link() {
    let setup = Setup::new("ls ls -la\ngreet echo hello\n");
    let output = setup.run("greet", &["world"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello world\n");
}

#[test]
fn arguments_are_not_reparsed_by_a_shell() {
    let setup = Setup::new("greet echo hello\n");
    let output = setup.run("greet", &["$HOME;", "`id`"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello $HOME; `id`\n");
}

#[test]
fn legacy_shell_mode_quotes_arguments() {
    let setup = Setup::new("greet echo hello\n").settings("exec: shell\n");
    let output = setup.run("greet", &["big \"wide\" world"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello big \"wide\" world\n");
}

#[test]
fn undecodable_index_lines_are_skipped_over() {
    let setup = Setup::new("");
    fs::write(
        setup.home.path().join("commands.idx"),
        b"caf\xe9 echo x\ngreet echo hello\n",
    )
    .unwrap();
    let output = setup.run("greet", &["world"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello world\n");
}

#[test]
fn propagates_child_exit_status() {
    let setup = Setup::new("fail sh -c 'exit 42'\n");
    let output = setup.run("fail", &[]);
    assert_eq!(output.status.code(), Some(42));
}

#[test]
fn unknown_command_fails() {
    let setup = Setup::new("greet echo hello\n");
    let output = setup.run("wave", &["hi"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("command not found: wave"));
}

#[test]
fn missing_index_reports_path_and_code() {
    let setup = Setup::new("");
    let home = setup.home.path().join("nowhere");
    let output = command(&setup.link("greet"), &home).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains(&home.join("commands.idx").display().to_string()), "{out}");
    assert!(out.contains("error code 2"), "{out}");
}

#[test]
fn prefix_mode_matches_longer_names() {
    let index = "run2 echo from-run2\n";
    let setup = Setup::new(index);
    assert_eq!(setup.run("run", &[]).status.code(), Some(1));

    let setup = Setup::new(index).settings("match: prefix\n");
    let output = setup.run("run", &["x"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "from-run2 x\n");
}

#[test]
fn unterminated_last_line_follows_settings() {
    let index = "ls ls\ngreet echo hello";
    let setup = Setup::new(index);
    assert_eq!(stdout(&setup.run("greet", &[])), "hello\n");

    let setup = Setup::new(index).settings("trailing_line: drop\n");
    assert_eq!(setup.run("greet", &[]).status.code(), Some(1));
}

#[test]
fn overlong_command_is_not_started() {
    let setup = Setup::new("touch touch\n").settings("max_command_len: 20\n");
    let marker = setup.home.path().join("a-file-with-a-long-name");
    let output = setup.run("touch", &[marker.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("limit is 20"));
    assert!(!marker.exists());
}

#[test]
fn own_name_takes_command_from_first_argument() {
    let setup = Setup::new("greet echo hello\nls ls -la\n");
    let output = setup.run("aliasbox", &["greet", "world"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello world\n");

    let output = setup.run("aliasbox", &["--list"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "greet\techo hello\nls\tls -la\n");

    assert_eq!(setup.run("aliasbox", &[]).status.code(), Some(1));
}
