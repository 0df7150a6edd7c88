use crate::config::ExecMode;
use crate::error::DispatchError;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// A fully assembled command, ready to start.
#[derive(Debug, PartialEq, Eq)]
pub enum Launch {
    /// `program args...`, started without a shell.
    Direct {
        program: String,
        args: Vec<OsString>,
    },
    /// One command line for `shell -c`.
    Shell { shell: PathBuf, line: OsString },
}

/// Wrap `arg` in double quotes, putting a backslash before every `"`.
/// Bytes are copied through as they are.
pub fn quote_legacy(arg: &OsStr) -> OsString {
    let arg = arg.as_bytes();
    let mut quoted = Vec::with_capacity(arg.len() + 2);
    quoted.push(b'"');
    for &b in arg {
        if b == b'"' {
            quoted.push(b'\\');
        }
        quoted.push(b);
    }
    quoted.push(b'"');
    OsString::from_vec(quoted)
}

/// Template followed by every argument, space separated and quoted.
pub fn shell_line(template: &str, args: &[OsString]) -> OsString {
    let mut line = OsString::from(template);
    for arg in args {
        line.push(" ");
        line.push(quote_legacy(arg));
    }
    line
}

impl Launch {
    pub fn build(
        name: &str,
        template: &str,
        args: &[OsString],
        mode: ExecMode,
        shell: &Path,
    ) -> Result<Launch, DispatchError> {
        match mode {
            ExecMode::Shell => Ok(Launch::Shell {
                shell: shell.to_owned(),
                line: shell_line(template, args),
            }),
            ExecMode::Direct => {
                let words =
                    shell_words::split(template).map_err(|source| DispatchError::Template {
                        name: name.to_owned(),
                        source,
                    })?;
                let mut words = words.into_iter();
                let Some(program) = words.next() else {
                    return Err(DispatchError::EmptyTemplate {
                        name: name.to_owned(),
                    });
                };
                let args = words
                    .map(OsString::from)
                    .chain(args.iter().cloned())
                    .collect();
                Ok(Launch::Direct { program, args })
            }
        }
    }

    pub fn program(&self) -> &OsStr {
        match self {
            Launch::Direct { program, .. } => program.as_ref(),
            Launch::Shell { shell, .. } => shell.as_os_str(),
        }
    }

    /// Length of the command line as it would be written out in full.
    pub fn rendered_len(&self) -> usize {
        match self {
            Launch::Direct { program, args } => args
                .iter()
                .fold(program.len(), |len, arg| len + 1 + arg.len()),
            Launch::Shell { line, .. } => line.len(),
        }
    }

    pub fn check_len(&self, limit: Option<usize>) -> Result<(), DispatchError> {
        match limit {
            Some(limit) if self.rendered_len() > limit => Err(DispatchError::CommandTooLong {
                len: self.rendered_len(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn command(&self) -> Command {
        match self {
            Launch::Direct { program, args } => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
            Launch::Shell { shell, line } => {
                let mut c = Command::new(shell);
                c.arg("-c");
                c.arg(line);
                c
            }
        }
    }

    /// Start the command and wait for it.
    pub fn run(&self) -> Result<ExitStatus, DispatchError> {
        self.command()
            .status()
            .map_err(|source| DispatchError::Spawn {
                program: self.program().to_string_lossy().into_owned(),
                source,
            })
    }
}

impl fmt::Display for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Launch::Direct { program, args } => {
                write!(f, "{program}")?;
                for arg in args {
                    write!(f, " {}", arg.to_string_lossy())?;
                }
                Ok(())
            }
            Launch::Shell { shell, line } => {
                write!(f, "{} -c {}", shell.display(), line.to_string_lossy())
            }
        }
    }
}

#[cfg(test)]
fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

#[test]
fn test_shell_line() {
    let line = shell_line("echo hello", &os_args(&["world"]));
    assert_eq!(line, r#"echo hello "world""#);
    let line = shell_line("echo", &os_args(&["a b", "", "c"]));
    assert_eq!(line, r#"echo "a b" "" "c""#);
    assert_eq!(shell_line("echo", &[]), "echo");
}

#[test]
fn test_shell_line_keeps_non_utf8_arguments() {
    let arg = OsString::from_vec(b"caf\xe9 \"x\"".to_vec());
    let line = shell_line("echo", &[arg]);
    assert_eq!(line.as_bytes(), b"echo \"caf\xe9 \\\"x\\\"\"");
}

#[test]
fn test_quote_escapes_quotes_only() {
    assert_eq!(quote_legacy(OsStr::new(r#"say "hi""#)), r#""say \"hi\"""#);
    // nothing else is escaped
    assert_eq!(quote_legacy(OsStr::new("$HOME `id`; \\")), r#""$HOME `id`; \""#);
}

#[test]
fn test_build_direct() {
    let launch = Launch::build(
        "greet",
        "echo 'hello there'",
        &os_args(&["$world", "\"quoted\""]),
        ExecMode::Direct,
        Path::new("/bin/sh"),
    )
    .unwrap();
    assert_eq!(
        launch,
        Launch::Direct {
            program: "echo".into(),
            args: os_args(&["hello there", "$world", "\"quoted\""]),
        }
    );
    assert_eq!(launch.to_string(), r#"echo hello there $world "quoted""#);
}

#[test]
fn test_build_shell() {
    let launch = Launch::build(
        "greet",
        "echo hello",
        &os_args(&["world"]),
        ExecMode::Shell,
        Path::new("/bin/sh"),
    )
    .unwrap();
    assert_eq!(
        launch,
        Launch::Shell {
            shell: "/bin/sh".into(),
            line: r#"echo hello "world""#.into(),
        }
    );
    assert_eq!(launch.rendered_len(), r#"echo hello "world""#.len());
}

#[test]
fn test_build_direct_rejects_bad_templates() {
    let sh = Path::new("/bin/sh");
    assert!(matches!(
        Launch::build("x", "   ", &[], ExecMode::Direct, sh),
        Err(DispatchError::EmptyTemplate { .. })
    ));
    assert!(matches!(
        Launch::build("x", "echo 'unterminated", &[], ExecMode::Direct, sh),
        Err(DispatchError::Template { .. })
    ));
}

#[test]
fn test_check_len() {
    let launch = Launch::Shell {
        shell: "/bin/sh".into(),
        line: "echo 12345".into(),
    };
    assert!(launch.check_len(None).is_ok());
    assert!(launch.check_len(Some(10)).is_ok());
    assert!(matches!(
        launch.check_len(Some(9)),
        Err(DispatchError::CommandTooLong { len: 10, limit: 9 })
    ));
}

#[cfg(unix)]
#[test]
fn test_run_reports_exit_status() {
    let launch = Launch::build("f", "sh -c 'exit 3'", &[], ExecMode::Direct, Path::new("/bin/sh"))
        .unwrap();
    assert_eq!(launch.run().unwrap().code(), Some(3));

    let launch = Launch::build(
        "f",
        "/definitely/not/here",
        &[],
        ExecMode::Direct,
        Path::new("/bin/sh"),
    )
    .unwrap();
    assert!(matches!(launch.run(), Err(DispatchError::Spawn { .. })));
}
