use crate::command::Launch;
use crate::config::Config;
use crate::error::DispatchError;
use crate::index;
use nix::sys::signal::Signal;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitCode, ExitStatus};
use tracing::{debug, info, warn};

/// The name we were started as, and what followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Invocation {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split argv into the invocation name (the part of argv[0] after the
    /// last `/`) and the remaining arguments.
    pub fn from_args(mut args: VecDeque<OsString>) -> Option<Invocation> {
        let first = args.pop_front()?;
        let name = invoked_name(&first)?;
        Some(Invocation {
            name: name.to_owned(),
            args: args.into(),
        })
    }
}

pub fn invoked_name(arg0: &OsString) -> Option<&str> {
    Path::new(arg0).file_name().and_then(|s| s.to_str())
}

pub struct Dispatcher {
    config: Config,
}

impl Dispatcher {
    pub fn new(config: Config) -> Self {
        Dispatcher { config }
    }

    /// Find the entry for the invocation and assemble its command without
    /// starting it.
    pub fn resolve(&self, invocation: &Invocation) -> Result<Launch, DispatchError> {
        let Invocation { name, args } = invocation;
        let template = index::lookup(&self.config, name)?;
        debug!("{name} resolved to {template:?}");
        let launch = Launch::build(name, &template, args, self.config.exec, &self.config.shell)?;
        launch.check_len(self.config.max_command_len)?;
        Ok(launch)
    }

    /// Resolve and run the invocation, returning the child's status.
    pub fn run(&self, invocation: &Invocation) -> Result<ExitStatus, DispatchError> {
        let launch = self.resolve(invocation)?;
        info!("running {launch}");
        let status = launch.run()?;
        debug!("{} exited with {status}", invocation.name);
        Ok(status)
    }
}

/// Exit code that mirrors a child's status the way a shell reports it.
pub fn exit_code(status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return ExitCode::from(code as u8);
    }
    match status.signal() {
        Some(signo) => {
            match Signal::try_from(signo) {
                Ok(signal) => warn!("child terminated by {signal}"),
                Err(_) => warn!("child terminated by signal {signo}"),
            }
            ExitCode::from(128u8.wrapping_add(signo as u8))
        }
        None => ExitCode::FAILURE,
    }
}

#[test]
fn test_invocation_from_args() {
    let args: VecDeque<OsString> = ["/usr/local/bin/greet", "world", "again"]
        .into_iter()
        .map(OsString::from)
        .collect();
    let invocation = Invocation::from_args(args).unwrap();
    assert_eq!(invocation, Invocation::new("greet", ["world", "again"]));
}

#[test]
fn test_invocation_name_without_separator() {
    let invocation = Invocation::from_args(VecDeque::from([OsString::from("greet")])).unwrap();
    assert_eq!(invocation.name, "greet");
    assert!(invocation.args.is_empty());
    assert_eq!(invoked_name(&OsString::from("/greet")), Some("greet"));
    assert_eq!(invoked_name(&OsString::from("/")), None);
    assert!(Invocation::from_args(VecDeque::new()).is_none());
}

#[cfg(test)]
fn index_dir(index: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(crate::config::INDEX_FILE), index).unwrap();
    dir
}

#[test]
fn test_resolve_greet() {
    use crate::config::ExecMode;

    let dir = index_dir("ls ls -la\ngreet echo hello\n");
    let mut config = Config::with_home(dir.path());
    config.exec = ExecMode::Shell;
    let dispatcher = Dispatcher::new(config);
    let launch = dispatcher
        .resolve(&Invocation::new("greet", ["world"]))
        .unwrap();
    assert_eq!(
        launch,
        Launch::Shell {
            shell: "/bin/sh".into(),
            line: r#"echo hello "world""#.into(),
        }
    );
}

#[test]
fn test_resolve_too_long_fails_before_spawn() {
    let dir = index_dir("greet echo hello\n");
    let mut config = Config::with_home(dir.path());
    config.max_command_len = Some(16);
    let dispatcher = Dispatcher::new(config);
    assert!(dispatcher.resolve(&Invocation::new("greet", ["a"])).is_ok());
    assert!(matches!(
        dispatcher.run(&Invocation::new("greet", ["a much longer argument"])),
        Err(DispatchError::CommandTooLong { limit: 16, .. })
    ));
}

#[test]
fn test_run_returns_child_status() {
    let dir = index_dir("fail sh -c 'exit \"$0\"'\n");
    let dispatcher = Dispatcher::new(Config::with_home(dir.path()));
    let status = dispatcher.run(&Invocation::new("fail", ["7"])).unwrap();
    assert_eq!(status.code(), Some(7));
}
