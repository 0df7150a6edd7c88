use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a dispatch before a child process is running.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("could not open index {}: {} (error code {})", path.display(), describe_os_error(source), os_code(source))]
    IndexUnavailable { path: PathBuf, source: io::Error },

    #[error("could not read index {}: {source}", path.display())]
    IndexRead { path: PathBuf, source: io::Error },

    #[error("command not found: {name}")]
    CommandNotFound { name: String },

    #[error("command line is {len} bytes, limit is {limit}")]
    CommandTooLong { len: usize, limit: usize },

    #[error("index entry for {name} has an empty command")]
    EmptyTemplate { name: String },

    #[error("index entry for {name} is not a valid command line: {source}")]
    Template {
        name: String,
        source: shell_words::ParseError,
    },

    #[error("could not start {program}: {source}")]
    Spawn { program: String, source: io::Error },
}

fn os_code(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(-1)
}

fn describe_os_error(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).to_string(),
        None => err.to_string(),
    }
}

#[test]
fn index_unavailable_names_path_and_code() {
    let err = DispatchError::IndexUnavailable {
        path: PathBuf::from("/nowhere/commands.idx"),
        source: io::Error::from_raw_os_error(Errno::ENOENT as i32),
    };
    let msg = err.to_string();
    assert!(msg.contains("/nowhere/commands.idx"), "{msg}");
    assert!(msg.contains("ENOENT"), "{msg}");
    assert!(msg.contains(&format!("error code {}", Errno::ENOENT as i32)), "{msg}");
}

#[test]
fn not_found_names_command() {
    let err = DispatchError::CommandNotFound {
        name: "greet".into(),
    };
    assert_eq!(err.to_string(), "command not found: greet");
}
