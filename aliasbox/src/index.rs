//! Reading `commands.idx`.
//!
//! Each line is `<name> <template>`. There is no comment syntax and no
//! escaping in the name field.

use crate::config::{Config, MatchMode, TrailingLine};
use crate::error::DispatchError;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::{debug, trace};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Entry<'l> {
    pub name: &'l str,
    pub template: &'l str,
}

impl<'l> Entry<'l> {
    pub fn parse(line: &'l str) -> Entry<'l> {
        match line.split_once(' ') {
            Some((name, template)) => Entry { name, template },
            None => Entry {
                name: line,
                template: "",
            },
        }
    }
}

impl MatchMode {
    /// Returns the template portion of `line` when it is an entry for `name`.
    /// Lines are compared as bytes, so they do not have to be valid UTF-8.
    pub fn select<'l>(self, line: &'l [u8], name: &str) -> Option<&'l [u8]> {
        let name = name.as_bytes();
        match self {
            MatchMode::Exact => match line.iter().position(|&b| b == b' ') {
                Some(space) => (&line[..space] == name).then(|| &line[space + 1..]),
                None => (line == name).then_some(&line[line.len()..]),
            },
            // the byte after the name should be the separating space
            MatchMode::Prefix => line.strip_prefix(name).map(|rest| rest.get(1..).unwrap_or(rest)),
        }
    }
}

/// Line-at-a-time reader over an index, reusing one buffer.
pub struct Lines<R> {
    read: R,
    trailing: TrailingLine,
    buf: Vec<u8>,
}

impl<R: BufRead> Lines<R> {
    pub fn new(read: R, trailing: TrailingLine) -> Self {
        Lines {
            read,
            trailing,
            buf: Vec::new(),
        }
    }

    pub fn next_line(&mut self) -> io::Result<Option<&[u8]>> {
        self.buf.clear();
        if self.read.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        match self.buf.strip_suffix(b"\n") {
            Some(line) => Ok(Some(line.strip_suffix(b"\r").unwrap_or(line))),
            None => match self.trailing {
                TrailingLine::Keep => Ok(Some(self.buf.as_slice())),
                TrailingLine::Drop => {
                    debug!(
                        "ignoring unterminated last line {:?}",
                        String::from_utf8_lossy(&self.buf)
                    );
                    Ok(None)
                }
            },
        }
    }
}

/// Scan for the first line that matches `name` and return its template.
pub fn find_template(
    read: impl BufRead,
    name: &str,
    mode: MatchMode,
    trailing: TrailingLine,
) -> io::Result<Option<String>> {
    let mut lines = Lines::new(read, trailing);
    while let Some(line) = lines.next_line()? {
        trace!("index line: {}", String::from_utf8_lossy(line));
        if let Some(template) = mode.select(line, name) {
            return Ok(Some(String::from_utf8_lossy(template).into_owned()));
        }
    }
    Ok(None)
}

/// All entries in file order, skipping blank lines.
pub fn read_entries(read: impl BufRead, trailing: TrailingLine) -> io::Result<Vec<(String, String)>> {
    let mut lines = Lines::new(read, trailing);
    let mut entries = Vec::new();
    while let Some(line) = lines.next_line()? {
        let line = String::from_utf8_lossy(line);
        if line.trim().is_empty() {
            continue;
        }
        let Entry { name, template } = Entry::parse(&line);
        entries.push((name.to_owned(), template.to_owned()));
    }
    Ok(entries)
}

pub fn open_index(config: &Config) -> Result<BufReader<File>, DispatchError> {
    let path = config.index_path();
    match File::open(&path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(source) => Err(DispatchError::IndexUnavailable { path, source }),
    }
}

/// Look `name` up in the configured index. The file is closed before this
/// returns.
pub fn lookup(config: &Config, name: &str) -> Result<String, DispatchError> {
    let not_found = || DispatchError::CommandNotFound {
        name: name.to_owned(),
    };
    if name.is_empty() {
        return Err(not_found());
    }
    let index = open_index(config)?;
    find_template(index, name, config.match_mode, config.trailing_line)
        .map_err(|source| DispatchError::IndexRead {
            path: config.index_path(),
            source,
        })?
        .ok_or_else(not_found)
}

pub fn list(config: &Config) -> Result<Vec<(String, String)>, DispatchError> {
    let index = open_index(config)?;
    read_entries(index, config.trailing_line).map_err(|source| DispatchError::IndexRead {
        path: config.index_path(),
        source,
    })
}

#[cfg(test)]
fn find(text: &str, name: &str, mode: MatchMode, trailing: TrailingLine) -> Option<String> {
    find_template(text.as_bytes(), name, mode, trailing).unwrap()
}

#[test]
fn test_exact_match() {
    let index = "ls ls -la\ngreet echo hello\ngreeter echo hi\n";
    assert_eq!(
        find(index, "greet", MatchMode::Exact, TrailingLine::Keep).as_deref(),
        Some("echo hello")
    );
    assert_eq!(
        find(index, "greeter", MatchMode::Exact, TrailingLine::Keep).as_deref(),
        Some("echo hi")
    );
    assert_eq!(find(index, "gree", MatchMode::Exact, TrailingLine::Keep), None);
}

#[test]
fn test_first_match_wins() {
    let index = "greet echo first\ngreet echo second\n";
    for mode in [MatchMode::Exact, MatchMode::Prefix] {
        assert_eq!(
            find(index, "greet", mode, TrailingLine::Keep).as_deref(),
            Some("echo first")
        );
    }
}

#[test]
fn test_prefix_match_is_loose() {
    let index = "run2 /bin/foo\n";
    // the invocation only has to be a prefix of the line
    assert_eq!(
        find(index, "run", MatchMode::Prefix, TrailingLine::Keep).as_deref(),
        Some(" /bin/foo")
    );
    assert_eq!(find(index, "run", MatchMode::Exact, TrailingLine::Keep), None);
    assert_eq!(
        find(index, "run2", MatchMode::Prefix, TrailingLine::Keep).as_deref(),
        Some("/bin/foo")
    );
    // a longer invocation never matches a shorter entry name
    assert_eq!(
        find("run /bin/foo\n", "run2", MatchMode::Prefix, TrailingLine::Keep),
        None
    );
}

#[test]
fn test_non_utf8_lines_do_not_stop_the_scan() {
    let index: &[u8] = b"caf\xe9 echo x\ngreet echo hello\n";
    for mode in [MatchMode::Exact, MatchMode::Prefix] {
        assert_eq!(
            find_template(index, "greet", mode, TrailingLine::Keep)
                .unwrap()
                .as_deref(),
            Some("echo hello")
        );
    }
    let index: &[u8] = b"greet echo caf\xe9\n";
    assert_eq!(
        find_template(index, "greet", MatchMode::Exact, TrailingLine::Keep)
            .unwrap()
            .as_deref(),
        Some("echo caf\u{fffd}")
    );
    let entries = read_entries(&b"caf\xe9 echo x\nls ls\n"[..], TrailingLine::Keep).unwrap();
    assert_eq!(entries[1], ("ls".to_owned(), "ls".to_owned()));
}

#[test]
fn test_unterminated_last_line() {
    let index = "ls ls -la\ngreet echo hello";
    assert_eq!(
        find(index, "greet", MatchMode::Exact, TrailingLine::Keep).as_deref(),
        Some("echo hello")
    );
    assert_eq!(find(index, "greet", MatchMode::Exact, TrailingLine::Drop), None);
    assert_eq!(
        find(index, "ls", MatchMode::Exact, TrailingLine::Drop).as_deref(),
        Some("ls -la")
    );
}

#[test]
fn test_crlf_lines() {
    let index = "greet echo hello\r\n";
    assert_eq!(
        find(index, "greet", MatchMode::Exact, TrailingLine::Keep).as_deref(),
        Some("echo hello")
    );
}

#[test]
fn test_name_without_template() {
    assert_eq!(
        find("true\n", "true", MatchMode::Exact, TrailingLine::Keep).as_deref(),
        Some("")
    );
}

#[test]
fn test_read_entries() {
    let index = "a echo a\n\nb  echo b\nc";
    let entries = read_entries(index.as_bytes(), TrailingLine::Keep).unwrap();
    assert_eq!(
        entries,
        vec![
            ("a".to_owned(), "echo a".to_owned()),
            ("b".to_owned(), " echo b".to_owned()),
            ("c".to_owned(), "".to_owned()),
        ]
    );
}

#[test]
fn test_lookup_missing_index() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_home(dir.path().join("missing"));
    match lookup(&config, "greet") {
        Err(DispatchError::IndexUnavailable { path, source }) => {
            assert_eq!(path, config.index_path());
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_lookup_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("commands.idx"), "greet echo hello\n").unwrap();
    let config = Config::with_home(dir.path());
    assert_eq!(lookup(&config, "greet").unwrap(), "echo hello");
    assert!(matches!(
        lookup(&config, "wave"),
        Err(DispatchError::CommandNotFound { name }) if name == "wave"
    ));
    assert!(matches!(
        lookup(&config, ""),
        Err(DispatchError::CommandNotFound { .. })
    ));
}
