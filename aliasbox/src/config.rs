use color_eyre::eyre::{Error, WrapErr};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const HOME_VAR: &str = "ALIASBOX_HOME";
pub const LOG_VAR: &str = "ALIASBOX_LOG";
pub const DEFAULT_HOME: &str = "/usr/local/share/aliasbox";
pub const INDEX_FILE: &str = "commands.idx";
pub const SETTINGS_FILE: &str = "aliasbox.yaml";

/// How an index line is compared against the invocation name.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The name field, up to the first space, must equal the invocation name.
    #[default]
    Exact,
    /// The line only has to start with the invocation name, so `run`
    /// selects a line for `run2`.
    Prefix,
}

/// What happens to a last line that has no terminating newline.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrailingLine {
    #[default]
    Keep,
    Drop,
}

/// How the assembled command is started.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Split the template into words and spawn the program directly,
    /// passing arguments through untouched.
    #[default]
    Direct,
    /// Build one string with quoted arguments and hand it to the shell.
    /// Shell metacharacters inside arguments are still interpreted.
    Shell,
}

/// Contents of `aliasbox.yaml`. Every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    #[serde(rename = "match")]
    pub match_mode: MatchMode,
    pub trailing_line: TrailingLine,
    pub exec: ExecMode,
    pub shell: Option<PathBuf>,
    pub max_command_len: Option<usize>,
    pub syslog: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub home: PathBuf,
    pub match_mode: MatchMode,
    pub trailing_line: TrailingLine,
    pub exec: ExecMode,
    pub shell: PathBuf,
    pub max_command_len: Option<usize>,
    pub syslog: bool,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config::with_home(DEFAULT_HOME)
    }
}

impl Config {
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Config {
            home: home.into(),
            match_mode: MatchMode::default(),
            trailing_line: TrailingLine::default(),
            exec: ExecMode::default(),
            shell: PathBuf::from("/bin/sh"),
            max_command_len: None,
            syslog: false,
            log_filter: None,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.home.join(INDEX_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    /// Resolve the configuration from the process environment.
    pub fn from_env() -> Result<Config, Error> {
        Config::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration through `var`, then layer the settings
    /// file from the base directory on top.
    pub fn resolve(var: impl Fn(&str) -> Option<String>) -> Result<Config, Error> {
        let mut config = Config::with_home(home_from(var(HOME_VAR)));
        config.log_filter = var(LOG_VAR).filter(|s| !s.trim().is_empty());
        if let Some(settings) = load_settings(&config.settings_path())? {
            config.apply(settings);
        }
        Ok(config)
    }

    pub fn apply(&mut self, settings: Settings) {
        let Settings {
            match_mode,
            trailing_line,
            exec,
            shell,
            max_command_len,
            syslog,
        } = settings;
        self.match_mode = match_mode;
        self.trailing_line = trailing_line;
        self.exec = exec;
        if let Some(shell) = shell {
            self.shell = shell;
        }
        self.max_command_len = max_command_len;
        self.syslog = syslog;
    }
}

/// Base directory from the value of `ALIASBOX_HOME`; unset or empty means
/// the default.
pub fn home_from(value: Option<String>) -> PathBuf {
    value
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME))
}

pub fn load_settings(path: &Path) -> Result<Option<Settings>, Error> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).wrap_err_with(|| format!("could not read {}", path.display()))
        }
    };
    parse_settings(&text)
        .map(Some)
        .wrap_err_with(|| format!("invalid settings in {}", path.display()))
}

pub fn parse_settings(text: &str) -> Result<Settings, Error> {
    if text.trim().is_empty() {
        return Ok(Settings::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

#[test]
fn test_resolve_defaults() {
    assert_eq!(Config::default().home, PathBuf::from(DEFAULT_HOME));
    assert_eq!(
        Config::default().index_path(),
        PathBuf::from("/usr/local/share/aliasbox/commands.idx")
    );

    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap().to_owned();
    let config = Config::resolve(|key| (key == HOME_VAR).then(|| home.clone())).unwrap();
    assert_eq!(config, Config::with_home(dir.path()));
    assert_eq!(config.match_mode, MatchMode::Exact);
    assert_eq!(config.trailing_line, TrailingLine::Keep);
    assert_eq!(config.exec, ExecMode::Direct);
    assert_eq!(config.max_command_len, None);
    assert_eq!(config.log_filter, None);
}

#[test]
fn test_resolve_empty_home_falls_back() {
    assert_eq!(home_from(Some(String::new())), PathBuf::from(DEFAULT_HOME));
    assert_eq!(home_from(None), PathBuf::from(DEFAULT_HOME));
    assert_eq!(home_from(Some("/opt/cmds".into())), PathBuf::from("/opt/cmds"));
}

#[test]
fn test_resolve_reads_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(SETTINGS_FILE),
        "match: prefix\ntrailing_line: drop\nexec: shell\nshell: /bin/bash\nmax_command_len: 128\n",
    )
    .unwrap();
    let home = dir.path().to_str().unwrap().to_owned();
    let config = Config::resolve(|key| match key {
        HOME_VAR => Some(home.clone()),
        LOG_VAR => Some("trace".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.home, dir.path());
    assert_eq!(config.match_mode, MatchMode::Prefix);
    assert_eq!(config.trailing_line, TrailingLine::Drop);
    assert_eq!(config.exec, ExecMode::Shell);
    assert_eq!(config.shell, PathBuf::from("/bin/bash"));
    assert_eq!(config.max_command_len, Some(128));
    assert_eq!(config.log_filter.as_deref(), Some("trace"));
}

#[test]
fn test_parse_settings_rejects_unknown_keys() {
    assert!(parse_settings("macth: prefix\n").is_err());
    assert!(parse_settings("match: fuzzy\n").is_err());
    assert!(parse_settings("\n").is_ok());
}
