use aliasbox::config::Config;
use aliasbox::dispatch::{exit_code, invoked_name, Dispatcher, Invocation};
use aliasbox::{index, init_logging};
use std::collections::VecDeque;
use std::process::ExitCode;
use tracing::debug;

const SELF_NAME: &str = env!("CARGO_PKG_NAME");

fn usage() {
    println!("usage: {SELF_NAME} <command> [args...]");
    println!("       {SELF_NAME} --list");
    println!();
    println!("Link or copy {SELF_NAME} to a command name listed in commands.idx to run it directly.");
}

fn list(config: &Config) -> ExitCode {
    match index::list(config) {
        Ok(entries) => {
            for (name, template) in entries {
                println!("{name}\t{template}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{err}");
            ExitCode::from(1)
        }
    }
}

pub fn main() -> ExitCode {
    let _ = color_eyre::install();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("{err:?}");
            return ExitCode::from(1);
        }
    };
    let _logging_guard = init_logging(&config);

    let mut args = std::env::args_os().collect::<VecDeque<_>>();
    if args.front().and_then(invoked_name) == Some(SELF_NAME) {
        // started as ourselves: the next argument names the command
        args.pop_front();
        match args.front().map(|s| s.to_str()) {
            None => {
                usage();
                return ExitCode::from(1);
            }
            Some(Some("--help" | "-h")) => {
                usage();
                return ExitCode::SUCCESS;
            }
            Some(Some("--list")) => return list(&config),
            Some(_) => (),
        }
    }

    let Some(invocation) = Invocation::from_args(args) else {
        println!("could not determine the command name");
        return ExitCode::from(1);
    };

    let dispatcher = Dispatcher::new(config);
    match dispatcher.run(&invocation) {
        Ok(status) => exit_code(status),
        Err(err) => {
            debug!("{err:?}");
            println!("{err}");
            ExitCode::from(1)
        }
    }
}
