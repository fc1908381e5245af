//! `dotdrop` command-line entry point.

use anyhow::Result;
use clap::{CommandFactory as _, Parser as _};
use std::process::ExitCode;
use std::sync::Arc;

use dotdrop_cli::cli::{Cli, Command};
use dotdrop_cli::{commands, interrupt, logging};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    logging::init_subscriber(args.verbose, command_name(&args.command));
    if let Err(e) = interrupt::install_handler() {
        tracing::warn!("cannot install the Ctrl-C handler: {e}");
    }
    let log = Arc::new(logging::Logger::new(command_name(&args.command)));

    match dispatch(&args, &log) {
        Ok(()) if interrupt::interrupted() => {
            log.error("interrupted");
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if interrupt::interrupted() {
                log.error("interrupted");
            } else {
                log.error(&format!("{e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: &Cli, log: &Arc<logging::Logger>) -> Result<()> {
    let global = &args.global;
    match &args.command {
        Command::Install(opts) => commands::install::run(global, opts, log),
        Command::Compare(opts) => commands::compare::run(global, opts, log),
        Command::Update(opts) => commands::update::run(global, opts, log),
        Command::Import(opts) => commands::import::run(global, opts, log),
        Command::Remove(opts) => commands::remove::run(global, opts, log),
        Command::Files(opts) => commands::list::run_files(global, opts, log),
        Command::Detail(opts) => commands::list::run_detail(global, opts, log),
        Command::Profiles => commands::list::run_profiles(global),
        Command::Completions(opts) => {
            clap_complete::generate(opts.shell, &mut Cli::command(), "dotdrop", &mut std::io::stdout());
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}

const fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Install(_) => "install",
        Command::Compare(_) => "compare",
        Command::Update(_) => "update",
        Command::Import(_) => "import",
        Command::Remove(_) => "remove",
        Command::Files(_) => "files",
        Command::Detail(_) => "detail",
        Command::Profiles => "profiles",
        Command::Completions(_) => "completions",
        Command::Version => "version",
    }
}
