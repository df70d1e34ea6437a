use std::io::ErrorKind;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands;
use crate::config::Config;
use crate::error::SignaturesError;
use crate::git::{Git, GitRepo};

pub(crate) fn run() -> u8 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too and are not failures
            let _ = err.print();
            return if err.use_stderr() { 1 } else { 0 };
        }
    };
    init_tracing(cli.verbose);

    match try_run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("git-signatures: {err:#}");
            1
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "git_signatures=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("GIT_SIGNATURES_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn try_run(cli: Cli) -> Result<u8> {
    if let Commands::Version = cli.command {
        return commands::version::cmd_version();
    }

    require_git()?;
    let repo = GitRepo::discover()?;
    let config = Config::load_from_repo(&repo)?;
    debug!(workdir = %repo.workdir.display(), ?config, "loaded repository context");
    let git = Git::new(repo);

    match cli.command {
        Commands::Init(args) => commands::init::cmd_init(&git, &config, args),
        Commands::Import => commands::import::cmd_import(&git, &config),
        Commands::Show(args) => commands::show::cmd_show(&git, &config, args),
        Commands::Add(args) => commands::add::cmd_add(&git, &config, args),
        Commands::Verify(args) => commands::verify::cmd_verify(&git, &config, args),
        Commands::Pull(args) => commands::sync::cmd_pull(&git, &config, args),
        Commands::Push(args) => commands::sync::cmd_push(&git, &config, args),
        Commands::Version => commands::version::cmd_version(),
    }
}

fn require_git() -> Result<()> {
    let status = Command::new("git")
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(SignaturesError::MissingTool {
            tool: "git".to_string(),
            hint: "install git and make sure it is on PATH".to_string(),
        }
        .into()),
        Err(err) => Err(err).context("failed to run git"),
    }
}
