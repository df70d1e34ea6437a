mod app;
mod cli;
mod commands;
mod config;
mod error;
mod git;
mod gpg;
mod notes;
mod policy;
mod status;

use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(app::run())
}
