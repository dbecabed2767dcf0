//! Add-on inspector CLI entrypoint.
//!
//! Validates one upload and prints its metadata record as JSON.

use addon_ingest_common::LOCALE_ENV_VAR;
use addon_inspect::cli::Cli;
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    let environment_locale = std::env::var(LOCALE_ENV_VAR).ok();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let exit_code = addon_inspect::run(&cli, environment_locale, &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
