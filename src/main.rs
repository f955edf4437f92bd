mod cli;
mod config;
mod engine;
mod error;
mod maven;
mod repository;
mod update;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::Overrides;
use std::process;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var(engine::transport::VERBOSE_ENV, "1");
        }
    }

    let overrides = Overrides {
        boot_directory: cli.boot_dir,
        toolchain_version: cli.toolchain_version,
        repositories: cli.repositories,
    };

    let result = workflow::load_config(cli.config.as_deref(), overrides).and_then(|config| {
        match cli.command {
            Commands::Toolchain => workflow::execute_toolchain(config),
            Commands::App {
                coordinate,
                cross_versioned,
            } => workflow::execute_app(config, coordinate.as_deref(), cross_versioned),
            Commands::Repositories => workflow::execute_repositories(config),
        }
    });

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e.headline());
        process::exit(1);
    }
}
