use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "boot-update",
    about = "Fetches toolchain and application artifacts into a boot directory",
    version,
    author
)]
pub struct Cli {
    /// Boot directory (overrides [boot] directory in the config file)
    #[arg(long, value_name = "DIR", global = true)]
    pub boot_dir: Option<PathBuf>,

    /// Configuration file (defaults to ./boot.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Toolchain version (overrides [toolchain] version in the config file)
    #[arg(short = 't', long, value_name = "VERSION", global = true)]
    pub toolchain_version: Option<String>,

    /// Repository definition, repeatable: a predefined name, "id: url" or "id: url, pattern"
    #[arg(long = "repo", value_name = "SPEC", global = true)]
    pub repositories: Vec<String>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the compiler and standard library of the toolchain version
    Toolchain,

    /// Fetch an application built for the toolchain version
    App {
        /// Coordinate (group:name:version); the version may be latest, latest.integration
        /// or latest.release. Defaults to the [app] section of the config file.
        #[arg(value_name = "COORDINATE")]
        coordinate: Option<String>,

        /// The published name carries a _<toolchain version> suffix
        #[arg(long)]
        cross_versioned: bool,
    },

    /// Print the resolver chain assembled from the configured repositories
    Repositories,
}
