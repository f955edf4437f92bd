use crate::config::{self, BootConfig, BootFile, Overrides};
use crate::engine::transport::Transport;
use crate::error::{BootError, Result};
use crate::maven::MetadataClient;
use crate::maven::revision;
use crate::repository::{ResolverChain, ResolverKind, Settings, SettingsContext, assembler};
use crate::update::target::base_directory_name;
use crate::update::{Application, Update, UpdateTarget};
use colored::Colorize;
use std::path::{Path, PathBuf};
use url::Url;

/// Merges the configuration file (explicit or `./boot.toml`) with command-line overrides.
pub fn load_config(config_path: Option<&Path>, overrides: Overrides) -> Result<BootConfig> {
    let (path, explicit) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(config::DEFAULT_CONFIG_FILE), false),
    };
    let file = BootFile::load(&path, explicit)?;
    BootConfig::from_sources(file, overrides)
}

/// Make the compiler and standard library present in the boot directory
pub fn execute_toolchain(config: BootConfig) -> Result<()> {
    let title = format!("Updating toolchain {}...", config.update.toolchain_version);
    println!("{}", title.cyan().bold());

    let update = prepare(config)?;
    run(&update, &UpdateTarget::Toolchain)
}

/// Make an application present in the boot directory, resolving dynamic versions first
pub fn execute_app(
    config: BootConfig,
    coordinate: Option<&str>,
    cross_versioned: bool,
) -> Result<()> {
    let app = match coordinate {
        Some(coordinate) => config::parse_coordinate(coordinate, cross_versioned)?,
        None => config.app.clone().ok_or_else(|| {
            BootError::Configuration(
                "No application given. Example: boot-update app group:name:version".to_string(),
            )
        })?,
    };
    println!("{}", format!("Updating application {app}...").cyan().bold());

    let update = prepare(config)?;
    let app = if revision::is_dynamic(&app.version) {
        println!("\n{}", "Resolving dynamic version...".yellow());
        let settings = update.settings()?;
        let toolchain_version = &update.configuration().toolchain_version;
        let pinned = pin_version(&app, toolchain_version, settings)?;
        println!("   {}", format!("✓ {} → {}", app.version, pinned.version).green());
        pinned
    } else {
        app
    };

    run(&update, &UpdateTarget::App(app))
}

/// Print the resolver chain that updates would use
pub fn execute_repositories(config: BootConfig) -> Result<()> {
    println!("{}", "Assembling resolver chain...".cyan().bold());

    let context = SettingsContext::for_boot_directory(config.update.boot_directory.clone())?;
    let settings = assembler::assemble(&config.update.repositories, &context)?;
    let chain = default_chain(&settings)?;

    print_chain(chain);
    Ok(())
}

fn prepare(config: BootConfig) -> Result<Update> {
    println!("\n{}", "1. Preparing boot directory...".yellow());
    let update = Update::new(config.update)?;
    println!(
        "   {}",
        format!("✓ Logging to {}", update.log_file().display()).green()
    );

    println!("\n{}", "2. Assembling resolver chain...".yellow());
    let chain = default_chain(update.settings()?)?;
    println!("   Using {} repositories:", chain.resolvers.len());
    for name in assembler::resolver_names(chain) {
        println!("   • {}", name.bright_cyan());
    }
    Ok(update)
}

fn run(update: &Update, target: &UpdateTarget) -> Result<()> {
    println!("\n{}", "3. Resolving and retrieving artifacts...".yellow());
    update.apply(target)?;

    let destination = update
        .settings()?
        .base_dir
        .join(base_directory_name(&update.configuration().toolchain_version));
    println!(
        "\n{}",
        format!("✨ {target} available under {}", destination.display())
            .green()
            .bold()
    );
    Ok(())
}

fn default_chain(settings: &Settings) -> Result<&ResolverChain> {
    settings
        .default_resolver()
        .ok_or_else(|| BootError::Engine("No default resolver configured".to_string()))
}

fn print_chain(chain: &ResolverChain) {
    println!("\n{} ({} resolvers)", chain.name.bold(), chain.resolvers.len());
    for resolver in &chain.resolvers {
        match &resolver.kind {
            ResolverKind::Maven { root } => {
                println!("  • {} {}", resolver.name.bright_cyan(), root.as_str().dimmed());
            }
            ResolverKind::Pattern {
                artifact_patterns, ..
            } => {
                println!("  • {}", resolver.name.bright_cyan());
                for pattern in artifact_patterns {
                    println!("      {}", pattern.dimmed());
                }
            }
        }
    }
}

/// Maven-layout roots of the chain, in resolution order.
pub fn maven_roots(chain: &ResolverChain) -> Vec<Url> {
    chain
        .resolvers
        .iter()
        .filter_map(|resolver| match &resolver.kind {
            ResolverKind::Maven { root } => Some(root.clone()),
            ResolverKind::Pattern { .. } => None,
        })
        .collect()
}

/// Replaces a `latest*` version with the newest published revision.
fn pin_version(
    app: &Application,
    toolchain_version: &str,
    settings: &Settings,
) -> Result<Application> {
    let transport = Transport::new();
    let client = MetadataClient::new(&transport, maven_roots(default_chain(settings)?));
    let name = app.resolved_name(toolchain_version);
    let release_only = app.version == "latest.release";

    let Some(version) = client.latest_revision(&app.group_id, &name, release_only)? else {
        let problem = format!(
            "no published revision of {}:{} matches {}",
            app.group_id, name, app.version
        );
        println!("   {}", problem.red());
        return Err(BootError::Resolution {
            problems: vec![problem],
        });
    };

    Ok(Application {
        version,
        ..app.clone()
    })
}
