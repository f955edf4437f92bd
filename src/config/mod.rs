use crate::error::{BootError, Result};
use crate::repository::{self, Repository};
use crate::update::{Application, BENIGN_PREFIX, UpdateConfiguration};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "boot.toml";
pub const DEFAULT_BOOT_DIRECTORY: &str = "project/boot";

/// Used when the configuration file does not list any repositories at all.
pub const DEFAULT_REPOSITORIES: &[&str] = &["local", "maven-local", "maven-central"];

/// Contents of `boot.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BootFile {
    pub repositories: Option<Vec<String>>,
    pub boot: Option<BootSection>,
    pub toolchain: Option<ToolchainSection>,
    pub app: Option<AppSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BootSection {
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolchainSection {
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AppSection {
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub cross_versioned: bool,
}

impl AppSection {
    pub fn to_application(&self) -> Application {
        Application::new(&self.group, &self.name, &self.version, self.cross_versioned)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoggingSection {
    pub suppress: Option<Vec<String>>,
}

impl BootFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads `path`. A missing file is only an error when it was asked for
    /// explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() {
            if explicit {
                return Err(BootError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| {
            BootError::Configuration(format!("Invalid configuration {}: {e}", path.display()))
        })
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub boot_directory: Option<PathBuf>,
    pub toolchain_version: Option<String>,
    /// Replaces the file's list when non-empty.
    pub repositories: Vec<String>,
}

/// Everything a run needs, merged from file and command line.
#[derive(Debug, Clone)]
pub struct BootConfig {
    pub update: UpdateConfiguration,
    /// Application named in the file; its version may still be dynamic.
    pub app: Option<Application>,
}

impl BootConfig {
    pub fn from_sources(file: BootFile, overrides: Overrides) -> Result<Self> {
        let boot_directory = overrides
            .boot_directory
            .or_else(|| file.boot.and_then(|b| b.directory))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOT_DIRECTORY));

        let toolchain_version = overrides
            .toolchain_version
            .or_else(|| file.toolchain.and_then(|t| t.version))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                BootError::Configuration("No toolchain version configured".to_string())
            })?;

        let specs = if overrides.repositories.is_empty() {
            file.repositories.unwrap_or_else(|| {
                DEFAULT_REPOSITORIES.iter().map(|s| s.to_string()).collect()
            })
        } else {
            overrides.repositories
        };
        let repositories = parse_repositories(&specs)?;

        let suppressed = file
            .logging
            .and_then(|l| l.suppress)
            .unwrap_or_else(|| vec![BENIGN_PREFIX.to_string()]);

        let update = UpdateConfiguration::new(boot_directory, toolchain_version, repositories)
            .with_suppressed_prefixes(suppressed);

        Ok(Self {
            update,
            app: file.app.map(|a| a.to_application()),
        })
    }
}

/// Parses launcher repository definitions, dropping repeats.
pub fn parse_repositories<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Repository>> {
    let parsed = specs
        .iter()
        .map(|spec| spec.as_ref().parse::<Repository>())
        .collect::<Result<Vec<_>>>()?;
    Ok(repository::deduplicate(parsed))
}

/// Parses `group:name:version`.
pub fn parse_coordinate(coordinate: &str, cross_versioned: bool) -> Result<Application> {
    let parts: Vec<&str> = coordinate.split(':').map(str::trim).collect();
    match parts.as_slice() {
        [group, name, version] if parts.iter().all(|p| !p.is_empty()) => {
            Ok(Application::new(*group, *name, *version, cross_versioned))
        }
        _ => Err(BootError::Configuration(format!(
            "Invalid application coordinate '{coordinate}', expected group:name:version"
        ))),
    }
}
