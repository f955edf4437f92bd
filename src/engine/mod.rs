// Resolution engine boundary.
//
// The update orchestrator only talks to the engine through the types in this
// module: it hands over a module descriptor, gets back a resolve report, then
// asks for a retrieve into a destination pattern. The logger and settings are
// passed explicitly through `EngineContext` for the duration of each call.
pub mod pattern;
pub mod repository_engine;
pub mod transport;

pub use repository_engine::RepositoryEngine;

use crate::error::Result;
use crate::repository::Settings;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    pub organisation: String,
    pub name: String,
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.organisation, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleRevisionId {
    pub organisation: String,
    pub name: String,
    pub revision: String,
}

impl ModuleRevisionId {
    pub fn new(
        organisation: impl Into<String>,
        name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            organisation: organisation.into(),
            name: name.into(),
            revision: revision.into(),
        }
    }

    pub fn module_id(&self) -> ModuleId {
        ModuleId {
            organisation: self.organisation.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ModuleRevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{};{}", self.organisation, self.name, self.revision)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub name: String,
    pub public: bool,
}

impl Configuration {
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public: true,
        }
    }
}

/// Maps a configuration of the depending module onto a configuration
/// expression of the dependency, e.g. `default -> runtime(default)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationMapping {
    pub module_conf: String,
    pub dependency_conf: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub revision_id: ModuleRevisionId,
    /// Forced dependencies win conflicts regardless of revision order.
    pub force: bool,
    pub transitive: bool,
    pub configurations: Vec<ConfigurationMapping>,
}

impl DependencyDescriptor {
    pub fn new(revision_id: ModuleRevisionId) -> Self {
        Self {
            revision_id,
            force: false,
            transitive: true,
            configurations: Vec::new(),
        }
    }

    pub fn add_configuration(
        &mut self,
        module_conf: impl Into<String>,
        dependency_conf: impl Into<String>,
    ) {
        self.configurations.push(ConfigurationMapping {
            module_conf: module_conf.into(),
            dependency_conf: dependency_conf.into(),
        });
    }

    /// Configurations of the depending module this dependency is attached to.
    pub fn module_configurations(&self) -> impl Iterator<Item = &str> {
        self.configurations.iter().map(|m| m.module_conf.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub revision_id: ModuleRevisionId,
    pub status: String,
    pub configurations: Vec<Configuration>,
    pub dependencies: Vec<DependencyDescriptor>,
}

impl ModuleDescriptor {
    pub fn new(revision_id: ModuleRevisionId, status: impl Into<String>) -> Self {
        Self {
            revision_id,
            status: status.into(),
            configurations: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn add_configuration(&mut self, configuration: Configuration) {
        self.configurations.push(configuration);
    }

    pub fn add_dependency(&mut self, dependency: DependencyDescriptor) {
        self.dependencies.push(dependency);
    }

    /// Names of the configurations other modules may depend on.
    pub fn public_configurations(&self) -> Vec<&str> {
        self.configurations
            .iter()
            .filter(|conf| conf.public)
            .map(|conf| conf.name.as_str())
            .collect()
    }
}

/// How much the engine reports while resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOptions {
    #[default]
    Default,
    /// Only downloads are reported; per-dependency messages are demoted to verbose.
    DownloadOnly,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub log: LogOptions,
}

impl ResolveOptions {
    pub fn with_log(mut self, log: LogOptions) -> Self {
        self.log = log;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Copy even when an identical file is already at the destination.
    pub overwrite: bool,
}

#[derive(Debug)]
pub struct UnresolvedDependency {
    pub id: ModuleRevisionId,
    pub problem: Option<anyhow::Error>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub module: ModuleRevisionId,
    pub name: String,
    pub kind: String,
    pub ext: String,
    pub conf: String,
    /// Local file holding the artifact after resolution.
    pub location: PathBuf,
}

#[derive(Debug)]
pub struct ResolveReport {
    pub module: ModuleRevisionId,
    pub artifacts: Vec<ResolvedArtifact>,
    pub unresolved: Vec<UnresolvedDependency>,
    /// Every problem message raised while resolving, in the order encountered.
    pub problems: Vec<String>,
}

impl ResolveReport {
    pub fn new(module: ModuleRevisionId) -> Self {
        Self {
            module,
            artifacts: Vec::new(),
            unresolved: Vec::new(),
            problems: Vec::new(),
        }
    }

    pub fn has_error(&self) -> bool {
        !self.unresolved.is_empty() || !self.problems.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveReport {
    pub copied: Vec<PathBuf>,
    pub up_to_date: Vec<PathBuf>,
}

/// Severity of an engine message; lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Verbose = 3,
    Debug = 4,
}

/// Message sink the engine reports through.
pub trait MessageLogger {
    fn log(&mut self, msg: &str, level: MessageLevel);

    fn rawlog(&mut self, msg: &str, level: MessageLevel) {
        self.log(msg, level);
    }

    fn error(&mut self, msg: &str) {
        self.log(msg, MessageLevel::Error);
    }

    fn warn(&mut self, msg: &str) {
        self.log(msg, MessageLevel::Warn);
    }

    fn info(&mut self, msg: &str) {
        self.log(msg, MessageLevel::Info);
    }

    fn verbose(&mut self, msg: &str) {
        self.log(msg, MessageLevel::Verbose);
    }

    fn debug(&mut self, msg: &str) {
        self.log(msg, MessageLevel::Debug);
    }
}

/// Per-call engine context: the settings to resolve against and the active logger.
pub struct EngineContext<'a> {
    pub settings: &'a Settings,
    pub logger: &'a mut dyn MessageLogger,
}

impl<'a> EngineContext<'a> {
    pub fn new(settings: &'a Settings, logger: &'a mut dyn MessageLogger) -> Self {
        Self { settings, logger }
    }
}

/// The resolve/retrieve engine the update step drives.
pub trait ResolveEngine {
    fn resolve(
        &self,
        context: &mut EngineContext<'_>,
        module: &ModuleDescriptor,
        options: &ResolveOptions,
    ) -> Result<ResolveReport>;

    /// Copies the artifacts of a previously resolved module to `pattern`,
    /// relative to the settings' base directory.
    fn retrieve(
        &self,
        context: &mut EngineContext<'_>,
        module: &ModuleRevisionId,
        pattern: &str,
        options: &RetrieveOptions,
    ) -> Result<RetrieveReport>;
}
