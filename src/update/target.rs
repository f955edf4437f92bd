use crate::engine::{Configuration, DependencyDescriptor, ModuleDescriptor, ModuleRevisionId};
use std::fmt;

pub const TOOLCHAIN_ORG: &str = "org.scala-lang";
pub const COMPILER_MODULE_NAME: &str = "scala-compiler";
pub const LIBRARY_MODULE_NAME: &str = "scala-library";

const BOOT_ORG: &str = "org.scala-tools.sbt";
const BOOT_REVISION: &str = "1.0";
const DEFAULT_CONFIGURATION: &str = "default";
const APP_CONFIGURATION: &str = "runtime(default)";
const TOOLCHAIN_RETRIEVE_PATTERN: &str = "lib/[artifact].[ext]";

/// An application to fetch alongside the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub group_id: String,
    pub name: String,
    pub version: String,
    /// Whether the published artifact name carries a `_<toolchain version>` suffix.
    pub cross_versioned: bool,
}

impl Application {
    pub fn new(
        group_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        cross_versioned: bool,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            name: name.into(),
            version: version.into(),
            cross_versioned,
        }
    }

    /// Artifact name as published for `toolchain_version`.
    pub fn resolved_name(&self, toolchain_version: &str) -> String {
        if self.cross_versioned {
            format!("{}_{}", self.name, toolchain_version)
        } else {
            self.name.clone()
        }
    }

    /// `group/name/version`, the directory the application is retrieved into.
    pub fn directory_name(&self) -> String {
        format!("{}/{}/{}", self.group_id, self.name, self.version)
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.name, self.version)
    }
}

/// What an update should make present in the boot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    /// Compiler and standard library of the configured toolchain version.
    Toolchain,
    App(Application),
}

impl UpdateTarget {
    fn kind(&self) -> &'static str {
        match self {
            UpdateTarget::Toolchain => "scala",
            UpdateTarget::App(_) => "app",
        }
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateTarget::Toolchain => f.write_str("toolchain"),
            UpdateTarget::App(app) => write!(f, "application {app}"),
        }
    }
}

/// Synthetic module for one update, plus where its artifacts are retrieved to.
#[derive(Debug, Clone)]
pub struct Translation {
    pub module: ModuleDescriptor,
    /// Retrieve pattern relative to the toolchain-qualified base directory.
    pub retrieve_pattern: String,
}

pub fn translate(target: &UpdateTarget, toolchain_version: &str) -> Translation {
    let mut module = ModuleDescriptor::new(
        ModuleRevisionId::new(BOOT_ORG, format!("boot-{}", target.kind()), BOOT_REVISION),
        "release",
    );
    module.add_configuration(Configuration::public(DEFAULT_CONFIGURATION));

    let retrieve_pattern = match target {
        UpdateTarget::Toolchain => {
            add_dependency(
                &mut module,
                ModuleRevisionId::new(TOOLCHAIN_ORG, COMPILER_MODULE_NAME, toolchain_version),
                DEFAULT_CONFIGURATION,
            );
            add_dependency(
                &mut module,
                ModuleRevisionId::new(TOOLCHAIN_ORG, LIBRARY_MODULE_NAME, toolchain_version),
                DEFAULT_CONFIGURATION,
            );
            TOOLCHAIN_RETRIEVE_PATTERN.to_string()
        }
        UpdateTarget::App(app) => {
            add_dependency(
                &mut module,
                ModuleRevisionId::new(
                    &app.group_id,
                    app.resolved_name(toolchain_version),
                    &app.version,
                ),
                APP_CONFIGURATION,
            );
            app_retrieve_pattern(app)
        }
    };

    Translation {
        module,
        retrieve_pattern,
    }
}

fn add_dependency(module: &mut ModuleDescriptor, id: ModuleRevisionId, conf: &str) {
    let mut dependency = DependencyDescriptor::new(id);
    dependency.add_configuration(DEFAULT_CONFIGURATION, conf);
    module.add_dependency(dependency);
}

pub fn app_retrieve_pattern(app: &Application) -> String {
    format!(
        "{}(/[component])/[artifact]-[revision].[ext]",
        app.directory_name()
    )
}

/// Directory under the boot directory that holds everything for one toolchain version.
pub fn base_directory_name(toolchain_version: &str) -> String {
    if toolchain_version.is_empty() {
        "other".to_string()
    } else {
        toolchain_version.to_string()
    }
}

/// Full retrieve destination pattern, relative to the boot directory.
pub fn retrieve_destination(toolchain_version: &str, retrieve_pattern: &str) -> String {
    format!(
        "{}/{}",
        base_directory_name(toolchain_version),
        retrieve_pattern
    )
}
