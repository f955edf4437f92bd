use crate::error::{BootError, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub mod assembler;
pub use assembler::{ResolverChain, ResolverKind, Settings, SettingsContext};

/// Well-known repositories that map to a fixed resolver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predefined {
    Local,
    MavenLocal,
    MavenCentral,
    ScalaToolsReleases,
    ScalaToolsSnapshots,
}

impl Predefined {
    pub const ALL: [Predefined; 5] = [
        Predefined::Local,
        Predefined::MavenLocal,
        Predefined::MavenCentral,
        Predefined::ScalaToolsReleases,
        Predefined::ScalaToolsSnapshots,
    ];

    /// Name used in configuration files and on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Predefined::Local => "local",
            Predefined::MavenLocal => "maven-local",
            Predefined::MavenCentral => "maven-central",
            Predefined::ScalaToolsReleases => "scala-tools-releases",
            Predefined::ScalaToolsSnapshots => "scala-tools-snapshots",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

/// One artifact source. Order in a repository list is resolution priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repository {
    /// Maven 2 layout under a root URL.
    Maven { id: String, root: Url },
    /// Ivy-style layout: `base` joined with an artifact pattern.
    Ivy {
        id: String,
        base: Url,
        pattern: String,
    },
    Predefined(Predefined),
}

impl Repository {
    pub fn maven(id: impl Into<String>, root: &str) -> Result<Self> {
        Ok(Repository::Maven {
            id: id.into(),
            root: parse_repository_url(root)?,
        })
    }

    pub fn ivy(id: impl Into<String>, base: &str, pattern: impl Into<String>) -> Result<Self> {
        Ok(Repository::Ivy {
            id: id.into(),
            base: parse_repository_url(base)?,
            pattern: pattern.into(),
        })
    }
}

impl FromStr for Repository {
    type Err = BootError;

    /// Parses the launcher repository syntax: a predefined label,
    /// `id: url`, or `id: url, pattern`.
    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(BootError::Configuration(
                "Empty repository definition".to_string(),
            ));
        }

        let Some((id, rest)) = line.split_once(':') else {
            return Predefined::from_label(line)
                .map(Repository::Predefined)
                .ok_or_else(|| {
                    BootError::Configuration(format!("Unknown predefined repository '{line}'"))
                });
        };

        let id = id.trim();
        if id.is_empty() {
            return Err(BootError::Configuration(format!(
                "Repository definition '{line}' is missing an id"
            )));
        }

        match rest.split_once(',') {
            Some((base, pattern)) => Repository::ivy(id, base.trim(), pattern.trim()),
            None => Repository::maven(id, rest.trim()),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repository::Maven { id, root } => write!(f, "{id}: {root}"),
            Repository::Ivy { id, base, pattern } => write!(f, "{id}: {base}, {pattern}"),
            Repository::Predefined(kind) => f.write_str(kind.label()),
        }
    }
}

fn parse_repository_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw)
        .map_err(|_| BootError::Configuration(format!("Invalid repository URL: {raw}")))?;

    match parsed.scheme() {
        "https" | "http" | "file" => Ok(parsed),
        scheme => Err(BootError::Configuration(format!(
            "Unsupported repository scheme: {scheme}"
        ))),
    }
}

/// Removes repeated entries, keeping the first occurrence.
pub fn deduplicate(repositories: Vec<Repository>) -> Vec<Repository> {
    let mut unique: Vec<Repository> = Vec::with_capacity(repositories.len());
    for repo in repositories {
        if !unique.contains(&repo) {
            unique.push(repo);
        }
    }
    unique
}
