use crate::error::{BootError, Result};
use crate::repository::{Predefined, Repository};
use std::path::{Path, PathBuf};
use url::Url;

pub const CHAIN_NAME: &str = "redefined-public";

const MAVEN_CENTRAL_ROOT: &str = "https://repo1.maven.org/maven2/";
const SCALA_TOOLS_RELEASES_ROOT: &str = "https://scala-tools.org/repo-releases";
const SCALA_TOOLS_SNAPSHOTS_ROOT: &str = "https://scala-tools.org/repo-snapshots";
const LOCAL_RESOLVER_NAME: &str = "local";
const LOCAL_IVY_PATTERN: &str =
    "[organisation]/[module]/[revision]/[type]s/[artifact](-[classifier]).[ext]";
const LOCAL_ARTIFACT_PATTERN: &str =
    "[organisation]/[module]/[revision]/[type]s/[artifact](-[classifier]).[ext]";

/// Machine-local inputs the predefined repositories depend on.
#[derive(Debug, Clone)]
pub struct SettingsContext {
    /// Directory relative retrieve destinations are resolved against.
    pub base_dir: PathBuf,
    pub user_home: PathBuf,
    /// Ivy user directory; holds the `local` repository and the download cache.
    pub ivy_user_dir: PathBuf,
}

impl SettingsContext {
    pub fn new(base_dir: impl Into<PathBuf>, user_home: impl Into<PathBuf>) -> Self {
        let user_home = user_home.into();
        Self {
            base_dir: base_dir.into(),
            ivy_user_dir: user_home.join(".ivy2"),
            user_home,
        }
    }

    /// Context rooted at the current user's home directory.
    pub fn for_boot_directory(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            BootError::Configuration("Unable to determine the user home directory".to_string())
        })?;
        Ok(Self::new(base_dir, home))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverKind {
    /// Maven 2 compatible layout below `root`.
    Maven { root: Url },
    /// Descriptor and artifact patterns, each a URL template.
    Pattern {
        ivy_patterns: Vec<String>,
        artifact_patterns: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    pub name: String,
    pub kind: ResolverKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverChain {
    pub name: String,
    pub resolvers: Vec<Resolver>,
}

impl ResolverChain {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolvers: Vec::new(),
        }
    }

    fn add(&mut self, resolver: Resolver) -> Result<()> {
        if self.resolvers.iter().any(|r| r.name == resolver.name) {
            return Err(BootError::Configuration(format!(
                "Repository '{}' is defined more than once",
                resolver.name
            )));
        }
        self.resolvers.push(resolver);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManager {
    pub dir: PathBuf,
    /// Use artifacts from local repositories in place instead of copying them into the cache.
    pub use_origin: bool,
}

/// Engine settings: the registered resolvers, the default one, and the cache.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_dir: PathBuf,
    resolvers: Vec<ResolverChain>,
    default_resolver: Option<String>,
    pub cache: CacheManager,
}

impl Settings {
    fn new(context: &SettingsContext) -> Self {
        Self {
            base_dir: context.base_dir.clone(),
            resolvers: Vec::new(),
            default_resolver: None,
            cache: CacheManager {
                dir: context.ivy_user_dir.join("cache"),
                use_origin: false,
            },
        }
    }

    fn add_resolver(&mut self, chain: ResolverChain) {
        self.resolvers.push(chain);
    }

    fn set_default_resolver(&mut self, name: &str) {
        self.default_resolver = Some(name.to_string());
    }

    pub fn default_resolver(&self) -> Option<&ResolverChain> {
        let name = self.default_resolver.as_deref()?;
        self.resolvers.iter().find(|chain| chain.name == name)
    }
}

/// Builds engine settings whose default resolver is a chain over `repositories`,
/// in order. Fails before touching any settings when the list is empty.
pub fn assemble(repositories: &[Repository], context: &SettingsContext) -> Result<Settings> {
    if repositories.is_empty() {
        return Err(BootError::Configuration("No repositories defined.".to_string()));
    }

    let mut chain = ResolverChain::new(CHAIN_NAME);
    for repo in repositories {
        chain.add(to_resolver(repo, context)?)?;
    }

    let mut settings = Settings::new(context);
    settings.cache.use_origin = true;
    settings.add_resolver(chain);
    settings.set_default_resolver(CHAIN_NAME);
    Ok(settings)
}

fn to_resolver(repo: &Repository, context: &SettingsContext) -> Result<Resolver> {
    match repo {
        Repository::Maven { id, root } => Ok(maven_resolver(id, root.clone())),
        Repository::Ivy { id, base, pattern } => Ok(url_resolver(id, base.as_str(), pattern)),
        Repository::Predefined(kind) => predefined_resolver(*kind, context),
    }
}

fn predefined_resolver(kind: Predefined, context: &SettingsContext) -> Result<Resolver> {
    match kind {
        Predefined::Local => local_resolver(&context.ivy_user_dir),
        Predefined::MavenLocal => {
            let root = directory_url(&context.user_home.join(".m2").join("repository"))?;
            Ok(maven_resolver("Maven2 Local", root))
        }
        Predefined::MavenCentral => Ok(maven_resolver("public", fixed_url(MAVEN_CENTRAL_ROOT)?)),
        Predefined::ScalaToolsReleases => Ok(maven_resolver(
            "Scala-Tools Maven2 Repository",
            fixed_url(SCALA_TOOLS_RELEASES_ROOT)?,
        )),
        Predefined::ScalaToolsSnapshots => Ok(maven_resolver(
            "Scala-Tools Maven2 Snapshots Repository",
            fixed_url(SCALA_TOOLS_SNAPSHOTS_ROOT)?,
        )),
    }
}

fn maven_resolver(name: &str, root: Url) -> Resolver {
    Resolver {
        name: name.to_string(),
        kind: ResolverKind::Maven { root },
    }
}

fn url_resolver(name: &str, base: &str, pattern: &str) -> Resolver {
    let adjusted = join_pattern(base, pattern);
    Resolver {
        name: name.to_string(),
        kind: ResolverKind::Pattern {
            ivy_patterns: vec![adjusted.clone()],
            artifact_patterns: vec![adjusted],
        },
    }
}

fn local_resolver(ivy_user_dir: &Path) -> Result<Resolver> {
    let root = directory_url(&ivy_user_dir.join("local"))?;
    Ok(Resolver {
        name: LOCAL_RESOLVER_NAME.to_string(),
        kind: ResolverKind::Pattern {
            ivy_patterns: vec![join_pattern(root.as_str(), LOCAL_IVY_PATTERN)],
            artifact_patterns: vec![join_pattern(root.as_str(), LOCAL_ARTIFACT_PATTERN)],
        },
    })
}

/// `base + "/" + pattern`, without doubling an existing trailing slash.
pub fn join_pattern(base: &str, pattern: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{pattern}")
    } else {
        format!("{base}/{pattern}")
    }
}

fn directory_url(path: &Path) -> Result<Url> {
    Url::from_directory_path(path).map_err(|_| {
        BootError::Configuration(format!(
            "Repository directory '{}' must be an absolute path",
            path.display()
        ))
    })
}

fn fixed_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|_| BootError::Configuration(format!("Invalid repository URL: {raw}")))
}

/// Names of the resolvers in a chain, in order.
pub fn resolver_names(chain: &ResolverChain) -> Vec<&str> {
    chain.resolvers.iter().map(|r| r.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn has_unique_names(chain: &ResolverChain) -> bool {
        let mut seen = HashSet::new();
        chain.resolvers.iter().all(|r| seen.insert(r.name.as_str()))
    }

    fn context() -> SettingsContext {
        SettingsContext::new("/tmp/boot", "/home/builder")
    }

    #[test]
    fn empty_repository_list_is_a_configuration_error() {
        let err = assemble(&[], &context()).unwrap_err();
        assert!(
            matches!(err, BootError::Configuration(ref msg) if msg == "No repositories defined.")
        );
    }

    #[test]
    fn chain_preserves_repository_order() {
        let repositories = vec![
            Repository::Predefined(Predefined::Local),
            Repository::maven("company", "https://repo.example.com/maven2").unwrap(),
            Repository::Predefined(Predefined::MavenCentral),
            Repository::ivy("plugins", "https://repo.example.com/ivy/", "[module]/[artifact].[ext]")
                .unwrap(),
            Repository::Predefined(Predefined::ScalaToolsReleases),
        ];

        let settings = assemble(&repositories, &context()).unwrap();
        let chain = settings.default_resolver().unwrap();

        assert_eq!(chain.name, CHAIN_NAME);
        assert_eq!(chain.resolvers.len(), repositories.len());
        assert_eq!(
            resolver_names(chain),
            vec![
                "local",
                "company",
                "public",
                "plugins",
                "Scala-Tools Maven2 Repository"
            ]
        );
        assert!(has_unique_names(chain));
    }

    #[test]
    fn assembly_enables_use_origin() {
        let settings = assemble(
            &[Repository::Predefined(Predefined::MavenCentral)],
            &context(),
        )
        .unwrap();
        assert!(settings.cache.use_origin);
        assert_eq!(settings.cache.dir, PathBuf::from("/home/builder/.ivy2/cache"));
    }

    #[test]
    fn pattern_resolver_inserts_separator() {
        let resolver = url_resolver("ivy", "https://example.com/ivy", "[module]/[artifact].[ext]");
        match resolver.kind {
            ResolverKind::Pattern {
                ivy_patterns,
                artifact_patterns,
            } => {
                assert_eq!(ivy_patterns, vec!["https://example.com/ivy/[module]/[artifact].[ext]"]);
                assert_eq!(ivy_patterns, artifact_patterns);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn pattern_resolver_keeps_existing_separator() {
        assert_eq!(
            join_pattern("https://example.com/ivy/", "[artifact].[ext]"),
            "https://example.com/ivy/[artifact].[ext]"
        );
    }

    #[test]
    fn maven_local_points_into_home() {
        let resolver = predefined_resolver(Predefined::MavenLocal, &context()).unwrap();
        assert_eq!(resolver.name, "Maven2 Local");
        assert_eq!(
            resolver.kind,
            ResolverKind::Maven {
                root: Url::parse("file:///home/builder/.m2/repository/").unwrap()
            }
        );
    }

    #[test]
    fn local_uses_ivy_user_directory() {
        let resolver = predefined_resolver(Predefined::Local, &context()).unwrap();
        match resolver.kind {
            ResolverKind::Pattern { artifact_patterns, .. } => assert_eq!(
                artifact_patterns[0],
                "file:///home/builder/.ivy2/local/[organisation]/[module]/[revision]/[type]s/[artifact](-[classifier]).[ext]"
            ),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let repositories = vec![
            Repository::maven("company", "https://a.example.com/maven2").unwrap(),
            Repository::maven("company", "https://b.example.com/maven2").unwrap(),
        ];
        let err = assemble(&repositories, &context()).unwrap_err();
        assert!(matches!(err, BootError::Configuration(_)));
    }
}
