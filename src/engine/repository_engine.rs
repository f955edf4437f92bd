use crate::engine::pattern::{PatternTokens, substitute};
use crate::engine::transport::{Transport, local_path};
use crate::engine::{
    EngineContext, LogOptions, MessageLevel, ModuleDescriptor, ModuleId, ModuleRevisionId,
    ResolveEngine, ResolveOptions, ResolveReport, ResolvedArtifact, RetrieveOptions,
    RetrieveReport, UnresolvedDependency,
};
use crate::error::{BootError, Result};
use crate::maven::{Pom, revision};
use crate::repository::assembler::{Resolver, ResolverChain, ResolverKind};
use anyhow::anyhow;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use url::Url;

const JAR: &str = "jar";

#[derive(Debug, Clone)]
struct PendingDependency {
    id: ModuleRevisionId,
    conf: String,
    transitive: bool,
    forced: bool,
}

#[derive(Debug, Clone)]
struct LocatedModule {
    id: ModuleRevisionId,
    resolver: String,
    conf: String,
    forced: bool,
    artifact: Option<Url>,
    dependencies: Vec<ModuleRevisionId>,
    skipped: Vec<String>,
}

/// Resolves modules against the settings' default resolver chain and keeps
/// the resolved artifacts of each module for a later retrieve.
#[derive(Debug, Default)]
pub struct RepositoryEngine {
    transport: Transport,
    resolved: Mutex<HashMap<ModuleRevisionId, Vec<ResolvedArtifact>>>,
}

impl RepositoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn locate(
        &self,
        context: &mut EngineContext<'_>,
        chain: &ResolverChain,
        pending: &PendingDependency,
        options: &ResolveOptions,
    ) -> anyhow::Result<Option<LocatedModule>> {
        let mut tried = Vec::new();
        let mut last_error = None;

        for resolver in &chain.resolvers {
            context
                .logger
                .debug(&format!("\ttrying {} in {}", pending.id, resolver.name));
            match self.find_in(resolver, pending, &mut tried) {
                Ok(Some(located)) => {
                    context.logger.log(
                        &format!("\tfound {} in {}", located.id, located.resolver),
                        chatter_level(options),
                    );
                    for reason in &located.skipped {
                        context.logger.verbose(&format!("\tnot following {reason}"));
                    }
                    return Ok(Some(located));
                }
                Ok(None) => {}
                Err(e) => {
                    context.logger.warn(&format!(
                        "\t{}: problem while looking for {}: {e}",
                        resolver.name, pending.id
                    ));
                    last_error = Some(e.context(format!("{} in {}", pending.id, resolver.name)));
                }
            }
        }

        if let Some(error) = last_error {
            return Err(error);
        }

        context
            .logger
            .warn(&format!("\tmodule not found: {}", pending.id));
        for location in tried {
            context.logger.verbose(&format!("\t  tried {location}"));
        }
        Ok(None)
    }

    fn find_in(
        &self,
        resolver: &Resolver,
        pending: &PendingDependency,
        tried: &mut Vec<String>,
    ) -> anyhow::Result<Option<LocatedModule>> {
        let id = &pending.id;
        let located = |artifact: Option<Url>,
                       dependencies: Vec<ModuleRevisionId>,
                       skipped: Vec<String>| LocatedModule {
            id: id.clone(),
            resolver: resolver.name.clone(),
            conf: pending.conf.clone(),
            forced: pending.forced,
            artifact,
            dependencies,
            skipped,
        };

        match &resolver.kind {
            ResolverKind::Maven { root } => {
                let base = format!(
                    "{}/{}/{}/{}",
                    root.as_str().trim_end_matches('/'),
                    id.organisation.replace('.', "/"),
                    id.name,
                    id.revision
                );
                let pom_url = Url::parse(&format!("{base}/{}-{}.pom", id.name, id.revision))?;
                let jar_url = Url::parse(&format!("{base}/{}-{}.jar", id.name, id.revision))?;

                tried.push(pom_url.to_string());
                if let Some(text) = self.transport.fetch_text(&pom_url)? {
                    let pom = Pom::parse(&text)?;
                    let declared = pom.runtime_dependencies();
                    let dependencies = declared
                        .dependencies
                        .into_iter()
                        .map(|d| ModuleRevisionId::new(d.group, d.artifact, d.version))
                        .collect();
                    let artifact = pom.has_jar().then_some(jar_url);
                    return Ok(Some(located(artifact, dependencies, declared.skipped)));
                }

                tried.push(jar_url.to_string());
                if self.transport.exists(&jar_url)? {
                    return Ok(Some(located(Some(jar_url), Vec::new(), Vec::new())));
                }
                Ok(None)
            }
            ResolverKind::Pattern {
                artifact_patterns, ..
            } => {
                let tokens = PatternTokens::for_artifact(
                    &id.organisation,
                    &id.name,
                    &id.revision,
                    &id.name,
                    JAR,
                    JAR,
                );
                for pattern in artifact_patterns {
                    let url = Url::parse(&substitute(pattern, &tokens)?)?;
                    tried.push(url.to_string());
                    if self.transport.exists(&url)? {
                        return Ok(Some(located(Some(url), Vec::new(), Vec::new())));
                    }
                }
                Ok(None)
            }
        }
    }

    fn fetch_artifact(
        &self,
        context: &mut EngineContext<'_>,
        module: &LocatedModule,
        url: &Url,
        options: &ResolveOptions,
    ) -> Result<PathBuf> {
        let settings = context.settings;
        let cache = &settings.cache;

        if let Some(origin) = local_path(url) {
            if cache.use_origin {
                context.logger.log(
                    &format!("\tusing {} in place", origin.display()),
                    chatter_level(options),
                );
                return Ok(origin);
            }
        }

        let cached = cache_path(&cache.dir, &module.id);
        if cached.is_file() {
            context
                .logger
                .log(&format!("\t{} found in cache", module.id), chatter_level(options));
            return Ok(cached);
        }

        context.logger.info(&format!("downloading {url} ..."));
        let started = Instant::now();
        self.transport.download(url, &cached)?;
        context.logger.info(&format!(
            "\t[SUCCESSFUL ] {}!{}.{JAR} ({}ms)",
            module.id,
            module.id.name,
            started.elapsed().as_millis()
        ));
        Ok(cached)
    }

    fn resolved_artifacts(&self, module: &ModuleRevisionId) -> Result<Vec<ResolvedArtifact>> {
        let resolved = self
            .resolved
            .lock()
            .map_err(|_| BootError::Engine("resolution cache is poisoned".to_string()))?;
        resolved
            .get(module)
            .cloned()
            .ok_or_else(|| BootError::Engine(format!("{module} has not been resolved")))
    }
}

impl ResolveEngine for RepositoryEngine {
    fn resolve(
        &self,
        context: &mut EngineContext<'_>,
        module: &ModuleDescriptor,
        options: &ResolveOptions,
    ) -> Result<ResolveReport> {
        let settings = context.settings;
        let chain = settings
            .default_resolver()
            .ok_or_else(|| BootError::Engine("no default resolver configured".to_string()))?;

        let mut report = ResolveReport::new(module.revision_id.clone());
        context.logger.log(
            &format!(
                ":: resolving dependencies :: {} [{}] confs: [{}]",
                module.revision_id,
                module.status,
                module.public_configurations().join(", ")
            ),
            chatter_level(options),
        );
        for dep in &module.dependencies {
            for mapping in &dep.configurations {
                context.logger.debug(&format!(
                    "\t{} {}->{}",
                    dep.revision_id, mapping.module_conf, mapping.dependency_conf
                ));
            }
        }

        let mut queue: VecDeque<PendingDependency> = module
            .dependencies
            .iter()
            .map(|dep| PendingDependency {
                id: dep.revision_id.clone(),
                conf: dep
                    .module_configurations()
                    .next()
                    .unwrap_or("default")
                    .to_string(),
                transitive: dep.transitive,
                forced: dep.force,
            })
            .collect();
        let mut selected: BTreeMap<ModuleId, LocatedModule> = BTreeMap::new();
        let mut failed: HashSet<ModuleRevisionId> = HashSet::new();

        while let Some(pending) = queue.pop_front() {
            if failed.contains(&pending.id) {
                continue;
            }
            if let Some(current) = selected.get(&pending.id.module_id()) {
                if current.id == pending.id {
                    continue;
                }
                let keep_current = current.forced
                    || (!pending.forced
                        && !revision::is_newer(&pending.id.revision, &current.id.revision));
                let (winner, loser) = if keep_current {
                    (&current.id, &pending.id)
                } else {
                    (&pending.id, &current.id)
                };
                context
                    .logger
                    .verbose(&format!("\t{loser} evicted by {winner}"));
                if keep_current {
                    continue;
                }
            }

            match self.locate(context, chain, &pending, options) {
                Ok(Some(mut located)) => {
                    if pending.transitive {
                        queue.extend(located.dependencies.iter().map(|id| PendingDependency {
                            id: id.clone(),
                            conf: pending.conf.clone(),
                            transitive: true,
                            forced: false,
                        }));
                    } else {
                        located.dependencies.clear();
                    }
                    selected.insert(pending.id.module_id(), located);
                }
                Ok(None) => {
                    let message = format!("unresolved dependency: {}: not found", pending.id);
                    failed.insert(pending.id.clone());
                    report.unresolved.push(UnresolvedDependency {
                        id: pending.id,
                        problem: Some(anyhow!(message.clone())),
                    });
                    report.problems.push(message);
                }
                Err(problem) => {
                    let message = format!("unresolved dependency: {}: {problem}", pending.id);
                    failed.insert(pending.id.clone());
                    report.unresolved.push(UnresolvedDependency {
                        id: pending.id,
                        problem: Some(problem),
                    });
                    report.problems.push(message);
                }
            }
        }

        // Evicted revisions may have pulled in modules nothing else needs.
        let roots: Vec<ModuleId> = module
            .dependencies
            .iter()
            .map(|dep| dep.revision_id.module_id())
            .collect();
        let live = reachable(&roots, &selected);
        selected.retain(|id, located| {
            let keep = live.contains(id);
            if !keep {
                context.logger.verbose(&format!(
                    "\tdropping {}: only required by evicted revisions",
                    located.id
                ));
            }
            keep
        });
        let unresolved = std::mem::take(&mut report.unresolved);
        let problems = std::mem::take(&mut report.problems);
        for (dependency, problem) in unresolved.into_iter().zip(problems) {
            if live.contains(&dependency.id.module_id()) {
                report.unresolved.push(dependency);
                report.problems.push(problem);
            }
        }

        if report.has_error() {
            context.logger.warn("\t:: UNRESOLVED DEPENDENCIES ::");
            for unresolved in &report.unresolved {
                context.logger.warn(&format!("\t:: {}", unresolved.id));
            }
            return Ok(report);
        }

        for located in selected.values() {
            let Some(url) = &located.artifact else {
                continue;
            };
            match self.fetch_artifact(context, located, url, options) {
                Ok(location) => report.artifacts.push(ResolvedArtifact {
                    module: located.id.clone(),
                    name: located.id.name.clone(),
                    kind: JAR.to_string(),
                    ext: JAR.to_string(),
                    conf: located.conf.clone(),
                    location,
                }),
                Err(e) => {
                    let message = format!("download failed: {url}");
                    context.logger.error(&format!("\t{message}: {e}"));
                    report.unresolved.push(UnresolvedDependency {
                        id: located.id.clone(),
                        problem: Some(anyhow::Error::new(e).context(message.clone())),
                    });
                    report.problems.push(message);
                }
            }
        }

        if !report.has_error() {
            context.logger.log(
                &format!(
                    "\t:: resolution report :: {} modules, {} artifacts",
                    selected.len(),
                    report.artifacts.len()
                ),
                chatter_level(options),
            );
            self.resolved
                .lock()
                .map_err(|_| BootError::Engine("resolution cache is poisoned".to_string()))?
                .insert(module.revision_id.clone(), report.artifacts.clone());
        }

        Ok(report)
    }

    fn retrieve(
        &self,
        context: &mut EngineContext<'_>,
        module: &ModuleRevisionId,
        pattern: &str,
        options: &RetrieveOptions,
    ) -> Result<RetrieveReport> {
        let artifacts = self.resolved_artifacts(module)?;
        context
            .logger
            .info(&format!(":: retrieving :: {module}"));

        let mut report = RetrieveReport::default();
        let mut seen = HashSet::new();
        for artifact in &artifacts {
            let tokens = PatternTokens::for_artifact(
                &artifact.module.organisation,
                &artifact.module.name,
                &artifact.module.revision,
                &artifact.name,
                &artifact.kind,
                &artifact.ext,
            )
            .with("conf", artifact.conf.clone());
            let destination = context.settings.base_dir.join(substitute(pattern, &tokens)?);
            if !seen.insert(destination.clone()) {
                continue;
            }

            if !options.overwrite && is_up_to_date(&artifact.location, &destination)? {
                report.up_to_date.push(destination);
                continue;
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&artifact.location, &destination)?;
            context.logger.verbose(&format!(
                "\tretrieved {} to {}",
                artifact.location.display(),
                destination.display()
            ));
            report.copied.push(destination);
        }

        context.logger.info(&format!(
            "\t{} artifacts copied, {} already retrieved",
            report.copied.len(),
            report.up_to_date.len()
        ));
        Ok(report)
    }
}

fn chatter_level(options: &ResolveOptions) -> MessageLevel {
    match options.log {
        LogOptions::Default => MessageLevel::Info,
        LogOptions::DownloadOnly => MessageLevel::Verbose,
    }
}

/// Modules reachable from `roots` through the dependencies of selected revisions.
fn reachable(
    roots: &[ModuleId],
    selected: &BTreeMap<ModuleId, LocatedModule>,
) -> HashSet<ModuleId> {
    let mut live = HashSet::new();
    let mut stack = roots.to_vec();
    while let Some(id) = stack.pop() {
        if !live.insert(id.clone()) {
            continue;
        }
        if let Some(located) = selected.get(&id) {
            stack.extend(located.dependencies.iter().map(ModuleRevisionId::module_id));
        }
    }
    live
}

fn cache_path(cache_dir: &Path, id: &ModuleRevisionId) -> PathBuf {
    cache_dir
        .join(&id.organisation)
        .join(&id.name)
        .join("jars")
        .join(format!("{}-{}.{JAR}", id.name, id.revision))
}

fn is_up_to_date(source: &Path, destination: &Path) -> Result<bool> {
    if !destination.is_file() {
        return Ok(false);
    }
    Ok(fs::metadata(source)?.len() == fs::metadata(destination)?.len())
}
