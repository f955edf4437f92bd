// Update step of the boot sequence.
//
// `Update::apply` turns one target into a synthetic module, resolves it
// through the configured repository chain and retrieves the artifacts into
// `<boot>/<toolchain version>/...`. Failures come back as one of three kinds:
// configuration, resolution, or unexpected (with a pointer to the log file).
pub mod logger;
pub mod target;

pub use logger::{BENIGN_PREFIX, Console, DiagnosticLogger};
pub use target::{Application, UpdateTarget};

use crate::engine::{
    EngineContext, LogOptions, MessageLogger, RepositoryEngine, ResolveEngine, ResolveOptions,
    ResolveReport, RetrieveOptions,
};
use crate::error::{BootError, Result};
use crate::repository::{Repository, Settings, SettingsContext, assembler};
use crate::utils::boot_dir;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const UPDATE_LOG_NAME: &str = "update.log";

/// Inputs for the update step. Built once per process and never mutated.
#[derive(Debug, Clone)]
pub struct UpdateConfiguration {
    pub boot_directory: PathBuf,
    pub toolchain_version: String,
    /// Resolution priority order.
    pub repositories: Vec<Repository>,
    /// Engine messages starting with any of these are kept out of the console.
    pub suppressed_prefixes: Vec<String>,
}

impl UpdateConfiguration {
    pub fn new(
        boot_directory: impl Into<PathBuf>,
        toolchain_version: impl Into<String>,
        repositories: Vec<Repository>,
    ) -> Self {
        Self {
            boot_directory: boot_directory.into(),
            toolchain_version: toolchain_version.into(),
            repositories,
            suppressed_prefixes: vec![BENIGN_PREFIX.to_string()],
        }
    }

    pub fn with_suppressed_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.suppressed_prefixes = prefixes;
        self
    }
}

/// Drives resolve-then-retrieve for update targets.
///
/// Engine settings are assembled on the first `apply` and reused afterwards.
/// Calls must not overlap: the engine context is exclusive for the duration
/// of a call.
pub struct Update<E: ResolveEngine = RepositoryEngine> {
    config: UpdateConfiguration,
    context: SettingsContext,
    settings: OnceLock<Settings>,
    engine: E,
    console: Console,
    log_file: PathBuf,
}

impl Update<RepositoryEngine> {
    pub fn new(config: UpdateConfiguration) -> Result<Self> {
        let boot_directory = boot_dir::ensure_boot_directory(&config.boot_directory)?;
        let context = SettingsContext::for_boot_directory(boot_directory)?;
        Self::with_engine(config, context, RepositoryEngine::new(), Console::stdout())
    }
}

impl<E: ResolveEngine> Update<E> {
    /// Creates the boot directory if needed and starts a fresh log file.
    pub fn with_engine(
        config: UpdateConfiguration,
        context: SettingsContext,
        engine: E,
        console: Console,
    ) -> Result<Self> {
        let boot_directory = boot_dir::ensure_boot_directory(&config.boot_directory)?;
        let log_file = boot_directory.join(UPDATE_LOG_NAME);
        File::create(&log_file)?;

        Ok(Self {
            config,
            context,
            settings: OnceLock::new(),
            engine,
            console,
            log_file,
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn configuration(&self) -> &UpdateConfiguration {
        &self.config
    }

    /// Settings built from the repository list, assembled on first use.
    pub fn settings(&self) -> Result<&Settings> {
        if let Some(settings) = self.settings.get() {
            return Ok(settings);
        }
        let settings = assembler::assemble(&self.config.repositories, &self.context)?;
        Ok(self.settings.get_or_init(|| settings))
    }

    /// Makes the artifacts for `target` present under the boot directory.
    ///
    /// Every failure is logged and reported on the console before it is
    /// returned; the log file is closed on every path.
    pub fn apply(&self, target: &UpdateTarget) -> Result<()> {
        let mut logger = match DiagnosticLogger::open(
            &self.log_file,
            self.console.clone(),
            &self.config.suppressed_prefixes,
        ) {
            Ok(logger) => logger,
            Err(err) => {
                let summary = err.to_string();
                self.console.println(&summary);
                return Err(BootError::Unexpected {
                    summary,
                    log_file: self.log_file.clone(),
                });
            }
        };
        logger.write_line(&format!("[{}] updating {target}", jiff::Zoned::now()));

        match self.update(target, &mut logger) {
            Ok(()) => Ok(()),
            Err(err @ BootError::Resolution { .. }) => Err(err),
            Err(err @ BootError::Configuration(_)) => {
                let message = err.to_string();
                logger.write_line(&message);
                self.console.println(&message);
                Err(err)
            }
            Err(err) => Err(self.report_unexpected(&mut logger, err)),
        }
    }

    fn update(&self, target: &UpdateTarget, logger: &mut DiagnosticLogger) -> Result<()> {
        let settings = self.settings()?;
        let translation = target::translate(target, &self.config.toolchain_version);
        let module = &translation.module;

        let report = {
            let mut context = EngineContext::new(settings, logger);
            let options = ResolveOptions::default().with_log(LogOptions::DownloadOnly);
            self.engine.resolve(&mut context, module, &options)?
        };

        if report.has_error() {
            log_problems(logger, &report);
            let problems = consolidate(&report.problems);
            self.console.println(&problems.join("\n"));
            return Err(BootError::Resolution { problems });
        }

        let pattern = target::retrieve_destination(
            &self.config.toolchain_version,
            &translation.retrieve_pattern,
        );
        let mut context = EngineContext::new(settings, logger);
        let retrieved = self.engine.retrieve(
            &mut context,
            &report.module,
            &pattern,
            &RetrieveOptions::default(),
        )?;
        logger.verbose(&format!(
            "retrieved {} artifacts into {}",
            retrieved.copied.len() + retrieved.up_to_date.len(),
            self.context.base_dir.display()
        ));
        Ok(())
    }

    fn report_unexpected(&self, logger: &mut DiagnosticLogger, err: BootError) -> BootError {
        let summary = err.to_string();
        logger.write_trace(&anyhow::Error::new(err));
        logger.write_line(&summary);
        self.console.println(&summary);
        self.console.println(&format!(
            "  (see {} for complete log)",
            self.log_file.display()
        ));
        BootError::Unexpected {
            summary,
            log_file: self.log_file.clone(),
        }
    }
}

fn log_problems(logger: &mut DiagnosticLogger, report: &ResolveReport) {
    for unresolved in &report.unresolved {
        if let Some(problem) = &unresolved.problem {
            logger.write_trace(problem);
        }
    }
}

/// Distinct messages, in first-seen order.
fn consolidate(messages: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|m| seen.insert(m.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        ModuleDescriptor, ModuleRevisionId, ResolvedArtifact, RetrieveReport, UnresolvedDependency,
    };
    use crate::repository::Predefined;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Resolve(Vec<ModuleRevisionId>),
        Retrieve(ModuleRevisionId, String),
    }

    /// Engine that answers resolves from a script and records every call.
    #[derive(Default)]
    struct ScriptedEngine {
        problems: Vec<(ModuleRevisionId, String)>,
        fail_retrieve: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl ScriptedEngine {
        fn failing(problems: &[(&str, &str)]) -> Self {
            Self {
                problems: problems
                    .iter()
                    .map(|(name, msg)| {
                        (ModuleRevisionId::new("org.example", *name, "1.0"), msg.to_string())
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl ResolveEngine for ScriptedEngine {
        fn resolve(
            &self,
            context: &mut EngineContext<'_>,
            module: &ModuleDescriptor,
            _options: &ResolveOptions,
        ) -> Result<ResolveReport> {
            self.calls.borrow_mut().push(Call::Resolve(
                module
                    .dependencies
                    .iter()
                    .map(|d| d.revision_id.clone())
                    .collect(),
            ));
            context.logger.verbose(":: resolving dependencies ::");

            let mut report = ResolveReport::new(module.revision_id.clone());
            for (id, message) in &self.problems {
                report.unresolved.push(UnresolvedDependency {
                    id: id.clone(),
                    problem: Some(anyhow!("{message}").context(format!("resolving {id}"))),
                });
                report.problems.push(message.clone());
            }
            if report.unresolved.is_empty() {
                report.artifacts.push(ResolvedArtifact {
                    module: module.revision_id.clone(),
                    name: "artifact".to_string(),
                    kind: "jar".to_string(),
                    ext: "jar".to_string(),
                    conf: "default".to_string(),
                    location: PathBuf::from("/dev/null"),
                });
            }
            Ok(report)
        }

        fn retrieve(
            &self,
            _context: &mut EngineContext<'_>,
            module: &ModuleRevisionId,
            pattern: &str,
            _options: &RetrieveOptions,
        ) -> Result<RetrieveReport> {
            self.calls
                .borrow_mut()
                .push(Call::Retrieve(module.clone(), pattern.to_string()));
            if self.fail_retrieve {
                return Err(BootError::Io(std::io::Error::other("disk full")));
            }
            Ok(RetrieveReport::default())
        }
    }

    struct Harness {
        boot: TempDir,
        home: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                boot: tempdir().unwrap(),
                home: tempdir().unwrap(),
            }
        }

        fn update(
            &self,
            version: &str,
            repositories: Vec<Repository>,
            engine: ScriptedEngine,
        ) -> (Update<ScriptedEngine>, logger::CapturedOutput) {
            let config = UpdateConfiguration::new(self.boot.path(), version, repositories);
            let context = SettingsContext::new(self.boot.path(), self.home.path());
            let (console, output) = Console::capture();
            let update = Update::with_engine(config, context, engine, console).unwrap();
            (update, output)
        }
    }

    fn central() -> Vec<Repository> {
        vec![Repository::Predefined(Predefined::MavenCentral)]
    }

    #[test]
    fn toolchain_update_resolves_then_retrieves_under_version_directory() {
        let harness = Harness::new();
        let (update, output) = harness.update("2.8.1", central(), ScriptedEngine::default());

        update.apply(&UpdateTarget::Toolchain).unwrap();

        let calls = update.engine.calls();
        assert_eq!(
            calls,
            vec![
                Call::Resolve(vec![
                    ModuleRevisionId::new("org.scala-lang", "scala-compiler", "2.8.1"),
                    ModuleRevisionId::new("org.scala-lang", "scala-library", "2.8.1"),
                ]),
                Call::Retrieve(
                    ModuleRevisionId::new("org.scala-tools.sbt", "boot-scala", "1.0"),
                    "2.8.1/lib/[artifact].[ext]".to_string()
                ),
            ]
        );
        assert!(output.contents().is_empty());
    }

    #[test]
    fn empty_repository_list_fails_before_resolving() {
        let harness = Harness::new();
        let (update, output) = harness.update("2.8.1", Vec::new(), ScriptedEngine::default());

        let err = update.apply(&UpdateTarget::Toolchain).unwrap_err();

        assert!(matches!(err, BootError::Configuration(_)));
        assert!(update.engine.calls().is_empty());
        assert_eq!(output.contents(), "No repositories defined.\n");
        let logged = fs::read_to_string(update.log_file()).unwrap();
        assert!(!logged.contains("resolving"));
        assert!(!logged.contains("downloading"));
    }

    #[test]
    fn cross_versioned_application_uses_suffixed_name() {
        let harness = Harness::new();
        let (update, _) = harness.update("2.9.0", central(), ScriptedEngine::default());
        let app = Application::new("org.example", "tool", "1.0", true);

        update.apply(&UpdateTarget::App(app)).unwrap();

        match &update.engine.calls()[..] {
            [Call::Resolve(deps), Call::Retrieve(_, pattern)] => {
                assert_eq!(deps, &vec![ModuleRevisionId::new("org.example", "tool_2.9.0", "1.0")]);
                assert_eq!(
                    pattern,
                    "2.9.0/org.example/tool/1.0(/[component])/[artifact]-[revision].[ext]"
                );
            }
            other => panic!("unexpected calls {other:?}"),
        }
    }

    #[test]
    fn unresolved_dependencies_abort_before_retrieve() {
        let harness = Harness::new();
        let engine = ScriptedEngine::failing(&[
            ("first", "unresolved dependency: org.example#first;1.0: not found"),
            ("second", "unresolved dependency: org.example#second;1.0: not found"),
        ]);
        let (update, output) = harness.update("2.8.1", central(), engine);

        let err = update.apply(&UpdateTarget::Toolchain).unwrap_err();

        match err {
            BootError::Resolution { problems } => assert_eq!(problems.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(update.engine.calls().len(), 1);
        assert_eq!(
            output.contents(),
            "unresolved dependency: org.example#first;1.0: not found\n\
             unresolved dependency: org.example#second;1.0: not found\n"
        );

        let logged = fs::read_to_string(update.log_file()).unwrap();
        assert!(logged.contains("resolving org.example#first;1.0"));
        assert!(logged.contains("resolving org.example#second;1.0"));
    }

    #[test]
    fn repeated_problem_messages_are_printed_once() {
        let harness = Harness::new();
        let engine = ScriptedEngine::failing(&[
            ("first", "download failed: https://example.com"),
            ("second", "download failed: https://example.com"),
        ]);
        let (update, output) = harness.update("2.8.1", central(), engine);

        let err = update.apply(&UpdateTarget::Toolchain).unwrap_err();

        assert!(matches!(err, BootError::Resolution { ref problems } if problems.len() == 1));
        assert_eq!(output.contents(), "download failed: https://example.com\n");
    }

    #[test]
    fn retrieve_failure_is_reported_with_log_pointer() {
        let harness = Harness::new();
        let engine = ScriptedEngine {
            fail_retrieve: true,
            ..ScriptedEngine::default()
        };
        let (update, output) = harness.update("2.8.1", central(), engine);

        let err = update.apply(&UpdateTarget::Toolchain).unwrap_err();

        let log_file = update.log_file().to_path_buf();
        match err {
            BootError::Unexpected { summary, log_file: reported } => {
                assert_eq!(summary, "IO error: disk full");
                assert_eq!(reported, log_file);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            output.contents(),
            format!(
                "IO error: disk full\n  (see {} for complete log)\n",
                log_file.display()
            )
        );
        assert!(fs::read_to_string(&log_file).unwrap().contains("disk full"));
    }

    #[test]
    fn settings_are_assembled_once_and_reused() {
        let harness = Harness::new();
        let (update, _) = harness.update("2.8.1", central(), ScriptedEngine::default());

        update.apply(&UpdateTarget::Toolchain).unwrap();
        let first = update.settings().unwrap() as *const Settings;
        update
            .apply(&UpdateTarget::App(Application::new("org.example", "tool", "1.0", false)))
            .unwrap();
        let second = update.settings().unwrap() as *const Settings;

        assert_eq!(first, second);
        assert_eq!(update.engine.calls().len(), 4);
    }

    #[test]
    fn log_file_is_fresh_per_update_and_kept_across_calls() {
        let harness = Harness::new();
        let log_file = harness.boot.path().join(UPDATE_LOG_NAME);
        fs::write(&log_file, "stale\n").unwrap();

        let (update, _) = harness.update("2.8.1", central(), ScriptedEngine::default());
        update.apply(&UpdateTarget::Toolchain).unwrap();
        update.apply(&UpdateTarget::Toolchain).unwrap();

        let logged = fs::read_to_string(&log_file).unwrap();
        assert!(!logged.contains("stale"));
        assert_eq!(logged.matches("updating toolchain").count(), 2);
    }

    fn publish_jar(root: &Path, group: &str, name: &str, version: &str) {
        let dir = root.join(group.replace('.', "/")).join(name).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{name}-{version}.pom")),
            format!(
                "<project><groupId>{group}</groupId><artifactId>{name}</artifactId><version>{version}</version></project>"
            ),
        )
        .unwrap();
        fs::write(dir.join(format!("{name}-{version}.jar")), name).unwrap();
    }

    fn file_repository(dir: &Path) -> Vec<Repository> {
        vec![Repository::Maven {
            id: "fixture".to_string(),
            root: url::Url::from_directory_path(dir).unwrap(),
        }]
    }

    #[test]
    fn toolchain_lands_in_version_directory_from_local_repository() {
        let (boot, home, repo) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        publish_jar(repo.path(), "org.scala-lang", "scala-compiler", "2.8.1");
        publish_jar(repo.path(), "org.scala-lang", "scala-library", "2.8.1");

        let config = UpdateConfiguration::new(boot.path(), "2.8.1", file_repository(repo.path()));
        let context = SettingsContext::new(boot.path(), home.path());
        let (console, _) = Console::capture();
        let update =
            Update::with_engine(config, context, RepositoryEngine::new(), console).unwrap();

        update.apply(&UpdateTarget::Toolchain).unwrap();

        let lib = boot.path().join("2.8.1/lib");
        assert_eq!(
            fs::read_to_string(lib.join("scala-compiler.jar")).unwrap(),
            "scala-compiler"
        );
        assert_eq!(
            fs::read_to_string(lib.join("scala-library.jar")).unwrap(),
            "scala-library"
        );
    }

    #[test]
    fn missing_toolchain_is_a_resolution_failure_with_nothing_retrieved() {
        let (boot, home, repo) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        publish_jar(repo.path(), "org.scala-lang", "scala-library", "2.8.1");

        let config = UpdateConfiguration::new(boot.path(), "2.8.1", file_repository(repo.path()));
        let context = SettingsContext::new(boot.path(), home.path());
        let (console, output) = Console::capture();
        let update =
            Update::with_engine(config, context, RepositoryEngine::new(), console).unwrap();

        let err = update.apply(&UpdateTarget::Toolchain).unwrap_err();

        match err {
            BootError::Resolution { problems } => {
                assert!(problems.iter().any(|p| p.contains("scala-compiler")));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(output.contents().contains("scala-compiler"));
        assert!(!boot.path().join("2.8.1").exists());
    }

    #[test]
    #[ignore = "requires network access to Maven Central"]
    fn fetches_toolchain_from_maven_central() {
        let boot = tempdir().unwrap();
        let config = UpdateConfiguration::new(boot.path(), "2.8.1", central());
        let update = Update::new(config).unwrap();

        update.apply(&UpdateTarget::Toolchain).unwrap();

        let lib = boot.path().join("2.8.1/lib");
        assert!(lib.join("scala-compiler.jar").is_file());
        assert!(lib.join("scala-library.jar").is_file());
    }

    #[test]
    fn consolidate_keeps_first_occurrence_order() {
        let messages = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(consolidate(&messages), vec!["b", "a"]);
    }
}
