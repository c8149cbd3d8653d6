//! Batch driver and per-command streaming.
//!
//! Applications are installed one after another. Each goes through
//! `Validating → PreInstall → DependencyCheck → Installing → PostInstall →
//! ThemeApply → Registering → Done`; any error moves it to `Failed` and the
//! batch carries on with the next app. Cancellation is the exception: it
//! stops the whole batch and is returned to the caller.
//!
//! Every spawned command gets three tasks (stdout pump, stderr pump and the
//! password watcher) which are always joined before the command is
//! considered finished.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::process::ChildStdin;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::model::AppConfig;
use super::phase::{Phase, RunningInstall};
use super::plan::{PlannedCommand, check_app, plan_install, plan_sources, plan_steps};
use super::prompt::{SharedStdin, watch_prompts};
use super::pump::pump_output;
use super::theme::{copy_theme, select_theme, theme_key};
use crate::config::InstallerConfig;
use crate::download::{DownloadPolicy, ScriptGuard};
use crate::error::{ExecutionError, InstallError};
use crate::event::{EventSink, InstallEvent, LogEvent, LogLevel, LogSource, publish};
use crate::repository::SharedRepository;
use crate::security::PatternSet;
use crate::shell::{CommandExecutor, DeadlineToken};
use crate::utils::paths::home_dir;

/// How long output may keep flowing after the child has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Outcome of a batch that was not cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: Vec<String>,
    /// `(app, reason)` pairs.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives installs and streams their output to an [`EventSink`].
pub struct StreamingInstaller {
    executor: CommandExecutor,
    guard: ScriptGuard,
    repository: SharedRepository,
    events: EventSink,
    token: CancellationToken,
    config: InstallerConfig,
    home: Option<PathBuf>,
}

impl StreamingInstaller {
    /// Build with the built-in patterns at the configured security level.
    pub fn new(
        config: InstallerConfig,
        repository: SharedRepository,
        events: EventSink,
    ) -> Result<Self, InstallError> {
        let patterns = Arc::new(PatternSet::builtin()?);
        let executor = CommandExecutor::secure(config.security_level, patterns);
        Self::with_executor(config, executor, repository, events)
    }

    pub fn with_executor(
        config: InstallerConfig,
        executor: CommandExecutor,
        repository: SharedRepository,
        events: EventSink,
    ) -> Result<Self, InstallError> {
        let guard = ScriptGuard::new(DownloadPolicy::from_config(&config))?;
        Ok(Self {
            executor,
            guard,
            repository,
            events,
            token: CancellationToken::new(),
            config,
            home: home_dir(),
        })
    }

    /// Home directory used for `~` in copy steps and theme destinations.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// The root signal; cancelling it stops the batch.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Install `apps` in order.
    ///
    /// Per-app failures are collected in the report; only cancellation makes
    /// this return an error.
    pub async fn run_batch(&self, apps: &[AppConfig]) -> Result<BatchReport, InstallError> {
        let total = apps.len();
        let mut report = BatchReport::default();
        info!("starting batch of {} apps at {} level", total, self.executor.level());

        for (index, app) in apps.iter().enumerate() {
            if self.token.is_cancelled() {
                warn!("batch cancelled before {}", app.name);
                self.log(LogLevel::Warn, &app.name, "installation cancelled");
                return Err(InstallError::Cancelled);
            }

            publish(
                &self.events,
                InstallEvent::AppStarted {
                    name: app.name.clone(),
                    index,
                    total,
                },
            );

            match self.install_app(app).await {
                Ok(()) => {
                    report.completed.push(app.name.clone());
                    self.complete(&app.name, None);
                }
                Err(e) if e.is_cancelled() => {
                    self.complete(&app.name, Some(e.to_string()));
                    return Err(InstallError::Cancelled);
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.complete(&app.name, Some(reason.clone()));
                    report.failed.push((app.name.clone(), reason));
                }
            }
        }

        info!(
            "batch finished: {} completed, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn install_app(&self, app: &AppConfig) -> Result<(), InstallError> {
        let mut install = RunningInstall::new(&app.name);

        let outcome = AssertUnwindSafe(self.drive(&mut install, app))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(InstallError::Panicked(panic_message(panic.as_ref()))));

        match outcome {
            Ok(()) => {
                info!("{} installed in {:?}", app.name, install.elapsed());
                Ok(())
            }
            Err(e) => {
                let phase = install.phase().to_string();
                install.fail(&e.to_string());
                if e.is_cancelled() {
                    warn!("{} cancelled during {}", app.name, phase);
                    self.log(LogLevel::Warn, &app.name, format!("cancelled during {}", phase));
                } else {
                    error!("{} failed during {}: {}", app.name, phase, e);
                    self.log(LogLevel::Error, &app.name, format!("failed during {}: {}", phase, e));
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, install: &mut RunningInstall, app: &AppConfig) -> Result<(), InstallError> {
        self.enter(install, Phase::Validating)?;
        check_app(app)?;
        let home = self.home.as_deref();
        let pre = plan_steps(&app.pre_install, home);
        let sources = plan_sources(&app.sources);
        let main = plan_install(&app.method);
        let post = plan_steps(&app.post_install, home);
        for planned in pre.iter().chain(&sources).chain(&main).chain(&post) {
            self.prevalidate(planned)?;
        }

        self.enter(install, Phase::PreInstall)?;
        self.run_plan(&app.name, &pre).await?;

        if !sources.is_empty() {
            self.enter(install, Phase::DependencyCheck)?;
            self.run_plan(&app.name, &sources).await?;
        }

        self.enter(install, Phase::Installing)?;
        self.run_plan(&app.name, &main).await?;

        self.enter(install, Phase::PostInstall)?;
        self.run_plan(&app.name, &post).await?;

        if !app.themes.is_empty() {
            self.enter(install, Phase::ThemeApply)?;
            self.apply_theme(app).await;
        }

        self.enter(install, Phase::Registering)?;
        self.register(&app.name).await?;

        self.enter(install, Phase::Done)
    }

    fn enter(&self, install: &mut RunningInstall, phase: Phase) -> Result<(), InstallError> {
        debug!("{}: {} -> {}", install.app(), install.phase(), phase);
        self.log(LogLevel::Debug, install.app(), phase.to_string());
        install.advance(phase)
    }

    /// Reject the whole app up front if any of its commands would be rejected.
    fn prevalidate(&self, planned: &PlannedCommand) -> Result<(), InstallError> {
        match planned {
            PlannedCommand::Run(command) | PlannedCommand::Shell(command) => {
                self.executor.validate(command)?;
            }
            PlannedCommand::RemoteScript(url) => {
                self.guard.check_url(url)?;
            }
            PlannedCommand::Delay(_) => {}
        }
        Ok(())
    }

    async fn run_plan(&self, app: &str, plan: &[PlannedCommand]) -> Result<(), InstallError> {
        for planned in plan {
            match planned {
                PlannedCommand::Run(command) => self.run_command(app, command, false).await?,
                PlannedCommand::Shell(snippet) => self.run_command(app, snippet, true).await?,
                PlannedCommand::Delay(duration) => self.delay(*duration).await?,
                PlannedCommand::RemoteScript(url) => {
                    self.log(LogLevel::Info, app, format!("fetching install script {}", url));
                    self.guard
                        .fetch_and_run(&self.token, url, app, |command| async move {
                            self.run_command(app, &command, false).await
                        })
                        .await?
                }
            }
        }
        Ok(())
    }

    /// Sleep that gives way to cancellation.
    async fn delay(&self, duration: Duration) -> Result<(), InstallError> {
        tokio::select! {
            _ = self.token.cancelled() => Err(InstallError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Spawn one command and stream it to completion.
    async fn run_command(&self, app: &str, command: &str, shell: bool) -> Result<(), InstallError> {
        self.log(LogLevel::Info, app, format!("$ {}", command));
        let mut handle = if shell {
            self.executor.execute_shell(&self.token, command)?
        } else {
            self.executor.execute(&self.token, command)?
        };
        debug!("{} running as pid {:?}", app, handle.id());

        let scope = DeadlineToken::new(&self.token, self.config.command_timeout());
        let pumps = scope.token().child_token();
        let stdin: SharedStdin<ChildStdin> = Arc::new(Mutex::new(handle.take_stdin()));
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();

        let mut tasks: JoinSet<usize> = JoinSet::new();
        if let Some(stdout) = handle.take_stdout() {
            let (events, app, token) = (self.events.clone(), app.to_string(), pumps.clone());
            tasks.spawn(async move {
                pump_output(stdout, LogSource::Stdout, app, events, None, token).await;
                0
            });
        }
        match handle.take_stderr() {
            Some(stderr) => {
                let (events, app, token) = (self.events.clone(), app.to_string(), pumps.clone());
                tasks.spawn(async move {
                    pump_output(stderr, LogSource::Stderr, app, events, Some(chunk_tx), token).await;
                    0
                });
            }
            None => drop(chunk_tx),
        }
        tasks.spawn(watch_prompts(
            chunk_rx,
            stdin.clone(),
            self.events.clone(),
            app.to_string(),
            self.config.password_timeout(),
            pumps.clone(),
        ));

        let status = handle.wait(&scope).await;

        if tokio::time::timeout(DRAIN_GRACE, join_all(&mut tasks)).await.is_err() {
            debug!("{}: output still open after exit, stopping pumps", app);
            pumps.cancel();
            join_all(&mut tasks).await;
        }
        drop(stdin.lock().await.take());

        let status = status?;
        if !status.success() {
            return Err(ExecutionError::NonZeroExit {
                command: command.to_string(),
                code: status.code(),
            }
            .into());
        }
        Ok(())
    }

    /// Theme problems are reported but never fail the install.
    async fn apply_theme(&self, app: &AppConfig) {
        let key = theme_key(&app.name);
        let stored = self.repository.read().await.get(&key);
        let stored = match stored {
            Ok(stored) => stored,
            Err(e) => {
                warn!("could not read theme preference for {}: {}", app.name, e);
                None
            }
        };

        let Some(theme) = select_theme(&app.themes, stored.as_deref()) else {
            return;
        };

        if stored.as_deref() != Some(theme.name.as_str()) {
            let saved = self.repository.write().await.set(&key, &theme.name);
            if let Err(e) = saved {
                warn!("could not store theme preference for {}: {}", app.name, e);
                self.log(LogLevel::Warn, &app.name, format!("theme preference not saved: {}", e));
            }
        }

        match copy_theme(theme, self.home.as_deref()).await {
            Ok(path) => self.log(
                LogLevel::Info,
                &app.name,
                format!("applied theme {} to {}", theme.name, path.display()),
            ),
            Err(e) => {
                warn!("theme {} for {} not applied: {}", theme.name, app.name, e);
                self.log(LogLevel::Warn, &app.name, format!("theme {} not applied: {}", theme.name, e));
            }
        }
    }

    async fn register(&self, app: &str) -> Result<(), InstallError> {
        let result = self.repository.write().await.add_app(app);
        match result {
            Ok(()) => {
                debug!("registered {}", app);
                Ok(())
            }
            Err(e) if self.config.registration_fatal => Err(e.into()),
            Err(e) => {
                warn!("could not register {}: {}", app, e);
                self.log(LogLevel::Warn, app, format!("installed but not recorded: {}", e));
                Ok(())
            }
        }
    }

    fn complete(&self, name: &str, error: Option<String>) {
        publish(
            &self.events,
            InstallEvent::AppComplete {
                name: name.to_string(),
                error,
            },
        );
    }

    fn log(&self, level: LogLevel, app: &str, text: impl Into<String>) {
        publish(
            &self.events,
            InstallEvent::Log(LogEvent::new(level, LogSource::Installer, app, text)),
        );
    }
}

async fn join_all(tasks: &mut JoinSet<usize>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("output task panicked: {}", e);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
