//! Phase orchestration over sandboxed language executors.
//!
//! Runs {format?, build?, test?} in order against one snapshot, skipping
//! tests when a requested build failed. A global semaphore caps how many
//! snapshots execute at once; waiting for a slot honors cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use pf_domain::config::{RunnerConfig, RunnerKind};
use pf_domain::error::{Error, Result};
use pf_domain::exercise::CheckRecipe;
use pf_domain::session::{CodeSnapshot, RunPhases, RunResult};

use crate::executor::{default_executors, Language, LanguageExecutor};
use crate::sandbox::{DockerSandbox, ExecSpec, LocalSandbox, Sandbox};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ExecutionOrchestrator {
    sandbox: Arc<dyn Sandbox>,
    executors: HashMap<Language, Arc<dyn LanguageExecutor>>,
    semaphore: Arc<Semaphore>,
    config: RunnerConfig,
}

impl ExecutionOrchestrator {
    /// Build the orchestrator, probing the container runtime.
    ///
    /// When docker is configured but unreachable, the local executor is
    /// used instead - same interface, weaker isolation.
    pub async fn new(config: RunnerConfig) -> Self {
        let sandbox: Arc<dyn Sandbox> = match config.kind {
            RunnerKind::Docker => {
                if DockerSandbox::available().await {
                    Arc::new(DockerSandbox::new(&config))
                } else {
                    tracing::warn!(
                        "docker daemon unreachable — falling back to local runner \
                         (no memory/cpu caps, host network reachable)"
                    );
                    Arc::new(LocalSandbox)
                }
            }
            RunnerKind::Local => Arc::new(LocalSandbox),
        };
        tracing::info!(runner = sandbox.kind(), max_concurrent = config.max_concurrent, "execution orchestrator ready");
        Self::with_sandbox(sandbox, config)
    }

    /// Construct with an explicit sandbox (tests, embedding).
    pub fn with_sandbox(sandbox: Arc<dyn Sandbox>, config: RunnerConfig) -> Self {
        Self {
            sandbox,
            executors: default_executors(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1) as usize)),
            config,
        }
    }

    fn executor_for(&self, code: &CodeSnapshot) -> Result<Arc<dyn LanguageExecutor>> {
        let language = Language::detect(code)?;
        self.executors
            .get(&language)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("no executor registered for {language}")))
    }

    fn image_for(&self, executor: &dyn LanguageExecutor) -> String {
        self.config
            .images
            .get(executor.language().as_str())
            .cloned()
            .unwrap_or_else(|| executor.image().to_string())
    }

    fn phase_timeout(&self, recipe: Option<&CheckRecipe>) -> Duration {
        let seconds = recipe
            .and_then(|r| r.timeout_seconds)
            .unwrap_or(self.config.timeout_seconds);
        Duration::from_secs(seconds)
    }

    /// Wait for an execution slot, giving up on cancellation.
    async fn admit(&self, cancel: &CancellationToken) -> Result<tokio::sync::OwnedSemaphorePermit> {
        tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| Error::Internal("run semaphore closed".into()))
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Run the requested phases over a snapshot.
    ///
    /// Sequencing: format → build → test; tests are skipped (and left
    /// `ok = false` with no records) when a requested build failed.
    pub async fn run(
        &self,
        code: &CodeSnapshot,
        phases: RunPhases,
        recipe: Option<&CheckRecipe>,
        cancel: &CancellationToken,
    ) -> Result<RunResult> {
        let _permit = self.admit(cancel).await?;

        let executor = self.executor_for(code)?;
        let image = self.image_for(executor.as_ref());
        let timeout = self.phase_timeout(recipe);
        let started = Instant::now();

        let mut result = RunResult::default();

        if phases.format {
            let outcome = self
                .sandbox
                .exec(ExecSpec {
                    code,
                    argv: executor.format_check_cmd(),
                    image: image.clone(),
                    timeout,
                    cancel: cancel.clone(),
                })
                .await?;
            result.format_ok = outcome.ok();
            result.format_output = outcome.output;
        } else {
            result.format_ok = true;
        }

        let mut build_failed = false;
        if phases.build {
            let outcome = self
                .sandbox
                .exec(ExecSpec {
                    code,
                    argv: executor.build_cmd(),
                    image: image.clone(),
                    timeout,
                    cancel: cancel.clone(),
                })
                .await?;
            result.build_ok = outcome.ok();
            build_failed = !outcome.ok();
            result.diagnostics = executor.parse_diagnostics(&outcome.output);
            result.build_output = outcome.output;
        } else {
            result.build_ok = true;
        }

        if phases.test && !build_failed {
            let flags = recipe.map(|r| r.test_flags.as_slice()).unwrap_or(&[]);
            let outcome = self
                .sandbox
                .exec(ExecSpec {
                    code,
                    argv: executor.test_cmd(flags),
                    image,
                    timeout,
                    cancel: cancel.clone(),
                })
                .await?;
            result.test_ok = outcome.ok();
            result.test_results = executor.parse_tests(&outcome.output);
            result.test_output = outcome.output;
        } else if !phases.test {
            // Tests not requested: vacuously green so `is_green` only
            // reflects what actually ran.
            result.test_ok = !build_failed;
        }
        // Requested build failed: test_ok stays false, no records.

        result.duration_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            language = %executor.language(),
            format_ok = result.format_ok,
            build_ok = result.build_ok,
            test_ok = result.test_ok,
            duration_ms = result.duration_ms,
            "run complete"
        );

        Ok(result)
    }

    /// Rewrite the snapshot to canonical formatting and return it.
    pub async fn format_fix(
        &self,
        code: &CodeSnapshot,
        cancel: &CancellationToken,
    ) -> Result<CodeSnapshot> {
        let _permit = self.admit(cancel).await?;

        let executor = self.executor_for(code)?;
        let image = self.image_for(executor.as_ref());
        let timeout = self.phase_timeout(None);

        let (outcome, fixed) = self
            .sandbox
            .exec_and_collect(ExecSpec {
                code,
                argv: executor.format_fix_cmd(),
                image,
                timeout,
                cancel: cancel.clone(),
            })
            .await?;

        if !outcome.ok() {
            return Err(Error::BadRequest(format!(
                "formatter failed: {}",
                outcome.output
            )));
        }
        Ok(fixed)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
