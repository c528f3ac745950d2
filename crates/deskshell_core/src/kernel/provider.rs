//! Service provider contract and phased boot.
//!
//! # Responsibility
//! - Define the lifecycle every provider exposes to the kernel.
//! - Run one boot phase: `init` each provider in order, then `start` them.
//!
//! # Invariants
//! - `init` failures and expired deadlines are recorded and skipped.
//! - A panic out of `init`, or a kernel destroyed mid-phase, aborts the
//!   phase before any `start` runs.

use crate::kernel::Core;
use crate::package::PackageError;
use async_trait::async_trait;
use futures::FutureExt;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle hooks of a kernel service provider.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Short name used in logs and boot reports.
    fn name(&self) -> &str;

    /// Registers services and prepares state. May suspend.
    async fn init(&self, core: &Core) -> Result<(), ProviderError>;

    /// Called once after every provider in the phase attempted `init`.
    fn start(&self, _core: &Core) {}

    fn destroy(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// How the kernel should treat one registered provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Boot in the `before` phase instead of during `start`.
    pub before: bool,
    /// Passed verbatim to the provider constructor.
    pub args: Option<Value>,
}

impl ProviderOptions {
    pub fn before() -> Self {
        Self {
            before: true,
            args: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }
}

pub(crate) struct ProviderEntry {
    pub(crate) options: ProviderOptions,
    pub(crate) provider: Arc<dyn ServiceProvider>,
}

#[derive(Debug)]
pub enum ProviderError {
    Failed(String),
    Timeout { provider: String, after_ms: u64 },
    Package(PackageError),
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(message) => write!(f, "{message}"),
            Self::Timeout { provider, after_ms } => {
                write!(f, "provider '{provider}' did not finish init within {after_ms}ms")
            }
            Self::Package(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Package(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PackageError> for ProviderError {
    fn from(value: PackageError) -> Self {
        Self::Package(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// Providers registered with `before: true`, run by `Core::boot`.
    Before,
    /// Every other provider, run by `Core::start`.
    Main,
}

impl BootPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Main => "main",
        }
    }

    pub(crate) fn includes(self, options: &ProviderOptions) -> bool {
        match self {
            Self::Before => options.before,
            Self::Main => !options.before,
        }
    }
}

#[derive(Debug)]
pub struct ProviderOutcome {
    pub provider: String,
    pub result: Result<(), ProviderError>,
}

/// What happened during one boot phase.
#[derive(Debug)]
pub struct BootReport {
    pub phase: BootPhase,
    pub outcomes: Vec<ProviderOutcome>,
    /// `false` when the phase aborted before starting its providers.
    pub completed: bool,
    pub abort_reason: Option<String>,
}

impl BootReport {
    fn new(phase: BootPhase) -> Self {
        Self {
            phase,
            outcomes: Vec::new(),
            completed: false,
            abort_reason: None,
        }
    }

    /// Outcomes whose `init` failed or timed out.
    pub fn failures(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    /// Completed with every provider initialized.
    pub fn is_clean(&self) -> bool {
        self.completed && self.failures().next().is_none()
    }
}

pub(crate) async fn run_phase(
    core: &Core,
    phase: BootPhase,
    providers: Vec<Arc<dyn ServiceProvider>>,
    deadline: Duration,
) -> BootReport {
    let started_at = Instant::now();
    let mut report = BootReport::new(phase);
    info!(
        "event=boot_phase module=kernel status=start phase={} providers={}",
        phase.as_str(),
        providers.len()
    );

    if core.is_destroyed() {
        return abort(report, "kernel already destroyed".to_string());
    }

    for provider in &providers {
        if core.is_destroyed() {
            return abort(report, "kernel destroyed during boot".to_string());
        }

        let name = provider.name().to_string();
        let guarded = tokio::time::timeout(deadline, provider.init(core));
        let result = match AssertUnwindSafe(guarded).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(ProviderError::Timeout {
                provider: name.clone(),
                after_ms: deadline.as_millis() as u64,
            }),
            Err(_panic) => {
                return abort(report, format!("provider '{name}' panicked during init"));
            }
        };

        if let Err(err) = &result {
            warn!(
                "event=provider_init module=kernel status=error phase={} provider={} error={}",
                phase.as_str(),
                name,
                err
            );
        }
        report.outcomes.push(ProviderOutcome {
            provider: name,
            result,
        });
    }

    for provider in &providers {
        provider.start(core);
    }

    report.completed = true;
    info!(
        "event=boot_phase module=kernel status=ok phase={} failures={} duration_ms={}",
        phase.as_str(),
        report.failures().count(),
        started_at.elapsed().as_millis()
    );
    report
}

fn abort(mut report: BootReport, reason: String) -> BootReport {
    error!(
        "event=boot_phase module=kernel status=aborted phase={} reason={}",
        report.phase.as_str(),
        reason
    );
    report.abort_reason = Some(reason);
    report
}
