//! CLI smoke entry point.
//!
//! # Responsibility
//! - Boot a kernel against a package directory on disk.
//! - Report discovered packages and, optionally, launch one of them.

use async_trait::async_trait;
use clap::Parser;
use deskshell_core::package::{ManifestSource, ResourceKind, ResourceLoader};
use deskshell_core::{
    init_logging, launcher_fn, module_fn, Application, BootReport, ConfigOverrides, Core,
    DirResourceLoader, FileManifestSource, LaunchArgs, LaunchOptions, LogLevel,
    LoopbackTransport, ModuleCatalog, PackageManager, PackageMetadata, PackageServiceProvider,
    PageLocation, ProviderError, ProviderOptions, ServiceProvider, ServiceValue,
    NOTIFICATION_SERVICE, PACKAGES_SERVICE,
};
use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "deskshell")]
#[command(about = "Boot the deskshell kernel against a package directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the manifest and the package resource root
    #[arg(long, env = "DESKSHELL_ROOT", default_value = ".")]
    root: PathBuf,

    /// Directory for rolling log files, relative to the working directory
    /// unless absolute
    #[arg(long, env = "DESKSHELL_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, env = "DESKSHELL_LOG_LEVEL")]
    level: Option<String>,

    /// JSON file with configuration overrides
    #[arg(long, env = "DESKSHELL_CONFIG")]
    config: Option<PathBuf>,

    /// Package to launch once the kernel is up
    #[arg(long)]
    run: Option<String>,
}

/// Logs notifications; the CLI has no desktop to show them on.
struct LogNotifications;

#[async_trait]
impl ServiceProvider for LogNotifications {
    fn name(&self) -> &str {
        "notifications"
    }

    async fn init(&self, core: &Core) -> Result<(), ProviderError> {
        core.instance(NOTIFICATION_SERVICE, |_core, args| {
            for notice in args {
                warn!(
                    "event=notification module=cli title={} message={}",
                    notice.get("title").and_then(Value::as_str).unwrap_or(""),
                    notice.get("message").and_then(Value::as_str).unwrap_or("")
                );
            }
            let value: ServiceValue = Arc::new(());
            Ok(value)
        });
        Ok(())
    }
}

/// Application started by the console launcher.
struct ConsoleApp {
    name: String,
}

impl Application for ConsoleApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn destroy(&self) {
        info!("event=app_destroy module=cli package={}", self.name);
    }
}

/// Binds every package that ships a script to a console launcher. The
/// module runs when the package's last script loads.
fn console_catalog(packages: &[PackageMetadata], resource_root: &str) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    for package in packages {
        let Some(script) = package
            .resource_urls(resource_root)
            .into_iter()
            .filter(|url| ResourceKind::of(url) == ResourceKind::Script)
            .last()
        else {
            continue;
        };
        let name = package.name.clone();
        catalog.insert(
            script,
            module_fn(move |registrar| {
                registrar.register(
                    &name,
                    launcher_fn(|_core, args, _options, metadata| {
                        info!(
                            "event=console_launch module=cli package={} args={}",
                            metadata.name,
                            Value::Object(args.clone())
                        );
                        let app: Arc<dyn Application> = Arc::new(ConsoleApp {
                            name: metadata.name.clone(),
                        });
                        Ok(app)
                    }),
                )
            }),
        );
    }
    catalog
}

/// Builds a kernel serving packages from `root`. Nothing is booted yet.
async fn build_core(root: &Path, overrides: ConfigOverrides) -> Arc<Core> {
    let core = Core::new(PageLocation::localhost(), Arc::new(LoopbackTransport::new()));
    core.configure(overrides);
    let config = core.configuration();

    let manifest = FileManifestSource::new(root.join(&config.manifest));
    let packages = match manifest.fetch().await {
        Ok(packages) => packages,
        Err(err) => {
            warn!("event=console_catalog module=cli status=skipped error={}", err);
            Vec::new()
        }
    };
    let source: Arc<dyn ManifestSource> = Arc::new(manifest);
    let loader: Arc<dyn ResourceLoader> = Arc::new(DirResourceLoader::new(
        root,
        console_catalog(&packages, &config.resource_root),
    ));

    core.register(
        |_core, _args| {
            let provider: Arc<dyn ServiceProvider> = Arc::new(LogNotifications);
            Ok(provider)
        },
        ProviderOptions::before(),
    );
    core.register(
        PackageServiceProvider::constructor(source, loader),
        ProviderOptions::before(),
    );
    core
}

fn start_logging(cli: &Cli) -> Result<(), String> {
    let level = cli
        .level
        .clone()
        .unwrap_or_else(|| LogLevel::build_default().to_string());
    let log_dir = if cli.log_dir.is_absolute() {
        cli.log_dir.clone()
    } else {
        std::env::current_dir()
            .map_err(|err| format!("failed to resolve working directory: {err}"))?
            .join(&cli.log_dir)
    };
    let log_dir = log_dir
        .to_str()
        .ok_or_else(|| format!("log_dir is not valid UTF-8: {}", log_dir.display()))?
        .to_string();
    init_logging(&level, &log_dir)
}

fn load_overrides(path: Option<&PathBuf>) -> Result<ConfigOverrides, String> {
    let Some(path) = path else {
        return Ok(ConfigOverrides::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
    ConfigOverrides::from_json(&raw)
        .map_err(|err| format!("invalid config {}: {err}", path.display()))
}

fn print_report(report: &BootReport) {
    println!(
        "phase={} completed={} providers={}",
        report.phase.as_str(),
        report.completed,
        report.outcomes.len()
    );
    for outcome in report.failures() {
        if let Err(err) = &outcome.result {
            println!("  provider={} error={}", outcome.provider, err);
        }
    }
    if let Some(reason) = &report.abort_reason {
        println!("  aborted: {reason}");
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let overrides = load_overrides(cli.config.as_ref())?;

    let core = build_core(&cli.root, overrides).await;

    print_report(&core.boot().await);
    print_report(&core.start().await);
    println!(
        "connection={}",
        core.connection_uri().unwrap_or_else(|| "none".to_string())
    );

    let packages = core
        .make_as::<PackageManager>(PACKAGES_SERVICE, &[])
        .map_err(|err| err.to_string())?;
    for package in packages.metadata() {
        println!(
            "package name={} files={} mimes={}",
            package.name,
            package.files.len(),
            package.mimes.as_deref().map(|m| m.join(",")).unwrap_or_default()
        );
    }

    if let Some(name) = &cli.run {
        match core.run(name, LaunchArgs::new(), LaunchOptions::new()).await {
            Ok(Some(app)) => println!("launched={}", app.name()),
            Ok(None) => println!("launched=none package={name}"),
            Err(err) => println!("launch_error={err}"),
        }
    }

    core.destroy().map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = start_logging(&cli) {
        eprintln!("logging disabled: {err}");
    }
    info!("event=cli_start module=cli status=ok root={}", cli.root.display());
    println!("deskshell_core version={}", deskshell_core::core_version());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
