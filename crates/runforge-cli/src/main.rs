// crates/runforge-cli/src/main.rs
// ============================================================================
// Module: Runforge CLI Entry Point
// Description: Command dispatcher for `serve` (HTTP boundary) and
//              `create-run` (one-shot run intake from a JSON payload).
// Purpose: The binary entry point spec.md §6 and §8 describe.
// Dependencies: clap, runforge-{core,registry,secrets,server,workflow}, tokio
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/cli.py`'s `main`: `create-run` loads a JSON payload
//! file, validates and persists it through the same registry the HTTP
//! boundary uses, prints the resulting manifest on success, and on
//! validation failure prints each field error to stderr before exiting 1
//! (spec.md §6's CLI exit code contract: 0 success, 1 validation failure,
//! 2 workflow/runtime error).

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use runforge_core::validation::CreateRunPayload;
use runforge_core::validation::RawCreateRunPayload;
use runforge_core::CoreError;
use runforge_registry::AuditSink;
use runforge_registry::FileAuditSink;
use runforge_registry::NoopAuditSink;
use runforge_registry::RunRegistry;
use runforge_registry::StderrAuditSink;
use runforge_secrets::SecretsManager;
use runforge_workflow::CrawlConfig;
use runforge_workflow::ExecutorPool;
use runforge_workflow::ExplorationConfig;
use runforge_workflow::RetryPolicy;
use runforge_workflow::RunObservability;
use runforge_workflow::WorkflowEngine;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "runforge", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP boundary, reading configuration from the environment.
    Serve,
    /// Validate and create a run from a JSON payload file.
    CreateRun(CreateRunArgs),
}

/// Arguments for `create-run`.
#[derive(Args, Debug)]
struct CreateRunArgs {
    /// Path to a JSON file describing the run request.
    payload: PathBuf,
    /// Directory run partitions are stored under.
    #[arg(long, default_value = "artifacts/runs")]
    storage_root: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => run_serve(),
        Commands::CreateRun(args) => run_create_run(&args),
    }
}

fn run_serve() -> ExitCode {
    let config = match config::load() {
        Ok(config) => config,
        Err(err) => {
            return emit_error(&format!("configuration error: {err}"));
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            return emit_error(&format!("failed to start async runtime: {err}"));
        }
    };

    runtime.block_on(async {
        let audit: Arc<dyn AuditSink> = build_audit_sink(config.audit_sink, &config.storage_root);
        let registry = match RunRegistry::open(config.storage_root.clone(), audit) {
            Ok(registry) => Arc::new(registry),
            Err(err) => {
                return emit_error(&format!("failed to open run registry: {err}"));
            }
        };

        let mut engine = WorkflowEngine::new(
            Arc::clone(&registry),
            Arc::new(runforge_workflow::NoopTelemetry),
            RetryPolicy::default(),
            ExplorationConfig::default(),
            CrawlConfig::default(),
        );
        engine.bind_telemetry(Arc::new(RunObservability::new(config.storage_root.clone())));
        let pool = Arc::new(ExecutorPool::start(config.worker_count, Arc::new(engine)));
        let secrets = Arc::new(SecretsManager::new(config.secrets.clone()));

        let state = runforge_server::build_state(
            Arc::clone(&registry),
            Arc::clone(&pool),
            secrets,
            config.alert_webhook_token.clone(),
            config.signing_ttl_seconds,
        );

        let server_config = runforge_server::ServerConfig {
            bind: config.bind,
            tls: config.tls.clone(),
            cors: config.cors.clone(),
            state,
        };

        match runforge_server::serve(server_config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => emit_error(&format!("server failed: {err}")),
        }
    })
}

fn build_audit_sink(kind: config::AuditSinkKind, storage_root: &std::path::Path) -> Arc<dyn AuditSink> {
    if kind == config::AuditSinkKind::Stderr {
        return Arc::new(StderrAuditSink);
    }
    match FileAuditSink::new(storage_root) {
        Ok(sink) => Arc::new(sink),
        Err(err) => {
            let _ = write_stderr_line(&format!(
                "failed to open audit log under {}: {err}, falling back to a discarding sink",
                storage_root.display()
            ));
            Arc::new(NoopAuditSink)
        }
    }
}

fn run_create_run(args: &CreateRunArgs) -> ExitCode {
    let contents = match std::fs::read_to_string(&args.payload) {
        Ok(contents) => contents,
        Err(err) => {
            let _ = write_stderr_line(&format!("payload file not found or unreadable: {err}"));
            return ExitCode::from(1);
        }
    };
    let raw: RawCreateRunPayload = match serde_json::from_str(&contents) {
        Ok(raw) => raw,
        Err(err) => {
            let _ = write_stderr_line(&format!("invalid JSON in payload file: {err}"));
            return ExitCode::from(1);
        }
    };

    let payload = match CreateRunPayload::from_raw(raw) {
        Ok(payload) => payload,
        Err(CoreError::Validation(errors)) => {
            let _ = write_stderr_line("Failed to create run. See validation errors below:");
            for (field, message) in errors.iter() {
                let _ = write_stderr_line(&format!(" - {field}: {message}"));
            }
            return ExitCode::from(1);
        }
        Err(err) => {
            return emit_error(&format!("failed to validate payload: {err}"));
        }
    };

    let audit: Arc<dyn AuditSink> = Arc::new(NoopAuditSink);
    let registry = match RunRegistry::open(args.storage_root.clone(), audit) {
        Ok(registry) => registry,
        Err(err) => {
            return emit_error(&format!("failed to open run registry: {err}"));
        }
    };

    match registry.create_run(payload) {
        Ok(run) => match serde_json::to_string_pretty(&run) {
            Ok(json) => match write_stdout_line(&json) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => emit_error(&format!("failed to write run manifest: {err}")),
            },
            Err(err) => emit_error(&format!("failed to serialize run manifest: {err}")),
        },
        Err(err) => emit_error(&format!("failed to create run: {err}")),
    }
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::from(2)
}
