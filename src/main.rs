//! Binary entry point for the `converge` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use converge::config::{ConfigError, Service};
use converge::{
    ApiError, BareMetalNicApi, CloudConnectionApi, ConvergeConfig, HttpTransport, QualifiedName,
    QualifiedNameError, ReconcileError, Reconciler, ResourceApi, TriggerApi,
};

mod cli;

use cli::{Cli, ResolveCommand, ResourceKind, TargetArgs};

const EXIT_ABSENT: i32 = 2;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Transport(#[from] ApiError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("invalid qualified name: {0}")]
    Name(#[from] QualifiedNameError),
    #[error("failed to write output: {0}")]
    Output(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Operation {
    Exists,
    Read,
    Delete,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout()).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<i32, CliError> {
    let (operation, target) = match cli {
        Cli::Resolve(command) => return resolve(&command, out),
        Cli::Exists(target) => (Operation::Exists, target),
        Cli::Read(target) => (Operation::Read, target),
        Cli::Delete(target) => (Operation::Delete, target),
    };

    let config = ConvergeConfig::load_without_cli_args()?;
    config.validate()?;
    let timeouts = config.timeouts();
    match target.kind {
        ResourceKind::Trigger => {
            let transport = HttpTransport::from_config(&config, Service::Functions)?;
            let api = TriggerApi::new(
                transport,
                config.default_namespace.as_str(),
                config.api_key.as_str(),
            );
            let reconciler = Reconciler::new(api).with_timeouts(timeouts);
            run_target(&reconciler, operation, &target.id, out).await
        }
        ResourceKind::Nic => {
            let transport = HttpTransport::from_config(&config, Service::Vpc)?;
            let reconciler = Reconciler::new(BareMetalNicApi::new(transport)).with_timeouts(timeouts);
            run_target(&reconciler, operation, &target.id, out).await
        }
        ResourceKind::CloudConnection => {
            let workspace = config.require_cloud_instance_id()?;
            let transport = HttpTransport::from_config(&config, Service::Power)?;
            let reconciler = Reconciler::new(CloudConnectionApi::new(transport, workspace))
                .with_timeouts(timeouts);
            run_target(&reconciler, operation, &target.id, out).await
        }
    }
}

async fn run_target<A: ResourceApi>(
    reconciler: &Reconciler<A>,
    operation: Operation,
    raw_id: &str,
    out: &mut impl Write,
) -> Result<i32, CliError> {
    let id = reconciler.parse_id(raw_id)?;
    match operation {
        Operation::Exists => {
            if reconciler.exists(&id).await? {
                emit(out, "present")?;
                Ok(0)
            } else {
                emit(out, "absent")?;
                Ok(EXIT_ABSENT)
            }
        }
        Operation::Read => {
            let Some(state) = reconciler.read(&id).await? else {
                emit(out, "absent")?;
                return Ok(EXIT_ABSENT);
            };
            let rendered = serde_json::to_string_pretty(&state)
                .map_err(|err| CliError::Output(err.to_string()))?;
            emit(out, &rendered)?;
            Ok(0)
        }
        Operation::Delete => {
            reconciler.delete(&id).await?;
            emit(out, &format!("deleted {id}"))?;
            Ok(0)
        }
    }
}

fn resolve(command: &ResolveCommand, out: &mut impl Write) -> Result<i32, CliError> {
    let name = QualifiedName::resolve_with_default(&command.name, &command.namespace)?;
    emit(out, &name.format())?;
    Ok(0)
}

fn emit(out: &mut impl Write, line: &str) -> Result<(), CliError> {
    writeln!(out, "{line}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
