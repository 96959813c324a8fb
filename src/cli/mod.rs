//! Command-line interface definitions for the `converge` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `converge` binary.
#[derive(Debug, Parser)]
#[command(
    name = "converge",
    about = "Inspect and tear down cloud resources with bounded status polling",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Report whether a resource exists.
    #[command(name = "exists", about = "Report whether a resource exists")]
    Exists(TargetArgs),
    /// Print the observed state of a resource as JSON.
    #[command(name = "read", about = "Print the observed state of a resource as JSON")]
    Read(TargetArgs),
    /// Delete a resource and wait until it is gone.
    #[command(name = "delete", about = "Delete a resource and wait until it is gone")]
    Delete(TargetArgs),
    /// Resolve a qualified name against a default namespace.
    #[command(name = "resolve", about = "Resolve a qualified name against a default namespace")]
    Resolve(ResolveCommand),
}

/// Resource kinds reachable from the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ResourceKind {
    /// Functions trigger, addressed as `namespace/name`.
    Trigger,
    /// Bare-metal server network interface, addressed as `server/interface`.
    Nic,
    /// Power Systems cloud connection, addressed as `workspace/connection`.
    CloudConnection,
}

/// Arguments shared by commands that address one resource.
#[derive(Debug, Parser)]
pub(crate) struct TargetArgs {
    /// Kind of the resource.
    #[arg(value_enum)]
    pub(crate) kind: ResourceKind,
    /// External identifier, such as `bms-123/nic-456`.
    pub(crate) id: String,
}

/// Arguments for the `converge resolve` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ResolveCommand {
    /// Name in `[/namespace[/package]]/entity` form.
    pub(crate) name: String,
    /// Namespace used when the name carries none.
    #[arg(
        long,
        value_name = "NAMESPACE",
        env = "CONVERGE_DEFAULT_NAMESPACE",
        default_value = "_"
    )]
    pub(crate) namespace: String,
}
