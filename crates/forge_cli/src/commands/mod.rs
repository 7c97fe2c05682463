//! CLI command definitions.
//!
//! Each subcommand drives one of the pipeline's operation sessions:
//! `generate` runs the full generation pipeline end to end, `deploy`
//! covers the four deployment sub-operations, and `connect` exposes the
//! credential broker's two-phase setup flow.

use clap::{Parser, Subcommand};

pub mod config;
pub mod connect;
pub mod deploy;
pub mod generate;

/// forge - AI-driven repository-to-infrastructure pipeline
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "forge - AI-driven repository-to-infrastructure pipeline")]
#[command(long_about = r#"
forge inspects a repository, generates a container recipe and Terraform
stack for it, validates both against a fixed rule set, and opens a
change request for review before anything touches cloud infrastructure.

WORKFLOWS:
  generate  → inspect, analyze, generate, validate, open change request
  deploy    → build-image, plan, apply, destroy against generated infra
  connect   → set up and verify cross-account deployment credentials

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
  5 - IaC error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the generation pipeline against a repository
    Generate(generate::GenerateArgs),

    /// Run a deployment sub-operation (build-image, plan, apply, destroy)
    Deploy(deploy::DeployArgs),

    /// Set up or verify cross-account deployment credentials
    Connect(connect::ConnectArgs),
}
