// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Command-line interface for the SOCless repository updater.
//!
//! `plan` validates an update plan and prints it without touching the
//! network. `update` resolves the requested release, runs the batch and
//! prints the summary.

use std::{
    io,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use socless_repo_updater::{
    BatchRunner, Error, GitHubHost, HostSelector, RepositoryHost, load_plan, resolve_release,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line interface for bumping dependencies across repositories.
#[derive(Debug, Parser,)]
#[command(
    name = "socless-repo-updater",
    version,
    about = "Bump package.json, serverless.yml and socless_python pins across repositories"
)]
struct Cli
{
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand,)]
/// Supported commands exposed by the CLI.
enum Command
{
    /// Validate a plan and print its normalized form.
    Plan(PlanArgs,),
    /// Apply a plan to every repository it names.
    Update(UpdateArgs,),
}

#[derive(Debug, Args,)]
/// Arguments accepted by the `plan` subcommand.
struct PlanArgs
{
    /// Path to the YAML update plan.
    #[arg(long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Output formatted JSON for easier inspection.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,
}

#[derive(Debug, Args,)]
/// Arguments accepted by the `update` subcommand.
struct UpdateArgs
{
    /// Path to the YAML update plan.
    #[arg(long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Output formatted JSON for easier inspection.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,

    /// Token for github.com.
    #[arg(long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String,>,

    /// Token for the GitHub Enterprise instance.
    #[arg(long = "ghe-token", env = "GHE_TOKEN", hide_env_values = true)]
    ghe_token: Option<String,>,

    /// Domain of the GitHub Enterprise instance, e.g. `github.example.com`.
    #[arg(long = "ghe-domain", env = "GHE_DOMAIN", value_name = "DOMAIN")]
    ghe_domain: Option<String,>,

    /// Disable the progress bar.
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    no_progress: bool,
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main()
{
    init_tracing();

    match run().await {
        Ok(true,) => {}
        Ok(false,) => process::exit(1,),
        Err(error,) => {
            eprintln!("{}", error.to_display_string());
            process::exit(1,);
        }
    }
}

fn init_tracing()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),);
    tracing_subscriber::fmt().with_env_filter(filter,).with_writer(io::stderr,).init();
}

/// Executes the CLI using parsed arguments.
///
/// Returns `Ok(false)` when the batch ran but at least one repository
/// failed.
///
/// # Errors
///
/// Propagates plan, client construction and release validation errors.
async fn run() -> Result<bool, Error,>
{
    let cli = Cli::parse();

    match cli.command {
        Command::Plan(args,) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_plan(&mut handle, &args.config, args.pretty,)?;
            Ok(true,)
        }
        Command::Update(args,) => run_update(args,).await,
    }
}

fn write_plan<W: io::Write,>(writer: &mut W, path: &Path, pretty: bool,) -> Result<(), Error,>
{
    let plan = load_plan(path,)?;
    write_json(writer, &plan, pretty,)
}

fn write_json<W: io::Write, T: Serialize,>(writer: &mut W, value: &T, pretty: bool,) -> Result<(), Error,>
{
    if pretty {
        serde_json::to_writer_pretty(writer, value,)?;
    } else {
        serde_json::to_writer(writer, value,)?;
    }

    Ok((),)
}

fn build_selector(args: &UpdateArgs,) -> Result<HostSelector, Error,>
{
    let public: Arc<dyn RepositoryHost,> = Arc::new(GitHubHost::public(args.github_token.as_deref(),)?,);
    let selector = HostSelector::new(public,);

    let domain = args.ghe_domain.as_deref().map(str::trim,).filter(|domain| !domain.is_empty(),);
    match domain {
        Some(domain,) => {
            let enterprise: Arc<dyn RepositoryHost,> =
                Arc::new(GitHubHost::enterprise(domain, args.ghe_token.as_deref(),)?,);
            info!("Routing {domain} repositories to GitHub Enterprise");
            Ok(selector.with_enterprise(domain, enterprise,),)
        }
        None => Ok(selector,),
    }
}

async fn run_update(args: UpdateArgs,) -> Result<bool, Error,>
{
    let mut plan = load_plan(&args.config,)?;
    let selector = build_selector(&args,)?;

    if let Some(requested,) = plan.request.socless_python.take() {
        let release = resolve_release(selector.public(), &requested,).await?;
        plan.request.socless_python = Some(release,);
    }

    let runner = BatchRunner::new(selector,).show_progress(!args.no_progress,);
    let report = runner.run(&plan.targets, &plan.request,).await;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, &report.summary(), args.pretty,)?;

    Ok(!report.has_failures(),)
}
