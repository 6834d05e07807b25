use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reset SIGPIPE to default behavior so piping (e.g. `tagsync batch rows.yaml | head`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use tagsync::audit::{open_or_trace, AuditSink};
use tagsync::batch::{load_rows, BatchRunner};
use tagsync::config::{load_config, Settings, DEFAULT_CONFIG_FILE};
use tagsync::error::TagError;
use tagsync::executor::{DriverOptions, FailurePolicy, OutcomeStatus, ReconcileDriver};
use tagsync::output::formatter;
use tagsync::provider::arm::ArmClient;
use tagsync::provider::auth::token_source_from_setting;
use tagsync::provider::ResourceProvider;
use tagsync::resolver::policy::PolicyName;
use tagsync::resolver::ApiVersionResolver;
use tagsync::resource::{ResourceIdentity, ResourceLocator};
use tagsync::tags::RequestedTags;

/// tagsync - reconcile Azure resource tags with rollback
#[derive(Parser)]
#[command(name = "tagsync", version, about, long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Resource manager endpoint (overrides settings.endpoint)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Milliseconds between operation status polls
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Directory for the daily audit log
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the tags of one resource, rolling back on failure
    Update {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        application: Option<String>,

        #[arg(long)]
        environment: Option<String>,

        #[arg(long)]
        cost_center: Option<String>,

        /// After a successful update, offer to restore the previous tags
        #[arg(long)]
        rollback_prompt: bool,
    },

    /// Apply tag rows from a YAML or JSON file. Failures are reported, not rolled back
    Batch {
        /// Path to the rows file
        file: String,
    },

    /// Show a resource's current tags and the API version that would be used
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Subscription id (prompted for when missing)
    #[arg(long)]
    subscription: Option<String>,

    /// Resource group name (prompted for when missing)
    #[arg(long)]
    resource_group: Option<String>,

    /// Resource name (prompted for when missing)
    #[arg(long)]
    name: Option<String>,

    /// Provider-qualified resource type, e.g. Microsoft.Web/sites
    #[arg(long = "type")]
    resource_type: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Update {
            ref target,
            ref owner,
            ref application,
            ref environment,
            ref cost_center,
            rollback_prompt,
        } => {
            let requested = RequestedTags {
                owner: owner.clone(),
                application: application.clone(),
                environment: environment.clone(),
                cost_center: cost_center.clone(),
            };
            cmd_update(&settings, target, requested, rollback_prompt).await
        }
        Commands::Batch { ref file } => cmd_batch(&settings, file).await,
        Commands::Show { ref target } => cmd_show(&settings, target).await,
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_config(&cli.config)?.settings;
    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(ms) = cli.poll_interval_ms {
        if ms == 0 {
            bail!("--poll-interval-ms must be greater than zero");
        }
        settings.poll_interval_ms = ms;
    }
    if let Some(dir) = &cli.log_dir {
        settings.log_dir = Some(dir.into());
    }
    Ok(settings)
}

fn build_provider(settings: &Settings) -> Result<Arc<dyn ResourceProvider>> {
    let tokens = token_source_from_setting(&settings.token)?;
    Ok(Arc::new(
        ArmClient::with_endpoint(&settings.endpoint, tokens)
            .with_metadata_api_version(&settings.metadata_api_version),
    ))
}

fn open_audit(settings: &Settings) -> Arc<dyn AuditSink> {
    open_or_trace(&settings.resolved_log_dir())
}

fn driver_options(settings: &Settings, failure_policy: FailurePolicy) -> Result<DriverOptions> {
    let policy: PolicyName = settings.api_version_policy.parse()?;
    Ok(DriverOptions {
        poll_interval: settings.poll_interval(),
        failure_policy,
        version_policy: policy.build(),
    })
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn required(value: &Option<String>, label: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => prompt(label),
    }
}

fn resolve_identity(target: &TargetArgs) -> Result<ResourceIdentity> {
    let subscription = required(&target.subscription, "Enter the subscription ID")?;
    let resource_group = required(&target.resource_group, "Enter the resource group name")?;
    let name = required(&target.name, "Enter the resource name")?;
    let identity = ResourceIdentity::new(&subscription, &resource_group, &name)?
        .with_type(target.resource_type.as_deref());
    Ok(identity)
}

fn confirm(question: &str) -> Result<bool> {
    println!("\n{} Only '{}' will be accepted.", question, "yes".bold());
    print!("  Enter a value: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_update(
    settings: &Settings,
    target: &TargetArgs,
    requested: RequestedTags,
    rollback_prompt: bool,
) -> Result<()> {
    let identity = resolve_identity(target)?;
    let driver = Arc::new(ReconcileDriver::new(
        build_provider(settings)?,
        open_audit(settings),
        driver_options(settings, FailurePolicy::Rollback)?,
    ));

    // Ctrl-C only trips the cycle's flag; the worker notices on its next tick.
    let watcher = {
        let driver = Arc::clone(&driver);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                driver.cancel_all();
            }
        })
    };

    let bar = spinner(format!(
        "Updating tags for '{}' (Ctrl-C to cancel)",
        identity.resource_name()
    ));
    let outcome = driver.reconcile(&identity, &requested.to_tag_set()).await;
    bar.finish_and_clear();
    let outcome = outcome?;
    formatter::print_outcome(&outcome);

    if outcome.status == OutcomeStatus::Updated
        && rollback_prompt
        && confirm("Do you want to roll back these changes?")?
    {
        let bar = spinner(format!("Rolling back tags for '{}'", identity.resource_name()));
        let rollback = driver.rollback(&identity).await;
        bar.finish_and_clear();
        formatter::print_rollback(identity.resource_name(), &rollback?);
    }
    watcher.abort();

    if let OutcomeStatus::Failed(message) = &outcome.status {
        bail!("Tag update failed: {}", message);
    }
    Ok(())
}

async fn cmd_batch(settings: &Settings, file: &str) -> Result<()> {
    let rows = load_rows(Path::new(file))?;
    let runner = BatchRunner::new(
        build_provider(settings)?,
        open_audit(settings),
        driver_options(settings, FailurePolicy::ReportOnly)?,
    );

    let start = Instant::now();
    let (records, report) = runner.run_report(&rows).await;
    for record in &records {
        formatter::print_record(record);
    }

    let report = report.with_elapsed(start.elapsed());
    println!();
    println!(
        "Number of resources with successful tag updates: {}",
        report.successful_updates().to_string().bold()
    );
    println!("{}", report);

    if report.has_failures() {
        bail!("{} row(s) failed", report.failed);
    }
    Ok(())
}

async fn cmd_show(settings: &Settings, target: &TargetArgs) -> Result<()> {
    let identity = resolve_identity(target)?;
    let provider = build_provider(settings)?;
    let locator = ResourceLocator::new(Arc::clone(&provider));

    let resource = locator
        .locate(&identity)
        .await
        .context("Failed to look up resource")?
        .ok_or_else(|| TagError::NotFound(identity.to_string()))?;
    formatter::print_resource(&resource);

    let policy: PolicyName = settings.api_version_policy.parse()?;
    let resolver = ApiVersionResolver::with_policy(provider, policy.build());
    let version = resolver
        .resolve(identity.subscription_id(), &resource.resource_type)
        .await?
        .ok_or_else(|| TagError::ApiVersion(resource.resource_type.clone()))?;
    println!("  api-version = {} ({})", version, resolver.policy_name());
    Ok(())
}
