use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rbac_seed::config::{Cli, Settings};
use rbac_seed::services::sync;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rbac_seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_cli(cli).context("invalid configuration")?;

    let report = sync::run(&settings)
        .await
        .with_context(|| format!("RBAC sync from {} failed", settings.rbac_file.display()))?;

    info!(
        "Permissions: {} created, {} unchanged",
        report.permissions.created, report.permissions.unchanged
    );
    info!(
        "Roles: {} created, {} unchanged",
        report.roles.created, report.roles.unchanged
    );
    info!(
        "Role permissions: {} created, {} unchanged",
        report.links.created, report.links.unchanged
    );

    if report.dry_run {
        println!("Dry run completed, no changes were committed.");
    } else {
        println!("Database seeding completed successfully!");
    }

    Ok(())
}
