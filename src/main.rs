use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sitebridge::app::AppContext;
use sitebridge::cli::{commands, Cli, Commands};
use sitebridge::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `feed` output stays clean RSS.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sitebridge=info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config)?;

    let result = match cli.command {
        Commands::Add { profile } => commands::add_profile(&ctx, &profile).await,
        Commands::Edit { id, profile } => commands::edit_profile(&ctx, id, &profile).await,
        Commands::List => commands::list_profiles(&ctx),
        Commands::Show { id, items } => commands::show_profile(&ctx, id, items),
        Commands::Remove { id } => commands::remove_profile(&ctx, id),
        Commands::Purge { id } => commands::purge_items(&ctx, id),
        Commands::Enable { id } => commands::set_active(&ctx, id, true),
        Commands::Disable { id } => commands::set_active(&ctx, id, false),
        Commands::Clone { id, profile } => commands::clone_profile(&ctx, id, &profile).await,
        Commands::Refresh { id } => commands::refresh_profile(&ctx, id).await,
        Commands::RefreshDue => commands::refresh_due(&ctx).await,
        Commands::Preview {
            profile,
            json,
            progress,
        } => commands::preview(&ctx, &profile, json, progress).await,
        Commands::Feed { token, output } => {
            commands::print_feed(&ctx, &token, output.as_deref()).await
        }
        Commands::Run => commands::run(&ctx).await,
    };

    ctx.shutdown().await;
    Ok(result?)
}
