use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::app::{AppContext, BridgeError, Result};
use crate::cli::ProfileArgs;
use crate::domain::{clone_title, Entry, ExtractionConfig, Profile, RawExtractionConfig};
use crate::fetcher::HtmlFetcher;
use crate::pipeline::{extract_feed_entries, preview_stream};
use crate::progress::TracingProgress;
use crate::publish::{feed_url, render_rss};
use crate::scheduler::due_at;
use crate::store::Store;

pub async fn add_profile(ctx: &AppContext, args: &ProfileArgs) -> Result<()> {
    let config = ExtractionConfig::from_raw(&args.apply(RawExtractionConfig::default())?)?;
    let profile = ctx.store.create_profile(&config, Utc::now())?;

    println!("Added profile {}: {}", profile.id, profile.display_title());
    println!("Feed URL: {}", public_url(ctx, &profile));
    Ok(())
}

pub async fn edit_profile(ctx: &AppContext, id: i64, args: &ProfileArgs) -> Result<()> {
    let existing = find_profile(ctx, id)?;
    let config = ExtractionConfig::from_raw(&args.apply(existing.config.to_raw())?)?;
    let profile = ctx.store.update_profile(id, &config, Utc::now())?;

    println!("Updated profile {}: {}", profile.id, profile.display_title());
    Ok(())
}

pub async fn clone_profile(ctx: &AppContext, id: i64, args: &ProfileArgs) -> Result<()> {
    let original = find_profile(ctx, id)?;
    let mut raw = original.config.to_raw();
    if args.title.is_none() {
        let profiles = ctx.store.list_profiles()?;
        raw.feed_title = clone_title(
            original.display_title(),
            profiles.iter().map(|p| p.config.feed_title.as_str()),
        );
    }

    let config = ExtractionConfig::from_raw(&args.apply(raw)?)?;
    let profile = ctx.store.create_profile(&config, Utc::now())?;

    println!(
        "Cloned profile {} as {}: {}",
        original.id,
        profile.id,
        profile.display_title()
    );
    println!("Feed URL: {}", public_url(ctx, &profile));
    Ok(())
}

pub fn list_profiles(ctx: &AppContext) -> Result<()> {
    let profiles = ctx.store.list_profiles()?;

    if profiles.is_empty() {
        println!("No profiles. Add one with 'sitebridge add --url <URL>'");
        return Ok(());
    }

    for profile in &profiles {
        let state = if profile.active { "" } else { " [disabled]" };
        println!(
            "[{}] {} ({}, {} items){}",
            profile.id,
            profile.display_title(),
            profile.status,
            profile.item_count,
            state
        );
        println!("    {}", profile.config.source_url);
        println!("    {}", public_url(ctx, profile));
    }

    Ok(())
}

pub fn show_profile(ctx: &AppContext, id: i64, limit: usize) -> Result<()> {
    let profile = find_profile(ctx, id)?;
    let config = &profile.config;

    println!("{} (#{})", profile.display_title(), profile.id);
    println!("  Source:    {}", config.source_url);
    println!("  Feed:      {}", public_url(ctx, &profile));
    println!("  Mode:      {}", config.fetch_mode);
    println!("  Items:     {}", config.item_selector);
    println!("  Title:     {}", config.title_selector);
    println!("  Link:      {}", config.link_selector);
    if let Some(summary) = &config.summary_selector {
        println!("  Summary:   {}", summary);
    }
    println!("  Max items: {}", config.max_items);
    if !config.include_filter_rules.is_empty() {
        println!("  Include:   {}", config.include_filter_rules.replace('\n', " | "));
    }
    if !config.exclude_filter_rules.is_empty() {
        println!("  Exclude:   {}", config.exclude_filter_rules.replace('\n', " | "));
    }

    let active = if profile.active { "active" } else { "disabled" };
    println!("  Status:    {} ({})", profile.status, active);
    if !profile.last_error.is_empty() {
        println!("  Error:     {}", profile.last_error);
    }
    match profile.last_refreshed_at {
        Some(at) => println!("  Refreshed: {}", at.format("%Y-%m-%d %H:%M UTC")),
        None => println!("  Refreshed: never"),
    }
    if config.is_manual_only() {
        println!("  Schedule:  manual only");
    } else if let Some(due) = due_at(&profile).filter(|_| profile.active) {
        println!(
            "  Schedule:  every {} min, next {}",
            config.refresh_interval_minutes,
            due.format("%Y-%m-%d %H:%M UTC")
        );
    }

    let items = ctx.store.list_items(profile.id, limit)?;
    if items.is_empty() {
        return Ok(());
    }
    println!();
    println!("Latest {} of {} items:", items.len(), profile.item_count);
    for item in &items {
        println!("  {}", item.title);
        println!("    {}", item.link);
    }
    Ok(())
}

pub fn remove_profile(ctx: &AppContext, id: i64) -> Result<()> {
    let profile = find_profile(ctx, id)?;
    ctx.store.delete_profile(id)?;
    println!("Removed profile {}: {}", id, profile.display_title());
    Ok(())
}

pub fn purge_items(ctx: &AppContext, id: i64) -> Result<()> {
    let removed = ctx.store.purge_items(id, Utc::now())?;
    println!("Purged {} items from profile {}", removed, id);
    Ok(())
}

pub fn set_active(ctx: &AppContext, id: i64, active: bool) -> Result<()> {
    let profile = ctx.refresher.set_active(id, active)?;
    let verb = if active { "Enabled" } else { "Disabled" };
    println!("{} profile {}: {}", verb, profile.id, profile.display_title());
    Ok(())
}

pub async fn refresh_profile(ctx: &AppContext, id: i64) -> Result<()> {
    let profile = find_profile(ctx, id)?;
    println!("Refreshing {}...", profile.display_title());

    let stored = ctx.refresher.refresh_profile(id).await?;
    println!("Stored {} entries", stored);
    Ok(())
}

pub async fn refresh_due(ctx: &AppContext) -> Result<()> {
    let summary = ctx.refresher.refresh_due_profiles(Utc::now()).await?;

    if summary.attempted() == 0 {
        println!("No profiles are due");
        return Ok(());
    }
    println!(
        "Refreshed {}, failed {}, skipped {}",
        summary.refreshed, summary.failed, summary.skipped
    );
    Ok(())
}

pub async fn preview(ctx: &AppContext, args: &ProfileArgs, json: bool, progress: bool) -> Result<()> {
    let config = ExtractionConfig::from_raw(&args.apply(RawExtractionConfig::default())?)?;

    let entries = if progress {
        let fetcher: Arc<dyn HtmlFetcher> = ctx.fetcher.clone();
        let (mut events, handle) = preview_stream(config, fetcher);
        while let Some(event) = events.recv().await {
            eprintln!("[{}] {}", event.title, event.detail);
        }
        handle
            .await
            .map_err(|e| BridgeError::Other(format!("Preview task failed: {}", e)))??
    } else {
        extract_feed_entries(&config, ctx.fetcher.as_ref(), &TracingProgress).await?
    };

    if json {
        let out = serde_json::to_string_pretty(&entries)
            .map_err(|e| BridgeError::Other(format!("Failed to encode entries: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{} entries", entries.len());
    for entry in &entries {
        println!();
        println!("{}", entry.title);
        println!("  {}", entry.link);
        if !entry.summary.is_empty() {
            println!("  {}", entry.summary);
        }
    }
    Ok(())
}

pub async fn print_feed(ctx: &AppContext, token: &str, output: Option<&Path>) -> Result<()> {
    let feed = ctx
        .refresher
        .load_feed(token)
        .await?
        .ok_or_else(|| BridgeError::ProfileNotFound(token.to_string()))?;

    let entries: Vec<Entry> = feed.items.into_iter().map(Entry::from).collect();
    let xml = render_rss(&feed.profile.config, &entries, Utc::now())?;

    match output {
        Some(path) => {
            std::fs::write(path, xml)?;
            println!("Wrote {} items to {}", entries.len(), path.display());
        }
        None => println!("{}", xml),
    }
    Ok(())
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    if !ctx.config.scheduler.enabled {
        println!("Scheduler is disabled in the config; nothing to run");
        return Ok(());
    }

    let scheduler = ctx.start_scheduler();
    println!(
        "Refreshing due profiles every {}s. Press Ctrl-C to stop.",
        ctx.config.scheduler.tick_secs
    );

    tokio::signal::ctrl_c().await?;
    println!("Stopping...");
    scheduler.stop().await;
    Ok(())
}

fn find_profile(ctx: &AppContext, id: i64) -> Result<Profile> {
    ctx.store
        .get_profile(id)?
        .ok_or_else(|| BridgeError::ProfileNotFound(id.to_string()))
}

fn public_url(ctx: &AppContext, profile: &Profile) -> String {
    feed_url(ctx.config.public_base_url.as_deref(), &profile.token)
}
