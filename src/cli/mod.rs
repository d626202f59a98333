pub mod commands;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::app::{BridgeError, Result};
use crate::domain::RawExtractionConfig;

#[derive(Parser)]
#[command(name = "sitebridge")]
#[command(about = "Turn ordinary listing pages into RSS feeds", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/sitebridge/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a profile
    Add {
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Change an existing profile; omitted options keep their value
    Edit {
        id: i64,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// List profiles
    List,
    /// Show one profile and its latest items
    Show {
        id: i64,
        /// Number of stored items to print
        #[arg(long, default_value_t = 10)]
        items: usize,
    },
    /// Delete a profile and its items
    Remove { id: i64 },
    /// Delete a profile's stored items
    Purge { id: i64 },
    /// Resume scheduled refreshes and publishing
    Enable { id: i64 },
    /// Pause scheduled refreshes and publishing
    Disable { id: i64 },
    /// Create a copy of a profile under a fresh title
    Clone {
        id: i64,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Refresh one profile now
    Refresh { id: i64 },
    /// Refresh every profile that is due
    RefreshDue,
    /// Extract entries without saving anything
    Preview {
        #[command(flatten)]
        profile: ProfileArgs,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
        /// Print progress to stderr while extracting
        #[arg(long)]
        progress: bool,
    },
    /// Print a published feed as RSS
    Feed {
        token: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the refresh scheduler until interrupted
    Run,
}

/// Profile settings shared by `add`, `edit`, `clone` and `preview`.
#[derive(Args, Debug, Default, Clone)]
pub struct ProfileArgs {
    /// Read settings from a TOML file first; other options override it
    #[arg(long)]
    pub from_file: Option<PathBuf>,

    #[arg(long)]
    pub title: Option<String>,

    /// Listing page to extract from
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub item_selector: Option<String>,

    #[arg(long)]
    pub title_selector: Option<String>,

    #[arg(long)]
    pub link_selector: Option<String>,

    /// Pass an empty value to clear
    #[arg(long)]
    pub summary_selector: Option<String>,

    #[arg(long)]
    pub max_items: Option<String>,

    /// Minutes between refreshes, 0 for manual only
    #[arg(long)]
    pub interval: Option<String>,

    /// http or browser
    #[arg(long)]
    pub mode: Option<String>,

    /// Include rule, repeatable; one rule per occurrence
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// Exclude rule, repeatable; one rule per occurrence
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,
}

impl ProfileArgs {
    /// Layer these options over `base`.
    pub fn apply(&self, base: RawExtractionConfig) -> Result<RawExtractionConfig> {
        let mut raw = match &self.from_file {
            Some(path) => read_profile_file(path)?,
            None => base,
        };

        let overrides = [
            (&self.title, &mut raw.feed_title),
            (&self.url, &mut raw.source_url),
            (&self.item_selector, &mut raw.item_selector),
            (&self.title_selector, &mut raw.title_selector),
            (&self.link_selector, &mut raw.link_selector),
            (&self.summary_selector, &mut raw.summary_selector),
            (&self.max_items, &mut raw.max_items),
            (&self.interval, &mut raw.refresh_interval_minutes),
            (&self.mode, &mut raw.fetch_mode),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        if !self.include.is_empty() {
            raw.include_filter_rules = self.include.join("\n");
        }
        if !self.exclude.is_empty() {
            raw.exclude_filter_rules = self.exclude.join("\n");
        }
        Ok(raw)
    }
}

fn read_profile_file(path: &Path) -> Result<RawExtractionConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        BridgeError::Config(format!("Failed to parse profile file {}: {}", path.display(), e))
    })
}
