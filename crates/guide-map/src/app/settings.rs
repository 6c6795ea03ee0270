use clap::{Parser, Subcommand};
use guide_map_lib::Config;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Guide Map - offline city guide map: points of interest, walking routes and bundled tiles
pub struct Settings {
    /// Directory with pois.{xml,csv}, routes.{xml,csv} and GPX tracks
    #[clap(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory with bundled tiles named {zoom}-{x}-{y}.png
    #[clap(long, value_name = "DIR")]
    pub tiles_dir: Option<PathBuf>,

    /// Writable tile cache directory
    #[clap(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// JSON configuration file; flags above override its directories
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[clap(long, global = true, default_value = "false")]
    pub json: bool,

    /// Log at debug level unless RUST_LOG is set
    #[clap(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the points of interest visible with the category filter
    Pois {
        /// Show only these categories (repeatable)
        #[clap(long = "category", value_name = "NAME")]
        categories: Vec<String>,

        /// Ignore the category filter
        #[clap(long, conflicts_with = "categories")]
        all: bool,
    },
    /// List every category found in the points of interest
    Categories,
    /// List the walking routes
    Routes,
    /// Select a route and print the overlay commands
    Route {
        /// Route name as listed by `routes`
        name: String,
    },
    /// List the tiles covering the initial viewport and whether imagery exists
    Tiles,
    /// Resolve a tapped marker to its point of interest
    Tap {
        #[clap(long)]
        title: String,

        #[clap(long, allow_negative_numbers = true)]
        lat: f64,

        #[clap(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Copy bundled tiles around the initial viewport into the cache (Ctrl-C cancels)
    Prefetch,
}

impl Settings {
    /// Session config: defaults, then the JSON file, then directory flags
    pub fn to_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("cannot read config file {}: {e}", path.display())
                })?;
                serde_json::from_str::<Config>(&text).map_err(|e| {
                    anyhow::anyhow!("invalid config file {}: {e}", path.display())
                })?
            }
            None => Config::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.tiles_dir {
            config.tiles_dir = dir.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        Ok(config)
    }
}
