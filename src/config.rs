use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::model::{CraftingJob, WorldSelector, MAX_JOB_LEVEL};
use crate::scoring::{PercentileBounds, ScoringConfig};

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    pub run: Run,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub recipes: RecipeSourceConfig,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub output: Output,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct General {
    pub log_level: String,
    /// Log a line per request batch / recipe page
    pub progress: bool,
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            progress: true,
        }
    }
}

/// What to score: job, level and the world whose market to use.
#[derive(Debug, Deserialize)]
pub struct Run {
    pub job: CraftingJob,
    pub level: u32,
    pub world: WorldSelector,
}

/// Player-market API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    /// Ids per request, capped at the API limit of 100
    pub batch_size: usize,
    pub request_timeout_secs: u64,
    /// Listings returned per ingredient
    pub listings: u32,
    /// Recent sales returned per ingredient
    pub recent_entries: u32,
    /// Cap on sale-history entries per finished item (API default if unset)
    pub history_entries: Option<u32>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://universalis.app/api/v2".to_string(),
            batch_size: 100,
            request_timeout_secs: 30,
            listings: 5,
            recent_entries: 5,
            history_entries: None,
        }
    }
}

impl MarketConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Game-data API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecipeSourceConfig {
    pub base_url: String,
}

impl Default for RecipeSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://xivapi.com".to_string(),
        }
    }
}

/// Raw scoring knobs as written in the file. Percentiles are in percent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub sales_lookback_days: u64,
    pub sale_price_low_percentile: f64,
    pub sale_price_high_percentile: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            sales_lookback_days: 7,
            sale_price_low_percentile: 1.0,
            sale_price_high_percentile: 3.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Output {
    pub dir: PathBuf,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        Ok(config)
    }

    /// Parse and validate. Bad percentile bounds fail here, before any fetch.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_JOB_LEVEL).contains(&self.run.level) {
            return Err(Error::Config {
                field: "run.level",
                reason: format!("must be a whole number between 1 and {}", MAX_JOB_LEVEL),
            });
        }
        if self.market.batch_size == 0 {
            return Err(Error::Config {
                field: "market.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scoring.sales_lookback_days == 0 {
            return Err(Error::Config {
                field: "scoring.sales_lookback_days",
                reason: "must be at least 1".to_string(),
            });
        }
        self.scoring_config()?;
        Ok(())
    }

    /// Validated scoring parameters.
    pub fn scoring_config(&self) -> Result<ScoringConfig, Error> {
        let bounds = PercentileBounds::from_percent(
            self.scoring.sale_price_low_percentile,
            self.scoring.sale_price_high_percentile,
        )?;
        let lookback_secs = self
            .scoring
            .sales_lookback_days
            .checked_mul(SECONDS_PER_DAY)
            .ok_or_else(|| Error::Config {
                field: "scoring.sales_lookback_days",
                reason: "is too large".to_string(),
            })?;
        Ok(ScoringConfig {
            sales_lookback: Duration::from_secs(lookback_secs),
            sale_price_bounds: bounds,
        })
    }
}
