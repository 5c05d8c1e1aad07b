mod api;
mod config;
mod error;
mod model;
mod output;
mod progress;
mod scoring;

use anyhow::Context;
use api::universalis::Universalis;
use api::xivapi::Xivapi;
use api::ReqwestSource;
use config::Config;
use output::Report;
use progress::{LogProgress, NoProgress, Progress};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// How many recipes the summary prints.
const SUMMARY_SIZE: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config_path =
        std::env::var("CRAFTPROFIT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.general.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let scoring_config = cfg.scoring_config()?;
    let source = ReqwestSource::new(cfg.market.request_timeout())?;
    let market = Universalis::new(source.clone(), &cfg.market);
    let recipe_source = Xivapi::new(source, &cfg.recipes);

    let progress: &dyn Progress = if cfg.general.progress {
        &LogProgress
    } else {
        &NoProgress
    };

    let world = market.resolve_world(&cfg.run.world).await?;
    info!(job = %cfg.run.job, level = cfg.run.level, world = %world.name, "Starting run");

    let recipes = recipe_source
        .craftable_recipes(cfg.run.job, cfg.run.level, progress)
        .await?;
    if recipes.is_empty() {
        warn!("No tradable recipes found, nothing to score");
        return Ok(());
    }
    info!(count = recipes.len(), "Fetched craftable recipes");

    let ranked = scoring::score(recipes, world.id, &market, &scoring_config, progress).await?;

    let report = Report::new(cfg.run.job, cfg.run.level, &world, &ranked);
    let path = output::write_report(&cfg.output.dir, &report)?;

    log_summary(&report);
    info!(path = %path.display(), "Saved report");

    Ok(())
}

fn log_summary(report: &Report) {
    let scored = report.recipes.iter().filter(|r| r.is_scored()).count();
    info!(
        scored,
        unscored = report.recipes.len() - scored,
        "Scoring complete"
    );

    for (rank, recipe) in report
        .recipes
        .iter()
        .filter(|r| r.is_scored())
        .take(SUMMARY_SIZE)
        .enumerate()
    {
        info!(
            "#{:<2} {:<40} lv{:<3} profit {:>8} x {:>6.2}/day = {:>10.0}",
            rank + 1,
            recipe.name,
            recipe.recipe_level,
            recipe.unit_profit.unwrap_or_default(),
            recipe.sale_velocity,
            recipe.profitability_score.unwrap_or_default()
        );
    }
}
