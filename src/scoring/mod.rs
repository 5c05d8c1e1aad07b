mod filter;

pub use filter::{ipr_average, iqr_average, PercentileBounds};

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::universalis::Universalis;
use crate::api::HttpSource;
use crate::error::Result;
use crate::model::{ItemMarketData, MarketSnapshot, Recipe};
use crate::progress::Progress;

/// Scoring configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// How far back sale history is read for finished items
    pub sales_lookback: Duration,
    /// Percentile fence for finished-item sale prices
    pub sale_price_bounds: PercentileBounds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            sales_lookback: Duration::from_secs(7 * 86_400),
            sale_price_bounds: PercentileBounds::SALE_HISTORY,
        }
    }
}

/// Fetch prices for every recipe on `world_id`, score them and return them
/// in ascending score order.
///
/// # Flow
/// 1. Collect distinct finished-item ids and distinct ingredient ids
/// 2. Sale history for finished items over `sales_lookback`
/// 3. Current listings for ingredients
/// 4. Price and score each recipe, then sort
///
/// A failed fetch aborts the whole call; no recipe is partially scored.
pub async fn score<S: HttpSource>(
    recipes: Vec<Recipe>,
    world_id: u32,
    market: &Universalis<S>,
    config: &ScoringConfig,
    progress: &dyn Progress,
) -> Result<Vec<Recipe>> {
    let item_ids = distinct(recipes.iter().map(|r| r.id));
    let ingredient_ids = distinct(
        recipes
            .iter()
            .flat_map(|r| r.ingredients.iter().map(|i| i.id)),
    );
    info!(
        recipes = recipes.len(),
        items = item_ids.len(),
        ingredients = ingredient_ids.len(),
        world_id,
        lookback_days = config.sales_lookback.as_secs() / 86_400,
        low_percentile = config.sale_price_bounds.low() * 100.0,
        high_percentile = config.sale_price_bounds.high() * 100.0,
        "Fetching market data"
    );

    let sales = market
        .sales_history(&item_ids, world_id, config.sales_lookback, progress)
        .await?;
    let listings = market
        .current_listings(&ingredient_ids, world_id, progress)
        .await?;
    if sales.is_empty() {
        warn!(world_id, "No sale history returned for any item");
    }
    debug!(with_history = sales.len(), with_listings = listings.len(), "Market data fetched");

    Ok(rank(recipes, &sales, &listings, config))
}

/// Price every recipe from already-fetched snapshots and sort ascending.
pub fn rank(
    mut recipes: Vec<Recipe>,
    sales: &MarketSnapshot,
    listings: &MarketSnapshot,
    config: &ScoringConfig,
) -> Vec<Recipe> {
    for recipe in &mut recipes {
        price_recipe(recipe, sales, listings, config.sale_price_bounds);
    }
    sort_by_score(&mut recipes);
    recipes
}

/// Fill in prices, unit profit and score for one recipe.
///
/// Without sale history the recipe stays unscored (all derived figures None).
pub fn price_recipe(
    recipe: &mut Recipe,
    sales: &MarketSnapshot,
    listings: &MarketSnapshot,
    bounds: PercentileBounds,
) {
    recipe.clear_scores();

    let history = sales.get(recipe.id);
    let sale_prices = history.map(ItemMarketData::sale_prices).unwrap_or_default();
    let Some(average) = ipr_average(&sale_prices, bounds) else {
        debug!(item_id = recipe.id, name = %recipe.name, "No sale history");
        return;
    };
    let average_price = average.round() as i64;
    let sale_velocity = history.map_or(0.0, |h| h.regular_sale_velocity);

    let mut ingredient_total = 0;
    let mut unpriced = 0;
    for ingredient in &mut recipe.ingredients {
        let prices = listings
            .get(ingredient.id)
            .map(ItemMarketData::current_prices)
            .unwrap_or_default();
        ingredient.set_price(iqr_average(&prices).map(|p| p.round() as i64));

        match ingredient.total_price {
            Some(total) => ingredient_total += total,
            None => unpriced += 1,
        }
    }
    if unpriced > 0 {
        debug!(item_id = recipe.id, unpriced, "Ingredients without price data");
    }

    let unit_profit = average_price - ingredient_total;
    recipe.average_price = Some(average_price);
    recipe.sale_velocity = sale_velocity;
    recipe.ingredient_price_total = Some(ingredient_total);
    recipe.unpriced_ingredients = unpriced;
    recipe.unit_profit = Some(unit_profit);
    recipe.profitability_score = Some(unit_profit as f64 * sale_velocity);
}

/// Stable ascending sort. Unscored recipes sort below every scored one.
pub fn sort_by_score(recipes: &mut [Recipe]) {
    recipes.sort_by(|a, b| compare_scores(a.profitability_score, b.profitability_score));
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// First-seen order, duplicates dropped.
fn distinct(ids: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
