use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{get_json, HttpSource};
use crate::config::RecipeSourceConfig;
use crate::error::{Error, Result};
use crate::model::{CraftingJob, Ingredient, Recipe};
use crate::progress::Progress;

/// Recipes have a fixed number of ingredient slots.
pub const INGREDIENT_SLOTS: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchPage {
    pagination: Pagination,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Pagination {
    page_total: u32,
}

/// An ingredient as it sits in its recipe slot. The slot number is the
/// array index in [`ingredient_slots`] and goes no further.
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientSlot {
    pub id: u32,
    pub name: String,
    pub quantity: u32,
}

impl From<IngredientSlot> for Ingredient {
    fn from(slot: IngredientSlot) -> Self {
        Ingredient::new(slot.id, slot.name, slot.quantity)
    }
}

/// Client for the game-data API's recipe search.
pub struct Xivapi<S> {
    source: S,
    base_url: String,
}

impl<S: HttpSource> Xivapi<S> {
    pub fn new(source: S, config: &RecipeSourceConfig) -> Self {
        Self {
            source,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Every tradable recipe `job` can craft at `level`, sorted by level.
    ///
    /// Pages are fetched one after another; any failure aborts with no
    /// partial list.
    pub async fn craftable_recipes(
        &self,
        job: CraftingJob,
        level: u32,
        progress: &dyn Progress,
    ) -> Result<Vec<Recipe>> {
        let search_url = self.search_url(job, level);

        let first = self.fetch_page(&search_url).await?;
        let page_total = first.pagination.page_total.max(1);
        progress.update(1, page_total as usize, "Fetching recipes");

        let mut raw_results = first.results;
        for page in 2..=page_total {
            let url = format!("{}&page={}", search_url, page);
            let next = self.fetch_page(&url).await?;
            raw_results.extend(next.results);
            progress.update(page as usize, page_total as usize, "Fetching recipes");
        }
        debug!(pages = page_total, results = raw_results.len(), "Recipe search complete");

        let mut recipes: Vec<Recipe> = raw_results
            .iter()
            .filter_map(|raw| {
                let recipe = extract_recipe(raw, job);
                if recipe.is_none() {
                    warn!(raw = %raw, "Skipping recipe without a result item");
                }
                recipe
            })
            .collect();
        recipes.sort_by_key(|r| r.recipe_level);

        Ok(recipes)
    }

    async fn fetch_page(&self, url: &str) -> Result<SearchPage> {
        get_json(&self.source, url)
            .await
            .map_err(|source| Error::MetadataFetch {
                url: url.to_string(),
                source,
            })
    }

    fn search_url(&self, job: CraftingJob, level: u32) -> String {
        let filters = [
            format!("ClassJob.ID={}", job.class_job_id()),
            format!("RecipeLevelTable.ClassJobLevel<={}", level),
            "ItemResult.IsUntradable=0".to_string(),
        ];

        let mut columns: Vec<String> = [
            "ItemResultTargetID",
            "Name",
            "ClassJob.ID",
            "RecipeLevelTable.ClassJobLevel",
            "ClassJob.NameEnglish",
            "ClassJob.Abbreviation",
            "ItemResult.IsUntradable",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        for slot in 0..INGREDIENT_SLOTS {
            columns.push(format!("AmountIngredient{}", slot));
            columns.push(format!("ItemIngredient{}TargetID", slot));
            columns.push(format!("ItemIngredient{}.Name", slot));
        }

        format!(
            "{}/search?indexes=Recipe&filters={}&columns={}",
            self.base_url,
            filters.join(","),
            columns.join(",")
        )
    }
}

/// Build a recipe from one search result. None if it has no result item.
pub fn extract_recipe(raw: &Value, job: CraftingJob) -> Option<Recipe> {
    let id = first_int(raw.get("ItemResultTargetID")?).filter(|&id| id > 0)?;
    let name = raw.get("Name").and_then(Value::as_str).unwrap_or_default();
    let level = raw
        .get("RecipeLevelTable")
        .and_then(|t| t.get("ClassJobLevel"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let abbreviation = raw
        .get("ClassJob")
        .and_then(|c| c.get("Abbreviation"))
        .and_then(Value::as_str)
        .unwrap_or(job.abbreviation());

    let ingredients = ingredient_slots(raw)
        .into_iter()
        .flatten()
        .map(Ingredient::from)
        .collect();

    Some(Recipe::new(
        u32::try_from(id).ok()?,
        name,
        u32::try_from(level).unwrap_or(u32::MAX),
        abbreviation,
        ingredients,
    ))
}

/// Read all ten slots by index. Empty slots are None.
pub fn ingredient_slots(raw: &Value) -> [Option<IngredientSlot>; INGREDIENT_SLOTS] {
    std::array::from_fn(|slot| read_slot(raw, slot))
}

fn read_slot(raw: &Value, slot: usize) -> Option<IngredientSlot> {
    let quantity = raw.get(format!("AmountIngredient{}", slot))?.as_u64()?;
    let id = first_int(raw.get(format!("ItemIngredient{}TargetID", slot))?)?;
    if quantity == 0 || id <= 0 {
        return None;
    }

    let name = raw
        .get(format!("ItemIngredient{}", slot))
        .and_then(|item| item.get("Name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(IngredientSlot {
        id: u32::try_from(id).ok()?,
        name,
        quantity: u32::try_from(quantity).ok()?,
    })
}

/// Ids show up either bare or wrapped in a one-element array.
fn first_int(value: &Value) -> Option<i64> {
    match value {
        Value::Array(values) => values.first()?.as_i64(),
        other => other.as_i64(),
    }
}
