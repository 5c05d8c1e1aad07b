mod job;
mod market;
mod recipe;

pub use job::{CraftingJob, World, WorldSelector, MAX_JOB_LEVEL};
pub use market::{ItemMarketData, MarketSnapshot, PricePoint};
pub use recipe::{Ingredient, Recipe};
