use serde::Serialize;

/// A required input for a recipe. Every recipe owns its own copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: u32,
    pub name: String,
    /// Units consumed per craft
    pub quantity: u32,
    /// Filtered current-market unit price, None without any price data
    pub average_price: Option<i64>,
    /// average_price * quantity
    pub total_price: Option<i64>,
}

impl Ingredient {
    pub fn new(id: u32, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
            average_price: None,
            total_price: None,
        }
    }

    /// Set the unit price and derive the line total.
    pub fn set_price(&mut self, average_price: Option<i64>) {
        self.average_price = average_price;
        self.total_price = average_price.map(|p| p * i64::from(self.quantity));
    }
}

/// A craftable item plus everything scoring learns about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Finished-item id
    pub id: u32,
    pub name: String,
    pub recipe_level: u32,
    pub job: String,
    /// Recipe slot order
    pub ingredients: Vec<Ingredient>,

    /// Filtered sale price, None when the item has no sale history
    pub average_price: Option<i64>,
    /// Regular-quality sales per day
    pub sale_velocity: f64,
    pub ingredient_price_total: Option<i64>,
    /// Ingredients left out of the total for lack of price data
    pub unpriced_ingredients: usize,
    pub unit_profit: Option<i64>,
    pub profitability_score: Option<f64>,
}

impl Recipe {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        recipe_level: u32,
        job: impl Into<String>,
        ingredients: Vec<Ingredient>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            recipe_level,
            job: job.into(),
            ingredients,
            average_price: None,
            sale_velocity: 0.0,
            ingredient_price_total: None,
            unpriced_ingredients: 0,
            unit_profit: None,
            profitability_score: None,
        }
    }

    /// True once a sale price was found and a score computed.
    pub fn is_scored(&self) -> bool {
        self.profitability_score.is_some()
    }

    /// Drop any previously derived figures.
    pub fn clear_scores(&mut self) {
        self.average_price = None;
        self.sale_velocity = 0.0;
        self.ingredient_price_total = None;
        self.unpriced_ingredients = 0;
        self.unit_profit = None;
        self.profitability_score = None;
        for ingredient in &mut self.ingredients {
            ingredient.set_price(None);
        }
    }
}
