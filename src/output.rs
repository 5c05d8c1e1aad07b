use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{CraftingJob, Recipe, World};

/// What gets written to disk for one run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
    pub generated_at: DateTime<Utc>,
    pub job: CraftingJob,
    pub level: u32,
    pub world_id: u32,
    pub world_name: &'a str,
    /// Most profitable first
    pub recipes: Vec<&'a Recipe>,
}

impl<'a> Report<'a> {
    /// Wrap recipes ranked in ascending score order; the report lists
    /// them in reverse.
    pub fn new(job: CraftingJob, level: u32, world: &'a World, ranked: &'a [Recipe]) -> Self {
        Self {
            generated_at: Utc::now(),
            job,
            level,
            world_id: world.id,
            world_name: &world.name,
            recipes: ranked.iter().rev().collect(),
        }
    }

    /// e.g. "CUL_LV50.json"
    pub fn file_name(&self) -> String {
        format!("{}_LV{}.json", self.job, self.level)
    }
}

/// Write the report as pretty-printed JSON into `dir`. Returns the file path.
pub fn write_report(dir: &Path, report: &Report) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir {}", dir.display()))?;

    let path = dir.join(report.file_name());
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
