use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest crafting level the recipe search accepts.
pub const MAX_JOB_LEVEL: u32 = 90;

/// The eight Disciples of the Hand. Discriminants are the game's ClassJob ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CraftingJob {
    Carpenter = 8,
    Blacksmith = 9,
    Armorer = 10,
    Goldsmith = 11,
    Leatherworker = 12,
    Weaver = 13,
    Alchemist = 14,
    Culinarian = 15,
}

impl CraftingJob {
    pub const ALL: [CraftingJob; 8] = [
        Self::Carpenter,
        Self::Blacksmith,
        Self::Armorer,
        Self::Goldsmith,
        Self::Leatherworker,
        Self::Weaver,
        Self::Alchemist,
        Self::Culinarian,
    ];

    /// ClassJob id used by the recipe search.
    pub fn class_job_id(self) -> u32 {
        self as u32
    }

    /// Three-letter abbreviation (e.g. "CUL").
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::Carpenter => "CRP",
            Self::Blacksmith => "BSM",
            Self::Armorer => "ARM",
            Self::Goldsmith => "GSM",
            Self::Leatherworker => "LTW",
            Self::Weaver => "WVR",
            Self::Alchemist => "ALC",
            Self::Culinarian => "CUL",
        }
    }
}

impl fmt::Display for CraftingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for CraftingJob {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|job| job.abbreviation().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown crafting job '{}'", s))
    }
}

impl TryFrom<String> for CraftingJob {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CraftingJob> for String {
    fn from(job: CraftingJob) -> Self {
        job.abbreviation().to_string()
    }
}

/// A game world with its own market board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct World {
    pub id: u32,
    pub name: String,
}

/// How the config names a world: by id, or by name to be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WorldSelector {
    Id(u32),
    Name(String),
}

impl WorldSelector {
    /// Find this selector in a world list. Names match case-insensitively.
    pub fn resolve<'a>(&self, worlds: &'a [World]) -> Option<&'a World> {
        match self {
            Self::Id(id) => worlds.iter().find(|w| w.id == *id),
            Self::Name(name) => worlds
                .iter()
                .find(|w| w.name.eq_ignore_ascii_case(name.trim())),
        }
    }
}
