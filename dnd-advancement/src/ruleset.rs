//! Rules tables driving level advancement.
//!
//! Every per-class constant the calculator needs (hit dice, ASI levels,
//! subclass levels, cantrip and spells-known progressions) lives in one
//! versioned [`Ruleset`] value. The built-in 5e tables come from
//! [`Ruleset::srd`]; custom tables can be loaded from JSON.

use crate::dice::DieType;
use crate::key::ContentKey;
use crate::world::MAX_LEVEL;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Current ruleset format version.
pub const RULESET_VERSION: u32 = 1;

/// Highest spell level in the game.
pub const MAX_SPELL_LEVEL: u8 = 9;

/// Errors from loading or validating a ruleset.
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Invalid table for {class}: {reason}")]
    InvalidTable { class: String, reason: String },
}

/// Sparse level → value table. The value at level `L` is the value stored
/// under the greatest key `<= L`, or 0 when no key qualifies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable(BTreeMap<u8, u32>);

impl ThresholdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(u8, u32)]) -> Self {
        Self(pairs.iter().copied().collect())
    }

    pub fn insert(&mut self, level: u8, value: u32) {
        self.0.insert(level, value);
    }

    /// Cumulative value in effect at `level`.
    pub fn value_at(&self, level: u8) -> u32 {
        self.0
            .range(..=level)
            .next_back()
            .map(|(_, &value)| value)
            .unwrap_or(0)
    }

    /// Growth between two levels, never negative.
    pub fn gained_between(&self, from: u8, to: u8) -> u32 {
        self.value_at(to).saturating_sub(self.value_at(from))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.keys().copied()
    }
}

/// Highest spell level a caster of `level` can cast: `min(9, ceil(level / 2))`.
pub fn max_spell_level(level: u8) -> u8 {
    level.div_ceil(2).min(MAX_SPELL_LEVEL)
}

/// Versioned set of advancement tables. Class tables are keyed by the
/// lowercased class name (see [`ContentKey::table_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub version: u32,
    pub default_hit_die: DieType,
    #[serde(default)]
    pub hit_dice: BTreeMap<String, DieType>,
    pub default_asi_levels: Vec<u8>,
    #[serde(default)]
    pub asi_levels: BTreeMap<String, Vec<u8>>,
    pub default_subclass_level: u8,
    #[serde(default)]
    pub subclass_levels: BTreeMap<String, u8>,
    #[serde(default)]
    pub cantrips_known: BTreeMap<String, ThresholdTable>,
    #[serde(default)]
    pub spells_known: BTreeMap<String, ThresholdTable>,
    /// Classes that learn a fixed number of spells instead of preparing them.
    #[serde(default)]
    pub known_casters: BTreeSet<String>,
}

impl Ruleset {
    /// Empty ruleset: every class uses the defaults.
    pub fn empty() -> Self {
        Self {
            version: RULESET_VERSION,
            default_hit_die: DieType::D8,
            hit_dice: BTreeMap::new(),
            default_asi_levels: vec![4, 8, 12, 16, 19],
            asi_levels: BTreeMap::new(),
            default_subclass_level: 3,
            subclass_levels: BTreeMap::new(),
            cantrips_known: BTreeMap::new(),
            spells_known: BTreeMap::new(),
            known_casters: BTreeSet::new(),
        }
    }

    /// Built-in 5e tables for the twelve PHB classes.
    pub fn srd() -> Self {
        let mut rules = Self::empty();

        for (class, die) in [
            ("barbarian", DieType::D12),
            ("fighter", DieType::D10),
            ("paladin", DieType::D10),
            ("ranger", DieType::D10),
            ("bard", DieType::D8),
            ("cleric", DieType::D8),
            ("druid", DieType::D8),
            ("monk", DieType::D8),
            ("rogue", DieType::D8),
            ("warlock", DieType::D8),
            ("sorcerer", DieType::D6),
            ("wizard", DieType::D6),
        ] {
            rules.hit_dice.insert(class.to_string(), die);
        }

        rules
            .asi_levels
            .insert("fighter".to_string(), vec![4, 6, 8, 12, 14, 16, 19]);
        rules
            .asi_levels
            .insert("rogue".to_string(), vec![4, 8, 10, 12, 16, 19]);

        for (class, level) in [
            ("cleric", 1),
            ("sorcerer", 1),
            ("warlock", 1),
            ("druid", 2),
            ("wizard", 2),
        ] {
            rules.subclass_levels.insert(class.to_string(), level);
        }

        for (class, table) in [
            ("bard", &[(1, 2), (4, 3), (10, 4)][..]),
            ("cleric", &[(1, 3), (4, 4), (10, 5)][..]),
            ("druid", &[(1, 2), (4, 3), (10, 4)][..]),
            ("sorcerer", &[(1, 4), (4, 5), (10, 6)][..]),
            ("warlock", &[(1, 2), (4, 3), (10, 4)][..]),
            ("wizard", &[(1, 3), (4, 4), (10, 5)][..]),
        ] {
            rules
                .cantrips_known
                .insert(class.to_string(), ThresholdTable::from_pairs(table));
        }

        for (class, table) in [
            (
                "bard",
                &[
                    (1, 4),
                    (2, 5),
                    (3, 6),
                    (4, 7),
                    (5, 8),
                    (6, 9),
                    (7, 10),
                    (8, 11),
                    (9, 12),
                    (10, 14),
                    (11, 15),
                    (13, 16),
                    (14, 18),
                    (15, 19),
                    (17, 20),
                    (18, 22),
                ][..],
            ),
            (
                "ranger",
                &[
                    (2, 2),
                    (3, 3),
                    (5, 4),
                    (7, 5),
                    (9, 6),
                    (11, 7),
                    (13, 8),
                    (15, 9),
                    (17, 10),
                    (19, 11),
                ][..],
            ),
            (
                "sorcerer",
                &[
                    (1, 2),
                    (2, 3),
                    (3, 4),
                    (4, 5),
                    (5, 6),
                    (6, 7),
                    (7, 8),
                    (8, 9),
                    (9, 10),
                    (10, 11),
                    (11, 12),
                    (13, 13),
                    (15, 14),
                    (17, 15),
                ][..],
            ),
            (
                "warlock",
                &[
                    (1, 2),
                    (2, 3),
                    (3, 4),
                    (4, 5),
                    (5, 6),
                    (6, 7),
                    (7, 8),
                    (8, 9),
                    (9, 10),
                    (11, 11),
                    (13, 12),
                    (15, 13),
                    (17, 14),
                    (19, 15),
                ][..],
            ),
        ] {
            rules
                .spells_known
                .insert(class.to_string(), ThresholdTable::from_pairs(table));
            rules.known_casters.insert(class.to_string());
        }

        rules
    }

    /// Parse and validate a ruleset from JSON.
    pub fn from_json(json: &str) -> Result<Self, RulesetError> {
        let rules: Ruleset = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load a ruleset file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RulesetError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Check version and level bounds of every table.
    pub fn validate(&self) -> Result<(), RulesetError> {
        if self.version != RULESET_VERSION {
            return Err(RulesetError::VersionMismatch {
                expected: RULESET_VERSION,
                found: self.version,
            });
        }

        let in_range = |level: u8| (1..=MAX_LEVEL).contains(&level);
        let invalid = |class: &str, reason: String| RulesetError::InvalidTable {
            class: class.to_string(),
            reason,
        };

        if let Some(level) = self.default_asi_levels.iter().find(|l| !in_range(**l)) {
            return Err(invalid("default", format!("ASI level {level} out of range")));
        }
        if !in_range(self.default_subclass_level) {
            return Err(invalid(
                "default",
                format!("subclass level {} out of range", self.default_subclass_level),
            ));
        }
        for (class, levels) in &self.asi_levels {
            if let Some(level) = levels.iter().find(|l| !in_range(**l)) {
                return Err(invalid(class, format!("ASI level {level} out of range")));
            }
        }
        for (class, level) in &self.subclass_levels {
            if !in_range(*level) {
                return Err(invalid(class, format!("subclass level {level} out of range")));
            }
        }
        for (class, table) in self.cantrips_known.iter().chain(self.spells_known.iter()) {
            if let Some(level) = table.levels().find(|l| !in_range(*l)) {
                return Err(invalid(class, format!("threshold level {level} out of range")));
            }
        }

        Ok(())
    }

    pub fn hit_die(&self, class: &ContentKey) -> DieType {
        self.hit_dice
            .get(&class.table_id())
            .copied()
            .unwrap_or(self.default_hit_die)
    }

    pub fn asi_levels(&self, class: &ContentKey) -> &[u8] {
        self.asi_levels
            .get(&class.table_id())
            .map(Vec::as_slice)
            .unwrap_or(&self.default_asi_levels)
    }

    pub fn is_asi_level(&self, class: &ContentKey, level: u8) -> bool {
        self.asi_levels(class).contains(&level)
    }

    pub fn subclass_level(&self, class: &ContentKey) -> u8 {
        self.subclass_levels
            .get(&class.table_id())
            .copied()
            .unwrap_or(self.default_subclass_level)
    }

    pub fn is_known_caster(&self, class: &ContentKey) -> bool {
        self.known_casters.contains(&class.table_id())
    }

    /// Whether the class learns cantrips or spells through these tables.
    pub fn casts_spells(&self, class: &ContentKey) -> bool {
        let id = class.table_id();
        self.known_casters.contains(&id) || self.cantrips_known.contains_key(&id)
    }

    /// Cantrips known at `level`.
    pub fn cantrips_known(&self, class: &ContentKey, level: u8) -> u32 {
        self.cantrips_known
            .get(&class.table_id())
            .map(|t| t.value_at(level))
            .unwrap_or(0)
    }

    /// Spells known at `level`; always 0 for classes that are not known casters.
    pub fn spells_known(&self, class: &ContentKey, level: u8) -> u32 {
        if !self.is_known_caster(class) {
            return 0;
        }
        self.spells_known
            .get(&class.table_id())
            .map(|t| t.value_at(level))
            .unwrap_or(0)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::srd()
    }
}
