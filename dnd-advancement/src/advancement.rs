//! Advancement calculator.
//!
//! Works out everything a single level gain in the primary class requires:
//! hit points, subclass, ASI, new cantrips and spells, and feature choices.
//! The result depends only on the character snapshot, the target level, the
//! ruleset, and what the rules provider answers.

use crate::content::{ClassFeature, FeatureChoice, RulesError, RulesProvider, RulesQuery};
use crate::dice::DieType;
use crate::key::ContentKey;
use crate::ruleset::{max_spell_level, Ruleset};
use crate::session::AdvanceError;
use crate::world::{Ability, Character, MAX_LEVEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Everything one level gain asks of the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancementRequirement {
    pub class: ContentKey,
    pub subclass: Option<ContentKey>,
    pub current_level: u8,
    pub target_level: u8,
    pub hit_die: DieType,
    pub con_modifier: i8,
    pub needs_subclass: bool,
    pub is_asi_level: bool,
    pub new_cantrips: u32,
    pub new_spells: u32,
    /// Reported only; unlocking a spell level requires no choice on its own.
    pub new_spell_level_unlocked: bool,
    /// Highest spell level castable at the target level.
    pub max_spell_level: u8,
    /// Class features granted at the target level.
    pub new_features: Vec<ClassFeature>,
    pub feature_choices: Vec<FeatureChoice>,
}

impl AdvancementRequirement {
    pub fn needs_spell_selection(&self) -> bool {
        self.new_cantrips + self.new_spells > 0
    }
}

/// A rules query that failed or came back empty, kept so the caller can show
/// it without aborting the advancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWarning {
    pub query: RulesQuery,
    pub message: String,
}

impl DataWarning {
    pub fn new(query: RulesQuery, message: impl Into<String>) -> Self {
        Self {
            query,
            message: message.into(),
        }
    }
}

impl From<RulesError> for DataWarning {
    fn from(err: RulesError) -> Self {
        Self::new(err.query(), err.to_string())
    }
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Computed requirement plus the provider problems met along the way.
#[derive(Debug, Clone)]
pub struct Advancement {
    pub requirement: AdvancementRequirement,
    pub warnings: Vec<DataWarning>,
}

/// Compute what advancing `character`'s primary class to `target_level`
/// requires. Only single-step advancement is accepted.
pub fn compute(
    character: &Character,
    target_level: u8,
    ruleset: &Ruleset,
    provider: &dyn RulesProvider,
) -> Result<Advancement, AdvanceError> {
    let primary = character.primary_class().ok_or(AdvanceError::NoClass)?;
    let current_level = primary.level;

    if target_level > MAX_LEVEL || character.level >= MAX_LEVEL {
        return Err(AdvanceError::LevelCap {
            target: target_level,
        });
    }
    if target_level != current_level.saturating_add(1) {
        return Err(AdvanceError::InvalidTarget {
            current: current_level,
            target: target_level,
        });
    }

    let class = &primary.class;
    let subclass = primary.subclass.as_ref();
    let mut warnings = Vec::new();

    let casts_spells = ruleset.casts_spells(class);
    let new_spell_level_unlocked =
        casts_spells && max_spell_level(target_level) > max_spell_level(current_level);

    let new_features = match provider.class_features_at(class, target_level) {
        Ok(features) => features,
        Err(err) => {
            warn!(class = %class, level = target_level, error = %err, "Class features unavailable");
            warnings.push(DataWarning::from(err));
            Vec::new()
        }
    };

    let feature_choices = match provider.feature_choices_at(class, target_level, subclass) {
        Ok(choices) => choices,
        Err(err) => {
            warn!(class = %class, level = target_level, error = %err, "Feature choices unavailable");
            warnings.push(DataWarning::from(err));
            Vec::new()
        }
    };

    let cantrips = ruleset
        .cantrips_known(class, target_level)
        .saturating_sub(ruleset.cantrips_known(class, current_level));
    let spells = ruleset
        .spells_known(class, target_level)
        .saturating_sub(ruleset.spells_known(class, current_level));

    let requirement = AdvancementRequirement {
        class: class.clone(),
        subclass: subclass.cloned(),
        current_level,
        target_level,
        hit_die: ruleset.hit_die(class),
        con_modifier: character.ability_scores.modifier(Ability::Constitution),
        needs_subclass: subclass.is_none() && target_level == ruleset.subclass_level(class),
        is_asi_level: ruleset.is_asi_level(class, target_level),
        new_cantrips: cantrips,
        new_spells: spells,
        new_spell_level_unlocked,
        max_spell_level: if casts_spells {
            max_spell_level(target_level)
        } else {
            0
        },
        new_features,
        feature_choices,
    };

    debug!(
        class = %requirement.class,
        target = target_level,
        hit_die = %requirement.hit_die,
        needs_subclass = requirement.needs_subclass,
        is_asi_level = requirement.is_asi_level,
        new_cantrips = requirement.new_cantrips,
        new_spells = requirement.new_spells,
        choices = requirement.feature_choices.len(),
        "Computed advancement requirement"
    );

    Ok(Advancement {
        requirement,
        warnings,
    })
}

/// Hit points from a rolled hit die: `max(1, roll + con)`.
pub fn hp_from_roll(roll: u32, con_modifier: i8) -> u32 {
    (roll as i64 + con_modifier as i64).max(1) as u32
}

/// Hit points from the fixed value: `max(1, ceil(die / 2) + 1 + con)`.
pub fn average_hp(hit_die: DieType, con_modifier: i8) -> u32 {
    hp_from_roll(hit_die.fixed_average(), con_modifier)
}
