//! Choices made during one advancement session.

use crate::content::FeatDefinition;
use crate::key::ContentKey;
use crate::world::Ability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Points an ability score improvement distributes.
pub const ASI_POINTS: u8 = 2;

/// How the hit point gain was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HpMethod {
    Roll,
    Average,
}

impl fmt::Display for HpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HpMethod::Roll => write!(f, "roll"),
            HpMethod::Average => write!(f, "average"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpGain {
    pub method: HpMethod,
    pub value: u32,
}

/// Either raise ability scores or take a feat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsiChoice {
    Abilities(BTreeMap<Ability, u8>),
    Feat(FeatDefinition),
}

impl AsiChoice {
    /// Points assigned in ability mode; 0 in feat mode.
    pub fn points_spent(&self) -> u8 {
        match self {
            AsiChoice::Abilities(boosts) => boosts.values().sum(),
            AsiChoice::Feat(_) => 0,
        }
    }
}

/// Resolved choices, built up stage by stage and consumed on commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancementSelection {
    pub hp_gain: Option<HpGain>,
    pub subclass: Option<ContentKey>,
    pub asi: Option<AsiChoice>,
    pub cantrips: Vec<String>,
    pub spells: Vec<String>,
    /// Selected option keys per feature choice key.
    pub feature_choices: BTreeMap<String, Vec<String>>,
}

impl AdvancementSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ability boosts, or an empty map when no increase is chosen.
    pub fn ability_boosts(&self) -> BTreeMap<Ability, u8> {
        match &self.asi {
            Some(AsiChoice::Abilities(boosts)) => boosts.clone(),
            _ => BTreeMap::new(),
        }
    }

    pub fn feat(&self) -> Option<&FeatDefinition> {
        match &self.asi {
            Some(AsiChoice::Feat(feat)) => Some(feat),
            _ => None,
        }
    }
}
