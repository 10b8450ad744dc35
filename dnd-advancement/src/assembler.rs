//! State assembler.
//!
//! Folds a finished [`AdvancementSelection`] and the numeric deltas of the
//! [`AdvancementRequirement`] into a single [`CharacterUpdate`]. Validation
//! happens in the session; anything reaching here is already legal.

use crate::advancement::AdvancementRequirement;
use crate::key::ContentKey;
use crate::selection::{AdvancementSelection, AsiChoice};
use crate::world::{AbilityScores, Character, CharacterId, ClassLevel, Feature, HitDice};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Complete post-advancement state of every field a level gain touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterUpdate {
    pub character_id: CharacterId,
    pub level: u8,
    pub classes: Vec<ClassLevel>,
    pub hp_gain: u32,
    pub max_hp: i32,
    pub current_hp: i32,
    pub ability_scores: AbilityScores,
    pub feats: BTreeSet<ContentKey>,
    pub cantrips: Vec<String>,
    pub spells: Vec<String>,
    pub feature_choices: BTreeMap<String, Vec<String>>,
    pub hit_dice: HitDice,
    pub features: Vec<Feature>,
}

impl CharacterUpdate {
    /// Write the payload onto a character.
    pub fn apply_to(&self, character: &mut Character) {
        character.level = self.level;
        character.classes = self.classes.clone();
        character.hit_points.maximum = self.max_hp;
        character.hit_points.current = self.current_hp;
        character.ability_scores = self.ability_scores.clone();
        character.feats = self.feats.clone();
        character.spells.cantrips = self.cantrips.clone();
        character.spells.spells = self.spells.clone();
        character.feature_choices = self.feature_choices.clone();
        character.hit_dice = self.hit_dice.clone();
        character.features = self.features.clone();
    }
}

/// Build the update for one level gain of the primary class.
pub fn assemble(
    snapshot: &Character,
    requirement: &AdvancementRequirement,
    selection: &AdvancementSelection,
) -> CharacterUpdate {
    let mut classes = snapshot.classes.clone();
    if let Some(primary) = classes.first_mut() {
        primary.level = requirement.target_level;
        if let Some(subclass) = &selection.subclass {
            primary.subclass = Some(subclass.clone());
        }
    }

    let hp_gain = selection.hp_gain.map(|g| g.value).unwrap_or(0);
    let gain = i32::try_from(hp_gain).unwrap_or(i32::MAX);

    let mut ability_scores = snapshot.ability_scores.clone();
    let mut feats = snapshot.feats.clone();
    match &selection.asi {
        Some(AsiChoice::Abilities(boosts)) => {
            for (&ability, &amount) in boosts {
                ability_scores.increase(ability, amount);
            }
        }
        Some(AsiChoice::Feat(feat)) => {
            feats.insert(feat.key());
            for bonus in feat.visible_bonuses() {
                ability_scores.increase(bonus.ability, bonus.amount);
            }
        }
        None => {}
    }

    let mut cantrips = snapshot.spells.cantrips.clone();
    cantrips.extend(selection.cantrips.iter().cloned());
    let mut spells = snapshot.spells.spells.clone();
    spells.extend(selection.spells.iter().cloned());

    let mut feature_choices = snapshot.feature_choices.clone();
    for (key, options) in &selection.feature_choices {
        if !options.is_empty() {
            feature_choices.insert(key.clone(), options.clone());
        }
    }

    let mut hit_dice = snapshot.hit_dice.clone();
    hit_dice.add(requirement.hit_die, 1);

    let mut features = snapshot.features.clone();
    for granted in &requirement.new_features {
        if !snapshot.has_feature(&granted.name) {
            features.push(Feature {
                name: granted.name.clone(),
                description: granted.description.clone(),
                source: requirement.class.name.clone(),
                uses: None,
            });
        }
    }

    CharacterUpdate {
        character_id: snapshot.id,
        level: snapshot.level.saturating_add(1),
        classes,
        hp_gain,
        max_hp: snapshot.hit_points.maximum.saturating_add(gain),
        current_hp: snapshot.hit_points.current.saturating_add(gain),
        ability_scores,
        feats,
        cantrips,
        spells,
        feature_choices,
        hit_dice,
        features,
    }
}
