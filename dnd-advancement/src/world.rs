//! Character snapshot types.
//!
//! A [`Character`] is the read view the advancement engine works from. The
//! engine never mutates it; it produces a
//! [`CharacterUpdate`](crate::assembler::CharacterUpdate) instead.

use crate::dice::DieType;
use crate::key::ContentKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Highest level a character (or a single class) can reach.
pub const MAX_LEVEL: u8 = 20;

/// Ability scores cannot be raised past this by level-up choices.
pub const MAX_ABILITY_SCORE: u8 = 20;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i8 {
        let score = i16::from(self.get(ability));
        // Floor division: 8-9 = -1, 10-11 = 0, 12-13 = +1
        (score - 10).div_euclid(2) as i8
    }

    /// Raise an ability, capped at [`MAX_ABILITY_SCORE`]. Returns the new score.
    pub fn increase(&mut self, ability: Ability, amount: u8) -> u8 {
        let current = self.get(ability);
        let raised = current.saturating_add(amount).min(MAX_ABILITY_SCORE.max(current));
        self.set(ability, raised);
        raised
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Classes
// ============================================================================

/// The twelve PHB classes the built-in tables know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

impl CharacterClass {
    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Barbarian => "Barbarian",
            CharacterClass::Bard => "Bard",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Druid => "Druid",
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Monk => "Monk",
            CharacterClass::Paladin => "Paladin",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Sorcerer => "Sorcerer",
            CharacterClass::Warlock => "Warlock",
            CharacterClass::Wizard => "Wizard",
        }
    }

    /// Canonical content key for this class.
    pub fn key(&self) -> ContentKey {
        ContentKey::phb(self.name())
    }

    /// Resolve a content key to a built-in class by name.
    pub fn from_key(key: &ContentKey) -> Option<CharacterClass> {
        Self::all().iter().copied().find(|c| key.is_named(c.name()))
    }

    pub fn all() -> &'static [CharacterClass] {
        &[
            CharacterClass::Barbarian,
            CharacterClass::Bard,
            CharacterClass::Cleric,
            CharacterClass::Druid,
            CharacterClass::Fighter,
            CharacterClass::Monk,
            CharacterClass::Paladin,
            CharacterClass::Ranger,
            CharacterClass::Rogue,
            CharacterClass::Sorcerer,
            CharacterClass::Warlock,
            CharacterClass::Wizard,
        ]
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Levels held in one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLevel {
    pub class: ContentKey,
    pub level: u8,
    pub subclass: Option<ContentKey>,
}

impl ClassLevel {
    pub fn new(class: ContentKey, level: u8) -> Self {
        Self {
            class,
            level,
            subclass: None,
        }
    }

    pub fn with_subclass(mut self, subclass: ContentKey) -> Self {
        self.subclass = Some(subclass);
        self
    }
}

/// Class feature the character has gained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub description: String,
    pub source: String,
    pub uses: Option<FeatureUses>,
}

/// Limited use tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUses {
    pub current: u8,
    pub maximum: u8,
    pub recharge: RechargeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RechargeType {
    ShortRest,
    LongRest,
    Dawn,
}

// ============================================================================
// Hit Points
// ============================================================================

/// Hit points tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }
}

/// Hit dice pool, one entry per die size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HitDice {
    pub total: BTreeMap<DieType, u8>,
    pub remaining: BTreeMap<DieType, u8>,
}

impl HitDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, die_type: DieType, count: u8) {
        *self.total.entry(die_type).or_insert(0) += count;
        *self.remaining.entry(die_type).or_insert(0) += count;
    }

    /// Total number of hit dice across all sizes.
    pub fn count(&self) -> u32 {
        self.total.values().map(|&n| n as u32).sum()
    }
}

// ============================================================================
// Spellcasting
// ============================================================================

/// Spells the character has permanently learned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownSpells {
    pub cantrips: Vec<String>,
    pub spells: Vec<String>,
}

impl KnownSpells {
    /// Whether a spell or cantrip with this name is already known.
    pub fn knows(&self, name: &str) -> bool {
        self.cantrips
            .iter()
            .chain(self.spells.iter())
            .any(|known| known.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Character
// ============================================================================

/// Character state as seen by the advancement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub level: u8,
    pub ability_scores: AbilityScores,
    pub classes: Vec<ClassLevel>,
    pub hit_points: HitPoints,
    #[serde(default)]
    pub hit_dice: HitDice,
    /// Feat keys the character has taken.
    #[serde(default)]
    pub feats: BTreeSet<ContentKey>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub spells: KnownSpells,
    /// Resolved feature choices, keyed by [`feature_choice_key`](crate::key::feature_choice_key).
    #[serde(default)]
    pub feature_choices: BTreeMap<String, Vec<String>>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            level: 1,
            ability_scores: AbilityScores::default(),
            classes: Vec::new(),
            hit_points: HitPoints::new(10),
            hit_dice: HitDice::new(),
            feats: BTreeSet::new(),
            features: Vec::new(),
            spells: KnownSpells::default(),
            feature_choices: BTreeMap::new(),
        }
    }

    /// The class every level-up advances.
    pub fn primary_class(&self) -> Option<&ClassLevel> {
        self.classes.first()
    }

    /// Level in the primary class, or 0 for a classless character.
    pub fn primary_class_level(&self) -> u8 {
        self.primary_class().map(|c| c.level).unwrap_or(0)
    }

    /// Sum of levels across all class entries.
    pub fn class_level_total(&self) -> u32 {
        self.classes.iter().map(|c| c.level as u32).sum()
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features
            .iter()
            .any(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn has_feat(&self, key: &ContentKey) -> bool {
        self.feats.iter().any(|k| k.matches(key))
    }
}

// ============================================================================
// Sample Characters
// ============================================================================

/// Level 1 fighter with CON 14.
pub fn create_sample_fighter(name: &str) -> Character {
    let mut character = Character::new(name);
    character.ability_scores = AbilityScores::new(16, 13, 14, 10, 12, 8);
    character.hit_points = HitPoints::new(12);
    character.hit_dice.add(DieType::D10, 1);
    character
        .classes
        .push(ClassLevel::new(CharacterClass::Fighter.key(), 1));
    character.features.push(Feature {
        name: "Second Wind".to_string(),
        description: "Regain 1d10 + fighter level HP as bonus action".to_string(),
        source: "Fighter".to_string(),
        uses: Some(FeatureUses {
            current: 1,
            maximum: 1,
            recharge: RechargeType::ShortRest,
        }),
    });
    character
}

/// Level 1 wizard with three cantrips and a starting spellbook.
pub fn create_sample_wizard(name: &str) -> Character {
    let mut character = Character::new(name);
    character.ability_scores = AbilityScores::new(8, 14, 13, 16, 12, 10);
    character.hit_points = HitPoints::new(7);
    character.hit_dice.add(DieType::D6, 1);
    character
        .classes
        .push(ClassLevel::new(CharacterClass::Wizard.key(), 1));
    character.spells.cantrips = vec![
        "Fire Bolt".to_string(),
        "Light".to_string(),
        "Mage Hand".to_string(),
    ];
    character.spells.spells = vec![
        "Magic Missile".to_string(),
        "Shield".to_string(),
        "Sleep".to_string(),
    ];
    character
}

/// Level 1 sorcerer knowing four cantrips and two spells.
pub fn create_sample_sorcerer(name: &str) -> Character {
    let mut character = Character::new(name);
    character.ability_scores = AbilityScores::new(8, 14, 14, 10, 12, 15);
    character.hit_points = HitPoints::new(8);
    character.hit_dice.add(DieType::D6, 1);
    character
        .classes
        .push(ClassLevel::new(CharacterClass::Sorcerer.key(), 1));
    character.spells.cantrips = vec![
        "Fire Bolt".to_string(),
        "Ray of Frost".to_string(),
        "Light".to_string(),
        "Prestidigitation".to_string(),
    ];
    character.spells.spells = vec!["Magic Missile".to_string(), "Shield".to_string()];
    character
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_floors() {
        let scores = AbilityScores::new(8, 9, 10, 11, 14, 20);
        assert_eq!(scores.modifier(Ability::Strength), -1);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), 0);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), 2);
        assert_eq!(scores.modifier(Ability::Charisma), 5);
    }

    #[test]
    fn test_increase_caps_at_twenty() {
        let mut scores = AbilityScores::new(19, 10, 10, 10, 10, 10);
        assert_eq!(scores.increase(Ability::Strength, 2), 20);
        assert_eq!(scores.increase(Ability::Dexterity, 2), 12);
    }

    #[test]
    fn test_modifier_above_signed_byte() {
        let scores = AbilityScores::new(128, 200, 255, 30, 3, 1);
        assert_eq!(scores.modifier(Ability::Strength), 59);
        assert_eq!(scores.modifier(Ability::Dexterity), 95);
        assert_eq!(scores.modifier(Ability::Constitution), 122);
        assert_eq!(scores.modifier(Ability::Intelligence), 10);
        assert_eq!(scores.modifier(Ability::Wisdom), -4);
        assert_eq!(scores.modifier(Ability::Charisma), -5);
    }

    #[test]
    fn test_class_from_key() {
        let key = ContentKey::parse("fighter|PHB").unwrap();
        assert_eq!(CharacterClass::from_key(&key), Some(CharacterClass::Fighter));
        assert_eq!(CharacterClass::from_key(&ContentKey::phb("Artificer")), None);
    }

    #[test]
    fn test_sample_fighter_level_sum() {
        let fighter = create_sample_fighter("Roland");
        assert_eq!(fighter.class_level_total(), fighter.level as u32);
        assert_eq!(fighter.primary_class_level(), 1);
        assert!(fighter.has_feature("second wind"));
    }

    #[test]
    fn test_known_spells_case_insensitive() {
        let wizard = create_sample_wizard("Merlin");
        assert!(wizard.spells.knows("fire bolt"));
        assert!(wizard.spells.knows("SHIELD"));
        assert!(!wizard.spells.knows("Fireball"));
    }

    #[test]
    fn test_character_serde_roundtrip_defaults() {
        let json = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "name": "Bare",
            "level": 1,
            "ability_scores": AbilityScores::default(),
            "classes": [{ "class": "Fighter|PHB", "level": 1, "subclass": null }],
            "hit_points": HitPoints::new(10),
        });
        let character: Character = serde_json::from_value(json).unwrap();
        assert!(character.feats.is_empty());
        assert!(character.feature_choices.is_empty());
        assert_eq!(character.primary_class_level(), 1);
    }
}
