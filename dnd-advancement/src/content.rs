//! Rules content consumed by the advancement engine.
//!
//! Class features, subclasses, spell lists, feats, and feature choices come
//! from a [`RulesProvider`]. Any query may fail or come back empty; callers
//! degrade instead of aborting.

use crate::key::ContentKey;
use crate::world::Ability;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// The five queries a provider answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RulesQuery {
    ClassFeatures,
    Subclasses,
    Spells,
    Feats,
    FeatureChoices,
}

impl RulesQuery {
    pub fn name(&self) -> &'static str {
        match self {
            RulesQuery::ClassFeatures => "class features",
            RulesQuery::Subclasses => "subclasses",
            RulesQuery::Spells => "spell list",
            RulesQuery::Feats => "feats",
            RulesQuery::FeatureChoices => "feature choices",
        }
    }
}

impl fmt::Display for RulesQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors from a rules provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("No {query} data for {class}")]
    UnknownClass { query: RulesQuery, class: ContentKey },

    #[error("Failed to load {query}: {reason}")]
    Unavailable { query: RulesQuery, reason: String },
}

impl RulesError {
    pub fn query(&self) -> RulesQuery {
        match self {
            RulesError::UnknownClass { query, .. } | RulesError::Unavailable { query, .. } => {
                *query
            }
        }
    }
}

/// A class feature granted at a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFeature {
    pub name: String,
    pub level: u8,
    pub description: String,
}

/// A subclass option for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassInfo {
    pub key: ContentKey,
    /// Display name (e.g. "College of Lore"); `key.name` is the short id.
    pub name: String,
}

/// An entry in a class spell list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellInfo {
    pub name: String,
    /// 0 for cantrips.
    pub level: u8,
}

impl SpellInfo {
    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }
}

/// One prerequisite entry of a feat. Every condition present must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteEntry {
    /// Minimum character level.
    #[serde(default)]
    pub level: Option<u8>,
    /// Minimum ability scores.
    #[serde(default)]
    pub abilities: BTreeMap<Ability, u8>,
    /// Name of a class feature the character must have.
    #[serde(default)]
    pub feature: Option<String>,
    /// Free-text condition (e.g. "The ability to cast at least one spell").
    #[serde(default)]
    pub other: Option<String>,
}

impl PrerequisiteEntry {
    pub fn level(level: u8) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    pub fn ability(ability: Ability, minimum: u8) -> Self {
        Self::default().with_ability(ability, minimum)
    }

    pub fn feature(name: impl Into<String>) -> Self {
        Self {
            feature: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn other(text: impl Into<String>) -> Self {
        Self {
            other: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_ability(mut self, ability: Ability, minimum: u8) -> Self {
        self.abilities.insert(ability, minimum);
        self
    }
}

/// An ability score bonus granted by a feat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityBonus {
    pub ability: Ability,
    pub amount: u8,
    /// Built-in bonus of a generic improvement feat; never applied on top of
    /// an explicit choice.
    #[serde(default)]
    pub hidden: bool,
}

/// A feat as described by the rules data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatDefinition {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteEntry>,
    #[serde(default)]
    pub ability_bonuses: Vec<AbilityBonus>,
    #[serde(default)]
    pub repeatable: bool,
}

impl FeatDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            category: None,
            prerequisites: Vec::new(),
            ability_bonuses: Vec::new(),
            repeatable: false,
        }
    }

    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.name.clone(), self.source.clone())
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_prerequisite(mut self, entry: PrerequisiteEntry) -> Self {
        self.prerequisites.push(entry);
        self
    }

    pub fn with_bonus(mut self, ability: Ability, amount: u8) -> Self {
        self.ability_bonuses.push(AbilityBonus {
            ability,
            amount,
            hidden: false,
        });
        self
    }

    pub fn with_hidden_bonus(mut self, ability: Ability, amount: u8) -> Self {
        self.ability_bonuses.push(AbilityBonus {
            ability,
            amount,
            hidden: true,
        });
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Bonuses that apply when the feat is taken.
    pub fn visible_bonuses(&self) -> impl Iterator<Item = &AbilityBonus> {
        self.ability_bonuses.iter().filter(|b| !b.hidden)
    }

    /// Whether the feat can be picked in place of ability points. A feat
    /// whose bonuses are all hidden only mirrors a plain increase.
    pub fn is_selectable(&self) -> bool {
        self.ability_bonuses.is_empty() || self.visible_bonuses().next().is_some()
    }
}

/// Whether a feature choice picks one option or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceKind {
    Single,
    Multiple,
}

/// One selectable option of a feature choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ChoiceOption {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A decision a class feature imposes at a level (e.g. a fighting style).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureChoice {
    pub feature_name: String,
    pub level: u8,
    pub kind: ChoiceKind,
    #[serde(default)]
    pub count: Option<u8>,
    pub options: Vec<ChoiceOption>,
}

impl FeatureChoice {
    pub fn single(feature_name: impl Into<String>, level: u8, options: Vec<ChoiceOption>) -> Self {
        Self {
            feature_name: feature_name.into(),
            level,
            kind: ChoiceKind::Single,
            count: None,
            options,
        }
    }

    pub fn multiple(
        feature_name: impl Into<String>,
        level: u8,
        count: u8,
        options: Vec<ChoiceOption>,
    ) -> Self {
        Self {
            feature_name: feature_name.into(),
            level,
            kind: ChoiceKind::Multiple,
            count: Some(count),
            options,
        }
    }

    /// How many options may be selected.
    pub fn max_selections(&self) -> usize {
        match self.kind {
            ChoiceKind::Single => 1,
            ChoiceKind::Multiple => self.count.unwrap_or(1) as usize,
        }
    }

    pub fn option(&self, key: &str) -> Option<&ChoiceOption> {
        self.options.iter().find(|o| o.key == key)
    }
}

/// Read-only source of rules content.
pub trait RulesProvider {
    fn class_features_at(&self, class: &ContentKey, level: u8)
        -> Result<Vec<ClassFeature>, RulesError>;

    fn subclasses_of(&self, class: &ContentKey) -> Result<Vec<SubclassInfo>, RulesError>;

    fn spells_of(&self, class: &ContentKey) -> Result<Vec<SpellInfo>, RulesError>;

    fn all_feats(&self) -> Result<Vec<FeatDefinition>, RulesError>;

    fn feature_choices_at(
        &self,
        class: &ContentKey,
        level: u8,
        subclass: Option<&ContentKey>,
    ) -> Result<Vec<FeatureChoice>, RulesError>;
}

type LevelKey = (String, u8);

/// Memoizing wrapper around a provider.
///
/// The cache is owned by whoever creates it, so its lifetime (one session,
/// one process) is the caller's decision. Only successful answers are kept.
pub struct CachedRules<P> {
    inner: P,
    features: RefCell<HashMap<LevelKey, Vec<ClassFeature>>>,
    subclasses: RefCell<HashMap<String, Vec<SubclassInfo>>>,
    spells: RefCell<HashMap<String, Vec<SpellInfo>>>,
    feats: RefCell<Option<Vec<FeatDefinition>>>,
    choices: RefCell<HashMap<(String, u8, Option<String>), Vec<FeatureChoice>>>,
}

impl<P: RulesProvider> CachedRules<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            features: RefCell::new(HashMap::new()),
            subclasses: RefCell::new(HashMap::new()),
            spells: RefCell::new(HashMap::new()),
            feats: RefCell::new(None),
            choices: RefCell::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drop every cached answer.
    pub fn clear(&self) {
        self.features.borrow_mut().clear();
        self.subclasses.borrow_mut().clear();
        self.spells.borrow_mut().clear();
        self.feats.borrow_mut().take();
        self.choices.borrow_mut().clear();
    }
}

fn memoize<K, V>(
    cache: &RefCell<HashMap<K, V>>,
    key: K,
    load: impl FnOnce() -> Result<V, RulesError>,
) -> Result<V, RulesError>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    if let Some(hit) = cache.borrow().get(&key) {
        return Ok(hit.clone());
    }
    let value = load()?;
    cache.borrow_mut().insert(key, value.clone());
    Ok(value)
}

impl<P: RulesProvider> RulesProvider for CachedRules<P> {
    fn class_features_at(
        &self,
        class: &ContentKey,
        level: u8,
    ) -> Result<Vec<ClassFeature>, RulesError> {
        memoize(&self.features, (class.table_id(), level), || {
            self.inner.class_features_at(class, level)
        })
    }

    fn subclasses_of(&self, class: &ContentKey) -> Result<Vec<SubclassInfo>, RulesError> {
        memoize(&self.subclasses, class.table_id(), || {
            self.inner.subclasses_of(class)
        })
    }

    fn spells_of(&self, class: &ContentKey) -> Result<Vec<SpellInfo>, RulesError> {
        memoize(&self.spells, class.table_id(), || self.inner.spells_of(class))
    }

    fn all_feats(&self) -> Result<Vec<FeatDefinition>, RulesError> {
        if let Some(feats) = self.feats.borrow().as_ref() {
            return Ok(feats.clone());
        }
        let feats = self.inner.all_feats()?;
        *self.feats.borrow_mut() = Some(feats.clone());
        Ok(feats)
    }

    fn feature_choices_at(
        &self,
        class: &ContentKey,
        level: u8,
        subclass: Option<&ContentKey>,
    ) -> Result<Vec<FeatureChoice>, RulesError> {
        let key = (class.table_id(), level, subclass.map(|s| s.to_string()));
        memoize(&self.choices, key, || {
            self.inner.feature_choices_at(class, level, subclass)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRules;

    #[test]
    fn test_visible_bonuses_skip_hidden() {
        let feat = FeatDefinition::new("Ability Score Improvement", "PHB")
            .with_hidden_bonus(Ability::Strength, 2)
            .with_bonus(Ability::Charisma, 1);
        let visible: Vec<_> = feat.visible_bonuses().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].ability, Ability::Charisma);
    }

    #[test]
    fn test_all_hidden_feat_not_selectable() {
        let stand_in = FeatDefinition::new("Ability Score Improvement", "PHB")
            .with_hidden_bonus(Ability::Strength, 2);
        let mixed = stand_in.clone().with_bonus(Ability::Charisma, 1);
        assert!(!stand_in.is_selectable());
        assert!(mixed.is_selectable());
        assert!(FeatDefinition::new("Alert", "PHB").is_selectable());
    }

    #[test]
    fn test_max_selections() {
        let single = FeatureChoice::single("Fighting Style", 1, vec![]);
        let multiple = FeatureChoice::multiple("Expertise", 1, 2, vec![]);
        assert_eq!(single.max_selections(), 1);
        assert_eq!(multiple.max_selections(), 2);
    }

    #[test]
    fn test_prerequisite_entry_from_json() {
        let entry: PrerequisiteEntry =
            serde_json::from_str(r#"{ "level": 4, "abilities": { "Charisma": 13 } }"#).unwrap();
        assert_eq!(entry.level, Some(4));
        assert_eq!(entry.abilities.get(&Ability::Charisma), Some(&13));
        assert!(entry.feature.is_none());
    }

    #[test]
    fn test_cached_rules_hits_inner_once() {
        let cached = CachedRules::new(MockRules::new());
        let class = ContentKey::phb("Fighter");

        cached.subclasses_of(&class).unwrap();
        cached.subclasses_of(&class).unwrap();
        cached.all_feats().unwrap();
        cached.all_feats().unwrap();

        assert_eq!(cached.inner().calls(RulesQuery::Subclasses), 1);
        assert_eq!(cached.inner().calls(RulesQuery::Feats), 1);
    }

    #[test]
    fn test_cached_rules_does_not_cache_failures() {
        let mock = MockRules::new();
        mock.fail(RulesQuery::Spells);
        let cached = CachedRules::new(mock);
        let class = ContentKey::phb("Wizard");

        assert!(cached.spells_of(&class).is_err());
        cached.inner().restore(RulesQuery::Spells);
        assert!(cached.spells_of(&class).is_ok());
        assert_eq!(cached.inner().calls(RulesQuery::Spells), 2);

        cached.clear();
        cached.spells_of(&class).unwrap();
        assert_eq!(cached.inner().calls(RulesQuery::Spells), 3);
    }
}
