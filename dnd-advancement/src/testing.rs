//! Testing utilities for the advancement engine.
//!
//! This module provides scriptable doubles for integration testing:
//! - `MockRules` wraps the built-in content and can fail or empty any query
//! - `MockStore` rejects a configurable number of updates before accepting

use crate::assembler::CharacterUpdate;
use crate::class_data::SrdRules;
use crate::content::{
    ClassFeature, FeatDefinition, FeatureChoice, RulesError, RulesProvider, RulesQuery,
    SpellInfo, SubclassInfo,
};
use crate::key::ContentKey;
use crate::persist::{CharacterStore, MemoryStore, PersistError};
use crate::world::{Character, CharacterId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// A rules provider whose answers can be scripted per query.
///
/// Unscripted queries are answered from [`SrdRules`].
#[derive(Debug, Default)]
pub struct MockRules {
    inner: SrdRules,
    failing: RefCell<HashSet<RulesQuery>>,
    empty: RefCell<HashSet<RulesQuery>>,
    calls: RefCell<HashMap<RulesQuery, usize>>,
    extra_feats: Vec<FeatDefinition>,
    extra_choices: Vec<(ContentKey, FeatureChoice)>,
}

impl MockRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feat on top of the built-in list.
    pub fn with_feat(mut self, feat: FeatDefinition) -> Self {
        self.extra_feats.push(feat);
        self
    }

    /// Offer an extra feature choice for `class` at the choice's level.
    pub fn with_feature_choice(mut self, class: ContentKey, choice: FeatureChoice) -> Self {
        self.extra_choices.push((class, choice));
        self
    }

    /// Make every later call of `query` fail.
    pub fn fail(&self, query: RulesQuery) {
        self.failing.borrow_mut().insert(query);
    }

    /// Make every later call of `query` succeed with no data.
    pub fn return_empty(&self, query: RulesQuery) {
        self.empty.borrow_mut().insert(query);
    }

    /// Undo `fail` and `return_empty` for `query`.
    pub fn restore(&self, query: RulesQuery) {
        self.failing.borrow_mut().remove(&query);
        self.empty.borrow_mut().remove(&query);
    }

    /// How many times `query` has been asked.
    pub fn calls(&self, query: RulesQuery) -> usize {
        self.calls.borrow().get(&query).copied().unwrap_or(0)
    }

    fn answer<T>(
        &self,
        query: RulesQuery,
        load: impl FnOnce() -> Result<Vec<T>, RulesError>,
    ) -> Result<Vec<T>, RulesError> {
        *self.calls.borrow_mut().entry(query).or_insert(0) += 1;
        if self.failing.borrow().contains(&query) {
            return Err(RulesError::Unavailable {
                query,
                reason: "scripted failure".to_string(),
            });
        }
        if self.empty.borrow().contains(&query) {
            return Ok(Vec::new());
        }
        load()
    }
}

impl RulesProvider for MockRules {
    fn class_features_at(
        &self,
        class: &ContentKey,
        level: u8,
    ) -> Result<Vec<ClassFeature>, RulesError> {
        self.answer(RulesQuery::ClassFeatures, || {
            self.inner.class_features_at(class, level)
        })
    }

    fn subclasses_of(&self, class: &ContentKey) -> Result<Vec<SubclassInfo>, RulesError> {
        self.answer(RulesQuery::Subclasses, || self.inner.subclasses_of(class))
    }

    fn spells_of(&self, class: &ContentKey) -> Result<Vec<SpellInfo>, RulesError> {
        self.answer(RulesQuery::Spells, || self.inner.spells_of(class))
    }

    fn all_feats(&self) -> Result<Vec<FeatDefinition>, RulesError> {
        self.answer(RulesQuery::Feats, || {
            let mut feats = self.inner.all_feats()?;
            feats.extend(self.extra_feats.iter().cloned());
            Ok(feats)
        })
    }

    fn feature_choices_at(
        &self,
        class: &ContentKey,
        level: u8,
        subclass: Option<&ContentKey>,
    ) -> Result<Vec<FeatureChoice>, RulesError> {
        self.answer(RulesQuery::FeatureChoices, || {
            let mut choices = self.inner.feature_choices_at(class, level, subclass)?;
            choices.extend(
                self.extra_choices
                    .iter()
                    .filter(|(c, choice)| c.matches(class) && choice.level == level)
                    .map(|(_, choice)| choice.clone()),
            );
            Ok(choices)
        })
    }
}

/// A store that rejects the next `n` updates, then behaves like
/// [`MemoryStore`].
#[derive(Debug, Default)]
pub struct MockStore {
    store: MemoryStore,
    reject_next: usize,
    attempts: usize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_character(mut self, character: Character) -> Self {
        self.store.insert(character);
        self
    }

    pub fn rejecting(mut self, count: usize) -> Self {
        self.reject_next = count;
        self
    }

    /// Total `apply_update` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.store.get(id)
    }
}

impl CharacterStore for MockStore {
    fn apply_update(
        &mut self,
        id: CharacterId,
        update: &CharacterUpdate,
    ) -> Result<(), PersistError> {
        self.attempts += 1;
        if self.reject_next > 0 {
            self.reject_next -= 1;
            return Err(PersistError::Rejected("storage unavailable".to_string()));
        }
        self.store.apply_update(id, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CharacterClass;

    #[test]
    fn test_mock_rules_defaults_to_builtin() {
        let mock = MockRules::new();
        let subclasses = mock.subclasses_of(&CharacterClass::Fighter.key()).unwrap();
        assert!(subclasses.iter().any(|s| s.key.is_named("Champion")));
        assert_eq!(mock.calls(RulesQuery::Subclasses), 1);
    }

    #[test]
    fn test_mock_rules_fail_and_restore() {
        let mock = MockRules::new();
        mock.fail(RulesQuery::Feats);
        assert!(mock.all_feats().is_err());

        mock.restore(RulesQuery::Feats);
        mock.return_empty(RulesQuery::Spells);
        assert!(!mock.all_feats().unwrap().is_empty());
        assert!(mock
            .spells_of(&CharacterClass::Wizard.key())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mock_rules_extra_content() {
        let fighter = CharacterClass::Fighter.key();
        let mock = MockRules::new()
            .with_feat(FeatDefinition::new("Homebrew", "HB"))
            .with_feature_choice(
                fighter.clone(),
                FeatureChoice::single("Signature Move", 2, vec![]),
            );

        assert!(mock.all_feats().unwrap().iter().any(|f| f.name == "Homebrew"));
        assert_eq!(mock.feature_choices_at(&fighter, 2, None).unwrap().len(), 1);
        assert!(mock.feature_choices_at(&fighter, 3, None).unwrap().is_empty());
    }
}
