//! AdvancementSession - the stage-by-stage level-up flow.
//!
//! A session is started for one character and one target level. The stages
//! it walks through are fixed at start from the computed
//! [`AdvancementRequirement`]; each stage must be complete before the session
//! moves forward, moving back is always allowed, and nothing is written until
//! [`AdvancementSession::confirm`] hands a single [`CharacterUpdate`] to the
//! store.

use crate::advancement::{
    average_hp, compute, hp_from_roll, AdvancementRequirement, DataWarning,
};
use crate::assembler::{assemble, CharacterUpdate};
use crate::content::{
    FeatDefinition, FeatureChoice, RulesProvider, RulesQuery, SpellInfo, SubclassInfo,
};
use crate::key::{feature_choice_key, ContentKey};
use crate::persist::{CharacterStore, PersistError};
use crate::prerequisites::{self, PrerequisiteCheck};
use crate::ruleset::Ruleset;
use crate::selection::{AdvancementSelection, AsiChoice, HpGain, HpMethod, ASI_POINTS};
use crate::world::{Ability, Character, MAX_ABILITY_SCORE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Stages
// ============================================================================

/// Steps of a level-up, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Overview,
    Features,
    Subclass,
    FeatureChoices,
    HitPoints,
    AbilityScoreImprovement,
    Spells,
    Confirm,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Overview => "Overview",
            Stage::Features => "New Features",
            Stage::Subclass => "Subclass",
            Stage::FeatureChoices => "Feature Choices",
            Stage::HitPoints => "Hit Points",
            Stage::AbilityScoreImprovement => "Ability Score Improvement",
            Stage::Spells => "Spells",
            Stage::Confirm => "Confirm",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Stages a requirement calls for, in order.
pub fn stages_for(requirement: &AdvancementRequirement) -> Vec<Stage> {
    let spells = requirement.needs_spell_selection() || requirement.new_spell_level_unlocked;

    [
        (Stage::Overview, true),
        (Stage::Features, !requirement.new_features.is_empty()),
        (Stage::Subclass, requirement.needs_subclass),
        (Stage::FeatureChoices, !requirement.feature_choices.is_empty()),
        (Stage::HitPoints, true),
        (Stage::AbilityScoreImprovement, requirement.is_asi_level),
        (Stage::Spells, spells),
        (Stage::Confirm, true),
    ]
    .into_iter()
    .filter_map(|(stage, included)| included.then_some(stage))
    .collect()
}

// ============================================================================
// Errors
// ============================================================================

/// Why a stage is not complete, or why a choice was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The {0} stage is not part of this level-up")]
    StageNotIncluded(Stage),

    #[error("The {0} stage has its data and cannot be waived")]
    NotWaivable(Stage),

    #[error("This level-up has already been committed")]
    SessionClosed,

    #[error("Choose a subclass")]
    SubclassNotChosen,

    #[error("No subclass options are available")]
    SubclassUnavailable,

    #[error("{0} is not an offered subclass")]
    UnknownSubclass(ContentKey),

    #[error("Choose how to gain hit points")]
    HpNotSet,

    #[error("The {0} hit point method is not allowed")]
    HpMethodNotAllowed(HpMethod),

    #[error("Choose an ability score increase or a feat")]
    AsiNotChosen,

    #[error("Distribute exactly {} ability points ({spent} assigned)", ASI_POINTS)]
    AsiPointsIncomplete { spent: u8 },

    #[error("All {} ability points are already assigned", ASI_POINTS)]
    AsiBudgetExceeded,

    #[error("{ability} would rise to {score}, above {}", MAX_ABILITY_SCORE)]
    AbilityAboveMax { ability: Ability, score: u8 },

    #[error("Feats are disabled")]
    FeatsDisabled,

    #[error("{0} is not an offered feat")]
    UnknownFeat(ContentKey),

    #[error("{0} has already been taken")]
    FeatAlreadyKnown(String),

    #[error("{feat} prerequisites not met: {}", .reasons.join("; "))]
    FeatPrerequisites { feat: String, reasons: Vec<String> },

    #[error("No spell list is available")]
    SpellListUnavailable,

    #[error("Only {offered} {kind} offered, {required} required")]
    SpellListShort {
        kind: &'static str,
        offered: usize,
        required: u32,
    },

    #[error("Select exactly {required} new cantrips ({selected} selected)")]
    CantripCount { selected: usize, required: u32 },

    #[error("Select exactly {required} new spells ({selected} selected)")]
    SpellCount { selected: usize, required: u32 },

    #[error("{0} is not an offered choice")]
    SpellNotOffered(String),

    #[error("{0} is already selected")]
    DuplicateSelection(String),

    #[error("No feature choice {0} at this level")]
    UnknownFeatureChoice(String),

    #[error("{option} is not an option for {feature}")]
    OptionNotOffered { feature: String, option: String },

    #[error("{feature} allows at most {max} selections")]
    TooManyOptions { feature: String, max: usize },
}

/// Errors from starting, navigating, or committing a session.
#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error("Character has no class to advance")]
    NoClass,

    #[error("Cannot advance to level {target}: maximum level is 20")]
    LevelCap { target: u8 },

    #[error("Can only advance one level at a time (level {current} to {target})")]
    InvalidTarget { current: u8, target: u8 },

    #[error("Cannot continue: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to save advancement: {0}")]
    Persistence(#[from] PersistError),

    #[error("Already at the final stage")]
    NoNextStage,

    #[error("Cannot jump ahead to {0}")]
    CannotSkipAhead(Stage),

    #[error("Commit is only possible from the Confirm stage (currently at {0})")]
    NotAtConfirm(Stage),

    #[error("This level-up has already been committed")]
    AlreadyCommitted,
}

// ============================================================================
// Configuration
// ============================================================================

/// Which hit point methods a table allows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HpPolicy {
    #[default]
    Any,
    AverageOnly,
    RollOnly,
}

impl HpPolicy {
    pub fn allows(&self, method: HpMethod) -> bool {
        matches!(
            (self, method),
            (HpPolicy::Any, _)
                | (HpPolicy::AverageOnly, HpMethod::Average)
                | (HpPolicy::RollOnly, HpMethod::Roll)
        )
    }
}

/// Configuration for advancement sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancementConfig {
    /// Tables used by the calculator.
    pub ruleset: Ruleset,

    /// Whether a feat may be taken instead of an ability score increase.
    pub feats_enabled: bool,

    /// Allowed hit point methods.
    pub hp_policy: HpPolicy,
}

impl AdvancementConfig {
    /// Create a config with the built-in tables.
    pub fn new() -> Self {
        Self {
            ruleset: Ruleset::srd(),
            feats_enabled: true,
            hp_policy: HpPolicy::Any,
        }
    }

    /// Use a custom ruleset.
    pub fn with_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.ruleset = ruleset;
        self
    }

    /// Enable or disable the feats option.
    pub fn with_feats(mut self, enabled: bool) -> Self {
        self.feats_enabled = enabled;
        self
    }

    /// Restrict hit point methods.
    pub fn with_hp_policy(mut self, policy: HpPolicy) -> Self {
        self.hp_policy = policy;
        self
    }
}

impl Default for AdvancementConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Provider content the session offers as choices.
#[derive(Debug, Clone, Default)]
struct SessionContent {
    subclasses: Vec<SubclassInfo>,
    spells: Vec<SpellInfo>,
    feats: Vec<FeatDefinition>,
}

/// One level-up of one character.
pub struct AdvancementSession {
    snapshot: Character,
    requirement: AdvancementRequirement,
    stages: Vec<Stage>,
    current: usize,
    selection: AdvancementSelection,
    content: SessionContent,
    warnings: Vec<DataWarning>,
    waived: BTreeSet<Stage>,
    feats_enabled: bool,
    hp_policy: HpPolicy,
    pending: Option<CharacterUpdate>,
    committed: bool,
}

impl AdvancementSession {
    /// Start advancing `character` to `target_level`.
    pub fn start(
        character: &Character,
        target_level: u8,
        config: &AdvancementConfig,
        provider: &dyn RulesProvider,
    ) -> Result<Self, AdvanceError> {
        let advancement = compute(character, target_level, &config.ruleset, provider)?;
        let stages = stages_for(&advancement.requirement);

        let mut session = Self {
            snapshot: character.clone(),
            requirement: advancement.requirement,
            stages,
            current: 0,
            selection: AdvancementSelection::new(),
            content: SessionContent::default(),
            warnings: advancement.warnings,
            waived: BTreeSet::new(),
            feats_enabled: config.feats_enabled,
            hp_policy: config.hp_policy,
            pending: None,
            committed: false,
        };
        session.load_content(provider);

        info!(
            character = %character.name,
            class = %session.requirement.class,
            target = target_level,
            stages = ?session.stages,
            warnings = session.warnings.len(),
            "Started advancement session"
        );
        Ok(session)
    }

    /// Start advancing `character` by one level of its primary class.
    pub fn start_next(
        character: &Character,
        config: &AdvancementConfig,
        provider: &dyn RulesProvider,
    ) -> Result<Self, AdvanceError> {
        let target = character.primary_class_level().saturating_add(1);
        Self::start(character, target, config, provider)
    }

    fn load_content(&mut self, provider: &dyn RulesProvider) {
        let class = self.requirement.class.clone();

        if self.requirement.needs_subclass && self.content.subclasses.is_empty() {
            match provider.subclasses_of(&class) {
                Ok(list) if !list.is_empty() => self.content.subclasses = list,
                Ok(_) => self.warn(DataWarning::new(
                    RulesQuery::Subclasses,
                    format!("No subclasses available for {}", class.name),
                )),
                Err(err) => self.warn(err.into()),
            }
        }

        if self.spells_starved() {
            match provider.spells_of(&class) {
                Ok(list) if !list.is_empty() => {
                    self.content.spells = list;
                    if let Some(short) = self.spell_shortfall() {
                        self.warn(DataWarning::new(
                            RulesQuery::Spells,
                            format!("{} for {}", short, class.name),
                        ));
                    }
                }
                Ok(_) => self.warn(DataWarning::new(
                    RulesQuery::Spells,
                    format!("No spell list available for {}", class.name),
                )),
                Err(err) => self.warn(err.into()),
            }
        }

        if self.requirement.is_asi_level && self.feats_enabled && self.content.feats.is_empty() {
            match provider.all_feats() {
                Ok(list) if !list.is_empty() => self.content.feats = list,
                Ok(_) => self.warn(DataWarning::new(RulesQuery::Feats, "No feats available")),
                Err(err) => self.warn(err.into()),
            }
        }
    }

    /// The class list cannot cover the picks this level requires.
    fn spell_shortfall(&self) -> Option<ValidationError> {
        let req = &self.requirement;
        let cantrips = self.available_cantrips().len();
        if cantrips < req.new_cantrips as usize {
            return Some(ValidationError::SpellListShort {
                kind: "cantrips",
                offered: cantrips,
                required: req.new_cantrips,
            });
        }
        let spells = self.available_spells().len();
        if spells < req.new_spells as usize {
            return Some(ValidationError::SpellListShort {
                kind: "spells",
                offered: spells,
                required: req.new_spells,
            });
        }
        None
    }

    fn spells_starved(&self) -> bool {
        self.requirement.needs_spell_selection() && self.spell_shortfall().is_some()
    }

    fn warn(&mut self, warning: DataWarning) {
        warn!(query = %warning.query, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Ask the provider again for any content that failed to load.
    ///
    /// The stage list is not recomputed. Returns the warnings still open.
    pub fn retry_content(&mut self, provider: &dyn RulesProvider) -> &[DataWarning] {
        if self.committed {
            return &self.warnings;
        }
        let features_missing = self
            .warnings
            .iter()
            .any(|w| w.query == RulesQuery::ClassFeatures);
        self.warnings
            .retain(|w| w.query == RulesQuery::FeatureChoices);

        if features_missing {
            match provider.class_features_at(&self.requirement.class, self.requirement.target_level)
            {
                Ok(features) => self.requirement.new_features = features,
                Err(err) => self.warn(err.into()),
            }
        }
        self.load_content(provider);

        debug!(remaining = self.warnings.len(), "Retried rules content");
        &self.warnings
    }

    /// Let the session proceed past a stage whose data never arrived.
    pub fn waive_stage(&mut self, stage: Stage) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.ensure_included(stage)?;

        let starved = match stage {
            Stage::Subclass => self.content.subclasses.is_empty(),
            Stage::Spells => self.spells_starved(),
            _ => false,
        };
        if !starved {
            return Err(ValidationError::NotWaivable(stage));
        }

        warn!(stage = %stage, "Waived stage without rules data");
        self.waived.insert(stage);
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn snapshot(&self) -> &Character {
        &self.snapshot
    }

    pub fn requirement(&self) -> &AdvancementRequirement {
        &self.requirement
    }

    pub fn selection(&self) -> &AdvancementSelection {
        &self.selection
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn current_stage(&self) -> Stage {
        self.stages[self.current]
    }

    pub fn stage_index(&self) -> usize {
        self.current
    }

    /// Provider problems met so far.
    pub fn warnings(&self) -> &[DataWarning] {
        &self.warnings
    }

    pub fn is_waived(&self, stage: Stage) -> bool {
        self.waived.contains(&stage)
    }

    /// Payload of the last commit attempt.
    pub fn pending_update(&self) -> Option<&CharacterUpdate> {
        self.pending.as_ref()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn subclass_options(&self) -> &[SubclassInfo] {
        &self.content.subclasses
    }

    pub fn feature_choices(&self) -> &[FeatureChoice] {
        &self.requirement.feature_choices
    }

    /// Cantrips on the class list the character does not know yet.
    pub fn available_cantrips(&self) -> Vec<&SpellInfo> {
        self.content
            .spells
            .iter()
            .filter(|s| s.is_cantrip() && !self.snapshot.spells.knows(&s.name))
            .collect()
    }

    /// Leveled spells up to the new maximum spell level the character does
    /// not know yet.
    pub fn available_spells(&self) -> Vec<&SpellInfo> {
        let max = self.requirement.max_spell_level;
        self.content
            .spells
            .iter()
            .filter(|s| (1..=max).contains(&s.level) && !self.snapshot.spells.knows(&s.name))
            .collect()
    }

    /// Offered feats with their prerequisite status.
    pub fn feat_options(&self) -> Vec<(&FeatDefinition, PrerequisiteCheck)> {
        self.content
            .feats
            .iter()
            .filter(|feat| feat.is_selectable())
            .map(|feat| (feat, prerequisites::check(feat, &self.snapshot)))
            .collect()
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Whether the current stage is complete.
    pub fn can_proceed(&self) -> Result<(), ValidationError> {
        self.validate_stage(self.current_stage())
    }

    /// Move to the next stage if the current one is complete.
    pub fn next(&mut self) -> Result<Stage, AdvanceError> {
        if self.committed {
            return Err(AdvanceError::AlreadyCommitted);
        }
        self.can_proceed()?;
        if self.current + 1 >= self.stages.len() {
            return Err(AdvanceError::NoNextStage);
        }
        self.current += 1;
        debug!(stage = %self.current_stage(), "Advanced to stage");
        Ok(self.current_stage())
    }

    /// Move one stage back. Selections are kept.
    pub fn back(&mut self) -> Stage {
        if self.current > 0 && !self.committed {
            self.current -= 1;
            debug!(stage = %self.current_stage(), "Returned to stage");
        }
        self.current_stage()
    }

    /// Return to an earlier stage. Selections are kept.
    pub fn back_to(&mut self, stage: Stage) -> Result<(), AdvanceError> {
        if self.committed {
            return Err(AdvanceError::AlreadyCommitted);
        }
        let index = self
            .stages
            .iter()
            .position(|s| *s == stage)
            .ok_or(ValidationError::StageNotIncluded(stage))?;
        if index > self.current {
            return Err(AdvanceError::CannotSkipAhead(stage));
        }
        self.current = index;
        debug!(stage = %stage, "Returned to stage");
        Ok(())
    }

    /// Check the completion predicate of `stage`.
    pub fn validate_stage(&self, stage: Stage) -> Result<(), ValidationError> {
        if self.waived.contains(&stage) {
            return Ok(());
        }

        match stage {
            Stage::Subclass => match &self.selection.subclass {
                Some(_) => Ok(()),
                None if self.content.subclasses.is_empty() => {
                    Err(ValidationError::SubclassUnavailable)
                }
                None => Err(ValidationError::SubclassNotChosen),
            },
            Stage::HitPoints => match self.selection.hp_gain {
                Some(gain) if gain.value >= 1 => Ok(()),
                _ => Err(ValidationError::HpNotSet),
            },
            Stage::AbilityScoreImprovement => self.validate_asi(),
            Stage::Spells => self.validate_spells(),
            Stage::Overview | Stage::Features | Stage::FeatureChoices | Stage::Confirm => Ok(()),
        }
    }

    fn validate_asi(&self) -> Result<(), ValidationError> {
        match &self.selection.asi {
            None => Err(ValidationError::AsiNotChosen),
            Some(AsiChoice::Abilities(boosts)) => {
                let spent: u8 = boosts.values().sum();
                if spent != ASI_POINTS {
                    return Err(ValidationError::AsiPointsIncomplete { spent });
                }
                for (&ability, &boost) in boosts {
                    let score = self.snapshot.ability_scores.get(ability).saturating_add(boost);
                    if score > MAX_ABILITY_SCORE {
                        return Err(ValidationError::AbilityAboveMax { ability, score });
                    }
                }
                Ok(())
            }
            Some(AsiChoice::Feat(feat)) => {
                if !self.feats_enabled {
                    return Err(ValidationError::FeatsDisabled);
                }
                if !feat.repeatable && self.snapshot.has_feat(&feat.key()) {
                    return Err(ValidationError::FeatAlreadyKnown(feat.name.clone()));
                }
                let check = prerequisites::check(feat, &self.snapshot);
                if !check.valid {
                    return Err(ValidationError::FeatPrerequisites {
                        feat: feat.name.clone(),
                        reasons: check.reasons,
                    });
                }
                Ok(())
            }
        }
    }

    fn validate_spells(&self) -> Result<(), ValidationError> {
        let req = &self.requirement;
        if req.needs_spell_selection() {
            if self.content.spells.is_empty() {
                return Err(ValidationError::SpellListUnavailable);
            }
            if let Some(short) = self.spell_shortfall() {
                return Err(short);
            }
        }
        if self.selection.cantrips.len() != req.new_cantrips as usize {
            return Err(ValidationError::CantripCount {
                selected: self.selection.cantrips.len(),
                required: req.new_cantrips,
            });
        }
        if self.selection.spells.len() != req.new_spells as usize {
            return Err(ValidationError::SpellCount {
                selected: self.selection.spells.len(),
                required: req.new_spells,
            });
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.committed {
            return Err(ValidationError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_included(&self, stage: Stage) -> Result<(), ValidationError> {
        if !self.stages.contains(&stage) {
            return Err(ValidationError::StageNotIncluded(stage));
        }
        Ok(())
    }

    // ========================================================================
    // Subclass
    // ========================================================================

    pub fn choose_subclass(&mut self, subclass: &ContentKey) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.ensure_included(Stage::Subclass)?;
        if self.content.subclasses.is_empty() {
            return Err(ValidationError::SubclassUnavailable);
        }
        let chosen = self
            .content
            .subclasses
            .iter()
            .find(|s| s.key.matches(subclass))
            .ok_or_else(|| ValidationError::UnknownSubclass(subclass.clone()))?;

        self.selection.subclass = Some(chosen.key.clone());
        debug!(subclass = %chosen.key, "Chose subclass");
        Ok(())
    }

    // ========================================================================
    // Hit Points
    // ========================================================================

    fn set_hp(&mut self, method: HpMethod, value: u32) -> Result<u32, ValidationError> {
        self.ensure_open()?;
        if !self.hp_policy.allows(method) {
            return Err(ValidationError::HpMethodNotAllowed(method));
        }
        self.selection.hp_gain = Some(HpGain { method, value });
        debug!(method = %method, value, "Set hit point gain");
        Ok(value)
    }

    /// Roll the hit die with a specific RNG (useful for testing).
    pub fn roll_hp_with_rng<R: Rng>(&mut self, rng: &mut R) -> Result<u32, ValidationError> {
        if !self.hp_policy.allows(HpMethod::Roll) {
            return Err(ValidationError::HpMethodNotAllowed(HpMethod::Roll));
        }
        let roll = self.requirement.hit_die.roll_with_rng(rng);
        let value = hp_from_roll(roll, self.requirement.con_modifier);
        self.set_hp(HpMethod::Roll, value)
    }

    /// Roll the hit die.
    pub fn roll_hp(&mut self) -> Result<u32, ValidationError> {
        self.roll_hp_with_rng(&mut rand::thread_rng())
    }

    /// Take the fixed hit point value.
    pub fn take_average_hp(&mut self) -> Result<u32, ValidationError> {
        let value = average_hp(self.requirement.hit_die, self.requirement.con_modifier);
        self.set_hp(HpMethod::Average, value)
    }

    // ========================================================================
    // Ability Score Improvement
    // ========================================================================

    /// Put one ability point into `ability`. Returns the points now assigned.
    pub fn boost_ability(&mut self, ability: Ability) -> Result<u8, ValidationError> {
        self.ensure_open()?;
        self.ensure_included(Stage::AbilityScoreImprovement)?;

        let mut boosts = self.selection.ability_boosts();
        let spent: u8 = boosts.values().sum();
        if spent >= ASI_POINTS {
            return Err(ValidationError::AsiBudgetExceeded);
        }
        let boost = boosts.get(&ability).copied().unwrap_or(0) + 1;
        let score = self.snapshot.ability_scores.get(ability).saturating_add(boost);
        if score > MAX_ABILITY_SCORE {
            return Err(ValidationError::AbilityAboveMax { ability, score });
        }

        boosts.insert(ability, boost);
        self.selection.asi = Some(AsiChoice::Abilities(boosts));
        Ok(spent + 1)
    }

    /// Take one point back from `ability`. Returns the points now assigned.
    pub fn reduce_ability(&mut self, ability: Ability) -> Result<u8, ValidationError> {
        self.ensure_open()?;
        let mut boosts = self.selection.ability_boosts();
        if let Some(boost) = boosts.get_mut(&ability) {
            *boost -= 1;
            if *boost == 0 {
                boosts.remove(&ability);
            }
            self.selection.asi = Some(AsiChoice::Abilities(boosts.clone()));
        }
        Ok(boosts.values().sum())
    }

    /// Take a feat instead of ability points.
    ///
    /// The returned check tells the caller whether the feat's prerequisites
    /// hold; the stage will not complete until they do.
    pub fn choose_feat(&mut self, feat: &ContentKey) -> Result<PrerequisiteCheck, ValidationError> {
        self.ensure_open()?;
        self.ensure_included(Stage::AbilityScoreImprovement)?;
        if !self.feats_enabled {
            return Err(ValidationError::FeatsDisabled);
        }
        let chosen = self
            .content
            .feats
            .iter()
            .find(|f| f.is_selectable() && f.key().matches(feat))
            .cloned()
            .ok_or_else(|| ValidationError::UnknownFeat(feat.clone()))?;

        let check = prerequisites::check(&chosen, &self.snapshot);
        debug!(feat = %chosen.name, valid = check.valid, "Chose feat");
        self.selection.asi = Some(AsiChoice::Feat(chosen));
        Ok(check)
    }

    pub fn clear_asi(&mut self) {
        if !self.committed {
            self.selection.asi = None;
        }
    }

    // ========================================================================
    // Spells
    // ========================================================================

    pub fn select_cantrip(&mut self, name: &str) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.ensure_included(Stage::Spells)?;
        let offered = self
            .available_cantrips()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.name.clone())
            .ok_or_else(|| ValidationError::SpellNotOffered(name.to_string()))?;
        push_unique(&mut self.selection.cantrips, offered)
    }

    pub fn deselect_cantrip(&mut self, name: &str) -> bool {
        !self.committed && remove_named(&mut self.selection.cantrips, name)
    }

    pub fn select_spell(&mut self, name: &str) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.ensure_included(Stage::Spells)?;
        let offered = self
            .available_spells()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.name.clone())
            .ok_or_else(|| ValidationError::SpellNotOffered(name.to_string()))?;
        push_unique(&mut self.selection.spells, offered)
    }

    pub fn deselect_spell(&mut self, name: &str) -> bool {
        !self.committed && remove_named(&mut self.selection.spells, name)
    }

    // ========================================================================
    // Feature Choices
    // ========================================================================

    /// Select `option` for the feature choice stored under `choice_key`
    /// (see [`feature_choice_key`]). A single choice is replaced; a multiple
    /// choice accumulates up to its count.
    pub fn choose_feature_option(
        &mut self,
        choice_key: &str,
        option: &str,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.ensure_included(Stage::FeatureChoices)?;

        let choice = self
            .requirement
            .feature_choices
            .iter()
            .find(|c| feature_choice_key(&c.feature_name, c.level) == choice_key)
            .ok_or_else(|| ValidationError::UnknownFeatureChoice(choice_key.to_string()))?;
        if choice.option(option).is_none() {
            return Err(ValidationError::OptionNotOffered {
                feature: choice.feature_name.clone(),
                option: option.to_string(),
            });
        }

        let max = choice.max_selections();
        let feature = choice.feature_name.clone();
        let selected = self
            .selection
            .feature_choices
            .entry(choice_key.to_string())
            .or_default();

        if max == 1 {
            *selected = vec![option.to_string()];
        } else if selected.iter().any(|o| o == option) {
            return Err(ValidationError::DuplicateSelection(option.to_string()));
        } else if selected.len() >= max {
            return Err(ValidationError::TooManyOptions { feature, max });
        } else {
            selected.push(option.to_string());
        }

        debug!(choice = choice_key, option, "Chose feature option");
        Ok(())
    }

    pub fn clear_feature_choice(&mut self, choice_key: &str) {
        if !self.committed {
            self.selection.feature_choices.remove(choice_key);
        }
    }

    /// Feature choices still missing selections.
    pub fn open_feature_choices(&self) -> BTreeMap<String, usize> {
        self.requirement
            .feature_choices
            .iter()
            .filter_map(|c| {
                let key = feature_choice_key(&c.feature_name, c.level);
                let made = self
                    .selection
                    .feature_choices
                    .get(&key)
                    .map(Vec::len)
                    .unwrap_or(0);
                let missing = c.max_selections().saturating_sub(made);
                (missing > 0).then_some((key, missing))
            })
            .collect()
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Assemble the update and hand it to `store`.
    ///
    /// On failure the session stays on the Confirm stage with every
    /// selection intact, and can be confirmed again.
    pub fn confirm(&mut self, store: &mut dyn CharacterStore) -> Result<CharacterUpdate, AdvanceError> {
        if self.committed {
            return Err(AdvanceError::AlreadyCommitted);
        }
        let stage = self.current_stage();
        if stage != Stage::Confirm {
            return Err(AdvanceError::NotAtConfirm(stage));
        }
        for stage in &self.stages {
            self.validate_stage(*stage)?;
        }

        let update = assemble(&self.snapshot, &self.requirement, &self.selection);
        self.pending = Some(update.clone());

        match store.apply_update(self.snapshot.id, &update) {
            Ok(()) => {
                self.committed = true;
                info!(
                    character = %self.snapshot.name,
                    level = update.level,
                    hp_gain = update.hp_gain,
                    "Committed advancement"
                );
                Ok(update)
            }
            Err(err) => {
                warn!(character = %self.snapshot.name, error = %err, "Advancement commit rejected");
                Err(AdvanceError::Persistence(err))
            }
        }
    }

    /// Abandon the session. Nothing is written.
    pub fn cancel(self) {
        info!(
            character = %self.snapshot.name,
            stage = %self.current_stage(),
            committed = self.committed,
            "Cancelled advancement session"
        );
    }
}

fn push_unique(list: &mut Vec<String>, name: String) -> Result<(), ValidationError> {
    if list.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
        return Err(ValidationError::DuplicateSelection(name));
    }
    list.push(name);
    Ok(())
}

fn remove_named(list: &mut Vec<String>, name: &str) -> bool {
    let before = list.len();
    list.retain(|n| !n.eq_ignore_ascii_case(name));
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_data::SrdRules;
    use crate::persist::MemoryStore;
    use crate::ruleset::ThresholdTable;
    use crate::testing::{MockRules, MockStore};
    use crate::world::{
        create_sample_fighter, create_sample_sorcerer, create_sample_wizard, CharacterClass,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at_level(mut character: Character, level: u8) -> Character {
        character.level = level;
        character.classes[0].level = level;
        character
    }

    fn start(character: &Character) -> AdvancementSession {
        AdvancementSession::start_next(character, &AdvancementConfig::new(), &SrdRules::new())
            .unwrap()
    }

    fn advance_to(session: &mut AdvancementSession, stage: Stage) {
        while session.current_stage() != stage {
            session.next().unwrap();
        }
    }

    #[test]
    fn test_stages_for_fighter_level_two() {
        let session = start(&create_sample_fighter("Roland"));
        assert_eq!(
            session.stages(),
            &[Stage::Overview, Stage::Features, Stage::HitPoints, Stage::Confirm]
        );
    }

    #[test]
    fn test_stages_in_canonical_order() {
        let mut sorcerer = at_level(create_sample_sorcerer("Sorcha"), 2);
        sorcerer.classes[0].subclass = Some(ContentKey::phb("Draconic"));
        let session = start(&sorcerer);
        assert_eq!(
            session.stages(),
            &[
                Stage::Overview,
                Stage::Features,
                Stage::FeatureChoices,
                Stage::HitPoints,
                Stage::Spells,
                Stage::Confirm
            ]
        );
    }

    #[test]
    fn test_hp_required_before_confirm() {
        let mut session = start(&create_sample_fighter("Roland"));
        advance_to(&mut session, Stage::HitPoints);

        assert!(matches!(
            session.next(),
            Err(AdvanceError::Validation(ValidationError::HpNotSet))
        ));
        assert_eq!(session.take_average_hp().unwrap(), 8);
        assert_eq!(session.next().unwrap(), Stage::Confirm);
        assert!(matches!(session.next(), Err(AdvanceError::NoNextStage)));
    }

    #[test]
    fn test_roll_hp_within_bounds() {
        let mut session = start(&create_sample_fighter("Roland"));
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let value = session.roll_hp_with_rng(&mut rng).unwrap();
            assert!((3..=12).contains(&value));
        }
        assert_eq!(
            session.selection().hp_gain.map(|g| g.method),
            Some(HpMethod::Roll)
        );
    }

    #[test]
    fn test_hp_policy() {
        let config = AdvancementConfig::new().with_hp_policy(HpPolicy::AverageOnly);
        let mut session = AdvancementSession::start_next(
            &create_sample_fighter("Roland"),
            &config,
            &SrdRules::new(),
        )
        .unwrap();

        assert_eq!(
            session.roll_hp(),
            Err(ValidationError::HpMethodNotAllowed(HpMethod::Roll))
        );
        assert!(session.take_average_hp().is_ok());
    }

    #[test]
    fn test_back_keeps_selections() {
        let mut session = start(&create_sample_fighter("Roland"));
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.next().unwrap();

        assert_eq!(session.back(), Stage::HitPoints);
        session.back_to(Stage::Overview).unwrap();
        assert_eq!(session.back(), Stage::Overview);
        assert!(session.selection().hp_gain.is_some());

        assert!(matches!(
            session.back_to(Stage::Confirm),
            Err(AdvanceError::CannotSkipAhead(Stage::Confirm))
        ));
        assert!(matches!(
            session.back_to(Stage::Spells),
            Err(AdvanceError::Validation(ValidationError::StageNotIncluded(
                Stage::Spells
            )))
        ));
    }

    #[test]
    fn test_subclass_stage() {
        let fighter = at_level(create_sample_fighter("Roland"), 2);
        let mut session = start(&fighter);
        advance_to(&mut session, Stage::Subclass);

        assert!(matches!(
            session.next(),
            Err(AdvanceError::Validation(ValidationError::SubclassNotChosen))
        ));
        assert!(matches!(
            session.choose_subclass(&ContentKey::phb("Evocation")),
            Err(ValidationError::UnknownSubclass(_))
        ));
        session.choose_subclass(&ContentKey::phb("Champion")).unwrap();
        assert!(session.next().is_ok());
    }

    #[test]
    fn test_asi_points_exact() {
        let fighter = at_level(create_sample_fighter("Roland"), 3);
        let mut session = start(&fighter);
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.next().unwrap();
        assert_eq!(session.current_stage(), Stage::AbilityScoreImprovement);

        assert_eq!(session.can_proceed(), Err(ValidationError::AsiNotChosen));
        session.boost_ability(Ability::Strength).unwrap();
        assert_eq!(
            session.can_proceed(),
            Err(ValidationError::AsiPointsIncomplete { spent: 1 })
        );
        assert_eq!(session.boost_ability(Ability::Constitution).unwrap(), 2);
        assert_eq!(
            session.boost_ability(Ability::Dexterity),
            Err(ValidationError::AsiBudgetExceeded)
        );
        assert!(session.can_proceed().is_ok());

        assert_eq!(session.reduce_ability(Ability::Constitution).unwrap(), 1);
        assert!(session.can_proceed().is_err());
    }

    #[test]
    fn test_asi_respects_cap() {
        let mut fighter = at_level(create_sample_fighter("Roland"), 3);
        fighter.ability_scores.strength = 19;
        let mut session = start(&fighter);

        session.boost_ability(Ability::Strength).unwrap();
        assert_eq!(
            session.boost_ability(Ability::Strength),
            Err(ValidationError::AbilityAboveMax {
                ability: Ability::Strength,
                score: 21
            })
        );
    }

    #[test]
    fn test_feat_prerequisites_block() {
        let fighter = at_level(create_sample_fighter("Roland"), 3);
        let mut session = start(&fighter);
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.next().unwrap();

        // CHA 8 does not meet Inspiring Leader
        let check = session
            .choose_feat(&ContentKey::phb("Inspiring Leader"))
            .unwrap();
        assert!(!check.valid);
        assert!(matches!(
            session.can_proceed(),
            Err(ValidationError::FeatPrerequisites { .. })
        ));

        let check = session.choose_feat(&ContentKey::phb("Grappler")).unwrap();
        assert!(check.valid);
        assert!(session.can_proceed().is_ok());
    }

    #[test]
    fn test_feat_already_known() {
        let mut fighter = at_level(create_sample_fighter("Roland"), 3);
        fighter.feats.insert(ContentKey::phb("Alert"));
        let mut session = start(&fighter);

        session.choose_feat(&ContentKey::phb("Alert")).unwrap();
        assert_eq!(
            session.validate_stage(Stage::AbilityScoreImprovement),
            Err(ValidationError::FeatAlreadyKnown("Alert".to_string()))
        );
    }

    #[test]
    fn test_feats_disabled() {
        let fighter = at_level(create_sample_fighter("Roland"), 3);
        let config = AdvancementConfig::new().with_feats(false);
        let mut session =
            AdvancementSession::start_next(&fighter, &config, &SrdRules::new()).unwrap();

        assert_eq!(
            session.choose_feat(&ContentKey::phb("Alert")),
            Err(ValidationError::FeatsDisabled)
        );
        assert!(session.feat_options().is_empty());
        assert!(session.boost_ability(Ability::Dexterity).is_ok());
    }

    #[test]
    fn test_spell_selection_exact() {
        let mut session = start(&create_sample_sorcerer("Sorcha"));
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.next().unwrap();
        assert_eq!(session.current_stage(), Stage::Spells);

        assert_eq!(
            session.can_proceed(),
            Err(ValidationError::SpellCount {
                selected: 0,
                required: 1
            })
        );
        assert_eq!(
            session.select_spell("Shield"),
            Err(ValidationError::SpellNotOffered("Shield".to_string()))
        );
        assert_eq!(
            session.select_spell("Fireball"),
            Err(ValidationError::SpellNotOffered("Fireball".to_string()))
        );
        session.select_spell("burning hands").unwrap();
        assert_eq!(
            session.select_spell("Burning Hands"),
            Err(ValidationError::DuplicateSelection("Burning Hands".to_string()))
        );
        assert!(session.can_proceed().is_ok());

        session.select_spell("Sleep").unwrap();
        assert_eq!(
            session.can_proceed(),
            Err(ValidationError::SpellCount {
                selected: 2,
                required: 1
            })
        );
        assert!(session.deselect_spell("sleep"));
        assert!(session.can_proceed().is_ok());
    }

    #[test]
    fn test_feature_choice_single_and_multiple() {
        let mut rogue = create_sample_fighter("Vex");
        rogue.classes[0].class = CharacterClass::Rogue.key();
        let rogue = at_level(rogue, 5);
        let mut session = start(&rogue);
        assert!(session.stages().contains(&Stage::FeatureChoices));

        let key = feature_choice_key("Expertise", 6);
        session.choose_feature_option(&key, "stealth").unwrap();
        session.choose_feature_option(&key, "perception").unwrap();
        assert_eq!(
            session.choose_feature_option(&key, "arcana"),
            Err(ValidationError::TooManyOptions {
                feature: "Expertise".to_string(),
                max: 2
            })
        );
        assert!(matches!(
            session.choose_feature_option(&key, "juggling"),
            Err(ValidationError::OptionNotOffered { .. })
        ));
        assert!(session.open_feature_choices().is_empty());

        let fighter = create_sample_fighter("Roland");
        let mut session = AdvancementSession::start(
            &at_level(fighter, 0),
            1,
            &AdvancementConfig::new(),
            &SrdRules::new(),
        )
        .unwrap();
        let key = feature_choice_key("Fighting Style", 1);
        session.choose_feature_option(&key, "archery").unwrap();
        session.choose_feature_option(&key, "defense").unwrap();
        assert_eq!(session.selection().feature_choices[&key], vec!["defense"]);
    }

    #[test]
    fn test_subclass_data_unavailable_blocks_until_retry() {
        let mock = MockRules::new();
        mock.fail(RulesQuery::Subclasses);
        let fighter = at_level(create_sample_fighter("Roland"), 2);
        let mut session =
            AdvancementSession::start_next(&fighter, &AdvancementConfig::new(), &mock).unwrap();

        assert!(session.stages().contains(&Stage::Subclass));
        assert_eq!(session.warnings().len(), 1);
        assert_eq!(session.warnings()[0].query, RulesQuery::Subclasses);
        assert_eq!(
            session.validate_stage(Stage::Subclass),
            Err(ValidationError::SubclassUnavailable)
        );

        mock.restore(RulesQuery::Subclasses);
        assert!(session.retry_content(&mock).is_empty());
        assert_eq!(
            session.validate_stage(Stage::Subclass),
            Err(ValidationError::SubclassNotChosen)
        );
        session.choose_subclass(&ContentKey::phb("Champion")).unwrap();
        assert!(session.validate_stage(Stage::Subclass).is_ok());
    }

    #[test]
    fn test_waive_starved_stage() {
        let mock = MockRules::new();
        mock.return_empty(RulesQuery::Subclasses);
        let fighter = at_level(create_sample_fighter("Roland"), 2);
        let mut session =
            AdvancementSession::start_next(&fighter, &AdvancementConfig::new(), &mock).unwrap();

        assert_eq!(
            session.waive_stage(Stage::HitPoints),
            Err(ValidationError::NotWaivable(Stage::HitPoints))
        );
        session.waive_stage(Stage::Subclass).unwrap();
        assert!(session.is_waived(Stage::Subclass));
        assert!(session.validate_stage(Stage::Subclass).is_ok());
    }

    #[test]
    fn test_short_spell_list_is_waivable() {
        let mut ruleset = Ruleset::srd();
        ruleset.spells_known.insert(
            "sorcerer".to_string(),
            ThresholdTable::from_pairs(&[(1, 2), (2, 60)]),
        );
        let config = AdvancementConfig::new().with_ruleset(ruleset);
        let sorcerer = create_sample_sorcerer("Sorcha");
        let mut session =
            AdvancementSession::start_next(&sorcerer, &config, &SrdRules::new()).unwrap();

        let offered = session.available_spells().len();
        assert!(offered > 0 && offered < 58);
        assert_eq!(session.warnings().len(), 1);
        assert_eq!(session.warnings()[0].query, RulesQuery::Spells);

        let names: Vec<String> = session
            .available_spells()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        for name in &names {
            session.select_spell(name).unwrap();
        }
        assert_eq!(
            session.validate_stage(Stage::Spells),
            Err(ValidationError::SpellListShort {
                kind: "spells",
                offered,
                required: 58
            })
        );

        session.waive_stage(Stage::Spells).unwrap();
        assert!(session.validate_stage(Stage::Spells).is_ok());
        assert_eq!(session.selection().spells.len(), offered);
    }

    #[test]
    fn test_stand_in_feat_not_offered() {
        let fighter = at_level(create_sample_fighter("Roland"), 3);
        let mut session = start(&fighter);

        assert!(!session.feat_options().is_empty());
        assert!(session
            .feat_options()
            .iter()
            .all(|(feat, _)| feat.name != crate::feats::ABILITY_SCORE_IMPROVEMENT));
        assert_eq!(
            session.choose_feat(&ContentKey::phb("Ability Score Improvement")),
            Err(ValidationError::UnknownFeat(ContentKey::phb(
                "Ability Score Improvement"
            )))
        );
        assert!(session.selection().asi.is_none());
    }

    #[test]
    fn test_retry_after_commit_changes_nothing() {
        let mock = MockRules::new();
        mock.fail(RulesQuery::ClassFeatures);
        let fighter = create_sample_fighter("Roland");
        let mut store = MockStore::new().with_character(fighter.clone());
        let mut session =
            AdvancementSession::start_next(&fighter, &AdvancementConfig::new(), &mock).unwrap();
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.next().unwrap();
        let update = session.confirm(&mut store).unwrap();

        mock.restore(RulesQuery::ClassFeatures);
        assert_eq!(session.retry_content(&mock).len(), 1);
        assert!(session.requirement().new_features.is_empty());
        assert_eq!(session.pending_update(), Some(&update));
        assert_eq!(mock.calls(RulesQuery::ClassFeatures), 1);
    }

    #[test]
    fn test_feats_failure_leaves_ability_mode() {
        let mock = MockRules::new();
        mock.fail(RulesQuery::Feats);
        let fighter = at_level(create_sample_fighter("Roland"), 3);
        let mut session =
            AdvancementSession::start_next(&fighter, &AdvancementConfig::new(), &mock).unwrap();

        assert_eq!(session.warnings()[0].query, RulesQuery::Feats);
        assert!(matches!(
            session.choose_feat(&ContentKey::phb("Alert")),
            Err(ValidationError::UnknownFeat(_))
        ));
        session.boost_ability(Ability::Strength).unwrap();
        session.boost_ability(Ability::Strength).unwrap();
        assert!(session
            .validate_stage(Stage::AbilityScoreImprovement)
            .is_ok());
    }

    #[test]
    fn test_confirm_and_retry_after_rejection() {
        let fighter = create_sample_fighter("Roland");
        let mut store = MockStore::new()
            .with_character(fighter.clone())
            .rejecting(1);
        let mut session = start(&fighter);
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.next().unwrap();

        assert!(matches!(
            session.confirm(&mut store),
            Err(AdvanceError::Persistence(PersistError::Rejected(_)))
        ));
        assert_eq!(session.current_stage(), Stage::Confirm);
        assert!(!session.is_committed());
        let pending = session.pending_update().cloned().unwrap();

        let update = session.confirm(&mut store).unwrap();
        assert_eq!(update, pending);
        assert_eq!(store.attempts(), 2);
        assert_eq!(store.get(fighter.id).unwrap().level, 2);

        assert!(matches!(
            session.confirm(&mut store),
            Err(AdvanceError::AlreadyCommitted)
        ));
    }

    #[test]
    fn test_confirm_only_from_confirm_stage() {
        let fighter = create_sample_fighter("Roland");
        let mut store = MemoryStore::new();
        store.insert(fighter.clone());
        let mut session = start(&fighter);

        assert!(matches!(
            session.confirm(&mut store),
            Err(AdvanceError::NotAtConfirm(Stage::Overview))
        ));
    }

    #[test]
    fn test_cancel_writes_nothing() {
        let fighter = create_sample_fighter("Roland");
        let store = MockStore::new().with_character(fighter.clone());
        let mut session = start(&fighter);
        advance_to(&mut session, Stage::HitPoints);
        session.take_average_hp().unwrap();
        session.cancel();

        assert_eq!(store.attempts(), 0);
        assert_eq!(store.get(fighter.id).unwrap().level, 1);
    }

    #[test]
    fn test_wizard_cantrip_stage() {
        let wizard = at_level(create_sample_wizard("Merlin"), 3);
        let session = start(&wizard);
        assert!(session.stages().contains(&Stage::Spells));
        assert_eq!(session.requirement().new_cantrips, 1);
        assert!(session
            .available_cantrips()
            .iter()
            .all(|s| s.name != "Fire Bolt"));
    }
}
