//! D&D 5e character advancement engine.
//!
//! This crate provides:
//! - Level-up requirement calculation from threshold tables
//! - A stage-by-stage session that collects and validates player choices
//! - Feat prerequisite checking
//! - Assembly of a single character update and hand-off to a store
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd_advancement::{AdvancementConfig, AdvancementSession, MemoryStore, SrdRules};
//! use dnd_advancement::world::create_sample_fighter;
//!
//! let fighter = create_sample_fighter("Roland");
//! let mut store = MemoryStore::new();
//! store.insert(fighter.clone());
//!
//! let mut session =
//!     AdvancementSession::start_next(&fighter, &AdvancementConfig::new(), &SrdRules::new())?;
//! session.next()?; // Overview
//! session.next()?; // New Features
//! session.take_average_hp()?;
//! session.next()?;
//! let update = session.confirm(&mut store)?;
//! assert_eq!(update.level, 2);
//! ```

pub mod advancement;
pub mod assembler;
pub mod class_data;
pub mod content;
pub mod dice;
pub mod feats;
pub mod key;
pub mod persist;
pub mod prerequisites;
pub mod ruleset;
pub mod selection;
pub mod session;
pub mod spells;
pub mod testing;
pub mod world;

// Primary public API
pub use advancement::{compute, Advancement, AdvancementRequirement, DataWarning};
pub use assembler::{assemble, CharacterUpdate};
pub use class_data::SrdRules;
pub use content::{CachedRules, RulesError, RulesProvider, RulesQuery};
pub use key::ContentKey;
pub use persist::{CharacterStore, MemoryStore, PersistError, SavedCharacter};
pub use ruleset::Ruleset;
pub use selection::{AdvancementSelection, AsiChoice, HpMethod};
pub use session::{
    AdvanceError, AdvancementConfig, AdvancementSession, HpPolicy, Stage, ValidationError,
};
pub use testing::{MockRules, MockStore};
pub use world::{Ability, Character, CharacterClass};
