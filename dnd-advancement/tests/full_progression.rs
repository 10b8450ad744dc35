//! Chains level-ups from 1 to 20 for every class against the built-in
//! rules content, reloading the character from the store after each commit.
//! Run with: `cargo test -p dnd-advancement --test full_progression`

use dnd_advancement::key::feature_choice_key;
use dnd_advancement::world::{create_sample_fighter, Ability, Character, CharacterClass};
use dnd_advancement::{
    AdvanceError, AdvancementConfig, AdvancementSession, MemoryStore, Ruleset, SrdRules, Stage,
};

/// Level 1 character of `class` with no spells yet.
fn novice(class: CharacterClass) -> Character {
    let mut character = create_sample_fighter(class.name());
    character.classes[0].class = class.key();
    character
}

/// Fill every stage with the first legal choice and commit.
fn level_up(character: &Character, store: &mut MemoryStore) -> Character {
    let mut session =
        AdvancementSession::start_next(character, &AdvancementConfig::new(), &SrdRules::new())
            .unwrap_or_else(|e| panic!("{} at {}: {e}", character.name, character.level));

    while session.current_stage() != Stage::Confirm {
        match session.current_stage() {
            Stage::Subclass => {
                let key = session.subclass_options()[0].key.clone();
                session.choose_subclass(&key).unwrap();
            }
            Stage::FeatureChoices => {
                let choices = session.feature_choices().to_vec();
                for (choice_key, missing) in session.open_feature_choices() {
                    let choice = choices
                        .iter()
                        .find(|c| feature_choice_key(&c.feature_name, c.level) == choice_key)
                        .unwrap();
                    for option in choice.options.iter().take(missing) {
                        session
                            .choose_feature_option(&choice_key, &option.key)
                            .unwrap();
                    }
                }
            }
            Stage::HitPoints => {
                session.take_average_hp().unwrap();
            }
            Stage::AbilityScoreImprovement => {
                for ability in Ability::all() {
                    if session.boost_ability(ability).unwrap_or(0) == 2 {
                        break;
                    }
                }
            }
            Stage::Spells => {
                let req = session.requirement().clone();
                let cantrips: Vec<String> = session
                    .available_cantrips()
                    .iter()
                    .take(req.new_cantrips as usize)
                    .map(|s| s.name.clone())
                    .collect();
                let spells: Vec<String> = session
                    .available_spells()
                    .iter()
                    .take(req.new_spells as usize)
                    .map(|s| s.name.clone())
                    .collect();
                for name in cantrips {
                    session.select_cantrip(&name).unwrap();
                }
                for name in spells {
                    session.select_spell(&name).unwrap();
                }
            }
            _ => {}
        }
        let stage = session.current_stage();
        session.next().unwrap_or_else(|e| {
            panic!(
                "{} stuck at {stage} on the way to level {}: {e}",
                character.name,
                character.level + 1
            )
        });
    }

    assert!(session.warnings().is_empty(), "{:?}", session.warnings());
    session.confirm(store).unwrap();
    store.get(character.id).unwrap().clone()
}

// =============================================================================
// TEST 1: Every class reaches level 20
// =============================================================================

#[test]
fn test_every_class_reaches_twenty() {
    let ruleset = Ruleset::srd();

    for &class in CharacterClass::all() {
        let mut character = novice(class);
        let mut store = MemoryStore::new();
        store.insert(character.clone());

        while character.level < 20 {
            let before = character.level;
            character = level_up(&character, &mut store);
            assert_eq!(character.level, before + 1);
            assert_eq!(character.class_level_total(), character.level as u32);
        }

        let key = class.key();
        assert_eq!(
            character.spells.spells.len() as u32,
            ruleset.spells_known(&key, 20) - ruleset.spells_known(&key, 1),
            "{class:?} spells"
        );
        assert_eq!(
            character.spells.cantrips.len() as u32,
            ruleset.cantrips_known(&key, 20) - ruleset.cantrips_known(&key, 1),
            "{class:?} cantrips"
        );
    }
}

// =============================================================================
// TEST 2: Ranger spell picks at every spellcasting level
// =============================================================================

#[test]
fn test_ranger_never_needs_a_waiver() {
    let mut character = novice(CharacterClass::Ranger);
    let mut store = MemoryStore::new();
    store.insert(character.clone());

    while character.level < 20 {
        let mut session = AdvancementSession::start_next(
            &character,
            &AdvancementConfig::new(),
            &SrdRules::new(),
        )
        .unwrap();
        let required = session.requirement().new_spells as usize;
        assert!(session.available_spells().len() >= required);
        assert!(session.waive_stage(Stage::Spells).is_err());
        character = level_up(&character, &mut store);
    }

    assert_eq!(character.spells.spells.len(), 11);
    assert!(matches!(
        AdvancementSession::start_next(&character, &AdvancementConfig::new(), &SrdRules::new()),
        Err(AdvanceError::LevelCap { .. })
    ));
}
