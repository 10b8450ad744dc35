//! Property tests for the advancement engine.
//! Run with: `cargo test -p dnd-advancement --test properties`

use dnd_advancement::content::{FeatDefinition, PrerequisiteEntry};
use dnd_advancement::prerequisites;
use dnd_advancement::world::{
    create_sample_fighter, create_sample_sorcerer, create_sample_wizard, Ability, Character,
    CharacterClass,
};
use dnd_advancement::{
    AdvancementConfig, AdvancementSession, ContentKey, MemoryStore, RulesProvider, SrdRules,
    Stage,
};
use proptest::prelude::*;

fn at_level(mut character: Character, level: u8) -> Character {
    character.level = level;
    character.classes[0].level = level;
    character
}

fn start(character: &Character) -> AdvancementSession {
    AdvancementSession::start_next(character, &AdvancementConfig::new(), &SrdRules::new())
        .expect("Failed to start session")
}

/// Fill every stage with the first legal choice and stop at Confirm.
fn complete(session: &mut AdvancementSession) {
    while session.current_stage() != Stage::Confirm {
        match session.current_stage() {
            Stage::Subclass => {
                let key = session.subclass_options()[0].key.clone();
                session.choose_subclass(&key).unwrap();
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
        session.next().unwrap();
    }
}

fn any_class() -> impl Strategy<Value = CharacterClass> {
    prop::sample::select(CharacterClass::all().to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_level_sum_preserved(class in any_class(), level in 1u8..20) {
        let mut character = create_sample_fighter("Pat");
        character.classes[0].class = class.key();
        let character = at_level(character, level);
        let mut store = MemoryStore::new();
        store.insert(character.clone());

        let mut session = start(&character);
        complete(&mut session);
        let update = session.confirm(&mut store).unwrap();

        let saved = store.get(character.id).unwrap();
        prop_assert_eq!(update.level, level + 1);
        prop_assert_eq!(saved.class_level_total(), saved.level as u32);
        prop_assert_eq!(
            saved.hit_points.maximum,
            character.hit_points.maximum + update.hp_gain as i32
        );
    }

    #[test]
    fn prop_asi_needs_exactly_two_points(picks in prop::collection::vec(0usize..6, 0..5)) {
        let fighter = at_level(create_sample_fighter("Roland"), 3);
        let mut session = start(&fighter);

        for pick in picks {
            let _ = session.boost_ability(Ability::all()[pick]);
        }

        let spent: u8 = session.selection().ability_boosts().values().sum();
        prop_assert!(spent <= 2);
        prop_assert_eq!(
            session.validate_stage(Stage::AbilityScoreImprovement).is_ok(),
            spent == 2
        );
    }

    #[test]
    fn prop_spell_count_exact(count in 0usize..5) {
        let sorcerer = create_sample_sorcerer("Sorcha");
        let mut session = start(&sorcerer);

        let names: Vec<String> = session
            .available_spells()
            .iter()
            .take(count)
            .map(|s| s.name.clone())
            .collect();
        for name in &names {
            session.select_spell(name).unwrap();
        }

        prop_assert_eq!(session.validate_stage(Stage::Spells).is_ok(), count == 1);
    }

    #[test]
    fn prop_subclass_choice_idempotent(index in 0usize..3, later in 3u8..8) {
        let fighter = at_level(create_sample_fighter("Roland"), 2);
        let mut session = start(&fighter);
        let key: ContentKey = session.subclass_options()[index].key.clone();

        session.choose_subclass(&key).unwrap();
        let once = session.selection().clone();
        session.choose_subclass(&key).unwrap();

        prop_assert_eq!(session.selection(), &once);
        prop_assert_eq!(session.selection().subclass.as_ref(), Some(&key));

        let mut store = MemoryStore::new();
        store.insert(fighter.clone());
        complete(&mut session);
        session.confirm(&mut store).unwrap();

        let mut advanced = store.get(fighter.id).unwrap().clone();
        for _ in 3..later {
            let mut next = start(&advanced);
            prop_assert!(!next.requirement().needs_subclass);
            complete(&mut next);
            next.confirm(&mut store).unwrap();
            advanced = store.get(fighter.id).unwrap().clone();
        }
        prop_assert_eq!(advanced.classes[0].subclass.as_ref(), Some(&key));
    }

    #[test]
    fn prop_ability_minimum_gates_feat(ability in 0usize..6, minimum in 8u8..=18) {
        let ability = Ability::all()[ability];
        let feat = FeatDefinition::new("Gated", "HB")
            .with_prerequisite(PrerequisiteEntry::ability(ability, minimum));
        let mut character = create_sample_fighter("Pat");

        character.ability_scores.set(ability, minimum - 1);
        prop_assert!(!prerequisites::check(&feat, &character).valid);
        character.ability_scores.set(ability, minimum);
        prop_assert!(prerequisites::check(&feat, &character).valid);
        character.ability_scores.set(ability, minimum - 1);
        prop_assert!(!prerequisites::check(&feat, &character).valid);
    }

    #[test]
    fn prop_feat_eligibility_monotonic(
        scores in prop::array::uniform6(3u8..=20),
        bumps in prop::array::uniform6(0u8..=4),
        level in 1u8..=16,
        level_bump in 0u8..=4,
    ) {
        let feats = SrdRules::new().all_feats().unwrap();

        let mut low = create_sample_wizard("Merlin");
        low.level = level;
        for (ability, score) in Ability::all().into_iter().zip(scores) {
            low.ability_scores.set(ability, score);
        }

        let mut high = low.clone();
        high.level = level + level_bump;
        for (ability, bump) in Ability::all().into_iter().zip(bumps) {
            high.ability_scores.increase(ability, bump);
        }

        for feat in &feats {
            if prerequisites::check(feat, &low).valid {
                prop_assert!(
                    prerequisites::check(feat, &high).valid,
                    "{} lost eligibility",
                    feat.name
                );
            }
        }
    }
}
