//! Feat catalog.
//!
//! PHB feats with their prerequisites and ability score bonuses.

use crate::content::{FeatDefinition, PrerequisiteEntry};
use crate::world::Ability;

/// Name of the generic feat that stands in for a plain ability score increase.
pub const ABILITY_SCORE_IMPROVEMENT: &str = "Ability Score Improvement";

const SPELLCASTING: &str = "The ability to cast at least one spell";

lazy_static::lazy_static! {
    /// Standard D&D 5e feats.
    pub static ref FEATS: Vec<FeatDefinition> = vec![
        // The +2 here is what a plain increase would give; it never stacks
        // with the points chosen on the ability screen.
        FeatDefinition::new(ABILITY_SCORE_IMPROVEMENT, "PHB")
            .with_category("General")
            .with_hidden_bonus(Ability::Strength, 2)
            .repeatable(),
        FeatDefinition::new("Actor", "PHB")
            .with_bonus(Ability::Charisma, 1),
        FeatDefinition::new("Alert", "PHB"),
        FeatDefinition::new("Athlete", "PHB")
            .with_bonus(Ability::Strength, 1),
        FeatDefinition::new("Defensive Duelist", "PHB")
            .with_prerequisite(PrerequisiteEntry::ability(Ability::Dexterity, 13)),
        FeatDefinition::new("Dual Wielder", "PHB"),
        FeatDefinition::new("Durable", "PHB")
            .with_bonus(Ability::Constitution, 1),
        FeatDefinition::new("Eldritch Adept", "TCE")
            .with_prerequisite(PrerequisiteEntry::other("Spellcasting or Pact Magic feature")),
        FeatDefinition::new("Elemental Adept", "PHB")
            .with_prerequisite(PrerequisiteEntry::other(SPELLCASTING))
            .repeatable(),
        FeatDefinition::new("Grappler", "PHB")
            .with_prerequisite(PrerequisiteEntry::ability(Ability::Strength, 13)),
        FeatDefinition::new("Great Weapon Master", "PHB"),
        FeatDefinition::new("Healer", "PHB"),
        FeatDefinition::new("Heavy Armor Master", "PHB")
            .with_bonus(Ability::Strength, 1),
        FeatDefinition::new("Inspiring Leader", "PHB")
            .with_prerequisite(PrerequisiteEntry::ability(Ability::Charisma, 13)),
        FeatDefinition::new("Keen Mind", "PHB")
            .with_bonus(Ability::Intelligence, 1),
        FeatDefinition::new("Lucky", "PHB"),
        FeatDefinition::new("Mage Slayer", "PHB"),
        FeatDefinition::new("Magic Initiate", "PHB"),
        FeatDefinition::new("Martial Adept", "PHB"),
        FeatDefinition::new("Mobile", "PHB"),
        FeatDefinition::new("Observant", "PHB")
            .with_bonus(Ability::Wisdom, 1),
        FeatDefinition::new("Polearm Master", "PHB"),
        FeatDefinition::new("Resilient", "PHB")
            .with_bonus(Ability::Constitution, 1),
        FeatDefinition::new("Savage Attacker", "PHB"),
        FeatDefinition::new("Sentinel", "PHB"),
        FeatDefinition::new("Sharpshooter", "PHB"),
        FeatDefinition::new("Shield Master", "PHB"),
        FeatDefinition::new("Skilled", "PHB"),
        FeatDefinition::new("Spell Sniper", "PHB")
            .with_prerequisite(PrerequisiteEntry::other(SPELLCASTING)),
        FeatDefinition::new("Tough", "PHB"),
        FeatDefinition::new("War Caster", "PHB")
            .with_prerequisite(PrerequisiteEntry::other(SPELLCASTING)),
        FeatDefinition::new("Weapon Master", "PHB")
            .with_bonus(Ability::Strength, 1),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feat(name: &str) -> Option<&'static FeatDefinition> {
        FEATS.iter().find(|f| f.name == name)
    }

    #[test]
    fn test_feat_names_unique() {
        let mut names: Vec<_> = FEATS.iter().map(|f| f.name.to_lowercase()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), FEATS.len());
    }

    #[test]
    fn test_asi_feat_bonus_is_hidden() {
        let asi = feat(ABILITY_SCORE_IMPROVEMENT).unwrap();
        assert!(asi.repeatable);
        assert_eq!(asi.visible_bonuses().count(), 0);
        assert!(!asi.is_selectable());
    }

    #[test]
    fn test_lookup() {
        let leader = feat("Inspiring Leader").unwrap();
        assert_eq!(
            leader.prerequisites[0].abilities.get(&Ability::Charisma),
            Some(&13)
        );
        assert!(feat("Telekinetic").is_none());
    }
}
