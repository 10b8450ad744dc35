//! Built-in D&D 5e class content.
//!
//! Class features by level, subclass lists, and feature choices for all 12
//! PHB classes, exposed through [`SrdRules`].

use crate::content::{
    ChoiceOption, ClassFeature, FeatDefinition, FeatureChoice, RulesError, RulesProvider,
    RulesQuery, SpellInfo, SubclassInfo,
};
use crate::key::ContentKey;
use crate::world::CharacterClass;
use crate::{feats, spells};

/// Rules provider backed by the static SRD tables in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrdRules;

impl SrdRules {
    pub fn new() -> Self {
        Self
    }
}

fn resolve(class: &ContentKey, query: RulesQuery) -> Result<CharacterClass, RulesError> {
    CharacterClass::from_key(class).ok_or_else(|| RulesError::UnknownClass {
        query,
        class: class.clone(),
    })
}

impl RulesProvider for SrdRules {
    fn class_features_at(
        &self,
        class: &ContentKey,
        level: u8,
    ) -> Result<Vec<ClassFeature>, RulesError> {
        let class = resolve(class, RulesQuery::ClassFeatures)?;
        Ok(class
            .feature_table()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(l, name, description)| ClassFeature {
                name: name.to_string(),
                level: *l,
                description: description.to_string(),
            })
            .collect())
    }

    fn subclasses_of(&self, class: &ContentKey) -> Result<Vec<SubclassInfo>, RulesError> {
        let class = resolve(class, RulesQuery::Subclasses)?;
        Ok(class
            .subclasses()
            .iter()
            .map(|(short, name)| SubclassInfo {
                key: ContentKey::phb(*short),
                name: name.to_string(),
            })
            .collect())
    }

    fn spells_of(&self, class: &ContentKey) -> Result<Vec<SpellInfo>, RulesError> {
        let class = resolve(class, RulesQuery::Spells)?;
        Ok(spells::spells_for_class(class)
            .map(|s| SpellInfo {
                name: s.name.to_string(),
                level: s.level,
            })
            .collect())
    }

    fn all_feats(&self) -> Result<Vec<FeatDefinition>, RulesError> {
        Ok(feats::FEATS.clone())
    }

    fn feature_choices_at(
        &self,
        class: &ContentKey,
        level: u8,
        subclass: Option<&ContentKey>,
    ) -> Result<Vec<FeatureChoice>, RulesError> {
        let class = resolve(class, RulesQuery::FeatureChoices)?;
        Ok(class.feature_choices(level, subclass))
    }
}

const FIGHTING_STYLES: &[(&str, &str, &str)] = &[
    ("archery", "Archery", "+2 bonus to attack rolls with ranged weapons."),
    ("defense", "Defense", "+1 bonus to AC while wearing armor."),
    ("dueling", "Dueling", "+2 damage with a one-handed melee weapon and no other weapons."),
    ("great-weapon-fighting", "Great Weapon Fighting", "Reroll 1s and 2s on damage with two-handed melee weapons."),
    ("protection", "Protection", "Impose disadvantage on an attack against an adjacent ally while wielding a shield."),
    ("two-weapon-fighting", "Two-Weapon Fighting", "Add your ability modifier to the damage of the off-hand attack."),
];

const SKILLS: &[&str] = &[
    "Acrobatics",
    "Arcana",
    "Athletics",
    "Deception",
    "History",
    "Insight",
    "Intimidation",
    "Investigation",
    "Perception",
    "Performance",
    "Persuasion",
    "Sleight of Hand",
    "Stealth",
    "Thieves' Tools",
];

const METAMAGIC: &[(&str, &str)] = &[
    ("careful", "Careful Spell"),
    ("distant", "Distant Spell"),
    ("empowered", "Empowered Spell"),
    ("extended", "Extended Spell"),
    ("heightened", "Heightened Spell"),
    ("quickened", "Quickened Spell"),
    ("subtle", "Subtle Spell"),
    ("twinned", "Twinned Spell"),
];

const INVOCATIONS: &[(&str, &str)] = &[
    ("agonizing-blast", "Agonizing Blast"),
    ("armor-of-shadows", "Armor of Shadows"),
    ("beast-speech", "Beast Speech"),
    ("devils-sight", "Devil's Sight"),
    ("eldritch-sight", "Eldritch Sight"),
    ("eyes-of-the-rune-keeper", "Eyes of the Rune Keeper"),
    ("fiendish-vigor", "Fiendish Vigor"),
    ("mask-of-many-faces", "Mask of Many Faces"),
    ("misty-visions", "Misty Visions"),
    ("repelling-blast", "Repelling Blast"),
];

const FAVORED_ENEMIES: &[&str] = &[
    "Aberrations",
    "Beasts",
    "Celestials",
    "Constructs",
    "Dragons",
    "Elementals",
    "Fey",
    "Fiends",
    "Giants",
    "Monstrosities",
    "Oozes",
    "Plants",
    "Undead",
];

const TERRAINS: &[&str] = &[
    "Arctic",
    "Coast",
    "Desert",
    "Forest",
    "Grassland",
    "Mountain",
    "Swamp",
    "Underdark",
];

fn fighting_styles(allowed: &[&str]) -> Vec<ChoiceOption> {
    FIGHTING_STYLES
        .iter()
        .filter(|(key, _, _)| allowed.contains(key))
        .map(|(key, name, desc)| ChoiceOption::new(*key, *name).with_description(*desc))
        .collect()
}

fn named_options(names: &[&str]) -> Vec<ChoiceOption> {
    names
        .iter()
        .map(|name| ChoiceOption::new(crate::key::normalize_key(name), *name))
        .collect()
}

fn keyed_options(pairs: &[(&str, &str)]) -> Vec<ChoiceOption> {
    pairs
        .iter()
        .map(|(key, name)| ChoiceOption::new(*key, *name))
        .collect()
}

const ALL_STYLES: &[&str] = &[
    "archery",
    "defense",
    "dueling",
    "great-weapon-fighting",
    "protection",
    "two-weapon-fighting",
];

impl CharacterClass {
    /// Major class features as `(level, name, description)`.
    pub fn feature_table(&self) -> &'static [(u8, &'static str, &'static str)] {
        match self {
            CharacterClass::Barbarian => &[
                (1, "Rage", "Enter a rage as a bonus action for bonus damage and resistance."),
                (1, "Unarmored Defense", "AC equals 10 + DEX modifier + CON modifier without armor."),
                (2, "Reckless Attack", "Gain advantage on melee STR attacks; attacks against you have advantage."),
                (2, "Danger Sense", "Advantage on DEX saves against effects you can see."),
                (3, "Primal Path", "Choose a path that shapes the nature of your rage."),
                (5, "Extra Attack", "Attack twice when you take the Attack action."),
                (5, "Fast Movement", "Speed increases by 10 feet while not wearing heavy armor."),
                (7, "Feral Instinct", "Advantage on initiative rolls."),
                (9, "Brutal Critical", "Roll one additional weapon damage die on a critical hit."),
                (11, "Relentless Rage", "Drop to 1 HP instead of 0 on a successful CON save while raging."),
                (15, "Persistent Rage", "Rage ends early only if you fall unconscious or choose to end it."),
                (18, "Indomitable Might", "Use your STR score in place of a lower STR check total."),
                (20, "Primal Champion", "STR and CON increase by 4, maximum 24."),
            ],
            CharacterClass::Bard => &[
                (1, "Bardic Inspiration", "Grant an inspiration die as a bonus action."),
                (1, "Spellcasting", "Cast bard spells using Charisma."),
                (2, "Jack of All Trades", "Add half proficiency to non-proficient ability checks."),
                (2, "Song of Rest", "Allies regain extra HP during a short rest."),
                (3, "Bard College", "Choose a college that grants additional features."),
                (3, "Expertise", "Double proficiency bonus for two chosen skills."),
                (5, "Font of Inspiration", "Regain Bardic Inspiration on a short rest."),
                (6, "Countercharm", "Grant advantage on saves against fear and charm."),
                (10, "Magical Secrets", "Learn two spells from any class list."),
                (20, "Superior Inspiration", "Regain one Bardic Inspiration when rolling initiative with none left."),
            ],
            CharacterClass::Cleric => &[
                (1, "Spellcasting", "Cast cleric spells using Wisdom."),
                (1, "Divine Domain", "Choose a domain related to your deity."),
                (2, "Channel Divinity", "Channel divine energy to fuel magical effects."),
                (5, "Destroy Undead", "Turn Undead destroys low-CR undead."),
                (10, "Divine Intervention", "Call on your deity to intervene on your behalf."),
            ],
            CharacterClass::Druid => &[
                (1, "Druidic", "You know Druidic, the secret language of druids."),
                (1, "Spellcasting", "Cast druid spells using Wisdom."),
                (2, "Wild Shape", "Magically assume the shape of a beast."),
                (2, "Druid Circle", "Choose a circle of druids to identify with."),
                (18, "Timeless Body", "Age more slowly."),
                (18, "Beast Spells", "Cast spells while in Wild Shape."),
                (20, "Archdruid", "Use Wild Shape an unlimited number of times."),
            ],
            CharacterClass::Fighter => &[
                (1, "Fighting Style", "Adopt a particular style of fighting as your specialty."),
                (1, "Second Wind", "Regain 1d10 + fighter level HP as a bonus action."),
                (2, "Action Surge", "Take one additional action on your turn."),
                (3, "Martial Archetype", "Choose an archetype that reflects your combat approach."),
                (5, "Extra Attack", "Attack twice when you take the Attack action."),
                (9, "Indomitable", "Reroll a failed saving throw."),
                (11, "Extra Attack (2)", "Attack three times when you take the Attack action."),
                (20, "Extra Attack (3)", "Attack four times when you take the Attack action."),
            ],
            CharacterClass::Monk => &[
                (1, "Unarmored Defense", "AC equals 10 + DEX modifier + WIS modifier without armor."),
                (1, "Martial Arts", "Use DEX for unarmed strikes and monk weapons."),
                (2, "Ki", "Harness ki points to fuel special abilities."),
                (2, "Unarmored Movement", "Speed increases while not wearing armor."),
                (3, "Monastic Tradition", "Commit yourself to a monastic tradition."),
                (3, "Deflect Missiles", "Reduce damage from ranged weapon attacks."),
                (4, "Slow Fall", "Reduce falling damage with your reaction."),
                (5, "Extra Attack", "Attack twice when you take the Attack action."),
                (5, "Stunning Strike", "Spend ki to attempt to stun a creature you hit."),
                (6, "Ki-Empowered Strikes", "Unarmed strikes count as magical."),
                (7, "Evasion", "Take no damage on successful DEX saves for half damage."),
                (7, "Stillness of Mind", "End a charm or fright effect on yourself."),
                (10, "Purity of Body", "Immunity to disease and poison."),
                (13, "Tongue of the Sun and Moon", "Understand all spoken languages."),
                (14, "Diamond Soul", "Proficiency in all saving throws."),
                (15, "Timeless Body", "You no longer need food or water."),
                (18, "Empty Body", "Spend ki to become invisible."),
                (20, "Perfect Self", "Regain 4 ki when rolling initiative with none left."),
            ],
            CharacterClass::Paladin => &[
                (1, "Divine Sense", "Detect celestials, fiends, and undead."),
                (1, "Lay on Hands", "Restore HP from a pool of healing power."),
                (2, "Fighting Style", "Adopt a particular style of fighting as your specialty."),
                (2, "Spellcasting", "Cast paladin spells using Charisma."),
                (2, "Divine Smite", "Expend a spell slot to deal radiant damage on a hit."),
                (3, "Divine Health", "Immunity to disease."),
                (3, "Sacred Oath", "Swear an oath that binds you as a paladin forever."),
                (5, "Extra Attack", "Attack twice when you take the Attack action."),
                (6, "Aura of Protection", "Allies add your CHA modifier to saving throws."),
                (10, "Aura of Courage", "You and nearby allies can't be frightened."),
                (11, "Improved Divine Smite", "Melee weapon hits deal an extra 1d8 radiant damage."),
                (14, "Cleansing Touch", "End one spell on yourself or a willing creature."),
            ],
            CharacterClass::Ranger => &[
                (1, "Favored Enemy", "Advantage on tracking and recalling lore about a favored enemy."),
                (1, "Natural Explorer", "Benefits while traveling in a favored terrain."),
                (2, "Fighting Style", "Adopt a particular style of fighting as your specialty."),
                (2, "Spellcasting", "Cast ranger spells using Wisdom."),
                (3, "Ranger Archetype", "Choose an archetype to emulate."),
                (3, "Primeval Awareness", "Sense certain creature types nearby."),
                (5, "Extra Attack", "Attack twice when you take the Attack action."),
                (8, "Land's Stride", "Move through nonmagical difficult terrain at no extra cost."),
                (10, "Hide in Plain Sight", "Camouflage yourself to gain a bonus to Stealth."),
                (14, "Vanish", "Hide as a bonus action and can't be tracked nonmagically."),
                (18, "Feral Senses", "Fight invisible creatures without disadvantage."),
                (20, "Foe Slayer", "Add WIS modifier to an attack or damage roll against a favored enemy."),
            ],
            CharacterClass::Rogue => &[
                (1, "Expertise", "Double proficiency bonus for two chosen skills."),
                (1, "Sneak Attack", "Deal extra damage once per turn with advantage or an adjacent ally."),
                (1, "Thieves' Cant", "You know Thieves' Cant."),
                (2, "Cunning Action", "Dash, Disengage, or Hide as a bonus action."),
                (3, "Roguish Archetype", "Choose an archetype that you emulate."),
                (5, "Uncanny Dodge", "Halve the damage of an attack that hits you."),
                (6, "Expertise", "Double proficiency bonus for two more chosen skills."),
                (7, "Evasion", "Take no damage on successful DEX saves for half damage."),
                (11, "Reliable Talent", "Treat d20 rolls of 9 or lower as 10 on proficient checks."),
                (14, "Blindsense", "Know the location of hidden creatures within 10 feet."),
                (15, "Slippery Mind", "Proficiency in Wisdom saving throws."),
                (18, "Elusive", "No attack roll has advantage against you."),
                (20, "Stroke of Luck", "Turn a miss into a hit or a failed check into a 20."),
            ],
            CharacterClass::Sorcerer => &[
                (1, "Spellcasting", "Cast sorcerer spells using Charisma."),
                (1, "Sorcerous Origin", "Choose the source of your innate magical power."),
                (2, "Font of Magic", "Gain sorcery points to fuel magical effects."),
                (3, "Metamagic", "Twist your spells to suit your needs."),
                (20, "Sorcerous Restoration", "Regain 4 sorcery points on a short rest."),
            ],
            CharacterClass::Warlock => &[
                (1, "Otherworldly Patron", "Strike a bargain with an otherworldly being."),
                (1, "Pact Magic", "Cast warlock spells using Charisma; slots recover on a short rest."),
                (2, "Eldritch Invocations", "Learn fragments of forbidden knowledge."),
                (3, "Pact Boon", "Your patron bestows a gift upon you."),
                (11, "Mystic Arcanum (6th level)", "Cast one 6th-level spell once per long rest."),
                (13, "Mystic Arcanum (7th level)", "Cast one 7th-level spell once per long rest."),
                (15, "Mystic Arcanum (8th level)", "Cast one 8th-level spell once per long rest."),
                (17, "Mystic Arcanum (9th level)", "Cast one 9th-level spell once per long rest."),
                (20, "Eldritch Master", "Regain all Pact Magic slots once per long rest."),
            ],
            CharacterClass::Wizard => &[
                (1, "Spellcasting", "Cast wizard spells using Intelligence."),
                (1, "Arcane Recovery", "Recover spell slots during a short rest."),
                (2, "Arcane Tradition", "Choose a school of magic to specialize in."),
                (18, "Spell Mastery", "Cast a chosen 1st- and 2nd-level spell at will."),
                (20, "Signature Spells", "Two 3rd-level spells are always prepared."),
            ],
        }
    }

    /// Subclasses as `(short name, display name)`.
    pub fn subclasses(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            CharacterClass::Barbarian => &[
                ("Berserker", "Path of the Berserker"),
                ("Totem Warrior", "Path of the Totem Warrior"),
            ],
            CharacterClass::Bard => &[("Lore", "College of Lore"), ("Valor", "College of Valor")],
            CharacterClass::Cleric => &[
                ("Knowledge", "Knowledge Domain"),
                ("Life", "Life Domain"),
                ("Light", "Light Domain"),
                ("Nature", "Nature Domain"),
                ("Tempest", "Tempest Domain"),
                ("Trickery", "Trickery Domain"),
                ("War", "War Domain"),
            ],
            CharacterClass::Druid => &[("Land", "Circle of the Land"), ("Moon", "Circle of the Moon")],
            CharacterClass::Fighter => &[
                ("Champion", "Champion"),
                ("Battle Master", "Battle Master"),
                ("Eldritch Knight", "Eldritch Knight"),
            ],
            CharacterClass::Monk => &[
                ("Open Hand", "Way of the Open Hand"),
                ("Shadow", "Way of Shadow"),
                ("Four Elements", "Way of the Four Elements"),
            ],
            CharacterClass::Paladin => &[
                ("Devotion", "Oath of Devotion"),
                ("Ancients", "Oath of the Ancients"),
                ("Vengeance", "Oath of Vengeance"),
            ],
            CharacterClass::Ranger => &[("Hunter", "Hunter"), ("Beast Master", "Beast Master")],
            CharacterClass::Rogue => &[
                ("Thief", "Thief"),
                ("Assassin", "Assassin"),
                ("Arcane Trickster", "Arcane Trickster"),
            ],
            CharacterClass::Sorcerer => &[
                ("Draconic", "Draconic Bloodline"),
                ("Wild Magic", "Wild Magic"),
            ],
            CharacterClass::Warlock => &[
                ("Archfey", "The Archfey"),
                ("Fiend", "The Fiend"),
                ("Great Old One", "The Great Old One"),
            ],
            CharacterClass::Wizard => &[
                ("Abjuration", "School of Abjuration"),
                ("Conjuration", "School of Conjuration"),
                ("Divination", "School of Divination"),
                ("Enchantment", "School of Enchantment"),
                ("Evocation", "School of Evocation"),
                ("Illusion", "School of Illusion"),
                ("Necromancy", "School of Necromancy"),
                ("Transmutation", "School of Transmutation"),
            ],
        }
    }

    /// Choices imposed by features gained at `level`.
    pub fn feature_choices(&self, level: u8, subclass: Option<&ContentKey>) -> Vec<FeatureChoice> {
        let in_subclass = |name: &str| subclass.is_some_and(|s| s.is_named(name));
        let mut choices = Vec::new();

        match (self, level) {
            (CharacterClass::Fighter, 1) => {
                choices.push(FeatureChoice::single("Fighting Style", 1, fighting_styles(ALL_STYLES)));
            }
            (CharacterClass::Fighter, 10) if in_subclass("Champion") => {
                choices.push(FeatureChoice::single(
                    "Additional Fighting Style",
                    10,
                    fighting_styles(ALL_STYLES),
                ));
            }
            (CharacterClass::Paladin, 2) => {
                choices.push(FeatureChoice::single(
                    "Fighting Style",
                    2,
                    fighting_styles(&["defense", "dueling", "great-weapon-fighting", "protection"]),
                ));
            }
            (CharacterClass::Ranger, 1 | 6 | 14) => {
                choices.push(FeatureChoice::single(
                    "Favored Enemy",
                    level,
                    named_options(FAVORED_ENEMIES),
                ));
                if level != 14 {
                    choices.push(FeatureChoice::single(
                        "Natural Explorer",
                        level,
                        named_options(TERRAINS),
                    ));
                }
            }
            (CharacterClass::Ranger, 2) => {
                choices.push(FeatureChoice::single(
                    "Fighting Style",
                    2,
                    fighting_styles(&["archery", "defense", "dueling", "two-weapon-fighting"]),
                ));
            }
            (CharacterClass::Ranger, 10) => {
                choices.push(FeatureChoice::single(
                    "Natural Explorer",
                    10,
                    named_options(TERRAINS),
                ));
            }
            (CharacterClass::Rogue, 1 | 6) | (CharacterClass::Bard, 3 | 10) => {
                choices.push(FeatureChoice::multiple(
                    "Expertise",
                    level,
                    2,
                    named_options(SKILLS),
                ));
            }
            (CharacterClass::Sorcerer, 3) => {
                choices.push(FeatureChoice::multiple("Metamagic", 3, 2, keyed_options(METAMAGIC)));
            }
            (CharacterClass::Sorcerer, 10 | 17) => {
                choices.push(FeatureChoice::multiple(
                    "Metamagic",
                    level,
                    1,
                    keyed_options(METAMAGIC),
                ));
            }
            (CharacterClass::Warlock, 2) => {
                choices.push(FeatureChoice::multiple(
                    "Eldritch Invocations",
                    2,
                    2,
                    keyed_options(INVOCATIONS),
                ));
            }
            (CharacterClass::Warlock, 3) => {
                choices.push(FeatureChoice::single(
                    "Pact Boon",
                    3,
                    vec![
                        ChoiceOption::new("chain", "Pact of the Chain")
                            .with_description("Learn find familiar with special forms."),
                        ChoiceOption::new("blade", "Pact of the Blade")
                            .with_description("Create a pact weapon in your empty hand."),
                        ChoiceOption::new("tome", "Pact of the Tome")
                            .with_description("Receive a Book of Shadows with three cantrips."),
                    ],
                ));
            }
            (CharacterClass::Warlock, 5 | 7 | 9 | 12 | 15 | 18) => {
                choices.push(FeatureChoice::multiple(
                    "Eldritch Invocations",
                    level,
                    1,
                    keyed_options(INVOCATIONS),
                ));
            }
            (CharacterClass::Druid, 3 | 5 | 7 | 9) if in_subclass("Land") => {
                choices.push(FeatureChoice::single(
                    "Circle Spells",
                    level,
                    named_options(TERRAINS),
                ));
            }
            _ => {}
        }

        choices
    }
}
