//! Spell database.
//!
//! Contains SRD spell names, levels, and the class lists each spell appears
//! on. Only what level-up selection needs is recorded here.

use crate::world::CharacterClass;
use std::sync::LazyLock;

/// A spell as listed in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellEntry {
    pub name: &'static str,
    /// 0 for cantrips.
    pub level: u8,
    pub classes: &'static [CharacterClass],
}

// ============================================================================
// Spell Database
// ============================================================================

/// Global spell database, ordered by level then name.
static SPELL_DATABASE: LazyLock<Vec<SpellEntry>> = LazyLock::new(build_spell_database);

/// Get all spells available to a class.
pub fn spells_for_class(class: CharacterClass) -> impl Iterator<Item = &'static SpellEntry> {
    SPELL_DATABASE
        .iter()
        .filter(move |s| s.classes.contains(&class))
}

fn build_spell_database() -> Vec<SpellEntry> {
    use CharacterClass::{
        Bard as BRD, Cleric as CLR, Druid as DRU, Paladin as PAL, Ranger as RNG,
        Sorcerer as SOR, Warlock as WLK, Wizard as WIZ,
    };

    const TABLE: &[(&str, u8, &[CharacterClass])] = &[
        // ====================================================================
        // CANTRIPS (Level 0)
        // ====================================================================
        ("Acid Splash", 0, &[SOR, WIZ]),
        ("Chill Touch", 0, &[SOR, WLK, WIZ]),
        ("Dancing Lights", 0, &[BRD, SOR, WIZ]),
        ("Druidcraft", 0, &[DRU]),
        ("Eldritch Blast", 0, &[WLK]),
        ("Fire Bolt", 0, &[SOR, WIZ]),
        ("Guidance", 0, &[CLR, DRU]),
        ("Light", 0, &[BRD, CLR, SOR, WIZ]),
        ("Mage Hand", 0, &[BRD, SOR, WLK, WIZ]),
        ("Mending", 0, &[BRD, CLR, DRU, SOR, WIZ]),
        ("Message", 0, &[BRD, SOR, WIZ]),
        ("Minor Illusion", 0, &[BRD, SOR, WLK, WIZ]),
        ("Poison Spray", 0, &[DRU, SOR, WLK, WIZ]),
        ("Prestidigitation", 0, &[BRD, SOR, WLK, WIZ]),
        ("Produce Flame", 0, &[DRU]),
        ("Ray of Frost", 0, &[SOR, WIZ]),
        ("Resistance", 0, &[CLR, DRU]),
        ("Sacred Flame", 0, &[CLR]),
        ("Shillelagh", 0, &[DRU]),
        ("Shocking Grasp", 0, &[SOR, WIZ]),
        ("Spare the Dying", 0, &[CLR]),
        ("Thaumaturgy", 0, &[CLR]),
        ("True Strike", 0, &[BRD, SOR, WLK, WIZ]),
        ("Vicious Mockery", 0, &[BRD]),
        // ====================================================================
        // 1ST LEVEL
        // ====================================================================
        ("Animal Friendship", 1, &[BRD, DRU, RNG]),
        ("Bane", 1, &[BRD, CLR]),
        ("Bless", 1, &[CLR, PAL]),
        ("Burning Hands", 1, &[SOR, WIZ]),
        ("Charm Person", 1, &[BRD, DRU, SOR, WLK, WIZ]),
        ("Cure Wounds", 1, &[BRD, CLR, DRU, PAL, RNG]),
        ("Detect Magic", 1, &[BRD, CLR, DRU, PAL, RNG, SOR, WIZ]),
        ("Disguise Self", 1, &[BRD, SOR, WIZ]),
        ("Ensnaring Strike", 1, &[RNG]),
        ("Faerie Fire", 1, &[BRD, DRU]),
        ("Feather Fall", 1, &[BRD, SOR, WIZ]),
        ("Fog Cloud", 1, &[DRU, RNG, SOR, WIZ]),
        ("Goodberry", 1, &[DRU, RNG]),
        ("Guiding Bolt", 1, &[CLR]),
        ("Healing Word", 1, &[BRD, CLR, DRU]),
        ("Hellish Rebuke", 1, &[WLK]),
        ("Heroism", 1, &[BRD, PAL]),
        ("Hex", 1, &[WLK]),
        ("Hunter's Mark", 1, &[RNG]),
        ("Jump", 1, &[DRU, RNG, SOR, WIZ]),
        ("Longstrider", 1, &[BRD, DRU, RNG, WIZ]),
        ("Mage Armor", 1, &[SOR, WIZ]),
        ("Magic Missile", 1, &[SOR, WIZ]),
        ("Protection from Evil and Good", 1, &[CLR, PAL, WLK, WIZ]),
        ("Shield", 1, &[SOR, WIZ]),
        ("Shield of Faith", 1, &[CLR, PAL]),
        ("Sleep", 1, &[BRD, SOR, WIZ]),
        ("Speak with Animals", 1, &[BRD, DRU, RNG]),
        ("Thunderwave", 1, &[BRD, DRU, SOR, WIZ]),
        // ====================================================================
        // 2ND LEVEL
        // ====================================================================
        ("Barkskin", 2, &[DRU, RNG]),
        ("Blur", 2, &[SOR, WIZ]),
        ("Darkness", 2, &[SOR, WLK, WIZ]),
        ("Hold Person", 2, &[BRD, CLR, DRU, SOR, WLK, WIZ]),
        ("Invisibility", 2, &[BRD, SOR, WLK, WIZ]),
        ("Lesser Restoration", 2, &[BRD, CLR, DRU, PAL, RNG]),
        ("Misty Step", 2, &[SOR, WLK, WIZ]),
        ("Pass without Trace", 2, &[DRU, RNG]),
        ("Scorching Ray", 2, &[SOR, WIZ]),
        ("Shatter", 2, &[BRD, SOR, WLK, WIZ]),
        ("Silence", 2, &[BRD, CLR, RNG]),
        ("Spike Growth", 2, &[DRU, RNG]),
        ("Spiritual Weapon", 2, &[CLR]),
        ("Suggestion", 2, &[BRD, SOR, WLK, WIZ]),
        // ====================================================================
        // 3RD LEVEL
        // ====================================================================
        ("Conjure Animals", 3, &[DRU, RNG]),
        ("Counterspell", 3, &[SOR, WLK, WIZ]),
        ("Dispel Magic", 3, &[BRD, CLR, DRU, PAL, SOR, WLK, WIZ]),
        ("Fireball", 3, &[SOR, WIZ]),
        ("Fly", 3, &[SOR, WLK, WIZ]),
        ("Haste", 3, &[SOR, WIZ]),
        ("Hypnotic Pattern", 3, &[BRD, SOR, WLK, WIZ]),
        ("Lightning Arrow", 3, &[RNG]),
        ("Lightning Bolt", 3, &[SOR, WIZ]),
        ("Plant Growth", 3, &[BRD, DRU, RNG]),
        ("Revivify", 3, &[CLR, PAL]),
        ("Spirit Guardians", 3, &[CLR]),
        // ====================================================================
        // 4TH LEVEL
        // ====================================================================
        ("Banishment", 4, &[CLR, PAL, SOR, WLK, WIZ]),
        ("Dimension Door", 4, &[BRD, SOR, WLK, WIZ]),
        ("Freedom of Movement", 4, &[BRD, CLR, DRU, RNG]),
        ("Greater Invisibility", 4, &[BRD, SOR, WIZ]),
        ("Polymorph", 4, &[BRD, DRU, SOR, WIZ]),
        ("Stoneskin", 4, &[DRU, RNG, SOR, WIZ]),
        ("Wall of Fire", 4, &[DRU, SOR, WIZ]),
        // ====================================================================
        // 5TH LEVEL
        // ====================================================================
        ("Commune with Nature", 5, &[DRU, RNG]),
        ("Cone of Cold", 5, &[SOR, WIZ]),
        ("Greater Restoration", 5, &[BRD, CLR, DRU]),
        ("Hold Monster", 5, &[BRD, SOR, WLK, WIZ]),
        ("Mass Cure Wounds", 5, &[BRD, CLR, DRU]),
        ("Tree Stride", 5, &[DRU, RNG]),
        ("Wall of Force", 5, &[WIZ]),
        // ====================================================================
        // 6TH - 9TH LEVEL
        // ====================================================================
        ("Chain Lightning", 6, &[SOR, WIZ]),
        ("Disintegrate", 6, &[SOR, WIZ]),
        ("Heal", 6, &[CLR, DRU]),
        ("Mass Suggestion", 6, &[BRD, SOR, WLK, WIZ]),
        ("Finger of Death", 7, &[SOR, WLK, WIZ]),
        ("Plane Shift", 7, &[CLR, DRU, SOR, WLK, WIZ]),
        ("Teleport", 7, &[BRD, SOR, WIZ]),
        ("Dominate Monster", 8, &[BRD, SOR, WLK, WIZ]),
        ("Power Word Stun", 8, &[BRD, SOR, WLK, WIZ]),
        ("Sunburst", 8, &[DRU, SOR, WIZ]),
        ("Meteor Swarm", 9, &[SOR, WIZ]),
        ("Power Word Kill", 9, &[BRD, SOR, WLK, WIZ]),
        ("Wish", 9, &[SOR, WIZ]),
    ];

    let mut db: Vec<SpellEntry> = TABLE
        .iter()
        .map(|&(name, level, classes)| SpellEntry {
            name,
            level,
            classes,
        })
        .collect();
    db.sort_by(|a, b| a.level.cmp(&b.level).then(a.name.cmp(b.name)));
    db
}
