//! Hit dice.
//!
//! Hit points gained on level-up come from a single die of the class's
//! hit-die size, either rolled or taken as the fixed average.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Die sizes used for hit dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
        }
    }

    /// Fixed hit-point value taken instead of rolling: half the die rounded
    /// up, plus one.
    pub fn fixed_average(&self) -> u32 {
        self.sides().div_ceil(2) + 1
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.gen_range(1..=self.sides())
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}
