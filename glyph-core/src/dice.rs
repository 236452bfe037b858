//! Dice rolling.
//!
//! Supports plain `NdM`, `NdM+K` and `NdM-K` notation. `dM` is shorthand for
//! `1dM`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;

/// Error type for dice parsing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Invalid dice count: {0}")]
    InvalidCount(u32),
}

/// A parsed dice expression such as `2d6+3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceExpression {
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let compact: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let invalid = || DiceError::InvalidNotation(notation.trim().to_string());

        let d_pos = compact.find('d').ok_or_else(invalid)?;
        let count_str = &compact[..d_pos];
        let rest = &compact[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| invalid())?
        };

        let (sides_str, modifier) = match rest.find(['+', '-']) {
            Some(pos) => {
                let magnitude: i32 = rest[pos + 1..].parse().map_err(|_| invalid())?;
                let sign = if rest.as_bytes()[pos] == b'-' { -1 } else { 1 };
                (&rest[..pos], sign * magnitude)
            }
            None => (rest, 0),
        };
        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;

        if count == 0 || count > MAX_DICE {
            return Err(DiceError::InvalidCount(count));
        }
        if !(2..=MAX_SIDES).contains(&sides) {
            return Err(DiceError::InvalidDieSize(sides));
        }

        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    pub fn roll(&self) -> RollResult {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> RollResult {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();
        let dice_total: i64 = rolls.iter().map(|r| i64::from(*r)).sum();

        RollResult {
            notation: self.to_string(),
            rolls,
            modifier: self.modifier,
            total: dice_total + i64::from(self.modifier),
        }
    }

    pub fn min(&self) -> i64 {
        i64::from(self.count) + i64::from(self.modifier)
    }

    pub fn max(&self) -> i64 {
        i64::from(self.count) * i64::from(self.sides) + i64::from(self.modifier)
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// Outcome of one roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub notation: String,
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub total: i64,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rolls: Vec<String> = self.rolls.iter().map(|r| r.to_string()).collect();
        write!(f, "{}: [{}]", self.notation, rolls.join(", "))?;
        if self.modifier != 0 {
            write!(f, " {:+}", self.modifier)?;
        }
        write!(f, " = {}", self.total)
    }
}
