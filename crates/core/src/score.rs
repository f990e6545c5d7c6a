//! Time-decaying popularity score.
//!
//! ```text
//! score = (allTimeUpvotes * K1 + 1) / (ageInBlocks * K2 + 1)
//! ageInBlocks = currentBlockHeight - submittedInBlock
//! ```
//!
//! `K1` (upvote weight) and `K2` (decay per block) are coupled: changing one
//! without the other shifts how quickly upvotes are outweighed by age. Both are
//! carried as a versioned preset so that every consumer computing a score uses
//! the same pair.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Named, versioned score constant pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScorePreset {
    /// v1: raw upvote count, `K1 = 1`, `K2 = 0.2`.
    Raw,
    /// v2: upvotes weighted by 1000, `K1 = 1000`, `K2 = 0.0002`.
    #[default]
    Weighted,
}

impl ScorePreset {
    /// Protocol version tag of this preset.
    pub fn version(&self) -> u32 {
        match self {
            ScorePreset::Raw => 1,
            ScorePreset::Weighted => 2,
        }
    }

    /// Database / config string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScorePreset::Raw => "raw",
            ScorePreset::Weighted => "weighted",
        }
    }

    /// Constants for this preset.
    pub fn params(&self) -> ScoreParams {
        match self {
            ScorePreset::Raw => ScoreParams {
                upvote_weight: 1.0,
                decay_per_block: 0.2,
            },
            ScorePreset::Weighted => ScoreParams {
                upvote_weight: 1000.0,
                decay_per_block: 0.0002,
            },
        }
    }
}

impl FromStr for ScorePreset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(ScorePreset::Raw),
            "weighted" => Ok(ScorePreset::Weighted),
            _ => Err(CoreError::UnknownPreset(s.to_string())),
        }
    }
}

/// Score constants `K1` and `K2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreParams {
    /// `K1`: multiplier applied to all-time upvotes.
    pub upvote_weight: f64,
    /// `K2`: decay rate per block of age.
    pub decay_per_block: f64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        ScorePreset::default().params()
    }
}

impl ScoreParams {
    /// Build and validate a parameter pair.
    pub fn new(upvote_weight: f64, decay_per_block: f64) -> Result<Self> {
        let params = Self {
            upvote_weight,
            decay_per_block,
        };
        params.validate()?;
        Ok(params)
    }

    /// Both constants must be finite and non-negative; `K1` must be positive.
    pub fn validate(&self) -> Result<()> {
        if !self.upvote_weight.is_finite() || self.upvote_weight <= 0.0 {
            return Err(CoreError::InvalidScoreParam {
                name: "upvote_weight",
                value: self.upvote_weight,
            });
        }
        if !self.decay_per_block.is_finite() || self.decay_per_block < 0.0 {
            return Err(CoreError::InvalidScoreParam {
                name: "decay_per_block",
                value: self.decay_per_block,
            });
        }
        Ok(())
    }

    /// Score an item with `all_time_upvotes` that is `age_in_blocks` old.
    pub fn score(&self, all_time_upvotes: f64, age_in_blocks: u64) -> f64 {
        let upvotes = all_time_upvotes.max(0.0);
        (upvotes * self.upvote_weight + 1.0) / (age_in_blocks as f64 * self.decay_per_block + 1.0)
    }

    /// Score an item at `current_block`, clamping negative ages to zero.
    pub fn score_at(
        &self,
        all_time_upvotes: f64,
        submitted_in_block: u64,
        current_block: u64,
    ) -> f64 {
        self.score(all_time_upvotes, age_in_blocks(submitted_in_block, current_block))
    }
}

/// Blocks elapsed since submission; zero if `current_block` precedes it.
pub fn age_in_blocks(submitted_in_block: u64, current_block: u64) -> u64 {
    current_block.saturating_sub(submitted_in_block)
}
