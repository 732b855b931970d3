//! Seeded perturbation of a chord progression.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::PipelineError;
use crate::theory::{Scale, major_variant};

pub const REST: &str = "R";
const CANONICAL: [&str; 4] = ["I", "IV", "V", "vi"];
/// Chance of a rest after each chord in the light-touch band.
const REST_PROBABILITY: f64 = 0.15;
const LIGHT_MAX: f64 = 0.33;
const SUBSTITUTE_MAX: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariationStrategy {
    /// Chords kept, occasional rests inserted.
    Embellish,
    /// Chords swapped for their major variant.
    Substitute,
    /// Replaced by the canonical I–IV–V–vi cycle.
    Reharmonize,
}

impl VariationStrategy {
    pub fn for_amount(amount: f64) -> Self {
        if amount < LIGHT_MAX {
            VariationStrategy::Embellish
        } else if amount < SUBSTITUTE_MAX {
            VariationStrategy::Substitute
        } else {
            VariationStrategy::Reharmonize
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariationRequest {
    pub chords: Vec<String>,
    pub scale: Scale,
    pub amount: f64,
    pub seed: u64,
}

impl VariationRequest {
    pub fn new(chords: Vec<String>, scale: Scale, amount: f64, seed: u64) -> Self {
        Self {
            chords,
            scale,
            amount,
            seed,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chords.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "progression has no chords".to_string(),
            ));
        }
        if !self.amount.is_finite() || !(0.0..=1.0).contains(&self.amount) {
            return Err(PipelineError::InvalidRequest(format!(
                "variation amount must be within 0..=1 (got {})",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Tokens are chord symbols, Roman numerals or [`REST`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionVariation {
    pub tokens: Vec<String>,
    pub strategy: VariationStrategy,
    pub scale: Scale,
    pub seed: u64,
}

pub fn generate_variation(request: &VariationRequest) -> Result<ProgressionVariation, PipelineError> {
    request.validate()?;
    let mut rng = StdRng::seed_from_u64(request.seed);
    let strategy = VariationStrategy::for_amount(request.amount);

    let tokens = match strategy {
        VariationStrategy::Embellish => {
            let mut out = Vec::with_capacity(request.chords.len() * 2);
            for chord in &request.chords {
                out.push(chord.clone());
                if rng.gen_bool(REST_PROBABILITY) {
                    out.push(REST.to_string());
                }
            }
            out
        }
        VariationStrategy::Substitute => request
            .chords
            .iter()
            .map(|chord| {
                if rng.gen_bool(request.amount) {
                    major_variant(chord)
                } else {
                    chord.clone()
                }
            })
            .collect(),
        VariationStrategy::Reharmonize => CANONICAL
            .iter()
            .cycle()
            .take(request.chords.len())
            .map(|s| s.to_string())
            .collect(),
    };

    Ok(ProgressionVariation {
        tokens,
        strategy,
        scale: request.scale,
        seed: request.seed,
    })
}
