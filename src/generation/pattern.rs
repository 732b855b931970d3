//! Modular instrument patterns and stacked harmony voices.

use std::fmt;

use serde::Serialize;

use crate::error::PipelineError;
use crate::theory::{PitchClass, Tonality, chord_tones};

/// Rest articulation appended per chord at the highest complexity.
pub const ARTICULATION: &str = "R";
pub const MAX_COMPLEXITY: u8 = 3;
pub const MAX_VOICES: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternRequest {
    pub chords: Vec<String>,
    pub tonality: Tonality,
    pub complexity: u8,
    pub tempo: f64,
    pub instruments: Vec<String>,
}

impl PatternRequest {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.chords.is_empty() {
            return Err(PipelineError::InvalidRequest("no chords given".into()));
        }
        if self.instruments.is_empty() {
            return Err(PipelineError::InvalidRequest("no instruments given".into()));
        }
        if !(1..=MAX_COMPLEXITY).contains(&self.complexity) {
            return Err(PipelineError::InvalidRequest(format!(
                "complexity must be within 1..={} (got {})",
                MAX_COMPLEXITY, self.complexity
            )));
        }
        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            return Err(PipelineError::InvalidRequest(format!(
                "tempo must be positive (got {})",
                self.tempo
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentVoice {
    pub instrument: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModularPattern {
    pub tempo: f64,
    pub voices: Vec<InstrumentVoice>,
}

impl fmt::Display for ModularPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.tempo.round())?;
        for (i, voice) in self.voices.iter().enumerate() {
            write!(f, " V{} I[{}] {}", i, voice.instrument, voice.tokens.join(" "))?;
        }
        Ok(())
    }
}

/// One voice per instrument. Each chord is emitted as-is; complexity 2 adds
/// the chord tones that belong to the scale, complexity 3 also adds a rest
/// articulation.
pub fn generate_pattern(request: &PatternRequest) -> Result<ModularPattern, PipelineError> {
    request.validate()?;
    let scale_notes = request.tonality.scale.pitch_classes(request.tonality.tonic);

    let mut base = Vec::new();
    for chord in &request.chords {
        let tones = chord_tones(chord)
            .ok_or_else(|| PipelineError::InvalidRequest(format!("unparseable chord '{}'", chord)))?;
        base.push(chord.clone());
        if request.complexity > 1 {
            base.extend(
                scale_notes
                    .iter()
                    .filter(|pc| tones.contains(pc))
                    .map(|pc| pc.to_string()),
            );
        }
        if request.complexity > 2 {
            base.push(ARTICULATION.to_string());
        }
    }

    Ok(ModularPattern {
        tempo: request.tempo,
        voices: request
            .instruments
            .iter()
            .map(|instrument| InstrumentVoice {
                instrument: instrument.clone(),
                tokens: base.clone(),
            })
            .collect(),
    })
}

/// `voices` copies of the scale, voice `i` transposed up `2 * (i + 1)` semitones.
pub fn generate_harmony(tonality: Tonality, voices: usize) -> Result<Vec<Vec<String>>, PipelineError> {
    if voices == 0 || voices > MAX_VOICES {
        return Err(PipelineError::InvalidRequest(format!(
            "voice count must be within 1..={} (got {})",
            MAX_VOICES, voices
        )));
    }
    let scale: Vec<PitchClass> = tonality.scale.pitch_classes(tonality.tonic);
    Ok((0..voices)
        .map(|i| {
            let shift = 2 * (i as i32 + 1);
            scale.iter().map(|pc| pc.transpose(shift).to_string()).collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(complexity: u8) -> PatternRequest {
        PatternRequest {
            chords: vec!["C".into(), "Am".into()],
            tonality: "C major".parse().unwrap(),
            complexity,
            tempo: 120.0,
            instruments: vec!["Piano".into(), "Bass".into()],
        }
    }

    #[test]
    fn test_complexity_one_is_chords_only() {
        let p = generate_pattern(&request(1)).unwrap();
        assert_eq!(p.voices.len(), 2);
        assert_eq!(p.voices[0].tokens, vec!["C", "Am"]);
        assert_eq!(p.voices[1].instrument, "Bass");
    }

    #[test]
    fn test_complexity_adds_scale_tones_and_articulation() {
        let p = generate_pattern(&request(2)).unwrap();
        assert_eq!(p.voices[0].tokens, vec!["C", "C", "E", "G", "Am", "C", "E", "A"]);
        let p = generate_pattern(&request(3)).unwrap();
        assert_eq!(
            p.voices[0].tokens,
            vec!["C", "C", "E", "G", "R", "Am", "C", "E", "A", "R"]
        );
    }

    #[test]
    fn test_out_of_scale_tones_are_skipped() {
        let mut req = request(2);
        req.chords = vec!["E".into()];
        // G# is not in C major
        let p = generate_pattern(&req).unwrap();
        assert_eq!(p.voices[0].tokens, vec!["E", "E", "B"]);
    }

    #[test]
    fn test_display() {
        let p = generate_pattern(&request(1)).unwrap();
        assert_eq!(p.to_string(), "T120 V0 I[Piano] C Am V1 I[Bass] C Am");
    }

    #[test]
    fn test_invalid_requests() {
        let mut req = request(4);
        assert!(generate_pattern(&req).is_err());
        req.complexity = 1;
        req.chords = vec!["Q7".into()];
        assert!(matches!(generate_pattern(&req), Err(PipelineError::InvalidRequest(_))));
        req.chords = vec!["C".into()];
        req.instruments.clear();
        assert!(generate_pattern(&req).is_err());
    }

    #[test]
    fn test_harmony_voices() {
        let voices = generate_harmony("C major".parse().unwrap(), 2).unwrap();
        assert_eq!(voices[0], vec!["D", "E", "F#", "G", "A", "B", "C#"]);
        assert_eq!(voices[1][0], "E");
        assert!(generate_harmony("C major".parse().unwrap(), 0).is_err());
    }
}
