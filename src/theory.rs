//! Equal-tempered pitch classes, scales and the diatonic chord tables.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Sharp-spelled note names, indexed by pitch class.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 semitone classes, octave ignored. `0` is C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    pub fn new(index: i32) -> Self {
        Self(index.rem_euclid(12) as u8)
    }

    /// Pitch class of a frequency, or `None` for non-positive/non-finite input.
    pub fn from_frequency(hz: f32) -> Option<Self> {
        frequency_to_midi(hz).map(Self::new)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self::new(self.0 as i32 + semitones)
    }

    /// Parse a note name such as `A`, `F#`, `Bb`.
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let base = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let accidental = match chars.as_str() {
            "" => 0,
            "#" | "♯" => 1,
            "b" | "♭" => -1,
            _ => return None,
        };
        Some(Self::new(base + accidental))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PitchClass {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// MIDI note number nearest to `hz`: `round(12·log2(f/440) + 69)`.
pub fn frequency_to_midi(hz: f32) -> Option<i32> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some((12.0 * (hz as f64 / 440.0).log2() + 69.0).round() as i32)
}

/// Signed distance in semitones from `from` to `to`, rounded.
pub fn semitone_interval(from: f32, to: f32) -> i32 {
    (12.0 * (to as f64 / from as f64).log2()).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scale {
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Ionian,
    Aeolian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
}

impl ChordQuality {
    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
        }
    }

    /// Semitone offsets of the third and fifth above the root.
    fn third_and_fifth(self) -> (i32, i32) {
        match self {
            ChordQuality::Major => (4, 7),
            ChordQuality::Minor => (3, 7),
            ChordQuality::Diminished => (3, 6),
        }
    }
}

const MAJOR_STEPS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_STEPS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_NUMERALS: [&str; 7] = ["I", "ii", "iii", "IV", "V", "vi", "vii°"];
const MINOR_NUMERALS: [&str; 7] = ["i", "ii°", "III", "iv", "v", "VI", "VII"];

const MAJOR_QUALITIES: [ChordQuality; 7] = [
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Minor,
    ChordQuality::Major,
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Diminished,
];
const MINOR_QUALITIES: [ChordQuality; 7] = [
    ChordQuality::Minor,
    ChordQuality::Diminished,
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Minor,
    ChordQuality::Major,
    ChordQuality::Major,
];

impl Scale {
    pub fn mode(self) -> Mode {
        match self {
            Scale::Major => Mode::Ionian,
            Scale::Minor => Mode::Aeolian,
        }
    }

    pub fn steps(self) -> &'static [i32; 7] {
        match self {
            Scale::Major => &MAJOR_STEPS,
            Scale::Minor => &MINOR_STEPS,
        }
    }

    /// Roman numeral of a zero-based scale degree.
    pub fn numeral(self, degree: usize) -> &'static str {
        match self {
            Scale::Major => MAJOR_NUMERALS[degree % 7],
            Scale::Minor => MINOR_NUMERALS[degree % 7],
        }
    }

    pub fn quality(self, degree: usize) -> ChordQuality {
        match self {
            Scale::Major => MAJOR_QUALITIES[degree % 7],
            Scale::Minor => MINOR_QUALITIES[degree % 7],
        }
    }

    /// Root, third and fifth of the diatonic triad on `degree`.
    pub fn triad(self, tonic: PitchClass, degree: usize) -> [PitchClass; 3] {
        let root = tonic.transpose(self.steps()[degree % 7]);
        let (third, fifth) = self.quality(degree).third_and_fifth();
        [root, root.transpose(third), root.transpose(fifth)]
    }

    /// Absolute chord symbol of the triad on `degree`, e.g. `F#m` in A major.
    pub fn chord_symbol(self, tonic: PitchClass, degree: usize) -> String {
        let root = tonic.transpose(self.steps()[degree % 7]);
        format!("{}{}", root, self.quality(degree).suffix())
    }

    /// Pitch classes of the scale starting at `tonic`.
    pub fn pitch_classes(self, tonic: PitchClass) -> Vec<PitchClass> {
        self.steps().iter().map(|&s| tonic.transpose(s)).collect()
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scale::Major => "Major",
            Scale::Minor => "Minor",
        })
    }
}

impl FromStr for Scale {
    type Err = String;

    /// Accepts `Major`, `minor`, `maj`, `min`, and keyed forms like `C major`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.split_whitespace().last().unwrap_or("").to_lowercase();
        match word.as_str() {
            "major" | "maj" | "ionian" => Ok(Scale::Major),
            "minor" | "min" | "aeolian" => Ok(Scale::Minor),
            _ => Err(format!("unknown scale '{}'", s)),
        }
    }
}

/// A tonic plus scale, e.g. `A minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tonality {
    pub tonic: PitchClass,
    pub scale: Scale,
}

impl fmt::Display for Tonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.scale)
    }
}

impl FromStr for Tonality {
    type Err = String;

    /// `C major`, `F# minor`, `Am`, or a bare `major`/`minor` (tonic C).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut words = s.split_whitespace();
        let first = words.next().ok_or_else(|| "empty scale".to_string())?;
        match words.next() {
            Some(_) => {
                let tonic = PitchClass::parse(first)
                    .ok_or_else(|| format!("unknown tonic '{}'", first))?;
                Ok(Self {
                    tonic,
                    scale: s.parse()?,
                })
            }
            None => {
                if let Ok(scale) = first.parse::<Scale>() {
                    return Ok(Self {
                        tonic: PitchClass::C,
                        scale,
                    });
                }
                let (note, scale) = match first.strip_suffix('m') {
                    Some(note) => (note, Scale::Minor),
                    None => (first, Scale::Major),
                };
                let tonic = PitchClass::parse(note)
                    .ok_or_else(|| format!("unknown scale '{}'", s))?;
                Ok(Self { tonic, scale })
            }
        }
    }
}

/// Pitch classes of a chord symbol's triad (`C`, `Am`, `F#dim`, `Bbaug`, `G7`).
/// Extensions after the quality are ignored.
pub fn chord_tones(symbol: &str) -> Option<[PitchClass; 3]> {
    let caps = CHORD_SYMBOL_RE.captures(symbol)?;
    let root = PitchClass::parse(&caps["root"])?;
    let (third, fifth) = match caps.name("quality").map(|m| m.as_str()) {
        Some("m") | Some("min") => (3, 7),
        Some("dim") | Some("°") => (3, 6),
        Some("aug") | Some("+") => (4, 8),
        _ => (4, 7),
    };
    Some([root, root.transpose(third), root.transpose(fifth)])
}

static CHORD_SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<root>[A-G][#b]?)(?P<quality>maj|min|m|dim|°|aug|\+)?(?P<ext>.*)$").unwrap()
});

static NUMERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<acc>[#b]?)(?P<numeral>[ivIV]+)(?P<dim>°|dim)?(?P<ext>.*)$").unwrap()
});

/// The major-quality variant of a chord token: `Am` → `A`, `Bdim` → `B`,
/// `vi` → `VI`, `vii°` → `VII`. Major chords and unparseable tokens are
/// returned unchanged.
pub fn major_variant(token: &str) -> String {
    if let Some(caps) = CHORD_SYMBOL_RE.captures(token) {
        let root = &caps["root"];
        let ext = &caps["ext"];
        return match caps.name("quality").map(|m| m.as_str()) {
            Some("m") | Some("min") | Some("dim") | Some("°") => format!("{}{}", root, ext),
            _ => token.to_string(),
        };
    }
    if let Some(caps) = NUMERAL_RE.captures(token) {
        return format!(
            "{}{}{}",
            &caps["acc"],
            caps["numeral"].to_uppercase(),
            &caps["ext"]
        );
    }
    token.to_string()
}
