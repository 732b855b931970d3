use std::path::Path;

use lofty::file::FileType;
use lofty::probe::Probe;
use thiserror::Error;

use crate::waveform::Waveform;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),
    #[error("Unsupported sample layout: {0}")]
    SampleLayout(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Containers decoded in-process without a transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeContainer {
    Wav,
    Flac,
}

impl NativeContainer {
    pub fn label(self) -> &'static str {
        match self {
            NativeContainer::Wav => "wav",
            NativeContainer::Flac => "flac",
        }
    }
}

/// Identify a natively decodable container.
///
/// Content sniffing comes first so that a mislabelled extension is still
/// recognised; the extension is only consulted when the probe is inconclusive.
pub fn native_container(path: &Path) -> Option<NativeContainer> {
    let sniffed = Probe::open(path)
        .ok()
        .and_then(|probe| probe.guess_file_type().ok())
        .and_then(|probe| probe.file_type());
    match sniffed {
        Some(FileType::Wav) => return Some(NativeContainer::Wav),
        Some(FileType::Flac) => return Some(NativeContainer::Flac),
        Some(other) => {
            log::debug!("{} sniffed as {:?}", path.display(), other);
            return None;
        }
        None => {}
    }
    match extension(path).as_str() {
        "wav" | "wave" => Some(NativeContainer::Wav),
        "flac" => Some(NativeContainer::Flac),
        _ => None,
    }
}

pub fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn decode_native(path: &Path, container: NativeContainer) -> Result<Waveform, DecodeError> {
    match container {
        NativeContainer::Wav => decode_wav(path),
        NativeContainer::Flac => decode_flac(path),
    }
}

/// Decode a WAV file (integer or float PCM) into a normalized mono waveform.
pub fn decode_wav(path: &Path) -> Result<Waveform, DecodeError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(DecodeError::SampleLayout(format!(
                    "{}-bit integer PCM",
                    spec.bits_per_sample
                )));
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    Ok(Waveform::from_interleaved(
        &interleaved,
        spec.channels,
        spec.sample_rate,
    ))
}

pub fn decode_flac(path: &Path) -> Result<Waveform, DecodeError> {
    let mut reader = claxon::FlacReader::open(path)?;
    let info = reader.streaminfo();
    if info.bits_per_sample == 0 || info.bits_per_sample > 32 {
        return Err(DecodeError::SampleLayout(format!(
            "{}-bit FLAC",
            info.bits_per_sample
        )));
    }
    let scale = (1u64 << (info.bits_per_sample - 1)) as f32;
    let interleaved: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<Result<_, _>>()?;
    Ok(Waveform::from_interleaved(
        &interleaved,
        info.channels as u16,
        info.sample_rate,
    ))
}
