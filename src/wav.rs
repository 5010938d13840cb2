//! WAV container reassembly.
//!
//! Chunks arrive from the capture side as complete, independently valid WAV
//! files sharing one format. Reassembly strips the 44-byte header from every
//! chunk after the first, concatenates the PCM payloads, and patches the two
//! little-endian size fields in the inherited header so standard container
//! parsers accept the result.

use crate::defaults::{
    DATA_SIZE_OFFSET, FMT_FIELDS, RIFF_OVERHEAD, RIFF_SIZE_OFFSET, WAV_HEADER_LEN,
};
use crate::error::{Result, TabscribeError};
use std::path::Path;
use tracing::warn;

/// Reassemble ordered WAV chunk buffers into one valid WAV buffer.
///
/// The caller must pass buffers in ascending sequence-number order; this
/// function is purely positional.
///
/// Degenerate inputs are handled leniently rather than failing:
/// - empty input yields an empty buffer (reported upstream as a warning),
/// - a single chunk is returned unchanged, byte for byte,
/// - a chunk shorter than the header contributes no payload.
pub fn reassemble(chunks: &[Vec<u8>]) -> Vec<u8> {
    match chunks {
        [] => {
            warn!("reassembly requested for empty chunk sequence");
            Vec::new()
        }
        [single] => single.clone(),
        [first, rest @ ..] => {
            let mut header = first
                .get(..WAV_HEADER_LEN)
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| {
                    warn!(
                        len = first.len(),
                        "first chunk shorter than WAV header, padding with zeros"
                    );
                    let mut padded = first.clone();
                    padded.resize(WAV_HEADER_LEN, 0);
                    padded
                });

            let mut payload: Vec<u8> = Vec::new();
            payload.extend_from_slice(first.get(WAV_HEADER_LEN..).unwrap_or(&[]));

            for (index, chunk) in rest.iter().enumerate() {
                check_format_compatibility(&header, chunk, index + 1);
                // Chunks shorter than the header contribute nothing; partial
                // final chunks from an interrupted capture must not abort the
                // whole session.
                payload.extend_from_slice(chunk.get(WAV_HEADER_LEN..).unwrap_or(&[]));
            }

            let data_len = payload.len() as u32;
            patch_u32_le(&mut header, RIFF_SIZE_OFFSET, RIFF_OVERHEAD + data_len);
            patch_u32_le(&mut header, DATA_SIZE_OFFSET, data_len);

            header.extend_from_slice(&payload);
            header
        }
    }
}

fn patch_u32_le(header: &mut [u8], offset: usize, value: u32) {
    header[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Compare a chunk's fmt fields against the inherited header and log a
/// mismatch. The merged container keeps the first chunk's format either way;
/// a mismatched chunk would silently corrupt playback, which is worth a
/// warning in the session log.
fn check_format_compatibility(header: &[u8], chunk: &[u8], index: usize) {
    let Some(chunk_fmt) = chunk.get(FMT_FIELDS) else {
        return;
    };
    if &header[FMT_FIELDS] != chunk_fmt {
        warn!(
            chunk = index,
            "chunk fmt fields differ from first chunk, merged audio may be corrupt"
        );
    }
}

/// Read the audio duration of a finished WAV file in seconds.
///
/// Used to record `total_duration_secs` on the session after reassembly.
pub fn probe_duration_secs(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| TabscribeError::Reassembly {
        message: format!("Failed to open reassembled WAV {}: {}", path.display(), e),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(TabscribeError::Reassembly {
            message: format!("Zero sample rate in {}", path.display()),
        });
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}
