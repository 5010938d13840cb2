//! Segment fusion: merge recognition segments with diarization turns.
//!
//! Two independent time-segmented annotations of the same recording are
//! fused here: each recognition segment is attributed to the speaker turn it
//! overlaps most, then adjacent same-speaker segments are collapsed into
//! utterances.
//!
//! When diarization is unavailable the fallback path labels every segment
//! `SPEAKER_00`, takes the raw no-speech probability as confidence, and
//! skips the run-length merge entirely. The confidence asymmetry between
//! the two paths (`1 - no_speech_prob` vs `no_speech_prob`) matches the
//! deployed behavior and must not be unified without sign-off.

use crate::defaults::{FALLBACK_SPEAKER, MERGE_GAP_SECS};
use crate::diarize::{Diarization, SpeakerTurn};
use crate::session::Utterance;
use crate::stt::recognizer::RecognitionSegment;
use tracing::debug;

/// Fuse recognition segments with a diarization outcome into the final
/// utterance sequence.
///
/// Segments must be ordered ascending by start time and non-overlapping;
/// turns (when present) ordered ascending by start time. Empty segment input
/// yields an empty output, never an error.
pub fn fuse(segments: &[RecognitionSegment], diarization: &Diarization) -> Vec<Utterance> {
    let turns = match diarization {
        Diarization::Turns(turns) if !turns.is_empty() => turns,
        Diarization::Turns(_) => {
            debug!("diarization returned no turns, using single-speaker fallback");
            return number_sequence(fallback_utterances(segments));
        }
        Diarization::Unavailable { reason } => {
            debug!(reason = %reason, "diarization unavailable, using single-speaker fallback");
            return number_sequence(fallback_utterances(segments));
        }
    };

    let attributed = attribute_speakers(segments, turns);
    number_sequence(merge_adjacent(attributed))
}

/// Fallback path: every segment becomes its own utterance labelled with the
/// default speaker. No run-length merge is applied here.
fn fallback_utterances(segments: &[RecognitionSegment]) -> Vec<Utterance> {
    segments
        .iter()
        .map(|segment| Utterance {
            speaker: FALLBACK_SPEAKER.to_string(),
            text: segment.text.trim().to_string(),
            start: segment.start,
            end: segment.end,
            confidence: segment.no_speech_prob,
            sequence_number: 0,
        })
        .collect()
}

/// Assign each segment the speaker of the turn with the greatest temporal
/// overlap. Comparison is strictly greater, so the first maximal turn in
/// input order wins ties. Segments overlapping no turn at all get the
/// default label.
fn attribute_speakers(segments: &[RecognitionSegment], turns: &[SpeakerTurn]) -> Vec<Utterance> {
    segments
        .iter()
        .map(|segment| {
            let mut best_speaker = FALLBACK_SPEAKER;
            let mut max_overlap = 0.0_f64;

            for turn in turns {
                let overlap_start = segment.start.max(turn.start);
                let overlap_end = segment.end.min(turn.end);
                let overlap = (overlap_end - overlap_start).max(0.0);

                if overlap > max_overlap {
                    max_overlap = overlap;
                    best_speaker = &turn.speaker;
                }
            }

            Utterance {
                speaker: best_speaker.to_string(),
                text: segment.text.trim().to_string(),
                start: segment.start,
                end: segment.end,
                confidence: 1.0 - segment.no_speech_prob,
                sequence_number: 0,
            }
        })
        .collect()
}

/// Collapse consecutive same-speaker utterances separated by less than the
/// merge gap. Texts are joined with a single space, the span is extended,
/// and the confidence becomes the mean of the pair.
fn merge_adjacent(utterances: Vec<Utterance>) -> Vec<Utterance> {
    let mut iter = utterances.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for utterance in iter {
        let same_speaker = utterance.speaker == current.speaker;
        let gap = utterance.start - current.end;

        if same_speaker && gap < MERGE_GAP_SECS {
            current.text.push(' ');
            current.text.push_str(&utterance.text);
            current.end = utterance.end;
            current.confidence = (current.confidence + utterance.confidence) / 2.0;
        } else {
            merged.push(std::mem::replace(&mut current, utterance));
        }
    }

    // Flush the final accumulator
    merged.push(current);
    merged
}

/// Assign sequence numbers by output position.
fn number_sequence(mut utterances: Vec<Utterance>) -> Vec<Utterance> {
    for (index, utterance) in utterances.iter_mut().enumerate() {
        utterance.sequence_number = index as u64;
    }
    utterances
}
