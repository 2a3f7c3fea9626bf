//! Caption serialization.
//!
//! The transcription tool hands back timed segments; turning those into an
//! `.srt` or plain-text file is this crate's job, so the output format does
//! not depend on which speech-to-text engine produced the segments.

/// One timed piece of recognized speech. Times are seconds from the start
/// of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Full transcription result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    /// The whole recognized text, as reported by the engine.
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Build a transcript from segments alone, deriving `text` by joining
    /// the segment texts. Mostly useful in tests and mock engines.
    pub fn from_segments(segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Transcript { text, segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Serialize as SubRip: 1-based cue index, `HH:MM:SS,mmm` timestamps,
    /// one blank line between cues. An empty transcript serializes to an
    /// empty string, which downstream burn-in treats as "no captions".
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (index, segment) in self.segments.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                index + 1,
                format_srt_timestamp(segment.start),
                format_srt_timestamp(segment.end),
                segment.text.trim()
            ));
        }
        out
    }

    /// Serialize as a plain-text transcript.
    pub fn to_plain_text(&self) -> String {
        let text = self.text.trim();
        if text.is_empty() {
            String::new()
        } else {
            format!("{text}\n")
        }
    }
}

/// `seconds` → `HH:MM:SS,mmm`. Negative inputs clamp to zero.
fn format_srt_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{mins:02}:{secs:02},{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript::from_segments(vec![
            TranscriptSegment {
                start: 0.0,
                end: 2.5,
                text: " Hello there".into(),
            },
            TranscriptSegment {
                start: 2.5,
                end: 3661.5,
                text: " General Kenobi ".into(),
            },
        ])
    }

    #[test]
    fn timestamps_render_with_millis() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(2.5), "00:00:02,500");
        assert_eq!(format_srt_timestamp(3661.5), "01:01:01,500");
        // Rounds rather than truncating.
        assert_eq!(format_srt_timestamp(1.2996), "00:00:01,300");
        assert_eq!(format_srt_timestamp(-3.0), "00:00:00,000");
    }

    #[test]
    fn srt_output_is_numbered_and_trimmed() {
        let srt = sample().to_srt();
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,500\nHello there\n\n\
             2\n00:00:02,500 --> 01:01:01,500\nGeneral Kenobi\n\n"
        );
    }

    #[test]
    fn empty_transcript_serializes_to_empty_outputs() {
        let transcript = Transcript::default();
        assert!(transcript.is_empty());
        assert_eq!(transcript.to_srt(), "");
        assert_eq!(transcript.to_plain_text(), "");
    }

    #[test]
    fn plain_text_joins_segments() {
        assert_eq!(sample().to_plain_text(), "Hello there General Kenobi\n");
    }
}
