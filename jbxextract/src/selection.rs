//! Audio candidate selection.
//!
//! Deterministic rule for picking the stream URL out of an extraction
//! result:
//!
//! 1. Work on the container's first entry (or the sole entry).
//! 2. A direct URL on a non-live entry wins outright, no format comparison.
//! 3. Otherwise keep only formats whose audio codec is not `"none"`; if
//!    nothing remains, there is no candidate.
//! 4. Pick the format with the highest `(abr, tbr)` pair; on ties the
//!    earliest listed format wins.

use crate::model::{ExtractionEntry, ExtractionOutput, FormatDescriptor};

/// A selected stream URL plus the entry it came from (for metadata)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioCandidate {
    pub url: String,
    pub entry: ExtractionEntry,
}

/// Applies the selection rule. `None` means the result holds nothing
/// playable.
pub fn choose_audio_candidate(output: &ExtractionOutput) -> Option<AudioCandidate> {
    let entry = output.primary_entry();

    if let Some(url) = &entry.url {
        if !entry.is_live.unwrap_or(false) {
            return Some(AudioCandidate {
                url: url.clone(),
                entry: entry.clone(),
            });
        }
    }

    let mut best: Option<&FormatDescriptor> = None;
    for format in &entry.formats {
        if format.acodec.as_deref() == Some("none") {
            continue;
        }
        match best {
            None => best = Some(format),
            Some(current) if bitrate_rank(format) > bitrate_rank(current) => best = Some(format),
            _ => {}
        }
    }

    let url = best?.url.clone()?;
    Some(AudioCandidate {
        url,
        entry: entry.clone(),
    })
}

/// Comparison key for step 4: average bitrate first, total bitrate second.
fn bitrate_rank(format: &FormatDescriptor) -> (f64, f64) {
    (format.abr.unwrap_or(0.0), format.tbr.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(acodec: &str, abr: f64, tbr: f64, url: &str) -> FormatDescriptor {
        FormatDescriptor {
            url: Some(url.to_string()),
            acodec: Some(acodec.to_string()),
            abr: Some(abr),
            tbr: Some(tbr),
            format_id: None,
        }
    }

    #[test]
    fn direct_url_beats_any_format() {
        let output = ExtractionOutput::from_entry(ExtractionEntry {
            url: Some("A".into()),
            is_live: Some(false),
            formats: vec![format("aac", 10.0, 10.0, "f1"), format("none", 99.0, 99.0, "f2")],
            ..Default::default()
        });

        assert_eq!(choose_audio_candidate(&output).unwrap().url, "A");
    }

    #[test]
    fn live_entries_fall_through_to_formats() {
        let output = ExtractionOutput::from_entry(ExtractionEntry {
            url: Some("live-url".into()),
            is_live: Some(true),
            formats: vec![format("opus", 64.0, 64.0, "f1")],
            ..Default::default()
        });

        assert_eq!(choose_audio_candidate(&output).unwrap().url, "f1");
    }

    #[test]
    fn abr_is_compared_before_tbr() {
        let output = ExtractionOutput::from_entry(ExtractionEntry {
            formats: vec![format("aac", 5.0, 5.0, "aac-url"), format("opus", 9.0, 1.0, "opus-url")],
            ..Default::default()
        });

        assert_eq!(choose_audio_candidate(&output).unwrap().url, "opus-url");
    }

    #[test]
    fn ties_keep_list_order() {
        let output = ExtractionOutput::from_entry(ExtractionEntry {
            formats: vec![format("aac", 9.0, 1.0, "first"), format("opus", 9.0, 1.0, "second")],
            ..Default::default()
        });

        assert_eq!(choose_audio_candidate(&output).unwrap().url, "first");
    }

    #[test]
    fn video_only_formats_are_filtered_out() {
        let output = ExtractionOutput::from_entry(ExtractionEntry {
            formats: vec![format("none", 99.0, 99.0, "video")],
            ..Default::default()
        });

        assert!(choose_audio_candidate(&output).is_none());
    }

    #[test]
    fn formats_without_codec_tag_still_qualify() {
        let output = ExtractionOutput::from_entry(ExtractionEntry {
            formats: vec![FormatDescriptor {
                url: Some("untagged".into()),
                ..Default::default()
            }],
            ..Default::default()
        });

        assert_eq!(choose_audio_candidate(&output).unwrap().url, "untagged");
    }

    #[test]
    fn container_results_use_the_first_entry() {
        let output = ExtractionOutput {
            entries: Some(vec![
                ExtractionEntry {
                    url: Some("from-first".into()),
                    ..Default::default()
                },
                ExtractionEntry {
                    url: Some("from-second".into()),
                    ..Default::default()
                },
            ]),
            entry: ExtractionEntry::default(),
        };

        assert_eq!(choose_audio_candidate(&output).unwrap().url, "from-first");
    }

    #[test]
    fn empty_results_have_no_candidate() {
        assert!(choose_audio_candidate(&ExtractionOutput::default()).is_none());
    }
}
