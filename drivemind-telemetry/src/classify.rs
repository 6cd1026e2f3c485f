//! # Media report classification
//!
//! Turns signals that were already extracted from camera frames (object detections)
//! and audio clips (transcripts) into an event kind and severity.
//!
//! Classification is deterministic: the same input always produces the same result.
//! Models are not run here.

use crate::error::ClassifyError;
use crate::event::{EventKind, RawEvent, Severity};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use drivemind_graph::Location;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Detections below this confidence are ignored.
pub const MIN_DETECTION_CONFIDENCE: f64 = 0.25;

/// Summaries are cut to at most this many characters.
pub const SUMMARY_MAX_CHARS: usize = 160;

const HAZARD_LABELS: &[&str] = &["accident", "crash", "collision", "fire", "smoke", "overturned"];
const BARRIER_LABELS: &[&str] = &["barrier", "cone", "roadblock", "construction"];
const WEATHER_LABELS: &[&str] = &["rain", "fog", "snow", "flood"];
const VEHICLE_LABELS: &[&str] = &["car", "truck", "bus", "motorcycle", "bicycle"];

/// Vehicle counts at which congestion reaches each severity.
const CONGESTION_THRESHOLDS: [(usize, Severity); 4] = [
    (40, Severity::Critical),
    (25, Severity::High),
    (15, Severity::Medium),
    (8, Severity::Low),
];

/// Transcript keywords per kind, in priority order for ties.
const TRANSCRIPT_KEYWORDS: [(EventKind, &[&str]); 4] = [
    (EventKind::Accident, &["crash", "collision", "accident", "siren"]),
    (EventKind::Closure, &["closed", "closure", "blocked"]),
    (EventKind::Weather, &["rain", "fog", "storm", "flood", "snow"]),
    (
        EventKind::Congestion,
        &["jam", "traffic", "congestion", "standstill"],
    ),
];
const URGENCY_WORDS: &[&str] = &["urgent", "emergency", "injured", "fire"];

/// A reference to a captured frame or clip.
///
/// At least one of `uri` or `data` must be present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    #[serde(default)]
    pub uri: Option<String>,
    /// Inline base64 payload; a `data:` URL prefix is accepted.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl MediaRef {
    /// Checks that the reference is usable, returning the decoded payload size in bytes
    /// (zero when only a URI is given).
    ///
    /// # Errors
    ///
    /// - [`ClassifyError::MissingMedia`] if neither a URI nor a payload is present
    /// - [`ClassifyError::InvalidMedia`] if the payload is not valid base64
    pub fn validate(&self) -> Result<usize, ClassifyError> {
        match (&self.uri, &self.data) {
            (_, Some(data)) => {
                let payload = data
                    .split_once(";base64,")
                    .map_or(data.as_str(), |(_, payload)| payload);
                STANDARD
                    .decode(payload.trim())
                    .map(|bytes| bytes.len())
                    .map_err(|e| ClassifyError::InvalidMedia(e.to_string()))
            }
            (Some(uri), None) if !uri.trim().is_empty() => Ok(0),
            _ => Err(ClassifyError::MissingMedia),
        }
    }
}

/// A single object detection from a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    /// Bounding box as `[x1, y1, x2, y2]` in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: None,
        }
    }
}

/// The outcome of classifying a media report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub kind: EventKind,
    pub severity: Severity,
    pub confidence: f64,
    /// Human-readable reasons (matched labels, keywords, or counts).
    pub evidence: Vec<String>,
}

impl Classification {
    /// Builds the event to ingest for this classification.
    pub fn to_raw_event(
        &self,
        location: Location,
        source: impl Into<String>,
        description: Option<String>,
    ) -> RawEvent {
        RawEvent {
            location,
            kind: self.kind,
            severity: self.severity,
            source: Some(source.into()),
            description,
            confidence: Some(self.confidence),
        }
    }
}

/// Classifies a frame from its detections.
///
/// Hazards take priority over barriers, which take priority over weather;
/// with none of those, the vehicle count decides whether there is congestion.
/// Returns `None` when nothing in the frame is worth reporting.
///
/// # Errors
///
/// Fails with [`ClassifyError::InvalidDetection`] if any confidence is outside `[0, 1]`.
pub fn classify_detections(
    detections: &[Detection],
) -> Result<Option<Classification>, ClassifyError> {
    if let Some(bad) = detections
        .iter()
        .find(|d| !(0.0..=1.0).contains(&d.confidence))
    {
        return Err(ClassifyError::InvalidDetection(bad.confidence));
    }

    let confident: Vec<(String, f64)> = detections
        .iter()
        .filter(|d| d.confidence >= MIN_DETECTION_CONFIDENCE)
        .map(|d| (d.label.trim().to_ascii_lowercase(), d.confidence))
        .collect();
    let matching = |labels: &[&str]| -> Vec<&(String, f64)> {
        confident
            .iter()
            .filter(|(label, _)| labels.contains(&label.as_str()))
            .collect()
    };

    let hazards = matching(HAZARD_LABELS);
    if !hazards.is_empty() {
        let severe = hazards
            .iter()
            .any(|(label, _)| label == "fire" || label == "overturned");
        let severity = if severe || hazards.len() >= 3 {
            Severity::Critical
        } else {
            Severity::High
        };
        return Ok(Some(from_labels(EventKind::Accident, severity, &hazards)));
    }

    let barriers = matching(BARRIER_LABELS);
    if !barriers.is_empty() {
        return Ok(Some(from_labels(
            EventKind::Closure,
            Severity::Medium,
            &barriers,
        )));
    }

    let weather = matching(WEATHER_LABELS);
    if !weather.is_empty() {
        let severity = if weather.iter().any(|(label, _)| label == "flood") {
            Severity::Medium
        } else {
            Severity::Low
        };
        return Ok(Some(from_labels(EventKind::Weather, severity, &weather)));
    }

    let vehicles = matching(VEHICLE_LABELS);
    let Some(severity) = CONGESTION_THRESHOLDS
        .iter()
        .find(|(threshold, _)| vehicles.len() >= *threshold)
        .map(|(_, severity)| *severity)
    else {
        return Ok(None);
    };
    Ok(Some(Classification {
        kind: EventKind::Congestion,
        severity,
        confidence: mean_confidence(&vehicles),
        evidence: vec![format!("{} vehicles in frame", vehicles.len())],
    }))
}

fn from_labels(kind: EventKind, severity: Severity, hits: &[&(String, f64)]) -> Classification {
    let evidence = hits
        .iter()
        .map(|(label, _)| label.as_str())
        .counts()
        .into_iter()
        .sorted()
        .map(|(label, count)| {
            if count == 1 {
                label.to_string()
            } else {
                format!("{label} x{count}")
            }
        })
        .collect();
    Classification {
        kind,
        severity,
        confidence: mean_confidence(hits),
        evidence,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_confidence(hits: &[&(String, f64)]) -> f64 {
    if hits.is_empty() {
        return 0.0;
    }
    hits.iter().map(|(_, confidence)| confidence).sum::<f64>() / hits.len() as f64
}

/// Classifies an audio report from its transcript.
///
/// The kind with the most keyword hits wins; ties go to the more serious kind.
/// Urgency words escalate the severity by one level.
/// Returns `None` if no keyword matches.
#[allow(clippy::cast_precision_loss)]
pub fn classify_transcript(transcript: &str) -> Option<Classification> {
    let words: Vec<String> = transcript
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let hits_for = |keywords: &[&str]| -> Vec<&str> {
        words
            .iter()
            .map(String::as_str)
            .filter(|w| keywords.contains(w))
            .unique()
            .collect()
    };

    // `max_by_key` keeps the last maximum, so scan in reverse priority order.
    let (kind, hits) = TRANSCRIPT_KEYWORDS
        .iter()
        .rev()
        .map(|(kind, keywords)| (*kind, hits_for(*keywords)))
        .filter(|(_, hits)| !hits.is_empty())
        .max_by_key(|(_, hits)| hits.len())?;

    let urgency = hits_for(URGENCY_WORDS);
    let base = match kind {
        EventKind::Accident => Severity::High,
        EventKind::Closure | EventKind::Congestion => Severity::Medium,
        EventKind::Weather => Severity::Low,
    };
    let severity = if urgency.is_empty() {
        base
    } else {
        base.escalate()
    };

    let evidence = hits
        .iter()
        .chain(urgency.iter())
        .map(ToString::to_string)
        .collect();
    Some(Classification {
        kind,
        severity,
        confidence: (0.5 + 0.15 * hits.len() as f64).min(1.0),
        evidence,
    })
}

/// A short summary of a transcript: its first sentence, cut to [`SUMMARY_MAX_CHARS`].
pub fn summarize(transcript: &str) -> String {
    let text = transcript.split_whitespace().join(" ");
    let first_sentence = text
        .find(['.', '!', '?'])
        .map_or(text.as_str(), |end| &text[..=end]);

    if first_sentence.chars().count() <= SUMMARY_MAX_CHARS {
        return first_sentence.to_string();
    }
    let mut summary: String = first_sentence
        .chars()
        .take(SUMMARY_MAX_CHARS - 1)
        .collect();
    summary.push('…');
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_debug_snapshot;

    fn vehicles(n: usize) -> Vec<Detection> {
        (0..n).map(|_| Detection::new("car", 0.8)).collect()
    }

    #[test]
    fn media_requires_uri_or_payload() {
        assert_eq!(
            MediaRef::default().validate(),
            Err(ClassifyError::MissingMedia)
        );
        let by_uri = MediaRef {
            uri: Some("s3://frames/cam-3/0001.jpg".to_string()),
            ..MediaRef::default()
        };
        assert_eq!(by_uri.validate(), Ok(0));
    }

    #[test]
    fn media_payload_must_decode() {
        let inline = MediaRef {
            data: Some("data:image/jpeg;base64,aGVsbG8=".to_string()),
            ..MediaRef::default()
        };
        assert_eq!(inline.validate(), Ok(5));

        let garbage = MediaRef {
            data: Some("not base64!".to_string()),
            ..MediaRef::default()
        };
        assert!(matches!(
            garbage.validate(),
            Err(ClassifyError::InvalidMedia(_))
        ));
    }

    #[test]
    fn low_confidence_detections_are_ignored() {
        let detections = [Detection::new("crash", 0.1), Detection::new("car", 0.9)];
        assert_eq!(classify_detections(&detections), Ok(None));
    }

    #[test]
    fn rejects_invalid_confidence() {
        assert_eq!(
            classify_detections(&[Detection::new("car", 1.2)]),
            Err(ClassifyError::InvalidDetection(1.2))
        );
    }

    #[test]
    fn vehicle_count_thresholds() {
        let severity = |n| {
            classify_detections(&vehicles(n))
                .unwrap()
                .map(|c| c.severity)
        };
        assert_eq!(severity(7), None);
        assert_eq!(severity(8), Some(Severity::Low));
        assert_eq!(severity(15), Some(Severity::Medium));
        assert_eq!(severity(25), Some(Severity::High));
        assert_eq!(severity(40), Some(Severity::Critical));
    }

    #[test]
    fn hazards_outrank_traffic() {
        let mut detections = vehicles(30);
        detections.push(Detection::new("Crash", 0.6));
        detections.push(Detection::new("smoke", 0.4));
        assert_debug_snapshot!(classify_detections(&detections).unwrap(), @r#"
        Some(
            Classification {
                kind: Accident,
                severity: High,
                confidence: 0.5,
                evidence: [
                    "crash",
                    "smoke",
                ],
            },
        )
        "#);
    }

    #[test]
    fn fire_is_critical() {
        let classification = classify_detections(&[Detection::new("fire", 0.7)])
            .unwrap()
            .unwrap();
        assert_eq!(classification.severity, Severity::Critical);
    }

    #[test]
    fn transcript_keywords() {
        let classification =
            classify_transcript("Huge jam on the ring road, total standstill near the flyover")
                .unwrap();
        assert_eq!(classification.kind, EventKind::Congestion);
        assert_eq!(classification.severity, Severity::Medium);
        assert_eq!(classification.evidence, vec!["jam", "standstill"]);
        assert!((classification.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn urgency_escalates() {
        let classification =
            classify_transcript("Collision at the junction, people injured. Send help!").unwrap();
        assert_eq!(classification.kind, EventKind::Accident);
        assert_eq!(classification.severity, Severity::Critical);
    }

    #[test]
    fn ties_go_to_the_more_serious_kind() {
        let classification = classify_transcript("Road closed after the crash").unwrap();
        assert_eq!(classification.kind, EventKind::Accident);
    }

    #[test]
    fn silence_is_not_an_event() {
        assert_eq!(classify_transcript("All clear on the highway today"), None);
    }

    #[test]
    fn summary_is_first_sentence() {
        assert_eq!(
            summarize("  Heavy rain near   Silk Board. Expect delays of twenty minutes."),
            "Heavy rain near Silk Board."
        );
    }

    #[test]
    fn summary_is_bounded() {
        let long = "word ".repeat(100);
        let summary = summarize(&long);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
        assert!(summary.ends_with('…'));
    }
}
