//! Chart documents
//!
//! Charts are stored as JSON:
//!
//! ```text
//! { formatVersion, meta: { title, difficulty, bpm }, travelMs,
//!   judgeWindows, chartEnd, beatPeriod, notes: [...] }
//! ```
//!
//! Loading is tolerant. Older documents used `version`, `chartEndTime` and
//! `beatSec`, and some stored `bpm` as a string. Missing timing context is
//! filled with defaults. Gameplay flags are always reset on load.

use crate::chart::note::{Note, LANE_COUNT};
use crate::chart::{Chart, ChartMeta};
use crate::difficulty::{Difficulty, JudgeWindows};
use crate::error::EngineError;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Version written by [`to_json`]
pub const FORMAT_VERSION: u64 = 1;

const DEFAULT_TRAVEL_MS: f64 = 1820.0;
const DEFAULT_BEAT_PERIOD: f64 = 0.5;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartDocument<'a> {
    format_version: u64,
    meta: &'a ChartMeta,
    travel_ms: f64,
    judge_windows: JudgeWindows,
    chart_end: f64,
    beat_period: f64,
    notes: Vec<Note>,
}

/// Serialize a chart with all gameplay flags cleared
pub fn to_json(chart: &Chart) -> Result<String, EngineError> {
    let mut notes = chart.notes.clone();
    notes.iter_mut().for_each(Note::reset);
    let doc = ChartDocument {
        format_version: FORMAT_VERSION,
        meta: &chart.meta,
        travel_ms: chart.travel_ms,
        judge_windows: chart.judge_windows,
        chart_end: chart.chart_end,
        beat_period: chart.beat_period,
        notes,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write a chart document to `path`
///
/// # Errors
///
/// `Io` if the file cannot be written
pub fn write_chart(chart: &Chart, path: impl AsRef<Path>) -> Result<(), EngineError> {
    let path = path.as_ref();
    fs::write(path, to_json(chart)?)?;
    log::info!(
        "Saved chart '{}' ({} notes) to {}",
        chart.meta.title,
        chart.notes.len(),
        path.display()
    );
    Ok(())
}

/// Read a chart document from `path`
///
/// # Errors
///
/// `Io` if the file cannot be read, `ChartFormat` if the document is malformed
pub fn read_chart(path: impl AsRef<Path>) -> Result<Chart, EngineError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let chart = from_json(&text)?;
    log::info!(
        "Loaded chart '{}' ({} notes) from {}",
        chart.meta.title,
        chart.notes.len(),
        path.display()
    );
    Ok(chart)
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field<'a>(obj: &'a serde_json::Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

fn parse_note(index: usize, value: &Value) -> Result<Note, EngineError> {
    let mut entry = value
        .as_object()
        .cloned()
        .ok_or_else(|| EngineError::ChartFormat(format!("Note {} is not an object", index)))?;
    // ids are reassigned after sorting
    entry.remove("id");

    let mut note: Note = serde_json::from_value(Value::Object(entry))
        .map_err(|e| EngineError::ChartFormat(format!("Note {}: {}", index, e)))?;
    if note.lane >= LANE_COUNT {
        return Err(EngineError::ChartFormat(format!(
            "Note {}: lane {} out of range",
            index, note.lane
        )));
    }
    if !note.time.is_finite() || note.end_time() < note.time {
        return Err(EngineError::ChartFormat(format!(
            "Note {}: invalid time {}",
            index, note.time
        )));
    }
    note.reset();
    Ok(note)
}

/// Parse a chart document
///
/// # Errors
///
/// `ChartFormat` for invalid JSON, a missing or non-array `notes` field,
/// or a note that cannot be read
pub fn from_json(text: &str) -> Result<Chart, EngineError> {
    let doc: Value = serde_json::from_str(text)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| EngineError::ChartFormat("Chart document is not an object".to_string()))?;

    let version = field(obj, &["formatVersion", "version"])
        .and_then(Value::as_u64)
        .unwrap_or(FORMAT_VERSION);
    if version > FORMAT_VERSION {
        log::warn!("Chart format version {} is newer than {}", version, FORMAT_VERSION);
    }

    let notes = obj
        .get("notes")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::ChartFormat("Missing notes array".to_string()))?
        .iter()
        .enumerate()
        .map(|(i, v)| parse_note(i, v))
        .collect::<Result<Vec<_>, _>>()?;

    let meta = obj.get("meta").and_then(Value::as_object);
    let meta_field = |name: &str| meta.and_then(|m| m.get(name));

    let title = meta_field("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled")
        .to_string();
    let difficulty = meta_field("difficulty")
        .and_then(Value::as_str)
        .map(Difficulty::from_name_or_default)
        .unwrap_or_default();
    let stored_bpm = meta_field("bpm").and_then(number_like).filter(|b| *b > 0.0);

    let beat_period = field(obj, &["beatPeriod", "beatSec"])
        .and_then(number_like)
        .filter(|b| *b > 0.0)
        .or_else(|| stored_bpm.map(|bpm| 60.0 / bpm))
        .unwrap_or(DEFAULT_BEAT_PERIOD);

    let travel_ms = obj
        .get("travelMs")
        .and_then(number_like)
        .unwrap_or(DEFAULT_TRAVEL_MS);
    let judge_windows: JudgeWindows = obj
        .get("judgeWindows")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let chart_end = field(obj, &["chartEnd", "chartEndTime"])
        .and_then(number_like)
        .unwrap_or_else(|| notes.iter().map(Note::end_time).fold(0.0, f64::max));

    let intro = notes.iter().map(|n| n.time).fold(f64::INFINITY, f64::min);
    let intro = if intro.is_finite() { intro } else { 0.0 };

    let mut chart = Chart {
        meta: ChartMeta {
            title,
            difficulty,
            bpm: stored_bpm.unwrap_or(60.0 / beat_period),
        },
        travel_ms,
        judge_windows,
        chart_end,
        beat_period,
        intro,
        downbeat_phase: intro,
        sections: Vec::new(),
        notes,
    };
    chart.normalize_notes();
    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::note::NoteKind;

    fn sample_chart() -> Chart {
        Chart::new(
            "Night Drive",
            &Difficulty::Hard.profile(),
            0.5,
            30.0,
            vec![
                Note::tap(0, 0, 4.0),
                Note::hold(0, 1, 4.5, 6.0),
                Note::flick(0, 2, 7.0, 0.46),
            ],
        )
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.json");
        let chart = sample_chart();
        write_chart(&chart, &path).unwrap();

        let loaded = read_chart(&path).unwrap();
        assert_eq!(loaded.meta, chart.meta);
        assert_eq!(loaded.notes, chart.notes);
        assert_eq!(loaded.judge_windows, chart.judge_windows);
        assert_eq!(loaded.chart_end, 30.0);
        assert_eq!(loaded.beat_period, 0.5);
    }

    #[test]
    fn test_note_times_reload_exactly() {
        let chart = Chart::new(
            "precise",
            &Difficulty::Normal.profile(),
            0.4877,
            40.0,
            vec![
                Note::hold(0, 0, 30.117373511213903, 31.798024795783935),
                Note::tap(0, 2, 33.40917199826558),
            ],
        );
        let loaded = from_json(&to_json(&chart).unwrap()).unwrap();
        assert_eq!(loaded.notes[0].end_time(), 31.798024795783935);
        assert_eq!(loaded.notes[0].time, 30.117373511213903);
        assert_eq!(loaded.notes[1].time, 33.40917199826558);
        assert_eq!(loaded.beat_period, 0.4877);
        assert_eq!(loaded.notes, chart.notes);
    }

    #[test]
    fn test_document_field_names() {
        let json = to_json(&sample_chart()).unwrap();
        let doc: Value = serde_json::from_str(&json).unwrap();
        for key in ["formatVersion", "meta", "travelMs", "judgeWindows", "chartEnd", "beatPeriod", "notes"] {
            assert!(doc.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(doc["meta"]["difficulty"], "hard");
        assert_eq!(doc["notes"][1]["type"], "hold");
        assert_eq!(doc["notes"][1]["endTime"], 6.0);
    }

    #[test]
    fn test_transient_state_reset_on_load() {
        let json = r#"{
            "meta": {"title": "x", "difficulty": "normal", "bpm": 120},
            "notes": [
                {"lane": 0, "time": 5.0, "type": "hold", "endTime": 6.0, "started": true, "judged": true, "missed": true},
                {"lane": 1, "time": 6.0, "type": "flick", "tapsDone": 1, "firstTapAt": 6.01, "judged": true}
            ]
        }"#;
        let chart = from_json(json).unwrap();
        for note in &chart.notes {
            assert!(!note.judged && !note.missed && !note.is_started());
        }
        match &chart.notes[1].kind {
            NoteKind::Flick {
                taps_done,
                first_tap_at,
                ..
            } => {
                assert_eq!(*taps_done, 0);
                assert!(first_tap_at.is_none());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_legacy_fields_and_defaults() {
        let json = r#"{
            "version": 1,
            "meta": {"title": "old", "difficulty": "expert", "bpm": "150"},
            "chartEndTime": 42.5,
            "notes": [
                {"id": 9, "lane": 2, "time": 8.0, "type": "tap"},
                {"id": 3, "lane": 0, "time": 6.0, "type": "tap"}
            ]
        }"#;
        let chart = from_json(json).unwrap();
        assert_eq!(chart.meta.difficulty, Difficulty::Normal);
        assert_eq!(chart.meta.bpm, 150.0);
        assert!((chart.beat_period - 0.4).abs() < 1e-12);
        assert_eq!(chart.chart_end, 42.5);
        assert_eq!(chart.travel_ms, 1820.0);
        assert_eq!(chart.judge_windows, Difficulty::Normal.profile().judge);
        assert_eq!(chart.intro, 6.0);
        assert_eq!(chart.notes[0].id, 0);
        assert_eq!(chart.notes[0].lane, 0);
        assert_eq!(chart.notes[1].id, 1);
    }

    #[test]
    fn test_beat_sec_and_fallback_beat() {
        let chart = from_json(r#"{"beatSec": 0.6, "notes": []}"#).unwrap();
        assert_eq!(chart.beat_period, 0.6);
        let chart = from_json(r#"{"notes": []}"#).unwrap();
        assert_eq!(chart.beat_period, 0.5);
        assert!(!chart.is_playable());
    }

    #[test]
    fn test_malformed_documents() {
        for json in [
            "not json",
            "[]",
            r#"{"meta": {}}"#,
            r#"{"notes": {"lane": 0}}"#,
            r#"{"notes": [{"lane": 5, "time": 1.0, "type": "tap"}]}"#,
            r#"{"notes": [{"lane": 0, "time": 1.0, "type": "slide"}]}"#,
        ] {
            assert!(
                matches!(from_json(json), Err(EngineError::ChartFormat(_))),
                "accepted {}",
                json
            );
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_chart(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
