//! Integration tests for the chart engine

use abyssal_groove::features::period::autocorrelation::estimate_beat_period;
use abyssal_groove::io::{chart_file, decoder};
use abyssal_groove::{
    analyze_track, generate_chart_from_audio, AnalysisConfig, AnalysisFlag, Chart, Difficulty,
    EngineConfig, EngineError, Judgment, ManualTimeSource, Note, NoteKind, Outcome,
    Rank, RunConductor, RunState, ScheduledClock, StructureConfig, LANE_COUNT,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

const SAMPLE_RATE: u32 = 44100;

/// Decaying kick + tone + hat bursts every `interval` seconds
fn click_track(duration: f32, interval: f32) -> Vec<f32> {
    let sr = SAMPLE_RATE as f32;
    let len = (duration * sr) as usize;
    let mut samples = vec![0.0f32; len];
    let burst = (0.08 * sr) as usize;
    let step = (interval * sr) as usize;
    let mut pos = (0.25 * sr) as usize;
    while pos < len {
        for i in 0..burst.min(len - pos) {
            let t = i as f32 / sr;
            let env = (-t * 40.0).exp();
            let kick = (2.0 * std::f32::consts::PI * 80.0 * t).sin();
            let tone = (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
            let hat = (2.0 * std::f32::consts::PI * 6000.0 * t).sin();
            samples[pos + i] = env * (0.5 * kick + 0.3 * tone + 0.2 * hat);
        }
        pos += step;
    }
    samples
}

/// Write `samples` as a 16-bit stereo WAV (both channels identical)
fn write_wav(path: &Path, samples: &[f32]) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(v)?;
        writer.write_sample(v)?;
    }
    writer.finalize()
}

fn conductor() -> RunConductor<ScheduledClock<ManualTimeSource>> {
    RunConductor::new(
        ScheduledClock::new(ManualTimeSource::new()),
        EngineConfig::default().timing,
    )
}

fn assert_chart_invariants(chart: &Chart) {
    for (i, note) in chart.notes.iter().enumerate() {
        assert_eq!(note.id, i as u32);
        assert!(note.lane < LANE_COUNT);
        assert!(note.time >= chart.intro, "note {} before intro", note.time);
        assert!(note.end_time() <= chart.chart_end, "note {} past end", note.time);
        assert!(!note.judged && !note.missed);
    }
    for pair in chart.notes.windows(2) {
        assert!(pair[0].time <= pair[1].time);
    }
    for lane in 0..LANE_COUNT {
        let notes: Vec<&Note> = chart.lane_notes(lane).collect();
        for pair in notes.windows(2) {
            assert!(
                pair[1].time > pair[0].end_time(),
                "lane {} overlap at {:.3}",
                lane,
                pair[1].time
            );
        }
    }
}

/// Flawless play: every input lands exactly on its target time
fn autoplay(
    conductor: &mut RunConductor<ScheduledClock<ManualTimeSource>>,
) -> Result<(), EngineError> {
    #[derive(Clone, Copy)]
    enum Input {
        Press(usize),
        Release(usize),
    }

    let chart = conductor
        .chart()
        .cloned()
        .ok_or_else(|| EngineError::InvalidState("no chart".to_string()))?;
    let perfect_s = chart.judge_windows.perfect / 1000.0;

    let mut inputs: Vec<(f64, Input)> = Vec::new();
    for note in &chart.notes {
        match note.kind {
            NoteKind::Tap => {
                inputs.push((note.time, Input::Press(note.lane)));
                inputs.push((note.time + 0.05, Input::Release(note.lane)));
            }
            NoteKind::Hold { end_time, .. } => {
                inputs.push((note.time, Input::Press(note.lane)));
                inputs.push((end_time, Input::Release(note.lane)));
            }
            NoteKind::Flick { .. } => {
                inputs.push((note.time, Input::Press(note.lane)));
                inputs.push((note.time + perfect_s, Input::Release(note.lane)));
                inputs.push((note.time + 2.0 * perfect_s, Input::Press(note.lane)));
                inputs.push((note.time + 2.0 * perfect_s + 0.02, Input::Release(note.lane)));
            }
        }
    }
    inputs.sort_by(|a, b| a.0.total_cmp(&b.0));

    conductor.start(0.0)?;
    let mut next = 0;
    let mut now = 0.0;
    while conductor.state() == RunState::Playing {
        now += 1.0 / 60.0;
        while next < inputs.len() && inputs[next].0 <= now {
            let (at, input) = inputs[next];
            conductor.clock().source().set(at);
            match input {
                Input::Press(lane) => {
                    conductor.press(lane)?;
                }
                Input::Release(lane) => {
                    conductor.release(lane)?;
                }
            }
            next += 1;
        }
        conductor.clock().source().set(now);
        conductor.tick();
    }
    Ok(())
}

#[test]
fn test_regular_onsets_give_half_second_period() {
    let onsets: Vec<f64> = (0..24).map(|i| 1.0 + i as f64 * 0.5).collect();
    let est = estimate_beat_period(&onsets, &AnalysisConfig::default()).unwrap();
    assert!((est.period - 0.5).abs() <= 0.025, "got {:.4}", est.period);
}

#[test]
fn test_analyze_click_track() {
    let samples = click_track(20.0, 0.5);
    let analysis = analyze_track(
        &samples,
        SAMPLE_RATE,
        3.6,
        &AnalysisConfig::default(),
        &StructureConfig::default(),
    )
    .unwrap();

    assert!((analysis.duration - 20.0).abs() < 1e-6);
    assert_eq!(analysis.metadata.frame_count, (samples.len() - 2048) / 512);
    assert!(!analysis.metadata.has_flag(AnalysisFlag::TempoFallback));
    assert!(
        (analysis.beat_period() - 0.5).abs() <= 0.03,
        "got {:.4}",
        analysis.beat_period()
    );
    assert!(analysis.downbeat_phase() >= 3.6);
}

#[test]
fn test_silence_uses_fallbacks() {
    let samples = vec![0.0f32; SAMPLE_RATE as usize * 10];
    let analysis = analyze_track(
        &samples,
        SAMPLE_RATE,
        3.6,
        &AnalysisConfig::default(),
        &StructureConfig::default(),
    )
    .unwrap();
    assert!(analysis.metadata.has_flag(AnalysisFlag::TempoFallback));
    assert!(analysis.metadata.has_flag(AnalysisFlag::SparseOnsets));
    assert_eq!(analysis.beat_period(), 0.5);
}

#[test]
fn test_empty_audio_rejected() {
    let err = analyze_track(&[], SAMPLE_RATE, 3.6, &AnalysisConfig::default(), &StructureConfig::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[test]
fn test_wav_to_chart_to_perfect_run() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("clicks.wav");
    write_wav(&wav, &click_track(40.0, 0.5)).unwrap();

    let audio = decoder::decode_file(&wav).unwrap();
    assert_eq!(audio.sample_rate, SAMPLE_RATE);
    assert_eq!(audio.channels.len(), 2);

    let config = EngineConfig::default();
    for difficulty in Difficulty::ALL {
        let mut rng = StdRng::seed_from_u64(2024);
        let chart = generate_chart_from_audio("clicks", &audio, difficulty, &config, &mut rng).unwrap();
        assert!(chart.is_playable(), "{} chart is empty", difficulty);
        assert_chart_invariants(&chart);
        if difficulty == Difficulty::Easy {
            assert!(chart.notes.iter().all(|n| !n.is_flick()));
        }

        let path = dir.path().join(format!("{}.json", difficulty));
        chart_file::write_chart(&chart, &path).unwrap();

        let mut c = conductor();
        c.load_chart_file(&path).unwrap();
        assert_eq!(c.chart().unwrap().notes, chart.notes);

        autoplay(&mut c).unwrap();
        assert_eq!(c.state(), RunState::Finished);
        let result = c.last_result().unwrap();
        assert!(result.completed);
        assert_eq!(result.counts.miss, 0, "{} run missed notes", difficulty);
        assert_eq!(result.counts.empty, 0);
        assert_eq!(result.counts.good + result.counts.great, 0);
        assert!(result.rate > 99.0, "rate {:.2}", result.rate);
        assert_eq!(result.rank, Rank::S);
    }
}

#[test]
fn test_same_seed_same_chart() {
    let samples = click_track(25.0, 0.5);
    let config = EngineConfig::default();
    let generate = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        abyssal_groove::generate_chart("x", &samples, SAMPLE_RATE, Difficulty::Hard, &config, &mut rng)
            .unwrap()
    };
    assert_eq!(generate(9).notes, generate(9).notes);
}

#[test]
fn test_hold_scenario() {
    let chart = Chart::new(
        "hold",
        &Difficulty::Normal.profile(),
        0.5,
        10.0,
        vec![Note::hold(0, 0, 3.6, 4.6)],
    );
    let mut c = conductor();
    c.load_chart(chart);
    c.start(0.0).unwrap();

    c.clock().source().set(3.62);
    let head = c.press(0).unwrap().unwrap();
    assert_eq!(head.outcome, Outcome::Hit(Judgment::Perfect));

    c.clock().source().set(4.70);
    let tail = c.release(0).unwrap().unwrap();
    assert_eq!(tail.outcome, Outcome::Hit(Judgment::Great));
    assert_eq!(c.engine().unwrap().session().combo, 2);
    assert!(c.engine().unwrap().notes()[0].judged);
}

#[test]
fn test_empty_press_scenario() {
    let chart = Chart::new(
        "empty",
        &Difficulty::Normal.profile(),
        0.5,
        10.0,
        vec![Note::tap(0, 1, 6.0)],
    );
    let mut c = conductor();
    c.load_chart(chart);
    c.start(0.0).unwrap();
    c.clock().source().set(2.0);
    let ev = c.press(1).unwrap().unwrap();
    assert_eq!(ev.outcome, Outcome::EmptyPress);
    let session = c.engine().unwrap().session();
    assert_eq!(session.score, -400);
    assert_eq!(session.combo, 0);
    assert_eq!(session.denominator, 0.0);
}

#[test]
fn test_empty_chart_loads_but_cannot_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(&path, r#"{"formatVersion": 1, "meta": {"title": "e", "difficulty": "easy", "bpm": 100}, "notes": []}"#)
        .unwrap();

    let mut c = conductor();
    c.load_chart_file(&path).unwrap();
    assert_eq!(c.state(), RunState::Idle);
    assert!(!c.can_start());
    assert!(matches!(c.start(0.0), Err(EngineError::InvalidState(_))));
}

#[test]
fn test_malformed_file_keeps_active_chart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"meta": {"title": "bad"}}"#).unwrap();

    let mut c = conductor();
    c.load_chart(Chart::new(
        "good",
        &Difficulty::Normal.profile(),
        0.5,
        10.0,
        vec![Note::tap(0, 0, 5.0)],
    ));
    let err = c.load_chart_file(&path).unwrap_err();
    assert!(matches!(err, EngineError::ChartFormat(_)));
    assert_eq!(c.chart().unwrap().meta.title, "good");
    assert!(c.can_start());
}
