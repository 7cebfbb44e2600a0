//! Play a saved chart with perfectly timed inputs and print the result
//!
//! ```text
//! cargo run --example autoplay -- <chart.json>
//! ```

use abyssal_groove::io::chart_file;
use abyssal_groove::{
    EngineConfig, ManualTimeSource, NoteKind, PlaybackClock, RunConductor, ScheduledClock,
};
use std::error::Error;

const FRAME_S: f64 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy)]
enum Input {
    Press(usize),
    Release(usize),
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: autoplay <chart.json>");
            std::process::exit(2);
        }
    };

    let chart = chart_file::read_chart(&path)?;
    let perfect_s = chart.judge_windows.perfect / 1000.0;

    // Inputs a flawless player would produce
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
                let second = note.time + 2.0 * perfect_s;
                inputs.push((note.time, Input::Press(note.lane)));
                inputs.push((note.time + perfect_s, Input::Release(note.lane)));
                inputs.push((second, Input::Press(note.lane)));
                inputs.push((second + 0.05, Input::Release(note.lane)));
            }
        }
    }
    inputs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let config = EngineConfig::default();
    let mut conductor = RunConductor::new(ScheduledClock::new(ManualTimeSource::new()), config.timing);
    conductor.load_chart(chart);
    conductor.start(0.0)?;

    let mut next = 0;
    while conductor.last_result().is_none() {
        let now = conductor.clock().position() + FRAME_S;
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

    if let Some(result) = conductor.last_result() {
        println!("Score:     {}", result.score);
        println!("Rate:      {:.2}%", result.rate);
        println!("Rank:      {}", result.rank);
        println!("Max combo: {}", result.max_combo);
        println!(
            "Perfect {} / Great {} / Good {} / Miss {}",
            result.counts.perfect, result.counts.great, result.counts.good, result.counts.miss
        );
    }
    Ok(())
}
