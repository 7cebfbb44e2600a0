//! Generate a chart from an audio file and save it as JSON
//!
//! ```text
//! cargo run --example generate_chart -- <audio file> [easy|normal|hard] [out.json] [seed]
//! ```

use abyssal_groove::io::{chart_file, decoder};
use abyssal_groove::{generate_chart_from_audio, Difficulty, EngineConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <audio file> [difficulty] [out.json] [seed]", args[0]);
        std::process::exit(2);
    }

    let input = Path::new(&args[1]);
    let difficulty: Difficulty = match args.get(2) {
        Some(name) => name.parse()?,
        None => Difficulty::Normal,
    };
    let output = args
        .get(3)
        .cloned()
        .unwrap_or_else(|| input.with_extension("chart.json").to_string_lossy().into_owned());
    let mut rng = match args.get(4) {
        Some(seed) => StdRng::seed_from_u64(seed.parse()?),
        None => StdRng::from_entropy(),
    };

    let audio = decoder::decode_file(input)?;
    let title = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());

    let chart = generate_chart_from_audio(&title, &audio, difficulty, &EngineConfig::default(), &mut rng)?;
    let summary = chart.summary();

    println!("{} [{}]", chart.meta.title, chart.meta.difficulty);
    println!("  BPM:      {:.1}", summary.bpm);
    println!("  Playable: {:.1}s", summary.playable_seconds);
    println!(
        "  Notes:    {} ({} taps, {} holds, {} flicks)",
        summary.total, summary.taps, summary.holds, summary.flicks
    );
    println!("  Perfect:  {:.0}", summary.perfect_score);

    chart_file::write_chart(&chart, &output)?;
    println!("Saved to {}", output);
    Ok(())
}
