//! Plays a WAV file through the simulated output in real time.
//!
//! A tokio interval stands in for the DMA-complete interrupt while the main
//! task feeds the file with non-blocking writes. Without a path argument a
//! one second 440 Hz tone is synthesized.
//!
//! Run with: cargo run --example play_wav -- [path/to/file.wav]
//!
//! Set `RUST_LOG=background_audio=debug` to watch format changes and
//! underflows.

use std::io::Cursor;
use std::time::Duration;

use background_audio::{SimulatedOutput, WavPlayer};
use tracing_subscriber::EnvFilter;

/// Samples transmitted per simulated interrupt.
const TICK_SAMPLES: usize = 441;

/// Scales a float sample in [-1.0, 1.0] to 16-bit PCM.
fn to_pcm16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

fn tone() -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for i in 0..44100 {
            let t = i as f32 / 44100.0;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.25;
            writer.write_sample(to_pcm16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let file = match std::env::args().nth(1) {
        Some(path) => {
            println!("Playing {path}");
            std::fs::read(path)?
        }
        None => {
            println!("Playing a synthesized 440 Hz tone");
            tone()?
        }
    };

    let device = SimulatedOutput::new();
    let player = WavPlayer::wav(device.clone());
    player.begin()?;

    // 441 samples every 10ms is real time at 44.1kHz
    let ticker = {
        let device = device.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                interval.tick().await;
                device.tick(TICK_SAMPLES);
            }
        })
    };

    let mut offset = 0;
    while offset < file.len() {
        let written = player.write(&file[offset..]);
        offset += written;
        if written == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    while !player.done() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // Let the device drain its queue
    tokio::time::sleep(Duration::from_millis(200)).await;

    ticker.abort();
    player.end();

    let stats = player.stats();
    println!("\nPlayback finished:");
    println!("  Sample rate:  {} Hz", player.sample_rate());
    println!("  Transmitted:  {} samples", device.transmitted().len());
    println!("  Frames:       {}", stats.frames);
    println!("  Underflows:   {}", stats.underflows);
    println!("  Shifts:       {}", stats.shifts);
    println!("  Errors:       {}", stats.errors);
    println!("  Dumps:        {}", stats.dumps);

    Ok(())
}
