//! Microphone capture - cpal input stream feeding mono f32 frames

use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::Sender;

/// Quick probe used before attempting a capture.
pub fn input_available() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// Start audio capture - sends mono sample chunks to the channel and returns
/// the live stream together with its sample rate. Capture stops when the
/// stream is dropped.
pub fn start_capture(
    tx: Sender<Vec<f32>>,
) -> Result<(Stream, u32), Box<dyn std::error::Error + Send + Sync>> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or("No input device")?;
    let supported = device.default_input_config()?;
    let input_rate = supported.sample_rate() as usize;
    let channels = supported.channels() as usize;

    let stream = device.build_input_stream(
        &supported.config(),
        move |data: &[f32], _| {
            // Convert to mono
            let mono: Vec<f32> = if channels == 1 {
                data.to_vec()
            } else {
                data.chunks(channels)
                    .map(|c| c.iter().sum::<f32>() / channels as f32)
                    .collect()
            };
            let _ = tx.send(mono);
        },
        |err| eprintln!("Stream error: {}", err),
        None,
    )?;

    stream.play()?;
    Ok((stream, input_rate as u32))
}
