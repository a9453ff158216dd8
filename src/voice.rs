//! Voice input - microphone capture with energy endpointing, transcription
//! over HTTP
//!
//! `listen()` blocks until one utterance is captured or a failure condition
//! is hit; run it on a worker thread. Callers get one of four distinct
//! failures: no microphone, no speech before the timeout, unintelligible
//! audio, or the transcription service being unreachable.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio;
use crate::config::VoiceConfig;

/// How much trailing silence ends an utterance.
const SILENCE_HOLD: Duration = Duration::from_millis(900);
/// Anything shorter than this is treated as noise, not speech.
const MIN_SPEECH: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Microphone not found or not accessible.")]
    NoMicrophone,
    #[error("No speech detected. Please try again.")]
    NoSpeech,
    #[error("Could not understand audio.")]
    Unintelligible,
    #[error("Speech recognition service unavailable.")]
    ServiceUnavailable,
    #[error("Audio capture failed: {0}")]
    Capture(String),
}

pub struct VoiceInput {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    phrase_limit: Duration,
    silence_threshold: f32,
}

impl VoiceInput {
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            phrase_limit: Duration::from_secs(config.phrase_limit_secs),
            silence_threshold: config.silence_threshold,
        }
    }

    /// Capture one spoken command and return its transcript, lowercased the
    /// way the recognizer in the command path expects.
    pub fn listen(&self) -> Result<String, VoiceError> {
        if !audio::input_available() {
            return Err(VoiceError::NoMicrophone);
        }

        let (samples, rate) = self.capture_utterance()?;
        let wav = encode_wav(&samples, rate);
        self.transcribe(wav)
    }

    /// Record until the speaker stops (or the phrase limit trips). The stream
    /// is dropped on return, which ends capture.
    fn capture_utterance(&self) -> Result<(Vec<f32>, u32), VoiceError> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let (stream, rate) =
            audio::start_capture(tx).map_err(|e| VoiceError::Capture(e.to_string()))?;

        let started = Instant::now();
        let mut samples: Vec<f32> = Vec::new();
        let mut speech_started: Option<Instant> = None;
        let mut last_speech = Instant::now();

        loop {
            let chunk = match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(chunk) => chunk,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if speech_started.is_none() && started.elapsed() >= self.timeout {
                        drop(stream);
                        return Err(VoiceError::NoSpeech);
                    }
                    continue;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    drop(stream);
                    return Err(VoiceError::Capture("input stream closed".into()));
                }
            };

            let loud = rms(&chunk) > self.silence_threshold;

            match speech_started {
                None => {
                    if loud {
                        speech_started = Some(Instant::now());
                        last_speech = Instant::now();
                        samples.extend_from_slice(&chunk);
                    } else if started.elapsed() >= self.timeout {
                        drop(stream);
                        return Err(VoiceError::NoSpeech);
                    }
                }
                Some(speech_start) => {
                    samples.extend_from_slice(&chunk);
                    if loud {
                        last_speech = Instant::now();
                    }

                    let done = last_speech.elapsed() >= SILENCE_HOLD
                        || speech_start.elapsed() >= self.phrase_limit;
                    if done {
                        drop(stream);
                        if speech_start.elapsed() < MIN_SPEECH {
                            return Err(VoiceError::NoSpeech);
                        }
                        return Ok((samples, rate));
                    }
                }
            }
        }
    }

    fn transcribe(&self, wav: Vec<u8>) -> Result<String, VoiceError> {
        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("command.wav")
            .mime_str("audio/wav")
            .map_err(|_| VoiceError::ServiceUnavailable)?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let mut req = self
            .http
            .post(format!("{}/audio/transcriptions", self.endpoint))
            .multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().map_err(|e| {
            eprintln!("Transcription request failed: {e}");
            VoiceError::ServiceUnavailable
        })?;
        if !resp.status().is_success() {
            eprintln!("Transcription service returned {}", resp.status());
            return Err(VoiceError::ServiceUnavailable);
        }

        let body: serde_json::Value = resp.json().map_err(|_| VoiceError::ServiceUnavailable)?;
        let text = body["text"].as_str().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(VoiceError::Unintelligible);
        }
        Ok(text.to_lowercase())
    }
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Minimal 16-bit PCM mono WAV encoding.
fn encode_wav(samples: &[f32], rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * 2).to_le_bytes()); // byte rate
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }

    out
}
