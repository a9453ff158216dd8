//! Audio and spoken feedback for command results
//!
//! Tones are generated sine blips; result messages are spoken by a worker
//! thread draining a queue, so the shell never blocks on playback. A None on
//! the queue is the shutdown sentinel.

use std::io::Cursor;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rodio::source::{SineWave, Source};
use rodio::{OutputStreamBuilder, Sink};

use crate::config::FeedbackConfig;

pub trait SpeechEngine: Send {
    /// Synthesize text to an encoded audio clip (anything rodio can decode).
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}

pub struct Feedback {
    enable_tone: bool,
    speech_tx: Option<flume::Sender<Option<String>>>,
    worker: Option<JoinHandle<()>>,
}

impl Feedback {
    pub fn new(config: &FeedbackConfig) -> Self {
        let (speech_tx, worker) = if config.enable_speech {
            let engine: Box<dyn SpeechEngine> = Box::new(HttpSpeech::new(config));
            let (tx, rx) = flume::unbounded::<Option<String>>();
            let handle = thread::spawn(move || speech_worker(rx, engine));
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };
        Self {
            enable_tone: config.enable_tone,
            speech_tx,
            worker,
        }
    }

    /// Play a short confirmation or error tone. Fire-and-forget.
    pub fn notify(&self, success: bool) {
        if !self.enable_tone {
            return;
        }
        let (freq, length) = tone_params(success);
        thread::spawn(move || {
            if let Err(e) = play_tone(freq, length) {
                eprintln!("Feedback tone failed: {e}");
            }
        });
    }

    /// Queue a message for the speech worker. Fire-and-forget.
    pub fn speak(&self, message: &str) {
        if let Some(tx) = &self.speech_tx {
            let _ = tx.send(Some(message.to_string()));
        }
    }

    /// Signal the speech worker to stop and wait for it.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.speech_tx.take() {
            let _ = tx.send(None);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// High short blip for success, lower and longer for failure.
fn tone_params(success: bool) -> (f32, Duration) {
    if success {
        (1000.0, Duration::from_millis(200))
    } else {
        (500.0, Duration::from_millis(400))
    }
}

fn play_tone(freq: f32, length: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let stream = OutputStreamBuilder::open_default_stream()?;
    let sink = Sink::connect_new(stream.mixer());
    sink.append(SineWave::new(freq).take_duration(length).amplify(0.4));
    sink.sleep_until_end();
    Ok(())
}

fn speech_worker(rx: flume::Receiver<Option<String>>, engine: Box<dyn SpeechEngine>) {
    while let Ok(Some(text)) = rx.recv() {
        let clip = match engine.synthesize(&text) {
            Ok(clip) => clip,
            Err(e) => {
                eprintln!("Speech synthesis failed: {e}");
                continue;
            }
        };
        if let Err(e) = play_clip(clip) {
            eprintln!("Speech playback failed: {e}");
        }
    }
}

fn play_clip(clip: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
    let stream = OutputStreamBuilder::open_default_stream()?;
    let sink = Sink::connect_new(stream.mixer());
    sink.append(rodio::Decoder::new(Cursor::new(clip))?);
    sink.sleep_until_end();
    Ok(())
}

// ============================================================================
// HTTP speech engine
// ============================================================================

struct HttpSpeech {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    voice: String,
    speed: f32,
}

impl HttpSpeech {
    fn new(config: &FeedbackConfig) -> Self {
        Self {
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            speed: config.speed,
        }
    }
}

impl SpeechEngine for HttpSpeech {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut req = self
            .http
            .post(format!("{}/audio/speech", self.endpoint))
            .json(&serde_json::json!({
                "model": self.model,
                "voice": self.voice,
                "input": text,
                "speed": self.speed,
                "response_format": "wav",
            }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send()?;
        if !resp.status().is_success() {
            return Err(format!("speech endpoint returned {}", resp.status()).into());
        }
        Ok(resp.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_tone_params() {
        assert_eq!(tone_params(true), (1000.0, Duration::from_millis(200)));
        assert_eq!(tone_params(false), (500.0, Duration::from_millis(400)));
    }

    /// Engine that records what it was asked to say and produces no audio.
    struct RecordingEngine {
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechEngine for RecordingEngine {
        fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            self.spoken.lock().unwrap().push(text.to_string());
            Err("no audio in tests".into())
        }
    }

    #[test]
    fn test_speech_worker_drains_until_sentinel() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let engine = Box::new(RecordingEngine {
            spoken: spoken.clone(),
        });
        let (tx, rx) = flume::unbounded();

        let handle = thread::spawn(move || speech_worker(rx, engine));
        tx.send(Some("Playback paused".to_string())).unwrap();
        tx.send(Some("Shuffle enabled".to_string())).unwrap();
        tx.send(None).unwrap();
        handle.join().unwrap();

        assert_eq!(
            *spoken.lock().unwrap(),
            vec!["Playback paused", "Shuffle enabled"]
        );
    }
}
