//! Text-to-speech adapter

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::cache::ModelCache;
use super::capabilities::{Capabilities, Capability};
use super::run_blocking;
use crate::audio::{ChannelLayout, RawSamples, WaveformWriter, TTS_SAMPLE_RATE};
use crate::config::SpeechDefaults;
use crate::error::{Error, Result};

/// Identifies one loaded speech model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceKey {
    pub language: String,
    pub model_id: String,
}

/// A loaded speech model
pub trait SpeechModel: Send + Sync {
    /// Synthesize `text` with `speaker`, returning host-resident samples.
    fn synthesize(&self, text: &str, speaker: &str, sample_rate: u32) -> Result<RawSamples>;
}

/// Loads speech models; called once per [`VoiceKey`]
pub trait SpeechLoader: Send + Sync {
    fn load(&self, voice: &VoiceKey) -> Result<Arc<dyn SpeechModel>>;
}

/// A single speech synthesis request
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
    pub model_id: String,
    /// Voice within the model, chosen per call
    pub speaker: String,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, defaults: &SpeechDefaults) -> Self {
        Self {
            text: text.into(),
            language: defaults.language.clone(),
            model_id: defaults.model_id.clone(),
            speaker: defaults.speaker.clone(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self
    }

    pub fn voice_key(&self) -> VoiceKey {
        VoiceKey {
            language: self.language.clone(),
            model_id: self.model_id.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidInput("text is empty".to_string()));
        }
        if self.language.is_empty() || self.model_id.is_empty() || self.speaker.is_empty() {
            return Err(Error::InvalidInput(
                "language, model_id and speaker must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns text into a 48 kHz WAV file
pub struct SpeechSynthesizer {
    loader: Arc<dyn SpeechLoader>,
    models: ModelCache<VoiceKey, dyn SpeechModel>,
    writer: WaveformWriter,
    capabilities: Capabilities,
}

impl SpeechSynthesizer {
    pub fn new(
        loader: Arc<dyn SpeechLoader>,
        writer: WaveformWriter,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            loader,
            models: ModelCache::new(),
            writer,
            capabilities,
        }
    }

    pub fn is_available(&self) -> bool {
        self.capabilities.is_available(Capability::Speech)
    }

    pub fn models(&self) -> &ModelCache<VoiceKey, dyn SpeechModel> {
        &self.models
    }

    /// Synthesize `request` and return the path of the written WAV file.
    pub async fn synthesize(&self, request: &SpeechRequest) -> Result<PathBuf> {
        self.capabilities.require(Capability::Speech)?;
        request.validate()?;

        let key = request.voice_key();
        let model = self
            .models
            .get_or_create(key.clone(), || {
                let loader = self.loader.clone();
                async move {
                    info!("Loading speech model {} ({})", key.model_id, key.language);
                    run_blocking("speech model load", move || loader.load(&key))
                        .await
                        .map_err(|e| match e {
                            Error::ModelLoadError(_) => e,
                            other => Error::ModelLoadError(other.to_string()),
                        })
                }
            })
            .await?;

        let text = request.text.clone();
        let speaker = request.speaker.clone();
        let samples = run_blocking("speech synthesis", move || {
            model.synthesize(&text, &speaker, TTS_SAMPLE_RATE)
        })
        .await?;

        debug!(
            "Speech model returned {} buffer of shape {:?}",
            samples.dtype(),
            samples.shape()
        );

        let writer = self.writer.clone();
        run_blocking("speech write", move || {
            writer.write_raw(&samples, TTS_SAMPLE_RATE, ChannelLayout::FramesFirst)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct SineModel {
        speakers: Mutex<Vec<String>>,
    }

    impl SpeechModel for SineModel {
        fn synthesize(&self, text: &str, speaker: &str, sample_rate: u32) -> Result<RawSamples> {
            self.speakers.lock().unwrap().push(speaker.to_string());
            let len = text.len() * (sample_rate as usize / 1000);
            let samples: Vec<f64> = (0..len).map(|i| (i as f64 * 0.01).sin() * 0.5).collect();
            Ok(RawSamples::F64(
                ArrayD::from_shape_vec(IxDyn(&[len]), samples).unwrap(),
            ))
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        fail: bool,
        model: Arc<SineModel>,
    }

    impl CountingLoader {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                fail,
                model: Arc::new(SineModel {
                    speakers: Mutex::new(Vec::new()),
                }),
            })
        }
    }

    impl SpeechLoader for CountingLoader {
        fn load(&self, voice: &VoiceKey) -> Result<Arc<dyn SpeechModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::ModelLoadError(format!("{} unavailable", voice.model_id)));
            }
            Ok(self.model.clone())
        }
    }

    #[tokio::test]
    async fn writes_mono_wav_at_speech_rate() {
        let dir = tempdir().unwrap();
        let loader = CountingLoader::new(false);
        let synth = SpeechSynthesizer::new(
            loader.clone(),
            WaveformWriter::new().in_dir(dir.path()),
            Capabilities::all(),
        );
        let request = SpeechRequest::new("Hello", &SpeechDefaults::default());

        let path = synth.synthesize(&request).await.unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, TTS_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.duration(), 5 * 48);

        synth.synthesize(&request.clone().with_speaker("en_3")).await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            *loader.model.speakers.lock().unwrap(),
            vec!["en_0".to_string(), "en_3".to_string()]
        );

        synth
            .synthesize(&request.with_language("it").with_model_id("v3_it"))
            .await
            .unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert_eq!(synth.models().len().await, 2);
    }

    #[tokio::test]
    async fn missing_capability_skips_loading() {
        let loader = CountingLoader::new(false);
        let synth = SpeechSynthesizer::new(
            loader.clone(),
            WaveformWriter::new(),
            Capabilities::none(),
        );
        assert!(!synth.is_available());

        let request = SpeechRequest::new("Hello", &SpeechDefaults::default());
        let err = synth.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, Error::CapabilityUnavailable(_)));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_text_is_invalid_input() {
        let synth = SpeechSynthesizer::new(
            CountingLoader::new(false),
            WaveformWriter::new(),
            Capabilities::all(),
        );
        let request = SpeechRequest::new("   ", &SpeechDefaults::default());
        let err = synth.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn load_failures_propagate_and_retry() {
        let loader = CountingLoader::new(true);
        let synth = SpeechSynthesizer::new(
            loader.clone(),
            WaveformWriter::new(),
            Capabilities::all(),
        );
        let request = SpeechRequest::new("Hello", &SpeechDefaults::default());

        for _ in 0..2 {
            let err = synth.synthesize(&request).await.unwrap_err();
            assert!(matches!(err, Error::ModelLoadError(_)));
        }
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }
}
