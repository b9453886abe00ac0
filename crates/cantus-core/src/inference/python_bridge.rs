//! Python bridge for the speech and music models
//!
//! The capability check runs the helper script once: a JSON request goes to
//! stdin and a single JSON object comes back on stdout. A loaded model owns a
//! helper started with `--serve`, which keeps the model in memory and answers
//! one JSON line per request for as long as the model stays cached. Audio
//! arrives as base64 encoded little-endian floats together with its dtype and
//! shape.

use base64::Engine;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::audio::RawSamples;
use crate::config::StudioConfig;
use crate::error::{Error, Result};
use crate::model::{
    Capabilities, CapabilityProbe, MusicKey, MusicLoader, MusicModel, SpeechLoader, SpeechModel,
    VoiceKey,
};

/// Request sent to the helper script
#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeRequest<'a> {
    Check,
    LoadSpeech {
        language: &'a str,
        model_id: &'a str,
    },
    LoadMusic {
        model_size: &'a str,
        device: &'a str,
    },
    Tts {
        language: &'a str,
        model_id: &'a str,
        speaker: &'a str,
        text: &'a str,
        sample_rate: u32,
    },
    Music {
        model_size: &'a str,
        device: &'a str,
        prompt: &'a str,
        duration: u32,
    },
}

/// Response from the helper script
#[derive(Debug, Default, Deserialize)]
pub struct BridgeResponse {
    pub status: Option<String>,
    pub error: Option<String>,
    pub speech: Option<bool>,
    pub music: Option<bool>,
    pub samples_base64: Option<String>,
    pub dtype: Option<String>,
    pub shape: Option<Vec<usize>>,
}

impl BridgeResponse {
    /// Decode the sample payload into a host buffer.
    pub fn samples(&self) -> Result<RawSamples> {
        let payload = self
            .samples_base64
            .as_deref()
            .ok_or_else(|| Error::InferenceError("No audio in response".to_string()))?;
        let dtype = self.dtype.as_deref().unwrap_or("float32");
        let shape = self
            .shape
            .as_deref()
            .ok_or_else(|| Error::InferenceError("No shape in response".to_string()))?;
        decode_samples(payload, dtype, shape)
    }
}

/// Decode base64 little-endian floats of `dtype` into an array of `shape`.
///
/// A dtype other than `float32`/`float64` or a payload whose length does not
/// match the shape is malformed model output and reported as an
/// `EncodingError`.
pub fn decode_samples(payload: &str, dtype: &str, shape: &[usize]) -> Result<RawSamples> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::InferenceError(format!("Failed to decode audio: {}", e)))?;

    let expected: usize = shape.iter().product();
    let width = match dtype {
        "float32" => 4,
        "float64" => 8,
        other => {
            return Err(Error::EncodingError(format!(
                "unsupported sample dtype {:?}",
                other
            )))
        }
    };
    if bytes.len() != expected * width {
        return Err(Error::EncodingError(format!(
            "{} bytes of {} do not fill shape {:?}",
            bytes.len(),
            dtype,
            shape
        )));
    }

    let shape = IxDyn(shape);
    let samples = match width {
        4 => {
            let values: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            RawSamples::F32(
                ArrayD::from_shape_vec(shape, values)
                    .map_err(|e| Error::EncodingError(e.to_string()))?,
            )
        }
        _ => {
            let values: Vec<f64> = bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            RawSamples::F64(
                ArrayD::from_shape_vec(shape, values)
                    .map_err(|e| Error::EncodingError(e.to_string()))?,
            )
        }
    };
    Ok(samples)
}

/// Bridge to the Python helper that hosts the pretrained models
#[derive(Debug, Clone)]
pub struct PythonBridge {
    python_cmd: String,
    script_path: PathBuf,
    hub_dir: PathBuf,
}

impl PythonBridge {
    pub fn new(python_cmd: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            python_cmd: python_cmd.into(),
            script_path: script_path.into(),
            hub_dir: std::env::temp_dir().join("cantus-hub"),
        }
    }

    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            python_cmd: config.python_cmd.clone(),
            script_path: config.script_path.clone(),
            hub_dir: config.hub_dir.clone(),
        }
    }

    pub fn with_hub_dir(mut self, hub_dir: impl Into<PathBuf>) -> Self {
        self.hub_dir = hub_dir.into();
        self
    }

    /// Run one command and return its response, turning a reported error
    /// into `InferenceError`.
    pub fn call(&self, request: &BridgeRequest<'_>) -> Result<BridgeResponse> {
        let request_json = serde_json::to_string(request)?;
        let response = self.call_python(&request_json)?;
        if let Some(err) = &response.error {
            return Err(Error::InferenceError(format!("Python model error: {}", err)));
        }
        Ok(response)
    }

    fn call_python(&self, request_json: &str) -> Result<BridgeResponse> {
        let mut child = Command::new(&self.python_cmd)
            .arg(&self.script_path)
            .env("TORCH_HOME", &self.hub_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::InferenceError(format!("Failed to start Python: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(format!("{}\n", request_json).as_bytes())
                .map_err(|e| Error::InferenceError(format!("Failed to write to Python: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::InferenceError(format!("Python process failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::InferenceError(format!("Python error: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);

        // Model libraries print progress and warnings to stdout
        let json_str = stdout
            .lines()
            .rev()
            .find(|line| line.trim().starts_with('{'))
            .unwrap_or(&stdout);

        parse_response(json_str)
    }
}

fn parse_response(json_str: &str) -> Result<BridgeResponse> {
    debug!("Python response: {} bytes", json_str.len());
    serde_json::from_str(json_str)
        .map_err(|e| Error::InferenceError(format!("Failed to parse Python response: {}", e)))
}

/// A running `--serve` helper with its pipes held open
struct HelperSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl HelperSession {
    fn spawn(bridge: &PythonBridge) -> Result<Self> {
        let mut child = Command::new(&bridge.python_cmd)
            .arg(&bridge.script_path)
            .arg("--serve")
            .env("TORCH_HOME", &bridge.hub_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::InferenceError(format!("Failed to start Python: {}", e)))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => {
                info!("Started Python model helper (pid {})", child.id());
                Ok(Self {
                    child,
                    stdin,
                    stdout: BufReader::new(stdout),
                })
            }
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::InferenceError(
                    "Python helper pipes are unavailable".to_string(),
                ))
            }
        }
    }

    /// Send one request line and read lines until the JSON response.
    fn exchange(&mut self, request_json: &str) -> Result<BridgeResponse> {
        writeln!(self.stdin, "{}", request_json)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| Error::InferenceError(format!("Failed to write to Python: {}", e)))?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .stdout
                .read_line(&mut line)
                .map_err(|e| Error::InferenceError(format!("Failed to read from Python: {}", e)))?;
            if read == 0 {
                return Err(Error::InferenceError(
                    "Python helper exited before answering".to_string(),
                ));
            }
            let trimmed = line.trim();
            if trimmed.starts_with('{') {
                return parse_response(trimmed);
            }
            debug!("Python: {}", trimmed);
        }
    }
}

impl Drop for HelperSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A model held by a long-lived helper process.
///
/// The helper is restarted, and the model loaded again, after it dies or
/// stops speaking the protocol.
struct HelperModel {
    bridge: PythonBridge,
    load_request: String,
    session: Mutex<Option<HelperSession>>,
}

impl HelperModel {
    fn open(bridge: &PythonBridge, load: &BridgeRequest<'_>) -> Result<Self> {
        let load_request = serde_json::to_string(load)?;
        let session = Self::start(bridge, &load_request)
            .map_err(|e| Error::ModelLoadError(e.to_string()))?;
        Ok(Self {
            bridge: bridge.clone(),
            load_request,
            session: Mutex::new(Some(session)),
        })
    }

    fn start(bridge: &PythonBridge, load_request: &str) -> Result<HelperSession> {
        let mut session = HelperSession::spawn(bridge)?;
        let response = session.exchange(load_request)?;
        if let Some(err) = &response.error {
            return Err(Error::InferenceError(format!("Python model error: {}", err)));
        }
        Ok(session)
    }

    fn run(&self, request: &BridgeRequest<'_>) -> Result<RawSamples> {
        let request_json = serde_json::to_string(request)?;
        let mut slot = self
            .session
            .lock()
            .map_err(|_| Error::InferenceError("Python helper lock poisoned".to_string()))?;

        if slot.is_none() {
            warn!("Restarting Python model helper");
            *slot = Some(Self::start(&self.bridge, &self.load_request)?);
        }
        let outcome = slot.as_mut().map(|session| session.exchange(&request_json));
        let response = match outcome {
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                *slot = None;
                return Err(e);
            }
            None => {
                return Err(Error::InferenceError(
                    "Python helper is not running".to_string(),
                ))
            }
        };
        drop(slot);

        if let Some(err) = &response.error {
            return Err(Error::InferenceError(format!("Python model error: {}", err)));
        }
        response.samples()
    }
}

impl CapabilityProbe for PythonBridge {
    fn probe(&self) -> Result<Capabilities> {
        let response = self.call(&BridgeRequest::Check)?;
        if response.status.as_deref() != Some("ok") {
            warn!("Python check returned status {:?}", response.status);
        }
        Ok(Capabilities {
            speech: response.speech.unwrap_or(false),
            music: response.music.unwrap_or(false),
        })
    }
}

struct PythonSpeechModel {
    helper: HelperModel,
    voice: VoiceKey,
}

impl SpeechModel for PythonSpeechModel {
    fn synthesize(&self, text: &str, speaker: &str, sample_rate: u32) -> Result<RawSamples> {
        info!("Calling Python TTS for {} chars, speaker {}", text.len(), speaker);
        self.helper.run(&BridgeRequest::Tts {
            language: &self.voice.language,
            model_id: &self.voice.model_id,
            speaker,
            text,
            sample_rate,
        })
    }
}

impl SpeechLoader for PythonBridge {
    fn load(&self, voice: &VoiceKey) -> Result<Arc<dyn SpeechModel>> {
        let helper = HelperModel::open(
            self,
            &BridgeRequest::LoadSpeech {
                language: &voice.language,
                model_id: &voice.model_id,
            },
        )?;
        Ok(Arc::new(PythonSpeechModel {
            helper,
            voice: voice.clone(),
        }))
    }
}

struct PythonMusicModel {
    helper: HelperModel,
    key: MusicKey,
}

impl MusicModel for PythonMusicModel {
    fn generate(&self, prompt: &str, duration_secs: u32) -> Result<RawSamples> {
        info!("Calling Python music generation for {} s", duration_secs);
        self.helper.run(&BridgeRequest::Music {
            model_size: self.key.model_size.as_str(),
            device: self.key.device.as_str(),
            prompt,
            duration: duration_secs,
        })
    }
}

impl MusicLoader for PythonBridge {
    fn load(&self, key: &MusicKey) -> Result<Arc<dyn MusicModel>> {
        let helper = HelperModel::open(
            self,
            &BridgeRequest::LoadMusic {
                model_size: key.model_size.as_str(),
                device: key.device.as_str(),
            },
        )?;
        Ok(Arc::new(PythonMusicModel { helper, key: *key }))
    }
}
