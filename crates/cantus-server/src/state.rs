//! Application state management

use cantus_core::model::{MusicLoader, SpeechLoader};
use cantus_core::{Capabilities, MusicGenerator, SpeechSynthesizer, StudioConfig, WaveformWriter};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Ids kept before the oldest generated file is forgotten
pub const DEFAULT_OUTPUT_LIMIT: usize = 4096;

/// Generated files by id, oldest first
#[derive(Default)]
struct OutputRegistry {
    paths: HashMap<Uuid, PathBuf>,
    order: VecDeque<Uuid>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub studio: Arc<StudioConfig>,
    pub capabilities: Capabilities,
    pub speech: Arc<SpeechSynthesizer>,
    pub music: Arc<MusicGenerator>,
    /// Files generated by this process, served back by id
    outputs: Arc<RwLock<OutputRegistry>>,
    output_limit: usize,
}

impl AppState {
    pub fn new(
        studio: StudioConfig,
        capabilities: Capabilities,
        speech_loader: Arc<dyn SpeechLoader>,
        music_loader: Arc<dyn MusicLoader>,
    ) -> Self {
        let writer = WaveformWriter::from_config(&studio);
        Self {
            speech: Arc::new(SpeechSynthesizer::new(
                speech_loader,
                writer.clone(),
                capabilities,
            )),
            music: Arc::new(MusicGenerator::new(music_loader, writer, capabilities)),
            studio: Arc::new(studio),
            capabilities,
            outputs: Arc::new(RwLock::new(OutputRegistry::default())),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Keep at most `limit` generated files addressable.
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit.max(1);
        self
    }

    /// Remember a generated file and return the id it is served under.
    ///
    /// Past the limit the oldest id is forgotten. Its file stays on disk.
    pub async fn register_output(&self, path: PathBuf) -> Uuid {
        let id = Uuid::new_v4();
        let mut outputs = self.outputs.write().await;
        outputs.paths.insert(id, path);
        outputs.order.push_back(id);
        while outputs.order.len() > self.output_limit {
            if let Some(oldest) = outputs.order.pop_front() {
                outputs.paths.remove(&oldest);
            }
        }
        id
    }

    pub async fn output_path(&self, id: &Uuid) -> Option<PathBuf> {
        self.outputs.read().await.paths.get(id).cloned()
    }

    /// Drop an id whose file has gone away.
    pub async fn forget_output(&self, id: &Uuid) {
        let mut outputs = self.outputs.write().await;
        if outputs.paths.remove(id).is_some() {
            outputs.order.retain(|kept| kept != id);
        }
    }

    pub async fn output_count(&self) -> usize {
        self.outputs.read().await.paths.len()
    }
}
