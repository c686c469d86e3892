//! Asset loading
//!
//! Loop assets are fetched and decoded off the control thread. Each request
//! resolves exactly once; a failure is handed back to the caller and never
//! retried.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::engine::{import_wav, AudioBuffer};
use crate::error::{MixerError, Result};
use crate::scheduler::ControlId;

/// Fetches and decodes one asset into PCM
pub trait AssetLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<AudioBuffer>;
}

/// Loads WAV files from disk, resampled to the engine rate
#[derive(Debug, Clone)]
pub struct WavAssetLoader {
    root: PathBuf,
    sample_rate: u32,
}

impl WavAssetLoader {
    pub fn new(root: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            root: root.into(),
            sample_rate,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an asset URL to a file path
    ///
    /// `file://` prefixes are stripped; relative paths resolve against the
    /// asset root.
    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetLoader for WavAssetLoader {
    fn load(&self, url: &str) -> Result<AudioBuffer> {
        let path = self.resolve(url);
        debug!(url, path = %path.display(), "Decoding asset");
        import_wav(&path, self.sample_rate)
    }
}

/// Serves pre-decoded buffers by URL
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLoader {
    assets: HashMap<String, AudioBuffer>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, buffer: AudioBuffer) {
        self.assets.insert(url.into(), buffer);
    }

    pub fn with_asset(mut self, url: impl Into<String>, buffer: AudioBuffer) -> Self {
        self.insert(url, buffer);
        self
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn load(&self, url: &str) -> Result<AudioBuffer> {
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| MixerError::AssetNotFound {
                url: url.to_string(),
                source: None,
            })
    }
}

/// One asset to fetch for a control
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub control: ControlId,
    pub url: String,
}

/// The single result observed for a `LoadRequest`
#[derive(Debug)]
pub struct LoadOutcome {
    pub control: ControlId,
    pub url: String,
    pub result: Result<Arc<AudioBuffer>>,
}

/// Load every request concurrently on the blocking pool
///
/// Outcomes come back in request order. A panicking or cancelled load task
/// becomes a `LoadTaskFailed` outcome for that control only.
pub async fn load_all<L>(loader: Arc<L>, requests: Vec<LoadRequest>) -> Vec<LoadOutcome>
where
    L: AssetLoader + ?Sized + 'static,
{
    let tasks: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let loader = Arc::clone(&loader);
            let url = request.url.clone();
            let handle = tokio::task::spawn_blocking(move || loader.load(&url));
            (request, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(tasks.len());
    for (request, handle) in tasks {
        let result = match handle.await {
            Ok(loaded) => loaded.map(Arc::new),
            Err(e) => Err(MixerError::LoadTaskFailed {
                reason: e.to_string(),
            }),
        };
        outcomes.push(LoadOutcome {
            control: request.control,
            url: request.url,
            result,
        });
    }
    outcomes
}
