//! Fetch and decode of viewer assets

use glbdash_client::ApiClient;
use glbdash_core::{Error, Result};
use glbdash_gpu::{GpuResources, SceneData};
use tokio::runtime::Handle;

use crate::viewer::{LoadTicket, ViewerSession};

/// A finished load, ready for [`ViewerSession::complete`](crate::ViewerSession::complete)
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: Result<SceneData>,
}

/// Downloads GLB assets through the backend client and decodes them on the
/// blocking pool
#[derive(Debug, Clone)]
pub struct AssetLoader {
    client: ApiClient,
}

impl AssetLoader {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn load(&self, url: &str) -> Result<SceneData> {
        let bytes = self.client.fetch_bytes(url).await?;
        tracing::debug!(%url, size = bytes.len(), "asset downloaded");
        tokio::task::spawn_blocking(move || SceneData::from_glb(&bytes))
            .await
            .map_err(|e| Error::Decode(format!("decode task failed: {}", e)))?
    }

    /// Load `ticket`'s URL on `runtime` and send the outcome to `completions`
    pub fn spawn(&self, runtime: &Handle, ticket: LoadTicket, completions: flume::Sender<LoadCompletion>) {
        let loader = self.clone();
        runtime.spawn(async move {
            let result = loader.load(ticket.url()).await;
            if completions.send(LoadCompletion { ticket, result }).is_err() {
                tracing::debug!("viewer closed before load finished");
            }
        });
    }
}

/// Loads started by a single-threaded host and picked up between frames.
///
/// The queue keeps its own sender, so any number of loads (initial load,
/// reloads after a failure) can be issued over its lifetime.
#[derive(Debug)]
pub struct LoadQueue {
    loader: AssetLoader,
    runtime: Handle,
    completions_tx: flume::Sender<LoadCompletion>,
    completions_rx: flume::Receiver<LoadCompletion>,
}

impl LoadQueue {
    pub fn new(loader: AssetLoader, runtime: Handle) -> Self {
        let (completions_tx, completions_rx) = flume::unbounded();
        Self {
            loader,
            runtime,
            completions_tx,
            completions_rx,
        }
    }

    /// Start loading `ticket`, if a session handed one out.
    ///
    /// Returns whether a load was started.
    pub fn request(&self, ticket: Option<LoadTicket>) -> bool {
        match ticket {
            Some(ticket) => {
                self.loader
                    .spawn(&self.runtime, ticket, self.completions_tx.clone());
                true
            }
            None => false,
        }
    }

    /// Deliver every finished load to `session` without blocking.
    ///
    /// Returns how many were accepted; stale completions are not counted.
    pub fn drain<R: GpuResources>(&self, session: &mut ViewerSession<R>) -> usize {
        self.completions_rx
            .try_iter()
            .map(|LoadCompletion { ticket, result }| session.complete(ticket, result))
            .filter(|accepted| *accepted)
            .count()
    }
}
