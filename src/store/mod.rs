use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use tokio::sync::oneshot;

pub mod repositories;
pub mod rows;

pub use rows::{ManualRow, PredictedRow, MANUAL_HEADER, PREDICTED_HEADER};

/// Which of the two append-only files a write goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Manual,
    Predicted,
}

impl StoreKind {
    fn header(&self) -> &'static str {
        match self {
            StoreKind::Manual => MANUAL_HEADER,
            StoreKind::Predicted => PREDICTED_HEADER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorePaths {
    pub data_dir: PathBuf,
    pub manual_file: PathBuf,
    pub predicted_file: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: impl Into<PathBuf>, manual_name: &str, predicted_name: &str) -> Self {
        let data_dir = data_dir.into();
        Self {
            manual_file: data_dir.join(manual_name),
            predicted_file: data_dir.join(predicted_name),
            data_dir,
        }
    }

    pub fn path_for(&self, kind: StoreKind) -> &Path {
        match kind {
            StoreKind::Manual => &self.manual_file,
            StoreKind::Predicted => &self.predicted_file,
        }
    }
}

/// File access owned by the store worker thread.
pub struct StoreFiles {
    paths: StorePaths,
}

impl StoreFiles {
    /// Appends one row, creating the directory and the header row on the
    /// first write to a file.
    pub fn append_row(&mut self, kind: StoreKind, line: &str) -> Result<()> {
        if line.contains(['\n', '\r']) {
            bail!("refusing to append a multi-line row");
        }

        fs::create_dir_all(&self.paths.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.paths.data_dir.display())
        })?;

        let path = self.paths.path_for(kind);
        // An empty file can be left behind by a failed first write.
        let needs_header = fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut payload = String::new();
        if needs_header {
            payload.push_str(kind.header());
            payload.push('\n');
        }
        payload.push_str(line);
        payload.push('\n');

        file.write_all(payload.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("failed to append to {}", path.display()))
    }

    /// Whole file contents, or `None` when nothing has been written yet.
    pub fn read_contents(&self, kind: StoreKind) -> Result<Option<String>> {
        let path = self.paths.path_for(kind);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("failed to read {}", path.display()))
    }
}

type StoreTask = Box<dyn FnOnce(&mut StoreFiles) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the append-only observation stores.
///
/// All file I/O runs on one dedicated thread, so appends are serialized and
/// never block the async runtime.
#[derive(Clone)]
pub struct ObservationStore {
    inner: Arc<StoreInner>,
    paths: Arc<StorePaths>,
}

impl ObservationStore {
    pub fn open(paths: StorePaths) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let paths_for_thread = paths.clone();

        let worker = thread::Builder::new()
            .name("affect-store".into())
            .spawn(move || {
                let init_result = check_data_dir(&paths_for_thread.data_dir);
                let failed = init_result.is_err();
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }
                if failed {
                    return;
                }

                let mut files = StoreFiles {
                    paths: paths_for_thread,
                };

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => task(&mut files),
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        info!("Observation store ready in {}", paths.data_dir.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            paths: Arc::new(paths),
        })
    }

    pub fn paths(&self) -> &StorePaths {
        self.paths.as_ref()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut StoreFiles) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |files| {
            let result = task(files);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }
}

/// The directory itself is created lazily on first write; an existing path
/// that is not a directory can never work, so it fails the open.
fn check_data_dir(data_dir: &Path) -> Result<()> {
    if data_dir.exists() && !data_dir.is_dir() {
        bail!("data path {} is not a directory", data_dir.display());
    }
    Ok(())
}
