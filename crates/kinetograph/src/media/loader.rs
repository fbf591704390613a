use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::LoadError;

/// Progress of a resource load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    /// Local paths the decoder should open.
    Ready(Vec<PathBuf>),
    Failed(LoadError),
}

/// Makes media resources available locally. Polled by the engine's prep
/// timer; implementations must not block in `poll`.
pub trait ResourceLoader: Send {
    /// Begins (or restarts) loading.
    fn start(&mut self);
    fn poll(&mut self) -> LoadStatus;
}

/// Resources that are already in place.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceLoader {
    resources: Vec<PathBuf>,
    started: bool,
}

impl StaticResourceLoader {
    pub fn new(resources: Vec<PathBuf>) -> Self {
        Self {
            resources,
            started: false,
        }
    }
}

impl ResourceLoader for StaticResourceLoader {
    fn start(&mut self) {
        self.started = true;
    }

    fn poll(&mut self) -> LoadStatus {
        if self.started {
            LoadStatus::Ready(self.resources.clone())
        } else {
            LoadStatus::Pending
        }
    }
}

/// Checks local files on a worker thread and reports back over a channel.
pub struct FileResourceLoader {
    paths: Vec<PathBuf>,
    rx: Option<Receiver<Result<Vec<PathBuf>, LoadError>>>,
    result: Option<LoadStatus>,
}

impl FileResourceLoader {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            rx: None,
            result: None,
        }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn start(&mut self) {
        self.rx = None;
        self.result = None;

        if self.paths.is_empty() {
            self.result = Some(LoadStatus::Failed(LoadError::Empty));
            return;
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let paths = self.paths.clone();
        let spawned = thread::Builder::new()
            .name("kinetograph-loader".into())
            .spawn(move || {
                let _ = tx.send(check_files(paths));
            });

        match spawned {
            Ok(_) => self.rx = Some(rx),
            Err(e) => {
                log::error!("Failed to spawn loader thread: {e}");
                self.result = Some(LoadStatus::Failed(LoadError::Other(e.to_string())));
            }
        }
    }

    fn poll(&mut self) -> LoadStatus {
        if let Some(result) = &self.result {
            return result.clone();
        }
        let Some(rx) = &self.rx else {
            return LoadStatus::Pending;
        };
        let status = match rx.try_recv() {
            Ok(Ok(paths)) => LoadStatus::Ready(paths),
            Ok(Err(e)) => LoadStatus::Failed(e),
            Err(TryRecvError::Empty) => return LoadStatus::Pending,
            Err(TryRecvError::Disconnected) => LoadStatus::Failed(LoadError::WorkerGone),
        };
        self.rx = None;
        self.result = Some(status.clone());
        status
    }
}

fn check_files(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, LoadError> {
    for path in &paths {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(path.clone()),
            _ => LoadError::Io {
                path: path.clone(),
                reason: e.to_string(),
            },
        })?;
        if !meta.is_file() {
            return Err(LoadError::Io {
                path: path.clone(),
                reason: "not a regular file".to_string(),
            });
        }
        if meta.len() == 0 {
            return Err(LoadError::Io {
                path: path.clone(),
                reason: "file is empty".to_string(),
            });
        }
        log::debug!("Resource ready: {} ({} bytes)", path.display(), meta.len());
    }
    Ok(paths)
}
