//! Reconstructor - background worker and its control surface.
//!
//! The `Reconstructor` owns the worker thread. The worker baselines the
//! directory monitor, runs once, then polls for changes until shutdown.
//! Runs never overlap: the worker and `reload()` share one run lock.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, error, info, warn};

use crate::config::ReconstructorConfig;
use crate::engine::ReconstructionEngine;
use crate::error::{FailureKind, ReconstructionError};
use crate::io::DirectoryMonitor;
use crate::map::LedMap3D;

use super::messages::MapUpdate;
use super::pipeline::Pipeline;
use super::shared_state::{SharedState, WorkerState};

/// Everything a run needs, shared by the worker thread and the owner.
struct WorkerContext {
    directory: PathBuf,
    pipeline: Pipeline,
    shared: Arc<SharedState>,
    update_sender: Sender<MapUpdate>,
}

impl WorkerContext {
    /// One serialised run: reconstruct, persist, publish.
    fn run(&self) -> Result<LedMap3D, ReconstructionError> {
        let _guard = self.shared.run_lock.lock();
        self.shared.begin_run();
        let started = Instant::now();

        let result = self.pipeline.reload(&self.directory);
        self.shared.end_run(result.is_ok());

        match result {
            Ok(output) => {
                let elapsed = started.elapsed();
                info!(
                    "Reconstruction finished in {:.2}s ({} views)",
                    elapsed.as_secs_f64(),
                    output.num_views
                );
                let update = MapUpdate {
                    map: output.map.clone(),
                    num_views: output.num_views,
                    elapsed,
                };
                match self.update_sender.try_send(update) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => debug!("[Worker] update channel full, dropping"),
                    Err(TrySendError::Disconnected(_)) => {}
                }
                Ok(output.map)
            }
            Err(e) => {
                log_failure(&e);
                Err(e)
            }
        }
    }

    /// A run that cannot take the worker down.
    fn run_guarded(&self) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.run())) {
            error!("Reconstruction run panicked: {}", panic_message(&*payload));
            self.shared.end_run(false);
        }
    }
}

fn log_failure(e: &ReconstructionError) {
    match e.kind() {
        FailureKind::InsufficientData | FailureKind::ReconstructionFailure => {
            info!("No map produced: {}", e)
        }
        FailureKind::ResourceFailure => warn!("Reconstruction failed: {}", e),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Background reconstruction of an observation directory.
pub struct Reconstructor {
    context: Arc<WorkerContext>,

    /// Kept so `updates()` can hand out clones.
    update_receiver: Receiver<MapUpdate>,

    poll_interval: Duration,

    worker_handle: Option<JoinHandle<()>>,
}

impl Reconstructor {
    /// Create a reconstructor for `directory`. Nothing runs until `start()`.
    pub fn new<P: Into<PathBuf>>(
        directory: P,
        config: ReconstructorConfig,
        engine: Arc<dyn ReconstructionEngine>,
    ) -> Self {
        let (update_sender, update_receiver) = bounded(config.update_channel_capacity.max(1));
        let poll_interval = config.poll_interval();

        let context = Arc::new(WorkerContext {
            directory: directory.into(),
            pipeline: Pipeline::new(config, engine),
            shared: SharedState::new(),
            update_sender,
        });

        Self {
            context,
            update_receiver,
            poll_interval,
            worker_handle: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.context.directory
    }

    pub fn config(&self) -> &ReconstructorConfig {
        self.context.pipeline.config()
    }

    /// Spawn the worker thread.
    pub fn start(&mut self) -> Result<()> {
        if self.worker_handle.is_some() {
            bail!("Reconstructor already started");
        }
        if self.context.shared.is_shutdown_requested() {
            bail!("Reconstructor was shut down");
        }

        let monitor = DirectoryMonitor::new(self.context.directory.clone());
        let context = self.context.clone();
        let poll_interval = self.poll_interval;

        let handle = thread::Builder::new()
            .name("led-sfm-worker".to_string())
            .spawn(move || run_worker(context, monitor, poll_interval))
            .context("Failed to spawn reconstruction worker")?;

        self.worker_handle = Some(handle);
        Ok(())
    }

    /// Ask the worker to stop. Returns immediately; the worker exits at its
    /// next check, after any run in progress.
    pub fn shutdown(&self) {
        self.context.shared.request_shutdown();
    }

    /// Wait for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                error!("Reconstruction worker thread panicked");
                self.context.shared.mark_terminated();
            }
        }
    }

    /// Run synchronously in the caller's thread, regardless of changes.
    pub fn reload(&self) -> Result<LedMap3D, ReconstructionError> {
        self.context.run()
    }

    pub fn state(&self) -> WorkerState {
        self.context.shared.state()
    }

    /// Receiver of map updates. All clones share the same queue.
    pub fn updates(&self) -> Receiver<MapUpdate> {
        self.update_receiver.clone()
    }

    pub fn runs_attempted(&self) -> usize {
        self.context.shared.runs_attempted()
    }

    pub fn runs_succeeded(&self) -> usize {
        self.context.shared.runs_succeeded()
    }
}

impl Drop for Reconstructor {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}

/// Worker loop. Runs once up front, then on every detected change.
fn run_worker(context: Arc<WorkerContext>, mut monitor: DirectoryMonitor, poll_interval: Duration) {
    info!(
        "Reconstruction worker watching {} ({} observation maps)",
        context.directory.display(),
        monitor.num_files()
    );

    context.run_guarded();

    loop {
        if context.shared.is_shutdown_requested() {
            break;
        }
        thread::sleep(poll_interval);
        if context.shared.is_shutdown_requested() {
            break;
        }

        if monitor.has_changed() {
            info!("Observation maps changed, reconstructing");
            context.run_guarded();
        }
    }

    context.shared.mark_terminated();
    info!(
        "Reconstruction worker stopped after {} runs",
        context.shared.runs_attempted()
    );
}
