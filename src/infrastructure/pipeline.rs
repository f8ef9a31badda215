//! Worker/coordinator dispatch for background thumbnail generation.
//!
//! [`AsyncPipeline::run_async`] runs a generation closure on the blocking
//! worker pool and marshals its result back as a boxed delivery closure
//! on an unbounded channel. The [`Coordinator`] owns the receiving end
//! and is driven by the thread that owns all provider state; deliveries
//! and consumer callbacks only ever run there.

use tokio::sync::mpsc;
use tracing::debug;

type Delivery = Box<dyn FnOnce() + Send>;

/// Handle for scheduling background generation.
///
/// Cheap to clone; every clone feeds the same [`Coordinator`].
#[derive(Clone)]
pub struct AsyncPipeline {
    tx: mpsc::UnboundedSender<Delivery>,
    runtime: tokio::runtime::Handle,
}

impl AsyncPipeline {
    /// Creates a pipeline and its coordinator.
    ///
    /// Must be called within a tokio runtime; the current runtime handle
    /// is captured for spawning workers.
    #[must_use]
    pub fn new() -> (Self, Coordinator) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Self {
            tx,
            runtime: tokio::runtime::Handle::current(),
        };
        (pipeline, Coordinator { rx })
    }

    /// Runs `generate` on a parallel worker, then schedules
    /// `on_ready(result)` on the coordinating thread.
    ///
    /// For one call, `on_ready` strictly follows completion of
    /// `generate`; no ordering holds between distinct calls. There is no
    /// cancellation: a scheduled generation always runs to completion,
    /// and it is the delivery closure's job to no-op when its originating
    /// provider is gone.
    pub fn run_async<T, G, R>(&self, generate: G, on_ready: R)
    where
        T: Send + 'static,
        G: FnOnce() -> T + Send + 'static,
        R: FnOnce(T) + Send + 'static,
    {
        let tx = self.tx.clone();
        self.runtime.spawn_blocking(move || {
            let result = generate();
            // The coordinator may be gone during shutdown; the rendered
            // result is simply discarded then.
            let _ = tx.send(Box::new(move || on_ready(result)));
        });
    }

    /// Schedules a closure directly on the coordinating thread.
    pub fn on_main(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Box::new(task));
    }
}

impl std::fmt::Debug for AsyncPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPipeline").finish_non_exhaustive()
    }
}

/// Receiving side of the pipeline, owned by the coordinating thread.
pub struct Coordinator {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Coordinator {
    /// Waits for the next delivery and applies it.
    ///
    /// Returns `false` once every pipeline handle has been dropped and
    /// the queue is drained.
    pub async fn turn(&mut self) -> bool {
        match self.rx.recv().await {
            Some(delivery) => {
                delivery();
                true
            }
            None => false,
        }
    }

    /// Applies every delivery already queued, without waiting.
    ///
    /// For embedding into an existing event loop tick. Returns how many
    /// deliveries ran.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            delivery();
            applied += 1;
        }
        applied
    }

    /// Runs deliveries until every pipeline handle is dropped.
    pub async fn run(mut self) {
        while self.turn().await {}
        debug!("thumbnail coordinator stopped");
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}
