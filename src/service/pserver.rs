use std::sync::Arc;

use log::{debug, info};
use tokio::{
    sync::{
        Mutex as AsyncMutex,
        mpsc::{self, Receiver, UnboundedSender},
        watch,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{ParamServer, aggregation::AggregationService};
use crate::{
    aggregation::Aggregator,
    distribution,
    error::{AggregateErr, ConfigErr, Result, ServerErr, ServiceErr},
    metrics::{Instrumentation, NoInstrumentation},
    params::{Gradient, ParameterCollection},
    specs::Protocol,
    synchronization::Synchronizer,
};

/// The central server structure, it collects the workers' gradients and hands them back updated
/// models following the configured `Protocol`.
///
/// All the model updates happen in a single background task, this structure only owns the
/// endpoints to talk to it.
pub struct ParameterServer {
    workers: usize,
    protocol: Protocol,
    aggregator: Aggregator,
    gradients: UnboundedSender<Gradient>,
    models: Box<[AsyncMutex<Receiver<ParameterCollection>>]>,
    published: watch::Receiver<Arc<ParameterCollection>>,
    cancel: CancellationToken,
    closing: CancellationToken,
    service: AsyncMutex<Option<JoinHandle<std::result::Result<(), ServiceErr>>>>,
}

impl ParameterServer {
    /// Creates a new `ParameterServer` and starts it's aggregation service.
    ///
    /// # Arguments
    /// * `model` - The initial model, broadcast to every worker before the service starts.
    /// * `aggregator` - The bound aggregation function.
    /// * `protocol` - The consistency protocol.
    /// * `workers` - The amount of workers.
    ///
    /// # Returns
    /// A new `ParameterServer` or `ConfigErr::NoWorkers` if `workers` is zero.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn new(
        model: ParameterCollection,
        aggregator: Aggregator,
        protocol: Protocol,
        workers: usize,
    ) -> Result<Self> {
        Self::with_instrumentation(model, aggregator, protocol, workers, Arc::new(NoInstrumentation))
    }

    /// Same as `new` but with timing hooks around every aggregation and broadcast.
    ///
    /// # Arguments
    /// * `model` - The initial model, broadcast to every worker before the service starts.
    /// * `aggregator` - The bound aggregation function.
    /// * `protocol` - The consistency protocol.
    /// * `workers` - The amount of workers.
    /// * `instrumentation` - The timing hooks.
    ///
    /// # Returns
    /// A new `ParameterServer` or `ConfigErr::NoWorkers` if `workers` is zero.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn with_instrumentation(
        model: ParameterCollection,
        aggregator: Aggregator,
        protocol: Protocol,
        workers: usize,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(ConfigErr::NoWorkers.into());
        }

        let (gradients_tx, gradients_rx) = mpsc::unbounded_channel();
        let (channels, receivers) = distribution::model_channels(workers, Arc::clone(&instrumentation));

        // Every worker's first pull must succeed without waiting on a round.
        channels.seed(&model)?;

        let model = Arc::new(model);
        let (published_tx, published_rx) = watch::channel(Arc::clone(&model));
        let cancel = CancellationToken::new();
        let closing = CancellationToken::new();

        let service = AggregationService {
            model,
            aggregator: aggregator.clone(),
            synchronizer: Synchronizer::new(protocol, workers),
            gradients: gradients_rx,
            channels,
            published: published_tx,
            instrumentation,
            cancel: cancel.clone(),
            closing: closing.clone(),
        };

        let handle = tokio::spawn(service.run());

        Ok(Self {
            workers,
            protocol,
            aggregator,
            gradients: gradients_tx,
            models: receivers.into_iter().map(AsyncMutex::new).collect(),
            published: published_rx,
            cancel,
            closing,
            service: AsyncMutex::new(Some(handle)),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Checks that `worker_id` belongs to this server.
    fn check_worker(&self, worker_id: usize) -> Result<()> {
        if worker_id >= self.workers {
            return Err(ServerErr::InvalidWorker {
                worker_id,
                workers: self.workers,
            });
        }

        Ok(())
    }

    /// Enqueues a gradient for aggregation, never waits.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the submitting worker.
    /// * `gradient` - The gradient.
    ///
    /// # Returns
    /// `ServerErr::InvalidWorker` if `worker_id` is out of range or `ServerErr::Stopped` if the
    /// server was closed or the aggregation service no longer takes gradients.
    pub fn push(&self, worker_id: usize, gradient: ParameterCollection) -> Result<()> {
        self.check_worker(worker_id)?;

        // The service closes the queue on it's own schedule, refuse right away.
        if self.closing.is_cancelled() {
            return Err(ServerErr::Stopped);
        }

        self.gradients
            .send(Gradient::new(worker_id, gradient))
            .map_err(|_| ServerErr::Stopped)?;

        debug!(worker_id = worker_id; "gradient queued");
        Ok(())
    }

    /// Waits until a model snapshot is available for `worker_id` and takes it.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the pulling worker.
    ///
    /// # Returns
    /// The snapshot, `ServerErr::InvalidWorker` if `worker_id` is out of range or `ServerErr::Stopped`
    /// if the aggregation service terminated and no snapshot is left for this worker.
    pub async fn pull(&self, worker_id: usize) -> Result<ParameterCollection> {
        self.check_worker(worker_id)?;

        let mut rx = self.models[worker_id].lock().await;
        rx.recv().await.ok_or(ServerErr::Stopped)
    }

    /// The latest model installed by the aggregation service.
    ///
    /// Only final once the service was stopped and no more gradients are pushed, before that it's a
    /// possibly stale in-flight value.
    pub fn result(&self) -> ParameterCollection {
        ParameterCollection::clone(&self.published.borrow())
    }

    /// Invokes the bound aggregator on the given values, leaving the canonical model untouched.
    ///
    /// # Arguments
    /// * `gradients` - The gradients to apply.
    /// * `model` - The model to apply them to.
    ///
    /// # Returns
    /// The updated model or the aggregator's failure.
    pub fn update_model(
        &self,
        gradients: &ParameterCollection,
        model: &ParameterCollection,
    ) -> std::result::Result<ParameterCollection, AggregateErr> {
        self.aggregator.aggregate(model, gradients)
    }

    /// Stops taking gradients, the ones already queued are still aggregated and redistributed
    /// before the service stops on it's own.
    pub fn close(&self) {
        info!("closing the gradient queue");
        self.closing.cancel();
    }

    /// Whether the aggregation service is still running.
    pub fn is_running(&self) -> bool {
        // The service owns the publishing end, it's dropped once the task terminates.
        self.published.has_changed().is_ok()
    }

    /// Waits until the aggregation service terminates.
    ///
    /// Dropping the returned future before it resolves leaves the service joinable, a later call
    /// still observes it's outcome.
    ///
    /// # Returns
    /// The service's failure if it had one. Once a call resolved, further calls return `Ok`.
    pub async fn join(&self) -> Result<()> {
        let mut slot = self.service.lock().await;
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };

        let res = handle.await;
        *slot = None;

        res.map_err(ServiceErr::from)??;
        Ok(())
    }

    /// Cancels the aggregation service immediately and waits for it to terminate.
    ///
    /// Pending gradients are not drained and pending broadcasts are not flushed.
    ///
    /// # Returns
    /// The service's failure if it failed before being cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }
}

impl Drop for ParameterServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ParamServer for ParameterServer {
    /// Indirection call to `Self::push`.
    fn push(&self, worker_id: usize, gradient: ParameterCollection) -> Result<()> {
        ParameterServer::push(self, worker_id, gradient)
    }

    /// Indirection call to `Self::pull`.
    async fn pull(&self, worker_id: usize) -> Result<ParameterCollection> {
        ParameterServer::pull(self, worker_id).await
    }
}
