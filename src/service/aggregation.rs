use std::{sync::Arc, time::Instant};

use log::{debug, error, info};
use tokio::{
    sync::{mpsc::UnboundedReceiver, watch},
    task,
};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregation::Aggregator,
    distribution::ModelChannels,
    error::ServiceErr,
    metrics::Instrumentation,
    params::{Gradient, ParameterCollection},
    synchronization::{Dispatch, Synchronizer},
};

/// The single background task owning the canonical model.
///
/// The model and the synchronizer's finished states live only here, everything else talks to
/// this task through the gradient queue, the model channels and the published model.
pub(super) struct AggregationService {
    pub(super) model: Arc<ParameterCollection>,
    pub(super) aggregator: Aggregator,
    pub(super) synchronizer: Synchronizer,
    pub(super) gradients: UnboundedReceiver<Gradient>,
    pub(super) channels: ModelChannels,
    pub(super) published: watch::Sender<Arc<ParameterCollection>>,
    pub(super) instrumentation: Arc<dyn Instrumentation>,
    pub(super) cancel: CancellationToken,
    pub(super) closing: CancellationToken,
}

impl AggregationService {
    /// Runs the service until it's cancelled, the gradient queue is closed and drained, or a cycle fails.
    ///
    /// # Returns
    /// `Ok` when stopped by cancellation or by closing, the failure otherwise.
    pub(super) async fn run(self) -> Result<(), ServiceErr> {
        let protocol = self.synchronizer.protocol();
        info!("aggregation service started: protocol={protocol}, workers={}", self.channels.len());

        let res = self.serve().await;

        match &res {
            Ok(()) => info!("aggregation service stopped"),
            Err(e) => error!("{e}"),
        }

        res
    }

    async fn serve(self) -> Result<(), ServiceErr> {
        let Self {
            mut model,
            aggregator,
            mut synchronizer,
            mut gradients,
            channels,
            published,
            instrumentation,
            cancel,
            closing,
        } = self;

        let mut draining = false;

        loop {
            let grad = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = closing.cancelled(), if !draining => {
                    info!("gradient queue closed, draining pending gradients");
                    gradients.close();
                    draining = true;
                    continue;
                }
                grad = gradients.recv() => match grad {
                    Some(grad) => grad,
                    None => return Ok(()),
                },
            };

            let Gradient { worker_id, params } = grad;
            debug!(
                worker_id = worker_id;
                "successfully pulled the gradients [size:{} kb]",
                params.size_in_bytes() / 1024
            );

            let start = Instant::now();
            let current = Arc::clone(&model);
            let invoker = aggregator.clone();
            let update = task::spawn_blocking(move || invoker.aggregate(&current, &params));

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                res = update => res?.map_err(|source| ServiceErr::Aggregation { worker_id, source })?,
            };
            instrumentation.on_aggregation(start.elapsed());

            model = Arc::new(next);
            published.send_replace(Arc::clone(&model));

            let dispatch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                res = synchronizer.redistribute(worker_id, &model, &channels) => res?,
            };

            if let Dispatch::Waiting { pending } = dispatch {
                debug!(worker_id = worker_id, pending = pending; "waiting on the rest of the round");
            }
        }
    }
}
