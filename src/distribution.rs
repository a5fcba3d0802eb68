use std::{sync::Arc, time::Instant};

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::{error::ServiceErr, metrics::Instrumentation, params::ParameterCollection};

/// The sending ends of the per worker model distribution channels.
///
/// Every channel holds at most one undelivered snapshot, writing into a full channel waits until the
/// worker consumed the previous one.
pub struct ModelChannels {
    senders: Box<[Sender<ParameterCollection>]>,
    instrumentation: Arc<dyn Instrumentation>,
}

/// Creates one single slot channel per worker.
///
/// # Arguments
/// * `workers` - The amount of workers.
/// * `instrumentation` - Timing hooks invoked around every broadcast.
///
/// # Returns
/// The sending ends and the receiving ends, indexed by worker id.
pub fn model_channels(
    workers: usize,
    instrumentation: Arc<dyn Instrumentation>,
) -> (ModelChannels, Vec<Receiver<ParameterCollection>>) {
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..workers).map(|_| mpsc::channel(1)).unzip();

    let channels = ModelChannels {
        senders: senders.into_boxed_slice(),
        instrumentation,
    };

    (channels, receivers)
}

impl ModelChannels {
    /// The amount of workers.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Writes a copy of the initial model into every channel without waiting.
    ///
    /// # Arguments
    /// * `model` - The initial model.
    ///
    /// # Returns
    /// A `ServiceErr::Broadcast` if any of the channels is closed or already holds a snapshot.
    pub fn seed(&self, model: &ParameterCollection) -> Result<(), ServiceErr> {
        let start = Instant::now();

        for (worker_id, tx) in self.senders.iter().enumerate() {
            tx.try_send(model.clone())
                .map_err(|_| ServiceErr::Broadcast { worker_id })?;
        }

        self.instrumentation.on_broadcast(start.elapsed());
        Ok(())
    }

    /// Writes a copy of `model` into every worker's channel, in worker id order.
    ///
    /// # Arguments
    /// * `model` - The model to broadcast.
    ///
    /// # Returns
    /// A `ServiceErr::Broadcast` if any of the receiving ends was dropped.
    pub async fn broadcast(&self, model: &ParameterCollection) -> Result<(), ServiceErr> {
        let start = Instant::now();

        for (worker_id, tx) in self.senders.iter().enumerate() {
            tx.send(model.clone())
                .await
                .map_err(|_| ServiceErr::Broadcast { worker_id })?;
        }

        self.instrumentation.on_broadcast(start.elapsed());
        Ok(())
    }

    /// Writes a copy of `model` into a single worker's channel.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the receiving worker.
    /// * `model` - The model to send.
    ///
    /// # Returns
    /// A `ServiceErr::Broadcast` if the receiving end was dropped or if `worker_id` is out of range.
    pub async fn send_to(&self, worker_id: usize, model: &ParameterCollection) -> Result<(), ServiceErr> {
        let start = Instant::now();

        let tx = self
            .senders
            .get(worker_id)
            .ok_or(ServiceErr::Broadcast { worker_id })?;

        tx.send(model.clone())
            .await
            .map_err(|_| ServiceErr::Broadcast { worker_id })?;

        self.instrumentation.on_broadcast(start.elapsed());
        Ok(())
    }
}
