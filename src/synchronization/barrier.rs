use log::{debug, warn};

use super::Dispatch;
use crate::{distribution::ModelChannels, error::ServiceErr, params::ParameterCollection};

/// Bulk synchronous redistribution: the model is broadcast to every worker once all of them
/// had a gradient aggregated in the current round.
#[derive(Debug, Clone)]
pub struct BarrierSync {
    finished: Box<[bool]>,
}

impl BarrierSync {
    /// Creates a new `BarrierSync` with every worker unfinished.
    ///
    /// # Arguments
    /// * `workers` - The amount of workers taking part in each round.
    ///
    /// # Returns
    /// A new `BarrierSync` instance.
    pub fn new(workers: usize) -> Self {
        Self {
            finished: vec![false; workers].into_boxed_slice(),
        }
    }

    /// The finished state of every worker in the current round.
    pub fn finished(&self) -> &[bool] {
        &self.finished
    }

    /// The amount of workers the current round is still waiting on.
    pub fn pending(&self) -> usize {
        self.finished.iter().filter(|finished| !**finished).count()
    }

    fn all_finished(&self) -> bool {
        self.finished.iter().all(|finished| *finished)
    }

    fn reset(&mut self) {
        self.finished.fill(false);
    }

    /// Marks `worker_id` as finished and broadcasts `model` if it closed the round.
    ///
    /// # Arguments
    /// * `worker_id` - The worker whose gradient was just aggregated.
    /// * `model` - The freshly aggregated model.
    /// * `channels` - The workers' model channels.
    ///
    /// # Returns
    /// What was done with the model, or a `ServiceErr` if a channel was closed.
    pub async fn redistribute(
        &mut self,
        worker_id: usize,
        model: &ParameterCollection,
        channels: &ModelChannels,
    ) -> Result<Dispatch, ServiceErr> {
        let Some(finished) = self.finished.get_mut(worker_id) else {
            return Err(ServiceErr::Broadcast { worker_id });
        };

        if *finished {
            warn!(worker_id = worker_id; "worker submitted more than one gradient in the same round");
        }
        *finished = true;

        if !self.all_finished() {
            return Ok(Dispatch::Waiting {
                pending: self.pending(),
            });
        }

        self.reset();
        channels.broadcast(model).await?;
        debug!("global parameters broadcast successfully");

        Ok(Dispatch::Broadcast)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{distribution::model_channels, metrics::NoInstrumentation};

    fn model(value: f32) -> ParameterCollection {
        ParameterCollection::new().with("w", vec![value])
    }

    #[tokio::test]
    async fn test_broadcast_only_when_every_worker_finished() {
        let (channels, mut receivers) = model_channels(3, Arc::new(NoInstrumentation));
        let mut sync = BarrierSync::new(3);

        let dispatch = sync.redistribute(0, &model(1.0), &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Waiting { pending: 2 });

        let dispatch = sync.redistribute(1, &model(3.0), &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Waiting { pending: 1 });
        assert_eq!(sync.finished(), [true, true, false]);

        for rx in receivers.iter_mut() {
            assert!(rx.try_recv().is_err());
        }

        let dispatch = sync.redistribute(2, &model(6.0), &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Broadcast);

        for rx in receivers.iter_mut() {
            assert_eq!(rx.try_recv().unwrap(), model(6.0));
        }
    }

    #[tokio::test]
    async fn test_flags_reset_after_broadcast() {
        let (channels, mut receivers) = model_channels(2, Arc::new(NoInstrumentation));
        let mut sync = BarrierSync::new(2);

        sync.redistribute(1, &model(1.0), &channels).await.unwrap();
        sync.redistribute(0, &model(2.0), &channels).await.unwrap();
        assert_eq!(sync.finished(), [false, false]);
        assert_eq!(sync.pending(), 2);

        for rx in receivers.iter_mut() {
            rx.try_recv().unwrap();
        }

        let dispatch = sync.redistribute(0, &model(3.0), &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Waiting { pending: 1 });
    }

    #[tokio::test]
    async fn test_repeated_worker_does_not_close_the_round() {
        let (channels, _receivers) = model_channels(2, Arc::new(NoInstrumentation));
        let mut sync = BarrierSync::new(2);

        sync.redistribute(0, &model(1.0), &channels).await.unwrap();
        let dispatch = sync.redistribute(0, &model(2.0), &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Waiting { pending: 1 });
    }

    #[tokio::test]
    async fn test_single_worker_broadcasts_every_time() {
        let (channels, mut receivers) = model_channels(1, Arc::new(NoInstrumentation));
        let mut sync = BarrierSync::new(1);

        let dispatch = sync.redistribute(0, &model(1.0), &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Broadcast);
        assert_eq!(receivers[0].try_recv().unwrap(), model(1.0));
    }
}
