use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{error::Result, params::ParameterCollection, service::ParamServer};

#[derive(Debug, Default, Clone)]
pub struct WorkerMetrics {
    pub pull_time: Duration,
    pub compute_time: Duration,

    pub steps: u64,
}

impl WorkerMetrics {
    #[inline]
    pub fn bump_step(&mut self) {
        self.steps += 1;
    }
}

/// A simulated worker, repeatedly pulls a model, computes a gradient out of it and pushes it back.
pub struct Worker<F> {
    worker_id: usize,
    epochs: NonZeroUsize,
    compute: F,
}

impl<F> Worker<F>
where
    F: FnMut(&ParameterCollection) -> ParameterCollection + Send,
{
    /// Creates a new `Worker`.
    ///
    /// # Arguments
    /// * `worker_id` - The id of this worker within the server.
    /// * `epochs` - The amount of pull, compute, push steps to run.
    /// * `compute` - Computes the gradient for a model snapshot.
    ///
    /// # Returns
    /// A new `Worker` instance.
    pub fn new(worker_id: usize, epochs: NonZeroUsize, compute: F) -> Self {
        Self {
            worker_id,
            epochs,
            compute,
        }
    }

    /// Runs the worker against `server` until every epoch is done.
    ///
    /// # Arguments
    /// * `server` - The parameter server to train against.
    ///
    /// # Returns
    /// The collected metrics, or the first `ServerErr` the server returned.
    pub async fn run<P>(mut self, server: &P) -> Result<WorkerMetrics>
    where
        P: ParamServer + Sync,
    {
        let mut metrics = WorkerMetrics::default();
        let worker_id = self.worker_id;

        for epoch in 0..self.epochs.get() {
            let start = Instant::now();
            let model = server.pull(worker_id).await?;
            metrics.pull_time += start.elapsed();

            let start = Instant::now();
            let gradient = (self.compute)(&model);
            metrics.compute_time += start.elapsed();

            server.push(worker_id, gradient)?;
            metrics.bump_step();
            debug!(worker_id = worker_id, epoch = epoch; "step done");
        }

        info!(
            worker_id = worker_id;
            "finished training: steps={}, pull_time={:?}, compute_time={:?}",
            metrics.steps,
            metrics.pull_time,
            metrics.compute_time
        );

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::ServerErr;

    /// Hands out a fixed model and records every push.
    struct FakeServer {
        model: ParameterCollection,
        pushed: Mutex<VecDeque<(usize, ParameterCollection)>>,
    }

    impl ParamServer for FakeServer {
        fn push(&self, worker_id: usize, gradient: ParameterCollection) -> Result<()> {
            self.pushed.lock().push_back((worker_id, gradient));
            Ok(())
        }

        async fn pull(&self, _worker_id: usize) -> Result<ParameterCollection> {
            Ok(self.model.clone())
        }
    }

    struct StoppedServer;

    impl ParamServer for StoppedServer {
        fn push(&self, _worker_id: usize, _gradient: ParameterCollection) -> Result<()> {
            Err(ServerErr::Stopped)
        }

        async fn pull(&self, _worker_id: usize) -> Result<ParameterCollection> {
            Err(ServerErr::Stopped)
        }
    }

    #[tokio::test]
    async fn test_worker_pushes_once_per_epoch() {
        let server = FakeServer {
            model: ParameterCollection::new().with("w", vec![2.0]),
            pushed: Mutex::new(VecDeque::new()),
        };

        let epochs = NonZeroUsize::new(3).unwrap();
        let worker = Worker::new(1, epochs, |model: &ParameterCollection| {
            let w = model.get("w").unwrap()[0];
            ParameterCollection::new().with("w", vec![w * 10.0])
        });

        let metrics = worker.run(&server).await.unwrap();
        assert_eq!(metrics.steps, 3);

        let pushed = server.pushed.lock();
        assert_eq!(pushed.len(), 3);
        for (worker_id, grad) in pushed.iter() {
            assert_eq!(*worker_id, 1);
            assert_eq!(grad.get("w"), Some(&[20.0][..]));
        }
    }

    #[tokio::test]
    async fn test_worker_stops_on_server_error() {
        let worker = Worker::new(0, NonZeroUsize::MIN, |model: &ParameterCollection| model.clone());
        let res = worker.run(&StoppedServer).await;
        assert!(matches!(res, Err(ServerErr::Stopped)));
    }
}
