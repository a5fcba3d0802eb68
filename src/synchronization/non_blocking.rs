use super::Dispatch;
use crate::{distribution::ModelChannels, error::ServiceErr, params::ParameterCollection};

/// Asynchronous redistribution: skips synchronization between workers, the model goes back
/// immediately and only to the worker whose gradient produced it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonBlockingSync;

impl NonBlockingSync {
    /// Creates a new `NonBlockingSync`.
    ///
    /// # Returns
    /// A new `NonBlockingSync` instance.
    pub fn new() -> Self {
        Self
    }

    /// Sends `model` to the submitting worker only, other workers may lag behind indefinitely.
    ///
    /// # Arguments
    /// * `worker_id` - The worker whose gradient was just aggregated.
    /// * `model` - The freshly aggregated model.
    /// * `channels` - The workers' model channels.
    ///
    /// # Returns
    /// What was done with the model, or a `ServiceErr` if the channel was closed.
    pub async fn redistribute(
        &self,
        worker_id: usize,
        model: &ParameterCollection,
        channels: &ModelChannels,
    ) -> Result<Dispatch, ServiceErr> {
        channels.send_to(worker_id, model).await?;
        Ok(Dispatch::Sent { worker_id })
    }
}
