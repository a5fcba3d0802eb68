use crate::{error::Result, params::ParameterCollection};

/// The worker facing side of a parameter server.
///
/// Lets workers be written once for any server that can take gradients and hand out models.
#[allow(unused)]
#[trait_variant::make(ParamServer: Send)]
pub trait ParamServerTemplate {
    /// Should enqueue `gradient` for aggregation without waiting.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the submitting worker.
    /// * `gradient` - The gradient.
    fn push(&self, worker_id: usize, gradient: ParameterCollection) -> Result<()>;

    /// Should wait for the next model snapshot addressed to `worker_id` and take it.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the pulling worker.
    async fn pull(&self, worker_id: usize) -> Result<ParameterCollection>;
}
