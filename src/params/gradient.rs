use super::ParameterCollection;

/// A gradient submission, consumed exactly once by the aggregation service.
#[derive(Debug, Clone)]
pub struct Gradient {
    pub worker_id: usize,
    pub params: ParameterCollection,
}

impl Gradient {
    /// Creates a new `Gradient`.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the worker that produced it.
    /// * `params` - The gradient values.
    ///
    /// # Returns
    /// A new `Gradient` instance.
    pub fn new(worker_id: usize, params: ParameterCollection) -> Self {
        Self { worker_id, params }
    }
}
