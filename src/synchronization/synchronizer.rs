use super::{BarrierSync, NonBlockingSync};
use crate::{
    distribution::ModelChannels, error::ServiceErr, params::ParameterCollection, specs::Protocol,
};

/// The outcome of redistributing one freshly aggregated model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The model was written into every worker's channel.
    Broadcast,
    /// The model was written into a single worker's channel.
    Sent { worker_id: usize },
    /// The round is still open, nothing was written.
    Waiting { pending: usize },
}

/// The redistribution policy of the aggregation service, together with it's private state.
#[derive(Debug, Clone)]
pub enum Synchronizer {
    Bsp(BarrierSync),
    Asp(NonBlockingSync),
}

impl Synchronizer {
    /// Creates the `Synchronizer` for a protocol.
    ///
    /// # Arguments
    /// * `protocol` - The consistency protocol.
    /// * `workers` - The amount of workers.
    ///
    /// # Returns
    /// A new `Synchronizer` instance.
    pub fn new(protocol: Protocol, workers: usize) -> Self {
        match protocol {
            Protocol::Bsp => Self::Bsp(BarrierSync::new(workers)),
            Protocol::Asp => Self::Asp(NonBlockingSync::new()),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Bsp(_) => Protocol::Bsp,
            Self::Asp(_) => Protocol::Asp,
        }
    }

    /// Redistributes a freshly aggregated model following the protocol.
    ///
    /// # Arguments
    /// * `worker_id` - The worker whose gradient produced `model`.
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
        match self {
            Self::Bsp(sync) => sync.redistribute(worker_id, model, channels).await,
            Self::Asp(sync) => sync.redistribute(worker_id, model, channels).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{distribution::model_channels, metrics::NoInstrumentation};

    #[test]
    fn test_protocol_round_trip() {
        assert_eq!(Synchronizer::new(Protocol::Bsp, 2).protocol(), Protocol::Bsp);
        assert_eq!(Synchronizer::new(Protocol::Asp, 2).protocol(), Protocol::Asp);
    }

    #[tokio::test]
    async fn test_same_submissions_dispatch_differently() {
        let model = ParameterCollection::new().with("w", vec![1.0]);

        let (channels, _bsp_rx) = model_channels(2, Arc::new(NoInstrumentation));
        let mut bsp = Synchronizer::new(Protocol::Bsp, 2);
        let dispatch = bsp.redistribute(0, &model, &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Waiting { pending: 1 });

        let (channels, _asp_rx) = model_channels(2, Arc::new(NoInstrumentation));
        let mut asp = Synchronizer::new(Protocol::Asp, 2);
        let dispatch = asp.redistribute(0, &model, &channels).await.unwrap();
        assert_eq!(dispatch, Dispatch::Sent { worker_id: 0 });
    }
}
