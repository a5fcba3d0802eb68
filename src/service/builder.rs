use std::sync::Arc;

use log::info;

use super::ParameterServer;
use crate::{
    aggregation::{Aggregator, FunctionRegistry},
    error::Result,
    metrics::{Instrumentation, NoInstrumentation},
    params::ParameterCollection,
    specs::ServerSpec,
};

/// Builds `ParameterServer`s given a specification.
pub struct ServerBuilder {
    registry: FunctionRegistry,
    instrumentation: Arc<dyn Instrumentation>,
}

impl ServerBuilder {
    /// Creates a new `ServerBuilder`.
    ///
    /// # Arguments
    /// * `registry` - Where the aggregation functions named by the specs are resolved.
    ///
    /// # Returns
    /// A new `ServerBuilder` instance.
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            registry,
            instrumentation: Arc::new(NoInstrumentation),
        }
    }

    /// Sets the timing hooks handed to every server built from now on.
    pub fn instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Builds a new `ParameterServer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification of the parameter server.
    /// * `model` - The initial model.
    ///
    /// # Returns
    /// A running `ParameterServer` or a `ConfigErr` if the spec is invalid or names an aggregation
    /// function that can't be bound.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn build(&self, spec: &ServerSpec, model: ParameterCollection) -> Result<ParameterServer> {
        spec.validate()?;
        let aggregator = Aggregator::bind(&self.registry, &spec.aggregator)?;

        info!(
            "building parameter server: aggregator={}, protocol={}, workers={}",
            aggregator.name(),
            spec.protocol,
            spec.workers
        );

        ParameterServer::with_instrumentation(
            model,
            aggregator,
            spec.protocol,
            spec.workers,
            Arc::clone(&self.instrumentation),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregation::builtin,
        error::{ConfigErr, ServerErr},
        specs::Protocol,
    };

    #[tokio::test]
    async fn test_build_resolves_builtin() {
        let builder = ServerBuilder::new(FunctionRegistry::with_builtins());
        let spec = ServerSpec::new(2, Protocol::Asp, builtin::SUM);

        let server = builder.build(&spec, ParameterCollection::new()).unwrap();
        assert_eq!(server.workers(), 2);
        assert_eq!(server.protocol(), Protocol::Asp);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_unknown_function() {
        let builder = ServerBuilder::new(FunctionRegistry::new());
        let spec = ServerSpec::new(2, Protocol::Bsp, "nn::missing");

        let res = builder.build(&spec, ParameterCollection::new());
        assert!(matches!(
            res,
            Err(ServerErr::Config(ConfigErr::UnknownFunction { .. }))
        ));
    }

    #[tokio::test]
    async fn test_build_no_workers() {
        let builder = ServerBuilder::new(FunctionRegistry::with_builtins());
        let spec = ServerSpec::new(0, Protocol::Bsp, builtin::SUM);

        let res = builder.build(&spec, ParameterCollection::new());
        assert!(matches!(res, Err(ServerErr::Config(ConfigErr::NoWorkers))));
    }
}
