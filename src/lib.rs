pub mod aggregation;
pub mod distribution;
pub mod error;
pub mod metrics;
pub mod params;
pub mod service;
pub mod specs;
pub mod synchronization;
pub mod worker;


pub use aggregation::{Aggregator, FunctionRegistry};
pub use error::{AggregateErr, ConfigErr, Result, ServerErr, ServiceErr};
pub use params::{Gradient, ParameterCollection};
pub use service::{ParamServer, ParameterServer, ServerBuilder};
pub use specs::{Protocol, ServerSpec, TrainingSpec};
pub use worker::{Worker, WorkerMetrics};
