use std::{fmt, fs, num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

use crate::{aggregation::builtin, error::ConfigErr};

/// The consistency protocol used to redistribute the model, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Bulk synchronous: every worker receives the next model once all of them submitted a gradient.
    Bsp,
    /// Asynchronous: every worker receives the model right after it's own gradient was aggregated.
    Asp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Bsp => f.write_str("BSP"),
            Protocol::Asp => f.write_str("ASP"),
        }
    }
}

/// The specification for a `ParameterServer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    pub workers: usize,
    pub protocol: Protocol,
    pub aggregator: String,
}

impl ServerSpec {
    /// Creates a new `ServerSpec`.
    ///
    /// # Arguments
    /// * `workers` - The amount of workers.
    /// * `protocol` - The consistency protocol.
    /// * `aggregator` - The name of the aggregation function.
    ///
    /// # Returns
    /// A new `ServerSpec` instance.
    pub fn new(workers: usize, protocol: Protocol, aggregator: impl Into<String>) -> Self {
        Self {
            workers,
            protocol,
            aggregator: aggregator.into(),
        }
    }

    /// Checks the values that can't be checked by the type system.
    ///
    /// # Returns
    /// `ConfigErr::NoWorkers` if `workers` is zero.
    pub fn validate(&self) -> Result<(), ConfigErr> {
        if self.workers == 0 {
            return Err(ConfigErr::NoWorkers);
        }

        Ok(())
    }
}

fn default_learning_rate() -> f32 {
    0.1
}

/// The specification for a simulated training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSpec {
    pub server: ServerSpec,
    pub epochs: NonZeroUsize,
    pub params: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TrainingSpec {
    /// Parses a `TrainingSpec` from it's json representation.
    ///
    /// # Arguments
    /// * `json` - The json document.
    ///
    /// # Returns
    /// The parsed and validated spec or a `ConfigErr`.
    pub fn from_json(json: &str) -> Result<Self, ConfigErr> {
        let spec: Self = serde_json::from_str(json)?;
        spec.server.validate()?;
        Ok(spec)
    }

    /// Reads and parses a `TrainingSpec` from a json file.
    ///
    /// # Arguments
    /// * `path` - The path of the json file.
    ///
    /// # Returns
    /// The parsed and validated spec or a `ConfigErr`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigErr> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Default for TrainingSpec {
    fn default() -> Self {
        Self {
            server: ServerSpec::new(4, Protocol::Bsp, builtin::SGD),
            epochs: NonZeroUsize::MIN.saturating_add(99),
            params: 8,
            learning_rate: default_learning_rate(),
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_training_spec() {
        let json = r#"{
            "server": { "workers": 3, "protocol": "asp", "aggregator": "nn::sgd" },
            "epochs": 10,
            "params": 4
        }"#;

        let spec = TrainingSpec::from_json(json).unwrap();
        assert_eq!(spec.server.workers, 3);
        assert_eq!(spec.server.protocol, Protocol::Asp);
        assert_eq!(spec.server.aggregator, "nn::sgd");
        assert_eq!(spec.epochs.get(), 10);
        assert_eq!(spec.learning_rate, 0.1);
        assert_eq!(spec.seed, None);
    }

    #[test]
    fn test_unknown_protocol_is_rejected() {
        let json = r#"{
            "server": { "workers": 3, "protocol": "ssp", "aggregator": "sum" },
            "epochs": 10,
            "params": 4
        }"#;

        let err = TrainingSpec::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigErr::Spec(_)));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let json = r#"{
            "server": { "workers": 0, "protocol": "bsp", "aggregator": "sum" },
            "epochs": 1,
            "params": 1
        }"#;

        let err = TrainingSpec::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigErr::NoWorkers));
    }

    #[test]
    fn test_missing_file() {
        let err = TrainingSpec::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigErr::Io(_)));
    }
}
