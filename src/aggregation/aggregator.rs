use std::{fmt, sync::Arc};

use super::function::{FunctionBody, FunctionRegistry, GRADIENTS_INPUT, MODEL_INPUT};
use crate::{
    error::{AggregateErr, ConfigErr},
    params::{DataKind, ParameterCollection, Value},
};

/// An aggregation function bound and signature checked once, ahead of the aggregation service.
///
/// Invoking it is a plain indirect call, cloning it is cheap.
#[derive(Clone)]
pub struct Aggregator {
    name: Arc<str>,
    body: FunctionBody,
}

impl Aggregator {
    /// Resolves and validates an aggregation function from a registry.
    ///
    /// # Arguments
    /// * `registry` - The function table to resolve `name` from.
    /// * `name` - The name of the function, optionally prefixed by a `namespace::`.
    ///
    /// # Returns
    /// A new `Aggregator` or a `ConfigErr` if the function doesn't exist or if it's signature is
    /// not `(model, gradients) -> list`.
    pub fn bind(registry: &FunctionRegistry, name: &str) -> Result<Self, ConfigErr> {
        let def = registry.resolve(name)?;
        let signature = &def.signature;

        if signature.inputs.len() != 2 {
            return Err(ConfigErr::InputArity {
                function: name.to_string(),
                got: signature.inputs.len(),
            });
        }

        for input in [MODEL_INPUT, GRADIENTS_INPUT] {
            if !signature.inputs.iter().any(|param| param.name == input) {
                return Err(ConfigErr::MissingInput {
                    function: name.to_string(),
                    input,
                });
            }
        }

        let [output] = signature.outputs.as_slice() else {
            return Err(ConfigErr::OutputArity {
                function: name.to_string(),
                got: signature.outputs.len(),
            });
        };

        if output.kind != DataKind::List {
            return Err(ConfigErr::OutputType {
                function: name.to_string(),
                got: output.kind,
            });
        }

        Ok(Self {
            name: Arc::from(name),
            body: Arc::clone(&def.body),
        })
    }

    /// Creates an `Aggregator` straight from a typed closure, skipping the registry.
    ///
    /// # Arguments
    /// * `name` - A name for observability.
    /// * `f` - The aggregation function.
    ///
    /// # Returns
    /// A new `Aggregator` instance.
    pub fn from_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&ParameterCollection, &ParameterCollection) -> Result<ParameterCollection, AggregateErr>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: Arc::from(name),
            body: Arc::new(
                move |model: &ParameterCollection, gradients: &ParameterCollection| {
                    f(model, gradients).map(Value::List)
                },
            ),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produces the next model given the current one and a gradient.
    ///
    /// # Arguments
    /// * `model` - The current model.
    /// * `gradients` - The incoming gradients.
    ///
    /// # Returns
    /// The new model or an `AggregateErr` if the function failed or returned something other than a list.
    pub fn aggregate(
        &self,
        model: &ParameterCollection,
        gradients: &ParameterCollection,
    ) -> Result<ParameterCollection, AggregateErr> {
        match (self.body)(model, gradients)? {
            Value::List(model) => Ok(model),
            other => Err(AggregateErr::MalformedOutput {
                function: self.name.to_string(),
                got: other.kind(),
            }),
        }
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
