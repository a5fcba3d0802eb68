use std::{collections::HashMap, fmt, sync::Arc};

use super::builtin;
use crate::{
    error::{AggregateErr, ConfigErr},
    params::{DataKind, ParameterCollection, Value},
};

/// Namespace used to resolve function names that don't carry one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The input holding the current model.
pub const MODEL_INPUT: &str = "model";

/// The input holding the incoming gradients.
pub const GRADIENTS_INPUT: &str = "gradients";

/// The body of a registered function, called with `(model, gradients)`.
pub type FunctionBody =
    Arc<dyn Fn(&ParameterCollection, &ParameterCollection) -> Result<Value, AggregateErr> + Send + Sync>;

/// A named and typed function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: DataKind,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The declared inputs and outputs of a registered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
}

impl Signature {
    /// Creates a new `Signature`.
    ///
    /// # Arguments
    /// * `inputs` - The named inputs of the function.
    /// * `outputs` - The named outputs of the function.
    ///
    /// # Returns
    /// A new `Signature` instance.
    pub fn new(inputs: Vec<Param>, outputs: Vec<Param>) -> Self {
        Self { inputs, outputs }
    }

    /// The signature every aggregation function is expected to have,
    /// `(model: list, gradients: list) -> model: list`.
    pub fn aggregation() -> Self {
        Self::new(
            vec![
                Param::new(MODEL_INPUT, DataKind::List),
                Param::new(GRADIENTS_INPUT, DataKind::List),
            ],
            vec![Param::new(MODEL_INPUT, DataKind::List)],
        )
    }
}

/// A function registered in a `FunctionRegistry`.
#[derive(Clone)]
pub struct FunctionDef {
    pub signature: Signature,
    pub body: FunctionBody,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A table of functions that aggregators get resolved from.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<(String, String), FunctionDef>,
}

impl FunctionRegistry {
    /// Creates a new empty `FunctionRegistry`.
    ///
    /// # Returns
    /// A new `FunctionRegistry` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `FunctionRegistry` holding the builtin aggregators.
    ///
    /// # Returns
    /// A new `FunctionRegistry` instance with `sum` registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_aggregator(builtin::SUM, builtin::sum);
        registry
    }

    /// Registers a function with an arbitrary signature.
    ///
    /// The signature is not checked here, it's checked once when an aggregator is bound to it.
    ///
    /// # Arguments
    /// * `name` - The name of the function, optionally prefixed by a `namespace::`.
    /// * `signature` - The declared signature of the function.
    /// * `body` - The function itself.
    pub fn register<F>(&mut self, name: &str, signature: Signature, body: F)
    where
        F: Fn(&ParameterCollection, &ParameterCollection) -> Result<Value, AggregateErr>
            + Send
            + Sync
            + 'static,
    {
        let def = FunctionDef {
            signature,
            body: Arc::new(body),
        };

        self.functions.insert(split_name(name), def);
    }

    /// Registers a typed aggregation function, `(model, gradients) -> model`.
    ///
    /// # Arguments
    /// * `name` - The name of the function, optionally prefixed by a `namespace::`.
    /// * `f` - The aggregation function.
    pub fn register_aggregator<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&ParameterCollection, &ParameterCollection) -> Result<ParameterCollection, AggregateErr>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Signature::aggregation(), move |model, gradients| {
            f(model, gradients).map(Value::List)
        });
    }

    /// Looks up a function by name.
    ///
    /// # Arguments
    /// * `name` - The name of the function, optionally prefixed by a `namespace::`.
    ///
    /// # Returns
    /// The function definition or `ConfigErr::UnknownFunction` if it isn't registered.
    pub fn resolve(&self, name: &str) -> Result<&FunctionDef, ConfigErr> {
        self.functions
            .get(&split_name(name))
            .ok_or_else(|| ConfigErr::UnknownFunction {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&split_name(name))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Splits a `namespace::name` into it's parts.
fn split_name(name: &str) -> (String, String) {
    match name.rsplit_once("::") {
        Some((ns, fname)) => (ns.to_string(), fname.to_string()),
        None => (DEFAULT_NAMESPACE.to_string(), name.to_string()),
    }
}
