mod aggregator;
pub mod builtin;
mod function;

pub use aggregator::Aggregator;
pub use function::{
    DEFAULT_NAMESPACE, FunctionBody, FunctionDef, FunctionRegistry, GRADIENTS_INPUT, MODEL_INPUT,
    Param, Signature,
};
