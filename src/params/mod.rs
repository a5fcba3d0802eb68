mod collection;
mod gradient;

pub use collection::{DataKind, Entry, ParameterCollection, Value};
pub use gradient::Gradient;
