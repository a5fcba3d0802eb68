use crate::{error::AggregateErr, params::ParameterCollection};

/// Name of the builtin running sum aggregator.
pub const SUM: &str = "sum";

/// Conventional name for a `gradient_descent` aggregator.
pub const SGD: &str = "sgd";

/// Applies `update` to every model entry that has a matching gradient entry.
///
/// # Arguments
/// * `model` - The current model.
/// * `gradients` - The incoming gradients, every entry must exist in `model` with the same length.
/// * `update` - Element wise update, called with `(param, grad)`.
///
/// # Returns
/// The updated model or an `AggregateErr` if the gradients don't match the model's layout.
fn apply<F>(
    model: &ParameterCollection,
    gradients: &ParameterCollection,
    update: F,
) -> Result<ParameterCollection, AggregateErr>
where
    F: Fn(&mut f32, f32),
{
    let mut next = model.clone();

    for entry in gradients.iter() {
        let params = next
            .get_mut(&entry.name)
            .ok_or_else(|| AggregateErr::MissingEntry {
                name: entry.name.clone(),
            })?;

        if params.len() != entry.values.len() {
            return Err(AggregateErr::LengthMismatch {
                name: entry.name.clone(),
                got: entry.values.len(),
                expected: params.len(),
            });
        }

        for (p, g) in params.iter_mut().zip(&entry.values) {
            update(p, *g);
        }
    }

    Ok(next)
}

/// Adds the gradients to the model, element wise.
pub fn sum(
    model: &ParameterCollection,
    gradients: &ParameterCollection,
) -> Result<ParameterCollection, AggregateErr> {
    apply(model, gradients, |p, g| *p += g)
}

/// Creates a plain gradient descent aggregator.
///
/// # Arguments
/// * `learning_rate` - The small coefficient that modulates the amount of training per update.
///
/// # Returns
/// An aggregation function computing `model - learning_rate * gradients`.
pub fn gradient_descent(
    learning_rate: f32,
) -> impl Fn(&ParameterCollection, &ParameterCollection) -> Result<ParameterCollection, AggregateErr>
+ Send
+ Sync
+ 'static {
    move |model: &ParameterCollection, gradients: &ParameterCollection| {
        apply(model, gradients, |p, g| *p -= learning_rate * g)
    }
}
