mod barrier;
mod non_blocking;
mod synchronizer;

pub use barrier::BarrierSync;
pub use non_blocking::NonBlockingSync;
pub use synchronizer::{Dispatch, Synchronizer};
