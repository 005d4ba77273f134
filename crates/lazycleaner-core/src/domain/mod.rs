//! Domain model (node keys, errors).

pub mod errors;
pub mod ids;

pub use self::errors::{CleanerError, QueueError};
pub use self::ids::NodeKey;
