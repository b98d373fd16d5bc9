pub mod bus;
pub mod cdevent;
pub mod envelope;
pub mod normalize;
pub mod schema;
pub mod types;

pub use crate::normalize::{normalize, NormalizeError};
pub use crate::types::{EventRecord, NormalizedEvent, StoredEvent};
