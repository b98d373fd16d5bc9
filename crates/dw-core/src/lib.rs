pub mod auth;
pub mod batcher;
pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod ingest;
pub mod projection;
pub mod projections;
pub mod store;
pub mod tenants;

pub mod types;

pub use crate::config::{BatchConfig, Config};
pub use crate::delivery::Delivery;
pub use crate::error::{DeliveryError, IngestError, IngestErrorKind, StoreError, TenantError};
pub use crate::ingest::{IngestCommand, IngestGate, IngestReceipt};
pub use crate::store::{Store, StoreFactory};
