pub mod event_repo;
pub mod projection_repo;
pub mod schema;
pub mod store;
pub mod tenant_repo;
pub mod util;

pub use crate::store::{DbStore, DbStoreFactory};

#[cfg(test)]
mod delivery_tests;
