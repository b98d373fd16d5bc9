use dw_core::error::StoreError;
use dw_core::store::{Store, StoreFactory};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::event_repo::EventRepo;
use crate::projection_repo::ProjectionRepo;
use crate::schema;
use crate::tenant_repo::TenantRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Tenants<'a>
        = TenantRepo<'a>
    where
        Self: 'a;
    type Events<'a>
        = EventRepo<'a>
    where
        Self: 'a;
    type Projections<'a>
        = ProjectionRepo<'a>
    where
        Self: 'a;

    fn tenants(&self) -> Self::Tenants<'_> {
        TenantRepo::new(&self.conn)
    }

    fn events(&self) -> Self::Events<'_> {
        EventRepo::new(&self.conn)
    }

    fn projections(&self) -> Self::Projections<'_> {
        ProjectionRepo::new(&self.conn)
    }

    fn with_tx<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(StoreError::storage)?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(StoreError::storage)?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(StoreError::storage)?;
                Err(err)
            }
        }
    }
}

/// Opens connections to one SQLite file. The schema is migrated once when
/// the factory is created.
#[derive(Clone)]
pub struct DbStoreFactory {
    path: Arc<PathBuf>,
}

impl DbStoreFactory {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StoreError::storage)?;
        }
        schema::open_and_migrate(&path.to_string_lossy()).map_err(StoreError::storage)?;
        Ok(Self {
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreFactory for DbStoreFactory {
    type Store = DbStore;

    fn open(&self) -> Result<DbStore, StoreError> {
        let conn = schema::open(&self.path.to_string_lossy()).map_err(StoreError::storage)?;
        Ok(DbStore::new(conn))
    }
}
