use crate::error::StoreError;
use crate::events::EventRepository;
use crate::projections::ProjectionRepository;
use crate::tenants::TenantRepository;

pub trait Store {
    type Tenants<'a>: TenantRepository
    where
        Self: 'a;
    type Events<'a>: EventRepository
    where
        Self: 'a;
    type Projections<'a>: ProjectionRepository
    where
        Self: 'a;

    fn tenants(&self) -> Self::Tenants<'_>;
    fn events(&self) -> Self::Events<'_>;
    fn projections(&self) -> Self::Projections<'_>;

    /// Runs `f` inside one write transaction. Any error rolls back everything
    /// `f` wrote.
    fn with_tx<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StoreError>;
}

/// Opens store handles for work that runs off the request path, such as the
/// batch consumer or a rebuild.
pub trait StoreFactory: Clone + Send + Sync + 'static {
    type Store: Store;

    fn open(&self) -> Result<Self::Store, StoreError>;
}
