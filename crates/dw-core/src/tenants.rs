use crate::error::TenantError;
use crate::types::{NewTenant, Tenant, TenantId};

pub trait TenantRepository {
    fn create(&self, input: &NewTenant) -> Result<Tenant, TenantError>;
    fn get(&self, id: TenantId) -> Result<Option<Tenant>, TenantError>;
    fn get_by_auth_token(&self, token: &str) -> Result<Option<Tenant>, TenantError>;
    fn list(&self) -> Result<Vec<Tenant>, TenantError>;
    fn set_enabled(&self, id: TenantId, enabled: bool) -> Result<Tenant, TenantError>;
    /// Deletes the tenant together with its events and projections.
    fn delete(&self, id: TenantId) -> Result<(), TenantError>;
}
