use dw_core::error::{StoreError, TenantError};
use dw_core::tenants::TenantRepository;
use dw_core::types::{NewTenant, Tenant, TenantId};
use rusqlite::{Connection, ErrorCode, params};

use crate::util::{from_rfc3339, tenant_id, to_rfc3339};

const TENANT_COLUMNS: &str = "id, name, auth_token, webhook_secret, enabled, created_at";

pub struct TenantRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> TenantRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_one(
        &self,
        sql: &str,
        param: &dyn rusqlite::ToSql,
    ) -> Result<Option<Tenant>, TenantError> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let mut rows = stmt.query([param]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_tenant_row(row).map(Some)
    }
}

fn db_err(err: rusqlite::Error) -> TenantError {
    TenantError::Store(StoreError::storage(err))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}

fn require(field: &str, value: &str) -> Result<String, TenantError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TenantError::InvalidInput {
            message: format!("{field} is required"),
        });
    }
    Ok(value.to_string())
}

impl TenantRepository for TenantRepo<'_> {
    fn create(&self, input: &NewTenant) -> Result<Tenant, TenantError> {
        let name = require("name", &input.name)?;
        let auth_token = require("auth_token", &input.auth_token)?;
        let webhook_secret = require("webhook_secret", &input.webhook_secret)?;
        let created_at = chrono::Utc::now();

        self.conn
            .execute(
                "INSERT INTO tenants (name, auth_token, webhook_secret, enabled, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    auth_token,
                    webhook_secret,
                    input.enabled,
                    to_rfc3339(&created_at)
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    TenantError::TokenConflict
                } else {
                    db_err(err)
                }
            })?;

        let id = tenant_id(self.conn.last_insert_rowid())?;
        self.get(id)?.ok_or(TenantError::NotFound)
    }

    fn get(&self, id: TenantId) -> Result<Option<Tenant>, TenantError> {
        self.query_one(
            &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"),
            &id.get(),
        )
    }

    fn get_by_auth_token(&self, token: &str) -> Result<Option<Tenant>, TenantError> {
        self.query_one(
            &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE auth_token = ?1"),
            &token,
        )
    }

    fn list(&self) -> Result<Vec<Tenant>, TenantError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TENANT_COLUMNS} FROM tenants ORDER BY id ASC"))
            .map_err(db_err)?;
        let mut rows = stmt.query([]).map_err(db_err)?;
        let mut tenants = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            tenants.push(map_tenant_row(row)?);
        }
        Ok(tenants)
    }

    fn set_enabled(&self, id: TenantId, enabled: bool) -> Result<Tenant, TenantError> {
        let updated = self
            .conn
            .execute(
                "UPDATE tenants SET enabled = ?1 WHERE id = ?2",
                params![enabled, id.get()],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(TenantError::NotFound);
        }
        self.get(id)?.ok_or(TenantError::NotFound)
    }

    fn delete(&self, id: TenantId) -> Result<(), TenantError> {
        let deleted = self
            .conn
            .execute("DELETE FROM tenants WHERE id = ?1", [id.get()])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(TenantError::NotFound);
        }
        Ok(())
    }
}

fn map_tenant_row(row: &rusqlite::Row<'_>) -> Result<Tenant, TenantError> {
    let id: i64 = row.get(0).map_err(db_err)?;
    let name: String = row.get(1).map_err(db_err)?;
    let auth_token: String = row.get(2).map_err(db_err)?;
    let webhook_secret: String = row.get(3).map_err(db_err)?;
    let enabled: bool = row.get(4).map_err(db_err)?;
    let created_at: String = row.get(5).map_err(db_err)?;

    Ok(Tenant {
        id: tenant_id(id)?,
        name,
        auth_token,
        webhook_secret,
        enabled,
        created_at: from_rfc3339(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;

    fn new_tenant(name: &str, token: &str) -> NewTenant {
        NewTenant {
            name: name.to_string(),
            auth_token: token.to_string(),
            webhook_secret: format!("{name}-secret"),
            enabled: true,
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let conn = with_test_db().unwrap();
        let repo = TenantRepo::new(&conn);

        let tenant = repo.create(&new_tenant("acme", " tok-acme ")).unwrap();
        assert_eq!(tenant.id.get(), 1);
        assert_eq!(tenant.auth_token, "tok-acme");
        assert!(tenant.enabled);

        let found = repo.get_by_auth_token("tok-acme").unwrap().unwrap();
        assert_eq!(found, tenant);
        assert!(repo.get_by_auth_token("missing").unwrap().is_none());
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_token_conflicts() {
        let conn = with_test_db().unwrap();
        let repo = TenantRepo::new(&conn);
        repo.create(&new_tenant("acme", "shared")).unwrap();
        let err = repo.create(&new_tenant("globex", "shared")).unwrap_err();
        assert_eq!(err, TenantError::TokenConflict);
    }

    #[test]
    fn test_blank_fields_rejected() {
        let conn = with_test_db().unwrap();
        let repo = TenantRepo::new(&conn);
        let err = repo.create(&new_tenant("acme", "  ")).unwrap_err();
        assert!(matches!(err, TenantError::InvalidInput { .. }));
    }

    #[test]
    fn test_set_enabled_and_delete() {
        let conn = with_test_db().unwrap();
        let repo = TenantRepo::new(&conn);
        let tenant = repo.create(&new_tenant("acme", "tok")).unwrap();

        let disabled = repo.set_enabled(tenant.id, false).unwrap();
        assert!(!disabled.enabled);

        repo.delete(tenant.id).unwrap();
        assert!(repo.get(tenant.id).unwrap().is_none());
        assert_eq!(repo.delete(tenant.id).unwrap_err(), TenantError::NotFound);

        let missing = TenantId::new(42).unwrap();
        assert_eq!(
            repo.set_enabled(missing, true).unwrap_err(),
            TenantError::NotFound
        );
    }
}
