//! Tenant Management

use crate::application::context::IamContext;
use crate::domain::entity::{Tenant, TenantPatch};
use crate::domain::principal::Principal;
use crate::domain::repository::IamStore;
use crate::domain::value_object::TenantId;
use crate::error::{IamError, IamResult};

/// Create tenant input
pub struct NewTenant {
    pub id: String,
    pub name: String,
    pub description: String,
}

pub struct TenantManagement<S: IamStore> {
    ctx: IamContext<S>,
}

impl<S: IamStore> TenantManagement<S> {
    pub fn new(ctx: IamContext<S>) -> Self {
        Self { ctx }
    }

    /// Tenants the principal may read, ordered by id
    pub async fn list_tenants(&self, principal: &Principal) -> IamResult<Vec<Tenant>> {
        let mut tx = self.ctx.store.begin().await?;
        let tenants = self.ctx.store.list_tenants(&mut tx).await?;
        self.ctx.store.commit(tx).await?;

        Ok(tenants
            .into_iter()
            .filter(|tenant| principal.can_read_tenant(&tenant.tenant_id))
            .collect())
    }

    pub async fn get_tenant(&self, principal: &Principal, tenant_id: &str) -> IamResult<Tenant> {
        let tenant_id = required_tenant_id(tenant_id)?;
        let mut tx = self.ctx.store.begin().await?;
        let tenant = self.ctx.require_tenant(&mut tx, &tenant_id).await?;
        self.ctx.store.commit(tx).await?;

        if !principal.can_read_tenant(&tenant.tenant_id) {
            return Err(IamError::NoPermissions(
                "insufficient permissions to get tenant".into(),
            ));
        }
        Ok(tenant)
    }

    /// Sysadmin only
    pub async fn create_tenant(&self, principal: &Principal, input: NewTenant) -> IamResult<Tenant> {
        if !principal.is_sys_admin() {
            tracing::warn!(principal = %principal, "Tenant creation denied");
            return Err(IamError::NoPermissions(
                "insufficient permissions to create tenant".into(),
            ));
        }
        let tenant = Tenant::new(&input.id, &input.name, &input.description, self.ctx.now())?;

        let store = &self.ctx.store;
        let mut tx = store.begin().await?;
        if store.find_tenant(&mut tx, &tenant.tenant_id).await?.is_some() {
            return Err(IamError::DuplicateTenant);
        }
        store.insert_tenant(&mut tx, &tenant).await?;
        store.commit(tx).await?;

        tracing::info!(
            principal = %principal,
            tenant_id = %tenant.tenant_id,
            name = %tenant.name,
            "Tenant created"
        );
        Ok(tenant)
    }

    pub async fn update_tenant(
        &self,
        principal: &Principal,
        tenant_id: &str,
        patch: TenantPatch,
    ) -> IamResult<Tenant> {
        let tenant_id = required_tenant_id(tenant_id)?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let mut tenant = self.ctx.require_tenant(&mut tx, &tenant_id).await?;
        if !principal.can_manage_tenant(&tenant.tenant_id) {
            tracing::warn!(principal = %principal, tenant_id = %tenant_id, "Tenant update denied");
            return Err(IamError::NoPermissions(
                "insufficient permissions to update tenant".into(),
            ));
        }
        patch.apply(&mut tenant, self.ctx.now())?;
        store.update_tenant(&mut tx, &tenant).await?;
        store.commit(tx).await?;

        tracing::info!(principal = %principal, tenant_id = %tenant_id, "Tenant updated");
        Ok(tenant)
    }

    /// Only an empty tenant can be deleted
    pub async fn delete_tenant(&self, principal: &Principal, tenant_id: &str) -> IamResult<()> {
        let tenant_id = required_tenant_id(tenant_id)?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let tenant = self.ctx.require_tenant(&mut tx, &tenant_id).await?;
        if !principal.can_manage_tenant(&tenant.tenant_id) {
            tracing::warn!(principal = %principal, tenant_id = %tenant_id, "Tenant deletion denied");
            return Err(IamError::NoPermissions(
                "insufficient permissions to delete tenant".into(),
            ));
        }
        if store.count_users_in_tenant(&mut tx, &tenant_id).await? > 0 {
            return Err(IamError::TenantHasUsers);
        }
        store.delete_tenant(&mut tx, &tenant_id).await?;
        store.commit(tx).await?;

        tracing::info!(principal = %principal, tenant_id = %tenant_id, "Tenant deleted");
        Ok(())
    }
}

fn required_tenant_id(raw: &str) -> IamResult<TenantId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IamError::InvalidInput("tenant id is required".into()));
    }
    Ok(TenantId::new(raw))
}
