//! User Management
//!
//! Administrative and self-service operations on existing users. Every
//! call authorizes through a [`Principal`] predicate inside the same
//! transaction that reads the target.

use chrono::{DateTime, Utc};
use platform::password::ClearTextPassword;
use serde::Serialize;

use crate::application::context::IamContext;
use crate::domain::entity::{PasswordPatch, User, UserDetailPatch};
use crate::domain::page::{Page, PageRequest};
use crate::domain::principal::Principal;
use crate::domain::repository::IamStore;
use crate::domain::value_object::{Email, Role, TenantId, UserId};
use crate::error::{IamError, IamResult};

/// User as shown to callers; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            tenant_id: user.tenant_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            active: user.active,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Roles of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoles {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

pub struct UserManagement<S: IamStore> {
    ctx: IamContext<S>,
}

impl<S: IamStore> UserManagement<S> {
    pub fn new(ctx: IamContext<S>) -> Self {
        Self { ctx }
    }

    pub async fn load_user(&self, principal: &Principal, user_id: &str) -> IamResult<UserSummary> {
        let user_id = required_user_id(user_id)?;
        let mut tx = self.ctx.store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_fetch_user(&user.user_id, &user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to fetch user"));
        }

        self.ctx.store.commit(tx).await?;
        Ok(user.into())
    }

    /// Admins see the tenant's users; everyone else sees only themselves
    pub async fn list_users_by_tenant(
        &self,
        principal: &Principal,
        tenant_id: &str,
        page: PageRequest,
    ) -> IamResult<Page<UserSummary>> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(IamError::InvalidInput("tenant id is required".into()));
        }
        let tenant_id = TenantId::new(tenant_id);

        tracing::debug!(
            principal = %principal,
            tenant_id = %tenant_id,
            page = page.page(),
            limit = page.limit(),
            "Listing users by tenant"
        );

        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let result = if principal.can_list_users_for_tenant(&tenant_id) {
            let (users, total) = store.list_users(&mut tx, Some(&tenant_id), page).await?;
            Page::new(users, page, total)
        } else {
            let own: Vec<User> = store
                .find_user(&mut tx, &principal.user_id)
                .await?
                .filter(|user| user.tenant_id == tenant_id)
                .into_iter()
                .collect();
            let total = own.len() as u64;
            let items = if page.offset() < total { own } else { Vec::new() };
            Page::new(items, page, total)
        };

        store.commit(tx).await?;
        Ok(result.map(UserSummary::from))
    }

    pub async fn list_all_users(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> IamResult<Page<UserSummary>> {
        if !principal.is_sys_admin() {
            return Err(denied(principal, "insufficient permissions to list all users"));
        }

        let store = &self.ctx.store;
        let mut tx = store.begin().await?;
        let (users, total) = store.list_users(&mut tx, None, page).await?;
        store.commit(tx).await?;

        Ok(Page::new(users, page, total).map(UserSummary::from))
    }

    pub async fn get_user_roles(&self, principal: &Principal, user_id: &str) -> IamResult<UserRoles> {
        let user_id = required_user_id(user_id)?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_fetch_user(&user.user_id, &user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to get user roles"));
        }
        let roles = store.list_user_roles(&mut tx, &user.user_id).await?;

        store.commit(tx).await?;
        Ok(UserRoles {
            user_id: user.user_id,
            roles,
        })
    }

    pub async fn assign_role(
        &self,
        principal: &Principal,
        user_id: &str,
        role: &str,
    ) -> IamResult<()> {
        let user_id = required_user_id(user_id)?;
        let role = required_role(role)?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_manage_user(&user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to assign roles"));
        }
        if role.is_protected() {
            return Err(denied(principal, "cannot assign sysadmin role"));
        }
        if !store.role_exists(&mut tx, &role).await? {
            return Err(IamError::RoleNotFound(role.code().to_string()));
        }
        if !store.assign_role(&mut tx, &user_id, &role).await? {
            return Err(IamError::RoleAlreadyAssigned(role.code().to_string()));
        }

        store.commit(tx).await?;

        tracing::info!(
            principal = %principal,
            user_id = %user_id,
            role = role.code(),
            "Role assigned"
        );
        Ok(())
    }

    pub async fn remove_role(
        &self,
        principal: &Principal,
        user_id: &str,
        role: &str,
    ) -> IamResult<()> {
        let user_id = required_user_id(user_id)?;
        let role = required_role(role)?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_manage_user(&user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to remove roles"));
        }
        if !store.remove_role(&mut tx, &user_id, &role).await? {
            return Err(IamError::RoleNotAssigned(role.code().to_string()));
        }

        store.commit(tx).await?;

        tracing::info!(
            principal = %principal,
            user_id = %user_id,
            role = role.code(),
            "Role removed"
        );
        Ok(())
    }

    pub async fn delete_user(&self, principal: &Principal, user_id: &str) -> IamResult<()> {
        let user_id = required_user_id(user_id)?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_manage_user(&user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to delete user"));
        }
        store.delete_user(&mut tx, &user_id).await?;

        store.commit(tx).await?;

        tracing::info!(principal = %principal, user_id = %user_id, "User deleted");
        Ok(())
    }

    pub async fn update_user_details(
        &self,
        principal: &Principal,
        user_id: &str,
        patch: UserDetailPatch,
    ) -> IamResult<UserSummary> {
        let user_id = required_user_id(user_id)?;
        let patch = patch.normalized()?;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_update_user_details(&user.user_id, &user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to update user details"));
        }
        let updated = store
            .update_user_details(&mut tx, &user_id, &patch, self.ctx.now())
            .await?
            .ok_or(IamError::UserNotFound)?;

        store.commit(tx).await?;

        tracing::info!(principal = %principal, user_id = %user_id, "User details updated");
        Ok(updated.into())
    }

    /// Replace a password and end every session of the user
    ///
    /// A principal changing its own password must present the current one.
    pub async fn change_password(
        &self,
        principal: &Principal,
        user_id: &str,
        current_password: Option<String>,
        new_password: String,
    ) -> IamResult<()> {
        let user_id = required_user_id(user_id)?;
        let new_password = ClearTextPassword::new(new_password)
            .map_err(|e| IamError::InvalidInput(e.to_string()))?;
        let config = &self.ctx.config;
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        if !principal.can_update_user_details(&user.user_id, &user.tenant_id) {
            return Err(denied(principal, "insufficient permissions to change user password"));
        }

        if principal.user_id == user.user_id {
            let current = ClearTextPassword::unchecked(current_password.unwrap_or_default());
            if !user.password_hash.verify(&current, config.pepper()) {
                return Err(IamError::InvalidCredentials);
            }
        }

        let patch = PasswordPatch {
            hash: new_password.hash(config.password_cost, config.pepper())?,
        };
        if !store
            .update_user_password(&mut tx, &user_id, &patch, self.ctx.now())
            .await?
        {
            return Err(IamError::UserNotFound);
        }
        let revoked = store.revoke_all_refresh_tokens(&mut tx, &user_id).await?;

        store.commit(tx).await?;

        tracing::info!(
            principal = %principal,
            user_id = %user_id,
            revoked,
            "Password changed"
        );
        Ok(())
    }

    pub async fn validate_user_password_matches(
        &self,
        user_id: &str,
        password: String,
    ) -> IamResult<bool> {
        let user_id = required_user_id(user_id)?;
        let mut tx = self.ctx.store.begin().await?;
        let user = self.ctx.require_user(&mut tx, &user_id).await?;
        self.ctx.store.commit(tx).await?;

        let password = ClearTextPassword::unchecked(password);
        Ok(user.password_hash.verify(&password, self.ctx.config.pepper()))
    }
}

fn required_user_id(raw: &str) -> IamResult<UserId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IamError::InvalidInput("user id is required".into()));
    }
    Ok(UserId::new(raw))
}

fn required_role(raw: &str) -> IamResult<Role> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IamError::InvalidInput("role name is required".into()));
    }
    Ok(Role::from_code(raw))
}

fn denied(principal: &Principal, reason: &str) -> IamError {
    tracing::warn!(principal = %principal, "{}", reason);
    IamError::NoPermissions(reason.to_string())
}
