//! Principal & Role Model
//!
//! Pure authorization decisions. Every permission check in the engine goes
//! through one of these predicates; there is no other way to be allowed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::value_object::{Role, TenantId, UserId};

/// The authenticated caller as reconstructed from a validated access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: UserId, tenant_id: TenantId, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
        }
    }

    #[inline]
    fn has(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_sys_admin(&self) -> bool {
        self.has(&Role::SysAdmin)
    }

    /// Admin or sysadmin
    pub fn is_admin(&self) -> bool {
        self.has(&Role::Admin) || self.is_sys_admin()
    }

    pub fn is_user(&self) -> bool {
        self.has(&Role::User)
    }

    /// Plain user with no elevated role
    pub fn is_user_only(&self) -> bool {
        self.is_user() && !self.roles.iter().any(Role::is_elevated)
    }

    fn is_admin_of(&self, tenant_id: &TenantId) -> bool {
        self.is_sys_admin() || (self.is_admin() && &self.tenant_id == tenant_id)
    }

    pub fn can_fetch_user(&self, target_user_id: &UserId, target_tenant_id: &TenantId) -> bool {
        self.is_admin_of(target_tenant_id) || &self.user_id == target_user_id
    }

    pub fn can_update_user_details(
        &self,
        target_user_id: &UserId,
        target_tenant_id: &TenantId,
    ) -> bool {
        self.can_fetch_user(target_user_id, target_tenant_id)
    }

    /// Role assignment and deletion of users in a tenant
    pub fn can_manage_user(&self, target_tenant_id: &TenantId) -> bool {
        self.is_admin_of(target_tenant_id)
    }

    pub fn can_manage_tenant(&self, target_tenant_id: &TenantId) -> bool {
        self.is_admin_of(target_tenant_id)
    }

    pub fn can_list_users_for_tenant(&self, target_tenant_id: &TenantId) -> bool {
        self.is_admin_of(target_tenant_id)
    }

    pub fn can_read_tenant(&self, target_tenant_id: &TenantId) -> bool {
        self.is_sys_admin() || &self.tenant_id == target_tenant_id
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<&str> = self.roles.iter().map(Role::code).collect();
        write!(
            f,
            "{}@{} [{}]",
            self.user_id,
            self.tenant_id,
            roles.join(",")
        )
    }
}
