//! In-Memory Store
//!
//! [`IamStore`] over process memory. A transaction holds the store lock
//! from `begin` until commit or drop, so transactions are fully serialized,
//! and an uncommitted transaction restores the snapshot taken at `begin`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::entity::{
    EmailConfirmation, PasswordPatch, RefreshToken, Tenant, User, UserDetailPatch,
};
use crate::domain::page::PageRequest;
use crate::domain::repository::IamStore;
use crate::domain::value_object::{
    Email, EmailConfirmationId, RefreshTokenId, Role, TenantId, UserId,
};
use crate::error::{IamError, IamResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tenants: BTreeMap<TenantId, Tenant>,
    /// Insertion order is creation order
    users: Vec<User>,
    roles: BTreeSet<Role>,
    user_roles: HashMap<UserId, Vec<Role>>,
    /// Insertion order is issue order
    refresh_tokens: Vec<RefreshToken>,
    confirmations: HashMap<UserId, EmailConfirmation>,
}

impl MemoryState {
    fn user_mut(&mut self, user_id: &UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| &u.user_id == user_id)
    }
}

/// Shared, cloneable in-memory store
#[derive(Debug, Clone)]
pub struct MemoryIamStore {
    state: Arc<Mutex<MemoryState>>,
}

/// Open transaction on a [`MemoryIamStore`]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

impl MemoryIamStore {
    /// Empty store knowing the built-in roles
    pub fn new() -> Self {
        Self::with_roles([])
    }

    /// Built-in roles plus tenant-defined extras
    pub fn with_roles(extra: impl IntoIterator<Item = Role>) -> Self {
        let mut state = MemoryState::default();
        state.roles.extend([Role::User, Role::Admin, Role::SysAdmin]);
        state.roles.extend(extra);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Number of refresh-token rows for a user, whatever their state
    pub async fn refresh_token_rows(&self, user_id: &UserId) -> usize {
        let state = self.state.lock().await;
        state
            .refresh_tokens
            .iter()
            .filter(|t| &t.user_id == user_id)
            .count()
    }

    /// The user's current confirmation row, if any
    pub async fn confirmation_for(&self, user_id: &UserId) -> Option<EmailConfirmation> {
        self.state.lock().await.confirmations.get(user_id).cloned()
    }
}

impl Default for MemoryIamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IamStore for MemoryIamStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> IamResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = Some(guard.clone());
        Ok(MemoryTx { guard, snapshot })
    }

    async fn commit(&self, mut tx: MemoryTx) -> IamResult<()> {
        tx.snapshot = None;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> IamResult<()> {
        drop(tx);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tenants
    // ------------------------------------------------------------------

    async fn find_tenant(&self, tx: &mut MemoryTx, tenant_id: &TenantId) -> IamResult<Option<Tenant>> {
        Ok(tx.guard.tenants.get(tenant_id).cloned())
    }

    async fn list_tenants(&self, tx: &mut MemoryTx) -> IamResult<Vec<Tenant>> {
        Ok(tx.guard.tenants.values().cloned().collect())
    }

    async fn insert_tenant(&self, tx: &mut MemoryTx, tenant: &Tenant) -> IamResult<()> {
        tx.guard
            .tenants
            .insert(tenant.tenant_id.clone(), tenant.clone());
        Ok(())
    }

    async fn update_tenant(&self, tx: &mut MemoryTx, tenant: &Tenant) -> IamResult<()> {
        if let Some(existing) = tx.guard.tenants.get_mut(&tenant.tenant_id) {
            existing.name = tenant.name.clone();
            existing.description = tenant.description.clone();
            existing.updated_at = tenant.updated_at;
        }
        Ok(())
    }

    async fn delete_tenant(&self, tx: &mut MemoryTx, tenant_id: &TenantId) -> IamResult<bool> {
        Ok(tx.guard.tenants.remove(tenant_id).is_some())
    }

    async fn count_users_in_tenant(&self, tx: &mut MemoryTx, tenant_id: &TenantId) -> IamResult<u64> {
        Ok(tx
            .guard
            .users
            .iter()
            .filter(|u| &u.tenant_id == tenant_id)
            .count() as u64)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn insert_user(&self, tx: &mut MemoryTx, user: &User) -> IamResult<()> {
        tx.guard.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, tx: &mut MemoryTx, user_id: &UserId) -> IamResult<Option<User>> {
        Ok(tx
            .guard
            .users
            .iter()
            .find(|u| &u.user_id == user_id)
            .cloned())
    }

    async fn find_user_by_email(
        &self,
        tx: &mut MemoryTx,
        tenant_id: &TenantId,
        email: &Email,
    ) -> IamResult<Option<User>> {
        let candidates = tx
            .guard
            .users
            .iter()
            .rev()
            .filter(|u| &u.tenant_id == tenant_id && &u.email == email);
        let mut best: Option<&User> = None;
        for user in candidates {
            match best {
                Some(b) if b.email_verified || !user.email_verified => {}
                _ => best = Some(user),
            }
        }
        Ok(best.cloned())
    }

    async fn list_users(
        &self,
        tx: &mut MemoryTx,
        tenant_id: Option<&TenantId>,
        page: PageRequest,
    ) -> IamResult<(Vec<User>, u64)> {
        let matching: Vec<&User> = tx
            .guard
            .users
            .iter()
            .filter(|u| tenant_id.is_none_or(|t| &u.tenant_id == t))
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn update_user_details(
        &self,
        tx: &mut MemoryTx,
        user_id: &UserId,
        patch: &UserDetailPatch,
        now: DateTime<Utc>,
    ) -> IamResult<Option<User>> {
        Ok(tx.guard.user_mut(user_id).map(|user| {
            patch.apply(user, now);
            user.clone()
        }))
    }

    async fn update_user_password(
        &self,
        tx: &mut MemoryTx,
        user_id: &UserId,
        patch: &PasswordPatch,
        now: DateTime<Utc>,
    ) -> IamResult<bool> {
        Ok(tx
            .guard
            .user_mut(user_id)
            .map(|user| {
                user.password_hash = patch.hash.clone();
                user.updated_at = now;
            })
            .is_some())
    }

    async fn mark_email_verified(
        &self,
        tx: &mut MemoryTx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<bool> {
        let state = &mut *tx.guard;
        let Some(target) = state.users.iter().find(|u| &u.user_id == user_id) else {
            return Ok(false);
        };
        // Same rule as the users_verified_email_per_tenant index
        let taken = state.users.iter().any(|u| {
            u.email_verified
                && &u.user_id != user_id
                && u.tenant_id == target.tenant_id
                && u.email == target.email
        });
        if taken {
            return Err(IamError::DuplicateAccount);
        }

        if let Some(user) = state.user_mut(user_id) {
            user.email_verified = true;
            user.updated_at = now;
        }
        Ok(true)
    }

    async fn delete_user(&self, tx: &mut MemoryTx, user_id: &UserId) -> IamResult<bool> {
        let state = &mut *tx.guard;
        let before = state.users.len();
        state.users.retain(|u| &u.user_id != user_id);
        if state.users.len() == before {
            return Ok(false);
        }
        state.user_roles.remove(user_id);
        state.refresh_tokens.retain(|t| &t.user_id != user_id);
        state.confirmations.remove(user_id);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    async fn role_exists(&self, tx: &mut MemoryTx, role: &Role) -> IamResult<bool> {
        Ok(tx.guard.roles.contains(role))
    }

    async fn list_user_roles(&self, tx: &mut MemoryTx, user_id: &UserId) -> IamResult<Vec<Role>> {
        Ok(tx.guard.user_roles.get(user_id).cloned().unwrap_or_default())
    }

    async fn assign_role(&self, tx: &mut MemoryTx, user_id: &UserId, role: &Role) -> IamResult<bool> {
        let roles = tx.guard.user_roles.entry(user_id.clone()).or_default();
        if roles.contains(role) {
            return Ok(false);
        }
        roles.push(role.clone());
        Ok(true)
    }

    async fn remove_role(&self, tx: &mut MemoryTx, user_id: &UserId, role: &Role) -> IamResult<bool> {
        let Some(roles) = tx.guard.user_roles.get_mut(user_id) else {
            return Ok(false);
        };
        let before = roles.len();
        roles.retain(|r| r != role);
        Ok(roles.len() != before)
    }

    // ------------------------------------------------------------------
    // Refresh tokens
    // ------------------------------------------------------------------

    async fn insert_refresh_token(&self, tx: &mut MemoryTx, token: &RefreshToken) -> IamResult<()> {
        tx.guard.refresh_tokens.push(token.clone());
        Ok(())
    }

    async fn revoke_active_refresh_token(
        &self,
        tx: &mut MemoryTx,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> IamResult<Option<RefreshToken>> {
        Ok(tx
            .guard
            .refresh_tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && t.is_active(now))
            .map(|t| {
                t.revoked = true;
                t.clone()
            }))
    }

    async fn delete_inactive_refresh_tokens(
        &self,
        tx: &mut MemoryTx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<u64> {
        let tokens = &mut tx.guard.refresh_tokens;
        let before = tokens.len();
        tokens.retain(|t| &t.user_id != user_id || t.is_active(now));
        Ok((before - tokens.len()) as u64)
    }

    async fn list_active_refresh_tokens(
        &self,
        tx: &mut MemoryTx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<Vec<RefreshToken>> {
        // Reverse insertion order first so equal timestamps stay newest-first
        let mut active: Vec<RefreshToken> = tx
            .guard
            .refresh_tokens
            .iter()
            .rev()
            .filter(|t| &t.user_id == user_id && t.is_active(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(active)
    }

    async fn delete_refresh_tokens(&self, tx: &mut MemoryTx, ids: &[RefreshTokenId]) -> IamResult<u64> {
        let tokens = &mut tx.guard.refresh_tokens;
        let before = tokens.len();
        tokens.retain(|t| !ids.contains(&t.id));
        Ok((before - tokens.len()) as u64)
    }

    async fn revoke_all_refresh_tokens(&self, tx: &mut MemoryTx, user_id: &UserId) -> IamResult<u64> {
        let mut revoked = 0;
        for token in tx
            .guard
            .refresh_tokens
            .iter_mut()
            .filter(|t| &t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn purge_expired_refresh_tokens(&self, tx: &mut MemoryTx, now: DateTime<Utc>) -> IamResult<u64> {
        let tokens = &mut tx.guard.refresh_tokens;
        let before = tokens.len();
        tokens.retain(|t| t.is_active(now));
        Ok((before - tokens.len()) as u64)
    }

    // ------------------------------------------------------------------
    // Email confirmation
    // ------------------------------------------------------------------

    async fn upsert_confirmation(
        &self,
        tx: &mut MemoryTx,
        confirmation: &EmailConfirmation,
    ) -> IamResult<()> {
        tx.guard
            .confirmations
            .insert(confirmation.user_id.clone(), confirmation.clone());
        Ok(())
    }

    async fn find_confirmation(
        &self,
        tx: &mut MemoryTx,
        user_id: &UserId,
        code_hash: &str,
    ) -> IamResult<Option<EmailConfirmation>> {
        Ok(tx
            .guard
            .confirmations
            .get(user_id)
            .filter(|c| c.code_hash == code_hash)
            .cloned())
    }

    async fn mark_confirmation_used(
        &self,
        tx: &mut MemoryTx,
        confirmation_id: &EmailConfirmationId,
        now: DateTime<Utc>,
    ) -> IamResult<bool> {
        Ok(tx
            .guard
            .confirmations
            .values_mut()
            .find(|c| &c.id == confirmation_id && c.used_at.is_none())
            .map(|c| c.used_at = Some(now))
            .is_some())
    }

    async fn purge_stale_confirmations(&self, tx: &mut MemoryTx, now: DateTime<Utc>) -> IamResult<u64> {
        let confirmations = &mut tx.guard.confirmations;
        let before = confirmations.len();
        confirmations.retain(|_, c| !c.is_stale(now));
        Ok((before - confirmations.len()) as u64)
    }
}
