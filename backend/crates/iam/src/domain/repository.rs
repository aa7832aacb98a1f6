//! Persistence Port
//!
//! Transactional storage for every IAM entity. The engine opens a
//! transaction with [`LocalIamStore::begin`], passes the handle to each call
//! and decides when to commit. Dropping a handle without committing rolls
//! the transaction back, so `?` inside a transaction is always safe.

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    EmailConfirmation, PasswordPatch, RefreshToken, Tenant, User, UserDetailPatch,
};
use crate::domain::page::PageRequest;
use crate::domain::value_object::{
    Email, EmailConfirmationId, RefreshTokenId, Role, TenantId, UserId,
};
use crate::error::IamResult;

#[trait_variant::make(IamStore: Send)]
pub trait LocalIamStore {
    /// Transaction handle; rolls back when dropped uncommitted
    type Tx: Send;

    async fn begin(&self) -> IamResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> IamResult<()>;

    /// Explicit rollback; equivalent to dropping the handle
    async fn rollback(&self, tx: Self::Tx) -> IamResult<()>;

    // ------------------------------------------------------------------
    // Tenants
    // ------------------------------------------------------------------

    async fn find_tenant(&self, tx: &mut Self::Tx, tenant_id: &TenantId)
    -> IamResult<Option<Tenant>>;

    /// All tenants ordered by id
    async fn list_tenants(&self, tx: &mut Self::Tx) -> IamResult<Vec<Tenant>>;

    async fn insert_tenant(&self, tx: &mut Self::Tx, tenant: &Tenant) -> IamResult<()>;

    /// Persist name, description and `updated_at`
    async fn update_tenant(&self, tx: &mut Self::Tx, tenant: &Tenant) -> IamResult<()>;

    async fn delete_tenant(&self, tx: &mut Self::Tx, tenant_id: &TenantId) -> IamResult<bool>;

    async fn count_users_in_tenant(&self, tx: &mut Self::Tx, tenant_id: &TenantId)
    -> IamResult<u64>;

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn insert_user(&self, tx: &mut Self::Tx, user: &User) -> IamResult<()>;

    async fn find_user(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<Option<User>>;

    /// Newest user with this email in the tenant, verified rows first
    async fn find_user_by_email(
        &self,
        tx: &mut Self::Tx,
        tenant_id: &TenantId,
        email: &Email,
    ) -> IamResult<Option<User>>;

    /// One page of users ordered by creation time, plus the total count.
    /// `None` lists every tenant.
    async fn list_users(
        &self,
        tx: &mut Self::Tx,
        tenant_id: Option<&TenantId>,
        page: PageRequest,
    ) -> IamResult<(Vec<User>, u64)>;

    async fn update_user_details(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        patch: &UserDetailPatch,
        now: DateTime<Utc>,
    ) -> IamResult<Option<User>>;

    async fn update_user_password(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        patch: &PasswordPatch,
        now: DateTime<Utc>,
    ) -> IamResult<bool>;

    async fn mark_email_verified(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<bool>;

    /// Hard delete; role links, refresh tokens and confirmation rows go with it
    async fn delete_user(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<bool>;

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    async fn role_exists(&self, tx: &mut Self::Tx, role: &Role) -> IamResult<bool>;

    async fn list_user_roles(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<Vec<Role>>;

    /// `false` if the user already had the role
    async fn assign_role(&self, tx: &mut Self::Tx, user_id: &UserId, role: &Role)
    -> IamResult<bool>;

    /// `false` if the user did not have the role
    async fn remove_role(&self, tx: &mut Self::Tx, user_id: &UserId, role: &Role)
    -> IamResult<bool>;

    // ------------------------------------------------------------------
    // Refresh tokens
    // ------------------------------------------------------------------

    async fn insert_refresh_token(&self, tx: &mut Self::Tx, token: &RefreshToken)
    -> IamResult<()>;

    /// Atomically flip the active row with this hash to revoked and return
    /// it. Of two concurrent callers presenting the same hash, exactly one
    /// gets `Some`.
    async fn revoke_active_refresh_token(
        &self,
        tx: &mut Self::Tx,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> IamResult<Option<RefreshToken>>;

    /// Delete the user's revoked and expired rows
    async fn delete_inactive_refresh_tokens(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<u64>;

    /// The user's active rows, newest first
    async fn list_active_refresh_tokens(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<Vec<RefreshToken>>;

    async fn delete_refresh_tokens(&self, tx: &mut Self::Tx, ids: &[RefreshTokenId])
    -> IamResult<u64>;

    async fn revoke_all_refresh_tokens(&self, tx: &mut Self::Tx, user_id: &UserId)
    -> IamResult<u64>;

    /// Store-wide garbage collection of revoked and expired rows
    async fn purge_expired_refresh_tokens(
        &self,
        tx: &mut Self::Tx,
        now: DateTime<Utc>,
    ) -> IamResult<u64>;

    // ------------------------------------------------------------------
    // Email confirmation
    // ------------------------------------------------------------------

    /// Insert, or replace the user's existing row
    async fn upsert_confirmation(
        &self,
        tx: &mut Self::Tx,
        confirmation: &EmailConfirmation,
    ) -> IamResult<()>;

    async fn find_confirmation(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        code_hash: &str,
    ) -> IamResult<Option<EmailConfirmation>>;

    /// Set `used_at` if still unset; `false` means someone else got there first
    async fn mark_confirmation_used(
        &self,
        tx: &mut Self::Tx,
        confirmation_id: &EmailConfirmationId,
        now: DateTime<Utc>,
    ) -> IamResult<bool>;

    /// Store-wide garbage collection of used and expired rows
    async fn purge_stale_confirmations(&self, tx: &mut Self::Tx, now: DateTime<Utc>)
    -> IamResult<u64>;
}
