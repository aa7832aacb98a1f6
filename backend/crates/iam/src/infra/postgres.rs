//! PostgreSQL Store
//!
//! [`IamStore`] over sqlx. The transaction handle is a
//! `sqlx::Transaction`, which rolls back when dropped uncommitted.

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::entity::{
    EmailConfirmation, PasswordPatch, RefreshToken, Tenant, User, UserDetailPatch,
};
use crate::domain::page::PageRequest;
use crate::domain::repository::IamStore;
use crate::domain::value_object::{
    Email, EmailConfirmationId, RefreshTokenId, Role, SignupSource, TenantId, UserId,
};
use crate::error::{IamError, IamResult};

const USER_COLUMNS: &str = r#"
    user_id,
    tenant_id,
    email,
    password_hash,
    first_name,
    last_name,
    is_active,
    email_verified,
    created_at,
    updated_at
"#;

const REFRESH_TOKEN_COLUMNS: &str = r#"
    refresh_token_id,
    user_id,
    token_hash,
    issued_at,
    expires_at,
    revoked
"#;

/// PostgreSQL-backed IAM store
#[derive(Clone)]
pub struct PgIamStore {
    pool: PgPool,
}

impl PgIamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

impl IamStore for PgIamStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> IamResult<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> IamResult<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> IamResult<()> {
        tx.rollback().await?;
        Ok(())
    }

    // ========================================================================
    // Tenants
    // ========================================================================

    async fn find_tenant(&self, tx: &mut Self::Tx, tenant_id: &TenantId) -> IamResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT tenant_id, name, description, created_at, updated_at
            FROM tenants
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(TenantRow::into_tenant))
    }

    async fn list_tenants(&self, tx: &mut Self::Tx) -> IamResult<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT tenant_id, name, description, created_at, updated_at
            FROM tenants
            ORDER BY tenant_id
            "#,
        )
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(TenantRow::into_tenant).collect())
    }

    async fn insert_tenant(&self, tx: &mut Self::Tx, tenant: &Tenant) -> IamResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (tenant_id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tenant.tenant_id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.description)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                IamError::DuplicateTenant
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn update_tenant(&self, tx: &mut Self::Tx, tenant: &Tenant) -> IamResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET name = $2, description = $3, updated_at = $4
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.tenant_id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.description)
        .bind(tenant.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn delete_tenant(&self, tx: &mut Self::Tx, tenant_id: &TenantId) -> IamResult<bool> {
        let deleted = sqlx::query("DELETE FROM tenants WHERE tenant_id = $1")
            .bind(tenant_id.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn count_users_in_tenant(&self, tx: &mut Self::Tx, tenant_id: &TenantId) -> IamResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant_id.as_str())
            .fetch_one(&mut **tx)
            .await?;

        Ok(to_count(count))
    }

    // ========================================================================
    // Users
    // ========================================================================

    async fn insert_user(&self, tx: &mut Self::Tx, user: &User) -> IamResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                tenant_id,
                email,
                password_hash,
                first_name,
                last_name,
                is_active,
                email_verified,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.user_id.as_str())
        .bind(user.tenant_id.as_str())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_phc_string())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.active)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                IamError::DuplicateAccount
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn find_user(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_user_by_email(
        &self,
        tx: &mut Self::Tx,
        tenant_id: &TenantId,
        email: &Email,
    ) -> IamResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE tenant_id = $1 AND email = $2
            ORDER BY email_verified DESC, created_at DESC
            LIMIT 1
            "#
        ))
        .bind(tenant_id.as_str())
        .bind(email.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn list_users(
        &self,
        tx: &mut Self::Tx,
        tenant_id: Option<&TenantId>,
        page: PageRequest,
    ) -> IamResult<(Vec<User>, u64)> {
        let tenant = tenant_id.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ($1::TEXT IS NULL OR tenant_id = $1)",
        )
        .bind(tenant)
        .fetch_one(&mut **tx)
        .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::TEXT IS NULL OR tenant_id = $1)
            ORDER BY created_at, user_id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(tenant)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut **tx)
        .await?;

        let users = rows
            .into_iter()
            .map(UserRow::into_user)
            .collect::<IamResult<Vec<_>>>()?;

        Ok((users, to_count(total)))
    }

    async fn update_user_details(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        patch: &UserDetailPatch,
        now: DateTime<Utc>,
    ) -> IamResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                updated_at = $4
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id.as_str())
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn update_user_password(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        patch: &PasswordPatch,
        now: DateTime<Utc>,
    ) -> IamResult<bool> {
        let updated = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = $3 WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .bind(patch.hash.as_phc_string())
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn mark_email_verified(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<bool> {
        let updated = sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = $2 WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                IamError::DuplicateAccount
            } else {
                e.into()
            }
        })?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn delete_user(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<bool> {
        // Dependent rows go through ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    async fn role_exists(&self, tx: &mut Self::Tx, role: &Role) -> IamResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM roles WHERE role_name = $1)")
                .bind(role.code())
                .fetch_one(&mut **tx)
                .await?;

        Ok(exists)
    }

    async fn list_user_roles(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<Vec<Role>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT role_name
            FROM user_roles
            WHERE user_id = $1
            ORDER BY assigned_at, role_name
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&mut **tx)
        .await?;

        Ok(names.into_iter().map(Role::from).collect())
    }

    async fn assign_role(&self, tx: &mut Self::Tx, user_id: &UserId, role: &Role) -> IamResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_name) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(role.code())
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(inserted > 0)
    }

    async fn remove_role(&self, tx: &mut Self::Tx, user_id: &UserId, role: &Role) -> IamResult<bool> {
        let deleted = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_name = $2")
            .bind(user_id.as_str())
            .bind(role.code())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    // ========================================================================
    // Refresh tokens
    // ========================================================================

    async fn insert_refresh_token(&self, tx: &mut Self::Tx, token: &RefreshToken) -> IamResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                refresh_token_id,
                user_id,
                token_hash,
                issued_at,
                expires_at,
                revoked
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id.as_str())
        .bind(token.user_id.as_str())
        .bind(&token.token_hash)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.revoked)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn revoke_active_refresh_token(
        &self,
        tx: &mut Self::Tx,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> IamResult<Option<RefreshToken>> {
        // Single statement: a concurrent rotation blocks on the row lock and
        // then sees revoked = TRUE, so only one caller gets the row back.
        let row = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE token_hash = $1
              AND revoked = FALSE
              AND expires_at > $2
            RETURNING {REFRESH_TOKEN_COLUMNS}
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(RefreshTokenRow::into_refresh_token))
    }

    async fn delete_inactive_refresh_tokens(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM refresh_tokens WHERE user_id = $1 AND (revoked OR expires_at <= $2)",
        )
        .bind(user_id.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(deleted)
    }

    async fn list_active_refresh_tokens(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IamResult<Vec<RefreshToken>> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            r#"
            SELECT {REFRESH_TOKEN_COLUMNS}
            FROM refresh_tokens
            WHERE user_id = $1 AND revoked = FALSE AND expires_at > $2
            ORDER BY issued_at DESC, seq DESC
            "#
        ))
        .bind(user_id.as_str())
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(RefreshTokenRow::into_refresh_token)
            .collect())
    }

    async fn delete_refresh_tokens(&self, tx: &mut Self::Tx, ids: &[RefreshTokenId]) -> IamResult<u64> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE refresh_token_id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn revoke_all_refresh_tokens(&self, tx: &mut Self::Tx, user_id: &UserId) -> IamResult<u64> {
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id.as_str())
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(revoked)
    }

    async fn purge_expired_refresh_tokens(&self, tx: &mut Self::Tx, now: DateTime<Utc>) -> IamResult<u64> {
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE revoked OR expires_at <= $1")
            .bind(now)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    // ========================================================================
    // Email confirmation
    // ========================================================================

    async fn upsert_confirmation(
        &self,
        tx: &mut Self::Tx,
        confirmation: &EmailConfirmation,
    ) -> IamResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_confirmations (
                confirmation_id,
                user_id,
                email,
                code_hash,
                source,
                expires_at,
                used_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE
            SET confirmation_id = EXCLUDED.confirmation_id,
                email = EXCLUDED.email,
                code_hash = EXCLUDED.code_hash,
                source = EXCLUDED.source,
                expires_at = EXCLUDED.expires_at,
                used_at = EXCLUDED.used_at,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(confirmation.id.as_str())
        .bind(confirmation.user_id.as_str())
        .bind(confirmation.email.as_str())
        .bind(&confirmation.code_hash)
        .bind(confirmation.source.code())
        .bind(confirmation.expires_at)
        .bind(confirmation.used_at)
        .bind(confirmation.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn find_confirmation(
        &self,
        tx: &mut Self::Tx,
        user_id: &UserId,
        code_hash: &str,
    ) -> IamResult<Option<EmailConfirmation>> {
        let row = sqlx::query_as::<_, ConfirmationRow>(
            r#"
            SELECT
                confirmation_id,
                user_id,
                email,
                code_hash,
                source,
                expires_at,
                used_at,
                created_at
            FROM email_confirmations
            WHERE user_id = $1 AND code_hash = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(code_hash)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(ConfirmationRow::into_confirmation).transpose()
    }

    async fn mark_confirmation_used(
        &self,
        tx: &mut Self::Tx,
        confirmation_id: &EmailConfirmationId,
        now: DateTime<Utc>,
    ) -> IamResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE email_confirmations
            SET used_at = $2
            WHERE confirmation_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(confirmation_id.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn purge_stale_confirmations(&self, tx: &mut Self::Tx, now: DateTime<Utc>) -> IamResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM email_confirmations WHERE used_at IS NOT NULL OR expires_at <= $1",
        )
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct TenantRow {
    tenant_id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn into_tenant(self) -> Tenant {
        Tenant {
            tenant_id: TenantId::new(self.tenant_id),
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    tenant_id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> IamResult<User> {
        let password_hash = HashedPassword::from_phc_string(self.password_hash)
            .map_err(|e| IamError::Internal(format!("invalid password hash for {}: {}", self.user_id, e)))?;

        Ok(User {
            user_id: UserId::new(self.user_id),
            tenant_id: TenantId::new(self.tenant_id),
            email: Email::from_db(self.email),
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            active: self.is_active,
            email_verified: self.email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    refresh_token_id: String,
    user_id: String,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl RefreshTokenRow {
    fn into_refresh_token(self) -> RefreshToken {
        RefreshToken {
            id: RefreshTokenId::new(self.refresh_token_id),
            user_id: UserId::new(self.user_id),
            token_hash: self.token_hash,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            revoked: self.revoked,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConfirmationRow {
    confirmation_id: String,
    user_id: String,
    email: String,
    code_hash: String,
    source: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ConfirmationRow {
    fn into_confirmation(self) -> IamResult<EmailConfirmation> {
        let source: SignupSource = self
            .source
            .parse()
            .map_err(|_| IamError::Internal(format!("invalid confirmation source: {}", self.source)))?;

        Ok(EmailConfirmation {
            id: EmailConfirmationId::new(self.confirmation_id),
            user_id: UserId::new(self.user_id),
            email: Email::from_db(self.email),
            code_hash: self.code_hash,
            source,
            expires_at: self.expires_at,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}
