//! Engine Context
//!
//! Collaborators every use case shares: the store, configuration and the
//! injectable clock and random source.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::Id;
use platform::clock::{Clock, SystemClock};
use platform::crypto::random_uuid;
use platform::random::{OsRandom, SecureRandom};

use crate::application::config::IamConfig;
use crate::domain::entity::{Tenant, User};
use crate::domain::repository::IamStore;
use crate::domain::value_object::{TenantId, UserId};
use crate::error::{IamError, IamResult};

pub struct IamContext<S: IamStore> {
    pub store: Arc<S>,
    pub config: Arc<IamConfig>,
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn SecureRandom>,
}

impl<S: IamStore> Clone for IamContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            random: self.random.clone(),
        }
    }
}

impl<S: IamStore> IamContext<S> {
    /// Production wiring: system clock and OS randomness
    pub fn new(store: Arc<S>, config: Arc<IamConfig>) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            random: Arc::new(OsRandom),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_random(mut self, random: Arc<dyn SecureRandom>) -> Self {
        self.random = random;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fresh UUID-backed identifier drawn from the injected random source
    pub fn new_id<T>(&self) -> Id<T> {
        Id::from_uuid(random_uuid(self.random.as_ref()))
    }

    /// `now + ttl`, refusing lifetimes chrono cannot represent
    pub fn expiry(&self, now: DateTime<Utc>, ttl: Duration) -> IamResult<DateTime<Utc>> {
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| IamError::Internal(format!("lifetime out of range: {ttl:?}")))
    }

    /// Load a tenant that must exist
    pub async fn require_tenant(&self, tx: &mut S::Tx, tenant_id: &TenantId) -> IamResult<Tenant> {
        self.store
            .find_tenant(tx, tenant_id)
            .await?
            .ok_or(IamError::TenantNotFound)
    }

    /// Load a user that must exist
    pub async fn require_user(&self, tx: &mut S::Tx, user_id: &UserId) -> IamResult<User> {
        self.store
            .find_user(tx, user_id)
            .await?
            .ok_or(IamError::UserNotFound)
    }
}
