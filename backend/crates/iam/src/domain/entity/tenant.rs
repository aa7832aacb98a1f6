//! Tenant Entity
//!
//! Isolation boundary. Must exist before users are created in it and cannot
//! be deleted while it owns users.

use chrono::{DateTime, Utc};

use crate::domain::value_object::TenantId;
use crate::error::{IamError, IamResult};

pub const TENANT_ID_MIN_LENGTH: usize = 3;
pub const TENANT_ID_MAX_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Validate and build a new tenant
    pub fn new(
        tenant_id: &str,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> IamResult<Self> {
        Ok(Self {
            tenant_id: validate_tenant_id(tenant_id)?,
            name: validate_tenant_name(name)?,
            description: description.trim().to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a tenant
#[derive(Debug, Clone, Default)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TenantPatch {
    pub fn apply(&self, tenant: &mut Tenant, now: DateTime<Utc>) -> IamResult<()> {
        if let Some(name) = &self.name {
            tenant.name = validate_tenant_name(name)?;
        }
        if let Some(description) = &self.description {
            tenant.description = description.trim().to_string();
        }
        tenant.updated_at = now;
        Ok(())
    }
}

/// Lowercase ascii letters, digits, `-` and `_`
pub fn validate_tenant_id(raw: &str) -> IamResult<TenantId> {
    let id = raw.trim();
    if id.len() < TENANT_ID_MIN_LENGTH {
        return Err(IamError::InvalidInput(format!(
            "tenant id must be at least {TENANT_ID_MIN_LENGTH} characters"
        )));
    }
    if id.len() > TENANT_ID_MAX_LENGTH {
        return Err(IamError::InvalidInput(format!(
            "tenant id must be at most {TENANT_ID_MAX_LENGTH} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(IamError::InvalidInput(
            "tenant id may only contain lowercase letters, digits, '-' and '_'".into(),
        ));
    }
    Ok(TenantId::new(id))
}

fn validate_tenant_name(raw: &str) -> IamResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(IamError::InvalidInput("tenant name is required".into()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_new_tenant() {
        let tenant = Tenant::new(" acme-eu ", "Acme Europe", "", now()).unwrap();
        assert_eq!(tenant.tenant_id.as_str(), "acme-eu");
        assert_eq!(tenant.name, "Acme Europe");
    }

    #[test]
    fn test_tenant_id_rules() {
        assert!(validate_tenant_id("ab").is_err());
        assert!(validate_tenant_id("Acme").is_err());
        assert!(validate_tenant_id("acme corp").is_err());
        assert!(validate_tenant_id("t_01").is_ok());
    }

    #[test]
    fn test_tenant_name_required() {
        assert!(matches!(
            Tenant::new("acme", "  ", "", now()),
            Err(IamError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_patch() {
        let mut tenant = Tenant::new("acme", "Acme", "old", now()).unwrap();
        let later = now() + chrono::Duration::seconds(1);
        TenantPatch {
            name: None,
            description: Some(" new ".into()),
        }
        .apply(&mut tenant, later)
        .unwrap();
        assert_eq!(tenant.name, "Acme");
        assert_eq!(tenant.description, "new");
        assert_eq!(tenant.updated_at, later);

        let bad = TenantPatch {
            name: Some("".into()),
            description: None,
        };
        assert!(bad.apply(&mut tenant, later).is_err());
    }
}
