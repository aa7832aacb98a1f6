//! Role Value Object
//!
//! The three built-in roles plus tenant-defined extras.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Admin,
    SysAdmin,
    /// Tenant-defined role, carried by name
    Custom(String),
}

impl Role {
    pub fn code(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SysAdmin => "sysadmin",
            Role::Custom(name) => name,
        }
    }

    /// Parse a stored role name; unknown names become [`Role::Custom`]
    pub fn from_code(code: &str) -> Self {
        match code {
            "user" => Role::User,
            "admin" => Role::Admin,
            "sysadmin" => Role::SysAdmin,
            other => Role::Custom(other.to_string()),
        }
    }

    /// `sysadmin` can never be granted through role assignment
    #[inline]
    pub fn is_protected(&self) -> bool {
        matches!(self, Role::SysAdmin)
    }

    /// Admin or sysadmin
    #[inline]
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::SysAdmin)
    }
}

impl From<String> for Role {
    fn from(code: String) -> Self {
        Role::from_code(&code)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.code().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_code() {
        assert_eq!(Role::from_code("user"), Role::User);
        assert_eq!(Role::from_code("admin"), Role::Admin);
        assert_eq!(Role::from_code("sysadmin"), Role::SysAdmin);
        assert_eq!(Role::from_code("editor"), Role::Custom("editor".into()));
    }

    #[test]
    fn test_role_display_roundtrip() {
        for role in [Role::User, Role::Admin, Role::SysAdmin, Role::Custom("billing".into())] {
            assert_eq!(Role::from_code(&role.to_string()), role);
        }
    }

    #[test]
    fn test_role_checks() {
        assert!(Role::SysAdmin.is_protected());
        assert!(!Role::Admin.is_protected());
        assert!(Role::Admin.is_elevated());
        assert!(Role::SysAdmin.is_elevated());
        assert!(!Role::User.is_elevated());
        assert!(!Role::Custom("admin-ish".into()).is_elevated());
    }

    #[test]
    fn test_role_serde_as_string() {
        let json = serde_json::to_string(&vec![Role::User, Role::Custom("x".into())]).unwrap();
        assert_eq!(json, r#"["user","x"]"#);
        let back: Vec<Role> = serde_json::from_str(r#"["sysadmin"]"#).unwrap();
        assert_eq!(back, vec![Role::SysAdmin]);
    }
}
