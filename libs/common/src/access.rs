//! Roles, account statuses and the authorization rules built on them
//!
//! Both enums are stored as `SMALLINT` and serialised as their numeric code
//! so that clients of the legacy API keep receiving the same values.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account role, ordered from most to least privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum Role {
    Administrator = 0,
    Manager = 1,
    Caregiver = 2,
}

impl Role {
    /// Privilege rank; higher means more privileged
    fn rank(self) -> u8 {
        match self {
            Role::Administrator => 2,
            Role::Manager => 1,
            Role::Caregiver => 0,
        }
    }

    /// Strictly more privileged than `other`
    pub fn outranks(self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    /// At least as privileged as `minimum`
    pub fn at_least(self, minimum: Role) -> bool {
        self.rank() >= minimum.rank()
    }
}

impl From<Role> for i16 {
    fn from(role: Role) -> Self {
        role as i16
    }
}

impl TryFrom<i16> for Role {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Administrator),
            1 => Ok(Role::Manager),
            2 => Ok(Role::Caregiver),
            other => Err(format!("unknown role {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Administrator => "administrator",
            Role::Manager => "manager",
            Role::Caregiver => "caregiver",
        };
        f.write_str(name)
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum AccountStatus {
    NotVerified = -1,
    Inactive = 0,
    Active = 1,
    Archived = 2,
    SoftDeleted = 3,
}

impl AccountStatus {
    /// Only active accounts may log in or use a token
    pub fn can_authenticate(self) -> bool {
        self == AccountStatus::Active
    }

    /// Whether the account shows up in default listings
    pub fn is_listed(self) -> bool {
        !matches!(self, AccountStatus::Archived | AccountStatus::SoftDeleted)
    }
}

impl From<AccountStatus> for i16 {
    fn from(status: AccountStatus) -> Self {
        status as i16
    }
}

impl TryFrom<i16> for AccountStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(AccountStatus::NotVerified),
            0 => Ok(AccountStatus::Inactive),
            1 => Ok(AccountStatus::Active),
            2 => Ok(AccountStatus::Archived),
            3 => Ok(AccountStatus::SoftDeleted),
            other => Err(format!("unknown account status {}", other)),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountStatus::NotVerified => "not verified",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Active => "active",
            AccountStatus::Archived => "archived",
            AccountStatus::SoftDeleted => "deleted",
        };
        f.write_str(name)
    }
}

/// The authenticated principal attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_self(&self, id: Uuid) -> bool {
        self.id == id
    }

    /// Self-service, administrator override, or strict hierarchy
    pub fn can_modify(&self, target_id: Uuid, target_role: Role) -> bool {
        self.is_self(target_id)
            || self.role == Role::Administrator
            || self.role.outranks(target_role)
    }

    /// Acting on somebody else who ranks below the actor
    pub fn can_manage(&self, target_id: Uuid, target_role: Role) -> bool {
        !self.is_self(target_id)
            && (self.role == Role::Administrator || self.role.outranks(target_role))
    }

    pub fn has_role(&self, minimum: Role) -> bool {
        self.role.at_least(minimum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn hierarchy_is_strict() {
        assert!(Role::Administrator.outranks(Role::Manager));
        assert!(Role::Manager.outranks(Role::Caregiver));
        assert!(Role::Administrator.outranks(Role::Caregiver));
        assert!(!Role::Manager.outranks(Role::Manager));
        assert!(!Role::Caregiver.outranks(Role::Manager));
    }

    #[test]
    fn at_least_includes_equal_role() {
        assert!(Role::Manager.at_least(Role::Manager));
        assert!(Role::Administrator.at_least(Role::Manager));
        assert!(!Role::Caregiver.at_least(Role::Manager));
    }

    #[test]
    fn role_serialises_as_numeric_code() {
        assert_eq!(serde_json::to_string(&Role::Caregiver).unwrap(), "2");
        let role: Role = serde_json::from_str("0").unwrap();
        assert_eq!(role, Role::Administrator);
        assert!(serde_json::from_str::<Role>("7").is_err());
    }

    #[test]
    fn status_gates_authentication_and_listing() {
        assert!(AccountStatus::Active.can_authenticate());
        assert!(!AccountStatus::NotVerified.can_authenticate());
        assert!(!AccountStatus::Inactive.can_authenticate());
        assert!(AccountStatus::Inactive.is_listed());
        assert!(!AccountStatus::Archived.is_listed());
        assert!(!AccountStatus::SoftDeleted.is_listed());
    }

    #[test]
    fn status_round_trips_negative_code() {
        let status: AccountStatus = serde_json::from_str("-1").unwrap();
        assert_eq!(status, AccountStatus::NotVerified);
        assert_eq!(i16::from(status), -1);
    }

    #[test]
    fn caregiver_can_only_modify_self() {
        let caregiver = user(Role::Caregiver);
        assert!(caregiver.can_modify(caregiver.id, Role::Caregiver));
        assert!(!caregiver.can_modify(Uuid::new_v4(), Role::Caregiver));
    }

    #[test]
    fn manager_modifies_caregivers_but_not_peers() {
        let manager = user(Role::Manager);
        assert!(manager.can_modify(Uuid::new_v4(), Role::Caregiver));
        assert!(!manager.can_modify(Uuid::new_v4(), Role::Manager));
        assert!(!manager.can_modify(Uuid::new_v4(), Role::Administrator));
    }

    #[test]
    fn administrator_overrides_everyone() {
        let admin = user(Role::Administrator);
        assert!(admin.can_modify(Uuid::new_v4(), Role::Administrator));
        assert!(admin.can_manage(Uuid::new_v4(), Role::Administrator));
        assert!(!admin.can_manage(admin.id, Role::Administrator));
    }

    #[test]
    fn caregiver_never_manages() {
        let caregiver = user(Role::Caregiver);
        assert!(!caregiver.can_manage(Uuid::new_v4(), Role::Caregiver));
    }
}
