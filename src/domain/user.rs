use crate::error::{LendingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Staff,
    Admin,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// A user registration request, before the store assigns an identity.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            full_name: None,
            phone: None,
            role: Role::Member,
            status: UserStatus::Active,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    /// Column-level checks. Uniqueness is the store's job.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(LendingError::ConstraintViolation(
                "username must not be empty".to_string(),
            ));
        }
        check_email(&self.email)
    }
}

fn check_email(email: &str) -> Result<()> {
    if !email.contains('@') {
        return Err(LendingError::ConstraintViolation(format!(
            "email '{}' is not a valid address",
            email
        )));
    }
    Ok(())
}

/// The editable part of a user record. The username never changes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UserProfile {
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

impl UserProfile {
    pub fn validate(&self) -> Result<()> {
        check_email(&self.email)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_new(id: UserId, new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            phone: new.phone,
            role: new.role,
            status: new.status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            role: self.role,
            status: self.status,
        }
    }

    pub fn apply_profile(&mut self, profile: UserProfile, now: DateTime<Utc>) {
        self.email = profile.email;
        self.full_name = profile.full_name;
        self.phone = profile.phone;
        self.role = profile.role;
        self.status = profile.status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = NewUser::new("ana", "ana@example.org");
        assert_eq!(user.role, Role::Member);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_new_user_rejects_blank_username() {
        let user = NewUser::new("  ", "ana@example.org");
        assert!(matches!(
            user.validate(),
            Err(LendingError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_new_user_rejects_bad_email() {
        let user = NewUser::new("ana", "not-an-address");
        assert!(matches!(
            user.validate(),
            Err(LendingError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_role_and_status_deserialization() {
        let json = r#"{"username":"bo","email":"bo@example.org","role":"staff","status":"suspended"}"#;
        let user: NewUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Staff);
        assert_eq!(user.status, UserStatus::Suspended);
        assert!(user.full_name.is_none());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let json = r#"{"username":"bo","email":"bo@example.org","role":"librarian"}"#;
        assert!(serde_json::from_str::<NewUser>(json).is_err());
    }

    #[test]
    fn test_profile_edit_keeps_identity() {
        let created = Utc::now();
        let mut user = User::from_new(UserId(4), NewUser::new("ana", "ana@example.org"), created);

        let mut profile = user.profile();
        profile.email = "ana@library.org".to_string();
        profile.phone = Some("555-0101".to_string());
        profile.role = Role::Staff;
        assert!(profile.validate().is_ok());

        let later = created + chrono::TimeDelta::minutes(5);
        user.apply_profile(profile, later);
        assert_eq!(user.username, "ana");
        assert_eq!(user.email, "ana@library.org");
        assert_eq!(user.role, Role::Staff);
        assert_eq!(user.created_at, created);
        assert_eq!(user.updated_at, later);

        let mut bad = user.profile();
        bad.email = "nobody".to_string();
        assert!(bad.validate().is_err());
    }
}
