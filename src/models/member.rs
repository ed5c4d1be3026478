//! Member model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\d{7,15}$").expect("valid phone regex"));

/// Member model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub full_name: String,
    pub membership_id: String,
    pub email: String,
    pub phone: String,
    /// Linked identity, when one exists
    pub user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Name shown in conflict messages and reports
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.membership_id
        } else {
            &self.full_name
        }
    }
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Membership ID is required"))]
    pub membership_id: String,
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email address format"))]
    pub email: String,
    #[validate(regex(
        path = *PHONE_RE,
        message = "Phone number must contain only digits and be 7 to 15 characters long"
    ))]
    pub phone: String,
}

/// Librarian-side member creation: the member fields plus the identity switch
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_identity_password"))]
pub struct CreateMemberRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub member: CreateMember,
    /// Create a Member-role login for this member (defaults to true)
    pub create_linked_identity: Option<bool>,
    /// Initial password for the linked identity, required unless the identity is switched off
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

/// A linked identity needs a password, otherwise it can never log in
fn validate_identity_password(request: &CreateMemberRequest) -> Result<(), ValidationError> {
    if request.create_linked_identity.unwrap_or(true) && request.password.is_none() {
        let mut err = ValidationError::new("password_required");
        err.message = Some("A password is required when creating a linked identity".into());
        return Err(err);
    }
    Ok(())
}

/// Update member request (absent fields are left unchanged)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, message = "Full name cannot be empty"))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, message = "Membership ID cannot be empty"))]
    pub membership_id: Option<String>,
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email address format"))]
    pub email: Option<String>,
    #[validate(regex(
        path = *PHONE_RE,
        message = "Phone number must contain only digits and be 7 to 15 characters long"
    ))]
    pub phone: Option<String>,
}

/// Self-service registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterMember {
    #[serde(flatten)]
    #[validate(nested)]
    pub member: CreateMember,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(email: &str, phone: &str) -> CreateMember {
        CreateMember {
            full_name: "Test Member".to_string(),
            membership_id: "TM001".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_member() {
        assert!(member("test@example.com", "123456789").validate().is_ok());
        assert!(member("a@b.co", "+251911234567").validate().is_ok());
    }

    #[test]
    fn rejects_bad_email() {
        assert!(member("not-an-email", "123456789").validate().is_err());
        assert!(member("two@@example.com", "123456789").validate().is_err());
    }

    #[test]
    fn rejects_bad_phone() {
        assert!(member("test@example.com", "12345").validate().is_err());
        assert!(member("test@example.com", "12-34-56-78").validate().is_err());
        assert!(member("test@example.com", "1234567890123456").validate().is_err());
    }

    fn request(create_linked_identity: Option<bool>, password: Option<&str>) -> CreateMemberRequest {
        CreateMemberRequest {
            member: member("test@example.com", "123456789"),
            create_linked_identity,
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn linked_identity_requires_password() {
        assert!(request(None, None).validate().is_err());
        assert!(request(Some(true), None).validate().is_err());
        assert!(request(Some(true), Some("secret1")).validate().is_ok());
        assert!(request(None, Some("secret1")).validate().is_ok());
    }

    #[test]
    fn member_without_identity_needs_no_password() {
        assert!(request(Some(false), None).validate().is_ok());
    }

    #[test]
    fn display_name_falls_back_to_membership_id() {
        let m = Member {
            id: 1,
            full_name: " ".to_string(),
            membership_id: "TM001".to_string(),
            email: "test@example.com".to_string(),
            phone: "123456789".to_string(),
            user_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(m.display_name(), "TM001");
    }
}
