//! Identity model, roles, JWT claims and row-level visibility

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Caller roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Librarian,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Librarian => "librarian",
            Role::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "librarian" => Ok(Role::Librarian),
            "member" => Ok(Role::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Internal row structure for database queries (roles stored as TEXT[])
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    id: i32,
    email: String,
    full_name: String,
    password: Option<String>,
    roles: Vec<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            password: row.password,
            // Unknown role names are dropped rather than widening access
            roles: row.roles.iter().filter_map(|r| r.parse().ok()).collect(),
            enabled: row.enabled,
            created_at: row.created_at,
        }
    }
}

/// Identity record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub roles: Vec<Role>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Identity to insert alongside a member
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    /// Already hashed
    pub password: Option<String>,
    pub roles: Vec<Role>,
}

impl NewUser {
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// Which Loan and Reservation rows a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    /// Only rows belonging to this member
    Member(i32),
    Nothing,
}

impl Visibility {
    /// Derive the row filter from a caller's roles and linked member.
    ///
    /// Staff (librarian, admin) see everything. A caller whose only role is
    /// member sees their own rows, or nothing without a linked member record.
    /// Every role other than member is a staff role; a token carrying no role
    /// at all is not one of them and sees nothing.
    pub fn for_roles(roles: &[Role], member_id: Option<i32>) -> Self {
        if roles.iter().any(|r| matches!(r, Role::Librarian | Role::Admin)) {
            return Visibility::All;
        }
        match (roles.contains(&Role::Member), member_id) {
            (true, Some(id)) => Visibility::Member(id),
            _ => Visibility::Nothing,
        }
    }

    pub fn permits(&self, member_id: i32) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Member(own) => *own == member_id,
            Visibility::Nothing => false,
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub roles: Vec<Role>,
    /// Member record linked to this identity (by email)
    pub member_id: Option<i32>,
    /// Token id, used for revocation on logout
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_staff(&self) -> bool {
        self.has_role(Role::Librarian) || self.has_role(Role::Admin)
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::for_roles(&self.roles, self.member_id)
    }

    // Authorization checks
    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Only librarians can perform this action".to_string()))
        }
    }

    /// Require a member role with a linked member record, returning its id
    pub fn require_member(&self) -> Result<i32, AppError> {
        if !self.has_role(Role::Member) {
            return Err(AppError::Authorization("Only members can perform this action".to_string()));
        }
        self.member_id
            .ok_or_else(|| AppError::Authorization("No member record linked to this user".to_string()))
    }
}
