//! Authentication, logout and self-registration

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        member::{Member, RegisterMember},
        user::NewUser,
        Role, User, UserClaims,
    },
    repository::Repository,
    services::redis::RedisService,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    redis: RedisService,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, redis: RedisService) -> Self {
        Self { repository, config, redis }
    }

    /// Authenticate by email and password and return a JWT token
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !user.enabled {
            return Err(AppError::Authentication("Account is disabled".to_string()));
        }

        if !verify_password(&user, password)? {
            tracing::info!(user_id = user.id, "Rejected login: wrong password");
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let token = self.create_token_for_user(&user).await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok((token, user))
    }

    async fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let member_id = self.repository.users.linked_member_id(user).await?;

        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            roles: user.roles.clone(),
            member_id,
            jti: Uuid::new_v4().to_string(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Revoke the token these claims came from
    pub async fn logout(&self, claims: &UserClaims) -> AppResult<()> {
        let remaining = (claims.exp - Utc::now().timestamp()).max(0) as u64;
        self.redis.revoke_token(&claims.jti, remaining).await?;
        tracing::info!(user_id = claims.user_id, "User logged out");
        Ok(())
    }

    pub async fn is_revoked(&self, claims: &UserClaims) -> AppResult<bool> {
        self.redis.is_token_revoked(&claims.jti).await
    }

    /// Current identity and its linked member, if any
    pub async fn me(&self, claims: &UserClaims) -> AppResult<(User, Option<i32>)> {
        let user = self.repository.users.get_by_id(claims.user_id).await?;
        let member_id = self.repository.users.linked_member_id(&user).await?;
        Ok((user, member_id))
    }

    /// Self-registration: member record plus a Member-role identity.
    ///
    /// Every uniqueness check runs before anything is written.
    pub async fn register(&self, request: RegisterMember) -> AppResult<Member> {
        let member = &request.member;

        if self.repository.users.email_exists(&member.email).await? {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        if self.repository.members.email_exists(&member.email, None).await? {
            return Err(AppError::Conflict(
                "A member with this email already exists".to_string(),
            ));
        }
        if self
            .repository
            .members
            .membership_id_exists(&member.membership_id, None)
            .await?
        {
            return Err(AppError::Conflict("Membership ID already exists".to_string()));
        }

        let identity = NewUser {
            email: member.email.trim().to_string(),
            full_name: member.full_name.trim().to_string(),
            password: Some(hash_password(&request.password)?),
            roles: vec![Role::Member],
        };

        let created = self.repository.members.create(member, Some(&identity)).await?;
        tracing::info!(member_id = created.id, "Member self-registered");

        Ok(created)
    }

    /// Create the configured administrator account if it does not exist yet
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            self.config.bootstrap_admin_email.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.users.email_exists(email).await? {
            return Ok(());
        }

        let admin = NewUser {
            email: email.to_string(),
            full_name: "Administrator".to_string(),
            password: Some(hash_password(password)?),
            roles: vec![Role::Admin, Role::Librarian],
        };
        let user = self.repository.users.create(&admin).await?;
        tracing::info!(user_id = user.id, "Bootstrap administrator created");

        Ok(())
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Identities without a password cannot log in
fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let Some(ref hash) = user.password else {
        return Ok(false);
    };
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
