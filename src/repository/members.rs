//! Members repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, Member, UpdateMember},
        user::NewUser,
    },
};

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all members ordered by name
    pub async fn list(&self) -> AppResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY full_name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Find a member by ID without failing when absent
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    /// Check if a membership ID is taken
    pub async fn membership_id_exists(&self, membership_id: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE membership_id = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(membership_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if a member already uses this email
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1) AND ($2::int IS NULL OR id != $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a member and, when `identity` is given, its linked identity.
    ///
    /// Both rows are written in one transaction. If an identity with the same
    /// email already exists it is linked instead of duplicated.
    pub async fn create(&self, member: &CreateMember, identity: Option<&NewUser>) -> AppResult<Member> {
        let mut tx = self.pool.begin().await?;

        let mut created = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (full_name, membership_id, email, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(member.full_name.trim())
        .bind(member.membership_id.trim())
        .bind(member.email.trim())
        .bind(member.phone.trim())
        .fetch_one(&mut *tx)
        .await?;

        if let Some(identity) = identity {
            let existing: Option<i32> =
                sqlx::query_scalar("SELECT id FROM users WHERE LOWER(email) = LOWER($1)")
                    .bind(&identity.email)
                    .fetch_optional(&mut *tx)
                    .await?;

            let user_id = match existing {
                Some(id) => id,
                None => {
                    sqlx::query_scalar::<_, i32>(
                        r#"
                        INSERT INTO users (email, full_name, password, roles)
                        VALUES ($1, $2, $3, $4)
                        RETURNING id
                        "#,
                    )
                    .bind(&identity.email)
                    .bind(&identity.full_name)
                    .bind(&identity.password)
                    .bind(identity.role_names())
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            sqlx::query("UPDATE members SET user_id = $1 WHERE id = $2")
                .bind(user_id)
                .bind(created.id)
                .execute(&mut *tx)
                .await?;
            created.user_id = Some(user_id);
        }

        tx.commit().await?;

        Ok(created)
    }

    /// Update an existing member
    pub async fn update(&self, id: i32, member: &UpdateMember) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members SET
                full_name = COALESCE($2, full_name),
                membership_id = COALESCE($3, membership_id),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(member.full_name.as_deref().map(str::trim))
        .bind(member.membership_id.as_deref().map(str::trim))
        .bind(member.email.as_deref().map(str::trim))
        .bind(member.phone.as_deref().map(str::trim))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Delete a member; refused while loans reference them
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let has_loans: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE member_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if has_loans {
            return Err(AppError::Conflict(
                "Member has loan history and cannot be deleted".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }

        Ok(())
    }
}
