//! Member management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, CreateMemberRequest, Member, UpdateMember},
        user::NewUser,
        Role,
    },
    repository::Repository,
    services::auth::hash_password,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_members(&self) -> AppResult<Vec<Member>> {
        self.repository.members.list().await
    }

    pub async fn get_member(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    /// Librarian-side creation; the linked identity is on unless the request opts out
    pub async fn create_from_request(&self, request: CreateMemberRequest) -> AppResult<Member> {
        request.validate()?;
        let create_identity = request.create_linked_identity.unwrap_or(true);
        self.create_member(request.member, create_identity, request.password.as_deref())
            .await
    }

    /// Create a member, optionally with a Member-role identity sharing its email.
    ///
    /// An identity that already exists for the email is linked, not duplicated.
    pub async fn create_member(
        &self,
        member: CreateMember,
        create_linked_identity: bool,
        password: Option<&str>,
    ) -> AppResult<Member> {
        member.validate()?;
        self.check_unique(Some(&member.membership_id), Some(&member.email), None)
            .await?;

        let identity = if create_linked_identity {
            let password = password.map(hash_password).transpose()?;
            Some(NewUser {
                email: member.email.trim().to_string(),
                full_name: member.full_name.trim().to_string(),
                password,
                roles: vec![Role::Member],
            })
        } else {
            None
        };

        let created = self.repository.members.create(&member, identity.as_ref()).await?;
        tracing::info!(
            member_id = created.id,
            linked_user = ?created.user_id,
            "Member created"
        );

        Ok(created)
    }

    pub async fn update_member(&self, id: i32, update: UpdateMember) -> AppResult<Member> {
        update.validate()?;
        self.repository.members.get_by_id(id).await?;
        self.check_unique(update.membership_id.as_deref(), update.email.as_deref(), Some(id))
            .await?;

        self.repository.members.update(id, &update).await
    }

    pub async fn delete_member(&self, id: i32) -> AppResult<()> {
        self.repository.members.delete(id).await?;
        tracing::info!(member_id = id, "Member deleted");
        Ok(())
    }

    async fn check_unique(
        &self,
        membership_id: Option<&str>,
        email: Option<&str>,
        exclude_id: Option<i32>,
    ) -> AppResult<()> {
        if let Some(membership_id) = membership_id {
            if self
                .repository
                .members
                .membership_id_exists(membership_id.trim(), exclude_id)
                .await?
            {
                return Err(AppError::Conflict("Membership ID already exists".to_string()));
            }
        }
        if let Some(email) = email {
            if self.repository.members.email_exists(email.trim(), exclude_id).await? {
                return Err(AppError::Conflict(
                    "A member with this email already exists".to_string(),
                ));
            }
        }
        Ok(())
    }
}
