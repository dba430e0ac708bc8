//! User registration and removal

use std::collections::HashSet;

use tracing::info;

use super::saga::{Cascade, CascadeSummary};
use super::CascadeOrchestrator;
use crate::error::{QualitagError, QualitagResult};
use crate::linker::Relation;
use crate::models::{Collection, Entity, EntityRef, Project, RefField, Tag, User};
use crate::validation::{NewUser, UserUpdate};

impl CascadeOrchestrator {
    /// Register a user and return its id
    pub async fn register_user(&self, request: NewUser) -> QualitagResult<String> {
        let valid = self.validation.validate_new_user(&request).await?;
        let mut user = User::new(
            valid.username,
            valid.email,
            valid.password_hash,
            valid.name,
            valid.surname,
        );
        self.repo.save(&mut user).await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user.id)
    }

    /// Change a user's profile. Users can only change their own.
    pub async fn update_user(
        &self,
        actor: &str,
        user_id: &str,
        request: UserUpdate,
    ) -> QualitagResult<()> {
        if actor != user_id {
            return Err(QualitagError::permission_denied("users can only change their own profile"));
        }
        let mut user: User = self.repo.get(user_id).await?;
        let valid = self.validation.validate_user_update(&user, &request).await?;
        user.username = valid.username;
        user.email = valid.email;
        user.name = valid.name;
        user.surname = valid.surname;
        self.repo.save(&mut user).await?;
        info!(user_id = %user.id, username = %user.username, "User updated");
        Ok(())
    }

    /// Delete a user account.
    ///
    /// Projects the user owns are deleted with their own cascade. The user
    /// leaves every other project and team, and their tags are deleted.
    pub async fn delete_user(&self, actor: &str, user_id: &str) -> QualitagResult<CascadeSummary> {
        if actor != user_id {
            return Err(QualitagError::permission_denied("users can only delete their own account"));
        }
        let user: User = self.repo.get(user_id).await?;
        let owned: Vec<Project> = self.repo.referencing(RefField::OwnerId, &user.id).await?;
        let owned_ids: HashSet<&str> = owned.iter().map(|p| p.id.as_str()).collect();

        let mut plan: Vec<EntityRef> = owned.iter().map(|p| p.entity_ref()).collect();
        plan.extend(
            user.project_ids
                .iter()
                .filter(|id| !owned_ids.contains(id.as_str()))
                .map(|id| EntityRef::new(Collection::Projects, id)),
        );
        plan.extend(user.team_ids.iter().map(|id| EntityRef::new(Collection::Teams, id)));
        plan.extend(user.tag_ids.iter().map(|id| EntityRef::new(Collection::Tags, id)));
        plan.push(user.entity_ref());

        info!(user_id = %user.id, owned_projects = owned.len(), "Deleting user with cascade");
        let mut cascade = Cascade::new("DeleteUser", user.entity_ref(), plan);
        for item in cascade.pending() {
            let result = match item.collection {
                Collection::Projects if owned_ids.contains(item.id.as_str()) => {
                    match self.repo.find::<Project>(&item.id).await {
                        Ok(Some(project)) => {
                            self.delete_project_cascade(&project).await.map(|_| ())
                        }
                        Ok(None) => Ok(()),
                        Err(e) => Err(e),
                    }
                }
                Collection::Projects => self.detach(Relation::ProjectMember, &item, &user.id).await,
                Collection::Teams => self.detach(Relation::TeamUser, &item, &user.id).await,
                Collection::Tags => match self.repo.find::<Tag>(&item.id).await {
                    Ok(Some(tag)) => self.delete_tag_cascade(&tag).await.map(|_| ()),
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                },
                _ => self.repo.delete(&item).await.map(|_| ()),
            };
            if let Err(e) = result {
                return Err(cascade.fail(e));
            }
            cascade.advance();
        }

        info!(user_id = %user.id, "User deleted");
        Ok(cascade.finish())
    }
}
