//! Project operations

use serde::Serialize;
use tracing::{info, warn};

use super::saga::{Cascade, CascadeSummary, Compensation, Saga};
use super::{require_owner, CascadeOrchestrator};
use crate::error::{QualitagError, QualitagResult};
use crate::linker::Relation;
use crate::models::{Artifact, Collection, Entity, EntityRef, Project, ProjectStatus, Team, User};
use crate::notify::ProjectInvitation;
use crate::validation::{NewProject, NewTeam, ProjectUpdate, ValidProject};

/// Result of a successful project creation
#[derive(Debug, Clone, Serialize)]
pub struct ProjectCreated {
    pub project_id: String,
    pub default_team_id: String,
    /// Invitations that could not be delivered; the project stays created
    pub notification_failures: Vec<String>,
}

/// Result of a change to a project's member list
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectMembersChanged {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub notification_failures: Vec<String>,
}

impl CascadeOrchestrator {
    /// Create a project owned by `actor` together with its default team
    pub async fn create_project(
        &self,
        actor: &str,
        request: NewProject,
    ) -> QualitagResult<ProjectCreated> {
        info!(actor = %actor, name = %request.name, "Creating project");
        let valid = self.validation.validate_new_project(actor, &request).await?;

        let mut saga = Saga::begin("CreateProject", &self.repo);
        let created = self.create_project_steps(&mut saga, actor, valid).await;
        let (project, default_team_id) = match created {
            Ok(created) => created,
            Err(e) => return Err(saga.abort(e).await),
        };
        saga.commit();

        let notification_failures = self.invite(&project, &project.user_ids).await;
        info!(project_id = %project.id, team_id = %default_team_id, "Project created");
        Ok(ProjectCreated {
            project_id: project.id,
            default_team_id,
            notification_failures,
        })
    }

    async fn create_project_steps(
        &self,
        saga: &mut Saga<'_>,
        actor: &str,
        valid: ValidProject,
    ) -> QualitagResult<(Project, String)> {
        // 1. Project record, links added below
        saga.step("persist project");
        let mut project = Project::new(
            valid.name,
            valid.description,
            valid.owner_id.clone(),
            valid.created_at,
            valid.deadline,
        );
        self.repo.save(&mut project).await?;
        saga.compensate(Compensation::Delete(project.entity_ref()));

        // 2. Owner and members, both sides persisted before the default team
        saga.step("link project users");
        let mut owner: User = self.repo.get(&valid.owner_id).await?;
        if self.linker.link_project_owner(&mut project, &mut owner) {
            saga.compensate(Compensation::unlink(
                Relation::ProjectOwner,
                &project.id,
                &owner.id,
            ));
            self.repo.save(&mut owner).await?;
        }
        for member_id in &valid.member_ids {
            let mut user: User = self.repo.get(member_id).await?;
            if self.linker.link_project_member(&mut project, &mut user) {
                self.repo.save(&mut project).await?;
                saga.compensate(Compensation::unlink(
                    Relation::ProjectMember,
                    &project.id,
                    &user.id,
                ));
                self.repo.save(&mut user).await?;
            }
        }

        // 3. Default team holding every member
        saga.step("create default team");
        let team_request = NewTeam {
            project_id: project.id.clone(),
            name: self.config.default_team_name.clone(),
            description: None,
            member_emails: valid.member_emails,
            created_at: Some(valid.created_at),
        };
        let team_id = self.create_team_steps(saga, actor, &team_request).await?;

        Ok((project, team_id))
    }

    /// Change name, description, deadline or the member list of a project.
    /// Removed members also leave the project's teams.
    pub async fn update_project(
        &self,
        actor: &str,
        project_id: &str,
        request: ProjectUpdate,
    ) -> QualitagResult<ProjectMembersChanged> {
        let mut project: Project = self.repo.get(project_id).await?;
        require_owner(&project, actor, "update it")?;
        if project.is_closed() {
            return Err(QualitagError::Conflict(format!("Project {} is closed", project.id)));
        }
        let valid = self.validation.validate_project_update(&project, &request).await?;

        project.name = valid.name;
        project.description = valid.description;
        project.deadline = valid.deadline;

        let mut changes = ProjectMembersChanged::default();
        if let Some(member_ids) = valid.member_ids {
            changes.removed = project
                .user_ids
                .iter()
                .filter(|id| !member_ids.contains(id))
                .cloned()
                .collect();
            changes.added = member_ids
                .iter()
                .filter(|id| !project.user_ids.contains(id))
                .cloned()
                .collect();

            for user_id in &changes.removed {
                self.remove_project_member(&mut project, user_id).await?;
            }
            for user_id in &changes.added {
                let mut user: User = self.repo.get(user_id).await?;
                self.linker.link_project_member(&mut project, &mut user);
                self.repo.save(&mut user).await?;
            }
        }

        self.repo.save(&mut project).await?;
        changes.notification_failures = self.invite(&project, &changes.added).await;
        info!(
            project_id = %project.id,
            added = changes.added.len(),
            removed = changes.removed.len(),
            "Project updated"
        );
        Ok(changes)
    }

    /// Add users by email to an existing project
    pub async fn add_users_to_project(
        &self,
        actor: &str,
        project_id: &str,
        emails: &[String],
    ) -> QualitagResult<ProjectMembersChanged> {
        let mut project: Project = self.repo.get(project_id).await?;
        require_owner(&project, actor, "add users")?;
        if project.is_closed() {
            return Err(QualitagError::Conflict(format!("Project {} is closed", project.id)));
        }
        let user_ids = self.validation.validate_additional_members(&project, emails).await?;

        let mut changes = ProjectMembersChanged::default();
        for user_id in user_ids {
            let mut user: User = self.repo.get(&user_id).await?;
            if self.linker.link_project_member(&mut project, &mut user) {
                self.repo.save(&mut user).await?;
                changes.added.push(user_id);
            }
        }
        self.repo.save(&mut project).await?;

        changes.notification_failures = self.invite(&project, &changes.added).await;
        info!(project_id = %project.id, added = changes.added.len(), "Users added to project");
        Ok(changes)
    }

    /// Mark a project closed; closed projects accept no new artifacts or members
    pub async fn close_project(&self, actor: &str, project_id: &str) -> QualitagResult<()> {
        let mut project: Project = self.repo.get(project_id).await?;
        require_owner(&project, actor, "close it")?;
        if project.is_closed() {
            return Err(QualitagError::Conflict(format!(
                "Project {} is already closed",
                project.id
            )));
        }
        project.status = ProjectStatus::Closed;
        self.repo.save(&mut project).await?;
        info!(project_id = %project.id, "Project closed");
        Ok(())
    }

    /// Delete a project and everything below it
    pub async fn delete_project(
        &self,
        actor: &str,
        project_id: &str,
    ) -> QualitagResult<CascadeSummary> {
        let project: Project = self.repo.get(project_id).await?;
        require_owner(&project, actor, "delete it")?;
        info!(project_id = %project.id, actor = %actor, "Deleting project with cascade");
        self.delete_project_cascade(&project).await
    }

    /// Teams, then artifacts, then user back-references, then the project
    pub(crate) async fn delete_project_cascade(
        &self,
        project: &Project,
    ) -> QualitagResult<CascadeSummary> {
        let mut plan: Vec<EntityRef> = Vec::new();
        plan.extend(project.team_ids.iter().map(|id| EntityRef::new(Collection::Teams, id)));
        plan.extend(
            project
                .artifact_ids
                .iter()
                .map(|id| EntityRef::new(Collection::Artifacts, id)),
        );
        plan.push(EntityRef::new(Collection::Users, &project.owner_id));
        plan.extend(project.user_ids.iter().map(|id| EntityRef::new(Collection::Users, id)));
        plan.push(project.entity_ref());

        let mut cascade = Cascade::new("DeleteProject", project.entity_ref(), plan);
        for item in cascade.pending() {
            let result = match item.collection {
                Collection::Teams => match self.repo.find::<Team>(&item.id).await {
                    Ok(Some(team)) => self.delete_team_cascade(&team).await.map(|_| ()),
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                },
                Collection::Artifacts => match self.repo.find::<Artifact>(&item.id).await {
                    Ok(Some(artifact)) => self.delete_artifact_cascade(&artifact).await.map(|_| ()),
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                },
                Collection::Users => self.detach(Relation::ProjectMember, &item, &project.id).await,
                _ => self.repo.delete(&item).await.map(|_| ()),
            };
            if let Err(e) = result {
                return Err(cascade.fail(e));
            }
            cascade.advance();
        }

        info!(project_id = %project.id, "Project deleted");
        Ok(cascade.finish())
    }

    /// Drop a member from the project and from every team of the project
    async fn remove_project_member(
        &self,
        project: &mut Project,
        user_id: &str,
    ) -> QualitagResult<()> {
        let Some(mut user) = self.repo.find::<User>(user_id).await? else {
            warn!(
                project_id = %project.id,
                user_id = %user_id,
                "Removing a member that no longer exists"
            );
            self.linker.drop_project_member(project, user_id);
            return Ok(());
        };

        for team_id in project.team_ids.clone() {
            if !user.team_ids.contains(&team_id) {
                continue;
            }
            if let Some(mut team) = self.repo.find::<Team>(&team_id).await? {
                if self.linker.unlink_team_user(&mut team, &mut user) {
                    self.repo.save(&mut team).await?;
                }
            }
        }
        self.linker.unlink_project_member(project, &mut user);
        self.repo.save(&mut user).await
    }

    /// Send invitations, collecting failures instead of propagating them
    async fn invite(&self, project: &Project, user_ids: &[String]) -> Vec<String> {
        let inviter = match self.repo.find::<User>(&project.owner_id).await {
            Ok(Some(owner)) => owner.display_name(),
            _ => project.owner_id.clone(),
        };

        let mut failures = Vec::new();
        for user_id in user_ids {
            let user = match self.repo.find::<User>(user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    failures.push(format!("{}: user not found", user_id));
                    continue;
                }
                Err(e) => {
                    failures.push(format!("{}: {}", user_id, e));
                    continue;
                }
            };
            let invitation = ProjectInvitation {
                recipient_email: user.email.clone(),
                recipient_username: user.username.clone(),
                project_id: project.id.clone(),
                project_name: project.name.clone(),
                project_description: project.description.clone(),
                inviter_name: inviter.clone(),
            };
            if let Err(e) = self.notifier.project_invitation(&invitation).await {
                warn!(
                    project_id = %project.id,
                    recipient = %user.email,
                    error = %e,
                    "Failed to send project invitation"
                );
                failures.push(format!("{}: {}", user.email, e));
            }
        }
        failures
    }
}
