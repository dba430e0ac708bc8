//! Team operations

use tracing::info;

use super::saga::{Cascade, CascadeSummary, Compensation, Saga};
use super::{require_owner, CascadeOrchestrator};
use crate::error::QualitagResult;
use crate::linker::Relation;
use crate::models::{Artifact, Collection, Entity, EntityRef, Project, Team, User};
use crate::validation::NewTeam;

impl CascadeOrchestrator {
    /// Create a team inside a project. Only the project owner may do this.
    pub async fn create_team(&self, actor: &str, request: NewTeam) -> QualitagResult<String> {
        info!(
            actor = %actor,
            project_id = %request.project_id,
            name = %request.name,
            "Creating team"
        );
        let mut saga = Saga::begin("CreateTeam", &self.repo);
        match self.create_team_steps(&mut saga, actor, &request).await {
            Ok(team_id) => {
                saga.commit();
                info!(team_id = %team_id, project_id = %request.project_id, "Team created");
                Ok(team_id)
            }
            Err(e) => Err(saga.abort(e).await),
        }
    }

    /// Team steps recorded on the caller's saga, so a parent operation can
    /// unwind them together with its own
    pub(crate) async fn create_team_steps(
        &self,
        saga: &mut Saga<'_>,
        actor: &str,
        request: &NewTeam,
    ) -> QualitagResult<String> {
        let valid = self.validation.validate_new_team(actor, request).await?;

        // 1. Team record, members added below
        saga.step("persist team");
        let mut team = Team::new(
            valid.project_id.clone(),
            valid.name,
            valid.description,
            valid.created_at,
        );
        self.repo.save(&mut team).await?;
        saga.compensate(Compensation::Delete(team.entity_ref()));

        // 2. Each member on both sides
        saga.step("link team users");
        for user_id in &valid.member_ids {
            let mut user: User = self.repo.get(user_id).await?;
            if self.linker.link_team_user(&mut team, &mut user) {
                self.repo.save(&mut team).await?;
                saga.compensate(Compensation::unlink(Relation::TeamUser, &team.id, &user.id));
                self.repo.save(&mut user).await?;
            }
        }

        // 3. Project side
        saga.step("link project team");
        let mut project: Project = self.repo.get(&valid.project_id).await?;
        if self.linker.link_project_team(&mut project, &mut team) {
            self.repo.save(&mut project).await?;
            saga.compensate(Compensation::unlink(Relation::ProjectTeam, &project.id, &team.id));
        }

        Ok(team.id)
    }

    /// Replace a team's member list
    pub async fn update_team_users(
        &self,
        actor: &str,
        team_id: &str,
        emails: &[String],
    ) -> QualitagResult<()> {
        let mut team: Team = self.repo.get(team_id).await?;
        let project: Project = self.repo.get(&team.project_id).await?;
        require_owner(&project, actor, "change team members")?;
        let member_ids = self.validation.validate_team_members(&project, &team.id, emails).await?;

        let removed: Vec<String> = team
            .user_ids
            .iter()
            .filter(|id| !member_ids.contains(id))
            .cloned()
            .collect();
        for user_id in &removed {
            match self.repo.find::<User>(user_id).await? {
                Some(mut user) => {
                    self.linker.unlink_team_user(&mut team, &mut user);
                    self.repo.save(&mut user).await?;
                }
                None => {
                    self.linker.drop_team_member(&mut team, user_id);
                }
            }
        }
        for user_id in &member_ids {
            let mut user: User = self.repo.get(user_id).await?;
            if self.linker.link_team_user(&mut team, &mut user) {
                self.repo.save(&mut user).await?;
            }
        }
        self.repo.save(&mut team).await?;
        info!(
            team_id = %team.id,
            members = team.user_ids.len(),
            removed = removed.len(),
            "Team members updated"
        );
        Ok(())
    }

    /// Delete a team, its artifacts and every reference to it
    pub async fn delete_team(&self, actor: &str, team_id: &str) -> QualitagResult<CascadeSummary> {
        let team: Team = self.repo.get(team_id).await?;
        let project: Project = self.repo.get(&team.project_id).await?;
        require_owner(&project, actor, "delete its teams")?;
        info!(team_id = %team.id, project_id = %project.id, "Deleting team with cascade");
        self.delete_team_cascade(&team).await
    }

    /// Artifacts, then member back-references, then the project side, then the team
    pub(crate) async fn delete_team_cascade(&self, team: &Team) -> QualitagResult<CascadeSummary> {
        let mut plan: Vec<EntityRef> = Vec::new();
        plan.extend(team.artifact_ids.iter().map(|id| EntityRef::new(Collection::Artifacts, id)));
        plan.extend(team.user_ids.iter().map(|id| EntityRef::new(Collection::Users, id)));
        plan.push(EntityRef::new(Collection::Projects, &team.project_id));
        plan.push(team.entity_ref());

        let mut cascade = Cascade::new("DeleteTeam", team.entity_ref(), plan);
        for item in cascade.pending() {
            let result = match item.collection {
                Collection::Artifacts => match self.repo.find::<Artifact>(&item.id).await {
                    Ok(Some(artifact)) => self.delete_artifact_cascade(&artifact).await.map(|_| ()),
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                },
                Collection::Users => self.detach(Relation::TeamUser, &item, &team.id).await,
                Collection::Projects => self.detach(Relation::ProjectTeam, &item, &team.id).await,
                _ => self.repo.delete(&item).await.map(|_| ()),
            };
            if let Err(e) = result {
                return Err(cascade.fail(e));
            }
            cascade.advance();
        }

        info!(team_id = %team.id, "Team deleted");
        Ok(cascade.finish())
    }
}
