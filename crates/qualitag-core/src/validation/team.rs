//! Team validation

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{rules, ValidationPipeline};
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Project, User};

/// Request to create a team inside a project
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_emails: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ValidTeam {
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub member_ids: Vec<String>,
}

impl ValidationPipeline {
    /// Validate a new team. Only the project owner may create teams.
    pub async fn validate_new_team(
        &self,
        actor: &str,
        request: &NewTeam,
    ) -> QualitagResult<ValidTeam> {
        let config = self.config();
        let project: Project = self.repo.get(&request.project_id).await?;
        if !project.is_owner(actor) {
            return Err(QualitagError::permission_denied(
                "only the project owner can create teams",
            ));
        }

        let name = self.team_name(&request.name)?;
        let description = rules::description_or_default(
            "Team description",
            request.description.as_deref(),
            || format!("Hi, we are team {}!", name),
            config.description_max,
        )?;
        let created_at = rules::check_created_at("Team", request.created_at, self.clock.now())?;

        let member_ids = self.team_members(&project, &request.member_emails).await?;

        Ok(ValidTeam {
            project_id: project.id,
            name,
            description,
            created_at,
            member_ids,
        })
    }

    /// Validate a replacement member list for an existing team
    pub async fn validate_team_members(
        &self,
        project: &Project,
        team_id: &str,
        emails: &[String],
    ) -> QualitagResult<Vec<String>> {
        let users = self.team_member_users(project, emails).await?;
        for user in &users {
            self.check_single_team(project, user, Some(team_id))?;
        }
        Ok(users.into_iter().map(|user| user.id).collect())
    }

    fn team_name(&self, raw: &str) -> QualitagResult<String> {
        let config = self.config();
        let name = rules::required("Team name", raw)?;
        if name.chars().any(char::is_whitespace) {
            return Err(QualitagError::validation("Team name cannot contain whitespace"));
        }
        rules::check_length("Team name", &name, config.team_name_min, config.team_name_max)?;
        Ok(name)
    }

    async fn team_members(
        &self,
        project: &Project,
        emails: &[String],
    ) -> QualitagResult<Vec<String>> {
        let users = self.team_member_users(project, emails).await?;
        for user in &users {
            self.check_single_team(project, user, None)?;
        }
        Ok(users.into_iter().map(|user| user.id).collect())
    }

    /// Normalise, bound and resolve a team member list; every user must
    /// already be a project member and the owner is never one of them
    async fn team_member_users(
        &self,
        project: &Project,
        emails: &[String],
    ) -> QualitagResult<Vec<User>> {
        let config = self.config();
        let emails = rules::normalize_emails(emails, true)?;

        let owner: User = self.repo.get(&project.owner_id).await?;
        if emails.contains(&owner.email.to_lowercase()) {
            return Err(QualitagError::OwnerListedAsMember { owner: owner.email });
        }

        rules::check_cardinality(
            "a team",
            "user",
            emails.len(),
            config.team_users_min,
            config.team_users_max,
        )?;

        let users = self.resolve_emails(&emails).await?;
        for user in &users {
            if !project.user_ids.contains(&user.id) {
                return Err(QualitagError::NotProjectMember {
                    user: user.email.clone(),
                    project_id: project.id.clone(),
                });
            }
        }
        Ok(users)
    }

    /// A user belongs to at most one team per project
    fn check_single_team(
        &self,
        project: &Project,
        user: &User,
        allowed: Option<&str>,
    ) -> QualitagResult<()> {
        let existing = user.team_ids.iter().find(|team_id| {
            project.team_ids.contains(team_id) && Some(team_id.as_str()) != allowed
        });
        match existing {
            Some(team_id) => Err(QualitagError::MemberInOtherTeam {
                user: user.email.clone(),
                team_id: team_id.clone(),
            }),
            None => Ok(()),
        }
    }
}
