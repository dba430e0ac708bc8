//! Project validation

use chrono::{DateTime, Months, Utc};
use serde::Deserialize;

use super::{rules, ValidationPipeline};
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Project, User};

/// Request to create a project
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub member_emails: Vec<String>,
}

/// A project request that passed validation
#[derive(Debug, Clone)]
pub struct ValidProject {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub owner_id: String,
    pub member_ids: Vec<String>,
    /// Normalised member emails, in request order
    pub member_emails: Vec<String>,
}

/// Request to change a project; unset fields stay as they are
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Replaces the member list when set
    #[serde(default)]
    pub member_emails: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ValidProjectUpdate {
    pub name: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub member_ids: Option<Vec<String>>,
}

impl ValidationPipeline {
    /// Validate a new project owned by `actor`
    pub async fn validate_new_project(
        &self,
        actor: &str,
        request: &NewProject,
    ) -> QualitagResult<ValidProject> {
        let config = self.config();
        let created_at = self.clock.now();

        // 1. Name
        let name = self.project_name(&request.name, None).await?;

        // 2. Description
        let description = rules::description_or_default(
            "Project description",
            request.description.as_deref(),
            || format!("Welcome to project {}!", name),
            config.description_max,
        )?;

        // 3. Deadline relative to creation
        self.check_deadline(created_at, request.deadline)?;

        // 4. Owner and members
        let owner: User = self.repo.get(actor).await?;
        let emails = rules::normalize_emails(&request.member_emails, false)?;
        let members = self.project_members(&owner, &emails).await?;

        Ok(ValidProject {
            name,
            description,
            created_at,
            deadline: request.deadline,
            owner_id: owner.id,
            member_ids: members.into_iter().map(|user| user.id).collect(),
            member_emails: emails,
        })
    }

    /// Validate changes to an existing project against its creation date
    pub async fn validate_project_update(
        &self,
        project: &Project,
        request: &ProjectUpdate,
    ) -> QualitagResult<ValidProjectUpdate> {
        let name = match &request.name {
            Some(name) => self.project_name(name, Some(&project.id)).await?,
            None => project.name.clone(),
        };

        let description = match &request.description {
            Some(description) => rules::description_or_default(
                "Project description",
                Some(description.as_str()),
                || format!("Welcome to project {}!", name),
                self.config().description_max,
            )?,
            None => project.description.clone(),
        };

        let deadline = match request.deadline {
            Some(deadline) => {
                self.check_deadline(project.created_at, deadline)?;
                deadline
            }
            None => project.deadline,
        };

        let member_ids = match &request.member_emails {
            Some(raw) => {
                let owner: User = self.repo.get(&project.owner_id).await?;
                let emails = rules::normalize_emails(raw, false)?;
                let members = self.project_members(&owner, &emails).await?;
                Some(members.into_iter().map(|user| user.id).collect())
            }
            None => None,
        };

        Ok(ValidProjectUpdate {
            name,
            description,
            deadline,
            member_ids,
        })
    }

    /// Validate emails being added to an existing project
    pub async fn validate_additional_members(
        &self,
        project: &Project,
        emails: &[String],
    ) -> QualitagResult<Vec<String>> {
        let owner: User = self.repo.get(&project.owner_id).await?;
        let emails = rules::normalize_emails(emails, true)?;
        if emails.contains(&owner.email.to_lowercase()) {
            return Err(QualitagError::OwnerListedAsMember { owner: owner.email });
        }
        let users = self.resolve_emails(&emails).await?;
        Ok(users.into_iter().map(|user| user.id).collect())
    }

    async fn project_name(&self, raw: &str, exclude_id: Option<&str>) -> QualitagResult<String> {
        let config = self.config();
        let name = rules::required("Project name", raw)?;
        rules::check_length(
            "Project name",
            &name,
            config.project_name_min,
            config.project_name_max,
        )?;
        if self.repo.project_name_taken(&name, exclude_id).await? {
            return Err(QualitagError::ProjectExists { name });
        }
        Ok(name)
    }

    /// Deadline strictly after creation and within the configured horizon
    fn check_deadline(
        &self,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> QualitagResult<()> {
        let years = self.config().max_deadline_years;
        if deadline <= created_at {
            return Err(QualitagError::validation(
                "Deadline must be after the project creation date",
            ));
        }
        let horizon = created_at
            .checked_add_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if deadline > horizon {
            return Err(QualitagError::validation(format!(
                "Deadline cannot be more than {} after the project creation date",
                rules::pluralize(years as usize, "year")
            )));
        }
        Ok(())
    }

    /// Owner exclusion, resolution and size bounds for a project member list.
    ///
    /// Every project starts with a default team holding all members, so the
    /// team size bounds apply.
    async fn project_members(&self, owner: &User, emails: &[String]) -> QualitagResult<Vec<User>> {
        let config = self.config();
        if emails.contains(&owner.email.to_lowercase()) {
            return Err(QualitagError::OwnerListedAsMember {
                owner: owner.email.clone(),
            });
        }
        rules::check_cardinality(
            "a project",
            "user",
            emails.len(),
            config.team_users_min,
            config.team_users_max,
        )?;
        self.resolve_emails(emails).await
    }
}
