//! Artifact validation

use serde::Deserialize;

use super::{rules, ValidationPipeline};
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Artifact, Project, Team};

/// Request to add an artifact to a project
#[derive(Debug, Clone, Deserialize)]
pub struct NewArtifact {
    pub project_id: String,
    /// Target team; the least loaded team is chosen when unset
    #[serde(default)]
    pub team_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content_ref: String,
}

#[derive(Debug, Clone)]
pub struct ValidArtifact {
    pub project_id: String,
    pub team_id: String,
    pub name: String,
    pub description: String,
    pub content_ref: String,
}

/// Request to change an artifact's name, description or content reference
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidArtifactUpdate {
    pub name: String,
    pub description: String,
    pub content_ref: String,
}

impl ValidationPipeline {
    /// Validate a new artifact. Only the project owner may add artifacts.
    pub async fn validate_new_artifact(
        &self,
        actor: &str,
        request: &NewArtifact,
    ) -> QualitagResult<ValidArtifact> {
        let config = self.config();
        let project: Project = self.repo.get(&request.project_id).await?;
        if !project.is_owner(actor) {
            return Err(QualitagError::permission_denied(
                "only the project owner can add artifacts",
            ));
        }
        if project.is_closed() {
            return Err(QualitagError::Conflict(format!("Project {} is closed", project.id)));
        }

        let name = rules::required("Artifact name", &request.name)?;
        rules::check_length("Artifact name", &name, 1, config.artifact_name_max)?;
        let description = rules::description_or_default(
            "Artifact description",
            request.description.as_deref(),
            || format!("Artifact {}", name),
            config.description_max,
        )?;
        let content_ref = rules::required("Artifact content", &request.content_ref)?;

        let team_id = match &request.team_id {
            Some(team_id) => {
                let team: Team = self.repo.get(team_id).await?;
                if team.project_id != project.id {
                    return Err(QualitagError::Conflict(format!(
                        "Team {} does not belong to project {}",
                        team.id, project.id
                    )));
                }
                team.id
            }
            None => self.least_loaded_team(&project).await?,
        };

        Ok(ValidArtifact {
            project_id: project.id,
            team_id,
            name,
            description,
            content_ref,
        })
    }

    /// Validate changes to an artifact; unset fields keep their value and a
    /// blank description falls back to the default
    pub fn validate_artifact_update(
        &self,
        artifact: &Artifact,
        request: &ArtifactUpdate,
    ) -> QualitagResult<ValidArtifactUpdate> {
        let config = self.config();
        let name = match &request.name {
            Some(raw) => {
                let name = rules::required("Artifact name", raw)?;
                rules::check_length("Artifact name", &name, 1, config.artifact_name_max)?;
                name
            }
            None => artifact.name.clone(),
        };
        let description = match &request.description {
            Some(raw) => rules::description_or_default(
                "Artifact description",
                Some(raw.as_str()),
                || format!("Artifact {}", name),
                config.description_max,
            )?,
            None => artifact.description.clone(),
        };
        let content_ref = match &request.content_ref {
            Some(raw) => rules::required("Artifact content", raw)?,
            None => artifact.content_ref.clone(),
        };

        Ok(ValidArtifactUpdate {
            name,
            description,
            content_ref,
        })
    }

    /// Team with the fewest artifacts; ties go to the earliest team
    async fn least_loaded_team(&self, project: &Project) -> QualitagResult<String> {
        let mut best: Option<Team> = None;
        for team_id in &project.team_ids {
            let Some(team) = self.repo.find::<Team>(team_id).await? else {
                tracing::warn!(
                    project_id = %project.id,
                    team_id = %team_id,
                    "Project references a missing team"
                );
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |current| team.artifact_ids.len() < current.artifact_ids.len());
            if better {
                best = Some(team);
            }
        }
        best.map(|team| team.id).ok_or_else(|| {
            QualitagError::Conflict(format!(
                "Project {} has no teams to assign the artifact to",
                project.id
            ))
        })
    }
}
