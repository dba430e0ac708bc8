//! Artifact and tagging operations

use std::collections::HashMap;

use tracing::{info, warn};

use super::saga::{Cascade, CascadeSummary, Compensation, Saga};
use super::{require_owner, within, CascadeOrchestrator};
use crate::error::{QualitagError, QualitagResult};
use crate::linker::Relation;
use crate::models::{Artifact, Collection, Entity, EntityRef, Project, RefField, Tag, Team};
use crate::palette::PROCESSED_TAG_COLOR;
use crate::validation::{ArtifactTag, ArtifactUpdate, NewArtifact, ValidArtifact, ValidTag};

impl CascadeOrchestrator {
    /// Add an artifact to a project, assigned to the requested or least loaded team
    pub async fn create_artifact(
        &self,
        actor: &str,
        request: NewArtifact,
    ) -> QualitagResult<String> {
        let valid = self.validation.validate_new_artifact(actor, &request).await?;
        let mut saga = Saga::begin("CreateArtifact", &self.repo);
        match self.create_artifact_steps(&mut saga, valid).await {
            Ok(artifact) => {
                saga.commit();
                info!(artifact_id = %artifact.id, team_id = %artifact.team_id, "Artifact created");
                Ok(artifact.id)
            }
            Err(e) => Err(saga.abort(e).await),
        }
    }

    async fn create_artifact_steps(
        &self,
        saga: &mut Saga<'_>,
        valid: ValidArtifact,
    ) -> QualitagResult<Artifact> {
        saga.step("persist artifact");
        let mut artifact = Artifact::new(
            valid.name,
            valid.description,
            valid.project_id,
            valid.team_id,
            valid.content_ref,
        );
        self.repo.save(&mut artifact).await?;
        saga.compensate(Compensation::Delete(artifact.entity_ref()));

        saga.step("link team artifact");
        let mut team: Team = self.repo.get(&artifact.team_id).await?;
        if self.linker.link_team_artifact(&mut team, &mut artifact) {
            self.repo.save(&mut team).await?;
            saga.compensate(Compensation::unlink(Relation::TeamArtifact, &team.id, &artifact.id));
        }

        saga.step("link project artifact");
        let mut project: Project = self.repo.get(&artifact.project_id).await?;
        if self.linker.link_project_artifact(&mut project, &mut artifact) {
            self.repo.save(&mut project).await?;
            saga.compensate(Compensation::unlink(
                Relation::ProjectArtifact,
                &project.id,
                &artifact.id,
            ));
        }

        Ok(artifact)
    }

    /// Delete an artifact and its tag links
    pub async fn delete_artifact(
        &self,
        actor: &str,
        artifact_id: &str,
    ) -> QualitagResult<CascadeSummary> {
        let artifact: Artifact = self.repo.get(artifact_id).await?;
        let project: Project = self.repo.get(&artifact.project_id).await?;
        require_owner(&project, actor, "delete its artifacts")?;
        self.delete_artifact_cascade(&artifact).await
    }

    /// Tags, then team and project sides, then the artifact
    pub(crate) async fn delete_artifact_cascade(
        &self,
        artifact: &Artifact,
    ) -> QualitagResult<CascadeSummary> {
        let mut plan: Vec<EntityRef> = artifact
            .tag_ids
            .iter()
            .map(|id| EntityRef::new(Collection::Tags, id))
            .collect();
        plan.push(EntityRef::new(Collection::Teams, &artifact.team_id));
        plan.push(EntityRef::new(Collection::Projects, &artifact.project_id));
        plan.push(artifact.entity_ref());

        let mut cascade = Cascade::new("DeleteArtifact", artifact.entity_ref(), plan);
        for item in cascade.pending() {
            let result = match item.collection {
                Collection::Tags => self.detach(Relation::TagArtifact, &item, &artifact.id).await,
                Collection::Teams => self.detach(Relation::TeamArtifact, &item, &artifact.id).await,
                Collection::Projects => {
                    self.detach(Relation::ProjectArtifact, &item, &artifact.id).await
                }
                _ => self.repo.delete(&item).await.map(|_| ()),
            };
            if let Err(e) = result {
                return Err(cascade.fail(e));
            }
            cascade.advance();
        }

        info!(artifact_id = %artifact.id, "Artifact deleted");
        Ok(cascade.finish())
    }

    /// Open or close tagging on an artifact
    pub async fn set_tagging(
        &self,
        actor: &str,
        artifact_id: &str,
        open: bool,
    ) -> QualitagResult<()> {
        let mut artifact: Artifact = self.repo.get(artifact_id).await?;
        let project: Project = self.repo.get(&artifact.project_id).await?;
        require_owner(&project, actor, "change tagging")?;
        if artifact.tagging_open != open {
            artifact.tagging_open = open;
            self.repo.save(&mut artifact).await?;
        }
        info!(artifact_id = %artifact.id, open = open, "Tagging state set");
        Ok(())
    }

    /// Open or close tagging on several artifacts. Every artifact is loaded
    /// and checked before any is written. Returns how many changed.
    pub async fn set_tagging_many(
        &self,
        actor: &str,
        artifact_ids: &[String],
        open: bool,
    ) -> QualitagResult<usize> {
        if artifact_ids.is_empty() {
            return Err(QualitagError::validation("At least one artifact is required"));
        }

        let mut projects: HashMap<String, Project> = HashMap::new();
        let mut artifacts = Vec::with_capacity(artifact_ids.len());
        for artifact_id in artifact_ids {
            let artifact: Artifact = self.repo.get(artifact_id).await?;
            if !projects.contains_key(&artifact.project_id) {
                let project: Project = self.repo.get(&artifact.project_id).await?;
                projects.insert(project.id.clone(), project);
            }
            if let Some(project) = projects.get(&artifact.project_id) {
                require_owner(project, actor, "change tagging")?;
            }
            artifacts.push(artifact);
        }

        let mut changed = 0;
        for artifact in artifacts.iter_mut().filter(|a| a.tagging_open != open) {
            artifact.tagging_open = open;
            self.repo.save(artifact).await?;
            changed += 1;
        }
        info!(artifacts = artifact_ids.len(), changed = changed, open = open, "Tagging state set");
        Ok(changed)
    }

    /// Change an artifact's name, description or content reference
    pub async fn update_artifact(
        &self,
        actor: &str,
        artifact_id: &str,
        request: ArtifactUpdate,
    ) -> QualitagResult<()> {
        let mut artifact: Artifact = self.repo.get(artifact_id).await?;
        let project: Project = self.repo.get(&artifact.project_id).await?;
        require_owner(&project, actor, "update its artifacts")?;
        if project.is_closed() {
            return Err(QualitagError::Conflict(format!("Project {} is closed", project.id)));
        }

        let valid = self.validation.validate_artifact_update(&artifact, &request)?;
        artifact.name = valid.name;
        artifact.description = valid.description;
        artifact.content_ref = valid.content_ref;
        self.repo.save(&mut artifact).await?;
        info!(artifact_id = %artifact.id, "Artifact updated");
        Ok(())
    }

    /// Apply a tag to an artifact. Applying a tag twice is a no-op.
    pub async fn add_tag(
        &self,
        actor: &str,
        artifact_id: &str,
        tag_id: &str,
    ) -> QualitagResult<()> {
        let (mut artifact, mut tag) = self.tagging_target(actor, artifact_id, tag_id).await?;
        if artifact.has_tag(&tag.id) && tag.artifact_ids.contains(&artifact.id) {
            return Ok(());
        }

        let mut saga = Saga::begin("AddTag", &self.repo);
        self.linker.link_tag_artifact(&mut tag, &mut artifact);
        saga.step("persist artifact");
        if let Err(e) = self.repo.save(&mut artifact).await {
            return Err(saga.abort(e).await);
        }
        saga.compensate(Compensation::unlink(Relation::TagArtifact, &tag.id, &artifact.id));
        saga.step("persist tag");
        if let Err(e) = self.repo.save(&mut tag).await {
            return Err(saga.abort(e).await);
        }

        saga.commit();
        info!(
            artifact_id = %artifact.id,
            tag_id = %tag.id,
            actor = %actor,
            "Tag added to artifact"
        );
        Ok(())
    }

    /// Remove a tag from an artifact. Removing an absent tag is a no-op.
    pub async fn remove_tag(
        &self,
        actor: &str,
        artifact_id: &str,
        tag_id: &str,
    ) -> QualitagResult<()> {
        let (mut artifact, mut tag) = self.tagging_target(actor, artifact_id, tag_id).await?;
        if self.linker.unlink_tag_artifact(&mut tag, &mut artifact) {
            self.repo.save(&mut artifact).await?;
            self.repo.save(&mut tag).await?;
            info!(
                artifact_id = %artifact.id,
                tag_id = %tag.id,
                actor = %actor,
                "Tag removed from artifact"
            );
        }
        Ok(())
    }

    /// Load both records and check the actor may apply or remove this tag.
    ///
    /// The project owner may use any tag; a team member only tags they created.
    async fn tagging_target(
        &self,
        actor: &str,
        artifact_id: &str,
        tag_id: &str,
    ) -> QualitagResult<(Artifact, Tag)> {
        let artifact: Artifact = self.repo.get(artifact_id).await?;
        let tag: Tag = self.repo.get(tag_id).await?;
        let is_owner = self.tagging_access(actor, &artifact).await?;
        if is_owner || tag.created_by == actor {
            return Ok((artifact, tag));
        }
        Err(QualitagError::permission_denied(format!(
            "user {} cannot change tags of artifact {} with tag {}",
            actor, artifact.id, tag.id
        )))
    }

    /// Check tagging is open and the actor is the project owner or in the
    /// artifact's team. Returns whether the actor owns the project.
    async fn tagging_access(&self, actor: &str, artifact: &Artifact) -> QualitagResult<bool> {
        if !artifact.tagging_open {
            return Err(QualitagError::validation(format!(
                "Tagging is closed for artifact {}",
                artifact.id
            )));
        }

        let project: Project = self.repo.get(&artifact.project_id).await?;
        if project.is_owner(actor) {
            return Ok(true);
        }
        let team: Team = self.repo.get(&artifact.team_id).await?;
        if team.has_member(actor) {
            return Ok(false);
        }
        Err(QualitagError::permission_denied(format!(
            "user {} is not in the team of artifact {}",
            actor, artifact.id
        )))
    }

    /// Create tags for the actor and apply them to an artifact in one step.
    /// Either every tag is created and applied or none is.
    pub async fn tag_artifact(
        &self,
        actor: &str,
        artifact_id: &str,
        tags: &[ArtifactTag],
    ) -> QualitagResult<Vec<String>> {
        let mut artifact: Artifact = self.repo.get(artifact_id).await?;
        self.tagging_access(actor, &artifact).await?;
        let valid = self.validation.validate_artifact_tags(actor, &artifact, tags).await?;

        let mut saga = Saga::begin("TagArtifact", &self.repo);
        let mut tag_ids = Vec::with_capacity(valid.len());
        for tag in valid {
            match self.tag_artifact_steps(&mut saga, &mut artifact, tag).await {
                Ok(tag_id) => tag_ids.push(tag_id),
                Err(e) => return Err(saga.abort(e).await),
            }
        }
        saga.commit();

        info!(
            artifact_id = %artifact.id,
            actor = %actor,
            tags = tag_ids.len(),
            "Tags created on artifact"
        );
        Ok(tag_ids)
    }

    async fn tag_artifact_steps(
        &self,
        saga: &mut Saga<'_>,
        artifact: &mut Artifact,
        valid: ValidTag,
    ) -> QualitagResult<String> {
        let mut tag = self.create_tag_steps(saga, valid).await?;

        saga.step("link tag artifact");
        self.linker.link_tag_artifact(&mut tag, artifact);
        self.repo.save(&mut tag).await?;
        saga.compensate(Compensation::unlink(Relation::TagArtifact, &tag.id, &artifact.id));
        self.repo.save(artifact).await?;
        Ok(tag.id)
    }

    /// Replace an artifact's tags with the canonical values returned by the
    /// agreement service. Tags are created for the owner, reusing any the
    /// owner already has with the same value.
    pub async fn process_artifact_tags(
        &self,
        actor: &str,
        artifact_id: &str,
    ) -> QualitagResult<Vec<String>> {
        let mut artifact: Artifact = self.repo.get(artifact_id).await?;
        let project: Project = self.repo.get(&artifact.project_id).await?;
        require_owner(&project, actor, "process artifact tags")?;

        // 1. Current tag values
        let mut values = Vec::with_capacity(artifact.tag_ids.len());
        for tag_id in &artifact.tag_ids {
            match self.repo.find::<Tag>(tag_id).await? {
                Some(tag) => values.push(tag.value),
                None => {
                    warn!(
                        artifact_id = %artifact.id,
                        tag_id = %tag_id,
                        "Artifact references a missing tag"
                    );
                }
            }
        }

        // 2. Canonical values from the service
        let processed = within(
            self.config.agreement_timeout(),
            self.agreement.process_tags(&values),
        )
        .await?;

        // 3. Resolve each value to one of the owner's tags
        let owned: Vec<Tag> = self.repo.referencing(RefField::CreatedBy, actor).await?;
        let mut by_value: HashMap<String, String> =
            owned.into_iter().map(|tag| (tag.value, tag.id)).collect();
        let mut canonical = Vec::new();
        let mut new_tag_ids = Vec::new();
        for raw in processed {
            let value = match self.validation.tag_value(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        artifact_id = %artifact.id,
                        value = %raw,
                        error = %e,
                        "Skipping processed tag value"
                    );
                    continue;
                }
            };
            let tag_id = match by_value.get(&value) {
                Some(id) => id.clone(),
                None => {
                    let id = self
                        .create_valid_tag(ValidTag {
                            value: value.clone(),
                            creator_id: actor.to_string(),
                            color_hex: PROCESSED_TAG_COLOR.to_string(),
                        })
                        .await?;
                    by_value.insert(value.clone(), id.clone());
                    id
                }
            };
            if !new_tag_ids.contains(&tag_id) {
                new_tag_ids.push(tag_id);
                canonical.push(value);
            }
        }

        // 4. Swap the artifact's tags
        for old_id in artifact.tag_ids.clone() {
            match self.repo.find::<Tag>(&old_id).await? {
                Some(mut tag) => {
                    self.linker.unlink_tag_artifact(&mut tag, &mut artifact);
                    self.repo.save(&mut tag).await?;
                }
                None => {
                    self.linker.drop_artifact_tag(&mut artifact, &old_id);
                }
            }
        }
        for tag_id in &new_tag_ids {
            let mut tag: Tag = self.repo.get(tag_id).await?;
            if self.linker.link_tag_artifact(&mut tag, &mut artifact) {
                self.repo.save(&mut tag).await?;
            }
        }
        self.repo.save(&mut artifact).await?;

        info!(artifact_id = %artifact.id, tags = canonical.len(), "Artifact tags processed");
        Ok(canonical)
    }
}
