//! Tag operations

use tracing::info;

use super::saga::{Cascade, CascadeSummary, Compensation, Saga};
use super::CascadeOrchestrator;
use crate::error::{QualitagError, QualitagResult};
use crate::linker::Relation;
use crate::models::{Collection, Entity, EntityRef, Tag, User};
use crate::validation::{NewTag, TagUpdate, ValidTag};

impl CascadeOrchestrator {
    /// Create a tag owned by the acting user
    pub async fn create_tag(&self, actor: &str, request: NewTag) -> QualitagResult<String> {
        let valid = self.validation.validate_new_tag(actor, &request).await?;
        self.create_valid_tag(valid).await
    }

    /// Persist an already validated tag and link it to its creator
    pub(crate) async fn create_valid_tag(&self, valid: ValidTag) -> QualitagResult<String> {
        let mut saga = Saga::begin("CreateTag", &self.repo);
        match self.create_tag_steps(&mut saga, valid).await {
            Ok(tag) => {
                saga.commit();
                info!(
                    tag_id = %tag.id,
                    value = %tag.value,
                    created_by = %tag.created_by,
                    "Tag created"
                );
                Ok(tag.id)
            }
            Err(e) => Err(saga.abort(e).await),
        }
    }

    pub(super) async fn create_tag_steps(
        &self,
        saga: &mut Saga<'_>,
        valid: ValidTag,
    ) -> QualitagResult<Tag> {
        saga.step("persist tag");
        let mut tag = Tag::new(valid.value, valid.creator_id, valid.color_hex);
        self.repo.save(&mut tag).await?;
        saga.compensate(Compensation::Delete(tag.entity_ref()));

        saga.step("link user tag");
        let mut user: User = self.repo.get(&tag.created_by).await?;
        if self.linker.link_user_tag(&mut user, &mut tag) {
            self.repo.save(&mut user).await?;
            saga.compensate(Compensation::unlink(Relation::UserTag, &user.id, &tag.id));
        }
        Ok(tag)
    }

    /// Change a tag's value or colour. Only its creator may do this.
    pub async fn update_tag(
        &self,
        actor: &str,
        tag_id: &str,
        request: TagUpdate,
    ) -> QualitagResult<()> {
        let mut tag: Tag = self.repo.get(tag_id).await?;
        if tag.created_by != actor {
            return Err(QualitagError::permission_denied(format!(
                "only the creator can change tag {}",
                tag.id
            )));
        }
        let valid = self.validation.validate_tag_update(&tag, &request).await?;
        tag.value = valid.value;
        tag.color_hex = valid.color_hex;
        self.repo.save(&mut tag).await?;
        info!(tag_id = %tag.id, value = %tag.value, "Tag updated");
        Ok(())
    }

    /// Delete a tag and drop it from every artifact
    pub async fn delete_tag(&self, actor: &str, tag_id: &str) -> QualitagResult<CascadeSummary> {
        let tag: Tag = self.repo.get(tag_id).await?;
        if tag.created_by != actor {
            return Err(QualitagError::permission_denied(format!(
                "only the creator can delete tag {}",
                tag.id
            )));
        }
        self.delete_tag_cascade(&tag).await
    }

    /// Artifacts, then the creator, then the tag
    pub(crate) async fn delete_tag_cascade(&self, tag: &Tag) -> QualitagResult<CascadeSummary> {
        let mut plan: Vec<EntityRef> = tag
            .artifact_ids
            .iter()
            .map(|id| EntityRef::new(Collection::Artifacts, id))
            .collect();
        plan.push(EntityRef::new(Collection::Users, &tag.created_by));
        plan.push(tag.entity_ref());

        let mut cascade = Cascade::new("DeleteTag", tag.entity_ref(), plan);
        for item in cascade.pending() {
            let result = match item.collection {
                Collection::Artifacts => self.detach(Relation::TagArtifact, &item, &tag.id).await,
                Collection::Users => self.detach(Relation::UserTag, &item, &tag.id).await,
                _ => self.repo.delete(&item).await.map(|_| ()),
            };
            if let Err(e) = result {
                return Err(cascade.fail(e));
            }
            cascade.advance();
        }

        info!(tag_id = %tag.id, "Tag deleted");
        Ok(cascade.finish())
    }
}
