//! Tag validation

use serde::Deserialize;

use super::{rules, ValidationPipeline};
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Artifact, RefField, Tag};

/// Request to create a tag
#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub value: String,
    /// Creator id or username
    pub created_by: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidTag {
    pub value: String,
    pub creator_id: String,
    pub color_hex: String,
}

/// Request to change a tag's value or colour
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidTagUpdate {
    pub value: String,
    pub color_hex: String,
}

/// Tag created and applied to an artifact in one request
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactTag {
    pub value: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl ValidationPipeline {
    /// Validate a new tag. Values are upper-cased; a missing colour is
    /// picked from the default palette.
    pub async fn validate_new_tag(
        &self,
        actor: &str,
        request: &NewTag,
    ) -> QualitagResult<ValidTag> {
        let creator = self.resolve_user(&request.created_by).await?;
        if creator.id != actor {
            return Err(QualitagError::permission_denied(
                "tags can only be created for yourself",
            ));
        }

        let value = self.tag_value(&request.value)?;
        let color_hex = self.tag_color(request.color.as_deref());

        if self.config().reject_duplicate_tags {
            self.check_unique_tag(&creator.id, &value, None).await?;
        }

        Ok(ValidTag {
            value,
            creator_id: creator.id,
            color_hex,
        })
    }

    /// Validate tags the actor creates directly on an artifact. A value the
    /// actor has already applied to this artifact, or repeats in the
    /// request, is rejected.
    pub async fn validate_artifact_tags(
        &self,
        actor: &str,
        artifact: &Artifact,
        requests: &[ArtifactTag],
    ) -> QualitagResult<Vec<ValidTag>> {
        if requests.is_empty() {
            return Err(QualitagError::validation("At least one tag is required"));
        }
        let existing: Vec<Tag> = self.repo.referencing(RefField::CreatedBy, actor).await?;

        let mut valid: Vec<ValidTag> = Vec::with_capacity(requests.len());
        for request in requests {
            let value = self.tag_value(&request.value)?;
            let applied = existing
                .iter()
                .any(|tag| tag.value == value && tag.artifact_ids.contains(&artifact.id));
            if applied || valid.iter().any(|tag| tag.value == value) {
                return Err(QualitagError::TagExists { value });
            }
            let owned = existing.iter().any(|tag| tag.value == value);
            if self.config().reject_duplicate_tags && owned {
                return Err(QualitagError::TagExists { value });
            }
            valid.push(ValidTag {
                color_hex: self.tag_color(request.color.as_deref()),
                value,
                creator_id: actor.to_string(),
            });
        }
        Ok(valid)
    }

    pub async fn validate_tag_update(
        &self,
        tag: &Tag,
        request: &TagUpdate,
    ) -> QualitagResult<ValidTagUpdate> {
        let value = match &request.value {
            Some(raw) => {
                let value = self.tag_value(raw)?;
                // Renaming always rejects clashing with another tag of the same creator
                if value != tag.value {
                    self.check_unique_tag(&tag.created_by, &value, Some(&tag.id)).await?;
                }
                value
            }
            None => tag.value.clone(),
        };
        let color_hex = match &request.color {
            Some(color) if !color.trim().is_empty() => color.clone(),
            _ => tag.color_hex.clone(),
        };
        Ok(ValidTagUpdate { value, color_hex })
    }

    pub(crate) fn tag_value(&self, raw: &str) -> QualitagResult<String> {
        let config = self.config();
        let value = rules::required("Tag value", raw)?.to_uppercase();
        rules::check_length("Tag value", &value, config.tag_value_min, config.tag_value_max)?;
        Ok(value)
    }

    /// Supplied colours pass through unchanged
    fn tag_color(&self, color: Option<&str>) -> String {
        match color {
            Some(color) if !color.trim().is_empty() => color.to_string(),
            _ => self.colors.pick().to_string(),
        }
    }

    async fn check_unique_tag(
        &self,
        creator_id: &str,
        value: &str,
        exclude_id: Option<&str>,
    ) -> QualitagResult<()> {
        let existing: Vec<Tag> = self.repo.referencing(RefField::CreatedBy, creator_id).await?;
        let clash = existing
            .iter()
            .any(|tag| tag.value == value && Some(tag.id.as_str()) != exclude_id);
        if clash {
            return Err(QualitagError::TagExists {
                value: value.to_string(),
            });
        }
        Ok(())
    }
}
