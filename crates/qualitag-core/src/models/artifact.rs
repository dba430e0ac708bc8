//! Artifact model

use serde::{Deserialize, Serialize};

/// Artifact entity: a piece of content annotated by one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub project_id: String,
    pub team_id: String,
    /// Opaque reference to the stored content
    pub content_ref: String,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default = "default_tagging_open")]
    pub tagging_open: bool,
}

fn default_tagging_open() -> bool {
    true
}

impl Artifact {
    pub fn new(
        name: String,
        description: String,
        project_id: String,
        team_id: String,
        content_ref: String,
    ) -> Self {
        Self {
            id: String::new(),
            name,
            description,
            project_id,
            team_id,
            content_ref,
            tag_ids: Vec::new(),
            tagging_open: true,
        }
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tag_ids.iter().any(|id| id == tag_id)
    }
}
