//! Team model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team entity. A team belongs to exactly one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub artifact_ids: Vec<String>,
}

impl Team {
    pub fn new(
        project_id: String,
        name: String,
        description: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            project_id,
            name,
            description,
            created_at,
            user_ids: Vec::new(),
            artifact_ids: Vec::new(),
        }
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
    }
}
