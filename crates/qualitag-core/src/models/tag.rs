//! Tag model

use serde::{Deserialize, Serialize};

/// Tag entity. Values are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub value: String,
    /// Id of the creating user
    pub created_by: String,
    pub color_hex: String,
    #[serde(default)]
    pub artifact_ids: Vec<String>,
}

impl Tag {
    pub fn new(value: String, created_by: String, color_hex: String) -> Self {
        Self {
            id: String::new(),
            value,
            created_by,
            color_hex,
            artifact_ids: Vec::new(),
        }
    }

    /// Natural key used to detect duplicate tags of one creator
    pub fn business_key(&self) -> (&str, &str) {
        (&self.created_by, &self.value)
    }
}
