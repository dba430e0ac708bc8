//! Project model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Open,
    Closed,
    #[default]
    NoInfo,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Open => write!(f, "OPEN"),
            ProjectStatus::Closed => write!(f, "CLOSED"),
            ProjectStatus::NoInfo => write!(f, "NO_INFO"),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(ProjectStatus::Open),
            "CLOSED" => Ok(ProjectStatus::Closed),
            "NO_INFO" => Ok(ProjectStatus::NoInfo),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

/// Project entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub deadline: DateTime<Utc>,
    pub owner_id: String,
    /// Members other than the owner
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub artifact_ids: Vec<String>,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl Project {
    /// Create a new open project without members. The id is assigned on first save.
    pub fn new(
        name: String,
        description: String,
        owner_id: String,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            name,
            description,
            created_at,
            deadline,
            owner_id,
            user_ids: Vec::new(),
            team_ids: Vec::new(),
            artifact_ids: Vec::new(),
            status: ProjectStatus::Open,
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Owner or listed member
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.is_owner(user_id) || self.user_ids.iter().any(|id| id == user_id)
    }

    pub fn is_closed(&self) -> bool {
        self.status == ProjectStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_no_info() {
        assert_eq!(ProjectStatus::default(), ProjectStatus::NoInfo);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("closed".parse::<ProjectStatus>().unwrap(), ProjectStatus::Closed);
        assert_eq!(ProjectStatus::NoInfo.to_string(), "NO_INFO");
        assert!("archived".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_owner_is_participant() {
        let now = Utc::now();
        let mut project = Project::new("Alpha".into(), "d".into(), "owner".into(), now, now);
        project.user_ids.push("bob".into());
        assert!(project.is_participant("owner"));
        assert!(project.is_participant("bob"));
        assert!(!project.is_participant("eve"));
        assert!(!project.is_owner("bob"));
    }
}
