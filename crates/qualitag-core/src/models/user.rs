//! User model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a user within one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Member,
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "OWNER"),
            Role::Member => write!(f, "MEMBER"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OWNER" => Ok(Role::Owner),
            "MEMBER" => Ok(Role::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub username: String,
    pub email: String,
    /// Opaque credential digest, never interpreted here
    pub password_hash: String,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub project_ids: Vec<String>,
    #[serde(default)]
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    /// Role per project id
    #[serde(default)]
    pub project_roles: BTreeMap<String, Role>,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        name: String,
        surname: String,
    ) -> Self {
        Self {
            id: String::new(),
            username,
            email,
            password_hash,
            name,
            surname,
            project_ids: Vec::new(),
            team_ids: Vec::new(),
            tag_ids: Vec::new(),
            project_roles: BTreeMap::new(),
        }
    }

    pub fn role_in(&self, project_id: &str) -> Option<Role> {
        self.project_roles.get(project_id).copied()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}
