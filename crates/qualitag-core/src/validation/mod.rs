//! Validation pipeline
//!
//! Every create/update request passes through here before anything is
//! written. Validators trim and normalise input, fill defaults, resolve
//! email/username references to user ids and enforce cardinality and
//! timestamp rules. They only read from the store.

mod artifact;
mod project;
pub mod rules;
mod tag;
mod team;
mod user;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::QualitagConfig;
use crate::error::{QualitagError, QualitagResult};
use crate::models::User;
use crate::palette::ColorPicker;
use crate::store::Repository;

pub use artifact::{ArtifactUpdate, NewArtifact, ValidArtifact, ValidArtifactUpdate};
pub use project::{NewProject, ProjectUpdate, ValidProject, ValidProjectUpdate};
pub use tag::{ArtifactTag, NewTag, TagUpdate, ValidTag, ValidTagUpdate};
pub use team::{NewTeam, ValidTeam};
pub use user::{NewUser, UserUpdate, ValidUser, ValidUserUpdate};

/// Read-only validation over the current store contents
#[derive(Clone)]
pub struct ValidationPipeline {
    repo: Repository,
    config: Arc<QualitagConfig>,
    clock: Arc<dyn Clock>,
    colors: Arc<dyn ColorPicker>,
}

impl ValidationPipeline {
    pub fn new(
        repo: Repository,
        config: Arc<QualitagConfig>,
        clock: Arc<dyn Clock>,
        colors: Arc<dyn ColorPicker>,
    ) -> Self {
        Self {
            repo,
            config,
            clock,
            colors,
        }
    }

    pub fn config(&self) -> &QualitagConfig {
        &self.config
    }

    /// Resolve normalised emails to users, in order
    async fn resolve_emails(&self, emails: &[String]) -> QualitagResult<Vec<User>> {
        let mut users = Vec::with_capacity(emails.len());
        for email in emails {
            let user = self.repo.user_by_email(email).await?.ok_or_else(|| {
                QualitagError::validation(format!("User with email {} does not exist", email))
            })?;
            users.push(user);
        }
        Ok(users)
    }

    /// Resolve a user given either an id or a username
    async fn resolve_user(&self, reference: &str) -> QualitagResult<User> {
        let reference = rules::required("User reference", reference)?;
        if let Some(user) = self.repo.find::<User>(&reference).await? {
            return Ok(user);
        }
        self.repo
            .user_by_username(&reference)
            .await?
            .ok_or_else(|| {
                QualitagError::validation(format!(
                    "User with username {} does not exist",
                    reference
                ))
            })
    }
}
