//! Project invitation notifications
//!
//! Delivery failures are reported back to the caller but never undo the
//! operation that triggered them.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::QualitagResult;

/// Invitation sent to a user added to a project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInvitation {
    pub recipient_email: String,
    pub recipient_username: String,
    pub project_id: String,
    pub project_name: String,
    pub project_description: String,
    pub inviter_name: String,
}

impl ProjectInvitation {
    pub fn subject(&self) -> String {
        format!("You have been added to project {}", self.project_name)
    }

    pub fn body(&self) -> String {
        format!(
            "Hi {},\n\n{} added you to the project \"{}\".\n\n{}\n",
            self.recipient_username, self.inviter_name, self.project_name, self.project_description
        )
    }
}

/// Outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn project_invitation(&self, invitation: &ProjectInvitation) -> QualitagResult<()>;
}

/// Notifier that only records invitations in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn project_invitation(&self, invitation: &ProjectInvitation) -> QualitagResult<()> {
        tracing::info!(
            recipient = %invitation.recipient_email,
            project_id = %invitation.project_id,
            subject = %invitation.subject(),
            "Project invitation"
        );
        Ok(())
    }
}
