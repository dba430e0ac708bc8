#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use qualitag_core::agreement::{AgreementService, RatingPayload};
use qualitag_core::clock::FixedClock;
use qualitag_core::models::Entity;
use qualitag_core::notify::{Notifier, ProjectInvitation};
use qualitag_core::orchestrator::ProjectCreated;
use qualitag_core::palette::{DefaultColor, FixedColorPicker};
use qualitag_core::validation::{NewArtifact, NewProject, NewTag, NewUser};
use qualitag_core::{
    CascadeOrchestrator, InMemoryStore, QualitagConfig, QualitagError, QualitagResult,
};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn email(username: &str) -> String {
    format!("{}@x.com", username)
}

pub fn emails(usernames: &[&str]) -> Vec<String> {
    usernames.iter().map(|u| email(u)).collect()
}

/// Agreement service answering from canned values
#[derive(Default)]
pub struct FakeAgreement {
    pub alpha: Mutex<f64>,
    pub processed: Mutex<Vec<String>>,
    pub payloads: Mutex<Vec<RatingPayload>>,
    pub delay: Mutex<Option<Duration>>,
}

#[async_trait]
impl AgreementService for FakeAgreement {
    async fn krippendorff_alpha(&self, payload: &RatingPayload) -> QualitagResult<f64> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(*self.alpha.lock().unwrap())
    }

    async fn process_tags(&self, _values: &[String]) -> QualitagResult<Vec<String>> {
        Ok(self.processed.lock().unwrap().clone())
    }
}

/// Notifier recording recipients, failing for one address
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail_for: Mutex<Option<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn project_invitation(&self, invitation: &ProjectInvitation) -> QualitagResult<()> {
        if self.fail_for.lock().unwrap().as_deref() == Some(invitation.recipient_email.as_str()) {
            return Err(QualitagError::Service("mail relay refused the message".into()));
        }
        self.sent.lock().unwrap().push(invitation.recipient_email.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub orch: CascadeOrchestrator,
    pub agreement: Arc<FakeAgreement>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(QualitagConfig::default())
    }

    pub fn with_config(config: QualitagConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let agreement = Arc::new(FakeAgreement::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = CascadeOrchestrator::builder(store.clone())
            .config(config)
            .clock(Arc::new(FixedClock(now())))
            .color_picker(Arc::new(FixedColorPicker(DefaultColor::Sage)))
            .notifier(notifier.clone())
            .agreement_service(agreement.clone())
            .build()
            .unwrap();
        Self {
            store,
            orch,
            agreement,
            notifier,
        }
    }

    pub async fn user(&self, username: &str) -> String {
        self.orch
            .register_user(NewUser {
                username: username.into(),
                email: email(username),
                password_hash: "hash".into(),
                name: username.to_uppercase(),
                surname: "Tester".into(),
            })
            .await
            .unwrap()
    }

    pub async fn users(&self, usernames: &[&str]) -> Vec<String> {
        let mut ids = Vec::new();
        for username in usernames {
            ids.push(self.user(username).await);
        }
        ids
    }

    pub fn new_project(&self, name: &str, members: &[&str]) -> NewProject {
        NewProject {
            name: name.into(),
            description: None,
            deadline: now() + chrono::Duration::days(30),
            member_emails: emails(members),
        }
    }

    pub async fn project(&self, owner: &str, name: &str, members: &[&str]) -> ProjectCreated {
        self.orch
            .create_project(owner, self.new_project(name, members))
            .await
            .unwrap()
    }

    pub async fn artifact(&self, owner: &str, project_id: &str, name: &str) -> String {
        self.orch
            .create_artifact(
                owner,
                NewArtifact {
                    project_id: project_id.into(),
                    team_id: None,
                    name: name.into(),
                    description: None,
                    content_ref: format!("s3://artifacts/{}", name),
                },
            )
            .await
            .unwrap()
    }

    pub async fn tag(&self, creator: &str, value: &str) -> String {
        self.orch
            .create_tag(
                creator,
                NewTag {
                    value: value.into(),
                    created_by: creator.into(),
                    color: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn get<T: Entity>(&self, id: &str) -> T {
        self.orch.repository().get::<T>(id).await.unwrap()
    }

    pub async fn exists<T: Entity>(&self, id: &str) -> bool {
        self.orch.repository().find::<T>(id).await.unwrap().is_some()
    }
}
