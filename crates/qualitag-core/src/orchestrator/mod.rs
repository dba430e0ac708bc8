//! Composite operations
//!
//! Every entry point takes the acting user's id explicitly. Create
//! operations run as sagas and are rolled back on failure; delete
//! operations run as cascades that stop at the first failure and report
//! what was and was not processed.

mod artifact;
mod project;
mod saga;
mod tag;
mod team;
mod user;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::agreement::{AgreementCalculator, AgreementService, HttpAgreementClient};
use crate::clock::{Clock, SystemClock};
use crate::config::QualitagConfig;
use crate::error::{QualitagError, QualitagResult};
use crate::linker::{Relation, RelationshipLinker};
use crate::models::{EntityRef, Project};
use crate::notify::{LogNotifier, Notifier};
use crate::palette::{ColorPicker, RandomColorPicker};
use crate::store::{open_store, EntityStore, Repository};
use crate::validation::ValidationPipeline;

pub use project::{ProjectCreated, ProjectMembersChanged};
pub use saga::{Cascade, CascadeSummary, Compensation, Saga, SagaState};

/// Runs composite operations against one store
#[derive(Clone)]
pub struct CascadeOrchestrator {
    repo: Repository,
    validation: ValidationPipeline,
    linker: RelationshipLinker,
    config: Arc<QualitagConfig>,
    notifier: Arc<dyn Notifier>,
    agreement: Arc<dyn AgreementService>,
    calculator: AgreementCalculator,
}

/// Collects the injectable collaborators of a [`CascadeOrchestrator`]
pub struct OrchestratorBuilder {
    store: Arc<dyn EntityStore>,
    config: QualitagConfig,
    clock: Arc<dyn Clock>,
    colors: Arc<dyn ColorPicker>,
    notifier: Arc<dyn Notifier>,
    agreement: Option<Arc<dyn AgreementService>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: QualitagConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn color_picker(mut self, colors: Arc<dyn ColorPicker>) -> Self {
        self.colors = colors;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn agreement_service(mut self, service: Arc<dyn AgreementService>) -> Self {
        self.agreement = Some(service);
        self
    }

    /// Assemble the orchestrator. Without an explicit agreement service an
    /// HTTP client for the configured URL is used.
    pub fn build(self) -> QualitagResult<CascadeOrchestrator> {
        let config = Arc::new(self.config);
        let repo = Repository::new(self.store, config.store_timeout());
        let agreement: Arc<dyn AgreementService> = match self.agreement {
            Some(service) => service,
            None => Arc::new(HttpAgreementClient::new(
                config.agreement_service_url.clone(),
                config.agreement_timeout(),
            )?),
        };
        let validation =
            ValidationPipeline::new(repo.clone(), config.clone(), self.clock, self.colors);
        let calculator = AgreementCalculator::new(
            repo.clone(),
            agreement.clone(),
            config.agreement_matrix_layout,
            config.agreement_timeout(),
        );

        Ok(CascadeOrchestrator {
            repo,
            validation,
            linker: RelationshipLinker::new(),
            config,
            notifier: self.notifier,
            agreement,
            calculator,
        })
    }
}

impl CascadeOrchestrator {
    pub fn builder(store: Arc<dyn EntityStore>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            config: QualitagConfig::default(),
            clock: Arc::new(SystemClock),
            colors: Arc::new(RandomColorPicker),
            notifier: Arc::new(LogNotifier),
            agreement: None,
        }
    }

    /// Open the configured store and build an orchestrator with default collaborators
    pub async fn from_config(config: QualitagConfig) -> anyhow::Result<Self> {
        let store = open_store(&config).await?;
        Ok(Self::builder(store).config(config).build()?)
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn validation(&self) -> &ValidationPipeline {
        &self.validation
    }

    pub fn calculator(&self) -> &AgreementCalculator {
        &self.calculator
    }

    pub fn config(&self) -> &QualitagConfig {
        &self.config
    }

    /// Krippendorff's alpha for a team
    pub async fn team_agreement(
        &self,
        team_id: &str,
    ) -> QualitagResult<crate::agreement::TeamAgreement> {
        self.calculator.team_agreement(team_id).await
    }

    /// Drop the reference `item` holds to `other_id`
    async fn detach(
        &self,
        relation: Relation,
        item: &EntityRef,
        other_id: &str,
    ) -> QualitagResult<()> {
        saga::detach_stored(&self.repo, &self.linker, relation, item, other_id).await
    }
}

/// Only the project owner may perform `action`
fn require_owner(project: &Project, actor: &str, action: &str) -> QualitagResult<()> {
    if project.is_owner(actor) {
        Ok(())
    } else {
        Err(QualitagError::permission_denied(format!(
            "only the owner of project {} can {}",
            project.id, action
        )))
    }
}

/// Bound an outbound service call
async fn within<T, F>(timeout: Duration, call: F) -> QualitagResult<T>
where
    F: Future<Output = QualitagResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(QualitagError::ServiceUnavailable(format!(
            "agreement service did not answer within {}ms",
            timeout.as_millis()
        ))),
    }
}
