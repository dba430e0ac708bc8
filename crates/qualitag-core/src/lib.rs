//! Qualitag Core
//!
//! Data consistency layer of the Qualitag qualitative annotation platform.
//! Projects, teams, users, tags and artifacts live in separate collections
//! and reference each other by id; this crate keeps those references
//! bidirectional across multi-record operations.
//!
//! # Features
//! - Request validation with business rules (names, deadlines, team sizes)
//! - Bidirectional relationship maintenance
//! - Create operations with compensation on failure
//! - Delete cascades with partial-failure reporting
//! - Inter-rater agreement through an external Krippendorff's alpha service
//! - In-memory and MongoDB storage backends

pub mod agreement;
pub mod clock;
pub mod config;
pub mod error;
pub mod linker;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod palette;
pub mod store;
pub mod validation;

pub use agreement::{AgreementCalculator, AgreementService, HttpAgreementClient, TeamAgreement};
pub use config::QualitagConfig;
pub use error::{CascadeReport, ErrorKind, QualitagError, QualitagResult};
pub use linker::RelationshipLinker;
pub use orchestrator::{CascadeOrchestrator, CascadeSummary};
pub use store::{EntityStore, InMemoryStore, MongoStore, Repository};
pub use validation::ValidationPipeline;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Does nothing when a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qualitag_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
