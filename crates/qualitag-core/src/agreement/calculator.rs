//! Team agreement computation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AgreementService, RatingPayload};
use crate::config::MatrixLayout;
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Artifact, Tag, Team};
use crate::store::Repository;

/// Tag values per rater and artifact.
///
/// Rows follow the team's member order, columns the team's artifact order.
/// A rater who applied nothing to an artifact has an empty cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementMatrix {
    pub raters: Vec<String>,
    pub artifacts: Vec<String>,
    /// `cells[rater][artifact]`
    pub cells: Vec<Vec<Vec<String>>>,
}

impl AgreementMatrix {
    /// Build the matrix from loaded artifacts and the tags they carry
    pub fn build(raters: &[String], artifacts: &[Artifact], tags: &HashMap<String, Tag>) -> Self {
        let cells = raters
            .iter()
            .map(|rater| {
                artifacts
                    .iter()
                    .map(|artifact| {
                        artifact
                            .tag_ids
                            .iter()
                            .filter_map(|tag_id| tags.get(tag_id))
                            .filter(|tag| &tag.created_by == rater)
                            .map(|tag| tag.value.clone())
                            .collect()
                    })
                    .collect()
            })
            .collect();

        Self {
            raters: raters.to_vec(),
            artifacts: artifacts.iter().map(|a| a.id.clone()).collect(),
            cells,
        }
    }

    /// Nested list in the requested axis order
    pub fn to_payload(&self, layout: MatrixLayout) -> RatingPayload {
        match layout {
            MatrixLayout::RaterMajor => self.cells.clone(),
            MatrixLayout::ArtifactMajor => (0..self.artifacts.len())
                .map(|a| self.cells.iter().map(|row| row[a].clone()).collect())
                .collect(),
        }
    }
}

/// Agreement of one team
#[derive(Debug, Clone, Serialize)]
pub struct TeamAgreement {
    pub team_id: String,
    /// `NaN` when the statistic is undefined
    pub alpha: f64,
    pub matrix: AgreementMatrix,
}

/// Computes inter-rater agreement through an [`AgreementService`]
#[derive(Clone)]
pub struct AgreementCalculator {
    repo: Repository,
    service: Arc<dyn AgreementService>,
    layout: MatrixLayout,
    timeout: Duration,
}

impl AgreementCalculator {
    pub fn new(
        repo: Repository,
        service: Arc<dyn AgreementService>,
        layout: MatrixLayout,
        timeout: Duration,
    ) -> Self {
        Self {
            repo,
            service,
            layout,
            timeout,
        }
    }

    /// Krippendorff's alpha over the team's artifacts, bounded by the default timeout
    pub async fn team_agreement(&self, team_id: &str) -> QualitagResult<TeamAgreement> {
        self.team_agreement_within(team_id, self.timeout).await
    }

    /// Same as [`team_agreement`](Self::team_agreement) with a caller-supplied
    /// bound on the service call
    pub async fn team_agreement_within(
        &self,
        team_id: &str,
        timeout: Duration,
    ) -> QualitagResult<TeamAgreement> {
        let matrix = self.team_matrix(team_id).await?;
        let payload = matrix.to_payload(self.layout);
        debug!(
            team_id = %team_id,
            raters = matrix.raters.len(),
            artifacts = matrix.artifacts.len(),
            "Requesting agreement"
        );

        let call = self.service.krippendorff_alpha(&payload);
        let alpha = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    team_id = %team_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Agreement service timed out"
                );
                return Err(QualitagError::ServiceUnavailable(format!(
                    "agreement service did not answer within {}ms",
                    timeout.as_millis()
                )));
            }
        };

        info!(team_id = %team_id, alpha = alpha, "Computed team agreement");
        Ok(TeamAgreement {
            team_id: team_id.to_string(),
            alpha,
            matrix,
        })
    }

    /// Load the team's artifacts and tags and arrange them per rater
    pub async fn team_matrix(&self, team_id: &str) -> QualitagResult<AgreementMatrix> {
        let team: Team = self.repo.get(team_id).await?;
        if team.artifact_ids.is_empty() {
            return Err(QualitagError::NoArtifacts(team.id));
        }

        let mut artifacts = Vec::with_capacity(team.artifact_ids.len());
        for artifact_id in &team.artifact_ids {
            artifacts.push(self.repo.get::<Artifact>(artifact_id).await?);
        }

        let mut tags = HashMap::new();
        for artifact in &artifacts {
            for tag_id in &artifact.tag_ids {
                if tags.contains_key(tag_id) {
                    continue;
                }
                match self.repo.find::<Tag>(tag_id).await? {
                    Some(tag) => {
                        tags.insert(tag_id.clone(), tag);
                    }
                    None => {
                        warn!(
                            artifact_id = %artifact.id,
                            tag_id = %tag_id,
                            "Artifact references a missing tag"
                        );
                    }
                }
            }
        }

        Ok(AgreementMatrix::build(&team.user_ids, &artifacts, &tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(id: &str, tag_ids: &[&str]) -> Artifact {
        let mut artifact = Artifact::new(
            id.into(),
            "d".into(),
            "p1".into(),
            "t1".into(),
            "ref".into(),
        );
        artifact.id = id.into();
        artifact.tag_ids = tag_ids.iter().map(|s| s.to_string()).collect();
        artifact
    }

    fn tag(id: &str, value: &str, creator: &str) -> (String, Tag) {
        let mut tag = Tag::new(value.into(), creator.into(), "#a6aebf".into());
        tag.id = id.into();
        (id.to_string(), tag)
    }

    #[test]
    fn test_matrix_has_empty_cells_for_missing_ratings() {
        let raters = vec!["bob".to_string(), "carol".to_string()];
        let artifacts = vec![artifact("a1", &["g1", "g2"]), artifact("a2", &["g3"])];
        let tags: HashMap<_, _> = [
            tag("g1", "URGENT", "bob"),
            tag("g2", "LATER", "carol"),
            tag("g3", "URGENT", "bob"),
        ]
        .into_iter()
        .collect();

        let matrix = AgreementMatrix::build(&raters, &artifacts, &tags);
        assert_eq!(
            matrix.cells,
            vec![
                vec![vec!["URGENT".to_string()], vec!["URGENT".to_string()]],
                vec![vec!["LATER".to_string()], vec![]],
            ]
        );
    }

    #[test]
    fn test_artifact_major_layout_transposes() {
        let matrix = AgreementMatrix {
            raters: vec!["r1".into(), "r2".into()],
            artifacts: vec!["a1".into()],
            cells: vec![vec![vec!["X".into()]], vec![vec![]]],
        };
        let payload = matrix.to_payload(MatrixLayout::ArtifactMajor);
        assert_eq!(payload, vec![vec![vec!["X".to_string()], vec![]]]);
        assert_eq!(matrix.to_payload(MatrixLayout::RaterMajor), matrix.cells);
    }
}
