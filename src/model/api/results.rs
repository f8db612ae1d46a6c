use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::election::Candidate};
use crate::tally::schulze::{Matrix, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub presentation: String,
    pub symbolic: bool,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
            presentation: candidate.presentation,
            symbolic: candidate.symbolic,
        }
    }
}

/// A Schulze ranking. Matrix rows and columns follow `ranking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchulzeResult {
    pub ranking: Vec<CandidateDescription>,
    pub total_votes: usize,
    pub prefer_matrix: Matrix,
    pub strongest_path_matrix: Matrix,
}

impl From<Outcome> for SchulzeResult {
    fn from(outcome: Outcome) -> Self {
        Self {
            ranking: outcome.ranking.into_iter().map(Into::into).collect(),
            total_votes: outcome.total_votes,
            prefer_matrix: outcome.prefer,
            strongest_path_matrix: outcome.strongest_paths,
        }
    }
}
