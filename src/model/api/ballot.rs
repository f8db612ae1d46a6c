use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::ballot::RankedBallot, mongodb::Id};

/// A ballot as submitted by a voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotSpec {
    /// Lets the voter recompute their fingerprint later. May be empty.
    #[serde(default)]
    pub secret: String,
    /// Every candidate of the election, most preferred first.
    pub ranking: Vec<ApiId>,
}

impl BallotSpec {
    pub fn ranking(&self) -> Vec<Id> {
        self.ranking.iter().map(|&id| id.into()).collect()
    }
}

/// What a voter gets back for a cast ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastReceipt {
    pub fingerprint: String,
}

/// A stored ballot, stripped of anything that points at its voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotDescription {
    pub time: DateTime<Utc>,
    pub blank: bool,
    pub election: ApiId,
    pub rankings: Vec<ApiId>,
}

impl BallotDescription {
    pub fn new(ballot: RankedBallot, blank: Option<Id>) -> Self {
        Self {
            time: ballot.vote_time,
            blank: ballot.is_blank(blank),
            election: ballot.election_id.into(),
            rankings: ballot.ranking.into_iter().map(ApiId::from).collect(),
        }
    }
}
