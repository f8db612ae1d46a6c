//! The boundary to ballot persistence.
//!
//! Everything the casting and counting code needs from storage goes through
//! [`BallotStore`]. Implementations must make [`BallotStore::commit_ballot`]
//! all-or-nothing and must enforce one cast marker per (voter, election)
//! themselves, since the check done before committing can race.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    db::{
        ballot::{CastMarker, NewBallot, RankedBallot},
        election::Election,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// The store as held in managed state.
pub type Store = Arc<dyn BallotStore>;

/// The tables that grow in lockstep with every cast and therefore get shuffled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffledTable {
    CastMarkers,
    VoteHashes,
}

impl ShuffledTable {
    pub const ALL: [ShuffledTable; 2] = [ShuffledTable::CastMarkers, ShuffledTable::VoteHashes];
}

impl Display for ShuffledTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CastMarkers => write!(f, "casted_votes"),
            Self::VoteHashes => write!(f, "vote_hashes"),
        }
    }
}

#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// Fetch an election with its candidates.
    async fn election(&self, id: Id) -> Result<Option<Election>>;

    /// Is this identity in the eligible-voter registry?
    async fn is_eligible(&self, voter: &str) -> Result<bool>;

    /// Has a marker for the same voter and election been recorded?
    async fn has_cast(&self, marker: &CastMarker) -> Result<bool>;

    /// Atomically persist the vote, its rankings, its fingerprint and the cast marker.
    ///
    /// Fails with [`AdmissibilityError::AlreadyVoted`](crate::casting::AdmissibilityError)
    /// if the marker already exists, in which case nothing is written.
    async fn commit_ballot(&self, ballot: &NewBallot) -> Result<()>;

    /// All ballots of an election, read from one consistent snapshot.
    async fn ballots(&self, election_id: Id) -> Result<Vec<RankedBallot>>;

    /// All stored fingerprints of an election.
    async fn vote_hashes(&self, election_id: Id) -> Result<Vec<String>>;

    /// Reorder the rows of the given table uniformly at random.
    async fn shuffle(&self, table: ShuffledTable) -> Result<()>;
}
