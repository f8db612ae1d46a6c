use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rocket::tokio::sync::Mutex;

use crate::casting::AdmissibilityError;
use crate::error::Result;
use crate::model::{
    db::{
        ballot::{CastMarker, NewBallot, RankedBallot, Ranking, Slotted, Vote, VoteHash},
        election::Election,
        voter::ValidVoter,
    },
    mongodb::Id,
};

use super::{BallotStore, ShuffledTable};

#[derive(Default)]
struct Tables {
    elections: HashMap<Id, Election>,
    valid_voters: HashSet<String>,
    votes: Vec<Vote>,
    rankings: Vec<Ranking>,
    vote_hashes: Vec<VoteHash>,
    casted_votes: Vec<CastMarker>,
}

/// A ballot store that lives in process memory.
///
/// All tables sit behind one lock, so every operation is atomic with respect
/// to every other. Cloning gives another handle on the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an election.
    pub async fn insert_election(&self, election: Election) {
        self.tables
            .lock()
            .await
            .elections
            .insert(election.id, election);
    }

    /// Add identities to the eligible-voter registry. Already registered identities are skipped.
    pub async fn add_voters(&self, voters: impl IntoIterator<Item = ValidVoter>) {
        let mut tables = self.tables.lock().await;
        tables
            .valid_voters
            .extend(voters.into_iter().map(|v| v.identity));
    }

    /// The cast-marker table in its current row order.
    pub async fn cast_markers(&self) -> Vec<CastMarker> {
        self.tables.lock().await.casted_votes.clone()
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.tables.lock().await.elections.get(&id).cloned())
    }

    async fn is_eligible(&self, voter: &str) -> Result<bool> {
        Ok(self.tables.lock().await.valid_voters.contains(voter))
    }

    async fn has_cast(&self, marker: &CastMarker) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.casted_votes.iter().any(|m| m.same_cast(marker)))
    }

    async fn commit_ballot(&self, ballot: &NewBallot) -> Result<()> {
        let mut tables = self.tables.lock().await;
        // Holding the lock makes the uniqueness check and the inserts one atomic step.
        if tables.casted_votes.iter().any(|m| m.same_cast(&ballot.marker)) {
            return Err(AdmissibilityError::AlreadyVoted.into());
        }
        tables.votes.push(ballot.vote.clone());
        tables.rankings.extend(ballot.rankings.iter().cloned());
        tables.vote_hashes.push(ballot.hash.clone());
        tables.casted_votes.push(ballot.marker.clone());
        Ok(())
    }

    async fn ballots(&self, election_id: Id) -> Result<Vec<RankedBallot>> {
        let tables = self.tables.lock().await;
        let mut rankings: HashMap<Id, Vec<Ranking>> = HashMap::new();
        for ranking in tables.rankings.iter() {
            rankings
                .entry(ranking.vote_id)
                .or_default()
                .push(ranking.clone());
        }
        let ballots = tables
            .votes
            .iter()
            .filter(|vote| vote.election_id == election_id)
            .map(|vote| {
                let rows = rankings.remove(&vote.id).unwrap_or_default();
                RankedBallot::assemble(vote.clone(), rows)
            })
            .collect();
        Ok(ballots)
    }

    async fn vote_hashes(&self, election_id: Id) -> Result<Vec<String>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .vote_hashes
            .iter()
            .filter(|h| h.election_id == election_id)
            .map(|h| h.hash.clone())
            .collect())
    }

    async fn shuffle(&self, table: ShuffledTable) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match table {
            ShuffledTable::CastMarkers => reshuffle(&mut tables.casted_votes),
            ShuffledTable::VoteHashes => reshuffle(&mut tables.vote_hashes),
        }
        Ok(())
    }
}

fn reshuffle<T: Slotted>(rows: &mut [T]) {
    rows.shuffle(&mut rand::thread_rng());
    rows.iter_mut().for_each(Slotted::reslot);
}
