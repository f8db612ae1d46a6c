//! Counting the ballots of finalized elections.
//!
//! Both engines are pure functions of the candidate list and the ballots;
//! this module only loads a consistent snapshot and checks the preconditions.

use thiserror::Error;

use crate::error::Result;
use crate::model::{
    db::{ballot::RankedBallot, election::Election},
    mongodb::Id,
    store::Store,
};

pub mod irv;
pub mod schulze;

/// Reasons an election can't be counted (yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TallyPrecondition {
    #[error("Invalid election specified")]
    UnknownElection,
    #[error("Can't count votes of unfinalized election")]
    NotFinalized,
    #[error("Election has no votes")]
    NoVotes,
}

/// Fetch an election, requiring it to be finalized.
pub async fn finalized_election(store: &Store, election_id: Id) -> Result<Election> {
    let election = store
        .election(election_id)
        .await?
        .ok_or(TallyPrecondition::UnknownElection)?;
    if !election.finalized {
        return Err(TallyPrecondition::NotFinalized.into());
    }
    Ok(election)
}

/// Fetch a finalized election together with all its ballots, of which there must be at least one.
pub async fn load_finalized(
    store: &Store,
    election_id: Id,
) -> Result<(Election, Vec<RankedBallot>)> {
    let election = finalized_election(store, election_id).await?;
    let ballots = store.ballots(election_id).await?;
    if ballots.is_empty() {
        return Err(TallyPrecondition::NoVotes.into());
    }
    Ok((election, ballots))
}

/// Count a finalized election by instant-runoff.
pub async fn tally_irv(store: &Store, election_id: Id) -> Result<Vec<irv::Stage>> {
    let (election, ballots) = load_finalized(store, election_id).await?;
    let stages = irv::count(&election.candidates, &ballots);
    debug!(
        "Counted {} ballots of election {} in {} stages",
        ballots.len(),
        election_id,
        stages.len()
    );
    Ok(stages)
}

/// Rank the candidates of a finalized election by the Schulze method.
/// Ties are broken uniformly at random.
pub async fn tally_schulze(store: &Store, election_id: Id) -> Result<schulze::Outcome> {
    let (election, ballots) = load_finalized(store, election_id).await?;
    let outcome = schulze::count(&election.candidates, &ballots, &mut rand::thread_rng());
    Ok(outcome)
}

/// Every ballot of a finalized election.
pub async fn list_ballots(store: &Store, election_id: Id) -> Result<(Election, Vec<RankedBallot>)> {
    let election = finalized_election(store, election_id).await?;
    let ballots = store.ballots(election_id).await?;
    Ok((election, ballots))
}

/// The stored fingerprints of a finalized election.
pub async fn list_fingerprints(store: &Store, election_id: Id) -> Result<Vec<String>> {
    finalized_election(store, election_id).await?;
    store.vote_hashes(election_id).await
}
