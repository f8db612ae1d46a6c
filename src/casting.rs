//! Accepting ballots.
//!
//! A ballot is admitted at most once per voter and election. What the voter
//! voted for and the fact that they voted end up in separate tables that
//! are only linked by insertion order, so after each commit both identity
//! linked tables are shuffled. This is a probabilistic mitigation against
//! correlating rows by position, not a cryptographic anonymity guarantee.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    common::fingerprint::{fingerprint, BallotContent},
    db::{
        ballot::{CastMarker, NewBallot},
        election::Election,
    },
    mongodb::Id,
    store::{ShuffledTable, Store},
};

/// Reasons a ballot is refused. None of them are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissibilityError {
    #[error("Not registered as a valid voter")]
    NotEligible,
    /// Covers both missing and unpublished elections, so that the existence
    /// of unpublished elections isn't revealed.
    #[error("Invalid election specified")]
    InvalidElection,
    #[error("Election has been finalized")]
    Finalized,
    #[error("Voting is not open for the specified election")]
    NotOpen,
    #[error("Already voted in the specified election")]
    AlreadyVoted,
    #[error("Missing or invalid candidates in vote")]
    CandidateMismatch,
}

/// Decide whether a ballot may be cast. Pure; the lookups happen beforehand.
///
/// The rules are checked in a fixed order and the first failure wins.
pub fn check_admissible<'a>(
    election: Option<&'a Election>,
    now: DateTime<Utc>,
    already_cast: bool,
    ranking: &[Id],
) -> std::result::Result<&'a Election, AdmissibilityError> {
    let election = election
        .filter(|e| e.published)
        .ok_or(AdmissibilityError::InvalidElection)?;
    if election.finalized {
        return Err(AdmissibilityError::Finalized);
    }
    if !election.voting_open_at(now) {
        return Err(AdmissibilityError::NotOpen);
    }
    if already_cast {
        return Err(AdmissibilityError::AlreadyVoted);
    }
    if !same_multiset(ranking.iter().copied(), election.candidate_ids()) {
        return Err(AdmissibilityError::CandidateMismatch);
    }
    Ok(election)
}

/// Do both sequences hold the same elements the same number of times?
fn same_multiset<T: Eq + Hash>(
    a: impl IntoIterator<Item = T>,
    b: impl IntoIterator<Item = T>,
) -> bool {
    let mut counts: HashMap<T, isize> = HashMap::new();
    for item in a {
        *counts.entry(item).or_default() += 1;
    }
    for item in b {
        *counts.entry(item).or_default() -= 1;
    }
    counts.values().all(|&c| c == 0)
}

/// Cast a ranked ballot and return its fingerprint.
///
/// `ranking` lists candidate IDs, most preferred first. Every candidate of the
/// election must appear exactly once; putting the blank candidate first
/// abstains.
pub async fn cast_ballot(
    store: &Store,
    config: &Config,
    voter: &str,
    election_id: Id,
    secret: &str,
    ranking: &[Id],
    now: DateTime<Utc>,
) -> Result<String> {
    if !store.is_eligible(voter).await? {
        return Err(AdmissibilityError::NotEligible.into());
    }

    let election = store.election(election_id).await?;
    let marker = CastMarker::new(voter, election_id, config);
    let already_cast = store.has_cast(&marker).await?;
    let election = check_admissible(election.as_ref(), now, already_cast, ranking)?;

    let content = BallotContent::of(ranking, election.blank().map(|c| c.id));
    let hash = fingerprint(voter, secret, election_id, content);
    let ballot = NewBallot::new(election_id, now, ranking, hash.clone(), marker);

    // The store enforces uniqueness again here; the check above can race.
    store.commit_ballot(&ballot).await?;
    debug!("Committed ballot {} in election {}", ballot.vote.id, election_id);

    if config.shuffle_after_commit() {
        spawn_shuffle(store.clone());
    }

    Ok(hash)
}

/// Has this voter cast a ballot in this election?
pub async fn has_voted(store: &Store, config: &Config, voter: &str, election_id: Id) -> Result<bool> {
    store
        .has_cast(&CastMarker::new(voter, election_id, config))
        .await
}

/// Shuffle the identity linked tables in the background.
///
/// Runs strictly after the commit and never affects its outcome. A failure
/// only weakens the anonymization, so it is logged and otherwise ignored.
fn spawn_shuffle(store: Store) {
    rocket::tokio::spawn(async move {
        for table in ShuffledTable::ALL {
            if let Err(e) = store.shuffle(table).await {
                warn!("Failed to shuffle {table}: {e}");
            }
        }
    });
}
