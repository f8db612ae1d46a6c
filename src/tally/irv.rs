//! Instant-runoff counting.
//!
//! Each round, every ballot counts for its most preferred candidate that is
//! still in the running. Ballots for the blank candidate are reported on the
//! side and don't count towards the total. The weakest candidate is
//! eliminated, and counting stops once the leader holds a strict majority of
//! the total. The "no acceptable candidate" option competes like any other.
//!
//! When several candidates share the lowest count, the one with the lowest
//! ID is eliminated.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{
    db::{ballot::RankedBallot, election::Candidate},
    mongodb::Id,
};

/// One candidate's result in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateResult {
    pub name: String,
    pub votes: u64,
    /// Was this candidate eliminated at the end of this round?
    pub eliminated: bool,
}

/// One round of counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// Candidates still in the running, most votes first.
    pub candidates: Vec<CandidateResult>,
    pub blanks: u64,
}

impl Stage {
    /// The candidate with the most votes this round.
    pub fn leader(&self) -> Option<&CandidateResult> {
        self.candidates.first()
    }

    /// Sum of all non-blank votes this round.
    pub fn total(&self) -> u64 {
        self.candidates.iter().map(|c| c.votes).sum()
    }
}

/// Run instant-runoff counting to completion.
///
/// The last stage holds the winner first, unless no ballot counted for
/// anyone but the blank candidate, in which case there is only one stage
/// and nobody wins.
pub fn count(candidates: &[Candidate], ballots: &[RankedBallot]) -> Vec<Stage> {
    let blank = candidates.iter().find(|c| c.is_blank()).map(|c| c.id);
    let mut eliminated: HashSet<Id> = HashSet::new();
    let mut stages = Vec::new();

    loop {
        let mut votes: HashMap<Id, u64> = HashMap::new();
        let mut blanks = 0;
        for ballot in ballots {
            let first = ballot
                .ranking
                .iter()
                .copied()
                .find(|id| !eliminated.contains(id));
            match first {
                Some(id) if Some(id) == blank => blanks += 1,
                Some(id) => *votes.entry(id).or_default() += 1,
                None => {} // Exhausted.
            }
        }

        let mut running: Vec<(&Candidate, u64)> = candidates
            .iter()
            .filter(|c| Some(c.id) != blank && !eliminated.contains(&c.id))
            .map(|c| (c, votes.get(&c.id).copied().unwrap_or(0)))
            .collect();
        let total: u64 = running.iter().map(|(_, v)| v).sum();

        // Ties in the listing follow the election's candidate order.
        running.sort_by(|(_, a), (_, b)| b.cmp(a));
        let leader_votes = running.first().map_or(0, |(_, v)| *v);
        let majority = leader_votes * 2 > total;

        let weakest = if total == 0 || (majority && running.len() == 1) {
            None
        } else {
            running
                .iter()
                .min_by_key(|(c, v)| (*v, c.id))
                .map(|(c, _)| c.id)
        };

        stages.push(Stage {
            candidates: running
                .iter()
                .map(|(c, v)| CandidateResult {
                    name: c.name.clone(),
                    votes: *v,
                    eliminated: Some(c.id) == weakest,
                })
                .collect(),
            blanks,
        });

        match weakest {
            Some(id) if !majority => {
                eliminated.insert(id);
            }
            _ => break,
        }
    }

    stages
}
