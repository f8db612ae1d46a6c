use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{config::Config, model::mongodb::Id};

pub type HmacSha256 = Hmac<Sha256>;

/// The content-free header of a cast ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub vote_time: DateTime<Utc>,
}

/// One preference within a ballot. Rank 0 is the most preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub vote_id: Id,
    pub rank: u32,
    pub candidate_id: Id,
}

/// Rows whose primary key is a random slot rather than something time-ordered.
///
/// An `ObjectId` embeds its creation time, which would let these rows be
/// lined up against each other no matter how they are ordered on disk.
pub trait Slotted {
    fn slot(&self) -> i64;
    fn reslot(&mut self);
}

/// A ballot fingerprint, stored apart from the ballot it describes.
/// Deliberately not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHash {
    #[serde(rename = "_id")]
    pub slot: i64,
    pub hash: String,
    pub election_id: Id,
}

impl VoteHash {
    pub fn new(hash: String, election_id: Id) -> Self {
        Self {
            slot: rand::random(),
            hash,
            election_id,
        }
    }
}

impl Slotted for VoteHash {
    fn slot(&self) -> i64 {
        self.slot
    }

    fn reslot(&mut self) {
        self.slot = rand::random();
    }
}

/// Record that a voter has voted in an election. Says nothing about what they voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastMarker {
    #[serde(rename = "_id")]
    pub slot: i64,
    /// HMAC of the voter identity.
    pub voter: String,
    pub election_id: Id,
}

impl CastMarker {
    pub fn new(voter: &str, election_id: Id, config: &Config) -> Self {
        Self {
            slot: rand::random(),
            // Do not directly store the voter identity.
            voter: voter_hmac(voter, config),
            election_id,
        }
    }

    /// Do both markers record the same voter in the same election?
    pub fn same_cast(&self, other: &CastMarker) -> bool {
        self.voter == other.voter && self.election_id == other.election_id
    }
}

impl Slotted for CastMarker {
    fn slot(&self) -> i64 {
        self.slot
    }

    fn reslot(&mut self) {
        self.slot = rand::random();
    }
}

fn voter_hmac(voter: &str, config: &Config) -> String {
    let mut hmac =
        HmacSha256::new_from_slice(config.hmac_secret()).expect("HMAC can take key of any size");
    hmac.update(voter.as_bytes());
    HEXLOWER.encode(&hmac.finalize().into_bytes())
}

/// Everything a single cast writes. Either all of it persists or none of it does.
#[derive(Debug, Clone)]
pub struct NewBallot {
    pub vote: Vote,
    pub rankings: Vec<Ranking>,
    pub hash: VoteHash,
    pub marker: CastMarker,
}

impl NewBallot {
    pub fn new(
        election_id: Id,
        vote_time: DateTime<Utc>,
        ranking: &[Id],
        hash: String,
        marker: CastMarker,
    ) -> Self {
        let vote = Vote {
            id: Id::new(),
            election_id,
            vote_time,
        };
        let rankings = ranking
            .iter()
            .zip(0..)
            .map(|(&candidate_id, rank)| Ranking {
                vote_id: vote.id,
                rank,
                candidate_id,
            })
            .collect();
        Self {
            vote,
            rankings,
            hash: VoteHash::new(hash, election_id),
            marker,
        }
    }
}

/// A ballot reassembled from its vote and ranking rows, ready for counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedBallot {
    pub id: Id,
    pub election_id: Id,
    pub vote_time: DateTime<Utc>,
    /// Candidate IDs, most preferred first.
    pub ranking: Vec<Id>,
}

impl RankedBallot {
    /// Put the rows of one ballot back together. Rows may arrive in any order.
    pub fn assemble(vote: Vote, mut rankings: Vec<Ranking>) -> Self {
        rankings.sort_by_key(|r| r.rank);
        Self {
            id: vote.id,
            election_id: vote.election_id,
            vote_time: vote.vote_time,
            ranking: rankings.into_iter().map(|r| r.candidate_id).collect(),
        }
    }

    /// An abstain ballot puts the blank candidate first.
    pub fn is_blank(&self, blank: Option<Id>) -> bool {
        blank.is_some() && self.ranking.first().copied() == blank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ballot_ranks_are_dense_and_ordered() {
        let election_id = Id::new();
        let ranking = vec![Id::new(), Id::new(), Id::new()];
        let marker = CastMarker::new("alice@example.com", election_id, &Config::example());
        let ballot = NewBallot::new(election_id, Utc::now(), &ranking, "h".into(), marker);

        let ranks: Vec<_> = ballot.rankings.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(ballot.rankings.iter().all(|r| r.vote_id == ballot.vote.id));
        let candidates: Vec<_> = ballot.rankings.iter().map(|r| r.candidate_id).collect();
        assert_eq!(candidates, ranking);
        assert_eq!(ballot.hash.election_id, election_id);
    }

    #[test]
    fn assemble_sorts_by_rank() {
        let vote = Vote {
            id: Id::new(),
            election_id: Id::new(),
            vote_time: Utc::now(),
        };
        let (a, b, c) = (Id::new(), Id::new(), Id::new());
        let rows = vec![
            Ranking { vote_id: vote.id, rank: 2, candidate_id: c },
            Ranking { vote_id: vote.id, rank: 0, candidate_id: a },
            Ranking { vote_id: vote.id, rank: 1, candidate_id: b },
        ];
        let ballot = RankedBallot::assemble(vote, rows);
        assert_eq!(ballot.ranking, vec![a, b, c]);
        assert!(ballot.is_blank(Some(a)));
        assert!(!ballot.is_blank(Some(b)));
        assert!(!ballot.is_blank(None));
    }

    #[test]
    fn cast_marker_hides_identity() {
        let config = Config::example();
        let election_id = Id::new();
        let marker = CastMarker::new("alice@example.com", election_id, &config);
        assert!(!marker.voter.contains("alice"));
        assert!(marker.same_cast(&CastMarker::new("alice@example.com", election_id, &config)));
        assert!(!marker.same_cast(&CastMarker::new("bob@example.com", election_id, &config)));
        assert!(!marker.same_cast(&CastMarker::new("alice@example.com", Id::new(), &config)));
    }
}
