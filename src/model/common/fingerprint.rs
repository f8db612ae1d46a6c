//! Ballot fingerprints.
//!
//! A fingerprint is a SHA-256 digest over the voter identity, a voter-chosen
//! secret, the election and the ballot content. It is stored apart from the
//! ballot, so a voter who remembers their secret can later recompute it and
//! check that their ballot was recorded, while the stored value on its own
//! reveals nothing about who cast it.
//!
//! Fingerprints are not unique. Two different inputs colliding is
//! astronomically unlikely, but nothing relies on it never happening.

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

use crate::model::mongodb::Id;

/// Suffix used instead of the rank list for an abstain ballot.
const BLANK_SUFFIX: &str = "_blank";

/// What a ballot says, as far as the fingerprint is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotContent<'a> {
    /// Candidate IDs, most preferred first.
    Ranked(&'a [Id]),
    /// The voter abstained.
    Abstain,
}

impl<'a> BallotContent<'a> {
    /// Classify a ranking: putting the blank candidate first means abstaining.
    pub fn of(ranking: &'a [Id], blank: Option<Id>) -> Self {
        match (ranking.first(), blank) {
            (Some(first), Some(blank)) if *first == blank => Self::Abstain,
            _ => Self::Ranked(ranking),
        }
    }
}

/// The exact string that gets hashed.
///
/// `voter_secret_election`, followed by `_rank:candidate` for each rank in
/// increasing order, or by [`BLANK_SUFFIX`] for an abstain ballot.
fn canonical_input(voter: &str, secret: &str, election_id: Id, content: BallotContent) -> String {
    let mut input = format!("{voter}_{secret}_{election_id}");
    match content {
        BallotContent::Ranked(ranking) => {
            for (rank, candidate) in ranking.iter().enumerate() {
                input.push_str(&format!("_{rank}:{candidate}"));
            }
        }
        BallotContent::Abstain => input.push_str(BLANK_SUFFIX),
    }
    input
}

/// Compute the lowercase-hex fingerprint of a ballot. Deterministic and pure.
pub fn fingerprint(voter: &str, secret: &str, election_id: Id, content: BallotContent) -> String {
    let digest = Sha256::digest(canonical_input(voter, secret, election_id, content).as_bytes());
    HEXLOWER.encode(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Id> {
        (0..n).map(|_| Id::new()).collect()
    }

    #[test]
    fn canonical_input_layout() {
        let election: Id = "0123456789abcdef01234567".parse().unwrap();
        let a: Id = "aaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
        let b: Id = "bbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap();
        let ranking = [a, b];

        assert_eq!(
            canonical_input("alice@example.com", "s3cret", election, BallotContent::Ranked(&ranking)),
            "alice@example.com_s3cret_0123456789abcdef01234567\
             _0:aaaaaaaaaaaaaaaaaaaaaaaa_1:bbbbbbbbbbbbbbbbbbbbbbbb"
        );
        assert_eq!(
            canonical_input("alice@example.com", "", election, BallotContent::Abstain),
            "alice@example.com__0123456789abcdef01234567_blank"
        );
    }

    #[test]
    fn deterministic() {
        let election = Id::new();
        let ranking = ids(4);
        let content = BallotContent::Ranked(&ranking);
        let first = fingerprint("alice@example.com", "hunter2", election, content);
        let second = fingerprint("alice@example.com", "hunter2", election, content);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn sensitive_to_every_input() {
        let election = Id::new();
        let ranking = ids(3);
        let base = fingerprint("alice@example.com", "hunter2", election, BallotContent::Ranked(&ranking));

        let mut reordered = ranking.clone();
        reordered.swap(0, 1);

        let variants = [
            fingerprint("alice@example.co", "hunter2", election, BallotContent::Ranked(&ranking)),
            fingerprint("alice@example.com", "hunter3", election, BallotContent::Ranked(&ranking)),
            fingerprint("alice@example.com", "hunter2", Id::new(), BallotContent::Ranked(&ranking)),
            fingerprint("alice@example.com", "hunter2", election, BallotContent::Ranked(&reordered)),
            fingerprint("alice@example.com", "hunter2", election, BallotContent::Abstain),
        ];
        for variant in variants {
            assert_ne!(base, variant);
        }
    }

    #[test]
    fn blank_first_is_abstain() {
        let ranking = ids(3);
        assert_eq!(BallotContent::of(&ranking, Some(ranking[0])), BallotContent::Abstain);
        assert_eq!(
            BallotContent::of(&ranking, Some(ranking[1])),
            BallotContent::Ranked(&ranking)
        );
        assert_eq!(BallotContent::of(&ranking, None), BallotContent::Ranked(&ranking));
        assert_eq!(BallotContent::of(&[], Some(ranking[0])), BallotContent::Ranked(&[]));
    }
}
