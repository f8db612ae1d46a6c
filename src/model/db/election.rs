use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::{optional_datetime, Id};

/// Display name of the symbolic "no candidate is acceptable" option.
pub const VACANT_CANDIDATE: &str = "Vakant";
/// Display name of the symbolic abstain (blank ballot) option.
pub const BLANK_CANDIDATE: &str = "Blank";

/// A single candidate, embedded in its election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Id,
    pub name: String,
    pub presentation: String,
    /// True only for the two reserved options present in every election.
    pub symbolic: bool,
}

impl Candidate {
    fn symbolic(name: &str) -> Self {
        Self {
            id: Id::new(),
            name: name.to_string(),
            presentation: String::new(),
            symbolic: true,
        }
    }

    /// Is this the reserved "no acceptable candidate" option?
    pub fn is_vacant(&self) -> bool {
        self.symbolic && self.name == VACANT_CANDIDATE
    }

    /// Is this the reserved abstain option?
    pub fn is_blank(&self) -> bool {
        self.symbolic && self.name == BLANK_CANDIDATE
    }
}

/// An election, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub description: String,
    /// Seat counts. Informational only, counting never reads them.
    pub mandates: u32,
    pub extra_mandates: u32,
    /// Voting is only possible in published elections.
    pub published: bool,
    /// Once set, candidates and metadata are frozen and counting is allowed.
    pub finalized: bool,
    /// The voting interval is only defined if both bounds are present.
    #[serde(default, with = "optional_datetime")]
    pub open_time: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_datetime")]
    pub close_time: Option<DateTime<Utc>>,
    pub candidates: Vec<Candidate>,
}

/// Reasons a candidate list edit is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("'{0}' is a reserved candidate name")]
    ReservedName(String),
    #[error("Can't add candidate to published election")]
    Published,
    #[error("Can't remove candidate from opened election")]
    Opened,
    #[error("Can't remove candidate from finalized election")]
    Finalized,
    #[error("Can't remove candidate from election with votes")]
    HasVotes,
    #[error("Can't remove a symbolic candidate")]
    Symbolic,
    #[error("Invalid candidate specified")]
    Unknown,
}

impl Election {
    /// Create an empty, unpublished election with no voting interval.
    /// It starts out with the two symbolic candidates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            name: name.into(),
            description: String::new(),
            mandates: 1,
            extra_mandates: 0,
            published: false,
            finalized: false,
            open_time: None,
            close_time: None,
            candidates: vec![
                Candidate::symbolic(VACANT_CANDIDATE),
                Candidate::symbolic(BLANK_CANDIDATE),
            ],
        }
    }

    /// Is voting open at the given instant?
    ///
    /// The interval is inclusive at both ends. If either bound is missing,
    /// voting is never open.
    pub fn voting_open_at(&self, time: DateTime<Utc>) -> bool {
        match (self.open_time, self.close_time) {
            (Some(open), Some(close)) => open <= time && time <= close,
            _ => false,
        }
    }

    /// Has the opening time been reached?
    pub fn has_opened(&self, now: DateTime<Utc>) -> bool {
        self.open_time.map_or(false, |open| now >= open)
    }

    pub fn candidate(&self, id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// The reserved abstain candidate, if the election has one.
    pub fn blank(&self) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.is_blank())
    }

    /// The reserved "no acceptable candidate" option, if the election has one.
    pub fn vacant(&self) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.is_vacant())
    }

    pub fn candidate_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.candidates.iter().map(|c| c.id)
    }

    /// Add a regular candidate. Only possible before publishing.
    pub fn add_candidate(
        &mut self,
        name: impl Into<String>,
        presentation: impl Into<String>,
    ) -> Result<&Candidate, CandidateError> {
        let name = name.into();
        if name == VACANT_CANDIDATE || name == BLANK_CANDIDATE {
            return Err(CandidateError::ReservedName(name));
        }
        if self.published {
            return Err(CandidateError::Published);
        }
        self.candidates.push(Candidate {
            id: Id::new(),
            name,
            presentation: presentation.into(),
            symbolic: false,
        });
        Ok(&self.candidates[self.candidates.len() - 1])
    }

    /// Remove a regular candidate.
    ///
    /// Refused once the election has opened, is finalized, or has any votes.
    pub fn remove_candidate(
        &mut self,
        id: Id,
        now: DateTime<Utc>,
        has_votes: bool,
    ) -> Result<Candidate, CandidateError> {
        let index = self
            .candidates
            .iter()
            .position(|c| c.id == id)
            .ok_or(CandidateError::Unknown)?;
        if self.candidates[index].symbolic {
            return Err(CandidateError::Symbolic);
        }
        if self.has_opened(now) {
            return Err(CandidateError::Opened);
        }
        if self.finalized {
            return Err(CandidateError::Finalized);
        }
        if has_votes {
            return Err(CandidateError::HasVotes);
        }
        Ok(self.candidates.remove(index))
    }
}


#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use mongodb::bson::{self, Bson};

    use super::*;

    #[test]
    fn window_is_stored_as_bson_dates() {
        let open = Utc.with_ymd_and_hms(2022, 10, 30, 8, 0, 0).unwrap();
        let close = open + Duration::hours(12);
        let mut election = Election::example();
        election.open_time = Some(open);
        election.close_time = Some(close);

        let document = bson::to_document(&election).unwrap();
        assert_eq!(
            document.get("open_time"),
            Some(&Bson::DateTime(bson::DateTime::from_chrono(open)))
        );
        assert_eq!(
            document.get("close_time"),
            Some(&Bson::DateTime(bson::DateTime::from_chrono(close)))
        );
        assert_eq!(bson::from_document::<Election>(document).unwrap(), election);
    }

    #[test]
    fn unset_window_loads_as_none() {
        let election = Election::new("Kassör");
        let mut document = bson::to_document(&election).unwrap();
        assert_eq!(document.get("open_time"), Some(&Bson::Null));

        document.remove("open_time");
        document.remove("close_time");
        let loaded: Election = bson::from_document(document).unwrap();
        assert_eq!(loaded.open_time, None);
        assert_eq!(loaded.close_time, None);
    }

    #[test]
    fn new_election_has_symbolic_candidates() {
        let election = Election::new("Kassör");
        assert_eq!(election.candidates.len(), 2);
        assert!(election.vacant().is_some());
        assert!(election.blank().is_some());
        assert!(!election.published);
        assert!(!election.finalized);
    }

    #[test]
    fn voting_window_is_inclusive() {
        let open = Utc.with_ymd_and_hms(2022, 10, 30, 0, 0, 0).unwrap();
        let close = open + Duration::days(1);
        let mut election = Election::new("Sekreterare");
        election.open_time = Some(open);
        election.close_time = Some(close);

        assert!(election.voting_open_at(open));
        assert!(election.voting_open_at(close));
        assert!(election.voting_open_at(open + Duration::hours(3)));
        assert!(!election.voting_open_at(open - Duration::seconds(1)));
        assert!(!election.voting_open_at(close + Duration::seconds(1)));
    }

    #[test]
    fn half_defined_window_is_never_open() {
        let now = Utc::now();
        let mut election = Election::new("Sekreterare");
        election.open_time = Some(now - Duration::days(1));
        assert!(!election.voting_open_at(now));

        election.open_time = None;
        election.close_time = Some(now + Duration::days(1));
        assert!(!election.voting_open_at(now));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut election = Election::new("Vice ordförande");
        assert_eq!(
            election.add_candidate(BLANK_CANDIDATE, ""),
            Err(CandidateError::ReservedName(BLANK_CANDIDATE.to_string()))
        );
        assert_eq!(
            election.add_candidate(VACANT_CANDIDATE, ""),
            Err(CandidateError::ReservedName(VACANT_CANDIDATE.to_string()))
        );
        assert_eq!(election.candidates.len(), 2);
    }

    #[test]
    fn candidates_cannot_be_added_after_publishing() {
        let mut election = Election::example();
        assert_eq!(
            election.add_candidate("Carol", "").unwrap_err(),
            CandidateError::Published
        );
    }

    #[test]
    fn candidate_removal_rules() {
        let now = Utc::now();
        let mut election = Election::new("Studienämnd");
        let carol = election.add_candidate("Carol", "").unwrap().id;
        let vacant = election.vacant().unwrap().id;

        assert_eq!(
            election.remove_candidate(vacant, now, false),
            Err(CandidateError::Symbolic)
        );
        assert_eq!(
            election.remove_candidate(carol, now, true),
            Err(CandidateError::HasVotes)
        );
        assert_eq!(
            election.remove_candidate(Id::new(), now, false),
            Err(CandidateError::Unknown)
        );

        election.open_time = Some(now - Duration::minutes(1));
        assert_eq!(
            election.remove_candidate(carol, now, false),
            Err(CandidateError::Opened)
        );

        election.open_time = None;
        election.finalized = true;
        assert_eq!(
            election.remove_candidate(carol, now, false),
            Err(CandidateError::Finalized)
        );

        election.finalized = false;
        let removed = election.remove_candidate(carol, now, false).unwrap();
        assert_eq!(removed.name, "Carol");
        assert!(election.candidate(carol).is_none());
    }
}
