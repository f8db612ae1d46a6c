use std::collections::HashMap;

use mongodb::{
    bson::doc,
    error::TRANSIENT_TRANSACTION_ERROR,
    options::SessionOptions,
    Client, ClientSession, Database,
};
use rand::seq::SliceRandom;
use rocket::futures::TryStreamExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::casting::AdmissibilityError;
use crate::error::{Error, Result};
use crate::model::{
    db::{
        ballot::{CastMarker, NewBallot, RankedBallot, Ranking, Slotted, Vote, VoteHash},
        election::Election,
        voter::ValidVoter,
    },
    mongodb::{is_duplicate_key_error, Coll, Id, MongoCollection},
};

use super::{BallotStore, ShuffledTable};

/// How often a transaction aborted by a write conflict is retried before giving up.
const TRANSACTION_ATTEMPTS: usize = 3;

/// A ballot store backed by a MongoDB replica set.
///
/// Transactions and snapshot reads need a replica set; a standalone server
/// will reject every commit.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    async fn try_commit(&self, ballot: &NewBallot) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // The marker goes first so a second cast by the same voter fails
        // before anything else is written.
        if let Err(err) = self
            .coll::<CastMarker>()
            .insert_one_with_session(&ballot.marker, None, &mut session)
            .await
        {
            session.abort_transaction().await?;
            return Err(if is_duplicate_key_error(&err) {
                AdmissibilityError::AlreadyVoted.into()
            } else {
                err.into()
            });
        }

        self.coll::<Vote>()
            .insert_one_with_session(&ballot.vote, None, &mut session)
            .await?;
        if !ballot.rankings.is_empty() {
            self.coll::<Ranking>()
                .insert_many_with_session(&ballot.rankings, None, &mut session)
                .await?;
        }
        self.coll::<VoteHash>()
            .insert_one_with_session(&ballot.hash, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(())
    }

    async fn reshuffle<T>(&self) -> Result<()>
    where
        T: MongoCollection + Slotted + Serialize + DeserializeOwned + Unpin + Send + Sync,
    {
        let table = self.coll::<T>();
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let mut rows: Vec<T> = read_all(&table, &mut session).await?;
        if rows.is_empty() {
            session.abort_transaction().await?;
            return Ok(());
        }
        let old_slots: Vec<i64> = rows.iter().map(Slotted::slot).collect();

        rows.shuffle(&mut rand::thread_rng());
        rows.iter_mut().for_each(Slotted::reslot);

        table
            .delete_many_with_session(doc! {"_id": {"$in": old_slots}}, None, &mut session)
            .await?;
        table
            .insert_many_with_session(&rows, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(())
    }
}

async fn read_all<T>(table: &Coll<T>, session: &mut ClientSession) -> Result<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut cursor = table.find_with_session(doc! {}, None, session).await?;
    let rows = cursor.stream(session).try_collect().await?;
    Ok(rows)
}

fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

#[rocket::async_trait]
impl BallotStore for MongoStore {
    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.coll::<Election>().find_one(id.as_doc(), None).await?)
    }

    async fn is_eligible(&self, voter: &str) -> Result<bool> {
        let voter = self
            .coll::<ValidVoter>()
            .find_one(doc! {"_id": voter}, None)
            .await?;
        Ok(voter.is_some())
    }

    async fn has_cast(&self, marker: &CastMarker) -> Result<bool> {
        let filter = doc! {
            "voter": marker.voter.as_str(),
            "election_id": marker.election_id,
        };
        let count = self
            .coll::<CastMarker>()
            .count_documents(filter, None)
            .await?;
        Ok(count > 0)
    }

    async fn commit_ballot(&self, ballot: &NewBallot) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.try_commit(ballot).await {
                Err(err) if is_transient(&err) && attempt < TRANSACTION_ATTEMPTS => {
                    debug!("Retrying ballot commit after transient error: {err}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn ballots(&self, election_id: Id) -> Result<Vec<RankedBallot>> {
        // Votes and rankings must come from the same point in time.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let mut votes = self
            .coll::<Vote>()
            .find_with_session(doc! {"election_id": election_id}, None, &mut session)
            .await?;
        let votes: Vec<Vote> = votes.stream(&mut session).try_collect().await?;
        if votes.is_empty() {
            return Ok(Vec::new());
        }

        let vote_ids: Vec<Id> = votes.iter().map(|v| v.id).collect();
        let mut rankings = self
            .coll::<Ranking>()
            .find_with_session(doc! {"vote_id": {"$in": vote_ids}}, None, &mut session)
            .await?;
        let mut by_vote: HashMap<Id, Vec<Ranking>> = HashMap::new();
        while let Some(ranking) = rankings.next(&mut session).await {
            let ranking = ranking?;
            by_vote.entry(ranking.vote_id).or_default().push(ranking);
        }

        Ok(votes
            .into_iter()
            .map(|vote| {
                let rows = by_vote.remove(&vote.id).unwrap_or_default();
                RankedBallot::assemble(vote, rows)
            })
            .collect())
    }

    async fn vote_hashes(&self, election_id: Id) -> Result<Vec<String>> {
        let hashes: Vec<VoteHash> = self
            .coll::<VoteHash>()
            .find(doc! {"election_id": election_id}, None)
            .await?
            .try_collect()
            .await?;
        Ok(hashes.into_iter().map(|h| h.hash).collect())
    }

    async fn shuffle(&self, table: ShuffledTable) -> Result<()> {
        match table {
            ShuffledTable::CastMarkers => self.reshuffle::<CastMarker>().await,
            ShuffledTable::VoteHashes => self.reshuffle::<VoteHash>().await,
        }
    }
}
