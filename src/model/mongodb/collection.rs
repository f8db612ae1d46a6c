use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    ballot::{CastMarker, Ranking, Vote, VoteHash},
    election::Election,
    voter::ValidVoter,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for ValidVoter {
    const NAME: &'static str = "valid_voters";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Ranking {
    const NAME: &'static str = "rankings";
}

// The two collections below are the ones the anonymizing shuffle reorders.
impl MongoCollection for VoteHash {
    const NAME: &'static str = "vote_hashes";
}

impl MongoCollection for CastMarker {
    const NAME: &'static str = "casted_votes";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One cast marker per voter and election. This is what actually stops
    // two concurrent casts by the same voter from both committing.
    let marker_index = IndexModel::builder()
        .keys(doc! {"voter": 1, "election_id": 1})
        .options(unique.clone())
        .build();
    Coll::<CastMarker>::from_db(db)
        .create_index(marker_index, None)
        .await?;

    // Ranks are dense and unique within a ballot.
    let ranking_index = IndexModel::builder()
        .keys(doc! {"vote_id": 1, "rank": 1})
        .options(unique)
        .build();
    Coll::<Ranking>::from_db(db)
        .create_index(ranking_index, None)
        .await?;

    let vote_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Fingerprints are deliberately not unique: a collision must not stop anyone voting.
    let hash_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<VoteHash>::from_db(db)
        .create_index(hash_index, None)
        .await?;

    Ok(())
}
