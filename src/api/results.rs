use mongodb::bson::oid::Error as OidError;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{ballot::BallotDescription, results::SchulzeResult},
    auth::{Admin, AuthToken, Voter},
    mongodb::Id,
    store::Store,
};
use crate::tally::{self, irv::Stage};

use super::parse_id;

pub fn routes() -> Vec<Route> {
    routes![count_irv, count_schulze, list_votes, list_hashes]
}

#[get("/elections/<election_id>/count")]
async fn count_irv(
    _token: AuthToken<Admin>,
    election_id: std::result::Result<Id, OidError>,
    store: &State<Store>,
) -> Result<Json<Vec<Stage>>> {
    let election_id = parse_id(election_id)?;
    Ok(Json(tally::tally_irv(store, election_id).await?))
}

#[get("/elections/<election_id>/count/schulze")]
async fn count_schulze(
    _token: AuthToken<Admin>,
    election_id: std::result::Result<Id, OidError>,
    store: &State<Store>,
) -> Result<Json<SchulzeResult>> {
    let election_id = parse_id(election_id)?;
    let outcome = tally::tally_schulze(store, election_id).await?;
    Ok(Json(outcome.into()))
}

#[get("/elections/<election_id>/votes")]
async fn list_votes(
    _token: AuthToken<Admin>,
    election_id: std::result::Result<Id, OidError>,
    store: &State<Store>,
) -> Result<Json<Vec<BallotDescription>>> {
    let election_id = parse_id(election_id)?;
    let (election, ballots) = tally::list_ballots(store, election_id).await?;
    let blank = election.blank().map(|c| c.id);
    let ballots = ballots
        .into_iter()
        .map(|ballot| BallotDescription::new(ballot, blank))
        .collect();
    Ok(Json(ballots))
}

/// Lets a voter look for their own fingerprint among everyone's.
#[get("/elections/<election_id>/hashes")]
async fn list_hashes(
    _token: AuthToken<Voter>,
    election_id: std::result::Result<Id, OidError>,
    store: &State<Store>,
) -> Result<Json<Vec<String>>> {
    let election_id = parse_id(election_id)?;
    Ok(Json(tally::list_fingerprints(store, election_id).await?))
}
