use chrono::Utc;
use mongodb::bson::oid::Error as OidError;
use rocket::{
    serde::json::{self, Json},
    Route, State,
};

use crate::casting;
use crate::error::{Error, Result};
use crate::model::{
    api::ballot::{BallotSpec, CastReceipt},
    auth::{AuthToken, Voter},
    mongodb::Id,
    store::Store,
};
use crate::Config;

use super::parse_id;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, has_voted]
}

#[post("/elections/<election_id>/vote", data = "<spec>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: std::result::Result<Id, OidError>,
    spec: std::result::Result<Json<BallotSpec>, json::Error<'_>>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<CastReceipt>> {
    let election_id = parse_id(election_id)?;
    let spec = spec
        .map_err(|_| Error::MalformedInput("Malformed or missing parameters in body".to_string()))?
        .into_inner();

    let fingerprint = casting::cast_ballot(
        store,
        config,
        token.identity(),
        election_id,
        &spec.secret,
        &spec.ranking(),
        Utc::now(),
    )
    .await?;

    Ok(Json(CastReceipt { fingerprint }))
}

#[get("/elections/<election_id>/has-voted")]
async fn has_voted(
    token: AuthToken<Voter>,
    election_id: std::result::Result<Id, OidError>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<bool>> {
    let election_id = parse_id(election_id)?;
    let voted = casting::has_voted(store, config, token.identity(), election_id).await?;
    Ok(Json(voted))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, Value},
    };

    use super::*;
    use crate::api::test_util::{auth_cookie, ADMIN, VOTER};
    use crate::model::{
        auth::Admin,
        common::fingerprint::{fingerprint, BallotContent},
        db::{election::Election, voter::ValidVoter},
        store::{BallotStore, MemoryStore},
    };

    async fn seed(store: &MemoryStore) -> Election {
        let election = Election::example();
        store.insert_election(election.clone()).await;
        store.add_voters([ValidVoter::new(VOTER)]).await;
        election
    }

    async fn vote<'c>(client: &'c Client, election_id: &str, body: Value) -> LocalResponse<'c> {
        client
            .post(format!("/elections/{election_id}/vote"))
            .header(ContentType::JSON)
            .cookie(auth_cookie::<Voter>(client, VOTER))
            .body(body.to_string())
            .dispatch()
            .await
    }

    async fn has_voted(client: &Client, election_id: Id) -> bool {
        let response = client
            .get(format!("/elections/{election_id}/has-voted"))
            .cookie(auth_cookie::<Voter>(client, VOTER))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    fn ranking_json(ranking: &[Id]) -> Vec<String> {
        ranking.iter().map(Id::to_string).collect()
    }

    #[backend_test]
    async fn cast_and_check(client: Client, store: MemoryStore) {
        let election = seed(&store).await;
        assert!(!has_voted(&client, election.id).await);

        let mut ranking: Vec<Id> = election.candidate_ids().collect();
        ranking.reverse();
        let response = vote(
            &client,
            &election.id.to_string(),
            json!({"secret": "hunter2", "ranking": ranking_json(&ranking)}),
        )
        .await;
        assert_eq!(Status::Ok, response.status());
        let receipt: CastReceipt = response.into_json().await.unwrap();
        assert_eq!(
            receipt.fingerprint,
            fingerprint(VOTER, "hunter2", election.id, BallotContent::Ranked(&ranking))
        );

        assert!(has_voted(&client, election.id).await);
        let ballots = store.ballots(election.id).await.unwrap();
        assert_eq!(ballots.len(), 1);
        assert_eq!(ballots[0].ranking, ranking);

        // Once only.
        let response = vote(
            &client,
            &election.id.to_string(),
            json!({"ranking": ranking_json(&ranking)}),
        )
        .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(store.ballots(election.id).await.unwrap().len(), 1);
    }

    #[backend_test]
    async fn bad_requests(client: Client, store: MemoryStore) {
        let election = seed(&store).await;
        let ranking = ranking_json(&election.candidate_ids().collect::<Vec<_>>());

        // Malformed election ID.
        let response = vote(&client, "not-an-id", json!({"ranking": ranking})).await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            response.into_string().await.unwrap(),
            "Malformed ID specified"
        );

        // Malformed body.
        let response = vote(&client, &election.id.to_string(), json!({"ranks": ranking})).await;
        assert_eq!(Status::BadRequest, response.status());

        // Unknown election reads the same as an unpublished one.
        let response = vote(&client, &Id::new().to_string(), json!({"ranking": ranking})).await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            response.into_string().await.unwrap(),
            "Invalid election specified"
        );

        // Missing candidate.
        let response = vote(
            &client,
            &election.id.to_string(),
            json!({"ranking": ranking[1..]}),
        )
        .await;
        assert_eq!(Status::BadRequest, response.status());

        assert!(!has_voted(&client, election.id).await);
    }

    #[backend_test]
    async fn unregistered_voter_is_forbidden(client: Client, store: MemoryStore) {
        let election = Election::example();
        store.insert_election(election.clone()).await;
        let ranking = ranking_json(&election.candidate_ids().collect::<Vec<_>>());

        let response = vote(&client, &election.id.to_string(), json!({"ranking": ranking})).await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test]
    async fn requires_voter_token(client: Client, store: MemoryStore) {
        let election = seed(&store).await;
        let uri = format!("/elections/{}/has-voted", election.id);

        let response = client.get(uri.clone()).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client
            .get(uri)
            .cookie(auth_cookie::<Admin>(&client, ADMIN))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
