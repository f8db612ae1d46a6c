use mongodb::bson::oid::Error as OidError;
use rocket::Route;

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

mod results;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(results::routes());
    routes
}

/// Turn a failed path parameter parse into a client error.
fn parse_id(param: std::result::Result<Id, OidError>) -> Result<Id> {
    param.map_err(|_| Error::MalformedInput("Malformed ID specified".to_string()))
}
