#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod casting;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod tally;

pub use config::Config;

/// Assemble the server: configuration, ballot store, logging and routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// A server over the given in-memory store, with fixed test secrets.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: model::store::MemoryStore) -> Rocket<Build> {
    use std::sync::Arc;

    use model::store::Store;

    let figment = rocket::Config::figment()
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("hmac_secret", "test-hmac-secret"));
    let store: Store = Arc::new(store);
    rocket::custom(figment)
        .attach(ConfigFairing)
        .manage(store)
        .mount("/", api::routes())
}
