use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    mongodb::ensure_indexes_exist,
    store::{MemoryStore, MongoStore, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Clone, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_shuffle_after_commit")]
    shuffle_after_commit: bool,
    // secrets
    jwt_secret: String,
    hmac_secret: String,
}

fn default_shuffle_after_commit() -> bool {
    true
}

impl Config {
    /// Should the identity-linked tables be reshuffled after each cast?
    pub fn shuffle_after_commit(&self) -> bool {
        self.shuffle_after_commit
    }

    /// Secret key used to verify claims tokens from the identity provider.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key used to HMAC voter identities in cast markers.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        if !config.shuffle_after_commit {
            warn!("Post-commit shuffling is disabled, cast markers may be linkable to ballots");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Name of the database holding every collection.
pub const DATABASE_NAME: &str = "durn";

/// Configuration for the ballot store.
#[derive(Deserialize)]
struct StoreConfig {
    // secrets
    db_uri: Option<String>,
}

/// A fairing that connects the ballot store and places it into managed state.
///
/// With a `db_uri` this is MongoDB, and any indexes the store relies on are
/// created. Without one, ballots are kept in memory.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ballot store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let db_uri = match config.db_uri {
            Some(db_uri) => db_uri,
            None => {
                warn!("No `db_uri` configured, ballots will be kept in memory only");
                let store: Store = Arc::new(MemoryStore::new());
                return Ok(rocket.manage(store));
            }
        };

        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: Store = Arc::new(MongoStore::new(client, db));
        Ok(rocket.manage(store))
    }
}
