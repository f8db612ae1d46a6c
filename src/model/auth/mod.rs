//! Typed claims about the caller, issued by the external identity provider.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

mod token;

pub use token::{AuthToken, AUTH_TOKEN_COOKIE};

/// What the holder of a token is allowed to do.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Rights {
    Voter,
    Admin,
}

impl Display for Rights {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voter => write!(f, "voter"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A role a route can demand, as a type parameter of [`AuthToken`].
pub trait Role: Send + Sync + 'static {
    const RIGHTS: Rights;
}

/// May cast ballots and check their own.
pub struct Voter;

/// May count elections and list their ballots.
pub struct Admin;

impl Role for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

impl Role for Admin {
    const RIGHTS: Rights = Rights::Admin;
}
