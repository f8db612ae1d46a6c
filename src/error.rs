use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{status::Custom, Responder},
    Request,
};
use thiserror::Error;

use crate::casting::AdmissibilityError;
use crate::tally::TallyPrecondition;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A storage failure. Nothing of the failed operation persists, so it may be retried.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("{0}")]
    MalformedInput(String),
    #[error(transparent)]
    Admissibility(#[from] AdmissibilityError),
    #[error(transparent)]
    TallyPrecondition(#[from] TallyPrecondition),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl Error {
    fn status(&self) -> Status {
        match self {
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::MalformedInput(_) => Status::BadRequest,
            Self::Admissibility(AdmissibilityError::NotEligible) => Status::Forbidden,
            Self::Admissibility(_) => Status::BadRequest,
            Self::TallyPrecondition(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class().is_server_error() {
            // Never leak storage details to the client.
            error!("{self}");
            return Err(status);
        }
        debug!("Refused request: {self}");
        Custom(status, self.to_string()).respond_to(request)
    }
}
