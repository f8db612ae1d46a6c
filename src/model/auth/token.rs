use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{self, FromRequest},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Config;

use super::{Rights, Role};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Proof that the caller holds the rights of role `R`.
///
/// Route handlers get the caller's identity from here and pass it on
/// explicitly; nothing else looks at the cookie.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R> {
    #[serde(rename = "sub")]
    identity: String,
    #[serde(rename = "rgt")]
    rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// The voter identity this token was issued for.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }
}

impl<R: Role> AuthToken<R> {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            rights: R::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Sign this token into a cookie that is valid for `ttl`.
    pub fn into_cookie(self, config: &Config, ttl: Duration) -> Result<Cookie<'static>, JwtError> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + ttl,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build((AUTH_TOKEN_COOKIE, token))
            .same_site(SameSite::Strict)
            .build())
    }

    /// Verify and decode a token.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<R>>| claims.claims.token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, R: Role> FromRequest<'r> for AuthToken<R> {
    type Error = Error;

    /// Read the token from its cookie and check it carries the rights of `R`.
    /// A valid token for a different role forwards, so that another route may
    /// pick the request up.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                let err = Error::Unauthorized("Token verification is not configured".into());
                return request::Outcome::Error((Status::InternalServerError, err));
            }
        };

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => return request::Outcome::Forward(Status::Unauthorized),
        };
        let token = try_outcome!(Self::from_cookie(cookie, config)
            .map_err(Error::from)
            .or_error(Status::Unauthorized));

        if token.rights == R::RIGHTS {
            request::Outcome::Success(token)
        } else {
            request::Outcome::Forward(Status::Unauthorized)
        }
    }
}
