use anyhow::Result;
use axum::{
    async_trait,
    extract::{Extension, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::*;

use sqlite::{PersistedUser, UserId};

use super::state::AppState;

pub const TOKEN_COOKIE: &str = "token";
pub const TOKEN_HOURS: i64 = 72;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub first_name: String,
    pub last_name: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn issue_token(user: &PersistedUser, jwt_secret: &str) -> Result<String> {
    let now = chrono::Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + chrono::Duration::hours(TOKEN_HOURS)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user.id.to_string(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        iat,
        exp,
    };

    Ok(jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?)
}

pub fn decode_token(token: &str, jwt_secret: &str) -> Result<TokenClaims> {
    let data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;

    Ok(data.claims)
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token)
        .path("/")
        .max_age(::time::Duration::hours(TOKEN_HOURS))
        .same_site(SameSite::Lax)
        .http_only(true)
        .finish()
}

pub fn end_session(jar: CookieJar) -> CookieJar {
    let mut cookie = Cookie::named(TOKEN_COOKIE);
    cookie.set_path("/");
    jar.remove(cookie)
}

/// The signed in user, taken from the session cookie. Handlers asking for
/// one send anonymous visitors to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl TryFrom<TokenClaims> for CurrentUser {
    type Error = anyhow::Error;

    fn try_from(value: TokenClaims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.sub.parse()?,
            first_name: value.first_name,
            last_name: value.last_name,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state) = Extension::<Arc<AppState>>::from_request_parts(parts, state)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(TOKEN_COOKIE) else {
            trace!("session:none");
            return Err(Redirect::to("/login").into_response());
        };

        decode_token(token.value(), &app_state.env.jwt_secret)
            .and_then(CurrentUser::try_from)
            .map_err(|e| {
                info!("session:invalid {:?}", e);
                Redirect::to("/login").into_response()
            })
    }
}
