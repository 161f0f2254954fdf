use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tracing::*;

use super::error::AppError;
use super::jwt_auth::{end_session, issue_token, session_cookie, CurrentUser};
use super::state::AppState;
use super::templates::Templates;

pub const FLASH_COOKIE: &str = "flash";
pub const REGISTERED_FLASH: &str = "registered";
pub const REGISTERED_MESSAGE: &str = "Registration succeeded! Please log in with your account.";

/// Flash cookies carry one of these keys, never the message text.
const FLASHES: [(&str, &str); 1] = [(REGISTERED_FLASH, REGISTERED_MESSAGE)];

fn flash_message(key: &str) -> Option<&'static str> {
    FLASHES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, message)| *message)
}

type HandlerResult<T> = Result<T, AppError>;

fn flash_cookie(key: &'static str) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, key)
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .finish()
}

fn clear_flash(jar: CookieJar) -> CookieJar {
    let mut cookie = Cookie::named(FLASH_COOKIE);
    cookie.set_path("/");
    jar.remove(cookie)
}

#[derive(Deserialize)]
pub(crate) struct HomeForm {
    logout: Option<String>,
}

async fn render_home(state: &AppState, user: &CurrentUser) -> HandlerResult<impl IntoResponse> {
    let last_logout = state.last_logout(user.id).await?;

    let mut context = Templates::context();
    context.insert("first_name", &user.first_name);
    context.insert("last_name", &user.last_name);
    context.insert("last_logout", &last_logout);

    state.templates.render("home.html", &context)
}

pub(crate) async fn home_handler(
    Extension(state): Extension<Arc<AppState>>,
    user: CurrentUser,
) -> HandlerResult<impl IntoResponse> {
    render_home(&state, &user).await
}

pub(crate) async fn home_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    user: CurrentUser,
    Form(form): Form<HomeForm>,
) -> HandlerResult<axum::response::Response> {
    if form.logout.as_deref() == Some("true") {
        info!(id = %user.id, "home:logout");

        return Ok((end_session(jar), Redirect::to("/login")).into_response());
    }

    Ok(render_home(&state, &user).await?.into_response())
}

#[derive(Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

pub(crate) async fn register_page(
    Extension(state): Extension<Arc<AppState>>,
) -> HandlerResult<impl IntoResponse> {
    state
        .templates
        .render("register.html", &Templates::context())
}

pub(crate) async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    Form(payload): Form<RegisterUser>,
) -> HandlerResult<impl IntoResponse> {
    info!("register");

    state.register_user(payload).await?;

    Ok((
        jar.add(flash_cookie(REGISTERED_FLASH)),
        Redirect::to("/login"),
    ))
}

#[derive(Deserialize)]
pub(crate) struct LoginUser {
    username: String,
    password: String,
}

pub(crate) async fn login_page(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
) -> HandlerResult<impl IntoResponse> {
    let mut context = Templates::context();
    let Some(flash) = jar.get(FLASH_COOKIE) else {
        let page = state.templates.render("login.html", &context)?;
        return Ok((jar, page));
    };

    if let Some(message) = flash_message(flash.value()) {
        context.insert("message", message);
    }

    let page = state.templates.render("login.html", &context)?;

    Ok((clear_flash(jar), page))
}

pub(crate) async fn login_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    Form(payload): Form<LoginUser>,
) -> HandlerResult<impl IntoResponse> {
    info!("login");

    let Some(user) = state.login(&payload.username, &payload.password).await? else {
        return Err(AppError::LoginFailed);
    };

    let token = issue_token(&user, &state.env.jwt_secret)?;

    Ok((jar.add(session_cookie(token)), Redirect::to("/")))
}

pub(crate) async fn logout_page(
    Extension(state): Extension<Arc<AppState>>,
) -> HandlerResult<impl IntoResponse> {
    state
        .templates
        .render("logout.html", &Templates::context())
}

pub(crate) async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    user: Option<CurrentUser>,
) -> impl IntoResponse {
    let Some(user) = user else {
        return (jar, Redirect::to("/login"));
    };

    // The session ends even when history can't be saved.
    if let Err(e) = state.record_logout(user.id, Utc::now()).await {
        warn!("logout-history: {:?}", e);
    }

    info!(id = %user.id, "logout");

    (end_session(jar), Redirect::to("/login"))
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HashMap::<String, String>::new()))
}
