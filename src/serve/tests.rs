use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use sqlite::MEMORY_SPECIAL;

use super::{
    handlers::{REGISTERED_FLASH, REGISTERED_MESSAGE},
    route::create_router,
    state::AppState,
};
use crate::{config::Config, make_storage};

fn app() -> Result<(Router, Arc<AppState>)> {
    let storage = make_storage(MEMORY_SPECIAL)?;
    let state = Arc::new(AppState::new(storage, Config::for_tests())?);

    Ok((create_router(state.clone()), state))
}

fn get(uri: &str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    Ok(builder.body(Body::empty())?)
}

fn post(uri: &str, body: &str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    Ok(builder.body(Body::from(body.to_owned()))?)
}

fn location<B>(response: &Response<B>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// The `name=value` pair of a cookie set by the response.
fn set_cookie<B>(response: &Response<B>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .and_then(|v| v.split(';').next())
        .map(|v| v.to_owned())
}

async fn body_text(response: Response<axum::body::BoxBody>) -> Result<String> {
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

const JACOB: &str = "username=jlewallen&first_name=Jacob&last_name=Lewallen&password=hunter2";

async fn register_and_login(app: &Router) -> Result<String> {
    let response = app.clone().oneshot(post("/register", JACOB, None)?).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .clone()
        .oneshot(post("/login", "username=jlewallen&password=hunter2", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));

    Ok(set_cookie(&response, "token").expect("No session cookie"))
}

#[tokio::test]
async fn it_redirects_anonymous_home_to_login() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(get("/", None)?).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    Ok(())
}

#[tokio::test]
async fn it_redirects_invalid_sessions_to_login() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(get("/", Some("token=garbage"))?).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    Ok(())
}

#[tokio::test]
async fn it_registers_and_flashes_a_message_on_login() -> Result<()> {
    let (app, _) = app()?;

    let response = app.clone().oneshot(post("/register", JACOB, None)?).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let flash = set_cookie(&response, "flash").expect("No flash cookie");
    assert_eq!(flash, format!("flash={}", REGISTERED_FLASH));

    let response = app.oneshot(get("/login", Some(&flash))?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookie(&response, "flash"), Some("flash=".to_owned()));
    assert!(body_text(response).await?.contains(REGISTERED_MESSAGE));

    Ok(())
}

#[tokio::test]
async fn it_leaves_cookies_alone_on_a_plain_login_page() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(get("/login", None)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    Ok(())
}

#[tokio::test]
async fn it_ignores_unknown_flash_keys() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(get("/login", Some("flash=unheard-of"))?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookie(&response, "flash"), Some("flash=".to_owned()));

    let body = body_text(response).await?;
    assert!(!body.contains("unheard-of"));
    assert!(!body.contains(REGISTERED_MESSAGE));

    Ok(())
}

#[tokio::test]
async fn it_refuses_duplicate_registrations() -> Result<()> {
    let (app, _) = app()?;

    app.clone().oneshot(post("/register", JACOB, None)?).await?;
    let response = app.oneshot(post("/register", JACOB, None)?).await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn it_renders_home_with_every_bound_element() -> Result<()> {
    let (app, _) = app()?;

    let session = register_and_login(&app).await?;
    let response = app.oneshot(get("/", Some(&session))?).await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await?;
    assert!(body.contains("Jacob"));
    assert!(body.contains("Lewallen"));
    for id in [
        binder::ids::REGISTER_BUTTON,
        binder::ids::LOGOUT_BUTTON,
        binder::ids::CONFIRM_LOGOUT_BUTTON,
        binder::ids::CANCEL_LOGOUT_BUTTON,
        binder::ids::LOGOUT_POPUP,
    ] {
        assert!(body.contains(&format!("id=\"{}\"", id)), "missing {}", id);
    }

    Ok(())
}

#[tokio::test]
async fn it_rejects_bad_passwords() -> Result<()> {
    let (app, _) = app()?;

    app.clone().oneshot(post("/register", JACOB, None)?).await?;

    let response = app
        .clone()
        .oneshot(post("/login", "username=jlewallen&password=wrong", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await?, "Login failed. Try again.");

    let response = app
        .oneshot(post("/login", "username=nobody&password=hunter2", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn it_renders_logout_confirmation() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(get("/logout", None)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains("action=\"/logout\""));

    Ok(())
}

#[tokio::test]
async fn it_redirects_anonymous_logout_to_login() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(post("/logout", "", None)?).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert!(set_cookie(&response, "token").is_none());

    Ok(())
}

#[tokio::test]
async fn it_ends_the_session_and_records_history_on_logout() -> Result<()> {
    let (app, state) = app()?;

    let session = register_and_login(&app).await?;
    let response = app.oneshot(post("/logout", "", Some(&session))?).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(set_cookie(&response, "token"), Some("token=".to_owned()));

    let user = state.login("jlewallen", "hunter2").await?.expect("No user");
    assert!(state.last_logout(user.id).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn it_shows_the_last_logout_on_home() -> Result<()> {
    let (app, _) = app()?;

    let session = register_and_login(&app).await?;
    let body = body_text(app.clone().oneshot(get("/", Some(&session))?).await?).await?;
    assert!(!body.contains("Last logout:"));

    app.clone()
        .oneshot(post("/logout", "", Some(&session))?)
        .await?;

    let response = app
        .clone()
        .oneshot(post("/login", "username=jlewallen&password=hunter2", None)?)
        .await?;
    let session = set_cookie(&response, "token").expect("No session cookie");

    let response = app.oneshot(get("/", Some(&session))?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await?;
    let expected = format!("Last logout: {}", chrono::Utc::now().format("%Y-%m-%d"));
    assert!(body.contains(&expected), "{}", body);
    assert!(body.contains(" UTC</p>"));

    Ok(())
}

#[tokio::test]
async fn it_logs_out_from_the_home_form() -> Result<()> {
    let (app, state) = app()?;

    let session = register_and_login(&app).await?;
    let response = app
        .oneshot(post("/", "logout=true", Some(&session))?)
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(set_cookie(&response, "token"), Some("token=".to_owned()));

    let user = state.login("jlewallen", "hunter2").await?.expect("No user");
    assert!(state.last_logout(user.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn it_reports_health() -> Result<()> {
    let (app, _) = app()?;

    let response = app.oneshot(get("/health", None)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await?, "{}");

    Ok(())
}
