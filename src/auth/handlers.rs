use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, MaybeUser};
use crate::flash::{self, FlashMessage, Flashes};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub flashes: Vec<FlashMessage>,
    pub username: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub flashes: Vec<FlashMessage>,
    pub username: Option<String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn append_cookie(response: &mut Response, cookie: &str) -> AppResult<()> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

// -- Login --

/// GET /login
pub async fn login_page(user: MaybeUser, flashes: Flashes) -> Response {
    if user.0.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let page = Html(LoginTemplate {
        flashes: flashes.0.clone(),
        username: None,
    });
    flashes.consume(page)
}

/// POST /login: start a session, or re-show the form
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    if !state
        .credentials
        .authenticate(&form.username, &form.password)?
    {
        tracing::info!("Failed login for {}", form.username);
        return Ok(Html(LoginTemplate {
            flashes: vec![FlashMessage::error("Invalid username or password.")],
            username: None,
        })
        .into_response());
    }

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &form.username, hours)?;

    let mut response = flash::redirect(
        "/dashboard",
        &[FlashMessage::success("Logged in successfully!")],
    );
    append_cookie(
        &mut response,
        &session_cookie(&state.config.auth.cookie_name, &token, hours),
    )?;
    Ok(response)
}

// -- Registration --

/// GET /register
pub async fn register_page(flashes: Flashes) -> Response {
    let page = Html(RegisterTemplate {
        flashes: flashes.0.clone(),
        username: None,
    });
    flashes.consume(page)
}

/// POST /register: create the account and send the user to the login page
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    match state
        .credentials
        .register(&form.username, &form.password, &form.confirm_password)
    {
        Ok(()) => Ok(flash::redirect(
            "/login",
            &[FlashMessage::success("Registration successful! Please log in.")],
        )),
        Err(AppError::Validation(message)) => Ok(Html(RegisterTemplate {
            flashes: vec![FlashMessage::error(message)],
            username: None,
        })
        .into_response()),
        Err(e) => Err(e),
    }
}

// -- Logout --

/// GET|POST /logout: delete session and redirect
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = cookie_value(&headers, cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    let mut response = flash::redirect("/login", &[FlashMessage::info("You have been logged out.")]);
    append_cookie(&mut response, &clear_session_cookie(cookie_name))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_and_strict() {
        let cookie = session_cookie("guidepost_session", "abc", 2);
        assert_eq!(
            cookie,
            "guidepost_session=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_session_cookie("s").ends_with("Max-Age=0"));
    }
}
