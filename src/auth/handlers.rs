use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, safe_next, session};
use crate::db::users;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::flash::{self, Flash};
use crate::forms::{FormErrors, LoginForm, SignupForm};
use crate::routes::{Html, Nav};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "Incorrect login or password";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

// -- Templates --

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub next: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "logout.html")]
pub struct LogoutTemplate {
    pub nav: Nav,
    pub verdict: Option<String>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

// -- Request types --

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginSubmission {
    pub next: Option<String>,
    #[serde(flatten)]
    pub form: LoginForm,
}

// -- Login handlers --

/// GET /login/: render login page
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    flash: Flash,
    Query(query): Query<NextQuery>,
) -> Response {
    let page = LoginTemplate {
        nav: Nav::new(user.as_ref(), &flash),
        username: String::new(),
        next: safe_next(query.next.as_deref()).map(str::to_string),
        errors: FormErrors::new(),
    };
    flash.consume(Html(page))
}

/// POST /login/: check credentials, start a session
pub async fn login(
    State(state): State<AppState>,
    flash: Flash,
    Form(submission): Form<LoginSubmission>,
) -> AppResult<Response> {
    let next = safe_next(submission.next.as_deref()).map(str::to_string);
    let entered_username = submission
        .form
        .username
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let rerender = |errors: FormErrors| {
        flash.consume(Html(LoginTemplate {
            nav: Nav::anonymous(&flash),
            username: entered_username.clone(),
            next: next.clone(),
            errors,
        }))
    };

    let credentials = match submission.form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(rerender(errors)),
    };

    let conn = state.db.get()?;
    let user = users::find_by_username(&conn, &credentials.username)?;
    let authenticated = match &user {
        Some(user) => password::verify(&credentials.password, &user.password_hash),
        None => {
            password::verify_dummy(&credentials.password, state.config.auth.bcrypt_cost);
            false
        }
    };

    let Some(user) = user.filter(|_| authenticated) else {
        tracing::info!("Failed login for {:?}", credentials.username);
        let mut errors = FormErrors::new();
        errors.add_non_field(BAD_CREDENTIALS);
        return Ok(rerender(errors));
    };

    let token = session::create_session(&conn, user.id, state.config.auth.session_hours)?;
    tracing::info!("User {} logged in", user.username);

    let target = next.unwrap_or_else(|| "/".to_string());
    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session::session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )]),
        Redirect::to(&target),
    )
        .into_response())
}

// -- Logout handlers --

/// GET /logout/: ask for confirmation
pub async fn logout_page(MaybeUser(user): MaybeUser, flash: Flash) -> Response {
    flash.consume(Html(LogoutTemplate {
        nav: Nav::new(user.as_ref(), &flash),
        verdict: None,
    }))
}

/// POST /logout/: delete session; repeating it is harmless
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;

    let mut still_signed_in = false;
    if let Some(token) = session::get_cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
        still_signed_in = session::lookup(&conn, token)?.is_some();
    }

    let verdict = if still_signed_in {
        "Ups. Something went wrong."
    } else {
        "You have been logged out"
    };

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::clear_session_cookie(cookie_name))]),
        Html(LogoutTemplate {
            nav: Nav::default(),
            verdict: Some(verdict.to_string()),
        }),
    )
        .into_response())
}

// -- Signup handlers --

/// GET /create_account/
pub async fn signup_page(MaybeUser(user): MaybeUser, flash: Flash) -> Response {
    flash.consume(Html(SignupTemplate {
        nav: Nav::new(user.as_ref(), &flash),
        username: String::new(),
        email: String::new(),
        errors: FormErrors::new(),
    }))
}

/// POST /create_account/: create the user, then send them to log in
pub async fn signup(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: Flash,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let username = form.username.as_deref().map(str::trim).unwrap_or_default().to_string();
    let email = form.email.as_deref().map(str::trim).unwrap_or_default().to_string();
    let rerender = |errors: FormErrors| {
        flash.consume(Html(SignupTemplate {
            nav: Nav::new(user.as_ref(), &flash),
            username: username.clone(),
            email: email.clone(),
            errors,
        }))
    };

    let account = match form.validate() {
        Ok(account) => account,
        Err(errors) => return Ok(rerender(errors)),
    };

    let conn = state.db.get()?;
    if users::find_by_username(&conn, &account.username)?.is_some() {
        let mut errors = FormErrors::new();
        errors.add("username", USERNAME_TAKEN);
        return Ok(rerender(errors));
    }

    let hash = password::hash(&account.password, state.config.auth.bcrypt_cost)?;
    // A concurrent signup may still win the race; the unique index decides.
    if users::create(&conn, &account.username, &hash, &account.email)?.is_none() {
        let mut errors = FormErrors::new();
        errors.add("username", USERNAME_TAKEN);
        return Ok(rerender(errors));
    }

    tracing::info!("Created account {}", account.username);
    Ok(flash::redirect_with(
        "/login/",
        "Your account has been created. Welcome on board!",
    ))
}
