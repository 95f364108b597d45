use askama::Template;
use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};

use crate::auth::{password, session};
use crate::db::{photos, users};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::flash::{self, Flash};
use crate::forms::account::Profile;
use crate::forms::{FormErrors, PasswordChangeForm, ProfileEditForm};
use crate::routes::photos::remove_upload;
use crate::routes::{route_both, Html, Nav};
use crate::state::AppState;

const WRONG_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";

// --- Templates ---

#[derive(Template)]
#[template(path = "account_settings.html")]
pub struct AccountSettingsTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "account_edit_personal_info.html")]
pub struct EditPersonalInfoTemplate {
    pub nav: Nav,
    pub profile: Profile,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "account_confirm_delete.html")]
pub struct ConfirmDeleteAccountTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "password_change.html")]
pub struct PasswordChangeTemplate {
    pub nav: Nav,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub nav: Nav,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    let router = route_both(Router::new(), "/account_settings/", get(settings_page));
    let router = route_both(
        router,
        "/edit_account/",
        get(edit_personal_info_page).post(edit_personal_info),
    );
    let router = route_both(
        router,
        "/delete_account/",
        get(delete_account_page).post(delete_account),
    );
    let router = route_both(
        router,
        "/password_change/",
        get(password_change_page).post(password_change),
    );
    route_both(router, "/password_change/done/", get(password_change_done))
}

// --- Handlers ---

async fn settings_page(user: CurrentUser, flash: Flash) -> Response {
    flash.consume(Html(AccountSettingsTemplate {
        nav: Nav::new(Some(&user), &flash),
    }))
}

async fn edit_personal_info_page(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let stored = users::find_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;

    Ok(flash.consume(Html(EditPersonalInfoTemplate {
        nav: Nav::new(Some(&user), &flash),
        profile: ProfileEditForm::bound(&stored),
        errors: FormErrors::new(),
    })))
}

async fn edit_personal_info(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    Form(form): Form<ProfileEditForm>,
) -> AppResult<Response> {
    let profile = match form.validate() {
        Ok(profile) => profile,
        Err((profile, errors)) => {
            return Ok(flash.consume(Html(EditPersonalInfoTemplate {
                nav: Nav::new(Some(&user), &flash),
                profile,
                errors,
            })));
        }
    };

    let conn = state.db.get()?;
    users::update_profile(
        &conn,
        user.id,
        &profile.first_name,
        &profile.last_name,
        &profile.email,
    )?;

    Ok(flash::redirect_with(
        "/",
        "Your personal data has been successfully changed!",
    ))
}

async fn delete_account_page(user: CurrentUser, flash: Flash) -> Response {
    flash.consume(Html(ConfirmDeleteAccountTemplate {
        nav: Nav::new(Some(&user), &flash),
    }))
}

async fn delete_account(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let uploads: Vec<String> = {
        let conn = state.db.get()?;
        let uploads = photos::by_owner(&conn, user.id)?
            .into_iter()
            .map(|summary| summary.photo.path)
            .collect();
        users::delete(&conn, user.id)?;
        uploads
    };
    for file_name in &uploads {
        remove_upload(&state, file_name).await;
    }
    tracing::info!(
        "Deleted account {} and {} photo(s)",
        user.username,
        uploads.len()
    );

    Ok((
        AppendHeaders([
            (
                header::SET_COOKIE,
                session::clear_session_cookie(&state.config.auth.cookie_name),
            ),
            (
                header::SET_COOKIE,
                flash::flash_cookie("Your account has been deleted"),
            ),
        ]),
        Redirect::to("/"),
    )
        .into_response())
}

async fn password_change_page(user: CurrentUser, flash: Flash) -> Response {
    flash.consume(Html(PasswordChangeTemplate {
        nav: Nav::new(Some(&user), &flash),
        errors: FormErrors::new(),
    }))
}

async fn password_change(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    Form(form): Form<PasswordChangeForm>,
) -> AppResult<Response> {
    let rerender = |errors: FormErrors| {
        flash.consume(Html(PasswordChangeTemplate {
            nav: Nav::new(Some(&user), &flash),
            errors,
        }))
    };

    let change = match form.validate(&user.username) {
        Ok(change) => change,
        Err(errors) => return Ok(rerender(errors)),
    };

    let conn = state.db.get()?;
    let stored = users::find_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;
    if !password::verify(&change.old_password, &stored.password_hash) {
        let mut errors = FormErrors::new();
        errors.add("old_password", WRONG_OLD_PASSWORD);
        return Ok(rerender(errors));
    }

    let hash = password::hash(&change.new_password, state.config.auth.bcrypt_cost)?;
    users::set_password_hash(&conn, user.id, &hash)?;
    let dropped = session::delete_other_sessions(&conn, user.id, &user.token)?;
    tracing::info!(
        "Password changed for {}, {} other session(s) signed out",
        user.username,
        dropped
    );

    Ok(Redirect::to("/password_change/done/").into_response())
}

async fn password_change_done(user: CurrentUser, flash: Flash) -> Response {
    flash.consume(Html(PasswordChangeDoneTemplate {
        nav: Nav::new(Some(&user), &flash),
    }))
}
