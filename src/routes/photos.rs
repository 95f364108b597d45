use askama::Template;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;

use crate::db::models::{parse_timestamp, CommentWithAuthor, Photo, PhotoSummary};
use crate::db::{comments, photos};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser, PhotoId};
use crate::flash::{self, Flash};
use crate::forms::{
    AddPhotoForm, CommentCreationForm, EditPhotoForm, FormErrors, UploadedFile,
};
use crate::routes::{route_both, Html, Nav};
use crate::state::AppState;

// --- View types ---

#[derive(Debug, Clone)]
pub struct PhotoCard {
    pub id: i64,
    pub image_url: String,
    pub description: String,
    pub owner_username: String,
    pub created_at: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked: bool,
}

impl From<PhotoSummary> for PhotoCard {
    fn from(summary: PhotoSummary) -> Self {
        Self {
            id: summary.photo.id,
            image_url: media_url(&summary.photo.path),
            created_at: display_time(&summary.photo.created_at),
            description: summary.photo.description,
            owner_username: summary.owner_username,
            like_count: summary.like_count,
            comment_count: summary.comment_count,
            liked: summary.liked_by_viewer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub author_username: String,
    pub created_at: String,
    pub content: String,
}

impl From<CommentWithAuthor> for CommentView {
    fn from(c: CommentWithAuthor) -> Self {
        Self {
            author_username: c.author_username,
            created_at: display_time(&c.comment.created_at),
            content: c.comment.content,
        }
    }
}

/// Position of the requested page within the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub number: i64,
    pub num_pages: i64,
    pub previous: Option<i64>,
    pub next: Option<i64>,
}

impl PageInfo {
    /// Resolve `?page=` against the feed size. An empty feed still has page 1;
    /// anything else outside `1..=num_pages` is `None`.
    pub fn resolve(raw: Option<&str>, total: i64, per_page: i64) -> Option<Self> {
        let num_pages = ((total + per_page - 1) / per_page).max(1);
        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(n) => n.parse::<i64>().ok()?,
        };
        if !(1..=num_pages).contains(&number) {
            return None;
        }
        Some(Self {
            number,
            num_pages,
            previous: (number > 1).then(|| number - 1),
            next: (number < num_pages).then(|| number + 1),
        })
    }

    pub fn offset(&self, per_page: i64) -> i64 {
        (self.number - 1) * per_page
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "view_photos.html")]
pub struct FeedTemplate {
    pub nav: Nav,
    pub photos: Vec<PhotoCard>,
    pub signed_in: bool,
    pub page: PageInfo,
}

#[derive(Template)]
#[template(path = "my_photos.html")]
pub struct MyPhotosTemplate {
    pub nav: Nav,
    pub photos: Vec<PhotoCard>,
}

#[derive(Template)]
#[template(path = "add_photo.html")]
pub struct AddPhotoTemplate {
    pub nav: Nav,
    pub description: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "edit_photo.html")]
pub struct EditPhotoTemplate {
    pub nav: Nav,
    pub photo_id: i64,
    pub image_url: String,
    pub description: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "delete_photo.html")]
pub struct DeletePhotoTemplate {
    pub nav: Nav,
    pub photo_id: i64,
    pub image_url: String,
    pub description: String,
}

#[derive(Template)]
#[template(path = "view_one_photo.html")]
pub struct OnePhotoTemplate {
    pub nav: Nav,
    pub photo: PhotoCard,
    pub comments: Vec<CommentView>,
    pub content: String,
    pub errors: FormErrors,
    pub is_owner: bool,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    let router = Router::new().route("/", get(feed));
    let router = route_both(router, "/photo/add", get(add_photo_page).post(add_photo));
    let router = route_both(
        router,
        "/photo/edit/{id}/",
        get(edit_photo_page).post(edit_photo),
    );
    let router = route_both(
        router,
        "/photo/delete/{id}/",
        get(delete_photo_page).post(delete_photo),
    );
    let router = route_both(router, "/photo/like/{id}", get(like_photo));
    let router = route_both(router, "/photo/unlike/{id}", get(unlike_photo));
    let router = route_both(router, "/photos/my_photos", get(my_photos));
    route_both(router, "/photo/{id}/", get(one_photo).post(comment_photo))
}

// --- Feed ---

async fn feed(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: Flash,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let per_page = state.config.feed.page_size as i64;
    let conn = state.db.get()?;
    let total = photos::count(&conn)?;
    let page = PageInfo::resolve(query.page.as_deref(), total, per_page).ok_or(AppError::NotFound)?;

    let viewer = user.as_ref().map(|u| u.id);
    let cards = photos::feed_page(&conn, viewer, per_page, page.offset(per_page))?
        .into_iter()
        .map(PhotoCard::from)
        .collect();

    Ok(flash.consume(Html(FeedTemplate {
        nav: Nav::new(user.as_ref(), &flash),
        photos: cards,
        signed_in: user.is_some(),
        page,
    })))
}

async fn my_photos(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let cards = photos::by_owner(&conn, user.id)?
        .into_iter()
        .map(PhotoCard::from)
        .collect();

    Ok(flash.consume(Html(MyPhotosTemplate {
        nav: Nav::new(Some(&user), &flash),
        photos: cards,
    })))
}

// --- Upload ---

async fn add_photo_page(user: CurrentUser, flash: Flash) -> Response {
    flash.consume(Html(AddPhotoTemplate {
        nav: Nav::new(Some(&user), &flash),
        description: String::new(),
        errors: FormErrors::new(),
    }))
}

async fn add_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = read_upload(multipart).await?;
    let entered = form.description.clone().unwrap_or_default();

    let new_photo = match form.validate() {
        Ok(new_photo) => new_photo,
        Err(errors) => {
            return Ok(flash.consume(Html(AddPhotoTemplate {
                nav: Nav::new(Some(&user), &flash),
                description: entered,
                errors,
            })));
        }
    };

    let file_name = format!(
        "{}.{}",
        uuid::Uuid::now_v7().simple(),
        new_photo.image.extension()
    );
    let target = state.config.uploads_path().join(&file_name);
    tokio::fs::write(&target, &new_photo.image.bytes).await?;

    let created = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| {
            photos::create(&conn, user.id, &file_name, &new_photo.description)
                .map_err(AppError::from)
        });
    let id = match created {
        Ok(id) => id,
        Err(e) => {
            remove_upload(&state, &file_name).await;
            return Err(e);
        }
    };

    tracing::info!("User {} uploaded photo {} ({})", user.username, id, file_name);
    Ok(flash::redirect_with(
        &format!("/photo/{id}/"),
        "Photo successfully uploaded",
    ))
}

/// Collect the `path` file part and the `description` text part.
async fn read_upload(mut multipart: Multipart) -> AppResult<AddPhotoForm> {
    let mut form = AddPhotoForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "path" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                form.path = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "description" => form.description = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

// --- Edit / delete ---

async fn edit_photo_page(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    PhotoId(id): PhotoId,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let photo = owned_photo(&conn, id, &user)?;

    Ok(flash.consume(Html(EditPhotoTemplate {
        nav: Nav::new(Some(&user), &flash),
        photo_id: photo.id,
        image_url: media_url(&photo.path),
        description: photo.description,
        errors: FormErrors::new(),
    })))
}

async fn edit_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    PhotoId(id): PhotoId,
    Form(form): Form<EditPhotoForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let photo = owned_photo(&conn, id, &user)?;
    let entered = form.description.clone().unwrap_or_default();

    let description = match form.validate() {
        Ok(description) => description,
        Err(errors) => {
            return Ok(flash.consume(Html(EditPhotoTemplate {
                nav: Nav::new(Some(&user), &flash),
                photo_id: photo.id,
                image_url: media_url(&photo.path),
                description: entered,
                errors,
            })));
        }
    };

    photos::update_description(&conn, photo.id, &description)?;
    Ok(flash::redirect_with(
        &format!("/photo/{}/", photo.id),
        "Description changed",
    ))
}

async fn delete_photo_page(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    PhotoId(id): PhotoId,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let photo = owned_photo(&conn, id, &user)?;

    Ok(flash.consume(Html(DeletePhotoTemplate {
        nav: Nav::new(Some(&user), &flash),
        photo_id: photo.id,
        image_url: media_url(&photo.path),
        description: photo.description,
    })))
}

async fn delete_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    PhotoId(id): PhotoId,
) -> AppResult<Response> {
    let photo = {
        let conn = state.db.get()?;
        let photo = owned_photo(&conn, id, &user)?;
        photos::delete(&conn, photo.id)?;
        photo
    };
    remove_upload(&state, &photo.path).await;

    tracing::info!("User {} deleted photo {}", user.username, photo.id);
    Ok(Redirect::to("/photos/my_photos").into_response())
}

/// Load a photo the current user owns: 404 when missing, 403 when foreign.
fn owned_photo(conn: &rusqlite::Connection, id: i64, user: &CurrentUser) -> AppResult<Photo> {
    let photo = photos::find(conn, id)?.ok_or(AppError::NotFound)?;
    if photo.owner_id != user.id {
        return Err(AppError::Forbidden);
    }
    Ok(photo)
}

/// Best-effort removal of a stored image; a failure is only logged.
pub(crate) async fn remove_upload(state: &AppState, file_name: &str) {
    let path = state.config.uploads_path().join(file_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Could not remove {}: {}", path.display(), e);
    }
}

// --- Likes ---

async fn like_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    PhotoId(id): PhotoId,
    headers: HeaderMap,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    photos::find(&conn, id)?.ok_or(AppError::NotFound)?;
    photos::like(&conn, id, user.id)?;
    Ok(back_to_referer(&headers).into_response())
}

async fn unlike_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    PhotoId(id): PhotoId,
    headers: HeaderMap,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    photos::find(&conn, id)?.ok_or(AppError::NotFound)?;
    photos::unlike(&conn, id, user.id)?;
    Ok(back_to_referer(&headers).into_response())
}

/// Redirect to the page the request came from when it is on this host,
/// otherwise to the feed.
fn back_to_referer(headers: &HeaderMap) -> Redirect {
    Redirect::to(&local_referer(headers).unwrap_or_else(|| "/".to_string()))
}

fn local_referer(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let url = url::Url::parse(referer).ok()?;

    let authority = match url.port() {
        Some(port) => format!("{}:{}", url.host_str()?, port),
        None => url.host_str()?.to_string(),
    };
    if !authority.eq_ignore_ascii_case(host) {
        return None;
    }

    Some(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

// --- Detail + comments ---

async fn one_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    PhotoId(id): PhotoId,
) -> AppResult<Response> {
    let page = detail_page(&state, &user, &flash, id, String::new(), FormErrors::new())?;
    Ok(flash.consume(Html(page)))
}

async fn comment_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
    PhotoId(id): PhotoId,
    Form(form): Form<CommentCreationForm>,
) -> AppResult<Response> {
    let entered = form.content.clone().unwrap_or_default();
    let content = match form.validate() {
        Ok(content) => content,
        Err(errors) => {
            let page = detail_page(&state, &user, &flash, id, entered, errors)?;
            return Ok(flash.consume(Html(page)));
        }
    };

    let conn = state.db.get()?;
    photos::find(&conn, id)?.ok_or(AppError::NotFound)?;
    comments::create(&conn, id, user.id, &content)?;

    Ok(flash::redirect_with(
        &format!("/photo/{id}/"),
        "Your comment has been saved!",
    ))
}

fn detail_page(
    state: &AppState,
    user: &CurrentUser,
    flash: &Flash,
    id: i64,
    content: String,
    errors: FormErrors,
) -> AppResult<OnePhotoTemplate> {
    let conn = state.db.get()?;
    let summary = photos::find_summary(&conn, id, Some(user.id))?.ok_or(AppError::NotFound)?;
    let is_owner = summary.photo.owner_id == user.id;
    let comments = comments::for_photo(&conn, id)?
        .into_iter()
        .map(CommentView::from)
        .collect();

    Ok(OnePhotoTemplate {
        nav: Nav::new(Some(user), flash),
        photo: PhotoCard::from(summary),
        comments,
        content,
        errors,
        is_owner,
    })
}

// --- Helpers ---

pub fn media_url(file_name: &str) -> String {
    format!("/media/{file_name}")
}

fn display_time(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|| raw.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::NaiveDate;

    #[test]
    fn format_relative_time_just_now() {
        let now = Utc::now().naive_utc();
        assert_eq!(format_relative_time(&now), "just now");
    }

    #[test]
    fn format_relative_time_hours() {
        let dt = Utc::now().naive_utc() - chrono::Duration::hours(3);
        assert_eq!(format_relative_time(&dt), "3h ago");
    }

    #[test]
    fn format_relative_time_old_date() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_relative_time(&dt), "Jan 15, 2025");
    }

    #[test]
    fn display_time_keeps_unparseable_input() {
        assert_eq!(display_time("2025-01-15 12:00:00.000"), "Jan 15, 2025");
        assert_eq!(display_time("not-a-date"), "not-a-date");
    }

    #[test]
    fn empty_feed_has_one_page() {
        let page = PageInfo::resolve(None, 0, 21).unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.previous, None);
        assert_eq!(page.next, None);
        assert!(PageInfo::resolve(Some("2"), 0, 21).is_none());
    }

    #[test]
    fn page_numbers_and_last() {
        // 43 photos at 21 per page: 21, 21, 1
        let last = PageInfo::resolve(Some("last"), 43, 21).unwrap();
        assert_eq!(last.number, 3);
        assert_eq!(last.previous, Some(2));
        assert_eq!(last.next, None);
        assert_eq!(last.offset(21), 42);

        let middle = PageInfo::resolve(Some("2"), 43, 21).unwrap();
        assert_eq!(middle.previous, Some(1));
        assert_eq!(middle.next, Some(3));
    }

    #[test]
    fn out_of_range_or_garbage_pages_are_rejected() {
        assert!(PageInfo::resolve(Some("0"), 43, 21).is_none());
        assert!(PageInfo::resolve(Some("4"), 43, 21).is_none());
        assert!(PageInfo::resolve(Some("-1"), 43, 21).is_none());
        assert!(PageInfo::resolve(Some("two"), 43, 21).is_none());
    }

    fn headers(referer: &str, host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_str(referer).unwrap());
        headers.insert(header::HOST, HeaderValue::from_str(host).unwrap());
        headers
    }

    #[test]
    fn referer_on_same_host_is_followed() {
        let h = headers("http://localhost:8000/?page=2", "localhost:8000");
        assert_eq!(local_referer(&h).as_deref(), Some("/?page=2"));

        let h = headers("https://photos.example.com/photo/3/", "photos.example.com");
        assert_eq!(local_referer(&h).as_deref(), Some("/photo/3/"));
    }

    #[test]
    fn foreign_or_missing_referer_falls_back() {
        let h = headers("https://evil.example.net/", "localhost:8000");
        assert_eq!(local_referer(&h), None);
        assert_eq!(local_referer(&HeaderMap::new()), None);
    }
}
