use axum::routing::get;
use axum::Router;

use crate::auth::handlers;
use crate::routes::route_both;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let router = Router::new();
    let router = route_both(
        router,
        "/login/",
        get(handlers::login_page).post(handlers::login),
    );
    let router = route_both(
        router,
        "/logout/",
        get(handlers::logout_page).post(handlers::logout),
    );
    route_both(
        router,
        "/create_account/",
        get(handlers::signup_page).post(handlers::signup),
    )
}
