use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use uuid::Uuid;

use super::{audited, origin, parse_body, submitted};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::{
    new_id,
    post::{NewPost, Post},
    site::{NewSite, Site},
};
use crate::service::audit::actions;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/sites",
    responses(
        (status = 200, description = "Active sites", body = [Site]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn list_sites(_auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let sites = state.store.active_sites().await?;
    Ok(HttpResponse::Ok().json(sites))
}

#[utoipa::path(
    post,
    path = "/api/sites",
    request_body = NewSite,
    responses(
        (status = 201, description = "Site created", body = Site),
        (status = 400, description = "Invalid site fields", body = Object, example = json!({
            "error": "geofenceRadius must be positive"
        })),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn create_site(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let details = submitted(&body);
    let now = state.clock.now();

    let site = audited(
        &state,
        &origin(&req, Some(auth.user_id)),
        actions::CREATE_SITE,
        "Site",
        details,
        |s: &Site| s.id,
        async {
            auth.require_hr_or_admin()?;
            let input: NewSite = parse_body(&body)?;
            input.validate()?;
            state.store.insert_site(input.into_site(new_id(), now)).await
        },
    )
    .await?;

    tracing::info!(site_id = %site.id, "Site created");
    Ok(HttpResponse::Created().json(site))
}

#[utoipa::path(
    get,
    path = "/api/sites/{site_id}/posts",
    params(("site_id", Path, description = "Site ID")),
    responses(
        (status = 200, description = "Active posts of the site", body = [Post]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn list_posts(
    _auth: AuthUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let posts = state.store.active_posts_by_site(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(posts))
}

#[utoipa::path(
    post,
    path = "/api/posts",
    request_body = NewPost,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid post fields or unknown site"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn create_post(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let details = submitted(&body);
    let now = state.clock.now();

    let post = audited(
        &state,
        &origin(&req, Some(auth.user_id)),
        actions::CREATE_POST,
        "Post",
        details,
        |p: &Post| p.id,
        async {
            auth.require_hr_or_admin()?;
            let input: NewPost = parse_body(&body)?;
            input.validate()?;
            state
                .store
                .site_by_id(input.site_id)
                .await?
                .ok_or_else(|| AppError::not_found("Site", input.site_id))
                .map_err(AppError::into_reference_error)?;
            state.store.insert_post(input.into_post(new_id(), now)).await
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(post))
}
