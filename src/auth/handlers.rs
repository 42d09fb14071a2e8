use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{
    api::{origin, parse_body, submitted},
    auth::{
        auth::bearer_token,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{
        audit_log::AuditResult,
        user::{NewUser, User},
    },
    models::{Claims, LoginReqDto, RegisterReq, TokenPair, TokenType},
    service::audit::{AuditEntry, actions},
    state::AppState,
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

/// Issues an access/refresh pair and persists the refresh `jti`.
async fn issue_tokens(state: &AppState, config: &Config, user: &User) -> AppResult<TokenPair> {
    let access_token = generate_access_token(
        user.id,
        user.username.clone(),
        user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;
    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        user.username.clone(),
        user.role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    let expires_at = Utc
        .timestamp_opt(refresh_claims.exp as i64, 0)
        .single()
        .unwrap_or_else(Utc::now);
    debug!(user_id = %user.id, jti = %refresh_claims.jti, "Storing refresh token");
    state
        .store
        .store_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let token = bearer_token(req)?;
    let claims = verify_token(token, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// User registration handler
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all)]
pub async fn register(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let now = state.clock.now();
    // never the password
    let raw = submitted(&body);
    let details = json!({ "username": raw.get("username"), "role": raw.get("role") });

    let outcome: AppResult<User> = async {
        let body: RegisterReq = parse_body(&body)?;
        let username = body.username.trim();
        if username.is_empty() || body.password.is_empty() || body.email.trim().is_empty() {
            return Err(AppError::validation(
                "Username, password and email must not be empty",
            ));
        }
        let user = NewUser {
            username: username.to_string(),
            password: hash_password(&body.password)?,
            email: body.email.trim().to_string(),
            role: body.role.unwrap_or_default(),
        };
        state.store.create_user(user, now).await
    }
    .await;

    state
        .audit
        .record_outcome(
            &origin(&req, None),
            actions::REGISTER,
            "User",
            &outcome,
            |u| u.id,
            details,
            now,
        )
        .await;

    let user = outcome?;
    info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "id": user.id,
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip_all, fields(username = %body.username))]
pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginReqDto>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");
    let now = state.clock.now();

    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::validation("Username or password required"));
    }

    let (user, outcome) = match state.store.user_by_username(body.username.trim()).await? {
        None => {
            info!("Invalid credentials: user not found");
            (None, Err(invalid_credentials()))
        }
        Some(user) if !user.is_active => {
            info!(user_id = %user.id, "Login refused: user inactive");
            (Some(user.id), Err(invalid_credentials()))
        }
        Some(user) => {
            let outcome = match verify_password(&body.password, &user.password) {
                Ok(()) => issue_tokens(&state, &config, &user).await,
                Err(e) => {
                    info!(error = %e, "Invalid credentials: password mismatch");
                    Err(invalid_credentials())
                }
            };
            (Some(user.id), outcome)
        }
    };

    let entry = AuditEntry {
        action: actions::LOGIN,
        resource: "User",
        resource_id: user,
        details: Some(json!({ "username": body.username.trim() })),
        result: AuditResult::of(&outcome),
    };
    state.audit.record(&origin(&req, user), entry, now).await;

    let tokens = outcome?;
    info!("Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid, or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());
    let claims = refresh_claims(&req, &config).ok_or_else(unauthorized)?;

    // rotation: a token only ever buys one new pair
    if !state.store.revoke_refresh_token(&claims.jti).await? {
        warn!(user_id = %claims.user_id, "Refresh with revoked or unknown token");
        return Err(unauthorized());
    }

    let user = match state.store.user_by_id(claims.user_id).await? {
        Some(user) if user.is_active => user,
        _ => return Err(unauthorized()),
    };

    let tokens = issue_tokens(&state, &config, &user).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked, or nothing to do")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    // idempotent: unknown, expired, or access tokens are simply ignored
    if let Some(claims) = refresh_claims(&req, &config) {
        state.store.revoke_refresh_token(&claims.jti).await?;
    }
    Ok(HttpResponse::NoContent().finish())
}
