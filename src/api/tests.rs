use std::sync::Arc;

use actix_web::{
    App,
    http::{StatusCode, header},
    test::{self, TestRequest},
    web::Data,
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::auth::{jwt::generate_access_token, password::hash_password};
use crate::config::Config;
use crate::model::{
    role::Role,
    user::{NewUser, User},
};
use crate::service::{SystemClock, audit::actions};
use crate::state::AppState;
use crate::store::{MemoryStore, Store};
use crate::test_support::{Fixture, nairobi};

struct Ctx {
    store: Arc<dyn Store>,
    state: Data<AppState>,
    config: Config,
    fx: Fixture,
}

impl Ctx {
    async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let fx = Fixture::seed(store.clone(), Utc::now()).await;
        let config = Config::for_tests();
        let state = Data::new(AppState::new(store.clone(), &config, Arc::new(SystemClock)));
        Self {
            store,
            state,
            config,
            fx,
        }
    }

    async fn user(&self, username: &str, role: Role) -> User {
        self.store
            .create_user(
                NewUser {
                    username: username.into(),
                    password: hash_password("pa55word").unwrap(),
                    email: format!("{username}@example.com"),
                    role,
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    fn token(&self, user: &User) -> String {
        generate_access_token(
            user.id,
            user.username.clone(),
            user.role,
            &self.config.jwt_secret,
            self.config.access_token_ttl,
        )
        .unwrap()
    }
}

macro_rules! init_app {
    ($ctx:expr) => {{
        let config = $ctx.config.clone();
        test::init_service(
            App::new()
                .app_data(crate::json_config())
                .app_data($ctx.state.clone())
                .app_data(Data::new(config.clone()))
                .configure(|cfg| crate::routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

// Rate limiting keys on the peer address, so every request needs one.
fn get(path: &str, token: &str) -> TestRequest {
    TestRequest::get()
        .uri(path)
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
}

fn post(path: &str, token: &str, body: Value) -> TestRequest {
    TestRequest::post()
        .uri(path)
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .insert_header((header::USER_AGENT, "scanner/1.0"))
        .set_json(body)
}

fn clock_in_body(ctx: &Ctx, score: u8) -> Value {
    let at = nairobi();
    json!({
        "shiftId": ctx.fx.shift.id,
        "latitude": at.latitude,
        "longitude": at.longitude,
        "biometricScore": score,
    })
}

#[actix_web::test]
async fn clock_in_returns_201_then_duplicate_is_400() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let token = ctx.token(&ctx.fx.user);

    let clock_in = || post("/api/attendance/clock-in", &token, clock_in_body(&ctx, 92));
    let resp = test::call_service(&app, clock_in().to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "verified");
    assert_eq!(body["clockInBiometricScore"], 92);

    let resp = test::call_service(&app, clock_in().to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("already has an open attendance"));
}

#[actix_web::test]
async fn low_score_clock_in_shows_up_in_pending_exceptions() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let supervisor = ctx.user("sup", Role::Supervisor).await;

    let resp = test::call_service(
        &app,
        post("/api/attendance/clock-in", &ctx.token(&ctx.fx.user), clock_in_body(&ctx, 70))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let attendance: Value = test::read_body_json(resp).await;
    assert_eq!(attendance["status"], "exception");

    let pending: Value = test::call_and_read_body_json(
        &app,
        get("/api/exceptions/pending", &ctx.token(&supervisor)).to_request(),
    )
    .await;
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["type"], "low_biometric_score");
    assert_eq!(pending[0]["attendanceId"], attendance["id"]);
}

#[actix_web::test]
async fn out_of_range_score_is_400_with_error_body() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let mut body = clock_in_body(&ctx, 0);
    body["biometricScore"] = json!(150);

    let token = ctx.token(&ctx.fx.user);
    let resp =
        test::call_service(&app, post("/api/attendance/clock-in", &token, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "biometricScore must be an integer between 0 and 100");
}

#[actix_web::test]
async fn malformed_json_uses_the_error_shape() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);

    let req = TestRequest::post()
        .uri("/api/attendance/clock-in")
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .insert_header((
            header::AUTHORIZATION,
            format!("Bearer {}", ctx.token(&ctx.fx.user)),
        ))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(r#"{"shiftId": "not-a-uuid"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn unknown_shift_is_400() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let mut body = clock_in_body(&ctx, 92);
    body["shiftId"] = json!(uuid::Uuid::new_v4());

    let token = ctx.token(&ctx.fx.user);
    let resp =
        test::call_service(&app, post("/api/attendance/clock-in", &token, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn missing_token_is_401() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);

    let req = TestRequest::get()
        .uri("/api/guards")
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn my_guard_profile_is_404_without_profile() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let admin = ctx.user("root", Role::Admin).await;

    let resp = test::call_service(
        &app,
        get("/api/my-guard-profile", &ctx.token(&ctx.fx.user)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], json!(ctx.fx.guard.id));

    let resp =
        test::call_service(&app, get("/api/my-guard-profile", &ctx.token(&admin)).to_request())
            .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn create_site_is_validated_gated_and_audited() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let hr = ctx.user("hr", Role::Hr).await;
    let site = json!({
        "name": "Upper Hill",
        "address": "Hospital Rd",
        "latitude": -1.29,
        "longitude": 36.81,
    });

    let guard_token = ctx.token(&ctx.fx.user);
    let resp =
        test::call_service(&app, post("/api/sites", &guard_token, site.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let mut bad = site.clone();
    bad["geofenceRadius"] = json!(0);
    let hr_token = ctx.token(&hr);
    let resp = test::call_service(&app, post("/api/sites", &hr_token, bad).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, post("/api/sites", &hr_token, site).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["geofenceRadius"], 100);

    let logs = ctx.store.recent_audit_logs(10).await.unwrap();
    let results: Vec<String> = logs
        .iter()
        .filter(|l| l.action == actions::CREATE_SITE)
        .map(|l| l.result.to_string())
        .collect();
    assert_eq!(results, vec!["success", "failure", "failure"]);
    assert_eq!(logs[0].user_agent.as_deref(), Some("scanner/1.0"));
    assert!(logs[0].ip_address.as_deref().unwrap().starts_with("127.0.0.1"));
}

#[actix_web::test]
async fn dismissing_twice_is_400() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let supervisor = ctx.user("sup", Role::Supervisor).await;
    test::call_service(
        &app,
        post("/api/attendance/clock-in", &ctx.token(&ctx.fx.user), clock_in_body(&ctx, 60))
            .to_request(),
    )
    .await;
    let pending: Value = test::call_and_read_body_json(
        &app,
        get("/api/exceptions/pending", &ctx.token(&supervisor)).to_request(),
    )
    .await;
    let id = pending[0]["id"].as_str().unwrap().to_string();

    let patch = |token: String| {
        TestRequest::patch()
            .uri(&format!("/api/exceptions/{id}"))
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "status": "dismissed", "resolution": "camera glare" }))
            .to_request()
    };

    let resp = test::call_service(&app, patch(ctx.token(&ctx.fx.user))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, patch(ctx.token(&supervisor))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "dismissed");
    assert_eq!(body["reviewedBy"], json!(supervisor.id));

    let resp = test::call_service(&app, patch(ctx.token(&supervisor))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn audit_logs_are_admin_only_and_limited() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let admin = ctx.user("root", Role::Admin).await;
    for _ in 0..3 {
        test::call_service(
            &app,
            post("/api/attendance/clock-in", &ctx.token(&ctx.fx.user), clock_in_body(&ctx, 92))
                .to_request(),
        )
        .await;
    }

    let resp =
        test::call_service(&app, get("/api/audit-logs", &ctx.token(&ctx.fx.user)).to_request())
            .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let logs: Value = test::call_and_read_body_json(
        &app,
        get("/api/audit-logs?limit=2", &ctx.token(&admin)).to_request(),
    )
    .await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l["action"] == "CLOCK_IN"));
}

#[actix_web::test]
async fn on_duty_follows_clock_in_and_out() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let token = ctx.token(&ctx.fx.user);
    let path = format!("/api/guards/{}/on-duty", ctx.fx.guard.id);

    let before: Value = test::call_and_read_body_json(&app, get(&path, &token).to_request()).await;
    assert_eq!(before["onDuty"], false);

    let opened: Value = test::call_and_read_body_json(
        &app,
        post("/api/attendance/clock-in", &token, clock_in_body(&ctx, 92)).to_request(),
    )
    .await;
    let during: Value = test::call_and_read_body_json(&app, get(&path, &token).to_request()).await;
    assert_eq!(during["onDuty"], true);

    let at = nairobi();
    let resp = test::call_service(
        &app,
        post(
            "/api/attendance/clock-out",
            &token,
            json!({
                "attendanceId": opened["id"],
                "latitude": at.latitude,
                "longitude": at.longitude,
                "biometricScore": 90,
            }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let after: Value = test::call_and_read_body_json(&app, get(&path, &token).to_request()).await;
    assert_eq!(after["onDuty"], false);

    let today: Value =
        test::call_and_read_body_json(&app, get("/api/attendance/today", &token).to_request())
            .await;
    assert_eq!(today.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn register_login_and_refresh_rotation() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let anonymous = |path: &str| {
        TestRequest::post()
            .uri(path)
            .peer_addr("127.0.0.1:40000".parse().unwrap())
    };

    let resp = test::call_service(
        &app,
        anonymous("/auth/register")
            .set_json(json!({
                "username": "wanjiru",
                "password": "s3cret!",
                "email": "w@example.com",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(
        &app,
        anonymous("/auth/register")
            .set_json(json!({
                "username": "wanjiru",
                "password": "other",
                "email": "x@example.com",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        anonymous("/auth/login")
            .set_json(json!({ "username": "wanjiru", "password": "wrong" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let tokens: Value = test::call_and_read_body_json(
        &app,
        anonymous("/auth/login")
            .set_json(json!({ "username": "wanjiru", "password": "s3cret!" }))
            .to_request(),
    )
    .await;
    let refresh = tokens["refreshToken"].as_str().unwrap().to_string();

    let refresh_req = |token: &str| {
        anonymous("/auth/refresh")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_request()
    };
    let resp = test::call_service(&app, refresh_req(&refresh)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated: Value = test::read_body_json(resp).await;
    assert_ne!(rotated["refreshToken"], json!(refresh));

    // the old refresh token was revoked by the rotation
    let resp = test::call_service(&app, refresh_req(&refresh)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // access tokens cannot be used to refresh
    let access = tokens["accessToken"].as_str().unwrap();
    let resp = test::call_service(&app, refresh_req(access)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let logs = ctx.store.recent_audit_logs(10).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.action == actions::REGISTER).count(), 2);
    assert_eq!(logs.iter().filter(|l| l.action == actions::LOGIN).count(), 2);
}

async fn audit_entries(ctx: &Ctx, action: &str) -> Vec<crate::model::audit_log::AuditLog> {
    ctx.store
        .recent_audit_logs(100)
        .await
        .unwrap()
        .into_iter()
        .filter(|l| l.action == action)
        .collect()
}

#[actix_web::test]
async fn wrong_typed_clock_in_field_is_400_and_audited() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let token = ctx.token(&ctx.fx.user);
    let mut body = clock_in_body(&ctx, 0);
    body["biometricScore"] = json!("ninety");

    let resp =
        test::call_service(&app, post("/api/attendance/clock-in", &token, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(resp).await;
    assert!(error["error"].as_str().unwrap().starts_with("Invalid request body"));

    let logs = audit_entries(&ctx, actions::CLOCK_IN).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result.to_string(), "failure");
    assert_eq!(logs[0].user_id, Some(ctx.fx.user.id));
    assert_eq!(logs[0].details.as_ref().unwrap()["biometricScore"], "ninety");

    let not_json = TestRequest::post()
        .uri("/api/attendance/clock-out")
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .set_payload("attendanceId=1")
        .to_request();
    let resp = test::call_service(&app, not_json).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(audit_entries(&ctx, actions::CLOCK_OUT).await.len(), 1);
}

#[actix_web::test]
async fn unreadable_review_is_400_and_audited() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let supervisor = ctx.user("sup", Role::Supervisor).await;
    let token = ctx.token(&supervisor);
    test::call_service(
        &app,
        post("/api/attendance/clock-in", &ctx.token(&ctx.fx.user), clock_in_body(&ctx, 60))
            .to_request(),
    )
    .await;
    let pending: Value =
        test::call_and_read_body_json(&app, get("/api/exceptions/pending", &token).to_request())
            .await;
    let id = pending[0]["id"].as_str().unwrap().to_string();

    let patch = |path: String, body: Value| {
        TestRequest::patch()
            .uri(&path)
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .set_json(body)
            .to_request()
    };

    let resp = test::call_service(
        &app,
        patch(format!("/api/exceptions/{id}"), json!({ "status": "bogus" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        patch("/api/exceptions/not-an-id".into(), json!({ "status": "dismissed" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let logs = audit_entries(&ctx, actions::REVIEW_EXCEPTION).await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.result.to_string() == "failure"));
    assert_eq!(logs[1].details.as_ref().unwrap()["exceptionId"], json!(id));
    assert_eq!(logs[1].details.as_ref().unwrap()["request"]["status"], "bogus");
    assert_eq!(logs[0].details.as_ref().unwrap()["exceptionId"], "not-an-id");

    // the exception is untouched
    let pending: Value =
        test::call_and_read_body_json(&app, get("/api/exceptions/pending", &token).to_request())
            .await;
    assert_eq!(pending[0]["status"], "pending");
}

#[actix_web::test]
async fn unreadable_create_body_is_audited() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let hr = ctx.user("hr", Role::Hr).await;
    let site = json!({
        "name": "Upper Hill",
        "address": "Hospital Rd",
        "latitude": "north",
        "longitude": 36.81,
    });

    let hr_token = ctx.token(&hr);
    let resp = test::call_service(&app, post("/api/sites", &hr_token, site).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let logs = audit_entries(&ctx, actions::CREATE_SITE).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result.to_string(), "failure");
    assert_eq!(logs[0].resource_id, None);
    assert_eq!(logs[0].details.as_ref().unwrap()["latitude"], "north");
}

#[actix_web::test]
async fn guards_only_see_their_own_rows() {
    let ctx = Ctx::new().await;
    let app = init_app!(ctx);
    let owner = ctx.token(&ctx.fx.user);
    let other = ctx.user("kamau", Role::Guard).await;
    let other = ctx.token(&other);
    let supervisor = ctx.user("sup", Role::Supervisor).await;
    let supervisor = ctx.token(&supervisor);

    let clock_in = post("/api/attendance/clock-in", &owner, clock_in_body(&ctx, 92));
    let resp = test::call_service(&app, clock_in.to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    for path in ["/api/guards", "/api/exceptions/pending"] {
        let resp = test::call_service(&app, get(path, &other).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
        let resp = test::call_service(&app, get(path, &supervisor).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }

    for path in ["/api/attendance/today", "/api/shifts/active"] {
        let own: Value = test::call_and_read_body_json(&app, get(path, &owner).to_request()).await;
        assert_eq!(own.as_array().unwrap().len(), 1, "{path}");
        let theirs: Value =
            test::call_and_read_body_json(&app, get(path, &other).to_request()).await;
        assert!(theirs.as_array().unwrap().is_empty(), "{path}");
        let all: Value =
            test::call_and_read_body_json(&app, get(path, &supervisor).to_request()).await;
        assert_eq!(all.as_array().unwrap().len(), 1, "{path}");
    }
}
