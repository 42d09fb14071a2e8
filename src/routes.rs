use crate::{
    api::{attendance, audit_log, exception, guard, shift, site, ws},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter, keyed by peer IP
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Authenticates itself, the upgrade cannot always carry a header
    cfg.service(
        web::resource("/ws")
            .wrap(protected_limiter.clone())
            .route(web::get().to(ws::connect)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            // authentication
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/guards")
                    // /guards
                    .service(
                        web::resource("")
                            .route(web::get().to(guard::list_guards))
                            .route(web::post().to(guard::create_guard)),
                    )
                    // /guards/{id}/on-duty
                    .service(web::resource("/{id}/on-duty").route(web::get().to(guard::on_duty))),
            )
            .service(
                web::resource("/my-guard-profile").route(web::get().to(guard::my_guard_profile)),
            )
            .service(
                web::scope("/sites")
                    .service(
                        web::resource("")
                            .route(web::get().to(site::list_sites))
                            .route(web::post().to(site::create_site)),
                    )
                    // /sites/{id}/posts
                    .service(web::resource("/{id}/posts").route(web::get().to(site::list_posts))),
            )
            .service(web::resource("/posts").route(web::post().to(site::create_post)))
            .service(
                web::scope("/shifts")
                    .service(web::resource("").route(web::post().to(shift::create_shift)))
                    .service(web::resource("/active").route(web::get().to(shift::active_shifts))),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/clock-in").route(web::post().to(attendance::clock_in)))
                    .service(
                        web::resource("/clock-out").route(web::post().to(attendance::clock_out)),
                    ),
            )
            .service(
                web::scope("/exceptions")
                    .service(web::resource("/pending").route(web::get().to(exception::pending)))
                    // /exceptions/{id}
                    .service(web::resource("/{id}").route(web::patch().to(exception::review))),
            )
            .service(web::resource("/audit-logs").route(web::get().to(audit_log::list_audit_logs))),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a rotated pair
