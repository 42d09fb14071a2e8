use crate::api::{
    exception::ReviewExceptionReq,
    guard::OnDutyResponse,
};
use crate::model::{
    attendance::{Attendance, AttendanceStatus},
    audit_log::{AuditLog, AuditResult},
    exception::{Exception, ExceptionStatus, ExceptionType, Severity},
    guard::{Guard, NewGuard},
    post::{NewPost, Post},
    role::Role,
    shift::{NewShift, Shift, ShiftStatus},
    site::{NewSite, Site},
};
use crate::models::{LoginReqDto, RegisterReq, TokenPair};
use crate::service::workflow::{ClockInRequest, ClockOutRequest};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Guard Attendance API",
        version = "1.0.0",
        description = r#"
## Guard Attendance

Biometric clock-in/clock-out for security guards posted at client sites.

### Key Features
- **Directory**: sites with a geofence radius, posts within sites, guard profiles
- **Shifts**: scheduled guard-to-post assignments
- **Attendance**: clock-in/clock-out checked against a biometric match threshold
- **Exceptions**: low scores, geofence violations and late arrivals queued for supervisor review
- **Audit**: every mutating call leaves one append-only audit entry
- **Real-time**: `/ws` pushes `attendance_update` and `exception_alert` messages

### Security
All `/api` endpoints require a **JWT Bearer** access token from `/auth/login`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::guard::list_guards,
        crate::api::guard::create_guard,
        crate::api::guard::on_duty,
        crate::api::guard::my_guard_profile,

        crate::api::site::list_sites,
        crate::api::site::create_site,
        crate::api::site::list_posts,
        crate::api::site::create_post,

        crate::api::shift::active_shifts,
        crate::api::shift::create_shift,

        crate::api::attendance::today,
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,

        crate::api::exception::pending,
        crate::api::exception::review,

        crate::api::audit_log::list_audit_logs
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenPair,
            Role,
            Site,
            NewSite,
            Post,
            NewPost,
            Guard,
            NewGuard,
            OnDutyResponse,
            Shift,
            NewShift,
            ShiftStatus,
            Attendance,
            AttendanceStatus,
            ClockInRequest,
            ClockOutRequest,
            Exception,
            ExceptionType,
            ExceptionStatus,
            Severity,
            ReviewExceptionReq,
            AuditLog,
            AuditResult
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and tokens"),
        (name = "Guards", description = "Guard profiles"),
        (name = "Sites", description = "Sites and posts"),
        (name = "Shifts", description = "Shift scheduling"),
        (name = "Attendance", description = "Clock-in and clock-out"),
        (name = "Exceptions", description = "Exception review queue"),
        (name = "Audit", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
