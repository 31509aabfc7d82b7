use crate::{
    api::{attendance, history},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    // Transitions get a tighter limit than the read endpoints
    let transition_limiter = Arc::new(build_limiter(config.rate_transition_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance/check-in
                    .service(
                        web::resource("/check-in")
                            .wrap(transition_limiter.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    // /attendance/check-out
                    .service(
                        web::resource("/check-out")
                            .wrap(transition_limiter.clone())
                            .route(web::put().to(attendance::check_out)),
                    )
                    // /attendance/status
                    .service(
                        web::resource("/status").route(web::get().to(attendance::status)),
                    )
                    // /attendance/history
                    .service(
                        web::resource("/history").route(web::get().to(history::monthly_history)),
                    )
                    // /attendance/daily
                    .service(
                        web::resource("/daily").route(web::get().to(history::daily_attendance)),
                    ),
            ),
    );
}

// CHECK-IN
//  ├─ POST /attendance/check-in   (opens today's session, once)
//  └─ PUT  /attendance/check-out  (closes it, day becomes terminal)

// RELOAD
//  └─ GET /attendance/status
//       └─ client rebuilds its view from the snapshot
