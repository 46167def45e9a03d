use crate::{
    accounts::Accounts,
    api::{history, leave, users},
    auth::{handlers, middleware::auth_middleware, permissions::PermissionGate},
    config::Config,
    history::HistoryService,
    store::RecordStore,
    utils::username_index::UsernameIndex,
    workflow::LeaveWorkflow,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-route limiters. Built once so every worker shares the same quota.
#[derive(Clone)]
pub struct RateLimits {
    login: Arc<Limiter>,
    refresh: Arc<Limiter>,
    protected: Arc<Limiter>,
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min} requests per minute"))?;
    Ok(Governor::new(&cfg))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

/// Everything handlers pull out of app data.
#[derive(Clone)]
pub struct AppServices {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub usernames: Arc<UsernameIndex>,
    pub workflow: Arc<LeaveWorkflow>,
    pub history: Arc<HistoryService>,
    pub accounts: Arc<Accounts>,
}

impl AppServices {
    pub fn new(config: Config, store: Arc<dyn RecordStore>, gate: PermissionGate) -> Self {
        let gate = Arc::new(gate);
        let usernames = Arc::new(UsernameIndex::new(store.clone()));

        Self {
            workflow: Arc::new(LeaveWorkflow::new(store.clone(), gate.clone())),
            history: Arc::new(HistoryService::new(
                store.clone(),
                gate.clone(),
                usernames.clone(),
                config.page_size,
            )),
            accounts: Arc::new(Accounts::new(store.clone(), gate, usernames.clone())),
            config,
            store,
            usernames,
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::from(self.store.clone()))
            .app_data(web::Data::from(self.usernames.clone()))
            .app_data(web::Data::from(self.workflow.clone()))
            .app_data(web::Data::from(self.history.clone()))
            .app_data(web::Data::from(self.accounts.clone()));
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limits.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limits.protected.clone()) // rate limiting
            .configure(protected_routes),
    );
}

/// Routes behind bearer authentication, relative to the API prefix.
pub fn protected_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/landing").route(web::get().to(leave::landing)))
        .service(
            web::scope("/leave")
                // /leave
                .service(
                    web::resource("")
                        .route(web::get().to(leave::applied_leaves))
                        .route(web::post().to(leave::create_leave)),
                )
                // fixed segments before /leave/{id}
                .service(web::resource("/requests").route(web::get().to(leave::leave_requests)))
                .service(web::resource("/approver").route(web::get().to(leave::assigned_approver)))
                .service(web::resource("/summary").route(web::get().to(leave::leave_summary)))
                .service(web::resource("/{id}").route(web::get().to(leave::get_leave)))
                .service(web::resource("/{id}/response").route(web::put().to(leave::respond_leave))),
        )
        .service(
            web::scope("/history")
                .service(web::resource("/users").route(web::get().to(history::history_users)))
                .service(
                    web::resource("/appliers/{username}").route(web::get().to(history::appliers_history)),
                )
                .service(web::resource("/all/{username}").route(web::get().to(history::all_history))),
        )
        .service(
            web::scope("/users")
                .service(web::resource("").route(web::post().to(users::register)))
                .service(
                    web::resource("/{username}/approver").route(web::put().to(users::assign_approver)),
                ),
        );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL, rotated once)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new access_token + refresh_token
