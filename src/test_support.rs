//! Shared fixtures for unit and HTTP tests, built on the memory store.

use crate::accounts::Accounts;
use crate::auth::handlers;
use crate::auth::jwt::generate_access_token;
use crate::auth::middleware::auth_middleware;
use crate::bootstrap;
use crate::config::Config;
use crate::history::HistoryService;
use crate::model::applier_approver::ApplierApprover;
use crate::model::role::Role;
use crate::model::user::{Caller, NewUser, User};
use crate::routes::{AppServices, protected_routes};
use crate::store::RecordStore;
use crate::store::memory::MemoryStore;
use crate::utils::username_index::UsernameIndex;
use crate::workflow::LeaveWorkflow;
use actix_web::middleware::from_fn;
use actix_web::web;
use chrono::{Duration, Local, NaiveDate};
use std::sync::Arc;

/// `days` from today, in server local time.
pub fn in_days(days: i64) -> NaiveDate {
    Local::now().date_naive() + Duration::days(days)
}

/// A bootstrapped memory store with five users:
///
/// * alice: employee whose approver is bob
/// * bob: approver
/// * carol: employee with no approver
/// * dave: approver with no appliers
/// * sam: super
pub struct Fixture {
    pub services: AppServices,
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub usernames: Arc<UsernameIndex>,
    pub workflow: Arc<LeaveWorkflow>,
    pub history: Arc<HistoryService>,
    pub accounts: Arc<Accounts>,
    pub alice: Caller,
    pub bob: Caller,
    pub carol: Caller,
    pub dave: Caller,
    pub sam: Caller,
}

async fn add_user(store: &dyn RecordStore, username: &str, role: Role) -> User {
    store
        .insert_user(NewUser {
            username: username.into(),
            // not a valid hash; login tests register their own users
            password: "unusable".into(),
            role,
        })
        .await
        .unwrap()
}

impl Fixture {
    pub async fn new() -> Self {
        let config = Config::for_tests();
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let gate = bootstrap::run(store.as_ref(), None).await.unwrap();

        let alice = add_user(store.as_ref(), "alice", Role::Employee).await;
        let bob = add_user(store.as_ref(), "bob", Role::Approver).await;
        let carol = add_user(store.as_ref(), "carol", Role::Employee).await;
        let dave = add_user(store.as_ref(), "dave", Role::Approver).await;
        let sam = add_user(store.as_ref(), "sam", Role::Super).await;

        store
            .assign_approver(ApplierApprover {
                user: alice.id,
                approver: Some(bob.id),
            })
            .await
            .unwrap();

        let services = AppServices::new(config.clone(), store.clone(), gate);

        Fixture {
            config,
            store,
            usernames: services.usernames.clone(),
            workflow: services.workflow.clone(),
            history: services.history.clone(),
            accounts: services.accounts.clone(),
            services,
            alice: Caller::from(&alice),
            bob: Caller::from(&bob),
            carol: Caller::from(&carol),
            dave: Caller::from(&dave),
            sam: Caller::from(&sam),
        }
    }

    /// `Authorization` header carrying an access token for `caller`.
    pub fn bearer(&self, caller: &Caller) -> (&'static str, String) {
        let user = User {
            id: caller.id,
            username: caller.username.clone(),
            password: String::new(),
            role: caller.role,
        };
        let token = generate_access_token(&user, &self.config.jwt_secret, self.config.access_token_ttl).unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    /// The production routes minus rate limiting, which needs a peer address.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        self.services.register(cfg);
        cfg.service(web::resource("/auth/login").route(web::post().to(handlers::login)))
            .service(web::resource("/auth/refresh").route(web::post().to(handlers::refresh_token)))
            .service(web::resource("/auth/logout").route(web::post().to(handlers::logout)))
            .service(
                web::scope(&self.config.api_prefix)
                    .wrap(from_fn(auth_middleware))
                    .configure(protected_routes),
            );
    }
}
