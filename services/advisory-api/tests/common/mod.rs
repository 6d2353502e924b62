#![allow(dead_code)]

use advisory_api::cache::MemoryCodeCache;
use advisory_api::errors::Result;
use advisory_api::models::{Gender, NewUser, User, UserClass};
use advisory_api::services::{AdvisoryService, ServiceSettings};
use advisory_api::shortener::UrlShortener;
use advisory_api::store::{MemoryStore, Store};
use advisory_api::verification::{SecurityCodes, VerificationSettings};
use async_trait::async_trait;
use std::sync::Arc;

pub const FIXED_CODE: &str = "1234";

/// Shortener that answers with a predictable link.
pub struct StaticShortener;

#[async_trait]
impl UrlShortener for StaticShortener {
    async fn shorten(&self, long_url: &str) -> Result<String> {
        Ok(format!("http://t.cn/{}", long_url.len()))
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub service: Arc<AdvisoryService>,
}

pub fn test_app() -> TestApp {
    test_app_with(ServiceSettings::default())
}

pub fn test_app_with(settings: ServiceSettings) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let codes = SecurityCodes::new(
        Arc::new(MemoryCodeCache::new()),
        VerificationSettings {
            fixed_code: Some(FIXED_CODE.to_string()),
            sends_per_minute: 10,
            ..Default::default()
        },
    );
    let service = Arc::new(AdvisoryService::new(
        store.clone() as Arc<dyn Store>,
        codes,
        Arc::new(StaticShortener),
        settings,
    ));
    TestApp { store, service }
}

pub fn new_user(username: &str, user_class: UserClass) -> NewUser {
    NewUser {
        username: username.to_string(),
        user_class,
        mobile: String::new(),
        email: String::new(),
        nick_name: username.to_string(),
        avatar: None,
        gender: Gender::Secret,
        password_hash: String::new(),
    }
}

pub async fn investor(app: &TestApp, username: &str) -> User {
    app.service
        .create_user(new_user(username, UserClass::Investor))
        .await
        .unwrap()
}

pub async fn adviser(app: &TestApp, username: &str) -> User {
    app.service
        .create_user(new_user(username, UserClass::Adviser))
        .await
        .unwrap()
}
