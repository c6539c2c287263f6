//! Shared reqwest client construction for the remote enrichers, grounded on
//! the images client's explicit timeout handling.

use std::time::Duration;

use reqwest::Client;

pub fn build(bearer_token: Option<&str>) -> Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    if let Some(token) = bearer_token {
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }

    Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()
        .expect("reqwest client configuration is static and always valid")
}
