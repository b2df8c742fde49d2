use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::shared::config::ServiceAccountKey;
use crate::shared::error::LoaderError;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_LIFETIME_MINUTES: i64 = 60;
/// Запас до истечения токена, после которого он запрашивается заново
const REFRESH_MARGIN_SECONDS: i64 = 120;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 для сервисного аккаунта (JWT bearer grant)
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            key,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Подписанное RS256 утверждение для обмена на access token
    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, LoaderError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| LoaderError::SheetAuth(format!("Invalid service account private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| LoaderError::SheetAuth(format!("Failed to sign token assertion: {}", e)))
    }

    /// Действующий access token (из кэша или новый)
    pub async fn access_token(&self) -> Result<String, LoaderError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECONDS) > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Google token exchange failed with status {}: {}", status, body);
            return Err(LoaderError::SheetAuth(format!(
                "Token exchange failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LoaderError::SheetAuth(format!("Malformed token response: {}", e)))?;

        tracing::debug!("Obtained Google access token for {}", self.key.client_email);
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        });
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::shared::test_support::spawn_router;
    use axum::{routing::post, Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) const TEST_PRIVATE_KEY: &str = include_str!("test_key.pem");

    pub(crate) fn test_key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "loader@test.iam.gserviceaccount.com".to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            token_uri,
        }
    }

    /// Роут, выдающий токен на JWT-утверждение, и счетчик обращений
    pub(crate) fn token_route(calls: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(
                        form.get("grant_type").map(String::as_str),
                        Some("urn:ietf:params:oauth:grant-type:jwt-bearer")
                    );
                    assert_eq!(form["assertion"].split('.').count(), 3);
                    Json(serde_json::json!({"access_token": "ya29.test", "expires_in": 3600}))
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_token_is_exchanged_once_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_router(token_route(calls.clone())).await;
        let auth = ServiceAccountAuth::new(test_key(format!("{}/token", base)), reqwest::Client::new());

        assert_eq!(auth.access_token().await.unwrap(), "ya29.test");
        assert_eq!(auth.access_token().await.unwrap(), "ya29.test");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_sheet_auth_error() {
        let base = spawn_router(Router::new().route(
            "/token",
            post(|| async { (axum::http::StatusCode::BAD_REQUEST, "invalid_grant") }),
        ))
        .await;
        let auth = ServiceAccountAuth::new(test_key(format!("{}/token", base)), reqwest::Client::new());
        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, LoaderError::SheetAuth(_)));
    }

    #[tokio::test]
    async fn test_invalid_private_key_is_sheet_auth_error() {
        let mut key = test_key("http://127.0.0.1:9/token".to_string());
        key.private_key = "not a pem".to_string();
        let auth = ServiceAccountAuth::new(key, reqwest::Client::new());
        assert!(matches!(auth.access_token().await, Err(LoaderError::SheetAuth(_))));
    }
}
