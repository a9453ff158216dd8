//! OAuth token handling for the Spotify Web API
//!
//! Tokens are cached on disk and refreshed with the stored refresh token when
//! they run out. `croon auth` does the one-time authorization-code bootstrap.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SpotifyConfig;

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authorized yet - run `croon auth` first")]
    NotAuthorized,
    #[error("token request failed: {0}")]
    TokenRequest(String),
    #[error("token cache error: {0}")]
    Cache(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < TimeDelta::seconds(EXPIRY_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

pub struct SpotifyAuth {
    http: reqwest::blocking::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    cache_path: PathBuf,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyAuth {
    pub fn new(config: &SpotifyConfig) -> Self {
        let cache_path = PathBuf::from(&config.cache_path);
        let token = fs::read_to_string(&cache_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok());
        Self {
            http: reqwest::blocking::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            cache_path,
            token: Mutex::new(token),
        }
    }

    /// Where to send the user for the one-time consent step.
    pub fn authorize_url(&self) -> String {
        let mut url = reqwest::Url::parse(&format!("{ACCOUNTS_BASE}/authorize")).unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scope);
        url.to_string()
    }

    /// Trade the pasted authorization code for tokens and cache them.
    pub fn exchange_code(&self, code: &str) -> Result<(), AuthError> {
        let response = self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])?;
        let refresh = response
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::TokenRequest("no refresh token in response".into()))?;
        self.store(response, refresh)
    }

    /// Current access token, refreshing it first if it is about to expire.
    pub fn access_token(&self) -> Result<String, AuthError> {
        let cached = self
            .token
            .lock()
            .expect("token lock poisoned")
            .clone()
            .ok_or(AuthError::NotAuthorized)?;

        if !cached.needs_refresh(Utc::now()) {
            return Ok(cached.access_token);
        }

        let response = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", &cached.refresh_token),
        ])?;
        // Spotify usually omits the refresh token on renewal; keep the old one.
        let refresh = response
            .refresh_token
            .clone()
            .unwrap_or(cached.refresh_token);
        let access = response.access_token.clone();
        self.store(response, refresh)?;
        Ok(access)
    }

    fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(format!("{ACCOUNTS_BASE}/api/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AuthError::TokenRequest(resp.status().to_string()));
        }
        resp.json()
            .map_err(|e| AuthError::TokenRequest(e.to_string()))
    }

    fn store(&self, response: TokenResponse, refresh_token: String) -> Result<(), AuthError> {
        let cached = CachedToken {
            access_token: response.access_token,
            refresh_token,
            expires_at: Utc::now() + TimeDelta::seconds(response.expires_in),
        };
        let body = serde_json::to_string_pretty(&cached)
            .map_err(|e| AuthError::Cache(e.to_string()))?;
        fs::write(&self.cache_path, body).map_err(|e| AuthError::Cache(e.to_string()))?;
        *self.token.lock().expect("token lock poisoned") = Some(cached);
        Ok(())
    }
}
