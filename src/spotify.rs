//! Spotify Web API backend - all remote playback/search/playlist calls
//!
//! The command router talks to a narrow `SpotifyBackend` trait so it can be
//! exercised against a scripted double; `WebApiBackend` is the real
//! implementation over the Web API.

use std::fmt;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::RequestBuilder;
use serde_json::{Value, json};
use thiserror::Error;

use crate::auth::SpotifyAuth;

const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("No results found for: {0}")]
    NoResults(String),
    #[error("Search failed: {0}")]
    Search(String),
    #[error("No active Spotify device found. Please open Spotify.")]
    NoActiveDevice,
    #[error("This action requires a Spotify Premium account.")]
    PremiumRequired,
    #[error("Failed to {action}: {detail}")]
    Playback { action: &'static str, detail: String },
    #[error("Volume must be between 0 and 100")]
    InvalidVolume,
    #[error("Spotify authentication failed: {0}")]
    Auth(String),
    #[error("Spotify request failed: {0}")]
    Http(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Track,
    Context,
    Off,
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::Track => "track",
            RepeatMode::Context => "context",
            RepeatMode::Off => "off",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub uri: String,
    pub artists: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Artist {
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub uri: String,
}

/// Operations the command router depends on.
///
/// Search calls treat zero results as an error, so handlers only ever see a
/// non-empty list or a `NoResults` failure.
pub trait SpotifyBackend: Send + Sync {
    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>, ServiceError>;
    fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<Artist>, ServiceError>;
    fn play_track(&self, uri: &str) -> Result<(), ServiceError>;
    fn play_context(&self, uri: &str) -> Result<(), ServiceError>;
    fn pause_playback(&self) -> Result<(), ServiceError>;
    fn resume_playback(&self) -> Result<(), ServiceError>;
    fn next_track(&self) -> Result<(), ServiceError>;
    fn previous_track(&self) -> Result<(), ServiceError>;
    fn set_volume(&self, percent: u8) -> Result<(), ServiceError>;
    fn toggle_shuffle(&self, on: bool) -> Result<(), ServiceError>;
    fn set_repeat(&self, mode: RepeatMode) -> Result<(), ServiceError>;
    /// Exact name match over the user's playlists, case-insensitive.
    fn get_playlist_by_name(&self, name: &str) -> Result<Option<Playlist>, ServiceError>;
    /// Returns the new playlist id, or None when the API gave nothing back.
    fn create_playlist(&self, name: &str, public: bool) -> Result<Option<String>, ServiceError>;
    /// Returns false when the playlist doesn't exist or the add was rejected.
    fn add_to_playlist(&self, name: &str, uris: &[String]) -> Result<bool, ServiceError>;
    fn current_user(&self) -> Result<String, ServiceError>;
}

// ============================================================================
// Web API implementation
// ============================================================================

pub struct WebApiBackend {
    http: reqwest::blocking::Client,
    auth: SpotifyAuth,
}

impl WebApiBackend {
    pub fn new(auth: SpotifyAuth) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http, auth }
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ServiceError> {
        let token = self
            .auth
            .access_token()
            .map_err(|e| ServiceError::Auth(e.to_string()))?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Issue a player request and map rejections to user-facing errors.
    fn player_call(&self, action: &'static str, req: RequestBuilder) -> Result<(), ServiceError> {
        let resp = req.send().map_err(|e| ServiceError::Playback {
            action,
            detail: e.to_string(),
        })?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().unwrap_or_default();
        Err(playback_error(action, status, &body))
    }

    fn search(&self, query: &str, kind: &str, limit: u32) -> Result<Value, ServiceError> {
        let limit = limit.to_string();
        let resp = self
            .request(Method::GET, &format!("{API_BASE}/search"))?
            .query(&[("q", query), ("type", kind), ("limit", limit.as_str())])
            .send()
            .map_err(|e| ServiceError::Search(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Search(resp.status().to_string()));
        }
        resp.json().map_err(|e| ServiceError::Search(e.to_string()))
    }

    fn get_user_playlists(&self) -> Result<Vec<Playlist>, ServiceError> {
        let resp = self
            .request(Method::GET, &format!("{API_BASE}/me/playlists"))?
            .query(&[("limit", "50")])
            .send()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Http(resp.status().to_string()));
        }
        let body: Value = resp.json().map_err(|e| ServiceError::Http(e.to_string()))?;
        let items = body["items"].as_array().cloned().unwrap_or_default();
        Ok(items.iter().filter_map(parse_playlist).collect())
    }

    fn user_id(&self) -> Result<String, ServiceError> {
        let resp = self
            .request(Method::GET, &format!("{API_BASE}/me"))?
            .send()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Http(resp.status().to_string()));
        }
        let body: Value = resp.json().map_err(|e| ServiceError::Http(e.to_string()))?;
        body["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| ServiceError::Http("no user id in profile".into()))
    }
}

impl SpotifyBackend for WebApiBackend {
    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>, ServiceError> {
        let body = self.search(query, "track", limit)?;
        let items = body["tracks"]["items"]
            .as_array()
            .ok_or_else(|| ServiceError::Search("malformed search result".into()))?;
        let tracks: Vec<Track> = items.iter().filter_map(parse_track).collect();
        if tracks.is_empty() {
            return Err(ServiceError::NoResults(query.to_string()));
        }
        Ok(tracks)
    }

    fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<Artist>, ServiceError> {
        let body = self.search(query, "artist", limit)?;
        let items = body["artists"]["items"]
            .as_array()
            .ok_or_else(|| ServiceError::Search("malformed search result".into()))?;
        let artists: Vec<Artist> = items.iter().filter_map(parse_artist).collect();
        if artists.is_empty() {
            return Err(ServiceError::NoResults(query.to_string()));
        }
        Ok(artists)
    }

    fn play_track(&self, uri: &str) -> Result<(), ServiceError> {
        let req = self
            .request(Method::PUT, &format!("{API_BASE}/me/player/play"))?
            .json(&json!({ "uris": [uri] }));
        self.player_call("play track", req)
    }

    fn play_context(&self, uri: &str) -> Result<(), ServiceError> {
        let req = self
            .request(Method::PUT, &format!("{API_BASE}/me/player/play"))?
            .json(&json!({ "context_uri": uri }));
        self.player_call("play context", req)
    }

    fn pause_playback(&self) -> Result<(), ServiceError> {
        let req = self.request(Method::PUT, &format!("{API_BASE}/me/player/pause"))?;
        self.player_call("pause", req)
    }

    fn resume_playback(&self) -> Result<(), ServiceError> {
        let req = self.request(Method::PUT, &format!("{API_BASE}/me/player/play"))?;
        self.player_call("resume", req)
    }

    fn next_track(&self) -> Result<(), ServiceError> {
        let req = self.request(Method::POST, &format!("{API_BASE}/me/player/next"))?;
        self.player_call("skip", req)
    }

    fn previous_track(&self) -> Result<(), ServiceError> {
        let req = self.request(Method::POST, &format!("{API_BASE}/me/player/previous"))?;
        self.player_call("go back", req)
    }

    fn set_volume(&self, percent: u8) -> Result<(), ServiceError> {
        if percent > 100 {
            return Err(ServiceError::InvalidVolume);
        }
        let req = self
            .request(Method::PUT, &format!("{API_BASE}/me/player/volume"))?
            .query(&[("volume_percent", percent.to_string())]);
        self.player_call("set volume", req)
    }

    fn toggle_shuffle(&self, on: bool) -> Result<(), ServiceError> {
        let req = self
            .request(Method::PUT, &format!("{API_BASE}/me/player/shuffle"))?
            .query(&[("state", on.to_string())]);
        self.player_call("toggle shuffle", req)
    }

    fn set_repeat(&self, mode: RepeatMode) -> Result<(), ServiceError> {
        let req = self
            .request(Method::PUT, &format!("{API_BASE}/me/player/repeat"))?
            .query(&[("state", mode.as_str())]);
        self.player_call("set repeat", req)
    }

    fn get_playlist_by_name(&self, name: &str) -> Result<Option<Playlist>, ServiceError> {
        let playlists = self.get_user_playlists()?;
        Ok(find_playlist(&playlists, name).cloned())
    }

    fn create_playlist(&self, name: &str, public: bool) -> Result<Option<String>, ServiceError> {
        let user_id = self.user_id()?;
        let resp = self
            .request(Method::POST, &format!("{API_BASE}/users/{user_id}/playlists"))?
            .json(&json!({ "name": name, "public": public }))
            .send()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            eprintln!("Failed to create playlist: {}", resp.status());
            return Ok(None);
        }
        let body: Value = resp.json().map_err(|e| ServiceError::Http(e.to_string()))?;
        Ok(body["id"].as_str().map(String::from))
    }

    fn add_to_playlist(&self, name: &str, uris: &[String]) -> Result<bool, ServiceError> {
        let Some(playlist) = self.get_playlist_by_name(name)? else {
            eprintln!("Playlist '{name}' not found for adding tracks");
            return Ok(false);
        };
        let resp = self
            .request(
                Method::POST,
                &format!("{API_BASE}/playlists/{}/tracks", playlist.id),
            )?
            .json(&json!({ "uris": uris }))
            .send()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            eprintln!("Failed to add tracks to playlist: {}", resp.status());
            return Ok(false);
        }
        Ok(true)
    }

    fn current_user(&self) -> Result<String, ServiceError> {
        let resp = self
            .request(Method::GET, &format!("{API_BASE}/me"))?
            .send()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Auth(
                "invalid credentials or expired token".into(),
            ));
        }
        if !resp.status().is_success() {
            return Err(ServiceError::Http(resp.status().to_string()));
        }
        let body: Value = resp.json().map_err(|e| ServiceError::Http(e.to_string()))?;
        Ok(body["display_name"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string())
    }
}

fn playback_error(action: &'static str, status: StatusCode, body: &str) -> ServiceError {
    match status.as_u16() {
        404 => ServiceError::NoActiveDevice,
        403 if body.contains("PREMIUM_REQUIRED") => ServiceError::PremiumRequired,
        403 => ServiceError::Playback {
            action,
            detail: format!("forbidden ({status})"),
        },
        _ => ServiceError::Playback {
            action,
            detail: status.to_string(),
        },
    }
}

fn find_playlist<'a>(playlists: &'a [Playlist], name: &str) -> Option<&'a Playlist> {
    let wanted = name.to_lowercase();
    playlists.iter().find(|p| p.name.to_lowercase() == wanted)
}

fn parse_track(item: &Value) -> Option<Track> {
    Some(Track {
        name: item["name"].as_str()?.to_string(),
        uri: item["uri"].as_str()?.to_string(),
        artists: item["artists"]
            .as_array()
            .map(|artists| {
                artists
                    .iter()
                    .filter_map(|a| a["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn parse_artist(item: &Value) -> Option<Artist> {
    Some(Artist {
        name: item["name"].as_str()?.to_string(),
        uri: item["uri"].as_str()?.to_string(),
    })
}

fn parse_playlist(item: &Value) -> Option<Playlist> {
    Some(Playlist {
        id: item["id"].as_str()?.to_string(),
        name: item["name"].as_str()?.to_string(),
        uri: item["uri"].as_str()?.to_string(),
    })
}
