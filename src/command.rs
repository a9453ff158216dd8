//! Command interpretation core - maps free-form text to playback intents
//!
//! Input is matched by prefix against a priority-ordered keyword table; the
//! first match wins. Each intent handler does its own sub-parsing and returns
//! a uniform (success, message) result. Nothing escapes the router boundary:
//! backend errors and handler panics all come back as a failed CommandResult.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::spotify::{RepeatMode, ServiceError, SpotifyBackend};

/// Uniform outcome of every routed command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Play,
    Pause,
    Resume,
    Skip,
    Previous,
    Volume,
    Shuffle,
    Repeat,
    CreatePlaylist,
    AddToPlaylist,
}

/// What a `play` command resolved to after its own sub-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PlayTarget {
    Track(String),
    Artist(String),
    Playlist(String),
}

/// Most specific phrases first: "create playlist" must win over "play", and
/// "add ... to playlist ..." must never reach a handler that only looks for
/// "playlist" later in the text.
const KEYWORDS: [(&str, Intent); 12] = [
    ("create playlist", Intent::CreatePlaylist),
    ("add", Intent::AddToPlaylist),
    ("play", Intent::Play),
    ("pause", Intent::Pause),
    ("resume", Intent::Resume),
    ("skip", Intent::Skip),
    ("next", Intent::Skip),
    ("previous", Intent::Previous),
    ("back", Intent::Previous),
    ("volume", Intent::Volume),
    ("shuffle", Intent::Shuffle),
    ("repeat", Intent::Repeat),
];

/// Routes raw text to intent handlers. Stateless across calls; the only
/// state is the backend's remote session.
#[derive(Clone)]
pub struct CommandRouter {
    backend: Arc<dyn SpotifyBackend>,
}

impl CommandRouter {
    pub fn new(backend: Arc<dyn SpotifyBackend>) -> Self {
        Self { backend }
    }

    pub fn execute(&self, raw: &str) -> CommandResult {
        let text = raw.trim();
        if text.is_empty() {
            return CommandResult::fail("Empty command");
        }

        let lowered = text.to_lowercase();
        let Some(intent) = KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.starts_with(keyword))
            .map(|&(_, intent)| intent)
        else {
            return CommandResult::fail("Command not recognized");
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(intent, text))) {
            Ok(result) => result,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                eprintln!("Command execution error: {detail}");
                CommandResult::fail(format!("Error executing command: {detail}"))
            }
        }
    }

    fn dispatch(&self, intent: Intent, text: &str) -> CommandResult {
        let backend = self.backend.as_ref();
        match intent {
            Intent::Play => play(backend, text),
            Intent::Pause => pause(backend),
            Intent::Resume => resume(backend),
            Intent::Skip => skip(backend),
            Intent::Previous => previous(backend),
            Intent::Volume => volume(backend, text),
            Intent::Shuffle => shuffle(backend, text),
            Intent::Repeat => repeat(backend, text),
            Intent::CreatePlaylist => create_playlist(backend, text),
            Intent::AddToPlaylist => add_to_playlist(backend, text),
        }
    }
}

// ============================================================================
// Intent handlers
// ============================================================================

fn play(backend: &dyn SpotifyBackend, text: &str) -> CommandResult {
    // Strip the keyword once only: a title like "Play That Funky Music"
    // must keep its inner "play".
    let rest = strip_first(&text.to_lowercase(), "play");
    if rest.is_empty() {
        return CommandResult::fail("Please specify what to play");
    }

    match parse_play_target(&rest) {
        PlayTarget::Playlist(name) => match backend.get_playlist_by_name(&name) {
            Ok(Some(playlist)) => match backend.play_context(&playlist.uri) {
                Ok(()) => CommandResult::ok(format!("Playing playlist: {}", playlist.name)),
                Err(e) => CommandResult::fail(e.to_string()),
            },
            Ok(None) => CommandResult::fail(format!("Playlist '{name}' not found")),
            Err(e) => CommandResult::fail(e.to_string()),
        },
        PlayTarget::Artist(name) => match backend.search_artists(&name, 1) {
            Ok(artists) => match artists.first() {
                Some(artist) => match backend.play_context(&artist.uri) {
                    Ok(()) => CommandResult::ok(format!("Playing artist: {}", artist.name)),
                    Err(e) => CommandResult::fail(e.to_string()),
                },
                None => CommandResult::fail(format!("Artist '{name}' not found")),
            },
            Err(ServiceError::NoResults(_)) => {
                CommandResult::fail(format!("Artist '{name}' not found"))
            }
            Err(e) => CommandResult::fail(e.to_string()),
        },
        PlayTarget::Track(query) => match backend.search_tracks(&query, 1) {
            Ok(tracks) => match tracks.first() {
                Some(track) => match backend.play_track(&track.uri) {
                    Ok(()) => CommandResult::ok(format!(
                        "Playing: {} by {}",
                        track.name,
                        track.artists.join(", ")
                    )),
                    Err(e) => CommandResult::fail(e.to_string()),
                },
                None => CommandResult::fail(format!("Track '{query}' not found")),
            },
            Err(ServiceError::NoResults(_)) => {
                CommandResult::fail(format!("Track '{query}' not found"))
            }
            Err(e) => CommandResult::fail(e.to_string()),
        },
    }
}

fn pause(backend: &dyn SpotifyBackend) -> CommandResult {
    match backend.pause_playback() {
        Ok(()) => CommandResult::ok("Playback paused"),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn resume(backend: &dyn SpotifyBackend) -> CommandResult {
    match backend.resume_playback() {
        Ok(()) => CommandResult::ok("Playback resumed"),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn skip(backend: &dyn SpotifyBackend) -> CommandResult {
    match backend.next_track() {
        Ok(()) => CommandResult::ok("Skipped to next track"),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn previous(backend: &dyn SpotifyBackend) -> CommandResult {
    match backend.previous_track() {
        Ok(()) => CommandResult::ok("Went to previous track"),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn volume(backend: &dyn SpotifyBackend, text: &str) -> CommandResult {
    let Some(level) = first_number(text) else {
        return CommandResult::fail("Please specify volume level (0-100)");
    };
    if level > 100 {
        return CommandResult::fail("Volume must be between 0 and 100");
    }
    match backend.set_volume(level as u8) {
        Ok(()) => CommandResult::ok(format!("Volume set to {level}%")),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn shuffle(backend: &dyn SpotifyBackend, text: &str) -> CommandResult {
    // Anything without an "on" token means off, ungrammatical input included.
    let on = contains_token(text, "on");
    match backend.toggle_shuffle(on) {
        Ok(()) => CommandResult::ok(if on {
            "Shuffle enabled"
        } else {
            "Shuffle disabled"
        }),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn repeat(backend: &dyn SpotifyBackend, text: &str) -> CommandResult {
    let lowered = text.to_lowercase();
    let mode = if lowered.contains("track") {
        RepeatMode::Track
    } else if lowered.contains("context") || lowered.contains("playlist") {
        RepeatMode::Context
    } else {
        RepeatMode::Off
    };
    match backend.set_repeat(mode) {
        Ok(()) => CommandResult::ok(format!("Repeat mode set to {mode}")),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

fn create_playlist(backend: &dyn SpotifyBackend, text: &str) -> CommandResult {
    // Strip from the original text so the new playlist keeps its casing.
    let name = strip_first(text, "create playlist");
    if name.is_empty() {
        return CommandResult::fail("Please specify a playlist name");
    }
    match backend.create_playlist(&name, true) {
        Ok(Some(_)) => CommandResult::ok(format!("Created playlist: {name}")),
        Ok(None) => CommandResult::fail("Failed to create playlist"),
        Err(e) => {
            eprintln!("Create playlist failed: {e}");
            CommandResult::fail("Failed to create playlist")
        }
    }
}

fn add_to_playlist(backend: &dyn SpotifyBackend, text: &str) -> CommandResult {
    // Parsed against the original-cased text so the confirmation message can
    // echo the playlist name the way the user wrote it.
    let Some((song, playlist)) = parse_add_command(text) else {
        return CommandResult::fail("Format: 'add [song] to playlist [name]'");
    };

    let tracks = match backend.search_tracks(&song.to_lowercase(), 1) {
        Ok(tracks) => tracks,
        Err(ServiceError::NoResults(_)) => {
            return CommandResult::fail(format!("Track '{song}' not found"));
        }
        Err(e) => return CommandResult::fail(e.to_string()),
    };
    let Some(track) = tracks.first() else {
        return CommandResult::fail(format!("Track '{song}' not found"));
    };

    match backend.add_to_playlist(&playlist, &[track.uri.clone()]) {
        Ok(true) => CommandResult::ok(format!("Added '{}' to playlist '{playlist}'", track.name)),
        Ok(false) => CommandResult::fail(format!(
            "Failed to add track (playlist '{playlist}' not found?)"
        )),
        Err(e) => CommandResult::fail(e.to_string()),
    }
}

// ============================================================================
// Parameter extraction
// ============================================================================

fn parse_play_target(text: &str) -> PlayTarget {
    if text.starts_with("playlist") {
        PlayTarget::Playlist(strip_first(text, "playlist"))
    } else if text.starts_with("artist") {
        PlayTarget::Artist(strip_first(text, "artist"))
    } else {
        PlayTarget::Track(text.to_string())
    }
}

/// The two accepted phrasings, primary form first:
/// `add <song> to playlist <name>`, then `add to playlist <name> with <song>`.
/// Returns (song, playlist name) with original casing.
fn parse_add_command(text: &str) -> Option<(String, String)> {
    // The router matched the leading "add"; skip it.
    let rest = text[3..].trim();

    if let Some(pos) = find_ci(rest, " to playlist ") {
        let song = rest[..pos].trim();
        let name = rest[pos + " to playlist ".len()..].trim();
        if !song.is_empty() && !name.is_empty() {
            return Some((song.to_string(), name.to_string()));
        }
    }

    if let Some(tail) = strip_prefix_ci(rest, "to playlist ") {
        if let Some(pos) = find_ci(tail, " with ") {
            let name = tail[..pos].trim();
            let song = tail[pos + " with ".len()..].trim();
            if !song.is_empty() && !name.is_empty() {
                return Some((song.to_string(), name.to_string()));
            }
        }
    }

    None
}

/// Remove the first case-insensitive occurrence of `keyword`, keeping the
/// rest of the text intact.
fn strip_first(text: &str, keyword: &str) -> String {
    match find_ci(text, keyword) {
        Some(pos) => {
            let mut out = String::with_capacity(text.len() - keyword.len());
            out.push_str(&text[..pos]);
            out.push_str(&text[pos + keyword.len()..]);
            out.trim().to_string()
        }
        None => text.trim().to_string(),
    }
}

/// Byte offset of the first ASCII-case-insensitive match. Matches can only
/// start on ASCII bytes, so the offset is always a char boundary.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// First run of ASCII digits anywhere in the text.
fn first_number(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    // A run too long for u64 is certainly out of range.
    Some(digits.parse().unwrap_or(u64::MAX))
}

fn contains_token(text: &str, token: &str) -> bool {
    text.split_whitespace().any(|word| {
        word.trim_matches(|c: char| !c.is_alphanumeric())
            .eq_ignore_ascii_case(token)
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify::{Artist, Playlist, Track};
    use std::sync::Mutex;

    /// Scripted backend that records every call it receives.
    #[derive(Default)]
    struct MockBackend {
        calls: Mutex<Vec<String>>,
        tracks: Vec<Track>,
        artists: Vec<Artist>,
        playlists: Vec<Playlist>,
        search_error: Option<ServiceError>,
        playback_error: Option<ServiceError>,
        create_id: Option<String>,
        add_result: bool,
        panic_on_pause: bool,
    }

    impl MockBackend {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn playback(&self) -> Result<(), ServiceError> {
            match &self.playback_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    impl SpotifyBackend for MockBackend {
        fn search_tracks(&self, query: &str, _limit: u32) -> Result<Vec<Track>, ServiceError> {
            self.record(format!("search_tracks:{query}"));
            if let Some(e) = &self.search_error {
                return Err(e.clone());
            }
            if self.tracks.is_empty() {
                return Err(ServiceError::NoResults(query.to_string()));
            }
            Ok(self.tracks.clone())
        }

        fn search_artists(&self, query: &str, _limit: u32) -> Result<Vec<Artist>, ServiceError> {
            self.record(format!("search_artists:{query}"));
            if let Some(e) = &self.search_error {
                return Err(e.clone());
            }
            if self.artists.is_empty() {
                return Err(ServiceError::NoResults(query.to_string()));
            }
            Ok(self.artists.clone())
        }

        fn play_track(&self, uri: &str) -> Result<(), ServiceError> {
            self.record(format!("play_track:{uri}"));
            self.playback()
        }

        fn play_context(&self, uri: &str) -> Result<(), ServiceError> {
            self.record(format!("play_context:{uri}"));
            self.playback()
        }

        fn pause_playback(&self) -> Result<(), ServiceError> {
            if self.panic_on_pause {
                panic!("backend exploded");
            }
            self.record("pause".into());
            self.playback()
        }

        fn resume_playback(&self) -> Result<(), ServiceError> {
            self.record("resume".into());
            self.playback()
        }

        fn next_track(&self) -> Result<(), ServiceError> {
            self.record("next".into());
            self.playback()
        }

        fn previous_track(&self) -> Result<(), ServiceError> {
            self.record("previous".into());
            self.playback()
        }

        fn set_volume(&self, percent: u8) -> Result<(), ServiceError> {
            self.record(format!("set_volume:{percent}"));
            self.playback()
        }

        fn toggle_shuffle(&self, on: bool) -> Result<(), ServiceError> {
            self.record(format!("shuffle:{on}"));
            self.playback()
        }

        fn set_repeat(&self, mode: RepeatMode) -> Result<(), ServiceError> {
            self.record(format!("repeat:{mode}"));
            self.playback()
        }

        fn get_playlist_by_name(&self, name: &str) -> Result<Option<Playlist>, ServiceError> {
            self.record(format!("get_playlist_by_name:{name}"));
            let wanted = name.to_lowercase();
            Ok(self
                .playlists
                .iter()
                .find(|p| p.name.to_lowercase() == wanted)
                .cloned())
        }

        fn create_playlist(
            &self,
            name: &str,
            public: bool,
        ) -> Result<Option<String>, ServiceError> {
            self.record(format!("create_playlist:{name}:{public}"));
            Ok(self.create_id.clone())
        }

        fn add_to_playlist(&self, name: &str, uris: &[String]) -> Result<bool, ServiceError> {
            self.record(format!("add_to_playlist:{name}:{}", uris.join(",")));
            Ok(self.add_result)
        }

        fn current_user(&self) -> Result<String, ServiceError> {
            self.record("current_user".into());
            Ok("Test User".into())
        }
    }

    fn test_track() -> Track {
        Track {
            name: "Test Song".into(),
            uri: "spotify:track:123".into(),
            artists: vec!["Artist One".into()],
        }
    }

    fn router(backend: MockBackend) -> (CommandRouter, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        (CommandRouter::new(backend.clone()), backend)
    }

    #[test]
    fn test_empty_command() {
        let (router, backend) = router(MockBackend::default());
        for input in ["", "   "] {
            let result = router.execute(input);
            assert!(!result.success);
            assert_eq!(result.message, "Empty command");
        }
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_unrecognized_command() {
        let (router, backend) = router(MockBackend::default());
        let result = router.execute("this is not a real command");
        assert!(!result.success);
        assert_eq!(result.message, "Command not recognized");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_play_track() {
        let (router, backend) = router(MockBackend {
            tracks: vec![test_track()],
            ..Default::default()
        });
        let result = router.execute("play Test Song");
        assert!(result.success);
        assert_eq!(result.message, "Playing: Test Song by Artist One");
        assert_eq!(
            backend.calls(),
            vec!["search_tracks:test song", "play_track:spotify:track:123"]
        );
    }

    #[test]
    fn test_play_strips_keyword_once() {
        let (router, backend) = router(MockBackend {
            tracks: vec![test_track()],
            ..Default::default()
        });
        router.execute("play Play That Funky Music");
        assert_eq!(backend.calls()[0], "search_tracks:play that funky music");
    }

    #[test]
    fn test_play_without_query() {
        let (router, backend) = router(MockBackend::default());
        let result = router.execute("play");
        assert!(!result.success);
        assert_eq!(result.message, "Please specify what to play");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_play_track_not_found() {
        let (router, _) = router(MockBackend::default());
        let result = router.execute("play Nothing Here");
        assert!(!result.success);
        assert_eq!(result.message, "Track 'nothing here' not found");
    }

    #[test]
    fn test_play_search_failure_propagates_message() {
        let (router, _) = router(MockBackend {
            search_error: Some(ServiceError::Search("backend down".into())),
            ..Default::default()
        });
        let result = router.execute("play Test Song");
        assert!(!result.success);
        assert_eq!(result.message, "Search failed: backend down");
    }

    #[test]
    fn test_play_artist() {
        let (router, backend) = router(MockBackend {
            artists: vec![Artist {
                name: "Test Artist".into(),
                uri: "spotify:artist:456".into(),
            }],
            ..Default::default()
        });
        let result = router.execute("play artist Test Artist");
        assert!(result.success);
        assert_eq!(result.message, "Playing artist: Test Artist");
        assert_eq!(
            backend.calls(),
            vec![
                "search_artists:test artist",
                "play_context:spotify:artist:456"
            ]
        );
    }

    #[test]
    fn test_play_artist_not_found() {
        let (router, _) = router(MockBackend::default());
        let result = router.execute("play artist Nobody");
        assert!(!result.success);
        assert_eq!(result.message, "Artist 'nobody' not found");
    }

    #[test]
    fn test_play_playlist() {
        let (router, backend) = router(MockBackend {
            playlists: vec![Playlist {
                id: "789".into(),
                name: "Test Playlist".into(),
                uri: "spotify:playlist:789".into(),
            }],
            ..Default::default()
        });
        let result = router.execute("play playlist Test Playlist");
        assert!(result.success);
        assert_eq!(result.message, "Playing playlist: Test Playlist");
        assert_eq!(
            backend.calls(),
            vec![
                "get_playlist_by_name:test playlist",
                "play_context:spotify:playlist:789"
            ]
        );
    }

    #[test]
    fn test_play_playlist_not_found() {
        let (router, _) = router(MockBackend::default());
        let result = router.execute("play playlist Missing");
        assert!(!result.success);
        assert_eq!(result.message, "Playlist 'missing' not found");
    }

    #[test]
    fn test_play_device_error_propagates() {
        let (router, _) = router(MockBackend {
            tracks: vec![test_track()],
            playback_error: Some(ServiceError::NoActiveDevice),
            ..Default::default()
        });
        let result = router.execute("play Test Song");
        assert!(!result.success);
        assert_eq!(
            result.message,
            "No active Spotify device found. Please open Spotify."
        );
    }

    #[test]
    fn test_pause_resume_skip_previous() {
        let (router, backend) = router(MockBackend::default());
        assert_eq!(router.execute("pause").message, "Playback paused");
        assert_eq!(router.execute("resume").message, "Playback resumed");
        assert_eq!(router.execute("skip").message, "Skipped to next track");
        assert_eq!(router.execute("next").message, "Skipped to next track");
        assert_eq!(router.execute("previous").message, "Went to previous track");
        assert_eq!(router.execute("back").message, "Went to previous track");
        assert_eq!(
            backend.calls(),
            vec!["pause", "resume", "next", "next", "previous", "previous"]
        );
    }

    #[test]
    fn test_pause_is_stateless() {
        let (router, backend) = router(MockBackend::default());
        assert!(router.execute("pause").success);
        assert!(router.execute("pause").success);
        assert_eq!(backend.calls(), vec!["pause", "pause"]);
    }

    #[test]
    fn test_volume() {
        let (router, backend) = router(MockBackend::default());
        let result = router.execute("volume 75");
        assert!(result.success);
        assert_eq!(result.message, "Volume set to 75%");
        assert_eq!(backend.calls(), vec!["set_volume:75"]);
    }

    #[test]
    fn test_volume_no_number() {
        let (router, backend) = router(MockBackend::default());
        let result = router.execute("volume up please");
        assert!(!result.success);
        assert_eq!(result.message, "Please specify volume level (0-100)");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_volume_out_of_range_never_reaches_backend() {
        let (router, backend) = router(MockBackend::default());
        for input in ["volume 200", "volume 99999999999999999999999"] {
            let result = router.execute(input);
            assert!(!result.success);
            assert_eq!(result.message, "Volume must be between 0 and 100");
        }
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_shuffle_defaults_to_off() {
        let (router, backend) = router(MockBackend::default());
        assert_eq!(router.execute("shuffle").message, "Shuffle disabled");
        assert_eq!(router.execute("shuffle off").message, "Shuffle disabled");
        // "song" contains "on" but is not the token
        assert_eq!(router.execute("shuffle song").message, "Shuffle disabled");
        assert_eq!(router.execute("shuffle on").message, "Shuffle enabled");
        assert_eq!(
            backend.calls(),
            vec![
                "shuffle:false",
                "shuffle:false",
                "shuffle:false",
                "shuffle:true"
            ]
        );
    }

    #[test]
    fn test_repeat_modes() {
        let (router, backend) = router(MockBackend::default());
        assert_eq!(
            router.execute("repeat track").message,
            "Repeat mode set to track"
        );
        assert_eq!(
            router.execute("repeat playlist").message,
            "Repeat mode set to context"
        );
        assert_eq!(
            router.execute("repeat context").message,
            "Repeat mode set to context"
        );
        assert_eq!(router.execute("repeat").message, "Repeat mode set to off");
        assert_eq!(
            backend.calls(),
            vec![
                "repeat:track",
                "repeat:context",
                "repeat:context",
                "repeat:off"
            ]
        );
    }

    #[test]
    fn test_create_playlist_preserves_casing() {
        let (router, backend) = router(MockBackend {
            create_id: Some("new-id".into()),
            ..Default::default()
        });
        let result = router.execute("create playlist Road Trip");
        assert!(result.success);
        assert_eq!(result.message, "Created playlist: Road Trip");
        assert_eq!(backend.calls(), vec!["create_playlist:Road Trip:true"]);
    }

    #[test]
    fn test_create_playlist_without_name() {
        let (router, backend) = router(MockBackend::default());
        let result = router.execute("create playlist");
        assert!(!result.success);
        assert_eq!(result.message, "Please specify a playlist name");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_create_playlist_backend_gives_no_id() {
        let (router, _) = router(MockBackend::default());
        let result = router.execute("create playlist Road Trip");
        assert!(!result.success);
        assert_eq!(result.message, "Failed to create playlist");
    }

    #[test]
    fn test_add_to_playlist() {
        let (router, backend) = router(MockBackend {
            tracks: vec![test_track()],
            add_result: true,
            ..Default::default()
        });
        let result = router.execute("add Test Song to playlist My Favs");
        assert!(result.success);
        // lookup is case-insensitive but the message keeps the user's casing
        assert_eq!(result.message, "Added 'Test Song' to playlist 'My Favs'");
        assert_eq!(
            backend.calls(),
            vec![
                "search_tracks:test song",
                "add_to_playlist:My Favs:spotify:track:123"
            ]
        );
    }

    #[test]
    fn test_add_to_playlist_alternate_form() {
        let (router, backend) = router(MockBackend {
            tracks: vec![test_track()],
            add_result: true,
            ..Default::default()
        });
        let result = router.execute("add to playlist My Favs with Test Song");
        assert!(result.success);
        assert_eq!(result.message, "Added 'Test Song' to playlist 'My Favs'");
        assert_eq!(
            backend.calls(),
            vec![
                "search_tracks:test song",
                "add_to_playlist:My Favs:spotify:track:123"
            ]
        );
    }

    #[test]
    fn test_add_bad_format() {
        let (router, backend) = router(MockBackend::default());
        let result = router.execute("add something");
        assert!(!result.success);
        assert_eq!(result.message, "Format: 'add [song] to playlist [name]'");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_add_track_not_found() {
        let (router, _) = router(MockBackend::default());
        let result = router.execute("add Test Song to playlist My Favs");
        assert!(!result.success);
        assert_eq!(result.message, "Track 'Test Song' not found");
    }

    #[test]
    fn test_add_playlist_missing() {
        let (router, _) = router(MockBackend {
            tracks: vec![test_track()],
            add_result: false,
            ..Default::default()
        });
        let result = router.execute("add Test Song to playlist My Favs");
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Failed to add track (playlist 'My Favs' not found?)"
        );
    }

    #[test]
    fn test_keyword_priority() {
        // "create playlist" must not be captured by the play handler
        let (router, backend) = router(MockBackend {
            create_id: Some("id".into()),
            ..Default::default()
        });
        assert!(router.execute("create playlist Jazz").success);
        assert_eq!(backend.calls(), vec!["create_playlist:Jazz:true"]);
    }

    #[test]
    fn test_panic_is_contained() {
        let (router, _) = router(MockBackend {
            panic_on_pause: true,
            ..Default::default()
        });
        let result = router.execute("pause");
        assert!(!result.success);
        assert_eq!(result.message, "Error executing command: backend exploded");
    }

    #[test]
    fn test_parse_add_command_first_pattern_wins() {
        let (song, name) = parse_add_command("add A to playlist B to playlist C").unwrap();
        assert_eq!(song, "A");
        assert_eq!(name, "B to playlist C");
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("volume 42 please"), Some(42));
        assert_eq!(first_number("set to 7"), Some(7));
        assert_eq!(first_number("no digits"), None);
    }

    #[test]
    fn test_strip_first() {
        assert_eq!(strip_first("play play that song", "play"), "play that song");
        assert_eq!(strip_first("Create Playlist Mix", "create playlist"), "Mix");
        assert_eq!(strip_first("nothing here", "play"), "nothing here");
    }
}
