use std::sync::atomic::{AtomicU64, Ordering};

use url::{form_urlencoded, Url};

use crate::player::SessionId;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One loaded playlist. Replaced, never mutated, when the playlist changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    id: SessionId,
    playlist_id: String,
    start_item: Option<String>,
}

impl PlaybackSession {
    pub fn new(playlist_id: impl Into<String>, start_item: Option<String>) -> Self {
        Self {
            id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
            playlist_id: playlist_id.into(),
            start_item: start_item.filter(|item| !item.is_empty()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn start_item(&self) -> Option<&str> {
        self.start_item.as_deref()
    }
}

/// Playlist reference pasted by a user: a bare id, a query string or a full link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub playlist_id: String,
    pub start_item: Option<String>,
}

impl PlaylistRef {
    /// Validated constructor; ids are limited to URL-safe characters.
    pub fn new(playlist_id: &str, start_item: Option<&str>) -> Option<Self> {
        let playlist_id = playlist_id.trim();
        is_valid_id(playlist_id).then(|| PlaylistRef {
            playlist_id: playlist_id.to_string(),
            start_item: start_item
                .map(str::trim)
                .filter(|item| is_valid_id(item))
                .map(str::to_string),
        })
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if let Ok(url) = Url::parse(input) {
            return Self::from_url(&url);
        }

        let looks_like_host = ["www.", "youtube.com", "m.youtube.com", "music.youtube.com", "youtu.be"]
            .iter()
            .any(|prefix| input.starts_with(prefix));
        if looks_like_host {
            return Url::parse(&format!("https://{input}"))
                .ok()
                .and_then(|url| Self::from_url(&url));
        }

        if input.contains('=') {
            let query = input.trim_start_matches('?');
            return Self::from_pairs(form_urlencoded::parse(query.as_bytes()), None);
        }

        Self::new(input, None)
    }

    fn from_url(url: &Url) -> Option<Self> {
        let short_link_item = match url.host_str() {
            Some("youtu.be") => url
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
            _ => None,
        };
        Self::from_pairs(url.query_pairs(), short_link_item)
    }

    fn from_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
        default_item: Option<String>,
    ) -> Option<Self> {
        let mut playlist_id = None;
        let mut start_item = default_item;
        for (key, value) in pairs {
            match key.as_ref() {
                "list" if is_valid_id(&value) => playlist_id = Some(value.into_owned()),
                "v" if is_valid_id(&value) => start_item = Some(value.into_owned()),
                _ => {}
            }
        }
        playlist_id.map(|playlist_id| PlaylistRef {
            playlist_id,
            start_item,
        })
    }

    pub fn into_session(self) -> PlaybackSession {
        PlaybackSession::new(self.playlist_id, self.start_item)
    }
}

fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
