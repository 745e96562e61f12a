//! Round-trips the visible deck state through a page's query string.

use std::collections::HashMap;

use url::{form_urlencoded, Url};

use crate::{error::DeckResult, session::PlaylistRef};

pub const COVER_COUNT: u8 = 5;

pub const SHELL_COLORS: [&str; 10] = [
    "Blue",
    "Orange",
    "Dark Grey",
    "Light Grey",
    "Grass Green",
    "Cheerful Yellow",
    "Red",
    "Purple",
    "Pink",
    "Cream",
];

pub const BACKGROUNDS: [&str; 15] = [
    "Default",
    "Checkerboard",
    "Diagonal Stripes",
    "Pride",
    "Psychedelic",
    "Wood Grain",
    "Denim",
    "Neon Grid",
    "Notebook Paper",
    "Vinyl Records",
    "Soft Lavender",
    "Warm Cream",
    "Isometric Cubes",
    "Dot Grid",
    "Graph Paper",
];

pub const DEFAULT_LABELS: [&str; 10] = [
    "Mix Tape",
    "Summer Vibes",
    "Road Trip",
    "Chill Out",
    "Dance Party",
    "Study Session",
    "Workout Mix",
    "Late Night",
    "Good Times",
    "Memories",
];

const KEY_COVER: &str = "cover";
const KEY_SHELL: &str = "shell";
/// Older links spelled the shell key this way.
const KEY_SHELL_ALIAS: &str = "color";
const KEY_BACKGROUND: &str = "bg";
const KEY_LABEL: &str = "label";
const KEY_PLAYLIST: &str = "list";
const KEY_START_ITEM: &str = "v";

/// A ready-made tape look offered in the "example tapes" menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub cover: u8,
    pub shell: u8,
    pub background: u8,
    pub label: &'static str,
}

pub const PRESETS: [Preset; 5] = [
    Preset {
        name: "Summer Road Trip",
        cover: 2,
        shell: 6,
        background: 4,
        label: "Road Trip",
    },
    Preset {
        name: "Late Night Study",
        cover: 4,
        shell: 3,
        background: 9,
        label: "Study Session",
    },
    Preset {
        name: "Denim Dance Party",
        cover: 1,
        shell: 1,
        background: 7,
        label: "Dance Party",
    },
    Preset {
        name: "Neon Workout",
        cover: 5,
        shell: 8,
        background: 8,
        label: "Workout Mix",
    },
    Preset {
        name: "Cozy Memories",
        cover: 3,
        shell: 10,
        background: 12,
        label: "Memories",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareState {
    /// 1-based, up to [`COVER_COUNT`].
    pub cover: u8,
    /// 1-based index into [`SHELL_COLORS`].
    pub shell: u8,
    /// 1-based index into [`BACKGROUNDS`].
    pub background: u8,
    pub label: String,
    pub playlist: Option<String>,
    pub start_item: Option<String>,
}

impl ShareState {
    pub fn random(rng: &mut fastrand::Rng) -> Self {
        let mut state = Self::from_preset(&PRESETS[0]);
        state.randomize(rng);
        state
    }

    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            cover: preset.cover,
            shell: preset.shell,
            background: preset.background,
            label: preset.label.to_string(),
            playlist: None,
            start_item: None,
        }
    }

    pub fn random_preset(rng: &mut fastrand::Rng) -> Self {
        Self::from_preset(&PRESETS[rng.usize(..PRESETS.len())])
    }

    /// Rerolls the look and label; the playlist is left alone.
    pub fn randomize(&mut self, rng: &mut fastrand::Rng) {
        self.cover = random_cover(rng);
        self.shell = random_shell(rng);
        self.background = random_background(rng);
        self.label = random_label(rng);
    }

    pub fn apply_preset(&mut self, preset: &Preset) {
        self.cover = preset.cover;
        self.shell = preset.shell;
        self.background = preset.background;
        self.label = preset.label.to_string();
    }

    pub fn set_playlist(&mut self, playlist: Option<PlaylistRef>) {
        match playlist {
            Some(playlist) => {
                self.playlist = Some(playlist.playlist_id);
                self.start_item = playlist.start_item;
            }
            None => {
                self.playlist = None;
                self.start_item = None;
            }
        }
    }

    pub fn shell_name(&self) -> &'static str {
        SHELL_COLORS[usize::from(self.shell.clamp(1, SHELL_COLORS.len() as u8) - 1)]
    }

    pub fn background_name(&self) -> &'static str {
        BACKGROUNDS[usize::from(self.background.clamp(1, BACKGROUNDS.len() as u8) - 1)]
    }

    /// Pre-rendered social preview image for this look, relative to the site root.
    pub fn preview_image_path(&self) -> String {
        format!(
            "/og-image/{}-{}-{}.png",
            self.cover, self.shell, self.background
        )
    }

    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer
            .append_pair(KEY_COVER, &self.cover.to_string())
            .append_pair(KEY_SHELL, &self.shell.to_string())
            .append_pair(KEY_BACKGROUND, &self.background.to_string())
            .append_pair(KEY_LABEL, &self.label);
        if let Some(playlist) = &self.playlist {
            serializer.append_pair(KEY_PLAYLIST, playlist);
        }
        if let Some(item) = &self.start_item {
            serializer.append_pair(KEY_START_ITEM, item);
        }
        serializer.finish()
    }

    pub fn to_url(&self, base: &str) -> DeckResult<Url> {
        let mut url = Url::parse(base)?;
        url.set_query(Some(&self.to_query()));
        Ok(url)
    }

    /// Decodes a query string. Missing or malformed fields fall back to random
    /// values; with no look fields at all a random preset is used.
    pub fn from_query(query: &str, rng: &mut fastrand::Rng) -> Self {
        let query = query.trim().trim_start_matches('?');
        let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let has_look = [KEY_COVER, KEY_SHELL, KEY_SHELL_ALIAS, KEY_BACKGROUND, KEY_LABEL]
            .iter()
            .any(|key| params.contains_key(*key));

        let mut state = if has_look {
            Self {
                cover: parse_index(params.get(KEY_COVER), COVER_COUNT)
                    .unwrap_or_else(|| random_cover(rng)),
                shell: parse_index(
                    params.get(KEY_SHELL).or_else(|| params.get(KEY_SHELL_ALIAS)),
                    SHELL_COLORS.len() as u8,
                )
                    .unwrap_or_else(|| random_shell(rng)),
                background: parse_index(params.get(KEY_BACKGROUND), BACKGROUNDS.len() as u8)
                    .unwrap_or_else(|| random_background(rng)),
                label: params
                    .get(KEY_LABEL)
                    .cloned()
                    .unwrap_or_else(|| random_label(rng)),
                playlist: None,
                start_item: None,
            }
        } else {
            Self::random_preset(rng)
        };

        if let Some(list) = params.get(KEY_PLAYLIST) {
            let item = params.get(KEY_START_ITEM).map(String::as_str);
            state.set_playlist(PlaylistRef::new(list, item));
        }

        state
    }

    /// Accepts a full page URL or a bare query string.
    pub fn from_link(input: &str, rng: &mut fastrand::Rng) -> Self {
        match Url::parse(input.trim()) {
            Ok(url) => Self::from_query(url.query().unwrap_or_default(), rng),
            Err(_) => Self::from_query(input, rng),
        }
    }
}

fn parse_index(raw: Option<&String>, max: u8) -> Option<u8> {
    raw.and_then(|value| value.trim().parse::<u8>().ok())
        .filter(|value| (1..=max).contains(value))
}

fn random_cover(rng: &mut fastrand::Rng) -> u8 {
    rng.u8(1..=COVER_COUNT)
}

fn random_shell(rng: &mut fastrand::Rng) -> u8 {
    rng.u8(1..=SHELL_COLORS.len() as u8)
}

fn random_background(rng: &mut fastrand::Rng) -> u8 {
    rng.u8(1..=BACKGROUNDS.len() as u8)
}

fn random_label(rng: &mut fastrand::Rng) -> String {
    DEFAULT_LABELS[rng.usize(..DEFAULT_LABELS.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(7)
    }

    #[test]
    fn query_restores_every_field() {
        let state = ShareState {
            cover: 3,
            shell: 9,
            background: 14,
            label: "Rock & Roll, vol. 2".to_string(),
            playlist: Some("PL_abc-123".to_string()),
            start_item: Some("dQw4w9WgXcQ".to_string()),
        };
        let query = state.to_query();
        assert!(query.starts_with("cover=3&shell=9&bg=14&"));
        assert!(query.contains("label=Rock+%26+Roll%2C+vol.+2"));
        assert_eq!(ShareState::from_query(&query, &mut rng()), state);
    }

    #[test]
    fn out_of_range_fields_fall_back_to_valid_values() {
        let state = ShareState::from_query("cover=9&color=0&bg=abc&label=Hi", &mut rng());
        assert!((1..=COVER_COUNT).contains(&state.cover));
        assert!((1..=10).contains(&state.shell));
        assert!((1..=15).contains(&state.background));
        assert_eq!(state.label, "Hi");
    }

    #[test]
    fn empty_query_uses_a_preset() {
        let state = ShareState::from_query("", &mut rng());
        assert!(PRESETS.iter().any(|preset| preset.label == state.label
            && preset.cover == state.cover
            && preset.shell == state.shell));
        assert_eq!(state.playlist, None);
    }

    #[test]
    fn playlist_only_link_keeps_playlist_on_preset() {
        let state = ShareState::from_query("?list=PL42", &mut rng());
        assert_eq!(state.playlist.as_deref(), Some("PL42"));
        assert_eq!(state.start_item, None);
    }

    #[test]
    fn invalid_playlist_is_dropped() {
        let state = ShareState::from_query("cover=1&list=%3Cscript%3E", &mut rng());
        assert_eq!(state.playlist, None);
    }

    #[test]
    fn url_embeds_the_query() {
        let state = ShareState::from_preset(&PRESETS[1]);
        let url = state.to_url("https://rockorpop.com/").unwrap();
        assert_eq!(url.query(), Some(state.to_query().as_str()));
        let restored = ShareState::from_link(url.as_str(), &mut rng());
        assert_eq!(restored, state);
    }

    #[test]
    fn randomize_keeps_playlist() {
        let mut state = ShareState::from_query("list=PL1", &mut rng());
        state.randomize(&mut rng());
        assert_eq!(state.playlist.as_deref(), Some("PL1"));
        assert!(DEFAULT_LABELS.contains(&state.label.as_str()));
    }

    #[test]
    fn legacy_color_key_still_decodes() {
        let state = ShareState::from_query("cover=2&color=7&bg=3&label=Hi", &mut rng());
        assert_eq!(state.shell, 7);
        let state = ShareState::from_query("shell=4&color=7&label=Hi", &mut rng());
        assert_eq!(state.shell, 4);
    }

    #[test]
    fn preview_image_names_cover_shell_and_background() {
        let state = ShareState::from_preset(&PRESETS[0]);
        assert_eq!(state.preview_image_path(), "/og-image/2-6-4.png");
    }

    #[test]
    fn names_follow_indices() {
        let state = ShareState::from_preset(&PRESETS[0]);
        assert_eq!(state.shell_name(), "Cheerful Yellow");
        assert_eq!(state.background_name(), "Pride");
    }
}
