//! Social preview tags for a shared tape.

use std::fmt::Write;

use crate::config::ShareConfig;

pub const PREVIEW_WIDTH: u32 = 1200;
pub const PREVIEW_HEIGHT: u32 = 630;

#[derive(Debug, Clone)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub page_url: String,
    pub current_video_title: Option<String>,
    pub site_name: String,
    pub site_origin: String,
}

impl PageMeta {
    pub fn new(
        share: &ShareConfig,
        title: impl Into<String>,
        description: impl Into<String>,
        image_url: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            image_url: image_url.into(),
            page_url: page_url.into(),
            current_video_title: None,
            site_name: share.site_name.clone(),
            site_origin: share.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_video_title(mut self, title: Option<&str>) -> Self {
        self.current_video_title = title.filter(|t| !t.is_empty()).map(str::to_string);
        self
    }

    pub fn full_title(&self) -> String {
        match &self.current_video_title {
            Some(video) => format!("{} - {} | {}", self.title, video, self.site_name),
            None => format!("{} | {}", self.title, self.site_name),
        }
    }

    pub fn absolute_image_url(&self) -> String {
        if self.image_url.starts_with("http") {
            self.image_url.clone()
        } else if self.image_url.starts_with('/') {
            format!("{}{}", self.site_origin, self.image_url)
        } else {
            format!("{}/{}", self.site_origin, self.image_url)
        }
    }

    /// OpenGraph and Twitter card tags, one per line.
    pub fn render_tags(&self) -> String {
        let title = self.full_title();
        let image = self.absolute_image_url();
        let alt = format!("Cassette tape for playlist: {}", self.title);
        let mut out = String::new();

        let _ = writeln!(out, "<title>{}</title>", escape(&title));
        push_meta(&mut out, "name", "description", &self.description);
        push_meta(&mut out, "property", "og:type", "music.playlist");
        push_meta(&mut out, "property", "og:site_name", &self.site_name);
        push_meta(&mut out, "property", "og:url", &self.page_url);
        push_meta(&mut out, "property", "og:title", &title);
        push_meta(&mut out, "property", "og:description", &self.description);
        push_meta(&mut out, "property", "og:image", &image);
        push_meta(&mut out, "property", "og:image:type", "image/png");
        push_meta(&mut out, "property", "og:image:width", &PREVIEW_WIDTH.to_string());
        push_meta(&mut out, "property", "og:image:height", &PREVIEW_HEIGHT.to_string());
        push_meta(&mut out, "property", "og:image:alt", &alt);
        push_meta(&mut out, "name", "twitter:card", "summary_large_image");
        push_meta(&mut out, "name", "twitter:title", &title);
        push_meta(&mut out, "name", "twitter:description", &self.description);
        push_meta(&mut out, "name", "twitter:image", &image);
        push_meta(&mut out, "name", "twitter:image:alt", &alt);
        let _ = writeln!(
            out,
            r#"<link rel="canonical" href="{}">"#,
            escape(&self.page_url)
        );
        out
    }
}

fn push_meta(out: &mut String, attr: &str, key: &str, content: &str) {
    let _ = writeln!(
        out,
        r#"<meta {attr}="{key}" content="{}">"#,
        escape(content)
    );
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> PageMeta {
        PageMeta::new(
            &ShareConfig::default(),
            "Road Trip",
            "A mixtape",
            "/og-image/2-6-4.png",
            "https://rockorpop.com/?cover=2&shell=6&bg=4",
        )
    }

    #[test]
    fn title_includes_video_when_known() {
        assert_eq!(meta().full_title(), "Road Trip | rockorpop.com");
        let with_video = meta().with_video_title(Some("Song A"));
        assert_eq!(with_video.full_title(), "Road Trip - Song A | rockorpop.com");
        assert_eq!(meta().with_video_title(Some("")).full_title(), "Road Trip | rockorpop.com");
    }

    #[test]
    fn relative_images_become_absolute() {
        assert_eq!(meta().absolute_image_url(), "https://rockorpop.com/og-image/2-6-4.png");
        let mut absolute = meta();
        absolute.image_url = "https://cdn.example.org/a.png".to_string();
        assert_eq!(absolute.absolute_image_url(), "https://cdn.example.org/a.png");
    }

    #[test]
    fn tags_escape_attribute_values() {
        let mut page = meta();
        page.title = r#"Rock "&" Roll"#.to_string();
        let tags = page.render_tags();
        assert!(tags.contains(r#"content="Rock &quot;&amp;&quot; Roll | rockorpop.com""#));
        assert!(tags.contains(r#"<meta property="og:image:width" content="1200">"#));
    }
}
