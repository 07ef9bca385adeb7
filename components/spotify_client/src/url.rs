// components/spotify_client/src/url.rs
use ::url::Url;

/// The kind of content a URL points at. Classification walks the URL's path
/// segments rather than substring-matching the whole string, so a playlist
/// whose id happens to contain "track" is still a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Track,
    Playlist,
    Album,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Track => "track",
            ContentKind::Playlist => "playlist",
            ContentKind::Album => "album",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "track" => Some(ContentKind::Track),
            "playlist" => Some(ContentKind::Playlist),
            "album" => Some(ContentKind::Album),
            _ => None,
        }
    }
}

/// A classified content URL: its kind plus the upstream id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: String,
}

impl ContentRef {
    /// Canonical form used for resolver lookups, query parameters dropped.
    pub fn canonical_url(&self) -> String {
        format!("https://open.spotify.com/{}/{}", self.kind.as_str(), self.id)
    }
}

/// Extract kind and id from a content URL's path segments. Locale prefixes
/// such as `/intl-es/track/...` are skipped. Returns `None` for anything
/// that is not a track, playlist, or album link.
pub fn classify(input: &str) -> Option<ContentRef> {
    let parsed = Url::parse(input.trim()).ok()?;
    let mut segments = parsed.path_segments()?;

    while let Some(segment) = segments.next() {
        if let Some(kind) = ContentKind::from_segment(segment) {
            let id: String = segments
                .next()?
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if id.is_empty() {
                return None;
            }
            return Some(ContentRef { kind, id });
        }
    }
    None
}

/// Reduce any resolver input to the canonical `https://<host>/<kind>/<id>`
/// form. Input that does not match the expected shape passes through with
/// only its query string stripped. Idempotent.
pub fn normalize(input: &str) -> String {
    match classify(input) {
        Some(reference) => reference.canonical_url(),
        None => {
            let trimmed = input.trim();
            match trimmed.split_once('?') {
                Some((base, _)) => base.to_string(),
                None => trimmed.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn classifies_all_three_kinds() {
        let track = classify("https://open.spotify.com/track/ABC123").unwrap();
        assert_eq!(track.kind, ContentKind::Track);
        assert_eq!(track.id, "ABC123");

        let playlist = classify("https://open.spotify.com/playlist/37i9dQZF1DX").unwrap();
        assert_eq!(playlist.kind, ContentKind::Playlist);

        let album = classify("https://open.spotify.com/album/6vc9OTcyd3").unwrap();
        assert_eq!(album.kind, ContentKind::Album);
    }

    #[test]
    fn strips_query_parameters() {
        let reference = classify("https://open.spotify.com/track/ABC123?si=xyz").unwrap();
        assert_eq!(
            reference.canonical_url(),
            "https://open.spotify.com/track/ABC123"
        );
    }

    #[test]
    fn skips_locale_prefix() {
        let reference = classify("https://open.spotify.com/intl-es/track/ABC123").unwrap();
        assert_eq!(reference.kind, ContentKind::Track);
        assert_eq!(reference.id, "ABC123");
    }

    #[test]
    fn playlist_id_containing_track_is_still_a_playlist() {
        let reference = classify("https://open.spotify.com/playlist/xtrackx123").unwrap();
        assert_eq!(reference.kind, ContentKind::Playlist);
        assert_eq!(reference.id, "xtrackx123");
    }

    #[test]
    fn rejects_unrecognized_urls() {
        assert_matches!(classify("https://example.com/watch?v=abc"), None);
        assert_matches!(classify("not a url at all"), None);
        assert_matches!(classify("https://open.spotify.com/track/"), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        let urls = [
            "https://open.spotify.com/track/ABC123?si=xyz",
            "https://open.spotify.com/playlist/37i9dQZF1DX?si=a&utm=b",
            "https://open.spotify.com/album/6vc9OTcyd3",
            "https://example.com/other?query=1",
        ];
        for url in urls {
            let once = normalize(url);
            assert_eq!(normalize(&once), once, "normalize not idempotent for {url}");
        }
    }

    #[test]
    fn normalize_strips_query_from_unrecognized_input() {
        assert_eq!(
            normalize("https://example.com/other?query=1"),
            "https://example.com/other"
        );
    }
}
