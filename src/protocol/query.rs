use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classification of a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    #[default]
    Auto,
    YoutubeVideo,
    YoutubePlaylist,
    SoundcloudTrack,
    SoundcloudPlaylist,
    SpotifySong,
    SpotifyPlaylist,
    SpotifyAlbum,
    AppleMusicSong,
    AppleMusicPlaylist,
    AppleMusicAlbum,
    Arbitrary,
    File,
}

/// Regex based classifier turning raw queries into a [`QueryType`].
pub struct QueryResolver {
    youtube_playlist: Regex,
    youtube_video: Regex,
    soundcloud_playlist: Regex,
    soundcloud_track: Regex,
    spotify: Regex,
    apple_music: Regex,
    http: Regex,
    file: Regex,
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryResolver {
    pub fn new() -> Self {
        Self {
            youtube_playlist: Regex::new(
                r"^https?://(?:www\.|music\.|m\.)?youtube\.com/playlist\?(?:.*&)?list=[\w-]+",
            )
            .unwrap(),
            youtube_video: Regex::new(
                r"^https?://(?:(?:www\.|music\.|m\.)?youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|embed/)|youtu\.be/)[\w-]{11}",
            )
            .unwrap(),
            soundcloud_playlist: Regex::new(r"^https?://(?:www\.|m\.)?soundcloud\.com/[\w-]+/sets/[\w-]+")
                .unwrap(),
            soundcloud_track: Regex::new(r"^https?://(?:www\.|m\.)?soundcloud\.com/[\w-]+/[\w-]+")
                .unwrap(),
            spotify: Regex::new(
                r"^https?://open\.spotify\.com/(?:intl-[\w-]+/)?(?P<kind>track|playlist|album)/[A-Za-z0-9]+",
            )
            .unwrap(),
            apple_music: Regex::new(
                r"^https?://music\.apple\.com/[a-z]{2}/(?P<kind>album|playlist|song)/[^\s]+",
            )
            .unwrap(),
            http: Regex::new(r"^https?://\S+$").unwrap(),
            file: Regex::new(r"^(?:file://|/|\./|\.\./|[A-Za-z]:\\)").unwrap(),
        }
    }

    pub fn resolve(&self, query: &str) -> QueryType {
        let query = query.trim();

        if self.youtube_playlist.is_match(query) {
            return QueryType::YoutubePlaylist;
        }
        if self.youtube_video.is_match(query) {
            return QueryType::YoutubeVideo;
        }
        if self.soundcloud_playlist.is_match(query) {
            return QueryType::SoundcloudPlaylist;
        }
        if self.soundcloud_track.is_match(query) {
            return QueryType::SoundcloudTrack;
        }
        if let Some(caps) = self.spotify.captures(query) {
            return match &caps["kind"] {
                "playlist" => QueryType::SpotifyPlaylist,
                "album" => QueryType::SpotifyAlbum,
                _ => QueryType::SpotifySong,
            };
        }
        if let Some(caps) = self.apple_music.captures(query) {
            // `/album/<name>/<id>?i=<track>` links a single song inside an album.
            let kind = &caps["kind"];
            return if kind == "song" || (kind == "album" && query.contains("?i=")) {
                QueryType::AppleMusicSong
            } else if kind == "playlist" {
                QueryType::AppleMusicPlaylist
            } else {
                QueryType::AppleMusicAlbum
            };
        }
        if self.http.is_match(query) {
            return QueryType::Arbitrary;
        }
        if self.file.is_match(query) {
            return QueryType::File;
        }
        QueryType::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_known_links() {
        let r = QueryResolver::new();
        assert_eq!(
            r.resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            QueryType::YoutubeVideo
        );
        assert_eq!(r.resolve("https://youtu.be/dQw4w9WgXcQ"), QueryType::YoutubeVideo);
        assert_eq!(
            r.resolve("https://www.youtube.com/playlist?list=PL1234567890"),
            QueryType::YoutubePlaylist
        );
        assert_eq!(
            r.resolve("https://soundcloud.com/artist/sets/an-album"),
            QueryType::SoundcloudPlaylist
        );
        assert_eq!(
            r.resolve("https://soundcloud.com/artist/a-song"),
            QueryType::SoundcloudTrack
        );
        assert_eq!(
            r.resolve("https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy"),
            QueryType::SpotifyAlbum
        );
        assert_eq!(
            r.resolve("https://open.spotify.com/intl-de/track/6rqhFgbbKwnb9MLmUQDhG6"),
            QueryType::SpotifySong
        );
        assert_eq!(
            r.resolve("https://music.apple.com/us/album/x/1440857781?i=1440857790"),
            QueryType::AppleMusicSong
        );
        assert_eq!(
            r.resolve("https://music.apple.com/us/playlist/x/pl.u-123"),
            QueryType::AppleMusicPlaylist
        );
    }

    #[test]
    fn test_resolves_fallbacks() {
        let r = QueryResolver::new();
        assert_eq!(r.resolve("https://cdn.example.com/a.mp3"), QueryType::Arbitrary);
        assert_eq!(r.resolve("/music/song.flac"), QueryType::File);
        assert_eq!(r.resolve("file:///tmp/a.ogg"), QueryType::File);
        assert_eq!(r.resolve("never gonna give you up"), QueryType::Auto);
    }
}
