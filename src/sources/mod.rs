//! # Sources Module
//!
//! Turns free-text song requests into playable [`Track`] values.
//!
//! - [`query`]: pure cleanup of the raw request before it reaches a resolver
//! - [`ytdlp`]: the [`TrackResolver`] backed by the `yt-dlp` binary
//!
//! Resolution is network-bound and may take seconds, so it always happens
//! before the track is handed to a guild session, never while a session is
//! locked.

pub mod query;
pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;
use tracing::debug;

use crate::error::MusicResult;

pub use query::normalize;
pub use ytdlp::YtDlpResolver;

/// Colaborador que resuelve una búsqueda en una pista reproducible
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una búsqueda ya normalizada
    async fn resolve(&self, query: &str) -> MusicResult<Track>;

    /// Nombre del resolver para logs
    fn name(&self) -> &'static str;
}

/// Pista resuelta: valor inmutable con título y referencia reproducible
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    source_ref: String,
    duration: Option<Duration>,
    requested_by: Option<UserId>,
}

impl Track {
    pub fn new(title: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_ref: source_ref.into(),
            duration: None,
            requested_by: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    /// `true` si la referencia apunta a una página (YouTube, etc.) y no a un stream directo
    pub fn is_page_ref(&self) -> bool {
        is_page_url(&self.source_ref)
    }
}

/// Normaliza la búsqueda del usuario y la resuelve.
///
/// Si la normalización deja la búsqueda vacía (p. ej. "lyrics hd"), se usa el
/// texto original recortado. Las URLs se pasan tal cual.
pub async fn resolve_request(
    resolver: &dyn TrackResolver,
    raw_query: &str,
    requested_by: UserId,
) -> MusicResult<Track> {
    let raw = raw_query.trim();
    let query = if looks_like_url(raw) {
        raw.to_string()
    } else {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            raw.to_string()
        } else {
            normalized
        }
    };

    debug!("🔍 Resolviendo '{}' con {}", query, resolver.name());
    let track = resolver.resolve(&query).await?;
    Ok(track.with_requested_by(requested_by))
}

/// Detecta si la búsqueda ya es una URL
pub fn looks_like_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

fn is_page_url(reference: &str) -> bool {
    let Ok(parsed) = url::Url::parse(reference) else {
        return false;
    };

    matches!(
        parsed.host_str(),
        Some(
            "www.youtube.com"
                | "youtube.com"
                | "m.youtube.com"
                | "music.youtube.com"
                | "youtu.be"
                | "soundcloud.com"
                | "www.soundcloud.com"
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MusicError;
    use mockall::predicate::eq;

    #[test]
    fn test_page_ref_detection() {
        assert!(Track::new("a", "https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_page_ref());
        assert!(Track::new("a", "https://youtu.be/dQw4w9WgXcQ").is_page_ref());
        assert!(!Track::new("a", "https://rr3---sn.googlevideo.com/videoplayback?x=1").is_page_ref());
        assert!(!Track::new("a", "not a url").is_page_ref());
    }

    #[tokio::test]
    async fn test_resolve_request_normalizes_query() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_name().return_const("mock");
        resolver
            .expect_resolve()
            .with(eq("never gonna give you up"))
            .times(1)
            .returning(|q| Ok(Track::new(q, "https://youtu.be/dQw4w9WgXcQ")));

        let user = UserId::new(42);
        let track = resolve_request(&resolver, "  Never Gonna Give You Up (Official Video) [HD] ", user)
            .await
            .unwrap();

        assert_eq!(track.title(), "never gonna give you up");
        assert_eq!(track.requested_by(), Some(user));
    }

    #[tokio::test]
    async fn test_resolve_request_keeps_urls_and_noise_only_queries() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_name().return_const("mock");
        resolver
            .expect_resolve()
            .with(eq("https://www.youtube.com/watch?v=ABC"))
            .times(1)
            .returning(|q| Ok(Track::new("url", q)));
        resolver
            .expect_resolve()
            .with(eq("Lyrics HD"))
            .times(1)
            .returning(|q| Ok(Track::new("raw", q)));

        let user = UserId::new(1);
        let by_url = resolve_request(&resolver, "https://www.youtube.com/watch?v=ABC", user)
            .await
            .unwrap();
        assert_eq!(by_url.title(), "url");

        let noise_only = resolve_request(&resolver, " Lyrics HD ", user).await.unwrap();
        assert_eq!(noise_only.title(), "raw");
    }

    #[tokio::test]
    async fn test_resolve_request_surfaces_resolution_error() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_name().return_const("mock");
        resolver
            .expect_resolve()
            .returning(|q| Err(MusicError::resolution(q, "sin resultados")));

        let err = resolve_request(&resolver, "zzzz", UserId::new(1)).await.unwrap_err();
        assert!(matches!(err, MusicError::Resolution { .. }));
    }
}
