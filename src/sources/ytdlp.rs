use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use super::{looks_like_url, Track, TrackResolver};
use crate::error::{MusicError, MusicResult};

const UNKNOWN_TITLE: &str = "Unknown Title";

/// Resolver que delega la búsqueda en el binario `yt-dlp`
pub struct YtDlpResolver {
    binary: String,
    timeout: Duration,
}

/// Subconjunto de la salida `--dump-json` de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, target: &str) -> Result<Vec<u8>, String> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args([
            "--dump-json",
            "--format",
            "bestaudio/best",
            "--default-search",
            "ytsearch",
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            "--socket-timeout",
            "15",
        ]);
        cmd.arg(target);
        cmd.kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("no se pudo ejecutar yt-dlp: {e}")),
            Err(_) => return Err(format!("timeout tras {}s", self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("yt-dlp falló: {}", stderr.trim()));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> MusicResult<Track> {
        let target = if looks_like_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };

        info!("🔍 Búsqueda yt-dlp: {}", target);

        let stdout = self.run(&target).await.map_err(|reason| {
            warn!("❌ yt-dlp no resolvió '{}': {}", query, reason);
            MusicError::resolution(query, reason)
        })?;

        parse_first_entry(&stdout).map_err(|reason| MusicError::resolution(query, reason))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Toma la primera entrada JSON de la salida y la convierte en [`Track`].
///
/// Se prefiere la URL de la página (estable); si no existe, la URL directa
/// del stream siempre que sea http(s).
fn parse_first_entry(stdout: &[u8]) -> Result<Track, String> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| "sin resultados".to_string())?;

    let entry: YtDlpEntry =
        serde_json::from_str(line).map_err(|e| format!("salida de yt-dlp inválida: {e}"))?;

    let source_ref = [entry.webpage_url, entry.url]
        .into_iter()
        .flatten()
        .find(|candidate| looks_like_url(candidate))
        .ok_or_else(|| "no hay URL reproducible".to_string())?;

    let title = entry
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let mut track = Track::new(title, source_ref);
    if let Some(secs) = entry.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(secs));
    }

    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefers_page_url() {
        let out = br#"{"title":"Never Gonna Give You Up","webpage_url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ","url":"https://rr1.googlevideo.com/videoplayback?id=1","duration":213.0}"#;
        let track = parse_first_entry(out).unwrap();

        assert_eq!(track.title(), "Never Gonna Give You Up");
        assert_eq!(track.source_ref(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(track.duration(), Some(Duration::from_secs(213)));
    }

    #[test]
    fn test_parse_falls_back_to_stream_url_and_unknown_title() {
        let out = b"\n{\"url\":\"https://cdn.example.com/a.mp3\"}\n";
        let track = parse_first_entry(out).unwrap();

        assert_eq!(track.title(), UNKNOWN_TITLE);
        assert_eq!(track.source_ref(), "https://cdn.example.com/a.mp3");
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn test_parse_rejects_unplayable_output() {
        assert!(parse_first_entry(b"").is_err());
        assert!(parse_first_entry(b"not json").is_err());
        assert!(parse_first_entry(br#"{"title":"x","url":"rtmp://live/stream"}"#).is_err());
    }
}
