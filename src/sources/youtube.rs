use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{SourceResolver, Track};
use crate::error::SourceError;

const VALID_HOSTNAMES: [&str; 3] = ["youtube.com", "www.youtube.com", "m.youtube.com"];

/// Extrae el id de video de una URL de Youtube tipo "watch".
///
/// Solo se aceptan URLs cuyo host sea de Youtube, con path exactamente
/// `/watch` y un parámetro `v` no vacío. Si `v` aparece repetido gana la
/// primera ocurrencia.
pub fn parse_video_id(locator: &str) -> Result<String, SourceError> {
    let parsed = Url::parse(locator).map_err(|_| SourceError::InvalidLocator("url mal formada"))?;

    let host = parsed
        .host_str()
        .ok_or(SourceError::InvalidLocator("hostname ausente"))?;
    if !VALID_HOSTNAMES.contains(&host) {
        return Err(SourceError::InvalidLocator("hostname inválido"));
    }

    if parsed.path() != "/watch" {
        return Err(SourceError::InvalidLocator("path inválido"));
    }

    parsed
        .query_pairs()
        .find(|(key, _)| key.as_ref() == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or(SourceError::InvalidLocator("id de video ausente"))
}

/// Resolvedor basado en yt-dlp: metadata y URLs de streaming se obtienen
/// invocando el binario con `--dump-json`.
pub struct YtDlpResolver;

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    url: Option<String>,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self
    }

    async fn dump_info(&self, video_url: &str) -> Result<YtDlpInfo, SourceError> {
        debug!("📊 Obteniendo info de: {}", video_url);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                "--format",
                "bestaudio/best",
                video_url,
            ])
            .output()
            .await
            .map_err(|e| SourceError::ResolutionFailed(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::ResolutionFailed(format!(
                "yt-dlp: {}",
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| SourceError::ResolutionFailed(format!("respuesta de yt-dlp inválida: {e}")))
    }
}

#[async_trait]
impl SourceResolver for YtDlpResolver {
    async fn resolve(&self, locator: &str) -> Result<Track, SourceError> {
        let video_id = parse_video_id(locator)?;
        let video_url = format!("https://www.youtube.com/watch?v={video_id}");

        let details = self.dump_info(&video_url).await?;
        info!("🔍 Resuelto {video_id}: {}", details.title);

        Ok(Track {
            title: details.title,
            duration_secs: details.duration.unwrap_or(0.0).round() as u64,
            video_url,
        })
    }

    async fn stream_url(&self, track: &Track) -> Result<String, SourceError> {
        // Se vuelve a consultar yt-dlp en el momento de reproducir: las
        // URLs de streaming que devuelve expiran.
        let details = self.dump_info(&track.video_url).await?;

        details.url.ok_or_else(|| {
            SourceError::ResolutionFailed("yt-dlp no devolvió url de streaming".into())
        })
    }
}
