pub mod youtube;

use async_trait::async_trait;

pub use youtube::YtDlpResolver;

use crate::error::SourceError;

/// Descriptor de una canción ya resuelta: lo único que la cola necesita
/// conocer. Es un valor sin identidad propia; una misma canción puede
/// aparecer varias veces en la cola.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub duration_secs: u64,
    /// URL canónica del video. La URL de streaming se obtiene aparte y en
    /// el momento de reproducir, porque expira.
    pub video_url: String,
}

/// Resolvedor de fuentes: valida locators y produce tracks reproducibles.
///
/// Las dos operaciones son llamadas de red y pueden tardar; los llamadores
/// las acotan con un timeout para que un link malo no trabe la cola.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Valida el locator y obtiene la metadata del video.
    async fn resolve(&self, locator: &str) -> Result<Track, SourceError>;

    /// Obtiene una URL de streaming fresca para el track.
    async fn stream_url(&self, track: &Track) -> Result<String, SourceError>;
}
