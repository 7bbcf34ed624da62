use thiserror::Error;

/// Errores de resolución de fuentes (locator → track, track → stream).
#[derive(Debug, Error)]
pub enum SourceError {
    /// El locator no es una URL de video válida. Error de entrada del
    /// usuario, se reporta con un mensaje fijo.
    #[error("url de video inválida: {0}")]
    InvalidLocator(&'static str),

    /// El resolvedor externo falló. Se reporta genéricamente al usuario
    /// y se loguea con detalle.
    #[error("fallo al resolver la fuente: {0}")]
    ResolutionFailed(String),
}

/// Errores de operaciones sobre una sesión.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// La sesión ya inició su desmontaje; ninguna operación posterior
    /// puede observarla ni mutarla.
    #[error("la sesión está siendo desmontada")]
    Closed,

    /// Cantidad de canciones a saltar fuera de rango. No muta la cola.
    #[error("cantidad de canciones a saltar inválida")]
    InvalidSkipCount,
}

/// Error del transporte de audio. Entregado por el callback de
/// finalización; se trata como una finalización normal para que un
/// stream malo no mate la cola del canal.
#[derive(Debug, Error)]
#[error("error del transporte de audio: {0}")]
pub struct PlaybackError(pub String);

/// Fallo al abrir la conexión de voz. No se instala ninguna sesión.
#[derive(Debug, Error)]
#[error("no se pudo conectar al canal de voz: {0}")]
pub struct ConnectError(pub String);
