use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use crate::error::PlaybackError;

/// Callback de finalización registrado al arrancar un track. Se invoca
/// exactamente una vez, con el error de transporte si lo hubo.
pub type FinishedCallback = Box<dyn FnOnce(Option<PlaybackError>) + Send + 'static>;

/// Abstracción sobre una conexión de voz. Cada sesión es dueña exclusiva
/// de su puerto; ningún otro componente lo toca directamente.
#[async_trait]
pub trait PlaybackPort: Send + Sync {
    /// Arranca la reproducción de `stream_url` y registra el callback de
    /// finalización para ese track.
    async fn play(&self, stream_url: &str, on_finished: FinishedCallback)
        -> Result<(), PlaybackError>;

    /// Detiene el track en curso. Seguro de llamar sin nada sonando.
    async fn stop(&self);

    async fn pause(&self);

    async fn resume(&self);

    /// Cierra la conexión de voz.
    async fn disconnect(&self);
}

/// Puerto de reproducción sobre una `Call` de songbird. El audio se sirve
/// como input HTTP directo a partir de la URL de streaming ya resuelta.
pub struct SongbirdPort {
    call: Arc<AsyncMutex<Call>>,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdPort {
    pub fn new(call: Arc<AsyncMutex<Call>>, http: reqwest::Client) -> Self {
        Self {
            call,
            http,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PlaybackPort for SongbirdPort {
    async fn play(
        &self,
        stream_url: &str,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError> {
        let input = Input::from(HttpRequest::new(self.http.clone(), stream_url.to_owned()));

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        // Un solo notifier compartido entre End y Error: el primero que
        // dispare consume el callback.
        let notifier = TrackEndNotifier {
            hook: Arc::new(Mutex::new(Some(on_finished))),
        };

        if let Err(e) = handle.add_event(Event::Track(TrackEvent::End), notifier.clone()) {
            let _ = handle.stop();
            return Err(PlaybackError(e.to_string()));
        }
        if let Err(e) = handle.add_event(Event::Track(TrackEvent::Error), notifier) {
            let _ = handle.stop();
            return Err(PlaybackError(e.to_string()));
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        let handle = self.current.lock().take();
        if let Some(handle) = handle {
            let _ = handle.stop();
        }
    }

    async fn pause(&self) {
        if let Some(handle) = self.current.lock().as_ref() {
            let _ = handle.pause();
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.current.lock().as_ref() {
            let _ = handle.play();
        }
    }

    async fn disconnect(&self) {
        self.current.lock().take();

        let mut call = self.call.lock().await;
        if let Err(e) = call.leave().await {
            warn!("⚠️ Error al salir del canal de voz: {e}");
        }
    }
}

#[derive(Clone)]
struct TrackEndNotifier {
    hook: Arc<Mutex<Option<FinishedCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(PlaybackError(e.to_string())),
                _ => None,
            }),
            _ => None,
        };

        let callback = self.hook.lock().take();
        if let Some(callback) = callback {
            callback(error);
        }

        None
    }
}
