//! Dobles de prueba para el scheduler: un transporte y un resolvedor
//! controlables a mano desde los tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::audio::port::{FinishedCallback, PlaybackPort};
use crate::error::{PlaybackError, SourceError};
use crate::sources::{SourceResolver, Track};

/// Transporte de prueba: registra cada llamada y solo reporta finalización
/// cuando el test la dispara explícitamente.
#[derive(Default)]
pub struct StubPort {
    played: Mutex<Vec<String>>,
    pub stops: AtomicUsize,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub disconnects: AtomicUsize,
    pending: Mutex<Option<FinishedCallback>>,
}

impl StubPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Dispara el callback del track en curso, como lo haría el transporte
    /// real al terminar (o fallar) el stream. Devuelve false si no había
    /// nada sonando.
    pub fn finish_current(&self, error: Option<PlaybackError>) -> bool {
        let callback = self.pending.lock().take();
        match callback {
            Some(callback) => {
                callback(error);
                true
            }
            None => false,
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }
}

#[async_trait]
impl PlaybackPort for StubPort {
    async fn play(
        &self,
        stream_url: &str,
        on_finished: FinishedCallback,
    ) -> Result<(), PlaybackError> {
        self.played.lock().push(stream_url.to_owned());
        *self.pending.lock() = Some(on_finished);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        // Detener un track en curso dispara su finalización, igual que el
        // transporte real.
        self.finish_current(None);
    }

    async fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    async fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolvedor de prueba: la URL de streaming deriva del título. Los títulos
/// en `failing` fallan; los de `hanging` no resuelven nunca.
#[derive(Default)]
pub struct StubResolver {
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    pub stream_calls: AtomicUsize,
}

impl StubResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, title: &str) {
        self.failing.lock().insert(title.to_owned());
    }

    pub fn hang_for(&self, title: &str) {
        self.hanging.lock().insert(title.to_owned());
    }
}

#[async_trait]
impl SourceResolver for StubResolver {
    async fn resolve(&self, locator: &str) -> Result<Track, SourceError> {
        Ok(Track {
            title: locator.to_owned(),
            duration_secs: 0,
            video_url: format!("https://www.youtube.com/watch?v={locator}"),
        })
    }

    async fn stream_url(&self, track: &Track) -> Result<String, SourceError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        let hangs = self.hanging.lock().contains(&track.title);
        if hangs {
            std::future::pending::<()>().await;
        }

        let fails = self.failing.lock().contains(&track.title);
        if fails {
            return Err(SourceError::ResolutionFailed(format!(
                "fuente rota: {}",
                track.title
            )));
        }

        Ok(format!("stream://{}", track.title))
    }
}

pub fn track(title: &str, duration_secs: u64) -> Track {
    Track {
        title: title.to_owned(),
        duration_secs,
        video_url: format!("https://www.youtube.com/watch?v={title}"),
    }
}

/// Cede el control hasta que las tareas encadenadas (avances y callbacks de
/// finalización) terminen de asentarse.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
