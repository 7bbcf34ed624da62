use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::ChannelId;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::audio::port::{FinishedCallback, PlaybackPort};
use crate::audio::registry::SessionRegistry;
use crate::error::{PlaybackError, SessionError};
use crate::sources::{SourceResolver, Track};

/// Vista de solo lectura de la cola, para el comando de info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
}

/// Estado mutable de la sesión. Toda mutación de la cola pasa por este
/// lock; las secciones críticas son cortas y nunca cruzan un await.
struct SessionState {
    queue: VecDeque<Track>,
    /// Hay una transición de track en vuelo. A lo sumo un `play` en vuelo
    /// por conexión: los backends de voz se portan mal con llamadas
    /// solapadas sobre un mismo handle.
    pending_advance: bool,
    /// Se incrementa cuando `stop` vacía la cola por la fuerza; un avance
    /// en vuelo lo compara antes de arrancar para no reproducir un track
    /// que ya fue descartado.
    epoch: u64,
    /// El desmontaje es terminal: una vez cerrada, ninguna operación
    /// vuelve a observar ni mutar la sesión.
    closed: bool,
}

/// Sesión de reproducción de un canal de voz: la cola, su conexión
/// exclusiva y la máquina de estados que decide qué suena después.
///
/// Los comandos y el callback de finalización del transporte llegan desde
/// contextos de ejecución distintos; la disciplina es un solo escritor por
/// sesión (el lock de `SessionState`), sin ningún lock compartido entre
/// canales distintos.
pub struct Session {
    channel_id: ChannelId,
    port: Arc<dyn PlaybackPort>,
    resolver: Arc<dyn SourceResolver>,
    resolve_timeout: Duration,
    registry: Weak<SessionRegistry>,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        channel_id: ChannelId,
        port: Arc<dyn PlaybackPort>,
        resolver: Arc<dyn SourceResolver>,
        resolve_timeout: Duration,
        registry: Weak<SessionRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel_id,
            port,
            resolver,
            resolve_timeout,
            registry,
            state: Mutex::new(SessionState {
                queue: VecDeque::new(),
                pending_advance: false,
                epoch: 0,
                closed: false,
            }),
        })
    }

    /// Agrega un track al final de la cola. Si la cola estaba vacía dispara
    /// el avance en segundo plano; no espera a que arranque la reproducción.
    pub fn enqueue(self: &Arc<Self>, track: Track) -> Result<(), SessionError> {
        let start_playback = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SessionError::Closed);
            }
            state.queue.push_back(track.clone());
            state.queue.len() == 1 && !state.pending_advance
        };

        info!("➕ Encolado en canal {}: {}", self.channel_id, track.title);

        if start_playback {
            let session = Arc::clone(self);
            tokio::spawn(async move { session.advance().await });
        }

        Ok(())
    }

    /// Salta el track actual y los `count - 1` siguientes, preservando el
    /// orden de los sobrevivientes. `count == 0` no muta nada.
    pub async fn skip(&self, count: usize) -> Result<(), SessionError> {
        if count == 0 {
            return Err(SessionError::InvalidSkipCount);
        }

        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SessionError::Closed);
            }
            let upto = count.min(state.queue.len());
            if upto > 1 {
                state.queue.drain(1..upto);
            }
        }

        info!("⏭️ Saltando {count} canciones en canal {}", self.channel_id);

        // Detener el track actual dispara su callback de finalización, que
        // arranca la nueva cabeza de la cola.
        self.port.stop().await;
        Ok(())
    }

    /// Vacía la cola y detiene la reproducción. El callback de finalización
    /// resultante observa la cola vacía y desmonta la sesión.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.queue.clear();
            state.epoch += 1;
        }

        info!("⏹️ Cola del canal {} vaciada", self.channel_id);
        self.port.stop().await;
    }

    pub async fn pause(&self) {
        self.port.pause().await;
    }

    pub async fn resume(&self) {
        self.port.resume().await;
    }

    /// Vista de la cola: track actual y hasta `preview` títulos siguientes.
    pub fn snapshot(&self, preview: usize) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            current: state.queue.front().cloned(),
            upcoming: state.queue.iter().skip(1).take(preview).cloned().collect(),
        }
    }

    /// Garantiza que la cabeza de la cola esté sonando o por sonar. Si ya
    /// hay una transición en vuelo no hace nada.
    async fn advance(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.closed || state.pending_advance || state.queue.is_empty() {
                return;
            }
            state.pending_advance = true;
        }

        loop {
            let next = {
                let mut state = self.state.lock();
                match state.queue.front() {
                    Some(track) => Some((track.clone(), state.epoch)),
                    None => {
                        // La cola se vació mientras avanzábamos y nadie más
                        // queda para desmontar: decidirlo en la misma sección
                        // crítica que observa la cola vacía.
                        state.pending_advance = false;
                        state.closed = true;
                        None
                    }
                }
            };

            let Some((track, epoch)) = next else {
                self.teardown().await;
                return;
            };

            // Silenciar lo que quede sonando antes de arrancar el siguiente.
            self.port.stop().await;

            let resolved = timeout(self.resolve_timeout, self.resolver.stream_url(&track)).await;
            let stream_url = match resolved {
                Ok(Ok(url)) => url,
                Ok(Err(e)) => {
                    warn!("❌ No se pudo refrescar la fuente de {}: {e}", track.title);
                    self.drop_failed_head(&track);
                    continue;
                }
                Err(_) => {
                    warn!("⏰ Resolución de {} superó el tiempo límite", track.title);
                    self.drop_failed_head(&track);
                    continue;
                }
            };

            // Revalidar antes de arrancar: un `stop` pudo vaciar la cola
            // durante la resolución.
            {
                let mut state = self.state.lock();
                if state.closed {
                    state.pending_advance = false;
                    return;
                }
                if state.epoch != epoch || state.queue.front() != Some(&track) {
                    continue;
                }
            }

            let hook = self.completion_hook(track.clone());
            match self.port.play(&stream_url, hook).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en canal {}: {}", self.channel_id, track.title);

                    let stale = {
                        let mut state = self.state.lock();
                        state.pending_advance = false;
                        state.closed || state.epoch != epoch
                    };
                    if stale {
                        // La cola fue vaciada mientras arrancaba: detener el
                        // track fuerza su callback y resincroniza.
                        self.port.stop().await;
                    }
                    return;
                }
                Err(e) => {
                    warn!("❌ El transporte rechazó {}: {e}", track.title);
                    self.drop_failed_head(&track);
                    continue;
                }
            }
        }
    }

    /// Callback que el transporte invoca al terminar el track, desde un
    /// contexto que la sesión no controla; el trabajo real se despacha a
    /// una tarea propia.
    fn completion_hook(self: &Arc<Self>, track: Track) -> FinishedCallback {
        let session = Arc::clone(self);
        Box::new(move |error| {
            tokio::spawn(session.on_playback_finished(track, error));
        })
    }

    async fn on_playback_finished(self: Arc<Self>, finished: Track, error: Option<PlaybackError>) {
        if let Some(e) = error {
            // Un stream malo no mata la cola del canal: se trata igual que
            // una finalización normal.
            warn!("⚠️ {} terminó con error de transporte: {e}", finished.title);
        }

        enum Next {
            Advance,
            Teardown,
            Nothing,
        }

        let next = {
            let mut state = self.state.lock();
            if state.closed {
                Next::Nothing
            } else {
                if state.queue.front() == Some(&finished) {
                    state.queue.pop_front();
                }
                if !state.queue.is_empty() {
                    Next::Advance
                } else if state.pending_advance {
                    // Hay un avance en vuelo; él decide qué sigue.
                    Next::Nothing
                } else {
                    state.closed = true;
                    Next::Teardown
                }
            }
        };

        match next {
            Next::Advance => self.advance().await,
            Next::Teardown => self.teardown().await,
            Next::Nothing => {}
        }
    }

    fn drop_failed_head(&self, track: &Track) {
        let mut state = self.state.lock();
        if state.queue.front() == Some(track) {
            state.queue.pop_front();
        }
    }

    /// Desconecta y elimina la sesión del registro. Solo se llega acá desde
    /// la sección crítica que marcó `closed`, así que corre una sola vez.
    async fn teardown(self: &Arc<Self>) {
        info!("👋 Sesión del canal {} desmontada", self.channel_id);

        self.port.disconnect().await;

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.channel_id, self);
        }
    }
}
