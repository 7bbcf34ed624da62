use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serenity::model::id::ChannelId;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::audio::port::PlaybackPort;
use crate::audio::session::Session;
use crate::error::ConnectError;
use crate::sources::SourceResolver;

/// Mapa global canal → sesión. Es la única estructura compartida entre
/// sesiones y su sincronización es independiente de los locks internos de
/// cada una: nunca se sostiene un lock de sesión mientras se toca el mapa.
pub struct SessionRegistry {
    sessions: DashMap<ChannelId, Arc<Session>>,
    /// Candados de creación por canal: dos `play` simultáneos sobre un
    /// canal sin sesión deben abrir una sola conexión de voz.
    connecting: DashMap<ChannelId, Arc<AsyncMutex<()>>>,
    resolver: Arc<dyn SourceResolver>,
    resolve_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(resolver: Arc<dyn SourceResolver>, resolve_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            connecting: DashMap::new(),
            resolver,
            resolve_timeout,
        })
    }

    /// Búsqueda sin creación.
    pub fn get(&self, channel_id: ChannelId) -> Option<Arc<Session>> {
        self.sessions.get(&channel_id).map(|s| s.value().clone())
    }

    /// Devuelve la sesión del canal, creándola si no existe. `connect` abre
    /// la conexión de voz y solo se invoca si hay que crear; si falla no se
    /// instala ninguna sesión.
    pub async fn get_or_create<F, Fut>(
        self: &Arc<Self>,
        channel_id: ChannelId,
        connect: F,
    ) -> Result<Arc<Session>, ConnectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PlaybackPort>, ConnectError>>,
    {
        if let Some(existing) = self.get(channel_id) {
            return Ok(existing);
        }

        let gate = self
            .connecting
            .entry(channel_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        // Otro comando pudo ganarnos la creación mientras esperábamos el
        // candado.
        if let Some(existing) = self.get(channel_id) {
            return Ok(existing);
        }

        let port = connect().await?;
        let session = Session::new(
            channel_id,
            port,
            Arc::clone(&self.resolver),
            self.resolve_timeout,
            Arc::downgrade(self),
        );
        self.sessions.insert(channel_id, Arc::clone(&session));

        info!("🔊 Sesión creada para canal {channel_id}");
        Ok(session)
    }

    /// Elimina la entrada del canal si todavía apunta a `session`.
    /// Idempotente; una sesión nueva instalada después del desmontaje de
    /// `session` no se toca.
    pub fn remove(&self, channel_id: ChannelId, session: &Arc<Session>) {
        let removed = self
            .sessions
            .remove_if(&channel_id, |_, existing| Arc::ptr_eq(existing, session));

        if removed.is_some() {
            debug!("🗑️ Sesión del canal {channel_id} eliminada del registro");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::audio::testutil::{StubPort, StubResolver};

    fn registry() -> Arc<SessionRegistry> {
        SessionRegistry::new(StubResolver::new(), Duration::from_secs(5))
    }

    async fn connect_stub() -> Result<Arc<dyn PlaybackPort>, ConnectError> {
        Ok(StubPort::new() as Arc<dyn PlaybackPort>)
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_existing_session() {
        let registry = registry();
        let channel = ChannelId::new(21);

        let first = registry.get_or_create(channel, connect_stub).await.unwrap();
        let second = registry.get_or_create(channel, connect_stub).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get(channel).is_some());
        assert!(registry.get(ChannelId::new(99)).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_first_access_connects_once() {
        let registry = registry();
        let channel = ChannelId::new(22);
        let connects = Arc::new(AtomicUsize::new(0));

        let connect = |counter: Arc<AtomicUsize>| {
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(StubPort::new() as Arc<dyn PlaybackPort>)
            }
        };

        let (first, second) = tokio::join!(
            registry.get_or_create(channel, connect(Arc::clone(&connects))),
            registry.get_or_create(channel, connect(Arc::clone(&connects))),
        );

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_installs_nothing() {
        let registry = registry();
        let channel = ChannelId::new(23);

        let result = registry
            .get_or_create(channel, || async {
                Err(ConnectError("canal lleno".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(registry.get(channel).is_none());

        // Un intento posterior vuelve a conectar y esta vez instala.
        let session = registry.get_or_create(channel, connect_stub).await.unwrap();
        assert!(Arc::ptr_eq(&registry.get(channel).unwrap(), &session));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = registry();
        let channel = ChannelId::new(24);

        let session = registry.get_or_create(channel, connect_stub).await.unwrap();
        registry.remove(channel, &session);
        registry.remove(channel, &session);

        assert!(registry.get(channel).is_none());
    }

    #[tokio::test]
    async fn test_remove_ignores_replacement_session() {
        let registry = registry();
        let channel = ChannelId::new(25);

        let stale = registry.get_or_create(channel, connect_stub).await.unwrap();
        registry.remove(channel, &stale);

        let replacement = registry.get_or_create(channel, connect_stub).await.unwrap();

        // Un desmontaje rezagado de la sesión vieja no debe borrar la nueva.
        registry.remove(channel, &stale);
        assert!(Arc::ptr_eq(&registry.get(channel).unwrap(), &replacement));
    }
}
