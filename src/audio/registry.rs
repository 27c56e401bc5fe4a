use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::{
    session::{GuildMusicSession, PlaybackState, SessionSnapshot},
    voice::VoiceConnector,
};
use crate::error::{MusicError, MusicResult};
use crate::sources::Track;

/// Referencia a una sesión concreta de una guild.
///
/// Los handlers la obtienen al unirse y la presentan al encolar. Si entre
/// medio la sesión se cerró (o se creó otra), la pista se descarta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    guild_id: GuildId,
    session_id: u64,
}

type GuildLocks = DashMap<GuildId, Arc<tokio::sync::Mutex<()>>>;

/// Exclusión por guild mientras se crea o se cierra su sesión.
///
/// La entrada del mapa se borra al soltar el último guard sin nadie esperando.
struct GuildLock<'a> {
    locks: &'a GuildLocks,
    guild_id: GuildId,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for GuildLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Quedan sólo el mapa y este guard
        self.locks.remove_if(&self.guild_id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Mapa global guild → sesión, con creación y cierre explícitos
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildMusicSession>>,
    /// Serializa conectar y desconectar la voz de una misma guild
    guild_locks: GuildLocks,
    connector: Arc<dyn VoiceConnector>,
    next_id: AtomicU64,
    max_queue_size: usize,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn VoiceConnector>, max_queue_size: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            guild_locks: DashMap::new(),
            connector,
            next_id: AtomicU64::new(1),
            max_queue_size,
        }
    }

    /// Devuelve la sesión de la guild o la crea conectándose a `channel_id`.
    ///
    /// Nunca existen dos sesiones para la misma guild. Si la conexión de voz
    /// falla no se registra nada.
    pub async fn get_or_create(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<SessionTicket> {
        if let Some(ticket) = self.existing(guild_id, channel_id)? {
            return Ok(ticket);
        }

        let _lock = self.lock_guild(guild_id).await;

        // Otro handler pudo crearla (o un leave terminar) mientras esperábamos
        if let Some(ticket) = self.existing(guild_id, channel_id)? {
            return Ok(ticket);
        }

        info!("🔊 [{}] Conectando al canal {}", guild_id, channel_id);
        let voice = self.connector.connect(guild_id, channel_id).await?;

        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(GuildMusicSession::new(
            session_id,
            guild_id,
            channel_id,
            voice,
            self.max_queue_size,
        ));
        self.sessions.insert(guild_id, session);

        info!(
            "✅ [{}] Sesión #{} creada ({} activas)",
            guild_id,
            session_id,
            self.active_sessions()
        );
        Ok(SessionTicket {
            guild_id,
            session_id,
        })
    }

    async fn lock_guild(&self, guild_id: GuildId) -> GuildLock<'_> {
        let lock = self
            .guild_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .value()
            .clone();
        let guard = lock.clone().lock_owned().await;

        GuildLock {
            locks: &self.guild_locks,
            guild_id,
            lock,
            guard: Some(guard),
        }
    }

    fn existing(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Option<SessionTicket>> {
        let Some(session) = self.get(guild_id) else {
            return Ok(None);
        };

        if session.channel_id() != channel_id {
            return Err(MusicError::Connection(format!(
                "ya estoy en otro canal de voz (<#{}>)",
                session.channel_id()
            )));
        }

        Ok(Some(SessionTicket {
            guild_id,
            session_id: session.id(),
        }))
    }

    /// Búsqueda de sólo lectura
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildMusicSession>> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    /// Quita la sesión del mapa. No hace nada si no existe.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildMusicSession>> {
        self.sessions.remove(&guild_id).map(|(_, session)| session)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn require(&self, guild_id: GuildId) -> MusicResult<Arc<GuildMusicSession>> {
        self.get(guild_id).ok_or_else(|| {
            MusicError::Connection("no estoy conectado a un canal de voz".to_string())
        })
    }

    fn require_active(
        &self,
        guild_id: GuildId,
        action: &'static str,
    ) -> MusicResult<Arc<GuildMusicSession>> {
        self.get(guild_id)
            .ok_or_else(|| MusicError::invalid_state(action, PlaybackState::Idle))
    }

    /// Encola en la sesión activa de la guild. `0` = empieza a sonar ya.
    pub fn enqueue(&self, guild_id: GuildId, track: Track) -> MusicResult<usize> {
        self.require(guild_id)?.enqueue(track)
    }

    /// Encola sólo si la sesión del ticket sigue viva. `Ok(None)` indica que
    /// la pista se descartó porque la sesión se cerró mientras se resolvía.
    pub fn enqueue_for(&self, ticket: &SessionTicket, track: Track) -> MusicResult<Option<usize>> {
        match self.get(ticket.guild_id) {
            Some(session) if session.id() == ticket.session_id => session.enqueue(track).map(Some),
            _ => {
                debug!(
                    "🗑️ [{}] Sesión #{} ya no existe, descartando '{}'",
                    ticket.guild_id,
                    ticket.session_id,
                    track.title()
                );
                Ok(None)
            }
        }
    }

    /// Títulos en orden de reproducción, el actual primero
    pub fn list_queue(&self, guild_id: GuildId) -> Vec<String> {
        self.snapshot(guild_id)
            .map(|s| s.titles())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        self.get(guild_id).map(|s| s.snapshot())
    }

    pub fn skip(&self, guild_id: GuildId) -> MusicResult<Track> {
        self.require_active(guild_id, "saltar")?.skip()
    }

    pub fn pause(&self, guild_id: GuildId) -> MusicResult<()> {
        self.require_active(guild_id, "pausar")?.pause()
    }

    pub fn resume(&self, guild_id: GuildId) -> MusicResult<()> {
        self.require_active(guild_id, "reanudar")?.resume()
    }

    /// Idempotente: sin sesión no hay nada que detener
    pub fn stop(&self, guild_id: GuildId) {
        if let Some(session) = self.get(guild_id) {
            session.stop();
        }
    }

    /// Detiene todo, cancela el orquestador, se desconecta y borra la sesión.
    ///
    /// Retiene el lock de la guild hasta terminar la desconexión: un `/play`
    /// concurrente conecta recién sobre una llamada nueva.
    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        let _lock = self.lock_guild(guild_id).await;
        let session = self.require(guild_id)?;
        // Fuera del mapa primero: los tickets en vuelo ya no la encuentran
        self.remove(guild_id);

        session.shutdown().await;
        session.voice_disconnect().await?;

        info!("👋 [{}] Salí del canal de voz", guild_id);
        Ok(())
    }

    /// El gateway informó que el bot ya no está en voz.
    ///
    /// Un aviso que llega después de un leave + rejoin no toca la sesión
    /// nueva: sólo se cierra si su conexión realmente se perdió.
    pub async fn handle_disconnect(&self, guild_id: GuildId) {
        let _lock = self.lock_guild(guild_id).await;
        let Some(session) = self.get(guild_id) else {
            return;
        };

        if session.voice_connected().await {
            debug!(
                "[{}] Aviso de desconexión obsoleto, la sesión #{} sigue en voz",
                guild_id,
                session.id()
            );
            return;
        }

        self.remove(guild_id);

        warn!("🔌 [{}] Desconectado de voz, cerrando sesión", guild_id);
        session.shutdown().await;
        if let Err(e) = session.voice_disconnect().await {
            debug!("[{}] Limpieza de la conexión: {}", guild_id, e);
        }
    }

    /// Cierra todas las sesiones (apagado del proceso)
    pub async fn shutdown_all(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|e| *e.key()).collect();
        for guild_id in guilds {
            if let Err(e) = self.leave(guild_id).await {
                debug!("[{}] Cierre: {}", guild_id, e);
            }
        }
    }
}
