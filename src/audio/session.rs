use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{orchestrator, queue::MusicQueue, voice::VoiceConnection};
use crate::error::{MusicError, MusicResult};
use crate::sources::Track;

/// Estado de reproducción de una guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::Idle => "inactivo",
            PlaybackState::Playing => "reproduciendo",
            PlaybackState::Paused => "en pausa",
        })
    }
}

/// Foto del estado de la sesión para consultas (`/queue`, estado)
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub upcoming_duration: Duration,
}

impl SessionSnapshot {
    /// Títulos en orden de reproducción, el actual primero
    pub fn titles(&self) -> Vec<String> {
        self.current
            .iter()
            .chain(self.upcoming.iter())
            .map(|t| t.title().to_string())
            .collect()
    }
}

struct OrchestratorRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct SessionState {
    queue: MusicQueue,
    current: Option<Track>,
    state: PlaybackState,
    /// Cambia en cada stop/leave; un orquestador con epoch viejo ya no puede mutar nada
    epoch: u64,
    /// La pista actual ya está sonando en la conexión de voz
    live: bool,
    /// Skip pedido antes de que la pista actual llegara a sonar
    skip_pending: bool,
    run: Option<OrchestratorRun>,
}

impl SessionState {
    /// Vuelve a `Idle` e invalida el orquestador en curso
    fn reset(&mut self) -> (usize, Option<OrchestratorRun>) {
        let cleared = self.queue.clear();
        self.current = None;
        self.state = PlaybackState::Idle;
        self.epoch += 1;
        self.live = false;
        self.skip_pending = false;

        let run = self.run.take();
        if let Some(ref run) = run {
            run.token.cancel();
        }
        (cleared, run)
    }
}

/// Sesión de música de una guild: cola, pista actual y máquina de estados.
///
/// Todas las transiciones toman `inner` durante un único paso y nunca lo
/// mantienen a través de un `.await`. La reproducción en sí la conduce el
/// orquestador de [`orchestrator::run`].
pub struct GuildMusicSession {
    id: u64,
    guild_id: GuildId,
    channel_id: ChannelId,
    voice: Arc<dyn VoiceConnection>,
    inner: Mutex<SessionState>,
    /// Sólo un orquestador a la vez habla con la conexión de voz
    lane: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl GuildMusicSession {
    pub fn new(
        id: u64,
        guild_id: GuildId,
        channel_id: ChannelId,
        voice: Arc<dyn VoiceConnection>,
        max_queue_size: usize,
    ) -> Self {
        Self {
            id,
            guild_id,
            channel_id,
            voice,
            inner: Mutex::new(SessionState {
                queue: MusicQueue::new(max_queue_size),
                current: None,
                state: PlaybackState::Idle,
                epoch: 0,
                live: false,
                skip_pending: false,
                run: None,
            }),
            lane: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.inner.lock();
        SessionSnapshot {
            state: st.state,
            current: st.current.clone(),
            upcoming: st.queue.tracks(),
            upcoming_duration: st.queue.total_duration(),
        }
    }

    /// Agrega una pista. Devuelve `0` si empieza a sonar ya, o su posición en la cola.
    pub fn enqueue(self: &Arc<Self>, track: Track) -> MusicResult<usize> {
        if self.shutdown.is_cancelled() {
            return Err(MusicError::Connection(
                "la sesión ya se cerró".to_string(),
            ));
        }

        let mut st = self.inner.lock();

        if st.state != PlaybackState::Idle {
            let position = st.queue.push(track)?;
            info!("➕ [{}] En cola #{}", self.guild_id, position);
            return Ok(position);
        }

        info!("🎵 [{}] Reproduciendo ahora: {}", self.guild_id, track.title());
        st.current = Some(track.clone());
        st.state = PlaybackState::Playing;
        st.live = false;
        st.skip_pending = false;

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(orchestrator::run(
            Arc::clone(self),
            st.epoch,
            token.clone(),
            track,
        ));
        st.run = Some(OrchestratorRun { token, handle });

        Ok(0)
    }

    /// Salta la pista actual. La conexión de voz dispara su señal de fin y
    /// el orquestador avanza; no se espera a que arranque la siguiente.
    pub fn skip(&self) -> MusicResult<Track> {
        let mut st = self.inner.lock();
        if st.state != PlaybackState::Playing {
            return Err(MusicError::invalid_state("saltar", st.state));
        }
        let current = st
            .current
            .clone()
            .ok_or_else(|| MusicError::invalid_state("saltar", PlaybackState::Idle))?;

        if st.live {
            self.voice.stop()?;
            st.live = false;
        } else {
            st.skip_pending = true;
        }

        info!("⏭️ [{}] Saltando: {}", self.guild_id, current.title());
        Ok(current)
    }

    pub fn pause(&self) -> MusicResult<()> {
        let mut st = self.inner.lock();
        if st.state != PlaybackState::Playing {
            return Err(MusicError::invalid_state("pausar", st.state));
        }
        if st.live {
            self.voice.pause()?;
        }
        st.state = PlaybackState::Paused;
        info!("⏸️ [{}] Reproducción pausada", self.guild_id);
        Ok(())
    }

    pub fn resume(&self) -> MusicResult<()> {
        let mut st = self.inner.lock();
        if st.state != PlaybackState::Paused {
            return Err(MusicError::invalid_state("reanudar", st.state));
        }
        if st.live {
            self.voice.resume()?;
        }
        st.state = PlaybackState::Playing;
        info!("▶️ [{}] Reproducción reanudada", self.guild_id);
        Ok(())
    }

    /// Vacía la cola y detiene la pista actual. Idempotente.
    pub fn stop(&self) {
        let mut st = self.inner.lock();
        let was_live = st.live;
        let (cleared, _run) = st.reset();

        if was_live {
            if let Err(e) = self.voice.stop() {
                warn!("⚠️ [{}] No se pudo detener la pista: {}", self.guild_id, e);
            }
        }

        info!("⏹️ [{}] Reproducción detenida ({} en cola descartadas)", self.guild_id, cleared);
    }

    /// Semántica de `stop` más cancelación del orquestador. Después de esto
    /// ninguna señal tardía puede mutar la sesión.
    pub async fn shutdown(&self) {
        let run = {
            let mut st = self.inner.lock();
            let (_, run) = st.reset();
            run
        };

        self.shutdown.cancel();
        if let Err(e) = self.voice.stop() {
            debug!("[{}] stop al cerrar la sesión: {}", self.guild_id, e);
        }

        if let Some(run) = run {
            if let Err(e) = run.handle.await {
                error!("❌ [{}] El orquestador terminó con error: {:?}", self.guild_id, e);
            }
        }

        info!("👋 [{}] Sesión cerrada", self.guild_id);
    }

    /// Suelta la conexión de voz. Se llama después de [`Self::shutdown`].
    pub async fn voice_disconnect(&self) -> MusicResult<()> {
        self.voice.disconnect().await
    }

    pub async fn voice_connected(&self) -> bool {
        self.voice.is_connected().await
    }

    // Interfaz del orquestador

    pub(super) fn voice(&self) -> &Arc<dyn VoiceConnection> {
        &self.voice
    }

    pub(super) fn lane(&self) -> &tokio::sync::Mutex<()> {
        &self.lane
    }

    pub(super) fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().epoch == epoch
    }

    /// La pista de `epoch` acaba de empezar a sonar. Aplica un skip o una
    /// pausa pedidos mientras arrancaba. Devuelve `false` si la sesión se
    /// detuvo entretanto; en ese caso la pista se corta aquí mismo.
    pub(super) fn admit(&self, epoch: u64) -> bool {
        let mut st = self.inner.lock();
        if st.epoch != epoch || self.shutdown.is_cancelled() {
            if let Err(e) = self.voice.stop() {
                warn!("⚠️ [{}] No se pudo cortar una pista obsoleta: {}", self.guild_id, e);
            }
            return false;
        }

        st.live = true;
        if st.skip_pending {
            st.skip_pending = false;
            st.live = false;
            if let Err(e) = self.voice.stop() {
                warn!("⚠️ [{}] Skip pendiente falló: {}", self.guild_id, e);
            }
        } else if st.state == PlaybackState::Paused {
            if let Err(e) = self.voice.pause() {
                warn!("⚠️ [{}] Pausa pendiente falló: {}", self.guild_id, e);
            }
        }
        true
    }

    /// Saca la siguiente pista y la convierte en la actual en un único paso.
    /// Con la cola vacía la sesión vuelve a `Idle` y devuelve `None`.
    pub(super) fn advance(&self, epoch: u64) -> Option<Track> {
        let mut st = self.inner.lock();
        if st.epoch != epoch {
            return None;
        }

        st.live = false;
        st.skip_pending = false;

        match st.queue.pop() {
            Some(next) => {
                st.current = Some(next.clone());
                if st.state == PlaybackState::Idle {
                    st.state = PlaybackState::Playing;
                }
                Some(next)
            }
            None => {
                st.current = None;
                st.state = PlaybackState::Idle;
                st.run = None;
                None
            }
        }
    }
}
