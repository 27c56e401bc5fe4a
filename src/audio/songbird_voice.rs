use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::voice::{FinishSignal, TrackFinished, VoiceConnection, VoiceConnector};
use crate::error::{MusicError, MusicResult};
use crate::sources::Track;

/// Abre llamadas de voz a través del manager de songbird compartido
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client, volume: f32) -> Self {
        Self {
            manager,
            http,
            volume,
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let call = match self.manager.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                error!("❌ [{}] No se pudo unir a {}: {:?}", guild_id, channel_id, e);
                // Songbird deja la llamada registrada aunque el join falle
                if let Err(e) = self.manager.remove(guild_id).await {
                    debug!("[{}] Limpieza tras join fallido: {:?}", guild_id, e);
                }
                return Err(MusicError::Connection(format!(
                    "no se pudo entrar al canal: {e}"
                )));
            }
        };

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(Arc::new(SongbirdVoice {
            guild_id,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            volume: self.volume,
            current: Mutex::new(None),
        }))
    }
}

/// Conexión de voz de una guild sobre una `Call` de songbird
pub struct SongbirdVoice {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    volume: f32,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdVoice {
    fn input_for(&self, track: &Track) -> Input {
        let source_ref = track.source_ref().to_string();
        if track.is_page_ref() {
            YoutubeDl::new(self.http.clone(), source_ref).into()
        } else {
            HttpRequest::new(self.http.clone(), source_ref).into()
        }
    }

    fn with_current(
        &self,
        action: &str,
        f: impl FnOnce(&TrackHandle) -> songbird::tracks::TrackResult<()>,
    ) -> MusicResult<()> {
        match self.current.lock().as_ref() {
            Some(handle) => f(handle)
                .map_err(|e| MusicError::Playback(format!("no se pudo {action}: {e}"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdVoice {
    async fn play(&self, track: &Track) -> MusicResult<TrackFinished> {
        let input = self.input_for(track);

        let handle = {
            let mut call = self.call.lock().await;
            if call.current_channel().is_none() {
                return Err(MusicError::Playback(
                    "la llamada no tiene canal activo".to_string(),
                ));
            }
            call.play_input(input)
        };

        if let Err(e) = handle.set_volume(self.volume) {
            warn!("⚠️ [{}] No se pudo ajustar el volumen: {}", self.guild_id, e);
        }

        let (signal, finished) = TrackFinished::channel();
        for event in [TrackEvent::End, TrackEvent::Error] {
            let notifier = FinishNotifier {
                guild_id: self.guild_id,
                signal: signal.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                // La pista ya terminó antes de registrar el evento
                debug!("[{}] add_event falló: {}", self.guild_id, e);
                signal.fire();
            }
        }

        *self.current.lock() = Some(handle);
        Ok(finished)
    }

    fn pause(&self) -> MusicResult<()> {
        self.with_current("pausar", |h| h.pause())
    }

    fn resume(&self) -> MusicResult<()> {
        self.with_current("reanudar", |h| h.play())
    }

    fn stop(&self) -> MusicResult<()> {
        if let Some(handle) = self.current.lock().take() {
            // Una pista que ya terminó rechaza el stop; no es un error
            if let Err(e) = handle.stop() {
                debug!("[{}] stop sobre pista terminada: {}", self.guild_id, e);
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> MusicResult<()> {
        self.current.lock().take();
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| MusicError::Connection(format!("no se pudo salir del canal: {e:?}")))
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_channel().is_some()
    }
}

/// Dispara la señal de fin cuando songbird informa que la pista terminó o falló
struct FinishNotifier {
    guild_id: GuildId,
    signal: FinishSignal,
}

#[async_trait]
impl VoiceEventHandler for FinishNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(states) = ctx {
            for (state, _) in states.iter() {
                if let songbird::tracks::PlayMode::Errored(ref e) = state.playing {
                    warn!("⚠️ [{}] Error de reproducción: {:?}", self.guild_id, e);
                }
            }
        }

        if self.signal.fire() {
            debug!("[{}] Fin de pista notificado", self.guild_id);
        }
        Some(Event::Cancel)
    }
}
