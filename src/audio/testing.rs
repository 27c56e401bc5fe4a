//! Fakes de la conexión de voz para los tests del núcleo.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use super::voice::{FinishSignal, TrackFinished, VoiceConnection, VoiceConnector};
use crate::error::{MusicError, MusicResult};
use crate::sources::Track;

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    played: Vec<String>,
    attempts: Vec<String>,
    pending: Option<FinishSignal>,
    rejected: HashSet<String>,
    panicking: HashSet<String>,
}

/// Conexión de voz en memoria. Las pistas nunca terminan solas: el test
/// decide cuándo con [`FakeVoice::finish_current`].
#[derive(Default)]
pub(crate) struct FakeVoice {
    state: Mutex<FakeState>,
    fail_controls: AtomicBool,
    /// Mientras exista, `play` queda en vuelo hasta [`FakeVoice::release_play`]
    gate: Mutex<Option<Arc<Notify>>>,
    disconnect_delay: Mutex<Duration>,
    dropped: AtomicBool,
}

impl FakeVoice {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `play` rechazará esta pista
    pub(crate) fn reject(&self, title: &str) {
        self.state.lock().rejected.insert(title.to_string());
    }

    /// `play` entrará en pánico con esta pista
    pub(crate) fn panic_on(&self, title: &str) {
        self.state.lock().panicking.insert(title.to_string());
    }

    /// Hace fallar pause/resume/stop
    pub(crate) fn fail_controls(&self, fail: bool) {
        self.fail_controls.store(fail, Ordering::SeqCst);
    }

    /// Retiene el próximo `play` antes de que la pista empiece a sonar
    pub(crate) fn hold_play(&self) {
        *self.gate.lock() = Some(Arc::new(Notify::new()));
    }

    /// Deja terminar el `play` retenido; los siguientes ya no esperan
    pub(crate) fn release_play(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_one();
        }
    }

    pub(crate) fn slow_disconnect(&self, delay: Duration) {
        *self.disconnect_delay.lock() = delay;
    }

    /// Simula que Discord cortó la llamada
    pub(crate) fn drop_connection(&self) {
        self.dropped.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: &str) {
        self.state.lock().calls.push(call.to_string());
    }

    /// Termina la pista actual de forma natural
    pub(crate) fn finish_current(&self) -> bool {
        let signal = self.state.lock().pending.take();
        signal.map(|s| s.fire()).unwrap_or(false)
    }

    pub(crate) fn played(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn attempts(&self, title: &str) -> usize {
        self.state
            .lock()
            .attempts
            .iter()
            .filter(|t| t.as_str() == title)
            .count()
    }

    fn control(&self, name: &str) -> MusicResult<()> {
        if self.fail_controls.load(Ordering::SeqCst) {
            return Err(MusicError::Playback(format!("{name} rechazado")));
        }
        self.record(name);
        Ok(())
    }
}

#[async_trait]
impl VoiceConnection for FakeVoice {
    async fn play(&self, track: &Track) -> MusicResult<TrackFinished> {
        self.state.lock().attempts.push(track.title().to_string());

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut st = self.state.lock();
        if st.panicking.contains(track.title()) {
            panic!("play de {} explotó", track.title());
        }
        if st.rejected.contains(track.title()) {
            return Err(MusicError::Playback(format!("{} rechazada", track.title())));
        }

        let (signal, finished) = TrackFinished::channel();
        st.pending = Some(signal);
        st.calls.push(format!("play:{}", track.title()));
        st.played.push(track.title().to_string());
        Ok(finished)
    }

    fn pause(&self) -> MusicResult<()> {
        self.control("pause")
    }

    fn resume(&self) -> MusicResult<()> {
        self.control("resume")
    }

    fn stop(&self) -> MusicResult<()> {
        self.control("stop")?;
        let signal = self.state.lock().pending.take();
        if let Some(signal) = signal {
            signal.fire();
        }
        Ok(())
    }

    async fn disconnect(&self) -> MusicResult<()> {
        let delay = *self.disconnect_delay.lock();
        tokio::time::sleep(delay).await;
        self.dropped.store(true, Ordering::SeqCst);
        self.record("disconnect");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.dropped.load(Ordering::SeqCst)
    }
}

/// Conector que siempre entrega la misma [`FakeVoice`]
pub(crate) struct FakeConnector {
    pub(crate) voice: Arc<FakeVoice>,
    pub(crate) connects: AtomicUsize,
    pub(crate) fail: AtomicBool,
}

impl FakeConnector {
    pub(crate) fn new(voice: Arc<FakeVoice>) -> Arc<Self> {
        Arc::new(Self {
            voice,
            connects: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        // Simula la latencia del handshake de voz
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(MusicError::Connection(format!("canal {channel_id} inalcanzable")));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.voice.dropped.store(false, Ordering::SeqCst);
        self.voice.record("connect");
        let voice: Arc<dyn VoiceConnection> = self.voice.clone();
        Ok(voice)
    }
}

/// Espera (máx. 2s) a que se cumpla la condición
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("la condición no se cumplió a tiempo");
}
