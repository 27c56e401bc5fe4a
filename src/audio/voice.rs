use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::MusicResult;
use crate::sources::Track;

/// Abre conexiones de voz por guild
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>>;
}

/// Transporte de audio de una guild.
///
/// `pause`, `resume` y `stop` son síncronos para que la sesión pueda
/// llamarlos dentro de una transición sin suspenderse.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Empieza a reproducir `track`. Sólo se llama cuando no hay otra pista sonando.
    async fn play(&self, track: &Track) -> MusicResult<TrackFinished>;

    fn pause(&self) -> MusicResult<()>;

    fn resume(&self) -> MusicResult<()>;

    /// Detiene la pista actual; dispara su señal de fin. Sin pista activa no hace nada.
    fn stop(&self) -> MusicResult<()>;

    async fn disconnect(&self) -> MusicResult<()>;

    /// `true` mientras la llamada siga unida a un canal
    async fn is_connected(&self) -> bool;
}

/// Lado emisor de la señal de fin de pista. Se puede clonar entre varios
/// handlers, pero sólo el primer `fire` cuenta.
#[derive(Clone)]
pub struct FinishSignal {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl FinishSignal {
    /// Devuelve `true` si esta llamada fue la que disparó la señal
    pub fn fire(&self) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Señal one-shot que se completa cuando la pista termina, se salta o se detiene
pub struct TrackFinished {
    rx: oneshot::Receiver<()>,
}

impl TrackFinished {
    pub fn channel() -> (FinishSignal, TrackFinished) {
        let (tx, rx) = oneshot::channel();
        (
            FinishSignal {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            TrackFinished { rx },
        )
    }

    /// Espera el fin de la pista. Si el emisor desaparece se considera terminada.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_fires_once() {
        let (signal, finished) = TrackFinished::channel();
        let clone = signal.clone();

        assert!(signal.fire());
        assert!(!clone.fire());

        tokio::time::timeout(Duration::from_secs(1), finished.wait())
            .await
            .expect("la señal debería completarse");
    }

    #[tokio::test]
    async fn test_dropped_signal_counts_as_finished() {
        let (signal, finished) = TrackFinished::channel();
        drop(signal);

        tokio::time::timeout(Duration::from_secs(1), finished.wait())
            .await
            .expect("soltar el emisor debería liberar la espera");
    }
}
