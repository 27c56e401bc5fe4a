use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::GuildMusicSession;
use crate::sources::Track;

/// Bucle de reproducción de una sesión.
///
/// Reproduce `first`, espera su señal de fin y pasa a la siguiente pista de
/// la cola hasta vaciarla. Un `play` rechazado descarta esa pista y sigue.
/// `token` se cancela en `stop`/`leave`; cada espera lo observa.
pub(crate) async fn run(
    session: Arc<GuildMusicSession>,
    epoch: u64,
    token: CancellationToken,
    first: Track,
) {
    let guild_id = session.guild_id();

    // Un orquestador anterior puede seguir cerrándose tras un stop
    let _lane = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        guard = session.lane().lock() => guard,
    };

    let mut track = first;
    loop {
        if token.is_cancelled() || !session.is_current(epoch) {
            debug!("[{}] Orquestador obsoleto, saliendo", guild_id);
            return;
        }

        let played = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = session.voice().play(&track) => result,
        };

        match played {
            Ok(finished) => {
                if !session.admit(epoch) {
                    return;
                }
                info!("🎵 [{}] Sonando: {}", guild_id, track.title());

                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = finished.wait() => {}
                }
                debug!("[{}] Terminó: {}", guild_id, track.title());
            }
            Err(e) => {
                warn!(
                    "⚠️ [{}] Pista descartada '{}': {}",
                    guild_id,
                    track.title(),
                    e
                );
            }
        }

        match session.advance(epoch) {
            Some(next) => track = next,
            None => {
                info!("📭 [{}] Cola vacía", guild_id);
                return;
            }
        }
    }
}
