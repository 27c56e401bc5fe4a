use thiserror::Error;

use crate::audio::session::PlaybackState;

/// Errores del núcleo de reproducción. Todos están acotados a la sesión de una guild.
#[derive(Debug, Error)]
pub enum MusicError {
    /// No hay contenido reproducible para la búsqueda
    #[error("no se encontró nada reproducible para '{query}': {reason}")]
    Resolution { query: String, reason: String },

    /// Operación no válida en el estado actual
    #[error("no se puede {action} mientras el reproductor está {state}")]
    InvalidState {
        action: &'static str,
        state: PlaybackState,
    },

    /// Fallo al unirse o salir del canal de voz
    #[error("error de conexión de voz: {0}")]
    Connection(String),

    /// La conexión de voz rechazó una pista concreta
    #[error("error de reproducción: {0}")]
    Playback(String),

    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),
}

impl MusicError {
    pub fn resolution(query: &str, reason: impl Into<String>) -> Self {
        Self::Resolution {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_state(action: &'static str, state: PlaybackState) -> Self {
        Self::InvalidState { action, state }
    }
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;
