//! # Audio Module
//!
//! Per-guild playback core for the Eggman bot.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - Process-wide map from guild to its [`session::GuildMusicSession`]
//! - Creates a session (and its voice connection) on first join, removes it
//!   on `leave` or when the bot is disconnected
//!
//! ### [`session`] - Guild Music Session
//! - Owns the FIFO [`queue::MusicQueue`], the current track and the
//!   `Idle`/`Playing`/`Paused` state machine
//! - Every transition runs under one short per-session lock that is never
//!   held across an `.await`
//!
//! ### [`orchestrator`] - Playback loop
//! - One task per active session: play, wait for the track's finished
//!   signal, pop the next track, repeat
//! - Skip, stop and natural completion all arrive through the same signal
//!
//! ### [`voice`] / [`songbird_voice`] - Voice transport
//! - [`voice::VoiceConnection`] is the seam the core plays through
//! - [`songbird_voice::SongbirdConnector`] implements it on top of songbird
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! # async fn example(registry: &SessionRegistry, track: Track) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//! let channel_id = ChannelId::new(987654321);
//!
//! let ticket = registry.get_or_create(guild_id, channel_id).await?;
//! registry.enqueue_for(&ticket, track)?;
//!
//! registry.pause(guild_id)?;
//! registry.resume(guild_id)?;
//! registry.skip(guild_id)?;
//! registry.leave(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod orchestrator;
pub mod queue;
pub mod registry;
pub mod session;
pub mod songbird_voice;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;
