use std::{collections::VecDeque, time::Duration};
use tracing::debug;

use crate::error::{MusicError, MusicResult};
use crate::sources::Track;

/// Cola FIFO de una guild. El orden de inserción es el orden de reproducción.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final y devuelve su posición (desde 1)
    pub fn push(&mut self, track: Track) -> MusicResult<usize> {
        if self.items.len() >= self.max_size {
            return Err(MusicError::QueueFull(self.max_size));
        }

        debug!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Saca el siguiente track (FIFO)
    pub fn pop(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(ref track) = next {
            debug!("➡️ Siguiente en cola: {}", track.title());
        }
        next
    }

    /// Limpia la cola y devuelve cuántos tracks se quitaron
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(Track::duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue.tracks().iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn test_fifo_positions_and_order() {
        let mut queue = MusicQueue::new(10);
        assert_eq!(queue.push(Track::new("A", "https://a")).unwrap(), 1);
        assert_eq!(queue.push(Track::new("B", "https://b")).unwrap(), 2);
        assert_eq!(queue.push(Track::new("A", "https://a")).unwrap(), 3);

        assert_eq!(titles(&queue), vec!["A", "B", "A"]);
        assert_eq!(queue.pop().map(|t| t.title().to_string()), Some("A".to_string()));
        assert_eq!(titles(&queue), vec!["B", "A"]);
    }

    #[test]
    fn test_capacity_and_clear() {
        let mut queue = MusicQueue::new(2);
        queue.push(Track::new("A", "https://a")).unwrap();
        queue.push(Track::new("B", "https://b")).unwrap();

        let err = queue.push(Track::new("C", "https://c")).unwrap_err();
        assert!(matches!(err, MusicError::QueueFull(2)));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_total_duration_skips_unknown() {
        let mut queue = MusicQueue::new(10);
        queue
            .push(Track::new("A", "https://a").with_duration(Duration::from_secs(60)))
            .unwrap();
        queue.push(Track::new("B", "https://b")).unwrap();
        queue
            .push(Track::new("C", "https://c").with_duration(Duration::from_secs(30)))
            .unwrap();

        assert_eq!(queue.total_duration(), Duration::from_secs(90));
    }
}
