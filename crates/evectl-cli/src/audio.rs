//! Audible feedback through the terminal bell.

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

use evectl_core::host::{AudioError, AudioFeedback};

const BELL: &[u8] = b"\x07";

/// Bells rung for a refused ticket.
const ERROR_BELLS: usize = 3;

/// Rings the terminal bell: once for a valid ticket, three times otherwise.
///
/// A terminal has no volume control; volume 0 mutes the bell.
#[derive(Debug)]
pub struct TerminalBell<W> {
    out: Mutex<W>,
    volume: AtomicU8,
}

impl TerminalBell<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            volume: AtomicU8::new(50),
        }
    }
}

impl<W: Write + Send> AudioFeedback for TerminalBell<W> {
    fn play(&self, success: bool) -> Result<(), AudioError> {
        if self.volume.load(Ordering::Relaxed) == 0 {
            return Ok(());
        }
        let rings = if success { 1 } else { ERROR_BELLS };
        let mut out = self
            .out
            .lock()
            .map_err(|_| AudioError("bell output poisoned".into()))?;
        out.write_all(&BELL.repeat(rings))
            .and_then(|()| out.flush())
            .map_err(|e| AudioError(e.to_string()))
    }

    fn set_volume(&self, volume: u8) -> Result<(), AudioError> {
        self.volume.store(volume.min(100), Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rung(bell: &TerminalBell<Vec<u8>>) -> usize {
        bell.out.lock().unwrap().iter().filter(|b| **b == 0x07).count()
    }

    #[test]
    fn success_rings_once_error_three_times() {
        let bell = TerminalBell::new(Vec::new());
        bell.play(true).unwrap();
        assert_eq!(rung(&bell), 1);
        bell.play(false).unwrap();
        assert_eq!(rung(&bell), 4);
    }

    #[test]
    fn zero_volume_is_silent() {
        let bell = TerminalBell::new(Vec::new());
        bell.set_volume(0).unwrap();
        bell.play(false).unwrap();
        assert_eq!(rung(&bell), 0);
    }
}
