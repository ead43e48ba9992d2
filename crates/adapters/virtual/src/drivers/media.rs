//! Virtual media player: power, playback over a fixed playlist, volume.

use std::sync::{Mutex, MutexGuard, PoisonError};

use commoniot_app::ports::DeviceDriver;
use commoniot_domain::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    pub on: bool,
    pub playback: Playback,
    pub track: usize,
    pub volume: u8,
}

#[derive(Debug)]
pub struct VirtualMediaPlayer {
    playlist: Vec<String>,
    state: Mutex<PlayerState>,
}

impl VirtualMediaPlayer {
    #[must_use]
    pub fn new(playlist: Vec<String>) -> Self {
        Self {
            playlist,
            state: Mutex::new(PlayerState {
                on: false,
                playback: Playback::Stopped,
                track: 0,
                volume: 30,
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> PlayerState {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn current_track(&self) -> Option<&str> {
        self.playlist
            .get(self.lock_state().track)
            .map(String::as_str)
    }

    fn lock_state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Playback calls are refused while the player is off.
    fn powered(&self) -> Result<MutexGuard<'_, PlayerState>, DriverError> {
        let state = self.lock_state();
        if state.on {
            Ok(state)
        } else {
            Err(DriverError::Rejected("player is off".to_string()))
        }
    }

    fn skip(&self, forward: bool) -> Result<(), DriverError> {
        let mut state = self.powered()?;
        let len = self.playlist.len().max(1);
        state.track = if forward {
            (state.track + 1) % len
        } else {
            (state.track + len - 1) % len
        };
        state.playback = Playback::Playing;
        Ok(())
    }
}

impl DeviceDriver for VirtualMediaPlayer {
    fn is_on(&self) -> bool {
        self.lock_state().on
    }

    fn turn_on(&self) -> Result<(), DriverError> {
        self.lock_state().on = true;
        Ok(())
    }

    fn turn_off(&self) -> Result<(), DriverError> {
        let mut state = self.lock_state();
        state.on = false;
        state.playback = Playback::Stopped;
        Ok(())
    }

    fn pause(&self) -> Result<(), DriverError> {
        self.powered()?.playback = Playback::Paused;
        Ok(())
    }

    fn resume(&self) -> Result<(), DriverError> {
        self.powered()?.playback = Playback::Playing;
        Ok(())
    }

    fn stop(&self) -> Result<(), DriverError> {
        self.powered()?.playback = Playback::Stopped;
        Ok(())
    }

    fn next(&self) -> Result<(), DriverError> {
        self.skip(true)
    }

    fn prev(&self) -> Result<(), DriverError> {
        self.skip(false)
    }

    fn volume(&self) -> Result<u8, DriverError> {
        Ok(self.lock_state().volume)
    }

    fn set_volume(&self, percent: u8) -> Result<(), DriverError> {
        self.lock_state().volume = percent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> VirtualMediaPlayer {
        VirtualMediaPlayer::new(vec!["intro".into(), "theme".into(), "credits".into()])
    }

    #[test]
    fn should_refuse_playback_while_off() {
        let player = player();
        assert!(matches!(player.pause(), Err(DriverError::Rejected(_))));
    }

    #[test]
    fn should_wrap_around_playlist() {
        let player = player();
        player.turn_on().unwrap();
        player.prev().unwrap();
        assert_eq!(player.current_track(), Some("credits"));
        player.next().unwrap();
        assert_eq!(player.current_track(), Some("intro"));
        assert_eq!(player.snapshot().playback, Playback::Playing);
    }

    #[test]
    fn should_stop_playback_when_turned_off() {
        let player = player();
        player.turn_on().unwrap();
        player.resume().unwrap();
        player.turn_off().unwrap();
        assert_eq!(player.snapshot().playback, Playback::Stopped);
    }
}
