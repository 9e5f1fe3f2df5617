/*
 *  remote.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  IR remote listener - transport keys, mute and direct volume steps
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::{Arc, Mutex};

use log::{debug, error, warn};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::audio::AudioControl;
use crate::idle::IdleCounter;
use crate::playback::{PlaybackTransport, ReconnectingClient};
use crate::screen::{ButtonEvent, Panel};

/// Raw-mixer volume range and step sizes. The boss2 mixer runs 0..=255
/// with coarse steps in the low range; other cards use a flat scale.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VolumeProfile {
    pub min: i32,
    pub max: i32,
    pub step_threshold: i32,
    pub step_large: i32,
    pub step_small: i32,
}

impl VolumeProfile {
    pub const BOSS2: VolumeProfile = VolumeProfile {
        min: 0,
        max: 255,
        step_threshold: 200,
        step_large: 2,
        step_small: 1,
    };

    pub const COMPACT: VolumeProfile = VolumeProfile {
        min: 0,
        max: 100,
        step_threshold: 0,
        step_large: 1,
        step_small: 1,
    };
}

/// One volume step against a profile. Below the threshold the coarse
/// step applies; results saturate at the profile bounds.
pub fn step_volume(profile: &VolumeProfile, level: i32, up: bool) -> i32 {
    let step = if level < profile.step_threshold {
        profile.step_large
    } else {
        profile.step_small
    };
    let next = if up { level + step } else { level - step };
    next.clamp(profile.min, profile.max)
}

/// Remote keys this appliance reacts to; everything else on the handset
/// is dropped at the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKey {
    Next,
    Previous,
    Mute,
    PlayPause,
    VolumeUp,
    VolumeDown,
    Ok,
}

/// evdev key state. Repeats count as presses so a held volume key keeps
/// stepping; releases are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressState {
    Pressed,
    Held,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteEvent {
    pub key: RemoteKey,
    pub state: PressState,
}

impl RemoteEvent {
    pub fn is_actionable(&self) -> bool {
        matches!(self.state, PressState::Pressed | PressState::Held)
    }
}

/// Consumes remote events until the channel closes. Transport keys are
/// fire-and-forget toward the player; volume keys track the last level
/// locally so a held key never waits on a mixer round-trip per repeat.
pub struct RemoteListener<T: PlaybackTransport> {
    rx: mpsc::Receiver<RemoteEvent>,
    panel: Arc<Mutex<Panel>>,
    audio: Arc<dyn AudioControl>,
    player: Option<ReconnectingClient<T>>,
    counter: IdleCounter,
    profile: VolumeProfile,
    level: Option<i32>,
}

impl<T: PlaybackTransport> RemoteListener<T> {
    pub fn new(
        rx: mpsc::Receiver<RemoteEvent>,
        panel: Arc<Mutex<Panel>>,
        audio: Arc<dyn AudioControl>,
        player: Option<ReconnectingClient<T>>,
        counter: IdleCounter,
        profile: VolumeProfile,
    ) -> Self {
        Self {
            rx,
            panel,
            audio,
            player,
            counter,
            profile,
            level: None,
        }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if !event.is_actionable() {
                continue;
            }
            self.counter.reset();
            self.handle(event.key).await;
        }
        debug!("remote event channel closed");
    }

    async fn handle(&mut self, key: RemoteKey) {
        match key {
            RemoteKey::Next => self.player_command(key).await,
            RemoteKey::Previous => self.player_command(key).await,
            RemoteKey::PlayPause => self.player_command(key).await,
            RemoteKey::Mute => {
                if let Err(e) = self.audio.toggle_mute() {
                    error!("mute toggle failed: {}", e);
                    return;
                }
                self.lock_panel().render_mute_line();
            }
            RemoteKey::VolumeUp => self.step(true),
            RemoteKey::VolumeDown => self.step(false),
            RemoteKey::Ok => self.lock_panel().handle(ButtonEvent::Ok),
        }
    }

    /// Player failures are not the panel's problem - log and move on.
    async fn player_command(&mut self, key: RemoteKey) {
        let Some(client) = self.player.as_mut() else {
            debug!("no player configured, {:?} dropped", key);
            return;
        };
        let result = match key {
            RemoteKey::Next => client.next().await,
            RemoteKey::Previous => client.previous().await,
            _ => client.pause().await,
        };
        if let Err(e) = result {
            debug!("player {:?} failed: {}", key, e);
        }
    }

    fn step(&mut self, up: bool) {
        let current = match self.level {
            Some(v) => v,
            None => match self.audio.volume() {
                Ok(v) => v,
                Err(e) => {
                    warn!("cannot read volume for remote step: {}", e);
                    return;
                }
            },
        };
        let next = step_volume(&self.profile, current, up);
        if let Err(e) = self.audio.set_volume(next) {
            error!("volume set to {} failed: {}", next, e);
            return;
        }
        self.level = Some(next);
        // draw from the value just written, no mixer re-query
        self.lock_panel().render_volume_line(Some(next));
    }

    fn lock_panel(&self) -> std::sync::MutexGuard<'_, Panel> {
        self.panel.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(feature = "hw-input")]
pub use hw::spawn_ir_source;

#[cfg(feature = "hw-input")]
mod hw {
    use super::*;
    use evdev::{Device, InputEventKind, Key};

    const IR_DEVICE_NAME: &str = "gpio_ir_recv";

    fn map_key(key: Key) -> Option<RemoteKey> {
        match key {
            Key::KEY_NEXTSONG | Key::KEY_RIGHT => Some(RemoteKey::Next),
            Key::KEY_PREVIOUSSONG | Key::KEY_LEFT => Some(RemoteKey::Previous),
            Key::KEY_MUTE => Some(RemoteKey::Mute),
            Key::KEY_PLAYPAUSE | Key::KEY_PLAY => Some(RemoteKey::PlayPause),
            Key::KEY_VOLUMEUP => Some(RemoteKey::VolumeUp),
            Key::KEY_VOLUMEDOWN => Some(RemoteKey::VolumeDown),
            Key::KEY_OK | Key::KEY_ENTER => Some(RemoteKey::Ok),
            _ => None,
        }
    }

    fn find_ir_device() -> Option<Device> {
        evdev::enumerate()
            .map(|(_, dev)| dev)
            .find(|dev| dev.name() == Some(IR_DEVICE_NAME))
    }

    /// Blocking evdev reader feeding the remote channel. Missing receiver
    /// hardware is not fatal, the appliance just runs without a remote.
    pub fn spawn_ir_source(tx: mpsc::Sender<RemoteEvent>) {
        tokio::task::spawn_blocking(move || {
            let Some(mut device) = find_ir_device() else {
                warn!("IR receiver '{}' not found, remote disabled", IR_DEVICE_NAME);
                return;
            };
            loop {
                let events = match device.fetch_events() {
                    Ok(events) => events,
                    Err(e) => {
                        error!("IR receiver read failed: {}", e);
                        return;
                    }
                };
                for event in events {
                    let InputEventKind::Key(code) = event.kind() else {
                        continue;
                    };
                    let state = match event.value() {
                        1 => PressState::Pressed,
                        2 => PressState::Held,
                        _ => PressState::Released,
                    };
                    let Some(key) = map_key(code) else { continue };
                    if tx.blocking_send(RemoteEvent { key, state }).is_err() {
                        return;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioControl;
    use crate::display::drivers::mock::MockDisplay;
    use crate::playback::MockTransport;
    use crate::screen::BootInfo;
    use crate::stream::{StreamProbe, StreamStatus};
    use std::io;

    #[test]
    fn test_boss2_step_table() {
        let p = VolumeProfile::BOSS2;
        assert_eq!(step_volume(&p, 198, true), 200);
        assert_eq!(step_volume(&p, 200, true), 201);
        assert_eq!(step_volume(&p, 255, true), 255);
        assert_eq!(step_volume(&p, 0, false), 0);
        assert_eq!(step_volume(&p, 1, false), 0);
        assert_eq!(step_volume(&p, 201, false), 200);
    }

    #[test]
    fn test_compact_step_is_flat() {
        let p = VolumeProfile::COMPACT;
        assert_eq!(step_volume(&p, 50, true), 51);
        assert_eq!(step_volume(&p, 100, true), 100);
        assert_eq!(step_volume(&p, 0, false), 0);
    }

    #[test]
    fn test_release_events_are_filtered() {
        let ev = RemoteEvent { key: RemoteKey::Mute, state: PressState::Released };
        assert!(!ev.is_actionable());
        let ev = RemoteEvent { key: RemoteKey::Mute, state: PressState::Held };
        assert!(ev.is_actionable());
    }

    struct ClosedProbe;

    impl StreamProbe for ClosedProbe {
        fn query(&self) -> io::Result<StreamStatus> {
            Ok(StreamStatus::Closed)
        }
    }

    fn test_panel(audio: Arc<MockAudioControl>) -> Arc<Mutex<Panel>> {
        Arc::new(Mutex::new(Panel::new(
            Box::new(MockDisplay::new()),
            audio,
            Box::new(ClosedProbe),
            BootInfo::default(),
        )))
    }

    #[tokio::test]
    async fn test_mute_key_toggles_mixer_and_resets_idle() {
        let audio = Arc::new(MockAudioControl::new());
        let state = audio.state();
        let panel = test_panel(audio.clone());
        let counter = IdleCounter::new();
        counter.increment();
        counter.increment();

        let (tx, rx) = mpsc::channel(8);
        let listener: RemoteListener<MockTransport> = RemoteListener::new(
            rx,
            panel,
            audio,
            None,
            counter.clone(),
            VolumeProfile::BOSS2,
        );
        tx.send(RemoteEvent { key: RemoteKey::Mute, state: PressState::Pressed })
            .await
            .unwrap();
        drop(tx);
        listener.run().await;

        assert_eq!(state.lock().unwrap().toggle_mute_calls, 1);
        assert_eq!(counter.value(), 0);
    }

    #[tokio::test]
    async fn test_volume_repeat_steps_from_tracked_level() {
        let audio = Arc::new(MockAudioControl::with_volume(198));
        let state = audio.state();
        let panel = test_panel(audio.clone());

        let (tx, rx) = mpsc::channel(8);
        let listener: RemoteListener<MockTransport> = RemoteListener::new(
            rx,
            panel,
            audio,
            None,
            IdleCounter::new(),
            VolumeProfile::BOSS2,
        );
        for state in [PressState::Pressed, PressState::Held, PressState::Held] {
            tx.send(RemoteEvent { key: RemoteKey::VolumeUp, state }).await.unwrap();
        }
        drop(tx);
        listener.run().await;

        // 198 -> 200 (coarse), 200 -> 201 -> 202 (fine)
        let calls = state.lock().unwrap().set_volume_calls.clone();
        assert_eq!(calls, vec![200, 201, 202]);
    }
}
