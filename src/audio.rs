/*
 *  audio.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Mixer abstraction - the six Boss2 processing toggles plus volume/mute
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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Error type for mixer access.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The required sound card was not present at startup. Fatal.
    #[error("sound card not found: {0}")]
    CardNotFound(String),
    #[error("mixer control not found: {0}")]
    ControlNotFound(String),
    #[error("mixer I/O error: {0}")]
    Io(String),
}

/// The six hardware processing switches surfaced on the panel.
///
/// `FilterSpeedFast` reads true for the fast roll-off filter; the others
/// read true for enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    HvEnable,
    FilterSpeedFast,
    HighPassFilter,
    DeEmphasis,
    NonOversample,
    PhaseCompensation,
}

impl Toggle {
    pub const ALL: [Toggle; 6] = [
        Toggle::HvEnable,
        Toggle::FilterSpeedFast,
        Toggle::HighPassFilter,
        Toggle::DeEmphasis,
        Toggle::NonOversample,
        Toggle::PhaseCompensation,
    ];

    /// ALSA simple-control name on the Boss2 card.
    pub fn control_name(self) -> &'static str {
        match self {
            Toggle::HvEnable => "HV_Enable",
            Toggle::FilterSpeedFast => "PCM Filter Speed",
            Toggle::HighPassFilter => "PCM High-pass Filter",
            Toggle::DeEmphasis => "PCM De-emphasis Filter",
            Toggle::NonOversample => "PCM Nonoversample Emulate",
            Toggle::PhaseCompensation => "PCM Phase Compensation",
        }
    }
}

/// Mixer capability consumed by the panel. Implementations are shared
/// between the state machine (toggle commit), the remote listener
/// (volume/mute) and startup seeding, hence `Send + Sync` and `&self`.
pub trait AudioControl: Send + Sync {
    /// Current hardware state of a processing switch.
    fn toggle_state(&self, toggle: Toggle) -> Result<bool, AudioError>;

    /// Set a processing switch.
    fn set_toggle(&self, toggle: Toggle, enabled: bool) -> Result<(), AudioError>;

    /// Master playback level in native device units.
    fn volume(&self) -> Result<i32, AudioError>;

    /// Apply a level to both the Digital and Master controls.
    fn set_volume(&self, level: i32) -> Result<(), AudioError>;

    /// Flip the mute switch on both Master and Digital controls.
    fn toggle_mute(&self) -> Result<(), AudioError>;

    /// True when Master is muted.
    fn is_muted(&self) -> Result<bool, AudioError>;

    /// dB value for a native level, used for the volume line. The default
    /// is a pass-through for backends with no dB mapping.
    fn volume_db(&self, level: i32) -> f64 {
        level as f64
    }
}

/// Recorded mixer operations, shared for inspection in tests.
#[derive(Debug, Default)]
pub struct MockAudioState {
    pub toggles: HashMap<Toggle, bool>,
    pub volume: i32,
    pub muted: bool,
    /// Every set_toggle call in order
    pub set_toggle_calls: Vec<(Toggle, bool)>,
    /// Every set_volume call in order
    pub set_volume_calls: Vec<i32>,
    pub toggle_mute_calls: usize,
    pub fail_set_toggle: bool,
}

/// Mixer mock for tests and for running the daemon off-appliance.
#[derive(Debug, Clone, Default)]
pub struct MockAudioControl {
    state: Arc<Mutex<MockAudioState>>,
}

impl MockAudioControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(level: i32) -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().volume = level;
        mock
    }

    pub fn state(&self) -> Arc<Mutex<MockAudioState>> {
        Arc::clone(&self.state)
    }

    pub fn set_hardware_toggle(&self, toggle: Toggle, enabled: bool) {
        self.state.lock().unwrap().toggles.insert(toggle, enabled);
    }
}

impl AudioControl for MockAudioControl {
    fn toggle_state(&self, toggle: Toggle) -> Result<bool, AudioError> {
        Ok(*self.state.lock().unwrap().toggles.get(&toggle).unwrap_or(&false))
    }

    fn set_toggle(&self, toggle: Toggle, enabled: bool) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_set_toggle {
            return Err(AudioError::Io("simulated set_toggle failure".to_string()));
        }
        state.toggles.insert(toggle, enabled);
        state.set_toggle_calls.push((toggle, enabled));
        Ok(())
    }

    fn volume(&self) -> Result<i32, AudioError> {
        Ok(self.state.lock().unwrap().volume)
    }

    fn set_volume(&self, level: i32) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state.volume = level;
        state.set_volume_calls.push(level);
        Ok(())
    }

    fn toggle_mute(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state.muted = !state.muted;
        state.toggle_mute_calls += 1;
        Ok(())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        Ok(self.state.lock().unwrap().muted)
    }
}

#[cfg(feature = "hw-alsa")]
pub use self::hw::AlsaAudioControl;

#[cfg(feature = "hw-alsa")]
mod hw {
    use super::{AudioControl, AudioError, Toggle};
    use alsa::card;
    use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};
    use log::debug;
    use std::sync::Mutex;

    const CH: SelemChannelId = SelemChannelId::FrontLeft;

    /// ALSA mixer backend for the Boss2 card.
    ///
    /// The Mixer handle is not Sync; all access is serialized behind a
    /// mutex. Every call reopens no handles - the mixer events are drained
    /// before reads so cached element values are current.
    pub struct AlsaAudioControl {
        mixer: Mutex<Mixer>,
        card_index: i32,
    }

    impl AlsaAudioControl {
        /// Locate the card by name and attach the mixer. A missing card is
        /// a fatal configuration error surfaced to main.
        pub fn open(card_name: &str) -> Result<Self, AudioError> {
            let mut card_index = None;
            for card in card::Iter::new() {
                let card = card.map_err(|e| AudioError::Io(e.to_string()))?;
                if let Ok(name) = card.get_name() {
                    if name == card_name {
                        card_index = Some(card.get_index());
                        break;
                    }
                }
            }
            let card_index =
                card_index.ok_or_else(|| AudioError::CardNotFound(card_name.to_string()))?;

            let mixer = Mixer::new(&format!("hw:{}", card_index), false)
                .map_err(|e| AudioError::Io(e.to_string()))?;
            debug!("attached mixer hw:{} ({})", card_index, card_name);

            Ok(Self { mixer: Mutex::new(mixer), card_index })
        }

        pub fn card_index(&self) -> i32 {
            self.card_index
        }

        fn with_selem<T>(
            &self,
            name: &str,
            f: impl FnOnce(&Selem) -> Result<T, alsa::Error>,
        ) -> Result<T, AudioError> {
            let mixer = self.mixer.lock().unwrap();
            mixer.handle_events().map_err(|e| AudioError::Io(e.to_string()))?;
            let id = SelemId::new(name, 0);
            let selem = mixer
                .find_selem(&id)
                .ok_or_else(|| AudioError::ControlNotFound(name.to_string()))?;
            f(&selem).map_err(|e| AudioError::Io(e.to_string()))
        }
    }

    impl AudioControl for AlsaAudioControl {
        fn toggle_state(&self, toggle: Toggle) -> Result<bool, AudioError> {
            match toggle {
                // enumerated control: item 0 is Slow, item 1 is Fast
                Toggle::FilterSpeedFast => self.with_selem(toggle.control_name(), |s| {
                    Ok(s.get_enum_item(CH)? == 1)
                }),
                _ => self.with_selem(toggle.control_name(), |s| {
                    Ok(s.get_playback_switch(CH)? != 0)
                }),
            }
        }

        fn set_toggle(&self, toggle: Toggle, enabled: bool) -> Result<(), AudioError> {
            match toggle {
                Toggle::FilterSpeedFast => self.with_selem(toggle.control_name(), |s| {
                    s.set_enum_item(CH, if enabled { 1 } else { 0 })
                }),
                _ => self.with_selem(toggle.control_name(), |s| {
                    s.set_playback_switch_all(if enabled { 1 } else { 0 })
                }),
            }
        }

        fn volume(&self) -> Result<i32, AudioError> {
            self.with_selem("Master", |s| Ok(s.get_playback_volume(CH)? as i32))
        }

        fn set_volume(&self, level: i32) -> Result<(), AudioError> {
            self.with_selem("Digital", |s| s.set_playback_volume_all(level as i64))?;
            self.with_selem("Master", |s| s.set_playback_volume_all(level as i64))
        }

        fn toggle_mute(&self) -> Result<(), AudioError> {
            for name in ["Master", "Digital"] {
                self.with_selem(name, |s| {
                    let on = s.get_playback_switch(CH)?;
                    s.set_playback_switch_all(if on == 0 { 1 } else { 0 })
                })?;
            }
            Ok(())
        }

        fn is_muted(&self) -> Result<bool, AudioError> {
            self.with_selem("Master", |s| Ok(s.get_playback_switch(CH)? == 0))
        }

        fn volume_db(&self, level: i32) -> f64 {
            self.with_selem("Master", |s| {
                Ok(s.ask_playback_vol_db(level as i64)?.to_db() as f64)
            })
            .unwrap_or(level as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_audio_records_toggle_sets() {
        let audio = MockAudioControl::new();

        audio.set_toggle(Toggle::HighPassFilter, true).unwrap();
        audio.set_toggle(Toggle::HvEnable, false).unwrap();

        let state = audio.state();
        let state = state.lock().unwrap();
        assert_eq!(
            state.set_toggle_calls,
            vec![(Toggle::HighPassFilter, true), (Toggle::HvEnable, false)]
        );
        assert_eq!(state.toggles.get(&Toggle::HighPassFilter), Some(&true));
    }

    #[test]
    fn test_mock_audio_mute_flips() {
        let audio = MockAudioControl::new();

        assert!(!audio.is_muted().unwrap());
        audio.toggle_mute().unwrap();
        assert!(audio.is_muted().unwrap());
        audio.toggle_mute().unwrap();
        assert!(!audio.is_muted().unwrap());
    }

    #[test]
    fn test_control_names_match_card() {
        assert_eq!(Toggle::HvEnable.control_name(), "HV_Enable");
        assert_eq!(Toggle::FilterSpeedFast.control_name(), "PCM Filter Speed");
        assert_eq!(Toggle::ALL.len(), 6);
    }
}
