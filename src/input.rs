/*
 *  input.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Front-panel buttons - BCM pin mapping and the dispatch task
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

use log::debug;
use tokio::sync::mpsc;

use crate::idle::IdleCounter;
use crate::screen::{ButtonEvent, Panel};

/// Boss2 front-panel wiring, BCM numbering.
pub const PIN_LEFT: u32 = 14;
pub const PIN_OK: u32 = 15;
pub const PIN_UP: u32 = 23;
pub const PIN_DOWN: u32 = 8;
pub const PIN_RIGHT: u32 = 24;

/// Map a BCM pin to its logical key; unknown pins are ignored upstream.
pub fn button_for_pin(pin: u32) -> Option<ButtonEvent> {
    match pin {
        PIN_LEFT => Some(ButtonEvent::Left),
        PIN_OK => Some(ButtonEvent::Ok),
        PIN_UP => Some(ButtonEvent::Up),
        PIN_DOWN => Some(ButtonEvent::Down),
        PIN_RIGHT => Some(ButtonEvent::Right),
        _ => None,
    }
}

/// Drains button events into the panel. Every press is activity first,
/// then a state-machine step under the render lock.
pub async fn run_dispatcher(
    mut rx: mpsc::Receiver<ButtonEvent>,
    panel: Arc<Mutex<Panel>>,
    counter: IdleCounter,
) {
    while let Some(event) = rx.recv().await {
        counter.reset();
        let mut panel = panel.lock().unwrap_or_else(|e| e.into_inner());
        panel.handle(event);
    }
    debug!("button event channel closed");
}

#[cfg(feature = "hw-input")]
pub use hw::spawn_button_source;

#[cfg(feature = "hw-input")]
mod hw {
    use super::*;
    use gpio_cdev::{Chip, EventRequestFlags, LineRequestFlags};
    use log::{error, warn};

    const GPIO_CHIP: &str = "/dev/gpiochip0";
    const CONSUMER: &str = "dacpanel";

    /// Blocking gpiochip readers, one per button, feeding a shared
    /// channel. Rising edges only, the pins idle low with external
    /// pull-downs. A missing chip is not fatal.
    pub fn spawn_button_source(tx: mpsc::Sender<ButtonEvent>) {
        let mut chip = match Chip::new(GPIO_CHIP) {
            Ok(chip) => chip,
            Err(e) => {
                warn!("{} unavailable, buttons disabled: {}", GPIO_CHIP, e);
                return;
            }
        };
        for pin in [PIN_LEFT, PIN_OK, PIN_UP, PIN_DOWN, PIN_RIGHT] {
            let line = match chip.get_line(pin) {
                Ok(line) => line,
                Err(e) => {
                    error!("cannot claim BCM {}: {}", pin, e);
                    continue;
                }
            };
            let events = match line.events(
                LineRequestFlags::INPUT,
                EventRequestFlags::RISING_EDGE,
                CONSUMER,
            ) {
                Ok(events) => events,
                Err(e) => {
                    error!("cannot watch BCM {}: {}", pin, e);
                    continue;
                }
            };
            let Some(button) = button_for_pin(pin) else { continue };
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                for event in events {
                    if let Err(e) = event {
                        error!("BCM {} edge read failed: {}", pin, e);
                        return;
                    }
                    if tx.blocking_send(button).is_err() {
                        return;
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioControl;
    use crate::display::drivers::mock::MockDisplay;
    use crate::screen::{BootInfo, Screen};
    use crate::stream::{StreamProbe, StreamStatus};
    use std::io;

    struct ClosedProbe;

    impl StreamProbe for ClosedProbe {
        fn query(&self) -> io::Result<StreamStatus> {
            Ok(StreamStatus::Closed)
        }
    }

    #[test]
    fn test_pin_mapping() {
        assert_eq!(button_for_pin(14), Some(ButtonEvent::Left));
        assert_eq!(button_for_pin(15), Some(ButtonEvent::Ok));
        assert_eq!(button_for_pin(23), Some(ButtonEvent::Up));
        assert_eq!(button_for_pin(8), Some(ButtonEvent::Down));
        assert_eq!(button_for_pin(24), Some(ButtonEvent::Right));
        assert_eq!(button_for_pin(17), None);
    }

    #[tokio::test]
    async fn test_dispatcher_drives_panel_and_resets_idle() {
        let panel = Arc::new(Mutex::new(Panel::new(
            Box::new(MockDisplay::new()),
            Arc::new(MockAudioControl::new()),
            Box::new(ClosedProbe),
            BootInfo::default(),
        )));
        let counter = IdleCounter::new();
        counter.increment();
        counter.increment();

        let (tx, rx) = mpsc::channel(8);
        tx.send(ButtonEvent::Right).await.unwrap();
        drop(tx);
        run_dispatcher(rx, Arc::clone(&panel), counter.clone()).await;

        assert_eq!(panel.lock().unwrap().screen(), Screen::Menu);
        assert_eq!(counter.value(), 0);
    }
}
