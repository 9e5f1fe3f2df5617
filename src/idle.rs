/*
 *  idle.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Idle power manager - the OLED sleeps when nobody is touching it
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

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info};
use tokio::time;

use crate::screen::Panel;

/// Seconds since the last user activity. Shared by every input source;
/// any button or remote key resets it to zero.
#[derive(Debug, Clone, Default)]
pub struct IdleCounter(Arc<AtomicU32>);

impl IdleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    /// Advance one second, saturating rather than wrapping.
    pub fn increment(&self) -> u32 {
        let prev = self.0.fetch_add(1, Ordering::Relaxed);
        if prev == u32::MAX {
            self.0.store(u32::MAX, Ordering::Relaxed);
            u32::MAX
        } else {
            prev + 1
        }
    }

    pub fn value(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Ticks the idle counter once a second and drives display power from
/// it: the first second after activity wakes the panel, crossing the
/// threshold puts it to sleep. Both transitions fire exactly once.
pub struct IdlePowerManager {
    counter: IdleCounter,
    threshold: u32,
    display_on: bool,
}

impl IdlePowerManager {
    pub fn new(counter: IdleCounter, threshold: u32) -> Self {
        Self {
            counter,
            threshold,
            display_on: true,
        }
    }

    /// One 1 Hz step. Split from `run` so the edge behaviour is testable
    /// without a clock.
    pub fn tick(&mut self, panel: &Mutex<Panel>) {
        let elapsed = self.counter.increment();
        if elapsed == 1 && !self.display_on {
            let mut panel = panel.lock().unwrap_or_else(|e| e.into_inner());
            match panel.power_on() {
                Ok(()) => {
                    info!("display woken by activity");
                    self.display_on = true;
                }
                Err(e) => error!("display power up failed: {}", e),
            }
        } else if elapsed >= self.threshold && self.display_on {
            let mut panel = panel.lock().unwrap_or_else(|e| e.into_inner());
            match panel.power_off() {
                Ok(()) => {
                    info!("display sleeping after {}s idle", elapsed);
                    self.display_on = false;
                }
                Err(e) => error!("display power down failed: {}", e),
            }
        }
    }

    pub async fn run(mut self, panel: Arc<Mutex<Panel>>) {
        let mut ticker = time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick(&panel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioControl;
    use crate::display::drivers::mock::MockDisplay;
    use crate::screen::BootInfo;
    use crate::stream::{StreamProbe, StreamStatus};
    use std::io;

    struct ClosedProbe;

    impl StreamProbe for ClosedProbe {
        fn query(&self) -> io::Result<StreamStatus> {
            Ok(StreamStatus::Closed)
        }
    }

    fn test_panel(display: MockDisplay) -> Mutex<Panel> {
        Mutex::new(Panel::new(
            Box::new(display),
            Arc::new(MockAudioControl::new()),
            Box::new(ClosedProbe),
            BootInfo::default(),
        ))
    }

    #[test]
    fn test_counter_reset_and_increment() {
        let counter = IdleCounter::new();
        assert_eq!(counter.value(), 0);
        counter.increment();
        counter.increment();
        assert_eq!(counter.value(), 2);
        counter.reset();
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_power_down_fires_exactly_once_past_threshold() {
        let display = MockDisplay::new();
        let panel = test_panel(display.clone());
        let counter = IdleCounter::new();
        let mut mgr = IdlePowerManager::new(counter, 5);

        for _ in 0..20 {
            mgr.tick(&panel);
        }
        let state = display.state();
        let state = state.lock().unwrap();
        assert_eq!(state.power_down_count, 1);
        assert_eq!(state.power_up_count, 0);
    }

    #[test]
    fn test_power_up_on_first_tick_after_activity() {
        let display = MockDisplay::new();
        let panel = test_panel(display.clone());
        let counter = IdleCounter::new();
        let mut mgr = IdlePowerManager::new(counter.clone(), 3);

        for _ in 0..5 {
            mgr.tick(&panel); // sleeps at 3
        }
        counter.reset(); // a button landed
        mgr.tick(&panel); // elapsed == 1, wake
        let state = display.state();
        let state = state.lock().unwrap();
        assert_eq!(state.power_down_count, 1);
        assert_eq!(state.power_up_count, 1);
        assert!(state.is_powered);
    }

    #[test]
    fn test_wake_then_sleep_cycle_repeats() {
        let display = MockDisplay::new();
        let panel = test_panel(display.clone());
        let counter = IdleCounter::new();
        let mut mgr = IdlePowerManager::new(counter.clone(), 3);

        for cycle in 1..=3usize {
            for _ in 0..4 {
                mgr.tick(&panel);
            }
            assert_eq!(display.state().lock().unwrap().power_down_count, cycle);
            counter.reset();
            mgr.tick(&panel);
            assert_eq!(display.state().lock().unwrap().power_up_count, cycle);
            counter.reset();
        }
    }
}
