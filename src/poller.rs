/*
 *  poller.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Background stream poller - keeps the volume screen's stream line live
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
use std::time::Duration;

use log::debug;
use tokio::time;

use crate::idle::IdleCounter;
use crate::screen::Panel;

/// Periodically re-probes the hardware stream parameters and pushes any
/// change onto the volume screen. A stream change counts as activity so
/// a newly started stream relights a sleeping panel.
pub struct BackgroundPoller {
    panel: Arc<Mutex<Panel>>,
    counter: IdleCounter,
    interval: Duration,
}

impl BackgroundPoller {
    pub fn new(panel: Arc<Mutex<Panel>>, counter: IdleCounter, interval: Duration) -> Self {
        Self {
            panel,
            counter,
            interval,
        }
    }

    /// One poll cycle, split out for tests.
    pub fn poll_once(&self) -> bool {
        let mut panel = self.panel.lock().unwrap_or_else(|e| e.into_inner());
        let changed = panel.refresh_stream_line();
        drop(panel);
        if changed {
            debug!("stream parameters changed");
            self.counter.reset();
        }
        changed
    }

    pub async fn run(self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioControl;
    use crate::display::drivers::mock::MockDisplay;
    use crate::screen::{BootInfo, ButtonEvent, Panel};
    use crate::stream::{StreamProbe, StreamStatus};
    use std::io;

    /// Probe whose answer tests can swap mid-flight.
    #[derive(Clone)]
    struct SwappableProbe(Arc<Mutex<io::Result<StreamStatus>>>);

    impl SwappableProbe {
        fn new(status: StreamStatus) -> Self {
            Self(Arc::new(Mutex::new(Ok(status))))
        }

        fn set(&self, result: io::Result<StreamStatus>) {
            *self.0.lock().unwrap() = result;
        }
    }

    impl StreamProbe for SwappableProbe {
        fn query(&self) -> io::Result<StreamStatus> {
            match &*self.0.lock().unwrap() {
                Ok(status) => Ok(status.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn poller_fixture(probe: SwappableProbe) -> (BackgroundPoller, Arc<Mutex<Panel>>, MockDisplay, IdleCounter) {
        let display = MockDisplay::new();
        let panel = Arc::new(Mutex::new(Panel::new(
            Box::new(display.clone()),
            Arc::new(MockAudioControl::new()),
            Box::new(probe),
            BootInfo::default(),
        )));
        let counter = IdleCounter::new();
        let poller = BackgroundPoller::new(
            Arc::clone(&panel),
            counter.clone(),
            Duration::from_secs(3),
        );
        (poller, panel, display, counter)
    }

    #[test]
    fn test_change_draws_and_resets_idle() {
        let probe = SwappableProbe::new(StreamStatus::Closed);
        let (poller, panel, display, counter) = poller_fixture(probe.clone());
        panel.lock().unwrap().handle(ButtonEvent::Left); // Volume screen
        counter.increment();
        counter.increment();

        probe.set(Ok(StreamStatus::Active {
            format: "32".to_string(),
            rate: 44100,
        }));
        assert!(poller.poll_once());
        assert!(display.has_drawn("S32 44100"));
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_unchanged_status_leaves_idle_alone() {
        let probe = SwappableProbe::new(StreamStatus::Closed);
        let (poller, panel, _, counter) = poller_fixture(probe);
        panel.lock().unwrap().handle(ButtonEvent::Left);
        counter.increment();

        assert!(!poller.poll_once()); // same "No stream" as screen entry drew
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn test_probe_error_is_skipped() {
        let probe = SwappableProbe::new(StreamStatus::Closed);
        let (poller, panel, display, counter) = poller_fixture(probe.clone());
        panel.lock().unwrap().handle(ButtonEvent::Left);
        counter.increment();
        display.reset_state();

        probe.set(Err(io::Error::new(io::ErrorKind::NotFound, "gone")));
        assert!(!poller.poll_once());
        assert!(!display.has_drawn("No stream"));
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn test_no_draw_off_volume_screen() {
        let probe = SwappableProbe::new(StreamStatus::Active {
            format: "16".to_string(),
            rate: 48000,
        });
        let (poller, panel, display, _) = poller_fixture(probe);
        panel.lock().unwrap().handle(ButtonEvent::Right); // Menu
        display.reset_state();

        assert!(!poller.poll_once());
        assert!(!display.has_drawn("S16"));
    }
}
