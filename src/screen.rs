/*
 *  screen.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Screen state machine - ten screens, five buttons, one panel
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

use std::sync::Arc;

use log::{debug, error, warn};

use crate::audio::{AudioControl, Toggle};
use crate::display::error::DisplayError;
use crate::display::traits::PanelDisplay;
use crate::stream::StreamProbe;

/// One addressable view on the panel. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Volume,
    Boot,
    Menu,
    FilterMenu,
    HvToggle,
    SpeedToggle,
    HighPassToggle,
    DeEmphasisToggle,
    NonOversampleToggle,
    PhaseCompToggle,
}

impl Screen {
    /// The hardware switch edited on a toggle-detail screen.
    pub fn toggle(self) -> Option<Toggle> {
        match self {
            Screen::HvToggle => Some(Toggle::HvEnable),
            Screen::SpeedToggle => Some(Toggle::FilterSpeedFast),
            Screen::HighPassToggle => Some(Toggle::HighPassFilter),
            Screen::DeEmphasisToggle => Some(Toggle::DeEmphasis),
            Screen::NonOversampleToggle => Some(Toggle::NonOversample),
            Screen::PhaseCompToggle => Some(Toggle::PhaseCompensation),
            _ => None,
        }
    }
}

/// Logical key, after button/pin resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Left,
    Right,
    Up,
    Down,
    Ok,
}

/// Network/host identity shown on the sysinfo screen, gathered once at
/// startup.
#[derive(Debug, Clone, Default)]
pub struct BootInfo {
    pub label: String,
    pub host_line: String,
    pub eth_ip: String,
    pub wlan_ip: String,
}

/// UI-side cache of the six hardware switches. May diverge from the card
/// only while its detail screen is open and before Ok commits it.
#[derive(Debug, Clone, Copy, Default)]
struct DisplayedFlags([bool; 6]);

fn flag_index(toggle: Toggle) -> usize {
    match toggle {
        Toggle::HvEnable => 0,
        Toggle::FilterSpeedFast => 1,
        Toggle::HighPassFilter => 2,
        Toggle::DeEmphasis => 3,
        Toggle::NonOversample => 4,
        Toggle::PhaseCompensation => 5,
    }
}

impl DisplayedFlags {
    fn get(&self, toggle: Toggle) -> bool {
        self.0[flag_index(toggle)]
    }
    fn set(&mut self, toggle: Toggle, value: bool) {
        self.0[flag_index(toggle)] = value;
    }
}

/// Per-field redraw cache for the volume screen; cleared whenever the
/// screen identity changes so a fresh entry always repaints.
#[derive(Debug, Default)]
struct VolumeCache {
    volume: Option<String>,
    mute: Option<String>,
    stream: Option<String>,
}

/// Fixed geometry of one toggle-detail screen.
struct DetailLayout {
    title: &'static str,
    title_col: u8,
    on_label: &'static str,
    on_col: u8,
    off_label: &'static str,
    off_col: u8,
}

fn detail_layout(screen: Screen) -> DetailLayout {
    match screen {
        Screen::HvToggle => DetailLayout {
            title: "HV ENABLE", title_col: 20,
            on_label: "ON", on_col: 20,
            off_label: "OFF", off_col: 70,
        },
        Screen::SpeedToggle => DetailLayout {
            title: "FILTER SPEED", title_col: 5,
            on_label: "FAST", on_col: 10,
            off_label: "SLOW", off_col: 80,
        },
        Screen::HighPassToggle => DetailLayout {
            title: "HP-FILT", title_col: 20,
            on_label: "EN", on_col: 10,
            off_label: "DIS", off_col: 70,
        },
        Screen::DeEmphasisToggle => DetailLayout {
            title: "DE-EMPH", title_col: 20,
            on_label: "EN", on_col: 10,
            off_label: "DIS", off_col: 70,
        },
        Screen::NonOversampleToggle => DetailLayout {
            title: "NON-OSAMP", title_col: 20,
            on_label: "EN", on_col: 10,
            off_label: "DIS", off_col: 70,
        },
        Screen::PhaseCompToggle => DetailLayout {
            title: "PHA-COMP", title_col: 20,
            on_label: "EN", on_col: 10,
            off_label: "DIS", off_col: 70,
        },
        _ => unreachable!("not a toggle-detail screen"),
    }
}

/// The panel: owned display, mixer handle, stream probe and every piece
/// of UI state. Lives behind the render lock; every mutation that draws
/// happens through `&mut self`.
pub struct Panel {
    display: Box<dyn PanelDisplay>,
    audio: Arc<dyn AudioControl>,
    probe: Box<dyn StreamProbe>,
    boot: BootInfo,
    screen: Screen,
    menu_index: u8,
    filter_index: u8,
    ok_confirm: bool,
    flags: DisplayedFlags,
    cache: VolumeCache,
}

impl Panel {
    /// Seed all displayed flags from the card and start on the boot
    /// screen. Unreadable switches default to off with a warning.
    pub fn new(
        display: Box<dyn PanelDisplay>,
        audio: Arc<dyn AudioControl>,
        probe: Box<dyn StreamProbe>,
        boot: BootInfo,
    ) -> Self {
        let mut flags = DisplayedFlags::default();
        for toggle in Toggle::ALL {
            match audio.toggle_state(toggle) {
                Ok(value) => flags.set(toggle, value),
                Err(e) => warn!("could not seed {:?}: {}", toggle, e),
            }
        }
        Self {
            display,
            audio,
            probe,
            boot,
            screen: Screen::Boot,
            menu_index: 1,
            filter_index: 1,
            ok_confirm: false,
            flags,
            cache: VolumeCache::default(),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn menu_index(&self) -> u8 {
        self.menu_index
    }

    pub fn filter_index(&self) -> u8 {
        self.filter_index
    }

    pub fn ok_confirm(&self) -> bool {
        self.ok_confirm
    }

    pub fn displayed_flag(&self, toggle: Toggle) -> bool {
        self.flags.get(toggle)
    }

    pub fn power_on(&mut self) -> Result<(), DisplayError> {
        self.display.power_up()
    }

    pub fn power_off(&mut self) -> Result<(), DisplayError> {
        self.display.power_down()
    }

    /// Process one button event. Rendering failures are logged, never
    /// raised - the panel must stay responsive whatever the bus does.
    pub fn handle(&mut self, event: ButtonEvent) {
        if let Err(e) = self.dispatch(event) {
            error!("render failed after {:?}: {}", event, e);
        }
    }

    fn dispatch(&mut self, event: ButtonEvent) -> Result<(), DisplayError> {
        match event {
            ButtonEvent::Left => match self.screen {
                Screen::Volume | Screen::Boot | Screen::Menu => self.show_volume_screen(),
                Screen::FilterMenu => self.show_menu_screen(),
                s => {
                    let toggle = s.toggle().expect("detail screen");
                    self.flags.set(toggle, true);
                    self.show_detail_screen(s)
                }
            },
            ButtonEvent::Right => match self.screen {
                Screen::Volume | Screen::Boot => self.show_menu_screen(),
                Screen::Menu => self.show_volume_screen(),
                Screen::FilterMenu => Ok(()),
                s => {
                    let toggle = s.toggle().expect("detail screen");
                    self.flags.set(toggle, false);
                    self.show_detail_screen(s)
                }
            },
            ButtonEvent::Up => match self.screen {
                Screen::Menu => {
                    if self.menu_index > 1 {
                        self.menu_index -= 1;
                    }
                    self.show_menu_screen()
                }
                Screen::FilterMenu => {
                    if self.filter_index > 1 {
                        self.filter_index -= 1;
                    }
                    self.show_filter_menu()
                }
                _ => Ok(()),
            },
            ButtonEvent::Down => match self.screen {
                Screen::Menu => {
                    self.menu_index += 1;
                    if self.menu_index > 4 {
                        self.menu_index = 1;
                    }
                    self.show_menu_screen()
                }
                Screen::FilterMenu => {
                    self.filter_index += 1;
                    if self.filter_index > 4 {
                        self.filter_index = 1;
                    }
                    self.show_filter_menu()
                }
                s if s.toggle().is_some() => {
                    // one-directional: Down only ever clears the highlight
                    if self.ok_confirm {
                        self.ok_confirm = false;
                    }
                    self.show_detail_screen(s)
                }
                _ => Ok(()),
            },
            ButtonEvent::Ok => match self.screen {
                Screen::Menu => match self.menu_index {
                    1 => self.show_boot_screen(),
                    2 => self.show_detail_screen(Screen::HvToggle),
                    3 => self.show_filter_menu(),
                    _ => self.show_detail_screen(Screen::SpeedToggle),
                },
                Screen::Boot => self.show_menu_screen(),
                Screen::FilterMenu => match self.filter_index {
                    1 => self.show_detail_screen(Screen::PhaseCompToggle),
                    2 => self.show_detail_screen(Screen::HighPassToggle),
                    3 => self.show_detail_screen(Screen::DeEmphasisToggle),
                    _ => self.show_detail_screen(Screen::NonOversampleToggle),
                },
                Screen::Volume => Ok(()),
                s => self.commit_toggle(s),
            },
        }
    }

    /// Ok on a detail screen: converge the hardware to the displayed
    /// value (at most one set call), then leave the screen. A failed set
    /// is logged; the UI moves on either way.
    fn commit_toggle(&mut self, screen: Screen) -> Result<(), DisplayError> {
        let toggle = screen.toggle().expect("detail screen");
        self.ok_confirm = true;
        let displayed = self.flags.get(toggle);
        match self.audio.toggle_state(toggle) {
            Ok(live) if live != displayed => {
                if let Err(e) = self.audio.set_toggle(toggle, displayed) {
                    error!("commit of {:?} failed: {}", toggle, e);
                }
            }
            Ok(_) => {}
            Err(e) => error!("could not read {:?} before commit: {}", toggle, e),
        }
        match screen {
            Screen::HvToggle | Screen::SpeedToggle => self.show_menu_screen(),
            _ => self.show_filter_menu(),
        }
    }

    /// Screen-identity change wipes the canvas and every field cache;
    /// entering a detail screen always starts with the highlight off.
    fn enter_screen(&mut self, screen: Screen) -> Result<(), DisplayError> {
        let changed = self.screen != screen;
        // state first: a dead bus must never wedge navigation
        self.screen = screen;
        if changed {
            self.cache = VolumeCache::default();
            if screen.toggle().is_some() {
                self.ok_confirm = false;
            }
            self.display.clear_screen()?;
        }
        Ok(())
    }

    pub fn show_boot_screen(&mut self) -> Result<(), DisplayError> {
        self.enter_screen(Screen::Boot)?;
        self.display.clear_screen()?;
        self.display.draw_text(0, 0, &self.boot.label)?;
        self.display.draw_text(2, 0, &self.boot.eth_ip)?;
        let host: String = self.boot.host_line.chars().take(13).collect();
        self.display.draw_text(4, 0, &host)?;
        self.display.draw_text(6, 0, &self.boot.wlan_ip)
    }

    pub fn show_volume_screen(&mut self) -> Result<(), DisplayError> {
        self.enter_screen(Screen::Volume)?;
        self.render_volume_line(None);
        self.render_mute_line();
        self.refresh_stream_line();
        Ok(())
    }

    pub fn show_menu_screen(&mut self) -> Result<(), DisplayError> {
        self.enter_screen(Screen::Menu)?;
        let hv = self.flags.get(Toggle::HvEnable);
        let fast = self.flags.get(Toggle::FilterSpeedFast);
        let rows: [(u8, String); 4] = [
            (0, "SYSINFO".to_string()),
            (2, if hv { "HV-EN ON" } else { "HV-EN OFF" }.to_string()),
            (4, "FILTER".to_string()),
            (6, if fast { "F-SPEED-FAS" } else { "F-SPEED-SLO" }.to_string()),
        ];
        for (slot, (row, text)) in rows.iter().enumerate() {
            if self.menu_index as usize == slot + 1 {
                self.display.draw_inverted_text(*row, 0, text)?;
            } else {
                self.display.draw_text(*row, 0, text)?;
            }
        }
        Ok(())
    }

    pub fn show_filter_menu(&mut self) -> Result<(), DisplayError> {
        self.enter_screen(Screen::FilterMenu)?;
        let entries: [(u8, &str, Toggle); 4] = [
            (0, "PHCOMP ", Toggle::PhaseCompensation),
            (2, "HP-FIL ", Toggle::HighPassFilter),
            (4, "DE-EMP ", Toggle::DeEmphasis),
            (6, "NON-OS ", Toggle::NonOversample),
        ];
        for (slot, (row, name, toggle)) in entries.iter().enumerate() {
            let state = if self.flags.get(*toggle) { "EN" } else { "DIS" };
            if self.filter_index as usize == slot + 1 {
                self.display.draw_inverted_text(*row, 5, name)?;
                self.display.draw_inverted_text(*row, 64, "| ")?;
                self.display.draw_inverted_text(*row, 80, state)?;
            } else {
                self.display.draw_text(*row, 5, name)?;
                self.display.draw_text(*row, 64, "| ")?;
                self.display.draw_text(*row, 80, state)?;
            }
        }
        Ok(())
    }

    pub fn show_detail_screen(&mut self, screen: Screen) -> Result<(), DisplayError> {
        self.enter_screen(screen)?;
        let layout = detail_layout(screen);
        let enabled = self.flags.get(screen.toggle().expect("detail screen"));
        self.display.draw_text(0, layout.title_col, layout.title)?;
        if enabled {
            self.display.draw_inverted_text(3, layout.on_col, layout.on_label)?;
            self.display.draw_text(3, layout.off_col, layout.off_label)?;
        } else {
            self.display.draw_text(3, layout.on_col, layout.on_label)?;
            self.display.draw_inverted_text(3, layout.off_col, layout.off_label)?;
        }
        if self.ok_confirm {
            self.display.draw_inverted_text(6, 50, "OK")
        } else {
            self.display.draw_text(6, 50, "OK")
        }
    }

    /// Volume line on row 1. `level` is the already-known value when the
    /// remote just set it; otherwise the mixer is queried, and a query
    /// failure leaves the stale text in place.
    pub fn render_volume_line(&mut self, level: Option<i32>) {
        if self.screen != Screen::Volume {
            return;
        }
        let level = match level {
            Some(v) => v,
            None => match self.audio.volume() {
                Ok(v) => v,
                Err(e) => {
                    debug!("volume query failed: {}", e);
                    return;
                }
            },
        };
        let db = self.audio.volume_db(level);
        let text = format!("{:<8}dB", format!("  {}", format_db(db)));
        if self.cache.volume.as_deref() != Some(text.as_str()) {
            if let Err(e) = self.display.draw_text(1, 1, &text) {
                error!("volume line draw failed: {}", e);
                return;
            }
            self.cache.volume = Some(text);
        }
    }

    /// Mute indicator at row 3, col 50: "@" when muted, blank otherwise.
    pub fn render_mute_line(&mut self) {
        if self.screen != Screen::Volume {
            return;
        }
        let text = match self.audio.is_muted() {
            Ok(true) => "@",
            Ok(false) => "  ",
            Err(e) => {
                debug!("mute query failed: {}", e);
                return;
            }
        };
        if self.cache.mute.as_deref() != Some(text) {
            if let Err(e) = self.display.draw_text(3, 50, text) {
                error!("mute line draw failed: {}", e);
                return;
            }
            self.cache.mute = Some(text.to_string());
        }
    }

    /// Re-probe stream parameters and redraw the line when it changed.
    /// Returns true on a change so the caller can treat a new stream as
    /// activity for the idle timer.
    pub fn refresh_stream_line(&mut self) -> bool {
        if self.screen != Screen::Volume {
            return false;
        }
        let status = match self.probe.query() {
            Ok(status) => status,
            Err(e) => {
                debug!("stream probe failed: {}", e);
                return false;
            }
        };
        let line = status.status_line();
        if self.cache.stream.as_deref() == Some(line.as_str()) {
            return false;
        }
        let blanked = self.display.draw_text(5, 5, "                  ");
        if let Err(e) = blanked.and_then(|_| self.display.draw_text(5, 5, &line)) {
            error!("stream line draw failed: {}", e);
            return false;
        }
        self.cache.stream = Some(line);
        true
    }
}

fn format_db(db: f64) -> String {
    if db.fract() == 0.0 {
        format!("{}", db as i64)
    } else {
        format!("{:.2}", db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioControl;
    use crate::display::drivers::mock::MockDisplay;
    use crate::stream::{StreamProbe, StreamStatus};
    use std::io;

    struct FixedProbe(StreamStatus);

    impl StreamProbe for FixedProbe {
        fn query(&self) -> io::Result<StreamStatus> {
            Ok(self.0.clone())
        }
    }

    fn panel_with(audio: MockAudioControl) -> (Panel, MockDisplay) {
        let display = MockDisplay::new();
        let panel = Panel::new(
            Box::new(display.clone()),
            Arc::new(audio),
            Box::new(FixedProbe(StreamStatus::Closed)),
            BootInfo {
                label: "BOSS2".to_string(),
                host_line: "HOST: testbox".to_string(),
                eth_ip: "192.168.1.20".to_string(),
                wlan_ip: String::new(),
            },
        );
        (panel, display)
    }

    fn panel() -> (Panel, MockDisplay) {
        panel_with(MockAudioControl::new())
    }

    #[test]
    fn test_initial_screen_is_boot() {
        let (panel, _) = panel();
        assert_eq!(panel.screen(), Screen::Boot);
    }

    #[test]
    fn test_right_from_boot_enters_menu() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right);
        assert_eq!(panel.screen(), Screen::Menu);
    }

    #[test]
    fn test_left_always_returns_to_volume_from_top_screens() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Left);
        assert_eq!(panel.screen(), Screen::Volume);
        panel.handle(ButtonEvent::Right); // Menu
        panel.handle(ButtonEvent::Left);
        assert_eq!(panel.screen(), Screen::Volume);
    }

    #[test]
    fn test_menu_index_down_wraps_up_clamps() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right); // Menu
        assert_eq!(panel.menu_index(), 1);
        for expected in [2, 3, 4, 1] {
            panel.handle(ButtonEvent::Down);
            assert_eq!(panel.menu_index(), expected);
        }
        panel.handle(ButtonEvent::Up); // already at 1
        assert_eq!(panel.menu_index(), 1);
    }

    #[test]
    fn test_filter_index_stays_in_range() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right); // Menu
        panel.handle(ButtonEvent::Down);
        panel.handle(ButtonEvent::Down); // index 3 = FILTER
        panel.handle(ButtonEvent::Ok);
        assert_eq!(panel.screen(), Screen::FilterMenu);
        for _ in 0..9 {
            panel.handle(ButtonEvent::Down);
            assert!((1..=4).contains(&panel.filter_index()));
        }
        for _ in 0..9 {
            panel.handle(ButtonEvent::Up);
            assert!((1..=4).contains(&panel.filter_index()));
        }
        assert_eq!(panel.filter_index(), 1);
    }

    #[test]
    fn test_down_wrap_then_ok_enters_speed_toggle() {
        // Boot -> Right (Menu) -> Down x4 wraps 1->2->3->4->1 -> Down x3 -> Ok
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right);
        for _ in 0..3 {
            panel.handle(ButtonEvent::Down);
        }
        assert_eq!(panel.menu_index(), 4);
        panel.handle(ButtonEvent::Down);
        assert_eq!(panel.menu_index(), 1);
        for _ in 0..3 {
            panel.handle(ButtonEvent::Down);
        }
        panel.handle(ButtonEvent::Ok);
        assert_eq!(panel.screen(), Screen::SpeedToggle);
        assert!(!panel.ok_confirm());
    }

    #[test]
    fn test_any_sequence_lands_on_defined_screen() {
        let (mut panel, _) = panel();
        let script = [
            ButtonEvent::Right, ButtonEvent::Down, ButtonEvent::Ok, ButtonEvent::Left,
            ButtonEvent::Right, ButtonEvent::Ok, ButtonEvent::Down, ButtonEvent::Ok,
            ButtonEvent::Up, ButtonEvent::Left, ButtonEvent::Ok, ButtonEvent::Right,
            ButtonEvent::Down, ButtonEvent::Down, ButtonEvent::Ok, ButtonEvent::Ok,
        ];
        for ev in script.iter().cycle().take(200) {
            panel.handle(*ev);
            assert!((1..=4).contains(&panel.menu_index()));
            assert!((1..=4).contains(&panel.filter_index()));
        }
    }

    #[test]
    fn test_screen_change_clears_canvas() {
        let (mut panel, display) = panel();
        display.reset_state();
        panel.handle(ButtonEvent::Right); // Boot -> Menu
        assert_eq!(display.state().lock().unwrap().clear_count, 1);
        panel.handle(ButtonEvent::Down); // same screen, no clear
        assert_eq!(display.state().lock().unwrap().clear_count, 1);
    }

    #[test]
    fn test_left_right_edit_displayed_flag_on_detail() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right); // Menu
        panel.handle(ButtonEvent::Down);  // index 2 = HV
        panel.handle(ButtonEvent::Ok);
        assert_eq!(panel.screen(), Screen::HvToggle);
        assert!(!panel.displayed_flag(Toggle::HvEnable));
        panel.handle(ButtonEvent::Left);
        assert!(panel.displayed_flag(Toggle::HvEnable));
        panel.handle(ButtonEvent::Left); // idempotent
        assert!(panel.displayed_flag(Toggle::HvEnable));
        panel.handle(ButtonEvent::Right);
        assert!(!panel.displayed_flag(Toggle::HvEnable));
    }

    #[test]
    fn test_commit_sets_hardware_only_on_divergence() {
        let audio = MockAudioControl::new();
        let audio_state = audio.state();
        let (mut panel, _) = panel_with(audio);

        panel.handle(ButtonEvent::Right); // Menu
        panel.handle(ButtonEvent::Down);  // HV
        panel.handle(ButtonEvent::Ok);    // enter HvToggle
        panel.handle(ButtonEvent::Ok);    // commit, displayed == live == false
        assert_eq!(audio_state.lock().unwrap().set_toggle_calls.len(), 0);
        assert_eq!(panel.screen(), Screen::Menu);

        panel.handle(ButtonEvent::Ok);    // menu index still 2, re-enter HvToggle
        panel.handle(ButtonEvent::Left);  // displayed = true, live = false
        panel.handle(ButtonEvent::Ok);    // commit -> exactly one set call
        let calls = audio_state.lock().unwrap().set_toggle_calls.clone();
        assert_eq!(calls, vec![(Toggle::HvEnable, true)]);
    }

    #[test]
    fn test_commit_failure_is_swallowed_and_ui_moves_on() {
        let audio = MockAudioControl::new();
        audio.state().lock().unwrap().fail_set_toggle = true;
        let (mut panel, _) = panel_with(audio);

        panel.handle(ButtonEvent::Right);
        panel.handle(ButtonEvent::Down);
        panel.handle(ButtonEvent::Ok);   // HvToggle
        panel.handle(ButtonEvent::Left); // diverge
        panel.handle(ButtonEvent::Ok);   // commit fails, but we navigate anyway
        assert_eq!(panel.screen(), Screen::Menu);
    }

    #[test]
    fn test_filter_commit_returns_to_filter_menu() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right); // Menu
        panel.handle(ButtonEvent::Down);
        panel.handle(ButtonEvent::Down);  // FILTER
        panel.handle(ButtonEvent::Ok);    // FilterMenu
        panel.handle(ButtonEvent::Ok);    // filter index 1 -> PhaseComp
        assert_eq!(panel.screen(), Screen::PhaseCompToggle);
        panel.handle(ButtonEvent::Ok);    // commit
        assert_eq!(panel.screen(), Screen::FilterMenu);
    }

    #[test]
    fn test_ok_confirm_down_clears_and_entry_resets() {
        let (mut panel, _) = panel();
        panel.handle(ButtonEvent::Right);
        panel.handle(ButtonEvent::Down);
        panel.handle(ButtonEvent::Ok); // HvToggle
        assert!(!panel.ok_confirm());
        panel.handle(ButtonEvent::Ok); // commit -> Menu, confirm latched
        assert!(panel.ok_confirm());
        panel.handle(ButtonEvent::Down); // index 3
        panel.handle(ButtonEvent::Up);   // index 2
        panel.handle(ButtonEvent::Ok);   // re-enter HvToggle: reset on entry
        assert!(!panel.ok_confirm());
        panel.handle(ButtonEvent::Up);   // no-op on detail
        assert!(!panel.ok_confirm());
    }

    #[test]
    fn test_stream_line_suppressed_when_unchanged() {
        let (mut panel, display) = panel();
        panel.handle(ButtonEvent::Left); // Volume screen, draws "No stream"
        assert!(display.has_drawn("No stream"));
        display.reset_state();
        assert!(!panel.refresh_stream_line()); // unchanged -> no draw
        assert!(!display.has_drawn("No stream"));
    }

    #[test]
    fn test_boot_screen_contents() {
        let (mut panel, display) = panel();
        panel.show_boot_screen().unwrap();
        assert_eq!(display.last_text_at(0, 0), Some("BOSS2".to_string()));
        assert_eq!(display.last_text_at(4, 0), Some("HOST: testbox".to_string()));
    }

    #[test]
    fn test_volume_line_uses_supplied_level_without_requery() {
        let audio = MockAudioControl::with_volume(150);
        let (mut panel, display) = panel_with(audio);
        panel.handle(ButtonEvent::Left); // Volume screen, level 150
        display.reset_state();
        panel.render_volume_line(Some(42));
        assert!(display.has_drawn("42"));
    }
}
