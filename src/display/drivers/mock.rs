/*
 *  display/drivers/mock.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Mock display for testing without hardware
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

use crate::display::error::DisplayError;
use crate::display::traits::{PanelDisplay, PIXEL_COLS, TEXT_ROWS};

/// One recorded draw operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    PowerUp,
    PowerDown,
    Clear,
    Text { row: u8, col: u8, text: String, inverted: bool },
}

/// Internal state for the mock display (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDisplayState {
    /// Number of times power_up() was called
    pub power_up_count: usize,

    /// Number of times power_down() was called
    pub power_down_count: usize,

    /// Number of times clear_screen() was called
    pub clear_count: usize,

    /// Whether the display is currently powered
    pub is_powered: bool,

    /// Every operation in call order
    pub ops: Vec<DrawOp>,

    /// Simulate failures (for error testing)
    pub simulate_draw_failure: bool,
}

/// Mock display driver for testing
///
/// Simulates the panel without requiring hardware. Records every operation
/// so tests can assert on what the state machine drew and in what order.
#[derive(Debug, Clone)]
pub struct MockDisplay {
    state: Arc<Mutex<MockDisplayState>>,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockDisplayState::default())),
        }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockDisplayState>> {
        Arc::clone(&self.state)
    }

    /// Reset recorded state (useful between test phases)
    pub fn reset_state(&self) {
        let mut state = self.state.lock().unwrap();
        *state = MockDisplayState::default();
    }

    /// Last text drawn at a given cell, if any
    pub fn last_text_at(&self, row: u8, col: u8) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.ops.iter().rev().find_map(|op| match op {
            DrawOp::Text { row: r, col: c, text, .. } if *r == row && *c == col => {
                Some(text.clone())
            }
            _ => None,
        })
    }

    /// True if `needle` appears in any text drawn since the last reset
    pub fn has_drawn(&self, needle: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.ops.iter().any(|op| matches!(op, DrawOp::Text { text, .. } if text.contains(needle)))
    }

    fn record(&self, op: DrawOp) -> Result<(), DisplayError> {
        let mut state = self.state.lock().unwrap();
        if state.simulate_draw_failure {
            return Err(DisplayError::Other("Simulated draw failure".to_string()));
        }
        state.ops.push(op);
        Ok(())
    }

    fn check_bounds(row: u8, col: u8) -> Result<(), DisplayError> {
        if row >= TEXT_ROWS || col >= PIXEL_COLS {
            return Err(DisplayError::OutOfBounds { row, col });
        }
        Ok(())
    }
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelDisplay for MockDisplay {
    fn power_up(&mut self) -> Result<(), DisplayError> {
        {
            let mut state = self.state.lock().unwrap();
            state.power_up_count += 1;
            state.is_powered = true;
        }
        self.record(DrawOp::PowerUp)
    }

    fn power_down(&mut self) -> Result<(), DisplayError> {
        {
            let mut state = self.state.lock().unwrap();
            state.power_down_count += 1;
            state.is_powered = false;
        }
        self.record(DrawOp::PowerDown)
    }

    fn clear_screen(&mut self) -> Result<(), DisplayError> {
        {
            let mut state = self.state.lock().unwrap();
            state.clear_count += 1;
        }
        self.record(DrawOp::Clear)
    }

    fn draw_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError> {
        Self::check_bounds(row, col)?;
        self.record(DrawOp::Text {
            row,
            col,
            text: text.to_string(),
            inverted: false,
        })
    }

    fn draw_inverted_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError> {
        Self::check_bounds(row, col)?;
        self.record(DrawOp::Text {
            row,
            col,
            text: text.to_string(),
            inverted: true,
        })
    }
}
