/*
 *  display/traits.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Core trait definition for the front panel display
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

use crate::display::error::DisplayError;

/// Text row addressing for the panel: 8 rows of 8-pixel bands on a 128x64
/// module. `row` is the text band (0-7), `col` is the pixel column (0-127).
pub const TEXT_ROWS: u8 = 8;
pub const PIXEL_COLS: u8 = 128;

/// Minimal hardware abstraction - every panel display must implement this.
///
/// The panel is a character-cell surface: the state machine addresses it by
/// text row and pixel column, never by raw pixels. All five operations must
/// be safe to call repeatedly; `power_up`/`power_down` in particular are
/// driven by the idle power loop and must be idempotent.
pub trait PanelDisplay: Send {
    /// Power the module on and re-initialize the controller.
    fn power_up(&mut self) -> Result<(), DisplayError>;

    /// Power the module off. The framebuffer contents need not survive.
    fn power_down(&mut self) -> Result<(), DisplayError>;

    /// Blank the whole surface.
    fn clear_screen(&mut self) -> Result<(), DisplayError>;

    /// Draw `text` at the given text row / pixel column, light-on-dark.
    fn draw_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError>;

    /// Draw `text` at the given text row / pixel column, dark-on-light.
    /// Used for the menu cursor and confirm highlights.
    fn draw_inverted_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError>;
}
