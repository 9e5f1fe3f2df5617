/*
 *  display/drivers/sh1106.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  SH1106 OLED driver over I2C (the module fitted to the Boss2)
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

use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use log::info;

use crate::display::error::DisplayError;
use crate::display::traits::{PanelDisplay, PIXEL_COLS, TEXT_ROWS};

const WIDTH: u32 = 128;
const HEIGHT: u32 = 64;
const PAGES: usize = (HEIGHT / 8) as usize;
// SH1106 RAM is 132 columns wide; the 128-wide glass is centered
const COLUMN_OFFSET: u8 = 2;

const CMD_DISPLAY_OFF: u8 = 0xAE;
const CMD_DISPLAY_ON: u8 = 0xAF;

const INIT_SEQUENCE: &[u8] = &[
    0xAE,       // display off during setup
    0xD5, 0x80, // clock divide ratio
    0xA8, 0x3F, // multiplex 1/64
    0xD3, 0x00, // display offset
    0x40,       // start line 0
    0xAD, 0x8B, // charge pump on
    0xA1,       // segment remap
    0xC8,       // COM scan direction remapped
    0xDA, 0x12, // COM pins alternative
    0x81, 0xBF, // contrast
    0xD9, 0x22, // pre-charge period
    0xDB, 0x40, // VCOM deselect
    0xA4,       // resume from RAM
    0xA6,       // normal (non-inverted) polarity
];

/// In-memory page-ordered framebuffer matching the SH1106 RAM layout.
/// Bit n of byte `(y / 8) * 128 + x` is pixel (x, y % 8) of that page.
struct PageBuffer {
    data: [u8; (WIDTH as usize) * PAGES],
}

impl PageBuffer {
    fn new() -> Self {
        Self { data: [0u8; (WIDTH as usize) * PAGES] }
    }

    fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }
        let idx = (y as usize / 8) * WIDTH as usize + x as usize;
        let bit = 1u8 << (y % 8);
        if on {
            self.data[idx] |= bit;
        } else {
            self.data[idx] &= !bit;
        }
    }

    fn page(&self, page: usize) -> &[u8] {
        &self.data[page * WIDTH as usize..(page + 1) * WIDTH as usize]
    }
}

impl DrawTarget for PageBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}

impl OriginDimensions for PageBuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH, HEIGHT)
    }
}

/// SH1106 driver: 8 text rows of 8 pixels on the 128x64 glass.
///
/// Text is rendered into the page buffer with the 5x8 system font and
/// flushed page-by-page. Only the pages touched by a draw are rewritten.
pub struct Sh1106Display {
    i2c: I2cdev,
    address: u8,
    buffer: PageBuffer,
    powered: bool,
}

impl Sh1106Display {
    /// Open the panel on the given I2C bus (e.g. "/dev/i2c-1", 0x3C).
    pub fn open(i2c_bus_path: &str, address: u8) -> Result<Self, DisplayError> {
        info!("Initializing SH1106 on {} at address 0x{:02X}", i2c_bus_path, address);

        let i2c = I2cdev::new(i2c_bus_path)
            .map_err(|e| DisplayError::I2cError(format!("Failed to open {}: {}", i2c_bus_path, e)))?;

        Ok(Self {
            i2c,
            address,
            buffer: PageBuffer::new(),
            powered: false,
        })
    }

    fn command(&mut self, cmd: &[u8]) -> Result<(), DisplayError> {
        // control byte 0x00: command stream
        let mut frame = Vec::with_capacity(cmd.len() + 1);
        frame.push(0x00);
        frame.extend_from_slice(cmd);
        self.i2c
            .write(self.address, &frame)
            .map_err(|e| DisplayError::I2cError(format!("{:?}", e)))
    }

    fn flush_page(&mut self, page: usize) -> Result<(), DisplayError> {
        let col = COLUMN_OFFSET;
        self.command(&[0xB0 | page as u8, col & 0x0F, 0x10 | (col >> 4)])?;

        // control byte 0x40: data stream
        let mut frame = Vec::with_capacity(WIDTH as usize + 1);
        frame.push(0x40);
        frame.extend_from_slice(self.buffer.page(page));
        self.i2c
            .write(self.address, &frame)
            .map_err(|e| DisplayError::I2cError(format!("{:?}", e)))
    }

    fn flush_all(&mut self) -> Result<(), DisplayError> {
        for page in 0..PAGES {
            self.flush_page(page)?;
        }
        Ok(())
    }

    fn draw_band(&mut self, row: u8, col: u8, text: &str, inverted: bool) -> Result<(), DisplayError> {
        if row >= TEXT_ROWS || col >= PIXEL_COLS {
            return Err(DisplayError::OutOfBounds { row, col });
        }

        let y = row as i32 * 8;
        let x = col as i32;
        let width = (text.chars().count() as u32 * 5).min(WIDTH - col as u32);

        let (band, ink) = if inverted {
            (BinaryColor::On, BinaryColor::Off)
        } else {
            (BinaryColor::Off, BinaryColor::On)
        };

        Rectangle::new(Point::new(x, y), Size::new(width, 8))
            .into_styled(PrimitiveStyle::with_fill(band))
            .draw(&mut self.buffer)
            .map_err(|e| DisplayError::DrawingError(format!("{:?}", e)))?;

        let style = MonoTextStyle::new(&FONT_5X8, ink);
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.buffer)
            .map_err(|e| DisplayError::DrawingError(format!("{:?}", e)))?;

        self.flush_page(row as usize)
    }
}

impl PanelDisplay for Sh1106Display {
    fn power_up(&mut self) -> Result<(), DisplayError> {
        if self.powered {
            return Ok(());
        }
        self.command(INIT_SEQUENCE)
            .map_err(|e| DisplayError::InitializationFailed(e.to_string()))?;
        self.flush_all()?;
        self.command(&[CMD_DISPLAY_ON])?;
        self.powered = true;
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), DisplayError> {
        if !self.powered {
            return Ok(());
        }
        self.command(&[CMD_DISPLAY_OFF])?;
        self.powered = false;
        Ok(())
    }

    fn clear_screen(&mut self) -> Result<(), DisplayError> {
        self.buffer = PageBuffer::new();
        self.flush_all()
    }

    fn draw_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError> {
        self.draw_band(row, col, text, false)
    }

    fn draw_inverted_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError> {
        self.draw_band(row, col, text, true)
    }
}
