/*
 *  stream.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Current stream parameters from the kernel's per-device hw_params
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

use std::fs;
use std::io;
use std::path::PathBuf;

/// Parameters of the stream currently open on the playback device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// Sample width (the digits of the `S..` format token) and rate in Hz.
    Active { format: String, rate: u32 },
    Closed,
}

impl StreamStatus {
    /// The one-line rendering used on the volume screen.
    pub fn status_line(&self) -> String {
        match self {
            StreamStatus::Active { format, rate } => format!("S{} {}", format, rate),
            StreamStatus::Closed => "No stream".to_string(),
        }
    }
}

/// Parse the kernel hw_params text. A closed device reports the single
/// word `closed`; an open one lists `format:` and `rate:` lines, e.g.
/// `format: S32_LE` and `rate: 44100 (44100/1)`.
pub fn parse_hw_params(contents: &str) -> StreamStatus {
    let mut format = None;
    let mut rate = None;

    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("format:") {
            let token = value.trim();
            // "S32_LE" -> "32"; tolerate shorter tokens
            format = Some(token.chars().skip(1).take(2).collect::<String>());
        } else if let Some(value) = line.strip_prefix("rate:") {
            rate = value.trim().split_whitespace().next().and_then(|v| v.parse::<u32>().ok());
        }
    }

    match (format, rate) {
        (Some(format), Some(rate)) if !format.is_empty() => StreamStatus::Active { format, rate },
        _ => StreamStatus::Closed,
    }
}

/// Source of stream status, mockable for tests.
pub trait StreamProbe: Send {
    fn query(&self) -> io::Result<StreamStatus>;
}

/// Reads the first playback substream of the given card.
pub struct ProcStreamProbe {
    path: PathBuf,
}

impl ProcStreamProbe {
    pub fn for_card(card_index: i32) -> Self {
        Self {
            path: PathBuf::from(format!("/proc/asound/card{}/pcm0p/sub0/hw_params", card_index)),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StreamProbe for ProcStreamProbe {
    fn query(&self) -> io::Result<StreamStatus> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(parse_hw_params(&contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN_PARAMS: &str = "\
access: RW_INTERLEAVED
format: S32_LE
subformat: STD
channels: 2
rate: 44100 (44100/1)
period_size: 1024
buffer_size: 4096
";

    #[test]
    fn test_parse_open_stream() {
        let status = parse_hw_params(OPEN_PARAMS);
        assert_eq!(
            status,
            StreamStatus::Active { format: "32".to_string(), rate: 44100 }
        );
        assert_eq!(status.status_line(), "S32 44100");
    }

    #[test]
    fn test_parse_closed_stream() {
        let status = parse_hw_params("closed\n");
        assert_eq!(status, StreamStatus::Closed);
        assert_eq!(status.status_line(), "No stream");
    }

    #[test]
    fn test_parse_high_rate() {
        let contents = "format: S24_LE\nrate: 192000 (192000/1)\n";
        assert_eq!(
            parse_hw_params(contents).status_line(),
            "S24 192000"
        );
    }

    #[test]
    fn test_parse_empty_is_closed() {
        assert_eq!(parse_hw_params(""), StreamStatus::Closed);
    }
}
