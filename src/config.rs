/*
 *  config.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
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

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::remote::VolumeProfile;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,
    /// Named volume/idle preset: "boss2" (default) or "compact"
    pub profile: Option<ProfileKind>,
    /// ALSA card name to attach to
    pub card_name: Option<String>,
    /// Label shown on the sysinfo screen
    pub product_label: Option<String>,
    /// Idle ticks before the display powers off (overrides the profile)
    pub idle_threshold: Option<u32>,
    /// Stream status poll period in seconds
    pub poll_interval_secs: Option<u64>,
    pub display: Option<DisplayConfig>,
    pub player: Option<PlayerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub i2c_bus: Option<String>,   // e.g. "/dev/i2c-1"
    pub i2c_address: Option<u8>,   // e.g. 0x3C
}

/// Where the playback daemon lives. A socket path takes precedence over
/// host/port.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Shipped appliance behavior: 0-255 range, 2/1 steps, idle 50
    Boss2,
    /// Percent-style mixer: 0-100 range, single steps, idle 30
    Compact,
}

/// Resolved volume/idle behavior for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelProfile {
    pub volume: VolumeProfile,
    pub idle_threshold: u32,
}

impl ProfileKind {
    pub fn resolve(self) -> PanelProfile {
        match self {
            ProfileKind::Boss2 => PanelProfile {
                volume: VolumeProfile::BOSS2,
                idle_threshold: 50,
            },
            ProfileKind::Compact => PanelProfile {
                volume: VolumeProfile::COMPACT,
                idle_threshold: 30,
            },
        }
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "dacpanel", about = "Boss2 front panel daemon", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Shorthand for --log-level debug
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long, value_enum)]
    pub profile: Option<ProfileKind>,
    #[arg(long)]
    pub card_name: Option<String>,
    #[arg(long)]
    pub idle_threshold: Option<u32>,
    #[arg(long)]
    pub mpd_host: Option<String>,
    #[arg(long)]
    pub mpd_port: Option<u16>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub mpd_socket: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    load_with(cli)
}

pub fn load_with(cli: Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

impl Config {
    pub fn profile(&self) -> PanelProfile {
        let mut profile = self.profile.unwrap_or(ProfileKind::Boss2).resolve();
        if let Some(t) = self.idle_threshold {
            profile.idle_threshold = t;
        }
        profile
    }

    pub fn card_name(&self) -> &str {
        self.card_name.as_deref().unwrap_or("Allo Boss2")
    }

    pub fn product_label(&self) -> &str {
        self.product_label.as_deref().unwrap_or("BOSS2")
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs.unwrap_or(3)
    }
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/dacpanel/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/dacpanel/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/dacpanel.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["dacpanel.yaml", "config.yaml", "/etc/dacpanel.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()          { dst.log_level = src.log_level; }
    if src.profile.is_some()            { dst.profile = src.profile; }
    if src.card_name.is_some()          { dst.card_name = src.card_name; }
    if src.product_label.is_some()      { dst.product_label = src.product_label; }
    if src.idle_threshold.is_some()     { dst.idle_threshold = src.idle_threshold; }
    if src.poll_interval_secs.is_some() { dst.poll_interval_secs = src.poll_interval_secs; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => {
            if s.i2c_bus.is_some()     { d.i2c_bus = s.i2c_bus; }
            if s.i2c_address.is_some() { d.i2c_address = s.i2c_address; }
        }
        _ => {}
    }
    match (&mut dst.player, src.player) {
        (None, Some(c)) => dst.player = Some(c),
        (Some(d), Some(s)) => {
            if s.host.is_some()   { d.host = s.host; }
            if s.port.is_some()   { d.port = s.port; }
            if s.socket.is_some() { d.socket = s.socket; }
        }
        _ => {}
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()      { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                    { cfg.log_level = Some("debug".to_string()); }
    if cli.profile.is_some()        { cfg.profile = cli.profile; }
    if cli.card_name.is_some()      { cfg.card_name = cli.card_name.clone(); }
    if cli.idle_threshold.is_some() { cfg.idle_threshold = cli.idle_threshold; }

    let any_player = cli.mpd_host.is_some() || cli.mpd_port.is_some() || cli.mpd_socket.is_some();
    if any_player && cfg.player.is_none() {
        cfg.player = Some(PlayerConfig::default());
    }
    if let Some(player) = cfg.player.as_mut() {
        if cli.mpd_host.is_some()   { player.host = cli.mpd_host.clone(); }
        if cli.mpd_port.is_some()   { player.port = cli.mpd_port; }
        if cli.mpd_socket.is_some() { player.socket = cli.mpd_socket.clone(); }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(t) = cfg.idle_threshold {
        if t == 0 {
            return Err(ConfigError::Validation("idle_threshold must be > 0".into()));
        }
    }
    if let Some(secs) = cfg.poll_interval_secs {
        if secs == 0 {
            return Err(ConfigError::Validation("poll_interval_secs must be > 0".into()));
        }
    }
    if let Some(player) = cfg.player.as_ref() {
        if player.socket.is_none() && player.host.is_none() {
            return Err(ConfigError::Validation(
                "player needs either a socket path or a host".into(),
            ));
        }
    }
    Ok(())
}
