/*
 *  main.rs
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

use std::sync::{Arc, Mutex};
use std::time::Duration;

use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use dacpanel::audio::AudioControl;
use dacpanel::config;
use dacpanel::display::traits::PanelDisplay;
use dacpanel::idle::{IdleCounter, IdlePowerManager};
use dacpanel::input;
use dacpanel::playback::{MpdEndpoint, MpdTransport, ReconnectingClient};
use dacpanel::poller::BackgroundPoller;
use dacpanel::remote::{RemoteEvent, RemoteListener};
use dacpanel::screen::{BootInfo, ButtonEvent, Panel};
use dacpanel::stream::{ProcStreamProbe, StreamProbe};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and returns so main can power the
/// panel down on the way out.
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Hostname plus first IPv4 on the wired and wireless interfaces, read
/// once at startup for the sysinfo screen.
fn gather_boot_info(label: &str) -> BootInfo {
    let hostname = std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let mut eth_ip = String::new();
    let mut wlan_ip = String::new();
    match local_ip_address::list_afinet_netifas() {
        Ok(netifas) => {
            for (name, ip) in netifas {
                if !ip.is_ipv4() {
                    continue;
                }
                if eth_ip.is_empty() && (name.starts_with("eth") || name.starts_with("en")) {
                    eth_ip = ip.to_string();
                } else if wlan_ip.is_empty()
                    && (name.starts_with("wlan") || name.starts_with("wl"))
                {
                    wlan_ip = ip.to_string();
                }
            }
        }
        Err(e) => warn!("could not enumerate interfaces: {}", e),
    }
    BootInfo {
        label: label.to_string(),
        host_line: format!("HOST: {}", hostname),
        eth_ip,
        wlan_ip,
    }
}

#[cfg(feature = "driver-sh1106")]
fn open_display(cfg: &config::Config) -> Result<Box<dyn PanelDisplay>, Box<dyn std::error::Error>> {
    use dacpanel::display::drivers::sh1106::Sh1106Display;
    let (bus, address) = match cfg.display.as_ref() {
        Some(d) => (
            d.i2c_bus.clone().unwrap_or_else(|| "/dev/i2c-1".to_string()),
            d.i2c_address.unwrap_or(0x3C),
        ),
        None => ("/dev/i2c-1".to_string(), 0x3C),
    };
    info!("opening SH1106 on {} at 0x{:02X}", bus, address);
    Ok(Box::new(Sh1106Display::open(&bus, address)?))
}

#[cfg(not(feature = "driver-sh1106"))]
fn open_display(_cfg: &config::Config) -> Result<Box<dyn PanelDisplay>, Box<dyn std::error::Error>> {
    use dacpanel::display::drivers::mock::MockDisplay;
    info!("no display driver built in, drawing to a mock panel");
    Ok(Box::new(MockDisplay::new()))
}

/// Mixer handle plus the ALSA card index for the /proc stream probe.
#[cfg(feature = "hw-alsa")]
fn open_audio(cfg: &config::Config) -> Result<(Arc<dyn AudioControl>, i32), Box<dyn std::error::Error>> {
    use dacpanel::audio::AlsaAudioControl;
    let audio = AlsaAudioControl::open(cfg.card_name())?;
    let index = audio.card_index();
    info!("mixer '{}' is card {}", cfg.card_name(), index);
    Ok((Arc::new(audio), index))
}

#[cfg(not(feature = "hw-alsa"))]
fn open_audio(_cfg: &config::Config) -> Result<(Arc<dyn AudioControl>, i32), Box<dyn std::error::Error>> {
    use dacpanel::audio::MockAudioControl;
    info!("no mixer driver built in, using a mock mixer");
    Ok((Arc::new(MockAudioControl::new()), 0))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load()?;
    let log_level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    info!(
        "dacpanel {} (built {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_DATE
    );

    let profile = cfg.profile();
    let (audio, card_index) = open_audio(&cfg)?;
    let display = open_display(&cfg)?;
    let probe: Box<dyn StreamProbe> = Box::new(ProcStreamProbe::for_card(card_index));
    let boot = gather_boot_info(cfg.product_label());

    let panel = Arc::new(Mutex::new(Panel::new(
        display,
        Arc::clone(&audio),
        probe,
        boot,
    )));
    {
        let mut panel = panel.lock().unwrap_or_else(|e| e.into_inner());
        panel.power_on()?;
        if let Err(e) = panel.show_boot_screen() {
            error!("boot screen draw failed: {}", e);
        }
    }

    let counter = IdleCounter::new();

    // idle power loop, 1 Hz
    let idle = IdlePowerManager::new(counter.clone(), profile.idle_threshold);
    tokio::spawn(idle.run(Arc::clone(&panel)));

    // stream parameter poller
    let poller = BackgroundPoller::new(
        Arc::clone(&panel),
        counter.clone(),
        Duration::from_secs(cfg.poll_interval_secs()),
    );
    tokio::spawn(poller.run());

    // front-panel buttons
    let (button_tx, button_rx) = mpsc::channel::<ButtonEvent>(32);
    tokio::spawn(input::run_dispatcher(
        button_rx,
        Arc::clone(&panel),
        counter.clone(),
    ));
    #[cfg(feature = "hw-input")]
    input::spawn_button_source(button_tx.clone());
    #[cfg(not(feature = "hw-input"))]
    drop(button_tx);

    // IR remote, with an optional playback client behind it
    let player = match cfg.player.as_ref() {
        Some(p) => {
            let endpoint = match (&p.socket, &p.host) {
                (Some(path), _) => MpdEndpoint::Unix(path.clone()),
                (None, Some(host)) => MpdEndpoint::Tcp {
                    host: host.clone(),
                    port: p.port.unwrap_or(6600),
                },
                (None, None) => unreachable!("validated at load"),
            };
            match ReconnectingClient::connect(MpdTransport::new(endpoint)).await {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("player unavailable, transport keys disabled: {}", e);
                    None
                }
            }
        }
        None => None,
    };
    let (remote_tx, remote_rx) = mpsc::channel::<RemoteEvent>(32);
    let listener = RemoteListener::new(
        remote_rx,
        Arc::clone(&panel),
        Arc::clone(&audio),
        player,
        counter.clone(),
        profile.volume,
    );
    tokio::spawn(listener.run());
    #[cfg(feature = "hw-input")]
    dacpanel::remote::spawn_ir_source(remote_tx.clone());
    #[cfg(not(feature = "hw-input"))]
    drop(remote_tx);

    tokio::select! {
        result = signal_handler() => {
            if let Err(e) = result {
                error!("signal handler failed: {}", e);
            }
        }
    }

    let mut panel = panel.lock().unwrap_or_else(|e| e.into_inner());
    if let Err(e) = panel.power_off() {
        warn!("display power down on exit failed: {}", e);
    }
    info!("dacpanel stopped");
    Ok(())
}
