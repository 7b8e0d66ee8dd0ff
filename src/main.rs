use std::fs::{File, OpenOptions};
use std::io::BufReader;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use wally_nav::clock::MonotonicClock;
use wally_nav::config::Config;
use wally_nav::drive::{L298n, MotorDriver};
use wally_nav::gps::{self, GpsReceiver};
use wally_nav::heading::{CompassPoint, HeadingFilter};
use wally_nav::link::{
    self, NavReport, REPLY_TARGET_REACHED, StatusReport, TelemetrySchedule, send_line,
};
use wally_nav::magnetometer::Qmc5883l;
use wally_nav::navigation::{NavigationController, NavigationOutcome};

const DEFAULT_CONFIG_PATH: &str = "wally-nav.toml";

// Usage:
//  wally-nav [config.toml]
//  Over the radio link:
//   48.057440,-123.119625  → drive to that coordinate
//   STOP                   → stop and wait for a new target
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    info!("Starting WALLY-S navigation...");

    let mut compass = Qmc5883l::with_config(&config.compass)?;
    let mut filter = HeadingFilter::new(config.compass.alpha, config.compass.declination_rad);
    let mut drive = L298n::with_config(&config.drive)?;

    // GPS receiver shared with its serial reader thread
    let receiver = Arc::new(Mutex::new(GpsReceiver::with_clock(
        config.navigation.min_satellites,
        config.navigation.max_fix_age_ms,
        MonotonicClock::new(),
    )));
    let gps_serial = File::open(&config.serial.gps_device)?;
    let gps_shared = Arc::clone(&receiver);
    thread::spawn(move || {
        if let Err(e) = gps::read_serial(BufReader::new(gps_serial), gps_shared) {
            error!("GPS reader stopped: {}", e);
        }
    });
    info!("Reading GPS from {}", config.serial.gps_device.display());

    let link_in = File::open(&config.serial.link_device)?;
    let mut link_out = OpenOptions::new()
        .write(true)
        .open(&config.serial.link_device)?;
    let (command_tx, commands) = mpsc::channel();
    thread::spawn(move || {
        if let Err(e) = link::read_commands(BufReader::new(link_in), command_tx) {
            error!("Link reader stopped: {}", e);
        }
    });
    info!("Listening for commands on {}", config.serial.link_device.display());

    let mut nav = NavigationController::new(&config);
    let mut telemetry = TelemetrySchedule::new(config.navigation.telemetry_every_ticks);
    let interval = Duration::from_millis(config.navigation.loop_interval_ms);
    let mut link_alive = true;

    info!("Control loop started ({} ms tick)", config.navigation.loop_interval_ms);

    loop {
        let tick_start = Instant::now();

        let heading = filter.get_filtered_heading(&mut compass);
        let fix = match receiver.lock() {
            Ok(gps) => gps.fix(),
            Err(_) => return Err("GPS receiver lock poisoned".into()),
        };

        if link_alive {
            link_alive = link::drain_commands(&commands, &mut nav, &mut link_out);
        }

        let outcome = nav.tick(&fix.coordinate(), heading, fix.fix_valid);
        if outcome == NavigationOutcome::TargetReached {
            send_line(&mut link_out, REPLY_TARGET_REACHED);
        }
        if let Err(e) = drive.apply(outcome.drive_command()) {
            warn!("Drive command failed: {}", e);
        }

        if telemetry.tick() {
            let line = match nav.active_target() {
                Some(target) if fix.fix_valid => {
                    NavReport::between(fix.coordinate(), target).to_string()
                }
                _ => StatusReport {
                    heading,
                    target_bearing: 0.0,
                    distance: 0.0,
                    fix_valid: fix.fix_valid,
                }
                .to_string(),
            };
            send_line(&mut link_out, &line);

            info!(
                "Status: H={:.1}° ({}) GPS={} Sats={} Nav={}",
                heading,
                CompassPoint::from_heading(heading),
                if fix.fix_valid { "OK" } else { "NO" },
                fix.satellites,
                if nav.active_target().is_some() { "YES" } else { "NO" }
            );
        }

        thread::sleep(interval.saturating_sub(tick_start.elapsed()));
    }
}
