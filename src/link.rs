//! Radio link protocol: line-oriented commands in, status lines out.
//!
//! Incoming commands are either `STOP` or a destination written as
//! `LAT,LNG` in decimal degrees. Outgoing telemetry is comma separated:
//!
//! ```text
//! STATUS,<heading>,<target bearing>,<distance>,<fix 0|1>
//! NAV,<lat>,<lon>,<target lat>,<target lon>,<distance>,<bearing>
//! ```

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use log::{debug, warn};

use crate::clock::Clock;
use crate::geo::{self, GeoCoordinate};
use crate::navigation::NavigationController;

pub const REPLY_TARGET_SET: &str = "Objective set";
pub const REPLY_STOPPED: &str = "Navigation stopped";
pub const REPLY_TARGET_REACHED: &str = "Target reached!";
pub const REPLY_INVALID: &str = "Invalid format. Use: LAT,LNG";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("malformed command '{0}'")]
    Malformed(String),

    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetTarget(GeoCoordinate),
    Stop,
}

impl FromStr for Command {
    type Err = CommandError;

    /// Out of range coordinates are rejected, never clamped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        if line == "STOP" {
            return Ok(Command::Stop);
        }

        let malformed = || CommandError::Malformed(line.to_string());
        let (lat, lon) = line.split_once(',').ok_or_else(malformed)?;
        let latitude: f64 = lat.trim().parse().map_err(|_| malformed())?;
        let longitude: f64 = lon.trim().parse().map_err(|_| malformed())?;

        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CommandError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CommandError::LongitudeOutOfRange(longitude));
        }

        Ok(Command::SetTarget(GeoCoordinate::new(latitude, longitude)))
    }
}

/// Drop everything outside printable ASCII, as the link may inject
/// control bytes between lines.
pub fn sanitize_line(raw: &str) -> String {
    raw.chars().filter(|c| (' '..='~').contains(c)).collect()
}

/// Periodic summary sent whether or not a target is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub heading: f64,
    pub target_bearing: f64,
    pub distance: f64,
    pub fix_valid: bool,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "STATUS,{:.1},{:.1},{:.1},{}",
            self.heading,
            self.target_bearing,
            self.distance,
            u8::from(self.fix_valid)
        )
    }
}

/// Full navigation fix, sent while a target is active and the fix is good.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavReport {
    pub current: GeoCoordinate,
    pub target: GeoCoordinate,
    pub distance: f64,
    pub bearing: f64,
}

impl NavReport {
    pub fn between(current: GeoCoordinate, target: GeoCoordinate) -> Self {
        Self {
            current,
            target,
            distance: geo::distance(&current, &target),
            bearing: geo::bearing(&current, &target),
        }
    }
}

impl fmt::Display for NavReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NAV,{:.6},{:.6},{:.6},{:.6},{:.1},{:.1}",
            self.current.latitude,
            self.current.longitude,
            self.target.latitude,
            self.target.longitude,
            self.distance,
            self.bearing
        )
    }
}

/// Decides which control ticks emit telemetry, independent of the tick
/// period itself.
#[derive(Debug, Clone)]
pub struct TelemetrySchedule {
    every: u32,
    counter: u32,
}

impl TelemetrySchedule {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            counter: 0,
        }
    }

    /// Count one tick; true on every `every`th call.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.every {
            self.counter = 0;
            true
        } else {
            false
        }
    }
}

/// Read link lines and forward each parsed command until EOF or until the
/// receiving side hangs up.
pub fn read_commands<R: BufRead>(
    reader: R,
    commands: Sender<Result<Command, CommandError>>,
) -> io::Result<()> {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => sanitize_line(&line),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("Dropping undecodable link line: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        };
        if line.is_empty() {
            continue;
        }

        debug!("Link << {}", line);
        if commands.send(line.parse()).is_err() {
            return Ok(());
        }
    }
    Ok(())
}

/// Apply one received command to `nav` and return the reply to send back.
pub fn apply_command<C: Clock>(
    nav: &mut NavigationController<C>,
    command: Result<Command, CommandError>,
) -> &'static str {
    match command {
        Ok(Command::Stop) => {
            nav.stop();
            REPLY_STOPPED
        }
        Ok(Command::SetTarget(target)) => {
            if nav.set_target(target) {
                REPLY_TARGET_SET
            } else {
                REPLY_INVALID
            }
        }
        Err(e) => {
            warn!("Rejected link command: {}", e);
            REPLY_INVALID
        }
    }
}

/// Write `line` to the link. A failed write is logged and otherwise
/// ignored; the control loop carries on without the link.
pub fn send_line<W: Write>(link_out: &mut W, line: &str) {
    if let Err(e) = writeln!(link_out, "{}", line) {
        warn!("Link write failed: {}", e);
    }
}

/// Apply every queued command without blocking, replying to each.
/// Returns false once the reader side has hung up.
pub fn drain_commands<C: Clock, W: Write>(
    commands: &Receiver<Result<Command, CommandError>>,
    nav: &mut NavigationController<C>,
    link_out: &mut W,
) -> bool {
    loop {
        match commands.try_recv() {
            Ok(command) => send_line(link_out, apply_command(nav, command)),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => {
                warn!("Radio link closed; continuing without commands");
                return false;
            }
        }
    }
}
