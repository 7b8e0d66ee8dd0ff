pub mod clock;
pub mod config;
pub mod drive;
pub mod geo;
pub mod gps;
pub mod heading;
pub mod link;
pub mod magnetometer;
pub mod navigation;
pub mod pid;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use geo::GeoCoordinate;
pub use heading::HeadingFilter;
pub use navigation::{NavigationController, NavigationOutcome, NavigationState};
pub use pid::{PidController, heading_error};

#[cfg(test)]
pub(crate) mod mocks;
