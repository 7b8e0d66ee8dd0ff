use std::thread;
use std::time::Duration;

use wally_nav::config::{CompassConfig, Config};
use wally_nav::magnetometer::Qmc5883l;

const SAMPLE_INTERVAL_MS: u64 = 100;
const DEFAULT_SAMPLES: u32 = 600;

// Usage:
//  calibrate [config.toml] [samples]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let total_samples: u32 = match args.next() {
        Some(n) => n.parse()?,
        None => DEFAULT_SAMPLES,
    };

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║     QMC5883L Hard Iron Calibration                   ║");
    println!("╚══════════════════════════════════════════════════════╝\n");

    println!("Instructions:");
    println!("1. Keep the vehicle LEVEL (horizontal)");
    println!("2. Slowly rotate it through a FULL 360° circle");
    println!(
        "3. Sampling stops after {} samples (~{} seconds)\n",
        total_samples,
        total_samples as u64 * SAMPLE_INTERVAL_MS / 1000
    );

    println!("Starting in 5 seconds...\n");
    thread::sleep(Duration::from_secs(5));

    // Existing offsets are ignored: calibration wants raw counts
    let mut compass = Qmc5883l::with_config(&CompassConfig {
        x_offset: 0.0,
        y_offset: 0.0,
        ..config.compass
    })?;

    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    let mut sample_count = 0;

    println!("Collecting samples... (ROTATE NOW!)");
    println!(
        "\n{:^8} | {:^20} | {:^20} | {:^20}",
        "Sample", "X Range", "Y Range", "Calculated Offsets"
    );
    println!("{:-<8}-+-{:-<20}-+-{:-<20}-+-{:-<20}", "", "", "", "");

    while sample_count < total_samples {
        if let Ok((x, y)) = compass.read_uncorrected() {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);

            sample_count += 1;

            if sample_count % 10 == 0 {
                println!(
                    "{:^8} | {:>7.0} to {:>7.0} | {:>7.0} to {:>7.0} | X: {:>7.0}  Y: {:>7.0}",
                    sample_count,
                    x_min,
                    x_max,
                    y_min,
                    y_max,
                    (x_min + x_max) / 2.0,
                    (y_min + y_max) / 2.0
                );
            }
        }

        thread::sleep(Duration::from_millis(SAMPLE_INTERVAL_MS));
    }

    if total_samples == 0 {
        println!("\nNo samples collected.");
        return Ok(());
    }

    println!("\nDone. Add this to your configuration file:\n");
    println!("[compass]");
    println!("x_offset = {:.1}", (x_min + x_max) / 2.0);
    println!("y_offset = {:.1}", (y_min + y_max) / 2.0);

    Ok(())
}
