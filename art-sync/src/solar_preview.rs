//! Solar brightness preview tables.
//!
//! Prints, for the March equinox and both solstices of the current year, the
//! hourly sun elevation and resulting brightness level with a bar-chart
//! visualization. Purely local output, used to tune a location and
//! brightness range before letting the service touch any device.

use chrono::{Datelike, TimeZone, Utc};

use art_sync_core::brightness::{brightness_from_elevation, elevation_degrees};
use art_sync_core::config::SolarConfig;

const LINE_WIDTH: usize = 80;
const BAR_WIDTH: usize = 40;

pub fn run(solar: &SolarConfig) {
    let year = Utc::now().year();
    // Hemisphere-neutral naming: seasons are reversed south of the equator.
    let dates = [
        (3, 20, "March Equinox"),
        (6, 21, "June Solstice"),
        (12, 21, "December Solstice"),
    ];
    for (month, day, name) in dates {
        print_hourly(solar, year, month, day, name);
    }
    print_method_footer();
}

fn print_hourly(solar: &SolarConfig, year: i32, month: u32, day: u32, name: &str) {
    let rule = "=".repeat(LINE_WIDTH);
    println!("\n{rule}");
    println!("{name} - {year}/{month:02}/{day:02}");
    println!(
        "Location: {}°, {}° ({})",
        solar.latitude, solar.longitude, solar.timezone
    );
    println!(
        "Brightness range: {} (min) to {} (max)",
        solar.brightness_min, solar.brightness_max
    );
    println!("{rule}");
    println!(
        "{:<12} {:<20} {:<15} {}",
        "Time", "Sun Elevation", "Brightness", "Visual"
    );
    println!("{}", "-".repeat(LINE_WIDTH));

    for hour in 0..24 {
        // Skip local times that do not exist (DST gap).
        let Some(local) = solar
            .timezone
            .with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
        else {
            continue;
        };
        let elevation = elevation_degrees(solar.latitude, solar.longitude, local.with_timezone(&Utc));
        let level = brightness_from_elevation(elevation, solar.brightness_min, solar.brightness_max);

        let span = (solar.brightness_max - solar.brightness_min) as f64;
        let filled = (((level - solar.brightness_min) as f64 / span) * BAR_WIDTH as f64) as usize;
        let bar = "█".repeat(filled);

        let elevation_display = if elevation < 0.0 {
            format!("{elevation:6.2}° (below)")
        } else {
            format!("{elevation:6.2}°")
        };
        println!(
            "{:<12} {:<20} {:<15} {}",
            local.format("%I:%M %p").to_string(),
            elevation_display,
            level,
            bar
        );
    }
}

fn print_method_footer() {
    let rule = "=".repeat(LINE_WIDTH);
    println!("\n{rule}");
    println!("Calculation Method:");
    println!("  - Sun below horizon (<=0°): brightness = BRIGHTNESS_MIN");
    println!("  - Above horizon: atmospheric air mass model");
    println!("    Air Mass = 1 / (sin(elev) + 0.50572 x (elev + 6.07995)^-1.6364) [Kasten-Young]");
    println!("    Relative Irradiance = 0.7^(AM^0.678)");
    println!("    Brightness = MIN + floor((MAX - MIN) x Relative Irradiance)");
    println!("{rule}\n");
}

/// Shown when the preview is invoked without a configured location.
pub fn print_location_help() {
    let rule = "=".repeat(LINE_WIDTH);
    println!("\n{rule}");
    println!("The solar preview needs a location. Please set:");
    println!("  LOCATION_LATITUDE    (e.g. 42.3601)");
    println!("  LOCATION_LONGITUDE   (e.g. -71.0589)");
    println!("  LOCATION_TIMEZONE    (e.g. America/New_York)");
    println!("\nOptional:");
    println!("  BRIGHTNESS_MIN       (default: 2)");
    println!("  BRIGHTNESS_MAX       (default: 10)");
    println!("\nExample:");
    println!("  LOCATION_LATITUDE=42.3601 LOCATION_LONGITUDE=-71.0589 \\");
    println!("  LOCATION_TIMEZONE=America/New_York art-sync solar-preview");
    println!("{rule}\n");
}
