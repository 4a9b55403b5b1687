use anyhow::Result;
use apz::EffectiveSlopeBucket;
use std::path::PathBuf;

use super::classify::load_table;

pub fn run(path: Option<PathBuf>, json: bool) -> Result<()> {
    let table = load_table(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("Table: {}", table.version);
    println!("Fallback (not classified): {}m", table.fallback_distance_m);
    println!();

    print!("{:<20}", "Fuel class");
    for bucket in EffectiveSlopeBucket::ALL {
        print!("  {:>15}", bucket.label());
    }
    println!();
    println!("{:-<105}", "");

    for row in &table.rows {
        print!("{:<20}", row.fuel_class.key());
        for distance in row.distances() {
            match distance {
                Some(d) => print!("  {:>15}", d),
                None => print!("  {:>15}", "-"),
            }
        }
        println!();
    }
    Ok(())
}
