//! Municipality choropleth example
//!
//! Builds a synthetic 20 x 19 tiling of municipalities, scatters insured
//! amounts over it, and prints the aggregated, classified map plus a coarser
//! regridded view. Run with `RUST_LOG=info` to see the stage logs.

use choropleth::{AttributeValue, JoinMode, Observation, Pipeline, Reducer, Region};
use geo::{Rect, coord};
use std::error::Error;

const COLS: usize = 20;
const ROWS: usize = 19;
const SIDE: f64 = 2_500.0;

fn municipalities() -> Vec<Region> {
    let mut regions = Vec::with_capacity(COLS * ROWS);
    for j in 0..ROWS {
        for i in 0..COLS {
            let (x, y) = (100_000.0 + i as f64 * SIDE, 420_000.0 + j as f64 * SIDE);
            let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + SIDE, y: y + SIDE });
            let code = j * COLS + i;
            regions.push(
                Region::new(format!("GM{:04}", code), rect.to_polygon().into())
                    .with_attribute("name", format!("Municipality {}", code))
                    .with_attribute("coastal", i == 0),
            );
        }
    }
    regions
}

fn observations(n: usize) -> Vec<Observation> {
    let mut state: u64 = 2024;
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n)
        .map(|i| {
            let x = 99_000.0 + next() * (COLS as f64 * SIDE + 2_000.0);
            let y = 419_000.0 + next() * (ROWS as f64 * SIDE + 2_000.0);
            // Amounts rise towards the north east
            let base = 100_000.0 + (x - 100_000.0) * 4.0 + (y - 420_000.0) * 6.0;
            let insured = base * (0.5 + next());
            Observation::from_xy(x, y, insured, format!("{:04}{}", 1000 + i % 9000, "AB"))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== Insured amounts per municipality ===\n");

    let regions = municipalities();
    let observations = observations(20_000);
    println!("{} municipalities, {} postal-code observations\n", regions.len(), observations.len());

    let pipeline = Pipeline::builder()
        .join_mode(JoinMode::Left)
        .reducer(Reducer::Sum)
        .classes(5)
        .build()?;
    let output = pipeline.run(regions, &observations)?;

    let stats = output.join_stats();
    println!(
        "Join: {} assigned, {} outside every municipality",
        stats.assigned, stats.unassigned
    );

    match output.breaks() {
        Ok(breaks) => {
            println!("Natural breaks (GVF {:.3}):", breaks.goodness_of_fit(&output.aggregation().values()));
            for class in 0..breaks.k() {
                if let Some((lo, hi)) = breaks.class_range(class) {
                    let members = output.entries().iter().filter(|e| e.class == Some(class)).count();
                    println!("   class {}: {:>14.0} .. {:>14.0}  ({} municipalities)", class, lo, hi, members);
                }
            }
        }
        Err(e) => println!("Classification failed: {}", e),
    }

    println!("\nFirst municipalities:");
    for entry in output.entries().iter().take(5) {
        let region = output.regions().index_of(&entry.region_id).and_then(|i| output.regions().get(i));
        let name = match region.and_then(|r| r.attribute("name")) {
            Some(AttributeValue::Text(name)) => name.as_str(),
            _ => "?",
        };
        println!(
            "   {} {:<18} value={:?} count={} class={:?}",
            entry.region_id, name, entry.value, entry.count, entry.class
        );
    }

    println!("\n=== Regridded 5 x 5 density map ===\n");
    let coarse = pipeline.regrid(&output, 5, 5)?;
    for (cell, class) in coarse.cells.iter().zip(&coarse.classes) {
        println!(
            "   cell ({}, {}): {:>2} regions, density {:>8.2}, class {:?}",
            cell.ix,
            cell.iy,
            cell.region_count(),
            cell.density.unwrap_or(0.0),
            class
        );
    }

    println!("\n=== Done ===");
    Ok(())
}
