//! Example: Write a tomography volume to EMD, inspect it and read it back
//!
//! Run with: cargo run --example tomography_volume

use emd_volume::{ElementType, Volume};
use ndarray::Array3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("EMD Volume Example: Tomography");
    println!("==============================\n");

    // A 64^3 sphere phantom
    let n = 64;
    let center = (n as f32 - 1.0) / 2.0;
    let phantom = Array3::from_shape_fn((n, n, n), |(x, y, z)| {
        let d = ((x as f32 - center).powi(2)
            + (y as f32 - center).powi(2)
            + (z as f32 - center).powi(2))
        .sqrt();
        if d < n as f32 / 3.0 {
            200u8
        } else {
            10u8
        }
    });
    let volume = Volume::from_array(phantom)?;
    println!("Volume: {}", volume.summary());
    if let Some(range) = volume.value_range() {
        println!("  Value range: {} - {}", range.min, range.max);
    }
    println!();

    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("phantom.emd");
    println!("Writing to: {}", path.display());
    emd_volume::write(&path, &volume)?;
    println!("✓ Written\n");

    let header = emd_volume::inspect(&path)?;
    println!("Header:");
    println!("  {}", header.summary());
    for axis in &header.axes {
        println!("  {} [{}]: {} - {}", axis.name, axis.units, axis.start, axis.end);
    }
    println!("{}\n", header.to_json()?);

    let loaded = emd_volume::read(&path)?;
    assert_eq!(loaded.element_type(), ElementType::U8);
    assert_eq!(loaded, volume);
    println!("✓ Read back {} identical voxels", loaded.voxel_count());

    println!("\n✓ Example complete!");
    Ok(())
}
