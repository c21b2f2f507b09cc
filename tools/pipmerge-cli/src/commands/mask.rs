//! Render a mask image.

use std::path::PathBuf;

use pipmerge_graph::AlphaMask;

pub fn run(size: u32, feather: u32, output: PathBuf) -> anyhow::Result<()> {
    if feather > size / 2 {
        tracing::warn!(
            size,
            feather,
            "Feather exceeds the radius and will be clamped to it"
        );
    }

    let mask = AlphaMask::generate(size, feather)?;
    let png = mask.to_png()?;
    std::fs::write(&output, png)?;

    println!(
        "Mask written: {} ({size}x{size}, {feather}px feather)",
        output.display()
    );
    Ok(())
}
