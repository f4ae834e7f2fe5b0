//! # Image Viewer Example
//!
//! Runs one photo through the frame's image pipeline and saves the result
//! as a PNG, so you can check how a picture will look on the panel before
//! copying it to the frame.
//!
//! ## Run it
//! ```sh
//! cargo run --example image_viewer -- path/to/photo.jpg preview.png
//! cargo run --example image_viewer -- photo.jpg preview.png --contrast 1.5 --no-border
//! ```

use clap::Parser;
use epaper_frame::DisplayGeometry;
use epaper_frame::transform::{ImageTransform, TransformOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "image_viewer")]
#[command(about = "Preview how a photo will look on the e-paper panel")]
struct Args {
    /// Path to the image file (PNG or JPEG)
    image_path: PathBuf,

    /// Where to write the 1-bit preview
    #[arg(default_value = "preview.png")]
    output: PathBuf,

    /// Panel width in pixels
    #[arg(long, default_value = "250", value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Panel height in pixels
    #[arg(long, default_value = "122", value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Contrast multiplier applied before dithering
    #[arg(long, default_value = "1.2")]
    contrast: f32,

    /// Skip the 1px border
    #[arg(long)]
    no_border: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let geometry = DisplayGeometry::new(args.width, args.height);

    let options = TransformOptions {
        contrast: args.contrast,
        border_width: (!args.no_border).then_some(1),
        ..TransformOptions::default()
    };
    let transform = ImageTransform::new(geometry, options);

    println!("Loading image: {}", args.image_path.display());
    let bitmap = transform.try_process(&args.image_path)?;
    bitmap.to_luma_image().save(&args.output)?;

    println!(
        "Rendered {}x{} frame ({} black pixels) to {}",
        bitmap.width(),
        bitmap.height(),
        bitmap.black_count(),
        args.output.display()
    );
    Ok(())
}
