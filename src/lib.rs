//! Core of the e-paper picture frame.
//!
//! This crate turns a directory of photos into 1-bit frames for a small
//! e-paper panel and pushes them on a timer:
//! - [`transform`] converts a photo (or a status message) into a [`Bitmap`]
//! - [`display`] drives the real panel or a simulated one that writes PNGs
//! - [`frame`] owns the image list, the cursor and the refresh cadence
//!
//! Configuration, logging setup and directory scanning live in [`config`],
//! [`logging`] and [`media`].

pub mod bitmap;
pub mod config;
pub mod display;
pub mod frame;
pub mod logging;
pub mod media;
pub mod transform;

pub use bitmap::Bitmap;
pub use config::FrameConfig;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Display geometry ───────────────────────────────────────────────

/// Pixel dimensions of the target panel.
///
/// Set once at startup and copied into every component that needs it.
/// The default matches the Waveshare 2.13" HAT mounted in landscape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero, i.e. there is nothing to draw on.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, used to decide which side of a photo to fit.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// The same panel rotated by 90 degrees.
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self {
            width: 250,
            height: 122,
        }
    }
}

// ── Shutdown signal ────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// The frame loop polls the returned flag while it waits between
/// refreshes, so an interrupt stops it within one poll interval.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn geometry_default_is_2in13_landscape() {
        let geometry = DisplayGeometry::default();
        assert_eq!(geometry.width, 250);
        assert_eq!(geometry.height, 122);
    }

    #[rstest]
    #[case(250, 122, false)]
    #[case(1, 1, false)]
    #[case(0, 122, true)]
    #[case(250, 0, true)]
    fn test_is_empty(#[case] width: u32, #[case] height: u32, #[case] expected: bool) {
        assert_eq!(DisplayGeometry::new(width, height).is_empty(), expected);
    }

    #[test]
    fn transposed_swaps_sides() {
        let geometry = DisplayGeometry::new(250, 122).transposed();
        assert_eq!(geometry, DisplayGeometry::new(122, 250));
    }

    #[test]
    fn aspect_ratio_is_width_over_height() {
        assert_eq!(DisplayGeometry::new(200, 100).aspect_ratio(), 2.0);
    }

    #[test]
    fn is_running_reads_flag() {
        let flag = AtomicBool::new(true);
        assert!(is_running(&flag));
        flag.store(false, Ordering::SeqCst);
        assert!(!is_running(&flag));
    }
}
