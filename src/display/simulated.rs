//! Panel stand-in for machines without the HAT: every frame becomes a PNG.

use super::{Panel, PanelError};
use crate::Bitmap;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `frame_0000.png`, `frame_0001.png`, ... into an output directory.
///
/// The index only ever goes up, one per successful `show`.
pub struct SimulatedPanel {
    output_dir: PathBuf,
    next_index: u64,
}

impl SimulatedPanel {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            next_index: 0,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the next frame will be written to.
    pub fn next_frame_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("frame_{:04}.png", self.next_index))
    }
}

impl Panel for SimulatedPanel {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(&mut self) -> Result<(), PanelError> {
        fs::create_dir_all(&self.output_dir)?;
        tracing::info!(
            "Simulated display writing frames to {}",
            self.output_dir.display()
        );
        Ok(())
    }

    fn show(&mut self, frame: &Bitmap, full_refresh: bool) -> Result<(), PanelError> {
        let path = self.next_frame_path();
        frame.to_luma_image().save(&path)?;
        self.next_index += 1;
        tracing::info!(
            "Simulated display (saved to {}{})",
            path.display(),
            if full_refresh { ", full refresh" } else { "" }
        );
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        Ok(())
    }

    fn wake(&mut self) -> Result<(), PanelError> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        Ok(())
    }
}
