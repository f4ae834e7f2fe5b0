//! Display adapter: the only code that talks to the panel.
//!
//! A [`Panel`] is one concrete output, either the real e-paper HAT
//! ([`EpaperPanel`], behind the `hardware` feature) or [`SimulatedPanel`],
//! which saves every frame as a numbered PNG. [`DisplayAdapter`] wraps a
//! panel with the power-state bookkeeping and turns every panel error into
//! a logged `false`, so a flaky SPI bus never takes the frame loop down.
//!
//! ```text
//! Uninitialized --initialize--> Ready --sleep--> Sleeping
//!                                ^  ^                 |
//!                                |  +---- display ----+
//!                             reopen                  |
//!                                |                    |
//!                             Faulted <-- failed wake-+
//! ```
//!
//! A panel that stops answering is re-opened (full re-init and clear) on
//! the next `display` or `clear`, so one BUSY timeout doesn't freeze the
//! frame until restart.

#[cfg(feature = "hardware")]
pub mod epaper;
pub mod simulated;

#[cfg(feature = "hardware")]
pub use epaper::{EpaperPanel, PinConfig};
pub use simulated::SimulatedPanel;

use crate::config::{DisplayMode, FrameConfig};
use crate::{Bitmap, DisplayGeometry};
use std::path::PathBuf;
use tracing::Span;

/// Errors coming back from a panel. Never escapes the adapter.
pub type PanelError = Box<dyn std::error::Error>;

/// One physical or simulated output device.
pub trait Panel {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Acquire the device and leave it cleared to white.
    fn open(&mut self) -> Result<(), PanelError>;

    /// Push a frame. With `full_refresh` the panel is re-initialised and
    /// cleared first, which removes ghosting at the cost of a slow flash.
    fn show(&mut self, frame: &Bitmap, full_refresh: bool) -> Result<(), PanelError>;

    /// Enter the lowest-power state. The image stays on the glass.
    fn sleep(&mut self) -> Result<(), PanelError>;

    /// Leave the sleep state so the panel accepts commands again.
    fn wake(&mut self) -> Result<(), PanelError>;

    /// Full clear to white.
    fn clear(&mut self) -> Result<(), PanelError>;
}

/// Power state tracked by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Ready,
    Sleeping,
    /// Was open, then lost. Re-opened before the next write.
    Faulted,
}

pub struct DisplayAdapter {
    panel: Box<dyn Panel>,
    geometry: DisplayGeometry,
    /// Where to write frames if the panel can't be opened.
    fallback: Option<PathBuf>,
    state: AdapterState,
    refresh_count: u64,
    span: Span,
}

impl DisplayAdapter {
    pub fn new(panel: Box<dyn Panel>, geometry: DisplayGeometry) -> Self {
        Self {
            panel,
            geometry,
            fallback: None,
            state: AdapterState::Uninitialized,
            refresh_count: 0,
            span: tracing::info_span!("display"),
        }
    }

    /// Degrade to a [`SimulatedPanel`] writing into `output_dir` if the
    /// panel fails to open.
    pub fn with_simulation_fallback(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.fallback = Some(output_dir.into());
        self
    }

    /// Pick the panel the configuration asks for.
    ///
    /// `force_simulation` overrides the configured mode. Asking for
    /// hardware in a build without the `hardware` feature is an error;
    /// `auto` quietly becomes simulation.
    pub fn from_config(
        config: &FrameConfig,
        force_simulation: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let geometry = config.geometry();
        let output_dir = config.display.simulation_output.clone();
        let mode = if force_simulation {
            DisplayMode::Simulation
        } else {
            config.display.mode
        };

        let adapter = match mode {
            DisplayMode::Simulation => {
                Self::new(Box::new(SimulatedPanel::new(output_dir)), geometry)
            }
            #[cfg(feature = "hardware")]
            DisplayMode::Hardware => Self::new(
                Box::new(EpaperPanel::new(PinConfig::default(), geometry)),
                geometry,
            ),
            #[cfg(feature = "hardware")]
            DisplayMode::Auto => Self::new(
                Box::new(EpaperPanel::new(PinConfig::default(), geometry)),
                geometry,
            )
            .with_simulation_fallback(output_dir),
            #[cfg(not(feature = "hardware"))]
            DisplayMode::Hardware => {
                return Err(
                    "display mode 'hardware' needs a build with the 'hardware' feature".into(),
                );
            }
            #[cfg(not(feature = "hardware"))]
            DisplayMode::Auto => {
                tracing::warn!("Built without hardware support - running in simulation mode");
                Self::new(Box::new(SimulatedPanel::new(output_dir)), geometry)
            }
        };
        Ok(adapter)
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// Frames successfully shown since startup.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn panel_name(&self) -> &'static str {
        self.panel.name()
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    /// Open the panel and clear it.
    ///
    /// If that fails and a simulation fallback is configured, switch to the
    /// simulated panel and still report success.
    pub fn initialize(&mut self) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        match self.panel.open() {
            Ok(()) => {
                self.state = AdapterState::Ready;
                tracing::info!(
                    "Display initialized: {}x{} ({})",
                    self.geometry.width,
                    self.geometry.height,
                    self.panel.name()
                );
                true
            }
            Err(e) => match self.fallback.take() {
                Some(output_dir) => {
                    tracing::warn!(
                        "Display hardware not available ({}) - running in simulation mode",
                        e
                    );
                    self.panel = Box::new(SimulatedPanel::new(output_dir));
                    self.initialize()
                }
                None => {
                    tracing::error!("Display initialization failed: {}", e);
                    self.state = AdapterState::Uninitialized;
                    false
                }
            },
        }
    }

    /// Full re-init of a panel that stopped responding.
    fn reopen(&mut self) -> bool {
        tracing::warn!("Reinitializing {} panel", self.panel.name());
        match self.panel.open() {
            Ok(()) => {
                self.state = AdapterState::Ready;
                tracing::info!("Display recovered");
                true
            }
            Err(e) => {
                tracing::error!("Display reinitialization failed: {}", e);
                self.state = AdapterState::Faulted;
                false
            }
        }
    }

    /// Get the panel into `Ready`, waking or re-opening it as needed.
    fn ensure_ready(&mut self) -> bool {
        match self.state {
            AdapterState::Ready => true,
            AdapterState::Uninitialized => {
                tracing::error!("Display error: panel not initialized");
                false
            }
            AdapterState::Faulted => self.reopen(),
            AdapterState::Sleeping => match self.panel.wake() {
                Ok(()) => {
                    self.state = AdapterState::Ready;
                    true
                }
                Err(e) => {
                    tracing::error!("Wake from sleep failed: {}", e);
                    self.state = AdapterState::Faulted;
                    self.reopen()
                }
            },
        }
    }

    /// Push a frame to the panel. Returns `false` if nothing was shown.
    pub fn display(&mut self, frame: &Bitmap, full_refresh: bool) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        if frame.geometry() != self.geometry {
            tracing::error!(
                "Display error: frame is {}x{}, panel is {}x{}",
                frame.width(),
                frame.height(),
                self.geometry.width,
                self.geometry.height
            );
            return false;
        }
        if !self.ensure_ready() {
            return false;
        }

        if full_refresh {
            tracing::info!("Performing full refresh");
        }
        match self.panel.show(frame, full_refresh) {
            Ok(()) => {
                self.refresh_count += 1;
                tracing::info!("Image displayed (refresh #{})", self.refresh_count);
                true
            }
            Err(e) => {
                tracing::error!("Display error: {}", e);
                false
            }
        }
    }

    /// Put the panel into deep sleep. Best-effort: failures are only logged.
    pub fn sleep(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        if self.state != AdapterState::Ready {
            return;
        }
        match self.panel.sleep() {
            Ok(()) => {
                self.state = AdapterState::Sleeping;
                tracing::debug!("Display in sleep mode");
            }
            Err(e) => tracing::error!("Sleep mode error: {}", e),
        }
    }

    /// Clear the panel to white.
    pub fn clear(&mut self) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        if self.state == AdapterState::Faulted {
            // open() leaves the panel cleared
            return self.reopen();
        }
        if !self.ensure_ready() {
            return false;
        }
        match self.panel.clear() {
            Ok(()) => {
                tracing::info!("Display cleared");
                true
            }
            Err(e) => {
                tracing::error!("Clear error: {}", e);
                false
            }
        }
    }

    /// Leave the panel blank and asleep, whatever state it was in.
    pub fn cleanup(&mut self) {
        self.span.in_scope(|| tracing::info!("Display cleanup"));
        self.clear();
        self.sleep();
    }
}
