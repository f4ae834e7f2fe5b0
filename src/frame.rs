//! Frame loop: picks the next photo, renders it, pushes it, waits.
//!
//! One cycle:
//! 1. at the start of a pass (cursor at 0) rescan the photo directory
//! 2. transform the current photo
//! 3. bump the refresh counter; every Nth refresh is a full refresh
//! 4. display, then put the panel to sleep if power saving is on
//! 5. advance the cursor, reshuffling when it wraps in random mode
//! 6. wait `refresh_interval`
//!
//! A photo that fails to decode is logged and skipped: the cursor still
//! advances, so one bad file can't pin the frame on the same slot forever.

use crate::config::FrameConfig;
use crate::display::DisplayAdapter;
use crate::is_running;
use crate::media;
use crate::transform::{ImageTransform, TransformOptions};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};
use tracing::Span;

/// How long the startup banner stays up before the first photo.
pub const STARTUP_PAUSE: Duration = Duration::from_secs(2);

/// How often the wait between cycles checks for Ctrl+C.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── Playlist ─────────────────────────────────────────────────────────

/// The image list plus the cursor into it.
///
/// The cursor is always a valid index while the list is non-empty and
/// wraps back to 0 after the last image.
pub struct Playlist {
    images: Vec<PathBuf>,
    index: usize,
    random_order: bool,
    rng: StdRng,
    shuffle_count: u64,
}

impl Playlist {
    pub fn new(random_order: bool, rng: StdRng) -> Self {
        Self {
            images: Vec::new(),
            index: 0,
            random_order,
            rng,
            shuffle_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    /// Times the list has been put into a fresh random order.
    pub fn shuffle_count(&self) -> u64 {
        self.shuffle_count
    }

    pub fn current(&self) -> Option<&Path> {
        self.images.get(self.index).map(PathBuf::as_path)
    }

    fn shuffle(&mut self) {
        self.images.shuffle(&mut self.rng);
        self.shuffle_count += 1;
    }

    /// Swap in a freshly scanned list, shuffled if random order is on.
    ///
    /// Rescans happen at the start of a pass, so the cursor is normally 0
    /// already; it is reset if the new list is shorter.
    pub fn replace(&mut self, images: Vec<PathBuf>) {
        self.images = images;
        if self.random_order {
            self.shuffle();
        }
        if self.index >= self.images.len() {
            self.index = 0;
        }
    }

    /// Move to the next image. Returns `true` when the cursor wrapped to 0.
    pub fn advance(&mut self) -> bool {
        if self.images.is_empty() {
            self.index = 0;
            return false;
        }
        self.index = (self.index + 1) % self.images.len();
        let wrapped = self.index == 0;
        if wrapped && self.random_order {
            self.shuffle();
            tracing::info!("Reshuffled images");
        }
        wrapped
    }
}

// ── Refresh cadence ──────────────────────────────────────────────────

/// Counts refreshes since startup and decides which ones are full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshSchedule {
    refresh_count: u64,
    full_clear_interval: u64,
}

impl RefreshSchedule {
    /// `full_clear_interval` of 0 is treated as 1 (every refresh is full).
    pub fn new(full_clear_interval: u64) -> Self {
        Self {
            refresh_count: 0,
            full_clear_interval: full_clear_interval.max(1),
        }
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Count one refresh and report whether it should be a full one.
    pub fn tick(&mut self) -> bool {
        self.refresh_count += 1;
        self.refresh_count % self.full_clear_interval == 0
    }
}

// ── Loop ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    /// Interrupted by the user.
    Stopped,
    /// Ended by an unexpected error.
    Failed,
}

/// What a single cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A photo was rendered and handed to the display.
    Shown {
        path: PathBuf,
        /// Cursor position the photo was taken from.
        index: usize,
        full_refresh: bool,
        /// Whether the display accepted it.
        displayed: bool,
    },
    /// The photo could not be processed; the cursor moved past it.
    Skipped { path: PathBuf },
    /// Nothing to show.
    Idle,
}

pub struct PictureFrame {
    photo_dir: PathBuf,
    extensions: Vec<String>,
    refresh_interval: Duration,
    sleep_between_updates: bool,
    startup_pause: Duration,
    transform: ImageTransform,
    display: DisplayAdapter,
    playlist: Playlist,
    schedule: RefreshSchedule,
    state: LoopState,
    span: Span,
}

impl PictureFrame {
    pub fn new(config: &FrameConfig, display: DisplayAdapter) -> Self {
        Self::with_rng(config, display, StdRng::from_os_rng())
    }

    /// Same as [`PictureFrame::new`] with a fixed shuffle seed.
    pub fn with_seed(config: &FrameConfig, display: DisplayAdapter, seed: u64) -> Self {
        Self::with_rng(config, display, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &FrameConfig, display: DisplayAdapter, rng: StdRng) -> Self {
        let transform = ImageTransform::new(
            config.geometry(),
            TransformOptions::from(&config.display.image_processing),
        );
        Self {
            photo_dir: config.frame.photo_directory.clone(),
            extensions: config.frame.supported_formats.clone(),
            refresh_interval: config.refresh_interval(),
            sleep_between_updates: config.display.power_management.sleep_between_updates,
            startup_pause: STARTUP_PAUSE,
            transform,
            display,
            playlist: Playlist::new(config.frame.random_order, rng),
            schedule: RefreshSchedule::new(config.display.power_management.full_clear_interval),
            state: LoopState::Init,
            span: tracing::info_span!("frame"),
        }
    }

    /// Override how long the startup banner is held.
    pub fn with_startup_pause(mut self, pause: Duration) -> Self {
        self.startup_pause = pause;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn schedule(&self) -> &RefreshSchedule {
        &self.schedule
    }

    pub fn display(&self) -> &DisplayAdapter {
        &self.display
    }

    /// Rescan the photo directory into the playlist. Returns the new count.
    pub fn load_images(&mut self) -> std::io::Result<usize> {
        let images = media::list_images(&self.photo_dir, &self.extensions)?;
        self.playlist.replace(images);
        tracing::info!("Loaded {} images", self.playlist.len());
        Ok(self.playlist.len())
    }

    /// Bring up the display, load the photos and show the startup banner.
    ///
    /// Fails if the display can't be initialized or there is nothing to show.
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let span = self.span.clone();
        let _enter = span.enter();
        tracing::info!("Initializing Picture Frame");

        if !self.display.initialize() {
            return Err("Failed to initialize display".into());
        }

        self.load_images()?;
        if self.playlist.is_empty() {
            return Err(format!("No images found in {}", self.photo_dir.display()).into());
        }

        self.show_startup_message();
        Ok(())
    }

    fn show_startup_message(&mut self) {
        let message = format!("Picture Frame\n{} images loaded", self.playlist.len());
        let banner = self.transform.render_text(&message);
        self.display.display(&banner, false);
        thread::sleep(self.startup_pause);
    }

    /// Run one cycle, without the wait that follows it.
    ///
    /// Only a failed directory scan is an error; everything else is logged
    /// and reported through the outcome.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, Box<dyn std::error::Error>> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.playlist.index() == 0 {
            self.rescan()?;
        }

        let Some(path) = self.playlist.current().map(Path::to_path_buf) else {
            tracing::warn!("No images available");
            return Ok(CycleOutcome::Idle);
        };
        let index = self.playlist.index();
        tracing::info!(
            "Displaying: {} ({}/{})",
            path.file_name().unwrap_or_default().to_string_lossy(),
            index + 1,
            self.playlist.len()
        );

        let Some(bitmap) = self.transform.process(&path) else {
            tracing::error!("Failed to process {}, skipping", path.display());
            self.playlist.advance();
            return Ok(CycleOutcome::Skipped { path });
        };

        let full_refresh = self.schedule.tick();
        let displayed = self.display.display(&bitmap, full_refresh);

        if self.sleep_between_updates {
            self.display.sleep();
        }

        self.playlist.advance();

        Ok(CycleOutcome::Shown {
            path,
            index,
            full_refresh,
            displayed,
        })
    }

    fn rescan(&mut self) -> std::io::Result<()> {
        let old_count = self.playlist.len();
        let images = media::list_images(&self.photo_dir, &self.extensions)?;
        if images.is_empty() {
            tracing::warn!(
                "No images found in {}, keeping the previous list",
                self.photo_dir.display()
            );
            return Ok(());
        }
        self.playlist.replace(images);
        if self.playlist.len() != old_count {
            tracing::info!(
                "Image count changed: {} → {}",
                old_count,
                self.playlist.len()
            );
        }
        Ok(())
    }

    /// Cycle until `running` goes false or a cycle fails, then clean up.
    ///
    /// A panic inside a cycle (decoder, resize, panel driver) counts as a
    /// failure too, so the panel is still cleared and put to sleep.
    /// Returns the terminal state, `Stopped` or `Failed`.
    pub fn run(&mut self, running: &AtomicBool) -> LoopState {
        let span = self.span.clone();
        let _enter = span.enter();
        self.state = LoopState::Running;
        tracing::info!("Starting picture frame loop");

        while is_running(running) {
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(format!("panic: {}", panic_message(payload.as_ref()))),
            };
            if let Some(e) = failure {
                tracing::error!("Unexpected error: {}", e);
                self.state = LoopState::Failed;
                break;
            }
            tracing::info!("Sleeping for {}s", self.refresh_interval.as_secs());
            if !wait_while_running(running, self.refresh_interval) {
                break;
            }
        }

        if self.state == LoopState::Running {
            tracing::info!("Stopped by user");
            self.state = LoopState::Stopped;
        }
        self.cleanup();
        self.state
    }

    /// Leave the panel blank and asleep.
    pub fn cleanup(&mut self) {
        self.span.in_scope(|| tracing::info!("Cleaning up"));
        self.display.cleanup();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Sleep for `duration`, waking early if `running` goes false.
///
/// Returns whether the loop should keep going.
pub fn wait_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while is_running(running) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
    false
}
