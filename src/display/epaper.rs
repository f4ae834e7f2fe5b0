//! Waveshare 2.13" V2 e-paper HAT on a Raspberry Pi.
//!
//! SPI goes through spidev (chip select is handled by the kernel), the
//! control lines through gpio-cdev. The panel is portrait-native
//! (122x250); landscape frames are rotated before they are sent.

use super::{Panel, PanelError};
use crate::{Bitmap, DisplayGeometry};
use epd_waveshare::epd2in13_v2::{Epd2in13, HEIGHT, WIDTH};
use epd_waveshare::prelude::*;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, Delay, SpidevDevice};
use std::fmt::Debug;

type Driver = Epd2in13<SpidevDevice, CdevPin, CdevPin, CdevPin, Delay>;

/// Where the HAT is wired. Defaults match the Waveshare pinout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinConfig {
    pub spi_device: String,
    pub gpio_chip: String,
    pub spi_speed_hz: u32,
    pub rst: u32,
    pub dc: u32,
    pub busy: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            spi_device: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
            spi_speed_hz: 4_000_000,
            rst: 17,
            dc: 25,
            busy: 24,
        }
    }
}

/// Driver errors only implement `Debug`, so they are flattened to text.
fn driver_error<E: Debug>(e: E) -> PanelError {
    format!("{e:?}").into()
}

struct Connection {
    spi: SpidevDevice,
    epd: Driver,
    delay: Delay,
}

impl Connection {
    fn open(pins: &PinConfig) -> Result<Self, PanelError> {
        let mut spi = SpidevDevice::open(&pins.spi_device)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(pins.spi_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;

        let mut chip = Chip::new(&pins.gpio_chip)?;
        let rst = CdevPin::new(chip.get_line(pins.rst)?.request(
            LineRequestFlags::OUTPUT,
            1,
            "epaper-frame-rst",
        )?)?;
        let dc = CdevPin::new(chip.get_line(pins.dc)?.request(
            LineRequestFlags::OUTPUT,
            0,
            "epaper-frame-dc",
        )?)?;
        let busy = CdevPin::new(chip.get_line(pins.busy)?.request(
            LineRequestFlags::INPUT,
            0,
            "epaper-frame-busy",
        )?)?;

        let mut delay = Delay;
        let epd = Epd2in13::new(&mut spi, busy, dc, rst, &mut delay, None).map_err(driver_error)?;
        Ok(Self { spi, epd, delay })
    }

    fn full_clear(&mut self) -> Result<(), PanelError> {
        let Self { spi, epd, delay } = self;
        epd.wake_up(spi, delay).map_err(driver_error)?;
        epd.set_lut(spi, delay, Some(RefreshLut::Full))
            .map_err(driver_error)?;
        epd.clear_frame(spi, delay).map_err(driver_error)?;
        epd.display_frame(spi, delay).map_err(driver_error)?;
        Ok(())
    }
}

pub struct EpaperPanel {
    pins: PinConfig,
    geometry: DisplayGeometry,
    connection: Option<Connection>,
}

impl EpaperPanel {
    pub fn new(pins: PinConfig, geometry: DisplayGeometry) -> Self {
        Self {
            pins,
            geometry,
            connection: None,
        }
    }

    fn connection(&mut self) -> Result<&mut Connection, PanelError> {
        self.connection
            .as_mut()
            .ok_or_else(|| "e-paper panel is not open".into())
    }
}

/// Size of the panel in its native (portrait) orientation.
pub fn native_geometry() -> DisplayGeometry {
    DisplayGeometry::new(WIDTH, HEIGHT)
}

/// Lay a frame out the way the controller's RAM expects it.
pub fn native_buffer(frame: &Bitmap) -> Result<Vec<u8>, PanelError> {
    let native = native_geometry();
    if frame.geometry() == native {
        Ok(frame.as_bytes().to_vec())
    } else if frame.geometry() == native.transposed() {
        Ok(frame.rotated_ccw().as_bytes().to_vec())
    } else {
        Err(format!(
            "frame is {}x{}, the 2.13\" panel needs {}x{} or {}x{}",
            frame.width(),
            frame.height(),
            native.width,
            native.height,
            native.height,
            native.width
        )
        .into())
    }
}

impl Panel for EpaperPanel {
    fn name(&self) -> &'static str {
        "epd2in13_v2"
    }

    fn open(&mut self) -> Result<(), PanelError> {
        let native = native_geometry();
        if self.geometry != native && self.geometry != native.transposed() {
            return Err(format!(
                "configured size {}x{} doesn't match the 2.13\" panel",
                self.geometry.width, self.geometry.height
            )
            .into());
        }
        // Release the old SPI handle and GPIO lines before requesting them again.
        self.connection = None;
        let mut connection = Connection::open(&self.pins)?;
        connection.full_clear()?;
        self.connection = Some(connection);
        Ok(())
    }

    fn show(&mut self, frame: &Bitmap, full_refresh: bool) -> Result<(), PanelError> {
        let buffer = native_buffer(frame)?;
        let connection = self.connection()?;
        if full_refresh {
            connection.full_clear()?;
        }

        let Connection { spi, epd, delay } = connection;
        let lut = if full_refresh {
            RefreshLut::Full
        } else {
            RefreshLut::Quick
        };
        epd.set_lut(spi, delay, Some(lut)).map_err(driver_error)?;
        epd.update_and_display_frame(spi, &buffer, delay)
            .map_err(driver_error)?;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        let Connection { spi, epd, delay } = self.connection()?;
        epd.sleep(spi, delay).map_err(driver_error)?;
        Ok(())
    }

    fn wake(&mut self) -> Result<(), PanelError> {
        let Connection { spi, epd, delay } = self.connection()?;
        epd.wake_up(spi, delay).map_err(driver_error)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        self.connection()?.full_clear()
    }
}
