//! Driver for the Waveshare 7.3" (E) six-color e-paper display.
//!
//! * [product page](https://www.waveshare.com/7.3inch-e-paper-hat-e.htm)
//! * [sample code](https://github.com/waveshareteam/e-Paper/blob/master/RaspberryPi_JetsonNano/python/lib/waveshare_epd/epd7in3e.py)
//!
//! The display has a landscape orientation (800x480). Every public operation
//! is checked against the controller's protocol state, so an out-of-sequence
//! call fails with [`Error::InvalidState`] before any bus traffic.

use embedded_hal::delay::DelayNs as _;
use embedded_hal::digital::OutputPin as _;
use embedded_hal::spi::{Phase, Polarity};
use embedded_graphics::prelude::{OriginDimensions as _, Size};

use crate::buffer::PackedBuffer;
use crate::comms::{BusyWait as _, CommandDataSend as _};
use crate::encode::{encode, Bitmap, EncodeError};
use crate::log::debug;
use crate::{EpdHw, Error};

/// The width of the display (landscape orientation).
pub const WIDTH: u32 = 800;
/// The height of the display (landscape orientation).
pub const HEIGHT: u32 = 480;
/// Packed bytes per row: two pixels per byte.
pub const BYTES_PER_ROW: usize = (WIDTH / 2) as usize;
/// Length of one packed frame in bytes.
pub const FRAME_LENGTH: usize = BYTES_PER_ROW * HEIGHT as usize;

pub const RECOMMENDED_SPI_HZ: u32 = 5_000_000; // 5 MHz
/// Use this phase in conjunction with [RECOMMENDED_SPI_POLARITY] so that the
/// controller can capture data on the rising edge.
pub const RECOMMENDED_SPI_PHASE: Phase = Phase::CaptureOnFirstTransition;
/// Use this polarity in conjunction with [RECOMMENDED_SPI_PHASE] so that the
/// controller can capture data on the rising edge.
pub const RECOMMENDED_SPI_POLARITY: Polarity = Polarity::IdleLow;

/// Default interval between busy-line polls.
pub const DEFAULT_BUSY_POLL_INTERVAL_MS: u32 = 100;
/// Default bound on one busy wait. A full-panel refresh takes on the order of
/// twenty seconds, so anything beyond this means the controller is stuck.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 30_000;

/// Two white pixels; a full frame of this byte blanks the panel.
const CLEAR_FILL: u8 = (0x1 << 4) | 0x1;
/// Frame data is streamed to the controller in transactions of this size.
const DATA_CHUNK_LENGTH: usize = 4096;

const RESET_HOLD_MS: u32 = 20;
const RESET_PULSE_MS: u32 = 2;
const INIT_SETTLE_MS: u32 = 30;

/// Low-level commands for the Epd7In3e. You probably want the lifecycle
/// methods on [`Epd7In3e`] for most operations; the registers are listed here
/// because the initialization sequence is order-dependent and easier to audit
/// against the vendor sample code this way.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resolution, LUT selection, gate/source scan direction, booster switch.
    PanelSetting = 0x00,

    /// Selects internal and external power.
    PowerSetting = 0x01,

    /// Turns off charge pump, T-con, source/gate drivers, VCOM and the
    /// temperature sensor. Register data is kept until VDD goes away.
    PowerOff = 0x02,

    /// Configures the power-off sequence.
    PowerOffSequenceSetting = 0x03,

    /// Turns on the power. The busy line goes low until the power-on
    /// sequence completes.
    PowerOn = 0x04,

    /// First booster soft-start block.
    BoosterSoftStart1 = 0x05,

    /// Second booster soft-start block.
    BoosterSoftStart2 = 0x06,

    /// Enters deep sleep to save power. The single parameter is a check
    /// code; the command is executed only when it is 0xA5. Deep sleep is
    /// left by a hardware reset.
    DeepSleep = 0x07,

    /// Third booster soft-start block.
    BoosterSoftStart3 = 0x08,

    /// Starts a frame transmission into controller SRAM. Subsequent data
    /// frames carry packed pixel data.
    DataStartTransmission = 0x10,

    /// Refreshes the panel from SRAM. The busy line goes low until the
    /// update is finished.
    DisplayRefresh = 0x12,

    /// Controls the PLL clock frequency.
    PllControl = 0x30,

    /// Interval of VCOM and data output.
    VcomAndDataIntervalSetting = 0x50,

    /// Non-overlap period of gate and source.
    TconSetting = 0x60,

    /// Alternative resolution setting, higher priority than the RES bits in
    /// the panel setting register. Width and height are sent as big-endian
    /// 16-bit values.
    TconResolution = 0x61,

    /// VDCS timing.
    Vdcs = 0x84,

    /// Power-saving setting.
    PowerSaving = 0xE3,

    /// Vendor command-header unlock sequence; must be the first write after
    /// reset.
    CmdH = 0xAA,
}

impl Command {
    /// Returns the register address for this command.
    fn register(&self) -> u8 {
        *self as u8
    }
}

/// The controller's protocol state as tracked by the driver.
///
/// The hardware offers no way to read this back, so the driver maintains it
/// explicitly and checks it at the start of every operation instead of
/// relying on caller discipline.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Fresh handle, or after a bare [`Epd7In3e::reset`]. Only `init` is
    /// useful here.
    Uninitialized,
    /// The register sequence has run; the panel accepts frame data.
    Initialized,
    /// The panel has been blanked.
    Cleared,
    /// A frame is on the panel.
    Displaying,
    /// Deep sleep. Only a reset followed by `init` revives the controller.
    Sleeping,
}

/// Constructs a panel-sized buffer for use with
/// [`Epd7In3e::display_packed`].
pub fn new_buffer() -> PackedBuffer {
    PackedBuffer::new(Size::new(WIDTH, HEIGHT))
}

/// Controls the 7.3" (E) six-color Waveshare e-paper display.
pub struct Epd7In3e<HW>
where
    HW: EpdHw,
{
    hw: HW,
    state: State,
    busy_poll_interval_ms: u32,
    busy_timeout_ms: u32,
}

impl<HW> Epd7In3e<HW>
where
    HW: EpdHw,
{
    pub fn new(hw: HW) -> Self {
        Epd7In3e {
            hw,
            state: State::Uninitialized,
            busy_poll_interval_ms: DEFAULT_BUSY_POLL_INTERVAL_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Overrides the busy-line polling cadence. Mostly useful for tests and
    /// unusual panels; the defaults match the vendor sample code.
    pub fn with_busy_poll(mut self, interval_ms: u32, timeout_ms: u32) -> Self {
        self.busy_poll_interval_ms = interval_ms;
        self.busy_timeout_ms = timeout_ms;
        self
    }

    /// The protocol state the driver believes the controller is in.
    pub fn state(&self) -> State {
        self.state
    }

    /// Initializes the display: hardware reset, then the fixed register
    /// sequence, then power-on. Must be called before any display operation,
    /// and again after [`Epd7In3e::sleep`] to re-awaken the controller.
    ///
    /// The register order is load-bearing; the resolution must be configured
    /// before any frame transmission, and the vendor header must come first.
    pub fn init(&mut self, spi: &mut HW::Spi) -> Result<(), Error<HW::Error>> {
        debug!("Initialising display");
        self.reset()?;
        self.wait_idle()?;
        self.hw.delay().delay_ms(INIT_SETTLE_MS);

        self.send(spi, Command::CmdH, &[0x49, 0x55, 0x20, 0x08, 0x09, 0x18])?;
        self.send(spi, Command::PowerSetting, &[0x3F])?;
        self.send(spi, Command::PanelSetting, &[0x5F, 0x69])?;
        self.send(spi, Command::PowerOffSequenceSetting, &[0x00, 0x54, 0x00, 0x44])?;
        self.send(spi, Command::BoosterSoftStart1, &[0x40, 0x1F, 0x1F, 0x2C])?;
        self.send(spi, Command::BoosterSoftStart2, &[0x6F, 0x1F, 0x17, 0x49])?;
        self.send(spi, Command::BoosterSoftStart3, &[0x6F, 0x1F, 0x1F, 0x22])?;
        self.send(spi, Command::PllControl, &[0x03])?;
        self.send(spi, Command::VcomAndDataIntervalSetting, &[0x3F])?;
        self.send(spi, Command::TconSetting, &[0x02, 0x00])?;
        self.send(
            spi,
            Command::TconResolution,
            &[
                (WIDTH >> 8) as u8,
                (WIDTH & 0xFF) as u8,
                (HEIGHT >> 8) as u8,
                (HEIGHT & 0xFF) as u8,
            ],
        )?;
        self.send(spi, Command::Vdcs, &[0x01])?;
        self.send(spi, Command::PowerSaving, &[0x2F])?;

        self.send(spi, Command::PowerOn, &[])?;
        self.wait_idle()?;

        self.state = State::Initialized;
        Ok(())
    }

    /// Blanks the panel to white. Valid only directly after
    /// [`Epd7In3e::init`].
    pub fn clear(&mut self, spi: &mut HW::Spi) -> Result<(), Error<HW::Error>> {
        self.require_state("clear", &[State::Initialized])?;
        debug!("Clearing display");

        self.send(spi, Command::DataStartTransmission, &[])?;
        let row = [CLEAR_FILL; BYTES_PER_ROW];
        for _ in 0..HEIGHT {
            self.send_data(spi, &row)?;
        }
        self.update_display(spi)?;

        self.state = State::Cleared;
        Ok(())
    }

    /// Encodes `bitmap` and shows it on the panel. The bitmap must be
    /// 800x480 or 480x800 (rotated 90 degrees clockwise before encoding);
    /// encoding failures are reported before anything is written to the bus.
    pub fn display(&mut self, spi: &mut HW::Spi, bitmap: &Bitmap) -> Result<(), Error<HW::Error>> {
        self.require_state("display", &[State::Initialized, State::Cleared])?;

        let frame = encode(bitmap)?;
        debug!("Displaying {}x{} bitmap", bitmap.width(), bitmap.height());
        self.write_frame(spi, &frame)?;

        self.state = State::Displaying;
        Ok(())
    }

    /// Shows an already-packed frame composed with `embedded-graphics`, e.g.
    /// via [`new_buffer`]. The buffer must be panel-sized.
    pub fn display_packed(
        &mut self,
        spi: &mut HW::Spi,
        buffer: &PackedBuffer,
    ) -> Result<(), Error<HW::Error>> {
        self.require_state("display_packed", &[State::Initialized, State::Cleared])?;

        let size = buffer.size();
        if size != Size::new(WIDTH, HEIGHT) {
            return Err(Error::Encode(EncodeError::Dimensions {
                width: size.width,
                height: size.height,
            }));
        }
        debug!("Displaying packed frame");
        self.write_frame(spi, buffer.data())?;

        self.state = State::Displaying;
        Ok(())
    }

    /// Puts the display into deep sleep. Only [`Epd7In3e::reset`] followed
    /// by [`Epd7In3e::init`] revives it.
    pub fn sleep(&mut self, spi: &mut HW::Spi) -> Result<(), Error<HW::Error>> {
        self.require_state(
            "sleep",
            &[State::Initialized, State::Cleared, State::Displaying],
        )?;
        debug!("Sleeping EPD");

        self.send(spi, Command::DeepSleep, &[0xA5])?;

        self.state = State::Sleeping;
        Ok(())
    }

    /// Hardware-resets the controller. This physically re-awakens the panel
    /// from deep sleep but does not reconfigure it: the handle drops back to
    /// [`State::Uninitialized`] and [`Epd7In3e::init`] must run before any
    /// display operation.
    pub fn reset(&mut self) -> Result<(), Error<HW::Error>> {
        debug!("Resetting EPD");
        self.hw
            .reset()
            .set_high()
            .map_err(|e| Error::Hw(e.into()))?;
        self.hw.delay().delay_ms(RESET_HOLD_MS);
        self.hw.reset().set_low().map_err(|e| Error::Hw(e.into()))?;
        self.hw.delay().delay_ms(RESET_PULSE_MS);
        self.hw
            .reset()
            .set_high()
            .map_err(|e| Error::Hw(e.into()))?;
        self.hw.delay().delay_ms(RESET_HOLD_MS);

        self.state = State::Uninitialized;
        Ok(())
    }

    /// Streams one packed frame, then runs the power-on / refresh /
    /// power-off sub-sequence.
    fn write_frame(&mut self, spi: &mut HW::Spi, frame: &[u8]) -> Result<(), Error<HW::Error>> {
        self.send(spi, Command::DataStartTransmission, &[])?;
        for chunk in frame.chunks(DATA_CHUNK_LENGTH) {
            self.send_data(spi, chunk)?;
        }
        self.update_display(spi)
    }

    /// Powers the source drivers, refreshes the panel from SRAM and powers
    /// off again, waiting for the busy line at each step.
    fn update_display(&mut self, spi: &mut HW::Spi) -> Result<(), Error<HW::Error>> {
        debug!("Updating display");
        self.send(spi, Command::PowerOn, &[])?;
        self.wait_idle()?;

        self.send(spi, Command::DisplayRefresh, &[0x00])?;
        self.wait_idle()?;

        self.send(spi, Command::PowerOff, &[0x00])?;
        self.wait_idle()?;
        Ok(())
    }

    fn send(
        &mut self,
        spi: &mut HW::Spi,
        command: Command,
        data: &[u8],
    ) -> Result<(), Error<HW::Error>> {
        self.hw
            .send(spi, command.register(), data)
            .map_err(Error::Hw)
    }

    fn send_data(&mut self, spi: &mut HW::Spi, data: &[u8]) -> Result<(), Error<HW::Error>> {
        self.hw.send_data(spi, data).map_err(Error::Hw)
    }

    fn wait_idle(&mut self) -> Result<(), Error<HW::Error>> {
        self.hw
            .wait_idle(self.busy_poll_interval_ms, self.busy_timeout_ms)
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[State],
    ) -> Result<(), Error<HW::Error>> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}
