//! Blocking driver for the Waveshare 7.3" (E) six-color e-paper display.
//!
//! The panel is 800x480 pixels and supports six inks (black, white, yellow,
//! red, blue, green). Each pixel is a 4-bit palette code on the wire, packed
//! two pixels per byte, and the controller is driven over SPI plus three
//! discrete control lines (data/command select, reset, busy).
//!
//! The crate is built on top of the blocking `embedded-hal` 1.0 traits and
//! `embedded-graphics`, so it runs anywhere those are implemented: bare-metal
//! targets with an allocator, or Linux hosts (e.g. a Raspberry Pi) through the
//! usual HAL adapter crates.
//!
//! ## Structure
//!
//! - [`EpdHw`]: abstracts the hardware the driver needs - the control pins and
//!   a delay provider. The SPI device is passed into each operation, matching
//!   the usual bus-sharing patterns. You implement this trait once for your
//!   chosen peripherals; in exchange the driver type has a single generic
//!   parameter.
//! - [`epd7in3e::Epd7In3e`]: the display driver itself. It tracks the
//!   controller's protocol state explicitly and rejects out-of-sequence calls
//!   with [`Error::InvalidState`] instead of silently sending commands a
//!   sleeping or uninitialized controller would ignore.
//! - [`encode`]: the pure bitmap-to-wire transformation (orientation
//!   normalization, palette quantization, nibble packing). It never touches
//!   hardware, so it can be unit-tested and benchmarked in isolation.
//! - [`buffer`]: a packed 4-bit framebuffer implementing
//!   `embedded-graphics::DrawTarget` for callers that compose frames with
//!   drawing primitives instead of supplying an RGB bitmap.
//!
//! Every operation is synchronous and runs to completion on the calling
//! thread. The driver holds no locks and performs no internal retries: a bus
//! fault or a busy-line timeout is reported upward as a distinct error kind
//! and the caller decides whether to reset and try again.
#![no_std]

extern crate alloc;

use core::error::Error as CoreError;

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, InputPin, OutputPin},
    spi::{ErrorType as SpiErrorType, SpiDevice},
};
use thiserror::Error as ThisError;

pub mod buffer;
pub mod color;
pub mod encode;
pub mod epd7in3e;

mod comms;
mod log;

use crate::encode::EncodeError;
use crate::epd7in3e::State;

/// Provides access to the hardware needed to control the display.
///
/// The driver requires exclusive ownership of the data/command, reset, and
/// busy lines for its lifetime; chip-select is owned by the [`SpiDevice`],
/// which asserts it for exactly the duration of one command or data frame.
///
/// Acquire the pins and open the SPI device before constructing your `EpdHw`
/// implementation, so that a failure during setup never leaves the driver
/// holding a partial set of lines.
pub trait EpdHw {
    type Spi: SpiDevice;
    type Dc: OutputPin;
    type Reset: OutputPin;
    type Busy: InputPin;
    type Delay: DelayNs;
    type Error: CoreError
        + From<<Self::Spi as SpiErrorType>::Error>
        + From<<Self::Dc as PinErrorType>::Error>
        + From<<Self::Reset as PinErrorType>::Error>
        + From<<Self::Busy as PinErrorType>::Error>;

    fn dc(&mut self) -> &mut Self::Dc;
    fn reset(&mut self) -> &mut Self::Reset;
    fn busy(&mut self) -> &mut Self::Busy;
    fn delay(&mut self) -> &mut Self::Delay;
}

/// Driver errors, generic over the hardware error type of the [`EpdHw`]
/// implementation.
///
/// None of these are recovered internally. A [`Error::BusyTimeout`] in
/// particular means the controller must be treated as unresponsive until a
/// fresh `reset()` + `init()`.
#[derive(Debug, ThisError)]
pub enum Error<E>
where
    E: CoreError,
{
    /// SPI or control-line fault reported by the hardware layer.
    #[error("hardware error: {0}")]
    Hw(#[source] E),

    /// The busy line did not clear within the configured bound; the device
    /// is unresponsive.
    #[error("device unresponsive: busy line did not clear within {waited_ms} ms")]
    BusyTimeout { waited_ms: u32 },

    /// An operation was invoked from a protocol state that does not permit
    /// it, e.g. `display()` after `sleep()` without re-initializing.
    #[error("{operation} is not valid in the {state:?} state")]
    InvalidState {
        operation: &'static str,
        state: State,
    },

    /// The supplied bitmap could not be encoded; nothing was written to the
    /// bus.
    #[error(transparent)]
    Encode(EncodeError),
}

impl<E> From<EncodeError> for Error<E>
where
    E: CoreError,
{
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}
