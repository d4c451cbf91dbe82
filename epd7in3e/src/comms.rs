use embedded_hal::delay::DelayNs as _;
use embedded_hal::digital::{InputPin as _, OutputPin as _};
use embedded_hal::spi::SpiDevice as _;

use crate::{log::trace, EpdHw, Error};

/// Provides "wait" support for hardware with a busy line.
pub(crate) trait BusyWait: EpdHw {
    /// Polls the busy line until the controller reads idle, sleeping
    /// `interval_ms` between reads, or fails with [`Error::BusyTimeout`] once
    /// `timeout_ms` has elapsed.
    ///
    /// The busy line of this controller is low while an operation is in
    /// progress and high when idle.
    fn wait_idle(&mut self, interval_ms: u32, timeout_ms: u32) -> Result<(), Error<Self::Error>>;
}

/// Provides the ability to send <command> then <data> style communications.
pub(crate) trait CommandDataSend: EpdHw {
    /// Sends one command byte, then its parameter bytes if any. The
    /// data/command line is low for the command frame and high for the data
    /// frame; chip-select is asserted by the [`SpiDevice`] for exactly one
    /// frame at a time.
    ///
    /// [`SpiDevice`]: embedded_hal::spi::SpiDevice
    fn send(
        &mut self,
        spi: &mut <Self as EpdHw>::Spi,
        command: u8,
        data: &[u8],
    ) -> Result<(), Self::Error>;

    /// Sends a bare data frame with the data/command line held high, used
    /// when streaming a frame buffer after a "data start transmission"
    /// command.
    fn send_data(
        &mut self,
        spi: &mut <Self as EpdHw>::Spi,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

impl<HW: EpdHw> BusyWait for HW {
    fn wait_idle(&mut self, interval_ms: u32, timeout_ms: u32) -> Result<(), Error<HW::Error>> {
        let mut waited_ms = 0u32;
        while self
            .busy()
            .is_low()
            .map_err(|e| Error::Hw(e.into()))?
        {
            if waited_ms >= timeout_ms {
                return Err(Error::BusyTimeout { waited_ms });
            }
            trace!("EPD busy, polling again in {} ms", interval_ms);
            let step = interval_ms.clamp(1, timeout_ms - waited_ms);
            self.delay().delay_ms(step);
            waited_ms += step;
        }
        Ok(())
    }
}

impl<HW: EpdHw> CommandDataSend for HW {
    fn send(
        &mut self,
        spi: &mut <Self as EpdHw>::Spi,
        command: u8,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        trace!("Sending EPD command: {:?}", command);

        self.dc().set_low()?;
        spi.write(&[command])?;

        if !data.is_empty() {
            self.dc().set_high()?;
            spi.write(data)?;
        }

        Ok(())
    }

    fn send_data(
        &mut self,
        spi: &mut <Self as EpdHw>::Spi,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        self.dc().set_high()?;
        spi.write(data)?;
        Ok(())
    }
}
