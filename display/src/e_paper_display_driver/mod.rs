pub mod command_code;
pub mod epd4in2;
pub mod gpio_pin;

use crate::e_paper_display_driver::epd4in2::Epd4in2;
use crate::e_paper_display_driver::gpio_pin::GpioPin;
use embedded_hal::digital::ErrorKind as PinErrorKind;
use embedded_hal::spi::ErrorKind as SpiErrorKind;
use rppal::gpio::{Error as GpioError, Gpio, InputPin, OutputPin};
use rppal::hal::Delay;
use rppal::spi::{Bus, Error as SpiError, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};
use thiserror::Error;
use tracing::debug;

pub const SPI_CLOCK_HZ: u32 = 4_000_000;

#[derive(Debug, Error)]
pub enum EpdError {
    #[error("spi transfer failed: {0}")]
    Spi(SpiErrorKind),
    #[error("pin access failed: {0}")]
    Pin(PinErrorKind),
    #[error(transparent)]
    Gpio(#[from] GpioError),
    #[error(transparent)]
    SpiSetup(#[from] SpiError),
    #[error("frame buffer is {actual} bytes, panel needs {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("panel still busy after {0} ms")]
    BusyTimeout(u32),
}

pub type HardwareEpd =
    Epd4in2<SimpleHalSpiDevice, InputPin, OutputPin, OutputPin, OutputPin, Delay>;

/// Claims the HAT's pins and SPI0/CE0 and powers the module.
pub fn open() -> Result<HardwareEpd, EpdError> {
    let gpio = Gpio::new()?;
    let busy = gpio.get(GpioPin::BusyPin.into())?.into_input();
    let data_or_cmd = gpio.get(GpioPin::DataCommandPin.into())?.into_output_low();
    let reset = gpio.get(GpioPin::ResetPin.into())?.into_output_low();
    let power = gpio.get(GpioPin::PowerPin.into())?.into_output_low();
    debug!("GPIO claimed");

    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)?;
    debug!("SPI0 open at {} Hz", SPI_CLOCK_HZ);

    Epd4in2::new(
        SimpleHalSpiDevice::new(spi),
        busy,
        data_or_cmd,
        reset,
        power,
        Delay::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_driver_uses_rppal_hal_types() {
        let name = std::any::type_name::<HardwareEpd>();
        assert!(name.contains("SimpleHalSpiDevice"));
        assert!(name.contains("rppal::hal::Delay"));
    }
}
