/// BCM pin numbers of the 4.2" HAT. Chip select belongs to the SPI device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum GpioPin {
    /// Data/command control signal, command when low, data when high
    DataCommandPin = 25,
    /// Reset, active low
    ResetPin = 17,
    /// Driver status, low while the controller is busy
    BusyPin = 24,
    PowerPin = 18,
}

impl From<GpioPin> for u8 {
    fn from(value: GpioPin) -> Self {
        value as u8
    }
}
