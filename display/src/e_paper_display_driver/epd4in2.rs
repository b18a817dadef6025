use crate::e_paper_display_driver::command_code::CommandCode;
use crate::e_paper_display_driver::EpdError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, InputPin, OutputPin};
use embedded_hal::spi::{Error as _, SpiDevice};
use envmon_plot::display_constants::DISPLAY_BYTES_TOTAL;
use tracing::{debug, info};

const BUSY_POLL_MS: u32 = 100;
const BUSY_TIMEOUT_MS: u32 = 30_000;
/// spidev refuses transfers larger than its default buffer.
const SPI_CHUNK: usize = 4096;

const INIT_SEQUENCE: [CommandCode; 3] = [
    CommandCode::PowerSetting,
    CommandCode::BoosterSoftStart,
    CommandCode::PowerOn,
];

const SETUP_SEQUENCE: [CommandCode; 10] = [
    CommandCode::PanelSetting,
    CommandCode::PllControl,
    CommandCode::ResolutionSetting,
    CommandCode::VcmDcSetting,
    CommandCode::VcomAndDataInterval,
    CommandCode::LutVcom,
    CommandCode::LutWw,
    CommandCode::LutBw,
    CommandCode::LutWb,
    CommandCode::LutBb,
];

/// Waveshare 4.2" black/white panel.
#[derive(Debug)]
pub struct Epd4in2<SPI, BUSY, DC, RST, PWR, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    PWR: OutputPin,
    DELAY: DelayNs,
{
    spi: SPI,
    busy_pin: BUSY,
    data_or_cmd_pin: DC,
    reset_pin: RST,
    power_pin: PWR,
    delay: DELAY,
}

impl<SPI, BUSY, DC, RST, PWR, DELAY> Epd4in2<SPI, BUSY, DC, RST, PWR, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    PWR: OutputPin,
    DELAY: DelayNs,
{
    /// Takes ownership of the bus and pins and switches module power on.
    pub fn new(
        spi: SPI,
        busy_pin: BUSY,
        data_or_cmd_pin: DC,
        reset_pin: RST,
        mut power_pin: PWR,
        delay: DELAY,
    ) -> Result<Self, EpdError> {
        power_pin.set_high().map_err(|e| EpdError::Pin(e.kind()))?;
        debug!("Power pin high");
        Ok(Epd4in2 {
            spi,
            busy_pin,
            data_or_cmd_pin,
            reset_pin,
            power_pin,
            delay,
        })
    }

    fn set_data_or_cmd(&mut self, data: bool) -> Result<(), EpdError> {
        let result = if data {
            self.data_or_cmd_pin.set_high()
        } else {
            self.data_or_cmd_pin.set_low()
        };
        result.map_err(|e| EpdError::Pin(e.kind()))
    }

    fn spi_write(&mut self, bytes: &[u8]) -> Result<(), EpdError> {
        if bytes.len() > 32 {
            debug!("Spi write {} bytes", bytes.len());
        } else {
            debug!("Spi write {:02X?}", bytes);
        }
        for chunk in bytes.chunks(SPI_CHUNK) {
            self.spi.write(chunk).map_err(|e| EpdError::Spi(e.kind()))?;
        }
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), EpdError> {
        self.set_data_or_cmd(true)?;
        self.spi_write(data)
    }

    /// Command byte followed by its fixed parameters.
    fn send_command(&mut self, command_code: CommandCode) -> Result<(), EpdError> {
        self.set_data_or_cmd(false)?;
        self.spi_write(&[command_code.cmd()])?;
        if let Some(data) = command_code.data() {
            self.send_data(data)?;
        }
        Ok(())
    }

    fn send_frame(&mut self, command_code: CommandCode, frame: &[u8]) -> Result<(), EpdError> {
        self.send_command(command_code)?;
        self.send_data(frame)
    }

    pub fn reset(&mut self) -> Result<(), EpdError> {
        for (high, millis) in [(true, 200), (false, 2), (true, 200)] {
            debug!("Reset: {}", if high { "high" } else { "low" });
            let result = if high {
                self.reset_pin.set_high()
            } else {
                self.reset_pin.set_low()
            };
            result.map_err(|e| EpdError::Pin(e.kind()))?;
            self.delay.delay_ms(millis);
        }
        Ok(())
    }

    /// Polls the status until BUSY goes high.
    pub fn wait_until_idle(&mut self) -> Result<(), EpdError> {
        debug!("e-Paper busy");
        let mut waited = 0;
        loop {
            self.send_command(CommandCode::GetStatus)?;
            let idle = self
                .busy_pin
                .is_high()
                .map_err(|e| EpdError::Pin(e.kind()))?;
            if idle {
                break;
            }
            if waited >= BUSY_TIMEOUT_MS {
                return Err(EpdError::BusyTimeout(waited));
            }
            self.delay.delay_ms(BUSY_POLL_MS);
            waited += BUSY_POLL_MS;
        }
        debug!("e-Paper busy release after {} ms", waited);
        Ok(())
    }

    pub fn init(&mut self) -> Result<(), EpdError> {
        info!("EPD init...");
        self.reset()?;
        for command in INIT_SEQUENCE {
            self.send_command(command)?;
        }
        self.wait_until_idle()?;
        for command in SETUP_SEQUENCE {
            self.send_command(command)?;
        }
        info!("EPD init done");
        Ok(())
    }

    fn turn_on_display(&mut self) -> Result<(), EpdError> {
        info!("Write DRF");
        self.send_command(CommandCode::DisplayRefresh)?;
        self.delay.delay_ms(BUSY_POLL_MS);
        self.wait_until_idle()?;
        info!("Display Done");
        Ok(())
    }

    /// Shows a packed 1-bit frame, bit set meaning white.
    pub fn display(&mut self, image: &[u8]) -> Result<(), EpdError> {
        if image.len() != DISPLAY_BYTES_TOTAL {
            return Err(EpdError::BufferSize {
                expected: DISPLAY_BYTES_TOTAL,
                actual: image.len(),
            });
        }
        let white = [0xFFu8; DISPLAY_BYTES_TOTAL];
        self.send_frame(CommandCode::DataStartTransmission1, &white)?;
        self.send_frame(CommandCode::DataStartTransmission2, image)?;
        self.turn_on_display()
    }

    pub fn clear(&mut self) -> Result<(), EpdError> {
        let white = [0xFFu8; DISPLAY_BYTES_TOTAL];
        self.send_frame(CommandCode::DataStartTransmission1, &white)?;
        self.send_frame(CommandCode::DataStartTransmission2, &white)?;
        self.turn_on_display()
    }

    pub fn sleep(&mut self) -> Result<(), EpdError> {
        info!("Write POF");
        self.send_command(CommandCode::PowerOff)?;
        self.wait_until_idle()?;
        self.send_command(CommandCode::DeepSleep)?;
        info!("Display asleep");
        Ok(())
    }
}

impl<SPI, BUSY, DC, RST, PWR, DELAY> Drop for Epd4in2<SPI, BUSY, DC, RST, PWR, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    PWR: OutputPin,
    DELAY: DelayNs,
{
    fn drop(&mut self) {
        // we're going to ignore errors here...
        let _ = self.data_or_cmd_pin.set_low();
        let _ = self.reset_pin.set_low();
        let _ = self.power_pin.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::ErrorType as PinErrorType;
    use embedded_hal::spi::{ErrorType as SpiErrorType, Operation};
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    /// One SPI write, tagged with the DC level at the time.
    #[derive(Debug, Clone, PartialEq)]
    enum Write {
        Command(u8),
        Data(Vec<u8>),
    }

    #[derive(Debug, Default)]
    struct Bus {
        data_mode: bool,
        writes: Vec<Write>,
        reset_levels: Vec<bool>,
        power: Option<bool>,
        busy_polls_left: u32,
        delayed_ms: u64,
        delays: Vec<u32>,
    }

    type Shared = Rc<RefCell<Bus>>;

    struct MockSpi(Shared);
    struct MockBusy(Shared);
    struct MockDc(Shared);
    struct MockReset(Shared);
    struct MockPower(Shared);
    struct MockDelay(Shared);

    impl SpiErrorType for MockSpi {
        type Error = Infallible;
    }

    impl SpiDevice for MockSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            let mut bus = self.0.borrow_mut();
            for operation in operations {
                if let Operation::Write(bytes) = operation {
                    if bus.data_mode {
                        // frame chunks land in one entry
                        if let Some(Write::Data(previous)) = bus.writes.last_mut() {
                            previous.extend_from_slice(bytes);
                        } else {
                            bus.writes.push(Write::Data(bytes.to_vec()));
                        }
                    } else {
                        for byte in bytes.iter() {
                            bus.writes.push(Write::Command(*byte));
                        }
                    }
                }
            }
            Ok(())
        }
    }

    impl PinErrorType for MockBusy {
        type Error = Infallible;
    }

    impl InputPin for MockBusy {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            let mut bus = self.0.borrow_mut();
            if bus.busy_polls_left == 0 {
                return Ok(true);
            }
            bus.busy_polls_left -= 1;
            Ok(false)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    macro_rules! output_pin {
        ($name:ident, |$bus:ident, $level:ident| $body:expr) => {
            impl PinErrorType for $name {
                type Error = Infallible;
            }

            impl OutputPin for $name {
                fn set_low(&mut self) -> Result<(), Infallible> {
                    let mut $bus = self.0.borrow_mut();
                    let $level = false;
                    $body;
                    Ok(())
                }

                fn set_high(&mut self) -> Result<(), Infallible> {
                    let mut $bus = self.0.borrow_mut();
                    let $level = true;
                    $body;
                    Ok(())
                }
            }
        };
    }

    output_pin!(MockDc, |bus, level| bus.data_mode = level);
    output_pin!(MockReset, |bus, level| bus.reset_levels.push(level));
    output_pin!(MockPower, |bus, level| bus.power = Some(level));

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.delay_ms(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            let mut bus = self.0.borrow_mut();
            bus.delayed_ms += u64::from(ms);
            bus.delays.push(ms);
        }
    }

    type MockEpd = Epd4in2<MockSpi, MockBusy, MockDc, MockReset, MockPower, MockDelay>;

    fn epd(busy_polls: u32) -> (MockEpd, Shared) {
        let bus = Rc::new(RefCell::new(Bus {
            busy_polls_left: busy_polls,
            ..Bus::default()
        }));
        let epd = Epd4in2::new(
            MockSpi(bus.clone()),
            MockBusy(bus.clone()),
            MockDc(bus.clone()),
            MockReset(bus.clone()),
            MockPower(bus.clone()),
            MockDelay(bus.clone()),
        )
        .unwrap();
        (epd, bus)
    }

    fn commands(bus: &Shared) -> Vec<u8> {
        bus.borrow()
            .writes
            .iter()
            .filter_map(|write| match write {
                Write::Command(code) => Some(*code),
                Write::Data(_) => None,
            })
            .collect()
    }

    #[test]
    fn init_resets_and_sends_boot_sequence() {
        let (mut epd, bus) = epd(0);
        assert_eq!(bus.borrow().power, Some(true));
        epd.init().unwrap();

        assert_eq!(bus.borrow().reset_levels, vec![true, false, true]);
        assert_eq!(
            commands(&bus),
            vec![0x01, 0x06, 0x04, 0x71, 0x00, 0x30, 0x61, 0x82, 0x50, 0x20, 0x21, 0x22, 0x23, 0x24]
        );
        let writes = bus.borrow().writes.clone();
        assert_eq!(writes[0], Write::Command(0x01));
        assert_eq!(writes[1], Write::Data(vec![0x03, 0x00, 0x2B, 0x2B]));
    }

    #[test]
    fn display_sends_white_old_frame_then_image() {
        let (mut epd, bus) = epd(0);
        let mut image = vec![0xFFu8; DISPLAY_BYTES_TOTAL];
        image[0] = 0x00;
        epd.display(&image).unwrap();

        let writes = bus.borrow().writes.clone();
        assert_eq!(writes[0], Write::Command(0x10));
        assert_eq!(writes[1], Write::Data(vec![0xFF; DISPLAY_BYTES_TOTAL]));
        assert_eq!(writes[2], Write::Command(0x13));
        assert_eq!(writes[3], Write::Data(image));
        assert_eq!(writes[4], Write::Command(0x12));
        assert_eq!(writes[5], Write::Command(0x71));
    }

    #[test]
    fn reset_pulses_with_controller_timings() {
        let (mut epd, bus) = epd(0);
        epd.reset().unwrap();
        let bus = bus.borrow();
        assert_eq!(bus.reset_levels, vec![true, false, true]);
        assert_eq!(bus.delays, vec![200, 2, 200]);
        assert!(bus.writes.is_empty());
    }

    #[test]
    fn clear_sends_two_white_frames() {
        let (mut epd, bus) = epd(0);
        epd.clear().unwrap();

        let writes = bus.borrow().writes.clone();
        assert_eq!(
            writes,
            vec![
                Write::Command(0x10),
                Write::Data(vec![0xFF; DISPLAY_BYTES_TOTAL]),
                Write::Command(0x13),
                Write::Data(vec![0xFF; DISPLAY_BYTES_TOTAL]),
                Write::Command(0x12),
                Write::Command(0x71),
            ]
        );
    }

    #[test]
    fn display_rejects_wrong_buffer_size() {
        let (mut epd, bus) = epd(0);
        let result = epd.display(&[0u8; 100]);
        assert!(matches!(
            result,
            Err(EpdError::BufferSize {
                expected: DISPLAY_BYTES_TOTAL,
                actual: 100
            })
        ));
        assert!(bus.borrow().writes.is_empty());
    }

    #[test]
    fn wait_until_idle_polls_status() {
        let (mut epd, bus) = epd(3);
        epd.wait_until_idle().unwrap();
        assert_eq!(commands(&bus), vec![0x71; 4]);
        assert_eq!(bus.borrow().delayed_ms, 300);
    }

    #[test]
    fn wait_until_idle_times_out() {
        let (mut epd, _bus) = epd(u32::MAX);
        assert!(matches!(
            epd.wait_until_idle(),
            Err(EpdError::BusyTimeout(30_000))
        ));
    }

    #[test]
    fn sleep_powers_off_then_deep_sleeps() {
        let (mut epd, bus) = epd(0);
        epd.sleep().unwrap();
        assert_eq!(commands(&bus), vec![0x02, 0x71, 0x07]);
        assert_eq!(
            bus.borrow().writes.last(),
            Some(&Write::Data(vec![0xA5]))
        );
    }

    #[test]
    fn drop_releases_pins() {
        let (epd, bus) = epd(0);
        drop(epd);
        let bus = bus.borrow();
        assert_eq!(bus.power, Some(false));
        assert_eq!(bus.reset_levels, vec![false]);
        assert!(!bus.data_mode);
    }
}
