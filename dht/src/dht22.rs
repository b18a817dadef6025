use rppal::gpio::{Bias, Error as GpioError, Gpio, IoPin, Level, Mode};
use std::thread::sleep;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const DATA_BITS: usize = 40;
const START_HIGH: Duration = Duration::from_millis(500);
const START_LOW: Duration = Duration::from_millis(20);
/// No transition for this long ends the capture.
const IDLE_TIMEOUT: Duration = Duration::from_millis(5);
const CAPTURE_LIMIT: Duration = Duration::from_millis(100);
/// Line state while the sensor answers.
const RELEASE_BIAS: Bias = Bias::PullUp;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("expected {expected} pulses, captured {actual}")]
    MissingData { expected: usize, actual: usize },
    #[error("pulse train does not alternate low/high")]
    Framing,
    #[error("checksum mismatch: computed {computed:#04x}, sent {sent:#04x}")]
    Checksum { computed: u8, sent: u8 },
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

/// One steady level on the data line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pulse {
    pub high: bool,
    pub duration: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Reading {
    /// Degrees C
    pub temperature: f64,
    /// %RH
    pub humidity: f64,
}

impl Reading {
    pub fn from_bytes(bytes: [u8; 5]) -> Result<Reading, DhtError> {
        let computed = bytes[..4].iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));
        if computed != bytes[4] {
            return Err(DhtError::Checksum {
                computed,
                sent: bytes[4],
            });
        }
        let humidity = f64::from(u16::from_be_bytes([bytes[0], bytes[1]])) / 10.0;
        let magnitude = f64::from(u16::from_be_bytes([bytes[2] & 0x7F, bytes[3]])) / 10.0;
        let temperature = if bytes[2] & 0x80 != 0 {
            -magnitude
        } else {
            magnitude
        };
        Ok(Reading {
            temperature,
            humidity,
        })
    }
}

/// Turns a captured pulse train into the five data bytes.
///
/// The final pulse is the idle line after the sensor let go, and a low pulse just
/// before it is the end-of-frame marker; both are dropped. The last 80 pulses left
/// are the (low, high) pairs of the 40 bits.
pub fn decode(pulses: &[Pulse]) -> Result<[u8; 5], DhtError> {
    let mut data = pulses.split_last().map_or(&[][..], |(_, rest)| rest);
    if let Some((last, rest)) = data.split_last() {
        if !last.high {
            data = rest;
        }
    }
    if data.len() < DATA_BITS * 2 {
        return Err(DhtError::MissingData {
            expected: DATA_BITS * 2,
            actual: data.len(),
        });
    }
    let data = &data[data.len() - DATA_BITS * 2..];
    let pairs: Vec<(&Pulse, &Pulse)> = data.chunks_exact(2).map(|p| (&p[0], &p[1])).collect();
    if pairs.iter().any(|(low, high)| low.high || !high.high) {
        return Err(DhtError::Framing);
    }

    let threshold =
        pairs.iter().map(|(low, _)| low.duration).sum::<Duration>() / DATA_BITS as u32;
    let mut bytes = [0u8; 5];
    for (index, (_, high)) in pairs.iter().enumerate() {
        if high.duration > threshold {
            bytes[index / 8] |= 0x80 >> (index % 8);
        }
    }
    debug!("DHT bytes {:02X?}, threshold {:?}", bytes, threshold);
    Ok(bytes)
}

pub trait Sensor {
    fn read(&mut self) -> Result<Reading, DhtError>;
}

/// DHT22 on a single BCM pin.
#[derive(Debug)]
pub struct Dht22 {
    pin: IoPin,
}

impl Dht22 {
    pub fn new(bcm_pin: u8) -> Result<Dht22, DhtError> {
        let pin = Gpio::new()?.get(bcm_pin)?.into_io(Mode::Output);
        debug!("DHT22 on GPIO {}", bcm_pin);
        Ok(Dht22 { pin })
    }

    fn start_signal(&mut self) {
        self.pin.set_mode(Mode::Output);
        self.pin.set_high();
        sleep(START_HIGH);
        self.pin.set_low();
        sleep(START_LOW);
        self.pin.set_mode(Mode::Input);
        self.pin.set_bias(RELEASE_BIAS);
    }

    fn capture(&mut self) -> Vec<Pulse> {
        let mut pulses = Vec::with_capacity(DATA_BITS * 2 + 4);
        let started = Instant::now();
        let mut level = self.pin.read();
        let mut since = started;
        loop {
            let now = Instant::now();
            let current = self.pin.read();
            if current != level {
                pulses.push(Pulse {
                    high: level == Level::High,
                    duration: now - since,
                });
                level = current;
                since = now;
            } else if now - since > IDLE_TIMEOUT || now - started > CAPTURE_LIMIT {
                pulses.push(Pulse {
                    high: level == Level::High,
                    duration: now - since,
                });
                break;
            }
        }
        pulses
    }
}

impl Sensor for Dht22 {
    fn read(&mut self) -> Result<Reading, DhtError> {
        self.start_signal();
        let pulses = self.capture();
        debug!("Captured {} pulses", pulses.len());
        Reading::from_bytes(decode(&pulses)?)
    }
}

/// First good reading in up to `retries` attempts, or the last error.
pub fn read_retry<S: Sensor>(
    sensor: &mut S,
    retries: u32,
    delay: Duration,
) -> Result<Reading, DhtError> {
    let mut attempt = 1;
    loop {
        match sensor.read() {
            Ok(reading) => return Ok(reading),
            Err(err) if attempt >= retries => return Err(err),
            Err(err) => {
                warn!("Read {}/{} failed: {}", attempt, retries, err);
                attempt += 1;
                sleep(delay);
            }
        }
    }
}
