pub mod dht22;
pub mod log_file;

pub use crate::dht22::{read_retry, Dht22, DhtError, Reading, Sensor};
pub use crate::log_file::{append_reading, LogError};

pub const DEFAULT_PIN: u8 = 4;
pub const DEFAULT_RETRIES: u32 = 15;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;
