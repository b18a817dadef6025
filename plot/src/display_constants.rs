/// 4.2" panel, landscape.
pub const PIXEL_WIDTH: u32 = 400;
pub const PIXEL_HEIGHT: u32 = 300;

/// bytes are packed so one byte is eight one-bit pixels. so 50 bytes for 400 px
pub const BYTE_WIDTH: usize = PIXEL_WIDTH as usize / 8;
pub const DISPLAY_BYTES_TOTAL: usize = BYTE_WIDTH * PIXEL_HEIGHT as usize;
