#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum CommandCode {
    PanelSetting = 0x00,
    PowerSetting = 0x01,
    PowerOff = 0x02,
    PowerOn = 0x04,
    BoosterSoftStart = 0x06,
    DeepSleep = 0x07,
    /// Old frame
    DataStartTransmission1 = 0x10,
    DisplayRefresh = 0x12,
    /// New frame
    DataStartTransmission2 = 0x13,
    LutVcom = 0x20,
    LutWw = 0x21,
    LutBw = 0x22,
    LutWb = 0x23,
    LutBb = 0x24,
    PllControl = 0x30,
    VcomAndDataInterval = 0x50,
    ResolutionSetting = 0x61,
    GetStatus = 0x71,
    VcmDcSetting = 0x82,
}

const PANEL_SETTING_DATA: [u8; 2] = [0xBF, 0x0D];
const POWER_SETTING_DATA: [u8; 4] = [0x03, 0x00, 0x2B, 0x2B];
const BOOSTER_SOFT_START_DATA: [u8; 3] = [0x17, 0x17, 0x17];
const DEEP_SLEEP_DATA: [u8; 1] = [0xA5];
const PLL_CONTROL_DATA: [u8; 1] = [0x3C];
const VCOM_AND_DATA_INTERVAL_DATA: [u8; 1] = [0x97];
// 400 x 300
const RESOLUTION_SETTING_DATA: [u8; 4] = [0x01, 0x90, 0x01, 0x2C];
const VCM_DC_SETTING_DATA: [u8; 1] = [0x28];

const LUT_VCOM: [u8; 44] = [
    0x00, 0x17, 0x00, 0x00, 0x00, 0x02, //
    0x00, 0x17, 0x17, 0x00, 0x00, 0x02, //
    0x00, 0x0A, 0x01, 0x00, 0x00, 0x01, //
    0x00, 0x0E, 0x0E, 0x00, 0x00, 0x02, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00,
];

const LUT_TO_WHITE: [u8; 42] = [
    0x40, 0x17, 0x00, 0x00, 0x00, 0x02, //
    0x90, 0x17, 0x17, 0x00, 0x00, 0x02, //
    0x40, 0x0A, 0x01, 0x00, 0x00, 0x01, //
    0xA0, 0x0E, 0x0E, 0x00, 0x00, 0x02, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const LUT_TO_BLACK: [u8; 42] = [
    0x80, 0x17, 0x00, 0x00, 0x00, 0x02, //
    0x90, 0x17, 0x17, 0x00, 0x00, 0x02, //
    0x80, 0x0A, 0x01, 0x00, 0x00, 0x01, //
    0x50, 0x0E, 0x0E, 0x00, 0x00, 0x02, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

impl CommandCode {
    pub fn cmd(self) -> u8 {
        self as u8
    }

    /// Fixed parameter bytes sent right after the command, if any.
    pub fn data(self) -> Option<&'static [u8]> {
        match self {
            CommandCode::PanelSetting => Some(&PANEL_SETTING_DATA),
            CommandCode::PowerSetting => Some(&POWER_SETTING_DATA),
            CommandCode::PowerOff => None,
            CommandCode::PowerOn => None,
            CommandCode::BoosterSoftStart => Some(&BOOSTER_SOFT_START_DATA),
            CommandCode::DeepSleep => Some(&DEEP_SLEEP_DATA),
            CommandCode::DataStartTransmission1 => None, // frame data follows
            CommandCode::DisplayRefresh => None,
            CommandCode::DataStartTransmission2 => None, // frame data follows
            CommandCode::LutVcom => Some(&LUT_VCOM),
            CommandCode::LutWw | CommandCode::LutBw => Some(&LUT_TO_WHITE),
            CommandCode::LutWb | CommandCode::LutBb => Some(&LUT_TO_BLACK),
            CommandCode::PllControl => Some(&PLL_CONTROL_DATA),
            CommandCode::VcomAndDataInterval => Some(&VCOM_AND_DATA_INTERVAL_DATA),
            CommandCode::ResolutionSetting => Some(&RESOLUTION_SETTING_DATA),
            CommandCode::GetStatus => None,
            CommandCode::VcmDcSetting => Some(&VCM_DC_SETTING_DATA),
        }
    }
}
