pub const SC_RDM: u8 = 0xCC;
pub const SC_SUB_MESSAGE: u8 = 0x01;

pub const PREAMBLE_BYTE: u8 = 0xFE;
pub const SEPARATOR_BYTE: u8 = 0xAA;

pub const UID_LENGTH: usize = 6;
pub const BROADCAST_UID: u64 = 0xFFFF_FFFFFFFF;

/// Header (24 bytes) plus checksum, no parameter data.
pub const RDM_MIN_PACKAGE_SIZE: usize = 26;
pub const RDM_MAX_PACKAGE_SIZE: usize = 257;
pub const RDM_HEADER_SIZE: usize = 24;
pub const RDM_MAX_PARAMETER_DATA_LENGTH: usize = 231;

/// Protocol version reported in DEVICE_INFO.
pub const RDM_VERSION: u16 = 0x0100;
/// Size of a DEVICE_INFO parameter block.
pub const RDM_DEVICE_INFO_SIZE: usize = 0x13;

/// Discovery response payload, excluding preamble and separator.
pub const RDM_DISCOVERY_RESPONSE_SIZE: usize = 16;
/// Discovery response including 7 preamble bytes and the separator.
pub const DUB_RESPONSE_LENGTH: usize = RDM_DISCOVERY_RESPONSE_SIZE + 8;

/// Cap for labels and descriptions on the wire.
pub const RDM_DEFAULT_STRING_SIZE: usize = 32;

pub const SUBDEVICE_ROOT: u16 = 0x0000;
pub const SUBDEVICE_ALL: u16 = 0xFFFF;

pub const MAX_DMX_START_ADDRESS: u16 = 512;
/// Reported when the device has no DMX footprint.
pub const INVALID_DMX_START_ADDRESS: u16 = 0xFFFF;

/// Sensor index wildcard for SENSOR_VALUE / RECORD_SENSORS sets.
pub const ALL_SENSORS: u8 = 0xFF;
/// Fills sensor fields the definition does not support.
pub const SENSOR_VALUE_UNSUPPORTED: i16 = 0;
pub const SENSOR_SUPPORTS_RECORDING_MASK: u8 = 0x01;
pub const SENSOR_SUPPORTS_LOWEST_HIGHEST_MASK: u8 = 0x02;
/// Size of a SENSOR_VALUE parameter block.
pub const SENSOR_VALUE_PARAM_DATA_LENGTH: usize = 9;

pub const MAX_SENSOR_COUNT: usize = 16;
pub const MAX_PRODUCT_DETAILS: usize = 6;
/// SLOT_INFO entries that fit a single frame; longer tables are capped.
pub const MAX_SLOT_INFO_PER_FRAME: usize = 46;
/// DEFAULT_SLOT_VALUE entries that fit a single frame; longer tables are capped.
pub const MAX_DEFAULT_SLOT_VALUE_PER_FRAME: usize = 77;
pub const MAX_SUB_DEVICES: usize = 4;

/// Identify indicator toggle period, in coarse timer ticks.
pub const FLASH_FAST: u32 = 1000;
/// Mute indicator toggle period, in coarse timer ticks.
pub const FLASH_SLOW: u32 = 10000;

/// Nominal coarse timer tick period.
pub const COARSE_TIMER_TICK_MICROS: u32 = 100;

/// Fastest permitted responder turnaround, in tenths of a microsecond
/// (E1.20 Table 3-4). Enforced by the transceiver layer.
pub const MINIMUM_RESPONDER_DELAY: u32 = 1760;
/// Slowest permitted responder turnaround, in tenths of a microsecond
/// (E1.20 Table 3-4). Enforced by the transceiver layer.
pub const MAXIMUM_RESPONDER_DELAY: u32 = 20000;
