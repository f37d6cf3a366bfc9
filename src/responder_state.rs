//! The mutable half of a responder. A [ResponderState] always belongs to a
//! [crate::responder_definition::ResponderDefinition]; the definition's
//! factory values seed every field a controller can change.

use crate::consts::{MAX_SENSOR_COUNT, RDM_DEFAULT_STRING_SIZE, SENSOR_VALUE_UNSUPPORTED};
use crate::rdm_types::DmxStartAddress;
use crate::responder_definition::{ResponderDefinition, SensorDefinition};
use crate::types::NackReason;
use crate::unique_identifier::UniqueIdentifier;

/// The device label as stored: a bounded byte string without terminator.
pub type DeviceLabel = heapless::Vec<u8, RDM_DEFAULT_STRING_SIZE>;

/// Live values of one sensor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SensorData {
    pub present_value: i16,
    pub lowest_value: i16,
    pub highest_value: i16,
    pub recorded_value: i16,
    /// Test hook: forces SENSOR_VALUE gets to nack with `nack_reason`.
    /// Deliberately present in shipping builds so controllers can exercise
    /// their error paths.
    pub should_nack: bool,
    pub nack_reason: u16,
}

impl SensorData {
    pub const fn new() -> Self {
        Self {
            present_value: 0,
            lowest_value: SENSOR_VALUE_UNSUPPORTED,
            highest_value: SENSOR_VALUE_UNSUPPORTED,
            recorded_value: SENSOR_VALUE_UNSUPPORTED,
            should_nack: false,
            nack_reason: NackReason::HardwareFault as u16,
        }
    }
}

impl Default for SensorData {
    fn default() -> Self {
        Self::new()
    }
}

/// The mutable state of one addressable responder (root device or one
/// sub-device context).
pub struct ResponderState {
    uid: UniqueIdentifier,
    pub device_label: DeviceLabel,
    /// 1-based index into the definition's personalities. Meaningless when
    /// the definition has none.
    pub current_personality: u8,
    pub dmx_start_address: DmxStartAddress,
    pub sub_device_count: u16,
    pub queued_message_count: u8,
    pub is_muted: bool,
    pub identify_on: bool,
    pub is_subdevice: bool,
    pub is_managed_proxy: bool,
    pub is_proxied_device: bool,
    /// True until a controller SET diverges label, personality, start
    /// address or identify from the definition's factory values.
    pub using_factory_defaults: bool,
    pub sensors: heapless::Vec<SensorData, MAX_SENSOR_COUNT>,
}

impl ResponderState {
    /// Build the state for a fresh responder: topology flags cleared, one
    /// [SensorData] per defined sensor, everything else at factory defaults.
    pub fn new(uid: UniqueIdentifier, definition: &ResponderDefinition) -> Self {
        let mut state = Self {
            uid,
            device_label: DeviceLabel::new(),
            current_personality: 1,
            dmx_start_address: DmxStartAddress::NoAddress,
            sub_device_count: 0,
            queued_message_count: 0,
            is_muted: false,
            identify_on: false,
            is_subdevice: false,
            is_managed_proxy: false,
            is_proxied_device: false,
            using_factory_defaults: true,
            sensors: heapless::Vec::new(),
        };

        state.init_responder(definition);
        state
    }

    /// The assigned uid. Immutable for the lifetime of the responder.
    pub fn uid(&self) -> UniqueIdentifier {
        self.uid
    }

    /// Reset the non-mutable portion of the state (topology flags, sensor
    /// storage) and then restore factory defaults.
    pub fn init_responder(&mut self, definition: &ResponderDefinition) {
        self.is_subdevice = false;
        self.is_managed_proxy = false;
        self.is_proxied_device = false;

        self.sensors.clear();
        for _ in 0..definition.sensors.len().min(MAX_SENSOR_COUNT) {
            self.sensors.push(SensorData::new()).unwrap();
        }

        self.reset_to_factory_defaults(definition);
    }

    /// Restore every controller-mutable field to the definition's factory
    /// value. Idempotent and independent of any persisted state.
    pub fn reset_to_factory_defaults(&mut self, definition: &ResponderDefinition) {
        self.dmx_start_address = DmxStartAddress::NoAddress;
        self.sub_device_count = 0;
        self.current_personality = 1;
        self.queued_message_count = 0;

        self.is_muted = false;
        self.identify_on = false;

        self.device_label.clear();
        crate::codec::push_bounded_str(
            &mut self.device_label,
            definition.default_device_label,
            RDM_DEFAULT_STRING_SIZE,
        );

        if definition.personality_count() != 0 {
            self.current_personality = 1;
            self.dmx_start_address = DmxStartAddress::Address(1);
        }

        self.using_factory_defaults = true;
    }

    /// Reset the tracked extremes and the recorded value of sensor `index`
    /// to the current present value, or to the unsupported sentinel for
    /// fields the definition does not track.
    pub fn reset_sensor(&mut self, index: usize, definition: &SensorDefinition) {
        let sensor = &mut self.sensors[index];

        if definition.supports_lowest_highest() {
            sensor.lowest_value = sensor.present_value;
            sensor.highest_value = sensor.present_value;
        } else {
            sensor.lowest_value = SENSOR_VALUE_UNSUPPORTED;
            sensor.highest_value = SENSOR_VALUE_UNSUPPORTED;
        }

        if definition.supports_recording() {
            sensor.recorded_value = sensor.present_value;
        } else {
            sensor.recorded_value = SENSOR_VALUE_UNSUPPORTED;
        }
    }

    /// Snapshot the present value into the recorded value, when supported.
    pub fn record_sensor(&mut self, index: usize, definition: &SensorDefinition) {
        if definition.supports_recording() {
            let sensor = &mut self.sensors[index];
            sensor.recorded_value = sensor.present_value;
        }
    }
}
