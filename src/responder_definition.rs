//! The immutable half of a responder: everything a device model declares
//! about itself once, shared by all instances of that model. Definitions are
//! usually `const` data; the responder only ever borrows them.

use crate::rdm_data::RdmRequestData;
use crate::rdm_responder::{RdmResult, ResponderContext};

/// One DMX footprint/profile a responder can be switched into.
pub struct PersonalityDefinition<'a> {
    pub dmx_footprint: u16,
    pub description: &'a str,
    /// Slot metadata; empty when the model does not describe its slots.
    pub slots: &'a [SlotDefinition<'a>],
}

pub struct SlotDefinition<'a> {
    pub slot_type: u8,
    pub slot_label_id: u16,
    pub default_value: u8,
    pub description: &'a str,
}

pub struct SensorDefinition<'a> {
    pub kind: u8,
    pub unit: u8,
    pub prefix: u8,
    pub range_minimum_value: i16,
    pub range_maximum_value: i16,
    pub normal_minimum_value: i16,
    pub normal_maximum_value: i16,
    /// Bit mask of [crate::consts::SENSOR_SUPPORTS_RECORDING_MASK] and
    /// [crate::consts::SENSOR_SUPPORTS_LOWEST_HIGHEST_MASK].
    pub recorded_value_support: u8,
    pub description: &'a str,
}

impl SensorDefinition<'_> {
    pub fn supports_recording(&self) -> bool {
        self.recorded_value_support & crate::consts::SENSOR_SUPPORTS_RECORDING_MASK != 0
    }

    pub fn supports_lowest_highest(&self) -> bool {
        self.recorded_value_support & crate::consts::SENSOR_SUPPORTS_LOWEST_HIGHEST_MASK != 0
    }
}

/// Description of a manufacturer-specific pid, served through
/// PARAMETER_DESCRIPTION.
pub struct ParameterDescription<'a> {
    pub pid: u16,
    pub pdl_size: u8,
    pub data_type: u8,
    pub command_class: u8,
    pub unit: u8,
    pub prefix: u8,
    pub min_valid_value: u32,
    pub max_valid_value: u32,
    pub default_value: u32,
    pub description: &'a str,
}

/// A pid handler. Handlers are pure functions of the context and the
/// request; the dispatcher decides which responder model the context
/// points at.
pub type PidHandler = fn(&mut ResponderContext, &RdmRequestData) -> RdmResult;

/// One row of the pid dispatch table.
pub struct PidDescriptor {
    pub pid: u16,
    pub get_handler: Option<PidHandler>,
    pub set_handler: Option<PidHandler>,
    /// The exact parameter data length a GET of this pid must carry.
    pub get_param_size: u8,
}

/// The immutable descriptor of a device model.
pub struct ResponderDefinition<'a> {
    pub model_id: u16,
    pub product_category: u16,
    pub software_version: u32,
    pub software_version_label: &'a str,
    pub manufacturer_label: &'a str,
    pub model_description: &'a str,
    pub default_device_label: &'a str,
    pub boot_software_version: u32,
    pub boot_software_version_label: &'a str,
    pub product_detail_ids: &'a [u16],
    /// Ordered; personalities are addressed 1-based on the wire.
    pub personalities: &'a [PersonalityDefinition<'a>],
    pub sensors: &'a [SensorDefinition<'a>],
    pub parameter_descriptions: &'a [ParameterDescription<'a>],
    /// The dispatch table, searched in order.
    pub descriptors: &'a [PidDescriptor],
}

impl<'a> ResponderDefinition<'a> {
    pub fn personality_count(&self) -> u8 {
        self.personalities.len() as u8
    }

    pub fn sensor_count(&self) -> u8 {
        self.sensors.len() as u8
    }

    /// Look up a personality by its 1-based wire index.
    pub fn personality(&self, index: u8) -> Option<&'a PersonalityDefinition<'a>> {
        if index == 0 {
            return None;
        }

        self.personalities.get(index as usize - 1)
    }
}
