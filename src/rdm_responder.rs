//! The responder protocol core: classifies framed rdm requests, routes them
//! to pid handlers or the discovery engine, and synthesizes byte-exact
//! replies. The transceiver layer stays outside; it hands in validated
//! request frames and transmits whatever [RdmAnswer] comes back.

use crate::coarse_timer::CoarseTimer;
use crate::codec;
use crate::consts::{
    ALL_SENSORS, FLASH_FAST, FLASH_SLOW, MAX_DEFAULT_SLOT_VALUE_PER_FRAME,
    MAX_DMX_START_ADDRESS, MAX_PRODUCT_DETAILS, MAX_SLOT_INFO_PER_FRAME, MAX_SUB_DEVICES,
    RDM_DEFAULT_STRING_SIZE, SENSOR_VALUE_PARAM_DATA_LENGTH, SUBDEVICE_ROOT, UID_LENGTH,
};
use crate::indicator::{Blinker, IndicatorPort};
use crate::layouts::rdm_sensor_value_layout;
use crate::pids;
use crate::rdm_data::{
    build_discovery_response, BinaryRdmPackage, DiscoveryResponseFrame, RdmData, RdmRequestData,
};
use crate::rdm_types::{DeviceInfo, DiscoveryMuteResponse, DmxStartAddress};
use crate::receiver_counters::ReceiverCounters;
use crate::responder_definition::{PidDescriptor, ResponderDefinition};
use crate::responder_state::{DeviceLabel, ResponderState, SensorData};
use crate::types::{DataPack, NackReason, RequestCommandClass, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};

/// The result of a pid handler, before broadcast suppression and framing.
pub enum RdmResult {
    /// The request succeeded. The [DataPack] is the response parameter data.
    Acknowledged(DataPack),
    /// The request succeeded but the result is deferred; the controller has
    /// to wait the contained number of 100ms steps.
    AcknowledgedTimer(u16),
    /// The request was structurally valid but rejected; the [u16] is the
    /// nack reason, usually a [NackReason] value.
    NotAcknowledged(u16),
    /// Nothing may be transmitted for this request.
    NoResponse,
}

/// What the transceiver has to do with the outcome of a request.
pub enum RdmAnswer {
    /// A framed reply; transmit with break and mark-after-break.
    Response(BinaryRdmPackage),
    /// The raw discovery reply; transmit without break.
    DiscoveryResponse(DiscoveryResponseFrame),
    /// Transmit nothing.
    NoResponse,
}

/// Everything a pid handler may touch. Handlers never name a responder
/// instance; the dispatcher decides which model the context points at, so
/// the same handlers serve the root device and sub-device contexts.
pub struct ResponderContext<'a> {
    pub definition: &'a ResponderDefinition<'a>,
    pub state: &'a mut ResponderState,
    pub clock: &'a CoarseTimer,
    pub identify_port: &'a mut dyn IndicatorPort,
    pub mute_port: &'a mut dyn IndicatorPort,
    pub identify_blinker: &'a mut Blinker,
    pub mute_blinker: &'a mut Blinker,
    pub counters: &'a mut ReceiverCounters,
}

/// A definition paired with its mutable state: one addressable responder.
pub struct ResponderModel<'a> {
    pub definition: &'a ResponderDefinition<'a>,
    pub state: ResponderState,
}

impl<'a> ResponderModel<'a> {
    pub fn new(definition: &'a ResponderDefinition<'a>, uid: UniqueIdentifier) -> Self {
        Self {
            state: ResponderState::new(uid, definition),
            definition,
        }
    }
}

/// Commands for retrieving static data without going through the wire
/// protocol.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ModelIoctl {
    /// Copy the responder uid into a 6 byte buffer.
    GetUid,
}

/// Raised when switching to a sub-device context that was never added.
#[derive(Debug)]
pub struct UnknownSubDeviceError;

impl core::fmt::Display for UnknownSubDeviceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "no sub-device context at this index")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownSubDeviceError {}

fn nack(reason: NackReason) -> RdmResult {
    RdmResult::NotAcknowledged(reason as u16)
}

// Generic value codecs
// ----------------------------------------------------------------------------
// The symmetric building blocks most pid handlers reduce to. The set variants
// police the parameter data length themselves.

pub fn generic_get_bool(value: bool) -> RdmResult {
    RdmResult::Acknowledged(DataPack::from_slice(&[value as u8]).unwrap())
}

pub fn generic_set_bool(request: &RdmRequestData, value: &mut bool) -> RdmResult {
    if request.parameter_data.len() != 1 {
        return nack(NackReason::FormatError);
    }

    match request.parameter_data[0] {
        0 => *value = false,
        1 => *value = true,
        _ => return nack(NackReason::DataOutOfRange),
    }

    RdmResult::Acknowledged(DataPack::new())
}

pub fn generic_get_u8(value: u8) -> RdmResult {
    RdmResult::Acknowledged(DataPack::from_slice(&[value]).unwrap())
}

pub fn generic_set_u8(request: &RdmRequestData, value: &mut u8) -> RdmResult {
    if request.parameter_data.len() != 1 {
        return nack(NackReason::FormatError);
    }

    *value = request.parameter_data[0];
    RdmResult::Acknowledged(DataPack::new())
}

pub fn generic_get_u16(value: u16) -> RdmResult {
    RdmResult::Acknowledged(DataPack::from_slice(&value.to_be_bytes()).unwrap())
}

pub fn generic_set_u16(request: &RdmRequestData, value: &mut u16) -> RdmResult {
    if request.parameter_data.len() != 2 {
        return nack(NackReason::FormatError);
    }

    *value = codec::extract_u16(&request.parameter_data);
    RdmResult::Acknowledged(DataPack::new())
}

pub fn generic_get_u32(value: u32) -> RdmResult {
    RdmResult::Acknowledged(DataPack::from_slice(&value.to_be_bytes()).unwrap())
}

pub fn generic_set_u32(request: &RdmRequestData, value: &mut u32) -> RdmResult {
    if request.parameter_data.len() != 4 {
        return nack(NackReason::FormatError);
    }

    *value = codec::extract_u32(&request.parameter_data);
    RdmResult::Acknowledged(DataPack::new())
}

/// Acknowledge with up to `max_size` bytes of `value`, un-terminated.
pub fn generic_return_string(value: &str, max_size: usize) -> RdmResult {
    let mut data = DataPack::new();
    codec::push_bounded_str(&mut data, value, max_size);
    RdmResult::Acknowledged(data)
}

// PID handlers
// ----------------------------------------------------------------------------

fn mute_control_response(state: &ResponderState) -> DataPack {
    DiscoveryMuteResponse {
        sub_device: state.sub_device_count != 0,
        managed_proxy: state.is_managed_proxy,
        proxy_device: state.is_proxied_device,
        binding_uid: None,
    }
    .serialize()
}

pub fn set_mute(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if !request.parameter_data.is_empty() {
        return RdmResult::NoResponse;
    }

    context.state.is_muted = true;
    context.mute_port.set(false);

    RdmResult::Acknowledged(mute_control_response(context.state))
}

pub fn set_un_mute(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if !request.parameter_data.is_empty() {
        return RdmResult::NoResponse;
    }

    context.state.is_muted = false;
    context.mute_port.set(true);
    context.mute_blinker.reset(context.clock.now());

    RdmResult::Acknowledged(mute_control_response(context.state))
}

/// Every pid in the dispatch table, except at root level the mandatory pids
/// a controller already knows every responder supports. A sub-device
/// context reports the full list.
pub fn get_supported_parameters(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    let mut data = DataPack::new();

    for descriptor in context.definition.descriptors {
        let mandatory = matches!(
            descriptor.pid,
            pids::DISC_UNIQUE_BRANCH
                | pids::DISC_MUTE
                | pids::DISC_UN_MUTE
                | pids::SUPPORTED_PARAMETERS
                | pids::PARAMETER_DESCRIPTION
                | pids::DEVICE_INFO
                | pids::SOFTWARE_VERSION_LABEL
                | pids::DMX_START_ADDRESS
                | pids::IDENTIFY_DEVICE
        );

        if !mandatory || context.state.is_subdevice {
            codec::push_u16(&mut data, descriptor.pid);
        }
    }

    RdmResult::Acknowledged(data)
}

pub fn get_parameter_description(
    context: &mut ResponderContext,
    request: &RdmRequestData,
) -> RdmResult {
    let pid = codec::extract_u16(&request.parameter_data);

    let description = match context
        .definition
        .parameter_descriptions
        .iter()
        .find(|description| description.pid == pid)
    {
        Some(description) => description,
        None => return nack(NackReason::DataOutOfRange),
    };

    let mut data = DataPack::new();
    codec::push_u16(&mut data, description.pid);
    data.push(description.pdl_size).unwrap();
    data.push(description.data_type).unwrap();
    data.push(description.command_class).unwrap();
    // The type field is always 0.
    data.push(0).unwrap();
    data.push(description.unit).unwrap();
    data.push(description.prefix).unwrap();
    codec::push_u32(&mut data, description.min_valid_value);
    codec::push_u32(&mut data, description.max_valid_value);
    codec::push_u32(&mut data, description.default_value);
    codec::push_bounded_str(&mut data, description.description, RDM_DEFAULT_STRING_SIZE);

    RdmResult::Acknowledged(data)
}

pub fn get_device_info(context: &mut ResponderContext, _request: &RdmRequestData) -> RdmResult {
    let definition = context.definition;
    let personality = definition.personality(context.state.current_personality);

    RdmResult::Acknowledged(
        DeviceInfo {
            device_model_id: definition.model_id,
            product_category: definition.product_category,
            software_version: definition.software_version,
            dmx_footprint: personality.map_or(0, |personality| personality.dmx_footprint),
            current_personality: context.state.current_personality,
            personality_count: if definition.personalities.is_empty() {
                1
            } else {
                definition.personality_count()
            },
            dmx_start_address: context.state.dmx_start_address.clone(),
            sub_device_count: context.state.sub_device_count,
            sensor_count: definition.sensor_count(),
        }
        .serialize(),
    )
}

pub fn get_product_detail_ids(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    let mut data = DataPack::new();
    for detail_id in context
        .definition
        .product_detail_ids
        .iter()
        .take(MAX_PRODUCT_DETAILS)
    {
        codec::push_u16(&mut data, *detail_id);
    }

    RdmResult::Acknowledged(data)
}

pub fn get_device_model_description(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    generic_return_string(context.definition.model_description, RDM_DEFAULT_STRING_SIZE)
}

pub fn get_manufacturer_label(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    generic_return_string(context.definition.manufacturer_label, RDM_DEFAULT_STRING_SIZE)
}

pub fn get_software_version_label(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    generic_return_string(
        context.definition.software_version_label,
        RDM_DEFAULT_STRING_SIZE,
    )
}

pub fn get_boot_software_version(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    generic_get_u32(context.definition.boot_software_version)
}

pub fn get_boot_software_version_label(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    generic_return_string(
        context.definition.boot_software_version_label,
        RDM_DEFAULT_STRING_SIZE,
    )
}

pub fn get_device_label(context: &mut ResponderContext, _request: &RdmRequestData) -> RdmResult {
    RdmResult::Acknowledged(DataPack::from_slice(&context.state.device_label).unwrap())
}

pub fn set_device_label(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if request.parameter_data.len() > RDM_DEFAULT_STRING_SIZE {
        return nack(NackReason::FormatError);
    }

    let mut new_label = DeviceLabel::new();
    codec::push_bounded_bytes(&mut new_label, &request.parameter_data, RDM_DEFAULT_STRING_SIZE);

    if context.state.device_label != new_label {
        context.state.using_factory_defaults = false;
    }
    context.state.device_label = new_label;

    RdmResult::Acknowledged(DataPack::new())
}

pub fn get_factory_defaults(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    generic_get_bool(context.state.using_factory_defaults)
}

pub fn set_factory_defaults(
    context: &mut ResponderContext,
    request: &RdmRequestData,
) -> RdmResult {
    if !request.parameter_data.is_empty() {
        return nack(NackReason::FormatError);
    }

    context.state.reset_to_factory_defaults(context.definition);
    context.identify_port.set(false);
    context.mute_port.set(true);
    context.mute_blinker.reset(context.clock.now());

    RdmResult::Acknowledged(DataPack::new())
}

pub fn get_dmx_personality(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    RdmResult::Acknowledged(
        DataPack::from_slice(&[
            context.state.current_personality,
            context.definition.personality_count(),
        ])
        .unwrap(),
    )
}

pub fn set_dmx_personality(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if request.parameter_data.len() != 1 {
        return nack(NackReason::FormatError);
    }

    let new_personality = request.parameter_data[0];
    if new_personality == 0 || new_personality > context.definition.personality_count() {
        return nack(NackReason::DataOutOfRange);
    }

    if context.state.current_personality != new_personality {
        context.state.using_factory_defaults = false;
    }
    context.state.current_personality = new_personality;

    RdmResult::Acknowledged(DataPack::new())
}

pub fn get_dmx_personality_description(
    context: &mut ResponderContext,
    request: &RdmRequestData,
) -> RdmResult {
    let index = request.parameter_data[0];
    if index == 0 || index > context.definition.personality_count() {
        return nack(NackReason::DataOutOfRange);
    }

    let personality = match context.definition.personality(index) {
        Some(personality) => personality,
        None => return nack(NackReason::HardwareFault),
    };

    let mut data = DataPack::new();
    data.push(index).unwrap();
    codec::push_u16(&mut data, personality.dmx_footprint);
    codec::push_bounded_str(&mut data, personality.description, RDM_DEFAULT_STRING_SIZE);

    RdmResult::Acknowledged(data)
}

pub fn get_dmx_start_address(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    RdmResult::Acknowledged(context.state.dmx_start_address.serialize())
}

pub fn set_dmx_start_address(
    context: &mut ResponderContext,
    request: &RdmRequestData,
) -> RdmResult {
    if request.parameter_data.len() != 2 {
        return nack(NackReason::FormatError);
    }

    let address = codec::extract_u16(&request.parameter_data);
    if address == 0 || address > MAX_DMX_START_ADDRESS {
        return nack(NackReason::DataOutOfRange);
    }

    if context.state.dmx_start_address.as_u16() != address {
        context.state.using_factory_defaults = false;
    }
    context.state.dmx_start_address = DmxStartAddress::Address(address);

    RdmResult::Acknowledged(DataPack::new())
}

/// Slot metadata of the current personality. Replies carry at most
/// [MAX_SLOT_INFO_PER_FRAME] entries; a controller wanting the remainder
/// has to poll again.
pub fn get_slot_info(context: &mut ResponderContext, _request: &RdmRequestData) -> RdmResult {
    let personality = match context.definition.personality(context.state.current_personality) {
        Some(personality) if !personality.slots.is_empty() => personality,
        _ => return nack(NackReason::HardwareFault),
    };

    let mut data = DataPack::new();
    for (index, slot) in personality
        .slots
        .iter()
        .take(MAX_SLOT_INFO_PER_FRAME)
        .enumerate()
    {
        codec::push_u16(&mut data, index as u16);
        data.push(slot.slot_type).unwrap();
        codec::push_u16(&mut data, slot.slot_label_id);
    }

    RdmResult::Acknowledged(data)
}

pub fn get_slot_description(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    let slot_index = codec::extract_u16(&request.parameter_data);

    let personality = match context.definition.personality(context.state.current_personality) {
        Some(personality) if !personality.slots.is_empty() => personality,
        _ => return nack(NackReason::HardwareFault),
    };

    let slot = match personality.slots.get(slot_index as usize) {
        Some(slot) => slot,
        None => return nack(NackReason::DataOutOfRange),
    };

    let mut data = DataPack::new();
    codec::push_u16(&mut data, slot_index);
    codec::push_bounded_str(&mut data, slot.description, RDM_DEFAULT_STRING_SIZE);

    RdmResult::Acknowledged(data)
}

/// Default slot values of the current personality, capped at
/// [MAX_DEFAULT_SLOT_VALUE_PER_FRAME] entries per reply.
pub fn get_default_slot_value(
    context: &mut ResponderContext,
    _request: &RdmRequestData,
) -> RdmResult {
    let personality = match context.definition.personality(context.state.current_personality) {
        Some(personality) if !personality.slots.is_empty() => personality,
        _ => return nack(NackReason::HardwareFault),
    };

    let mut data = DataPack::new();
    for (index, slot) in personality
        .slots
        .iter()
        .take(MAX_DEFAULT_SLOT_VALUE_PER_FRAME)
        .enumerate()
    {
        codec::push_u16(&mut data, index as u16);
        data.push(slot.default_value).unwrap();
    }

    RdmResult::Acknowledged(data)
}

pub fn get_sensor_definition(
    context: &mut ResponderContext,
    request: &RdmRequestData,
) -> RdmResult {
    let sensor_index = request.parameter_data[0];

    let sensor = match context.definition.sensors.get(sensor_index as usize) {
        Some(sensor) => sensor,
        None => return nack(NackReason::DataOutOfRange),
    };

    let mut data = DataPack::new();
    data.push(sensor_index).unwrap();
    data.push(sensor.kind).unwrap();
    data.push(sensor.unit).unwrap();
    data.push(sensor.prefix).unwrap();
    codec::push_u16(&mut data, sensor.range_minimum_value as u16);
    codec::push_u16(&mut data, sensor.range_maximum_value as u16);
    codec::push_u16(&mut data, sensor.normal_minimum_value as u16);
    codec::push_u16(&mut data, sensor.normal_maximum_value as u16);
    data.push(sensor.recorded_value_support).unwrap();
    codec::push_bounded_str(&mut data, sensor.description, RDM_DEFAULT_STRING_SIZE);

    RdmResult::Acknowledged(data)
}

fn sensor_value_response(index: u8, sensor: &SensorData) -> DataPack {
    let mut buffer = [0u8; SENSOR_VALUE_PARAM_DATA_LENGTH];
    let mut view = rdm_sensor_value_layout::View::new(&mut buffer);

    view.sensor_mut().write(index);
    view.present_value_mut().write(sensor.present_value as u16);
    view.lowest_detected_value_mut()
        .write(sensor.lowest_value as u16);
    view.highest_detected_value_mut()
        .write(sensor.highest_value as u16);
    view.recorded_value_mut().write(sensor.recorded_value as u16);

    DataPack::from_slice(&buffer).unwrap()
}

pub fn get_sensor_value(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    let sensor_index = request.parameter_data[0];

    if sensor_index as usize >= context.state.sensors.len() {
        return nack(NackReason::DataOutOfRange);
    }

    let sensor = &context.state.sensors[sensor_index as usize];
    if sensor.should_nack {
        return RdmResult::NotAcknowledged(sensor.nack_reason);
    }

    RdmResult::Acknowledged(sensor_value_response(sensor_index, sensor))
}

/// Reset one sensor, or all of them with [ALL_SENSORS]. The wildcard reply
/// carries a zeroed value block.
pub fn set_sensor_value(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if request.parameter_data.len() != 1 {
        return nack(NackReason::FormatError);
    }

    let sensor_index = request.parameter_data[0];
    let sensor_count = context.state.sensors.len();

    if (sensor_index as usize) < sensor_count {
        context
            .state
            .reset_sensor(sensor_index as usize, &context.definition.sensors[sensor_index as usize]);
    } else if sensor_index == ALL_SENSORS {
        for index in 0..sensor_count {
            context
                .state
                .reset_sensor(index, &context.definition.sensors[index]);
        }
    } else {
        return nack(NackReason::DataOutOfRange);
    }

    if sensor_index == ALL_SENSORS {
        let zeroed = [0u8; SENSOR_VALUE_PARAM_DATA_LENGTH];
        return RdmResult::Acknowledged(DataPack::from_slice(&zeroed).unwrap());
    }

    RdmResult::Acknowledged(sensor_value_response(
        sensor_index,
        &context.state.sensors[sensor_index as usize],
    ))
}

pub fn set_record_sensors(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if request.parameter_data.len() != 1 {
        return nack(NackReason::FormatError);
    }

    let sensor_index = request.parameter_data[0];
    let sensor_count = context.state.sensors.len();

    if (sensor_index as usize) < sensor_count {
        let definition = &context.definition.sensors[sensor_index as usize];
        if !definition.supports_recording() {
            return nack(NackReason::DataOutOfRange);
        }

        context.state.record_sensor(sensor_index as usize, definition);
    } else if sensor_index == ALL_SENSORS {
        for index in 0..sensor_count {
            context
                .state
                .record_sensor(index, &context.definition.sensors[index]);
        }
    } else {
        return nack(NackReason::DataOutOfRange);
    }

    RdmResult::Acknowledged(DataPack::new())
}

pub fn get_identify_device(context: &mut ResponderContext, _request: &RdmRequestData) -> RdmResult {
    generic_get_bool(context.state.identify_on)
}

pub fn set_identify_device(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    let previous_identify = context.state.identify_on;
    let result = generic_set_bool(request, &mut context.state.identify_on);

    if context.state.identify_on == previous_identify {
        return result;
    }

    context.state.using_factory_defaults = false;
    if context.state.identify_on {
        context.identify_blinker.reset(context.clock.now());
        context.identify_port.set(true);
    } else {
        context.identify_port.set(false);
    }

    result
}

pub fn get_comms_status(context: &mut ResponderContext, _request: &RdmRequestData) -> RdmResult {
    let mut data = DataPack::new();
    codec::push_u16(&mut data, context.counters.rdm_short_frame());
    codec::push_u16(&mut data, context.counters.rdm_length_mismatch());
    codec::push_u16(&mut data, context.counters.rdm_checksum_invalid());

    RdmResult::Acknowledged(data)
}

pub fn set_comms_status(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    if !request.parameter_data.is_empty() {
        return nack(NackReason::FormatError);
    }

    context.counters.reset_comms_status();
    RdmResult::Acknowledged(DataPack::new())
}

/// The dispatch table covering the pids every responder built on this core
/// supports. Device models with extra pids prepend or append their own
/// rows; the table is searched in order.
pub const CORE_PID_DESCRIPTORS: &[PidDescriptor] = &[
    PidDescriptor {
        pid: pids::DISC_UNIQUE_BRANCH,
        get_handler: None,
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::DISC_MUTE,
        get_handler: None,
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::DISC_UN_MUTE,
        get_handler: None,
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::COMMS_STATUS,
        get_handler: Some(get_comms_status),
        set_handler: Some(set_comms_status),
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::SUPPORTED_PARAMETERS,
        get_handler: Some(get_supported_parameters),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::PARAMETER_DESCRIPTION,
        get_handler: Some(get_parameter_description),
        set_handler: None,
        get_param_size: 2,
    },
    PidDescriptor {
        pid: pids::DEVICE_INFO,
        get_handler: Some(get_device_info),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::PRODUCT_DETAIL_ID_LIST,
        get_handler: Some(get_product_detail_ids),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::DEVICE_MODEL_DESCRIPTION,
        get_handler: Some(get_device_model_description),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::MANUFACTURER_LABEL,
        get_handler: Some(get_manufacturer_label),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::DEVICE_LABEL,
        get_handler: Some(get_device_label),
        set_handler: Some(set_device_label),
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::FACTORY_DEFAULTS,
        get_handler: Some(get_factory_defaults),
        set_handler: Some(set_factory_defaults),
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::SOFTWARE_VERSION_LABEL,
        get_handler: Some(get_software_version_label),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::BOOT_SOFTWARE_VERSION_ID,
        get_handler: Some(get_boot_software_version),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::BOOT_SOFTWARE_VERSION_LABEL,
        get_handler: Some(get_boot_software_version_label),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::DMX_PERSONALITY,
        get_handler: Some(get_dmx_personality),
        set_handler: Some(set_dmx_personality),
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::DMX_PERSONALITY_DESCRIPTION,
        get_handler: Some(get_dmx_personality_description),
        set_handler: None,
        get_param_size: 1,
    },
    PidDescriptor {
        pid: pids::DMX_START_ADDRESS,
        get_handler: Some(get_dmx_start_address),
        set_handler: Some(set_dmx_start_address),
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::SLOT_INFO,
        get_handler: Some(get_slot_info),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::SLOT_DESCRIPTION,
        get_handler: Some(get_slot_description),
        set_handler: None,
        get_param_size: 2,
    },
    PidDescriptor {
        pid: pids::DEFAULT_SLOT_VALUE,
        get_handler: Some(get_default_slot_value),
        set_handler: None,
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::SENSOR_DEFINITION,
        get_handler: Some(get_sensor_definition),
        set_handler: None,
        get_param_size: 1,
    },
    PidDescriptor {
        pid: pids::SENSOR_VALUE,
        get_handler: Some(get_sensor_value),
        set_handler: Some(set_sensor_value),
        get_param_size: 1,
    },
    PidDescriptor {
        pid: pids::RECORD_SENSORS,
        get_handler: None,
        set_handler: Some(set_record_sensors),
        get_param_size: 0,
    },
    PidDescriptor {
        pid: pids::IDENTIFY_DEVICE,
        get_handler: Some(get_identify_device),
        set_handler: Some(set_identify_device),
        get_param_size: 0,
    },
];

// Dispatcher
// ----------------------------------------------------------------------------

fn dispatch_pid(context: &mut ResponderContext, request: &RdmRequestData) -> RdmResult {
    // TODO: switch to binary search when descriptor tables grow; needs a
    // sorted-table assertion first.
    for descriptor in context.definition.descriptors {
        if descriptor.pid != request.parameter_id {
            continue;
        }

        return match request.command_class {
            RequestCommandClass::GetCommand => {
                if !request.destination_uid.is_unicast() {
                    return RdmResult::NoResponse;
                }

                match descriptor.get_handler {
                    None => nack(NackReason::UnsupportedCommandClass),
                    Some(handler) => {
                        if request.parameter_data.len() != descriptor.get_param_size as usize {
                            nack(NackReason::FormatError)
                        } else {
                            handler(context, request)
                        }
                    },
                }
            },
            RequestCommandClass::SetCommand => match descriptor.set_handler {
                None => nack(NackReason::UnsupportedCommandClass),
                // Set handlers police their own parameter data length.
                Some(handler) => handler(context, request),
            },
            // Discovery commands never reach the table.
            RequestCommandClass::DiscoveryCommand => RdmResult::NoResponse,
        };
    }

    nack(NackReason::UnknownPid)
}

/// The responder core. Owns the root device model, the optional sub-device
/// contexts, both status indicators and the frame quality counters; borrows
/// the shared tick counter.
pub struct RdmResponder<'a, IdentifyPort: IndicatorPort, MutePort: IndicatorPort> {
    root: ResponderModel<'a>,
    sub_devices: heapless::Vec<ResponderModel<'a>, MAX_SUB_DEVICES>,
    /// The model requests are currently dispatched against; `None` is the
    /// root. Any caller that switches this must restore it before the next
    /// request arrives.
    current: Option<usize>,
    clock: &'a CoarseTimer,
    identify_port: IdentifyPort,
    mute_port: MutePort,
    identify_blinker: Blinker,
    mute_blinker: Blinker,
    counters: ReceiverCounters,
}

impl<'a, IdentifyPort: IndicatorPort, MutePort: IndicatorPort>
    RdmResponder<'a, IdentifyPort, MutePort>
{
    /// Bind the definition, uid, tick counter and the two status indicators.
    /// The identify indicator starts dark, the mute indicator lit.
    pub fn new(
        definition: &'a ResponderDefinition<'a>,
        uid: UniqueIdentifier,
        clock: &'a CoarseTimer,
        mut identify_port: IdentifyPort,
        mut mute_port: MutePort,
    ) -> Self {
        identify_port.configure_output();
        identify_port.set(false);

        mute_port.configure_output();
        mute_port.set(true);

        let mut mute_blinker = Blinker::new(FLASH_SLOW);
        mute_blinker.reset(clock.now());

        Self {
            root: ResponderModel::new(definition, uid),
            sub_devices: heapless::Vec::new(),
            current: None,
            clock,
            identify_port,
            mute_port,
            identify_blinker: Blinker::new(FLASH_FAST),
            mute_blinker,
            counters: ReceiverCounters::new(),
        }
    }

    fn current_model(&self) -> &ResponderModel<'a> {
        match self.current {
            Some(index) => &self.sub_devices[index],
            None => &self.root,
        }
    }

    fn with_context<R>(&mut self, run: impl FnOnce(&mut ResponderContext) -> R) -> R {
        let model = match self.current {
            Some(index) => &mut self.sub_devices[index],
            None => &mut self.root,
        };

        let mut context = ResponderContext {
            definition: model.definition,
            state: &mut model.state,
            clock: self.clock,
            identify_port: &mut self.identify_port,
            mute_port: &mut self.mute_port,
            identify_blinker: &mut self.identify_blinker,
            mute_blinker: &mut self.mute_blinker,
            counters: &mut self.counters,
        };

        run(&mut context)
    }

    /// The state of the model requests are currently dispatched against.
    pub fn state(&self) -> &ResponderState {
        &self.current_model().state
    }

    pub fn state_mut(&mut self) -> &mut ResponderState {
        match self.current {
            Some(index) => &mut self.sub_devices[index].state,
            None => &mut self.root.state,
        }
    }

    pub fn definition(&self) -> &'a ResponderDefinition<'a> {
        self.current_model().definition
    }

    pub fn counters(&self) -> &ReceiverCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut ReceiverCounters {
        &mut self.counters
    }

    pub fn identify_port(&self) -> &IdentifyPort {
        &self.identify_port
    }

    pub fn mute_port(&self) -> &MutePort {
        &self.mute_port
    }

    /// Register a sub-device context. Marks the model as a sub-device and
    /// updates the root's sub-device count.
    pub fn add_sub_device(
        &mut self,
        mut model: ResponderModel<'a>,
    ) -> Result<(), ResponderModel<'a>> {
        model.state.is_subdevice = true;
        self.sub_devices.push(model)?;
        self.root.state.sub_device_count = self.sub_devices.len() as u16;

        Ok(())
    }

    /// Dispatch subsequent requests against the sub-device context at
    /// `index` until [RdmResponder::restore_responder] is called.
    pub fn switch_responder(&mut self, index: usize) -> Result<(), UnknownSubDeviceError> {
        if index >= self.sub_devices.len() {
            return Err(UnknownSubDeviceError);
        }

        self.current = Some(index);
        Ok(())
    }

    /// Dispatch subsequent requests against the root device again.
    pub fn restore_responder(&mut self) {
        self.current = None;
    }

    /// Restore the current model's controller-mutable state to the factory
    /// values of its definition.
    pub fn reset_to_factory_defaults(&mut self) {
        let model = match self.current {
            Some(index) => &mut self.sub_devices[index],
            None => &mut self.root,
        };

        model.state.reset_to_factory_defaults(model.definition);
    }

    /// Static data access for higher layers that bypass the wire protocol.
    /// Returns false when the buffer does not fit the command.
    pub fn ioctl(&self, command: ModelIoctl, buffer: &mut [u8]) -> bool {
        match command {
            ModelIoctl::GetUid => {
                if buffer.len() != UID_LENGTH {
                    return false;
                }

                buffer.copy_from_slice(&self.current_model().state.uid().to_bytes());
                true
            },
        }
    }

    /// The periodic cooperative tick: drives the identify blinker while
    /// identify is on and the mute blinker while the responder is unmuted.
    /// Never blocks; the only side effect is indicator toggling.
    pub fn tasks(&mut self) {
        if self.root.state.identify_on {
            self.identify_blinker.poll(self.clock, &mut self.identify_port);
        }

        if !self.root.state.is_muted {
            self.mute_blinker.poll(self.clock, &mut self.mute_port);
        }
    }

    /// Deserialize a complete frame and dispatch it. Deserialization
    /// failures feed the COMMS_STATUS counters; response frames from other
    /// responders on the bus are ignored.
    pub fn handle_frame(&mut self, frame: &[u8]) -> RdmAnswer {
        match RdmData::deserialize(frame) {
            Ok(RdmData::Request(request)) => self.handle_request(&request),
            Ok(RdmData::Response(_)) => RdmAnswer::NoResponse,
            Err(error) => {
                self.counters.record_deserialization_error(&error);
                RdmAnswer::NoResponse
            },
        }
    }

    /// Dispatch a framed, checksum-validated request. Addressing is checked
    /// first; discovery commands take their own route, everything else goes
    /// through the pid descriptor table of the current model.
    pub fn handle_request(&mut self, request: &RdmRequestData) -> RdmAnswer {
        let own_uid = self.current_model().state.uid();
        match request.destination_uid {
            PackageAddress::ManufacturerBroadcast(manufacturer_uid)
                if manufacturer_uid != own_uid.manufacturer_uid() =>
            {
                return RdmAnswer::NoResponse;
            },
            PackageAddress::Device(device_uid) if device_uid != own_uid => {
                return RdmAnswer::NoResponse;
            },
            _ => {},
        }

        if request.command_class == RequestCommandClass::DiscoveryCommand {
            return self.handle_discovery(request);
        }

        let result = self.with_context(|context| dispatch_pid(context, request));

        self.finalize(request, result)
    }

    fn handle_discovery(&mut self, request: &RdmRequestData) -> RdmAnswer {
        if request.sub_device != SUBDEVICE_ROOT {
            // We can't answer this: 6.3 of E1.20 permits neither an ack nor
            // a nack for discovery on a sub device, so the request is
            // silently dropped.
            return RdmAnswer::NoResponse;
        }

        match request.parameter_id {
            pids::DISC_UNIQUE_BRANCH => self.handle_disc_unique_branch(request),
            pids::DISC_MUTE => {
                let result = self.with_context(|context| set_mute(context, request));
                self.finalize(request, result)
            },
            pids::DISC_UN_MUTE => {
                let result = self.with_context(|context| set_un_mute(context, request));
                self.finalize(request, result)
            },
            _ => RdmAnswer::NoResponse,
        }
    }

    fn handle_disc_unique_branch(&self, request: &RdmRequestData) -> RdmAnswer {
        let state = &self.current_model().state;

        if state.is_muted || request.parameter_data.len() != 2 * UID_LENGTH {
            return RdmAnswer::NoResponse;
        }

        let lower_bound: u64 = PackageAddress::from_bytes(
            &request.parameter_data[..UID_LENGTH].try_into().unwrap(),
        )
        .into();
        let upper_bound: u64 = PackageAddress::from_bytes(
            &request.parameter_data[UID_LENGTH..].try_into().unwrap(),
        )
        .into();
        let own_uid: u64 = state.uid().into();

        if own_uid < lower_bound || own_uid > upper_bound {
            return RdmAnswer::NoResponse;
        }

        RdmAnswer::DiscoveryResponse(build_discovery_response(state.uid()))
    }

    /// Frame a handler result, or suppress it for broadcast destinations.
    /// State changes a set handler performed stick either way.
    fn finalize(&self, request: &RdmRequestData, result: RdmResult) -> RdmAnswer {
        let message_count = self.current_model().state.queued_message_count;

        let response = match result {
            RdmResult::Acknowledged(data) => {
                request.build_response(ResponseType::ResponseTypeAck, data, message_count)
            },
            RdmResult::AcknowledgedTimer(delay) => request.build_response(
                ResponseType::ResponseTypeAckTimer,
                DataPack::from_slice(&delay.to_be_bytes()).unwrap(),
                message_count,
            ),
            RdmResult::NotAcknowledged(nack_reason) => request.build_response(
                ResponseType::ResponseTypeNackReason,
                DataPack::from_slice(&nack_reason.to_be_bytes()).unwrap(),
                message_count,
            ),
            RdmResult::NoResponse => return RdmAnswer::NoResponse,
        };

        match response {
            Ok(response_data) => RdmAnswer::Response(response_data.serialize()),
            Err(_) => RdmAnswer::NoResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{calculate_checksum, decode_disc_unique};
    use crate::consts::{PREAMBLE_BYTE, SEPARATOR_BYTE};
    use crate::rdm_data::RdmResponseData;
    use crate::responder_definition::{
        ParameterDescription, PersonalityDefinition, SensorDefinition, SlotDefinition,
    };
    use crate::types::ResponseCommandClass;

    #[derive(Default)]
    struct TestPort {
        level: bool,
        toggles: usize,
        configured: bool,
    }

    impl IndicatorPort for TestPort {
        fn configure_output(&mut self) {
            self.configured = true;
        }

        fn set(&mut self, level: bool) {
            self.level = level;
        }

        fn toggle(&mut self) {
            self.level = !self.level;
            self.toggles += 1;
        }
    }

    const SLOTS: [SlotDefinition; 2] = [
        SlotDefinition {
            slot_type: 0x00,
            slot_label_id: 0x0001,
            default_value: 0,
            description: "dimmer",
        },
        SlotDefinition {
            slot_type: 0x00,
            slot_label_id: 0x0002,
            default_value: 128,
            description: "shutter",
        },
    ];

    const PERSONALITIES: [PersonalityDefinition; 2] = [
        PersonalityDefinition {
            dmx_footprint: 2,
            description: "2 channel",
            slots: &SLOTS,
        },
        PersonalityDefinition {
            dmx_footprint: 4,
            description: "4 channel",
            slots: &[],
        },
    ];

    const SENSORS: [SensorDefinition; 2] = [
        SensorDefinition {
            kind: 0x00,
            unit: 0x01,
            prefix: 0x00,
            range_minimum_value: -40,
            range_maximum_value: 120,
            normal_minimum_value: 0,
            normal_maximum_value: 85,
            recorded_value_support: 0x03,
            description: "case temperature",
        },
        SensorDefinition {
            kind: 0x00,
            unit: 0x01,
            prefix: 0x00,
            range_minimum_value: 0,
            range_maximum_value: 100,
            normal_minimum_value: 0,
            normal_maximum_value: 100,
            recorded_value_support: 0x00,
            description: "ambient",
        },
    ];

    const PARAMETER_DESCRIPTIONS: [ParameterDescription; 1] = [ParameterDescription {
        pid: 0x8000,
        pdl_size: 1,
        data_type: 0x01,
        command_class: 0x03,
        unit: 0x00,
        prefix: 0x00,
        min_valid_value: 0,
        max_valid_value: 3,
        default_value: 0,
        description: "fan mode",
    }];

    fn definition() -> ResponderDefinition<'static> {
        ResponderDefinition {
            model_id: 0x0102,
            product_category: 0x7101,
            software_version: 0x04030201,
            software_version_label: "1.2.3",
            manufacturer_label: "Open Lighting Project",
            model_description: "test model",
            default_device_label: "factory label",
            boot_software_version: 0x00000001,
            boot_software_version_label: "0.0.1",
            product_detail_ids: &[0x0403, 0x0404],
            personalities: &PERSONALITIES,
            sensors: &SENSORS,
            parameter_descriptions: &PARAMETER_DESCRIPTIONS,
            descriptors: CORE_PID_DESCRIPTORS,
        }
    }

    const OWN_UID: (u16, u32) = (0x7A70, 0x00000001);

    fn own_uid() -> UniqueIdentifier {
        UniqueIdentifier::new(OWN_UID.0, OWN_UID.1).unwrap()
    }

    fn responder<'a>(
        definition: &'a ResponderDefinition<'a>,
        clock: &'a CoarseTimer,
    ) -> RdmResponder<'a, TestPort, TestPort> {
        RdmResponder::new(
            definition,
            own_uid(),
            clock,
            TestPort::default(),
            TestPort::default(),
        )
    }

    fn request_to(
        destination: PackageAddress,
        command_class: RequestCommandClass,
        pid: u16,
        parameter_data: &[u8],
    ) -> RdmRequestData {
        RdmRequestData {
            destination_uid: destination,
            source_uid: UniqueIdentifier::new(0x7FF0, 42).unwrap(),
            transaction_number: 7,
            port_id: 1,
            message_count: 0,
            sub_device: 0,
            command_class,
            parameter_id: pid,
            parameter_data: DataPack::from_slice(parameter_data).unwrap(),
        }
    }

    fn unicast_request(
        command_class: RequestCommandClass,
        pid: u16,
        parameter_data: &[u8],
    ) -> RdmRequestData {
        request_to(
            PackageAddress::Device(own_uid()),
            command_class,
            pid,
            parameter_data,
        )
    }

    fn get(pid: u16, parameter_data: &[u8]) -> RdmRequestData {
        unicast_request(RequestCommandClass::GetCommand, pid, parameter_data)
    }

    fn set(pid: u16, parameter_data: &[u8]) -> RdmRequestData {
        unicast_request(RequestCommandClass::SetCommand, pid, parameter_data)
    }

    /// Unframe a reply; deserializing re-verifies the checksum.
    fn expect_response(answer: RdmAnswer) -> RdmResponseData {
        let frame = match answer {
            RdmAnswer::Response(frame) => frame,
            _ => panic!("expected a framed response"),
        };

        match RdmData::deserialize(&frame).unwrap() {
            RdmData::Response(response) => response,
            _ => panic!("frame did not parse as a response"),
        }
    }

    fn expect_ack(answer: RdmAnswer) -> RdmResponseData {
        let response = expect_response(answer);
        assert_eq!(response.response_type, ResponseType::ResponseTypeAck);
        response
    }

    fn expect_nack(answer: RdmAnswer, reason: NackReason) -> RdmResponseData {
        let response = expect_response(answer);
        assert_eq!(response.response_type, ResponseType::ResponseTypeNackReason);
        assert_eq!(response.parameter_data.len(), 2);
        assert_eq!(
            NackReason::try_from(codec::extract_u16(&response.parameter_data)),
            Ok(reason)
        );
        response
    }

    fn expect_no_response(answer: RdmAnswer) {
        assert!(matches!(answer, RdmAnswer::NoResponse));
    }

    // Discovery
    // ------------------------------------------------------------------

    fn dub_request(lower: [u8; 6], upper: [u8; 6]) -> RdmRequestData {
        let mut parameter_data = [0u8; 12];
        parameter_data[..6].copy_from_slice(&lower);
        parameter_data[6..].copy_from_slice(&upper);

        request_to(
            PackageAddress::Broadcast,
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_UNIQUE_BRANCH,
            &parameter_data,
        )
    }

    #[test]
    fn test_dub_match_emits_encoded_uid() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let answer = responder.handle_request(&dub_request(
            [0x70, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ));

        let frame = match answer {
            RdmAnswer::DiscoveryResponse(frame) => frame,
            _ => panic!("expected a discovery response"),
        };

        assert_eq!(&frame[..7], &[PREAMBLE_BYTE; 7]);
        assert_eq!(frame[7], SEPARATOR_BYTE);
        // 0x7A encodes as the pair (0x7A | 0xAA, 0x7A | 0x55).
        assert_eq!(frame[8], 0xFA);
        assert_eq!(frame[9], 0x7F);

        let mut decoded_uid = [0u8; 6];
        decode_disc_unique(&frame[8..20], &mut decoded_uid);
        assert_eq!(decoded_uid, own_uid().to_bytes());

        let mut decoded_checksum = [0u8; 2];
        decode_disc_unique(&frame[20..24], &mut decoded_checksum);
        assert_eq!(
            u16::from_be_bytes(decoded_checksum),
            calculate_checksum(&frame[8..20])
        );
    }

    #[test]
    fn test_dub_no_response_when_muted() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);
        responder.state_mut().is_muted = true;

        expect_no_response(responder.handle_request(&dub_request(
            [0x70, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        )));
    }

    #[test]
    fn test_dub_no_response_outside_range() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_no_response(responder.handle_request(&dub_request(
            [0x7B, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        )));
    }

    #[test]
    fn test_dub_requires_twelve_byte_range() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = request_to(
            PackageAddress::Broadcast,
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_UNIQUE_BRANCH,
            &[0u8; 11],
        );
        expect_no_response(responder.handle_request(&request));
    }

    #[test]
    fn test_dub_exact_bounds_match() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let bytes = own_uid().to_bytes();
        assert!(matches!(
            responder.handle_request(&dub_request(bytes, bytes)),
            RdmAnswer::DiscoveryResponse(_)
        ));
    }

    #[test]
    fn test_discovery_on_sub_device_is_dropped() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let mut request = unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_MUTE,
            &[],
        );
        request.sub_device = 1;
        expect_no_response(responder.handle_request(&request));
        assert!(!responder.state().is_muted);
    }

    #[test]
    fn test_unknown_discovery_pid_is_dropped() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DEVICE_INFO,
            &[],
        );
        expect_no_response(responder.handle_request(&request));
    }

    // Mute / un-mute
    // ------------------------------------------------------------------

    #[test]
    fn test_mute_sets_flag_and_clears_indicator() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);
        assert!(responder.mute_port().configured);
        assert!(responder.identify_port().configured);
        assert!(responder.mute_port().level);
        assert!(!responder.identify_port().level);

        let request = unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_MUTE,
            &[],
        );
        let response = expect_ack(responder.handle_request(&request));

        assert_eq!(&response.parameter_data[..], &[0x00, 0x00]);
        assert!(responder.state().is_muted);
        assert!(!responder.mute_port().level);
    }

    #[test]
    fn test_un_mute_restores_indicator() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        responder.handle_request(&unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_MUTE,
            &[],
        ));

        let response = expect_ack(responder.handle_request(&unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_UN_MUTE,
            &[],
        )));

        assert_eq!(&response.parameter_data[..], &[0x00, 0x00]);
        assert!(!responder.state().is_muted);
        assert!(responder.mute_port().level);
    }

    #[test]
    fn test_broadcast_mute_takes_effect_silently() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = request_to(
            PackageAddress::Broadcast,
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_MUTE,
            &[],
        );
        expect_no_response(responder.handle_request(&request));
        assert!(responder.state().is_muted);
    }

    #[test]
    fn test_mute_with_parameter_data_is_dropped() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_MUTE,
            &[0x01],
        );
        expect_no_response(responder.handle_request(&request));
        assert!(!responder.state().is_muted);
    }

    // Addressing
    // ------------------------------------------------------------------

    #[test]
    fn test_request_for_other_device_is_ignored() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = request_to(
            PackageAddress::Device(UniqueIdentifier::new(0x7A70, 2).unwrap()),
            RequestCommandClass::GetCommand,
            pids::DEVICE_INFO,
            &[],
        );
        expect_no_response(responder.handle_request(&request));
    }

    #[test]
    fn test_vendorcast_of_other_manufacturer_is_ignored() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = request_to(
            PackageAddress::ManufacturerBroadcast(0x1234),
            RequestCommandClass::SetCommand,
            pids::DEVICE_LABEL,
            b"nope",
        );
        expect_no_response(responder.handle_request(&request));
        assert_eq!(&responder.state().device_label[..], b"factory label");
    }

    #[test]
    fn test_vendorcast_set_mutates_but_stays_silent() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = request_to(
            PackageAddress::ManufacturerBroadcast(0x7A70),
            RequestCommandClass::SetCommand,
            pids::DEVICE_LABEL,
            b"broadcast label",
        );
        expect_no_response(responder.handle_request(&request));
        assert_eq!(&responder.state().device_label[..], b"broadcast label");
    }

    #[test]
    fn test_get_to_broadcast_is_suppressed() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let request = request_to(
            PackageAddress::Broadcast,
            RequestCommandClass::GetCommand,
            pids::DEVICE_INFO,
            &[],
        );
        expect_no_response(responder.handle_request(&request));
    }

    #[test]
    fn test_sub_device_field_is_echoed() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        // The dispatcher leaves sub-device routing to the host; the field
        // carries through to the reply header untouched.
        let mut request = get(pids::DEVICE_INFO, &[]);
        request.sub_device = 1;
        let response = expect_ack(responder.handle_request(&request));
        assert_eq!(response.sub_device, 1);
    }

    // Dispatch
    // ------------------------------------------------------------------

    #[test]
    fn test_unknown_pid_nacks() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_nack(
            responder.handle_request(&get(0x9999, &[])),
            NackReason::UnknownPid,
        );
    }

    #[test]
    fn test_get_with_wrong_parameter_size_nacks_format_error() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_nack(
            responder.handle_request(&get(pids::DEVICE_INFO, &[0x00])),
            NackReason::FormatError,
        );
    }

    #[test]
    fn test_unsupported_command_class() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_nack(
            responder.handle_request(&get(pids::RECORD_SENSORS, &[])),
            NackReason::UnsupportedCommandClass,
        );
        expect_nack(
            responder.handle_request(&set(pids::SUPPORTED_PARAMETERS, &[])),
            NackReason::UnsupportedCommandClass,
        );
    }

    // Device info and labels
    // ------------------------------------------------------------------

    #[test]
    fn test_get_device_info_layout() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(responder.handle_request(&get(pids::DEVICE_INFO, &[])));
        assert_eq!(
            response.command_class,
            ResponseCommandClass::GetCommandResponse
        );

        let data = &response.parameter_data;
        assert_eq!(data.len(), 19);
        assert_eq!(&data[..2], &[0x01, 0x00]);
        assert_eq!(&data[2..4], &[0x01, 0x02]); // model id
        assert_eq!(&data[4..6], &[0x71, 0x01]); // product category
        assert_eq!(&data[6..10], &[0x04, 0x03, 0x02, 0x01]); // software version
        assert_eq!(&data[10..12], &[0x00, 0x02]); // footprint of personality 1
        assert_eq!(data[12], 1); // current personality
        assert_eq!(data[13], 2); // personality count
        assert_eq!(&data[14..16], &[0x00, 0x01]); // start address
        assert_eq!(&data[16..18], &[0x00, 0x00]); // sub device count
        assert_eq!(data[18], 2); // sensor count
    }

    #[test]
    fn test_device_label_round_trip() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response =
            expect_ack(responder.handle_request(&set(pids::DEVICE_LABEL, b"Hello World")));
        assert!(response.parameter_data.is_empty());
        assert!(!responder.state().using_factory_defaults);

        let response = expect_ack(responder.handle_request(&get(pids::DEVICE_LABEL, &[])));
        assert_eq!(&response.parameter_data[..], b"Hello World");
    }

    #[test]
    fn test_device_label_too_long_nacks() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_nack(
            responder.handle_request(&set(pids::DEVICE_LABEL, &[b'x'; 33])),
            NackReason::FormatError,
        );
        assert_eq!(&responder.state().device_label[..], b"factory label");
    }

    #[test]
    fn test_static_strings_and_versions() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response =
            expect_ack(responder.handle_request(&get(pids::MANUFACTURER_LABEL, &[])));
        assert_eq!(&response.parameter_data[..], b"Open Lighting Project");

        let response =
            expect_ack(responder.handle_request(&get(pids::SOFTWARE_VERSION_LABEL, &[])));
        assert_eq!(&response.parameter_data[..], b"1.2.3");

        let response =
            expect_ack(responder.handle_request(&get(pids::BOOT_SOFTWARE_VERSION_ID, &[])));
        assert_eq!(&response.parameter_data[..], &[0x00, 0x00, 0x00, 0x01]);

        let response =
            expect_ack(responder.handle_request(&get(pids::PRODUCT_DETAIL_ID_LIST, &[])));
        assert_eq!(&response.parameter_data[..], &[0x04, 0x03, 0x04, 0x04]);
    }

    // DMX addressing
    // ------------------------------------------------------------------

    #[test]
    fn test_set_dmx_start_address_out_of_range() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_nack(
            responder.handle_request(&set(pids::DMX_START_ADDRESS, &[0x02, 0x01])),
            NackReason::DataOutOfRange,
        );
        assert_eq!(responder.state().dmx_start_address.as_u16(), 1);
        assert!(responder.state().using_factory_defaults);

        expect_nack(
            responder.handle_request(&set(pids::DMX_START_ADDRESS, &[0x00, 0x00])),
            NackReason::DataOutOfRange,
        );
        expect_nack(
            responder.handle_request(&set(pids::DMX_START_ADDRESS, &[0x01])),
            NackReason::FormatError,
        );
    }

    #[test]
    fn test_set_dmx_start_address_round_trip() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_ack(responder.handle_request(&set(pids::DMX_START_ADDRESS, &[0x00, 0x7B])));
        assert!(!responder.state().using_factory_defaults);

        let response = expect_ack(responder.handle_request(&get(pids::DMX_START_ADDRESS, &[])));
        assert_eq!(&response.parameter_data[..], &[0x00, 0x7B]);
    }

    #[test]
    fn test_set_same_start_address_keeps_factory_flag() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_ack(responder.handle_request(&set(pids::DMX_START_ADDRESS, &[0x00, 0x01])));
        assert!(responder.state().using_factory_defaults);
    }

    // Personalities and slots
    // ------------------------------------------------------------------

    #[test]
    fn test_personality_bounds() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_nack(
            responder.handle_request(&set(pids::DMX_PERSONALITY, &[0])),
            NackReason::DataOutOfRange,
        );
        expect_nack(
            responder.handle_request(&set(pids::DMX_PERSONALITY, &[3])),
            NackReason::DataOutOfRange,
        );

        expect_ack(responder.handle_request(&set(pids::DMX_PERSONALITY, &[2])));
        assert_eq!(responder.state().current_personality, 2);
        assert!(!responder.state().using_factory_defaults);

        let response = expect_ack(responder.handle_request(&get(pids::DMX_PERSONALITY, &[])));
        assert_eq!(&response.parameter_data[..], &[2, 2]);

        // Device info follows the new footprint.
        let response = expect_ack(responder.handle_request(&get(pids::DEVICE_INFO, &[])));
        assert_eq!(&response.parameter_data[10..12], &[0x00, 0x04]);
    }

    #[test]
    fn test_personality_description() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(
            responder.handle_request(&get(pids::DMX_PERSONALITY_DESCRIPTION, &[2])),
        );
        assert_eq!(&response.parameter_data[..3], &[2, 0x00, 0x04]);
        assert_eq!(&response.parameter_data[3..], b"4 channel");

        expect_nack(
            responder.handle_request(&get(pids::DMX_PERSONALITY_DESCRIPTION, &[0])),
            NackReason::DataOutOfRange,
        );
        expect_nack(
            responder.handle_request(&get(pids::DMX_PERSONALITY_DESCRIPTION, &[3])),
            NackReason::DataOutOfRange,
        );
    }

    #[test]
    fn test_slot_info_and_defaults() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(responder.handle_request(&get(pids::SLOT_INFO, &[])));
        assert_eq!(
            &response.parameter_data[..],
            &[
                0x00, 0x00, 0x00, 0x00, 0x01, // slot 0
                0x00, 0x01, 0x00, 0x00, 0x02, // slot 1
            ]
        );

        let response =
            expect_ack(responder.handle_request(&get(pids::DEFAULT_SLOT_VALUE, &[])));
        assert_eq!(
            &response.parameter_data[..],
            &[0x00, 0x00, 0, 0x00, 0x01, 128]
        );

        let response =
            expect_ack(responder.handle_request(&get(pids::SLOT_DESCRIPTION, &[0x00, 0x01])));
        assert_eq!(&response.parameter_data[..2], &[0x00, 0x01]);
        assert_eq!(&response.parameter_data[2..], b"shutter");

        expect_nack(
            responder.handle_request(&get(pids::SLOT_DESCRIPTION, &[0x00, 0x02])),
            NackReason::DataOutOfRange,
        );

        // Personality 2 defines no slots.
        expect_ack(responder.handle_request(&set(pids::DMX_PERSONALITY, &[2])));
        expect_nack(
            responder.handle_request(&get(pids::SLOT_INFO, &[])),
            NackReason::HardwareFault,
        );
        expect_nack(
            responder.handle_request(&get(pids::DEFAULT_SLOT_VALUE, &[])),
            NackReason::HardwareFault,
        );
    }

    // Supported parameters / parameter description
    // ------------------------------------------------------------------

    #[test]
    fn test_supported_parameters_omits_mandatory_pids() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response =
            expect_ack(responder.handle_request(&get(pids::SUPPORTED_PARAMETERS, &[])));

        let reported: heapless::Vec<u16, 32> = response
            .parameter_data
            .chunks(2)
            .map(|chunk| u16::from_be_bytes(chunk.try_into().unwrap()))
            .collect();

        let expected = [
            pids::COMMS_STATUS,
            pids::PRODUCT_DETAIL_ID_LIST,
            pids::DEVICE_MODEL_DESCRIPTION,
            pids::MANUFACTURER_LABEL,
            pids::DEVICE_LABEL,
            pids::FACTORY_DEFAULTS,
            pids::BOOT_SOFTWARE_VERSION_ID,
            pids::BOOT_SOFTWARE_VERSION_LABEL,
            pids::DMX_PERSONALITY,
            pids::DMX_PERSONALITY_DESCRIPTION,
            pids::SLOT_INFO,
            pids::SLOT_DESCRIPTION,
            pids::DEFAULT_SLOT_VALUE,
            pids::SENSOR_DEFINITION,
            pids::SENSOR_VALUE,
            pids::RECORD_SENSORS,
        ];
        assert_eq!(&reported[..], &expected);
    }

    #[test]
    fn test_parameter_description_lookup() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(
            responder.handle_request(&get(pids::PARAMETER_DESCRIPTION, &[0x80, 0x00])),
        );

        let data = &response.parameter_data;
        assert_eq!(&data[..2], &[0x80, 0x00]);
        assert_eq!(data[2], 1); // pdl size
        assert_eq!(data[3], 0x01); // data type
        assert_eq!(data[4], 0x03); // command class
        assert_eq!(data[5], 0); // type, always 0
        assert_eq!(&data[8..12], &[0x00, 0x00, 0x00, 0x00]); // min
        assert_eq!(&data[12..16], &[0x00, 0x00, 0x00, 0x03]); // max
        assert_eq!(&data[20..], b"fan mode");

        expect_nack(
            responder.handle_request(&get(pids::PARAMETER_DESCRIPTION, &[0x80, 0x01])),
            NackReason::DataOutOfRange,
        );
    }

    // Sensors
    // ------------------------------------------------------------------

    #[test]
    fn test_sensor_definition() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response =
            expect_ack(responder.handle_request(&get(pids::SENSOR_DEFINITION, &[0])));

        let data = &response.parameter_data;
        assert_eq!(data[0], 0);
        assert_eq!(data[1], 0x00); // kind
        assert_eq!(data[2], 0x01); // unit
        assert_eq!(&data[4..6], &(-40i16 as u16).to_be_bytes()); // range minimum
        assert_eq!(&data[6..8], &120u16.to_be_bytes()); // range maximum
        assert_eq!(data[12], 0x03); // support mask
        assert_eq!(&data[13..], b"case temperature");

        expect_nack(
            responder.handle_request(&get(pids::SENSOR_DEFINITION, &[5])),
            NackReason::DataOutOfRange,
        );
    }

    #[test]
    fn test_sensor_value_get_and_reset() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        responder.state_mut().sensors[0].present_value = 42;
        responder.state_mut().sensors[0].lowest_value = -3;
        responder.state_mut().sensors[0].highest_value = 77;

        let response = expect_ack(responder.handle_request(&get(pids::SENSOR_VALUE, &[0])));
        assert_eq!(
            &response.parameter_data[..],
            &[
                0, 0x00, 42, // present
                0xFF, 0xFD, // lowest (-3)
                0x00, 77, // highest
                0x00, 0x00, // recorded
            ]
        );

        // A set resets the extremes to the present value.
        let response = expect_ack(responder.handle_request(&set(pids::SENSOR_VALUE, &[0])));
        assert_eq!(
            &response.parameter_data[..],
            &[0, 0x00, 42, 0x00, 42, 0x00, 42, 0x00, 42]
        );

        // Wildcard reset acks with a zeroed block.
        let response =
            expect_ack(responder.handle_request(&set(pids::SENSOR_VALUE, &[ALL_SENSORS])));
        assert_eq!(&response.parameter_data[..], &[0u8; 9]);

        expect_nack(
            responder.handle_request(&get(pids::SENSOR_VALUE, &[9])),
            NackReason::DataOutOfRange,
        );
        expect_nack(
            responder.handle_request(&set(pids::SENSOR_VALUE, &[9])),
            NackReason::DataOutOfRange,
        );
    }

    #[test]
    fn test_sensor_nack_hook() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        responder.state_mut().sensors[1].should_nack = true;
        responder.state_mut().sensors[1].nack_reason = NackReason::HardwareFault as u16;

        expect_nack(
            responder.handle_request(&get(pids::SENSOR_VALUE, &[1])),
            NackReason::HardwareFault,
        );
    }

    #[test]
    fn test_record_sensors() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        responder.state_mut().sensors[0].present_value = 55;
        responder.state_mut().sensors[1].present_value = 66;

        // Sensor 1 does not support recording.
        expect_nack(
            responder.handle_request(&set(pids::RECORD_SENSORS, &[1])),
            NackReason::DataOutOfRange,
        );

        expect_ack(responder.handle_request(&set(pids::RECORD_SENSORS, &[0])));
        assert_eq!(responder.state().sensors[0].recorded_value, 55);

        // The wildcard records only the sensors that support it.
        responder.state_mut().sensors[0].present_value = 56;
        expect_ack(responder.handle_request(&set(pids::RECORD_SENSORS, &[ALL_SENSORS])));
        assert_eq!(responder.state().sensors[0].recorded_value, 56);
        assert_eq!(responder.state().sensors[1].recorded_value, 0);
    }

    // Identify
    // ------------------------------------------------------------------

    #[test]
    fn test_identify_round_trip() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(responder.handle_request(&get(pids::IDENTIFY_DEVICE, &[])));
        assert_eq!(&response.parameter_data[..], &[0]);

        expect_ack(responder.handle_request(&set(pids::IDENTIFY_DEVICE, &[1])));
        assert!(responder.state().identify_on);
        assert!(responder.identify_port().level);
        assert!(!responder.state().using_factory_defaults);

        expect_ack(responder.handle_request(&set(pids::IDENTIFY_DEVICE, &[0])));
        assert!(!responder.state().identify_on);
        assert!(!responder.identify_port().level);

        expect_nack(
            responder.handle_request(&set(pids::IDENTIFY_DEVICE, &[2])),
            NackReason::DataOutOfRange,
        );
        expect_nack(
            responder.handle_request(&set(pids::IDENTIFY_DEVICE, &[1, 1])),
            NackReason::FormatError,
        );
    }

    #[test]
    fn test_identify_blinker_toggles() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        expect_ack(responder.handle_request(&set(pids::IDENTIFY_DEVICE, &[1])));

        clock.set_counter(FLASH_FAST + 1);
        responder.tasks();
        assert_eq!(responder.identify_port().toggles, 1);

        // Not again before another full period.
        responder.tasks();
        assert_eq!(responder.identify_port().toggles, 1);

        clock.set_counter(2 * FLASH_FAST + 2);
        responder.tasks();
        assert_eq!(responder.identify_port().toggles, 2);
    }

    #[test]
    fn test_mute_blinker_only_runs_unmuted() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        clock.set_counter(FLASH_SLOW + 1);
        responder.tasks();
        assert_eq!(responder.mute_port().toggles, 1);

        responder.state_mut().is_muted = true;
        clock.set_counter(2 * FLASH_SLOW + 2);
        responder.tasks();
        assert_eq!(responder.mute_port().toggles, 1);
    }

    // Factory defaults
    // ------------------------------------------------------------------

    #[test]
    fn test_factory_defaults_pid() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(responder.handle_request(&get(pids::FACTORY_DEFAULTS, &[])));
        assert_eq!(&response.parameter_data[..], &[1]);

        expect_ack(responder.handle_request(&set(pids::DEVICE_LABEL, b"changed")));
        let response = expect_ack(responder.handle_request(&get(pids::FACTORY_DEFAULTS, &[])));
        assert_eq!(&response.parameter_data[..], &[0]);

        expect_ack(responder.handle_request(&set(pids::FACTORY_DEFAULTS, &[])));
        assert!(responder.state().using_factory_defaults);
        assert_eq!(&responder.state().device_label[..], b"factory label");

        expect_nack(
            responder.handle_request(&set(pids::FACTORY_DEFAULTS, &[1])),
            NackReason::FormatError,
        );
    }

    // Comms status and framed entry
    // ------------------------------------------------------------------

    fn framed_get(pid: u16) -> heapless::Vec<u8, 64> {
        let mut frame: heapless::Vec<u8, 64> = heapless::Vec::from_slice(&[
            0xCC, 0x01, 24, // start, sub start, message length
            0x7A, 0x70, 0x00, 0x00, 0x00, 0x01, // destination
            0x7F, 0xF0, 0x00, 0x00, 0x00, 0x2A, // source
            0x07, 0x01, 0x00, // transaction, port id, message count
            0x00, 0x00, // sub device
            0x20, // get
        ])
        .unwrap();
        frame.extend_from_slice(&pid.to_be_bytes()).unwrap();
        frame.push(0).unwrap(); // pdl

        let checksum = calculate_checksum(&frame);
        frame.extend_from_slice(&checksum.to_be_bytes()).unwrap();
        frame
    }

    #[test]
    fn test_handle_frame_end_to_end() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_ack(responder.handle_frame(&framed_get(pids::DEVICE_INFO)));
        assert_eq!(response.parameter_id, pids::DEVICE_INFO);
        assert_eq!(response.parameter_data.len(), 19);
        assert_eq!(response.transaction_number, 7);
    }

    #[test]
    fn test_handle_frame_counts_bad_checksums() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let mut frame = framed_get(pids::DEVICE_INFO);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        expect_no_response(responder.handle_frame(&frame));
        expect_no_response(responder.handle_frame(&[0xCC, 0x01]));
        assert_eq!(responder.counters().rdm_checksum_invalid(), 1);
        assert_eq!(responder.counters().rdm_short_frame(), 1);

        let response = expect_ack(responder.handle_request(&get(pids::COMMS_STATUS, &[])));
        assert_eq!(
            &response.parameter_data[..],
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x01]
        );

        expect_ack(responder.handle_request(&set(pids::COMMS_STATUS, &[])));
        assert_eq!(responder.counters().rdm_checksum_invalid(), 0);

        let response = expect_ack(responder.handle_request(&get(pids::COMMS_STATUS, &[])));
        assert_eq!(&response.parameter_data[..], &[0u8; 6]);
    }

    // Sub-device contexts and ioctl
    // ------------------------------------------------------------------

    #[test]
    fn test_sub_device_context_switch() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        assert!(responder
            .add_sub_device(ResponderModel::new(&definition, own_uid()))
            .is_ok());
        assert_eq!(responder.state().sub_device_count, 1);

        // With a sub device registered, a mute reply advertises it.
        let response = expect_ack(responder.handle_request(&unicast_request(
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_MUTE,
            &[],
        )));
        assert_eq!(&response.parameter_data[..], &[0x00, 0x01]);

        assert!(responder.switch_responder(1).is_err());
        responder.switch_responder(0).unwrap();
        assert!(responder.state().is_subdevice);

        // A sub-device context reports the full supported parameter list.
        let mut request = get(pids::SUPPORTED_PARAMETERS, &[]);
        request.sub_device = 1;
        let response = expect_ack(responder.handle_request(&request));
        assert_eq!(
            response.parameter_data.len(),
            2 * CORE_PID_DESCRIPTORS.len()
        );

        responder.restore_responder();
        assert!(!responder.state().is_subdevice);
    }

    #[test]
    fn test_ioctl_get_uid() {
        let definition = definition();
        let clock = CoarseTimer::new();
        let responder = responder(&definition, &clock);

        let mut buffer = [0u8; 6];
        assert!(responder.ioctl(ModelIoctl::GetUid, &mut buffer));
        assert_eq!(buffer, own_uid().to_bytes());

        let mut short_buffer = [0u8; 4];
        assert!(!responder.ioctl(ModelIoctl::GetUid, &mut short_buffer));
    }

    // Custom handlers and deferred replies
    // ------------------------------------------------------------------

    fn get_fan_mode(_context: &mut ResponderContext, _request: &RdmRequestData) -> RdmResult {
        RdmResult::AcknowledgedTimer(123)
    }

    #[test]
    fn test_custom_descriptor_with_ack_timer() {
        const FAN_MODE_ROW: [PidDescriptor; 1] = [PidDescriptor {
            pid: 0x8000,
            get_handler: Some(get_fan_mode),
            set_handler: None,
            get_param_size: 0,
        }];

        let mut definition = definition();
        definition.descriptors = &FAN_MODE_ROW;

        let clock = CoarseTimer::new();
        let mut responder = responder(&definition, &clock);

        let response = expect_response(responder.handle_request(&get(0x8000, &[])));
        assert_eq!(response.response_type, ResponseType::ResponseTypeAckTimer);
        assert_eq!(&response.parameter_data[..], &[0x00, 123]);
    }

    #[test]
    fn test_generic_codec_helpers() {
        let mut value_u16 = 0u16;
        let request = set(0x8000, &[0x12, 0x34]);
        assert!(matches!(
            generic_set_u16(&request, &mut value_u16),
            RdmResult::Acknowledged(_)
        ));
        assert_eq!(value_u16, 0x1234);

        let mut value_u32 = 0u32;
        let request = set(0x8000, &[0x01, 0x02, 0x03, 0x04]);
        assert!(matches!(
            generic_set_u32(&request, &mut value_u32),
            RdmResult::Acknowledged(_)
        ));
        assert_eq!(value_u32, 0x01020304);

        let request = set(0x8000, &[0x01]);
        let mut value_u8 = 0u8;
        assert!(matches!(
            generic_set_u8(&request, &mut value_u8),
            RdmResult::Acknowledged(_)
        ));
        assert_eq!(value_u8, 1);

        let bad_request = set(0x8000, &[0x01, 0x02, 0x03]);
        assert!(matches!(
            generic_set_u16(&bad_request, &mut value_u16),
            RdmResult::NotAcknowledged(reason) if reason == NackReason::FormatError as u16
        ));

        match generic_get_u16(0xABCD) {
            RdmResult::Acknowledged(data) => assert_eq!(&data[..], &[0xAB, 0xCD]),
            _ => panic!("expected an ack"),
        }
        match generic_get_u8(7) {
            RdmResult::Acknowledged(data) => assert_eq!(&data[..], &[7]),
            _ => panic!("expected an ack"),
        }
    }
}
