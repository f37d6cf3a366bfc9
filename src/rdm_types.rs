use crate::codec;
use crate::consts::{
    INVALID_DMX_START_ADDRESS, MAX_DMX_START_ADDRESS, RDM_DEVICE_INFO_SIZE, RDM_VERSION,
};
use crate::layouts::rdm_device_info_layout;
use crate::types::DataPack;
use crate::unique_identifier::UniqueIdentifier;
use modular_bitfield::bitfield;
use modular_bitfield::prelude::B13;

#[derive(Debug)]
pub struct DeserializationError;

impl core::fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "There was a deserialization error.")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeserializationError {}

/// The configured start of the dmx address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmxStartAddress {
    /// The device has a dmx footprint of 0; reported as 0xFFFF on the wire.
    NoAddress,
    /// The device allocates dmx addresses beginning here, in `1..=512`.
    Address(u16),
}

impl DmxStartAddress {
    pub fn as_u16(&self) -> u16 {
        match self {
            DmxStartAddress::Address(address) => *address,
            DmxStartAddress::NoAddress => INVALID_DMX_START_ADDRESS,
        }
    }

    pub fn serialize(&self) -> DataPack {
        DataPack::from_slice(&self.as_u16().to_be_bytes()).unwrap()
    }
}

impl TryFrom<u16> for DmxStartAddress {
    type Error = DeserializationError;

    fn try_from(start_address: u16) -> Result<Self, Self::Error> {
        if start_address == INVALID_DMX_START_ADDRESS {
            return Ok(Self::NoAddress);
        }

        if !(1..=MAX_DMX_START_ADDRESS).contains(&start_address) {
            return Err(DeserializationError);
        }

        Ok(Self::Address(start_address))
    }
}

/// Control field of a mute/un-mute response. The first declared flag is
/// bit 0 of the 16-bit field.
#[bitfield]
struct DiscControlField {
    /// The responder manages sub devices.
    pub sub_device: bool,
    /// The responder is a managed proxy.
    pub managed_proxy: bool,
    /// A proxy is answering on behalf of this device.
    pub proxy_device: bool,
    #[skip]
    reserved: B13,
}

/// Response to discovery mute/un-mute requests.
pub struct DiscoveryMuteResponse {
    /// The responder manages sub devices.
    pub sub_device: bool,
    /// The responder is a managed proxy.
    pub managed_proxy: bool,
    /// A proxy is answering on behalf of this device.
    pub proxy_device: bool,
    /// Included when the responding device contains multiple responder
    /// ports; names the primary port of the device.
    pub binding_uid: Option<UniqueIdentifier>,
}

impl DiscoveryMuteResponse {
    pub fn control_field(&self) -> u16 {
        let bits = DiscControlField::new()
            .with_sub_device(self.sub_device)
            .with_managed_proxy(self.managed_proxy)
            .with_proxy_device(self.proxy_device);

        u16::from_le_bytes(bits.into_bytes())
    }

    pub fn serialize(&self) -> DataPack {
        let mut data_pack = DataPack::new();
        codec::push_u16(&mut data_pack, self.control_field());

        match self.binding_uid {
            None => {},
            Some(uid) => data_pack.extend_from_slice(&uid.to_bytes()).unwrap(),
        }

        data_pack
    }
}

/// The DEVICE_INFO parameter block.
pub struct DeviceInfo {
    pub device_model_id: u16,
    pub product_category: u16,
    pub software_version: u32,
    pub dmx_footprint: u16,
    pub current_personality: u8,
    pub personality_count: u8,
    pub dmx_start_address: DmxStartAddress,
    pub sub_device_count: u16,
    pub sensor_count: u8,
}

impl DeviceInfo {
    pub fn deserialize(buffer: &[u8]) -> Result<Self, DeserializationError> {
        if buffer.len() != RDM_DEVICE_INFO_SIZE {
            return Err(DeserializationError);
        }

        let device_info_view = rdm_device_info_layout::View::new(buffer);
        Ok(DeviceInfo {
            device_model_id: device_info_view.device_model_id().read(),
            product_category: device_info_view.product_category().read(),
            software_version: device_info_view.software_version_id().read(),
            dmx_footprint: device_info_view.dmx_footprint().read(),
            current_personality: device_info_view.current_personality().read(),
            personality_count: device_info_view.personality_count().read(),
            dmx_start_address: device_info_view.dmx_start_address().read().try_into()?,
            sub_device_count: device_info_view.sub_device_count().read(),
            sensor_count: device_info_view.sensor_count().read(),
        })
    }

    pub fn serialize(&self) -> DataPack {
        let mut resp_buffer = [0u8; RDM_DEVICE_INFO_SIZE];
        let mut device_info_view = rdm_device_info_layout::View::new(&mut resp_buffer);

        device_info_view.protocol_version_mut().write(RDM_VERSION);
        device_info_view
            .device_model_id_mut()
            .write(self.device_model_id);
        device_info_view
            .product_category_mut()
            .write(self.product_category);
        device_info_view
            .software_version_id_mut()
            .write(self.software_version);
        device_info_view
            .dmx_footprint_mut()
            .write(self.dmx_footprint);
        device_info_view
            .current_personality_mut()
            .write(self.current_personality);
        device_info_view
            .personality_count_mut()
            .write(self.personality_count);
        device_info_view
            .dmx_start_address_mut()
            .write(self.dmx_start_address.as_u16());
        device_info_view
            .sub_device_count_mut()
            .write(self.sub_device_count);
        device_info_view.sensor_count_mut().write(self.sensor_count);

        DataPack::from_slice(&resp_buffer).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceInfo, DiscoveryMuteResponse, DmxStartAddress};

    #[test]
    fn test_start_address_bounds() {
        assert_eq!(
            DmxStartAddress::try_from(1u16).unwrap(),
            DmxStartAddress::Address(1)
        );
        assert_eq!(
            DmxStartAddress::try_from(512u16).unwrap(),
            DmxStartAddress::Address(512)
        );
        assert_eq!(
            DmxStartAddress::try_from(0xFFFFu16).unwrap(),
            DmxStartAddress::NoAddress
        );
        assert!(DmxStartAddress::try_from(0u16).is_err());
        assert!(DmxStartAddress::try_from(513u16).is_err());
    }

    #[test]
    fn test_mute_control_field_bits() {
        let response = DiscoveryMuteResponse {
            sub_device: true,
            managed_proxy: false,
            proxy_device: true,
            binding_uid: None,
        };

        assert_eq!(response.control_field(), 0b101);
        // Big-endian on the wire: flags live in the low byte.
        assert_eq!(&response.serialize()[..], &[0x00, 0b101]);
    }

    #[test]
    fn test_device_info_round_trip() {
        let serialized = DeviceInfo {
            device_model_id: 0x0102,
            product_category: 0x0304,
            software_version: 0x05060708,
            dmx_footprint: 4,
            current_personality: 2,
            personality_count: 3,
            dmx_start_address: DmxStartAddress::Address(1),
            sub_device_count: 0,
            sensor_count: 2,
        }
        .serialize();

        assert_eq!(serialized.len(), 19);
        assert_eq!(&serialized[..2], &[0x01, 0x00]);

        let parsed = DeviceInfo::deserialize(&serialized).unwrap();
        assert_eq!(parsed.device_model_id, 0x0102);
        assert_eq!(parsed.current_personality, 2);
        assert_eq!(parsed.personality_count, 3);
        assert_eq!(parsed.dmx_start_address, DmxStartAddress::Address(1));
        assert_eq!(parsed.sensor_count, 2);
    }
}
