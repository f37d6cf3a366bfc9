use crate::codec::{append_checksum, calculate_checksum, encode_disc_unique};
use crate::consts::{
    DUB_RESPONSE_LENGTH, PREAMBLE_BYTE, RDM_HEADER_SIZE, RDM_MAX_PACKAGE_SIZE,
    RDM_MAX_PARAMETER_DATA_LENGTH, RDM_MIN_PACKAGE_SIZE, SC_RDM, SC_SUB_MESSAGE, SEPARATOR_BYTE,
};
use crate::layouts::rdm_message_layout;
use crate::types::{DataPack, RequestCommandClass, ResponseCommandClass, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};

/// Binary representation of an RDM package.
pub type BinaryRdmPackage = heapless::Vec<u8, RDM_MAX_PACKAGE_SIZE>;

/// The raw preamble-encoded reply to a matching DISC_UNIQUE_BRANCH request.
/// Transmitted without a break so colliding responders overlap on the bus.
pub type DiscoveryResponseFrame = [u8; DUB_RESPONSE_LENGTH];

/// Error that gets raised when attempting to build a response for a request
/// that arrived on a broadcast destination address.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IsBroadcastError;

impl core::fmt::Display for IsBroadcastError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "tried to convert broadcast request to response")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IsBroadcastError {}

/// An RDM request package that does not have its parameter data deserialized.
#[derive(Debug)]
pub struct RdmRequestData {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub port_id: u8,
    pub message_count: u8,
    pub sub_device: u16,
    pub command_class: RequestCommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

impl RdmRequestData {
    /// Derive the response header from this request: destination and source
    /// swap, transaction number and sub device carry over, the response type
    /// reuses the port id field. Fails when the request was a broadcast,
    /// which must never be answered.
    pub fn build_response(
        &self,
        response_type: ResponseType,
        response: DataPack,
        message_count: u8,
    ) -> Result<RdmResponseData, IsBroadcastError> {
        Ok(RdmResponseData {
            destination_uid: PackageAddress::Device(self.source_uid),
            source_uid: match self.destination_uid {
                PackageAddress::Device(uid) => uid,
                _ => return Err(IsBroadcastError),
            },
            transaction_number: self.transaction_number,
            response_type,
            message_count,
            sub_device: self.sub_device,
            command_class: self.command_class.get_response_class(),
            parameter_id: self.parameter_id,
            parameter_data: response,
        })
    }
}

/// An RDM response package that does not have its parameter data deserialized.
#[derive(Debug, Clone)]
pub struct RdmResponseData {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub response_type: ResponseType,
    pub message_count: u8,
    pub sub_device: u16,
    pub command_class: ResponseCommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

impl RdmResponseData {
    /// Serialize to a checksummed wire frame.
    pub fn serialize(&self) -> BinaryRdmPackage {
        let mut dst = [0u8; RDM_MAX_PACKAGE_SIZE];

        let parameter_data_length = self.parameter_data.len();
        assert!(parameter_data_length <= RDM_MAX_PARAMETER_DATA_LENGTH);

        let total_package_length = parameter_data_length + RDM_MIN_PACKAGE_SIZE;
        let mut memory_view =
            rdm_message_layout::View::new(&mut dst[..total_package_length - 2]);

        memory_view.start_code_mut().write(SC_RDM);
        memory_view.sub_start_code_mut().write(SC_SUB_MESSAGE);
        memory_view
            .message_length_mut()
            .write((parameter_data_length + RDM_HEADER_SIZE) as u8);
        memory_view
            .destination_uid_mut()
            .copy_from_slice(&self.destination_uid.to_bytes());
        memory_view
            .source_uid_mut()
            .copy_from_slice(&self.source_uid.to_bytes());
        memory_view
            .transaction_number_mut()
            .write(self.transaction_number);
        memory_view
            .port_id_response_type_mut()
            .write(self.response_type as u8);
        memory_view.message_count_mut().write(self.message_count);
        memory_view.sub_device_mut().write(self.sub_device);
        memory_view
            .command_class_mut()
            .write(self.command_class as u8);
        memory_view.parameter_id_mut().write(self.parameter_id);
        memory_view
            .parameter_data_length_mut()
            .write(parameter_data_length as u8);
        memory_view
            .parameter_data_and_checksum_mut()
            .copy_from_slice(&self.parameter_data);

        let mut frame =
            BinaryRdmPackage::from_slice(&dst[..total_package_length - 2]).unwrap();
        append_checksum(&mut frame);

        frame
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmDeserializationError {
    /// Buffer must be at least 26 bytes
    BufferTooSmall,
    /// Buffer must be at most 257 bytes
    BufferTooBig,
    /// The command class was not found; contains contents of command class field
    CommandClassNotFound(u8),
    /// The response type was not found; contains contents of response type field
    ResponseTypeNotFound(u8),
    /// The message length field is incorrect; contains result of parsing
    WrongMessageLength(usize),
    /// Wrong checksum
    WrongChecksum,
    /// Received wrong start code (0xCC) or sub start code (0x01)
    WrongStartCode,
    /// The source uid is a broadcast address.
    SourceUidIsBroadcast,
}

impl core::fmt::Display for RdmDeserializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdmDeserializationError::BufferTooSmall => write!(f, "buffer too small"),
            RdmDeserializationError::BufferTooBig => write!(f, "buffer too big"),
            RdmDeserializationError::CommandClassNotFound(command_class) => {
                write!(f, "command class {} not found", command_class)
            },
            RdmDeserializationError::ResponseTypeNotFound(response_type) => {
                write!(f, "response type {} is unknown", response_type)
            },
            RdmDeserializationError::WrongMessageLength(message_length) => {
                write!(f, "message length {} is incorrect", message_length)
            },
            RdmDeserializationError::WrongChecksum => write!(f, "checksum is incorrect"),
            RdmDeserializationError::WrongStartCode => write!(f, "start code is incorrect"),
            RdmDeserializationError::SourceUidIsBroadcast => write!(f, "source uid is a broadcast"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RdmDeserializationError {}

/// A parsed frame: a request to dispatch, or another responder's reply
/// observed on the shared bus.
#[derive(Debug)]
pub enum RdmData {
    Request(RdmRequestData),
    Response(RdmResponseData),
}

impl RdmData {
    /// Deserialize an rdm frame. The buffer must hold the complete frame
    /// including the checksum, between 26 and 257 bytes.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, RdmDeserializationError> {
        let buffer_size = buffer.len();

        if buffer_size < RDM_MIN_PACKAGE_SIZE {
            return Err(RdmDeserializationError::BufferTooSmall);
        }

        if buffer_size > RDM_MAX_PACKAGE_SIZE {
            return Err(RdmDeserializationError::BufferTooBig);
        }

        let expected_checksum = calculate_checksum(&buffer[..buffer_size - 2]);
        let actual_checksum =
            u16::from_be_bytes(buffer[buffer_size - 2..buffer_size].try_into().unwrap());

        if expected_checksum != actual_checksum {
            return Err(RdmDeserializationError::WrongChecksum);
        }

        let message_view = rdm_message_layout::View::new(buffer);

        if message_view.start_code().read() != SC_RDM
            || message_view.sub_start_code().read() != SC_SUB_MESSAGE
        {
            return Err(RdmDeserializationError::WrongStartCode);
        }

        // The message length field excludes the checksum.
        let message_length = message_view.message_length().read() as usize;
        if message_length != buffer_size - 2 {
            return Err(RdmDeserializationError::WrongMessageLength(message_length));
        }

        let parameter_data_and_checksum = message_view.parameter_data_and_checksum();
        let parameter_data =
            DataPack::from_slice(&parameter_data_and_checksum[..parameter_data_and_checksum.len() - 2])
                .map_err(|_| RdmDeserializationError::BufferTooBig)?;

        let source_uid = match PackageAddress::from_bytes(message_view.source_uid()) {
            PackageAddress::Device(device_uid) => device_uid,
            _ => return Err(RdmDeserializationError::SourceUidIsBroadcast),
        };

        let command_class_field = message_view.command_class().read();
        let rdm_data = match RequestCommandClass::try_from(command_class_field) {
            Ok(command_class) => RdmData::Request(RdmRequestData {
                destination_uid: PackageAddress::from_bytes(message_view.destination_uid()),
                source_uid,
                transaction_number: message_view.transaction_number().read(),
                port_id: message_view.port_id_response_type().read(),
                message_count: message_view.message_count().read(),
                sub_device: message_view.sub_device().read(),
                command_class,
                parameter_id: message_view.parameter_id().read(),
                parameter_data,
            }),
            Err(_) => {
                let response_type_field = message_view.port_id_response_type().read();
                let response_type = response_type_field.try_into().map_err(|_| {
                    RdmDeserializationError::ResponseTypeNotFound(response_type_field)
                })?;

                RdmData::Response(RdmResponseData {
                    destination_uid: PackageAddress::from_bytes(message_view.destination_uid()),
                    source_uid,
                    transaction_number: message_view.transaction_number().read(),
                    response_type,
                    message_count: message_view.message_count().read(),
                    sub_device: message_view.sub_device().read(),
                    command_class: command_class_field.try_into().map_err(|_| {
                        RdmDeserializationError::CommandClassNotFound(command_class_field)
                    })?,
                    parameter_id: message_view.parameter_id().read(),
                    parameter_data,
                })
            },
        };

        Ok(rdm_data)
    }
}

/// Build the 24 byte discovery response for `uid`: seven preamble bytes, the
/// separator, the pair-encoded uid and the pair-encoded checksum over the
/// twelve encoded uid bytes.
pub fn build_discovery_response(uid: UniqueIdentifier) -> DiscoveryResponseFrame {
    let mut frame = [PREAMBLE_BYTE; DUB_RESPONSE_LENGTH];
    frame[7] = SEPARATOR_BYTE;

    let uid_buffer = uid.to_bytes();
    encode_disc_unique(&uid_buffer, &mut frame[8..20]);

    let checksum = calculate_checksum(&frame[8..20]);
    encode_disc_unique(&checksum.to_be_bytes(), &mut frame[20..24]);

    frame
}
