use crate::rdm_data::RdmDeserializationError;

/// Frame quality counters reported through COMMS_STATUS. The transceiver
/// layer may bump these directly through the responder's counters accessor;
/// [crate::rdm_responder::RdmResponder::handle_frame] feeds them from
/// deserialization failures.
#[derive(Debug, Default)]
pub struct ReceiverCounters {
    rdm_short_frame: u16,
    rdm_length_mismatch: u16,
    rdm_checksum_invalid: u16,
}

impl ReceiverCounters {
    pub const fn new() -> Self {
        Self {
            rdm_short_frame: 0,
            rdm_length_mismatch: 0,
            rdm_checksum_invalid: 0,
        }
    }

    /// Frames that ended before a complete header arrived.
    pub fn rdm_short_frame(&self) -> u16 {
        self.rdm_short_frame
    }

    /// Frames whose message length field disagreed with the byte count.
    pub fn rdm_length_mismatch(&self) -> u16 {
        self.rdm_length_mismatch
    }

    /// Frames with an invalid additive checksum.
    pub fn rdm_checksum_invalid(&self) -> u16 {
        self.rdm_checksum_invalid
    }

    pub fn add_short_frame(&mut self) {
        self.rdm_short_frame = self.rdm_short_frame.wrapping_add(1);
    }

    pub fn add_length_mismatch(&mut self) {
        self.rdm_length_mismatch = self.rdm_length_mismatch.wrapping_add(1);
    }

    pub fn add_checksum_invalid(&mut self) {
        self.rdm_checksum_invalid = self.rdm_checksum_invalid.wrapping_add(1);
    }

    /// Zero the three COMMS_STATUS counters.
    pub fn reset_comms_status(&mut self) {
        self.rdm_short_frame = 0;
        self.rdm_length_mismatch = 0;
        self.rdm_checksum_invalid = 0;
    }

    pub(crate) fn record_deserialization_error(&mut self, error: &RdmDeserializationError) {
        match error {
            RdmDeserializationError::BufferTooSmall => self.add_short_frame(),
            RdmDeserializationError::BufferTooBig
            | RdmDeserializationError::WrongMessageLength(_) => self.add_length_mismatch(),
            RdmDeserializationError::WrongChecksum => self.add_checksum_invalid(),
            _ => {},
        }
    }
}
