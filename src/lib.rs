//! RDM (ANSI E1.20) responder protocol core for DMX512 (ANSI E1.11) devices
//! on an RS485 bus. This library features no-std as well as no-alloc support
//! (no heap allocation) to target embedded as well as os platforms.
//!
//! The crate covers everything between a framed request buffer and a framed
//! reply: request classification and addressing, the pid dispatch table and
//! its handlers, the mutable responder state with factory-default semantics,
//! and the preamble-encoded discovery response. The bit-level transceiver,
//! its interrupt timing and the gpio toggling behind [indicator::IndicatorPort]
//! stay outside; a host feeds [rdm_responder::RdmResponder::handle_frame] and
//! transmits whatever [rdm_responder::RdmAnswer] comes back.
//!
//! Please refer to the [official specifications](https://tsp.esta.org/)
//! published by the ESTA.
//!
//! # Usage
//!
//! ```rust
//! use dmx_rdm_responder::coarse_timer::CoarseTimer;
//! use dmx_rdm_responder::indicator::IndicatorPort;
//! use dmx_rdm_responder::rdm_responder::{RdmAnswer, RdmResponder, CORE_PID_DESCRIPTORS};
//! use dmx_rdm_responder::responder_definition::ResponderDefinition;
//! use dmx_rdm_responder::unique_identifier::UniqueIdentifier;
//!
//! struct Led(bool);
//!
//! impl IndicatorPort for Led {
//!     fn configure_output(&mut self) {}
//!
//!     fn set(&mut self, level: bool) {
//!         self.0 = level;
//!     }
//!
//!     fn toggle(&mut self) {
//!         self.0 = !self.0;
//!     }
//! }
//!
//! static DEFINITION: ResponderDefinition<'static> = ResponderDefinition {
//!     model_id: 1,
//!     product_category: 0x0101,
//!     software_version: 0x00010000,
//!     software_version_label: "1.0.0",
//!     manufacturer_label: "Open Lighting Project",
//!     model_description: "demo dimmer",
//!     default_device_label: "demo dimmer",
//!     boot_software_version: 1,
//!     boot_software_version_label: "0.0.1",
//!     product_detail_ids: &[],
//!     personalities: &[],
//!     sensors: &[],
//!     parameter_descriptions: &[],
//!     descriptors: CORE_PID_DESCRIPTORS,
//! };
//!
//! // Ticked from a periodic timer interrupt on real hardware.
//! static TIMER: CoarseTimer = CoarseTimer::new();
//!
//! let mut responder = RdmResponder::new(
//!     &DEFINITION,
//!     UniqueIdentifier::new(0x7FF0, 1).unwrap(),
//!     &TIMER,
//!     Led(false),
//!     Led(false),
//! );
//!
//! // The transceiver hands in framed requests and transmits the answers.
//! let frame: &[u8] = &[];
//! match responder.handle_frame(frame) {
//!     RdmAnswer::Response(_reply) => { /* transmit with break */ },
//!     RdmAnswer::DiscoveryResponse(_raw) => { /* transmit without break */ },
//!     RdmAnswer::NoResponse => {},
//! }
//!
//! // Call periodically to pace the identify and mute indicators.
//! responder.tasks();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// The wrap-safe tick counter that paces indicator blinking.
pub mod coarse_timer;
/// Big-endian value primitives and the discovery pair encoding.
pub mod codec;
pub mod consts;
/// Status indicator abstraction and the blinker state machine.
pub mod indicator;
mod layouts;
pub mod pids;
/// Frame level types: requests, responses, (de)serialization, the raw
/// discovery reply.
pub mod rdm_data;
/// The dispatcher, the pid handlers and the responder itself.
pub mod rdm_responder;
pub mod rdm_types;
/// COMMS_STATUS frame quality counters.
pub mod receiver_counters;
/// The immutable device model descriptor and the pid dispatch table types.
pub mod responder_definition;
/// The mutable responder state and its factory-default semantics.
pub mod responder_state;
pub mod types;
pub mod unique_identifier;
