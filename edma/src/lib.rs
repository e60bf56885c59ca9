//! Behavioral model of the Kinetis eDMA controller and its request multiplexer
//!
//! The model covers the parts of the eDMA engine that matter for hardware-chained acquisition
//! pipelines:
//!
//! - transfer control descriptors ([Tcd]) with source/destination offsets, transfer sizes and
//!   modulo (circular) addressing,
//! - minor loops (bytes moved per service request), major loops (iteration counts), minor-loop
//!   offsets and last-address adjustments,
//! - channel linking on major loop completion,
//! - routing of peripheral request slots through the DMAMUX ([mux]),
//! - the controller's error and status flags.
//!
//! Memory is not owned by the model. Every access goes through a [Bus] implementation which
//! decodes addresses into whatever the caller maps there.
//!
//! Transfers advance one minor loop per call to [Controller::service], so the interleaving of
//! hardware requests and transfer completions can be stepped deterministically.
#![no_std]

mod bus;
mod controller;
pub mod mux;
pub mod tcd;

pub use bus::{Bus, BusError};
pub use controller::{Cause, Controller, ErrorStatus, Outcome, Serviced};
pub use mux::{ChannelConfiguration, Source};
pub use tcd::{Attr, Csr, MinorLoopOffset, Size, Tcd};

/// Descriptor and channel configuration errors.
///
/// These correspond to the configuration error bits of the eDMA error status register, plus the
/// constraints the model places on channel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Channel {0} does not exist")]
    Channel(usize),
    #[error("Channel {0} cannot be a link target")]
    LinkChannel(usize),
    #[error("Periodic triggering unsupported on channel {0}")]
    Periodic(usize),
    #[error("Reserved transfer size")]
    ReservedSize,
    #[error("Minor loop byte count {0} not a multiple of the transfer sizes")]
    MinorLoopSize(u32),
    #[error("Source offset not a multiple of the source size")]
    SourceOffset,
    #[error("Destination offset not a multiple of the destination size")]
    DestinationOffset,
    #[error("Source address {0:#010x} misaligned")]
    SourceAddress(u32),
    #[error("Destination address {0:#010x} misaligned")]
    DestinationAddress(u32),
    #[error("Minor loop offset {0} out of range")]
    MinorLoopOffset(i32),
    #[error("Invalid iteration count")]
    LoopCount,
    #[error("Scatter/gather is not supported")]
    ScatterGather,
}
