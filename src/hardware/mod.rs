///! Module for all hardware-specific setup of the readout core
mod accumulation;
mod capture;
pub mod design_parameters;
pub mod memory;
pub mod port;
pub mod setup;
mod signal;
pub mod timing;

pub use accumulation::Accumulation;
pub use capture::{Capture, Wraparound};
pub use memory::{Memory, PeripheralState};
pub use port::{Edge, Irqc, Pcr};
pub use setup::setup;
pub use signal::Signal;

/// The peripherals with the default capture buffer geometry.
pub type Peripherals = PeripheralState<{ design_parameters::BUF_SIZE }>;

/// Bytes spanned by a capture buffer of `N` samples.
pub(crate) fn capture_bytes<const N: usize>() -> Result<u32, crate::Error> {
    // CITER/BITER are 15 bit wide without minor loop linking.
    if N == 0 || N > 0x7fff {
        return Err(crate::Error::Capacity(N));
    }
    Ok(N as u32 * design_parameters::SAMPLE_BYTES)
}

/// 16-bit transfer sizes on both sides.
pub(crate) fn halfwords() -> edma::Attr {
    edma::Attr::default()
        .with_ssize(edma::Size::Bits16)
        .with_dsize(edma::Size::Bits16)
}
