//! DMA-chained readout of a line-scan sensor
//!
//! Samples flow from the sensor's parallel ADC bus into RAM without CPU involvement. Three eDMA
//! channels are chained:
//!
//! 1. The capture channel copies the port C input register into a circular capture buffer on
//!    every pixel clock edge.
//! 2. The accumulation channel copies the whole capture buffer into the accumulation buffer when
//!    the exposure window completes.
//! 3. The signal channel, linked to the accumulation channel, writes a constant into the ready
//!    flag.
//!
//! The [hardware] module describes the memory map and programs the descriptors. The [pipeline]
//! module steps the resulting hardware behavior event by event.
#![no_std]

pub mod hardware;
pub mod pipeline;
pub mod settings;
pub mod snapshot;

pub use edma;

/// Configuration errors reported while setting up the pipeline.
///
/// Once the pipeline is armed nothing in it reports errors: overruns, stale snapshots and missed
/// chain triggers are timing problems that have to be prevented at integration time.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid buffer capacity {0}")]
    Capacity(usize),
    #[error("Modulo addressing needs a power of two region, got {0} bytes")]
    NotPowerOfTwo(u32),
    #[error("Region base {base:#010x} not aligned to {modulus} bytes")]
    Misaligned { base: u32, modulus: u32 },
    #[error("DMA channel {0} assigned to more than one stage")]
    ChannelConflict(usize),
    #[error("DMA: {0}")]
    Dma(#[from] edma::Error),
    #[error("Settings: {0:?}")]
    Settings(serde_json_core::de::Error),
}
