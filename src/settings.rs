//! Readout settings
//!
//! # Design
//! The settings are fixed at startup. They select the pipeline mode, the pixel clock edge, the
//! capture wraparound encoding and the eDMA channel of each stage, and they describe the clock
//! configuration so that the exposure window can be checked against the capture buffer.
//!
//! Settings are deserialized from JSON. Every field is optional and falls back to its default.
use fugit::{HertzU32, MicrosDurationU32};
use serde::{Deserialize, Serialize};

use crate::hardware::{design_parameters, timing::Timing, Edge};
use crate::Error;

/// What the accumulation stage collects before the consumer is signaled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// One snapshot per exposure.
    #[default]
    Single,
    /// Two consecutive snapshots, for averaging by the consumer.
    Averaging,
}

/// Capture buffer wraparound encoding.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addressing {
    /// Modulo addressing where the buffer geometry allows it, last-address adjustment otherwise.
    #[default]
    Auto,
    /// Always use modulo addressing. Fails for buffers that are not a power of two in size.
    Modulo,
    /// Always rewind the destination with the last-address adjustment.
    LastAdjust,
}

/// eDMA channel assignment.
///
/// Higher channel numbers have higher service priority. The default allocation (capture 0,
/// accumulation 1, signal 2) is the one of the acquisition firmware. It gives the whole-buffer
/// accumulation minor loop precedence over capture: pixel clock requests wait until the snapshot
/// copy is done, so a snapshot never contains samples from after the exposure completed. Giving
/// capture the highest channel trades that atomicity for lower capture latency.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channels {
    pub capture: u8,
    pub accumulation: u8,
    pub signal: u8,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            capture: 0,
            accumulation: 1,
            signal: 2,
        }
    }
}

impl Channels {
    /// Verify that no channel is assigned to more than one stage.
    pub fn validate(&self) -> Result<(), Error> {
        if self.capture == self.accumulation || self.capture == self.signal {
            return Err(Error::ChannelConflict(self.capture as usize));
        }
        if self.accumulation == self.signal {
            return Err(Error::ChannelConflict(self.accumulation as usize));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: Mode,

    /// The pixel clock edge that samples the ADC bus.
    pub edge: Edge,

    pub addressing: Addressing,

    pub channels: Channels,

    /// Pixel clock frequency in Hz.
    pub pixel_clock: u32,

    /// Exposure window in microseconds.
    pub exposure: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Single,
            edge: Edge::Rising,
            addressing: Addressing::Auto,
            channels: Channels::default(),
            pixel_clock: design_parameters::PIXEL_CLOCK.raw(),
            exposure: design_parameters::EXPOSURE.ticks(),
        }
    }
}

impl Settings {
    /// Deserialize settings from JSON.
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        serde_json_core::from_slice(json)
            .map(|(settings, _)| settings)
            .map_err(Error::Settings)
    }

    /// The clock configuration the settings describe.
    pub fn timing(&self) -> Timing {
        Timing {
            pixel_clock: HertzU32::from_raw(self.pixel_clock),
            exposure: MicrosDurationU32::from_ticks(self.exposure),
        }
    }
}
