//! Consumer view of the accumulation buffer
//!
//! The ready flag is set by the signal channel after the accumulation buffer holds a complete
//! snapshot. It is never cleared by the pipeline. A consumer that wants to detect the next
//! snapshot clears the flag itself and then polls it. The accumulation buffer is overwritten by
//! the next exposure, so a snapshot has to be consumed (or copied) within one exposure window.
use crate::hardware::{
    design_parameters::{NBIT, READY},
    Memory,
};
use crate::settings::Mode;

/// A sample as read from the parallel ADC bus.
///
/// Only the low [NBIT] bits of the port carry ADC data. The remaining port C inputs are
/// unconnected and masked off.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SampleCode(pub u16);

impl SampleCode {
    pub const MASK: u16 = (1 << NBIT) - 1;
}

impl From<u16> for SampleCode {
    fn from(raw: u16) -> Self {
        Self(raw & Self::MASK)
    }
}

impl From<SampleCode> for f32 {
    /// The sample as a fraction of ADC full scale.
    fn from(code: SampleCode) -> f32 {
        code.0 as f32 / (1u32 << NBIT) as f32
    }
}

/// Read access to a completed (or in-progress) snapshot.
pub struct Snapshot<'a, const N: usize> {
    memory: &'a Memory<N>,
    mode: Mode,
}

impl<'a, const N: usize> Snapshot<'a, N> {
    pub fn new(memory: &'a Memory<N>, mode: Mode) -> Self {
        Self { memory, mode }
    }

    /// Whether the ready flag has been written.
    pub fn is_ready(&self) -> bool {
        self.memory.ready() == READY
    }

    /// The raw samples of the most recent snapshot, or of the first one in averaging mode.
    pub fn samples(&self) -> &'a [u16; N] {
        &self.memory.accumulation()[0]
    }

    /// All snapshots collected per ready flag write.
    pub fn frames(&self) -> &'a [[u16; N]] {
        let frames = match self.mode {
            Mode::Single => 1,
            Mode::Averaging => 2,
        };
        &self.memory.accumulation()[..frames]
    }

    /// The masked ADC codes of [Snapshot::samples].
    pub fn codes(&self) -> impl Iterator<Item = SampleCode> + 'a {
        self.samples().iter().map(|&raw| SampleCode::from(raw))
    }

    /// The mean of both snapshots, sample by sample.
    ///
    /// # Returns
    /// `None` unless the pipeline collects pairs of snapshots.
    pub fn averaged(&self) -> Option<impl Iterator<Item = SampleCode> + 'a> {
        if self.mode != Mode::Averaging {
            return None;
        }

        let [first, second] = self.memory.accumulation();
        Some(first.iter().zip(second.iter()).map(|(&a, &b)| {
            let a = SampleCode::from(a).0 as u32;
            let b = SampleCode::from(b).0 as u32;
            SampleCode(((a + b) / 2) as u16)
        }))
    }
}
