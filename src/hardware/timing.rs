///! Exposure timing checks
///!
///! A snapshot is only meaningful if the capture channel writes exactly one revolution of the
///! capture buffer during each exposure window. The clocks are set up elsewhere, so this is only
///! checked and reported, never enforced.
use fugit::{HertzU32, MicrosDurationU32};
use log::{info, warn};

/// How an exposure window covers the capture buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Coverage {
    /// Fewer samples than the buffer holds. Part of each snapshot is left over from the previous
    /// exposure.
    Partial { samples: u64 },
    /// Exactly one revolution.
    Exact,
    /// More than one revolution. The snapshot mixes the end of one revolution with the start of
    /// the next unless the count is a multiple of the capacity.
    Excess { samples: u64 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Timing {
    pub pixel_clock: HertzU32,
    pub exposure: MicrosDurationU32,
}

impl Timing {
    /// Pixel clock periods per exposure window.
    pub fn samples(&self) -> u64 {
        self.pixel_clock.raw() as u64 * self.exposure.ticks() as u64 / 1_000_000
    }

    pub fn coverage(&self, capacity: usize) -> Coverage {
        let samples = self.samples();
        match samples.cmp(&(capacity as u64)) {
            core::cmp::Ordering::Less => Coverage::Partial { samples },
            core::cmp::Ordering::Equal => Coverage::Exact,
            core::cmp::Ordering::Greater => Coverage::Excess { samples },
        }
    }

    /// Report the coverage of a buffer of `capacity` samples.
    pub fn check(&self, capacity: usize) -> Coverage {
        let coverage = self.coverage(capacity);
        match coverage {
            Coverage::Exact => info!(
                "Exposure {} us at {} Hz covers the capture buffer",
                self.exposure.ticks(),
                self.pixel_clock.raw()
            ),
            _ => warn!(
                "Exposure {} us at {} Hz vs {capacity} samples: {coverage:?}",
                self.exposure.ticks(),
                self.pixel_clock.raw()
            ),
        }
        coverage
    }
}
