///! Accumulation stage
///!
///! # Design
///! The accumulation channel has no request source of its own. It is started through channel
///! linking when the exposure channel (owned by the clock setup) completes its major loop, and a
///! single minor loop then moves the whole capture buffer into the accumulation buffer. On major
///! loop completion the channel links to the signal stage.
///!
///! Both addresses are rewound by the last-address adjustments so that every exposure reuses the
///! same buffers.
///!
///! # Averaging
///! For very short exposures two captures can be collected before the consumer is notified. The
///! major loop then counts two snapshots. A source minor loop offset rewinds the source after each
///! snapshot while the destination keeps advancing into the second half of the accumulation
///! buffer. The signal stage fires once, after the second snapshot, and the consumer averages the
///! two halves. This mode is experimental.
use edma::{ChannelConfiguration, MinorLoopOffset, Tcd};
use log::{debug, info};

use super::memory::{PeripheralState, ACCUMULATION_BASE, CAPTURE_BASE};
use super::{capture_bytes, halfwords};
use crate::settings::Mode;
use crate::Error;

/// The accumulation stage channel.
#[derive(Debug)]
pub struct Accumulation {
    channel: usize,
    mode: Mode,
}

impl Accumulation {
    /// Program the accumulation channel.
    ///
    /// # Args
    /// * `peripherals` - The peripherals to configure.
    /// * `channel` - The eDMA channel to use.
    /// * `signal` - The channel started when the accumulation completes.
    /// * `mode` - Single snapshots or pairs of snapshots for averaging.
    ///
    /// The channel is left disabled.
    pub fn new<const N: usize>(
        peripherals: &mut PeripheralState<N>,
        channel: usize,
        signal: usize,
        mode: Mode,
    ) -> Result<Self, Error> {
        // A self link restarts the channel on every completion.
        if signal == channel {
            return Err(Error::ChannelConflict(channel));
        }

        let bytes = capture_bytes::<N>()?;
        let span = bytes as i32;

        let (snapshots, mloff, slast, dlast) = match mode {
            Mode::Single => (1, None, -span, -span),
            Mode::Averaging => (
                2,
                Some(MinorLoopOffset {
                    source: true,
                    destination: false,
                    offset: -span,
                }),
                0,
                -2 * span,
            ),
        };

        let tcd = Tcd {
            saddr: CAPTURE_BASE,
            soff: 2,
            attr: halfwords(),
            nbytes: bytes,
            mloff,
            slast,
            daddr: ACCUMULATION_BASE,
            doff: 2,
            citer: snapshots,
            biter: snapshots,
            dlast_sga: dlast,
            ..Default::default()
        };

        peripherals.dma.set_tcd(channel, tcd)?;
        peripherals
            .dma
            .set_channel_configuration(channel, ChannelConfiguration::Off)?;
        peripherals.dma.link(channel, signal)?;

        debug!(
            "Accumulation: DMA{channel} -> DMA{signal}, {bytes} bytes, {mode:?}"
        );

        Ok(Self { channel, mode })
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Arm the channel for exposure completion links.
    pub fn arm<const N: usize>(
        &self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        info!("Accumulation: armed on DMA{}", self.channel);
        peripherals.dma.enable(self.channel)?;
        Ok(())
    }

    pub fn disarm<const N: usize>(
        &self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        peripherals.dma.disable(self.channel)?;
        Ok(())
    }

    /// The exposure channel completed its major loop.
    ///
    /// This stands in for the hardware link from the exposure channel. Whether the snapshot is
    /// taken depends on the channel being armed.
    pub fn trigger<const N: usize>(
        &self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        peripherals.dma.start(self.channel)?;
        Ok(())
    }
}
