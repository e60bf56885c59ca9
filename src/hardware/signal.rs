///! Signal stage
///!
///! A one byte transfer of a constant into the ready flag, started only by the completion link of
///! the accumulation channel. Consumers either poll the flag or attach to the channel's
///! completion interrupt.
use edma::{ChannelConfiguration, Size, Tcd};
use log::{debug, info};

use super::memory::{PeripheralState, READY_FLAG, TRIGGER_VALUE};
use crate::Error;

/// The signal stage channel.
#[derive(Debug)]
pub struct Signal {
    channel: usize,
}

impl Signal {
    /// Program the signal channel. The channel is left disabled.
    pub fn new<const N: usize>(
        peripherals: &mut PeripheralState<N>,
        channel: usize,
    ) -> Result<Self, Error> {
        let tcd = Tcd {
            saddr: TRIGGER_VALUE,
            attr: edma::Attr::default()
                .with_ssize(Size::Bits8)
                .with_dsize(Size::Bits8),
            nbytes: 1,
            daddr: READY_FLAG,
            citer: 1,
            biter: 1,
            ..Default::default()
        };

        peripherals.dma.set_tcd(channel, tcd)?;
        peripherals
            .dma
            .set_channel_configuration(channel, ChannelConfiguration::Off)?;

        debug!("Signal: DMA{channel}");
        Ok(Self { channel })
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn arm<const N: usize>(
        &self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        info!("Signal: armed on DMA{}", self.channel);
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
}
