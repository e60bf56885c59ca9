///! Capture stage
///!
///! # Design
///! A single eDMA channel is routed to the port B request line. The pixel clock pin raises a DMA
///! request on the configured edge and every request moves the low half-word of the port C data
///! input register into the next slot of the capture buffer. Only the low 12 bits carry ADC data.
///!
///! The destination address has to return to the start of the buffer after a full revolution.
///! Two encodings are supported:
///!
///! * Modulo addressing: `DMOD = log2(bytes)` freezes the upper destination address bits. This
///!   requires the buffer to span a power of two number of bytes and to be aligned to that size.
///! * Last-address adjustment: the major loop counts exactly one revolution and `DLAST` rewinds
///!   the destination by the buffer size. This works for any capacity.
///!
///! Either way the channel free-runs once enabled. If pixel clock edges arrive faster than the
///! engine services them, the request latch drops samples. This is not detected.
use arbitrary_int::u5;
use edma::{tcd::modulo_bits, ChannelConfiguration, Source, Tcd};
use log::{debug, info, trace};

use super::design_parameters::{PORTC_PINS, SAMPLE_BYTES};
use super::memory::{PeripheralState, CAPTURE_BASE, GPIOC_PDIR};
use super::port::{Edge, Pcr};
use super::{capture_bytes, halfwords};
use crate::settings::Addressing;
use crate::Error;

/// How the capture destination wraps around.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wraparound {
    /// Hardware modulo addressing with the given `DMOD` value.
    Modulo(u5),
    /// Destination last-address adjustment after one revolution.
    LastAdjust,
}

impl Wraparound {
    /// Select the wraparound encoding for a region of `bytes` bytes at `base`.
    pub fn select(
        addressing: Addressing,
        base: u32,
        bytes: u32,
    ) -> Result<Self, Error> {
        match addressing {
            Addressing::LastAdjust => Ok(Self::LastAdjust),
            Addressing::Modulo => Self::modulo(base, bytes),
            Addressing::Auto if bytes.is_power_of_two() => {
                Self::modulo(base, bytes)
            }
            Addressing::Auto => Ok(Self::LastAdjust),
        }
    }

    fn modulo(base: u32, bytes: u32) -> Result<Self, Error> {
        if !bytes.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(bytes));
        }

        let bits = modulo_bits(bytes).ok_or(Error::NotPowerOfTwo(bytes))?;
        if base & (bytes - 1) != 0 {
            return Err(Error::Misaligned {
                base,
                modulus: bytes,
            });
        }

        Ok(Self::Modulo(bits))
    }
}

/// The capture stage channel.
#[derive(Debug)]
pub struct Capture {
    channel: usize,
    wraparound: Wraparound,
}

impl Capture {
    /// Program the capture channel, the ADC data pins and the pixel clock pin.
    ///
    /// # Args
    /// * `peripherals` - The peripherals to configure.
    /// * `channel` - The eDMA channel to use.
    /// * `edge` - The pixel clock edge that samples the bus.
    /// * `addressing` - The requested wraparound encoding.
    ///
    /// The channel is left disabled.
    pub fn new<const N: usize>(
        peripherals: &mut PeripheralState<N>,
        channel: usize,
        edge: Edge,
        addressing: Addressing,
    ) -> Result<Self, Error> {
        let bytes = capture_bytes::<N>()?;
        let wraparound = Wraparound::select(addressing, CAPTURE_BASE, bytes)?;

        let (dmod, dlast) = match wraparound {
            Wraparound::Modulo(bits) => (bits, 0),
            Wraparound::LastAdjust => (u5::new(0), -(bytes as i32)),
        };

        let tcd = Tcd {
            saddr: GPIOC_PDIR,
            soff: 0,
            attr: halfwords().with_dmod(dmod),
            nbytes: SAMPLE_BYTES,
            slast: 0,
            daddr: CAPTURE_BASE,
            doff: SAMPLE_BYTES as i16,
            citer: N as u16,
            biter: N as u16,
            dlast_sga: dlast,
            ..Default::default()
        };

        peripherals.dma.set_tcd(channel, tcd)?;
        peripherals.dma.set_channel_configuration(
            channel,
            ChannelConfiguration::enable(Source::PortB),
        )?;

        for (bit, pin) in PORTC_PINS.iter().enumerate() {
            trace!("Capture: pin {pin} (PTC{bit}) as input");
            peripherals.memory.set_data_pin_pcr(bit, Pcr::gpio_input());
        }

        // The pin is already a GPIO input, only the request edge changes.
        let pcr = peripherals.memory.pixel_clock_pcr();
        peripherals
            .memory
            .set_pixel_clock_pcr(pcr.with_irqc(edge.into()));

        debug!(
            "Capture: DMA{channel}, {} samples, {wraparound:?}, {edge:?}",
            N
        );

        Ok(Self {
            channel,
            wraparound,
        })
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn wraparound(&self) -> Wraparound {
        self.wraparound
    }

    /// Start servicing pixel clock requests.
    pub fn start<const N: usize>(
        &self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        info!("Capture: started on DMA{}", self.channel);
        peripherals.dma.enable(self.channel)?;
        Ok(())
    }

    /// Stop capturing. Buffer contents are left as they are.
    pub fn stop<const N: usize>(
        &self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        peripherals.dma.disable(self.channel)?;
        Ok(())
    }

    /// The capture buffer index the next sample is written to.
    pub fn position<const N: usize>(
        &self,
        peripherals: &PeripheralState<N>,
    ) -> Result<usize, Error> {
        let daddr = peripherals.dma.tcd(self.channel)?.daddr;
        Ok((daddr.wrapping_sub(CAPTURE_BASE) / SAMPLE_BYTES) as usize % N)
    }
}
