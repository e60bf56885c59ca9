//! DMA request multiplexer (DMAMUX)
//!
//! Every DMA channel has a DMAMUX slot configuration that selects which peripheral request line
//! drives it. Request numbers follow the MK20DX256 (Teensy 3.1/3.2) reference manual.
use num_enum::TryFromPrimitive;

/// Peripheral request sources.
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Source {
    Disabled = 0,
    Uart0Rx = 2,
    Uart0Tx = 3,
    Spi0Rx = 14,
    Spi0Tx = 15,
    Ftm0Ch0 = 20,
    Ftm0Ch1 = 21,
    Ftm1Ch0 = 28,
    Ftm1Ch1 = 29,
    Ftm2Ch0 = 30,
    Ftm2Ch1 = 31,
    Adc0 = 40,
    Adc1 = 41,
    Cmp0 = 42,
    Dac0 = 45,
    Pdb = 48,
    PortA = 49,
    PortB = 50,
    PortC = 51,
    PortD = 52,
    PortE = 53,
}

/// DMAMUX channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelConfiguration {
    /// The slot is disabled. The channel can still be started by software or by a link.
    #[default]
    Off,
    /// Route `source` to the channel.
    Enable {
        source: Source,
        /// Gate requests with the periodic interrupt timer. Only the first four channels support
        /// this.
        periodic: bool,
    },
}

impl ChannelConfiguration {
    /// Enable the channel without periodic triggering.
    pub const fn enable(source: Source) -> Self {
        Self::Enable {
            source,
            periodic: false,
        }
    }

    /// The request source routed to the channel, if any.
    pub fn source(&self) -> Option<Source> {
        match self {
            Self::Enable { source, .. } if *source != Source::Disabled => {
                Some(*source)
            }
            _ => None,
        }
    }
}
