///! Pin control of the pixel clock input
///!
///! The ADC sample clock is routed to a port B pin. Its pin control register (PCR) selects which
///! clock edge raises a DMA request on the port B request line. The ADC data pins on port C are
///! plain GPIO inputs and are only ever read through the port data input register.
use arbitrary_int::u3;
use bitbybit::{bitenum, bitfield};
use serde::{Deserialize, Serialize};

/// Interrupt/DMA request configuration of a pin (`PCR[IRQC]`).
#[bitenum(u4, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Irqc {
    Disabled = 0,
    DmaRising = 1,
    DmaFalling = 2,
    DmaEither = 3,
    _Reserved4 = 4,
    _Reserved5 = 5,
    _Reserved6 = 6,
    _Reserved7 = 7,
    InterruptZero = 8,
    InterruptRising = 9,
    InterruptFalling = 10,
    InterruptEither = 11,
    InterruptOne = 12,
    _Reserved13 = 13,
    _Reserved14 = 14,
    _Reserved15 = 15,
}

impl Irqc {
    /// Whether a clock transition raises a DMA request.
    pub fn dma_request(&self, rising: bool) -> bool {
        match self {
            Self::DmaRising => rising,
            Self::DmaFalling => !rising,
            Self::DmaEither => true,
            _ => false,
        }
    }
}

/// Pin control register.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Pcr {
    #[bit(0, rw)]
    pub ps: bool,
    #[bit(1, rw)]
    pub pe: bool,
    #[bit(2, rw)]
    pub sre: bool,
    #[bit(4, rw)]
    pub pfe: bool,
    #[bit(5, rw)]
    pub ode: bool,
    #[bit(6, rw)]
    pub dse: bool,
    #[bits(8..=10, rw)]
    pub mux: u3,
    #[bit(15, rw)]
    pub lk: bool,
    #[bits(16..=19, rw)]
    pub irqc: Irqc,
    #[bit(24, rw)]
    pub isf: bool,
}

impl Pcr {
    /// A pin in GPIO mode (`MUX = 1`) as configured for a plain digital input.
    pub fn gpio_input() -> Self {
        Self::default().with_mux(u3::new(1))
    }
}

/// The pixel clock edge that samples the ADC bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    Rising,
    Falling,
    /// Both edges. This samples every pixel twice.
    Either,
}

impl From<Edge> for Irqc {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::Rising => Irqc::DmaRising,
            Edge::Falling => Irqc::DmaFalling,
            Edge::Either => Irqc::DmaEither,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irqc_field() {
        let pcr = Pcr::gpio_input().with_irqc(Edge::Rising.into());
        // PORT_PCR_MUX(1) | PORT_PCR_IRQC(1)
        assert_eq!(pcr.raw_value(), (1 << 8) | (1 << 16));
        assert_eq!(pcr.irqc(), Irqc::DmaRising);
    }

    #[test]
    fn request_edges() {
        assert!(Irqc::DmaRising.dma_request(true));
        assert!(!Irqc::DmaRising.dma_request(false));
        assert!(Irqc::DmaFalling.dma_request(false));
        assert!(Irqc::DmaEither.dma_request(false));
        assert!(!Irqc::InterruptRising.dma_request(true));
        assert!(!Irqc::Disabled.dma_request(true));
    }
}
