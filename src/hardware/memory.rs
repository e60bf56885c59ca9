///! Memory map and peripheral state
///!
///! All state touched by the transfer pipeline lives in [PeripheralState]: the eDMA controller,
///! the port registers and the three RAM regions the descriptors point into. It is created once
///! at startup and handed explicitly to every configuration routine.
///!
///! # Layout
///! The buffers are placed in 128 KiB aligned slots so that any power of two capture region up to
///! the largest supported capacity is a valid modulo region at its base address.
use edma::{Bus, BusError, Controller};

use super::design_parameters::{DMA_CHANNELS, NBIT, READY};
use super::port::Pcr;

/// Port C data input register.
pub const GPIOC_PDIR: u32 = 0x400F_F090;

/// Port B pin 1 control register (pixel clock input).
pub const PORTB_PCR1: u32 = 0x4004_A004;

/// Port C pin 0 control register. The ADC data pins PTC0..PTC11 follow at 4 byte strides.
pub const PORTC_PCR0: u32 = 0x4004_B000;

const DATA_PINS: usize = NBIT as usize;

const SLOT: u32 = 0x2_0000;

/// Base of the circular capture buffer.
pub const CAPTURE_BASE: u32 = 0x2000_0000;

/// Base of the accumulation buffer.
pub const ACCUMULATION_BASE: u32 = CAPTURE_BASE + SLOT;

/// The ready flag byte.
pub const READY_FLAG: u32 = ACCUMULATION_BASE + SLOT;

/// The constant copied into the ready flag.
pub const TRIGGER_VALUE: u32 = READY_FLAG + 1;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Location {
    Port(usize),
    PinControl(usize),
    DataPinControl(usize),
    Capture(usize),
    Accumulation(usize),
    Ready,
    Trigger,
}

/// The RAM and register contents addressed by the transfer descriptors.
///
/// `N` is the capture buffer capacity in samples. The accumulation buffer holds `2 * N` samples,
/// stored as two halves.
pub struct Memory<const N: usize> {
    gpioc_pdir: u32,
    pixel_clock_pcr: Pcr,
    data_pin_pcrs: [Pcr; DATA_PINS],
    capture: [u16; N],
    accumulation: [[u16; N]; 2],
    ready: u8,
    trigger: u8,
}

impl<const N: usize> Default for Memory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Memory<N> {
    const FITS: () = assert!(
        4 * N <= SLOT as usize,
        "Accumulation buffer exceeds its memory slot"
    );

    /// Zero-initialized memory.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS;

        Self {
            gpioc_pdir: 0,
            pixel_clock_pcr: Pcr::default(),
            data_pin_pcrs: [Pcr::default(); DATA_PINS],
            capture: [0; N],
            accumulation: [[0; N]; 2],
            ready: 0,
            trigger: READY,
        }
    }

    fn locate(address: u32) -> Option<Location> {
        let within = |base: u32, len: usize| {
            address
                .checked_sub(base)
                .map(|offset| offset as usize)
                .filter(|&offset| offset < len)
        };

        if let Some(offset) = within(GPIOC_PDIR, 4) {
            Some(Location::Port(offset))
        } else if let Some(offset) = within(PORTB_PCR1, 4) {
            Some(Location::PinControl(offset))
        } else if let Some(offset) = within(PORTC_PCR0, 4 * DATA_PINS) {
            Some(Location::DataPinControl(offset))
        } else if let Some(offset) = within(CAPTURE_BASE, 2 * N) {
            Some(Location::Capture(offset))
        } else if let Some(offset) = within(ACCUMULATION_BASE, 4 * N) {
            Some(Location::Accumulation(offset))
        } else if address == READY_FLAG {
            Some(Location::Ready)
        } else if address == TRIGGER_VALUE {
            Some(Location::Trigger)
        } else {
            None
        }
    }

    fn read_byte(&self, address: u32) -> Result<u8, BusError> {
        let lane =
            |word: u32, offset: usize| (word >> (8 * (offset % 4))) as u8;
        Ok(match Self::locate(address).ok_or(BusError::Unmapped(address))? {
            Location::Port(offset) => lane(self.gpioc_pdir, offset),
            Location::PinControl(offset) => {
                lane(self.pixel_clock_pcr.raw_value(), offset)
            }
            Location::DataPinControl(offset) => {
                lane(self.data_pin_pcrs[offset / 4].raw_value(), offset)
            }
            Location::Capture(offset) => {
                lane(self.capture[offset / 2] as u32, offset % 2)
            }
            Location::Accumulation(offset) => {
                let index = offset / 2;
                lane(self.accumulation[index / N][index % N] as u32, offset % 2)
            }
            Location::Ready => self.ready,
            Location::Trigger => self.trigger,
        })
    }

    fn write_byte(&mut self, address: u32, byte: u8) -> Result<(), BusError> {
        fn set(word: &mut u16, offset: usize, byte: u8) {
            let shift = 8 * (offset % 2);
            *word = (*word & !(0xff << shift)) | ((byte as u16) << shift);
        }

        fn set_lane(pcr: &mut Pcr, offset: usize, byte: u8) {
            let shift = 8 * (offset % 4);
            let raw = pcr.raw_value();
            *pcr = Pcr::new_with_raw_value(
                (raw & !(0xff << shift)) | ((byte as u32) << shift),
            );
        }

        match Self::locate(address).ok_or(BusError::Unmapped(address))? {
            Location::Port(_) | Location::Trigger => {
                return Err(BusError::ReadOnly(address))
            }
            Location::PinControl(offset) => {
                set_lane(&mut self.pixel_clock_pcr, offset, byte)
            }
            Location::DataPinControl(offset) => {
                set_lane(&mut self.data_pin_pcrs[offset / 4], offset, byte)
            }
            Location::Capture(offset) => {
                set(&mut self.capture[offset / 2], offset, byte)
            }
            Location::Accumulation(offset) => {
                let index = offset / 2;
                set(&mut self.accumulation[index / N][index % N], offset, byte)
            }
            Location::Ready => self.ready = byte,
        }
        Ok(())
    }

    /// The value currently driven onto the port C inputs.
    pub fn port(&self) -> u32 {
        self.gpioc_pdir
    }

    /// Drive the port C inputs.
    pub fn set_port(&mut self, value: u32) {
        self.gpioc_pdir = value;
    }

    pub fn pixel_clock_pcr(&self) -> Pcr {
        self.pixel_clock_pcr
    }

    pub fn set_pixel_clock_pcr(&mut self, pcr: Pcr) {
        self.pixel_clock_pcr = pcr;
    }

    /// Control registers of the ADC data pins, indexed by ADC bit (PTC0 first).
    pub fn data_pin_pcrs(&self) -> &[Pcr; DATA_PINS] {
        &self.data_pin_pcrs
    }

    pub fn set_data_pin_pcr(&mut self, bit: usize, pcr: Pcr) {
        if let Some(slot) = self.data_pin_pcrs.get_mut(bit) {
            *slot = pcr;
        }
    }

    /// The circular capture buffer.
    pub fn capture(&self) -> &[u16; N] {
        &self.capture
    }

    /// Both halves of the accumulation buffer.
    pub fn accumulation(&self) -> &[[u16; N]; 2] {
        &self.accumulation
    }

    /// The ready flag.
    pub fn ready(&self) -> u8 {
        self.ready
    }

    /// Clear the ready flag. The pipeline never does this, it is left to the consumer.
    pub fn clear_ready(&mut self) {
        self.ready = 0;
    }
}

impl<const N: usize> Bus for Memory<N> {
    fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), BusError> {
        for (address, byte) in (address..).zip(data.iter_mut()) {
            *byte = self.read_byte(address)?;
        }
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), BusError> {
        for (address, byte) in (address..).zip(data.iter()) {
            self.write_byte(address, *byte)?;
        }
        Ok(())
    }
}

/// Everything the pipeline is configured against.
pub struct PeripheralState<const N: usize> {
    pub dma: Controller<DMA_CHANNELS>,
    pub memory: Memory<N>,
}

impl<const N: usize> Default for PeripheralState<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PeripheralState<N> {
    /// Peripherals in their reset state with zeroed buffers.
    pub fn new() -> Self {
        Self {
            dma: Controller::new(),
            memory: Memory::new(),
        }
    }
}
