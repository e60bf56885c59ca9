use fugit::{HertzU32, MicrosDurationU32};

/// The number of sensor pixels per line.
pub const NPIX: usize = 3000;

/// Extra samples clocked out by the sensor around the active pixels (dummy and reference
/// outputs).
pub const PADDING: usize = 100;

/// The capture buffer capacity in samples.
pub const BUF_SIZE: usize = NPIX + PADDING;

/// The number of significant ADC bits on the parallel bus.
pub const NBIT: u32 = 12;

/// Bytes per capture transfer. The port register is 32 bits wide but only the low half carries
/// ADC bits.
pub const SAMPLE_BYTES: u32 = 2;

/// The value written into the ready flag by the signal channel.
pub const READY: u8 = 0x01;

/// The number of eDMA channels on the MK20DX256.
pub const DMA_CHANNELS: usize = 16;

/// Teensy pins wired to the ADC outputs, LSB first. They map onto PTC0..PTC11.
pub const PORTC_PINS: [u8; NBIT as usize] =
    [15, 22, 23, 9, 10, 13, 11, 12, 28, 27, 29, 30];

/// Teensy pin carrying the ADC sample clock (PTB1).
pub const PIXEL_CLOCK_PIN: u8 = 17;

// The default pixel clock. At 1 MHz one revolution of the capture buffer takes 3.1 ms.
pub const PIXEL_CLOCK: HertzU32 = HertzU32::from_raw(1_000_000);

// The default exposure window, one full capture revolution at the default pixel clock.
pub const EXPOSURE: MicrosDurationU32 = MicrosDurationU32::from_ticks(3_100);

/// The depth of the pipeline event queue.
pub const EVENT_QUEUE_SIZE: usize = 32;
