//! Pipeline setup
//!
//! Programs the pixel clock pin and the three eDMA channels from the [Settings] and arms the
//! resulting pipeline. This corresponds to the one-time hardware configuration at boot, after
//! which the CPU is no longer involved in moving samples.
use log::{debug, info};

use super::{
    design_parameters::PIXEL_CLOCK_PIN,
    port::Pcr, Accumulation, Capture, PeripheralState, Signal,
};
use crate::pipeline::Pipeline;
use crate::settings::Settings;
use crate::Error;

/// Configure and arm the transfer pipeline.
///
/// # Args
/// * `peripherals` - The peripherals in their reset state.
/// * `settings` - The readout settings.
///
/// # Returns
/// The armed pipeline. On error the channels may be partially configured but none is enabled.
pub fn setup<const N: usize>(
    peripherals: &mut PeripheralState<N>,
    settings: &Settings,
) -> Result<Pipeline, Error> {
    let channels = settings.channels;
    channels.validate()?;

    settings.timing().check(N);

    // The pixel clock pin is a plain GPIO input until capture selects its request edge.
    debug!("Pixel clock input on pin {PIXEL_CLOCK_PIN} (PTB1)");
    peripherals.memory.set_pixel_clock_pcr(Pcr::gpio_input());

    let signal = Signal::new(peripherals, channels.signal as usize)?;
    let accumulation = Accumulation::new(
        peripherals,
        channels.accumulation as usize,
        signal.channel(),
        settings.mode,
    )?;
    let capture = Capture::new(
        peripherals,
        channels.capture as usize,
        settings.edge,
        settings.addressing,
    )?;

    let mut pipeline = Pipeline::new(capture, accumulation, signal);
    pipeline.arm(peripherals)?;

    info!("Pipeline armed: {settings:?}");
    Ok(pipeline)
}
