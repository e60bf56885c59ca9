//! Transfer pipeline
//!
//! # Design
//! Once armed the three channels run without CPU involvement. The [Pipeline] drives the modeled
//! hardware: external [Event]s (pixel clock edges and exposure completions) are queued, dispatched
//! onto the port and the eDMA controller, and the controller is stepped one minor loop at a time.
//! Every step updates the pipeline [State] from the channel that was serviced.
//!
//! Nothing here blocks or reports timing errors. A pixel clock edge that arrives while the previous
//! capture request is still latched is dropped by the controller, and an exposure completion that
//! reaches a disarmed accumulation channel is ignored. Both are counted in the controller and can
//! be inspected there.
use edma::{Outcome, Source};
use heapless::Deque;
use log::{trace, warn};

use crate::hardware::{
    design_parameters::EVENT_QUEUE_SIZE, Accumulation, Capture, PeripheralState,
    Signal,
};
use crate::settings::Mode;
use crate::snapshot::Snapshot;
use crate::Error;

/// External stimuli of the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A pixel clock transition with the ADC outputs settled at `sample`.
    PixelClock { rising: bool, sample: u32 },
    /// The exposure channel completed its major loop.
    ExposureComplete,
}

impl Event {
    /// A rising pixel clock edge.
    pub fn rising(sample: u32) -> Self {
        Self::PixelClock {
            rising: true,
            sample,
        }
    }

    /// A falling pixel clock edge.
    pub fn falling(sample: u32) -> Self {
        Self::PixelClock {
            rising: false,
            sample,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Accumulation,
    Signal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Channels are configured but not enabled.
    Idle,
    /// Channels are enabled, no sample has been captured yet.
    Armed,
    /// Samples are streaming into the capture buffer.
    Capturing,
    /// The accumulation channel has a pending or active snapshot.
    Transferring,
    /// The snapshot is complete and the ready flag write is pending.
    Signaling,
}

/// One serviced minor loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub channel: usize,
    /// The stage owning the channel, if any.
    pub stage: Option<Stage>,
    pub outcome: Outcome,
}

pub struct Pipeline {
    capture: Capture,
    accumulation: Accumulation,
    signal: Signal,
    state: State,
    events: Deque<Event, EVENT_QUEUE_SIZE>,
    snapshots: u32,
}

impl Pipeline {
    /// Assemble a pipeline from configured stages. All stages are expected to be disabled.
    pub fn new(
        capture: Capture,
        accumulation: Accumulation,
        signal: Signal,
    ) -> Self {
        Self {
            capture,
            accumulation,
            signal,
            state: State::Idle,
            events: Deque::new(),
            snapshots: 0,
        }
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn accumulation(&self) -> &Accumulation {
        &self.accumulation
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The number of ready flag writes so far.
    pub fn snapshots(&self) -> u32 {
        self.snapshots
    }

    pub fn mode(&self) -> Mode {
        self.accumulation.mode()
    }

    /// The stage a channel belongs to.
    pub fn stage(&self, channel: usize) -> Option<Stage> {
        if channel == self.capture.channel() {
            Some(Stage::Capture)
        } else if channel == self.accumulation.channel() {
            Some(Stage::Accumulation)
        } else if channel == self.signal.channel() {
            Some(Stage::Signal)
        } else {
            None
        }
    }

    /// Enable a single stage.
    pub fn enable<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
        stage: Stage,
    ) -> Result<(), Error> {
        match stage {
            Stage::Capture => self.capture.start(peripherals),
            Stage::Accumulation => self.accumulation.arm(peripherals),
            Stage::Signal => self.signal.arm(peripherals),
        }
    }

    /// Disable a single stage. Buffer contents and the ready flag are left untouched.
    pub fn disable<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
        stage: Stage,
    ) -> Result<(), Error> {
        match stage {
            Stage::Capture => self.capture.stop(peripherals),
            Stage::Accumulation => self.accumulation.disarm(peripherals),
            Stage::Signal => self.signal.disarm(peripherals),
        }
    }

    /// Enable all stages.
    ///
    /// Downstream stages are enabled first so that no chain trigger can reach a disabled channel.
    pub fn arm<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        for stage in [Stage::Signal, Stage::Accumulation, Stage::Capture] {
            self.enable(peripherals, stage)?;
        }
        self.transition(State::Armed);
        Ok(())
    }

    /// Disable all stages, capture first.
    pub fn disarm<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        for stage in [Stage::Capture, Stage::Accumulation, Stage::Signal] {
            self.disable(peripherals, stage)?;
        }
        self.transition(State::Idle);
        Ok(())
    }

    /// Queue an event for [Pipeline::run].
    ///
    /// # Returns
    /// The event if the queue is full.
    pub fn post(&mut self, event: Event) -> Result<(), Event> {
        self.events.push_back(event)
    }

    /// Apply an event to the port and the controller without servicing any channel.
    pub fn dispatch<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
        event: Event,
    ) -> Result<(), Error> {
        match event {
            Event::PixelClock { rising, sample } => {
                peripherals.memory.set_port(sample);
                let irqc = peripherals.memory.pixel_clock_pcr().irqc();
                if irqc.dma_request(rising) {
                    peripherals.dma.request(Source::PortB);
                }
            }
            Event::ExposureComplete => {
                self.accumulation.trigger(peripherals)?;
                if peripherals.dma.is_pending(self.accumulation.channel()) {
                    self.transition(State::Transferring);
                }
            }
        }
        Ok(())
    }

    /// Service one minor loop of the highest priority pending channel.
    pub fn step<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
    ) -> Option<Step> {
        let serviced = peripherals.dma.service(&mut peripherals.memory)?;
        let stage = self.stage(serviced.channel);

        match (stage, serviced.outcome) {
            (_, Outcome::Error(cause)) => {
                warn!("DMA{} halted: {cause:?}", serviced.channel);
            }
            (Some(Stage::Capture), _) => {
                if self.state == State::Armed {
                    self.transition(State::Capturing);
                }
            }
            (Some(Stage::Accumulation), Outcome::Major) => {
                if peripherals.dma.is_pending(self.signal.channel()) {
                    self.transition(State::Signaling);
                } else {
                    self.transition(State::Capturing);
                }
            }
            (Some(Stage::Accumulation), Outcome::Minor) => {
                self.transition(State::Capturing);
            }
            (Some(Stage::Signal), Outcome::Major) => {
                self.snapshots = self.snapshots.wrapping_add(1);
                self.transition(State::Capturing);
            }
            _ => {}
        }

        Some(Step {
            channel: serviced.channel,
            stage,
            outcome: serviced.outcome,
        })
    }

    /// Service channels until none is pending.
    ///
    /// # Returns
    /// The number of serviced minor loops.
    pub fn settle<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
    ) -> usize {
        let mut steps = 0;
        while self.step(peripherals).is_some() {
            steps += 1;
        }
        steps
    }

    /// Drain the event queue, letting the controller settle after each event.
    pub fn run<const N: usize>(
        &mut self,
        peripherals: &mut PeripheralState<N>,
    ) -> Result<(), Error> {
        while let Some(event) = self.events.pop_front() {
            self.dispatch(peripherals, event)?;
            self.settle(peripherals);
        }
        Ok(())
    }

    /// The consumer view of the accumulation buffer and ready flag.
    pub fn snapshot<'a, const N: usize>(
        &self,
        peripherals: &'a PeripheralState<N>,
    ) -> Snapshot<'a, N> {
        Snapshot::new(&peripherals.memory, self.mode())
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            trace!("Pipeline: {:?} -> {state:?}", self.state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::setup;
    use crate::settings::Settings;

    #[test]
    fn states() {
        let mut p = PeripheralState::<4>::new();
        let mut pipeline = setup(&mut p, &Settings::default()).unwrap();
        assert_eq!(pipeline.state(), State::Armed);

        pipeline.dispatch(&mut p, Event::rising(1)).unwrap();
        let step = pipeline.step(&mut p).unwrap();
        assert_eq!(step.stage, Some(Stage::Capture));
        assert_eq!(pipeline.state(), State::Capturing);

        pipeline.dispatch(&mut p, Event::ExposureComplete).unwrap();
        assert_eq!(pipeline.state(), State::Transferring);
        let step = pipeline.step(&mut p).unwrap();
        assert_eq!(step.stage, Some(Stage::Accumulation));
        assert_eq!(step.outcome, Outcome::Major);
        assert_eq!(pipeline.state(), State::Signaling);
        let step = pipeline.step(&mut p).unwrap();
        assert_eq!(step.stage, Some(Stage::Signal));
        assert_eq!(pipeline.state(), State::Capturing);
        assert_eq!(pipeline.snapshots(), 1);
        assert!(pipeline.step(&mut p).is_none());

        pipeline.disarm(&mut p).unwrap();
        assert_eq!(pipeline.state(), State::Idle);
        pipeline.dispatch(&mut p, Event::rising(2)).unwrap();
        assert!(pipeline.step(&mut p).is_none());
    }

    #[test]
    fn edge_selection() {
        let mut p = PeripheralState::<4>::new();
        let settings = Settings {
            edge: crate::hardware::Edge::Falling,
            ..Default::default()
        };
        let mut pipeline = setup(&mut p, &settings).unwrap();
        pipeline.post(Event::rising(7)).unwrap();
        pipeline.post(Event::falling(8)).unwrap();
        pipeline.run(&mut p).unwrap();
        assert_eq!(p.memory.capture(), &[8, 0, 0, 0]);
    }

    #[test]
    fn queue_capacity() {
        let mut p = PeripheralState::<4>::new();
        let mut pipeline = setup(&mut p, &Settings::default()).unwrap();
        for _ in 0..EVENT_QUEUE_SIZE {
            pipeline.post(Event::ExposureComplete).unwrap();
        }
        assert_eq!(pipeline.post(Event::rising(0)), Err(Event::rising(0)));
        pipeline.run(&mut p).unwrap();
        assert_eq!(pipeline.snapshots(), EVENT_QUEUE_SIZE as u32);
    }
}
