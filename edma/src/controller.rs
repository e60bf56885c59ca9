//! The eDMA engine
//!
//! # Design
//! Each channel owns one [Tcd] and one DMAMUX slot. A channel becomes pending when
//!
//! * its DMAMUX source asserts a request ([Controller::request]), which latches one request per
//!   channel (`HRS`), or
//! * software or a linked channel sets its `START` bit ([Controller::start]).
//!
//! [Controller::service] picks the pending channel with the highest priority (the highest
//! channel number, as with the reset arbitration setting) and executes exactly one minor loop.
//! When the major iteration count reaches zero the last-address adjustments are applied, `CITER`
//! is reloaded from `BITER`, `DONE` is set and the major link target (if any) is started.
//!
//! In this model a channel only accepts requests of any kind while its request enable (`ERQ`) is
//! set. Requests arriving at a disabled channel are counted as missed. A request arriving at a
//! channel that still has one outstanding is counted as dropped. Neither condition is an error
//! as far as the engine is concerned.
use arbitrary_int::{u4, Number};
use log::{debug, trace};

use crate::tcd::{advance, Tcd};
use crate::{Bus, BusError, ChannelConfiguration, Error, Source};

/// The reason a channel was halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    Descriptor(Error),
    SourceBus(BusError),
    DestinationBus(BusError),
}

/// The most recent error recorded by the engine (`ES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStatus {
    pub channel: usize,
    pub cause: Cause,
}

/// What a single service cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// One minor loop executed, the major loop continues.
    Minor,
    /// The last minor loop of the major loop executed.
    Major,
    /// The channel was halted.
    Error(Cause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Serviced {
    pub channel: usize,
    pub outcome: Outcome,
}

/// An eDMA controller with `CHANNELS` channels and its DMAMUX.
pub struct Controller<const CHANNELS: usize> {
    tcds: [Tcd; CHANNELS],
    mux: [ChannelConfiguration; CHANNELS],
    erq: u32,
    hrs: u32,
    int: u32,
    err: u32,
    status: Option<ErrorStatus>,
    dropped: [u32; CHANNELS],
    missed: [u32; CHANNELS],
}

impl<const CHANNELS: usize> Default for Controller<CHANNELS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CHANNELS: usize> Controller<CHANNELS> {
    const CHANNEL_COUNT: () =
        assert!(CHANNELS > 0 && CHANNELS <= 32, "1 to 32 channels");

    /// Construct a controller in its reset state: all descriptors zeroed, all slots off, all
    /// requests disabled.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CHANNEL_COUNT;

        Self {
            tcds: [Tcd::default(); CHANNELS],
            mux: [ChannelConfiguration::Off; CHANNELS],
            erq: 0,
            hrs: 0,
            int: 0,
            err: 0,
            status: None,
            dropped: [0; CHANNELS],
            missed: [0; CHANNELS],
        }
    }

    fn mask(channel: usize) -> u32 {
        if channel < CHANNELS {
            1 << channel
        } else {
            0
        }
    }

    fn check(&self, channel: usize) -> Result<u32, Error> {
        match Self::mask(channel) {
            0 => Err(Error::Channel(channel)),
            bit => Ok(bit),
        }
    }

    fn check_link(&self, target: usize) -> Result<u4, Error> {
        if Self::mask(target) == 0 || target > u4::MAX.value() as usize {
            return Err(Error::LinkChannel(target));
        }
        Ok(u4::new(target as u8))
    }

    /// The descriptor of a channel.
    pub fn tcd(&self, channel: usize) -> Result<&Tcd, Error> {
        self.check(channel)?;
        Ok(&self.tcds[channel])
    }

    /// Write a complete descriptor.
    ///
    /// The descriptor is validated first. `DONE` and `ACTIVE` are cleared.
    pub fn set_tcd(&mut self, channel: usize, tcd: Tcd) -> Result<(), Error> {
        self.check(channel)?;
        tcd.validate()?;
        if tcd.csr.majorelink() {
            self.check_link(tcd.csr.majorlinkch().value() as usize)?;
        }

        debug!("DMA{channel}: {tcd:?}");
        self.tcds[channel] = Tcd {
            csr: tcd.csr.with_done(false).with_active(false),
            ..tcd
        };
        Ok(())
    }

    /// Start `target` whenever the major loop of `channel` completes.
    pub fn link(&mut self, channel: usize, target: usize) -> Result<(), Error> {
        self.check(channel)?;
        let target = self.check_link(target)?;
        let csr = &mut self.tcds[channel].csr;
        *csr = csr.with_majorelink(true).with_majorlinkch(target);
        Ok(())
    }

    /// Set the DMAMUX slot configuration of a channel.
    pub fn set_channel_configuration(
        &mut self,
        channel: usize,
        configuration: ChannelConfiguration,
    ) -> Result<(), Error> {
        self.check(channel)?;
        if let ChannelConfiguration::Enable { periodic: true, .. } =
            configuration
        {
            if channel >= 4 {
                return Err(Error::Periodic(channel));
            }
        }
        self.mux[channel] = configuration;
        Ok(())
    }

    pub fn channel_configuration(
        &self,
        channel: usize,
    ) -> Result<ChannelConfiguration, Error> {
        self.check(channel)?;
        Ok(self.mux[channel])
    }

    /// Enable requests to a channel (`SERQ`).
    pub fn enable(&mut self, channel: usize) -> Result<(), Error> {
        self.erq |= self.check(channel)?;
        Ok(())
    }

    /// Disable requests to a channel (`CERQ`). Outstanding requests are discarded.
    pub fn disable(&mut self, channel: usize) -> Result<(), Error> {
        let bit = self.check(channel)?;
        self.erq &= !bit;
        self.hrs &= !bit;
        let csr = &mut self.tcds[channel].csr;
        *csr = csr.with_start(false);
        Ok(())
    }

    pub fn is_enabled(&self, channel: usize) -> bool {
        self.erq & Self::mask(channel) != 0
    }

    /// Assert a peripheral request line.
    ///
    /// Every channel routed to `source` latches one request.
    pub fn request(&mut self, source: Source) {
        for channel in 0..CHANNELS {
            if self.mux[channel].source() != Some(source) {
                continue;
            }

            let bit = 1 << channel;
            if self.erq & bit == 0 {
                trace!("DMA{channel}: {source:?} request missed");
                self.missed[channel] = self.missed[channel].saturating_add(1);
            } else if self.hrs & bit != 0 {
                trace!("DMA{channel}: {source:?} request dropped");
                self.dropped[channel] = self.dropped[channel].saturating_add(1);
            } else {
                self.hrs |= bit;
            }
        }
    }

    /// Request service of a channel from software (`SSRT`).
    pub fn start(&mut self, channel: usize) -> Result<(), Error> {
        let bit = self.check(channel)?;
        self.trigger(channel, bit);
        Ok(())
    }

    fn trigger(&mut self, channel: usize, bit: u32) {
        let csr = self.tcds[channel].csr;
        if self.erq & bit == 0 {
            trace!("DMA{channel}: start missed");
            self.missed[channel] = self.missed[channel].saturating_add(1);
        } else if csr.start() {
            trace!("DMA{channel}: start dropped");
            self.dropped[channel] = self.dropped[channel].saturating_add(1);
        } else {
            self.tcds[channel].csr = csr.with_start(true);
        }
    }

    /// Whether a channel would be serviced by the next [Controller::service] call, priority
    /// permitting.
    pub fn is_pending(&self, channel: usize) -> bool {
        let bit = Self::mask(channel);
        bit != 0
            && self.erq & bit != 0
            && self.err & bit == 0
            && (self.hrs & bit != 0 || self.tcds[channel].csr.start())
    }

    /// Execute one minor loop of the highest priority pending channel.
    ///
    /// # Returns
    /// The serviced channel and the outcome, or `None` if no channel is pending.
    pub fn service<B: Bus>(&mut self, bus: &mut B) -> Option<Serviced> {
        let channel = (0..CHANNELS).rev().find(|&ch| self.is_pending(ch))?;
        let bit = 1 << channel;
        self.hrs &= !bit;

        let tcd = &mut self.tcds[channel];
        tcd.csr = tcd.csr.with_start(false).with_done(false).with_active(true);
        let result = tcd
            .check_transfer()
            .map_err(Cause::Descriptor)
            .and_then(|()| minor_loop(tcd, bus));
        tcd.csr = tcd.csr.with_active(false);

        if let Err(cause) = result {
            debug!("DMA{channel}: halted: {cause:?}");
            self.err |= bit;
            self.status = Some(ErrorStatus { channel, cause });
            return Some(Serviced {
                channel,
                outcome: Outcome::Error(cause),
            });
        }

        tcd.citer -= 1;
        if tcd.csr.inthalf() && tcd.citer == tcd.biter / 2 {
            self.int |= bit;
        }

        if tcd.citer > 0 {
            trace!("DMA{channel}: minor loop, {} left", tcd.citer);
            return Some(Serviced {
                channel,
                outcome: Outcome::Minor,
            });
        }

        tcd.saddr = tcd.saddr.wrapping_add_signed(tcd.slast);
        tcd.daddr = tcd.daddr.wrapping_add_signed(tcd.dlast_sga);
        tcd.citer = tcd.biter;
        tcd.csr = tcd.csr.with_done(true);
        let csr = tcd.csr;
        trace!("DMA{channel}: major loop complete");

        if csr.intmajor() {
            self.int |= bit;
        }

        if csr.dreq() {
            self.erq &= !bit;
        }

        if csr.majorelink() {
            let target = csr.majorlinkch().value() as usize;
            let target_bit = Self::mask(target);
            if target_bit != 0 {
                self.trigger(target, target_bit);
            }
        }

        Some(Serviced {
            channel,
            outcome: Outcome::Major,
        })
    }

    /// Whether the major loop of a channel has completed (`DONE`).
    pub fn is_complete(&self, channel: usize) -> bool {
        self.check(channel)
            .map(|_| self.tcds[channel].csr.done())
            .unwrap_or(false)
    }

    pub fn clear_complete(&mut self, channel: usize) -> Result<(), Error> {
        self.check(channel)?;
        let csr = &mut self.tcds[channel].csr;
        *csr = csr.with_done(false);
        Ok(())
    }

    pub fn is_interrupt(&self, channel: usize) -> bool {
        self.int & Self::mask(channel) != 0
    }

    pub fn clear_interrupt(&mut self, channel: usize) -> Result<(), Error> {
        self.int &= !self.check(channel)?;
        Ok(())
    }

    pub fn is_error(&self, channel: usize) -> bool {
        self.err & Self::mask(channel) != 0
    }

    pub fn clear_error(&mut self, channel: usize) -> Result<(), Error> {
        self.err &= !self.check(channel)?;
        Ok(())
    }

    /// The most recently recorded error. It is not necessarily related to any particular
    /// channel still in error.
    pub fn error_status(&self) -> Option<ErrorStatus> {
        self.status
    }

    /// Number of requests discarded because one was already outstanding.
    pub fn dropped(&self, channel: usize) -> u32 {
        self.dropped.get(channel).copied().unwrap_or(0)
    }

    /// Number of requests discarded because the channel was disabled.
    pub fn missed(&self, channel: usize) -> u32 {
        self.missed.get(channel).copied().unwrap_or(0)
    }
}

fn minor_loop<B: Bus>(tcd: &mut Tcd, bus: &mut B) -> Result<(), Cause> {
    let size = |s: crate::Size| {
        s.bytes()
            .map(|b| b as usize)
            .ok_or(Cause::Descriptor(Error::ReservedSize))
    };
    let ssize = size(tcd.attr.ssize())?;
    let dsize = size(tcd.attr.dsize())?;

    // Both sizes are powers of two, so the larger one is a multiple of the smaller one and
    // divides NBYTES.
    let beat = ssize.max(dsize);
    let mut scratch = [0u8; 32];

    for _ in 0..tcd.nbytes as usize / beat {
        for chunk in scratch[..beat].chunks_mut(ssize) {
            bus.read(tcd.saddr, chunk).map_err(Cause::SourceBus)?;
            tcd.saddr = advance(tcd.saddr, tcd.soff as i32, tcd.attr.smod());
        }
        for chunk in scratch[..beat].chunks(dsize) {
            bus.write(tcd.daddr, chunk)
                .map_err(Cause::DestinationBus)?;
            tcd.daddr = advance(tcd.daddr, tcd.doff as i32, tcd.attr.dmod());
        }
    }

    if let Some(mloff) = tcd.mloff {
        if mloff.source {
            tcd.saddr = tcd.saddr.wrapping_add_signed(mloff.offset);
        }
        if mloff.destination {
            tcd.daddr = tcd.daddr.wrapping_add_signed(mloff.offset);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attr, Csr, Size};
    use arbitrary_int::u5;

    const RAM: u32 = 0x2000_0000;

    struct Ram([u8; 256]);

    impl Ram {
        fn offset(address: u32, len: usize) -> Result<usize, BusError> {
            match address.checked_sub(RAM) {
                Some(o) if o as usize + len <= 256 => Ok(o as usize),
                _ => Err(BusError::Unmapped(address)),
            }
        }

        fn halfword(&self, address: u32) -> u16 {
            let o = (address - RAM) as usize;
            u16::from_le_bytes([self.0[o], self.0[o + 1]])
        }
    }

    impl Bus for Ram {
        fn read(
            &mut self,
            address: u32,
            data: &mut [u8],
        ) -> Result<(), BusError> {
            let o = Self::offset(address, data.len())?;
            data.copy_from_slice(&self.0[o..o + data.len()]);
            Ok(())
        }

        fn write(&mut self, address: u32, data: &[u8]) -> Result<(), BusError> {
            let o = Self::offset(address, data.len())?;
            self.0[o..o + data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    fn halfwords() -> Attr {
        Attr::default()
            .with_ssize(Size::Bits16)
            .with_dsize(Size::Bits16)
    }

    fn copy(src: u32, dst: u32, bytes: u32) -> Tcd {
        Tcd {
            saddr: src,
            soff: 2,
            attr: halfwords(),
            nbytes: bytes,
            slast: -(bytes as i32),
            daddr: dst,
            doff: 2,
            citer: 1,
            biter: 1,
            dlast_sga: -(bytes as i32),
            ..Default::default()
        }
    }

    #[test]
    fn software_copy() {
        let mut ram = Ram([0; 256]);
        for (i, b) in ram.0[..8].iter_mut().enumerate() {
            *b = i as u8 + 1;
        }

        let mut dma = Controller::<4>::new();
        dma.set_tcd(0, copy(RAM, RAM + 0x40, 8)).unwrap();
        dma.enable(0).unwrap();
        assert_eq!(dma.service(&mut ram), None);

        dma.start(0).unwrap();
        assert_eq!(
            dma.service(&mut ram),
            Some(Serviced {
                channel: 0,
                outcome: Outcome::Major
            })
        );
        assert_eq!(&ram.0[0x40..0x48], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(dma.is_complete(0));

        // Last-address adjustments restore both addresses.
        let tcd = dma.tcd(0).unwrap();
        assert_eq!((tcd.saddr, tcd.daddr, tcd.citer), (RAM, RAM + 0x40, 1));
    }

    #[test]
    fn modulo_ring() {
        let mut ram = Ram([0; 256]);
        let mut dma = Controller::<4>::new();
        let tcd = Tcd {
            saddr: RAM + 0x80,
            attr: halfwords().with_dmod(u5::new(3)),
            nbytes: 2,
            daddr: RAM,
            doff: 2,
            citer: 4,
            biter: 4,
            ..Default::default()
        };
        dma.set_tcd(1, tcd).unwrap();
        dma.set_channel_configuration(
            1,
            ChannelConfiguration::enable(Source::PortB),
        )
        .unwrap();
        dma.enable(1).unwrap();

        for value in 0..6u8 {
            ram.0[0x80] = value;
            dma.request(Source::PortB);
            // Other sources are not routed.
            dma.request(Source::PortC);
            let outcome = dma.service(&mut ram).unwrap().outcome;
            let expected = if value == 3 {
                Outcome::Major
            } else {
                Outcome::Minor
            };
            assert_eq!(outcome, expected);
        }

        assert_eq!(dma.tcd(1).unwrap().daddr, RAM + 2 * (6 % 4));
        assert_eq!(
            [0, 2, 4, 6].map(|o| ram.halfword(RAM + o)),
            [4, 5, 2, 3]
        );
        assert_eq!(dma.service(&mut ram), None);
    }

    #[test]
    fn major_link() {
        let mut ram = Ram([0; 256]);
        ram.0[0] = 0x55;
        let mut dma = Controller::<4>::new();
        dma.set_tcd(2, copy(RAM, RAM + 0x10, 2)).unwrap();
        dma.set_tcd(3, copy(RAM + 0x10, RAM + 0x20, 2)).unwrap();
        dma.link(2, 3).unwrap();
        dma.enable(2).unwrap();
        dma.enable(3).unwrap();

        dma.start(2).unwrap();
        assert_eq!(dma.service(&mut ram).unwrap().channel, 2);
        assert!(dma.is_pending(3));
        assert_eq!(
            dma.service(&mut ram),
            Some(Serviced {
                channel: 3,
                outcome: Outcome::Major
            })
        );
        assert_eq!(ram.0[0x20], 0x55);
    }

    #[test]
    fn link_target_range() {
        let mut dma = Controller::<4>::new();
        assert_eq!(dma.link(0, 4), Err(Error::LinkChannel(4)));
        let mut tcd = copy(RAM, RAM + 0x10, 2);
        tcd.csr = Csr::default()
            .with_majorelink(true)
            .with_majorlinkch(u4::new(9));
        assert_eq!(dma.set_tcd(0, tcd), Err(Error::LinkChannel(9)));
        assert_eq!(dma.enable(7), Err(Error::Channel(7)));
    }

    #[test]
    fn missed_and_dropped_requests() {
        let mut ram = Ram([0; 256]);
        let mut dma = Controller::<2>::new();
        dma.set_tcd(0, copy(RAM, RAM + 0x10, 2)).unwrap();
        dma.set_channel_configuration(
            0,
            ChannelConfiguration::enable(Source::PortB),
        )
        .unwrap();

        dma.request(Source::PortB);
        assert_eq!(dma.missed(0), 1);
        assert!(!dma.is_pending(0));

        dma.enable(0).unwrap();
        dma.request(Source::PortB);
        dma.request(Source::PortB);
        assert_eq!(dma.dropped(0), 1);
        assert!(dma.service(&mut ram).is_some());
        assert_eq!(dma.service(&mut ram), None);
    }

    #[test]
    fn priority() {
        let mut ram = Ram([0; 256]);
        let mut dma = Controller::<4>::new();
        for ch in [0, 3] {
            dma.set_tcd(ch, copy(RAM, RAM + 0x10, 2)).unwrap();
            dma.enable(ch).unwrap();
            dma.start(ch).unwrap();
        }
        assert_eq!(dma.service(&mut ram).unwrap().channel, 3);
        assert_eq!(dma.service(&mut ram).unwrap().channel, 0);
    }

    #[test]
    fn disable_on_completion() {
        let mut ram = Ram([0; 256]);
        let mut dma = Controller::<1>::new();
        let mut tcd = copy(RAM, RAM + 0x10, 2);
        tcd.csr = Csr::default().with_dreq(true).with_intmajor(true);
        dma.set_tcd(0, tcd).unwrap();
        dma.enable(0).unwrap();
        dma.start(0).unwrap();
        dma.service(&mut ram);
        assert!(!dma.is_enabled(0));
        assert!(dma.is_interrupt(0));
        dma.start(0).unwrap();
        assert_eq!(dma.missed(0), 1);
    }

    #[test]
    fn status_flags() {
        let mut ram = Ram([0; 256]);
        let mut dma = Controller::<8>::new();

        let periodic = ChannelConfiguration::Enable {
            source: Source::Pdb,
            periodic: true,
        };
        assert_eq!(dma.channel_configuration(5), Ok(ChannelConfiguration::Off));
        assert_eq!(
            dma.set_channel_configuration(5, periodic),
            Err(Error::Periodic(5))
        );
        dma.set_channel_configuration(3, periodic).unwrap();
        assert_eq!(dma.channel_configuration(3), Ok(periodic));
        assert_eq!(dma.channel_configuration(8), Err(Error::Channel(8)));

        let mut tcd = copy(RAM, RAM + 0x10, 2);
        tcd.csr = Csr::default().with_intmajor(true);
        dma.set_tcd(0, tcd).unwrap();
        dma.enable(0).unwrap();
        dma.start(0).unwrap();
        dma.service(&mut ram).unwrap();
        assert!(dma.is_complete(0));
        assert!(dma.is_interrupt(0));
        dma.clear_complete(0).unwrap();
        dma.clear_interrupt(0).unwrap();
        assert!(!dma.is_complete(0));
        assert!(!dma.is_interrupt(0));

        dma.set_tcd(1, copy(RAM, 0x4000_0000, 2)).unwrap();
        dma.enable(1).unwrap();
        dma.start(1).unwrap();
        assert!(matches!(
            dma.service(&mut ram).unwrap().outcome,
            Outcome::Error(_)
        ));
        assert!(dma.is_error(1));
        dma.clear_error(1).unwrap();
        assert!(!dma.is_error(1));

        // A cleared channel is serviced again.
        dma.set_tcd(1, copy(RAM, RAM + 0x20, 2)).unwrap();
        dma.start(1).unwrap();
        assert_eq!(dma.service(&mut ram).unwrap().outcome, Outcome::Major);
        assert_eq!(dma.clear_error(9), Err(Error::Channel(9)));
    }

    #[test]
    fn bus_error_halts() {
        let mut ram = Ram([0; 256]);
        let mut dma = Controller::<1>::new();
        dma.set_tcd(0, copy(RAM, 0x4000_0000, 2)).unwrap();
        dma.enable(0).unwrap();
        dma.start(0).unwrap();
        let cause = Cause::DestinationBus(BusError::Unmapped(0x4000_0000));
        assert_eq!(
            dma.service(&mut ram),
            Some(Serviced {
                channel: 0,
                outcome: Outcome::Error(cause)
            })
        );
        assert!(dma.is_error(0));
        assert_eq!(
            dma.error_status(),
            Some(ErrorStatus { channel: 0, cause })
        );
        dma.start(0).unwrap();
        assert_eq!(dma.service(&mut ram), None);
    }

    #[test]
    fn minor_loop_offset() {
        let mut ram = Ram([0; 256]);
        ram.0[..4].copy_from_slice(&[1, 2, 3, 4]);
        let mut dma = Controller::<1>::new();
        let tcd = Tcd {
            mloff: Some(crate::MinorLoopOffset {
                source: true,
                destination: false,
                offset: -4,
            }),
            slast: 0,
            citer: 2,
            biter: 2,
            dlast_sga: -8,
            ..copy(RAM, RAM + 0x10, 4)
        };
        dma.set_tcd(0, tcd).unwrap();
        dma.enable(0).unwrap();
        dma.start(0).unwrap();
        assert_eq!(dma.service(&mut ram).unwrap().outcome, Outcome::Minor);
        ram.0[..4].copy_from_slice(&[5, 6, 7, 8]);
        dma.start(0).unwrap();
        assert_eq!(dma.service(&mut ram).unwrap().outcome, Outcome::Major);
        assert_eq!(&ram.0[0x10..0x18], &[1, 2, 3, 4, 5, 6, 7, 8]);
        let tcd = dma.tcd(0).unwrap();
        assert_eq!((tcd.saddr, tcd.daddr), (RAM, RAM + 0x10));
    }
}
