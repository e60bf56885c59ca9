//! Transfer control descriptors
use arbitrary_int::{u2, u4, u5};
use bitbybit::{bitenum, bitfield};

use crate::Error;

/// Source and destination transfer sizes (`ATTR[SSIZE]`, `ATTR[DSIZE]`).
#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Size {
    Bits8 = 0,
    Bits16 = 1,
    Bits32 = 2,
    _Reserved3 = 3,
    Bytes16 = 4,
    Bytes32 = 5,
    _Reserved6 = 6,
    _Reserved7 = 7,
}

impl Size {
    /// Number of bytes moved by a single read or write of this size.
    pub fn bytes(&self) -> Option<u32> {
        match self {
            Self::Bits8 => Some(1),
            Self::Bits16 => Some(2),
            Self::Bits32 => Some(4),
            Self::Bytes16 => Some(16),
            Self::Bytes32 => Some(32),
            _ => None,
        }
    }
}

/// Transfer attributes.
///
/// `SMOD`/`DMOD` select modulo addressing: a nonzero value `n` freezes the upper address bits so
/// that the address wraps within an aligned `2^n` byte region.
#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Attr {
    #[bits(0..=2, rw)]
    pub dsize: Size,
    #[bits(3..=7, rw)]
    pub dmod: u5,
    #[bits(8..=10, rw)]
    pub ssize: Size,
    #[bits(11..=15, rw)]
    pub smod: u5,
}

/// Control and status.
#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Csr {
    #[bit(0, rw)]
    pub start: bool,
    #[bit(1, rw)]
    pub intmajor: bool,
    #[bit(2, rw)]
    pub inthalf: bool,
    #[bit(3, rw)]
    pub dreq: bool,
    #[bit(4, rw)]
    pub esg: bool,
    #[bit(5, rw)]
    pub majorelink: bool,
    #[bit(6, rw)]
    pub active: bool,
    #[bit(7, rw)]
    pub done: bool,
    #[bits(8..=11, rw)]
    pub majorlinkch: u4,
    #[bits(14..=15, rw)]
    pub bwc: u2,
}

/// Signed offset added to the source and/or destination address after every minor loop
/// (`NBYTES_MLOFFYES`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MinorLoopOffset {
    pub source: bool,
    pub destination: bool,
    pub offset: i32,
}

impl MinorLoopOffset {
    // MLOFF is a 20 bit two's complement field.
    const RANGE: core::ops::Range<i32> = -(1 << 19)..(1 << 19);
}

/// A transfer control descriptor.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Tcd {
    pub saddr: u32,
    pub soff: i16,
    pub attr: Attr,
    /// Bytes per minor loop, i.e. per service request.
    pub nbytes: u32,
    pub mloff: Option<MinorLoopOffset>,
    /// Source adjustment applied after the major loop completes.
    pub slast: i32,
    pub daddr: u32,
    pub doff: i16,
    /// Current major iteration count.
    pub citer: u16,
    /// Destination adjustment applied after the major loop completes.
    pub dlast_sga: i32,
    pub csr: Csr,
    /// Major iteration count reloaded into `citer` on completion.
    pub biter: u16,
}

impl Tcd {
    /// Check a freshly written descriptor.
    pub fn validate(&self) -> Result<(), Error> {
        if self.citer == 0 || self.citer != self.biter {
            return Err(Error::LoopCount);
        }
        self.check_transfer()
    }

    /// Check the parts of the descriptor that the engine verifies on every service request.
    pub fn check_transfer(&self) -> Result<(), Error> {
        let ssize = self.attr.ssize().bytes().ok_or(Error::ReservedSize)?;
        let dsize = self.attr.dsize().bytes().ok_or(Error::ReservedSize)?;

        if self.csr.esg() {
            return Err(Error::ScatterGather);
        }

        if self.nbytes == 0
            || self.nbytes % ssize != 0
            || self.nbytes % dsize != 0
        {
            return Err(Error::MinorLoopSize(self.nbytes));
        }

        if self.soff as i32 % ssize as i32 != 0 {
            return Err(Error::SourceOffset);
        }

        if self.doff as i32 % dsize as i32 != 0 {
            return Err(Error::DestinationOffset);
        }

        if self.saddr % ssize != 0 {
            return Err(Error::SourceAddress(self.saddr));
        }

        if self.daddr % dsize != 0 {
            return Err(Error::DestinationAddress(self.daddr));
        }

        if let Some(mloff) = self.mloff {
            if !MinorLoopOffset::RANGE.contains(&mloff.offset) {
                return Err(Error::MinorLoopOffset(mloff.offset));
            }
        }

        Ok(())
    }
}

/// Advance an address by `offset` bytes under modulo addressing.
///
/// With `modulo == 0` the address simply increments. Otherwise only the low `modulo` bits change
/// and the address wraps within its aligned `2^modulo` region.
pub fn advance(address: u32, offset: i32, modulo: u5) -> u32 {
    let next = address.wrapping_add_signed(offset);
    match modulo.value() {
        0 => next,
        bits => {
            let mask = (1u32 << bits) - 1;
            (address & !mask) | (next & mask)
        }
    }
}

/// The modulo field value for a circular region of `bytes` bytes.
///
/// This is the position of the most significant set bit, so it only describes the region exactly
/// when `bytes` is a power of two.
pub fn modulo_bits(bytes: u32) -> Option<u5> {
    match bytes {
        0 | 1 => None,
        bytes => Some(u5::new((31 - bytes.leading_zeros()) as u8)),
    }
}
