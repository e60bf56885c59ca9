/// Errors raised by the memory system while servicing a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("No device at {0:#010x}")]
    Unmapped(u32),
    #[error("Write to read-only location {0:#010x}")]
    ReadOnly(u32),
}

/// The memory system seen by the DMA engine.
///
/// Accesses are byte-addressed and little-endian. A single call never spans more than one
/// transfer beat, i.e. at most 32 bytes.
pub trait Bus {
    fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), BusError>;
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), BusError>;
}
