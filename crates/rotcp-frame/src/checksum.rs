use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use crc::{Crc, CRC_16_MODBUS, CRC_16_XMODEM};
use rotcp_codec::ByteOrder;

use crate::element::ElementDescriptor;
use crate::error::{FrameError, Result};

/// Registry id of [`Crc16Modbus`] in [`ChecksumRegistry::with_defaults`].
pub const CRC16_MODBUS: u8 = 0;
/// Registry id of [`Crc16Xmodem`].
pub const CRC16_XMODEM: u8 = 1;
/// Registry id of [`Sum16`].
pub const SUM16: u8 = 2;

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);
const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// A checksum over the covered frame bytes.
pub trait ChecksumAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    /// Number of bytes [`compute`](Self::compute) returns.
    fn width(&self) -> usize;

    /// Checksum of `data`, most significant byte first.
    fn compute(&self, data: &[u8]) -> Vec<u8>;
}

/// CRC-16/MODBUS (poly 0x8005 reflected, init 0xFFFF).
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16Modbus;

impl ChecksumAlgorithm for Crc16Modbus {
    fn name(&self) -> &str {
        "crc16-modbus"
    }

    fn width(&self) -> usize {
        2
    }

    fn compute(&self, data: &[u8]) -> Vec<u8> {
        MODBUS.checksum(data).to_be_bytes().to_vec()
    }
}

/// CRC-16/XMODEM (poly 0x1021, init 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16Xmodem;

impl ChecksumAlgorithm for Crc16Xmodem {
    fn name(&self) -> &str {
        "crc16-xmodem"
    }

    fn width(&self) -> usize {
        2
    }

    fn compute(&self, data: &[u8]) -> Vec<u8> {
        XMODEM.checksum(data).to_be_bytes().to_vec()
    }
}

/// Wrapping 16-bit sum of all bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum16;

impl ChecksumAlgorithm for Sum16 {
    fn name(&self) -> &str {
        "sum16"
    }

    fn width(&self) -> usize {
        2
    }

    fn compute(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
            .to_be_bytes()
            .to_vec()
    }
}

/// Immutable map from algorithm id to checksum algorithm.
#[derive(Clone, Default)]
pub struct ChecksumRegistry {
    algorithms: BTreeMap<u8, Arc<dyn ChecksumAlgorithm>>,
}

impl ChecksumRegistry {
    pub fn builder() -> ChecksumRegistryBuilder {
        ChecksumRegistryBuilder::default()
    }

    /// Registry with the bundled algorithms under their standard ids.
    pub fn with_defaults() -> Self {
        Self::builder().with_defaults().build()
    }

    pub fn get(&self, id: u8) -> Option<&dyn ChecksumAlgorithm> {
        self.algorithms.get(&id).map(|a| a.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.algorithms.keys().copied()
    }

    /// Check that `element`'s algorithm is registered and matches its width.
    pub fn check_element(&self, element: &ElementDescriptor) -> Result<()> {
        let id = element.checksum_algorithm().unwrap_or(CRC16_MODBUS);
        let algorithm = self.get(id).ok_or(FrameError::UnknownChecksum(id))?;
        let width = element.fixed_len().unwrap_or(0);
        if algorithm.width() != width {
            return Err(FrameError::Malformed(format!(
                "checksum element is {width} bytes but {} produces {}",
                algorithm.name(),
                algorithm.width()
            )));
        }
        Ok(())
    }

    /// Checksum bytes for `data` laid out the way `element` puts them on
    /// the wire.
    pub fn wire_checksum(&self, element: &ElementDescriptor, data: &[u8]) -> Result<Bytes> {
        self.check_element(element)?;
        let id = element.checksum_algorithm().unwrap_or(CRC16_MODBUS);
        let algorithm = self.get(id).ok_or(FrameError::UnknownChecksum(id))?;
        let mut value = algorithm.compute(data);
        if element.byte_order() == ByteOrder::LittleEndian {
            value.reverse();
        }
        Ok(Bytes::from(value))
    }
}

impl fmt::Debug for ChecksumRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.algorithms.iter().map(|(id, a)| (id, a.name())))
            .finish()
    }
}

/// Collects checksum algorithms before freezing them into a registry.
#[derive(Default)]
pub struct ChecksumRegistryBuilder {
    algorithms: BTreeMap<u8, Arc<dyn ChecksumAlgorithm>>,
}

impl ChecksumRegistryBuilder {
    /// Register the bundled algorithms under their standard ids.
    pub fn with_defaults(self) -> Self {
        self.register(CRC16_MODBUS, Crc16Modbus)
            .register(CRC16_XMODEM, Crc16Xmodem)
            .register(SUM16, Sum16)
    }

    /// Register `algorithm` under `id`, replacing any previous entry.
    pub fn register(mut self, id: u8, algorithm: impl ChecksumAlgorithm + 'static) -> Self {
        self.algorithms.insert(id, Arc::new(algorithm));
        self
    }

    pub fn build(self) -> ChecksumRegistry {
        ChecksumRegistry {
            algorithms: self.algorithms,
        }
    }
}
