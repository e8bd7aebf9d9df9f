//! Little-endian block key for random-access block lookups.

/// An 8-byte little-endian block height, the node's random-access key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey([u8; 8]);

impl BlockKey {
    /// Encode a height as a block key.
    pub const fn from_height(height: u64) -> Self {
        Self(height.to_le_bytes())
    }

    /// Decode the height from this key.
    pub const fn height(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Raw key bytes, as sent to the node.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl From<u64> for BlockKey {
    fn from(height: u64) -> Self {
        Self::from_height(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for height in [0u64, 1, 255, 256, u32::MAX as u64 + 1, u64::MAX] {
            assert_eq!(BlockKey::from_height(height).height(), height);
        }
    }

    #[test]
    fn little_endian_layout() {
        let key = BlockKey::from_height(0x0102_0304);
        assert_eq!(key.as_bytes(), &[0x04, 0x03, 0x02, 0x01, 0, 0, 0, 0]);
    }
}
