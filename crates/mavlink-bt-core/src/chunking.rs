//! Splitting outbound buffers into MTU-sized fragments
//!
//! MAVLink frames are forwarded as opaque bytes. A BLE write carries at most
//! one MTU of payload, so each buffer handed to the forwarder is cut into
//! consecutive fragments in address order. Fragments carry no header: the
//! peripheral sees the original byte stream once the writes are concatenated.

use crate::protocol::Mtu;

// ----------------------------------------------------------------------------
// Fragment
// ----------------------------------------------------------------------------

/// One immutable slice of an outbound buffer, no larger than the link MTU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(Vec<u8>);

impl Fragment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for Fragment {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Fragment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Chunking
// ----------------------------------------------------------------------------

/// Split `payload` into fragments of at most `mtu` bytes; the last may be shorter
pub fn chunk(payload: &[u8], mtu: Mtu) -> impl Iterator<Item = Fragment> + '_ {
    payload.chunks(mtu.get()).map(Fragment::from)
}

/// Number of fragments `chunk` yields for a buffer of `len` bytes
pub fn fragment_count(len: usize, mtu: Mtu) -> usize {
    len.div_ceil(mtu.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_exact_multiple() {
        let data = vec![7u8; 40];
        let fragments: Vec<_> = chunk(&data, Mtu::new(20)).collect();
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.len() == 20));
    }

    #[test]
    fn test_chunk_short_tail() {
        let data: Vec<u8> = (0..=255u8).chain(0..1).collect();
        assert_eq!(data.len(), 257);

        let fragments: Vec<_> = chunk(&data, Mtu::DEFAULT).collect();
        assert_eq!(fragments.len(), 13);
        assert_eq!(fragment_count(data.len(), Mtu::DEFAULT), 13);
        assert!(fragments[..12].iter().all(|f| f.len() == 20));
        assert_eq!(fragments[12].len(), 17);
        assert_eq!(fragments[1].as_bytes()[0], 20);
    }

    #[test]
    fn test_chunk_smaller_than_mtu() {
        let fragments: Vec<_> = chunk(&[1, 2, 3], Mtu::from_granted(100)).collect();
        assert_eq!(fragments, vec![Fragment::from(&[1u8, 2, 3][..])]);
    }

    #[test]
    fn test_chunk_empty_yields_nothing() {
        assert_eq!(chunk(&[], Mtu::DEFAULT).count(), 0);
        assert_eq!(fragment_count(0, Mtu::DEFAULT), 0);
    }
}
