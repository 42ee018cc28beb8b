use {
    sha2::{Digest, Sha256},
    siphasher::sip::SipHasher13,
    std::hash::Hasher,
};

/// Maps an arbitrary byte sequence to a position on the 32-bit ring.
///
/// Any `Fn(&[u8]) -> u32` closure implements this trait, which makes it easy
/// to inject a deterministic hash in tests.
pub trait RingHasher: Send + Sync {
    fn hash(&self, bytes: &[u8]) -> u32;
}

impl<F> RingHasher for F
where
    F: Fn(&[u8]) -> u32 + Send + Sync,
{
    #[inline]
    fn hash(&self, bytes: &[u8]) -> u32 {
        self(bytes)
    }
}

/// Default hash builder. Takes the first 4 bytes of a SHA-256 digest,
/// big-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHashBuilder;

impl RingHasher for DefaultHashBuilder {
    fn hash(&self, bytes: &[u8]) -> u32 {
        let digest = Sha256::digest(bytes);
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

/// SipHash-1-3 folded down to 32 bits. Considerably cheaper than the default
/// builder when lookups dominate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SipRingHasher {
    k0: u64,
    k1: u64,
}

impl SipRingHasher {
    pub fn new_with_keys(k0: u64, k1: u64) -> Self {
        SipRingHasher { k0, k1 }
    }
}

impl RingHasher for SipRingHasher {
    fn hash(&self, bytes: &[u8]) -> u32 {
        let mut hasher = SipHasher13::new_with_keys(self.k0, self.k1);
        hasher.write(bytes);
        let h = hasher.finish();
        (h ^ (h >> 32)) as u32
    }
}
