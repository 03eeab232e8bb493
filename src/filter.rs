use crate::error::{BlacklistError, Result};
use crate::storage::{BitArray, BitStorage, bits_to_line};
use bitvec::{bitvec, order::Lsb0};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Bloom filter bit array with write-through persistence.
///
/// Bits only ever go from 0 to 1. `contains` is one-sided: `false` means the
/// positions were never all set, `true` may be a collision.
pub struct MembershipFilter<S: BitStorage> {
    storage: S,
    bits: BitArray,
}

impl<S: BitStorage> MembershipFilter<S> {
    /// Starts from zeros and recreates durable storage when `fresh`,
    /// otherwise loads the persisted bits.
    ///
    /// A persisted array shorter than `array_size` is padded with zeros and
    /// a longer one is truncated.
    pub fn initialize(
        mut storage: S,
        array_size: usize,
        fresh: bool,
    ) -> Result<Self> {
        if array_size == 0 {
            return Err(BlacklistError::InvalidConfig(
                "Array size must be > 0".into(),
            ));
        }

        let bits = if fresh {
            storage.reset_bits(array_size)?;
            bitvec![usize, Lsb0; 0; array_size]
        } else {
            match storage.load_bits()? {
                Some(mut bits) => {
                    if bits.len() != array_size {
                        warn!(
                            stored = bits.len(),
                            expected = array_size,
                            "Persisted bit array has unexpected length"
                        );
                        bits.resize(array_size, false);
                    }
                    bits
                }
                None => bitvec![usize, Lsb0; 0; array_size],
            }
        };

        debug!(array_size, ones = bits.count_ones(), fresh, "Membership filter ready");
        Ok(Self { storage, bits })
    }

    /// Sets every in-range position and persists the whole array.
    ///
    /// Positions outside the array are ignored. Memory is updated before
    /// the write, so on a storage error memory stays ahead of the durable
    /// copy.
    pub fn add(&mut self, positions: &BTreeSet<usize>) -> Result<()> {
        for &index in positions {
            if index < self.bits.len() {
                self.bits.set(index, true);
            }
        }
        self.storage.store_bits(&self.bits)
    }

    /// True iff every position is set. An empty set is trivially contained;
    /// an out-of-range position never is.
    pub fn contains(&self, positions: &BTreeSet<usize>) -> bool {
        positions
            .iter()
            .all(|&index| self.bits.get(index).is_some_and(|bit| *bit))
    }

    pub fn array_size(&self) -> usize {
        self.bits.len()
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    /// The array in its durable `'0'`/`'1'` text form.
    pub fn bits_as_string(&self) -> String {
        bits_to_line(&self.bits)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: BitStorage> std::fmt::Debug for MembershipFilter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MembershipFilter {{ array_size: {}, ones: {} }}",
            self.bits.len(),
            self.bits.count_ones()
        )
    }
}
