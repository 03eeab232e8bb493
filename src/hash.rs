use crate::error::{BlacklistError, Result};
use derive_builder::Builder;
use fnv::FnvHasher;
use std::collections::BTreeSet;
use std::hash::Hasher;

/// A type alias for the base hash function used by the indexer.
///
/// **Parameters:**
///
/// - `input: &[u8]`
///   - The bytes to digest. On the first round this is the URL itself,
///     on every further round it is the decimal text of the previous
///     digest.
///
/// **Returns:**
///
/// - `u64`
///   - The digest. Only its value modulo the array size ends up in the
///     bit array, but the full value feeds the next round.
///
/// Every position ever written to durable storage depends on this function,
/// so swapping it invalidates persisted state produced with another one.
pub type HashFunction = fn(&[u8]) -> u64;

pub(crate) fn hash_fnv64(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

pub fn default_hash_function(input: &[u8]) -> u64 {
    hash_fnv64(input)
}

/// Array size plus the ordered repeat counts, one per derived hash function.
///
/// Repeat count `r` means: digest the URL once, then re-digest the decimal
/// text of the previous digest `r - 1` more times, and reduce the final
/// digest modulo `array_size`. A repeat count of 0 yields no position.
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct HashConfig {
    /// Number of cells in the bit array
    pub array_size: usize,

    /// Repeat counts, one per hash function
    pub repeats: Vec<u32>,

    /// Base hash function chained by every repeat count
    #[builder(default = "default_hash_function")]
    pub hash_function: HashFunction,
}

impl HashConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(0) = self.array_size {
            return Err("Array size must be > 0".into());
        }
        if let Some(repeats) = &self.repeats {
            if repeats.is_empty() {
                return Err("At least one hash function is required".into());
            }
        }
        Ok(())
    }
}

impl HashConfig {
    pub fn new(array_size: usize, repeats: Vec<u32>) -> Result<Self> {
        HashConfigBuilder::default()
            .array_size(array_size)
            .repeats(repeats)
            .build()
            .map_err(|e| BlacklistError::InvalidConfig(e.to_string()))
    }

    /// Bit positions for `url`, each in `[0, array_size)`.
    ///
    /// Two repeat counts landing on the same position collapse into one
    /// entry. The result is empty only when every repeat count is 0.
    pub fn bit_positions(&self, url: &str) -> BTreeSet<usize> {
        self.repeats
            .iter()
            .filter(|&&rounds| rounds > 0)
            .map(|&rounds| {
                let digest =
                    chained_digest(url.as_bytes(), rounds, self.hash_function);
                (digest % self.array_size as u64) as usize
            })
            .collect()
    }

    /// The configuration record line: array size followed by the repeat
    /// counts, space separated.
    pub fn record_line(&self) -> String {
        let mut line = self.array_size.to_string();
        for rounds in &self.repeats {
            line.push(' ');
            line.push_str(&rounds.to_string());
        }
        line
    }
}

/// Digests `input` once, then `rounds - 1` more times over the decimal text
/// of the previous digest. Returns the raw digest of `input` for
/// `rounds <= 1`.
pub fn chained_digest(input: &[u8], rounds: u32, hash: HashFunction) -> u64 {
    let mut digest = hash(input);
    for _ in 1..rounds {
        digest = hash(digest.to_string().as_bytes());
    }
    digest
}

/// Free-function form of [`HashConfig::bit_positions`].
pub fn compute_bit_positions(url: &str, config: &HashConfig) -> BTreeSet<usize> {
    config.bit_positions(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv64_reference_vectors() {
        assert_eq!(hash_fnv64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(hash_fnv64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_chaining_rehashes_decimal_text() {
        let url = "www.example.com0";
        let h1 = hash_fnv64(url.as_bytes());
        let h2 = hash_fnv64(h1.to_string().as_bytes());
        let h3 = hash_fnv64(h2.to_string().as_bytes());

        assert_eq!(chained_digest(url.as_bytes(), 1, hash_fnv64), h1);
        assert_eq!(chained_digest(url.as_bytes(), 2, hash_fnv64), h2);
        assert_eq!(chained_digest(url.as_bytes(), 3, hash_fnv64), h3);
    }

    #[test]
    fn test_positions_match_manual_chain() {
        let config = HashConfig::new(8, vec![1, 2]).unwrap();
        let url = "www.example.com0";

        let h1 = hash_fnv64(url.as_bytes());
        let h2 = hash_fnv64(h1.to_string().as_bytes());
        let expected: BTreeSet<usize> =
            [(h1 % 8) as usize, (h2 % 8) as usize].into_iter().collect();

        assert_eq!(config.bit_positions(url), expected);
    }

    #[test]
    fn test_identical_repeats_collapse() {
        let config = HashConfig::new(16, vec![1, 1, 1]).unwrap();
        assert_eq!(config.bit_positions("test.com").len(), 1);
    }

    #[test]
    fn test_zero_repeat_is_skipped() {
        let config = HashConfig::new(16, vec![0]).unwrap();
        assert!(config.bit_positions("test.com").is_empty());

        let mixed = HashConfig::new(16, vec![0, 2]).unwrap();
        let only_two = HashConfig::new(16, vec![2]).unwrap();
        assert_eq!(
            mixed.bit_positions("test.com"),
            only_two.bit_positions("test.com")
        );
    }

    #[test]
    fn test_positions_in_range() {
        let config = HashConfig::new(7, vec![1, 2, 3, 4, 5]).unwrap();
        for i in 0..100 {
            let url = format!("www.site{i}.com");
            assert!(config.bit_positions(&url).iter().all(|&p| p < 7));
        }
    }

    #[test]
    fn test_record_line() {
        let config = HashConfig::new(8, vec![1, 2]).unwrap();
        assert_eq!(config.record_line(), "8 1 2");
    }

    #[test]
    fn test_builder_validation() {
        assert!(HashConfig::new(0, vec![1]).is_err());
        assert!(HashConfig::new(8, vec![]).is_err());
        assert!(HashConfigBuilder::default().array_size(8).build().is_err());
    }
}
