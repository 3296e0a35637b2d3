//! Hash functions for KeyHighlight
//!
//! Murmur3 32-bit, used to derive short stable names (CSS animation names)
//! from color lists. Output must be identical across runs and platforms.

const SEED: u32 = 0x9e3779b9; // Golden ratio

/// Murmur3 32-bit hash implementation.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;
    let mut i = 0;

    // Process 4-byte chunks
    let chunks = (len >> 2) << 2;
    while i < chunks {
        let k = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);

        i += 4;
    }

    // Process remaining bytes
    let mut k: u32 = 0;
    let remainder = len & 3;
    if remainder >= 3 {
        k ^= (data[i + 2] as u32) << 16;
    }
    if remainder >= 2 {
        k ^= (data[i + 1] as u32) << 8;
    }
    if remainder >= 1 {
        k ^= data[i] as u32;
        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);
        h ^= k;
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

/// Hash an ordered list of strings. Order matters: `[a, b]` and `[b, a]`
/// hash differently.
pub fn hash_list<'a, I>(items: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let mut buf = Vec::with_capacity(64);
    for item in items {
        buf.extend_from_slice(item.to_ascii_lowercase().as_bytes());
        // Separator that cannot appear in a color
        buf.push(0x1f);
    }
    murmur3_32(&buf, SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_consistent() {
        assert_eq!(murmur3_32(b"#ff0000", 0), murmur3_32(b"#ff0000", 0));
        assert_ne!(murmur3_32(b"#ff0000", 0), murmur3_32(b"#ff0001", 0));
        assert_ne!(murmur3_32(b"#ff0000", 0), murmur3_32(b"#ff0000", 1));
    }

    #[test]
    fn test_murmur3_known_vector() {
        // Reference value for the empty input with seed 0
        assert_eq!(murmur3_32(b"", 0), 0);
    }

    #[test]
    fn test_hash_list_order_sensitive() {
        let ab = hash_list(["#111111", "#222222"]);
        let ba = hash_list(["#222222", "#111111"]);
        assert_ne!(ab, ba);
        assert_eq!(ab, hash_list(["#111111", "#222222"]));
        assert_eq!(ab, hash_list(["#111111", "#222222"].iter().copied()));
    }

    #[test]
    fn test_hash_list_case_insensitive() {
        assert_eq!(hash_list(["#AABBCC"]), hash_list(["#aabbcc"]));
        assert_ne!(hash_list(["#aa", "bb"]), hash_list(["#aabb"]));
    }
}
