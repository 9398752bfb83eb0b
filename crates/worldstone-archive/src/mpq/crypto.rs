//! MPQ crypt table, name hashing and table decryption
//!
//! Every MPQ hash function and the table cipher index into the same
//! 0x500-entry table generated from a fixed seed.

use std::sync::LazyLock;

/// Which slice of the crypt table a hash uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HashType {
    /// Starting slot in the hash table
    TableOffset = 0,
    /// First name check value
    NameA = 1,
    /// Second name check value
    NameB = 2,
    /// Encryption key derived from a name
    FileKey = 3,
}

/// Key of the encrypted hash table
pub const HASH_TABLE_KEY: u32 = 0xC3AF3770;

/// Key of the encrypted block table
pub const BLOCK_TABLE_KEY: u32 = 0xEC83B3A3;

static CRYPT_TABLE: LazyLock<[u32; 0x500]> = LazyLock::new(generate_crypt_table);

fn generate_crypt_table() -> [u32; 0x500] {
    let mut table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    for index1 in 0..0x100usize {
        let mut index2 = index1;
        for _ in 0..5 {
            seed = (seed * 125 + 3) % 0x2A_AAAB;
            let high = (seed & 0xFFFF) << 16;
            seed = (seed * 125 + 3) % 0x2A_AAAB;
            let low = seed & 0xFFFF;
            table[index2] = high | low;
            index2 += 0x100;
        }
    }

    table
}

/// The shared crypt table
pub fn crypt_table() -> &'static [u32; 0x500] {
    &CRYPT_TABLE
}

/// Normalise one name byte: ASCII upper case, `/` becomes `\`
fn normalize(byte: u8) -> u8 {
    match byte {
        b'/' => b'\\',
        other => other.to_ascii_uppercase(),
    }
}

/// Hash an archive name.
///
/// Names are case-insensitive and accept either path separator.
pub fn hash_string(name: &str, hash_type: HashType) -> u32 {
    let table = crypt_table();
    let offset = (hash_type as usize) << 8;
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for byte in name.bytes().map(normalize) {
        let ch = u32::from(byte);
        seed1 = table[offset + byte as usize] ^ seed1.wrapping_add(seed2);
        seed2 = ch
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// Decrypt a run of little-endian words in place
pub fn decrypt_block(data: &mut [u32], key: u32) {
    let table = crypt_table();
    let mut key = key;
    let mut seed: u32 = 0xEEEE_EEEE;

    for value in data.iter_mut() {
        seed = seed.wrapping_add(table[0x400 + (key & 0xFF) as usize]);
        let plain = *value ^ key.wrapping_add(seed);
        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        seed = plain
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
        *value = plain;
    }
}

/// Encrypt a run of words in place, the inverse of [`decrypt_block`]
pub fn encrypt_block(data: &mut [u32], key: u32) {
    let table = crypt_table();
    let mut key = key;
    let mut seed: u32 = 0xEEEE_EEEE;

    for value in data.iter_mut() {
        seed = seed.wrapping_add(table[0x400 + (key & 0xFF) as usize]);
        let plain = *value;
        *value = plain ^ key.wrapping_add(seed);
        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        seed = plain
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Decrypt a byte buffer whose length is a multiple of four
pub fn decrypt_bytes(data: &mut [u8], key: u32) {
    let mut words: Vec<u32> = data
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    decrypt_block(&mut words, key);
    for (chunk, word) in data.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}
