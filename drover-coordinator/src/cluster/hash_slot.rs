//! Hash Slot Algorithm - CRC16 mod 16384
//!
//! Redis-compatible slot derivation. The whole key is hashed; every store
//! node and the coordinator must agree on this function, since data
//! placement and log grouping both key off it.

use crate::cluster::types::TOTAL_SLOTS;

/// CRC16/XMODEM (poly 0x1021, init 0), bit-serial
///
/// Same checksum the Redis cluster slot algorithm uses. Slot hashing is
/// not hot enough here to need the usual 256-entry table.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Calculate hash slot for a key (CRC16 mod 16384)
///
/// # Example
/// ```
/// use drover_coordinator::cluster::hash_slot::hash_slot;
///
/// let slot = hash_slot("user:1001");
/// assert!(slot < 16384);
///
/// // Same key, same slot, on every node
/// assert_eq!(hash_slot("user:1001"), slot);
/// ```
pub fn hash_slot(key: &str) -> u16 {
    crc16(key.as_bytes()) % TOTAL_SLOTS
}
