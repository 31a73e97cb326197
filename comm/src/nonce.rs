/*++

Licensed under the Apache-2.0 license.

File Name:

    nonce.rs

Abstract:

    File contains the per-channel IV sequencing primitive.

--*/

/// Size of an AES-GCM IV in bytes.
pub const IV_SIZE_BYTES: usize = 12;

/// Increments the IV by the given value.
///
/// The 12 bytes are treated as a single big-endian multi-precision integer;
/// the carry is propagated leftward from the last byte and the loop stops as
/// soon as the carry is consumed. Overflow of the full 96 bits wraps silently;
/// the protocol rotates keys long before 2^96 messages elapse.
pub fn increment(iv: &mut [u8; IV_SIZE_BYTES], incr_value: u8) {
    let mut carry = u32::from(incr_value);

    for byte in iv.iter_mut().rev() {
        let result = u32::from(*byte) + carry;
        *byte = (result & 0xFF) as u8;
        carry = result >> 8;
        if carry == 0 {
            break;
        }
    }
}
