/*++

Licensed under the Apache-2.0 license.

File Name:

    iface.rs

Abstract:

    File contains the traits through which the transport consumes its
    external collaborators: the AES-GCM engine, the hardware key store and
    the inter-die shared buffer memory.

--*/

use crate::frame::{KEY_SIZE_BYTES, TAG_SIZE_BYTES};
use crate::nonce::IV_SIZE_BYTES;
use ssit_error::{SsitError, SsitResult};

/// AES user key slot identifier.
///
/// The key material itself is owned by the crypto engine's key store; this
/// subsystem only ever names slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    UserKey0 = 0,
    UserKey1 = 1,
    UserKey2 = 2,
    UserKey3 = 3,
    UserKey4 = 4,
    UserKey5 = 5,
    UserKey6 = 6,
    UserKey7 = 7,
}

impl KeySlot {
    /// Slot reserved for the channel with the given peer. Peer indices are
    /// 1-based; peer N owns user key slot N-1.
    pub fn for_peer(peer: usize) -> SsitResult<KeySlot> {
        const SLOTS: [KeySlot; 8] = [
            KeySlot::UserKey0,
            KeySlot::UserKey1,
            KeySlot::UserKey2,
            KeySlot::UserKey3,
            KeySlot::UserKey4,
            KeySlot::UserKey5,
            KeySlot::UserKey6,
            KeySlot::UserKey7,
        ];
        match peer {
            1..=8 => Ok(SLOTS[peer - 1]),
            _ => Err(SsitError::TRANSPORT_INVALID_PEER),
        }
    }
}

impl From<KeySlot> for u32 {
    /// Converts to this type from the input type.
    fn from(slot: KeySlot) -> Self {
        slot as Self
    }
}

impl From<KeySlot> for usize {
    /// Converts to this type from the input type.
    fn from(slot: KeySlot) -> Self {
        slot as Self
    }
}

/// Staged AES-GCM primitive engine. Key size is always 256 bits.
///
/// The engine's internal state is not owned by this subsystem and must not
/// be assumed to persist across operations; every operation re-runs the full
/// init / AAD / data / final sequence.
pub trait CryptoEngine {
    fn encrypt_init(&mut self, key_slot: KeySlot, iv: &[u8; IV_SIZE_BYTES]) -> SsitResult<()>;

    fn decrypt_init(&mut self, key_slot: KeySlot, iv: &[u8; IV_SIZE_BYTES]) -> SsitResult<()>;

    fn update_aad(&mut self, aad: &[u8]) -> SsitResult<()>;

    fn encrypt_update(
        &mut self,
        plaintext: &[u8],
        ciphertext: &mut [u8],
        last: bool,
    ) -> SsitResult<()>;

    fn decrypt_update(
        &mut self,
        ciphertext: &[u8],
        plaintext: &mut [u8],
        last: bool,
    ) -> SsitResult<()>;

    /// Produces the GCM tag for the current encrypt operation.
    fn encrypt_final(&mut self, tag: &mut [u8; TAG_SIZE_BYTES]) -> SsitResult<()>;

    /// Verifies the GCM tag for the current decrypt operation. Returns
    /// `Ok(true)` if the tag verified, `Ok(false)` on mismatch; `Err` means
    /// the engine itself failed before a verdict was reached.
    fn decrypt_final(&mut self, tag: &[u8; TAG_SIZE_BYTES]) -> SsitResult<bool>;
}

/// Hardware key store. Persists a 256-bit key to a named slot.
pub trait KeyStore {
    fn write_key(&mut self, slot: KeySlot, key: &[u8; KEY_SIZE_BYTES]) -> SsitResult<()>;
}

/// Raw byte access to the inter-die shared buffer memory.
pub trait SharedBufferMem {
    fn write(&mut self, addr: u32, data: &[u8]) -> SsitResult<()>;

    fn read(&self, addr: u32, out: &mut [u8]) -> SsitResult<()>;
}

/// Resolves the shared-memory frame addresses for a peer. Master and slave
/// roles see the same physical buffers under different maps, so the core
/// transport logic carries no role-conditional address math.
pub trait BufferAddressResolver {
    /// Address of the outbound frame buffer for the given peer.
    fn send_addr(&self, peer: usize) -> SsitResult<u32>;

    /// Address of the inbound frame buffer for the given peer.
    fn recv_addr(&self, peer: usize) -> SsitResult<u32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_slot_for_peer() {
        assert_eq!(KeySlot::for_peer(1), Ok(KeySlot::UserKey0));
        assert_eq!(KeySlot::for_peer(3), Ok(KeySlot::UserKey2));
        assert_eq!(KeySlot::for_peer(8), Ok(KeySlot::UserKey7));
        assert_eq!(
            KeySlot::for_peer(0),
            Err(SsitError::TRANSPORT_INVALID_PEER)
        );
        assert_eq!(
            KeySlot::for_peer(9),
            Err(SsitError::TRANSPORT_INVALID_PEER)
        );
    }
}
