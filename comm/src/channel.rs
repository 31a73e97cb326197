/*++

Licensed under the Apache-2.0 license.

File Name:

    channel.rs

Abstract:

    File contains the per-peer channel state and the establishment state
    machine.

--*/

use crate::iface::KeySlot;
use crate::nonce::{self, IV_SIZE_BYTES};
use ssit_error::{SsitError, SsitResult};

/// Maximum number of slave dies in a package.
pub const MAX_PEERS: usize = 3;

/// Channel index a slave die uses for its single master-facing channel.
pub const SLAVE_CHANNEL_INDEX: usize = 1;

/// Establishment state of one peer channel. A channel starts every session
/// in `Bootstrap` and moves to `Established` exactly once, on a successful
/// key/IV rotation; it never moves back within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstablishmentState {
    Bootstrap,
    Established,
}

/// Kind of protection applied to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Copy-through, no crypto.
    Plain,

    /// First configure-secure-channel command: 20-byte AAD carrying IV1,
    /// encrypted IV2-and-key payload.
    SecureFirstConfig,

    /// Every secure message after establishment.
    SecureStandard,
}

/// Message kind for the given channel state and command kind.
pub fn message_kind(state: EstablishmentState, is_cfg_cmd: bool) -> MessageKind {
    match (state, is_cfg_cmd) {
        (EstablishmentState::Established, _) => MessageKind::SecureStandard,
        (EstablishmentState::Bootstrap, true) => MessageKind::SecureFirstConfig,
        (EstablishmentState::Bootstrap, false) => MessageKind::Plain,
    }
}

/// State owned by one die pair: establishment flag, current key slot and
/// current IV. The IV is mutated only through the sequencing operations
/// below, never shared between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerChannel {
    state: EstablishmentState,
    key_slot: KeySlot,
    iv: [u8; IV_SIZE_BYTES],
}

impl PeerChannel {
    pub fn new(key_slot: KeySlot) -> PeerChannel {
        PeerChannel {
            state: EstablishmentState::Bootstrap,
            key_slot,
            iv: [0u8; IV_SIZE_BYTES],
        }
    }

    pub fn state(&self) -> EstablishmentState {
        self.state
    }

    pub fn key_slot(&self) -> KeySlot {
        self.key_slot
    }

    pub fn iv(&self) -> &[u8; IV_SIZE_BYTES] {
        &self.iv
    }

    pub fn set_iv(&mut self, iv: &[u8; IV_SIZE_BYTES]) {
        self.iv = *iv;
    }

    /// Advances the stored IV by `step` and returns the new value.
    pub fn advance_iv(&mut self, step: u8) -> [u8; IV_SIZE_BYTES] {
        nonce::increment(&mut self.iv, step);
        self.iv
    }

    /// Returns stored IV + `step` without committing the change.
    pub fn lookahead_iv(&self, step: u8) -> [u8; IV_SIZE_BYTES] {
        let mut iv = self.iv;
        nonce::increment(&mut iv, step);
        iv
    }

    pub(crate) fn establish(&mut self) {
        self.state = EstablishmentState::Established;
    }
}

/// Table of peer channels, indexed by 1-based peer index.
#[derive(Debug, Clone)]
pub struct ChannelTable {
    channels: [PeerChannel; MAX_PEERS],
}

impl ChannelTable {
    pub fn new() -> ChannelTable {
        ChannelTable {
            channels: [
                PeerChannel::new(KeySlot::UserKey0),
                PeerChannel::new(KeySlot::UserKey1),
                PeerChannel::new(KeySlot::UserKey2),
            ],
        }
    }

    pub fn get(&self, peer: usize) -> SsitResult<&PeerChannel> {
        match peer {
            1..=MAX_PEERS => Ok(&self.channels[peer - 1]),
            _ => Err(SsitError::TRANSPORT_INVALID_PEER),
        }
    }

    pub fn get_mut(&mut self, peer: usize) -> SsitResult<&mut PeerChannel> {
        match peer {
            1..=MAX_PEERS => Ok(&mut self.channels[peer - 1]),
            _ => Err(SsitError::TRANSPORT_INVALID_PEER),
        }
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_table() {
        assert_eq!(
            message_kind(EstablishmentState::Bootstrap, false),
            MessageKind::Plain
        );
        assert_eq!(
            message_kind(EstablishmentState::Bootstrap, true),
            MessageKind::SecureFirstConfig
        );
        assert_eq!(
            message_kind(EstablishmentState::Established, false),
            MessageKind::SecureStandard
        );
        // The special first-config framing applies exactly once, before
        // establishment.
        assert_eq!(
            message_kind(EstablishmentState::Established, true),
            MessageKind::SecureStandard
        );
    }

    #[test]
    fn test_channel_starts_in_bootstrap() {
        let ch = PeerChannel::new(KeySlot::UserKey0);
        assert_eq!(ch.state(), EstablishmentState::Bootstrap);
        assert_eq!(ch.iv(), &[0u8; IV_SIZE_BYTES]);
    }

    #[test]
    fn test_advance_commits_lookahead_does_not() {
        let mut ch = PeerChannel::new(KeySlot::UserKey0);
        let peeked = ch.lookahead_iv(1);
        assert_eq!(peeked[11], 1);
        assert_eq!(ch.iv()[11], 0);

        let advanced = ch.advance_iv(2);
        assert_eq!(advanced[11], 2);
        assert_eq!(ch.iv()[11], 2);
    }

    #[test]
    fn test_channel_table_peer_bounds() {
        let mut table = ChannelTable::new();
        assert_eq!(table.get(1).unwrap().key_slot(), KeySlot::UserKey0);
        assert_eq!(table.get(3).unwrap().key_slot(), KeySlot::UserKey2);
        assert_eq!(table.get(0).unwrap_err(), SsitError::TRANSPORT_INVALID_PEER);
        assert_eq!(table.get(4).unwrap_err(), SsitError::TRANSPORT_INVALID_PEER);
        assert!(table.get_mut(2).is_ok());
    }
}
