/*++

Licensed under the Apache-2.0 license.

File Name:

    rotation.rs

Abstract:

    File contains the key/IV rotation handler that commits the staged key
    and IV of a configure-secure-channel command and flips the channel to
    the established state.

--*/

use crate::channel::PeerChannel;
use crate::cprintln;
use crate::frame::{
    CmdHeader, KEY_SIZE_BYTES, IV2_OFFSET_IN_CMD_WORDS, NEW_KEY_OFFSET_IN_CMD_WORDS,
    WORD_SIZE_BYTES,
};
use crate::iface::KeyStore;
use crate::nonce::IV_SIZE_BYTES;
use crate::printer::HexWord;
use ssit_error::{SsitError, SsitResult};
use zerocopy::IntoBytes;

/// Module and API identifier of the configure-secure-channel command.
pub const CFG_SEC_CHANNEL_CMD_ID: u32 = 0x12B;

/// Mask selecting the module and API identifier from a command header.
pub const MODULE_AND_API_MASK: u32 = 0xFFFF;

/// Response status word recorded for a successfully executed command.
pub const RESPONSE_SUCCESS: u32 = 0;

/// Key and IV staged by a configure command, extracted from its plaintext
/// payload. Lives only for the duration of one rotation; consumed and
/// discarded in the same operation.
struct PendingRotation {
    new_iv: [u8; IV_SIZE_BYTES],
    new_key: [u8; KEY_SIZE_BYTES],
}

impl PendingRotation {
    fn from_command(cmd: &[u32]) -> SsitResult<PendingRotation> {
        let bytes = cmd.as_bytes();
        let iv_start = IV2_OFFSET_IN_CMD_WORDS * WORD_SIZE_BYTES;
        let key_start = NEW_KEY_OFFSET_IN_CMD_WORDS * WORD_SIZE_BYTES;

        let mut staged = PendingRotation {
            new_iv: [0u8; IV_SIZE_BYTES],
            new_key: [0u8; KEY_SIZE_BYTES],
        };
        staged.new_iv.copy_from_slice(
            bytes
                .get(iv_start..iv_start + IV_SIZE_BYTES)
                .ok_or(SsitError::ROTATION_MALFORMED_COMMAND)?,
        );
        staged.new_key.copy_from_slice(
            bytes
                .get(key_start..key_start + KEY_SIZE_BYTES)
                .ok_or(SsitError::ROTATION_MALFORMED_COMMAND)?,
        );
        Ok(staged)
    }
}

pub enum KeyIvRotationHandler {}

impl KeyIvRotationHandler {
    /// Commits a rotation on the die that executed the configure command
    /// (the responder). On success the responder joins the response lane:
    /// the committed IV is new IV + 1, and every response it sends advances
    /// by 2 from there.
    ///
    /// A non-success status or a non-configure command is a no-op reported
    /// as success; absence of rotation is not itself an error.
    pub fn process_response(
        channel: &mut PeerChannel,
        key_store: &mut dyn KeyStore,
        response_status: u32,
        cmd: &[u32],
    ) -> SsitResult<()> {
        Self::commit(channel, key_store, response_status, cmd, 1)
    }

    /// Commits a rotation on the die that issued the configure command (the
    /// initiator), after it has read back a success response. The initiator
    /// stays on the request lane: the new IV is committed as-is and every
    /// request it sends advances by 2 from there, keeping request IVs even
    /// and response IVs odd relative to the rotated value.
    pub fn commit_initiator(
        channel: &mut PeerChannel,
        key_store: &mut dyn KeyStore,
        response_status: u32,
        cmd: &[u32],
    ) -> SsitResult<()> {
        Self::commit(channel, key_store, response_status, cmd, 0)
    }

    fn commit(
        channel: &mut PeerChannel,
        key_store: &mut dyn KeyStore,
        response_status: u32,
        cmd: &[u32],
        iv_step: u8,
    ) -> SsitResult<()> {
        let cmd_id = match cmd.first() {
            Some(&header) => CmdHeader(header).module_and_api(),
            None => return Ok(()),
        };
        if response_status != RESPONSE_SUCCESS || (cmd_id & MODULE_AND_API_MASK) != CFG_SEC_CHANNEL_CMD_ID
        {
            return Ok(());
        }

        let staged = PendingRotation::from_command(cmd)?;

        // Key write goes first: if it fails, neither the IV nor the
        // establishment flag has moved and the channel is still consistent.
        key_store
            .write_key(channel.key_slot(), &staged.new_key)
            .map_err(|e| {
                cprintln!("[ssit-comm] rotation key write failed: {}", HexWord(e.into()));
                SsitError::ROTATION_KEY_WRITE_FAILURE
            })?;

        channel.set_iv(&staged.new_iv);
        channel.establish();
        if iv_step > 0 {
            channel.advance_iv(iv_step);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EstablishmentState;
    use crate::iface::KeySlot;

    struct RecordingKeyStore {
        fail: bool,
        written: Vec<(KeySlot, [u8; KEY_SIZE_BYTES])>,
    }

    impl RecordingKeyStore {
        fn new(fail: bool) -> RecordingKeyStore {
            RecordingKeyStore {
                fail,
                written: Vec::new(),
            }
        }
    }

    impl KeyStore for RecordingKeyStore {
        fn write_key(&mut self, slot: KeySlot, key: &[u8; KEY_SIZE_BYTES]) -> SsitResult<()> {
            if self.fail {
                return Err(SsitError::EMU_ENGINE_BAD_STATE);
            }
            self.written.push((slot, *key));
            Ok(())
        }
    }

    fn cfg_command() -> [u32; 16] {
        let mut cmd = [0u32; 16];
        cmd[0] = CFG_SEC_CHANNEL_CMD_ID | (15 << 16);
        // IV2 bytes 0x10.. at words 5..8, key bytes 0x20.. at words 8..16
        for (i, word) in cmd[5..8].iter_mut().enumerate() {
            *word = 0x1010_1010 + i as u32;
        }
        for (i, word) in cmd[8..16].iter_mut().enumerate() {
            *word = 0x2020_2020 + i as u32;
        }
        cmd
    }

    #[test]
    fn test_successful_rotation_establishes_channel() {
        let mut channel = PeerChannel::new(KeySlot::UserKey0);
        let mut key_store = RecordingKeyStore::new(false);
        let cmd = cfg_command();

        KeyIvRotationHandler::process_response(&mut channel, &mut key_store, 0, &cmd).unwrap();

        assert_eq!(channel.state(), EstablishmentState::Established);
        assert_eq!(key_store.written.len(), 1);
        assert_eq!(key_store.written[0].0, KeySlot::UserKey0);

        // Committed IV is IV2 + 1 on the responder.
        let mut expected = [0u8; IV_SIZE_BYTES];
        expected.copy_from_slice(&cmd.as_bytes()[20..32]);
        crate::nonce::increment(&mut expected, 1);
        assert_eq!(channel.iv(), &expected);
    }

    #[test]
    fn test_initiator_commit_skips_iv_bump() {
        let mut channel = PeerChannel::new(KeySlot::UserKey1);
        let mut key_store = RecordingKeyStore::new(false);
        let cmd = cfg_command();

        KeyIvRotationHandler::commit_initiator(&mut channel, &mut key_store, 0, &cmd).unwrap();

        assert_eq!(channel.state(), EstablishmentState::Established);
        let mut expected = [0u8; IV_SIZE_BYTES];
        expected.copy_from_slice(&cmd.as_bytes()[20..32]);
        assert_eq!(channel.iv(), &expected);
    }

    #[test]
    fn test_non_success_status_is_a_noop() {
        let mut channel = PeerChannel::new(KeySlot::UserKey0);
        let before = channel.clone();
        let mut key_store = RecordingKeyStore::new(false);

        let result =
            KeyIvRotationHandler::process_response(&mut channel, &mut key_store, 1, &cfg_command());

        assert_eq!(result, Ok(()));
        assert_eq!(channel, before);
        assert!(key_store.written.is_empty());
    }

    #[test]
    fn test_other_command_is_a_noop() {
        let mut channel = PeerChannel::new(KeySlot::UserKey0);
        let before = channel.clone();
        let mut key_store = RecordingKeyStore::new(false);
        let mut cmd = cfg_command();
        cmd[0] = 0x205 | (15 << 16);

        let result = KeyIvRotationHandler::process_response(&mut channel, &mut key_store, 0, &cmd);

        assert_eq!(result, Ok(()));
        assert_eq!(channel, before);
        assert!(key_store.written.is_empty());
    }

    #[test]
    fn test_key_write_failure_leaves_state_unchanged() {
        let mut channel = PeerChannel::new(KeySlot::UserKey0);
        let before = channel.clone();
        let mut key_store = RecordingKeyStore::new(true);

        let result =
            KeyIvRotationHandler::process_response(&mut channel, &mut key_store, 0, &cfg_command());

        assert_eq!(result, Err(SsitError::ROTATION_KEY_WRITE_FAILURE));
        assert_eq!(channel, before);
    }

    #[test]
    fn test_short_command_rejected() {
        let mut channel = PeerChannel::new(KeySlot::UserKey0);
        let mut key_store = RecordingKeyStore::new(false);
        let cmd = [CFG_SEC_CHANNEL_CMD_ID | (15 << 16); 8];

        let result = KeyIvRotationHandler::process_response(&mut channel, &mut key_store, 0, &cmd);
        assert_eq!(result, Err(SsitError::ROTATION_MALFORMED_COMMAND));
    }
}
