/*++

Licensed under the Apache-2.0 license.

File Name:

    frame.rs

Abstract:

    File contains the frame codec: AAD/ciphertext/tag region boundaries and
    the IV stepping policy for every message phase, role and command kind.

--*/

use crate::channel::MessageKind;
use crate::nonce::IV_SIZE_BYTES;
use bitfield::bitfield;
use core::ops::Range;
use ssit_error::{SsitError, SsitResult};

/// Size of a command word in bytes.
pub const WORD_SIZE_BYTES: usize = 4;

/// Size of the command header in bytes.
pub const HEADER_LEN_BYTES: usize = 4;

/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE_BYTES: usize = 16;

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE_BYTES: usize = 32;

/// Size of an ordinary command, header included, in words.
pub const CMD_SIZE_WORDS: usize = 8;

/// Size of a response in words.
pub const RESP_SIZE_WORDS: usize = 8;

/// Capacity of a peer's message buffer in words.
pub const MSG_BUF_CAPACITY_WORDS: usize = 0x80;

/// Capacity of a peer's message buffer in bytes.
pub const MSG_BUF_CAPACITY_BYTES: usize = MSG_BUF_CAPACITY_WORDS * WORD_SIZE_BYTES;

/// AAD length of the first configure-secure-channel command:
/// header + one word + IV1.
pub const FIRST_CFG_AAD_LEN_BYTES: usize = HEADER_LEN_BYTES + WORD_SIZE_BYTES + IV_SIZE_BYTES;

/// AAD length of every command once the channel is established: header only.
pub const STD_AAD_LEN_BYTES: usize = HEADER_LEN_BYTES;

/// Length of the first configure command's encrypted payload: IV2, a
/// 256-bit key and one reserved trailing word.
pub const IV2_AND_KEY_SIZE_BYTES: usize = 48;

/// Size of a configure-secure-channel command, header included, in words.
pub const CFG_CMD_SIZE_WORDS: usize =
    (FIRST_CFG_AAD_LEN_BYTES + IV2_AND_KEY_SIZE_BYTES) / WORD_SIZE_BYTES;

/// Byte offset of IV1 within the first configure command's frame (and within
/// the command buffer, the AAD being a verbatim copy of its first 20 bytes).
pub const IV1_OFFSET_IN_FRAME_BYTES: usize = HEADER_LEN_BYTES + WORD_SIZE_BYTES;

/// Word offset of IV2 within the configure command buffer.
pub const IV2_OFFSET_IN_CMD_WORDS: usize = 5;

/// Word offset of the new key within the configure command buffer.
pub const NEW_KEY_OFFSET_IN_CMD_WORDS: usize = 8;

/// Word offset of the payload in an ordinary command.
pub const PAYLOAD_OFFSET_WORDS: usize = 1;

bitfield! {
    /// Command header word layout.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CmdHeader(u32);
    impl Debug;

    /// Module and API identifier of the command.
    pub u32, module_and_api, _: 15, 0;

    /// Encoded payload length in words.
    pub u32, payload_len_words, _: 23, 16;
}

/// Direction-independent classification of a message: commands travel
/// master to slave, responses travel slave to master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Request,
    Response,
}

/// How the channel IV is obtained for one cryptographic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvPolicy {
    /// Use the stored IV as-is (first configure command, already fresh).
    UseCurrent,

    /// Advance the stored IV by the given step, then use the new value.
    Advance(u8),

    /// Use stored IV + step without committing the change. This is a
    /// look-ahead nonce for decrypting the peer's traffic lane, not a state
    /// change.
    Lookahead(u8),

    /// Adopt IV1 from the received frame's AAD region as the stored IV, then
    /// use it (slave side of the first configure command only).
    AdoptFromFrame,
}

/// Region boundaries of one message frame in the peer buffer, plus the byte
/// offset of the en/decrypted region within the caller's command buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub aad: Range<usize>,
    pub data: Range<usize>,
    pub tag: Range<usize>,
    pub local_offset: usize,
    pub iv_policy: IvPolicy,
}

impl FrameLayout {
    fn new(
        aad_len: usize,
        data_len: usize,
        local_offset: usize,
        iv_policy: IvPolicy,
    ) -> SsitResult<FrameLayout> {
        // Fail fast before any engine or buffer access.
        if aad_len + data_len + TAG_SIZE_BYTES > MSG_BUF_CAPACITY_BYTES {
            return Err(SsitError::FRAME_BUFFER_OVERFLOW);
        }
        Ok(FrameLayout {
            aad: 0..aad_len,
            data: aad_len..aad_len + data_len,
            tag: aad_len + data_len..aad_len + data_len + TAG_SIZE_BYTES,
            local_offset,
            iv_policy,
        })
    }

    /// Total frame length in bytes.
    pub fn frame_len(&self) -> usize {
        self.tag.end
    }
}

fn request_data_len(is_cfg_cmd: bool, header: CmdHeader) -> usize {
    if is_cfg_cmd {
        header.payload_len_words() as usize * WORD_SIZE_BYTES
    } else {
        (CMD_SIZE_WORDS - PAYLOAD_OFFSET_WORDS) * WORD_SIZE_BYTES
    }
}

/// Frame layout for an outgoing secure message.
pub fn encrypt_layout(
    class: MessageClass,
    kind: MessageKind,
    is_cfg_cmd: bool,
    header: CmdHeader,
) -> SsitResult<FrameLayout> {
    match (class, kind) {
        (_, MessageKind::Plain) => Err(SsitError::FRAME_INVALID_LENGTH),
        (MessageClass::Request, MessageKind::SecureFirstConfig) => FrameLayout::new(
            FIRST_CFG_AAD_LEN_BYTES,
            IV2_AND_KEY_SIZE_BYTES,
            IV2_OFFSET_IN_CMD_WORDS * WORD_SIZE_BYTES,
            IvPolicy::UseCurrent,
        ),
        (MessageClass::Request, MessageKind::SecureStandard) => FrameLayout::new(
            STD_AAD_LEN_BYTES,
            request_data_len(is_cfg_cmd, header),
            PAYLOAD_OFFSET_WORDS * WORD_SIZE_BYTES,
            IvPolicy::Advance(2),
        ),
        // Responses carry no AAD and are encrypted whole.
        (MessageClass::Response, _) => FrameLayout::new(
            0,
            RESP_SIZE_WORDS * WORD_SIZE_BYTES,
            0,
            IvPolicy::Advance(2),
        ),
    }
}

/// Frame layout for an incoming secure message.
pub fn decrypt_layout(
    class: MessageClass,
    kind: MessageKind,
    is_cfg_cmd: bool,
    header: CmdHeader,
) -> SsitResult<FrameLayout> {
    match (class, kind) {
        (_, MessageKind::Plain) => Err(SsitError::FRAME_INVALID_LENGTH),
        (MessageClass::Request, MessageKind::SecureFirstConfig) => FrameLayout::new(
            FIRST_CFG_AAD_LEN_BYTES,
            IV2_AND_KEY_SIZE_BYTES,
            IV2_OFFSET_IN_CMD_WORDS * WORD_SIZE_BYTES,
            IvPolicy::AdoptFromFrame,
        ),
        (MessageClass::Request, MessageKind::SecureStandard) => FrameLayout::new(
            STD_AAD_LEN_BYTES,
            request_data_len(is_cfg_cmd, header),
            PAYLOAD_OFFSET_WORDS * WORD_SIZE_BYTES,
            IvPolicy::Lookahead(1),
        ),
        (MessageClass::Response, _) => FrameLayout::new(
            0,
            RESP_SIZE_WORDS * WORD_SIZE_BYTES,
            0,
            IvPolicy::Lookahead(1),
        ),
    }
}
