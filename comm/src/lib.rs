/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SSIT secure message transport library.

--*/

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod channel;
mod crypto_op;
mod frame;
mod iface;
pub mod nonce;
pub mod printer;
mod rotation;
mod transport;

pub use ssit_error::{SsitError, SsitResult};

pub use channel::{
    message_kind, ChannelTable, EstablishmentState, MessageKind, PeerChannel, MAX_PEERS,
    SLAVE_CHANNEL_INDEX,
};
pub use crypto_op::{AesOpParams, AesOperation};
pub use frame::{
    CmdHeader, FrameLayout, IvPolicy, MessageClass, CFG_CMD_SIZE_WORDS, CMD_SIZE_WORDS,
    FIRST_CFG_AAD_LEN_BYTES,
    HEADER_LEN_BYTES, IV1_OFFSET_IN_FRAME_BYTES, IV2_AND_KEY_SIZE_BYTES, IV2_OFFSET_IN_CMD_WORDS,
    KEY_SIZE_BYTES, MSG_BUF_CAPACITY_BYTES, MSG_BUF_CAPACITY_WORDS, NEW_KEY_OFFSET_IN_CMD_WORDS,
    PAYLOAD_OFFSET_WORDS, RESP_SIZE_WORDS, STD_AAD_LEN_BYTES, TAG_SIZE_BYTES, WORD_SIZE_BYTES,
};
pub use iface::{BufferAddressResolver, CryptoEngine, KeySlot, KeyStore, SharedBufferMem};
pub use nonce::IV_SIZE_BYTES;
pub use rotation::{
    KeyIvRotationHandler, CFG_SEC_CHANNEL_CMD_ID, MODULE_AND_API_MASK, RESPONSE_SUCCESS,
};
pub use transport::{
    AuthenticatedEncryptStrategy, ChannelCryptoStrategy, DieRole, MasterBufferMap,
    MessageTransport, PlainCopyStrategy, SlaveBufferMap,
};
