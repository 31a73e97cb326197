/*++

Licensed under the Apache-2.0 license.

File Name:

    crypto_op.rs

Abstract:

    File contains the adapter that drives the AES-GCM engine through one
    atomic encrypt or decrypt operation and maps each pipeline stage to a
    distinct error kind.

--*/

use crate::frame::TAG_SIZE_BYTES;
use crate::iface::{CryptoEngine, KeySlot};
use crate::nonce::IV_SIZE_BYTES;
use ssit_error::{SsitError, SsitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesOperation {
    Encrypt = 1,
    Decrypt = 2,
}

/// Parameters for one encrypt/decrypt operation.
pub struct AesOpParams<'a> {
    pub key_slot: KeySlot,
    pub iv: &'a [u8; IV_SIZE_BYTES],
    pub aad: &'a [u8],
    pub input: &'a [u8],
    pub output: &'a mut [u8],
}

/// Runs init, AAD update, data update and finalization as one atomic
/// operation. Any stage failure aborts the whole operation; no partial
/// output is valid.
fn perform(
    engine: &mut dyn CryptoEngine,
    op: AesOperation,
    params: &mut AesOpParams,
    tag: &mut [u8; TAG_SIZE_BYTES],
) -> SsitResult<()> {
    match op {
        AesOperation::Encrypt => engine.encrypt_init(params.key_slot, params.iv),
        AesOperation::Decrypt => engine.decrypt_init(params.key_slot, params.iv),
    }
    .map_err(|_| SsitError::CRYPTO_INIT_FAILURE)?;

    if !params.aad.is_empty() {
        engine
            .update_aad(params.aad)
            .map_err(|_| SsitError::CRYPTO_AAD_UPDATE_FAILURE)?;
    }

    match op {
        AesOperation::Encrypt => engine.encrypt_update(params.input, params.output, true),
        AesOperation::Decrypt => engine.decrypt_update(params.input, params.output, true),
    }
    .map_err(|_| SsitError::CRYPTO_DATA_UPDATE_FAILURE)?;

    match op {
        AesOperation::Encrypt => engine
            .encrypt_final(tag)
            .map_err(|_| SsitError::CRYPTO_TAG_FINALIZATION_FAILURE),
        AesOperation::Decrypt => {
            let verified = engine
                .decrypt_final(tag)
                .map_err(|_| SsitError::CRYPTO_TAG_FINALIZATION_FAILURE)?;
            if !verified {
                // The plaintext written to the output must be discarded by
                // the caller and never used.
                return Err(SsitError::CRYPTO_AUTHENTICATION_FAILURE);
            }
            Ok(())
        }
    }
}

/// Encrypts `params.input` into `params.output`, producing the tag.
pub fn encrypt(
    engine: &mut dyn CryptoEngine,
    mut params: AesOpParams,
    tag: &mut [u8; TAG_SIZE_BYTES],
) -> SsitResult<()> {
    perform(engine, AesOperation::Encrypt, &mut params, tag)
}

/// Decrypts `params.input` into `params.output`, verifying the tag.
pub fn decrypt(
    engine: &mut dyn CryptoEngine,
    mut params: AesOpParams,
    tag: &[u8; TAG_SIZE_BYTES],
) -> SsitResult<()> {
    let mut tag = *tag;
    perform(engine, AesOperation::Decrypt, &mut params, &mut tag)
}
