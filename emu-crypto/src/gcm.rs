/*++

Licensed under the Apache-2.0 license.

File Name:

    gcm.rs

Abstract:

    File contains an emulated AES-256-GCM engine with a slot-addressed key
    table, implementing the staged engine interface on top of the one-shot
    RustCrypto primitives.

--*/

use aes_gcm::{
    aead::{AeadMutInPlace, KeyInit},
    Key,
};
use ssit_comm::{CryptoEngine, KeySlot, KeyStore, IV_SIZE_BYTES, KEY_SIZE_BYTES, TAG_SIZE_BYTES};
use ssit_error::{SsitError, SsitResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Number of user key slots the emulated key store provides.
pub const NUM_KEY_SLOTS: usize = 8;

/// Slot-addressed key table shared between an engine and the code that
/// provisions keys, mirroring a hardware key store that both the crypto
/// block and the key-write interface see.
#[derive(Clone, Default)]
pub struct SharedKeyTable {
    slots: Rc<RefCell<[Option<[u8; KEY_SIZE_BYTES]>; NUM_KEY_SLOTS]>>,
}

impl SharedKeyTable {
    pub fn new() -> SharedKeyTable {
        SharedKeyTable::default()
    }

    fn key(&self, slot: KeySlot) -> SsitResult<[u8; KEY_SIZE_BYTES]> {
        self.slots.borrow()[usize::from(slot)].ok_or(SsitError::EMU_ENGINE_UNKNOWN_KEY_SLOT)
    }
}

impl KeyStore for SharedKeyTable {
    fn write_key(&mut self, slot: KeySlot, key: &[u8; KEY_SIZE_BYTES]) -> SsitResult<()> {
        self.slots.borrow_mut()[usize::from(slot)] = Some(*key);
        Ok(())
    }
}

enum OpState {
    Encrypt {
        key: [u8; KEY_SIZE_BYTES],
        iv: [u8; IV_SIZE_BYTES],
        aad: Vec<u8>,
        tag: Option<[u8; TAG_SIZE_BYTES]>,
    },
    Decrypt {
        key: [u8; KEY_SIZE_BYTES],
        iv: [u8; IV_SIZE_BYTES],
        aad: Vec<u8>,
        plaintext: Option<Vec<u8>>,
    },
}

/// Emulated AES-256-GCM engine.
///
/// The underlying RustCrypto cipher is one-shot, so the staged interface is
/// emulated: updates buffer their inputs and the authentication result is
/// computed at finalization. One data update per operation.
pub struct EmuAesGcm {
    keys: SharedKeyTable,
    state: Option<OpState>,
}

impl EmuAesGcm {
    pub fn new(keys: SharedKeyTable) -> EmuAesGcm {
        EmuAesGcm { keys, state: None }
    }

    fn cipher(key: &[u8; KEY_SIZE_BYTES]) -> aes_gcm::Aes256Gcm {
        let key: &Key<aes_gcm::Aes256Gcm> = key.into();
        aes_gcm::Aes256Gcm::new(key)
    }

    fn run_encrypt(
        key: &[u8; KEY_SIZE_BYTES],
        iv: &[u8; IV_SIZE_BYTES],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> SsitResult<[u8; TAG_SIZE_BYTES]> {
        let mut cipher = Self::cipher(key);
        let tag = cipher
            .encrypt_in_place_detached(iv.into(), aad, buffer)
            .map_err(|_| SsitError::EMU_ENGINE_BAD_STATE)?;
        Ok(tag.into())
    }
}

impl CryptoEngine for EmuAesGcm {
    fn encrypt_init(&mut self, key_slot: KeySlot, iv: &[u8; IV_SIZE_BYTES]) -> SsitResult<()> {
        self.state = Some(OpState::Encrypt {
            key: self.keys.key(key_slot)?,
            iv: *iv,
            aad: Vec::new(),
            tag: None,
        });
        Ok(())
    }

    fn decrypt_init(&mut self, key_slot: KeySlot, iv: &[u8; IV_SIZE_BYTES]) -> SsitResult<()> {
        self.state = Some(OpState::Decrypt {
            key: self.keys.key(key_slot)?,
            iv: *iv,
            aad: Vec::new(),
            plaintext: None,
        });
        Ok(())
    }

    fn update_aad(&mut self, data: &[u8]) -> SsitResult<()> {
        match self.state.as_mut() {
            Some(OpState::Encrypt { aad, tag: None, .. }) => {
                aad.extend_from_slice(data);
                Ok(())
            }
            Some(OpState::Decrypt {
                aad,
                plaintext: None,
                ..
            }) => {
                aad.extend_from_slice(data);
                Ok(())
            }
            _ => Err(SsitError::EMU_ENGINE_BAD_STATE),
        }
    }

    fn encrypt_update(
        &mut self,
        plaintext: &[u8],
        ciphertext: &mut [u8],
        last: bool,
    ) -> SsitResult<()> {
        if !last || ciphertext.len() != plaintext.len() {
            return Err(SsitError::EMU_ENGINE_BAD_STATE);
        }
        match self.state.as_mut() {
            Some(OpState::Encrypt {
                key,
                iv,
                aad,
                tag: tag @ None,
            }) => {
                ciphertext.copy_from_slice(plaintext);
                *tag = Some(Self::run_encrypt(key, iv, aad, ciphertext)?);
                Ok(())
            }
            _ => Err(SsitError::EMU_ENGINE_BAD_STATE),
        }
    }

    fn decrypt_update(
        &mut self,
        ciphertext: &[u8],
        plaintext: &mut [u8],
        last: bool,
    ) -> SsitResult<()> {
        if !last || plaintext.len() != ciphertext.len() {
            return Err(SsitError::EMU_ENGINE_BAD_STATE);
        }
        match self.state.as_mut() {
            Some(OpState::Decrypt {
                key,
                iv,
                plaintext: stored @ None,
                ..
            }) => {
                // GCM is counter mode underneath: running the encrypt
                // transform over the ciphertext recovers the plaintext
                // without the tag, which only arrives at finalization.
                plaintext.copy_from_slice(ciphertext);
                Self::run_encrypt(key, iv, &[], plaintext)?;
                *stored = Some(plaintext.to_vec());
                Ok(())
            }
            _ => Err(SsitError::EMU_ENGINE_BAD_STATE),
        }
    }

    fn encrypt_final(&mut self, tag: &mut [u8; TAG_SIZE_BYTES]) -> SsitResult<()> {
        match self.state.take() {
            Some(OpState::Encrypt {
                tag: Some(computed),
                ..
            }) => {
                *tag = computed;
                Ok(())
            }
            _ => Err(SsitError::EMU_ENGINE_BAD_STATE),
        }
    }

    fn decrypt_final(&mut self, tag: &[u8; TAG_SIZE_BYTES]) -> SsitResult<bool> {
        match self.state.take() {
            Some(OpState::Decrypt {
                key,
                iv,
                aad,
                plaintext: Some(plaintext),
            }) => {
                // Recompute the tag over the recovered plaintext and the
                // buffered AAD; a mismatch is a verdict, not an engine error.
                let mut buffer = plaintext;
                let computed = Self::run_encrypt(&key, &iv, &aad, &mut buffer)?;
                Ok(computed == *tag)
            }
            _ => Err(SsitError::EMU_ENGINE_BAD_STATE),
        }
    }
}
