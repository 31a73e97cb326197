/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the workspace for error handling

--*/
#![cfg_attr(not(any(feature = "std", test)), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// SSIT communication error type.
///
/// Error codes are partitioned by component:
/// 0x0001_xxxx frame codec, 0x0002_xxxx crypto operation adapter,
/// 0x0003_xxxx message transport, 0x0004_xxxx key/IV rotation,
/// 0x000A_xxxx emulated collaborators.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SsitError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: SsitError = SsitError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(& 'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl SsitError {
    /// Create an error constant; intended to only be used from const contexts, as we don't
    /// want runtime panics if val is zero. The preferred way to get an SsitError from a u32
    /// is `SsitError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("SsitError cannot be 0"),
        }
    }

    // Use the macro to define all error constants
    define_error_constants![
        (
            FRAME_BUFFER_OVERFLOW,
            0x00010001,
            "Frame Codec Error: AAD + data + tag exceeds the peer message buffer capacity"
        ),
        (
            FRAME_INVALID_LENGTH,
            0x00010002,
            "Frame Codec Error: computed AAD/data region does not fit the caller buffer"
        ),
        (
            CRYPTO_INIT_FAILURE,
            0x00020001,
            "Crypto Adapter Error: AES engine init stage failed"
        ),
        (
            CRYPTO_AAD_UPDATE_FAILURE,
            0x00020002,
            "Crypto Adapter Error: AAD update stage failed"
        ),
        (
            CRYPTO_DATA_UPDATE_FAILURE,
            0x00020003,
            "Crypto Adapter Error: data update stage failed"
        ),
        (
            CRYPTO_TAG_FINALIZATION_FAILURE,
            0x00020004,
            "Crypto Adapter Error: tag finalization stage failed"
        ),
        (
            CRYPTO_AUTHENTICATION_FAILURE,
            0x00020005,
            "Crypto Adapter Error: GCM tag verification failed"
        ),
        (
            TRANSPORT_COPY_TO_BUFFER_FAILURE,
            0x00030001,
            "Transport Error: raw copy into the peer message buffer failed"
        ),
        (
            TRANSPORT_COPY_FROM_BUFFER_FAILURE,
            0x00030002,
            "Transport Error: raw copy out of the peer message buffer failed"
        ),
        (
            TRANSPORT_INVALID_PEER,
            0x00030003,
            "Transport Error: peer index out of range"
        ),
        (
            ROTATION_KEY_WRITE_FAILURE,
            0x00040001,
            "Rotation Error: writing the new key to the hardware key store failed"
        ),
        (
            ROTATION_MALFORMED_COMMAND,
            0x00040002,
            "Rotation Error: configure command too short to carry a key and IV"
        ),
        (
            EMU_ENGINE_BAD_STATE,
            0x000A0001,
            "Emulated Engine Error: operation stage called out of order"
        ),
        (
            EMU_ENGINE_UNKNOWN_KEY_SLOT,
            0x000A0002,
            "Emulated Engine Error: no key provisioned at the selected slot"
        ),
        (
            EMU_MEM_OUT_OF_RANGE,
            0x000A0003,
            "Emulated Memory Error: access outside the shared buffer region"
        ),
    ];
}

impl From<core::num::NonZeroU32> for crate::SsitError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::SsitError(val)
    }
}

impl From<SsitError> for core::num::NonZeroU32 {
    fn from(val: SsitError) -> Self {
        val.0
    }
}

impl From<SsitError> for u32 {
    fn from(val: SsitError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for SsitError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(SsitError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type SsitResult<T> = Result<T, SsitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_try_from() {
        assert!(SsitError::try_from(0).is_err());
        assert_eq!(
            Ok(SsitError::FRAME_BUFFER_OVERFLOW),
            SsitError::try_from(0x00010001)
        );
    }

    #[test]
    fn test_error_constants_uniqueness() {
        let constants = SsitError::all_constants();
        let mut error_values = HashSet::new();
        let mut duplicates = Vec::new();

        for (name, value) in constants {
            if !error_values.insert(value) {
                duplicates.push((name, value));
            }
        }

        assert!(
            duplicates.is_empty(),
            "Found duplicate error codes: {:?}",
            duplicates
        );
    }
}
