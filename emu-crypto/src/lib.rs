/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the emulated crypto and shared-memory
    back ends used to test the SSIT message transport off-target.

--*/

mod gcm;
mod mem;

pub use gcm::{EmuAesGcm, SharedKeyTable, NUM_KEY_SLOTS};
pub use mem::EmuSharedMem;
