/*++

Licensed under the Apache-2.0 license.

File Name:

    mem.rs

Abstract:

    File contains an emulated inter-die shared buffer memory. Clones share
    the same backing storage, so a master and a slave transport under test
    see the same bytes.

--*/

use ssit_comm::SharedBufferMem;
use ssit_error::{SsitError, SsitResult};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub struct EmuSharedMem {
    base: u32,
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl EmuSharedMem {
    pub fn new(base: u32, size: usize) -> EmuSharedMem {
        EmuSharedMem {
            base,
            bytes: Rc::new(RefCell::new(vec![0u8; size])),
        }
    }

    fn range(&self, addr: u32, len: usize) -> SsitResult<core::ops::Range<usize>> {
        let start = addr
            .checked_sub(self.base)
            .ok_or(SsitError::EMU_MEM_OUT_OF_RANGE)? as usize;
        let end = start
            .checked_add(len)
            .ok_or(SsitError::EMU_MEM_OUT_OF_RANGE)?;
        if end > self.bytes.borrow().len() {
            return Err(SsitError::EMU_MEM_OUT_OF_RANGE);
        }
        Ok(start..end)
    }
}

impl SharedBufferMem for EmuSharedMem {
    fn write(&mut self, addr: u32, data: &[u8]) -> SsitResult<()> {
        let range = self.range(addr, data.len())?;
        self.bytes.borrow_mut()[range].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, addr: u32, out: &mut [u8]) -> SsitResult<()> {
        let range = self.range(addr, out.len())?;
        out.copy_from_slice(&self.bytes.borrow()[range]);
        Ok(())
    }
}
