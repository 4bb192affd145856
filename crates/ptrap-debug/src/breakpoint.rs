//! Software breakpoint slots.

use ptrap_platform::{ProcessControl, ProcessError};
use ptrap_wire::MAX_BREAKPOINTS;
use tracing::{debug, warn};

/// The x86 `int3` opcode written over the patched byte.
pub const TRAP_OPCODE: u8 = 0xCC;

/// One breakpoint slot.
///
/// A disabled slot always has `address == 0`; `original_byte` is only
/// meaningful while the slot is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breakpoint {
    pub enabled: bool,
    pub address: u64,
    pub original_byte: u8,
}

/// The fixed set of breakpoint slots of a session.
#[derive(Debug, Clone)]
pub struct BreakpointTable {
    slots: [Breakpoint; MAX_BREAKPOINTS],
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self {
            slots: [Breakpoint::default(); MAX_BREAKPOINTS],
        }
    }

    pub fn get(&self, index: usize) -> Option<&Breakpoint> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Breakpoint] {
        &self.slots
    }

    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|b| b.enabled).count()
    }

    /// Original byte recorded by another enabled slot at `address`.
    fn shared_original(&self, address: u64, except: usize) -> Option<u8> {
        self.slots
            .iter()
            .enumerate()
            .find(|&(i, b)| i != except && b.enabled && b.address == address)
            .map(|(_, b)| b.original_byte)
    }

    /// Arm slot `index` at `address`.
    ///
    /// Re-enabling at the same address does nothing. Re-enabling at a
    /// different address moves the slot. An address already patched by
    /// another slot reuses that slot's original byte.
    pub fn enable(
        &mut self,
        control: &mut dyn ProcessControl,
        pid: u32,
        index: usize,
        address: u64,
    ) -> Result<(), ProcessError> {
        let current = self.slots[index];
        if current.enabled {
            if current.address == address {
                return Ok(());
            }
            self.disable(control, pid, index)?;
        }

        let original_byte = match self.shared_original(address, index) {
            Some(byte) => byte,
            None => {
                let mut byte = [0u8; 1];
                control.read_memory(pid, address, &mut byte)?;
                control.write_memory(pid, address, &[TRAP_OPCODE])?;
                byte[0]
            }
        };
        self.slots[index] = Breakpoint {
            enabled: true,
            address,
            original_byte,
        };
        debug!(index, address = format_args!("{address:#x}"), "breakpoint set");
        Ok(())
    }

    /// Disarm slot `index`, restoring the original byte unless another
    /// enabled slot still covers the address. Disabled slots are left
    /// alone.
    pub fn disable(
        &mut self,
        control: &mut dyn ProcessControl,
        pid: u32,
        index: usize,
    ) -> Result<(), ProcessError> {
        let current = self.slots[index];
        if !current.enabled {
            return Ok(());
        }
        if self.shared_original(current.address, index).is_none() {
            control.write_memory(pid, current.address, &[current.original_byte])?;
        }
        self.slots[index] = Breakpoint::default();
        debug!(index, address = format_args!("{:#x}", current.address), "breakpoint cleared");
        Ok(())
    }

    /// Restore every patched byte and clear all slots, ignoring errors.
    pub fn restore_all(&mut self, control: &mut dyn ProcessControl, pid: u32) {
        for index in 0..MAX_BREAKPOINTS {
            if let Err(e) = self.disable(control, pid, index) {
                let bp = self.slots[index];
                warn!(index, address = format_args!("{:#x}", bp.address), error = %e, "breakpoint restore failed");
                self.slots[index] = Breakpoint::default();
            }
        }
    }
}
