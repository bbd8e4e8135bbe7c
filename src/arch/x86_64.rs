// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! x86_64 execution context primitive
//!
//! A suspended thread is fully described by its callee-saved registers and
//! its stack pointer; everything else is either caller-saved (already spilled
//! by the compiler around the call into [`switch`]) or lives on the thread's
//! own stack. The signal mask is deliberately not part of the register file:
//! the scheduler performs every switch with the preemption signal blocked and
//! each resume path re-enables delivery itself.

use core::arch::naked_asm;

/// Saved CPU state of a suspended thread.
///
/// Field order is load-bearing: the offsets are hard-coded in the assembly
/// of [`switch`].
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct Context {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

impl Context {
    /// Synthesize a context so that the first [`switch`] into it enters
    /// `start` at the top of `stack`, exactly as if `start` had been called.
    ///
    /// The stack top is aligned down to 16 bytes and a single synthetic
    /// return-address slot holding `start` is planted below it; when
    /// [`switch`] executes its `ret`, control pops that slot and `start`
    /// begins with the System V entry alignment (rsp ≡ 8 mod 16).
    ///
    /// The caller must keep `stack` alive and pinned for as long as this
    /// context can be switched into.
    pub fn bootstrap(stack: &mut [u8], start: extern "C" fn() -> !) -> Self {
        assert!(stack.len() >= 32, "stack too small to bootstrap");
        let top = (stack.as_mut_ptr() as usize + stack.len()) & !0xF;
        let rsp = top - 16;
        // SAFETY: rsp lies within `stack` (top is aligned down from its end)
        // and is 8-aligned, so the write stays inside the buffer.
        unsafe {
            (rsp as *mut u64).write(start as usize as u64);
        }
        Context {
            rsp: rsp as u64,
            ..Context::default()
        }
    }

    /// The saved stack pointer.
    pub fn stack_pointer(&self) -> u64 {
        self.rsp
    }
}

/// Switch execution from one context to another.
///
/// Saves the caller's callee-saved state into `from` and installs `to`.
/// The call returns only once some later `switch` names `from` as its
/// destination; a context produced by [`Context::bootstrap`] instead enters
/// its start function and never returns here.
///
/// # Safety
///
/// Both pointers must reference live, correctly initialized contexts whose
/// stacks stay allocated for the duration of the suspension, and the caller
/// must guarantee the preemption signal is blocked across the switch so the
/// scheduler cannot be re-entered mid-transfer.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_from: *mut Context, _to: *const Context) {
    naked_asm!(
        // Save callee-saved state into *_from (rdi). rsp still points at our
        // return address, so restoring it and executing `ret` resumes the
        // original caller.
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        // Install *_to (rsi) and return on the new stack.
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        "ret",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn never_runs() -> ! {
        unreachable!()
    }

    #[test]
    fn test_bootstrap_alignment() {
        let mut stack = vec![0u8; 4096];
        let ctx = Context::bootstrap(&mut stack, never_runs);
        // After `ret` pops the synthetic slot the entry point must observe
        // the System V alignment.
        assert_eq!((ctx.stack_pointer() + 8) % 16, 0);
    }

    #[test]
    fn test_bootstrap_plants_entry_address() {
        let mut stack = vec![0u8; 4096];
        let ctx = Context::bootstrap(&mut stack, never_runs);
        let slot = unsafe { (ctx.stack_pointer() as *const u64).read() };
        assert_eq!(slot, never_runs as usize as u64);
    }

    #[test]
    fn test_bootstrap_stays_inside_buffer() {
        let mut stack = vec![0u8; 4096];
        let base = stack.as_ptr() as u64;
        let len = stack.len() as u64;
        let ctx = Context::bootstrap(&mut stack, never_runs);
        assert!(ctx.stack_pointer() >= base);
        assert!(ctx.stack_pointer() < base + len);
    }
}
