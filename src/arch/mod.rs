// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Architecture-specific execution context support
//!
//! Everything the scheduler knows about CPU state lives behind this module:
//! the saved register file of a suspended thread, the low-level switch
//! between two register files, and the synthesis of a register file for a
//! thread that has never run.

#[cfg(all(target_arch = "x86_64", unix))]
mod x86_64;

#[cfg(all(target_arch = "x86_64", unix))]
pub use x86_64::{switch, Context};

#[cfg(not(all(target_arch = "x86_64", unix)))]
compile_error!("uthreads currently supports x86_64 Unix targets only");
