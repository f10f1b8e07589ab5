//! # x86-enc — Position-Dependent x86/x86-64 Instruction Encoding
//!
//! `x86-enc` encodes one abstract instruction at a time into machine-code
//! bytes, handling everything that depends on *where* the instruction lives:
//! label resolution, short/near branch form selection, RIP-relative
//! displacement arithmetic, and relocation records for anything that cannot
//! be settled locally.
//!
//! ## Quick Start
//!
//! ```rust
//! use x86_enc::{encode, Attribs, MachineMode, Mnemonic, Operand, Register};
//!
//! let enc = encode(
//!     MachineMode::Long64,
//!     Attribs::NONE,
//!     Mnemonic::Mov,
//!     &[Operand::Register(Register::Eax), Operand::Immediate(60)],
//! )
//! .unwrap();
//! assert_eq!(&*enc.bytes, &[0xB8, 0x3C, 0x00, 0x00, 0x00]);
//! ```
//!
//! With a virtual address and a label table, branches pick the smallest form
//! that reaches the target:
//!
//! ```rust
//! use x86_enc::{
//!     encode_with_context, EncoderContext, Instruction, LabelId, LabelResolver, MachineMode,
//!     Mnemonic, Operand,
//! };
//!
//! struct Table;
//! impl LabelResolver for Table {
//!     fn resolve(&self, label: LabelId) -> Option<u64> {
//!         (label == LabelId(0)).then_some(0x1010)
//!     }
//! }
//!
//! let table = Table;
//! let mut ctx = EncoderContext::new(0x1000, &table);
//! let jmp = Instruction::new(Mnemonic::Jmp).with_operand(Operand::Label(LabelId(0)));
//! let enc = encode_with_context(&mut ctx, MachineMode::Long64, &jmp).unwrap();
//! assert_eq!(&*enc.bytes, &[0xEB, 0x0E]); // short form, 14 bytes ahead
//! ```
//!
//! ## Features
//!
//! - **Pure Rust** — no C/C++ FFI, no external encoder library.
//! - **`no_std` + `alloc`** — embeddable in firmware, kernels, WASM.
//! - **Deterministic** — identical inputs always produce identical bytes.
//! - **Multi-pass friendly** — unresolved labels encode with worst-case
//!   placeholders and flag the context for another layout pass instead of
//!   failing.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An instruction encoder intentionally performs many narrowing /
// sign-changing casts between integer widths (i64→u8, u64→i64, etc.) and
// uses dense hex literals without separators (0xFFD0, 0x0F3A).  The lints
// below are expected and acceptable in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::bool_to_int_with_if,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::semicolon_if_nothing_returned,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::fn_params_excessive_bools,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::unnecessary_wraps,
    clippy::unused_self,
    clippy::map_unwrap_or,
    clippy::many_single_char_names,
    clippy::redundant_else,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// Position-dependent encoding: label resolution, branch form selection,
/// RIP-relative displacements, relocations, and the fixed-point length loop.
pub mod encoder;
/// Error types.
pub mod error;
/// Intermediate representation: registers, operands, instructions.
pub mod ir;
pub(crate) mod x86;

// Re-exports
pub use encoder::{
    branch_variants, encode, encode_with_context, BranchVariants, EncodedInstr, EncoderContext,
    InstrBytes, LabelResolver, RelocKind, RelocTarget, Relocation, MAX_INSTR_LEN,
    MAX_LENGTH_PASSES,
};
pub use error::EncodeError;
pub use ir::{
    Attribs, Instruction, LabelId, MachineMode, MemOperand, Mnemonic, Operand, OperandList,
    OperandVisibility, Register, MAX_OPERANDS,
};
