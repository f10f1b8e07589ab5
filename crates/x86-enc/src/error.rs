//! Error types for instruction encoding.

use core::fmt;

use crate::ir::Mnemonic;

/// Encoding error.
///
/// An unresolved label is deliberately *not* an error: it only raises the
/// encoding context's `needs_extra_pass` flag so that an outer multi-pass
/// driver can retry once more label positions are known.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodeError {
    /// The fully built request was rejected by the low-level opcode encoder
    /// (bad operand/size/register/mode combination).  Not retried.
    ImpossibleInstruction {
        /// The mnemonic that could not be encoded.
        mnemonic: Mnemonic,
        /// Description of why the request was rejected.
        detail: &'static str,
    },

    /// Neither the short (rel8) nor the near (rel32) branch form can reach
    /// the target from the current address.
    BranchOutOfRange {
        /// Virtual address of the branch instruction.
        address: u64,
        /// Resolved target address.
        target: u64,
    },

    /// The self-referential length iteration did not stabilize within the
    /// allowed number of re-encode passes.  This indicates a logic defect,
    /// not a normal user-facing failure.
    ConvergenceLimit {
        /// Maximum number of re-encode passes allowed.
        max: u32,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::ImpossibleInstruction { mnemonic, detail } => {
                write!(f, "impossible instruction '{}': {}", mnemonic, detail)
            }
            EncodeError::BranchOutOfRange { address, target } => {
                write!(
                    f,
                    "branch target 0x{:X} unreachable from 0x{:X} (no rel8/rel32 form fits)",
                    target, address
                )
            }
            EncodeError::ConvergenceLimit { max } => {
                write!(
                    f,
                    "instruction length did not converge within {} re-encode passes",
                    max
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}
