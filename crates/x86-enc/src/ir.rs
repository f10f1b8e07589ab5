//! Data model for instruction encoding.
//!
//! These types describe one abstract machine instruction — mnemonic,
//! attribute flags, machine mode, and an ordered operand list — and serve
//! as input to the encoder pipeline.

use alloc::boxed::Box;
use core::fmt;

/// Target machine mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MachineMode {
    /// 64-bit long mode.
    Long64,
    /// 32-bit protected / compatibility mode.
    Compat32,
}

impl fmt::Display for MachineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineMode::Long64 => write!(f, "x86_64"),
            MachineMode::Compat32 => write!(f, "x86"),
        }
    }
}

/// x86/x64 register.
///
/// Covers the general-purpose, segment, and SSE/AVX registers this encoder
/// works with.  Each variant encodes its own size (see
/// [`Register::size_bits`]) and register number (see [`Register::base_code`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Register {
    // -- 64-bit general-purpose registers (RAX–R15) --
    /// RAX — 64-bit accumulator.
    Rax,
    /// RCX — 64-bit counter.
    Rcx,
    /// RDX — 64-bit data.
    Rdx,
    /// RBX — 64-bit base.
    Rbx,
    /// RSP — 64-bit stack pointer.
    Rsp,
    /// RBP — 64-bit frame pointer.
    Rbp,
    /// RSI — 64-bit source index.
    Rsi,
    /// RDI — 64-bit destination index.
    Rdi,
    /// R8–R15 — extended 64-bit registers (require REX prefix).
    R8,
    /// Extended 64-bit register.
    R9,
    /// Extended 64-bit register.
    R10,
    /// Extended 64-bit register.
    R11,
    /// Extended 64-bit register.
    R12,
    /// Extended 64-bit register.
    R13,
    /// Extended 64-bit register.
    R14,
    /// Extended 64-bit register.
    R15,
    // -- 32-bit general-purpose registers --
    /// EAX — 32-bit accumulator.
    Eax,
    /// ECX — 32-bit counter.
    Ecx,
    /// EDX — 32-bit data.
    Edx,
    /// EBX — 32-bit base.
    Ebx,
    /// ESP — 32-bit stack pointer.
    Esp,
    /// EBP — 32-bit frame pointer.
    Ebp,
    /// ESI — 32-bit source index.
    Esi,
    /// EDI — 32-bit destination index.
    Edi,
    /// R8D–R15D — low 32 bits of extended registers.
    R8d,
    /// Low 32 bits of R9.
    R9d,
    /// Low 32 bits of R10.
    R10d,
    /// Low 32 bits of R11.
    R11d,
    /// Low 32 bits of R12.
    R12d,
    /// Low 32 bits of R13.
    R13d,
    /// Low 32 bits of R14.
    R14d,
    /// Low 32 bits of R15.
    R15d,
    // -- 16-bit general-purpose registers --
    /// AX — 16-bit accumulator.
    Ax,
    /// CX — 16-bit counter.
    Cx,
    /// DX — 16-bit data.
    Dx,
    /// BX — 16-bit base.
    Bx,
    /// SP — 16-bit stack pointer.
    Sp,
    /// BP — 16-bit frame pointer.
    Bp,
    /// SI — 16-bit source index.
    Si,
    /// DI — 16-bit destination index.
    Di,
    /// R8W–R15W — low 16 bits of extended registers.
    R8w,
    /// Low 16 bits of R9.
    R9w,
    /// Low 16 bits of R10.
    R10w,
    /// Low 16 bits of R11.
    R11w,
    /// Low 16 bits of R12.
    R12w,
    /// Low 16 bits of R13.
    R13w,
    /// Low 16 bits of R14.
    R14w,
    /// Low 16 bits of R15.
    R15w,
    // -- 8-bit general-purpose registers --
    /// AL — low byte of RAX.
    Al,
    /// CL — low byte of RCX.
    Cl,
    /// DL — low byte of RDX.
    Dl,
    /// BL — low byte of RBX.
    Bl,
    /// SPL — low byte of RSP (requires REX).
    Spl,
    /// BPL — low byte of RBP (requires REX).
    Bpl,
    /// SIL — low byte of RSI (requires REX).
    Sil,
    /// DIL — low byte of RDI (requires REX).
    Dil,
    /// AH — high byte of AX (incompatible with REX prefix).
    Ah,
    /// CH — high byte of CX (incompatible with REX prefix).
    Ch,
    /// DH — high byte of DX (incompatible with REX prefix).
    Dh,
    /// BH — high byte of BX (incompatible with REX prefix).
    Bh,
    /// R8B–R15B — low byte of extended registers.
    R8b,
    /// Low byte of R9.
    R9b,
    /// Low byte of R10.
    R10b,
    /// Low byte of R11.
    R11b,
    /// Low byte of R12.
    R12b,
    /// Low byte of R13.
    R13b,
    /// Low byte of R14.
    R14b,
    /// Low byte of R15.
    R15b,
    // -- Instruction pointer --
    /// RIP — 64-bit instruction pointer (for RIP-relative addressing).
    Rip,
    // -- Segment registers --
    /// CS — code segment.
    Cs,
    /// DS — data segment.
    Ds,
    /// ES — extra segment.
    Es,
    /// FS — additional segment (used for TLS on x86-64 Linux).
    Fs,
    /// GS — additional segment (used for TLS on x86-64 Windows/macOS).
    Gs,
    /// SS — stack segment.
    Ss,
    // -- 128-bit SSE registers --
    /// XMM0 — SSE register 0.
    Xmm0,
    /// SSE register 1.
    Xmm1,
    /// SSE register 2.
    Xmm2,
    /// SSE register 3.
    Xmm3,
    /// SSE register 4.
    Xmm4,
    /// SSE register 5.
    Xmm5,
    /// SSE register 6.
    Xmm6,
    /// SSE register 7.
    Xmm7,
    /// XMM8–XMM15 — extended SSE registers (require REX/VEX prefix).
    Xmm8,
    /// Extended SSE register 9.
    Xmm9,
    /// Extended SSE register 10.
    Xmm10,
    /// Extended SSE register 11.
    Xmm11,
    /// Extended SSE register 12.
    Xmm12,
    /// Extended SSE register 13.
    Xmm13,
    /// Extended SSE register 14.
    Xmm14,
    /// Extended SSE register 15.
    Xmm15,
    // -- 256-bit AVX registers --
    /// YMM0 — AVX register 0.
    Ymm0,
    /// AVX register 1.
    Ymm1,
    /// AVX register 2.
    Ymm2,
    /// AVX register 3.
    Ymm3,
    /// AVX register 4.
    Ymm4,
    /// AVX register 5.
    Ymm5,
    /// AVX register 6.
    Ymm6,
    /// AVX register 7.
    Ymm7,
    /// YMM8–YMM15 — extended AVX registers.
    Ymm8,
    /// Extended AVX register 9.
    Ymm9,
    /// Extended AVX register 10.
    Ymm10,
    /// Extended AVX register 11.
    Ymm11,
    /// Extended AVX register 12.
    Ymm12,
    /// Extended AVX register 13.
    Ymm13,
    /// Extended AVX register 14.
    Ymm14,
    /// Extended AVX register 15.
    Ymm15,
}

impl Register {
    /// The 3-bit register encoding (bits 0-2 of the register number).
    pub fn base_code(self) -> u8 {
        use Register::*;
        match self {
            Rax | Eax | Ax | Al | R8 | R8d | R8w | R8b | Xmm0 | Xmm8 | Ymm0 | Ymm8 => 0,
            Rcx | Ecx | Cx | Cl | R9 | R9d | R9w | R9b | Xmm1 | Xmm9 | Ymm1 | Ymm9 => 1,
            Rdx | Edx | Dx | Dl | R10 | R10d | R10w | R10b | Xmm2 | Xmm10 | Ymm2 | Ymm10 => 2,
            Rbx | Ebx | Bx | Bl | R11 | R11d | R11w | R11b | Xmm3 | Xmm11 | Ymm3 | Ymm11 => 3,
            Rsp | Esp | Sp | Spl | Ah | R12 | R12d | R12w | R12b | Xmm4 | Xmm12 | Ymm4 | Ymm12 => 4,
            Rbp | Ebp | Bp | Bpl | Ch | R13 | R13d | R13w | R13b | Xmm5 | Xmm13 | Ymm5 | Ymm13 => 5,
            Rsi | Esi | Si | Sil | Dh | R14 | R14d | R14w | R14b | Xmm6 | Xmm14 | Ymm6 | Ymm14 => 6,
            Rdi | Edi | Di | Dil | Bh | R15 | R15d | R15w | R15b | Xmm7 | Xmm15 | Ymm7 | Ymm15 => 7,
            Rip => 5, // RIP-relative uses encoding 5 (mod=00, rm=101)
            Cs => 1,
            Ds => 3,
            Es => 0,
            Fs => 4,
            Gs => 5,
            Ss => 2,
        }
    }

    /// Whether this is an extended register (R8–R15 and their sub-registers,
    /// XMM8–XMM15, YMM8–YMM15) requiring REX/VEX.R or REX/VEX.B.
    pub fn is_extended(self) -> bool {
        use Register::*;
        matches!(
            self,
            R8 | R9
                | R10
                | R11
                | R12
                | R13
                | R14
                | R15
                | R8d
                | R9d
                | R10d
                | R11d
                | R12d
                | R13d
                | R14d
                | R15d
                | R8w
                | R9w
                | R10w
                | R11w
                | R12w
                | R13w
                | R14w
                | R15w
                | R8b
                | R9b
                | R10b
                | R11b
                | R12b
                | R13b
                | R14b
                | R15b
                | Xmm8
                | Xmm9
                | Xmm10
                | Xmm11
                | Xmm12
                | Xmm13
                | Xmm14
                | Xmm15
                | Ymm8
                | Ymm9
                | Ymm10
                | Ymm11
                | Ymm12
                | Ymm13
                | Ymm14
                | Ymm15
        )
    }

    /// Size of the register in bits.
    pub fn size_bits(self) -> u16 {
        use Register::*;
        match self {
            Rax | Rcx | Rdx | Rbx | Rsp | Rbp | Rsi | Rdi | R8 | R9 | R10 | R11 | R12 | R13
            | R14 | R15 | Rip => 64,
            Eax | Ecx | Edx | Ebx | Esp | Ebp | Esi | Edi | R8d | R9d | R10d | R11d | R12d
            | R13d | R14d | R15d => 32,
            Ax | Cx | Dx | Bx | Sp | Bp | Si | Di | R8w | R9w | R10w | R11w | R12w | R13w
            | R14w | R15w => 16,
            Al | Cl | Dl | Bl | Spl | Bpl | Sil | Dil | Ah | Ch | Dh | Bh | R8b | R9b | R10b
            | R11b | R12b | R13b | R14b | R15b => 8,
            Cs | Ds | Es | Fs | Gs | Ss => 16,
            Xmm0 | Xmm1 | Xmm2 | Xmm3 | Xmm4 | Xmm5 | Xmm6 | Xmm7 | Xmm8 | Xmm9 | Xmm10 | Xmm11
            | Xmm12 | Xmm13 | Xmm14 | Xmm15 => 128,
            Ymm0 | Ymm1 | Ymm2 | Ymm3 | Ymm4 | Ymm5 | Ymm6 | Ymm7 | Ymm8 | Ymm9 | Ymm10 | Ymm11
            | Ymm12 | Ymm13 | Ymm14 | Ymm15 => 256,
        }
    }

    /// Whether this register requires a REX prefix to be addressable as an
    /// 8-bit register.  SPL, BPL, SIL, DIL need REX even with W/R/X/B clear.
    pub fn requires_rex_for_byte(self) -> bool {
        use Register::*;
        matches!(self, Spl | Bpl | Sil | Dil)
    }

    /// Whether this is a high-byte register (AH, CH, DH, BH).
    /// These cannot be used together with a REX prefix.
    pub fn is_high_byte(self) -> bool {
        use Register::*;
        matches!(self, Ah | Ch | Dh | Bh)
    }

    /// Whether this is an XMM (SSE) register.
    #[must_use]
    pub fn is_xmm(self) -> bool {
        use Register::*;
        matches!(
            self,
            Xmm0 | Xmm1
                | Xmm2
                | Xmm3
                | Xmm4
                | Xmm5
                | Xmm6
                | Xmm7
                | Xmm8
                | Xmm9
                | Xmm10
                | Xmm11
                | Xmm12
                | Xmm13
                | Xmm14
                | Xmm15
        )
    }

    /// Whether this is a YMM (AVX) register.
    #[must_use]
    pub fn is_ymm(self) -> bool {
        use Register::*;
        matches!(
            self,
            Ymm0 | Ymm1
                | Ymm2
                | Ymm3
                | Ymm4
                | Ymm5
                | Ymm6
                | Ymm7
                | Ymm8
                | Ymm9
                | Ymm10
                | Ymm11
                | Ymm12
                | Ymm13
                | Ymm14
                | Ymm15
        )
    }

    /// Whether this is a segment register.
    #[must_use]
    pub fn is_segment(self) -> bool {
        use Register::*;
        matches!(self, Cs | Ds | Es | Fs | Gs | Ss)
    }
}

/// Zero-allocation lowercase rendering of a Debug name.
struct LowerWriter<'a, 'b>(&'a mut fmt::Formatter<'b>);

impl fmt::Write for LowerWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        use fmt::Write as _;
        for c in s.chars() {
            self.0.write_char(c.to_ascii_lowercase())?;
        }
        Ok(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;
        write!(LowerWriter(f), "{:?}", self)
    }
}

/// Opaque identifier of a symbolic, possibly-unresolved position.
///
/// Label ids are handed out by the surrounding assembler's label table; this
/// crate only threads them through to the [`crate::encoder::LabelResolver`]
/// and into relocation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Instruction attribute flag set.
///
/// A small hand-rolled bit set (the same zero-allocation approach as
/// [`OperandList`]).  Prefix attributes combine with `|`; the operand-size
/// hints are mutually exclusive by policy — the caller should set at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribs(u16);

impl Attribs {
    /// No attributes.
    pub const NONE: Attribs = Attribs(0);
    /// `LOCK` prefix — atomic read-modify-write.
    pub const LOCK: Attribs = Attribs(1 << 0);
    /// `REP` prefix.
    pub const REP: Attribs = Attribs(1 << 1);
    /// `REPE` / `REPZ` prefix.
    pub const REPE: Attribs = Attribs(1 << 2);
    /// `REPNE` / `REPNZ` prefix.
    pub const REPNE: Attribs = Attribs(1 << 3);
    /// `BND` prefix (MPX).
    pub const BND: Attribs = Attribs(1 << 4);
    /// `XACQUIRE` prefix (TSX).
    pub const XACQUIRE: Attribs = Attribs(1 << 5);
    /// `XRELEASE` prefix (TSX).
    pub const XRELEASE: Attribs = Attribs(1 << 6);
    /// Force an 8-bit operand size.
    pub const OPSIZE8: Attribs = Attribs(1 << 7);
    /// Force a 16-bit operand size.
    pub const OPSIZE16: Attribs = Attribs(1 << 8);
    /// Force a 32-bit operand size.
    pub const OPSIZE32: Attribs = Attribs(1 << 9);
    /// Force a 64-bit operand size.
    pub const OPSIZE64: Attribs = Attribs(1 << 10);

    /// Whether any flag in `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Attribs) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether no flag is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for Attribs {
    type Output = Attribs;
    #[inline]
    fn bitor(self, rhs: Attribs) -> Attribs {
        Attribs(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Attribs {
    #[inline]
    fn bitor_assign(&mut self, rhs: Attribs) {
        self.0 |= rhs.0;
    }
}

/// A memory (indirect) operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemOperand {
    /// Explicit operand size in bytes (0 to infer from context).
    pub size: u16,
    /// Base register (e.g., `rbp` in `[rbp+8]`).
    pub base: Option<Register>,
    /// Index register for SIB addressing (e.g., `rsi` in `[rbx+rsi*4]`).
    pub index: Option<Register>,
    /// SIB scale factor: 1, 2, 4, or 8.
    pub scale: u8,
    /// Displacement (constant offset) in bytes.
    pub disp: i64,
    /// Segment override, if any (e.g., `fs:`).
    pub segment: Option<Register>,
    /// When the displacement references a symbolic position, its label id.
    pub label: Option<LabelId>,
}

impl Default for MemOperand {
    fn default() -> Self {
        Self {
            size: 0,
            base: None,
            index: None,
            scale: 1,
            disp: 0,
            segment: None,
            label: None,
        }
    }
}

impl MemOperand {
    /// `[base]` with the given operand size in bytes.
    #[must_use]
    pub fn base(size: u16, base: Register) -> Self {
        Self {
            size,
            base: Some(base),
            ..Self::default()
        }
    }

    /// `[base + disp]` with the given operand size in bytes.
    #[must_use]
    pub fn base_disp(size: u16, base: Register, disp: i64) -> Self {
        Self {
            size,
            base: Some(base),
            disp,
            ..Self::default()
        }
    }

    /// `[label]` — displacement taken from a symbolic position.
    ///
    /// In 64-bit mode the encoder defaults this to RIP-relative addressing.
    #[must_use]
    pub fn label(size: u16, label: LabelId) -> Self {
        Self {
            size,
            label: Some(label),
            ..Self::default()
        }
    }
}

/// A single abstract operand.
///
/// Exactly one variant is active; every consumer dispatches with an
/// exhaustive `match`, so adding a variant is a compile-time-checked change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Explicit "absent operand" placeholder.
    #[default]
    None,
    /// A register operand.
    Register(Register),
    /// An immediate value.
    Immediate(i64),
    /// A reference to a symbolic, possibly-unresolved position.
    Label(LabelId),
    /// A memory (indirect) operand.
    Memory(Box<MemOperand>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => write!(f, "<none>"),
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Immediate(v) => {
                if *v < 0 {
                    write!(f, "-0x{:X}", v.wrapping_neg())
                } else {
                    write!(f, "0x{:X}", v)
                }
            }
            Operand::Label(id) => write!(f, "{}", id),
            Operand::Memory(mem) => {
                write!(f, "[")?;
                let mut parts = false;
                if let Some(base) = mem.base {
                    write!(f, "{}", base)?;
                    parts = true;
                }
                if let Some(idx) = mem.index {
                    if parts {
                        write!(f, "+")?;
                    }
                    write!(f, "{}*{}", idx, mem.scale)?;
                    parts = true;
                }
                if let Some(label) = mem.label {
                    if parts {
                        write!(f, "+")?;
                    }
                    write!(f, "{}", label)?;
                    parts = true;
                }
                if mem.disp != 0 || !parts {
                    if parts && mem.disp >= 0 {
                        write!(f, "+")?;
                    }
                    write!(f, "0x{:X}", mem.disp)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Instruction mnemonic.
///
/// A closed enum: the per-mnemonic branch-variant metadata and the low-level
/// opcode tables are both indexed by it, and exhaustive matching keeps them
/// in sync at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)] // names are the instruction-set mnemonics themselves
pub enum Mnemonic {
    Add,
    And,
    Call,
    Cmp,
    Dec,
    Inc,
    Jb,
    Jbe,
    Jcxz,
    Jecxz,
    Jl,
    Jle,
    Jmp,
    Jnb,
    Jnbe,
    Jnl,
    Jnle,
    Jno,
    Jnp,
    Jns,
    Jnz,
    Jo,
    Jp,
    Jrcxz,
    Js,
    Jz,
    Lea,
    Loop,
    Loope,
    Loopne,
    Mov,
    Nop,
    Or,
    Pop,
    Push,
    Ret,
    Sub,
    Test,
    Vblendvpd,
    Vblendvps,
    Vfmaddpd,
    Vfmaddps,
    Vfmaddsd,
    Vfmaddss,
    Vpblendvb,
    Xor,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;
        write!(LowerWriter(f), "{:?}", self)
    }
}

/// Marks whether an operand is explicit (caller-supplied) or implicit/hidden
/// (an architectural side effect the encoder must not see).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandVisibility {
    /// Caller-supplied operand, handed to the encoder.
    #[default]
    Explicit,
    /// Implicit architectural operand, excluded before encoding.
    Hidden,
}

/// Maximum number of operands per instruction request.
pub const MAX_OPERANDS: usize = 5;

/// Stack-allocated operand list (max [`MAX_OPERANDS`] entries), each tagged
/// with its visibility.  Explicit operands always form a prefix of the list;
/// hidden trailing entries carry implicit architectural operands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperandList {
    items: [Operand; MAX_OPERANDS],
    vis: [OperandVisibility; MAX_OPERANDS],
    len: u8,
}

impl OperandList {
    /// Creates a new empty operand list.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an explicit operand.
    ///
    /// # Panics
    ///
    /// Panics if the list is full.
    #[inline]
    pub fn push(&mut self, op: Operand) {
        self.push_with(op, OperandVisibility::Explicit);
    }

    /// Appends a hidden (implicit) operand.
    ///
    /// # Panics
    ///
    /// Panics if the list is full.
    #[inline]
    pub fn push_hidden(&mut self, op: Operand) {
        self.push_with(op, OperandVisibility::Hidden);
    }

    fn push_with(&mut self, op: Operand, vis: OperandVisibility) {
        assert!(
            (self.len as usize) < MAX_OPERANDS,
            "OperandList overflow: max {} operands",
            MAX_OPERANDS
        );
        self.items[self.len as usize] = op;
        self.vis[self.len as usize] = vis;
        self.len += 1;
    }

    /// Number of operands (explicit and hidden).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the operand at `index` is hidden.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self, index: usize) -> bool {
        index < self.len() && self.vis[index] == OperandVisibility::Hidden
    }

    /// All operands (explicit and hidden) as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Operand] {
        &self.items[..self.len as usize]
    }
}

impl core::ops::Index<usize> for OperandList {
    type Output = Operand;
    #[inline]
    fn index(&self, index: usize) -> &Operand {
        &self.as_slice()[index]
    }
}

/// One abstract machine instruction, ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// The operation to encode.
    pub mnemonic: Mnemonic,
    /// Attribute flags (prefixes and operand-size hints).
    pub attribs: Attribs,
    /// Ordered operand list; explicit operands form a prefix.
    pub operands: OperandList,
}

impl Instruction {
    /// Creates a new instruction with no operands and no attributes.
    #[must_use]
    pub fn new(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            attribs: Attribs::NONE,
            operands: OperandList::new(),
        }
    }

    /// Builder-style: adds an explicit operand.
    #[must_use]
    pub fn with_operand(mut self, op: Operand) -> Self {
        self.operands.push(op);
        self
    }

    /// Builder-style: adds a hidden (implicit) operand.
    #[must_use]
    pub fn with_hidden(mut self, op: Operand) -> Self {
        self.operands.push_hidden(op);
        self
    }

    /// Builder-style: sets attribute flags.
    #[must_use]
    pub fn with_attribs(mut self, attribs: Attribs) -> Self {
        self.attribs = attribs;
        self
    }
}
