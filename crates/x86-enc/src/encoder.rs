//! Position-dependent instruction encoding.
//!
//! Turns one abstract [`Instruction`] into machine-code bytes at a given
//! virtual address: resolves label references, chooses between short and
//! near relative-branch forms, computes RIP-relative displacements, and
//! emits a relocation record for anything that cannot be resolved yet.
//!
//! The address-dependent decisions here are self-referential in two ways: a
//! relative branch offset depends on the instruction's own final length, and
//! a RIP-relative displacement depends on the full instruction length
//! including its own trailing bytes.  Both are settled by a bounded
//! fixed-point iteration in [`encode_with_context`].

use crate::error::EncodeError;
use crate::ir::{
    Attribs, Instruction, LabelId, MachineMode, MemOperand, Mnemonic, Operand, MAX_OPERANDS,
};
use crate::x86::{
    self, BranchType, EncodeRequest, OperandSizeHint, PrefixFlags, ReqMem, ReqOperand,
};

use alloc::vec::Vec;

// ─── InstrBytes: stack-allocated instruction buffer ────────────────────

/// Maximum length of one x86 instruction in bytes.
pub const MAX_INSTR_LEN: usize = 15;

/// Stack-allocated instruction byte buffer — no per-instruction heap
/// allocation on the encoding hot path.  x86/x86-64 instructions are at most
/// [`MAX_INSTR_LEN`] bytes.
#[derive(Clone)]
pub struct InstrBytes {
    data: [u8; MAX_INSTR_LEN],
    len: u8,
}

impl InstrBytes {
    /// Create an empty buffer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; MAX_INSTR_LEN],
            len: 0,
        }
    }

    /// Create a buffer pre-filled from a byte slice.
    ///
    /// # Panics
    ///
    /// Panics if `src` exceeds the 15-byte capacity.
    #[inline]
    #[must_use]
    pub fn from_slice(src: &[u8]) -> Self {
        let mut buf = Self::new();
        buf.extend_from_slice(src);
        buf
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already full (15 bytes).
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < MAX_INSTR_LEN,
            "InstrBytes overflow: cannot push beyond {} bytes",
            MAX_INSTR_LEN
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Append a slice of bytes.
    ///
    /// # Panics
    ///
    /// Panics if appending would exceed the 15-byte capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let end = start + bytes.len();
        assert!(
            end <= MAX_INSTR_LEN,
            "InstrBytes overflow: {} + {} exceeds {}-byte capacity",
            start,
            bytes.len(),
            MAX_INSTR_LEN
        );
        self.data[start..end].copy_from_slice(bytes);
        self.len = end as u8;
    }

    /// Number of bytes in the buffer.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert to a heap-allocated `Vec<u8>`.
    #[inline]
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

impl Default for InstrBytes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl AsRef<[u8]> for InstrBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl core::fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for InstrBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for InstrBytes {}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<u8>> for InstrBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        **self == **other
    }
}

// ─── Relocations ───────────────────────────────────────────────────────

/// How a later patch stage must interpret the relocated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelocKind {
    /// Absolute address; patched with the label's final address.
    Abs,
    /// 32-bit relative displacement; patched once the distance is known.
    Rel32,
}

/// Which field of the instruction the relocation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelocTarget {
    /// The immediate operand carries the relocated value.
    Immediate,
    /// The memory displacement carries the relocated value.
    Memory,
}

/// A single relocation record — at most one per encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relocation {
    /// How to patch.
    pub kind: RelocKind,
    /// Which instruction field is described.
    pub target: RelocTarget,
    /// The referenced label, when the relocated value came from one.
    pub label: Option<LabelId>,
}

/// Result of encoding a single instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInstr {
    /// The machine code bytes.
    pub bytes: InstrBytes,
    /// Relocation metadata for a later patch/link stage, if any field of the
    /// instruction still refers to a not-fully-resolved address.
    pub relocation: Option<Relocation>,
}

// ─── Label resolution ──────────────────────────────────────────────────

/// Access to the surrounding assembler's label table.
///
/// The table must be read-only (or externally synchronized) for the duration
/// of an encode call; this crate performs no synchronization of its own.
pub trait LabelResolver {
    /// The label's virtual address, once layout has placed it.
    fn resolve(&self, label: LabelId) -> Option<u64>;

    /// Whether the label names a symbol defined outside the assembled unit.
    /// External labels are never locally resolvable.
    fn is_external(&self, _label: LabelId) -> bool {
        false
    }
}

/// Instruction-length feedback for the RIP-relative fixed point.
///
/// A typed sentinel rather than a reserved integer: `Pending` can never
/// collide with a legitimate length, and the retry loop's termination
/// condition is checked by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthHint {
    /// Fresh context — no length information yet.
    Unset,
    /// An operand needs the final instruction length; re-encode with it.
    Pending,
    /// Length carried over from the previous encode attempt.
    Known(u8),
}

/// Per-attempt encoding context.
///
/// Single-use: scoped to one instruction-encode attempt (including its
/// fixed-point retries) and never shared between concurrently encoded
/// instructions.
pub struct EncoderContext<'a> {
    /// Virtual address at which the instruction is being encoded.
    pub va: u64,
    /// Whether any label inside the instruction is still unresolved, so the
    /// outer driver must run another global layout pass.
    pub needs_extra_pass: bool,
    resolver: &'a dyn LabelResolver,
    instr_length: LengthHint,
}

impl<'a> EncoderContext<'a> {
    /// Create a context for encoding one instruction at `va`.
    #[must_use]
    pub fn new(va: u64, resolver: &'a dyn LabelResolver) -> Self {
        Self {
            va,
            needs_extra_pass: false,
            resolver,
            instr_length: LengthHint::Unset,
        }
    }
}

// ─── Branch-variant table ──────────────────────────────────────────────

/// Per-mnemonic relative-branch metadata.
///
/// `short_len`/`near_len` are the fixed total byte lengths of the rel8 and
/// rel32 encodings; `None` means the mnemonic has no such form (the loop
/// family is short-only, `call` is near-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchVariants {
    /// Whether the mnemonic is a control-flow transfer at all.
    pub control_flow: bool,
    /// Total instruction length of the rel8 form, if one exists.
    pub short_len: Option<u8>,
    /// Total instruction length of the rel32 form, if one exists.
    pub near_len: Option<u8>,
}

impl BranchVariants {
    const NONE: BranchVariants = BranchVariants {
        control_flow: false,
        short_len: None,
        near_len: None,
    };

    const fn new(short_len: Option<u8>, near_len: Option<u8>) -> Self {
        Self {
            control_flow: true,
            short_len,
            near_len,
        }
    }
}

/// Branch-variant lookup, indexed by mnemonic.
#[must_use]
pub const fn branch_variants(mnemonic: Mnemonic) -> BranchVariants {
    use Mnemonic::*;
    match mnemonic {
        Jmp => BranchVariants::new(Some(2), Some(5)),
        Jb | Jbe | Jl | Jle | Jnb | Jnbe | Jnl | Jnle | Jno | Jnp | Jns | Jnz | Jo | Jp | Js
        | Jz => BranchVariants::new(Some(2), Some(6)),
        Jcxz | Jecxz | Jrcxz | Loop | Loope | Loopne => BranchVariants::new(Some(2), None),
        Call => BranchVariants::new(None, Some(5)),
        _ => BranchVariants::NONE,
    }
}

// ─── Placeholder targets ───────────────────────────────────────────────

// Placeholder distance for a not-yet-resolved target.  Has to exceed the
// 16-bit range so that conservative range checks select the rel32 form.
const TEMP_REL32: u64 = 0x0012_3456;

// Placeholder for mnemonics that only have a rel8 form.
const TEMP_REL8: u64 = 0x44;

/// `target - (address + instr_len)`, the CPU's view of a relative offset.
#[inline]
fn relative_offset(address: u64, target: u64, instr_len: u8) -> i64 {
    target.wrapping_sub(address.wrapping_add(u64::from(instr_len))) as i64
}

// ─── Branch resolver ───────────────────────────────────────────────────

/// Select a branch form and compute its displacement.
///
/// Without a context (address-independent encoding, worst-case length
/// estimation) the largest available form is chosen with a placeholder
/// displacement.  With a context the short form is preferred when its rel8
/// displacement fits, then the near form; if neither fits the branch is
/// unreachable.
fn resolve_branch(
    info: &BranchVariants,
    ctx: Option<&EncoderContext<'_>>,
    target: u64,
) -> Result<(i64, BranchType), EncodeError> {
    let Some(ctx) = ctx else {
        return if info.near_len.is_some() {
            Ok((TEMP_REL32 as i64, BranchType::Near))
        } else {
            Ok((TEMP_REL8 as i64, BranchType::Short))
        };
    };

    if let Some(len) = info.short_len {
        let rel = relative_offset(ctx.va, target, len);
        if i8::try_from(rel).is_ok() {
            return Ok((rel, BranchType::Short));
        }
    }

    if let Some(len) = info.near_len {
        let rel = relative_offset(ctx.va, target, len);
        if i32::try_from(rel).is_ok() {
            return Ok((rel, BranchType::Near));
        }
    }

    Err(EncodeError::BranchOutOfRange {
        address: ctx.va,
        target,
    })
}

// ─── Attribute translation ─────────────────────────────────────────────

/// Map abstract attribute flags to the opcode encoder's prefix flags.
fn translate_attribs(attribs: Attribs) -> PrefixFlags {
    let mut flags = PrefixFlags::NONE;
    let mut translate = |attrib: Attribs, prefix: PrefixFlags| {
        if attribs.contains(attrib) {
            flags |= prefix;
        }
    };
    translate(Attribs::LOCK, PrefixFlags::LOCK);
    translate(Attribs::REP, PrefixFlags::REP);
    translate(Attribs::REPE, PrefixFlags::REPE);
    translate(Attribs::REPNE, PrefixFlags::REPNE);
    translate(Attribs::BND, PrefixFlags::BND);
    translate(Attribs::XACQUIRE, PrefixFlags::XACQUIRE);
    translate(Attribs::XRELEASE, PrefixFlags::XRELEASE);
    flags
}

/// Map the (mutually exclusive) operand-size attribute to a request hint.
/// First match wins; the translator does not validate exclusivity.
fn translate_size_hint(attribs: Attribs) -> OperandSizeHint {
    if attribs.contains(Attribs::OPSIZE8) {
        OperandSizeHint::Bits8
    } else if attribs.contains(Attribs::OPSIZE16) {
        OperandSizeHint::Bits16
    } else if attribs.contains(Attribs::OPSIZE32) {
        OperandSizeHint::Bits32
    } else if attribs.contains(Attribs::OPSIZE64) {
        OperandSizeHint::Bits64
    } else {
        OperandSizeHint::None
    }
}

// ─── Operand builder ───────────────────────────────────────────────────

/// Mutable per-call state threaded through the build of one request.
/// Exclusively owned for the duration of the encode attempt; concurrent
/// contexts for different instructions cannot interfere.
struct EncoderState<'c, 'a> {
    ctx: Option<&'c mut EncoderContext<'a>>,
    req: EncodeRequest,
    operand_index: usize,
    relocation: Option<Relocation>,
}

impl EncoderState<'_, '_> {
    /// Placeholder target for an unresolved label: far enough to force the
    /// rel32 form, or within rel8 for mnemonics that only have that form.
    fn temporary_target(&self) -> u64 {
        let info = branch_variants(self.req.mnemonic);
        let temp = if info.control_flow && info.near_len.is_none() {
            TEMP_REL8
        } else {
            TEMP_REL32
        };
        match &self.ctx {
            Some(ctx) => ctx.va.wrapping_add(temp),
            None => temp,
        }
    }

    fn build_register(&mut self, reg: crate::ir::Register) -> Result<ReqOperand, EncodeError> {
        Ok(ReqOperand::Reg { reg, is4: false })
    }

    fn build_immediate(&mut self, value: i64) -> Result<ReqOperand, EncodeError> {
        let info = branch_variants(self.req.mnemonic);
        let mut imm = value;

        // Operand 0 of a control-flow mnemonic is an absolute target address.
        if self.operand_index == 0 && info.control_flow {
            let (rel, branch) = resolve_branch(&info, self.ctx.as_deref(), value as u64)?;
            imm = rel;
            self.req.branch = branch;
        }

        Ok(ReqOperand::Imm(imm))
    }

    fn build_label(&mut self, label: LabelId) -> Result<ReqOperand, EncodeError> {
        let mut external = false;
        let mut label_va = None;

        if let Some(ctx) = self.ctx.as_deref_mut() {
            external = ctx.resolver.is_external(label);
            if !external {
                label_va = ctx.resolver.resolve(label);
                if label_va.is_none() {
                    ctx.needs_extra_pass = true;
                }
            }
        }

        let info = branch_variants(self.req.mnemonic);
        let mut imm;

        if self.operand_index == 0 && info.control_flow {
            let target = label_va.unwrap_or_else(|| self.temporary_target());
            let (rel, branch) = resolve_branch(&info, self.ctx.as_deref(), target)?;
            imm = rel;
            self.req.branch = branch;

            // The distance to an external target is unknowable until link
            // time; always hand the patch stage a rel32 record for it.
            if external {
                self.relocation = Some(Relocation {
                    kind: RelocKind::Rel32,
                    target: RelocTarget::Immediate,
                    label: Some(label),
                });
            }
        } else {
            // Plain immediate use of the label's address.
            imm = self.temporary_target() as i64;
            if let Some(va) = label_va {
                imm = va as i64;
            }

            // Only a register-destination data-move is relocatable here.
            if self.req.mnemonic == Mnemonic::Mov
                && matches!(self.req.operands[0], ReqOperand::Reg { .. })
            {
                self.relocation = Some(Relocation {
                    kind: RelocKind::Abs,
                    target: RelocTarget::Immediate,
                    label: Some(label),
                });
            }
        }

        Ok(ReqOperand::Imm(imm))
    }

    fn build_memory(&mut self, mem: &MemOperand) -> Result<ReqOperand, EncodeError> {
        let mut disp = mem.disp;
        let address = self.ctx.as_deref().map_or(0, |ctx| ctx.va);

        let mut using_label = false;
        let mut external = false;

        if let Some(label) = mem.label {
            if let Some(ctx) = self.ctx.as_deref_mut() {
                external = ctx.resolver.is_external(label);
                if let Some(va) = ctx.resolver.resolve(label) {
                    disp = disp.wrapping_add(va as i64);
                } else {
                    disp = disp.wrapping_add(TEMP_REL32 as i64);
                    if !external {
                        ctx.needs_extra_pass = true;
                    }
                }
            } else {
                disp = disp.wrapping_add(TEMP_REL32 as i64);
            }
            using_label = true;
        }

        let mut base = mem.base;
        let index = mem.index;

        // In 64-bit mode a label with no base/index defaults to RIP-relative
        // addressing — the position-independent choice.
        if self.req.mode == MachineMode::Long64 && base.is_none() && index.is_none() && using_label
        {
            base = Some(crate::ir::Register::Rip);
        }

        if base.is_none() && index.is_none() {
            // Pure absolute addressing — always needs a patch once the final
            // load address is known.
            self.relocation = Some(Relocation {
                kind: RelocKind::Abs,
                target: RelocTarget::Memory,
                label: if using_label { mem.label } else { None },
            });
        } else if base == Some(crate::ir::Register::Rip) {
            // The exact instruction length is required to encode this
            // correctly; request a re-encode if it is not known yet.
            let instr_len = match self.ctx.as_deref().map(|ctx| ctx.instr_length) {
                Some(LengthHint::Known(len)) => len,
                _ => 0,
            };
            if let Some(ctx) = self.ctx.as_deref_mut() {
                if ctx.instr_length == LengthHint::Unset {
                    ctx.instr_length = LengthHint::Pending;
                }
            }

            disp = disp.wrapping_sub(address.wrapping_add(u64::from(instr_len)) as i64);

            if external {
                self.relocation = Some(Relocation {
                    kind: RelocKind::Rel32,
                    target: RelocTarget::Memory,
                    label: mem.label,
                });
            }
        }

        // FS/GS segment overrides ride on the request, not the operand.
        match mem.segment {
            Some(crate::ir::Register::Fs) => self.req.prefixes |= PrefixFlags::SEG_FS,
            Some(crate::ir::Register::Gs) => self.req.prefixes |= PrefixFlags::SEG_GS,
            _ => {}
        }

        Ok(ReqOperand::Mem(ReqMem {
            base,
            index,
            scale: mem.scale,
            size: mem.size,
            disp,
        }))
    }

    fn build_operand(&mut self, src: &Operand) -> Result<ReqOperand, EncodeError> {
        match src {
            Operand::None => Ok(ReqOperand::Unused),
            Operand::Register(reg) => self.build_register(*reg),
            Operand::Immediate(value) => self.build_immediate(*value),
            Operand::Label(label) => self.build_label(*label),
            Operand::Memory(mem) => self.build_memory(mem),
        }
    }
}

// ─── Four-operand fixup ────────────────────────────────────────────────

/// Mark the extended (`is4`) register selector for the VEX blend/FMA family.
///
/// These mnemonics take four operands where either operand 2 or operand 3 is
/// the 4-bit register selector encoded in the immediate byte; which one is
/// ambiguous to the opcode encoder when the other is a memory operand, so it
/// is resolved here after all operands are built.
fn fixup_is4_operands(req: &mut EncodeRequest) {
    use Mnemonic::*;
    match req.mnemonic {
        Vblendvpd | Vblendvps | Vpblendvb | Vfmaddpd | Vfmaddps | Vfmaddsd | Vfmaddss => {}
        _ => return,
    }

    let reg2 = matches!(req.operands[2], ReqOperand::Reg { .. });
    let mem2 = matches!(req.operands[2], ReqOperand::Mem(_));
    let reg3 = matches!(req.operands[3], ReqOperand::Reg { .. });
    let mem3 = matches!(req.operands[3], ReqOperand::Mem(_));

    if reg2 && mem3 {
        if let ReqOperand::Reg { is4, .. } = &mut req.operands[2] {
            *is4 = true;
        }
    } else if (reg2 && reg3) || (mem2 && reg3) {
        if let ReqOperand::Reg { is4, .. } = &mut req.operands[3] {
            *is4 = true;
        }
    }
}

// ─── Encode pipeline ───────────────────────────────────────────────────

/// One full build-and-encode attempt.
fn encode_pass(
    ctx: Option<&mut EncoderContext<'_>>,
    mode: MachineMode,
    attribs: Attribs,
    mnemonic: Mnemonic,
    operands: &[Operand],
) -> Result<EncodedInstr, EncodeError> {
    let mut state = EncoderState {
        ctx,
        req: EncodeRequest::new(mode, mnemonic),
        operand_index: 0,
        relocation: None,
    };
    state.req.prefixes = translate_attribs(attribs);
    state.req.size_hint = translate_size_hint(attribs);

    let count = operands.len().min(MAX_OPERANDS);
    for (index, operand) in operands.iter().take(count).enumerate() {
        state.operand_index = index;
        state.req.operands[index] = state.build_operand(operand)?;
        state.req.operand_count += 1;
    }

    fixup_is4_operands(&mut state.req);

    let bytes = x86::encode_request(&state.req)?;
    Ok(EncodedInstr {
        bytes,
        relocation: state.relocation,
    })
}

/// Maximum number of fixed-point re-encode passes before giving up.
/// Only a handful of discrete lengths exist for a given mnemonic/operand
/// shape, so a correct implementation converges well inside this bound.
pub const MAX_LENGTH_PASSES: u32 = 4;

/// Encode without an address context.
///
/// Used for address-independent instructions and for worst-case length
/// estimation during layout: branches take their largest available form with
/// a placeholder displacement, and labels stand in as placeholder values.
/// Identical inputs always produce byte-identical output.
///
/// # Errors
///
/// Returns [`EncodeError::ImpossibleInstruction`] if the opcode encoder
/// rejects the operand combination.
pub fn encode(
    mode: MachineMode,
    attribs: Attribs,
    mnemonic: Mnemonic,
    operands: &[Operand],
) -> Result<EncodedInstr, EncodeError> {
    encode_pass(None, mode, attribs, mnemonic, operands)
}

/// Encode one instruction at the context's virtual address.
///
/// Only the explicit operand prefix of the instruction's operand list is
/// encoded; trailing hidden (implicit) operands are excluded.  If any label
/// in the instruction is still unresolved, the call succeeds with placeholder
/// values and sets `ctx.needs_extra_pass` so the outer driver knows to run
/// another layout pass.
///
/// A RIP-relative memory operand needs the final instruction length for its
/// displacement; when that length is not known yet the pipeline is re-run
/// with the previous attempt's length fed back in, until the length
/// stabilizes (bounded by [`MAX_LENGTH_PASSES`]).
///
/// # Errors
///
/// [`EncodeError::ImpossibleInstruction`] for rejected operand combinations,
/// [`EncodeError::BranchOutOfRange`] when no branch form reaches the target,
/// and [`EncodeError::ConvergenceLimit`] if the length iteration fails to
/// stabilize (a bug, not an input condition).  On error no bytes are
/// produced.
pub fn encode_with_context(
    ctx: &mut EncoderContext<'_>,
    mode: MachineMode,
    instr: &Instruction,
) -> Result<EncodedInstr, EncodeError> {
    // Explicit operands are a prefix of the list; stop at the first hidden one.
    let all = instr.operands.as_slice();
    let mut explicit = 0;
    for index in 0..all.len().min(MAX_OPERANDS) {
        if instr.operands.is_hidden(index) {
            break;
        }
        explicit += 1;
    }
    let operands = &all[..explicit];

    ctx.instr_length = LengthHint::Unset;
    let mut result = encode_pass(Some(&mut *ctx), mode, instr.attribs, instr.mnemonic, operands)?;

    let mut passes = 0u32;
    while ctx.instr_length == LengthHint::Pending {
        passes += 1;
        if passes > MAX_LENGTH_PASSES {
            return Err(EncodeError::ConvergenceLimit {
                max: MAX_LENGTH_PASSES,
            });
        }

        // Re-encode with the now-known size; it can change again in this
        // call (e.g. a displacement crossing a width boundary).
        let hint = result.bytes.len() as u8;
        ctx.instr_length = LengthHint::Known(hint);
        result = encode_pass(Some(&mut *ctx), mode, instr.attribs, instr.mnemonic, operands)?;

        if result.bytes.len() as u8 != hint {
            ctx.instr_length = LengthHint::Pending;
        }
    }

    Ok(result)
}
