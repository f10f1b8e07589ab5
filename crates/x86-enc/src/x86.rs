//! Low-level opcode encoding.
//!
//! This module turns a fully resolved [`EncodeRequest`] — mnemonic, prefix
//! flags, operands with all label/displacement arithmetic already done — into
//! machine-code bytes.  It knows opcode tables, REX/VEX prefixes, ModR/M and
//! SIB layout, but nothing about labels, virtual addresses, or relocations;
//! that is the job of [`crate::encoder`].

use crate::encoder::{InstrBytes, MAX_INSTR_LEN};
use crate::error::EncodeError;
use crate::ir::{MachineMode, Mnemonic, Register, MAX_OPERANDS};

// ─── Request model ─────────────────────────────────────────────────────

/// Selected relative-branch form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BranchType {
    /// Not a relative branch, or no preference.
    #[default]
    None,
    /// rel8 form.
    Short,
    /// rel32 form.
    Near,
}

/// Legacy prefix request flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct PrefixFlags(u16);

impl PrefixFlags {
    pub(crate) const NONE: PrefixFlags = PrefixFlags(0);
    pub(crate) const LOCK: PrefixFlags = PrefixFlags(1 << 0);
    pub(crate) const REP: PrefixFlags = PrefixFlags(1 << 1);
    pub(crate) const REPE: PrefixFlags = PrefixFlags(1 << 2);
    pub(crate) const REPNE: PrefixFlags = PrefixFlags(1 << 3);
    pub(crate) const BND: PrefixFlags = PrefixFlags(1 << 4);
    pub(crate) const XACQUIRE: PrefixFlags = PrefixFlags(1 << 5);
    pub(crate) const XRELEASE: PrefixFlags = PrefixFlags(1 << 6);
    pub(crate) const SEG_FS: PrefixFlags = PrefixFlags(1 << 7);
    pub(crate) const SEG_GS: PrefixFlags = PrefixFlags(1 << 8);

    #[inline]
    pub(crate) const fn contains(self, other: PrefixFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl core::ops::BitOr for PrefixFlags {
    type Output = PrefixFlags;
    #[inline]
    fn bitor(self, rhs: PrefixFlags) -> PrefixFlags {
        PrefixFlags(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for PrefixFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: PrefixFlags) {
        self.0 |= rhs.0;
    }
}

/// Caller-forced operand size, for forms where no register pins it down
/// (memory destination with an immediate source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum OperandSizeHint {
    #[default]
    None,
    Bits8,
    Bits16,
    Bits32,
    Bits64,
}

impl OperandSizeHint {
    /// Hinted size in bits, 0 when unset.
    #[inline]
    pub(crate) fn bits(self) -> u8 {
        match self {
            OperandSizeHint::None => 0,
            OperandSizeHint::Bits8 => 8,
            OperandSizeHint::Bits16 => 16,
            OperandSizeHint::Bits32 => 32,
            OperandSizeHint::Bits64 => 64,
        }
    }
}

/// A resolved memory operand: registers, scale, and a final displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReqMem {
    pub base: Option<Register>,
    pub index: Option<Register>,
    pub scale: u8,
    /// Operand size in bytes (0 to infer).
    pub size: u16,
    pub disp: i64,
}

/// A resolved operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ReqOperand {
    #[default]
    Unused,
    Reg {
        reg: Register,
        /// Encoded in the trailing immediate byte (VEX four-operand forms)
        /// instead of a ModR/M field.
        is4: bool,
    },
    Imm(i64),
    Mem(ReqMem),
}

/// One fully resolved instruction, ready for opcode selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodeRequest {
    pub mode: MachineMode,
    pub mnemonic: Mnemonic,
    pub prefixes: PrefixFlags,
    pub size_hint: OperandSizeHint,
    pub branch: BranchType,
    pub operands: [ReqOperand; MAX_OPERANDS],
    pub operand_count: u8,
}

impl EncodeRequest {
    pub(crate) fn new(mode: MachineMode, mnemonic: Mnemonic) -> Self {
        Self {
            mode,
            mnemonic,
            prefixes: PrefixFlags::NONE,
            size_hint: OperandSizeHint::None,
            branch: BranchType::None,
            operands: [ReqOperand::Unused; MAX_OPERANDS],
            operand_count: 0,
        }
    }
}

#[inline]
fn invalid(mnemonic: Mnemonic, detail: &'static str) -> EncodeError {
    EncodeError::ImpossibleInstruction { mnemonic, detail }
}

// ─── REX / ModR/M / SIB helpers ────────────────────────────────────────

/// Build a REX prefix byte.
#[inline]
fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    let mut val: u8 = 0x40;
    if w {
        val |= 0x08;
    }
    if r {
        val |= 0x04;
    }
    if x {
        val |= 0x02;
    }
    if b {
        val |= 0x01;
    }
    val
}

/// Whether a REX prefix with at least one flag is needed.
#[inline]
fn needs_rex(w: bool, r: bool, x: bool, b: bool) -> bool {
    w || r || x || b
}

/// Build ModR/M byte.
#[inline]
fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Build SIB byte.
#[inline]
fn sib(scale: u8, index: u8, base: u8) -> u8 {
    let ss = match scale {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        _ => 0,
    };
    (ss << 6) | ((index & 7) << 3) | (base & 7)
}

/// Get the operand size from a register as u8 (GP registers only).
#[inline]
fn reg_size(reg: Register) -> u8 {
    let s = reg.size_bits();
    debug_assert!(s <= 128, "reg_size() used on vector register wider than u8");
    s as u8
}

/// Reject registers that a 32-bit code segment cannot address.
fn check_mode_regs(
    mode: MachineMode,
    mnemonic: Mnemonic,
    regs: &[Register],
) -> Result<(), EncodeError> {
    if mode == MachineMode::Long64 {
        return Ok(());
    }
    for reg in regs {
        if *reg == Register::Rip {
            continue; // validated where RIP addressing is formed
        }
        if reg.is_extended() || reg.requires_rex_for_byte() {
            return Err(invalid(mnemonic, "register requires a REX prefix, which does not exist in 32-bit mode"));
        }
        if reg.size_bits() == 64 && !reg.is_segment() {
            return Err(invalid(mnemonic, "64-bit register is not addressable in 32-bit mode"));
        }
    }
    Ok(())
}

/// Reject high-byte registers (AH, CH, DH, BH) combined with any operand
/// that forces a REX prefix.  A REX byte repurposes register codes 4-7 from
/// AH/CH/DH/BH to SPL/BPL/SIL/DIL, so the two cannot coexist.
fn check_high_byte_rex_conflict(
    mnemonic: Mnemonic,
    regs: &[Register],
) -> Result<(), EncodeError> {
    let has_high = regs.iter().any(|r| r.is_high_byte());
    let forces_rex = regs
        .iter()
        .any(|r| r.is_extended() || r.requires_rex_for_byte() || r.size_bits() == 64);
    if has_high && forces_rex {
        return Err(invalid(
            mnemonic,
            "high-byte register cannot be combined with a REX-requiring operand",
        ));
    }
    Ok(())
}

/// Emit ModR/M + SIB + displacement for a memory operand.
fn emit_mem_modrm(
    buf: &mut InstrBytes,
    mode: MachineMode,
    mnemonic: Mnemonic,
    reg_field: u8,
    mem: &ReqMem,
) -> Result<(), EncodeError> {
    let base = mem.base;
    let index = mem.index;
    let disp = mem.disp;

    if index.is_some() && !matches!(mem.scale, 1 | 2 | 4 | 8) {
        return Err(invalid(mnemonic, "sib scale must be 1, 2, 4, or 8"));
    }

    // RIP-relative addressing: [rip + disp32]
    if base == Some(Register::Rip) && index.is_none() {
        if mode != MachineMode::Long64 {
            return Err(invalid(mnemonic, "rip-relative addressing requires 64-bit mode"));
        }
        buf.push(modrm(0b00, reg_field, 0b101));
        buf.extend_from_slice(&(disp as i32).to_le_bytes());
        return Ok(());
    }

    // Absolute address / displacement only: [disp32]
    if base.is_none() && index.is_none() {
        match mode {
            // 64-bit mode needs SIB to get a plain disp32 (mod=00, r/m=101
            // means rip-relative there).
            MachineMode::Long64 => {
                buf.push(modrm(0b00, reg_field, 0b100));
                buf.push(sib(1, 0b100, 0b101));
            }
            MachineMode::Compat32 => {
                buf.push(modrm(0b00, reg_field, 0b101));
            }
        }
        buf.extend_from_slice(&(disp as i32).to_le_bytes());
        return Ok(());
    }

    // SIB index-only: [index*scale + disp32] — no base register.
    // Must use mod=00, base=101 (means "no base, disp32 follows").
    if let (None, Some(idx_reg)) = (base, index) {
        buf.push(modrm(0b00, reg_field, 0b100));
        buf.push(sib(mem.scale, idx_reg.base_code(), 0b101));
        buf.extend_from_slice(&(disp as i32).to_le_bytes());
        return Ok(());
    }

    // Every remaining path has a base register: displacement-only and
    // index-only both returned early above.
    let Some(base) = base else {
        return Err(invalid(mnemonic, "memory operand has no addressable form"));
    };

    // RSP/R12 as base always need SIB
    let need_sib = index.is_some() || base.base_code() == 4;

    let (mod_bits, disp_size) = if disp == 0 && base.base_code() != 5 {
        // mod=00, no displacement (unless base is RBP/R13)
        (0b00, 0)
    } else if (-128..=127).contains(&disp) {
        (0b01, 1)
    } else {
        (0b10, 4)
    };

    if need_sib {
        let idx_reg = index.unwrap_or(Register::Rsp); // 0b100 = no index
        buf.push(modrm(mod_bits, reg_field, 0b100));
        buf.push(sib(mem.scale, idx_reg.base_code(), base.base_code()));
    } else {
        buf.push(modrm(mod_bits, reg_field, base.base_code()));
    }

    match disp_size {
        1 => buf.push(disp as i8 as u8),
        4 => buf.extend_from_slice(&(disp as i32).to_le_bytes()),
        _ => {}
    }

    Ok(())
}

/// Emit REX prefix (64-bit mode) plus operand-size prefix for a reg+mem
/// operation.
fn emit_rex_for_reg_mem(
    buf: &mut InstrBytes,
    mode: MachineMode,
    mnemonic: Mnemonic,
    reg: Register,
    mem: &ReqMem,
) -> Result<(), EncodeError> {
    let w = reg.size_bits() == 64;
    let r = reg.is_extended();
    let x = mem.index.is_some_and(|r| r.is_extended());
    let b = mem.base.is_some_and(|r| r.is_extended());

    if reg.size_bits() == 16 {
        buf.push(0x66);
    }

    if reg.size_bits() == 8 && reg.is_high_byte() && (x || b) {
        return Err(invalid(
            mnemonic,
            "high-byte register cannot be combined with an extended base or index register",
        ));
    }

    if mode == MachineMode::Long64 {
        let need = needs_rex(w, r, x, b) || reg.requires_rex_for_byte();
        if need {
            buf.push(rex(w, r, x, b));
        }
    }
    Ok(())
}

/// Emit REX + operand-size prefix for a /digit+mem operation (no separate
/// register operand).  `size` in bits, 0 when the default applies.
fn emit_rex_for_digit_mem(buf: &mut InstrBytes, mode: MachineMode, size: u8, mem: &ReqMem) {
    let w = size == 64;
    let x = mem.index.is_some_and(|r| r.is_extended());
    let b = mem.base.is_some_and(|r| r.is_extended());

    if size == 16 {
        buf.push(0x66);
    }
    if mode == MachineMode::Long64 && needs_rex(w, false, x, b) {
        buf.push(rex(w, false, x, b));
    }
}

/// Emit REX prefix if needed, then opcode + ModR/M for reg,reg.
/// `dst` goes in the r/m field, `src` in the reg field.
fn emit_rr(
    buf: &mut InstrBytes,
    mode: MachineMode,
    mnemonic: Mnemonic,
    opcode: &[u8],
    dst: Register,
    src: Register,
) -> Result<(), EncodeError> {
    let size = reg_size(dst);
    let w = size == 64;
    let r = src.is_extended();
    let b = dst.is_extended();

    if size == 8 {
        check_high_byte_rex_conflict(mnemonic, &[dst, src])?;
    }

    if size == 16 {
        buf.push(0x66);
    }

    if mode == MachineMode::Long64 {
        let need = needs_rex(w, r, false, b)
            || dst.requires_rex_for_byte()
            || src.requires_rex_for_byte();
        if need {
            buf.push(rex(w, r, false, b));
        }
    }

    buf.extend_from_slice(opcode);
    buf.push(modrm(0b11, src.base_code(), dst.base_code()));
    Ok(())
}

/// Emit a little-endian immediate of `size` bits.
fn emit_imm(buf: &mut InstrBytes, imm: i64, size: u8) {
    match size {
        8 => buf.push(imm as u8),
        16 => buf.extend_from_slice(&(imm as u16).to_le_bytes()),
        32 => buf.extend_from_slice(&(imm as u32).to_le_bytes()),
        64 => buf.extend_from_slice(&(imm as u64).to_le_bytes()),
        _ => {}
    }
}

/// Effective operand size in bits for mem,imm forms: the explicit hint wins,
/// then the memory operand's declared size, then the 32-bit default.
fn mem_imm_size(hint: OperandSizeHint, mem: &ReqMem) -> u8 {
    let hinted = hint.bits();
    if hinted != 0 {
        hinted
    } else if mem.size != 0 {
        (mem.size * 8).min(64) as u8
    } else {
        32
    }
}

fn collect_mem_regs(mem: &ReqMem, regs: &mut [Register; 4], count: &mut usize) {
    if let Some(base) = mem.base {
        if base != Register::Rip {
            regs[*count] = base;
            *count += 1;
        }
    }
    if let Some(index) = mem.index {
        regs[*count] = index;
        *count += 1;
    }
}

/// Mode-validate every register reachable from the operand list.
fn check_mode_operands(
    mode: MachineMode,
    mnemonic: Mnemonic,
    ops: &[ReqOperand],
) -> Result<(), EncodeError> {
    if mode == MachineMode::Long64 {
        return Ok(());
    }
    for op in ops {
        let mut regs = [Register::Rax; 4];
        let mut count = 0;
        match op {
            ReqOperand::Reg { reg, .. } => {
                regs[0] = *reg;
                count = 1;
            }
            ReqOperand::Mem(mem) => collect_mem_regs(mem, &mut regs, &mut count),
            _ => {}
        }
        check_mode_regs(mode, mnemonic, &regs[..count])?;
    }
    Ok(())
}

// ─── Legacy prefixes ───────────────────────────────────────────────────

fn emit_legacy_prefixes(buf: &mut InstrBytes, flags: PrefixFlags) {
    if flags.contains(PrefixFlags::SEG_FS) {
        buf.push(0x64);
    }
    if flags.contains(PrefixFlags::SEG_GS) {
        buf.push(0x65);
    }
    // XACQUIRE/XRELEASE must precede LOCK
    if flags.contains(PrefixFlags::XACQUIRE) {
        buf.push(0xF2);
    }
    if flags.contains(PrefixFlags::XRELEASE) {
        buf.push(0xF3);
    }
    if flags.contains(PrefixFlags::LOCK) {
        buf.push(0xF0);
    }
    if flags.contains(PrefixFlags::REP) || flags.contains(PrefixFlags::REPE) {
        buf.push(0xF3);
    }
    if flags.contains(PrefixFlags::REPNE) || flags.contains(PrefixFlags::BND) {
        buf.push(0xF2);
    }
}

// ─── Instruction encoders ──────────────────────────────────────────────

fn encode_nop(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    if !ops.is_empty() {
        return Err(invalid(req.mnemonic, "nop takes no operands"));
    }
    buf.push(0x90);
    Ok(())
}

fn encode_ret(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    match ops {
        [] => buf.push(0xC3),
        [ReqOperand::Imm(n)] if (0..=0xFFFF).contains(n) => {
            buf.push(0xC2);
            buf.extend_from_slice(&(*n as u16).to_le_bytes());
        }
        [ReqOperand::Imm(_)] => {
            return Err(invalid(req.mnemonic, "stack-adjust immediate must fit in 16 bits"))
        }
        _ => return Err(invalid(req.mnemonic, "expected 0 or 1 operands")),
    }
    Ok(())
}

fn encode_mov_reg_imm(
    buf: &mut InstrBytes,
    mnemonic: Mnemonic,
    dst: Register,
    imm: i64,
) -> Result<(), EncodeError> {
    let size = reg_size(dst);

    match size {
        8 => {
            let b = dst.is_extended();
            if b || dst.requires_rex_for_byte() {
                buf.push(rex(false, false, false, b));
            }
            buf.push(0xB0 + dst.base_code());
            buf.push(imm as u8);
        }
        16 => {
            buf.push(0x66);
            if dst.is_extended() {
                buf.push(rex(false, false, false, true));
            }
            buf.push(0xB8 + dst.base_code());
            buf.extend_from_slice(&(imm as u16).to_le_bytes());
        }
        32 => {
            if dst.is_extended() {
                buf.push(rex(false, false, false, true));
            }
            buf.push(0xB8 + dst.base_code());
            buf.extend_from_slice(&(imm as u32).to_le_bytes());
        }
        64 => {
            let b = dst.is_extended();
            if imm >= 0 && imm <= i64::from(u32::MAX) {
                // mov r32, imm32 (zero-extends to r64)
                if b {
                    buf.push(rex(false, false, false, true));
                }
                buf.push(0xB8 + dst.base_code());
                buf.extend_from_slice(&(imm as u32).to_le_bytes());
            } else if i32::try_from(imm).is_ok() {
                // mov r64, sign-extended imm32
                buf.push(rex(true, false, false, b));
                buf.push(0xC7);
                buf.push(modrm(0b11, 0, dst.base_code()));
                buf.extend_from_slice(&(imm as i32).to_le_bytes());
            } else {
                // movabs r64, imm64
                buf.push(rex(true, false, false, b));
                buf.push(0xB8 + dst.base_code());
                buf.extend_from_slice(&(imm as u64).to_le_bytes());
            }
        }
        _ => return Err(invalid(mnemonic, "unsupported register size for mov immediate")),
    }
    Ok(())
}

fn encode_mov(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    if ops.len() != 2 {
        return Err(invalid(req.mnemonic, "expected 2 operands"));
    }
    match (&ops[0], &ops[1]) {
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Reg { reg: src, .. }) => {
            let size = reg_size(*dst);
            if size != reg_size(*src) {
                return Err(invalid(req.mnemonic, "operand size mismatch"));
            }
            let opcode = if size == 8 { &[0x88u8] as &[u8] } else { &[0x89u8] };
            emit_rr(buf, req.mode, req.mnemonic, opcode, *dst, *src)?;
        }
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Imm(imm)) => {
            encode_mov_reg_imm(buf, req.mnemonic, *dst, *imm)?;
        }
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Mem(mem)) => {
            let size = reg_size(*dst);
            let opcode: u8 = if size == 8 { 0x8A } else { 0x8B };
            emit_rex_for_reg_mem(buf, req.mode, req.mnemonic, *dst, mem)?;
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, dst.base_code(), mem)?;
        }
        (ReqOperand::Mem(mem), ReqOperand::Reg { reg: src, .. }) => {
            let size = reg_size(*src);
            let opcode: u8 = if size == 8 { 0x88 } else { 0x89 };
            emit_rex_for_reg_mem(buf, req.mode, req.mnemonic, *src, mem)?;
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, src.base_code(), mem)?;
        }
        (ReqOperand::Mem(mem), ReqOperand::Imm(imm)) => {
            let size = mem_imm_size(req.size_hint, mem);
            // mov r/m64, imm32 sign-extends — reject values that don't fit
            if size == 64 && i32::try_from(*imm).is_err() {
                return Err(invalid(
                    req.mnemonic,
                    "immediate too large for mov mem, imm (max sign-extended imm32)",
                ));
            }
            let opcode: u8 = if size == 8 { 0xC6 } else { 0xC7 };
            emit_rex_for_digit_mem(buf, req.mode, size, mem);
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, 0, mem)?; // /0
            emit_imm(buf, *imm, if size > 32 { 32 } else { size });
        }
        _ => return Err(invalid(req.mnemonic, "unsupported operand combination")),
    }
    Ok(())
}

fn encode_lea(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    match ops {
        [ReqOperand::Reg { reg: dst, .. }, ReqOperand::Mem(mem)] => {
            emit_rex_for_reg_mem(buf, req.mode, req.mnemonic, *dst, mem)?;
            buf.push(0x8D);
            emit_mem_modrm(buf, req.mode, req.mnemonic, dst.base_code(), mem)
        }
        _ => Err(invalid(req.mnemonic, "expected reg, mem")),
    }
}

/// Encode the classic ALU group.
/// `alu_num` is 0=add, 1=or, 4=and, 5=sub, 6=xor, 7=cmp.
fn encode_alu(
    buf: &mut InstrBytes,
    req: &EncodeRequest,
    ops: &[ReqOperand],
    alu_num: u8,
) -> Result<(), EncodeError> {
    if ops.len() != 2 {
        return Err(invalid(req.mnemonic, "expected 2 operands"));
    }
    match (&ops[0], &ops[1]) {
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Reg { reg: src, .. }) => {
            let size = reg_size(*dst);
            if size != reg_size(*src) {
                return Err(invalid(req.mnemonic, "operand size mismatch"));
            }
            let opcode = if size == 8 { alu_num * 8 } else { alu_num * 8 + 1 };
            emit_rr(buf, req.mode, req.mnemonic, &[opcode], *dst, *src)?;
        }
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Imm(imm)) => {
            encode_alu_reg_imm(buf, req.mode, *dst, *imm, alu_num)?;
        }
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Mem(mem)) => {
            let size = reg_size(*dst);
            let opcode = if size == 8 { alu_num * 8 + 2 } else { alu_num * 8 + 3 };
            emit_rex_for_reg_mem(buf, req.mode, req.mnemonic, *dst, mem)?;
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, dst.base_code(), mem)?;
        }
        (ReqOperand::Mem(mem), ReqOperand::Reg { reg: src, .. }) => {
            let size = reg_size(*src);
            let opcode = if size == 8 { alu_num * 8 } else { alu_num * 8 + 1 };
            emit_rex_for_reg_mem(buf, req.mode, req.mnemonic, *src, mem)?;
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, src.base_code(), mem)?;
        }
        (ReqOperand::Mem(mem), ReqOperand::Imm(imm)) => {
            let size = mem_imm_size(req.size_hint, mem);
            if size == 8 {
                emit_rex_for_digit_mem(buf, req.mode, size, mem);
                buf.push(0x80);
                emit_mem_modrm(buf, req.mode, req.mnemonic, alu_num, mem)?;
                buf.push(*imm as u8);
            } else if i8::try_from(*imm).is_ok() {
                emit_rex_for_digit_mem(buf, req.mode, size, mem);
                buf.push(0x83);
                emit_mem_modrm(buf, req.mode, req.mnemonic, alu_num, mem)?;
                buf.push(*imm as i8 as u8);
            } else {
                emit_rex_for_digit_mem(buf, req.mode, size, mem);
                buf.push(0x81);
                emit_mem_modrm(buf, req.mode, req.mnemonic, alu_num, mem)?;
                emit_imm(buf, *imm, if size > 32 { 32 } else { size });
            }
        }
        _ => return Err(invalid(req.mnemonic, "unsupported operand combination")),
    }
    Ok(())
}

fn encode_alu_reg_imm(
    buf: &mut InstrBytes,
    mode: MachineMode,
    dst: Register,
    imm: i64,
    alu_num: u8,
) -> Result<(), EncodeError> {
    let size = reg_size(dst);

    // Short form: al, imm8
    if dst.base_code() == 0 && !dst.is_extended() && size == 8 {
        buf.push(alu_num * 8 + 4);
        buf.push(imm as u8);
        return Ok(());
    }

    if size == 8 {
        let b = dst.is_extended();
        if b || dst.requires_rex_for_byte() {
            buf.push(rex(false, false, false, b));
        }
        buf.push(0x80);
        buf.push(modrm(0b11, alu_num, dst.base_code()));
        buf.push(imm as u8);
    } else if i8::try_from(imm).is_ok() {
        // Sign-extended imm8
        let w = size == 64;
        let b = dst.is_extended();
        if size == 16 {
            buf.push(0x66);
        }
        if mode == MachineMode::Long64 && needs_rex(w, false, false, b) {
            buf.push(rex(w, false, false, b));
        }
        buf.push(0x83);
        buf.push(modrm(0b11, alu_num, dst.base_code()));
        buf.push(imm as i8 as u8);
    } else {
        let w = size == 64;
        let b = dst.is_extended();
        if size == 16 {
            buf.push(0x66);
        }
        if mode == MachineMode::Long64 && needs_rex(w, false, false, b) {
            buf.push(rex(w, false, false, b));
        }
        // ax/eax/rax short opcode
        if dst.base_code() == 0 && !dst.is_extended() {
            buf.push(alu_num * 8 + 5);
        } else {
            buf.push(0x81);
            buf.push(modrm(0b11, alu_num, dst.base_code()));
        }
        emit_imm(buf, imm, if size > 32 { 32 } else { size });
    }
    Ok(())
}

fn encode_test(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    if ops.len() != 2 {
        return Err(invalid(req.mnemonic, "expected 2 operands"));
    }
    match (&ops[0], &ops[1]) {
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Reg { reg: src, .. }) => {
            let size = reg_size(*dst);
            let opcode = if size == 8 { 0x84u8 } else { 0x85u8 };
            emit_rr(buf, req.mode, req.mnemonic, &[opcode], *dst, *src)?;
        }
        (ReqOperand::Reg { reg: dst, .. }, ReqOperand::Imm(imm)) => {
            let size = reg_size(*dst);
            if dst.base_code() == 0 && !dst.is_extended() && size == 8 {
                buf.push(0xA8);
                buf.push(*imm as u8);
            } else if dst.base_code() == 0 && !dst.is_extended() {
                if size == 16 {
                    buf.push(0x66);
                }
                if size == 64 {
                    buf.push(rex(true, false, false, false));
                }
                buf.push(0xA9);
                emit_imm(buf, *imm, if size > 32 { 32 } else { size });
            } else {
                let w = size == 64;
                let b = dst.is_extended();
                if size == 16 {
                    buf.push(0x66);
                }
                if req.mode == MachineMode::Long64
                    && (needs_rex(w, false, false, b) || dst.requires_rex_for_byte())
                {
                    buf.push(rex(w, false, false, b));
                }
                buf.push(if size == 8 { 0xF6 } else { 0xF7 });
                buf.push(modrm(0b11, 0, dst.base_code()));
                emit_imm(buf, *imm, if size > 32 { 32 } else { size.max(8) });
            }
        }
        (ReqOperand::Mem(mem), ReqOperand::Reg { reg: src, .. }) => {
            let size = reg_size(*src);
            let opcode = if size == 8 { 0x84u8 } else { 0x85u8 };
            emit_rex_for_reg_mem(buf, req.mode, req.mnemonic, *src, mem)?;
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, src.base_code(), mem)?;
        }
        (ReqOperand::Mem(mem), ReqOperand::Imm(imm)) => {
            let size = mem_imm_size(req.size_hint, mem);
            emit_rex_for_digit_mem(buf, req.mode, size, mem);
            buf.push(if size == 8 { 0xF6 } else { 0xF7 });
            emit_mem_modrm(buf, req.mode, req.mnemonic, 0, mem)?; // /0
            emit_imm(buf, *imm, if size > 32 { 32 } else { size });
        }
        _ => return Err(invalid(req.mnemonic, "unsupported operand combination")),
    }
    Ok(())
}

/// inc (digit 0) and dec (digit 1).
fn encode_incdec(
    buf: &mut InstrBytes,
    req: &EncodeRequest,
    ops: &[ReqOperand],
    digit: u8,
) -> Result<(), EncodeError> {
    match ops {
        [ReqOperand::Reg { reg, .. }] => {
            let size = reg_size(*reg);
            let w = size == 64;
            let b = reg.is_extended();
            if size == 16 {
                buf.push(0x66);
            }
            if req.mode == MachineMode::Long64
                && (needs_rex(w, false, false, b) || reg.requires_rex_for_byte())
            {
                buf.push(rex(w, false, false, b));
            }
            buf.push(if size == 8 { 0xFE } else { 0xFF });
            buf.push(modrm(0b11, digit, reg.base_code()));
        }
        [ReqOperand::Mem(mem)] => {
            let size = mem_imm_size(req.size_hint, mem);
            emit_rex_for_digit_mem(buf, req.mode, size, mem);
            buf.push(if size == 8 { 0xFE } else { 0xFF });
            emit_mem_modrm(buf, req.mode, req.mnemonic, digit, mem)?;
        }
        _ => return Err(invalid(req.mnemonic, "expected 1 register or memory operand")),
    }
    Ok(())
}

fn encode_push(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    let [op] = ops else {
        return Err(invalid(req.mnemonic, "expected 1 operand"));
    };
    match op {
        ReqOperand::Reg { reg, .. } => {
            match reg {
                Register::Fs => {
                    buf.extend_from_slice(&[0x0F, 0xA0]);
                    return Ok(());
                }
                Register::Gs => {
                    buf.extend_from_slice(&[0x0F, 0xA8]);
                    return Ok(());
                }
                r if r.is_segment() => {
                    return Err(invalid(req.mnemonic, "unsupported segment register push"));
                }
                _ => {}
            }
            let size = reg.size_bits();
            let valid = match req.mode {
                MachineMode::Long64 => size == 64 || size == 16,
                MachineMode::Compat32 => size == 32 || size == 16,
            };
            if !valid {
                return Err(invalid(req.mnemonic, "register size does not match stack width"));
            }
            if size == 16 {
                buf.push(0x66);
            }
            if reg.is_extended() {
                buf.push(rex(false, false, false, true));
            }
            buf.push(0x50 + reg.base_code());
        }
        ReqOperand::Imm(imm) => {
            if i8::try_from(*imm).is_ok() {
                buf.push(0x6A);
                buf.push(*imm as i8 as u8);
            } else if *imm >= i64::from(i32::MIN) && *imm <= i64::from(u32::MAX) {
                buf.push(0x68);
                buf.extend_from_slice(&(*imm as i32).to_le_bytes());
            } else {
                return Err(invalid(req.mnemonic, "immediate must fit in 32 bits"));
            }
        }
        ReqOperand::Mem(mem) => {
            // Stack-width operand size is the default — no REX.W needed.
            emit_rex_for_digit_mem(buf, req.mode, 0, mem);
            buf.push(0xFF);
            emit_mem_modrm(buf, req.mode, req.mnemonic, 6, mem)?; // /6
        }
        ReqOperand::Unused => return Err(invalid(req.mnemonic, "expected 1 operand")),
    }
    Ok(())
}

fn encode_pop(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    let [op] = ops else {
        return Err(invalid(req.mnemonic, "expected 1 operand"));
    };
    match op {
        ReqOperand::Reg { reg, .. } => {
            match reg {
                Register::Fs => {
                    buf.extend_from_slice(&[0x0F, 0xA1]);
                    return Ok(());
                }
                Register::Gs => {
                    buf.extend_from_slice(&[0x0F, 0xA9]);
                    return Ok(());
                }
                r if r.is_segment() => {
                    return Err(invalid(req.mnemonic, "unsupported segment register pop"));
                }
                _ => {}
            }
            let size = reg.size_bits();
            let valid = match req.mode {
                MachineMode::Long64 => size == 64 || size == 16,
                MachineMode::Compat32 => size == 32 || size == 16,
            };
            if !valid {
                return Err(invalid(req.mnemonic, "register size does not match stack width"));
            }
            if size == 16 {
                buf.push(0x66);
            }
            if reg.is_extended() {
                buf.push(rex(false, false, false, true));
            }
            buf.push(0x58 + reg.base_code());
        }
        ReqOperand::Mem(mem) => {
            emit_rex_for_digit_mem(buf, req.mode, 0, mem);
            buf.push(0x8F);
            emit_mem_modrm(buf, req.mode, req.mnemonic, 0, mem)?; // /0
        }
        _ => return Err(invalid(req.mnemonic, "unsupported operand")),
    }
    Ok(())
}

// ─── Control flow ──────────────────────────────────────────────────────

fn rel8_checked(req: &EncodeRequest, rel: i64) -> Result<u8, EncodeError> {
    i8::try_from(rel)
        .map(|v| v as u8)
        .map_err(|_| invalid(req.mnemonic, "displacement does not fit in rel8"))
}

fn rel32_checked(req: &EncodeRequest, rel: i64) -> Result<[u8; 4], EncodeError> {
    i32::try_from(rel)
        .map(i32::to_le_bytes)
        .map_err(|_| invalid(req.mnemonic, "displacement does not fit in rel32"))
}

fn encode_jmp(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    let [op] = ops else {
        return Err(invalid(req.mnemonic, "expected 1 operand"));
    };
    match op {
        ReqOperand::Imm(rel) => {
            if req.branch == BranchType::Short {
                buf.push(0xEB);
                buf.push(rel8_checked(req, *rel)?);
            } else {
                buf.push(0xE9);
                buf.extend_from_slice(&rel32_checked(req, *rel)?);
            }
        }
        ReqOperand::Reg { reg, .. } => {
            if req.mode == MachineMode::Long64 && reg.is_extended() {
                buf.push(rex(false, false, false, true));
            }
            buf.push(0xFF);
            buf.push(modrm(0b11, 4, reg.base_code()));
        }
        ReqOperand::Mem(mem) => {
            emit_rex_for_digit_mem(buf, req.mode, 0, mem);
            buf.push(0xFF);
            emit_mem_modrm(buf, req.mode, req.mnemonic, 4, mem)?; // /4
        }
        ReqOperand::Unused => return Err(invalid(req.mnemonic, "expected 1 operand")),
    }
    Ok(())
}

fn encode_call(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    let [op] = ops else {
        return Err(invalid(req.mnemonic, "expected 1 operand"));
    };
    match op {
        ReqOperand::Imm(rel) => {
            buf.push(0xE8);
            buf.extend_from_slice(&rel32_checked(req, *rel)?);
        }
        ReqOperand::Reg { reg, .. } => {
            if req.mode == MachineMode::Long64 && reg.is_extended() {
                buf.push(rex(false, false, false, true));
            }
            buf.push(0xFF);
            buf.push(modrm(0b11, 2, reg.base_code()));
        }
        ReqOperand::Mem(mem) => {
            emit_rex_for_digit_mem(buf, req.mode, 0, mem);
            buf.push(0xFF);
            emit_mem_modrm(buf, req.mode, req.mnemonic, 2, mem)?; // /2
        }
        ReqOperand::Unused => return Err(invalid(req.mnemonic, "expected 1 operand")),
    }
    Ok(())
}

/// Condition code nibble for the Jcc family.
fn cc_code(mnemonic: Mnemonic) -> Option<u8> {
    use Mnemonic::*;
    Some(match mnemonic {
        Jo => 0x0,
        Jno => 0x1,
        Jb => 0x2,
        Jnb => 0x3,
        Jz => 0x4,
        Jnz => 0x5,
        Jbe => 0x6,
        Jnbe => 0x7,
        Js => 0x8,
        Jns => 0x9,
        Jp => 0xA,
        Jnp => 0xB,
        Jl => 0xC,
        Jnl => 0xD,
        Jle => 0xE,
        Jnle => 0xF,
        _ => return None,
    })
}

fn encode_jcc(
    buf: &mut InstrBytes,
    req: &EncodeRequest,
    ops: &[ReqOperand],
    cc: u8,
) -> Result<(), EncodeError> {
    let [ReqOperand::Imm(rel)] = ops else {
        return Err(invalid(req.mnemonic, "expected a relative-offset operand"));
    };
    if req.branch == BranchType::Short {
        buf.push(0x70 + cc);
        buf.push(rel8_checked(req, *rel)?);
    } else {
        buf.push(0x0F);
        buf.push(0x80 + cc);
        buf.extend_from_slice(&rel32_checked(req, *rel)?);
    }
    Ok(())
}

/// loop (E2), loope (E1), loopne (E0) — rel8 only.
fn encode_loopcc(
    buf: &mut InstrBytes,
    req: &EncodeRequest,
    ops: &[ReqOperand],
    opcode: u8,
) -> Result<(), EncodeError> {
    let [ReqOperand::Imm(rel)] = ops else {
        return Err(invalid(req.mnemonic, "expected a relative-offset operand"));
    };
    buf.push(opcode);
    buf.push(rel8_checked(req, *rel)?);
    Ok(())
}

/// jcxz/jecxz/jrcxz — opcode E3 with the counter width selected by the
/// address-size prefix relative to the machine mode.
fn encode_jcxz(buf: &mut InstrBytes, req: &EncodeRequest, ops: &[ReqOperand]) -> Result<(), EncodeError> {
    let [ReqOperand::Imm(rel)] = ops else {
        return Err(invalid(req.mnemonic, "expected a relative-offset operand"));
    };
    let prefix = match (req.mode, req.mnemonic) {
        (MachineMode::Long64, Mnemonic::Jrcxz) => false,
        (MachineMode::Long64, Mnemonic::Jecxz) => true,
        (MachineMode::Long64, Mnemonic::Jcxz) => {
            return Err(invalid(req.mnemonic, "jcxz is not encodable in 64-bit mode"))
        }
        (MachineMode::Compat32, Mnemonic::Jecxz) => false,
        (MachineMode::Compat32, Mnemonic::Jcxz) => true,
        (MachineMode::Compat32, Mnemonic::Jrcxz) => {
            return Err(invalid(req.mnemonic, "jrcxz requires 64-bit mode"))
        }
        _ => return Err(invalid(req.mnemonic, "unsupported operand combination")),
    };
    if prefix {
        buf.push(0x67);
    }
    buf.push(0xE3);
    buf.push(rel8_checked(req, *rel)?);
    Ok(())
}

// ─── VEX four-operand forms ────────────────────────────────────────────

/// 0F3A-map opcode for the VEX blend/FMA4 family.
fn vex_is4_opcode(mnemonic: Mnemonic) -> Option<u8> {
    use Mnemonic::*;
    Some(match mnemonic {
        Vblendvps => 0x4A,
        Vblendvpd => 0x4B,
        Vpblendvb => 0x4C,
        Vfmaddps => 0x68,
        Vfmaddpd => 0x69,
        Vfmaddss => 0x6A,
        Vfmaddsd => 0x6B,
        _ => return None,
    })
}

/// Full 4-bit register number for VEX fields.
#[inline]
fn vex_reg_code(reg: Register) -> u8 {
    reg.base_code() | if reg.is_extended() { 8 } else { 0 }
}

/// Encode `mnemonic dst, src1, op2, op3` where one of op2/op3 carries the
/// `is4` marker and is emitted in the trailing immediate byte.  The other
/// becomes the ModR/M r/m operand; VEX.W selects which position that is.
fn encode_vex_is4(
    buf: &mut InstrBytes,
    req: &EncodeRequest,
    ops: &[ReqOperand],
    opcode: u8,
) -> Result<(), EncodeError> {
    let [ReqOperand::Reg { reg: dst, .. }, ReqOperand::Reg { reg: src1, .. }, op2, op3] = ops
    else {
        return Err(invalid(req.mnemonic, "expected 4 operands with register destination"));
    };

    let (is4_reg, rm, w) = match (op2, op3) {
        (ReqOperand::Reg { reg, is4: true }, rm) => (*reg, rm, true),
        (rm, ReqOperand::Reg { reg, is4: true }) => (*reg, rm, false),
        _ => {
            return Err(invalid(
                req.mnemonic,
                "one of the last two operands must be an extended register selector",
            ))
        }
    };

    if req.mode == MachineMode::Compat32 {
        let extended = dst.is_extended()
            || src1.is_extended()
            || is4_reg.is_extended()
            || matches!(rm, ReqOperand::Reg { reg, .. } if reg.is_extended());
        if extended {
            return Err(invalid(req.mnemonic, "extended vector register requires 64-bit mode"));
        }
    }

    let l = dst.is_ymm();
    let r = dst.is_extended();
    let vvvv = vex_reg_code(*src1);

    // Always the 3-byte C4 form: the 0F3A map is not expressible in C5.
    // byte1 = ~R ~X ~B | mmmmm (0b00011 = 0F3A)
    // byte2 = W | ~vvvv | L | pp (0b01 = implied 66)
    let emit_vex3 = |buf: &mut InstrBytes, x: bool, b: bool| {
        let byte1 = (if r { 0 } else { 0x80 })
            | (if x { 0 } else { 0x40 })
            | (if b { 0 } else { 0x20 })
            | 0b00011;
        let byte2 = (if w { 0x80 } else { 0 })
            | (((!vvvv) & 0x0F) << 3)
            | (if l { 0x04 } else { 0 })
            | 0b01;
        buf.push(0xC4);
        buf.push(byte1);
        buf.push(byte2);
    };

    match rm {
        ReqOperand::Reg { reg, .. } => {
            emit_vex3(buf, false, reg.is_extended());
            buf.push(opcode);
            buf.push(modrm(0b11, dst.base_code(), reg.base_code()));
        }
        ReqOperand::Mem(mem) => {
            let x = mem.index.is_some_and(|r| r.is_extended());
            let b = mem.base.is_some_and(|r| r.is_extended());
            emit_vex3(buf, x, b);
            buf.push(opcode);
            emit_mem_modrm(buf, req.mode, req.mnemonic, dst.base_code(), mem)?;
        }
        _ => return Err(invalid(req.mnemonic, "unsupported operand combination")),
    }

    buf.push(vex_reg_code(is4_reg) << 4);
    Ok(())
}

// ─── Dispatch ──────────────────────────────────────────────────────────

/// Encode one fully resolved request into machine code.
///
/// The opcode body is emitted into its own buffer and joined with the legacy
/// prefixes only after a combined length check: a stack of prefix flags must
/// surface [`EncodeError::ImpossibleInstruction`], not a buffer overflow.
pub(crate) fn encode_request(req: &EncodeRequest) -> Result<InstrBytes, EncodeError> {
    let mut buf = InstrBytes::new();
    emit_legacy_prefixes(&mut buf, req.prefixes);

    let ops = &req.operands[..usize::from(req.operand_count)];
    check_mode_operands(req.mode, req.mnemonic, ops)?;

    let mut body = InstrBytes::new();

    use Mnemonic::*;
    match req.mnemonic {
        Nop => encode_nop(&mut body, req, ops)?,
        Ret => encode_ret(&mut body, req, ops)?,
        Mov => encode_mov(&mut body, req, ops)?,
        Lea => encode_lea(&mut body, req, ops)?,
        Add => encode_alu(&mut body, req, ops, 0)?,
        Or => encode_alu(&mut body, req, ops, 1)?,
        And => encode_alu(&mut body, req, ops, 4)?,
        Sub => encode_alu(&mut body, req, ops, 5)?,
        Xor => encode_alu(&mut body, req, ops, 6)?,
        Cmp => encode_alu(&mut body, req, ops, 7)?,
        Test => encode_test(&mut body, req, ops)?,
        Inc => encode_incdec(&mut body, req, ops, 0)?,
        Dec => encode_incdec(&mut body, req, ops, 1)?,
        Push => encode_push(&mut body, req, ops)?,
        Pop => encode_pop(&mut body, req, ops)?,
        Jmp => encode_jmp(&mut body, req, ops)?,
        Call => encode_call(&mut body, req, ops)?,
        Jo | Jno | Jb | Jnb | Jz | Jnz | Jbe | Jnbe | Js | Jns | Jp | Jnp | Jl | Jnl | Jle
        | Jnle => {
            // cc_code covers exactly this arm
            let cc = cc_code(req.mnemonic)
                .ok_or_else(|| invalid(req.mnemonic, "unsupported operand combination"))?;
            encode_jcc(&mut body, req, ops, cc)?;
        }
        Loop => encode_loopcc(&mut body, req, ops, 0xE2)?,
        Loope => encode_loopcc(&mut body, req, ops, 0xE1)?,
        Loopne => encode_loopcc(&mut body, req, ops, 0xE0)?,
        Jcxz | Jecxz | Jrcxz => encode_jcxz(&mut body, req, ops)?,
        Vblendvps | Vblendvpd | Vpblendvb | Vfmaddps | Vfmaddpd | Vfmaddss | Vfmaddsd => {
            let opcode = vex_is4_opcode(req.mnemonic)
                .ok_or_else(|| invalid(req.mnemonic, "unsupported operand combination"))?;
            encode_vex_is4(&mut body, req, ops, opcode)?;
        }
    }

    if buf.len() + body.len() > MAX_INSTR_LEN {
        return Err(invalid(
            req.mnemonic,
            "prefixes and opcode exceed the 15-byte instruction limit",
        ));
    }
    buf.extend_from_slice(&body);
    Ok(buf)
}
