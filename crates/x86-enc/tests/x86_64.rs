//! x86-64 byte-exact encoding tests.
//!
//! Expected encodings cross-validated against llvm-mc (x86_64).

use x86_enc::{encode, Attribs, MachineMode, MemOperand, Mnemonic, Operand, Register};

fn enc(mnemonic: Mnemonic, ops: &[Operand]) -> Vec<u8> {
    encode(MachineMode::Long64, Attribs::NONE, mnemonic, ops)
        .unwrap()
        .bytes
        .to_vec()
}

fn enc_attr(attribs: Attribs, mnemonic: Mnemonic, ops: &[Operand]) -> Vec<u8> {
    encode(MachineMode::Long64, attribs, mnemonic, ops)
        .unwrap()
        .bytes
        .to_vec()
}

fn enc32(mnemonic: Mnemonic, ops: &[Operand]) -> Vec<u8> {
    encode(MachineMode::Compat32, Attribs::NONE, mnemonic, ops)
        .unwrap()
        .bytes
        .to_vec()
}

fn reg(r: Register) -> Operand {
    Operand::Register(r)
}

fn imm(v: i64) -> Operand {
    Operand::Immediate(v)
}

fn mem(m: MemOperand) -> Operand {
    Operand::Memory(Box::new(m))
}

// ============================================================================
// Core instructions
// ============================================================================

/// NOP — encoding: [0x90]
#[test]
fn x64_nop() {
    assert_eq!(enc(Mnemonic::Nop, &[]), vec![0x90]);
}

/// RET — encoding: [0xc3]
#[test]
fn x64_ret() {
    assert_eq!(enc(Mnemonic::Ret, &[]), vec![0xc3]);
}

/// RET 8 — encoding: [0xc2,0x08,0x00]
#[test]
fn x64_ret_imm() {
    assert_eq!(enc(Mnemonic::Ret, &[imm(8)]), vec![0xc2, 0x08, 0x00]);
}

/// PUSH RAX — encoding: [0x50]
#[test]
fn x64_push_rax() {
    assert_eq!(enc(Mnemonic::Push, &[reg(Register::Rax)]), vec![0x50]);
}

/// PUSH R12 — encoding: [0x41,0x54]
#[test]
fn x64_push_r12() {
    assert_eq!(enc(Mnemonic::Push, &[reg(Register::R12)]), vec![0x41, 0x54]);
}

/// PUSH 0x10 — encoding: [0x6a,0x10]
#[test]
fn x64_push_imm8() {
    assert_eq!(enc(Mnemonic::Push, &[imm(0x10)]), vec![0x6a, 0x10]);
}

/// PUSH 0x1000 — encoding: [0x68,0x00,0x10,0x00,0x00]
#[test]
fn x64_push_imm32() {
    assert_eq!(
        enc(Mnemonic::Push, &[imm(0x1000)]),
        vec![0x68, 0x00, 0x10, 0x00, 0x00]
    );
}

/// PUSH QWORD [RBX] — encoding: [0xff,0x33]
#[test]
fn x64_push_mem() {
    assert_eq!(
        enc(Mnemonic::Push, &[mem(MemOperand::base(8, Register::Rbx))]),
        vec![0xff, 0x33]
    );
}

/// PUSH FS — encoding: [0x0f,0xa0]
#[test]
fn x64_push_fs() {
    assert_eq!(enc(Mnemonic::Push, &[reg(Register::Fs)]), vec![0x0f, 0xa0]);
}

/// POP RBX — encoding: [0x5b]
#[test]
fn x64_pop_rbx() {
    assert_eq!(enc(Mnemonic::Pop, &[reg(Register::Rbx)]), vec![0x5b]);
}

/// POP QWORD [RBX] — encoding: [0x8f,0x03]
#[test]
fn x64_pop_mem() {
    assert_eq!(
        enc(Mnemonic::Pop, &[mem(MemOperand::base(8, Register::Rbx))]),
        vec![0x8f, 0x03]
    );
}

/// POP GS — encoding: [0x0f,0xa9]
#[test]
fn x64_pop_gs() {
    assert_eq!(enc(Mnemonic::Pop, &[reg(Register::Gs)]), vec![0x0f, 0xa9]);
}

// ============================================================================
// MOV
// ============================================================================

/// MOV RAX, RBX — encoding: [0x48,0x89,0xd8]
#[test]
fn x64_mov_rax_rbx() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Rax), reg(Register::Rbx)]),
        vec![0x48, 0x89, 0xd8]
    );
}

/// MOV EAX, EBX — encoding: [0x89,0xd8]
#[test]
fn x64_mov_eax_ebx() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Eax), reg(Register::Ebx)]),
        vec![0x89, 0xd8]
    );
}

/// MOV R8, R9 — encoding: [0x4d,0x89,0xc8]
#[test]
fn x64_mov_r8_r9() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::R8), reg(Register::R9)]),
        vec![0x4d, 0x89, 0xc8]
    );
}

/// MOV AL, BL — encoding: [0x88,0xd8]
#[test]
fn x64_mov_al_bl() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Al), reg(Register::Bl)]),
        vec![0x88, 0xd8]
    );
}

/// MOV SIL, DIL — encoding: [0x40,0x88,0xfe]
#[test]
fn x64_mov_sil_dil() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Sil), reg(Register::Dil)]),
        vec![0x40, 0x88, 0xfe]
    );
}

/// MOV RAX, 60 — optimized to the zero-extending 32-bit form: [0xb8,0x3c,0,0,0]
#[test]
fn x64_mov_rax_small_imm() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Rax), imm(60)]),
        vec![0xb8, 0x3c, 0x00, 0x00, 0x00]
    );
}

/// MOV RAX, -1 — sign-extended imm32 form: [0x48,0xc7,0xc0,0xff,0xff,0xff,0xff]
#[test]
fn x64_mov_rax_neg_imm() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Rax), imm(-1)]),
        vec![0x48, 0xc7, 0xc0, 0xff, 0xff, 0xff, 0xff]
    );
}

/// MOVABS RAX, 0x123456789A — encoding: [0x48,0xb8,...]
#[test]
fn x64_movabs() {
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Rax), imm(0x0012_3456_789A)]),
        vec![0x48, 0xb8, 0x9a, 0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x00]
    );
}

/// MOV RAX, [RBX] — encoding: [0x48,0x8b,0x03]
#[test]
fn x64_mov_reg_mem() {
    assert_eq!(
        enc(
            Mnemonic::Mov,
            &[reg(Register::Rax), mem(MemOperand::base(8, Register::Rbx))]
        ),
        vec![0x48, 0x8b, 0x03]
    );
}

/// MOV [RBX+0x10], RCX — encoding: [0x48,0x89,0x4b,0x10]
#[test]
fn x64_mov_mem_reg_disp8() {
    assert_eq!(
        enc(
            Mnemonic::Mov,
            &[
                mem(MemOperand::base_disp(8, Register::Rbx, 0x10)),
                reg(Register::Rcx)
            ]
        ),
        vec![0x48, 0x89, 0x4b, 0x10]
    );
}

/// MOV RAX, [RBX+RCX*8+0x10] — SIB encoding: [0x48,0x8b,0x44,0xcb,0x10]
#[test]
fn x64_mov_sib() {
    let m = MemOperand {
        size: 8,
        base: Some(Register::Rbx),
        index: Some(Register::Rcx),
        scale: 8,
        disp: 0x10,
        ..MemOperand::default()
    };
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Rax), mem(m)]),
        vec![0x48, 0x8b, 0x44, 0xcb, 0x10]
    );
}

/// MOV DWORD [RAX], 5 — encoding: [0xc7,0x00,0x05,0x00,0x00,0x00]
#[test]
fn x64_mov_mem_imm() {
    assert_eq!(
        enc(
            Mnemonic::Mov,
            &[mem(MemOperand::base(4, Register::Rax)), imm(5)]
        ),
        vec![0xc7, 0x00, 0x05, 0x00, 0x00, 0x00]
    );
}

/// MOV RSP base forces SIB: MOV RAX, [RSP+8] — [0x48,0x8b,0x44,0x24,0x08]
#[test]
fn x64_mov_rsp_base() {
    assert_eq!(
        enc(
            Mnemonic::Mov,
            &[
                reg(Register::Rax),
                mem(MemOperand::base_disp(8, Register::Rsp, 8))
            ]
        ),
        vec![0x48, 0x8b, 0x44, 0x24, 0x08]
    );
}

/// RBP base forces a disp8 even at zero: MOV RAX, [RBP] — [0x48,0x8b,0x45,0x00]
#[test]
fn x64_mov_rbp_base() {
    assert_eq!(
        enc(
            Mnemonic::Mov,
            &[reg(Register::Rax), mem(MemOperand::base(8, Register::Rbp))]
        ),
        vec![0x48, 0x8b, 0x45, 0x00]
    );
}

// ============================================================================
// LEA
// ============================================================================

/// LEA RAX, [RBX+8] — encoding: [0x48,0x8d,0x43,0x08]
#[test]
fn x64_lea() {
    assert_eq!(
        enc(
            Mnemonic::Lea,
            &[
                reg(Register::Rax),
                mem(MemOperand::base_disp(8, Register::Rbx, 8))
            ]
        ),
        vec![0x48, 0x8d, 0x43, 0x08]
    );
}

/// LEA RAX, [RIP+0x10] — encoding: [0x48,0x8d,0x05,0x10,0x00,0x00,0x00]
#[test]
fn x64_lea_rip() {
    assert_eq!(
        enc(
            Mnemonic::Lea,
            &[
                reg(Register::Rax),
                mem(MemOperand::base_disp(8, Register::Rip, 0x10))
            ]
        ),
        vec![0x48, 0x8d, 0x05, 0x10, 0x00, 0x00, 0x00]
    );
}

// ============================================================================
// ALU group
// ============================================================================

/// ADD RAX, RBX — encoding: [0x48,0x01,0xd8]
#[test]
fn x64_add_rax_rbx() {
    assert_eq!(
        enc(Mnemonic::Add, &[reg(Register::Rax), reg(Register::Rbx)]),
        vec![0x48, 0x01, 0xd8]
    );
}

/// ADD RCX, 8 — sign-extended imm8: [0x48,0x83,0xc1,0x08]
#[test]
fn x64_add_rcx_imm8() {
    assert_eq!(
        enc(Mnemonic::Add, &[reg(Register::Rcx), imm(8)]),
        vec![0x48, 0x83, 0xc1, 0x08]
    );
}

/// SUB RSP, 0x20 — encoding: [0x48,0x83,0xec,0x20]
#[test]
fn x64_sub_rsp() {
    assert_eq!(
        enc(Mnemonic::Sub, &[reg(Register::Rsp), imm(0x20)]),
        vec![0x48, 0x83, 0xec, 0x20]
    );
}

/// XOR EAX, EAX — encoding: [0x31,0xc0]
#[test]
fn x64_xor_eax_eax() {
    assert_eq!(
        enc(Mnemonic::Xor, &[reg(Register::Eax), reg(Register::Eax)]),
        vec![0x31, 0xc0]
    );
}

/// CMP RAX, 0x1000 — accumulator short form: [0x48,0x3d,0x00,0x10,0x00,0x00]
#[test]
fn x64_cmp_rax_imm32() {
    assert_eq!(
        enc(Mnemonic::Cmp, &[reg(Register::Rax), imm(0x1000)]),
        vec![0x48, 0x3d, 0x00, 0x10, 0x00, 0x00]
    );
}

/// AND AL, 0x0F — accumulator short form: [0x24,0x0f]
#[test]
fn x64_and_al_imm() {
    assert_eq!(
        enc(Mnemonic::And, &[reg(Register::Al), imm(0x0F)]),
        vec![0x24, 0x0f]
    );
}

/// OR [RBX], EAX — encoding: [0x09,0x03]
#[test]
fn x64_or_mem_reg() {
    assert_eq!(
        enc(
            Mnemonic::Or,
            &[mem(MemOperand::base(4, Register::Rbx)), reg(Register::Eax)]
        ),
        vec![0x09, 0x03]
    );
}

/// ADD DWORD [RBX], 1 — encoding: [0x83,0x03,0x01]
#[test]
fn x64_add_mem_imm8() {
    assert_eq!(
        enc(Mnemonic::Add, &[mem(MemOperand::base(4, Register::Rbx)), imm(1)]),
        vec![0x83, 0x03, 0x01]
    );
}

/// TEST EAX, EAX — encoding: [0x85,0xc0]
#[test]
fn x64_test_eax_eax() {
    assert_eq!(
        enc(Mnemonic::Test, &[reg(Register::Eax), reg(Register::Eax)]),
        vec![0x85, 0xc0]
    );
}

/// TEST AL, 1 — encoding: [0xa8,0x01]
#[test]
fn x64_test_al_imm() {
    assert_eq!(
        enc(Mnemonic::Test, &[reg(Register::Al), imm(1)]),
        vec![0xa8, 0x01]
    );
}

/// INC RAX — encoding: [0x48,0xff,0xc0]
#[test]
fn x64_inc_rax() {
    assert_eq!(
        enc(Mnemonic::Inc, &[reg(Register::Rax)]),
        vec![0x48, 0xff, 0xc0]
    );
}

/// DEC ECX — encoding: [0xff,0xc9]
#[test]
fn x64_dec_ecx() {
    assert_eq!(enc(Mnemonic::Dec, &[reg(Register::Ecx)]), vec![0xff, 0xc9]);
}

/// INC BYTE [RBX] — encoding: [0xfe,0x03]
#[test]
fn x64_inc_byte_mem() {
    assert_eq!(
        enc(Mnemonic::Inc, &[mem(MemOperand::base(1, Register::Rbx))]),
        vec![0xfe, 0x03]
    );
}

// ============================================================================
// Indirect control flow
// ============================================================================

/// JMP RAX — encoding: [0xff,0xe0]
#[test]
fn x64_jmp_reg() {
    assert_eq!(enc(Mnemonic::Jmp, &[reg(Register::Rax)]), vec![0xff, 0xe0]);
}

/// JMP [RAX] — encoding: [0xff,0x20]
#[test]
fn x64_jmp_mem() {
    assert_eq!(
        enc(Mnemonic::Jmp, &[mem(MemOperand::base(8, Register::Rax))]),
        vec![0xff, 0x20]
    );
}

/// CALL RAX — encoding: [0xff,0xd0]
#[test]
fn x64_call_reg() {
    assert_eq!(enc(Mnemonic::Call, &[reg(Register::Rax)]), vec![0xff, 0xd0]);
}

/// CALL [RIP+0] — encoding: [0xff,0x15,0x00,0x00,0x00,0x00]
#[test]
fn x64_call_rip_mem() {
    assert_eq!(
        enc(Mnemonic::Call, &[mem(MemOperand::base(8, Register::Rip))]),
        vec![0xff, 0x15, 0x00, 0x00, 0x00, 0x00]
    );
}

// ============================================================================
// Prefixes
// ============================================================================

/// LOCK ADD [RBX], EAX — encoding: [0xf0,0x01,0x03]
#[test]
fn x64_lock_add() {
    assert_eq!(
        enc_attr(
            Attribs::LOCK,
            Mnemonic::Add,
            &[mem(MemOperand::base(4, Register::Rbx)), reg(Register::Eax)]
        ),
        vec![0xf0, 0x01, 0x03]
    );
}

/// ADD WORD [RBX], 1 with a 16-bit size hint — encoding: [0x66,0x83,0x03,0x01]
#[test]
fn x64_opsize16_hint() {
    assert_eq!(
        enc_attr(
            Attribs::OPSIZE16,
            Mnemonic::Add,
            &[mem(MemOperand::base(0, Register::Rbx)), imm(1)]
        ),
        vec![0x66, 0x83, 0x03, 0x01]
    );
}

/// MOV RAX, GS:[RCX] — segment override rides ahead: [0x65,0x48,0x8b,0x01]
#[test]
fn x64_gs_segment_override() {
    let m = MemOperand {
        size: 8,
        base: Some(Register::Rcx),
        segment: Some(Register::Gs),
        ..MemOperand::default()
    };
    assert_eq!(
        enc(Mnemonic::Mov, &[reg(Register::Rax), mem(m)]),
        vec![0x65, 0x48, 0x8b, 0x01]
    );
}

/// Stacking every prefix attribute on a long form must fail cleanly — the
/// combined encoding cannot fit the 15-byte instruction limit.
#[test]
fn x64_stacked_prefixes_over_limit_are_rejected() {
    let m = MemOperand {
        size: 8,
        disp: 0x1000,
        segment: Some(Register::Fs),
        ..MemOperand::default()
    };
    let err = encode(
        MachineMode::Long64,
        Attribs::LOCK | Attribs::XACQUIRE | Attribs::XRELEASE | Attribs::REP | Attribs::REPNE,
        Mnemonic::Mov,
        &[mem(m), imm(0x1122_3344)],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        x86_enc::EncodeError::ImpossibleInstruction { .. }
    ));
}

// ============================================================================
// VEX four-operand family
// ============================================================================

/// VBLENDVPS XMM1, XMM2, XMM3, XMM4 — encoding: [0xc4,0xe3,0x69,0x4a,0xcb,0x40]
#[test]
fn x64_vblendvps_rrrr() {
    assert_eq!(
        enc(
            Mnemonic::Vblendvps,
            &[
                reg(Register::Xmm1),
                reg(Register::Xmm2),
                reg(Register::Xmm3),
                reg(Register::Xmm4)
            ]
        ),
        vec![0xc4, 0xe3, 0x69, 0x4a, 0xcb, 0x40]
    );
}

/// VBLENDVPD YMM1, YMM2, YMM3, YMM4 — encoding: [0xc4,0xe3,0x6d,0x4b,0xcb,0x40]
#[test]
fn x64_vblendvpd_ymm() {
    assert_eq!(
        enc(
            Mnemonic::Vblendvpd,
            &[
                reg(Register::Ymm1),
                reg(Register::Ymm2),
                reg(Register::Ymm3),
                reg(Register::Ymm4)
            ]
        ),
        vec![0xc4, 0xe3, 0x6d, 0x4b, 0xcb, 0x40]
    );
}

/// VPBLENDVB XMM0, XMM1, [RAX], XMM2 — memory in the r/m slot, W=0:
/// [0xc4,0xe3,0x71,0x4c,0x00,0x20]
#[test]
fn x64_vpblendvb_mem_rm() {
    assert_eq!(
        enc(
            Mnemonic::Vpblendvb,
            &[
                reg(Register::Xmm0),
                reg(Register::Xmm1),
                mem(MemOperand::base(16, Register::Rax)),
                reg(Register::Xmm2)
            ]
        ),
        vec![0xc4, 0xe3, 0x71, 0x4c, 0x00, 0x20]
    );
}

/// VFMADDSS XMM0, XMM1, XMM2, [RAX] — register selector moves into the
/// immediate, memory takes r/m, W=1: [0xc4,0xe3,0xf1,0x6a,0x00,0x20]
#[test]
fn x64_vfmaddss_mem_last() {
    assert_eq!(
        enc(
            Mnemonic::Vfmaddss,
            &[
                reg(Register::Xmm0),
                reg(Register::Xmm1),
                reg(Register::Xmm2),
                mem(MemOperand::base(4, Register::Rax))
            ]
        ),
        vec![0xc4, 0xe3, 0xf1, 0x6a, 0x00, 0x20]
    );
}

/// Extended registers set the inverted VEX R/B bits:
/// VBLENDVPS XMM9, XMM2, XMM11, XMM4 — [0xc4,0x43,0x69,0x4a,0xcb,0x40]
#[test]
fn x64_vblendvps_extended() {
    assert_eq!(
        enc(
            Mnemonic::Vblendvps,
            &[
                reg(Register::Xmm9),
                reg(Register::Xmm2),
                reg(Register::Xmm11),
                reg(Register::Xmm4)
            ]
        ),
        vec![0xc4, 0x43, 0x69, 0x4a, 0xcb, 0x40]
    );
}

// ============================================================================
// 32-bit mode
// ============================================================================

/// MOV EAX, EBX in 32-bit mode — encoding: [0x89,0xd8]
#[test]
fn x32_mov_eax_ebx() {
    assert_eq!(
        enc32(Mnemonic::Mov, &[reg(Register::Eax), reg(Register::Ebx)]),
        vec![0x89, 0xd8]
    );
}

/// MOV EAX, [0x1000] in 32-bit mode — plain disp32, no SIB:
/// [0x8b,0x05,0x00,0x10,0x00,0x00]
#[test]
fn x32_mov_abs() {
    let m = MemOperand {
        size: 4,
        disp: 0x1000,
        ..MemOperand::default()
    };
    assert_eq!(
        enc32(Mnemonic::Mov, &[reg(Register::Eax), mem(m)]),
        vec![0x8b, 0x05, 0x00, 0x10, 0x00, 0x00]
    );
}

/// PUSH EBP in 32-bit mode — encoding: [0x55]
#[test]
fn x32_push_ebp() {
    assert_eq!(enc32(Mnemonic::Push, &[reg(Register::Ebp)]), vec![0x55]);
}

/// 64-bit registers are rejected in 32-bit mode.
#[test]
fn x32_rejects_64bit_registers() {
    let err = encode(
        MachineMode::Compat32,
        Attribs::NONE,
        Mnemonic::Mov,
        &[reg(Register::Rax), reg(Register::Rbx)],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        x86_enc::EncodeError::ImpossibleInstruction { .. }
    ));
}

/// Absolute-address encodings differ between modes (SIB vs plain disp32).
#[test]
fn abs_addressing_mode_split() {
    let m = MemOperand {
        size: 4,
        disp: 0x1000,
        ..MemOperand::default()
    };
    let long = enc(Mnemonic::Mov, &[reg(Register::Eax), mem(m.clone())]);
    let compat = enc32(Mnemonic::Mov, &[reg(Register::Eax), mem(m)]);
    assert_eq!(long, vec![0x8b, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00]);
    assert_eq!(compat, vec![0x8b, 0x05, 0x00, 0x10, 0x00, 0x00]);
}
