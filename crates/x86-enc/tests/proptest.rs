#![cfg(not(target_arch = "wasm32"))]
//! Property-based tests using proptest.
//!
//! These tests verify encoder invariants across large, randomly generated
//! input spaces — complementing the targeted unit/integration tests.

use proptest::prelude::*;
use x86_enc::{
    encode, encode_with_context, Attribs, EncoderContext, Instruction, LabelId, LabelResolver,
    MachineMode, MemOperand, Mnemonic, Operand, Register, MAX_INSTR_LEN,
};

// ── Strategies ──────────────────────────────────────────────────────────

fn gp64() -> impl Strategy<Value = Register> {
    prop::sample::select(vec![
        Register::Rax,
        Register::Rcx,
        Register::Rdx,
        Register::Rbx,
        Register::Rsp,
        Register::Rbp,
        Register::Rsi,
        Register::Rdi,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ])
}

fn gp32() -> impl Strategy<Value = Register> {
    prop::sample::select(vec![
        Register::Eax,
        Register::Ecx,
        Register::Edx,
        Register::Ebx,
        Register::Esi,
        Register::Edi,
        Register::R8d,
        Register::R15d,
    ])
}

fn two_reg_mnemonic() -> impl Strategy<Value = Mnemonic> {
    prop::sample::select(vec![
        Mnemonic::Mov,
        Mnemonic::Add,
        Mnemonic::Or,
        Mnemonic::And,
        Mnemonic::Sub,
        Mnemonic::Xor,
        Mnemonic::Cmp,
        Mnemonic::Test,
    ])
}

fn branch_mnemonic() -> impl Strategy<Value = Mnemonic> {
    prop::sample::select(vec![
        Mnemonic::Jmp,
        Mnemonic::Jz,
        Mnemonic::Jnz,
        Mnemonic::Jb,
        Mnemonic::Jnbe,
        Mnemonic::Jle,
        Mnemonic::Js,
        Mnemonic::Jo,
    ])
}

struct OneLabel(u64);

impl LabelResolver for OneLabel {
    fn resolve(&self, label: LabelId) -> Option<u64> {
        (label == LabelId(0)).then_some(self.0)
    }
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    /// Every successful encoding fits the architectural 15-byte bound.
    #[test]
    fn encodings_never_exceed_max_length(
        mnemonic in two_reg_mnemonic(),
        dst in gp64(),
        src in gp64(),
    ) {
        let enc = encode(
            MachineMode::Long64,
            Attribs::NONE,
            mnemonic,
            &[Operand::Register(dst), Operand::Register(src)],
        ).unwrap();
        prop_assert!(enc.bytes.len() <= MAX_INSTR_LEN);
        prop_assert!(!enc.bytes.is_empty());
    }

    /// Context-free encoding is a pure function of its inputs.
    #[test]
    fn context_free_is_deterministic(
        mnemonic in two_reg_mnemonic(),
        dst in gp32(),
        value in any::<i32>(),
    ) {
        let ops = [Operand::Register(dst), Operand::Immediate(i64::from(value))];
        let a = encode(MachineMode::Long64, Attribs::NONE, mnemonic, &ops).unwrap();
        let b = encode(MachineMode::Long64, Attribs::NONE, mnemonic, &ops).unwrap();
        prop_assert_eq!(a.bytes, b.bytes);
    }

    /// A branch target within rel8 reach always takes the 2-byte short form;
    /// one within rel32 (but not rel8) reach takes the near form.
    #[test]
    fn branch_form_follows_distance(
        mnemonic in branch_mnemonic(),
        va in 0x10_000u64..0x7000_0000,
        short_offset in -120i64..=120,
        near_offset in prop::sample::select(vec![-100_000i64, -5_000, 1_000, 100_000]),
    ) {
        let near_len = if mnemonic == Mnemonic::Jmp { 5 } else { 6 };

        let target = va.wrapping_add_signed(short_offset);
        let labels = OneLabel(target);
        let mut ctx = EncoderContext::new(va, &labels);
        let instr = Instruction::new(mnemonic).with_operand(Operand::Label(LabelId(0)));
        let enc = encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap();
        prop_assert_eq!(enc.bytes.len(), 2);

        let target = va.wrapping_add_signed(near_offset);
        let labels = OneLabel(target);
        let mut ctx = EncoderContext::new(va, &labels);
        let enc = encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap();
        prop_assert_eq!(enc.bytes.len(), near_len);
    }

    /// Encoding the same instruction at the same address twice, with fresh
    /// contexts, produces identical bytes (the fixed point is stable).
    #[test]
    fn context_encoding_is_repeatable(
        va in 0x1000u64..0x1000_0000,
        label_va in 0x1000u64..0x1000_0000,
    ) {
        let labels = OneLabel(label_va);
        let instr = Instruction::new(Mnemonic::Mov)
            .with_operand(Operand::Register(Register::Rax))
            .with_operand(Operand::Memory(Box::new(MemOperand::label(8, LabelId(0)))));

        let mut ctx = EncoderContext::new(va, &labels);
        let a = encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap();
        let mut ctx = EncoderContext::new(va, &labels);
        let b = encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap();
        prop_assert_eq!(a.bytes, b.bytes);
        prop_assert_eq!(a.relocation, b.relocation);
    }

    /// RIP-relative displacements point exactly at the label: reading the
    /// disp32 back out of the encoding and adding the end-of-instruction
    /// address recovers the label's address.
    #[test]
    fn rip_displacement_round_trips(
        va in 0x1000u64..0x0100_0000,
        label_va in 0x1000u64..0x0100_0000,
    ) {
        let labels = OneLabel(label_va);
        let instr = Instruction::new(Mnemonic::Mov)
            .with_operand(Operand::Register(Register::Rax))
            .with_operand(Operand::Memory(Box::new(MemOperand::label(8, LabelId(0)))));
        let mut ctx = EncoderContext::new(va, &labels);
        let enc = encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap();

        // 48 8B 05 <disp32>
        prop_assert_eq!(enc.bytes.len(), 7);
        let disp = i32::from_le_bytes([enc.bytes[3], enc.bytes[4], enc.bytes[5], enc.bytes[6]]);
        let end = va + enc.bytes.len() as u64;
        prop_assert_eq!(end.wrapping_add_signed(i64::from(disp)), label_va);
    }

    /// Immediate branch targets and resolved labels to the same address
    /// encode identically.
    #[test]
    fn label_and_immediate_targets_agree(
        va in 0x10_000u64..0x0100_0000,
        offset in -100_000i64..=100_000,
    ) {
        let target = va.wrapping_add_signed(offset);
        let labels = OneLabel(target);

        let by_label = {
            let mut ctx = EncoderContext::new(va, &labels);
            let instr = Instruction::new(Mnemonic::Jmp).with_operand(Operand::Label(LabelId(0)));
            encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap()
        };
        let by_imm = {
            let mut ctx = EncoderContext::new(va, &labels);
            let instr =
                Instruction::new(Mnemonic::Jmp).with_operand(Operand::Immediate(target as i64));
            encode_with_context(&mut ctx, MachineMode::Long64, &instr).unwrap()
        };
        prop_assert_eq!(by_label.bytes, by_imm.bytes);
    }
}
