/*
 * Copyright (C) 2022-2024 by Christian Fischer
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

//! Decoding and execution of the Sharp SM83 instruction set.
//!
//! Instructions are dispatched through a single [execute_opcode] function
//! rather than one handler per opcode; the opcode byte(s) already fetched by
//! [crate::cpu::cpu::Cpu::fetch_next_instruction] select the behavior via a
//! match. Cycle accounting is instruction-level: every opcode reports its
//! full cost through a single [OpCodeResult::Done], rather than staging
//! sub-instruction bus accesses against elapsed cycles one at a time. This
//! keeps total cycle counts (and therefore timer/PPU/DMA timing) correct
//! while not modeling which exact T-state within an instruction a given
//! memory access lands on.

#[cfg(feature = "dyn_alloc")]
use alloc::string::{String, ToString};

use crate::cpu::cpu::{Clock, CpuFlag, RegisterR16, RegisterR8};
use crate::gameboy::GameBoy;
use crate::utils::{borrowing_sub_u8, carrying_add_u8, get_high, get_low, to_u16};


/// A decoded but not-yet-executed instruction.
pub struct Instruction {
    pub opcode_address: u16,
    pub opcode_id: u16,
    pub prefixed: bool,
    pub opcode: OpCode,
}

impl Instruction {
    #[cfg(feature = "dyn_alloc")]
    pub fn to_string(&self) -> String {
        if self.prefixed {
            alloc::format!("CB {:02x}", self.opcode_id & 0xff)
        } else {
            alloc::format!("{:02x}", self.opcode_id)
        }.to_string()
    }
}


/// The behavior and up-front (prefetch) cycle cost of a single opcode.
/// `proc` is always [execute_opcode]; the field exists so [crate::gameboy::GameBoy]
/// can stay agnostic of how opcodes are dispatched.
#[derive(Copy, Clone)]
pub struct OpCode {
    pub cycles_ahead: Clock,
    pub proc: fn(&mut GameBoy, &mut OpCodeContext) -> OpCodeResult,
}


/// Per-instruction execution state threaded through a (possibly staged) opcode call.
pub struct OpCodeContext {
    opcode_id: u16,
    cycles_consumed: Clock,
}

impl OpCodeContext {
    pub fn for_instruction(instruction: &Instruction) -> Self {
        Self {
            opcode_id: instruction.opcode_id,
            cycles_consumed: 0,
        }
    }

    pub fn enter_next_stage(&mut self) {
        // single-stage execution model: no further stages are entered.
    }

    pub fn get_cycles_consumed(&self) -> Clock {
        self.cycles_consumed
    }
}


/// Outcome of one call into an opcode handler.
pub enum OpCodeResult {
    /// The opcode needs more bus time before it's done; `Clock` cycles have
    /// elapsed so far and should be applied to other components immediately.
    StageDone(Clock),

    /// The opcode has fully executed.
    Done,
}


fn read_r8(gb: &mut GameBoy, index: u8) -> u8 {
    match index & 7 {
        0 => gb.cpu.get_r8(RegisterR8::B),
        1 => gb.cpu.get_r8(RegisterR8::C),
        2 => gb.cpu.get_r8(RegisterR8::D),
        3 => gb.cpu.get_r8(RegisterR8::E),
        4 => gb.cpu.get_r8(RegisterR8::H),
        5 => gb.cpu.get_r8(RegisterR8::L),
        6 => { let addr = gb.cpu.get_r16(RegisterR16::HL); gb.cpu.get_mmu_mut().read_u8(addr) }
        _ => gb.cpu.get_r8(RegisterR8::A),
    }
}

fn write_r8(gb: &mut GameBoy, index: u8, value: u8) {
    match index & 7 {
        0 => gb.cpu.set_r8(RegisterR8::B, value),
        1 => gb.cpu.set_r8(RegisterR8::C, value),
        2 => gb.cpu.set_r8(RegisterR8::D, value),
        3 => gb.cpu.set_r8(RegisterR8::E, value),
        4 => gb.cpu.set_r8(RegisterR8::H, value),
        5 => gb.cpu.set_r8(RegisterR8::L, value),
        6 => { let addr = gb.cpu.get_r16(RegisterR16::HL); gb.cpu.get_mmu_mut().write_u8(addr, value); }
        _ => gb.cpu.set_r8(RegisterR8::A, value),
    }
}

fn r16_group1(index: u8) -> RegisterR16 {
    match index & 3 {
        0 => RegisterR16::BC,
        1 => RegisterR16::DE,
        2 => RegisterR16::HL,
        _ => RegisterR16::SP,
    }
}

/// `r16` group used by PUSH/POP, where slot 3 is AF instead of SP.
fn r16_group2(index: u8) -> RegisterR16 {
    match index & 3 {
        0 => RegisterR16::BC,
        1 => RegisterR16::DE,
        2 => RegisterR16::HL,
        _ => RegisterR16::AF,
    }
}

fn check_condition(gb: &GameBoy, cc: u8) -> bool {
    match cc & 3 {
        0 => !gb.cpu.get_flag(CpuFlag::Zero),
        1 => gb.cpu.get_flag(CpuFlag::Zero),
        2 => !gb.cpu.get_flag(CpuFlag::Carry),
        _ => gb.cpu.get_flag(CpuFlag::Carry),
    }
}

fn add8(gb: &mut GameBoy, value: u8, carry_in: bool) {
    let a = gb.cpu.get_r8(RegisterR8::A);
    let (result, half_carry, carry) = carrying_add_u8(a, value, carry_in);
    gb.cpu.set_r8(RegisterR8::A, result);
    gb.cpu.set_flag(CpuFlag::Zero, result == 0);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, half_carry);
    gb.cpu.set_flag(CpuFlag::Carry, carry);
}

fn sub8(gb: &mut GameBoy, value: u8, borrow_in: bool, store: bool) {
    let a = gb.cpu.get_r8(RegisterR8::A);
    let (result, half_borrow, borrow) = borrowing_sub_u8(a, value, borrow_in);
    if store {
        gb.cpu.set_r8(RegisterR8::A, result);
    }
    gb.cpu.set_flag(CpuFlag::Zero, result == 0);
    gb.cpu.set_flag(CpuFlag::Negative, true);
    gb.cpu.set_flag(CpuFlag::HalfCarry, half_borrow);
    gb.cpu.set_flag(CpuFlag::Carry, borrow);
}

fn and8(gb: &mut GameBoy, value: u8) {
    let a = gb.cpu.get_r8(RegisterR8::A) & value;
    gb.cpu.set_r8(RegisterR8::A, a);
    gb.cpu.set_flag(CpuFlag::Zero, a == 0);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, true);
    gb.cpu.set_flag(CpuFlag::Carry, false);
}

fn or8(gb: &mut GameBoy, value: u8) {
    let a = gb.cpu.get_r8(RegisterR8::A) | value;
    gb.cpu.set_r8(RegisterR8::A, a);
    gb.cpu.set_flag(CpuFlag::Zero, a == 0);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, false);
    gb.cpu.set_flag(CpuFlag::Carry, false);
}

fn xor8(gb: &mut GameBoy, value: u8) {
    let a = gb.cpu.get_r8(RegisterR8::A) ^ value;
    gb.cpu.set_r8(RegisterR8::A, a);
    gb.cpu.set_flag(CpuFlag::Zero, a == 0);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, false);
    gb.cpu.set_flag(CpuFlag::Carry, false);
}

fn inc8(gb: &mut GameBoy, value: u8) -> u8 {
    let (result, half_carry, _) = carrying_add_u8(value, 1, false);
    gb.cpu.set_flag(CpuFlag::Zero, result == 0);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, half_carry);
    result
}

fn dec8(gb: &mut GameBoy, value: u8) -> u8 {
    let (result, half_borrow, _) = borrowing_sub_u8(value, 1, false);
    gb.cpu.set_flag(CpuFlag::Zero, result == 0);
    gb.cpu.set_flag(CpuFlag::Negative, true);
    gb.cpu.set_flag(CpuFlag::HalfCarry, half_borrow);
    result
}

fn add_hl(gb: &mut GameBoy, value: u16) {
    let hl = gb.cpu.get_r16(RegisterR16::HL);
    let (result, carry) = hl.overflowing_add(value);
    let half_carry = (hl & 0x0fff) + (value & 0x0fff) > 0x0fff;
    gb.cpu.set_r16(RegisterR16::HL, result);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, half_carry);
    gb.cpu.set_flag(CpuFlag::Carry, carry);
}

/// Shared implementation of ADD SP,r8 / LD HL,SP+r8: both add a signed byte to SP
/// and compute flags from the low-byte addition only.
fn add_sp_signed(gb: &mut GameBoy, offset: i8) -> u16 {
    let sp = gb.cpu.get_stack_pointer();
    let value = offset as i16 as u16;
    let result = sp.wrapping_add(value);
    let half_carry = (sp & 0x0f) + (value & 0x0f) > 0x0f;
    let carry = (sp & 0xff) + (value & 0xff) > 0xff;
    gb.cpu.set_flag(CpuFlag::Zero, false);
    gb.cpu.set_flag(CpuFlag::Negative, false);
    gb.cpu.set_flag(CpuFlag::HalfCarry, half_carry);
    gb.cpu.set_flag(CpuFlag::Carry, carry);
    result
}

fn daa(gb: &mut GameBoy) {
    let mut a = gb.cpu.get_r8(RegisterR8::A);
    let mut carry = gb.cpu.get_flag(CpuFlag::Carry);

    if gb.cpu.get_flag(CpuFlag::Negative) {
        if carry { a = a.wrapping_sub(0x60); }
        if gb.cpu.get_flag(CpuFlag::HalfCarry) { a = a.wrapping_sub(0x06); }
    } else {
        if carry || a > 0x99 {
            a = a.wrapping_add(0x60);
            carry = true;
        }
        if gb.cpu.get_flag(CpuFlag::HalfCarry) || (a & 0x0f) > 0x09 {
            a = a.wrapping_add(0x06);
        }
    }

    gb.cpu.set_r8(RegisterR8::A, a);
    gb.cpu.set_flag(CpuFlag::Zero, a == 0);
    gb.cpu.set_flag(CpuFlag::HalfCarry, false);
    gb.cpu.set_flag(CpuFlag::Carry, carry);
}

fn jr(gb: &mut GameBoy, offset: i8) {
    let pc = gb.cpu.get_instruction_pointer();
    gb.cpu.set_instruction_pointer(pc.wrapping_add(offset as i16 as u16));
}


/// Executes the CB-prefixed block: rotates/shifts, BIT, RES and SET, all of
/// which share the same `r8`-selection and bit-index layout.
fn execute_cb(gb: &mut GameBoy, opcode: u8) {
    let group = opcode >> 6;
    let reg = opcode & 7;
    let bit = (opcode >> 3) & 7;

    match group {
        // rotate / shift / swap block
        0 => {
            let value = read_r8(gb, reg);
            let carry_in = gb.cpu.get_flag(CpuFlag::Carry);

            let (result, carry_out) = match bit {
                0 => (value.rotate_left(1), (value & 0x80) != 0),                           // RLC
                1 => (value.rotate_right(1), (value & 0x01) != 0),                          // RRC
                2 => ((value << 1) | (carry_in as u8), (value & 0x80) != 0),                 // RL
                3 => ((value >> 1) | ((carry_in as u8) << 7), (value & 0x01) != 0),           // RR
                4 => (value << 1, (value & 0x80) != 0),                                      // SLA
                5 => ((value >> 1) | (value & 0x80), (value & 0x01) != 0),                   // SRA
                6 => (value.rotate_left(4), false),                                          // SWAP
                _ => (value >> 1, (value & 0x01) != 0),                                      // SRL
            };

            write_r8(gb, reg, result);
            gb.cpu.set_flag(CpuFlag::Zero, result == 0);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, if bit == 6 { false } else { carry_out });
        }

        // BIT b,r
        1 => {
            let value = read_r8(gb, reg);
            gb.cpu.set_flag(CpuFlag::Zero, (value & (1 << bit)) == 0);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, true);
        }

        // RES b,r
        2 => {
            let value = read_r8(gb, reg) & !(1 << bit);
            write_r8(gb, reg, value);
        }

        // SET b,r
        _ => {
            let value = read_r8(gb, reg) | (1 << bit);
            write_r8(gb, reg, value);
        }
    }
}


/// Dispatches and fully executes one (already-fetched) instruction, in a
/// single call, returning the total number of cycles it consumed.
pub fn execute_opcode(gb: &mut GameBoy, context: &mut OpCodeContext) -> OpCodeResult {
    let opcode_id = context.opcode_id;

    let cycles = if opcode_id >= 0xcb00 {
        let opcode = (opcode_id & 0xff) as u8;
        execute_cb(gb, opcode);

        if opcode & 7 == 6 {
            if (opcode >> 6) == 1 { 12 } else { 16 }
        } else {
            8
        }
    } else {
        execute_unprefixed(gb, opcode_id as u8)
    };

    context.cycles_consumed = cycles;
    OpCodeResult::Done
}


fn execute_unprefixed(gb: &mut GameBoy, opcode: u8) -> Clock {
    // LD r,r' block (0x76 is HALT, carved out below)
    if (0x40..=0x7f).contains(&opcode) && opcode != 0x76 {
        let src = opcode & 7;
        let dst = (opcode >> 3) & 7;
        let value = read_r8(gb, src);
        write_r8(gb, dst, value);
        return if src == 6 || dst == 6 { 8 } else { 4 };
    }

    // 8-bit ALU block against A
    if (0x80..=0xbf).contains(&opcode) {
        let src = opcode & 7;
        let value = read_r8(gb, src);
        let cycles = if src == 6 { 8 } else { 4 };

        match (opcode >> 3) & 7 {
            0 => add8(gb, value, false),
            1 => add8(gb, value, gb.cpu.get_flag(CpuFlag::Carry)),
            2 => sub8(gb, value, false, true),
            3 => sub8(gb, value, gb.cpu.get_flag(CpuFlag::Carry), true),
            4 => and8(gb, value),
            5 => xor8(gb, value),
            6 => or8(gb, value),
            _ => sub8(gb, value, false, false),
        }

        return cycles;
    }

    match opcode {
        0x00 => 4, // NOP

        0x01 | 0x11 | 0x21 | 0x31 => {
            let value = gb.cpu.fetch_u16();
            gb.cpu.set_r16(r16_group1(opcode >> 4), value);
            12
        }

        0x02 => { let addr = gb.cpu.get_r16(RegisterR16::BC); let a = gb.cpu.get_r8(RegisterR8::A); gb.cpu.get_mmu_mut().write_u8(addr, a); 8 }
        0x12 => { let addr = gb.cpu.get_r16(RegisterR16::DE); let a = gb.cpu.get_r8(RegisterR8::A); gb.cpu.get_mmu_mut().write_u8(addr, a); 8 }
        0x0a => { let addr = gb.cpu.get_r16(RegisterR16::BC); let v = gb.cpu.get_mmu_mut().read_u8(addr); gb.cpu.set_r8(RegisterR8::A, v); 8 }
        0x1a => { let addr = gb.cpu.get_r16(RegisterR16::DE); let v = gb.cpu.get_mmu_mut().read_u8(addr); gb.cpu.set_r8(RegisterR8::A, v); 8 }

        0x22 => {
            let addr = gb.cpu.get_r16(RegisterR16::HL);
            let a = gb.cpu.get_r8(RegisterR8::A);
            gb.cpu.get_mmu_mut().write_u8(addr, a);
            gb.cpu.set_r16(RegisterR16::HL, addr.wrapping_add(1));
            8
        }
        0x32 => {
            let addr = gb.cpu.get_r16(RegisterR16::HL);
            let a = gb.cpu.get_r8(RegisterR8::A);
            gb.cpu.get_mmu_mut().write_u8(addr, a);
            gb.cpu.set_r16(RegisterR16::HL, addr.wrapping_sub(1));
            8
        }
        0x2a => {
            let addr = gb.cpu.get_r16(RegisterR16::HL);
            let v = gb.cpu.get_mmu_mut().read_u8(addr);
            gb.cpu.set_r8(RegisterR8::A, v);
            gb.cpu.set_r16(RegisterR16::HL, addr.wrapping_add(1));
            8
        }
        0x3a => {
            let addr = gb.cpu.get_r16(RegisterR16::HL);
            let v = gb.cpu.get_mmu_mut().read_u8(addr);
            gb.cpu.set_r8(RegisterR8::A, v);
            gb.cpu.set_r16(RegisterR16::HL, addr.wrapping_sub(1));
            8
        }

        0x03 | 0x13 | 0x23 | 0x33 => {
            let reg = r16_group1(opcode >> 4);
            let value = gb.cpu.get_r16(reg).wrapping_add(1);
            gb.cpu.set_r16(reg, value);
            8
        }
        0x0b | 0x1b | 0x2b | 0x3b => {
            let reg = r16_group1(opcode >> 4);
            let value = gb.cpu.get_r16(reg).wrapping_sub(1);
            gb.cpu.set_r16(reg, value);
            8
        }

        0x04 | 0x0c | 0x14 | 0x1c | 0x24 | 0x2c | 0x34 | 0x3c => {
            let reg = (opcode >> 3) & 7;
            let value = read_r8(gb, reg);
            let result = inc8(gb, value);
            write_r8(gb, reg, result);
            if reg == 6 { 12 } else { 4 }
        }
        0x05 | 0x0d | 0x15 | 0x1d | 0x25 | 0x2d | 0x35 | 0x3d => {
            let reg = (opcode >> 3) & 7;
            let value = read_r8(gb, reg);
            let result = dec8(gb, value);
            write_r8(gb, reg, result);
            if reg == 6 { 12 } else { 4 }
        }

        0x06 | 0x0e | 0x16 | 0x1e | 0x26 | 0x2e | 0x36 | 0x3e => {
            let reg = (opcode >> 3) & 7;
            let value = gb.cpu.fetch_u8();
            write_r8(gb, reg, value);
            if reg == 6 { 12 } else { 8 }
        }

        0x07 => { // RLCA
            let a = gb.cpu.get_r8(RegisterR8::A);
            let result = a.rotate_left(1);
            gb.cpu.set_r8(RegisterR8::A, result);
            gb.cpu.set_flag(CpuFlag::Zero, false);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, (a & 0x80) != 0);
            4
        }
        0x0f => { // RRCA
            let a = gb.cpu.get_r8(RegisterR8::A);
            let result = a.rotate_right(1);
            gb.cpu.set_r8(RegisterR8::A, result);
            gb.cpu.set_flag(CpuFlag::Zero, false);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, (a & 0x01) != 0);
            4
        }
        0x17 => { // RLA
            let a = gb.cpu.get_r8(RegisterR8::A);
            let carry_in = gb.cpu.get_flag(CpuFlag::Carry) as u8;
            let result = (a << 1) | carry_in;
            gb.cpu.set_r8(RegisterR8::A, result);
            gb.cpu.set_flag(CpuFlag::Zero, false);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, (a & 0x80) != 0);
            4
        }
        0x1f => { // RRA
            let a = gb.cpu.get_r8(RegisterR8::A);
            let carry_in = gb.cpu.get_flag(CpuFlag::Carry) as u8;
            let result = (a >> 1) | (carry_in << 7);
            gb.cpu.set_r8(RegisterR8::A, result);
            gb.cpu.set_flag(CpuFlag::Zero, false);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, (a & 0x01) != 0);
            4
        }

        0x08 => { // LD (a16),SP
            let addr = gb.cpu.fetch_u16();
            let sp = gb.cpu.get_stack_pointer();
            gb.cpu.get_mmu_mut().write_u8(addr, get_low(sp));
            gb.cpu.get_mmu_mut().write_u8(addr.wrapping_add(1), get_high(sp));
            20
        }

        0x09 | 0x19 | 0x29 | 0x39 => {
            let value = gb.cpu.get_r16(r16_group1(opcode >> 4));
            add_hl(gb, value);
            8
        }

        0x10 => {
            gb.cpu.fetch_u8();
            if gb.cpu.get_mmu_mut().get_peripherals_mut().mem.commit_speed_switch() {
                // speed switch requested via KEY1 bit 0: STOP just performs the
                // switch and resumes immediately instead of halting.
            } else {
                gb.cpu.enter_stop();
            }
            4
        } // STOP (followed by a padding byte)
        0x76 => { gb.cpu.enter_halt(); 4 } // HALT

        0x18 => { let offset = gb.cpu.fetch_u8() as i8; jr(gb, offset); 12 }
        0x20 | 0x28 | 0x30 | 0x38 => {
            let cc = (opcode >> 3) & 3;
            let offset = gb.cpu.fetch_u8() as i8;
            if check_condition(gb, cc) {
                jr(gb, offset);
                12
            } else {
                8
            }
        }

        0x27 => { daa(gb); 4 }
        0x2f => { // CPL
            let a = gb.cpu.get_r8(RegisterR8::A);
            gb.cpu.set_r8(RegisterR8::A, !a);
            gb.cpu.set_flag(CpuFlag::Negative, true);
            gb.cpu.set_flag(CpuFlag::HalfCarry, true);
            4
        }
        0x37 => { // SCF
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, true);
            4
        }
        0x3f => { // CCF
            let carry = gb.cpu.get_flag(CpuFlag::Carry);
            gb.cpu.set_flag(CpuFlag::Negative, false);
            gb.cpu.set_flag(CpuFlag::HalfCarry, false);
            gb.cpu.set_flag(CpuFlag::Carry, !carry);
            4
        }

        0xc0 | 0xc8 | 0xd0 | 0xd8 => {
            let cc = (opcode >> 3) & 3;
            if check_condition(gb, cc) {
                let pc = gb.cpu.pop_u16();
                gb.cpu.set_instruction_pointer(pc);
                20
            } else {
                8
            }
        }
        0xc9 => { let pc = gb.cpu.pop_u16(); gb.cpu.set_instruction_pointer(pc); 16 }
        0xd9 => {
            let pc = gb.cpu.pop_u16();
            gb.cpu.set_instruction_pointer(pc);
            gb.cpu.get_mmu_mut().get_peripherals_mut().interrupts.ime = true;
            16
        }

        0xc1 | 0xd1 | 0xe1 | 0xf1 => {
            let reg = r16_group2(opcode >> 4);
            let value = gb.cpu.pop_u16();
            gb.cpu.set_r16(reg, value);
            12
        }
        0xc5 | 0xd5 | 0xe5 | 0xf5 => {
            let reg = r16_group2(opcode >> 4);
            let value = gb.cpu.get_r16(reg);
            gb.cpu.push_u16(value);
            16
        }

        0xc2 | 0xca | 0xd2 | 0xda => {
            let cc = (opcode >> 3) & 3;
            let addr = gb.cpu.fetch_u16();
            if check_condition(gb, cc) {
                gb.cpu.set_instruction_pointer(addr);
                16
            } else {
                12
            }
        }
        0xc3 => { let addr = gb.cpu.fetch_u16(); gb.cpu.set_instruction_pointer(addr); 16 }
        0xe9 => { let addr = gb.cpu.get_r16(RegisterR16::HL); gb.cpu.set_instruction_pointer(addr); 4 }

        0xc4 | 0xcc | 0xd4 | 0xdc => {
            let cc = (opcode >> 3) & 3;
            let addr = gb.cpu.fetch_u16();
            if check_condition(gb, cc) {
                let pc = gb.cpu.get_instruction_pointer();
                gb.cpu.push_u16(pc);
                gb.cpu.set_instruction_pointer(addr);
                24
            } else {
                12
            }
        }
        0xcd => {
            let addr = gb.cpu.fetch_u16();
            let pc = gb.cpu.get_instruction_pointer();
            gb.cpu.push_u16(pc);
            gb.cpu.set_instruction_pointer(addr);
            24
        }

        0xc6 => { let value = gb.cpu.fetch_u8(); add8(gb, value, false); 8 }
        0xce => { let value = gb.cpu.fetch_u8(); add8(gb, value, gb.cpu.get_flag(CpuFlag::Carry)); 8 }
        0xd6 => { let value = gb.cpu.fetch_u8(); sub8(gb, value, false, true); 8 }
        0xde => { let value = gb.cpu.fetch_u8(); sub8(gb, value, gb.cpu.get_flag(CpuFlag::Carry), true); 8 }
        0xe6 => { let value = gb.cpu.fetch_u8(); and8(gb, value); 8 }
        0xee => { let value = gb.cpu.fetch_u8(); xor8(gb, value); 8 }
        0xf6 => { let value = gb.cpu.fetch_u8(); or8(gb, value); 8 }
        0xfe => { let value = gb.cpu.fetch_u8(); sub8(gb, value, false, false); 8 }

        0xc7 | 0xcf | 0xd7 | 0xdf | 0xe7 | 0xef | 0xf7 | 0xff => {
            let pc = gb.cpu.get_instruction_pointer();
            gb.cpu.push_u16(pc);
            gb.cpu.set_instruction_pointer((opcode & 0x38) as u16);
            16
        }

        0xe0 => { let offset = gb.cpu.fetch_u8(); let a = gb.cpu.get_r8(RegisterR8::A); gb.cpu.get_mmu_mut().write_u8(0xff00 + offset as u16, a); 12 }
        0xf0 => { let offset = gb.cpu.fetch_u8(); let v = gb.cpu.get_mmu_mut().read_u8(0xff00 + offset as u16); gb.cpu.set_r8(RegisterR8::A, v); 12 }
        0xe2 => { let c = gb.cpu.get_r8(RegisterR8::C); let a = gb.cpu.get_r8(RegisterR8::A); gb.cpu.get_mmu_mut().write_u8(0xff00 + c as u16, a); 8 }
        0xf2 => { let c = gb.cpu.get_r8(RegisterR8::C); let v = gb.cpu.get_mmu_mut().read_u8(0xff00 + c as u16); gb.cpu.set_r8(RegisterR8::A, v); 8 }
        0xea => { let addr = gb.cpu.fetch_u16(); let a = gb.cpu.get_r8(RegisterR8::A); gb.cpu.get_mmu_mut().write_u8(addr, a); 16 }
        0xfa => { let addr = gb.cpu.fetch_u16(); let v = gb.cpu.get_mmu_mut().read_u8(addr); gb.cpu.set_r8(RegisterR8::A, v); 16 }

        0xe8 => { let offset = gb.cpu.fetch_u8() as i8; let sp = add_sp_signed(gb, offset); gb.cpu.set_stack_pointer(sp); 16 }
        0xf8 => { let offset = gb.cpu.fetch_u8() as i8; let result = add_sp_signed(gb, offset); gb.cpu.set_r16(RegisterR16::HL, result); 12 }
        0xf9 => { let hl = gb.cpu.get_r16(RegisterR16::HL); gb.cpu.set_stack_pointer(hl); 8 }

        0xf3 => { gb.cpu.get_mmu_mut().get_peripherals_mut().interrupts.ime = false; 4 }
        0xfb => { gb.cpu.get_mmu_mut().get_peripherals_mut().interrupts.ime = true; 4 }

        // 0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb..0xed, 0xf4, 0xfc, 0xfd are unused on real hardware.
        _ => 4,
    }
}
