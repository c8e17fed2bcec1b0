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

//! One executor per THUMB instruction format (the 19 families GBATEK-style
//! documentation lists), reached through [crate::gba::decode]'s 256-entry
//! table indexed by the top instruction byte.

use crate::gba::arm_ops::{add_with_flags, adc_with_flags, sbc_with_flags, sub_with_flags};
use crate::gba::bus::Bus;
use crate::gba::cpu::{barrel_shift, condition_holds, Cpu, Exception};
use crate::gba::registers::{State, LINK_REG, PC_REG, SP_REG};

pub fn move_shifted_register(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let op = ((instruction >> 11) & 0b11) as u32;
    let amount = ((instruction >> 6) & 0x1f) as u32;
    let rs = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;

    let carry_in = cpu.registers.cpsr.carry();
    let rs_val = cpu.read_reg_for_operand(rs);
    let (result, carry) = barrel_shift(rs_val, op, amount, carry_in);

    cpu.registers.cpsr.set_logical_nz(result, carry);
    cpu.write_reg(bus, rd, result);
    1
}

pub fn add_subtract(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let is_sub = (instruction >> 9) & 1 == 1;
    let immediate = (instruction >> 10) & 1 == 1;
    let field = ((instruction >> 6) & 0b111) as u32;
    let rs = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;

    let rs_val = cpu.read_reg_for_operand(rs);
    let operand = if immediate { field } else { cpu.read_reg_for_operand(field as usize) };

    let (result, carry, overflow) = if is_sub {
        sub_with_flags(rs_val, operand)
    } else {
        add_with_flags(rs_val, operand)
    };

    cpu.registers.cpsr.set_arithmetic_nzcv(result, carry, overflow);
    cpu.write_reg(bus, rd, result);
    1
}

pub fn immediate_alu(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let op = (instruction >> 11) & 0b11;
    let rd = ((instruction >> 8) & 0b111) as usize;
    let imm = (instruction & 0xff) as u32;
    let rd_val = cpu.read_reg_for_operand(rd);

    match op {
        0 => {
            cpu.registers.cpsr.set_logical_nz(imm, cpu.registers.cpsr.carry());
            cpu.write_reg(bus, rd, imm);
        }
        1 => {
            let (r, c, v) = sub_with_flags(rd_val, imm);
            cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v);
        }
        2 => {
            let (r, c, v) = add_with_flags(rd_val, imm);
            cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v);
            cpu.write_reg(bus, rd, r);
        }
        _ => {
            let (r, c, v) = sub_with_flags(rd_val, imm);
            cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v);
            cpu.write_reg(bus, rd, r);
        }
    }

    1
}

pub fn alu_operations(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let op = (instruction >> 6) & 0xf;
    let rs = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;
    let rd_val = cpu.read_reg_for_operand(rd);
    let rs_val = cpu.read_reg_for_operand(rs);
    let carry_in = cpu.registers.cpsr.carry();

    let set_nz = |cpu: &mut Cpu, result: u32| {
        cpu.registers.cpsr.set_negative(result & 0x8000_0000 != 0);
        cpu.registers.cpsr.set_zero(result == 0);
    };

    match op {
        0 => { let r = rd_val & rs_val; cpu.registers.cpsr.set_logical_nz(r, carry_in); cpu.write_reg(bus, rd, r); }
        1 => { let r = rd_val ^ rs_val; cpu.registers.cpsr.set_logical_nz(r, carry_in); cpu.write_reg(bus, rd, r); }
        2 => { let (r, c) = barrel_shift(rd_val, 0b00, rs_val & 0xff, carry_in); cpu.registers.cpsr.set_logical_nz(r, c); cpu.write_reg(bus, rd, r); }
        3 => { let (r, c) = barrel_shift(rd_val, 0b01, rs_val & 0xff, carry_in); cpu.registers.cpsr.set_logical_nz(r, c); cpu.write_reg(bus, rd, r); }
        4 => { let (r, c) = barrel_shift(rd_val, 0b10, rs_val & 0xff, carry_in); cpu.registers.cpsr.set_logical_nz(r, c); cpu.write_reg(bus, rd, r); }
        5 => { let (r, c, v) = adc_with_flags(rd_val, rs_val, carry_in); cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v); cpu.write_reg(bus, rd, r); }
        6 => { let (r, c, v) = sbc_with_flags(rd_val, rs_val, carry_in); cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v); cpu.write_reg(bus, rd, r); }
        7 => { let (r, c) = barrel_shift(rd_val, 0b11, rs_val & 0xff, carry_in); cpu.registers.cpsr.set_logical_nz(r, c); cpu.write_reg(bus, rd, r); }
        8 => { let r = rd_val & rs_val; set_nz(cpu, r); }
        9 => { let (r, c, v) = sub_with_flags(0, rs_val); cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v); cpu.write_reg(bus, rd, r); }
        10 => { let (r, c, v) = sub_with_flags(rd_val, rs_val); cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v); }
        11 => { let (r, c, v) = add_with_flags(rd_val, rs_val); cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v); }
        12 => { let r = rd_val | rs_val; set_nz(cpu, r); cpu.write_reg(bus, rd, r); }
        13 => { let r = rd_val.wrapping_mul(rs_val); set_nz(cpu, r); cpu.write_reg(bus, rd, r); }
        14 => { let r = rd_val & !rs_val; set_nz(cpu, r); cpu.write_reg(bus, rd, r); }
        _ => { let r = !rs_val; set_nz(cpu, r); cpu.write_reg(bus, rd, r); }
    }

    1
}

pub fn hi_register_bx(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let op = (instruction >> 8) & 0b11;
    let h1 = (instruction >> 7) & 1;
    let h2 = (instruction >> 6) & 1;
    let rs = ((instruction >> 3) & 0b111) as usize + if h2 == 1 { 8 } else { 0 };
    let rd = (instruction & 0b111) as usize + if h1 == 1 { 8 } else { 0 };

    match op {
        0 => {
            let result = cpu.read_reg_for_operand(rd).wrapping_add(cpu.read_reg_for_operand(rs));
            cpu.write_reg(bus, rd, result);
        }
        1 => {
            let (r, c, v) = sub_with_flags(cpu.read_reg_for_operand(rd), cpu.read_reg_for_operand(rs));
            cpu.registers.cpsr.set_arithmetic_nzcv(r, c, v);
        }
        2 => {
            let value = cpu.read_reg_for_operand(rs);
            cpu.write_reg(bus, rd, value);
        }
        _ => {
            let target = cpu.read_reg_for_operand(rs);
            cpu.switch_state(if target & 1 == 1 { State::Thumb } else { State::Arm });
            cpu.write_reg(bus, PC_REG, target & !1);
        }
    }

    3
}

pub fn pc_relative_load(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let rd = ((instruction >> 8) & 0b111) as usize;
    let imm = (instruction & 0xff) as u32 * 4;
    let base = cpu.read_reg_for_operand(PC_REG) & !0b11;
    let value = bus.read_32(base.wrapping_add(imm));
    cpu.write_reg(bus, rd, value);
    3
}

pub fn load_store_register_offset(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let load = (instruction >> 11) & 1 == 1;
    let byte = (instruction >> 10) & 1 == 1;
    let ro = ((instruction >> 6) & 0b111) as usize;
    let rb = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;

    let addr = cpu.read_reg_for_operand(rb).wrapping_add(cpu.read_reg_for_operand(ro));
    if load {
        let value = if byte { bus.read_8(addr) as u32 } else { bus.read_32(addr) };
        cpu.write_reg(bus, rd, value);
    } else {
        let value = cpu.read_reg_for_operand(rd);
        if byte { bus.write_8(addr, value as u8); } else { bus.write_32(addr, value); }
    }
    2
}

pub fn load_store_sign_extended(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let h = (instruction >> 11) & 1;
    let s = (instruction >> 10) & 1;
    let ro = ((instruction >> 6) & 0b111) as usize;
    let rb = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;

    let addr = cpu.read_reg_for_operand(rb).wrapping_add(cpu.read_reg_for_operand(ro));

    match (s, h) {
        (0, 0) => bus.write_16(addr, cpu.read_reg_for_operand(rd) as u16),
        (0, _) => { let v = bus.read_16(addr) as u32; cpu.write_reg(bus, rd, v); }
        (_, 0) => { let v = bus.read_8(addr) as i8 as i32 as u32; cpu.write_reg(bus, rd, v); }
        _ => { let v = bus.read_16(addr) as i16 as i32 as u32; cpu.write_reg(bus, rd, v); }
    }
    2
}

pub fn load_store_immediate_offset(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let byte = (instruction >> 12) & 1 == 1;
    let load = (instruction >> 11) & 1 == 1;
    let imm = ((instruction >> 6) & 0x1f) as u32;
    let rb = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;

    let offset = if byte { imm } else { imm * 4 };
    let addr = cpu.read_reg_for_operand(rb).wrapping_add(offset);

    if load {
        let value = if byte { bus.read_8(addr) as u32 } else { bus.read_32(addr) };
        cpu.write_reg(bus, rd, value);
    } else {
        let value = cpu.read_reg_for_operand(rd);
        if byte { bus.write_8(addr, value as u8); } else { bus.write_32(addr, value); }
    }
    2
}

pub fn load_store_halfword(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let load = (instruction >> 11) & 1 == 1;
    let imm = ((instruction >> 6) & 0x1f) as u32;
    let rb = ((instruction >> 3) & 0b111) as usize;
    let rd = (instruction & 0b111) as usize;

    let addr = cpu.read_reg_for_operand(rb).wrapping_add(imm * 2);
    if load {
        let value = bus.read_16(addr) as u32;
        cpu.write_reg(bus, rd, value);
    } else {
        bus.write_16(addr, cpu.read_reg_for_operand(rd) as u16);
    }
    2
}

pub fn sp_relative_load_store(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let load = (instruction >> 11) & 1 == 1;
    let rd = ((instruction >> 8) & 0b111) as usize;
    let imm = (instruction & 0xff) as u32 * 4;

    let addr = cpu.read_reg_for_operand(SP_REG).wrapping_add(imm);
    if load {
        let value = bus.read_32(addr);
        cpu.write_reg(bus, rd, value);
    } else {
        bus.write_32(addr, cpu.read_reg_for_operand(rd));
    }
    2
}

pub fn load_address(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let from_sp = (instruction >> 11) & 1 == 1;
    let rd = ((instruction >> 8) & 0b111) as usize;
    let imm = (instruction & 0xff) as u32 * 4;

    let base = if from_sp {
        cpu.read_reg_for_operand(SP_REG)
    } else {
        cpu.read_reg_for_operand(PC_REG) & !0b11
    };
    cpu.write_reg(bus, rd, base.wrapping_add(imm));
    1
}

pub fn add_offset_to_sp(cpu: &mut Cpu, _bus: &mut Bus, instruction: u16) -> u32 {
    let negative = (instruction >> 7) & 1 == 1;
    let imm = (instruction & 0x7f) as u32 * 4;
    let sp = cpu.registers.read(SP_REG);
    let new_sp = if negative { sp.wrapping_sub(imm) } else { sp.wrapping_add(imm) };
    cpu.registers.write(SP_REG, new_sp);
    1
}

pub fn push_pop(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let pop = (instruction >> 11) & 1 == 1;
    let store_lr_load_pc = (instruction >> 8) & 1 == 1;
    let reg_list = instruction & 0xff;

    let mut sp = cpu.registers.read(SP_REG);

    if pop {
        for reg in 0..8 {
            if reg_list & (1 << reg) != 0 {
                let value = bus.read_32(sp);
                cpu.registers.write(reg, value);
                sp = sp.wrapping_add(4);
            }
        }
        if store_lr_load_pc {
            let value = bus.read_32(sp);
            sp = sp.wrapping_add(4);
            cpu.write_reg(bus, PC_REG, value & !1);
        }
    } else {
        if store_lr_load_pc {
            sp = sp.wrapping_sub(4);
            bus.write_32(sp, cpu.registers.read(LINK_REG));
        }
        for reg in (0..8).rev() {
            if reg_list & (1 << reg) != 0 {
                sp = sp.wrapping_sub(4);
                bus.write_32(sp, cpu.read_reg_for_operand(reg));
            }
        }
    }

    cpu.registers.write(SP_REG, sp);
    3
}

pub fn multiple_load_store(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let load = (instruction >> 11) & 1 == 1;
    let rb = ((instruction >> 8) & 0b111) as usize;
    let reg_list = instruction & 0xff;

    let mut addr = cpu.registers.read(rb);
    for reg in 0..8 {
        if reg_list & (1 << reg) != 0 {
            if load {
                let value = bus.read_32(addr);
                cpu.registers.write(reg, value);
            } else {
                bus.write_32(addr, cpu.read_reg_for_operand(reg));
            }
            addr = addr.wrapping_add(4);
        }
    }
    cpu.registers.write(rb, addr);
    2
}

pub fn conditional_branch(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let condition = ((instruction >> 8) & 0xf) as u32;
    let offset = ((instruction & 0xff) as i8 as i32) * 2;

    if condition_holds(cpu.registers.cpsr, condition) {
        let target = (cpu.read_reg_for_operand(PC_REG) as i32).wrapping_add(offset) as u32;
        cpu.write_reg(bus, PC_REG, target);
        3
    } else {
        1
    }
}

pub fn software_interrupt(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    crate::gba::hle::dispatch(cpu, bus, (instruction & 0xff) as u8);
    3
}

pub fn unconditional_branch(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let raw = (instruction & 0x7ff) as i32;
    let offset = ((raw << 21) >> 21) * 2;
    let target = (cpu.read_reg_for_operand(PC_REG) as i32).wrapping_add(offset) as u32;
    cpu.write_reg(bus, PC_REG, target);
    3
}

pub fn long_branch_link(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    let second_half = (instruction >> 11) & 1 == 1;

    if !second_half {
        let raw = (instruction & 0x7ff) as i32;
        let offset = ((raw << 21) >> 21) as u32;
        let lr_value = cpu.read_reg_for_operand(PC_REG).wrapping_add(offset.wrapping_shl(12));
        cpu.registers.write(LINK_REG, lr_value);
        1
    } else {
        let offset = (instruction & 0x7ff) as u32;
        let return_addr = cpu.read_reg(PC_REG).wrapping_sub(2) | 1;
        let target = cpu.read_reg_for_operand(LINK_REG).wrapping_add(offset << 1);
        cpu.registers.write(LINK_REG, return_addr);
        cpu.write_reg(bus, PC_REG, target);
        3
    }
}

pub fn undefined(cpu: &mut Cpu, bus: &mut Bus, instruction: u16) -> u32 {
    log::warn!("undefined Thumb instruction {instruction:#06x}, raising an exception");
    cpu.raise_exception(bus, Exception::UndefinedInstruction);
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gba::bus::Bus;

    fn make_bus() -> Bus {
        Bus::new(alloc::vec![0u8; 0x1000])
    }

    #[test]
    fn move_immediate_sets_zero_flag() {
        let mut cpu = Cpu::new();
        let mut bus = make_bus();
        // MOV r0, #0
        let instr: u16 = 0b0010_0000_0000_0000;
        immediate_alu(&mut cpu, &mut bus, instr);
        assert_eq!(cpu.read_reg(0), 0);
        assert!(cpu.registers.cpsr.zero());
    }

    #[test]
    fn add_subtract_immediate_computes_difference() {
        let mut cpu = Cpu::new();
        let mut bus = make_bus();
        cpu.registers.write(0, 10);
        // SUB r2, r0, #3  (op=1,imm_flag=1,field=3,rs=0,rd=2)
        let instr: u16 = 0b0001_1110_1100_0010;
        add_subtract(&mut cpu, &mut bus, instr);
        assert_eq!(cpu.read_reg(2), 7);
    }
}
