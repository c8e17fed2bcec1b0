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

//! The Sharp SM83 register file and instruction fetch/step logic.

#[cfg(feature = "std")]
use core::fmt::{Display, Formatter};

use crate::cpu::interrupts::Interrupt;
use crate::cpu::opcode::{execute_opcode, Instruction, OpCode};
use crate::mmu::memory_bus::MemoryBusConnection;
use crate::mmu::mmu::Mmu;
use crate::utils::{get_high, get_low, to_u16};

pub type Clock = u64;

/// The CPU clock speed in single-speed mode, in Hz.
pub const CPU_CLOCK_SPEED: u32 = 4_194_304;


/// Individual flag bits of the F register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CpuFlag {
    Carry,
    HalfCarry,
    Negative,
    Zero,
}

impl CpuFlag {
    pub fn bit(&self) -> u8 {
        match self {
            CpuFlag::Carry     => 4,
            CpuFlag::HalfCarry => 5,
            CpuFlag::Negative  => 6,
            CpuFlag::Zero      => 7,
        }
    }
}


/// The eight 8-bit registers, addressable individually.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterR8 {
    A, F, B, C, D, E, H, L,
}


/// The four 16-bit register pairs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterR16 {
    AF, BC, DE, HL, SP,
}


#[derive(Copy, Clone, Eq, PartialEq)]
enum RunState {
    Running,
    Halted,
    Stopped,
}


/// Owns the register file, the memory bus and the fetch/execute loop of a
/// single CPU core. The opcode handlers themselves live in [crate::cpu::opcode]
/// and operate on the owning [crate::gameboy::GameBoy], since they need access
/// to peripherals beyond the CPU's own registers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cpu {
    a: u8,
    f: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    sp: u16,
    pc: u16,

    #[cfg_attr(feature = "serde", serde(skip))]
    run_state: RunStateSerde,

    mmu: Mmu,
}

/// [RunState] isn't meaningfully serializable across a savestate boundary in a
/// way that survives a paused-mid-HALT snapshot faithfully either way, so this
/// wrapper just resets to running on deserialization; a loaded state always
/// resumes from a clean fetch boundary.
#[derive(Copy, Clone)]
struct RunStateSerde(RunState);

impl Default for RunStateSerde {
    fn default() -> Self {
        RunStateSerde(RunState::Running)
    }
}

impl Cpu {
    pub fn new(mmu: Mmu) -> Self {
        Self {
            a: 0, f: 0, b: 0, c: 0, d: 0, e: 0, h: 0, l: 0,
            sp: 0, pc: 0,
            run_state: RunStateSerde::default(),
            mmu,
        }
    }

    pub fn get_mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn get_mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    pub fn get_r8(&self, r: RegisterR8) -> u8 {
        match r {
            RegisterR8::A => self.a,
            RegisterR8::F => self.f & 0xf0,
            RegisterR8::B => self.b,
            RegisterR8::C => self.c,
            RegisterR8::D => self.d,
            RegisterR8::E => self.e,
            RegisterR8::H => self.h,
            RegisterR8::L => self.l,
        }
    }

    pub fn set_r8(&mut self, r: RegisterR8, value: u8) {
        match r {
            RegisterR8::A => self.a = value,
            RegisterR8::F => self.f = value & 0xf0,
            RegisterR8::B => self.b = value,
            RegisterR8::C => self.c = value,
            RegisterR8::D => self.d = value,
            RegisterR8::E => self.e = value,
            RegisterR8::H => self.h = value,
            RegisterR8::L => self.l = value,
        }
    }

    pub fn get_r16(&self, r: RegisterR16) -> u16 {
        match r {
            RegisterR16::AF => to_u16(self.a, self.f & 0xf0),
            RegisterR16::BC => to_u16(self.b, self.c),
            RegisterR16::DE => to_u16(self.d, self.e),
            RegisterR16::HL => to_u16(self.h, self.l),
            RegisterR16::SP => self.sp,
        }
    }

    pub fn set_r16(&mut self, r: RegisterR16, value: u16) {
        match r {
            RegisterR16::AF => { self.a = get_high(value); self.f = get_low(value) & 0xf0; }
            RegisterR16::BC => { self.b = get_high(value); self.c = get_low(value); }
            RegisterR16::DE => { self.d = get_high(value); self.e = get_low(value); }
            RegisterR16::HL => { self.h = get_high(value); self.l = get_low(value); }
            RegisterR16::SP => self.sp = value,
        }
    }

    pub fn get_flag(&self, flag: CpuFlag) -> bool {
        (self.f & (1 << flag.bit())) != 0
    }

    pub fn set_flag(&mut self, flag: CpuFlag, value: bool) {
        if value {
            self.f |= 1 << flag.bit();
        } else {
            self.f &= !(1 << flag.bit());
        }
        self.f &= 0xf0;
    }

    pub fn get_instruction_pointer(&self) -> u16 {
        self.pc
    }

    pub fn set_instruction_pointer(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn get_stack_pointer(&self) -> u16 {
        self.sp
    }

    pub fn set_stack_pointer(&mut self, sp: u16) {
        self.sp = sp;
    }

    /// Whether the CPU is fetching and executing instructions normally.
    /// `false` while halted (STOP is treated the same as HALT for stepping
    /// purposes; the speed switch itself is handled by [crate::mmu::memory::Memory]).
    pub fn is_running(&self) -> bool {
        self.run_state.0 == RunState::Running
    }

    pub fn enter_halt(&mut self) {
        self.run_state.0 = RunState::Halted;
    }

    pub fn enter_stop(&mut self) {
        self.run_state.0 = RunState::Stopped;
    }

    fn wake_up(&mut self) {
        self.run_state.0 = RunState::Running;
    }

    /// Reads the byte at PC and advances PC by one.
    pub fn fetch_u8(&mut self) -> u8 {
        let value = self.mmu.read_u8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Reads the word at PC (little endian) and advances PC by two.
    pub fn fetch_u16(&mut self) -> u16 {
        let lo = self.fetch_u8();
        let hi = self.fetch_u8();
        to_u16(hi, lo)
    }

    pub fn push_u16(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        self.mmu.write_u8(self.sp, get_low(value));
        self.mmu.write_u8(self.sp.wrapping_add(1), get_high(value));
    }

    pub fn pop_u16(&mut self) -> u16 {
        let lo = self.mmu.read_u8(self.sp);
        let hi = self.mmu.read_u8(self.sp.wrapping_add(1));
        self.sp = self.sp.wrapping_add(2);
        to_u16(hi, lo)
    }

    /// Fetches the next instruction's opcode byte(s) and produces an [Instruction]
    /// ready to be executed.
    pub fn fetch_next_instruction(&mut self) -> Instruction {
        let opcode_address = self.pc;
        let first_byte = self.fetch_u8();

        let (opcode_id, prefixed) = if first_byte == 0xcb {
            (0xcb00u16 | self.fetch_u8() as u16, true)
        } else {
            (first_byte as u16, false)
        };

        Instruction {
            opcode_address,
            opcode_id,
            prefixed,
            opcode: OpCode {
                cycles_ahead: 0,
                proc: execute_opcode,
            },
        }
    }

    /// If IME is set and an interrupt is pending, jumps to its vector and returns
    /// the number of cycles the dispatch takes. Also used to wake the CPU from
    /// HALT/STOP, in which case no interrupt is serviced but the cycles it would
    /// have cost while fetching-and-ignoring still apply.
    pub fn handle_interrupts(&mut self) -> Option<Clock> {
        let pending = self.mmu.get_peripherals().interrupts.pending_interrupt();

        if pending.is_some() && !self.is_running() {
            self.wake_up();
        }

        let serviced = self.mmu.get_peripherals().interrupts.should_interrupt();

        if let Some(interrupt) = serviced {
            self.dispatch_interrupt(interrupt);
            return Some(20);
        }

        None
    }

    fn dispatch_interrupt(&mut self, interrupt: Interrupt) {
        self.mmu.get_peripherals_mut().interrupts.ime = false;
        self.mmu.get_peripherals_mut().interrupts.acknowledge(interrupt);

        let pc = self.pc;
        self.push_u16(pc);
        self.pc = interrupt.vector();
    }

    /// Runs component updates local to the CPU itself (currently none beyond
    /// bookkeeping; kept for symmetry with the other peripherals' `update`).
    pub fn update(&mut self, _cycles: Clock) {
    }
}

#[cfg(feature = "std")]
impl Display for Cpu {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "A:{:02x} F:{:02x} B:{:02x} C:{:02x} D:{:02x} E:{:02x} H:{:02x} L:{:02x} SP:{:04x} PC:{:04x}",
            self.a, self.f, self.b, self.c, self.d, self.e, self.h, self.l, self.sp, self.pc,
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_type::{DeviceType, EmulationType};
    use crate::gameboy::{DeviceConfig, Peripherals};
    use crate::input::Input;
    use crate::cpu::interrupts::InterruptRegisters;
    use crate::dma::Dma;
    use crate::mmu::memory::Memory;
    use crate::ppu::ppu::Ppu;
    use crate::serial::SerialPort;
    use crate::timer::Timer;

    fn test_cpu() -> Cpu {
        let config = DeviceConfig { device: DeviceType::GameBoyDmg, emulation: EmulationType::DMG, print_opcodes: false };
        let peripherals = Peripherals {
            ppu: Ppu::new(config),
            mem: Memory::new(config),
            dma: Dma::new(),
            timer: Timer::new(),
            input: Input::new(),
            serial: SerialPort::new(),
            interrupts: InterruptRegisters::new(),
        };
        Cpu::new(Mmu::new(peripherals))
    }

    #[test]
    fn af_masks_out_low_flag_bits() {
        let mut cpu = test_cpu();
        cpu.set_r16(RegisterR16::AF, 0x1234);
        assert_eq!(cpu.get_r16(RegisterR16::AF), 0x1230);
    }

    #[test]
    fn push_pop_roundtrip() {
        let mut cpu = test_cpu();
        cpu.set_stack_pointer(0xfffe);
        cpu.push_u16(0xbeef);
        assert_eq!(cpu.pop_u16(), 0xbeef);
    }
}
