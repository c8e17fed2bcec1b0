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

//! The 4-timer chain. Each timer either free-runs off a prescaled system
//! clock or, in count-up mode, increments once per overflow of the timer
//! below it. Timer 0 and 1 overflows additionally feed the audio FIFOs on
//! real hardware; since sound is out of scope here that coupling is a no-op,
//! but the overflow signal is still reported so [crate::gba::dma]'s special
//! trigger path has something to hook into later.

const TIMER_COUNT: usize = 4;
const PRESCALER_SHIFTS: [u32; 4] = [0, 6, 8, 10]; // /1, /64, /256, /1024

#[derive(Copy, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Timer {
    reload: u16,
    counter: u16,
    control: u16,
    prescaler_accum: u32,
}

impl Timer {
    fn enabled(&self) -> bool { self.control & (1 << 7) != 0 }
    fn count_up(&self) -> bool { self.control & (1 << 2) != 0 }
    fn irq_enabled(&self) -> bool { self.control & (1 << 6) != 0 }
    fn prescaler_shift(&self) -> u32 { PRESCALER_SHIFTS[(self.control & 0b11) as usize] }

    /// Advances by one tick (already chained or already prescaled); returns
    /// true on overflow, reloading the counter.
    fn tick_once(&mut self) -> bool {
        let (next, overflowed) = self.counter.overflowing_add(1);
        if overflowed {
            self.counter = self.reload;
        } else {
            self.counter = next;
        }
        overflowed
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerChain {
    timers: [Timer; TIMER_COUNT],
}

impl TimerChain {
    pub fn new() -> Self {
        Self { timers: [Timer::default(); TIMER_COUNT] }
    }

    /// Advances every timer by `cycles` system cycles, returning which
    /// timers overflowed this call so the bus can raise their IRQ bits.
    pub fn step(&mut self, cycles: u32) -> [bool; TIMER_COUNT] {
        let mut overflowed = [false; TIMER_COUNT];

        for index in 0..TIMER_COUNT {
            if !self.timers[index].enabled() {
                continue;
            }

            if self.timers[index].count_up() {
                // Count-up timers are driven by the previous timer's
                // overflow below, not the system clock; timer 0 can't be
                // count-up since there's no timer below it.
                continue;
            }

            let shift = self.timers[index].prescaler_shift();
            self.timers[index].prescaler_accum += cycles;
            let ticks = self.timers[index].prescaler_accum >> shift;
            self.timers[index].prescaler_accum &= (1 << shift) - 1;

            let mut chain_overflow = false;
            for _ in 0..ticks {
                if self.timers[index].tick_once() {
                    chain_overflow = true;
                }
            }

            if chain_overflow {
                overflowed[index] = true;
                self.propagate_count_up(index, &mut overflowed);
            }
        }

        overflowed
    }

    fn propagate_count_up(&mut self, source: usize, overflowed: &mut [bool; TIMER_COUNT]) {
        let next = source + 1;
        if next >= TIMER_COUNT || !self.timers[next].enabled() || !self.timers[next].count_up() {
            return;
        }
        if self.timers[next].tick_once() {
            overflowed[next] = true;
            self.propagate_count_up(next, overflowed);
        }
    }

    /// Whether timer `index` is configured to raise its IRQ on overflow;
    /// callers combine this with [Self::step]'s overflow signal since the
    /// two are independent (a FIFO/DMA trigger cares about overflow alone).
    pub fn irq_enabled(&self, index: usize) -> bool {
        self.timers[index].irq_enabled()
    }

    pub fn on_io_write(&mut self, offset: u32, value: u8) {
        let Some((index, field)) = Self::decode_register(offset) else { return };
        let timer = &mut self.timers[index];

        match field {
            RegisterField::ReloadLow => timer.reload = (timer.reload & 0xff00) | value as u16,
            RegisterField::ReloadHigh => timer.reload = (timer.reload & 0x00ff) | ((value as u16) << 8),
            RegisterField::ControlLow => {
                let was_enabled = timer.enabled();
                timer.control = (timer.control & 0xff00) | value as u16;
                if !was_enabled && timer.enabled() {
                    timer.counter = timer.reload;
                    timer.prescaler_accum = 0;
                }
            }
        }
    }

    fn decode_register(offset: u32) -> Option<(usize, RegisterField)> {
        // TM0CNT_L begins at IO offset 0x100, each timer block is 4 bytes
        // (reload/counter u16 aliased, control u16).
        if !(0x100..0x110).contains(&offset) {
            return None;
        }
        let relative = offset - 0x100;
        let index = (relative / 4) as usize;
        let field = match relative % 4 {
            0 => RegisterField::ReloadLow,
            1 => RegisterField::ReloadHigh,
            2 => RegisterField::ControlLow,
            _ => return None,
        };
        Some((index, field))
    }

    pub fn counter(&self, index: usize) -> u16 {
        self.timers[index].counter
    }
}

impl Default for TimerChain {
    fn default() -> Self {
        Self::new()
    }
}

enum RegisterField {
    ReloadLow,
    ReloadHigh,
    ControlLow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_timer_does_not_advance() {
        let mut timers = TimerChain::new();
        timers.on_io_write(0x100, 0x00);
        timers.on_io_write(0x101, 0xff);
        let overflowed = timers.step(10);
        assert_eq!(overflowed, [false; 4]);
        assert_eq!(timers.counter(0), 0);
    }

    #[test]
    fn enabled_timer_overflows_and_reloads() {
        let mut timers = TimerChain::new();
        timers.on_io_write(0x100, 0xfe); // reload = 0xfffe
        timers.on_io_write(0x101, 0xff);
        timers.on_io_write(0x102, 0b1000_0000); // enable, prescaler /1, no IRQ
        // step(0xfffe -> 0xffff -> overflow, reload to 0xfffe): the overflow
        // is reported even though this timer's IRQ is disabled.
        let overflowed = timers.step(2);
        assert!(overflowed[0]);
        assert!(!timers.irq_enabled(0));
        assert_eq!(timers.counter(0), 0xfffe);
    }

    #[test]
    fn count_up_timer_advances_on_lower_timer_overflow() {
        let mut timers = TimerChain::new();
        // timer 0: reload 0xffff (overflows every tick), enabled, prescaler /1
        timers.on_io_write(0x100, 0xff);
        timers.on_io_write(0x101, 0xff);
        timers.on_io_write(0x102, 0b1000_0000);
        // timer 1: count-up, enabled
        timers.on_io_write(0x104, 0x00);
        timers.on_io_write(0x105, 0x00);
        timers.on_io_write(0x106, 0b1000_0100);

        timers.step(1);
        assert_eq!(timers.counter(1), 1);
    }
}
