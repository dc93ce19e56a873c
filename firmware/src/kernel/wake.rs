// Wake flag signaling between ISRs and the main loop
//
// ISRs set atomic flags; main loop consumes via try_wake().
// Critical section guards riscv32imc (no atomic RMW).
// Uptime tracked in 10ms ticks, one per timer interrupt.

use core::sync::atomic::{AtomicBool, Ordering};

pub const TICK_MS: u32 = 10;

static WAKE_TIMER: AtomicBool = AtomicBool::new(false);

// cs: riscv32imc has no atomic add
static UPTIME_TICKS: critical_section::Mutex<core::cell::Cell<u32>> =
    critical_section::Mutex::new(core::cell::Cell::new(0));

#[derive(Debug, Clone, Copy)]
pub struct WakeFlags {
    pub timer: bool,
}

pub fn try_wake() -> Option<WakeFlags> {
    critical_section::with(|_| {
        let timer = WAKE_TIMER.load(Ordering::Relaxed);
        if !timer {
            return None;
        }
        WAKE_TIMER.store(false, Ordering::Relaxed);
        Some(WakeFlags { timer })
    })
}

#[inline]
pub fn signal_timer() {
    WAKE_TIMER.store(true, Ordering::Release);
    critical_section::with(|cs| {
        let ticks = UPTIME_TICKS.borrow(cs);
        ticks.set(ticks.get().wrapping_add(1));
    });
}

pub fn uptime_ticks() -> u32 {
    critical_section::with(|cs| UPTIME_TICKS.borrow(cs).get())
}

pub fn uptime_secs() -> u32 {
    uptime_ticks() / (1000 / TICK_MS)
}

/// True once every `interval` ticks, measured from `*last`.
pub fn elapsed(last: &mut u32, interval: u32) -> bool {
    let now = uptime_ticks();
    if now.wrapping_sub(*last) >= interval {
        *last = now;
        true
    } else {
        false
    }
}

#[inline]
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "riscv32")]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(not(target_arch = "riscv32"))]
    core::hint::spin_loop();
}
