// click-demo entry point and main loop
//
// Boot sequence: timer -> board -> detect each Click -> kernel
// Main loop: drain scheduler -> WFI -> turn timer ticks into poll jobs
//
// A Click that fails to respond is logged and left out; the rest keep
// running. The IMU is read whenever its INT1 line is high, the radio
// on every tick, everything else on fixed tick intervals.

#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::time::Duration;
use esp_hal::timer::PeriodicTimer;
use esp_hal::timer::timg::TimerGroup;
use log::{debug, info, warn};

use core::cell::RefCell;
use core::fmt::Debug;
use critical_section::Mutex;
use embedded_hal_bus::i2c::RefCellDevice;

use click_demo::board::Board;
use click_demo::kernel::wake::{self, TICK_MS, signal_timer, try_wake};
use click_demo::kernel::{Job, Scheduler};
use click_drivers::I2cRegisters;
use click_drivers::drivers::adxl345::{self, Adxl345};
use click_drivers::drivers::lsm6dsl::{self, Lsm6dsl};
use click_drivers::drivers::mbusrf5::{self, MbusRf5, Mode};
use click_drivers::drivers::mcp3204::{self, Mcp3204};
use click_drivers::drivers::stusb4500::{self, Stusb4500};

esp_bootloader_esp_idf::esp_app_desc!();

const ACCEL_INTERVAL_TICKS: u32 = 10; // 100ms
const ADC_INTERVAL_TICKS: u32 = 50; // 500ms
const USBPD_INTERVAL_TICKS: u32 = 100; // 1s
const STATUS_INTERVAL_TICKS: u32 = 500; // 5s

// collector side of T1 meters
const RADIO_MODE: Mode = Mode::T1Other;

static TIMER0: Mutex<RefCell<Option<PeriodicTimer<'static, esp_hal::Blocking>>>> =
    Mutex::new(RefCell::new(None));

#[esp_hal::handler(priority = esp_hal::interrupt::Priority::Priority1)]
fn timer0_handler() {
    critical_section::with(|cs| {
        if let Some(timer) = TIMER0.borrow_ref_mut(cs).as_mut() {
            timer.clear_interrupt();
        }
    });
    signal_timer();
}

/// Running totals for the periodic status line.
#[derive(Default)]
struct Stats {
    imu_samples: u32,
    accel_samples: u32,
    telegrams: u32,
    errors: u32,
    attached: bool,
}

fn detect<E: Debug>(name: &str, result: click_drivers::Result<(), E>) -> bool {
    match result {
        Ok(()) => {
            info!("{}: ready", name);
            true
        }
        Err(e) => {
            warn!("{}: not detected ({}), skipping", name, e);
            false
        }
    }
}

fn schedule(sched: &mut Scheduler, job: Job) {
    if let Err(e) = sched.push_unique(job) {
        warn!("sched: {}", e);
    }
}

fn report<T, E: Debug>(
    name: &str,
    stats: &mut Stats,
    result: click_drivers::Result<T, E>,
) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            stats.errors += 1;
            warn!("{}: {}", name, e);
            None
        }
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("booting...");

    let timg0 = TimerGroup::new(unsafe { peripherals.TIMG0.clone_unchecked() });
    let mut timer0 = PeriodicTimer::new(timg0.timer0);
    critical_section::with(|cs| {
        timer0.set_interrupt_handler(timer0_handler);
        timer0.start(Duration::from_millis(TICK_MS as u64)).unwrap();
        timer0.listen();
        TIMER0.borrow_ref_mut(cs).replace(timer0);
    });
    info!("timer initialized.");

    let board = Board::init(peripherals);
    let mut delay = Delay::new();
    let i2c = RefCell::new(board.i2c);
    let irq = board.irq;
    info!("hardware initialized.");

    // ── Detect ──────────────────────────────────────────────
    let mut imu = {
        let bus = I2cRegisters::new(RefCellDevice::new(&i2c), lsm6dsl::DEFAULT_ADDRESS);
        let mut dev = Lsm6dsl::new(bus, lsm6dsl::Config::default());
        detect("lsm6dsl", dev.init(&mut delay)).then_some(dev)
    };

    let mut accel = {
        let bus = I2cRegisters::new(RefCellDevice::new(&i2c), adxl345::DEFAULT_ADDRESS);
        let mut dev = Adxl345::new(bus, adxl345::Config::default());
        detect("adxl345", dev.init()).then_some(dev)
    };

    let mut usb_pd = {
        let bus = I2cRegisters::new(RefCellDevice::new(&i2c), stusb4500::DEFAULT_ADDRESS);
        let mut dev = Stusb4500::new(bus, stusb4500::Config { clear_alerts: true });
        detect("stusb4500", dev.init()).then_some(dev)
    };

    // no identity register; a conversion is the best check available
    let mut adc = {
        let mut dev = Mcp3204::new(board.adc, mcp3204::Config::default());
        let result = dev.read_raw(mcp3204::Input::Single(0)).map(|_| ());
        detect("mcp3204", result).then_some(dev)
    };

    let mut radio = {
        let mut dev = MbusRf5::new(
            board.radio.uart,
            board.radio.rst,
            Delay::new(),
            mbusrf5::Config::default(),
        );
        let result = dev.hw_reset().and_then(|()| {
            let (major, minor, patch) = dev.firmware_version()?;
            let serial = dev.serial_number()?;
            info!("mbusrf5: fw {}.{}.{}, serial {:08X}", major, minor, patch, serial);
            dev.set_mode(RADIO_MODE)
        });
        detect("mbusrf5", result).then_some(dev)
    };

    let mut sched = Scheduler::new();
    let mut stats = Stats::default();
    let mut last_accel: u32 = 0;
    let mut last_adc: u32 = 0;
    let mut last_usbpd: u32 = 0;
    let mut last_status: u32 = 0;
    info!("kernel ready.");

    loop {
        // drain all pending jobs by priority (high first, FIFO within tier)
        while let Some(job) = sched.pop() {
            match job {
                Job::PollImu => {
                    let Some(dev) = imu.as_mut() else { continue };
                    if let Some(sample) = report("lsm6dsl", &mut stats, dev.read_all()) {
                        stats.imu_samples += 1;
                        debug!(
                            "imu: accel {:?} gyro {:?} temp {}",
                            sample.accel,
                            sample.gyro,
                            sample.temp_centi_c()
                        );
                    }
                }

                Job::PollRadio => {
                    let Some(dev) = radio.as_mut() else { continue };
                    while let Some(ind) = report("mbusrf5", &mut stats, dev.poll()).flatten() {
                        stats.telegrams += 1;
                        info!(
                            "radio: {} bytes, rssi {:?} dBm: {:02X?}",
                            ind.data().len(),
                            ind.rssi_dbm,
                            ind.data()
                        );
                    }
                }

                Job::PollAccel => {
                    let Some(dev) = accel.as_mut() else { continue };
                    let ready = report("adxl345", &mut stats, dev.data_ready()).unwrap_or(false);
                    if !ready {
                        continue;
                    }
                    if let Some(mg) = report("adxl345", &mut stats, dev.read_mg()) {
                        stats.accel_samples += 1;
                        debug!("accel: {} {} {} mg", mg.x, mg.y, mg.z);
                    }
                }

                Job::PollAdc => {
                    let Some(dev) = adc.as_mut() else { continue };
                    if let Some(raw) = report("mcp3204", &mut stats, dev.read_all_single()) {
                        let mv = raw.map(|r| dev.raw_to_mv(r));
                        info!("adc: {:?} mV", mv);
                    }
                }

                Job::PollUsbPd => {
                    let Some(dev) = usb_pd.as_mut() else { continue };
                    if irq.pd_alert.is_low() {
                        // reading the status releases ALERT
                        let _ = report("stusb4500", &mut stats, dev.read_alert_status());
                    }
                    let Some(attached) = report("stusb4500", &mut stats, dev.is_attached()) else {
                        continue;
                    };
                    if attached == stats.attached {
                        continue;
                    }
                    stats.attached = attached;
                    if !attached {
                        info!("usb-pd: detached");
                        continue;
                    }
                    let Some(rdo) = report("stusb4500", &mut stats, dev.read_rdo()) else {
                        continue;
                    };
                    if !rdo.has_contract() {
                        info!("usb-pd: attached, no contract yet");
                        continue;
                    }
                    info!(
                        "usb-pd: attached, PDO{} {}/{} mA (mismatch: {})",
                        rdo.object_position(),
                        rdo.operating_current_ma(),
                        rdo.max_current_ma(),
                        rdo.capability_mismatch()
                    );
                }

                Job::ReportStatus => {
                    info!(
                        "status: up {}s, imu {} accel {} radio {} errors {}",
                        wake::uptime_secs(),
                        stats.imu_samples,
                        stats.accel_samples,
                        stats.telegrams,
                        stats.errors
                    );
                }
            }
        }

        let wake = match try_wake() {
            Some(w) => w,
            None => {
                wake::wait_for_interrupt();
                continue;
            }
        };

        if wake.timer {
            if imu.is_some() && irq.imu_int1.is_high() {
                schedule(&mut sched, Job::PollImu);
            }
            if radio.is_some() {
                schedule(&mut sched, Job::PollRadio);
            }
            if wake::elapsed(&mut last_accel, ACCEL_INTERVAL_TICKS) {
                schedule(&mut sched, Job::PollAccel);
            }
            if wake::elapsed(&mut last_adc, ADC_INTERVAL_TICKS) {
                schedule(&mut sched, Job::PollAdc);
            }
            if wake::elapsed(&mut last_usbpd, USBPD_INTERVAL_TICKS) {
                schedule(&mut sched, Job::PollUsbPd);
            }
            if wake::elapsed(&mut last_status, STATUS_INTERVAL_TICKS) {
                schedule(&mut sched, Job::ReportStatus);
            }
        }
    }
}
