// pulp-timeline demo firmware for the XTEink X4 (ESP32-C3)
//
// Boot sequence: timer -> LED -> schedule actions -> main loop
// Main loop: drain elapsed ticks -> proceed timeline -> WFI -> repeat
//
// Scheduler time is milliseconds. The timer ISR adds its period to the
// TickCounter, so slowing the timer down while nothing is due soon does
// not lose time. Callbacks receive the LED cell as their argument and
// chain further actions through the shared SCHEDULER.

#![no_std]
#![no_main]

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::time::Duration;
use esp_hal::timer::PeriodicTimer;
use esp_hal::timer::timg::TimerGroup;
use log::{debug, info, warn};
use static_cell::StaticCell;

use pulp_timeline::kernel::wake::wait_for_interrupt;
use pulp_timeline::{ActionScheduler, Disposition, TickCounter};

esp_bootloader_esp_idf::esp_app_desc!();

const ACTIVE_TIMER_MS: u32 = 10;
const IDLE_TIMER_MS: u32 = 100;

const BOOT_FLASH_MS: u32 = 300;
const BLINK_MS: u32 = 500;
const HEARTBEAT_MS: u32 = 10_000;

type Led = Mutex<RefCell<Output<'static>>>;

static LED: StaticCell<Led> = StaticCell::new();
static TICKS: TickCounter = TickCounter::new();
static SCHEDULER: ActionScheduler<CriticalSectionRawMutex, &'static Led, 8> =
    ActionScheduler::new();

static TIMER0: Mutex<RefCell<Option<PeriodicTimer<'static, esp_hal::Blocking>>>> =
    Mutex::new(RefCell::new(None));

#[esp_hal::handler(priority = esp_hal::interrupt::Priority::Priority1)]
fn timer0_handler() {
    critical_section::with(|cs| {
        if let Some(timer) = TIMER0.borrow_ref_mut(cs).as_mut() {
            timer.clear_interrupt();
        }
    });
    TICKS.signal_tick();
}

fn set_timer_period(ms: u32) {
    TICKS.set_tick_weight(ms);
    critical_section::with(|cs| {
        if let Some(timer) = TIMER0.borrow_ref_mut(cs).as_mut() {
            let _ = timer.start(Duration::from_millis(ms as u64));
        }
    });
}

fn boot_flash(led: &'static Led) -> Disposition {
    critical_section::with(|cs| led.borrow_ref_mut(cs).set_low());
    if SCHEDULER.schedule(BOOT_FLASH_MS, boot_flash_done, led).is_err() {
        warn!("boot flash: no slot for follow-up");
    }
    Disposition::OneShot
}

fn boot_flash_done(led: &'static Led) -> Disposition {
    critical_section::with(|cs| led.borrow_ref_mut(cs).set_high());
    if SCHEDULER.schedule(BLINK_MS, blink, led).is_err() {
        warn!("boot flash: no slot for blink");
    }
    Disposition::OneShot
}

fn blink(led: &'static Led) -> Disposition {
    critical_section::with(|cs| led.borrow_ref_mut(cs).toggle());
    Disposition::Reload
}

fn heartbeat(_: &'static Led) -> Disposition {
    info!(
        "uptime {}ms, {} armed, watermark {}, busy {}ms",
        TICKS.uptime_ticks(),
        SCHEDULER.len(),
        SCHEDULER.active_nodes_watermark(),
        SCHEDULER.proceeding_time(),
    );
    SCHEDULER.clear_proceeding_time();
    Disposition::Reload
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("booting...");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let mut timer0 = PeriodicTimer::new(timg0.timer0);
    TICKS.set_tick_weight(ACTIVE_TIMER_MS);
    critical_section::with(|cs| {
        timer0.set_interrupt_handler(timer0_handler);
        timer0
            .start(Duration::from_millis(ACTIVE_TIMER_MS as u64))
            .unwrap();
        timer0.listen();
        TIMER0.borrow_ref_mut(cs).replace(timer0);
    });
    info!("timer initialized.");

    let led = Output::new(peripherals.GPIO8, Level::High, OutputConfig::default());
    let led: &'static Led = LED.init(Mutex::new(RefCell::new(led)));

    SCHEDULER.schedule(0, boot_flash, led).unwrap();
    SCHEDULER
        .schedule_reload(HEARTBEAT_MS, HEARTBEAT_MS, heartbeat, led)
        .unwrap();
    info!("timeline ready ({} slots).", SCHEDULER.capacity());

    let mut timer_ms = ACTIVE_TIMER_MS;
    loop {
        let elapsed = TICKS.take_elapsed();
        if elapsed > 0 {
            SCHEDULER.proceed(elapsed);
        }

        // idle the timer while the next action is far away
        let wanted = match SCHEDULER.next_event_delay() {
            Some(delay) if delay < 2 * IDLE_TIMER_MS => ACTIVE_TIMER_MS,
            _ => IDLE_TIMER_MS,
        };
        if wanted != timer_ms {
            set_timer_period(wanted);
            timer_ms = wanted;
            debug!("timer: {}ms", timer_ms);
        }

        wait_for_interrupt();
    }
}
