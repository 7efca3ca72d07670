//! GateCount Firmware — Main Entry Point
//!
//! Dual-ultrasonic people counter.  One cooperative loop measures both
//! sensors, ticks the direction state machine, and serves at most one
//! local query per iteration.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GateSensors     HttpReporter     LogEventSink   Esp32Time     │
//! │  (RangingPort)   (EventReporter)  (EventSink)    (Clock)       │
//! │  WifiAdapter     QueryServer                                   │
//! │  (Connectivity)  (AppCommand in, AppReply out)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              GateService (pure logic)                  │    │
//! │  │  Calibration · Direction FSM · Counters                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{Context, Result, bail};
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use gatecount::adapters::hardware::{self, GateSensors};
use gatecount::adapters::http_reporter::HttpReporter;
use gatecount::adapters::log_sink::LogEventSink;
use gatecount::adapters::query_server::QueryServer;
use gatecount::adapters::time::Esp32TimeAdapter;
use gatecount::adapters::wifi::{ConnectivityPort, WifiAdapter};
use gatecount::app::ports::{MonotonicClock, RangingPort};
use gatecount::app::service::GateService;
use gatecount::config::SystemConfig;
use gatecount::drivers::watchdog::Watchdog;
use gatecount::sensors::SensorId;

#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::FreeRtos as LoopDelay;
#[cfg(not(target_os = "espidf"))]
use gatecount::adapters::time::SleepDelay as LoopDelay;

/// Must outlast an on-demand calibration and a stalled report.
const WATCHDOG_TIMEOUT_MS: u32 = 15_000;

/// Idle time at the end of each loop iteration.
const LOOP_IDLE_MS: u32 = 10;

/// Port 80 needs privileges on a development host.
#[cfg(not(target_os = "espidf"))]
const HOST_QUERY_PORT: u16 = 8080;

// ── Platform bootstrap ────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

#[cfg(target_os = "espidf")]
fn build_wifi() -> Result<WifiAdapter> {
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let driver = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    Ok(WifiAdapter::new(driver))
}

#[cfg(not(target_os = "espidf"))]
fn build_wifi() -> Result<WifiAdapter> {
    Ok(WifiAdapter::new())
}

#[cfg(target_os = "espidf")]
fn query_port(config: &SystemConfig) -> u16 {
    config.query_port
}

#[cfg(not(target_os = "espidf"))]
fn query_port(_config: &SystemConfig) -> u16 {
    HOST_QUERY_PORT
}

/// Feed `<a|b> <cm|none>` lines from stdin into the simulated sensors so
/// a crossing can be walked through by hand (`a 20`, `a 50`, `b 20`, ...).
#[cfg(not(target_os = "espidf"))]
fn spawn_sim_console() -> Result<()> {
    use std::io::BufRead;

    use gatecount::sensors::{parse_sim_command, sim_set_distance};

    std::thread::Builder::new()
        .name("sim-console".into())
        .spawn(|| {
            for line in std::io::stdin().lock().lines().map_while(|l| l.ok()) {
                match parse_sim_command(&line) {
                    Some((sensor, cm)) => {
                        info!("sim: sensor {} -> {:?} cm", sensor, cm);
                        sim_set_distance(sensor, cm);
                    }
                    None => warn!("sim: expected `<a|b> <cm|none>`, got {:?}", line),
                }
            }
        })
        .context("sim console thread")?;
    Ok(())
}

const BANNER_TOP: &str = "╔══════════════════════════════════════╗";
const BANNER_BOTTOM: &str = "╚══════════════════════════════════════╝";

/// One boxed banner row, padded to the border width.
fn banner_row(text: &str) -> String {
    format!("║  {text:<36}║")
}

fn log_banner(config: &SystemConfig) {
    info!("{}", BANNER_TOP);
    info!("{}", banner_row(&format!("GateCount v{}", env!("CARGO_PKG_VERSION"))));
    info!("{}", BANNER_BOTTOM);
    info!(
        "Detection: change>{:.0}cm, sequence timeout {}ms, debounce {}ms, poll {}ms",
        config.min_distance_change_cm,
        config.detection_timeout_ms,
        config.debounce_ms,
        config.poll_interval_ms
    );
    info!("Direction: A then B = in, B then A = out");
    info!("Reporting to {}", config.report_url);
}

// ── Detection loop ────────────────────────────────────────────

/// Everything the loop owns.  Only this thread touches the service.
struct Gate {
    service: GateService,
    sensors: GateSensors,
    reporter: HttpReporter,
    sink: LogEventSink,
    query: QueryServer,
    wifi: WifiAdapter,
    watchdog: Watchdog,
    clock: Esp32TimeAdapter,
    delay: LoopDelay,
    next_poll_ms: u64,
}

impl Gate {
    fn iteration(&mut self) -> Result<()> {
        let now_ms = self.clock.now_ms();

        if now_ms >= self.next_poll_ms {
            let cfg = self.service.config();
            let (poll_ms, gap_ms) = (cfg.poll_interval_ms, cfg.inter_sensor_delay_ms);

            let dist_a = self.sensors.measure(SensorId::A);
            self.delay.delay_ms(gap_ms);
            let dist_b = self.sensors.measure(SensorId::B);

            self.service.tick(
                dist_a,
                dist_b,
                self.clock.now_ms(),
                &mut self.reporter,
                &mut self.sink,
            );
            self.next_poll_ms = now_ms + u64::from(poll_ms);
        }

        let Self {
            service,
            sensors,
            delay,
            sink,
            query,
            ..
        } = self;
        query
            .poll(|cmd| service.handle_command(cmd, sensors, delay, sink))
            .context("query server")?;

        self.wifi.poll(self.clock.now_ms());
        self.watchdog.feed();
        self.delay.delay_ms(LOOP_IDLE_MS);
        Ok(())
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;
    let config = SystemConfig::default();
    config.validate().context("invalid configuration")?;
    log_banner(&config);

    // ── 2. Network (fatal if unavailable) ─────────────────────
    let mut wifi = build_wifi()?;
    wifi.set_credentials(&config.wifi_ssid, &config.wifi_password)
        .context("WiFi credentials")?;
    if let Err(e) = wifi.connect() {
        bail!("network unavailable at startup: {}", e);
    }

    // ── 3. Adapters ───────────────────────────────────────────
    let sensors = hardware::build_sensors(&config)?;
    #[cfg(not(target_os = "espidf"))]
    spawn_sim_console()?;
    let reporter = HttpReporter::new(&config);
    let query = QueryServer::bind(query_port(&config)).context("query server bind")?;
    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);

    // ── 4. Core + startup calibration ─────────────────────────
    let mut gate = Gate {
        service: GateService::new(config.clone()),
        sensors,
        reporter,
        sink: LogEventSink::new(),
        query,
        wifi,
        watchdog,
        clock: Esp32TimeAdapter::new(),
        delay: LoopDelay,
        next_poll_ms: 0,
    };
    gate.service.start(&mut gate.sink);
    if let Err(e) = gate
        .service
        .recalibrate(&mut gate.sensors, &mut gate.delay, &mut gate.sink)
    {
        warn!("Startup calibration failed ({}); waiting for a clear reading", e);
    }

    info!("System ready. Entering detection loop.");

    // ── 5. Detection loop ─────────────────────────────────────
    loop {
        if let Err(e) = gate.iteration() {
            error!("Loop iteration failed: {:#}", e);
            gate.delay.delay_ms(config.error_backoff_ms);
        }
    }
}
