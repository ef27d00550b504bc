//! GPIO bit-bang recovery tool for DS1821 sensors stuck in thermostat mode.
//!
//! Drives one GPIO as an open-drain 1-Wire data line through the sysfs
//! interface and speaks the thermostat-mode broadcast protocol. With an
//! auxiliary power GPIO it can also perform the power cycle that commits a
//! mode switch back to addressable 1-Wire operation.

use std::fs::OpenOptions;
use std::io;
use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ds1821::{Status, oneshot, ops};
use embedded_hal::digital::{self, OutputPin};
use linux_embedded_hal::Delay;
use linux_embedded_hal::sysfs_gpio::{self, Direction, Pin};
use log::{info, warn};
use onewire_bitbang::{BitBangMaster, BusLine, RomCode};

/// Upper bound on ROM codes collected per scan. Phantom codes from
/// collisions count against it too.
const SCAN_CAPACITY: usize = 16;

/// Time for udev to adjust permissions on freshly exported sysfs nodes.
const EXPORT_SETTLE_MS: u64 = 100;

/// Power-up settle after the supply pin is first driven high.
const POWER_ON_SETTLE_MS: u64 = 500;

#[derive(Parser)]
#[command(version, about = "Probe and reprogram DS1821 sensors in thermostat mode over a bit-banged GPIO")]
struct Cli {
    /// GPIO carrying the 1-Wire data line (BCM numbering).
    #[arg(long, default_value_t = 17)]
    gpio: u64,
    /// GPIO powering the sensor's VDD; enables the automatic power cycle.
    #[arg(long)]
    power_gpio: Option<u64>,
    /// Also sample the thermostat output level on the data pin.
    #[arg(long)]
    read_tout: bool,
    /// Minimal key=value output.
    #[arg(short, long)]
    quick: bool,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Enumerate every device on the bus and probe broadcast state.
    Scan,
    /// Read the status register and alarm thresholds.
    Probe,
    /// Run a conversion and report the high-resolution temperature.
    Temp,
    /// key=value dump of temperature, alarm flags and thresholds.
    Status,
    /// Set the high-alarm threshold TH in whole °C.
    SetTh {
        #[arg(allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-55..=125))]
        degrees: i8,
    },
    /// Set the low-alarm threshold TL in whole °C.
    SetTl {
        #[arg(allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-55..=125))]
        degrees: i8,
    },
    /// Rewrite the status register for one-shot / 1-Wire mode.
    SetOneshot,
    /// Full recovery: probe, set one-shot mode, power-cycle.
    Fix,
}

/// Open-drain 1-Wire line over a sysfs GPIO: low is driven, high is the
/// external pullup with the pin switched to input.
struct SysfsLine(Pin);

impl BusLine for SysfsLine {
    type Error = sysfs_gpio::Error;

    fn drive_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_direction(Direction::Low)
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.0.set_direction(Direction::In)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get_value()? == 0)
    }
}

#[derive(Debug)]
struct PowerPinError(sysfs_gpio::Error);

impl digital::Error for PowerPinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Push-pull supply pin for the sensor's VDD.
struct PowerPin(Pin);

impl digital::ErrorType for PowerPin {
    type Error = PowerPinError;
}

impl OutputPin for PowerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_value(0).map_err(PowerPinError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_value(1).map_err(PowerPinError)
    }
}

/// Exported sysfs pins for the lifetime of one invocation.
struct Session {
    data: Pin,
    power: Option<Pin>,
    power_bcm: Option<u64>,
}

impl Session {
    fn open(data_bcm: u64, power_bcm: Option<u64>) -> Result<Session> {
        let data = Pin::new(data_bcm);
        data.export()
            .with_context(|| format!("exporting GPIO{data_bcm}"))?;
        let power = match power_bcm {
            Some(bcm) => {
                let pin = Pin::new(bcm);
                pin.export()
                    .with_context(|| format!("exporting GPIO{bcm}"))?;
                Some(pin)
            }
            None => None,
        };
        thread::sleep(Duration::from_millis(EXPORT_SETTLE_MS));

        data.set_direction(Direction::In)
            .with_context(|| format!("releasing GPIO{data_bcm}"))?;
        info!("1-Wire data line on GPIO{data_bcm}");

        if let (Some(pin), Some(bcm)) = (power, power_bcm) {
            // Direction::High drives the pin high from the first moment it
            // becomes an output, so the supply never glitches low.
            pin.set_direction(Direction::High)
                .context("driving the power pin high")?;
            info!("sensor supply on GPIO{bcm}, settling {POWER_ON_SETTLE_MS} ms");
            thread::sleep(Duration::from_millis(POWER_ON_SETTLE_MS));
        }

        Ok(Session {
            data,
            power,
            power_bcm,
        })
    }

    /// Unexports both pins, then re-asserts the supply level through the
    /// pin controller so the sensor stays powered after exit.
    fn close(self) {
        if let Err(e) = self.data.unexport() {
            warn!("failed to unexport the data pin: {e}");
        }
        if let Some(pin) = self.power {
            if let Err(e) = pin.unexport() {
                warn!("failed to unexport the power pin: {e}");
            }
        }
        if let Some(bcm) = self.power_bcm {
            reassert_power_pin(bcm);
        }
    }
}

/// Unexporting drops the sysfs drive, so the level is restored with the
/// firmware pin tools instead. `pinctrl` first, `raspi-gpio` on older
/// images.
fn reassert_power_pin(bcm: u64) {
    let arg = bcm.to_string();
    let done = Command::new("pinctrl")
        .args(["set", &arg, "op", "dh"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if done {
        return;
    }
    let fallback = Command::new("raspi-gpio")
        .args(["set", &arg, "op", "dh"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if fallback {
        info!("power pin re-asserted via raspi-gpio");
    } else {
        warn!("could not re-assert GPIO{bcm} high; the sensor may be unpowered");
    }
}

fn ensure_gpio_access() -> Result<()> {
    match OpenOptions::new().write(true).open("/sys/class/gpio/export") {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            bail!("no write access to /sys/class/gpio; run as root or join the gpio group")
        }
        Err(e) => Err(e).context("opening /sys/class/gpio/export"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    ensure_gpio_access()?;
    let session = Session::open(cli.gpio, cli.power_gpio)?;
    let result = run(&cli, &session);
    session.close();
    result
}

fn run(cli: &Cli, session: &Session) -> Result<()> {
    let mut ow = BitBangMaster::new(SysfsLine(session.data), Delay)
        .context("releasing the 1-Wire data line")?;
    let mut delay = Delay;
    let quick = cli.quick;

    match cli.action {
        Action::Scan => {
            let report = ops::scan::<_, SCAN_CAPACITY>(&mut ow)?;
            render_scan(&report, quick);
        }
        Action::Probe => {
            let report = ops::probe(&mut ow, cli.read_tout)?;
            render_probe(&report, quick);
        }
        Action::Temp => {
            let report = ops::read_temperature(&mut ow, &mut delay, cli.read_tout)?;
            render_temperature(&report, quick);
        }
        Action::Status => {
            let snap = ops::full_status(&mut ow, &mut delay, cli.read_tout)?;
            render_snapshot(&snap);
        }
        Action::SetTh { degrees } => {
            let report = ops::set_threshold(&mut ow, &mut delay, ops::ThresholdKind::High, degrees)?;
            render_threshold(&report, quick);
        }
        Action::SetTl { degrees } => {
            let report = ops::set_threshold(&mut ow, &mut delay, ops::ThresholdKind::Low, degrees)?;
            render_threshold(&report, quick);
        }
        Action::SetOneshot => {
            let report = oneshot::set_one_shot_mode(&mut ow, &mut delay)?;
            render_one_shot(&report, quick);
        }
        Action::Fix => {
            let mut power = session.power.map(PowerPin);
            if power.is_none() {
                warn!("no --power-gpio configured; the power cycle will be skipped");
            }
            let report = oneshot::fix(&mut ow, power.as_mut(), &mut delay)?;
            render_fix(&report, quick);
        }
    }
    Ok(())
}

fn flag(b: bool) -> u8 {
    b as u8
}

fn describe_rom(code: &RomCode) -> String {
    if code.is_valid() {
        match code.family_name() {
            Some(name) => format!("{code} ({name})"),
            None => format!("{code} (family 0x{:02X})", code.family()),
        }
    } else {
        format!("{code} (phantom: CRC or family invalid)")
    }
}

fn render_scan(report: &ops::ScanReport<SCAN_CAPACITY>, quick: bool) {
    if quick {
        println!("presence=1");
        if let Some(code) = &report.single {
            println!("single={code}");
            println!("single_valid={}", flag(code.is_valid()));
        }
        println!("devices={}", report.discovered().len());
        println!("valid={}", report.valid_count());
        println!("phantom={}", report.phantom_count());
        for (i, code) in report.discovered().iter().enumerate() {
            println!("rom{i}={code}");
        }
        if let Some(status) = report.status {
            println!("status=0x{:02X}", status.into_bits());
        }
        if let Some((th, tl)) = report.thresholds {
            println!("th={th}");
            println!("tl={tl}");
        }
        return;
    }

    println!("Presence pulse detected.");
    match &report.single {
        Some(code) if code.is_valid() => println!("Read-ROM: {}", describe_rom(code)),
        Some(code) => {
            println!("Read-ROM: {}", describe_rom(code));
            println!("  A phantom code here usually means several devices answered at once.");
        }
        None => println!("Read-ROM: no answer."),
    }

    let discovered = report.discovered();
    println!(
        "Search-ROM found {} code(s): {} valid, {} phantom.",
        discovered.len(),
        report.valid_count(),
        report.phantom_count()
    );
    for (i, code) in discovered.iter().enumerate() {
        println!("  [{i}] {}", describe_rom(code));
    }
    if discovered.len() == SCAN_CAPACITY {
        warn!("scan capacity reached; more devices may be present");
    }

    match report.status {
        Some(status) => {
            println!("Thermostat-mode broadcast answered.");
            print_status(status);
            if let Some((th, tl)) = report.thresholds {
                println!("Thresholds: TH={th} °C, TL={tl} °C");
            }
        }
        None => println!("No thermostat-mode response to broadcast commands."),
    }
}

fn render_probe(report: &ops::ProbeReport, quick: bool) {
    if quick {
        render_status_kv(report.status);
        if let Some((th, tl)) = report.thresholds {
            println!("th={th}");
            println!("tl={tl}");
        }
        if let Some(level) = report.output_level {
            println!("tout={}", flag(level));
        }
        return;
    }

    print_status(report.status);
    match report.thresholds {
        Some((th, tl)) => println!("Thresholds: TH={th} °C, TL={tl} °C"),
        None => println!("Thresholds unreadable."),
    }
    if let Some(level) = report.output_level {
        println!("Thermostat output: {}", if level { "high" } else { "low" });
    }
}

fn render_temperature(report: &ops::TemperatureReport, quick: bool) {
    if !report.status.done() {
        warn!("DONE not set after the conversion wait; the reading may be stale");
    }
    if quick {
        println!("temperature={}", report.sample.millidegrees());
        if let Some(level) = report.output_level {
            println!("tout={}", flag(level));
        }
        return;
    }

    let s = &report.sample;
    println!(
        "Temperature: {:.2} °C (raw {} °C, count_remain {}, count_per_c {})",
        s.celsius(),
        s.raw,
        s.count_remain,
        s.count_per_c
    );
    if report.status.high_alarm() {
        println!("High-temperature alarm flag (THF) is set.");
    }
    if report.status.low_alarm() {
        println!("Low-temperature alarm flag (TLF) is set.");
    }
    if let Some(level) = report.output_level {
        println!("Thermostat output: {}", if level { "high" } else { "low" });
    }
}

fn render_snapshot(snap: &ops::Snapshot) {
    println!("temperature={}", snap.millidegrees);
    println!("thf={}", flag(snap.high_alarm));
    println!("tlf={}", flag(snap.low_alarm));
    if let Some((th, tl)) = snap.thresholds {
        println!("th={th}");
        println!("tl={tl}");
    }
    if let Some(level) = snap.output_level {
        println!("tout={}", flag(level));
    }
}

fn render_threshold(report: &ops::ThresholdReport, quick: bool) {
    if report.inverted {
        warn!("TL >= TH after the write; the thermostat output cannot toggle usefully");
    }
    if quick {
        println!("th={}", report.current.0);
        println!("tl={}", report.current.1);
        println!("inverted={}", flag(report.inverted));
        return;
    }
    println!(
        "Thresholds: TH {} -> {} °C, TL {} -> {} °C",
        report.previous.0, report.current.0, report.previous.1, report.current.1
    );
}

fn render_one_shot(report: &oneshot::OneShotReport, quick: bool) {
    if quick {
        println!("before=0x{:02X}", report.before.into_bits());
        println!("target=0x{:02X}", report.target.into_bits());
        for (i, attempt) in report.attempts.iter().enumerate() {
            match attempt.readback {
                Some(s) => println!("readback{i}=0x{:02X}", s.into_bits()),
                None => println!("readback{i}=none"),
            }
        }
        println!("programmed={}", flag(report.looks_programmed()));
        return;
    }

    println!(
        "Status before: 0x{:02X}; writing 0x{:02X} (1SHOT set).",
        report.before.into_bits(),
        report.target.into_bits()
    );
    for attempt in &report.attempts {
        let how = match attempt.strategy {
            oneshot::WriteStrategy::Direct => "direct",
            oneshot::WriteStrategy::SkipRom => "skip-ROM",
        };
        match attempt.readback {
            Some(s) => println!("  {how}: read back 0x{:02X}", s.into_bits()),
            None => println!("  {how}: no read-back"),
        }
    }
    if report.looks_programmed() {
        println!("Every read-back shows 1SHOT set.");
        println!("With multiple devices on the bus this is AND-combined, not per-device.");
    } else {
        println!("Some read-back is missing the 1SHOT bit; the write may not have taken.");
    }
}

fn render_fix(report: &oneshot::FixReport, quick: bool) {
    if quick {
        println!("status=0x{:02X}", report.probe.status.into_bits());
        println!("programmed={}", flag(report.one_shot.looks_programmed()));
        println!("power_cycled={}", flag(report.power_cycled));
        return;
    }

    println!("Probe OK.");
    print_status(report.probe.status);
    render_one_shot(&report.one_shot, false);
    if report.power_cycled {
        println!("Power cycle done. The device should now answer the ROM layer; run `scan` to confirm.");
    } else {
        println!("No power pin configured: cycle the sensor's supply by hand to finish the mode switch.");
    }
}

fn print_status(status: Status) {
    println!("Status register: 0x{:02X}", status.into_bits());
    println!(
        "  DONE={} THF={} TLF={} NVB={} POL={} 1SHOT={}",
        flag(status.done()),
        flag(status.high_alarm()),
        flag(status.low_alarm()),
        flag(status.eeprom_busy()),
        flag(status.output_polarity()),
        flag(status.one_shot())
    );
    if !status.one_shot() {
        println!("  Continuous-conversion thermostat mode (1SHOT clear).");
    }
}

fn render_status_kv(status: Status) {
    println!("status=0x{:02X}", status.into_bits());
    println!("done={}", flag(status.done()));
    println!("thf={}", flag(status.high_alarm()));
    println!("tlf={}", flag(status.low_alarm()));
    println!("nvb={}", flag(status.eeprom_busy()));
    println!("oneshot={}", flag(status.one_shot()));
}
