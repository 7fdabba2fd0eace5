use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use x2_pcb_tester::config::HarnessConfig;

/// Production tester for the X2 Main PCB
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bench configuration file. Built-in defaults are used if it does not exist.
    #[arg(short, long, default_value = "x2-tester.toml")]
    config: PathBuf,

    /// RS-485 adapter, overrides the configuration file
    #[arg(short, long)]
    port: Option<String>,

    /// Directory for the results log, overrides the configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log every bus attempt
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let mut config = if args.config.exists() {
        HarnessConfig::from_file(&args.config)?
    } else {
        warn!(
            "{} not found, using the built-in bench settings",
            args.config.display()
        );
        HarnessConfig::default()
    };
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(output) = &args.output {
        config.report.directory = output.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level));

    let config = load_config(&args).context("Failed to load the bench configuration")?;
    info!(
        "Testing {} modules per board on {}",
        config.modules.0.len(),
        config.serial.port
    );
    bench::run(config)
}

#[cfg(target_os = "linux")]
mod bench {
    use std::sync::atomic::Ordering;

    use anyhow::Context;
    use linux_embedded_hal::{
        CdevPin, Delay, SpidevDevice,
        gpio_cdev::{Chip, LineRequestFlags},
        spidev::{SpiModeFlags, SpidevOptions},
    };
    use log::{error, info, warn};
    use x2_pcb_tester::{
        adc::Mcp3008,
        bench::{Bench, BenchSettings},
        bus::{DeviceHandle, ModbusBus},
        client::RegisterClient,
        config::{GpioConfig, HarnessConfig, SpiConfig},
        error::BenchError,
        operator::ConsoleOperator,
        rails::{RailSequencer, RailTiming},
        report::{ResultLog, header_for},
        serial::PortWrapper,
        session::{record_fatal, run_session},
        wifi::IwlistScanner,
    };

    const CONSUMER: &str = "x2-tester";

    fn rail_pins(config: &GpioConfig) -> anyhow::Result<[CdevPin; 4]> {
        let mut chip = Chip::new(&config.chip).with_context(|| format!("Failed to open {}", config.chip))?;
        let mut line = |offset: u32| -> anyhow::Result<CdevPin> {
            let handle = chip
                .get_line(offset)?
                .request(LineRequestFlags::OUTPUT, 0, CONSUMER)
                .with_context(|| format!("GPIO line {offset} is not available"))?;
            Ok(CdevPin::new(handle)?)
        };
        Ok([
            line(config.primary)?,
            line(config.secondary)?,
            line(config.backup)?,
            line(config.passthrough)?,
        ])
    }

    fn adc_spi(config: &SpiConfig) -> anyhow::Result<SpidevDevice> {
        let mut spi = SpidevDevice::open(&config.device).with_context(|| format!("Failed to open {}", config.device))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.max_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;
        Ok(spi)
    }

    pub fn run(config: HarnessConfig) -> anyhow::Result<()> {
        let port = PortWrapper::open(&config.serial)
            .with_context(|| format!("Failed to open serial port {}", config.serial.port))?;
        let client = RegisterClient::new(
            ModbusBus::<_, 256>::new(port),
            DeviceHandle::new("X2 Main", config.devices.main_address, config.serial.clone()),
            DeviceHandle::new("T-Node", config.devices.node_address, config.serial.clone()),
            config.retries.modbus,
        );
        let rails = RailSequencer::new(rail_pins(&config.gpio)?, Delay, RailTiming::from(&config.timing));
        let adc = Mcp3008::new(adc_spi(&config.spi)?);

        let mut bench = Bench::new(
            client,
            rails,
            Box::new(adc),
            Box::new(IwlistScanner::new(config.wifi.interface.clone())),
            Box::new(ConsoleOperator::new()),
            BenchSettings::from(&config),
        );
        let stop = bench.stop_flag();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("Failed to install the Ctrl-C handler")?;

        let modules = &config.modules.0;
        let today = chrono::Local::now().date_naive();
        let mut log = ResultLog::open(&config.report.directory, today, &header_for(modules))?;

        let mut current = None;
        let outcome = run_session(&mut bench, modules, &mut log, config.report.serial_length, &mut current);

        info!("Cleaning up and exiting...");
        if let Err(err) = bench.rails.shutdown() {
            error!("Could not switch the rails off: {err}");
        }

        match outcome {
            Ok(rows) => {
                info!("{rows} boards logged to {}", log.path().display());
                Ok(())
            }
            Err(BenchError::Interrupted) => {
                warn!("The program was cancelled by the operator");
                Ok(())
            }
            Err(err) => {
                record_fatal(&mut bench, &mut log, current.as_deref(), &err);
                Err(err.into())
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod bench {
    use x2_pcb_tester::config::HarnessConfig;

    pub fn run(_config: HarnessConfig) -> anyhow::Result<()> {
        anyhow::bail!("the bench GPIO and SPI drivers need Linux")
    }
}
