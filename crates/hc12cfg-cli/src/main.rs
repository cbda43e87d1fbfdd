//! Command-line front end for configuring HC-12 modules.

use clap::Parser;

use hc12cfg_core::prelude::*;
use hc12cfg_core::transport::serial::{list_ports, ModemControlLine};

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(Parser, Debug)]
#[command(name = "hc12cfg", version, about = "Configure HC-12 wireless serial modules")]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// List candidate serial ports
    ListPorts(ListPortsOpts),
    /// Read and print the module's current configuration
    Show(ShowOpts),
    /// Write module parameters, querying first and skipping no-ops
    Set(SetOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            ListPorts(o) => o.run(),
            Show(o) => o.run(),
            Set(o) => o.run(),
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum SetLineArg {
    Rts,
    Dtr,
}

impl From<SetLineArg> for SetLineDriver {
    fn from(arg: SetLineArg) -> Self {
        match arg {
            SetLineArg::Rts => SetLineDriver::Rts,
            SetLineArg::Dtr => SetLineDriver::Dtr,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct SerialArgs {
    /// Serial port; defaults to the first USB-UART adapter found
    #[arg(short, long, default_value_t = default_serial_port())]
    port: String,

    /// Baud rate the local port starts at
    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    /// Adapter output wired to the module's SET pin
    #[arg(long, value_enum, default_value = "rts")]
    set_line: SetLineArg,

    /// Local baud rate applied when the module cannot be reached
    #[arg(long)]
    fallback_baud: Option<u32>,

    /// Leave the local baud rate alone when the module cannot be reached
    #[arg(long, conflicts_with = "fallback_baud")]
    no_fallback: bool,

    /// Suppress per-step activity output
    #[arg(short, long)]
    quiet: bool,
}

fn default_serial_port() -> String {
    // not great as a fallback, but the sort puts USB-UART bridges first
    list_ports()
        .into_iter()
        .next()
        .map(|p| p.name)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_owned())
}

impl SerialArgs {
    fn open(&self) -> anyhow::Result<(SerialTransport, ModemControlLine)> {
        let mut transport = SerialTransport::open(&self.port, self.baud)?;
        transport.clear_buffers()?;
        let set_line = transport.modem_control_line(self.set_line.into())?;
        tracing::debug!(port = %self.port, baud = self.baud, "opened serial port");
        Ok((transport, set_line))
    }

    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(baud) = self.fallback_baud {
            config.fallback_baud = Some(baud);
        }
        if self.no_fallback {
            config.fallback_baud = None;
        }
        config
    }

    fn target_baud(&self) -> BaudRate {
        BaudRate::from_bps(self.baud).unwrap_or(BaudRate::FACTORY_DEFAULT)
    }
}

#[derive(clap::Args, Debug)]
struct ListPortsOpts {
    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

impl ToolRun for ListPortsOpts {
    fn run(&self) -> anyhow::Result<()> {
        let ports = list_ports();
        if self.json {
            let entries: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.name,
                        "vid": p.vid,
                        "pid": p.pid,
                        "product": p.product,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for port in &ports {
                match &port.product {
                    Some(product) => println!("{}\t{}", port.name, product),
                    None => println!("{}", port.name),
                }
            }
        }
        Ok(())
    }
}

/// Fields recovered from an `AT+RX` configuration dump.
#[derive(Debug, Default)]
struct ModuleReport {
    mode: Option<u8>,
    baud: Option<u32>,
    channel: Option<u8>,
    power: Option<TransmissionPower>,
    other: Vec<String>,
}

impl ModuleReport {
    fn from_dump(text: &str) -> Self {
        let mut report = Self::default();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(v) = line.strip_prefix("FU") {
                report.mode = v.parse().ok();
            } else if let Some(v) = line.strip_prefix("RP:") {
                report.power = v
                    .trim_end_matches("dBm")
                    .parse()
                    .ok()
                    .and_then(TransmissionPower::from_dbm);
            } else if let Some(v) = line.strip_prefix('B') {
                report.baud = v.parse().ok();
            } else if let Some(v) = line.strip_prefix('C') {
                report.channel = v.parse().ok();
            } else {
                report.other.push(line.to_owned());
            }
        }
        report
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "mode": self.mode.map(|m| format!("FU{}", m)),
            "baud": self.baud,
            "channel": self.channel,
            "power_dbm": self.power.map(TransmissionPower::dbm),
            "power_mw": self.power.map(TransmissionPower::milliwatts),
            "other": self.other,
        })
    }

    fn print(&self) {
        if let Some(mode) = self.mode {
            println!("mode:    FU{}", mode);
        }
        if let Some(baud) = self.baud {
            println!("baud:    {}", baud);
        }
        if let Some(channel) = self.channel {
            println!("channel: {}", channel);
        }
        if let Some(power) = self.power {
            println!("power:   {} dBm ({} mW)", power.dbm(), power.milliwatts());
        }
        for line in &self.other {
            println!("other:   {}", line);
        }
    }
}

#[derive(clap::Args, Debug)]
struct ShowOpts {
    #[command(flatten)]
    serial: SerialArgs,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

impl ToolRun for ShowOpts {
    fn run(&self) -> anyhow::Result<()> {
        let (mut transport, mut set_line) = self.serial.open()?;
        let mut clock = SystemClock::new();
        let mut stderr = std::io::stderr();

        let mut session = Session::new(&mut transport, &mut clock, self.serial.session_config())
            .with_set_line(&mut set_line)
            .with_sink(&mut stderr);
        if self.serial.quiet {
            session.set_verbosity(false, false);
        }

        // find a working rate first; the dump is garbage when mistuned
        session.enter_command_mode(self.serial.target_baud())?;
        let mut buf = [0u8; 128];
        let n = session.read_configuration(&mut buf)?;

        let text = String::from_utf8_lossy(&buf[..n]);
        let report = ModuleReport::from_dump(&text);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        } else {
            report.print();
        }
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
struct SetOpts {
    #[command(flatten)]
    serial: SerialArgs,

    /// Module and local baud rate (1200..115200)
    #[arg(long)]
    rate: Option<u32>,

    /// RF channel (1..=127)
    #[arg(long)]
    channel: Option<u8>,

    /// Transmission power in dBm (-1, 2, 5, 8, 11, 14, 17 or 20)
    #[arg(long)]
    power: Option<i8>,

    /// Transmission mode (1..=4, for FU1..FU4)
    #[arg(long)]
    mode: Option<u8>,
}

impl SetOpts {
    fn settings(&self) -> anyhow::Result<ModuleSettings> {
        let mut settings = ModuleSettings::default();
        if let Some(bps) = self.rate {
            settings.baud = Some(
                BaudRate::from_bps(bps)
                    .ok_or_else(|| anyhow::anyhow!("unsupported baud rate {}", bps))?,
            );
        }
        if let Some(channel) = self.channel {
            settings.channel = Some(Channel::new(channel)?);
        }
        if let Some(dbm) = self.power {
            settings.power = Some(
                TransmissionPower::from_dbm(dbm)
                    .ok_or_else(|| anyhow::anyhow!("unsupported power level {} dBm", dbm))?,
            );
        }
        if let Some(code) = self.mode {
            settings.mode = Some(
                TransmissionMode::from_wire_code(code)
                    .ok_or_else(|| anyhow::anyhow!("unsupported mode FU{}", code))?,
            );
        }
        Ok(settings)
    }
}

impl ToolRun for SetOpts {
    fn run(&self) -> anyhow::Result<()> {
        if self.rate.is_none() && self.channel.is_none() && self.power.is_none() && self.mode.is_none()
        {
            anyhow::bail!("nothing to configure; pass --rate, --channel, --power or --mode");
        }
        let settings = self.settings()?;

        let (mut transport, mut set_line) = self.serial.open()?;
        let mut clock = SystemClock::new();
        let mut stderr = std::io::stderr();

        let mut session = Session::new(&mut transport, &mut clock, self.serial.session_config())
            .with_set_line(&mut set_line)
            .with_sink(&mut stderr);
        if self.serial.quiet {
            session.set_verbosity(false, false);
        }

        session.apply(&settings)?;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    ToolOptions::parse().command.run()
}
