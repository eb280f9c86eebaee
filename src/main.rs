//! CLI entry point for arspec.
//!
//! One-shot subcommands cover homing, manual moves, scans, and tagging;
//! `shell` opens an interactive session (home once, then move and scan
//! against the same established reference). Motion commands that need a
//! trusted position (`goto`, `scan`) home first when the reference has not
//! been established in this process.
//!
//! Scans prompt the operator between plan entries: acquisition runs on the
//! spectrometer host's own software, so the sequencer only needs a
//! confirmation that the exposure at the current angle is done.

use anyhow::{bail, Context, Result};
use arspec::config::Settings;
use arspec::provenance;
use arspec::scan::{AcquisitionGate, AxisOrder, ScanAxisParameters, ScanPlan};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "arspec")]
#[command(about = "Angle-resolved spectrometer goniometer control", long_about = None)]
struct Cli {
    /// Configuration name under config/ (without extension)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Home both axes and park at the soft limit
    Home,
    /// Move both arms to the given angles (homes first)
    Goto {
        /// Sample arm angle in degrees
        #[arg(long)]
        x: f64,
        /// Detector arm angle in degrees
        #[arg(long)]
        y: f64,
    },
    /// Query the controller's step counters
    Pos,
    /// Block until both motors report idle
    Wait,
    /// Relative raw-step move of a single motor
    Jog {
        /// Motor to move
        motor: MotorArg,
        /// Signed step count
        steps: i32,
    },
    /// Overwrite the controller's step counters from angles
    SetPos {
        /// Sample arm angle in degrees
        #[arg(long)]
        x_deg: f64,
        /// Detector arm angle in degrees
        #[arg(long)]
        y_deg: f64,
    },
    /// Run a scan, prompting for acquisition between entries (homes first)
    Scan {
        #[command(subcommand)]
        mode: ScanMode,
    },
    /// Interactive command session
    Shell,
    /// Stamp acquired data files with the angles from the scan record
    Tag {
        /// Directory holding the data files (and usually the scan record)
        dir: PathBuf,
        /// Start angle, used to regenerate a specular plan if no record exists
        #[arg(long)]
        start: Option<f64>,
        /// Stop angle for plan regeneration
        #[arg(long)]
        stop: Option<f64>,
        /// Step resolution for plan regeneration
        #[arg(long)]
        step: Option<f64>,
    },
}

#[derive(Subcommand)]
enum ScanMode {
    /// Both arms sweep the same angles (mirror geometry)
    Specular {
        /// Start angle in degrees
        #[arg(long)]
        start: f64,
        /// Stop angle in degrees, inclusive
        #[arg(long)]
        stop: f64,
        /// Step resolution in degrees
        #[arg(long)]
        step: f64,
    },
    /// Independent 2-D raster; the primary axis varies fastest
    Uncoupled {
        /// Primary sweep start angle
        #[arg(long)]
        primary_start: f64,
        /// Primary sweep stop angle
        #[arg(long)]
        primary_stop: f64,
        /// Primary sweep step resolution
        #[arg(long)]
        primary_step: f64,
        /// Secondary sweep start angle
        #[arg(long)]
        secondary_start: f64,
        /// Secondary sweep stop angle
        #[arg(long)]
        secondary_stop: f64,
        /// Secondary sweep step resolution
        #[arg(long)]
        secondary_step: f64,
        /// Which physical axis the primary sweep drives
        #[arg(long, value_enum, default_value = "xy")]
        order: OrderArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MotorArg {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    /// Primary on X, secondary on Y
    Xy,
    /// Primary on Y, secondary on X
    Yx,
}

impl From<OrderArg> for AxisOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Xy => AxisOrder::XPrimary,
            OrderArg::Yx => AxisOrder::YPrimary,
        }
    }
}

/// Operator-confirmed acquisition: press Enter once the exposure at the
/// current angle has been taken.
struct EnterGate;

impl AcquisitionGate for EnterGate {
    fn acquire(&mut self, index: usize, x: f64, y: f64) -> arspec::error::Result<()> {
        println!("[{index}] at X {x} deg, Y {y} deg - acquire, then press Enter to continue");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref()).context("loading configuration")?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    match cli.command {
        Commands::Tag {
            dir,
            start,
            stop,
            step,
        } => run_tag(&settings, &dir, start, stop, step),
        command => run_motion_command(&settings, command),
    }
}

fn run_tag(
    settings: &Settings,
    dir: &Path,
    start: Option<f64>,
    stop: Option<f64>,
    step: Option<f64>,
) -> Result<()> {
    let record_path = dir.join(&settings.scan.record_filename);
    let plan = if record_path.exists() {
        ScanPlan::read_record(&record_path)
            .with_context(|| format!("reading scan record {}", record_path.display()))?
    } else {
        match (start, stop, step) {
            (Some(start), Some(stop), Some(step)) => {
                ScanPlan::specular(ScanAxisParameters::new(start, stop, step)?)
            }
            _ => bail!(
                "no scan record at {}; pass --start/--stop/--step to regenerate the plan",
                record_path.display()
            ),
        }
    };

    let report = provenance::tag_directory(dir, &plan)?;
    println!("{} file(s) tagged", report.renamed);
    Ok(())
}

#[cfg(feature = "serial")]
fn run_motion_command(settings: &Settings, command: Commands) -> Result<()> {
    use arspec::motion::{MotionController, Motor};
    use arspec::protocol::{serial::SerialTransport, ProtocolLink};
    use arspec::scan::ScanSequencer;

    let transport = SerialTransport::open(&settings.serial.port, settings.serial.baud_rate)
        .with_context(|| format!("opening serial port {}", settings.serial.port))?;
    let link = ProtocolLink::new(transport, settings.serial.link_settings());
    let mut controller = MotionController::new(link, settings.axes.calibration()?);

    match command {
        Commands::Home => {
            controller.home()?;
        }
        Commands::Goto { x, y } => {
            controller.home()?;
            controller.go_to_angle(x, y)?;
        }
        Commands::Pos => {
            print_positions(&mut controller)?;
        }
        Commands::Wait => {
            controller.wait_for_motors()?;
            println!("motors idle");
        }
        Commands::Jog { motor, steps } => {
            let motor = match motor {
                MotorArg::X => Motor::X,
                MotorArg::Y => Motor::Y,
                MotorArg::Z => Motor::Z,
            };
            controller.jog(motor, steps)?;
        }
        Commands::SetPos { x_deg, y_deg } => {
            let x_steps = controller.calibration().x.angle_to_steps(x_deg);
            let y_steps = controller.calibration().y.angle_to_steps(y_deg);
            controller.set_motor_positions(x_steps, y_steps, 0)?;
        }
        Commands::Scan { mode } => {
            let plan = build_plan(mode)?;
            println!("Scan to commence at {} angle pair(s):", plan.len());
            for &(x, y) in plan.entries() {
                println!("  X {x} deg, Y {y} deg");
            }

            let data_dir = PathBuf::from(&settings.scan.data_dir);
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data directory {}", data_dir.display()))?;
            let sequencer = ScanSequencer::new(data_dir.join(&settings.scan.record_filename));

            controller.home()?;
            sequencer.run(&mut controller, &plan, &mut EnterGate)?;
            println!("Scan complete.");
        }
        Commands::Shell => {
            run_shell(&mut controller)?;
        }
        // Handled in main before the controller is opened.
        Commands::Tag { .. } => {}
    }
    Ok(())
}

#[cfg(not(feature = "serial"))]
fn run_motion_command(_settings: &Settings, _command: Commands) -> Result<()> {
    bail!("Serial support not enabled. Rebuild with --features serial")
}

fn build_plan(mode: ScanMode) -> Result<ScanPlan> {
    Ok(match mode {
        ScanMode::Specular { start, stop, step } => {
            ScanPlan::specular(ScanAxisParameters::new(start, stop, step)?)
        }
        ScanMode::Uncoupled {
            primary_start,
            primary_stop,
            primary_step,
            secondary_start,
            secondary_stop,
            secondary_step,
            order,
        } => ScanPlan::uncoupled(
            ScanAxisParameters::new(primary_start, primary_stop, primary_step)?,
            ScanAxisParameters::new(secondary_start, secondary_stop, secondary_step)?,
            order.into(),
        ),
    })
}

#[cfg(feature = "serial")]
fn print_positions(
    controller: &mut arspec::motion::MotionController<arspec::protocol::serial::SerialTransport>,
) -> Result<()> {
    use arspec::axis::Axis;

    let (x_steps, y_steps) = controller.query_positions()?;
    if controller.is_calibrated() {
        let x = controller.axis_state(Axis::X);
        let y = controller.axis_state(Axis::Y);
        println!(
            "X: {} steps ({} deg), Y: {} steps ({} deg)",
            x.position_steps, x.angle_degrees, y.position_steps, y.angle_degrees
        );
    } else {
        println!("X: {x_steps} steps, Y: {y_steps} steps (not homed; angles unknown)");
    }
    Ok(())
}

/// Interactive session: home once, then issue moves against the same
/// reference. Errors are reported and the session continues.
#[cfg(feature = "serial")]
fn run_shell(
    controller: &mut arspec::motion::MotionController<arspec::protocol::serial::SerialTransport>,
) -> Result<()> {
    use arspec::motion::Motor;
    use std::io::Write;

    println!("arspec interactive shell; 'help' lists commands, 'exit' leaves");
    let mut input = String::new();
    loop {
        print!("arspec> ");
        std::io::stdout().flush()?;
        input.clear();
        if std::io::stdin().read_line(&mut input)? == 0 {
            return Ok(());
        }
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let result = match tokens.as_slice() {
            [] => Ok(()),
            ["exit"] | ["quit"] => return Ok(()),
            ["help"] => {
                println!("home | goto <x> <y> | pos | wait | jog <x|y|z> <steps> | setpos <x_deg> <y_deg> | exit");
                Ok(())
            }
            ["home"] => controller.home().map_err(Into::into),
            ["goto", x, y] => parse_two(x, y)
                .and_then(|(x, y)| controller.go_to_angle(x, y).map_err(Into::into)),
            ["pos"] => print_positions(controller),
            ["wait"] => controller.wait_for_motors().map_err(Into::into),
            ["jog", motor, steps] => {
                let motor = match *motor {
                    "x" => Some(Motor::X),
                    "y" => Some(Motor::Y),
                    "z" => Some(Motor::Z),
                    _ => None,
                };
                match (motor, steps.parse::<i32>()) {
                    (Some(motor), Ok(steps)) => controller.jog(motor, steps).map_err(Into::into),
                    _ => Err(anyhow::anyhow!("usage: jog <x|y|z> <steps>")),
                }
            }
            ["setpos", x, y] => parse_two(x, y).and_then(|(x_deg, y_deg)| {
                let x_steps = controller.calibration().x.angle_to_steps(x_deg);
                let y_steps = controller.calibration().y.angle_to_steps(y_deg);
                controller
                    .set_motor_positions(x_steps, y_steps, 0)
                    .map_err(Into::into)
            }),
            _ => Err(anyhow::anyhow!("invalid command; 'help' lists commands")),
        };
        if let Err(err) = result {
            eprintln!("error: {err:#}");
        }
    }
}

#[cfg(feature = "serial")]
fn parse_two(a: &str, b: &str) -> Result<(f64, f64)> {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        _ => bail!("expected two numeric angles, got '{a}' '{b}'"),
    }
}
