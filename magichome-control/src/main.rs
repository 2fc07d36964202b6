use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use magichome_control_lib::control_interface::addressable::ControlAddressable;
use magichome_control_lib::control_interface::state::QueryState;
use magichome_control_lib::control_interface::Control;
use magichome_control_lib::led::addressable::FixedModeOptions;
use magichome_control_lib::led::custom_mode::{CustomMode, TransitionType};
use magichome_control_lib::led::led_color::RGB;
use magichome_control_lib::util::config::{AckFlags, AddressableOptions, ControlOptions};
use magichome_control_lib::util::discovery::Discovery;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "magichome_control",
    about = "Controls Magic Home Wi-Fi LED controllers",
    version = "0.1.0"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` and `query` commands.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Connection settings shared by the device subcommands
#[derive(Args)]
pub struct ConnectionArgs {
    /// Bitmask of acknowledged commands: 1 power, 2 color, 4 pattern, 8 custom pattern
    #[clap(long, default_value_t = 0x0f)]
    ack: u8,

    /// Set the mask byte in partial color updates
    #[clap(long)]
    masks: bool,

    /// Log all received bytes (needs RUST_LOG=info)
    #[clap(long)]
    bytes: bool,

    /// Send the color frames with a cold white channel
    #[clap(long = "cold-white")]
    cold_white: bool,

    /// Connect timeout in milliseconds
    #[clap(long = "connect-timeout", value_parser = parse_duration)]
    connect_timeout: Option<Duration>,

    /// Timeout of acknowledged commands in milliseconds, `0` or `none` waits forever
    #[clap(long = "command-timeout", value_parser = parse_optional_duration, default_value = "1000")]
    command_timeout: OptionalDuration,
}

impl ConnectionArgs {
    fn control_options(&self) -> ControlOptions {
        ControlOptions::default()
            .with_ack(AckFlags::from_mask(self.ack))
            .with_apply_masks(self.masks)
            .with_log_all_received(self.bytes)
            .with_cold_white_support(self.cold_white)
            .with_connect_timeout(self.connect_timeout)
            .with_command_timeout(self.command_timeout.0)
    }
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Subcommand for operations on a standard controller
    #[clap(name = "device-call")]
    DeviceCall {
        /// Sets the IP address of the controller
        #[clap(long)]
        ip: String,

        #[clap(flatten)]
        connection: ConnectionArgs,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Subcommand for operations on an addressable strip controller
    #[clap(name = "addressable")]
    Addressable {
        /// Sets the IP address of the controller
        #[clap(long)]
        ip: String,

        #[clap(flatten)]
        connection: ConnectionArgs,

        #[clap(subcommand)]
        action: AddressableAction,
    },
    /// Searches the local network for controllers
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 500)]
        timeout: u64,
    },
    /// Lists the built-in pattern names
    #[clap(name = "list-patterns")]
    ListPatterns,
}

fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let millis = s
        .parse::<u64>()
        .map_err(|_| "could not parse duration in milliseconds")?;
    Ok(Duration::from_millis(millis))
}

/// A duration which can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalDuration(Option<Duration>);

fn parse_optional_duration(s: &str) -> Result<OptionalDuration, &'static str> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(OptionalDuration(None));
    }
    let duration = parse_duration(s)?;
    Ok(OptionalDuration(Some(duration).filter(|d| !d.is_zero())))
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    #[clap(name = "turn-on")]
    TurnOn,
    #[clap(name = "turn-off")]
    TurnOff,
    /// Sets the color as r,g,b
    #[clap(name = "set-color")]
    SetColor {
        color: RGB,

        /// Scale the color by a brightness between 0 and 100
        #[clap(long)]
        brightness: Option<u8>,
    },
    /// Sets the color and the warm white value
    #[clap(name = "set-rgbw")]
    SetRgbw { color: RGB, warm_white: u8 },
    #[clap(name = "set-warm-white")]
    SetWarmWhite { warm_white: u8 },
    /// Starts a built-in pattern (see `list-patterns`)
    #[clap(name = "set-pattern")]
    SetPattern {
        pattern: String,

        /// Speed between 0 and 100
        #[clap(default_value_t = 50)]
        speed: u8,
    },
    /// Starts one of the addressable built-in patterns
    #[clap(name = "set-ia-pattern")]
    SetIaPattern {
        /// Pattern code between 1 and 300
        code: u16,

        /// Speed between 0 and 100
        #[clap(default_value_t = 50)]
        speed: u8,
    },
    /// Plays up to 16 colors
    #[clap(name = "set-custom-pattern")]
    SetCustomPattern {
        #[clap(value_enum)]
        transition: TransitionType,

        /// Speed between 0 and 100
        speed: u8,

        /// Colors as r,g,b
        #[clap(num_args = 1..=16, required = true)]
        colors: Vec<RGB>,
    },
    /// Prints the current state
    #[clap(name = "query")]
    Query {
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
}

/// Actions available under the `addressable` subcommand
#[derive(Subcommand)]
pub enum AddressableAction {
    #[clap(name = "turn-on")]
    TurnOn,
    #[clap(name = "turn-off")]
    TurnOff,
    /// Prints the current state
    #[clap(name = "query")]
    Query {
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Shows a single effect in fixed colors
    #[clap(name = "fixed")]
    Fixed {
        /// Effect number between 1 and 10
        #[clap(long, default_value_t = 1)]
        effect: u8,

        /// Speed between 0 and 100
        #[clap(long, default_value_t = 50)]
        speed: u8,

        #[clap(long, default_value = "255,255,255")]
        foreground: RGB,

        #[clap(long, default_value = "0,0,0")]
        background: RGB,

        #[clap(long)]
        reversed: bool,
    },
    /// Starts one of the RBM modes
    #[clap(name = "rbm")]
    Rbm {
        /// Mode number between 1 and 100
        mode: u8,

        /// Brightness between 1 and 100
        #[clap(long, default_value_t = 50)]
        brightness: u8,

        /// Speed between 0 and 100
        #[clap(long, default_value_t = 50)]
        speed: u8,
    },
}

fn print_state(state: &QueryState, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Plaintext => {
            println!("Type: {:#04x}", state.device_type);
            println!("Power: {}", if state.on { "on" } else { "off" });
            match state.mode {
                Some(mode) => println!("Mode: {}", mode),
                None => println!("Mode: unknown"),
            }
            if let Some(pattern) = &state.pattern {
                println!("Pattern: {}", pattern);
            }
            println!("Speed: {:.0}", state.speed);
            println!("Color: {}", state.color);
            println!("Warm white: {}", state.warm_white);
            println!("Cold white: {}", state.cold_white);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string(state)?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(state)?;
            println!("{}", yaml);
        }
    }
    Ok(())
}

fn report(applied: bool, what: &str) -> Result<()> {
    if applied {
        println!("{}", what);
        Ok(())
    } else {
        Err(anyhow!("The controller did not confirm the command"))
    }
}

async fn handle_device_call(control: Control, action: DeviceAction) -> Result<()> {
    match action {
        DeviceAction::TurnOn => report(control.turn_on().await?, "Device turned on"),
        DeviceAction::TurnOff => report(control.turn_off().await?, "Device turned off"),
        DeviceAction::SetColor { color, brightness } => {
            let applied = match brightness {
                Some(brightness) => control.set_color_with_brightness(color, brightness).await?,
                None => control.set_color(color).await?,
            };
            report(applied, &format!("Color set to {}", color))
        }
        DeviceAction::SetRgbw { color, warm_white } => {
            let applied = control.set_color_and_warm_white(color, warm_white).await?;
            report(applied, &format!("Color set to {}, warm white {}", color, warm_white))
        }
        DeviceAction::SetWarmWhite { warm_white } => {
            let applied = control.set_warm_white(warm_white).await?;
            report(applied, &format!("Warm white set to {}", warm_white))
        }
        DeviceAction::SetPattern { pattern, speed } => {
            let applied = control
                .set_pattern(&pattern, speed)
                .await
                .with_context(|| format!("Failed to start pattern '{}'", pattern))?;
            report(applied, &format!("Pattern {} started", pattern))
        }
        DeviceAction::SetIaPattern { code, speed } => {
            let applied = control.set_ia_pattern(code, speed).await?;
            report(applied, &format!("Pattern {} started", code))
        }
        DeviceAction::SetCustomPattern {
            transition,
            speed,
            colors,
        } => {
            let mut mode = CustomMode::new(transition);
            mode.add_color_list(&colors)?;
            let applied = control.set_custom_pattern(&mode, speed).await?;
            report(applied, &format!("Custom pattern with {} colors started", colors.len()))
        }
        DeviceAction::Query { output } => {
            let state = control.query_state().await?;
            print_state(&state, output)
        }
    }
}

async fn handle_addressable(control: ControlAddressable, action: AddressableAction) -> Result<()> {
    match action {
        AddressableAction::TurnOn => report(control.turn_on().await?, "Device turned on"),
        AddressableAction::TurnOff => report(control.turn_off().await?, "Device turned off"),
        AddressableAction::Query { output } => {
            let state = control.query_state().await?;
            print_state(&state, output)
        }
        AddressableAction::Fixed {
            effect,
            speed,
            foreground,
            background,
            reversed,
        } => {
            control
                .set_fixed_mode(&FixedModeOptions {
                    effect,
                    speed,
                    foreground,
                    background,
                    reversed,
                })
                .await?;
            println!("Fixed mode {} set", effect);
            Ok(())
        }
        AddressableAction::Rbm {
            mode,
            brightness,
            speed,
        } => {
            control.set_rbm_mode(mode, brightness, speed).await?;
            println!("RBM mode {} set", mode);
            Ok(())
        }
    }
}

async fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Discover { output, timeout } => {
            let devices = Discovery::find_devices(Duration::from_millis(timeout)).await?;
            match output {
                OutputFormat::Plaintext => {
                    Discovery::pretty_print_devices(&devices);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&devices)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&devices)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::ListPatterns => {
            for name in Control::pattern_names() {
                println!("{}", name);
            }
        }
        Commands::DeviceCall {
            ip,
            connection,
            action,
        } => {
            let control = Control::new(&ip, connection.control_options());
            handle_device_call(control, action).await?;
        }
        Commands::Addressable {
            ip,
            connection,
            action,
        } => {
            let options = AddressableOptions::from(&connection.control_options());
            let control = ControlAddressable::new(&ip, options);
            handle_addressable(control, action).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_custom_pattern() {
        let cli = Cli::try_parse_from([
            "magichome_control",
            "device-call",
            "--ip",
            "10.0.0.2",
            "--ack",
            "3",
            "set-custom-pattern",
            "jump",
            "75",
            "255,0,255",
            "0,255,0",
        ])
        .unwrap();

        let Commands::DeviceCall {
            connection, action, ..
        } = cli.command
        else {
            panic!("unexpected command");
        };
        let options = connection.control_options();
        assert!(options.ack.power && options.ack.color && !options.ack.pattern);
        assert_eq!(options.command_timeout, Some(Duration::from_millis(1000)));
        match action {
            DeviceAction::SetCustomPattern {
                transition, colors, ..
            } => {
                assert_eq!(transition, TransitionType::Jump);
                assert_eq!(colors, vec![RGB::new(255, 0, 255), RGB::new(0, 255, 0)]);
            }
            _ => panic!("unexpected action"),
        }
    }

    fn command_timeout_of(value: &str) -> Option<Duration> {
        let cli = Cli::try_parse_from([
            "magichome_control",
            "device-call",
            "--ip",
            "10.0.0.2",
            "--command-timeout",
            value,
            "query",
        ])
        .unwrap();
        let Commands::DeviceCall { connection, .. } = cli.command else {
            panic!("unexpected command");
        };
        connection.control_options().command_timeout
    }

    #[test]
    fn test_command_timeout_can_be_disabled() {
        assert_eq!(command_timeout_of("250"), Some(Duration::from_millis(250)));
        assert_eq!(command_timeout_of("0"), None);
        assert_eq!(command_timeout_of("none"), None);
        assert_eq!(command_timeout_of("NONE"), None);
        assert!(Cli::try_parse_from([
            "magichome_control",
            "device-call",
            "--ip",
            "10.0.0.2",
            "--command-timeout",
            "soon",
            "query",
        ])
        .is_err());
    }
}
