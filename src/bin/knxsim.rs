use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use knxsim::protocol::{Command, CommandType};
use knxsim::Weather;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";
const COMMAND_TIMEOUT_S: u64 = 5;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let matches = App::new("knxsim")
        .version("0.1.0")
        .about("🏠 KNX Room Simulator client")
        .setting(AppSettings::VersionlessSubcommands)
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(SubCommand::with_name("ping").about("🏓 Test connection to the simulator"))
        .subcommand(SubCommand::with_name("room").about("🏠 Show the room and its devices"))
        .subcommand(
            SubCommand::with_name("device")
                .about("🔎 Show one device")
                .arg(Arg::with_name("name").required(true).help("Device name")),
        )
        .subcommand(SubCommand::with_name("bus").about("🚌 Show group addresses and their members"))
        .subcommand(SubCommand::with_name("world").about("🌤️  Show ambient values and simulated time"))
        .subcommand(
            SubCommand::with_name("press")
                .about("👆 Activate a functional module")
                .arg(Arg::with_name("name").required(true).help("Functional module name"))
                .arg(Arg::with_name("on").long("on").conflicts_with("off").help("Switch on"))
                .arg(Arg::with_name("off").long("off").help("Switch off"))
                .arg(
                    Arg::with_name("ratio")
                        .long("ratio")
                        .takes_value(true)
                        .value_name("PERCENT")
                        .help("Dimmer ratio, 0-100")
                        .validator(|v| match v.parse::<u8>() {
                            Ok(r) if r <= 100 => Ok(()),
                            _ => Err("Ratio must be a number between 0 and 100".into()),
                        }),
                )
                .arg(
                    Arg::with_name("power")
                        .long("power")
                        .takes_value(true)
                        .value_name("WATTS")
                        .help("Thermostat power request")
                        .validator(|v| match v.parse::<f64>() {
                            Ok(p) if p.is_finite() => Ok(()),
                            _ => Err("Power must be a number".into()),
                        }),
                ),
        )
        .subcommand(SubCommand::with_name("pause").about("⏸️  Pause the simulation"))
        .subcommand(SubCommand::with_name("resume").about("▶️  Resume the simulation"))
        .subcommand(
            SubCommand::with_name("speed")
                .about("⏩ Set the speed factor")
                .arg(
                    Arg::with_name("factor")
                        .required(true)
                        .help("Simulated seconds per real second")
                        .validator(|v| match v.parse::<f64>() {
                            Ok(f) if f > 0.0 => Ok(()),
                            _ => Err("Speed factor must be a positive number".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("weather")
                .about("⛅ Set the outdoor weather")
                .arg(
                    Arg::with_name("weather")
                        .required(true)
                        .possible_values(&["clear", "overcast", "dark"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("presence")
                .about("🚶 Move an entity in or out of the room")
                .arg(Arg::with_name("entity").required(true).help("Entity name"))
                .arg(Arg::with_name("state").required(true).possible_values(&["in", "out"])),
        )
        .subcommand(SubCommand::with_name("monitor").about("📡 Stream room snapshots"))
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse::<u16>()?;
    let format = matches.value_of("format").unwrap_or("table");
    let verbose = matches.is_present("verbose");

    if verbose {
        println!("{}", "🏠 knxsim - KNX Room Simulator".bright_blue().bold());
        println!("{} {}:{}", "Connecting to".dimmed(), host, port);
    }

    let command_type = match matches.subcommand() {
        ("ping", _) => CommandType::Ping,
        ("room", _) => CommandType::RoomInfo,
        ("device", Some(sub)) => CommandType::DeviceInfo {
            name: sub.value_of("name").unwrap_or_default().to_string(),
        },
        ("bus", _) => CommandType::BusInfo,
        ("world", _) => CommandType::WorldInfo,
        ("press", Some(sub)) => press_command(sub)?,
        ("pause", _) => CommandType::Pause,
        ("resume", _) => CommandType::Resume,
        ("speed", Some(sub)) => CommandType::SetSpeed {
            factor: sub.value_of("factor").unwrap_or("1").parse()?,
        },
        ("weather", Some(sub)) => CommandType::SetWeather {
            weather: parse_weather(sub.value_of("weather").unwrap_or("clear")),
        },
        ("presence", Some(sub)) => CommandType::SetPresence {
            entity: sub.value_of("entity").unwrap_or_default().to_string(),
            present: sub.value_of("state") == Some("in"),
        },
        ("monitor", _) => return monitor(host, port, format).await,
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the simulator", "cargo run --bin knxsim-simulator".bright_cyan());
            println!("  {} Test connection", "knxsim ping".bright_cyan());
            println!("  {} Toggle the demo light", "knxsim press button".bright_cyan());
            return Ok(());
        }
    };

    let action = matches.subcommand_name().unwrap_or("command").to_string();
    let command = Command {
        id: std::process::id(),
        command_type,
    };
    let response = send_command(host, port, &serde_json::to_string(&command)?).await?;
    print_response(&action, &response, format);

    Ok(())
}

fn press_command(matches: &ArgMatches<'_>) -> CliResult<CommandType> {
    let on = if matches.is_present("on") {
        Some(true)
    } else if matches.is_present("off") {
        Some(false)
    } else {
        None
    };
    Ok(CommandType::Press {
        name: matches.value_of("name").unwrap_or_default().to_string(),
        on,
        ratio: matches.value_of("ratio").map(str::parse).transpose()?,
        power: matches.value_of("power").map(str::parse).transpose()?,
    })
}

fn parse_weather(value: &str) -> Weather {
    match value {
        "overcast" => Weather::Overcast,
        "dark" => Weather::Dark,
        _ => Weather::Clear,
    }
}

async fn connect(host: &str, port: u16) -> CliResult<TcpStream> {
    let addr = format!("{}:{}", host, port);
    match TcpStream::connect(&addr).await {
        Ok(stream) => Ok(stream),
        Err(e) => {
            eprintln!("{} Failed to connect to simulator at {}", "❌".red(), addr.bright_white());
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "cargo run --bin knxsim-simulator".bright_cyan());
            } else {
                eprintln!("{} Network error: {}", "🔌".yellow(), e.to_string().bright_red());
            }
            Err(e.into())
        }
    }
}

/// Send one command line and wait for its response. Snapshot lines streamed
/// on the same connection are skipped.
async fn send_command(host: &str, port: u16, command: &str) -> CliResult<String> {
    let stream = connect(host, port).await?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let exchange = async {
        writer.write_all(command.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }
            let is_response = serde_json::from_str::<serde_json::Value>(&line)
                .map(|v| v.get("status").is_some())
                .unwrap_or(false);
            if is_response {
                return Ok(line.trim().to_string());
            }
        }
    };

    match tokio::time::timeout(std::time::Duration::from_secs(COMMAND_TIMEOUT_S), exchange).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!("{} Command timed out after {} seconds", "⏰".yellow(), COMMAND_TIMEOUT_S);
            Err("Command timeout".into())
        }
    }
}

fn print_response(action: &str, response: &str, format: &str) {
    if format == "json" {
        println!("{}", response);
        return;
    }
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(response) else {
        println!("{}", response);
        return;
    };
    let status = parsed["status"].as_str().unwrap_or("Unknown");
    let message = parsed["message"].as_str().unwrap_or("");

    match (status, format) {
        ("Success", "compact") => println!("{}", "OK".bright_green()),
        ("Success", _) => match serde_json::from_str::<serde_json::Value>(message) {
            Ok(details) if details.is_object() => {
                println!("{} {}", "📋".bright_blue(), action.bright_blue().bold());
                print_table(&details, 1);
            }
            _ => println!("{} {}", "✅".green(), message.bright_green()),
        },
        ("InvalidCommand", _) => {
            println!("{} {} rejected: {}", "❌".red(), action.bright_white(), message.bright_red());
        }
        _ => {
            println!("{} {} failed: {}", "❌".red(), action.bright_white(), message.bright_red());
            if message.contains("no device named") {
                println!("{} Try: {}", "💡".yellow(), "knxsim room".bright_cyan());
            }
        }
    }
}

fn print_table(value: &serde_json::Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(map) => {
            for (key, field) in map {
                if field.is_object() || field.is_array() {
                    println!("{}{}", indent, format!("{}:", key).bright_white());
                    print_table(field, depth + 1);
                } else {
                    println!("{}{} {}", indent, format!("{}:", key).bright_white(), field.to_string().bright_cyan());
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                if item.is_object() || item.is_array() {
                    println!("{}{}", indent, "-".dimmed());
                    print_table(item, depth + 1);
                } else {
                    println!("{}- {}", indent, item.to_string().bright_cyan());
                }
            }
        }
        other => println!("{}{}", indent, other.to_string().bright_cyan()),
    }
}

async fn monitor(host: &str, port: u16, format: &str) -> CliResult<()> {
    let stream = connect(host, port).await?;
    let mut reader = BufReader::new(stream);
    println!("{} {}", "📡".bright_blue(), "Monitoring room snapshots (Ctrl+C to stop)".bright_blue());

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            println!("{}", "Connection closed by simulator".yellow());
            return Ok(());
        }
        let Ok(snapshot) = serde_json::from_str::<serde_json::Value>(line.trim()) else {
            continue;
        };
        match format {
            "json" => println!("{}", line.trim()),
            "compact" => println!(
                "#{} {} T={:.2}°C RH={:.1}% CO2={:.0}ppm",
                snapshot["sequence_number"],
                snapshot["date_time"].as_str().unwrap_or("?"),
                snapshot["temperature_in"].as_f64().unwrap_or(f64::NAN),
                snapshot["humidity_in"].as_f64().unwrap_or(f64::NAN),
                snapshot["co2_in"].as_f64().unwrap_or(f64::NAN),
            ),
            _ => {
                println!(
                    "{} {}",
                    "🕒".bright_blue(),
                    snapshot["date_time"].as_str().unwrap_or("?").bright_white().bold()
                );
                print_table(&snapshot, 1);
            }
        }
    }
}
