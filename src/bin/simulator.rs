use knxsim::device::{ActuatorKind, ModuleKind, SensorKind};
use knxsim::gateway::LoopbackGateway;
use knxsim::protocol::ProtocolHandler;
use knxsim::scheduler::{IntervalScheduler, Scheduler, TickCallback};
use knxsim::telemetry::TelemetryCollector;
use knxsim::{ConfigError, Device, GroupAddressStyle, IndividualAddress, KnxBus, Room, RoomDimensions, SimulationConfig, World};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8080;
const TELEMETRY_BROADCAST_BUFFER_SIZE: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🏠 KNX Room Simulator");
    println!("=====================");

    let config = SimulationConfig::default();
    let mut room = build_demo_room(&config)?;
    room.set_gateway(Box::new(LoopbackGateway::new()));
    info!(
        room = room.name(),
        devices = room.devices().len(),
        speed_factor = config.speed_factor,
        "demo room ready"
    );
    let room = Arc::new(Mutex::new(room));

    let (telemetry_tx, _) = broadcast::channel::<String>(TELEMETRY_BROADCAST_BUFFER_SIZE);

    let mut scheduler = IntervalScheduler::new();
    let tick_room = Arc::clone(&room);
    let tick_tx = telemetry_tx.clone();
    let mut collector = TelemetryCollector::new(config.telemetry_interval_ticks);
    let tick: TickCallback = Box::new(move || {
        let Ok(mut room) = tick_room.lock() else {
            error!("room lock poisoned, tick skipped");
            return;
        };
        room.update_world();
        if let Some(snapshot) = collector.on_tick(&room) {
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Fails only when no client is subscribed.
                    let _ = tick_tx.send(json);
                }
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            }
        }
    });
    scheduler.every(Duration::from_secs_f64(config.system_dt_s), tick);

    let tcp_room = Arc::clone(&room);
    let tcp_telemetry_tx = telemetry_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(tcp_room, tcp_telemetry_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    scheduler.stop();
    tcp_server.abort();
    println!("🏠 KNX Room Simulator stopped");

    Ok(())
}

fn build_demo_room(config: &SimulationConfig) -> Result<Room, ConfigError> {
    let dimensions = RoomDimensions::new(6.0, 5.0, 2.5)?;
    let world = World::new(config, dimensions)?;
    let mut room = Room::new("living_room", world, KnxBus::new(GroupAddressStyle::ThreeLevel))?;

    let ia = |device| IndividualAddress::new(1, 1, device);

    room.add_device(Device::functional_module("button", ia(1)?, ModuleKind::Button)?, 0.2, 2.5, 1.2)?;
    room.add_device(Device::functional_module("dimmer", ia(2)?, ModuleKind::Dimmer)?, 0.2, 3.0, 1.2)?;
    room.add_device(
        Device::functional_module("thermostat", ia(3)?, ModuleKind::ThermostatController)?,
        5.8,
        2.5,
        1.5,
    )?;
    room.add_device(Device::functional_module("blinds", ia(4)?, ModuleKind::Dimmer)?, 0.2, 1.0, 1.2)?;

    room.add_device(
        Device::actuator("led", ia(10)?, ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 })?,
        3.0,
        2.5,
        2.5,
    )?;
    room.add_device(
        Device::actuator(
            "heater",
            ia(11)?,
            ActuatorKind::Heater {
                max_power: 400.0,
                update_rule: 2.0,
            },
        )?,
        5.9,
        1.0,
        0.5,
    )?;
    room.add_device(
        Device::actuator("window", ia(12)?, ActuatorKind::Window { width: 1.2, height: 1.4 })?,
        0.0,
        1.5,
        1.5,
    )?;

    room.add_device(Device::sensor("brightness", ia(20)?, SensorKind::Brightness)?, 3.0, 2.5, 0.8)?;
    room.add_device(Device::sensor("thermometer", ia(21)?, SensorKind::Temperature)?, 3.0, 4.9, 1.5)?;
    room.add_device(Device::sensor("hygrometer", ia(22)?, SensorKind::Humidity)?, 3.0, 4.9, 1.4)?;
    room.add_device(Device::sensor("co2", ia(23)?, SensorKind::Co2)?, 3.0, 4.9, 1.3)?;
    room.add_device(Device::sensor("plant", ia(24)?, SensorKind::SoilMoisture)?, 1.0, 4.0, 0.3)?;
    room.add_device(Device::sensor("presence", ia(25)?, SensorKind::Presence)?, 3.0, 2.5, 2.4)?;

    room.attach("button", "1/1/1")?;
    room.attach("led", "1/1/1")?;
    room.attach("dimmer", "1/1/2")?;
    room.attach("led", "1/1/2")?;
    room.attach("thermostat", "1/2/1")?;
    room.attach("heater", "1/2/1")?;
    room.attach("blinds", "1/3/1")?;
    room.attach("window", "1/3/1")?;

    Ok(room)
}

async fn start_tcp_server(
    room: Arc<Mutex<Room>>,
    telemetry_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", TCP_PORT)).await?;
    info!("🌐 TCP server listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New client connected: {}", addr);
                let client_room = Arc::clone(&room);
                let client_telemetry_rx = telemetry_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_room, client_telemetry_rx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    room: Arc<Mutex<Room>>,
    mut telemetry_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let writer = Arc::new(tokio::sync::Mutex::new(writer));

    let telemetry_writer = Arc::clone(&writer);
    let telemetry_task = tokio::spawn(async move {
        while let Ok(telemetry) = telemetry_rx.recv().await {
            let mut writer_guard = telemetry_writer.lock().await;
            if let Err(e) = writer_guard.write_all(telemetry.as_bytes()).await {
                warn!("Failed to send telemetry: {}", e);
                break;
            }
            if let Err(e) = writer_guard.write_all(b"\n").await {
                warn!("Failed to send telemetry newline: {}", e);
                break;
            }
        }
    });

    let mut handler = ProtocolHandler::new();
    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                info!("📨 Received command: {}", trimmed);

                // The room lock must not be held across an await.
                let response = {
                    let mut room = room.lock().map_err(|_| "room lock poisoned")?;
                    handler.handle_line(trimmed, &mut room)
                };

                match response {
                    Ok(response_json) => {
                        let mut writer_guard = writer.lock().await;
                        writer_guard.write_all(response_json.as_bytes()).await?;
                        writer_guard.write_all(b"\n").await?;
                        info!("📤 Sent response: {}", response_json);
                    }
                    Err(e) => error!("Failed to serialize response: {}", e),
                }
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    telemetry_task.abort();
    Ok(())
}
