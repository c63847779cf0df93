use knxsim::protocol::*;
use knxsim::*;

fn room() -> Room {
    let dimensions = RoomDimensions::new(5.0, 4.0, 2.5).unwrap();
    let world = World::new(&SimulationConfig::default(), dimensions).unwrap();
    let mut room = Room::new("protocol_room", world, KnxBus::new(GroupAddressStyle::ThreeLevel)).unwrap();
    let ia = |device| IndividualAddress::new(1, 1, device).unwrap();

    room.add_device(Device::functional_module("dimmer", ia(1), ModuleKind::Dimmer).unwrap(), 0.0, 0.5, 1.2)
        .unwrap();
    room.add_device(
        Device::actuator("led", ia(2), ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 }).unwrap(),
        2.5,
        2.0,
        2.5,
    )
    .unwrap();
    room.attach("dimmer", "1/1/2").unwrap();
    room.attach("led", "1/1/2").unwrap();
    room
}

fn command(id: u32, command_type: CommandType) -> Command {
    Command { id, command_type }
}

#[test]
fn test_ping() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();
    let response = handler.execute(&command(1, CommandType::Ping), &mut room);
    assert_eq!(response.id, 1);
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.message.as_deref(), Some("pong"));
}

#[test]
fn test_press_dimmer_sets_led_ratio() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();
    let response = handler.execute(
        &command(
            2,
            CommandType::Press {
                name: "dimmer".to_string(),
                on: Some(true),
                ratio: Some(40),
                power: None,
            },
        ),
        &mut room,
    );
    assert_eq!(response.status, ResponseStatus::Success);

    let led = room.device("led").unwrap().as_actuator().unwrap();
    assert!(led.state());
    assert_eq!(led.state_ratio(), 40);
}

#[test]
fn test_press_errors_are_reported_not_raised() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();

    let unknown = handler.execute(
        &command(
            3,
            CommandType::Press {
                name: "ghost".to_string(),
                on: None,
                ratio: None,
                power: None,
            },
        ),
        &mut room,
    );
    assert_eq!(unknown.status, ResponseStatus::Error);

    let bad_ratio = handler.execute(
        &command(
            4,
            CommandType::Press {
                name: "dimmer".to_string(),
                on: Some(true),
                ratio: Some(150),
                power: None,
            },
        ),
        &mut room,
    );
    assert_eq!(bad_ratio.status, ResponseStatus::Error);
    assert!(!room.device("led").unwrap().as_actuator().unwrap().state());
}

#[test]
fn test_info_queries_return_json() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();

    for command_type in [CommandType::RoomInfo, CommandType::BusInfo, CommandType::WorldInfo] {
        let response = handler.execute(&command(5, command_type), &mut room);
        assert_eq!(response.status, ResponseStatus::Success);
        let message = response.message.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert!(parsed.is_object());
    }

    let device = handler.execute(
        &command(6, CommandType::DeviceInfo { name: "led".to_string() }),
        &mut room,
    );
    let parsed: serde_json::Value = serde_json::from_str(&device.message.unwrap()).unwrap();
    assert_eq!(parsed["name"], "led");
    assert_eq!(parsed["group_addresses"][0], "1/1/2");
}

#[test]
fn test_world_control_commands() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();

    handler.execute(&command(7, CommandType::Pause), &mut room);
    assert!(room.update_world().is_empty());
    assert_eq!(room.world().clock().ticks(), 0);
    handler.execute(&command(8, CommandType::Resume), &mut room);
    room.update_world();
    assert_eq!(room.world().clock().ticks(), 1);

    let speed = handler.execute(&command(9, CommandType::SetSpeed { factor: 60.0 }), &mut room);
    assert_eq!(speed.status, ResponseStatus::Success);
    assert_eq!(room.world().clock().speed_factor(), 60.0);
    let bad_speed = handler.execute(&command(10, CommandType::SetSpeed { factor: -1.0 }), &mut room);
    assert_eq!(bad_speed.status, ResponseStatus::Error);

    handler.execute(
        &command(
            11,
            CommandType::SetWeather {
                weather: Weather::Dark,
            },
        ),
        &mut room,
    );
    assert_eq!(room.world().outdoor().weather, Weather::Dark);

    handler.execute(
        &command(
            12,
            CommandType::SetPresence {
                entity: "bob".to_string(),
                present: true,
            },
        ),
        &mut room,
    );
    assert!(room.world().presence());
}

#[test]
fn test_handle_line_end_to_end() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();

    let reply = handler
        .handle_line(r#"{"id":42,"command_type":{"Press":{"name":"dimmer","ratio":70}}}"#, &mut room)
        .unwrap();
    let response: CommandResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.id, 42);
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(room.device("led").unwrap().as_actuator().unwrap().state_ratio(), 70);

    let garbage = handler.handle_line("not json at all", &mut room).unwrap();
    let response: CommandResponse = serde_json::from_str(&garbage).unwrap();
    assert_eq!(response.id, 0);
    assert_eq!(response.status, ResponseStatus::InvalidCommand);
}

#[test]
fn test_serialize_response_round_trip() {
    let mut handler = ProtocolHandler::new();
    let response = handler.create_response(3, ResponseStatus::Success, Some("ok".to_string()));
    let json = handler.serialize_response(&response).unwrap().to_string();
    let parsed: CommandResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, response);
}

#[test]
fn test_absurd_speed_factor_rejected_and_ticks_keep_running() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();

    let reply = handler
        .handle_line(r#"{"id":1,"command_type":{"SetSpeed":{"factor":1e15}}}"#, &mut room)
        .unwrap();
    let response: CommandResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(room.world().clock().speed_factor(), 180.0);

    room.update_world();
    assert_eq!(room.world().clock().ticks(), 1);
}

#[test]
fn test_oversized_reply_becomes_error_response() {
    let mut handler = ProtocolHandler::new();
    let mut room = room();
    for device in 10..=250u16 {
        let name = format!("thermometer_{:03}", device);
        room.add_device(
            Device::sensor(&name, IndividualAddress::new(1, 2, device).unwrap(), SensorKind::Temperature).unwrap(),
            1.0,
            1.0,
            1.0,
        )
        .unwrap();
    }

    let reply = handler
        .handle_line(r#"{"id":77,"command_type":"RoomInfo"}"#, &mut room)
        .unwrap();
    let response: CommandResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.id, 77);
    assert_eq!(response.status, ResponseStatus::Error);
    assert!(response.message.unwrap().contains("exceeds"));
}
