use chrono::NaiveDate;
use knxsim::ambient::OutdoorConditions;
use knxsim::device::Reading;
use knxsim::*;

fn config(insulation: Insulation, outdoor_temperature: f64, initial_temperature: f64) -> SimulationConfig {
    SimulationConfig {
        insulation,
        outdoor: OutdoorConditions {
            temperature: outdoor_temperature,
            ..SimulationConfig::default().outdoor
        },
        initial_temperature,
        ..SimulationConfig::default()
    }
}

fn room_with(config: &SimulationConfig) -> Room {
    let dimensions = RoomDimensions::new(5.0, 4.0, 2.5).unwrap();
    let world = World::new(config, dimensions).unwrap();
    Room::new("test_room", world, KnxBus::new(GroupAddressStyle::ThreeLevel)).unwrap()
}

fn ia(device: u16) -> IndividualAddress {
    IndividualAddress::new(1, 1, device).unwrap()
}

fn add_sensor(room: &mut Room, name: &str, device: u16, kind: SensorKind, at: (f64, f64, f64)) {
    room.add_device(Device::sensor(name, ia(device), kind).unwrap(), at.0, at.1, at.2)
        .unwrap();
}

fn add_thermal(room: &mut Room, name: &str, device: u16, kind: ActuatorKind, group_address: &str) {
    room.add_device(Device::actuator(name, ia(device), kind).unwrap(), 4.0, 1.0, 0.5)
        .unwrap();
    room.attach(name, group_address).unwrap();
}

fn add_thermostat(room: &mut Room, name: &str, device: u16, group_address: &str) {
    room.add_device(
        Device::functional_module(name, ia(device), ModuleKind::ThermostatController).unwrap(),
        1.0,
        1.0,
        1.5,
    )
    .unwrap();
    room.attach(name, group_address).unwrap();
}

fn level(room: &Room, name: &str) -> f64 {
    room.device(name)
        .and_then(Device::as_sensor)
        .and_then(|s| s.reading().level())
        .unwrap()
}

#[test]
fn test_temperature_converges_without_overshoot_from_above() {
    let mut room = room_with(&config(Insulation::Good, 15.0, 25.0));
    add_sensor(&mut room, "thermometer", 1, SensorKind::Temperature, (2.0, 2.0, 1.5));

    let mut previous = room.world().temperature_in();
    for _ in 0..500 {
        room.update_world();
        let current = room.world().temperature_in();
        assert!(current <= previous);
        assert!(current >= 15.0);
        previous = current;
    }
    assert!(previous < 16.0);
    assert_eq!(level(&room, "thermometer"), previous);
}

#[test]
fn test_temperature_converges_without_overshoot_from_below() {
    let mut room = room_with(&config(Insulation::Good, 20.0, 12.0));
    let mut previous = room.world().temperature_in();
    for _ in 0..500 {
        room.update_world();
        let current = room.world().temperature_in();
        assert!(current >= previous);
        assert!(current <= 20.0);
        previous = current;
    }
}

#[test]
fn test_temperature_stays_in_bounds_under_any_power() {
    let mut room = room_with(&config(Insulation::Perfect, 20.0, 20.0));
    add_thermal(
        &mut room,
        "heater",
        1,
        ActuatorKind::Heater {
            max_power: 1000.0,
            update_rule: 50.0,
        },
        "1/2/1",
    );
    add_thermal(
        &mut room,
        "ac",
        2,
        ActuatorKind::AirConditioner {
            max_power: 1000.0,
            update_rule: -50.0,
        },
        "1/2/2",
    );
    add_thermostat(&mut room, "heating", 3, "1/2/1");
    add_thermostat(&mut room, "cooling", 4, "1/2/2");

    let sequence = [
        ("heating", 1000.0),
        ("heating", 5000.0),
        ("cooling", 1000.0),
        ("heating", 0.0),
        ("cooling", -10.0),
        ("heating", 750.0),
    ];
    for (module, power) in sequence {
        room.user_input(module, &UserInput::power(power)).unwrap();
        for _ in 0..40 {
            room.update_world();
            let t = room.world().temperature_in();
            assert!((10.0..=30.0).contains(&t), "temperature {} out of bounds", t);
        }
    }

    room.user_input("cooling", &UserInput::power(0.0)).unwrap();
    room.user_input("heating", &UserInput::power(1000.0)).unwrap();
    for _ in 0..40 {
        room.update_world();
    }
    assert_eq!(room.world().temperature_in(), 30.0);
}

#[test]
fn test_heater_contribution_is_share_of_installed_power() {
    let mut room = room_with(&config(Insulation::Perfect, 20.0, 20.0));
    let heater = ActuatorKind::Heater {
        max_power: 400.0,
        update_rule: 2.0,
    };
    add_thermal(&mut room, "heater_a", 1, heater, "1/2/1");
    add_thermal(&mut room, "heater_b", 2, heater, "1/2/2");
    add_thermostat(&mut room, "thermostat", 3, "1/2/1");

    room.user_input("thermostat", &UserInput::power(200.0)).unwrap();
    room.update_world();

    // 2 °C/h * 200 W / 800 W installed * (1 s * 180 / 3600 s)
    let expected = 20.0 + 2.0 * 200.0 / 800.0 * 0.05;
    assert!((room.world().temperature_in() - expected).abs() < 1e-9);
}

#[test]
fn test_disabled_heater_does_not_heat() {
    let mut room = room_with(&config(Insulation::Perfect, 20.0, 20.0));
    add_thermal(
        &mut room,
        "heater",
        1,
        ActuatorKind::Heater {
            max_power: 400.0,
            update_rule: 2.0,
        },
        "1/2/1",
    );
    add_thermostat(&mut room, "thermostat", 2, "1/2/1");

    room.user_input("thermostat", &UserInput::power(400.0)).unwrap();
    room.set_enabled("heater", false).unwrap();
    for _ in 0..10 {
        room.update_world();
    }
    assert_eq!(room.world().temperature_in(), 20.0);
}

#[test]
fn test_humidity_drops_when_air_warms() {
    let mut room = room_with(&config(Insulation::Perfect, 20.0, 20.0));
    add_sensor(&mut room, "hygrometer", 1, SensorKind::Humidity, (2.0, 2.0, 1.5));
    add_thermal(
        &mut room,
        "heater",
        2,
        ActuatorKind::Heater {
            max_power: 400.0,
            update_rule: 20.0,
        },
        "1/2/1",
    );
    add_thermostat(&mut room, "thermostat", 3, "1/2/1");

    room.update_world();
    let steady = room.world().humidity_in();
    assert!((steady - 45.0).abs() < 1e-9);

    room.user_input("thermostat", &UserInput::power(400.0)).unwrap();
    for _ in 0..10 {
        room.update_world();
    }
    assert!(room.world().humidity_in() < steady);
    assert_eq!(level(&room, "hygrometer"), room.world().humidity_in());
}

#[test]
fn test_co2_relaxes_toward_outdoor() {
    let mut room = room_with(&config(Insulation::Average, 20.0, 20.0));
    add_sensor(&mut room, "co2", 1, SensorKind::Co2, (2.0, 2.0, 1.5));

    let mut previous = room.world().co2_in();
    for _ in 0..200 {
        room.update_world();
        let current = room.world().co2_in();
        assert!(current <= previous && current >= 400.0);
        previous = current;
    }
    assert!(previous < 800.0);
    assert_eq!(level(&room, "co2"), previous);
}

#[test]
fn test_soil_moisture_decays_to_floor() {
    let mut room = room_with(&SimulationConfig::default());
    add_sensor(&mut room, "plant", 1, SensorKind::SoilMoisture, (1.0, 1.0, 0.2));

    // 40 ticks at 0.05 h each = 2 simulated hours at 0.5 %/h.
    for _ in 0..40 {
        room.update_world();
    }
    assert!((level(&room, "plant") - 34.0).abs() < 1e-9);

    room.set_soil_moisture("plant", 10.01).unwrap();
    for _ in 0..10 {
        room.update_world();
    }
    assert_eq!(level(&room, "plant"), 10.0);
    assert!(room.set_soil_moisture("nonexistent", 50.0).is_err());
}

#[test]
fn test_presence_sensor_mirrors_entities() {
    let mut room = room_with(&SimulationConfig::default());
    add_sensor(&mut room, "presence", 1, SensorKind::Presence, (2.0, 2.0, 2.4));

    room.update_world();
    assert_eq!(
        room.device("presence").unwrap().as_sensor().unwrap().reading(),
        Reading::Presence(false)
    );

    assert!(room.set_presence("alice", true));
    assert!(!room.set_presence("alice", true));
    room.update_world();
    assert_eq!(
        room.device("presence").unwrap().as_sensor().unwrap().reading(),
        Reading::Presence(true)
    );

    room.set_presence("alice", false);
    room.update_world();
    assert!(!room.world().presence());
}

#[test]
fn test_led_brightens_sensor_at_night() {
    let night = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let mut room = room_with(&SimulationConfig {
        start: night,
        ..SimulationConfig::default()
    });
    add_sensor(&mut room, "brightness", 1, SensorKind::Brightness, (2.5, 2.0, 0.8));
    room.add_device(
        Device::actuator("led", ia(2), ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 }).unwrap(),
        2.5,
        2.0,
        2.5,
    )
    .unwrap();
    room.add_device(Device::functional_module("button", ia(3), ModuleKind::Button).unwrap(), 0.0, 0.5, 1.2)
        .unwrap();
    room.attach("led", "1/1/1").unwrap();
    room.attach("button", "1/1/1").unwrap();

    room.update_world();
    let dark = level(&room, "brightness");
    assert_eq!(dark, 0.0);

    room.user_input("button", &UserInput::default()).unwrap();
    room.update_world();
    assert!(level(&room, "brightness") > 50.0);
}

#[test]
fn test_window_blinds_dim_daylight_but_never_fully() {
    let noon = NaiveDate::from_ymd_opt(2024, 6, 21)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap();
    let mut room = room_with(&SimulationConfig {
        start: noon,
        ..SimulationConfig::default()
    });
    add_sensor(&mut room, "brightness", 1, SensorKind::Brightness, (2.5, 2.0, 1.0));
    room.add_device(
        Device::actuator("window", ia(2), ActuatorKind::Window { width: 1.2, height: 1.4 }).unwrap(),
        0.0,
        2.0,
        1.5,
    )
    .unwrap();
    room.add_device(Device::functional_module("blinds", ia(3), ModuleKind::Dimmer).unwrap(), 0.0, 0.5, 1.2)
        .unwrap();
    room.attach("window", "1/3/1").unwrap();
    room.attach("blinds", "1/3/1").unwrap();

    room.update_world();
    let open = level(&room, "brightness");

    room.user_input("blinds", &UserInput::dimmer(false, 0)).unwrap();
    room.update_world();
    let closed = level(&room, "brightness");

    assert!(closed > 0.0);
    assert!(open > closed);
    assert!((closed / open - 0.2).abs() < 1e-6);
}

#[test]
fn test_paused_world_accepts_input_without_ambient_effect() {
    let mut room = room_with(&config(Insulation::Bad, 10.0, 25.0));
    room.add_device(
        Device::actuator("led", ia(1), ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 }).unwrap(),
        2.5,
        2.0,
        2.5,
    )
    .unwrap();
    room.add_device(Device::functional_module("button", ia(2), ModuleKind::Button).unwrap(), 0.0, 0.5, 1.2)
        .unwrap();
    room.attach("led", "1/1/1").unwrap();
    room.attach("button", "1/1/1").unwrap();

    room.pause();
    assert!(room.update_world().is_empty());
    assert_eq!(room.world().temperature_in(), 25.0);

    room.user_input("button", &UserInput::default()).unwrap();
    assert!(room.device("led").unwrap().as_actuator().unwrap().state());

    room.resume();
    room.update_world();
    assert!(room.world().temperature_in() < 25.0);
}

#[test]
fn test_failed_light_step_keeps_every_previous_reading() {
    let night = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let dimensions = RoomDimensions::new(20.0, 20.0, 3.0).unwrap();
    let config = SimulationConfig {
        start: night,
        ..SimulationConfig::default()
    };
    let world = World::new(&config, dimensions).unwrap();
    let mut room = Room::new("hall", world, KnxBus::new(GroupAddressStyle::ThreeLevel)).unwrap();

    // Sensors are registered first so the far one is written before the near one.
    add_sensor(&mut room, "far", 1, SensorKind::Brightness, (19.0, 19.0, 1.0));
    add_sensor(&mut room, "near", 2, SensorKind::Brightness, (1.0, 1.0, 1.0));
    for n in 0..5u16 {
        let name = format!("flood{}", n);
        room.add_device(
            Device::actuator(&name, ia(10 + n), ActuatorKind::Led { lumen: 1.7e306, beam_angle: 120.0 }).unwrap(),
            1.0,
            1.0,
            1.0,
        )
        .unwrap();
        room.attach(&name, "1/1/1").unwrap();
    }
    room.add_device(Device::functional_module("button", ia(30), ModuleKind::Button).unwrap(), 0.0, 0.5, 1.2)
        .unwrap();
    room.attach("button", "1/1/1").unwrap();

    room.update_world();
    assert_eq!(level(&room, "far"), 0.0);
    assert_eq!(level(&room, "near"), 0.0);

    room.user_input("button", &UserInput::default()).unwrap();
    room.update_world();

    // The near sensor overflows, so the whole light step is skipped.
    assert_eq!(level(&room, "far"), 0.0);
    assert_eq!(level(&room, "near"), 0.0);
    // The tick itself still counts.
    assert_eq!(room.world().clock().ticks(), 2);
}
