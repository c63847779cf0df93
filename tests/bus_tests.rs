use knxsim::bus::*;
use knxsim::device::*;
use knxsim::error::DeviceFault;
use knxsim::*;

fn led(name: &str, device: u16) -> Device {
    Device::actuator(
        name,
        IndividualAddress::new(1, 1, device).unwrap(),
        ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 },
    )
    .unwrap()
}

fn ga(text: &str) -> GroupAddress {
    GroupAddress::parse(text, GroupAddressStyle::ThreeLevel).unwrap()
}

fn button_telegram(destination: &str) -> Telegram {
    Telegram::write(
        IndividualAddress::new(1, 1, 100).unwrap(),
        ga(destination),
        Payload::Binary(true),
    )
}

#[test]
fn test_attach_detach_symmetry() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let id = store.insert(led("led", 1));
    let address = ga("1/1/1");

    let outcome = bus.attach(id, &mut store, address).unwrap();
    assert_eq!(outcome, AttachOutcome::Attached);
    assert!(store.get(id).unwrap().group_addresses().contains(&address));
    assert_eq!(bus.bus(address).unwrap().members(), &[id]);

    assert!(bus.detach(id, &mut store, address));
    assert!(!store.get(id).unwrap().group_addresses().contains(&address));
    assert!(bus.bus(address).is_none());
    assert_eq!(bus.group_addresses().count(), 0);
}

#[test]
fn test_emptied_bus_removed_only_when_last_member_leaves() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let a = store.insert(led("a", 1));
    let b = store.insert(led("b", 2));
    let address = ga("2/0/1");

    bus.attach(a, &mut store, address).unwrap();
    bus.attach(b, &mut store, address).unwrap();

    bus.detach(a, &mut store, address);
    assert_eq!(bus.bus(address).unwrap().members(), &[b]);

    bus.detach(b, &mut store, address);
    assert!(bus.is_empty());
}

#[test]
fn test_idempotent_attach() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let id = store.insert(led("led", 1));
    let address = ga("1/1/1");

    bus.attach(id, &mut store, address).unwrap();
    let second = bus.attach(id, &mut store, address).unwrap();

    assert_eq!(second, AttachOutcome::AlreadyAttached);
    assert_eq!(bus.bus(address).unwrap().members().len(), 1);
    assert_eq!(store.get(id).unwrap().group_addresses(), &[address]);
}

#[test]
fn test_dispatch_isolation() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let faulty = store.insert(led("faulty", 1));
    let healthy = store.insert(led("healthy", 2));
    let address = ga("1/1/1");

    bus.attach(faulty, &mut store, address).unwrap();
    bus.attach(healthy, &mut store, address).unwrap();
    store
        .get_mut(faulty)
        .and_then(Device::as_actuator_mut)
        .unwrap()
        .set_enabled(false);

    let report = bus.transmit(&button_telegram("1/1/1"), &mut store);

    assert_eq!(report.delivered, vec![healthy]);
    assert_eq!(report.faults.len(), 1);
    assert!(matches!(report.faults[0], (id, DeviceFault::Disabled(_)) if id == faulty));
    assert!(store.get(healthy).unwrap().as_actuator().unwrap().state());
    assert!(!store.get(faulty).unwrap().as_actuator().unwrap().state());
}

#[test]
fn test_led_toggle() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let id = store.insert(led("led", 1));
    bus.attach(id, &mut store, ga("1/1/1")).unwrap();

    let telegram = button_telegram("1/1/1");
    bus.transmit(&telegram, &mut store);
    assert!(store.get(id).unwrap().as_actuator().unwrap().state());
    bus.transmit(&telegram, &mut store);
    assert!(!store.get(id).unwrap().as_actuator().unwrap().state());
}

#[test]
fn test_heater_power_clamp() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let heater = Device::actuator(
        "heater",
        IndividualAddress::new(1, 1, 5).unwrap(),
        ActuatorKind::Heater {
            max_power: 400.0,
            update_rule: 2.0,
        },
    )
    .unwrap();
    let id = store.insert(heater);
    let address = ga("1/2/1");
    bus.attach(id, &mut store, address).unwrap();

    let source = IndividualAddress::new(1, 1, 100).unwrap();
    let power = |store: &DeviceStore| store.get(id).unwrap().as_actuator().unwrap().power();

    bus.transmit(&Telegram::write(source, address, Payload::HeaterPower(-50.0)), &mut store);
    assert_eq!(power(&store), 0.0);
    bus.transmit(&Telegram::write(source, address, Payload::HeaterPower(900.0)), &mut store);
    assert_eq!(power(&store), 400.0);
    bus.transmit(&Telegram::write(source, address, Payload::HeaterPower(250.0)), &mut store);
    assert_eq!(power(&store), 250.0);
    assert!(store.get(id).unwrap().as_actuator().unwrap().state());
}

#[test]
fn test_members_notified_in_attachment_order() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let ids: Vec<DeviceId> = (1..=3).map(|n| store.insert(led(&format!("led{}", n), n))).collect();
    let address = ga("1/1/1");
    for &id in ids.iter().rev() {
        bus.attach(id, &mut store, address).unwrap();
    }

    let report = bus.transmit(&button_telegram("1/1/1"), &mut store);
    let expected: Vec<DeviceId> = ids.iter().rev().copied().collect();
    assert_eq!(report.delivered, expected);
}

#[test]
fn test_bus_info_lists_members() {
    let mut bus = KnxBus::new(GroupAddressStyle::ThreeLevel);
    let mut store = DeviceStore::new();
    let a = store.insert(led("kitchen", 1));
    bus.attach(a, &mut store, ga("1/1/1")).unwrap();

    let info = bus.info(&store);
    assert_eq!(info.group_addresses.len(), 1);
    assert_eq!(info.group_addresses[0].address, "1/1/1");
    assert_eq!(info.group_addresses[0].members, vec!["kitchen".to_string()]);
}
