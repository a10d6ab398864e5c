use assertables::assert_contains;
use integration_tests::prelude::*;
use printcan_common::commands::Notification;
use printcan_node::printer::{DeviceAction, JobState};

fn setup() -> (SimNetwork, PrinterNode) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = SimNetwork::new();
    sim.heartbeat_times.insert(node_id(DISPLAY_ID), 1000);
    let mut node = sim.start_node(&full_config());
    sim.boot_peer(&mut node, DISPLAY_ID);
    sim.step(&mut node);
    (sim, node)
}

fn work_state(sim: &SimNetwork) -> u8 {
    (sim.stack.local_u8(object_ids::GLOBAL, 1) >> 3) & 0x7
}

#[test]
fn test_init_fills_dictionary() {
    let (sim, node) = setup();

    assert_eq!(Some(&b"printcan"[..]), sim.stack.local(0x1008, 0));
    assert_eq!(3000, sim.stack.local_u16(0x1017, 0));
    assert_eq!(1, sim.stack.local_u8(object_ids::MACHINE_INFO, 3));
    assert_eq!(node.dispatch().len(), sim.stack.observers.len());
    assert_contains!(sim.stack.observers, &(object_ids::CMD_COMMON, 0));
    assert_contains!(sim.stack.observers, &(object_ids::CANFILE, 2));
}

#[test]
fn test_machine_without_display() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = SimNetwork::new();
    let config = NodeConfig {
        canfile_host: Some(HOST_ID),
        ..NodeConfig::new(PRINTER_ID)
    };
    let mut node = sim.start_node(&config);

    assert_eq!(2, sim.stack.observers.len());
    assert!(sim.stack.pdos.get(&1).is_none());

    // Display commands are not routed
    sim.command(&mut node, object_ids::CMD_TASK, 0);
    sim.step(&mut node);
    assert!(sim.printer.actions.is_empty());
    assert!(sim.stack.local(object_ids::CUR_TEMP, 1).is_none());
}

#[test]
fn test_pause_and_resume_media_print() {
    let (mut sim, mut node) = setup();
    sim.printer.snapshot.media_job = JobState::Printing;
    sim.step(&mut node);
    assert_eq!(1, work_state(&sim));

    sim.command(&mut node, object_ids::CMD_TASK, 0);
    sim.step(&mut node);
    assert_eq!(2, work_state(&sim));

    sim.printer.filament_present = false;
    sim.command(&mut node, object_ids::CMD_TASK, 1);
    sim.step(&mut node);
    assert_eq!(2, work_state(&sim));
    assert_eq!(
        vec![u16::from(Notification::FilamentWait)],
        sim.display.notifications
    );

    sim.printer.filament_present = true;
    sim.command(&mut node, object_ids::CMD_TASK, 1);
    sim.step(&mut node);
    assert_eq!(1, work_state(&sim));
    assert_eq!(
        vec![DeviceAction::PausePrint, DeviceAction::ResumePrint],
        sim.printer.actions
    );
}

#[test]
fn test_cold_extrude_refused() {
    let (mut sim, mut node) = setup();
    sim.printer.hot = false;

    sim.command(&mut node, object_ids::CMD_EXTRUDE, 10);
    sim.step(&mut node);
    assert!(sim.printer.actions.is_empty());
    assert_eq!(
        vec![u16::from(Notification::TarTempLow)],
        sim.display.notifications
    );
}

#[test]
fn test_browse_and_print_from_media() {
    let (mut sim, mut node) = setup();
    sim.printer.media = Some(SimMedia {
        root: vec![SimFile::dir("models"), SimFile::file("cube.gcode", 1234)],
        subdir: vec![SimFile::file("benchy.gcode", 99_000)],
        ..Default::default()
    });

    // Refresh the working directory
    sim.command(&mut node, object_ids::CMD_COMMON, 0x0300);
    sim.run(&mut node, 5);
    let records = std::mem::take(&mut sim.display.file_records);
    assert_eq!(4, records.len());
    assert_eq!(vec![b'<', 2, 0, 1], records[0]);
    assert_eq!(b"models\0", &records[1][12..]);
    assert_eq!(1, records[1][3]);
    assert_eq!(b"cube.gcode\0", &records[2][12..]);
    assert_eq!(vec![b'>'], records[3]);

    // Enter the directory
    sim.command(&mut node, object_ids::FILE_INDEX, 0);
    sim.run(&mut node, 5);
    let records = std::mem::take(&mut sim.display.file_records);
    assert_eq!(3, records.len());
    assert_eq!(vec![b'<', 1, 0, 0], records[0]);
    assert_eq!(b"benchy.gcode\0", &records[1][12..]);

    // Print a file, then ask for its name
    sim.command(&mut node, object_ids::FILE_INDEX, 0);
    sim.command(&mut node, object_ids::CMD_COMMON, 0x0301);
    sim.run(&mut node, 2);
    let records = std::mem::take(&mut sim.display.file_records);
    assert_eq!(vec![b":benchy.gcode\0".to_vec()], records);

    // Back to the root
    sim.command(&mut node, object_ids::FILE_INDEX, values::FILE_INDEX_UP);
    sim.run(&mut node, 5);
    let records = std::mem::take(&mut sim.display.file_records);
    assert_eq!(vec![b'<', 2, 0, 1], records[0]);
}

#[test]
fn test_settings_written_by_display() {
    let (mut sim, mut node) = setup();

    // 210 degrees for the first hotend
    sim.write(&mut node, object_ids::TAR_TEMP, 1, &25500u16.to_le_bytes());
    sim.write(&mut node, object_ids::TASK_INFO, 7, &120i16.to_le_bytes());
    sim.write(&mut node, object_ids::LEVELING, 1, &0.2f32.to_le_bytes());
    sim.command(&mut node, object_ids::CMD_COMMON, 0x0900);

    assert_eq!(
        vec![
            DeviceAction::SetTargetTemp {
                heater: 0,
                celsius: 210.0
            },
            DeviceAction::SetFeedratePercent(120),
            DeviceAction::SetZOffset(-0.2),
            DeviceAction::SetActiveTool(0),
        ],
        sim.printer.actions
    );
}
