//! Handlers for writes to the observed dictionary entries
//!
//! Every write is acknowledged: a command the node cannot decode, or one that does not apply in
//! the current machine state, is logged and dropped.
use defmt_or_log::{debug, warn};
use printcan_common::{
    commands::{
        split_command, CommonCommand, FileAction, Heating, Loading, MoveCommand, MoveUnit,
        Notification, Operation, Switch, TaskCommand,
    },
    constants::values,
};

use crate::{
    dispatch::WriteHandler,
    node::{write_temperatures, NodeContext, PrinterNode},
    printer::{Axis, DeviceAction},
    status,
};

fn read_u16(data: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(..2)?.try_into().ok()?))
}

fn read_i16(data: &[u8]) -> Option<i16> {
    Some(i16::from_le_bytes(data.get(..2)?.try_into().ok()?))
}

fn read_u32(data: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(..4)?.try_into().ok()?))
}

fn read_f32(data: &[u8]) -> Option<f32> {
    Some(f32::from_le_bytes(data.get(..4)?.try_into().ok()?))
}

impl PrinterNode {
    /// Handle a remote write to an observed entry
    ///
    /// `data` is the value just written. Always returns
    /// [`OD_SUCCESSFUL`](printcan_common::constants::values::OD_SUCCESSFUL).
    pub fn on_write(&mut self, index: u16, sub: u8, data: &[u8], ctx: &mut NodeContext<'_>) -> u32 {
        let Some(handler) = self.dispatch.lookup(index, sub) else {
            debug!("Write to unrouted entry {:x}sub{}", index, sub);
            return values::OD_SUCCESSFUL;
        };
        if self.handle_write(handler, data, ctx).is_none() {
            warn!(
                "Ignoring malformed write of {} bytes to {:x}sub{}",
                data.len(),
                index,
                sub
            );
        }
        values::OD_SUCCESSFUL
    }

    fn handle_write(
        &mut self,
        handler: WriteHandler,
        data: &[u8],
        ctx: &mut NodeContext<'_>,
    ) -> Option<()> {
        let action = match handler {
            WriteHandler::TargetTemp(heater) => {
                let celsius = status::decode_temp(read_u16(data)?);
                ctx.printer.perform(DeviceAction::SetTargetTemp { heater, celsius });
                // Send back the accepted targets
                let snap = ctx.printer.display_snapshot();
                write_temperatures(ctx.stack, &[None; 8], &snap.target_temp);
                return Some(());
            }
            WriteHandler::Flow(extruder) => DeviceAction::SetFlowPercent {
                extruder,
                percent: read_i16(data)?,
            },
            WriteHandler::Feedrate => DeviceAction::SetFeedratePercent(read_i16(data)?),
            WriteHandler::Fan(fan) => DeviceAction::SetFanPercent {
                fan,
                percent: *data.first()?,
            },
            WriteHandler::StepsPerMm(axis) => DeviceAction::SetStepsPerMm {
                axis,
                value: read_f32(data)?,
            },
            WriteHandler::Acceleration(which) => DeviceAction::SetAcceleration {
                which,
                value: read_f32(data)?,
            },
            WriteHandler::ZOffset => DeviceAction::SetZOffset(-read_f32(data)?),
            WriteHandler::FadeHeight => DeviceAction::SetFadeHeight(read_f32(data)?),
            WriteHandler::TaskCommand => {
                self.on_task_command(read_u16(data)?, ctx);
                return Some(());
            }
            WriteHandler::MoveCommand => {
                on_move_command(read_u16(data)?, ctx);
                return Some(());
            }
            WriteHandler::ExtrudeCommand => {
                self.on_extrude_command(read_i16(data)?, ctx);
                return Some(());
            }
            WriteHandler::CommonCommand => {
                self.on_common_command(read_u16(data)?, ctx);
                return Some(());
            }
            WriteHandler::FileIndex => {
                self.on_file_index(read_u16(data)?, ctx);
                return Some(());
            }
            WriteHandler::CanFileSize => {
                let size = read_u32(data)?;
                if let Some(canfile) = &mut self.canfile {
                    canfile.open(size, ctx.stack, &mut *ctx.printer, ctx.now_ms);
                }
                return Some(());
            }
            WriteHandler::CanFileBlock => {
                if let Some(canfile) = &mut self.canfile {
                    canfile.receive_block(data, ctx.stack, ctx.now_ms);
                }
                return Some(());
            }
            WriteHandler::Accept => return Some(()),
        };
        ctx.printer.perform(action);
        Some(())
    }

    fn on_task_command(&mut self, value: u16, ctx: &mut NodeContext<'_>) {
        let Ok(cmd) = TaskCommand::try_from(value as u8) else {
            warn!("Unknown task command {}", value);
            return;
        };
        debug!("Task command {:?}", cmd);

        let media_job = ctx.printer.snapshot().media_job;
        let canfile_open = self.canfile.as_ref().is_some_and(|f| f.is_open());
        let canfile_paused = self.canfile.as_ref().is_some_and(|f| f.is_paused());
        let open = media_job.is_open() || canfile_open;
        let paused = media_job.is_paused() || canfile_paused;

        match cmd {
            TaskCommand::Pause => {
                if open && !paused {
                    ctx.printer.perform(DeviceAction::PausePrint);
                    if let Some(canfile) = self.canfile.as_mut().filter(|f| f.is_open()) {
                        canfile.task_pause(&mut *ctx.printer);
                    }
                }
            }
            TaskCommand::Resume => {
                if !paused {
                    return;
                }
                if !ctx.printer.filament_present() {
                    self.notify(Notification::FilamentWait, ctx.stack);
                    return;
                }
                ctx.printer.perform(DeviceAction::ResumePrint);
                if let Some(canfile) = self.canfile.as_mut().filter(|f| f.is_open()) {
                    canfile.task_start(&mut *ctx.printer);
                }
            }
            TaskCommand::Stop => {
                if open {
                    ctx.printer.perform(DeviceAction::QuickStop);
                    ctx.printer.perform(DeviceAction::StopPrint);
                    if let Some(canfile) = self.canfile.as_mut().filter(|f| f.is_open()) {
                        canfile.task_aborting(ctx.stack);
                    }
                }
            }
            TaskCommand::Change => {
                if open && !paused {
                    ctx.printer.perform(DeviceAction::InjectGcode("M600"));
                    self.notify(Notification::FilamentInit, ctx.stack);
                }
            }
            // Power loss recovery is answered by the recovery prompt itself
            TaskCommand::AccidentResume | TaskCommand::AccidentCancel => {}
        }
    }

    fn on_extrude_command(&mut self, value: i16, ctx: &mut NodeContext<'_>) {
        if ctx.printer.target_too_cold_to_extrude() {
            self.notify(Notification::TarTempLow, ctx.stack);
        } else if value == values::EXTRUDE_LOAD {
            ctx.printer.perform(DeviceAction::InjectGcode("M701"));
        } else if value == values::EXTRUDE_UNLOAD {
            ctx.printer.perform(DeviceAction::InjectGcode("M702"));
        } else if ctx.printer.too_cold_to_extrude() {
            self.notify(Notification::CurTempLow, ctx.stack);
        } else {
            ctx.printer.perform(DeviceAction::Extrude { mm: value as f32 });
            let notification = if value > 0 {
                Notification::FilaExtrude
            } else {
                Notification::FilaRetract
            };
            self.notify(notification, ctx.stack);
        }
    }

    fn on_common_command(&mut self, value: u16, ctx: &mut NodeContext<'_>) {
        let (cmd, param) = split_command(value);
        let Ok(cmd) = CommonCommand::try_from(cmd) else {
            warn!("Unknown command {:x}", value);
            return;
        };
        debug!("Command {:?} param {}", cmd, param);
        let snapshot = ctx.printer.snapshot();
        let switch = Switch::try_from(param).ok();

        let action = match cmd {
            CommonCommand::FactoryReset => Some(DeviceAction::InjectGcode("M502")),
            CommonCommand::SaveSettings => Some(DeviceAction::InjectGcode("M500")),
            CommonCommand::FirstUnpack => match switch {
                Some(Switch::On) => Some(DeviceAction::FirstUnpack(true)),
                Some(Switch::Off) => Some(DeviceAction::FirstUnpack(false)),
                _ => None,
            },
            CommonCommand::RefreshFile => {
                self.on_refresh_file(param, ctx);
                None
            }
            CommonCommand::MotorSwitch => match switch {
                Some(Switch::On) => Some(DeviceAction::SetMotorsEnabled(true)),
                Some(Switch::Off) => Some(DeviceAction::SetMotorsEnabled(false)),
                _ => None,
            },
            CommonCommand::CaseLight => switch
                .map(|s| s.apply(snapshot.case_light))
                .filter(|on| *on != snapshot.case_light)
                .map(DeviceAction::SetCaseLight),
            CommonCommand::AutoLeveling => switch
                .map(|s| s.apply(snapshot.auto_leveling))
                .filter(|on| *on != snapshot.auto_leveling)
                .map(DeviceAction::SetAutoLeveling),
            CommonCommand::ChangeTool => (param < self.config.machine.extruders)
                .then_some(DeviceAction::SetActiveTool(param)),
            CommonCommand::StopOperation => Operation::try_from(param)
                .ok()
                .map(DeviceAction::CancelOperation),
            CommonCommand::WaitHeating => match Heating::try_from(param) {
                Ok(Heating::Skip) => Some(DeviceAction::SkipHeatingWait),
                Ok(Heating::Again) => Some(DeviceAction::UserConfirmed),
                Err(_) => None,
            },
            CommonCommand::LoadFilament => Loading::try_from(param)
                .ok()
                .map(DeviceAction::FilamentResponse),
            CommonCommand::LevelingProbe => Some(DeviceAction::InjectGcode("G29N")),
            CommonCommand::UserConfirmed => Some(DeviceAction::UserConfirmed),
            CommonCommand::AutoPowerOff => Some(DeviceAction::PowerOff),
            CommonCommand::Babystep | CommonCommand::AutoShutdown => None,
        };

        if let Some(action) = action {
            ctx.printer.perform(action);
        }
    }

    fn on_refresh_file(&mut self, param: u8, ctx: &mut NodeContext<'_>) {
        let Some(display) = &mut self.display else {
            return;
        };
        let Some(media) = ctx.printer.media() else {
            debug!("No media, ignoring file refresh");
            return;
        };
        match FileAction::try_from(param) {
            Ok(FileAction::WorkDir) => display.files.send_listing(media, ctx.stack),
            Ok(FileAction::FileName) => display.files.send_filename(media, ctx.stack),
            Err(_) => warn!("Unknown file refresh {}", param),
        }
    }

    fn on_file_index(&mut self, index: u16, ctx: &mut NodeContext<'_>) {
        let Some(display) = &mut self.display else {
            return;
        };
        let Some(media) = ctx.printer.media() else {
            return;
        };
        if index == values::FILE_INDEX_UP {
            media.up_dir();
            display.files.send_listing(media, ctx.stack);
            return;
        }
        let is_dir = match media.entry(index) {
            Some(entry) => entry.is_dir,
            None => {
                warn!("Selected file {} does not exist", index);
                return;
            }
        };
        if is_dir {
            media.change_dir(index);
            display.files.send_listing(media, ctx.stack);
        } else {
            media.print(index);
        }
    }
}

fn on_move_command(value: u16, ctx: &mut NodeContext<'_>) {
    let (op, unit) = split_command(value);
    let Ok(op) = MoveCommand::try_from(op) else {
        warn!("Unknown move command {:x}", value);
        return;
    };
    let distance = MoveUnit::try_from(unit).map_or(0.0, |u| u.mm());

    let action = match op {
        MoveCommand::HomeAll => DeviceAction::InjectGcode("G28"),
        MoveCommand::HomeX => DeviceAction::InjectGcode("G28X"),
        MoveCommand::HomeY => DeviceAction::InjectGcode("G28Y"),
        MoveCommand::HomeZ => DeviceAction::InjectGcode("G28Z"),
        MoveCommand::XMinus => relative(Axis::X, -distance),
        MoveCommand::YMinus => relative(Axis::Y, -distance),
        MoveCommand::ZMinus => relative(Axis::Z, -distance),
        MoveCommand::XPlus => relative(Axis::X, distance),
        MoveCommand::YPlus => relative(Axis::Y, distance),
        MoveCommand::ZPlus => relative(Axis::Z, distance),
    };
    ctx.printer.perform(action);
}

fn relative(axis: Axis, mm: f32) -> DeviceAction {
    DeviceAction::MoveRelative { axis, mm }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{MockEntry, MockMedia, MockPrinter, MockStack};
    use crate::printer::JobState;
    use printcan_common::config::{DisplayConfig, NodeConfig};

    fn node() -> PrinterNode {
        let config = NodeConfig {
            display: Some(DisplayConfig {
                node_id: 2,
                heartbeat_slot: 0,
            }),
            canfile_host: Some(0x10),
            ..NodeConfig::new(1)
        };
        PrinterNode::new(&config).unwrap()
    }

    fn write(
        node: &mut PrinterNode,
        stack: &mut MockStack,
        printer: &mut MockPrinter,
        index: u16,
        sub: u8,
        data: &[u8],
    ) {
        let mut ctx = NodeContext::new(stack, printer, 0);
        assert_eq!(0, node.on_write(index, sub, data, &mut ctx));
    }

    fn command(
        node: &mut PrinterNode,
        stack: &mut MockStack,
        printer: &mut MockPrinter,
        index: u16,
        value: u16,
    ) {
        write(node, stack, printer, index, 0, &value.to_le_bytes());
    }

    fn notifications(stack: &mut MockStack) -> Vec<u16> {
        stack
            .take_writes()
            .iter()
            .filter(|w| w.index == 0x2300)
            .map(|w| w.u16())
            .collect()
    }

    #[test]
    fn test_value_writes() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();

        write(
            &mut node,
            &mut stack,
            &mut printer,
            0x3003,
            4,
            &95i16.to_le_bytes(),
        );
        write(&mut node, &mut stack, &mut printer, 0x3004, 2, &[80]);
        write(
            &mut node,
            &mut stack,
            &mut printer,
            0x3006,
            3,
            &400.0f32.to_le_bytes(),
        );
        write(
            &mut node,
            &mut stack,
            &mut printer,
            0x300B,
            1,
            &0.5f32.to_le_bytes(),
        );
        write(&mut node, &mut stack, &mut printer, 0x3004, 5, &[1, 2]);

        assert_eq!(
            vec![
                DeviceAction::SetFlowPercent {
                    extruder: 1,
                    percent: 95
                },
                DeviceAction::SetFanPercent { fan: 1, percent: 80 },
                DeviceAction::SetStepsPerMm {
                    axis: 2,
                    value: 400.0
                },
                DeviceAction::SetZOffset(-0.5),
            ],
            printer.actions
        );
    }

    #[test]
    fn test_target_temp_echoed() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        printer.display.target_temp[0] = Some(190.0);

        write(
            &mut node,
            &mut stack,
            &mut printer,
            0x3002,
            1,
            &24500u16.to_le_bytes(),
        );
        assert_eq!(
            vec![DeviceAction::SetTargetTemp {
                heater: 0,
                celsius: 190.0
            }],
            printer.actions
        );
        assert_eq!(24500, stack.local_u16(0x3002, 1));
    }

    #[test]
    fn test_malformed_and_unknown_ignored() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();

        write(&mut node, &mut stack, &mut printer, 0x3006, 1, &[1, 2]);
        command(&mut node, &mut stack, &mut printer, 0x2004, 0x4000);
        command(&mut node, &mut stack, &mut printer, 0x2002, 0x0A01);
        write(&mut node, &mut stack, &mut printer, 0x3003, 1, &[50]);
        assert!(printer.actions.is_empty());
    }

    #[test]
    fn test_task_commands() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();

        // Nothing printing, nothing to pause
        command(&mut node, &mut stack, &mut printer, 0x2001, 0);
        assert!(printer.actions.is_empty());

        printer.snapshot.media_job = JobState::Printing;
        command(&mut node, &mut stack, &mut printer, 0x2001, 0);
        assert_eq!(vec![DeviceAction::PausePrint], printer.actions);

        printer.snapshot.media_job = JobState::Paused;
        printer.filament_present = false;
        command(&mut node, &mut stack, &mut printer, 0x2001, 1);
        assert_eq!(1, printer.actions.len());
        assert_eq!(vec![31], notifications(&mut stack));

        printer.filament_present = true;
        command(&mut node, &mut stack, &mut printer, 0x2001, 1);
        assert_eq!(Some(&DeviceAction::ResumePrint), printer.actions.last());

        printer.actions.clear();
        command(&mut node, &mut stack, &mut printer, 0x2001, 2);
        assert_eq!(
            vec![DeviceAction::QuickStop, DeviceAction::StopPrint],
            printer.actions
        );

        printer.actions.clear();
        printer.snapshot.media_job = JobState::Printing;
        command(&mut node, &mut stack, &mut printer, 0x2001, 3);
        assert_eq!(vec![DeviceAction::InjectGcode("M600")], printer.actions);
        assert_eq!(vec![29], notifications(&mut stack));
    }

    #[test]
    fn test_task_commands_drive_canfile_job() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        printer.filament_present = true;

        write(
            &mut node,
            &mut stack,
            &mut printer,
            0x2007,
            1,
            &4096u32.to_le_bytes(),
        );
        assert!(node.canfile().unwrap().is_printing());
        assert_eq!(1, printer.timer_starts);

        command(&mut node, &mut stack, &mut printer, 0x2001, 0);
        assert!(node.canfile().unwrap().is_paused());
        assert_eq!(1, printer.timer_pauses);

        command(&mut node, &mut stack, &mut printer, 0x2001, 1);
        assert!(node.canfile().unwrap().is_printing());
        assert_eq!(2, printer.timer_starts);

        command(&mut node, &mut stack, &mut printer, 0x2001, 2);
        assert!(node.canfile().unwrap().is_aborting());
    }

    #[test]
    fn test_move_commands() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();

        command(&mut node, &mut stack, &mut printer, 0x2002, 0x0300);
        command(&mut node, &mut stack, &mut printer, 0x2002, 0x0502);
        command(&mut node, &mut stack, &mut printer, 0x2002, 0x0900);
        // Unknown distance moves nowhere
        command(&mut node, &mut stack, &mut printer, 0x2002, 0x0707);

        assert_eq!(
            vec![
                DeviceAction::InjectGcode("G28Z"),
                DeviceAction::MoveRelative {
                    axis: Axis::Y,
                    mm: -10.0
                },
                DeviceAction::MoveRelative {
                    axis: Axis::Z,
                    mm: 0.1
                },
                DeviceAction::MoveRelative {
                    axis: Axis::X,
                    mm: 0.0
                },
            ],
            printer.actions
        );
    }

    #[test]
    fn test_extrude_commands() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();

        printer.target_too_cold = true;
        command(&mut node, &mut stack, &mut printer, 0x2003, 5);
        assert_eq!(vec![19], notifications(&mut stack));

        printer.target_too_cold = false;
        printer.too_cold = true;
        command(&mut node, &mut stack, &mut printer, 0x2003, i16::MAX as u16);
        command(&mut node, &mut stack, &mut printer, 0x2003, 5);
        assert_eq!(vec![20], notifications(&mut stack));

        printer.too_cold = false;
        command(&mut node, &mut stack, &mut printer, 0x2003, -3i16 as u16);
        command(&mut node, &mut stack, &mut printer, 0x2003, i16::MIN as u16);
        assert_eq!(vec![11], notifications(&mut stack));

        assert_eq!(
            vec![
                DeviceAction::InjectGcode("M701"),
                DeviceAction::Extrude { mm: -3.0 },
                DeviceAction::InjectGcode("M702"),
            ],
            printer.actions
        );
    }

    #[test]
    fn test_common_commands() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        printer.snapshot.case_light = true;

        for value in [
            0x0100u16, // save
            0x0201,    // first unpack on
            0x02FF,    // first unpack toggle, ignored
            0x0600,    // case light off
            0x0601,    // case light on, already on
            0x08FF,    // toggle auto leveling
            0x0901,    // tool 1, machine has one extruder
            0x0A03,    // cancel probing
            0x0B00,    // skip heating
            0x0C01,    // purge more
            0x0F00,    // power off
        ] {
            command(&mut node, &mut stack, &mut printer, 0x2004, value);
        }

        assert_eq!(
            vec![
                DeviceAction::InjectGcode("M500"),
                DeviceAction::FirstUnpack(true),
                DeviceAction::SetCaseLight(false),
                DeviceAction::SetAutoLeveling(true),
                DeviceAction::CancelOperation(Operation::Probe),
                DeviceAction::SkipHeatingWait,
                DeviceAction::FilamentResponse(Loading::More),
                DeviceAction::PowerOff,
            ],
            printer.actions
        );
    }

    #[test]
    fn test_file_selection() {
        let mut node = node();
        let mut stack = MockStack::default();
        let mut printer = MockPrinter {
            media: Some(MockMedia {
                entries: vec![
                    MockEntry {
                        name: "models",
                        is_dir: true,
                        size: 0,
                    },
                    MockEntry {
                        name: "benchy.gcode",
                        is_dir: false,
                        size: 1000,
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        };

        command(&mut node, &mut stack, &mut printer, 0x2004, 0x0300);
        command(&mut node, &mut stack, &mut printer, 0x2005, 0);
        command(&mut node, &mut stack, &mut printer, 0x2005, 1);
        command(&mut node, &mut stack, &mut printer, 0x2005, 0xFFFF);
        command(&mut node, &mut stack, &mut printer, 0x2005, 7);

        let media = printer.media.as_ref().unwrap();
        assert_eq!(vec![0], media.entered);
        assert_eq!(vec![1], media.printed);
        assert_eq!(1, media.up_dirs);
        assert_eq!(3, media.refreshes);

        let headers = stack
            .take_writes()
            .iter()
            .filter(|w| w.index == 0x2200 && w.data[0] == b'<')
            .count();
        assert_eq!(3, headers);
    }
}
