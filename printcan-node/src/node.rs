//! Implements the printer node
//!
use defmt_or_log::{debug, info, warn};
use printcan_common::{
    commands::Notification,
    config::{ConfigError, NodeConfig},
    constants::{object_ids, sub, values},
    NodeId,
};

use crate::{
    canfile::CanFile,
    dispatch::{active_display_pdos, DispatchTable},
    file_list::FileListSender,
    heartbeat::HeartbeatMonitor,
    notify::NotificationQueue,
    printer::Printer,
    stack::{Completion, NetworkStack, StackEvent},
    status::{self, RegState},
};

/// The collaborators a node works with during one call
///
/// The node keeps no references between calls, so the application is free to own the stack and
/// printer however it likes.
#[allow(missing_debug_implementations)]
pub struct NodeContext<'a> {
    /// The CANopen stack
    pub stack: &'a mut dyn NetworkStack,
    /// The rest of the firmware
    pub printer: &'a mut dyn Printer,
    /// Current time in milliseconds
    pub now_ms: u64,
}

impl<'a> NodeContext<'a> {
    /// Create a context
    pub fn new(stack: &'a mut dyn NetworkStack, printer: &'a mut dyn Printer, now_ms: u64) -> Self {
        Self {
            stack,
            printer,
            now_ms,
        }
    }
}

/// Everything the node keeps for its display peer
#[derive(Debug)]
pub(crate) struct DisplayLink {
    pub(crate) id: NodeId,
    pub(crate) notify: NotificationQueue,
    pub(crate) files: FileListSender,
    pub(crate) connected: bool,
}

/// The main object representing the printer on the bus
///
/// # Operation
///
/// - Call [`PrinterNode::init`] once, after the stack is up.
/// - Call [`PrinterNode::process`] periodically, e.g. every 100 ms, to refresh the broadcast
///   entries and run the CANFILE timeout.
/// - Pass every event from the stack to [`PrinterNode::handle_event`], and every remote write to
///   an observed entry to [`PrinterNode::on_write`].
#[derive(Debug)]
pub struct PrinterNode {
    pub(crate) node_id: NodeId,
    pub(crate) config: NodeConfig,
    pub(crate) heartbeat: HeartbeatMonitor,
    pub(crate) canfile: Option<CanFile>,
    pub(crate) display: Option<DisplayLink>,
    pub(crate) dispatch: DispatchTable,
}

impl PrinterNode {
    /// Create a node from its configuration
    pub fn new(config: &NodeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let node_id = config.node_id()?;
        let mut heartbeat = HeartbeatMonitor::new();

        let display = match (config.display_id()?, config.display) {
            (Some(id), Some(display)) => {
                heartbeat.add_peer(id, Some(display.heartbeat_slot));
                Some(DisplayLink {
                    id,
                    notify: NotificationQueue::new(id),
                    files: FileListSender::new(id),
                    connected: false,
                })
            }
            _ => None,
        };

        let canfile = config.canfile_host_id()?.map(|host| {
            heartbeat.add_peer(host, None);
            CanFile::new(host, config.block_request_timeout_ms())
        });

        let dispatch = DispatchTable::new(display.is_some(), canfile.is_some());

        Ok(Self {
            node_id,
            config: config.clone(),
            heartbeat,
            canfile,
            display,
            dispatch,
        })
    }

    /// The node's own ID
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Peer liveness
    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    /// The CANFILE receiver, if a file host is configured
    pub fn canfile(&self) -> Option<&CanFile> {
        self.canfile.as_ref()
    }

    /// The CANFILE receiver, for the print task
    pub fn canfile_mut(&mut self) -> Option<&mut CanFile> {
        self.canfile.as_mut()
    }

    /// The write dispatch table
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// True while the display is operational
    pub fn display_connected(&self) -> bool {
        self.display.as_ref().is_some_and(|d| d.connected)
    }

    /// Number of notifications waiting to be sent again
    pub fn cached_notifications(&self) -> usize {
        self.display.as_ref().map_or(0, |d| d.notify.cached_len())
    }

    /// Write the constant entries, silence the PDOs and register the write observers
    pub fn init(&mut self, stack: &mut dyn NetworkStack) {
        let config = &self.config;
        info!("Initializing printer node {}", self.node_id.raw());

        stack.write_local(
            object_ids::SYNC_COB_ID,
            0,
            &config.sync.cob_id_value().to_le_bytes(),
        );
        stack.write_local(
            object_ids::SYNC_PERIOD,
            0,
            &config.sync.period_us.to_le_bytes(),
        );
        stack.write_local(
            object_ids::SYNC_WINDOW,
            0,
            &config.sync.window_us.to_le_bytes(),
        );
        stack.write_local(object_ids::DEVICE_NAME, 0, config.device_name.as_bytes());
        stack.write_local(
            object_ids::HARDWARE_VERSION,
            0,
            config.hardware_version.as_bytes(),
        );
        stack.write_local(
            object_ids::SOFTWARE_VERSION,
            0,
            config.software_version.as_bytes(),
        );
        stack.write_local(
            object_ids::HEARTBEAT_PRODUCER_TIME,
            0,
            &config.heartbeat_period_ms.to_le_bytes(),
        );

        let identity = &config.identity;
        for (sub, value) in [
            (sub::identity::VENDOR_ID, identity.vendor_id),
            (sub::identity::PRODUCT_CODE, identity.product_code),
            (sub::identity::REVISION, identity.revision_number),
            (sub::identity::SERIAL, identity.serial_number),
        ] {
            stack.write_local(object_ids::IDENTITY, sub, &value.to_le_bytes());
        }

        let machine = &config.machine;
        let info = object_ids::MACHINE_INFO;
        stack.write_local(
            info,
            sub::machine_info::FW_VERSION,
            config.software_version.as_bytes(),
        );
        stack.write_local(
            info,
            sub::machine_info::UI_VERSION,
            config.ui_version.as_bytes(),
        );
        stack.write_local(info, sub::machine_info::EXTRUDERS, &[machine.extruders]);
        stack.write_local(info, sub::machine_info::BED, &[machine.heated_bed as u8]);
        stack.write_local(
            info,
            sub::machine_info::CHAMBER,
            &[machine.heated_chamber as u8],
        );
        stack.write_local(info, sub::machine_info::FILAMENT_CHAMBER, &[0]);
        stack.write_local(info, sub::machine_info::WATER_TEMP, &[0]);
        stack.write_local(info, sub::machine_info::WIFI, &[machine.wifi as u8]);
        stack.write_local(info, sub::machine_info::CAMERA, &[0]);

        for (i, max) in max_temperatures(config).iter().enumerate() {
            stack.write_local(object_ids::MAX_TEMP, i as u8 + 1, &max.to_le_bytes());
        }

        for index in [
            object_ids::CMD_TASK,
            object_ids::CMD_MOVE,
            object_ids::CMD_EXTRUDE,
            object_ids::CMD_COMMON,
            object_ids::FILE_INDEX,
        ] {
            stack.write_local(index, 0, &0u16.to_le_bytes());
        }
        stack.write_local(object_ids::GCODE_INPUT, 0, &[]);

        stack.set_pdo_enabled(values::GLOBAL_PDO, false);
        if self.display.is_some() {
            for pdo in values::DISPLAY_PDO_FIRST..=values::DISPLAY_PDO_LAST {
                stack.set_pdo_enabled(pdo, false);
            }
        }

        for (index, sub) in self.dispatch.keys() {
            stack.register_write_observer(index, sub);
        }
        debug!("Registered {} write observers", self.dispatch.len());
    }

    /// Periodic update
    ///
    /// Refreshes the broadcast entries and re-sends a CANFILE request whose deadline passed.
    pub fn process(&mut self, ctx: &mut NodeContext<'_>) {
        self.update_global(ctx);
        if self.display.is_some() {
            self.update_display(ctx);
        }
        if let Some(canfile) = &mut self.canfile {
            canfile.check_timeout(ctx.stack, ctx.now_ms);
        }
    }

    /// Handle an event reported by the stack
    pub fn handle_event(&mut self, event: StackEvent<'_>, ctx: &mut NodeContext<'_>) {
        match event {
            StackEvent::PeerBootup(peer) => self.heartbeat.on_bootup(peer, ctx.stack),
            StackEvent::PeerStateChanged(peer, state) => {
                debug!("Node {} changed state to {:?}", peer.raw(), state);
                self.update_peer(peer, state.is_operational(), ctx.stack);
            }
            StackEvent::HeartbeatLost(peer) => {
                warn!("Lost heartbeat of node {}", peer.raw());
                self.update_peer(peer, false, ctx.stack);
            }
            StackEvent::SdoFinished {
                peer,
                completion,
                result,
            } => match completion {
                Completion::Flush => {
                    if let Err(e) = result {
                        debug!("SDO with node {} failed: {:?}", peer.raw(), e);
                    }
                    self.flush(peer, ctx);
                }
                Completion::HeartbeatTime => {
                    if !self.heartbeat.on_heartbeat_time(peer, result, ctx.stack) {
                        self.flush(peer, ctx);
                    }
                }
                Completion::FileList => {
                    ctx.stack.reset_client_line(peer);
                    if let Err(e) = result {
                        warn!("File list record to node {} failed: {:?}", peer.raw(), e);
                    }
                    self.send_next_file_record(ctx);
                }
            },
        }
    }

    fn send_next_file_record(&mut self, ctx: &mut NodeContext<'_>) {
        let Some(display) = &mut self.display else {
            return;
        };
        if let Some(media) = ctx.printer.media() {
            display.files.send_next(media, ctx.stack);
        }
    }

    /// The retry point after an exchange with `peer` finished
    ///
    /// Releases the client line, then sends at most one cached message for the peer: a CANFILE
    /// request or close for the file host, a file list record or notification for the display.
    pub fn flush(&mut self, peer: NodeId, ctx: &mut NodeContext<'_>) {
        ctx.stack.reset_client_line(peer);

        if let Some(canfile) = &mut self.canfile {
            if canfile.host() == peer && canfile.flush_cached(ctx.stack, ctx.now_ms) {
                return;
            }
        }

        if let Some(display) = &mut self.display {
            if display.id == peer && !display.files.retry(ctx.stack) {
                display.notify.retry(ctx.stack);
            }
        }
    }

    fn update_peer(&mut self, peer: NodeId, operational: bool, stack: &mut dyn NetworkStack) {
        let changed = self.heartbeat.set_operational(peer, operational);
        if let (Some(connected), Some(display)) = (changed, &mut self.display) {
            if display.id == peer {
                display.connected = connected;
                info!(
                    "Display {}",
                    if connected { "connected" } else { "disconnected" }
                );
                let leveling = self.config.machine.leveling;
                for pdo in values::DISPLAY_PDO_FIRST..=values::DISPLAY_PDO_LAST {
                    let active = connected && active_display_pdos(leveling).any(|p| p == pdo);
                    stack.set_pdo_enabled(pdo, active);
                }
            }
        }
        self.heartbeat.sync_broadcast(stack);
    }

    /// Send a notification to the display
    ///
    /// Does nothing if no display is configured.
    pub fn notify(&mut self, notification: Notification, stack: &mut dyn NetworkStack) {
        if let Some(display) = &mut self.display {
            display.notify.send(notification, stack);
        }
    }

    /// Read the next byte of the CANFILE job
    pub fn read_file_byte(&mut self, ctx: &mut NodeContext<'_>) -> Option<u8> {
        self.canfile.as_mut()?.get(ctx.stack, ctx.now_ms)
    }

    fn canfile_state(&self) -> (bool, bool) {
        self.canfile
            .as_ref()
            .map_or((false, false), |f| (f.is_open(), f.is_paused()))
    }

    /// Pack the machine state into the global record
    pub(crate) fn update_global(&mut self, ctx: &mut NodeContext<'_>) {
        let snapshot = ctx.printer.snapshot();
        let (open, paused) = self.canfile_state();
        let work = status::work_state(&snapshot, open, paused);
        let stack = &mut *ctx.stack;

        stack.write_local(
            object_ids::GLOBAL,
            sub::global::COMMON,
            &[status::pack_common(snapshot.active_tool, work, RegState::Unregistered)],
        );
        if self.config.machine.wifi {
            stack.write_local(
                object_ids::GLOBAL,
                sub::global::WIFI,
                &[status::pack_wifi(&snapshot)],
            );
        }
        stack.write_local(
            object_ids::GLOBAL,
            sub::global::SWITCH,
            &status::pack_switch(&snapshot).to_le_bytes(),
        );
        stack.write_local(
            object_ids::GLOBAL,
            sub::global::STATE,
            &status::pack_state(&snapshot).to_le_bytes(),
        );
    }

    /// Pack the display values
    pub(crate) fn update_display(&mut self, ctx: &mut NodeContext<'_>) {
        let snap = ctx.printer.display_snapshot();
        let stack = &mut *ctx.stack;

        write_temperatures(stack, &snap.current_temp, &snap.target_temp);

        let percent = match &self.canfile {
            Some(file) if file.is_open() => (file.permyriad_done() / 100) as u8,
            _ => snap.progress_percent,
        };
        let task = object_ids::TASK_INFO;
        stack.write_local(task, sub::task::PERCENT, &[percent]);
        stack.write_local(task, sub::task::TIME, &snap.elapsed_s.to_le_bytes());
        for (i, flow) in snap.flow_percent.iter().enumerate() {
            stack.write_local(task, sub::task::FLOW_E0 + i as u8, &flow.to_le_bytes());
        }
        stack.write_local(
            task,
            sub::task::FEEDRATE,
            &snap.feedrate_percent.to_le_bytes(),
        );

        for (i, fan) in snap.fan_percent.iter().enumerate() {
            stack.write_local(object_ids::PERCENT, sub::percent::FAN_T + i as u8, &[*fan]);
        }
        stack.write_local(
            object_ids::PERCENT,
            sub::percent::SHUTDOWN_TIME,
            &snap.shutdown_time.to_le_bytes(),
        );

        write_f32s(stack, object_ids::POSITION, &snap.position);
        write_f32s(stack, object_ids::STEPS_PER_MM, &snap.steps_per_mm);
        write_f32s(stack, object_ids::ACCELERATION, &snap.acceleration);

        let stats = &snap.stats;
        let statistics = object_ids::STATISTICS;
        stack.write_local(
            statistics,
            sub::statistics::TOTAL,
            &stats.total.to_le_bytes(),
        );
        stack.write_local(
            statistics,
            sub::statistics::FINISHED,
            &stats.finished.to_le_bytes(),
        );
        stack.write_local(
            statistics,
            sub::statistics::LONGEST,
            &stats.longest_s.to_le_bytes(),
        );
        stack.write_local(
            statistics,
            sub::statistics::USED,
            &stats.used_s.to_le_bytes(),
        );
        stack.write_local(
            statistics,
            sub::statistics::FILAMENT,
            &stats.filament_mm.to_le_bytes(),
        );

        if self.config.machine.leveling {
            stack.write_local(
                object_ids::LEVELING,
                sub::leveling::Z_OFFSET,
                &(-snap.z_offset).to_le_bytes(),
            );
            stack.write_local(
                object_ids::LEVELING,
                sub::leveling::FADE_HEIGHT,
                &snap.fade_height.to_le_bytes(),
            );
        }
    }
}

/// Write the current and target temperatures of the channels the machine has
pub(crate) fn write_temperatures(
    stack: &mut dyn NetworkStack,
    current: &[Option<f32>; 8],
    target: &[Option<f32>; 8],
) {
    for (index, temps) in [(object_ids::CUR_TEMP, current), (object_ids::TAR_TEMP, target)] {
        for (i, t) in temps.iter().enumerate() {
            if let Some(t) = t {
                stack.write_local(index, i as u8 + 1, &status::encode_temp(*t).to_le_bytes());
            }
        }
    }
}

fn write_f32s(stack: &mut dyn NetworkStack, index: u16, values: &[f32]) {
    for (i, v) in values.iter().enumerate() {
        stack.write_local(index, i as u8 + 1, &v.to_le_bytes());
    }
}

/// The maximum temperature table
///
/// Hotends report their maximum minus the overshoot margin, channels the machine does not have
/// report 0.
fn max_temperatures(config: &NodeConfig) -> [i16; sub::temp::MAX_TEMP_COUNT as usize] {
    let machine = &config.machine;
    let mut table = [0i16; sub::temp::MAX_TEMP_COUNT as usize];
    for (i, max) in machine
        .hotend_max_temp
        .iter()
        .take(machine.extruders as usize)
        .enumerate()
    {
        table[i] = max - machine.hotend_overshoot;
    }
    if machine.heated_bed {
        table[(sub::temp::BED - 1) as usize] = machine.bed_max_temp;
    }
    if machine.heated_chamber {
        table[(sub::temp::CHAMBER - 1) as usize] = machine.chamber_max_temp;
    }
    table
}
