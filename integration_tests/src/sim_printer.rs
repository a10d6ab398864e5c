//! A simulated printer firmware
use printcan_node::printer::{
    DeviceAction, DisplaySnapshot, JobState, MediaEntry, MediaLibrary, PowerLossRecovery,
    PrintJobTimer, Printer, PrinterSnapshot,
};

#[derive(Debug, Clone)]
pub struct SimFile {
    pub name: String,
    pub is_dir: bool,
    pub size: u32,
}

impl SimFile {
    pub fn file(name: &str, size: u32) -> Self {
        Self {
            name: name.to_string(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: true,
            size: 0,
        }
    }
}

/// A media card with a two level directory tree
#[derive(Debug, Default)]
pub struct SimMedia {
    pub root: Vec<SimFile>,
    pub subdir: Vec<SimFile>,
    pub in_subdir: bool,
    pub printing: Option<String>,
}

impl SimMedia {
    fn listing(&self) -> &[SimFile] {
        if self.in_subdir {
            &self.subdir
        } else {
            &self.root
        }
    }
}

impl MediaLibrary for SimMedia {
    fn refresh(&mut self) {}

    fn count(&self) -> u16 {
        self.listing().len() as u16
    }

    fn is_at_root(&self) -> bool {
        !self.in_subdir
    }

    fn up_dir(&mut self) {
        self.in_subdir = false;
    }

    fn entry(&mut self, index: u16) -> Option<MediaEntry<'_>> {
        self.listing().get(index as usize).map(|f| MediaEntry {
            index,
            is_dir: f.is_dir,
            size: f.size,
            timestamp: 0,
            name: &f.name,
        })
    }

    fn change_dir(&mut self, _index: u16) {
        self.in_subdir = true;
    }

    fn print(&mut self, index: u16) {
        self.printing = self.listing().get(index as usize).map(|f| f.name.clone());
    }

    fn current_filename(&self) -> &str {
        self.printing.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Default)]
pub struct SimPrinter {
    pub snapshot: PrinterSnapshot,
    pub display: DisplaySnapshot,
    pub actions: Vec<DeviceAction>,
    pub filament_present: bool,
    pub hot: bool,
    pub media: Option<SimMedia>,
    /// Position saved by power loss recovery
    pub saved_position: Option<u32>,
    pub canfile_open: bool,
    pub timer_running: bool,
}

impl SimPrinter {
    pub fn new() -> Self {
        Self {
            filament_present: true,
            hot: true,
            ..Default::default()
        }
    }
}

impl PrintJobTimer for SimPrinter {
    fn start_job_timer(&mut self) {
        self.timer_running = true;
    }

    fn pause_job_timer(&mut self) {
        self.timer_running = false;
    }
}

impl PowerLossRecovery for SimPrinter {
    fn resume_position(&self) -> Option<u32> {
        self.saved_position
    }

    fn canfile_opened(&mut self, opened: bool) {
        self.canfile_open = opened;
    }
}

impl Printer for SimPrinter {
    fn snapshot(&self) -> PrinterSnapshot {
        self.snapshot
    }

    fn display_snapshot(&self) -> DisplaySnapshot {
        self.display
    }

    fn perform(&mut self, action: DeviceAction) {
        match action {
            DeviceAction::PausePrint if self.snapshot.media_job.is_open() => {
                self.snapshot.media_job = JobState::Paused;
            }
            DeviceAction::ResumePrint if self.snapshot.media_job.is_open() => {
                self.snapshot.media_job = JobState::Printing;
            }
            DeviceAction::StopPrint => self.snapshot.media_job = JobState::Idle,
            DeviceAction::SetCaseLight(on) => self.snapshot.case_light = on,
            DeviceAction::SetAutoLeveling(on) => self.snapshot.auto_leveling = on,
            DeviceAction::SetActiveTool(tool) => self.snapshot.active_tool = tool,
            _ => (),
        }
        self.actions.push(action);
    }

    fn filament_present(&self) -> bool {
        self.filament_present
    }

    fn target_too_cold_to_extrude(&self) -> bool {
        !self.hot
    }

    fn too_cold_to_extrude(&self) -> bool {
        !self.hot
    }

    fn media(&mut self) -> Option<&mut dyn MediaLibrary> {
        self.media.as_mut().map(|m| m as &mut dyn MediaLibrary)
    }
}
