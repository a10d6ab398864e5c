pub mod sim_printer;
pub mod sim_stack;
pub mod utils;

pub mod prelude {
    pub use super::sim_printer::{SimFile, SimMedia, SimPrinter};
    pub use super::sim_stack::{Exchange, SimStack};
    pub use super::utils::{
        full_config, node_id, SimNetwork, DISPLAY_ID, HOST_ID, PRINTER_ID, STEP_MS,
    };
    pub use printcan_common::{
        config::NodeConfig,
        constants::{object_ids, values},
        NodeId,
    };
    pub use printcan_node::{NodeContext, PrinterNode, StackEvent};
}
