//! Task implementations: one tick-driven state machine per physical activity.
//!
//! Every block-breaking task funnels its digging through
//! [`safety::break_block_guarded`], which enforces the shared invariants
//! (tagged blocks, home area, lava, falling columns), and gates phase
//! advancement on physical arrival via [`safety::ArrivalGate`] because
//! navigation is asynchronous on the engine side.

pub mod chop_trees;
pub mod craft;
pub mod farm;
pub mod gather_blocks;
pub mod mine_ores;
pub mod safety;
pub mod smelt;
pub mod strip_mine;
pub mod transfer;

pub use chop_trees::ChopTreesTask;
pub use craft::{CraftOp, CraftTask};
pub use farm::FarmTask;
pub use gather_blocks::GatherBlocksTask;
pub use mine_ores::MineOresTask;
pub use smelt::SmeltTask;
pub use strip_mine::StripMineTask;
pub use transfer::{TransferMode, TransferTask};
