pub mod types;
pub mod weighted;
pub mod crash;
pub mod mines;
pub mod pump;
pub mod wheel;
pub mod roulette;
pub mod cases;
pub mod upgrader;

pub use types::*;
pub use weighted::WeightedTable;
pub use crash::{CrashCurve, CrashPoint, MIN_AUTO_COLLECT};
pub use mines::{Cell, MinesBoard, MultiplierTable};
pub use pump::{Difficulty, PumpTable};
pub use wheel::{RiskLevel, SegmentCount, Wheel};
pub use roulette::{BetArea, RouletteLayout};
pub use cases::{Case, CaseItem, Inventory, InventoryItem, Rarity};
