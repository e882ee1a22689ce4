//! Energy-system components: capability taxonomy, kinds, and state.

pub mod component;
pub mod source_sink;
pub mod state;
pub mod storage;
pub mod types;

pub use component::{Component, ComponentFactory, ComponentKind, Styling};
pub use source_sink::{GridTariff, SourceSink};
pub use state::StateTable;
pub use storage::{BatteryMode, Storage, StorageKind};
pub use types::{
    Bounds, Capabilities, ComponentClass, CostParams, DirectionFlags, MeritTag, PriorityMap,
    Suffix,
};
