pub mod engine;
pub mod error;
pub mod graph;
pub mod partition;
pub mod result;
pub mod tarjan;

pub use engine::build;
pub use error::OrderingError;
pub use graph::{discover, DiscoveredGraph, NodeId, RawEdge};
pub use partition::{partition, Partition};
pub use result::{Location, Ordering, RecordedExchange};
pub use tarjan::{tarjan_scc, TarjanResult};
