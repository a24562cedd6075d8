pub mod interfaces;
pub mod surface;

pub use interfaces::{
    ContextManager, ExchangeHandle, ExchangeRecord, ExchangeTermination, IndexQuery, InventoryQuery,
    ProcessHandle, ReferenceExchange,
};
pub use surface::{normalize, QueryError, RefArg};
