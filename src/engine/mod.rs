//! Flow execution: scheduling, node calls, rollback and proxy streaming.
//!
//! [`FlowEngine`] owns the runtime policy (concurrency, timeouts, drain grace,
//! proxy window) and executes any [`CompiledFlow`](crate::graph::CompiledFlow).
//! [`FlowManager`] binds one compiled flow to an engine and is what callers
//! normally hold.

mod context;
mod manager;
mod proxy;
mod rollback;
mod scheduler;
mod worker;


pub use context::NodeState;
pub use manager::FlowManager;
pub use proxy::ProxyForwarder;
pub use rollback::{RollbackCoordinator, RollbackEntry, RollbackLog};
pub use scheduler::{FlowEngine, FlowInput, FlowOutput};
