//! Model-based testing harness for the roster engine.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference server and devices that talk to it
//! through encrypted records only. Operations are applied to a [`ModelWorld`]
//! and the resulting states are checked after every step.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! group-state invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;

pub use invariants::{
    BanCapacity, Convergence, DeviceSnapshot, DisjointLists, Invariant, InvariantRegistry,
    InvariantResult, RevisionMonotonicity, SystemSnapshot, UniqueEntries, Violation,
};
pub use model::{
    ACCOUNT_POOL, AccountId, BAN_CAPACITY, DeviceId, LogEntry, ModelDevice, ModelServer, ModelWorld,
    Operation, OperationError, OperationResult,
};
