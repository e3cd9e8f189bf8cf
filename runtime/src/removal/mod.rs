//! Manifest list / image index reference removal.
//!
//! ```text
//! remove_all ──▶ resolve ──▶ plan ──▶ apply ──▶ StoreGuard::commit
//!      │                                              │
//!      └──────────── RemovalReport + errors ◀─────────┘
//!                          │
//!                      finalize / join_errors
//! ```
//!
//! Each target is handled under its own store lock and commits on its own,
//! so one failing target never leaves partial changes behind or stops the
//! rest of the batch.

mod accessor;
mod batch;
mod planner;
mod report;
mod resolver;

pub use accessor::StoreAccessor;
pub use batch::{manifest_rm, remove_all, PerTargetError, RemovalReport, RemovalRequest};
pub use planner::{apply, plan, RemovalKind, RemovalPlan};
pub use report::{
    exit_code, finalize, join_errors, BatchError, ExitStatus, EXIT_FAILURE, EXIT_NOT_FOUND,
    EXIT_SUCCESS,
};
pub use resolver::{resolve, Target, MIN_DIGEST_PREFIX_LEN};
