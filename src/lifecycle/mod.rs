//! Lifecycle hooks
//!
//! Models may register hooks that run before and after mutations. A missing
//! hook is a no-op, and `skipAllLifecycleCallbacks` disables every hook for
//! one operation.

mod hooks;
mod runner;

pub use hooks::{Hook, HookName, HookResult, LifecycleHooks};
pub use runner::HookRunner;
