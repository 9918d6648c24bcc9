//! Hook registrations

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::query::{Criteria, Record};
use crate::BoxError;

/// Result of one hook invocation
pub type HookResult<T> = Result<T, BoxError>;

/// A user-supplied hook that may rewrite its payload
pub trait Hook<T>: Send + Sync {
    fn call(&self, input: T) -> BoxFuture<'static, HookResult<T>>;
}

impl<T, F, Fut> Hook<T> for F
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult<T>> + Send + 'static,
{
    fn call(&self, input: T) -> BoxFuture<'static, HookResult<T>> {
        Box::pin(self(input))
    }
}

/// Names of the hooks a model may register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDestroy,
    AfterDestroy,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::BeforeCreate => "beforeCreate",
            HookName::AfterCreate => "afterCreate",
            HookName::BeforeUpdate => "beforeUpdate",
            HookName::AfterUpdate => "afterUpdate",
            HookName::BeforeDestroy => "beforeDestroy",
            HookName::AfterDestroy => "afterDestroy",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type RecordHook = Arc<dyn Hook<Record>>;
type CriteriaHook = Arc<dyn Hook<Criteria>>;

/// Hooks registered for one model.
///
/// `beforeCreate` and `beforeUpdate` receive the logical values payload,
/// `beforeDestroy` receives the normalized criteria, and every after-hook
/// receives one materialized record at a time.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    before_create: Option<RecordHook>,
    after_create: Option<RecordHook>,
    before_update: Option<RecordHook>,
    after_update: Option<RecordHook>,
    before_destroy: Option<CriteriaHook>,
    after_destroy: Option<RecordHook>,
}

macro_rules! record_hook_setter {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub fn $name<F, Fut>(mut self, f: F) -> Self
        where
            F: Fn(Record) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = HookResult<Record>> + Send + 'static,
        {
            let hook: RecordHook = Arc::new(f);
            self.$name = Some(hook);
            self
        }
    };
}

impl LifecycleHooks {
    /// No hooks registered
    pub fn new() -> Self {
        Self::default()
    }

    record_hook_setter!(
        /// Runs once per new record before the adapter call
        before_create
    );
    record_hook_setter!(
        /// Runs once per created record
        after_create
    );
    record_hook_setter!(
        /// Runs once on the values to set before the adapter call
        before_update
    );
    record_hook_setter!(
        /// Runs once per updated record
        after_update
    );
    record_hook_setter!(
        /// Runs once per destroyed record
        after_destroy
    );

    /// Runs once on the criteria before the adapter call
    pub fn before_destroy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Criteria) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Criteria>> + Send + 'static,
    {
        let hook: CriteriaHook = Arc::new(f);
        self.before_destroy = Some(hook);
        self
    }

    /// Record-payload hook registered under `name`, if any
    pub fn record_hook(&self, name: HookName) -> Option<&dyn Hook<Record>> {
        let slot = match name {
            HookName::BeforeCreate => &self.before_create,
            HookName::AfterCreate => &self.after_create,
            HookName::BeforeUpdate => &self.before_update,
            HookName::AfterUpdate => &self.after_update,
            HookName::AfterDestroy => &self.after_destroy,
            HookName::BeforeDestroy => return None,
        };
        slot.as_deref()
    }

    /// The `beforeDestroy` hook, if any
    pub fn criteria_hook(&self) -> Option<&dyn Hook<Criteria>> {
        self.before_destroy.as_deref()
    }

    /// Returns true if a hook is registered under `name`
    pub fn has(&self, name: HookName) -> bool {
        match name {
            HookName::BeforeDestroy => self.before_destroy.is_some(),
            other => self.record_hook(other).is_some(),
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = [
            HookName::BeforeCreate,
            HookName::AfterCreate,
            HookName::BeforeUpdate,
            HookName::AfterUpdate,
            HookName::BeforeDestroy,
            HookName::AfterDestroy,
        ]
        .into_iter()
        .filter(|name| self.has(*name))
        .map(|name| name.as_str())
        .collect();
        f.debug_struct("LifecycleHooks")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration() {
        let hooks = LifecycleHooks::new()
            .before_update(|values: Record| async move { Ok(values) })
            .before_destroy(|criteria: Criteria| async move { Ok(criteria) });

        assert!(hooks.has(HookName::BeforeUpdate));
        assert!(hooks.has(HookName::BeforeDestroy));
        assert!(!hooks.has(HookName::AfterUpdate));
        assert!(hooks.record_hook(HookName::BeforeDestroy).is_none());
        assert!(format!("{:?}", hooks).contains("beforeUpdate"));
    }
}
