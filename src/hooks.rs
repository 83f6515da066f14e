//! Callbacks invoked after a table row is inserted, updated or deleted.
//!
//! Hooks are registered by name in a [`HookDispatcher`] and resolved once,
//! when a table is told to use them. Assigning a name that was never
//! registered fails right there with [`EngineError::HookNotFound`].

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{EngineError, Result};
use crate::table::{RowCursor, Table};

/// Which table event a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    AfterInsert,
    AfterUpdate,
    AfterDelete,
}

/// Arguments of one hook invocation.
pub enum HookCall<'a> {
    /// The table, its cursor on the inserted row.
    AfterInsert { table: &'a mut Table },
    /// The table plus one-row cursors over the row after and before the
    /// update. Updates issued on `table` from here do not re-enter the hook.
    AfterUpdate {
        table: &'a mut Table,
        current: RowCursor,
        previous: RowCursor,
    },
    /// A one-row cursor over the deleted row.
    AfterDelete { deleted: RowCursor },
}

impl HookCall<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            HookCall::AfterInsert { .. } => HookKind::AfterInsert,
            HookCall::AfterUpdate { .. } => HookKind::AfterUpdate,
            HookCall::AfterDelete { .. } => HookKind::AfterDelete,
        }
    }
}

pub trait TableHook {
    fn call(&self, call: HookCall<'_>) -> anyhow::Result<()>;
}

impl<F> TableHook for F
where
    F: Fn(HookCall<'_>) -> anyhow::Result<()>,
{
    fn call(&self, call: HookCall<'_>) -> anyhow::Result<()> {
        self(call)
    }
}

/// A hook resolved from the dispatcher, carried by a [`Table`].
#[derive(Clone)]
pub struct RegisteredHook {
    name: String,
    hook: Rc<dyn TableHook>,
}

impl RegisteredHook {
    pub fn new(name: impl Into<String>, hook: Rc<dyn TableHook>) -> Self {
        Self {
            name: name.into(),
            hook,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, call: HookCall<'_>) -> Result<()> {
        self.hook.call(call).map_err(|source| EngineError::Hook {
            name: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for RegisteredHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name to hook registry.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    hooks: HashMap<String, Rc<dyn TableHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure under `name`, replacing any previous hook.
    pub fn register<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(HookCall<'_>) -> anyhow::Result<()> + 'static,
    {
        self.hooks.insert(name.to_string(), Rc::new(hook));
    }

    pub fn register_hook(&mut self, name: &str, hook: Rc<dyn TableHook>) {
        self.hooks.insert(name.to_string(), hook);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.hooks.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Result<RegisteredHook> {
        self.hooks
            .get(name)
            .map(|hook| RegisteredHook::new(name, Rc::clone(hook)))
            .ok_or_else(|| EngineError::HookNotFound(name.to_string()))
    }
}

impl fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookDispatcher")
            .field("hooks", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_hook() {
        let dispatcher = HookDispatcher::new();
        assert!(matches!(
            dispatcher.resolve("on_save"),
            Err(EngineError::HookNotFound(name)) if name == "on_save"
        ));
    }

    #[test]
    fn test_register_and_unregister() {
        let mut dispatcher = HookDispatcher::new();
        dispatcher.register("on_save", |_call| Ok(()));
        assert!(dispatcher.contains("on_save"));
        assert_eq!(dispatcher.resolve("on_save").unwrap().name(), "on_save");
        assert!(dispatcher.unregister("on_save"));
        assert!(!dispatcher.contains("on_save"));
    }
}
