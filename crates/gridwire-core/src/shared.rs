//! Per-puzzle side-table of state shared by all components of one kind.

use crate::property::ComponentKind;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

#[derive(Default)]
pub struct SharedData {
    entries: HashMap<ComponentKind, Box<dyn Any>>,
}

impl fmt::Debug for SharedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.entries.keys().collect();
        kinds.sort();
        f.debug_struct("SharedData").field("kinds", &kinds).finish()
    }
}

impl SharedData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get<T: Any>(&self, kind: ComponentKind) -> Option<&T> {
        self.entries.get(&kind)?.downcast_ref()
    }

    /// Entry for `kind`, created with `T::default()` on first use.
    ///
    /// An entry of a different type is replaced.
    pub fn get_or_default<T: Any + Default>(&mut self, kind: ComponentKind) -> Option<&mut T> {
        let entry = self
            .entries
            .entry(kind)
            .and_modify(|existing| {
                if !existing.is::<T>() {
                    warn!(%kind, "replacing shared data of a different type");
                    *existing = Box::new(T::default());
                }
            })
            .or_insert_with(|| Box::new(T::default()));
        entry.downcast_mut()
    }

    pub fn remove(&mut self, kind: ComponentKind) -> bool {
        self.entries.remove(&kind).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
