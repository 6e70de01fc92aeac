//! Module-level IR container: the set of functions one compilation covers.

use std::fmt;

use crate::ir::{FuncId, Function};
use crate::phase::UnitId;

/// A compilation module: an ordered collection of [`Function`]s plus the
/// module's own scheduler identity.
///
/// Function ids are dense indices into this container and double as
/// call-graph node ids. The module itself is the compilation unit of
/// module-level phases; its analysis results live in a separate
/// [`AnalysisDataManager`](crate::phase::AnalysisDataManager) from any
/// function's, which function phases can read through the over-IR access of
/// the [`AnalysisInfoHook`](crate::phase::AnalysisInfoHook).
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
}

impl Module {
    /// Unit id under which module-level analysis results are cached.
    pub const UNIT_ID: UnitId = UnitId::new(0);

    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module's scheduler unit id.
    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        Self::UNIT_ID
    }

    /// Creates an empty function, appends it, and returns its id.
    pub fn add_function(&mut self, name: impl Into<String>) -> FuncId {
        let id = FuncId::new(u32::try_from(self.functions.len()).unwrap_or(u32::MAX));
        self.functions.push(Function::new(name, id));
        id
    }

    /// Returns the function with the given id, if present.
    #[must_use]
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    /// Returns a mutable reference to the function with the given id.
    pub fn function_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        self.functions.get_mut(id.0 as usize)
    }

    /// Returns all functions in id order.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Returns all functions mutably, in id order.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Moves the named functions out of the module.
    ///
    /// Used by the SCC driver to hand exclusive ownership of a component's
    /// members to one worker; [`Module::restore`] puts them back. The vacated
    /// slots hold default (empty) functions until then.
    pub(crate) fn detach(&mut self, ids: &[FuncId]) -> Vec<Function> {
        ids.iter()
            .map(|id| std::mem::take(&mut self.functions[id.0 as usize]))
            .collect()
    }

    /// Returns previously detached functions to their slots.
    pub(crate) fn restore(&mut self, functions: Vec<Function>) {
        for function in functions {
            let slot = function.id().0 as usize;
            self.functions[slot] = function;
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} ({} functions)", self.name, self.functions.len())?;
        for function in &self.functions {
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_function_assigns_dense_ids() {
        let mut module = Module::new("m");
        let a = module.add_function("a");
        let b = module.add_function("b");
        assert_eq!(a, FuncId::new(0));
        assert_eq!(b, FuncId::new(1));
        assert_eq!(module.function_count(), 2);
        assert_eq!(module.function(a).map(Function::name), Some("a"));
        assert_eq!(module.function(b).map(Function::name), Some("b"));
    }

    #[test]
    fn test_function_lookup_out_of_range() {
        let module = Module::new("m");
        assert!(module.function(FuncId::new(0)).is_none());
    }

    #[test]
    fn test_detach_restore_round_trip() {
        let mut module = Module::new("m");
        let a = module.add_function("a");
        let b = module.add_function("b");
        let c = module.add_function("c");

        let taken = module.detach(&[a, c]);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].name(), "a");
        assert_eq!(taken[1].name(), "c");
        // Slots are vacated, middle function untouched.
        assert_eq!(module.function(a).map(Function::name), Some(""));
        assert_eq!(module.function(b).map(Function::name), Some("b"));

        module.restore(taken);
        assert_eq!(module.function(a).map(Function::name), Some("a"));
        assert_eq!(module.function(c).map(Function::name), Some("c"));
    }
}
