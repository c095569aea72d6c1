use std::collections::HashMap;

use tracing::debug;

use quarry_core::error::{QuarryError, Result};

use crate::condition::Condition;
use crate::factory::Factory;

/// Dependencies of one factory: child name to the conditions on that edge.
pub(crate) type EdgeMap<P> = HashMap<String, Vec<Condition<P>>>;

/// Setup-phase graph of named factories and the dependency edges between them.
///
/// A registry is filled once at startup and then frozen with
/// [`Registry::into_quarry`]; the frozen [`crate::Quarry`] can only resolve.
pub struct Registry<P> {
    pub(crate) factories: HashMap<String, Factory<P>>,
    pub(crate) adjacency: HashMap<String, EdgeMap<P>>,
}

/// DFS marks. A node with no mark has not been visited yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

impl<P> Registry<P> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            adjacency: HashMap::new(),
        }
    }

    /// Register a factory by name. Names must be unique.
    pub fn add_factory(&mut self, name: impl Into<String>, factory: Factory<P>) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(QuarryError::DuplicateFactory(name));
        }
        debug!(factory = %name, "Registered factory");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Panics if `add_factory` fails.
    pub fn must_add_factory(&mut self, name: impl Into<String>, factory: Factory<P>) {
        if let Err(e) = self.add_factory(name, factory) {
            panic!("{e}");
        }
    }

    /// Make `parent` depend on `child` unconditionally.
    pub fn add_dependency(
        &mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Result<()> {
        self.add_dependency_when(parent, child, Vec::new())
    }

    /// Panics if `add_dependency` fails.
    pub fn must_add_dependency(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        if let Err(e) = self.add_dependency(parent, child) {
            panic!("{e}");
        }
    }

    /// Make `parent` depend on `child` when every condition holds for the
    /// request. Unmet dependencies reach the parent with no value and are
    /// never resolved.
    ///
    /// An edge that would close a cycle is rejected and not kept, so the
    /// graph stays acyclic after every call.
    pub fn add_dependency_when(
        &mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        conditions: impl IntoIterator<Item = Condition<P>>,
    ) -> Result<()> {
        let parent = parent.into();
        let child = child.into();

        let edges = self.adjacency.entry(parent.clone()).or_default();
        if edges.contains_key(&child) {
            return Err(QuarryError::DuplicateDependency { parent, child });
        }
        edges.insert(child.clone(), conditions.into_iter().collect());

        if self.has_cycle() {
            self.remove_edge(&parent, &child);
            return Err(QuarryError::CycleDetected { parent, child });
        }
        debug!(parent = %parent, child = %child, "Registered dependency");
        Ok(())
    }

    /// Panics if `add_dependency_when` fails.
    pub fn must_add_dependency_when(
        &mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        conditions: impl IntoIterator<Item = Condition<P>>,
    ) {
        if let Err(e) = self.add_dependency_when(parent, child, conditions) {
            panic!("{e}");
        }
    }

    pub fn contains_factory(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered factory names, sorted.
    pub fn factory_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declared dependencies of `name`, sorted.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let mut children: Vec<&str> = self
            .adjacency
            .get(name)
            .map(|edges| edges.keys().map(String::as_str).collect())
            .unwrap_or_default();
        children.sort_unstable();
        children
    }

    fn remove_edge(&mut self, parent: &str, child: &str) {
        if let Some(edges) = self.adjacency.get_mut(parent) {
            edges.remove(child);
            if edges.is_empty() {
                self.adjacency.remove(parent);
            }
        }
    }

    /// Three-color depth-first search over the whole adjacency map.
    fn has_cycle(&self) -> bool {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        for name in self.adjacency.keys() {
            if !marks.contains_key(name.as_str()) && self.visit(name, &mut marks) {
                return true;
            }
        }
        false
    }

    fn visit<'a>(&'a self, name: &'a str, marks: &mut HashMap<&'a str, Mark>) -> bool {
        marks.insert(name, Mark::OnStack);
        if let Some(edges) = self.adjacency.get(name) {
            for child in edges.keys() {
                match marks.get(child.as_str()) {
                    Some(Mark::OnStack) => return true,
                    Some(Mark::Done) => {}
                    None => {
                        if self.visit(child, marks) {
                            return true;
                        }
                    }
                }
            }
        }
        marks.insert(name, Mark::Done);
        false
    }
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("factories", &self.factory_names())
            .field("edges", &self.adjacency.values().map(HashMap::len).sum::<usize>())
            .finish()
    }
}
