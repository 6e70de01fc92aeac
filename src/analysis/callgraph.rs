//! Direct call graph over a module, with its strongly connected
//! components in bottom-up order.
//!
//! Nodes are the module's function ids; an edge `a -> b` means the body
//! of `a` contains a direct call to `b`. Components are computed with
//! Tarjan's algorithm, which emits them in reverse topological order of
//! the condensation, so iterating [`CallGraph::sccs`] front to back
//! visits callees before their callers. The SCC driver relies on that
//! order to optimize bottom-up.

use std::any::Any;

use crate::ir::{FuncId, Module};
use crate::phase::{AnalysisInfoHook, Phase, PhaseId};

/// Call edges and strongly connected components of one module.
///
/// Produced by the module-level `callgraph` analysis phase and read back
/// from the module's result cache, including from function-level phases
/// through the over-IR access of the hook.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    /// Deduplicated callee lists per function, in first-call order.
    callees: Vec<Vec<FuncId>>,
    /// Components in reverse topological (callee-first) order, members
    /// sorted by id.
    sccs: Vec<Vec<FuncId>>,
    /// Component index per function.
    func_to_scc: Vec<usize>,
}

impl CallGraph {
    /// Builds the call graph of `module`.
    ///
    /// Calls to ids outside the module are dropped; external callees
    /// cannot participate in the traversal order.
    #[must_use]
    pub fn build(module: &Module) -> Self {
        let count = module.function_count();
        let mut callees: Vec<Vec<FuncId>> = vec![Vec::new(); count];
        for function in module.functions() {
            let list = &mut callees[function.id().0 as usize];
            for callee in function.callees() {
                if (callee.0 as usize) < count && !list.contains(&callee) {
                    list.push(callee);
                }
            }
        }

        let (sccs, func_to_scc) = condense(&callees);
        CallGraph {
            callees,
            sccs,
            func_to_scc,
        }
    }

    /// Returns the number of functions in the graph.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.callees.len()
    }

    /// Returns the deduplicated direct callees of `func`.
    #[must_use]
    pub fn callees(&self, func: FuncId) -> &[FuncId] {
        self.callees
            .get(func.0 as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the components in callee-first order.
    #[must_use]
    pub fn sccs(&self) -> &[Vec<FuncId>] {
        &self.sccs
    }

    /// Returns the index of the component containing `func`.
    #[must_use]
    pub fn scc_index(&self, func: FuncId) -> Option<usize> {
        self.func_to_scc.get(func.0 as usize).copied()
    }

    /// Returns `true` if both functions sit on one call cycle.
    #[must_use]
    pub fn same_scc(&self, a: FuncId, b: FuncId) -> bool {
        match (self.scc_index(a), self.scc_index(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Returns `true` if `func` can reach itself through calls, either
    /// directly or around a cycle.
    #[must_use]
    pub fn is_recursive(&self, func: FuncId) -> bool {
        let Some(index) = self.scc_index(func) else {
            return false;
        };
        self.sccs[index].len() > 1 || self.callees(func).contains(&func)
    }
}

/// One in-progress node of the iterative Tarjan walk.
struct WalkFrame {
    node: usize,
    /// Next unexplored successor position.
    next_succ: usize,
}

/// Tarjan's SCC algorithm with an explicit frame stack; call depth is
/// bounded by available memory instead of the thread stack.
fn condense(callees: &[Vec<FuncId>]) -> (Vec<Vec<FuncId>>, Vec<usize>) {
    let count = callees.len();
    let mut visit_index: Vec<Option<usize>> = vec![None; count];
    let mut lowlink: Vec<usize> = vec![0; count];
    let mut on_stack: Vec<bool> = vec![false; count];
    let mut stack: Vec<usize> = Vec::new();
    let mut frames: Vec<WalkFrame> = Vec::new();
    let mut next_index = 0usize;

    let mut sccs: Vec<Vec<FuncId>> = Vec::new();
    let mut func_to_scc: Vec<usize> = vec![0; count];

    for root in 0..count {
        if visit_index[root].is_some() {
            continue;
        }
        frames.push(WalkFrame {
            node: root,
            next_succ: 0,
        });
        while let Some(frame) = frames.last_mut() {
            let node = frame.node;
            if frame.next_succ == 0 {
                visit_index[node] = Some(next_index);
                lowlink[node] = next_index;
                next_index += 1;
                stack.push(node);
                on_stack[node] = true;
            }
            if let Some(succ) = callees[node].get(frame.next_succ) {
                frame.next_succ += 1;
                let succ = succ.0 as usize;
                match visit_index[succ] {
                    None => frames.push(WalkFrame {
                        node: succ,
                        next_succ: 0,
                    }),
                    Some(seen) if on_stack[succ] => {
                        lowlink[node] = lowlink[node].min(seen);
                    }
                    Some(_) => {}
                }
            } else {
                frames.pop();
                if let Some(parent) = frames.last() {
                    lowlink[parent.node] = lowlink[parent.node].min(lowlink[node]);
                }
                if Some(lowlink[node]) == visit_index[node] {
                    let mut members = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        func_to_scc[member] = sccs.len();
                        members.push(FuncId::new(member as u32));
                        if member == node {
                            break;
                        }
                    }
                    members.sort_unstable();
                    sccs.push(members);
                }
            }
        }
    }

    (sccs, func_to_scc)
}

/// The module-level `callgraph` analysis phase.
#[derive(Debug, Default)]
pub struct CallGraphPhase {
    graph: Option<CallGraph>,
}

impl CallGraphPhase {
    /// Registry id of this phase in the module registry.
    pub const ID: PhaseId = PhaseId::new(1);
    /// Registry name of this phase.
    pub const NAME: &'static str = "callgraph";

    /// Creates the phase in its not-yet-run state.
    #[must_use]
    pub fn new() -> Self {
        CallGraphPhase::default()
    }
}

impl Phase<Module> for CallGraphPhase {
    fn run(&mut self, unit: &mut Module, _hook: &mut AnalysisInfoHook<'_, '_, Module>) -> bool {
        self.graph = Some(CallGraph::build(unit));
        false
    }

    fn into_result(self: Box<Self>) -> Option<Box<dyn Any + Send + Sync>> {
        self.graph
            .map(|graph| Box::new(graph) as Box<dyn Any + Send + Sync>)
    }
}
