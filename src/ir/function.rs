//! Per-function IR container.

use std::fmt;

use crate::ir::{FuncId, LabelId, Stmt, VarId};
use crate::phase::UnitId;

/// One function of a [`Module`](crate::ir::Module): a name, a flat statement
/// body, and the label/variable counters the middle end draws fresh ids from.
///
/// The body is the pre-CFG form produced by a front end. Once a
/// [`ControlFlowGraph`](crate::cfg::ControlFlowGraph) has been built the
/// graph's blocks own the working copy of the statements; the body kept here
/// is the construction input and is not written back.
///
/// # Examples
///
/// ```rust,ignore
/// use optir::ir::{Function, FuncId, Stmt};
///
/// let mut func = Function::new("init", FuncId::new(0));
/// let exit = func.fresh_label();
/// func.push(Stmt::Goto(exit));
/// func.push(Stmt::Label(exit));
/// func.push(Stmt::Return(None));
/// assert_eq!(func.body().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    id: FuncId,
    body: Vec<Stmt>,
    /// Labels whose address escapes; the possible targets of `igoto`.
    address_taken: Vec<LabelId>,
    next_label: u32,
    next_var: u32,
}

impl Default for Function {
    /// An empty placeholder function, used to vacate a module slot while its
    /// real function is detached for SCC processing.
    fn default() -> Self {
        Function::new("", FuncId::new(0))
    }
}

impl Function {
    /// Creates an empty function with the given name and module-assigned id.
    #[must_use]
    pub fn new(name: impl Into<String>, id: FuncId) -> Self {
        Function {
            name: name.into(),
            id,
            body: Vec::new(),
            address_taken: Vec::new(),
            next_label: 0,
            next_var: 0,
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module-assigned function id.
    #[must_use]
    pub const fn id(&self) -> FuncId {
        self.id
    }

    /// Returns the scheduler unit id of this function.
    ///
    /// Analysis cache keys are scoped to one
    /// [`AnalysisDataManager`](crate::phase::AnalysisDataManager), so
    /// function unit ids only need to be unique within a module.
    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        UnitId::new(self.id.0)
    }

    /// Returns the statement body.
    #[must_use]
    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    /// Returns a mutable reference to the statement body.
    pub fn body_mut(&mut self) -> &mut Vec<Stmt> {
        &mut self.body
    }

    /// Returns `true` if the body holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Appends one statement to the body.
    ///
    /// Label and variable counters are bumped past any ids the statement
    /// mentions, so mixed use of explicit ids and the `fresh_*` constructors
    /// stays collision free.
    pub fn push(&mut self, stmt: Stmt) {
        self.note_ids(&stmt);
        self.body.push(stmt);
    }

    /// Appends every statement of `stmts` to the body.
    pub fn extend(&mut self, stmts: impl IntoIterator<Item = Stmt>) {
        for stmt in stmts {
            self.push(stmt);
        }
    }

    /// Allocates a label id unused anywhere in this function.
    pub fn fresh_label(&mut self) -> LabelId {
        let label = LabelId::new(self.next_label);
        self.next_label += 1;
        label
    }

    /// Allocates a variable id unused anywhere in this function.
    pub fn fresh_var(&mut self) -> VarId {
        let var = VarId::new(self.next_var);
        self.next_var += 1;
        var
    }

    /// Returns the first variable id not used by the body.
    ///
    /// The CFG seeds its temporary counter from this when it needs to
    /// synthesize an assignment (branch-to-fallthrough degradation).
    #[must_use]
    pub const fn next_var_id(&self) -> u32 {
        self.next_var
    }

    /// Records `label` as address taken, making it an `igoto` target.
    pub fn take_label_address(&mut self, label: LabelId) {
        if !self.address_taken.contains(&label) {
            self.address_taken.push(label);
        }
    }

    /// Returns the address-taken labels in recording order.
    #[must_use]
    pub fn address_taken_labels(&self) -> &[LabelId] {
        &self.address_taken
    }

    /// Returns the ids of all functions the body calls directly.
    ///
    /// Duplicates are preserved; the call-graph builder deduplicates edges.
    pub fn callees(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Call { callee, .. } => Some(*callee),
            _ => None,
        })
    }

    fn note_ids(&mut self, stmt: &Stmt) {
        let mut note_label = |next: &mut u32, label: LabelId| {
            if label.0 >= *next {
                *next = label.0 + 1;
            }
        };
        match stmt {
            Stmt::Label(l) | Stmt::Goto(l) | Stmt::Gosub(l) => {
                note_label(&mut self.next_label, *l);
            }
            Stmt::CondGoto { target, cond, .. } => {
                note_label(&mut self.next_label, *target);
                self.note_var(*cond);
            }
            Stmt::Switch {
                opnd,
                default,
                cases,
            } => {
                note_label(&mut self.next_label, *default);
                for (_, l) in cases {
                    note_label(&mut self.next_label, *l);
                }
                self.note_var(*opnd);
            }
            Stmt::Try { handlers } => {
                for h in handlers {
                    note_label(&mut self.next_label, *h);
                }
            }
            Stmt::Assign { dest, .. } => self.note_var(*dest),
            Stmt::IndirectGoto { opnd } => self.note_var(*opnd),
            Stmt::Call { dest, .. } => {
                if let Some(dest) = dest {
                    self.note_var(*dest);
                }
            }
            _ => {}
        }
    }

    fn note_var(&mut self, var: VarId) {
        if var.0 >= self.next_var {
            self.next_var = var.0 + 1;
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func {} ({}):", self.name, self.id)?;
        for stmt in &self.body {
            match stmt {
                Stmt::Label(_) => writeln!(f, "{stmt}")?,
                _ => writeln!(f, "  {stmt}")?,
            }
        }
        Ok(())
    }
}
