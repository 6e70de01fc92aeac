//! Statement-level intermediate representation consumed by the CFG builder.
//!
//! This module provides the [`Stmt`] enum and its operand types. The
//! representation is deliberately flat: a function body is one statement
//! sequence in which [`Stmt::Label`] marks branch targets and terminator
//! statements (goto, conditional branch, switch, return, throw) end basic
//! blocks. The CFG builder groups these statements into blocks and wires
//! edges from the terminators.

use std::fmt;

use strum::Display;

/// A strongly-typed identifier for branch-target labels within one function.
///
/// `LabelId` wraps a `u32` index assigned by the front end (or by
/// [`Function::fresh_label`](crate::ir::Function::fresh_label) in tests).
/// Labels are function-local: two functions may both use label 0 without
/// relation.
///
/// # Examples
///
/// ```rust,ignore
/// use optir::ir::LabelId;
///
/// let l = LabelId::new(3);
/// assert_eq!(l.index(), 3);
/// assert_eq!(format!("{l}"), "@3");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub(crate) u32);

impl LabelId {
    /// Creates a new `LabelId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        LabelId(index)
    }

    /// Returns the raw index value of this label identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelId({})", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A strongly-typed identifier for IR variables (virtual registers).
///
/// Variables are function-local and unversioned; φ-nodes reference them as
/// operands. The middle end never interprets variable contents, it only
/// moves them through assignments and φ degradation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) u32);

impl VarId {
    /// Creates a new `VarId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        VarId(index)
    }

    /// Returns the raw index value of this variable identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({})", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A strongly-typed identifier for functions within one module.
///
/// Assigned sequentially by [`Module::add_function`](crate::ir::Module::add_function)
/// and used as the call-graph node id and the per-function scheduler unit id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub(crate) u32);

impl FuncId {
    /// Creates a new `FuncId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        FuncId(index)
    }

    /// Returns the raw index value of this function identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncId({})", self.0)
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// A statement operand: either a variable or an integer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A reference to an IR variable.
    Var(VarId),
    /// An immediate integer constant.
    Const(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) => write!(f, "{v}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

/// Polarity of a conditional branch terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CondKind {
    /// Branch taken when the condition is non-zero.
    #[strum(serialize = "brtrue")]
    BrTrue,
    /// Branch taken when the condition is zero.
    #[strum(serialize = "brfalse")]
    BrFalse,
}

/// One statement of the flat pre-CFG function body.
///
/// Statements are either straight-line (assignments, calls to returning
/// functions, comments) or control relevant. Control-relevant statements
/// end the block being formed, and exception-region markers
/// ([`Stmt::Try`] / [`Stmt::EndTry`] / [`Stmt::Catch`]) drive the
/// try-region bookkeeping of the CFG builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Binds a label to the next statement. Always opens a new block.
    Label(LabelId),
    /// Straight-line copy/computation `dest := src`.
    Assign {
        /// Destination variable.
        dest: VarId,
        /// Source operand.
        src: Operand,
    },
    /// Unconditional jump to a label.
    Goto(LabelId),
    /// Conditional branch: control transfers to `target` when the condition
    /// matches `kind`'s polarity, otherwise falls through to the next block.
    CondGoto {
        /// Branch polarity.
        kind: CondKind,
        /// Condition variable.
        cond: VarId,
        /// Taken-branch label.
        target: LabelId,
    },
    /// Multi-way branch over an integer operand.
    Switch {
        /// Scrutinee.
        opnd: VarId,
        /// Label taken when no case matches.
        default: LabelId,
        /// (case value, case label) pairs; values need not be unique targets.
        cases: Vec<(i64, LabelId)>,
    },
    /// Computed jump; possible targets are the function's address-taken labels.
    IndirectGoto {
        /// Variable holding the target label address.
        opnd: VarId,
    },
    /// Direct call. `no_return` is resolved by the front end from the callee's
    /// attributes; a no-return call terminates its block.
    Call {
        /// Callee within the same module.
        callee: FuncId,
        /// Argument operands.
        args: Vec<Operand>,
        /// Variable receiving the return value, when used.
        dest: Option<VarId>,
        /// Whether the callee never returns.
        no_return: bool,
    },
    /// Return to the caller with an optional value.
    Return(Option<Operand>),
    /// Raise an exception. Inside a try region control transfers to the
    /// region's handlers; outside any region this terminates the function.
    Throw(Operand),
    /// Opens an exception-protected region with the given handler labels.
    Try {
        /// Labels of the handler blocks covering this region.
        handlers: Vec<LabelId>,
    },
    /// Closes the innermost open exception-protected region.
    EndTry,
    /// Marks the entry of an exception handler. `catch_all` handlers catch
    /// every exception; a region whose handlers are all filtered may still
    /// exit the function on an unmatched throw.
    Catch {
        /// Whether this handler catches every exception type.
        catch_all: bool,
    },
    /// Calls a local subroutine (finally-style); control resumes after this
    /// statement when the subroutine executes its [`Stmt::RetSub`].
    Gosub(LabelId),
    /// Returns from a local subroutine entered via [`Stmt::Gosub`].
    RetSub,
    /// Free-form annotation; never control relevant.
    Comment(String),
}

impl Stmt {
    /// Returns `true` if this statement ends the basic block being formed.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        match self {
            Stmt::Goto(_)
            | Stmt::CondGoto { .. }
            | Stmt::Switch { .. }
            | Stmt::IndirectGoto { .. }
            | Stmt::Return(_)
            | Stmt::Throw(_)
            | Stmt::Gosub(_)
            | Stmt::RetSub => true,
            Stmt::Call { no_return, .. } => *no_return,
            _ => false,
        }
    }

    /// Returns the branch-target label recorded in this terminator, when it
    /// has exactly one (goto, conditional branch, gosub).
    #[must_use]
    pub fn branch_target(&self) -> Option<LabelId> {
        match self {
            Stmt::Goto(target) | Stmt::CondGoto { target, .. } | Stmt::Gosub(target) => {
                Some(*target)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Label(l) => write!(f, "{l}:"),
            Stmt::Assign { dest, src } => write!(f, "{dest} = {src}"),
            Stmt::Goto(l) => write!(f, "goto {l}"),
            Stmt::CondGoto { kind, cond, target } => write!(f, "{kind} {cond} {target}"),
            Stmt::Switch {
                opnd,
                default,
                cases,
            } => {
                write!(f, "switch {opnd} default {default} [")?;
                for (i, (value, label)) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}: {label}")?;
                }
                write!(f, "]")
            }
            Stmt::IndirectGoto { opnd } => write!(f, "igoto {opnd}"),
            Stmt::Call {
                callee,
                args,
                dest,
                no_return,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                write!(f, "call {callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")?;
                if *no_return {
                    write!(f, " noreturn")?;
                }
                Ok(())
            }
            Stmt::Return(None) => write!(f, "return"),
            Stmt::Return(Some(opnd)) => write!(f, "return {opnd}"),
            Stmt::Throw(opnd) => write!(f, "throw {opnd}"),
            Stmt::Try { handlers } => {
                write!(f, "try [")?;
                for (i, h) in handlers.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{h}")?;
                }
                write!(f, "]")
            }
            Stmt::EndTry => write!(f, "endtry"),
            Stmt::Catch { catch_all } => {
                if *catch_all {
                    write!(f, "catch *")
                } else {
                    write!(f, "catch")
                }
            }
            Stmt::Gosub(l) => write!(f, "gosub {l}"),
            Stmt::RetSub => write!(f, "retsub"),
            Stmt::Comment(text) => write!(f, "# {text}"),
        }
    }
}
