// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(dead_code)]

//! # optir
//!
//! [![Crates.io](https://img.shields.io/crates/v/optir.svg)](https://crates.io/crates/optir)
//! [![Documentation](https://docs.rs/optir/badge.svg)](https://docs.rs/optir)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](http://www.apache.org/licenses/LICENSE-2.0)
//!
//! Per-function control-flow graphs and a dependency-tracking phase scheduler
//! for ahead-of-time compiler middle-ends. `optir` takes a flat, label-based
//! statement IR, turns each function into a mutable CFG with synthetic entry
//! and exit sentinels, and runs analysis and transform phases over it with
//! automatic dependency resolution, per-unit memoization, and declarative
//! invalidation.
//!
//! ## Features
//!
//! - **🧱 Invariant-preserving graphs** - Every edge mutation keeps
//!   predecessor and successor lists dual; block ids stay stable across
//!   deletions
//! - **🔁 Demand-driven scheduling** - A transform declares what it needs and
//!   what it keeps; the scheduler runs missing analyses and evicts stale
//!   results
//! - **📈 Shipped analyses** - Dominator trees, natural-loop forests with
//!   nesting and classification, and a condensed call graph
//! - **🧹 Shipped transforms** - Unreachable-code elimination, loop-attribute
//!   marking, wont-exit marking, and a skippable consistency check
//! - **⚡ Parallel drivers** - Function pipelines fan out across rayon
//!   workers; call-graph components are driven callees-first
//! - **🛡️ Fail-fast verification** - Structural checks catch a broken graph
//!   at the phase that broke it, not three phases later
//!
//! ## Quick Start
//!
//! Add `optir` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! optir = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use optir::prelude::*;
//!
//! // Lower something tiny: a function that just returns a constant.
//! let mut module = Module::new("demo");
//! let id = module.add_function("answer");
//! if let Some(function) = module.function_mut(id) {
//!     function.push(Stmt::Return(Some(Operand::Const(42))));
//! }
//!
//! // Drive the shipped cleanup pipeline over every function.
//! let session = Session::new(SessionOptions::default());
//! let outcome = session.optimize_functions(&module, &["unreachable-elim", "cfg-verify"]);
//! assert!(!outcome.changed);
//! println!("{}", outcome.graphs[0].to_dot(false));
//! ```
//!
//! ## Architecture
//!
//! `optir` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`ir`] - The flat input IR: modules, functions, statements, operands
//! - [`cfg`] - Per-function control-flow graph construction and mutation
//! - [`phase`] - The registry, scheduler, and analysis-result cache
//! - [`analysis`] - Dominance, natural loops, and the call graph
//! - [`transforms`] - The shipped graph-cleanup transforms
//! - [`session`] - Options and the module/function/component drivers
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ### The Unit Model
//!
//! Two unit kinds exist: the [`ir::Module`] and the per-function
//! [`cfg::ControlFlowGraph`]. Each kind has its own phase registry and its
//! own scheduler; a function-level scheduler can additionally be handed the
//! module-level result cache, so a function phase may read, for example, the
//! call graph while rewriting one function. Graphs address blocks by
//! [`cfg::BlockId`]; slots of deleted blocks are never reused, which keeps
//! ids held by cached analyses stable.
//!
//! ### The Phase Contract
//!
//! A phase is either an analysis or a transform:
//!
//! - **Analyses** compute a cacheable result and must not mutate the unit.
//!   Results are memoized per (unit, phase) and surrendered to the
//!   scheduler's [`phase::AnalysisDataManager`].
//! - **Transforms** mutate the unit and carry a
//!   [`phase::PreservationPolicy`] naming the cached results that survive
//!   them; everything else is evicted when the transform finishes.
//!
//! Dependencies are declared, not called: a phase lists required analyses
//! and the scheduler runs whichever are missing, recursively, before the
//! phase body executes.
//!
//! ## Error Handling
//!
//! Fallible construction returns [`Result<T, Error>`](Result):
//!
//! ```rust
//! use optir::{cfg::ControlFlowGraph, ir::Module, Error};
//!
//! let mut module = Module::new("m");
//! let id = module.add_function("broken");
//! # let function = module.function_mut(id).unwrap();
//! # function.push(optir::ir::Stmt::Goto(optir::ir::LabelId::new(9)));
//! match ControlFlowGraph::build(module.function(id).unwrap()) {
//!     Ok(cfg) => println!("{} blocks", cfg.block_count()),
//!     Err(Error::Malformed { message, .. }) => println!("bad input: {message}"),
//!     Err(e) => println!("error: {e}"),
//! }
//! ```
//!
//! Ill-formed *input* is the only recoverable class. A structural invariant
//! broken by a transform, or a violation of the scheduler contract, is a
//! compiler-authoring bug: the drivers report it and terminate, since the
//! in-place data model leaves nothing safe to roll back to.
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use optir::prelude::*;
///
/// let session = Session::new(SessionOptions::default());
/// assert!(session.function_registry().phase_by_name("dominance").is_some());
/// ```
pub mod prelude;

/// The flat input IR: modules, functions, statements, and operands.
///
/// This is the form a front end hands over. Functions are plain statement
/// lists using labels for control flow; no graph structure exists yet.
///
/// # Key Types
///
/// - [`ir::Module`] - A named collection of functions
/// - [`ir::Function`] - One function body plus its id spaces
/// - [`ir::Stmt`] - Statements, from assignments to try-region markers
pub mod ir;

/// Per-function control-flow graph construction, mutation, and rendering.
///
/// # Key Types
///
/// - [`cfg::ControlFlowGraph`] - The block table and its edge mutators
/// - [`cfg::BasicBlock`] - Statements, edges, attributes, frequencies
/// - [`cfg::BlockId`] - Stable block handle; slots are never reused
///
/// # Main Functions
///
/// - [`cfg::ControlFlowGraph::build`] - Lower a function body to a graph
/// - [`cfg::ControlFlowGraph::verify`] - Check the structural invariants
/// - [`cfg::prune_unreachable`] - Drop blocks the entries cannot reach
pub mod cfg;

/// Phase identity, registration, scheduling, and result caching.
///
/// # Key Types
///
/// - [`phase::Phase`] - The trait every analysis and transform implements
/// - [`phase::PhaseRegistry`] - Maps ids and names to constructors
/// - [`phase::PhaseScheduler`] - Dependency resolution and memoization
/// - [`phase::AnalysisDataManager`] - The per-scheduler result cache
pub mod phase;

/// The shipped analyses: dominance, natural loops, and the call graph.
pub mod analysis;

/// The shipped transforms: unreachable-code elimination, loop and
/// wont-exit attribute marking, and the consistency check.
pub mod transforms;

/// Session options and the module, function, and component drivers.
pub mod session;

/// `optir` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type
/// is always [`Error`]. Used consistently throughout the crate for all
/// fallible operations.
///
/// # Examples
///
/// ```rust
/// use optir::{cfg::ControlFlowGraph, ir::Function, Result};
///
/// fn lower(function: &Function) -> Result<ControlFlowGraph> {
///     ControlFlowGraph::build(function)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `optir` Error type
///
/// The main error type for all operations in this crate, covering input
/// malformations, structural invariant violations, and scheduler contract
/// violations. See [`error::Error`](Error) for the severity classes and
/// which of them are recoverable.
pub use error::Error;

/// The top-level entry point for driving optimization pipelines.
///
/// See [`session::Session`] for registering phases and running the module,
/// function, and component drivers.
pub use session::{DriverOutcome, Session, SessionOptions};
