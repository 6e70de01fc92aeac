//! DOT rendering of control-flow graphs for Graphviz tools.

use std::fmt::Write;

use crate::cfg::block::{BasicBlock, BlockAttributes, BlockId, BlockKind};
use crate::cfg::graph::ControlFlowGraph;
use crate::ir::Stmt;

impl ControlFlowGraph {
    /// Renders the graph in DOT format.
    ///
    /// Every live block becomes a node captioned with its id, label,
    /// φ-nodes, and statements. Conditional blocks are drawn as diamonds,
    /// sentinel edges dotted, and edges into exception handlers red. With
    /// `edge_freqs` set, node names carry block frequencies and every
    /// ordinary edge is annotated with its recorded count.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let cfg = ControlFlowGraph::build(&func)?;
    /// std::fs::write("cfg.dot", cfg.to_dot(false))?;
    /// ```
    #[must_use]
    pub fn to_dot(&self, edge_freqs: bool) -> String {
        let mut dot = String::new();
        dot.push_str("digraph {\n");
        let _ = writeln!(dot, "    label=\"{}\";", escape(self.name()));
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for bb in self.blocks() {
            let _ = writeln!(
                dot,
                "    {} [{}];",
                self.node_name(bb.id(), edge_freqs),
                self.node_attrs(bb)
            );
        }
        dot.push('\n');
        for bb in self.blocks() {
            self.write_edges(&mut dot, bb, edge_freqs);
        }
        dot.push_str("}\n");
        dot
    }

    fn node_name(&self, id: BlockId, edge_freqs: bool) -> String {
        if edge_freqs {
            let freq = self.block(id).map_or(0, BasicBlock::frequency);
            format!("{id}_freq_{freq}")
        } else {
            id.to_string()
        }
    }

    fn node_attrs(&self, bb: &BasicBlock) -> String {
        let mut caption = format!("{}:", bb.id());
        if bb.id() == BlockId::COMMON_ENTRY {
            caption.push_str(" (common entry)");
        } else if bb.id() == BlockId::COMMON_EXIT {
            caption.push_str(" (common exit)");
        } else {
            if bb.has_attribute(BlockAttributes::ENTRY) {
                caption.push_str(" (entry)");
            }
            if bb.has_attribute(BlockAttributes::EXIT) {
                caption.push_str(" (exit)");
            }
        }
        caption.push_str("\\l");
        if let Some(label) = bb.label() {
            let _ = write!(caption, "{label}:\\l");
        }
        for phi in bb.phis() {
            let _ = write!(caption, "{}\\l", escape(&phi.to_string()));
        }
        for stmt in bb.stmts() {
            // Comments stay out of the picture.
            if matches!(stmt, Stmt::Comment(_)) {
                continue;
            }
            let _ = write!(caption, "{}\\l", escape(&stmt.to_string()));
        }

        let mut attrs = String::new();
        if bb.kind() == BlockKind::CondGoto {
            attrs.push_str("shape=diamond, ");
        }
        let _ = write!(attrs, "label=\"{caption}\"");
        if bb.has_attribute(BlockAttributes::INSTRUMENTED) {
            attrs.push_str(", color=blue");
        }
        attrs
    }

    fn write_edges(&self, dot: &mut String, bb: &BasicBlock, edge_freqs: bool) {
        let id = bb.id();
        if id == BlockId::COMMON_EXIT {
            // The exit sentinel's adjacency lives on its own predecessor
            // list; draw those edges here.
            for &p in bb.preds() {
                let _ = writeln!(
                    dot,
                    "    {} -> {} [style=dotted];",
                    self.node_name(p, edge_freqs),
                    self.node_name(id, edge_freqs)
                );
            }
            return;
        }
        for (i, &s) in bb.succs().iter().enumerate() {
            let mut attrs: Vec<String> = Vec::new();
            if id == BlockId::COMMON_ENTRY {
                attrs.push("style=dotted".to_string());
            } else {
                let is_handler = self
                    .block(s)
                    .is_some_and(|t| t.has_attribute(BlockAttributes::CATCH));
                if is_handler {
                    attrs.push("color=red".to_string());
                }
                if edge_freqs {
                    attrs.push(format!("label={}", bb.edge_freq(i)));
                }
            }
            let _ = write!(
                dot,
                "    {} -> {}",
                self.node_name(id, edge_freqs),
                self.node_name(s, edge_freqs)
            );
            if attrs.is_empty() {
                dot.push_str(";\n");
            } else {
                let _ = writeln!(dot, " [{}];", attrs.join(", "));
            }
        }
    }
}

/// Escapes text for use inside a DOT label.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\l")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CondKind, FuncId, Function, LabelId, Operand, VarId};

    fn build(stmts: Vec<Stmt>) -> ControlFlowGraph {
        let mut f = Function::new("dotted", FuncId::new(0));
        f.extend(stmts);
        ControlFlowGraph::build(&f).unwrap()
    }

    #[test]
    fn test_dot_straight_line() {
        let cfg = build(vec![
            Stmt::Assign {
                dest: VarId::new(0),
                src: Operand::Const(1),
            },
            Stmt::Return(None),
        ]);
        let dot = cfg.to_dot(false);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("label=\"dotted\";"));
        assert!(dot.contains("bb0 -> bb2 [style=dotted];"));
        assert!(dot.contains("bb2 -> bb1 [style=dotted];"));
        assert!(dot.contains("(entry)"));
        assert!(dot.contains("%0 = 1\\l"));
        assert!(dot.contains("return\\l"));
    }

    #[test]
    fn test_dot_conditional_is_a_diamond() {
        let l1 = LabelId::new(1);
        let cfg = build(vec![
            Stmt::CondGoto {
                kind: CondKind::BrTrue,
                cond: VarId::new(0),
                target: l1,
            },
            Stmt::Return(None),
            Stmt::Label(l1),
            Stmt::Return(None),
        ]);
        let dot = cfg.to_dot(false);
        assert!(dot.contains("shape=diamond"));
        assert!(dot.contains("bb2 -> bb3;"));
        assert!(dot.contains("bb2 -> bb4;"));
    }

    #[test]
    fn test_dot_handler_edges_are_red() {
        let l9 = LabelId::new(9);
        let cfg = build(vec![
            Stmt::Try {
                handlers: vec![l9],
            },
            Stmt::Assign {
                dest: VarId::new(0),
                src: Operand::Const(1),
            },
            Stmt::EndTry,
            Stmt::Label(l9),
            Stmt::Catch { catch_all: false },
            Stmt::Return(None),
        ]);
        let dot = cfg.to_dot(false);
        assert!(dot.contains("[color=red];"));
    }

    #[test]
    fn test_dot_edge_frequencies() {
        let l1 = LabelId::new(1);
        let mut cfg = build(vec![
            Stmt::CondGoto {
                kind: CondKind::BrTrue,
                cond: VarId::new(0),
                target: l1,
            },
            Stmt::Return(None),
            Stmt::Label(l1),
            Stmt::Return(None),
        ]);
        {
            let bb = cfg.block_mut(BlockId::new(2)).unwrap();
            bb.set_frequency(10);
            bb.set_edge_freq(0, 6);
            bb.set_edge_freq(1, 4);
        }
        let dot = cfg.to_dot(true);
        assert!(dot.contains("bb2_freq_10"));
        assert!(dot.contains("[label=6];"));
        assert!(dot.contains("[label=4];"));
    }
}
