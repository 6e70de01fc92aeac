//! φ-nodes recorded at control-flow join points.

use std::fmt;

use crate::ir::{Operand, Stmt, VarId};

/// One φ-node of a basic block.
///
/// The operand list is parallel to the owning block's predecessor list: the
/// i-th operand is the definition live on the edge from the i-th predecessor.
/// Edge mutators keep this parallelism; when a block drops to one or zero
/// predecessors its φ-nodes are degraded (identity assignment, or removal)
/// rather than left dangling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    result: VarId,
    operands: Vec<VarId>,
}

impl PhiNode {
    /// Creates a φ-node with the given result and per-predecessor operands.
    #[must_use]
    pub fn new(result: VarId, operands: Vec<VarId>) -> Self {
        PhiNode { result, operands }
    }

    /// Creates a φ-node whose operands all name the result variable itself,
    /// one per predecessor. Renaming fills in real versions later; the
    /// placeholder keeps the operand list parallel to the predecessor list
    /// from the moment of insertion.
    #[must_use]
    pub fn placeholder(result: VarId, pred_count: usize) -> Self {
        PhiNode {
            result,
            operands: vec![result; pred_count],
        }
    }

    /// Returns the variable this φ-node defines.
    #[must_use]
    pub const fn result(&self) -> VarId {
        self.result
    }

    /// Returns the per-predecessor operands.
    #[must_use]
    pub fn operands(&self) -> &[VarId] {
        &self.operands
    }

    /// Returns the operands mutably.
    pub fn operands_mut(&mut self) -> &mut Vec<VarId> {
        &mut self.operands
    }

    /// Returns the number of operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Drops the operand contributed by the predecessor at `index`.
    pub fn remove_operand(&mut self, index: usize) {
        if index < self.operands.len() {
            self.operands.remove(index);
        }
    }

    /// Lowers this φ-node to the identity assignment used when its block has
    /// exactly one predecessor left.
    #[must_use]
    pub fn to_identity_assign(&self) -> Stmt {
        Stmt::Assign {
            dest: self.result,
            src: Operand::Var(self.operands[0]),
        }
    }
}

impl fmt::Display for PhiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = phi(", self.result)?;
        for (i, opnd) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{opnd}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_operands_match_pred_count() {
        let phi = PhiNode::placeholder(VarId::new(4), 3);
        assert_eq!(phi.result(), VarId::new(4));
        assert_eq!(phi.operands(), &[VarId::new(4); 3]);
    }

    #[test]
    fn test_remove_operand_keeps_remaining_order() {
        let mut phi = PhiNode::new(
            VarId::new(0),
            vec![VarId::new(1), VarId::new(2), VarId::new(3)],
        );
        phi.remove_operand(1);
        assert_eq!(phi.operands(), &[VarId::new(1), VarId::new(3)]);
    }

    #[test]
    fn test_remove_operand_out_of_range_is_noop() {
        let mut phi = PhiNode::new(VarId::new(0), vec![VarId::new(1)]);
        phi.remove_operand(5);
        assert_eq!(phi.operand_count(), 1);
    }

    #[test]
    fn test_identity_assign() {
        let phi = PhiNode::new(VarId::new(7), vec![VarId::new(2)]);
        assert_eq!(
            phi.to_identity_assign(),
            Stmt::Assign {
                dest: VarId::new(7),
                src: Operand::Var(VarId::new(2)),
            }
        );
    }

    #[test]
    fn test_display() {
        let phi = PhiNode::new(VarId::new(1), vec![VarId::new(2), VarId::new(3)]);
        assert_eq!(format!("{phi}"), "%1 = phi(%2, %3)");
    }
}
