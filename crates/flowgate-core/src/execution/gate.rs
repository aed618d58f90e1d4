//! Write gate.
//!
//! Unless the caller enables writes, write-sensitive nodes and nodes that
//! declare a required approval are skipped without invoking their action.

use flowgate_types::workflow::{Node, NodeClass};

pub const WRITE_SKIP_REASON: &str = "Write operation skipped - write not enabled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Skip { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteGate {
    write_enabled: bool,
}

impl WriteGate {
    pub fn new(write_enabled: bool) -> Self {
        Self { write_enabled }
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    pub fn check(&self, node: &Node) -> GateDecision {
        if self.write_enabled {
            return GateDecision::Allow;
        }
        if node.node_class == NodeClass::WriteSensitive {
            return GateDecision::Skip {
                reason: WRITE_SKIP_REASON.to_string(),
            };
        }
        if node.requires_approval() {
            let detail = node
                .approval
                .as_ref()
                .and_then(|a| a.message.as_deref())
                .unwrap_or("no message");
            return GateDecision::Skip {
                reason: format!("Approval required ({detail}) - write not enabled"),
            };
        }
        GateDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_sensitive_nodes_are_gated() {
        let node = Node::new("n2", "add_knowledge", NodeClass::WriteSensitive);
        assert_eq!(
            WriteGate::new(false).check(&node),
            GateDecision::Skip {
                reason: WRITE_SKIP_REASON.to_string()
            }
        );
        assert_eq!(WriteGate::new(true).check(&node), GateDecision::Allow);
    }

    #[test]
    fn approval_nodes_are_gated() {
        let node = Node::new("n3", "search", NodeClass::ReadOnly).with_approval("ask ops");
        match WriteGate::new(false).check(&node) {
            GateDecision::Skip { reason } => assert!(reason.contains("ask ops")),
            GateDecision::Allow => panic!("approval node ran without writes enabled"),
        }
        assert_eq!(WriteGate::new(true).check(&node), GateDecision::Allow);
    }

    #[test]
    fn other_classes_pass() {
        for class in [
            NodeClass::ReadOnly,
            NodeClass::LlmDelegation,
            NodeClass::Computation,
            NodeClass::Utility,
        ] {
            let node = Node::new("n", "x", class);
            assert_eq!(WriteGate::new(false).check(&node), GateDecision::Allow);
        }
    }
}
