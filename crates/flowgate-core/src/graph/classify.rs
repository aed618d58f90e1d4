//! Node classification.
//!
//! Maps a node's `kind` and `label` to a [`NodeClass`] using an ordered
//! keyword table. The table is passed in at construction; there is no
//! process-wide registry.

use flowgate_types::config::{ClassificationRule, default_classification};
use flowgate_types::workflow::NodeClass;

/// Keyword-table classifier. The first rule with a matching keyword wins;
/// nodes matching nothing are `READ_ONLY`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeClassifier {
    rules: Vec<ClassificationRule>,
}

impl NodeClassifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| ClassificationRule {
                class: rule.class,
                keywords: rule
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify by substring match over the lower-cased `"{kind} {label}"`.
    pub fn classify(&self, kind: &str, label: &str) -> NodeClass {
        let text = format!("{kind} {label}").to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|rule| rule.class)
            .unwrap_or(NodeClass::ReadOnly)
    }
}

impl Default for NodeClassifier {
    fn default() -> Self {
        Self::new(default_classification())
    }
}
