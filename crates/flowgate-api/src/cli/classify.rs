//! `flowgate classify`.

use anyhow::Result;
use console::style;

use crate::state::AppState;
use flowgate_core::execution::ExecutorRegistry;

pub fn classify(state: &AppState, kind: &str, label: &str, json: bool) -> Result<()> {
    let class = state
        .service(ExecutorRegistry::new())
        .classifier()
        .classify(kind, label);

    if json {
        let out = serde_json::json!({
            "kind": kind,
            "label": label,
            "node_class": class,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", style(class).bold());
    }
    Ok(())
}
