//! `flowgate layout`.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use flowgate_core::execution::ExecutorRegistry;
use flowgate_core::layout::LayoutStrategy;
use flowgate_infra::document::load_document;

use crate::state::AppState;

pub async fn layout(state: &AppState, document: &Path, json: bool) -> Result<()> {
    let doc = load_document(document)
        .await
        .with_context(|| format!("Failed to load workflow {}", document.display()))?;
    let layout = state.service(ExecutorRegistry::new()).layout(&doc)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    let strategy = match layout.strategy {
        LayoutStrategy::Grid => "grid",
        LayoutStrategy::Layered => "layered",
    };

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Depth"),
            Cell::new("X"),
            Cell::new("Y"),
            Cell::new("Source"),
        ]);
    for node in &layout.nodes {
        table.add_row(vec![
            Cell::new(&node.id),
            Cell::new(node.depth),
            Cell::new(node.position.x),
            Cell::new(node.position.y),
            Cell::new(if node.preset { "document" } else { strategy }),
        ]);
    }

    println!();
    println!(
        "  {} nodes, {} layer(s), {} layout",
        layout.nodes.len(),
        layout.layers.len(),
        style(strategy).cyan()
    );
    println!();
    println!("{table}");
    println!();
    Ok(())
}
