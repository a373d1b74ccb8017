//! Load the fixture graph and run a few queries
//!
//! Run with: RUST_LOG=debug cargo run --example advanced_search [path/to/tree.json]

use comorbid_graphs::{ComorbidGraph, GraphOptions, NodeKind};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/symp_tree.json".to_string());
    let graph = ComorbidGraph::from_file(&path, GraphOptions::default().with_ids())?;

    println!("Source tree:");
    println!("{}", graph.pretty_print_tree());

    let query = "
        inc_name: symptom, ache
        inc_ancestor: symptom
    ";
    println!("Query:{}", query);
    let spec = graph.build_query(query)?;
    println!("Compiled: {}", serde_json::to_string(&spec)?);
    println!();

    let result = graph.advanced_search(query, NodeKind::Concept, false, "search results")?;
    println!("{} matches:", result.len());
    println!("{}", result.pretty_print());

    let subgraph = graph.filter_subgraph(&["disorder"], &["disease"], NodeKind::Bare, "disorders only")?;
    println!("{}", subgraph.pretty_print());

    for query in [
        "inc_ancestor: disorder",
        "inc_ancestor: disease",
        "inc_ancestor: disorder\nexc_ancestor: disease",
        "inc_ancestor: disease\nexc_ancestor: disorder",
        "inc_ancestor: disorder, disease",
    ] {
        let result = graph.advanced_search(query, NodeKind::Bare, false, "r")?;
        println!("{:>4}  {}", result.len(), query.replace('\n', " | "));
    }

    Ok(())
}
