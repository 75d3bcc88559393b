//! Software-city core: turns a dependency edge list into a levelled
//! package/class hierarchy and a deterministic 3D layout.
//!
//! Pipeline: parser -> graph -> lsm -> layout -> output.

pub mod error;
pub mod graph;
pub mod layout;
pub mod load;
pub mod lsm;
pub mod output;
pub mod parser;
pub mod wasm;

use tracing::{error, info};

pub use error::{CityError, Result};
pub use graph::{CycleDetector, DependencyGraph, MAX_NAME_DEPTH};
pub use layout::{CityConfig, CityLayout, layout_city};
pub use load::LoadTable;
pub use lsm::{Lsm, LsmBuilder, LsmTree};
pub use output::CityOutput;
pub use parser::{EdgeList, ParseWarning, parse_edge_list};

/// Runs the whole pipeline on edge-list source text.
pub fn build_city(input: &str, cfg: &CityConfig, loads: Option<&LoadTable>) -> Result<CityOutput> {
    let edges = parse_edge_list(input);
    city_from_graph(&edges.graph, cfg, loads, &edges.warnings)
}

/// Runs layering and layout on an already built graph.
pub fn city_from_graph(
    graph: &DependencyGraph,
    cfg: &CityConfig,
    loads: Option<&LoadTable>,
    warnings: &[ParseWarning],
) -> Result<CityOutput> {
    cfg.validate()?;
    graph.check_depth(MAX_NAME_DEPTH)?;
    let lsm = LsmBuilder::build(graph)?;
    let layout = layout_city(&lsm.tree, graph, cfg)?;
    let cycles = CycleDetector::for_graph(graph);
    info!(
        elements = layout.len(),
        cycles = cycles.cycles().len(),
        removed = lsm.removed.len(),
        "city built"
    );
    Ok(CityOutput::assemble(&lsm, &layout, &cycles, loads, warnings))
}

/// Like [`build_city`], but never fails: errors end up in `CityOutput::error`,
/// next to the warnings gathered before them.
pub fn compile_city_output(input: &str, cfg: &CityConfig, loads: Option<&LoadTable>) -> CityOutput {
    let edges = parse_edge_list(input);
    match city_from_graph(&edges.graph, cfg, loads, &edges.warnings) {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "city build failed");
            CityOutput::failure(&e, &edges.warnings)
        }
    }
}
