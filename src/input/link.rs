//! Code for reading the links of the basin network.
use super::read_csv;
use crate::basin::{LinkDefinition, LinkKind, NodeID};
use crate::units::{Dimensionless, Volume};
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

const LINKS_FILE_NAME: &str = "links.csv";

/// A row of the links CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct LinkRaw {
    kind: LinkKind,
    upstream: NodeID,
    downstream: NodeID,
    #[serde(rename = "yield")]
    link_yield: Option<f64>,
    max_flow: Option<f64>,
}

impl From<LinkRaw> for LinkDefinition {
    fn from(raw: LinkRaw) -> Self {
        Self {
            kind: raw.kind,
            upstream: raw.upstream,
            downstream: raw.downstream,
            link_yield: raw
                .link_yield
                .map_or(raw.kind.default_yield(), Dimensionless),
            max_flow: raw.max_flow.map(Volume),
        }
    }
}

/// Read the links of the basin network.
///
/// Links are checked when the basin is assembled.
pub fn read_links(model_dir: &Path) -> Result<Vec<LinkDefinition>> {
    let file_path = model_dir.join(LINKS_FILE_NAME);
    Ok(read_csv::<LinkRaw>(&file_path)?
        .map(LinkDefinition::from)
        .collect())
}
