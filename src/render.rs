//! Output rendering for the slots and nodes views.

use std::io::Write;
use crate::error::Result;
use crate::reconcile::Topology;

pub const NO_SLOT_DATA: &str = "!! Unable to get any CLUSTER SLOTS data to show..";
pub const NO_NODE_DATA: &str = "!! Unable to get any pod information to show..";

/// Marker shown in START/END for replica rows.
const REPLICA_ROW: &str = ".";
const COLUMN_GAP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Slots,
    Nodes,
}

/// Left-aligned text columns separated by a fixed gap.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: &[&str]) -> Self {
        Self {
            rows: vec![header.iter().map(|h| h.to_string()).collect()],
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Data rows, excluding the header.
    pub fn len(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|i| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for row in &self.rows {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                line.push_str(cell);
                if i + 1 < row.len() {
                    let pad = widths[i] - cell.chars().count() + COLUMN_GAP;
                    line.extend(std::iter::repeat(' ').take(pad));
                }
            }
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row per owner; the primary row carries the range bounds.
pub fn slots_table(topology: &Topology) -> Table {
    let mut table = Table::new(&["START", "END", "MASTER", "REPLICA", "PODNAME", "HOST", "REMARKS"]);
    for annotated in &topology.ranges {
        let range_remarks: Vec<String> = annotated.remarks.iter().map(|r| r.to_string()).collect();

        for (i, owner) in annotated.owners.iter().enumerate() {
            let remarks = join(std::iter::once(owner.info.clone()).chain(range_remarks.iter().cloned()));
            let (start, end, primary, replica) = if i == 0 {
                (
                    annotated.range.start.to_string(),
                    annotated.range.end.to_string(),
                    owner.address.clone(),
                    String::new(),
                )
            } else {
                (
                    REPLICA_ROW.to_string(),
                    REPLICA_ROW.to_string(),
                    String::new(),
                    owner.address.clone(),
                )
            };
            table.push(vec![start, end, primary, replica, owner.pod.clone(), owner.host.clone(), remarks]);
        }
    }
    table
}

pub fn nodes_table(topology: &Topology) -> Table {
    let mut table = Table::new(&[
        "HOST", "PODNAME", "IP", "ROLE", "KEYS", "SLOTS", "RANGES", "STATE", "UPTIME", "REMARKS",
    ]);
    for node in &topology.nodes {
        table.push(vec![
            node.host.clone(),
            node.name.clone(),
            node.ip.clone(),
            node.role.clone(),
            node.keys.clone(),
            node.slots.clone(),
            node.ranges.clone(),
            node.state.clone(),
            node.uptime.clone(),
            join(&node.remarks),
        ]);
    }
    table
}

fn write_failures(topology: &Topology, out: &mut impl Write) -> std::io::Result<()> {
    if topology.failures.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    for failure in &topology.failures {
        writeln!(out, "{}: {}", failure.candidate, failure.error)?;
    }
    Ok(())
}

/// Writes one view of the topology.
///
/// With nothing to show, the table is replaced by a notice on `err` and the
/// call still succeeds.
pub fn render(
    topology: &Topology,
    view: View,
    format: OutputFormat,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, topology)?;
        writeln!(out)?;
        return Ok(());
    }

    let (table, notice) = match view {
        View::Slots => (slots_table(topology), NO_SLOT_DATA),
        View::Nodes => (nodes_table(topology), NO_NODE_DATA),
    };
    if table.is_empty() {
        writeln!(err, "{}", notice)?;
    } else {
        table.write_to(out)?;
    }
    write_failures(topology, out)?;
    Ok(())
}
