//! Order-dependent structural scans over a function body.
//!
//! Node order reflects execution order, so "X occurs after Y" questions are
//! index comparisons. Loop scopes are reconstructed with an explicit stack
//! of open loop markers rather than an unordered containment check.

use crate::matcher::text;
use crate::model::ir::{Node, NodeKind};

/// One loop scope: the nodes strictly between `start` and `end`.
///
/// `depth` is 1 for a top-level loop and grows with nesting. A region with
/// `end == nodes.len()` had no closing marker and conservatively extends to
/// the end of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: usize,
    pub end: usize,
    pub depth: usize,
}

/// Reconstruct loop scopes from the body's loop markers.
///
/// `start_loop`/`if_loop` open a scope; each `end_loop` closes the
/// innermost open one. The innermost boundary is the scope for matching;
/// nested scopes are reported individually, so a match inside an inner
/// loop also falls inside every enclosing region.
pub fn loop_regions(nodes: &[Node]) -> Vec<LoopRegion> {
    let mut open: Vec<usize> = Vec::new();
    let mut regions = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        if node.opens_loop() {
            open.push(index);
        } else if node.kind == NodeKind::EndLoop {
            if let Some(start) = open.pop() {
                regions.push(LoopRegion {
                    start,
                    end: index,
                    depth: open.len() + 1,
                });
            }
        }
    }

    // Unterminated loops extend to the end of the body.
    while let Some(start) = open.pop() {
        regions.push(LoopRegion {
            start,
            end: nodes.len(),
            depth: open.len() + 1,
        });
    }

    regions.sort_by_key(|r| (r.start, r.end));
    regions
}

/// Does some node strictly inside a loop scope match one of `patterns`?
///
/// This is the "pattern occurs inside a loop" primitive behind
/// cascading-update and gas-DoS style checks.
pub fn loop_body_contains(nodes: &[Node], patterns: &[&str]) -> bool {
    loop_regions(nodes).iter().any(|region| {
        nodes[region.start + 1..region.end]
            .iter()
            .any(|node| text::contains_any(&node.text, patterns))
    })
}

/// Does a node matching `write_patterns` occur strictly after the first
/// node matching `call_patterns`?
pub fn write_after_call(nodes: &[Node], call_patterns: &[&str], write_patterns: &[&str]) -> bool {
    let Some(call_at) = nodes
        .iter()
        .position(|node| text::contains_any(&node.text, call_patterns))
    else {
        return false;
    };

    nodes[call_at + 1..]
        .iter()
        .any(|node| text::contains_any(&node.text, write_patterns))
}
