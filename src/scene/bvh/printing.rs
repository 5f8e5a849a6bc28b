use std::fmt;

use super::{Bvh, NodeIdx, NodeKind};

/// Count, extremes and mean of a list of sizes. All zero when empty.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SizeSummary {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl FromIterator<usize> for SizeSummary {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let (count, min, max, sum) = iter
            .into_iter()
            .fold((0, usize::MAX, 0, 0), |(count, min, max, sum), value| {
                (count + 1, min.min(value), max.max(value), sum + value)
            });
        if count == 0 {
            return SizeSummary::default();
        }
        SizeSummary {
            count,
            min,
            max,
            mean: sum as f64 / count as f64,
        }
    }
}

impl fmt::Display for SizeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..={} (mean {:.1}, {} leaves)",
            self.min, self.max, self.mean, self.count
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BvhStatistics {
    /// Node count on root to leaf paths
    pub depth: SizeSummary,
    /// Object count in leaves
    pub leaf_size: SizeSummary,
}

impl<O> Bvh<O> {
    pub fn statistics(&self) -> BvhStatistics {
        BvhStatistics {
            depth: self.leaf_depths().into_iter().collect(),
            leaf_size: self
                .leaves()
                .map(|(_, objects)| objects.len())
                .collect(),
        }
    }

    /// Writes one line per node, indented by depth.
    pub fn print_tree(&self, out: &mut impl fmt::Write) -> fmt::Result {
        match self.root() {
            Some(root) => self.print_recursive(out, 0, root),
            None => writeln!(out, "<EMPTY>"),
        }
    }

    /// Depth of every leaf, the root alone has depth 1.
    fn leaf_depths(&self) -> Vec<usize> {
        let mut depths = Vec::new();
        let mut stack: Vec<(NodeIdx, usize)> =
            self.root().map(|root| (root, 1)).into_iter().collect();
        while let Some((node, depth)) = stack.pop() {
            match self.nodes[node].kind {
                NodeKind::Leaf { .. } => depths.push(depth),
                NodeKind::Inner { children, .. } => {
                    stack.extend(children.map(|child| (child, depth + 1)));
                }
            }
        }
        depths
    }

    fn print_recursive(&self, out: &mut impl fmt::Write, indent: usize, node: NodeIdx) -> fmt::Result {
        let node = &self.nodes[node];
        let bounding_box = &node.bounding_box;
        let indent_str = "  ".repeat(indent);

        match node.kind {
            NodeKind::Leaf { first, count } => writeln!(
                out,
                "{indent_str}- L{}+{count}: {:?}-{:?}",
                first.index(),
                bounding_box.min,
                bounding_box.max,
            ),
            NodeKind::Inner { children, axis } => {
                writeln!(
                    out,
                    "{indent_str}- I{}: {:?}-{:?}",
                    ["x", "y", "z"][axis as usize],
                    bounding_box.min,
                    bounding_box.max,
                )?;
                for child in children {
                    self.print_recursive(out, indent + 1, child)?;
                }
                Ok(())
            }
        }
    }
}
