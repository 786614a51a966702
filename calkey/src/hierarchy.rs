//! The roll-up graph between aggregation periods.
//!
//! A [`PeriodHierarchy`] records which periods are directly coarser ("upper")
//! or finer ("lower") than each other. It is built once by declaring
//! parent/child edges, where the parent is always the coarser period, and is
//! read-only afterwards.
//!
//! # Example
//!
//! ```rust
//! use calkey::hierarchy::PeriodHierarchy;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut hierarchy = PeriodHierarchy::new();
//! hierarchy.add("1H", "5N")?; // 5-minute buckets roll up into hours
//! hierarchy.add("6H", "1H")?;
//! hierarchy.add("1D", "1H")?;
//!
//! let hour = hierarchy.get("1H")?;
//! let uppers: Vec<String> = hierarchy
//!     .upper_level_periods(hour)?
//!     .iter()
//!     .map(|p| p.code_name())
//!     .collect();
//! assert_eq!(uppers, ["6H", "1D"]);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use crate::error::{HierarchyError, Result};
use crate::period::AggregationPeriod;

/// A node of the hierarchy with its edges, stored as node indices in
/// declaration order.
#[derive(Debug, Clone)]
struct PeriodNode {
    period: AggregationPeriod,
    upper: Vec<usize>,
    lower: Vec<usize>,
}

/// A directed acyclic graph of aggregation periods keyed by code name.
#[derive(Debug, Clone, Default)]
pub struct PeriodHierarchy {
    nodes: Vec<PeriodNode>,
    index: HashMap<String, usize>,
}

impl PeriodHierarchy {
    /// Creates an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a period with no edges. Registering an existing period is
    /// a no-op.
    pub fn add_period(&mut self, period: AggregationPeriod) -> &AggregationPeriod {
        let idx = self.insert(period);
        &self.nodes[idx].period
    }

    /// Parses and registers a period with no edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the code name cannot be parsed.
    pub fn add_code(&mut self, code_name: &str) -> Result<&AggregationPeriod> {
        let period = AggregationPeriod::parse(code_name)?;
        Ok(self.add_period(period))
    }

    /// Declares `parent` as one level coarser than `child`, registering both
    /// if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if either code name cannot be parsed, or
    /// [`HierarchyError::Cycle`] if the edge would make the graph cyclic.
    pub fn add(&mut self, parent: &str, child: &str) -> Result<()> {
        let parent = AggregationPeriod::parse(parent)?;
        let child = AggregationPeriod::parse(child)?;
        self.add_periods(parent, child)
    }

    /// Declares `parent` as one level coarser than `child`, registering both
    /// if absent.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Cycle`] if the edge would make the graph cyclic.
    pub fn add_periods(
        &mut self,
        parent: AggregationPeriod,
        child: AggregationPeriod,
    ) -> Result<()> {
        let parent_idx = self.insert(parent);
        let child_idx = self.insert(child);

        if self.nodes[child_idx].upper.contains(&parent_idx) {
            return Ok(());
        }

        if self.reaches_upward(parent_idx, child_idx) {
            return Err(HierarchyError::Cycle {
                parent: parent.code_name(),
                child: child.code_name(),
            }
            .into());
        }

        self.nodes[child_idx].upper.push(parent_idx);
        self.nodes[parent_idx].lower.push(child_idx);
        tracing::debug!(
            parent = %parent,
            child = %child,
            "declared aggregation period roll-up"
        );
        Ok(())
    }

    /// Looks up a registered period by code name.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownPeriod`] if the code name is not
    /// registered.
    pub fn get(&self, code_name: &str) -> Result<&AggregationPeriod> {
        let idx = self.node_index(code_name)?;
        Ok(&self.nodes[idx].period)
    }

    /// Whether a period with this code name is registered.
    pub fn contains(&self, code_name: &str) -> bool {
        self.index.contains_key(code_name)
    }

    /// All periods directly coarser than `period`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownPeriod`] if `period` is not registered.
    pub fn upper_level_periods(
        &self,
        period: &AggregationPeriod,
    ) -> Result<Vec<&AggregationPeriod>> {
        let idx = self.node_index(&period.code_name())?;
        Ok(self.nodes[idx]
            .upper
            .iter()
            .map(|&i| &self.nodes[i].period)
            .collect())
    }

    /// The designated finer period of `period`: the first child declared.
    ///
    /// Declaration order is the only tie-break; it carries no priority.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownPeriod`] if `period` is not registered.
    pub fn lower_level_period(
        &self,
        period: &AggregationPeriod,
    ) -> Result<Option<&AggregationPeriod>> {
        let idx = self.node_index(&period.code_name())?;
        Ok(self.nodes[idx].lower.first().map(|&i| &self.nodes[i].period))
    }

    /// All periods directly finer than `period`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownPeriod`] if `period` is not registered.
    pub fn lower_level_periods(
        &self,
        period: &AggregationPeriod,
    ) -> Result<Vec<&AggregationPeriod>> {
        let idx = self.node_index(&period.code_name())?;
        Ok(self.nodes[idx]
            .lower
            .iter()
            .map(|&i| &self.nodes[i].period)
            .collect())
    }

    /// Periods with no finer period registered below them.
    pub fn finest(&self) -> impl Iterator<Item = &AggregationPeriod> {
        self.nodes
            .iter()
            .filter(|node| node.lower.is_empty())
            .map(|node| &node.period)
    }

    /// Periods with no coarser period registered above them.
    pub fn coarsest(&self) -> impl Iterator<Item = &AggregationPeriod> {
        self.nodes
            .iter()
            .filter(|node| node.upper.is_empty())
            .map(|node| &node.period)
    }

    /// All registered periods in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &AggregationPeriod> {
        self.nodes.iter().map(|node| &node.period)
    }

    /// All declared edges as `(parent, child)` pairs, grouped by child in
    /// registration order.
    pub fn edges(&self) -> impl Iterator<Item = (&AggregationPeriod, &AggregationPeriod)> {
        self.nodes.iter().flat_map(move |node| {
            node.upper
                .iter()
                .map(move |&i| (&self.nodes[i].period, &node.period))
        })
    }

    /// Number of registered periods.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no period is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_index(&self, code_name: &str) -> Result<usize> {
        self.index.get(code_name).copied().ok_or_else(|| {
            HierarchyError::UnknownPeriod {
                code_name: code_name.to_string(),
            }
            .into()
        })
    }

    fn insert(&mut self, period: AggregationPeriod) -> usize {
        let code_name = period.code_name();
        if let Some(&idx) = self.index.get(&code_name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(PeriodNode {
            period,
            upper: Vec::new(),
            lower: Vec::new(),
        });
        self.index.insert(code_name, idx);
        idx
    }

    /// Whether `target` can be reached from `from` by following upper edges,
    /// including `from == target`.
    fn reaches_upward(&self, from: usize, target: usize) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            if idx == target {
                return true;
            }
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            stack.extend(self.nodes[idx].upper.iter().copied());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalkeyError;
    use crate::unit::PeriodUnit;

    fn test_hierarchy() -> PeriodHierarchy {
        let mut h = PeriodHierarchy::new();
        h.add_code("5N").unwrap();
        h.add("1H", "5N").unwrap();
        h.add("6H", "1H").unwrap();
        h.add("1D", "1H").unwrap();
        h.add("1I", "1D").unwrap();
        h.add("1S", "1D").unwrap();
        h
    }

    fn codes(periods: &[&AggregationPeriod]) -> Vec<String> {
        periods.iter().map(|p| p.code_name()).collect()
    }

    #[test]
    fn test_get_and_contains() {
        let h = test_hierarchy();
        assert_eq!(h.len(), 6);
        assert!(h.contains("6H"));
        assert!(!h.contains("1M"));

        let hour = h.get("1H").unwrap();
        assert_eq!(hour.unit(), PeriodUnit::YearMonthDayHour);
        assert!(matches!(
            h.get("1M"),
            Err(CalkeyError::Hierarchy(HierarchyError::UnknownPeriod { .. }))
        ));
    }

    #[test]
    fn test_upper_level_periods_keep_declaration_order() {
        let h = test_hierarchy();
        let hour = *h.get("1H").unwrap();
        assert_eq!(codes(&h.upper_level_periods(&hour).unwrap()), ["6H", "1D"]);

        let day = *h.get("1D").unwrap();
        assert_eq!(codes(&h.upper_level_periods(&day).unwrap()), ["1I", "1S"]);

        let week = *h.get("1I").unwrap();
        assert!(h.upper_level_periods(&week).unwrap().is_empty());
    }

    #[test]
    fn test_lower_level_period_is_first_declared_child() {
        let mut h = PeriodHierarchy::new();
        h.add("1M", "1D").unwrap();
        h.add("1M", "1H").unwrap();

        let month = *h.get("1M").unwrap();
        assert_eq!(h.lower_level_period(&month).unwrap().unwrap().code_name(), "1D");
        assert_eq!(codes(&h.lower_level_periods(&month).unwrap()), ["1D", "1H"]);

        let day = *h.get("1D").unwrap();
        assert!(h.lower_level_period(&day).unwrap().is_none());

        let unregistered = AggregationPeriod::new(1, PeriodUnit::Year).unwrap();
        assert!(h.lower_level_period(&unregistered).is_err());
    }

    #[test]
    fn test_duplicate_edges_and_nodes_are_ignored() {
        let mut h = PeriodHierarchy::new();
        h.add("1H", "5N").unwrap();
        h.add("1H", "5N").unwrap();
        h.add_code("H").unwrap();

        assert_eq!(h.len(), 2);
        let five = *h.get("5N").unwrap();
        assert_eq!(h.upper_level_periods(&five).unwrap().len(), 1);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut h = test_hierarchy();
        assert!(matches!(
            h.add("5N", "1D"),
            Err(CalkeyError::Hierarchy(HierarchyError::Cycle { .. }))
        ));
        assert!(matches!(
            h.add("1H", "1H"),
            Err(CalkeyError::Hierarchy(HierarchyError::Cycle { .. }))
        ));

        // The rejected edge left no trace.
        let day = *h.get("1D").unwrap();
        assert_eq!(codes(&h.lower_level_periods(&day).unwrap()), ["1H"]);
    }

    #[test]
    fn test_invalid_periods_never_enter() {
        let mut h = PeriodHierarchy::new();
        assert!(h.add("2D", "1H").is_err());
        assert!(h.add_code("3W").is_err());
        assert!(h.is_empty());
    }

    #[test]
    fn test_finest_coarsest_and_edges() {
        let h = test_hierarchy();
        let finest: Vec<String> = h.finest().map(AggregationPeriod::code_name).collect();
        assert_eq!(finest, ["5N"]);
        let coarsest: Vec<String> = h.coarsest().map(AggregationPeriod::code_name).collect();
        assert_eq!(coarsest, ["6H", "1I", "1S"]);

        let edges: Vec<(String, String)> = h
            .edges()
            .map(|(p, c)| (p.code_name(), c.code_name()))
            .collect();
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[0], ("1H".to_string(), "5N".to_string()));
        assert_eq!(edges[1], ("6H".to_string(), "1H".to_string()));
    }
}
