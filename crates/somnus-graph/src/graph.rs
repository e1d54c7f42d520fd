//! Forward and reverse dependency index

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use somnus_types::{FunctionId, FunctionRecord, RiskFinding, RiskFindingType, RiskSeverity};
use tracing::debug;

use crate::cycles::find_cycles;

static NO_DEPS: BTreeSet<FunctionId> = BTreeSet::new();

/// A `depends_on` entry naming an unregistered id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DanglingRef {
    /// Record holding the reference
    pub from: FunctionId,
    /// Id that is not in the snapshot
    pub missing: FunctionId,
}

/// Dependency views over one registry snapshot
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    forward: BTreeMap<FunctionId, BTreeSet<FunctionId>>,
    reverse: BTreeMap<FunctionId, BTreeSet<FunctionId>>,
    dangling: Vec<DanglingRef>,
    cycles: Vec<Vec<FunctionId>>,
}

impl DependencyGraph {
    /// Build the graph in a single pass over the snapshot.
    pub fn build(records: &[FunctionRecord]) -> Self {
        let mut forward: BTreeMap<FunctionId, BTreeSet<FunctionId>> = records
            .iter()
            .map(|r| (r.id.clone(), BTreeSet::new()))
            .collect();
        let mut reverse: BTreeMap<FunctionId, BTreeSet<FunctionId>> = BTreeMap::new();
        let mut dangling = Vec::new();

        for record in records {
            for dep in &record.depends_on {
                if !forward.contains_key(dep) {
                    dangling.push(DanglingRef {
                        from: record.id.clone(),
                        missing: dep.clone(),
                    });
                }
                reverse
                    .entry(dep.clone())
                    .or_default()
                    .insert(record.id.clone());
            }
            if let Some(deps) = forward.get_mut(&record.id) {
                deps.extend(record.depends_on.iter().cloned());
            }
        }

        dangling.sort();
        let cycles = find_cycles(&forward);

        debug!(
            records = records.len(),
            dangling = dangling.len(),
            cycles = cycles.len(),
            "Dependency graph built"
        );

        Self {
            forward,
            reverse,
            dangling,
            cycles,
        }
    }

    /// What `id` depends on. Includes dangling ids.
    pub fn forward_deps(&self, id: &FunctionId) -> &BTreeSet<FunctionId> {
        self.forward.get(id).unwrap_or(&NO_DEPS)
    }

    /// What depends on `id`.
    pub fn reverse_deps(&self, id: &FunctionId) -> &BTreeSet<FunctionId> {
        self.reverse.get(id).unwrap_or(&NO_DEPS)
    }

    /// Whether `id` is a record of the snapshot.
    pub fn contains(&self, id: &FunctionId) -> bool {
        self.forward.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn dangling(&self) -> &[DanglingRef] {
        &self.dangling
    }

    /// Detected cycles, each starting at its smallest id.
    pub fn cycles(&self) -> &[Vec<FunctionId>] {
        &self.cycles
    }

    /// Every registered id reachable from `id` through `depends_on`, excluding `id`.
    ///
    /// Dangling ids are not returned and cycles terminate the walk.
    pub fn transitive_dependencies(&self, id: &FunctionId) -> BTreeSet<FunctionId> {
        let mut reached = BTreeSet::new();
        let mut queue: VecDeque<&FunctionId> = self.forward_deps(id).iter().collect();

        while let Some(current) = queue.pop_front() {
            if current == id || !self.contains(current) {
                continue;
            }
            if !reached.insert(current.clone()) {
                continue;
            }
            queue.extend(self.forward_deps(current).iter());
        }

        reached
    }

    /// The transitive dependencies of `id`, grouped so each layer only
    /// depends on earlier layers. Providers come first.
    ///
    /// Members of a cycle cannot be ordered and share the last layer.
    pub fn dependency_layers(&self, id: &FunctionId) -> Vec<Vec<FunctionId>> {
        let mut pending = self.transitive_dependencies(id);
        let mut placed: BTreeSet<FunctionId> = BTreeSet::new();
        let mut layers = Vec::new();

        while !pending.is_empty() {
            let ready: Vec<FunctionId> = pending
                .iter()
                .filter(|member| {
                    self.forward_deps(member)
                        .iter()
                        .all(|dep| !pending.contains(dep) || placed.contains(dep))
                })
                .cloned()
                .collect();

            if ready.is_empty() {
                debug!(function_id = %id, stuck = pending.len(), "Cyclic dependencies share a layer");
                layers.push(std::mem::take(&mut pending).into_iter().collect());
                break;
            }
            for member in &ready {
                pending.remove(member);
            }
            placed.extend(ready.iter().cloned());
            layers.push(ready);
        }

        layers
    }

    /// One HIGH finding per cycle, attributed to the cycle's smallest id.
    pub fn cycle_findings(&self) -> Vec<RiskFinding> {
        self.cycles
            .iter()
            .filter_map(|cycle| {
                let first = cycle.first()?;
                let path = cycle
                    .iter()
                    .chain(std::iter::once(first))
                    .map(FunctionId::as_str)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                Some(RiskFinding::new(
                    RiskFindingType::DependencyCycle,
                    RiskSeverity::High,
                    first.clone(),
                    format!("Dependency cycle: {}", path),
                    "Break the cycle; members cannot be woken in dependency order",
                ))
            })
            .collect()
    }

    /// One LOW finding per dangling reference.
    pub fn dangling_findings(&self) -> Vec<RiskFinding> {
        self.dangling
            .iter()
            .map(|d| {
                RiskFinding::new(
                    RiskFindingType::DanglingDependency,
                    RiskSeverity::Low,
                    d.from.clone(),
                    format!("Depends on unregistered function {}", d.missing),
                    "Register the dependency or remove it from depends_on",
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use somnus_types::FunctionMeta;

    fn record(id: &str, deps: &[&str]) -> FunctionRecord {
        FunctionRecord::from_meta(
            FunctionMeta::new(id, id).depends_on(deps.iter().copied()),
            Utc::now(),
        )
    }

    fn ids(raw: &[&str]) -> BTreeSet<FunctionId> {
        raw.iter().map(|id| FunctionId::new(*id)).collect()
    }

    #[test]
    fn test_forward_and_reverse() {
        let graph = DependencyGraph::build(&[
            record("F1", &[]),
            record("F2", &["F1"]),
            record("F3", &["F1", "F2"]),
        ]);

        assert_eq!(graph.forward_deps(&"F3".into()), &ids(&["F1", "F2"]));
        assert_eq!(graph.reverse_deps(&"F1".into()), &ids(&["F2", "F3"]));
        assert!(graph.reverse_deps(&"F3".into()).is_empty());
        assert!(graph.cycles().is_empty());
        assert!(graph.dangling().is_empty());
    }

    #[test]
    fn test_unknown_id_has_no_edges() {
        let graph = DependencyGraph::build(&[record("F1", &[])]);
        assert!(graph.forward_deps(&"nope".into()).is_empty());
        assert!(!graph.contains(&"nope".into()));
    }

    #[test]
    fn test_dangling_is_leaf() {
        let graph = DependencyGraph::build(&[record("F1", &["ghost"])]);

        assert_eq!(graph.dangling().len(), 1);
        assert_eq!(graph.dangling()[0].missing, FunctionId::new("ghost"));
        assert!(graph.transitive_dependencies(&"F1".into()).is_empty());

        let findings = graph.dangling_findings();
        assert_eq!(findings[0].finding_type, RiskFindingType::DanglingDependency);
        assert_eq!(findings[0].severity, RiskSeverity::Low);
    }

    #[test]
    fn test_cycle_reported_once() {
        let graph = DependencyGraph::build(&[
            record("A", &["B"]),
            record("B", &["C"]),
            record("C", &["A"]),
            record("D", &["A"]),
        ]);

        let findings = graph.cycle_findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].function_id, FunctionId::new("A"));
        assert_eq!(findings[0].severity, RiskSeverity::High);
        assert!(findings[0].description.contains("A -> B -> C -> A"));
    }

    #[test]
    fn test_transitive_terminates_on_cycle() {
        let graph = DependencyGraph::build(&[
            record("A", &["B"]),
            record("B", &["C"]),
            record("C", &["A", "D"]),
            record("D", &[]),
        ]);

        assert_eq!(graph.transitive_dependencies(&"A".into()), ids(&["B", "C", "D"]));
    }

    #[test]
    fn test_diamond() {
        let graph = DependencyGraph::build(&[
            record("top", &["left", "right"]),
            record("left", &["base"]),
            record("right", &["base"]),
            record("base", &[]),
        ]);

        assert_eq!(
            graph.transitive_dependencies(&"top".into()),
            ids(&["base", "left", "right"])
        );
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_layers_put_providers_first() {
        let graph = DependencyGraph::build(&[
            record("A", &["B"]),
            record("B", &["C"]),
            record("C", &[]),
            record("X", &[]),
        ]);

        let layers = graph.dependency_layers(&"A".into());
        assert_eq!(
            layers,
            vec![vec![FunctionId::new("C")], vec![FunctionId::new("B")]]
        );
    }

    #[test]
    fn test_layers_group_independent_providers() {
        let graph = DependencyGraph::build(&[
            record("top", &["left", "right"]),
            record("left", &["base"]),
            record("right", &["base"]),
            record("base", &[]),
        ]);

        let layers = graph.dependency_layers(&"top".into());
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], vec![FunctionId::new("base")]);
        assert_eq!(
            layers[1],
            vec![FunctionId::new("left"), FunctionId::new("right")]
        );
    }

    #[test]
    fn test_layers_end_with_cycle() {
        let graph = DependencyGraph::build(&[
            record("app", &["A"]),
            record("A", &["B"]),
            record("B", &["A", "D"]),
            record("D", &[]),
        ]);

        let layers = graph.dependency_layers(&"app".into());
        assert_eq!(layers[0], vec![FunctionId::new("D")]);
        assert_eq!(layers[1], vec![FunctionId::new("A"), FunctionId::new("B")]);
        assert_eq!(layers.len(), 2);
    }

    proptest! {
        #[test]
        fn reverse_mirrors_forward(edges in proptest::collection::vec((0u8..12, 0u8..12), 0..40)) {
            let mut records: BTreeMap<u8, Vec<String>> = (0u8..12).map(|n| (n, Vec::new())).collect();
            for (from, to) in &edges {
                records.entry(*from).or_default().push(format!("n{}", to));
            }
            let snapshot: Vec<FunctionRecord> = records
                .iter()
                .map(|(n, deps)| {
                    FunctionRecord::from_meta(
                        FunctionMeta::new(format!("n{}", n), "node").depends_on(deps.clone()),
                        Utc::now(),
                    )
                })
                .collect();

            let graph = DependencyGraph::build(&snapshot);
            for record in &snapshot {
                for dep in graph.forward_deps(&record.id) {
                    prop_assert!(graph.reverse_deps(dep).contains(&record.id));
                }
                prop_assert!(!graph.transitive_dependencies(&record.id).contains(&record.id));
            }
        }
    }
}
