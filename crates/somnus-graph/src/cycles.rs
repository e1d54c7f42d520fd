//! Cycle detection over the forward adjacency index

use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap};

use somnus_types::FunctionId;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Find dependency cycles with an iterative depth-first walk.
///
/// Each back edge yields one cycle. Cycles are rotated so the smallest id
/// comes first, which makes the result independent of walk order and
/// reports every cycle exactly once.
pub(crate) fn find_cycles(
    forward: &BTreeMap<FunctionId, BTreeSet<FunctionId>>,
) -> Vec<Vec<FunctionId>> {
    let mut marks: HashMap<&FunctionId, Mark> = HashMap::with_capacity(forward.len());
    let mut found: BTreeSet<Vec<FunctionId>> = BTreeSet::new();

    for root in forward.keys() {
        if marks.contains_key(root) {
            continue;
        }

        let mut stack: Vec<(&FunctionId, btree_set::Iter<'_, FunctionId>)> = Vec::new();
        marks.insert(root, Mark::OnPath);
        stack.push((root, forward[root].iter()));

        loop {
            let (node, next) = match stack.last_mut() {
                Some((node, edges)) => (*node, edges.next()),
                None => break,
            };

            let Some(next) = next else {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            };

            // Dangling references are leaves.
            let Some(edges) = forward.get(next) else {
                continue;
            };

            match marks.get(next) {
                None => {
                    marks.insert(next, Mark::OnPath);
                    stack.push((next, edges.iter()));
                }
                Some(Mark::OnPath) => {
                    if let Some(start) = stack.iter().position(|(id, _)| *id == next) {
                        let cycle: Vec<FunctionId> =
                            stack[start..].iter().map(|(id, _)| (*id).clone()).collect();
                        found.insert(canonical(cycle));
                    }
                }
                Some(Mark::Done) => {}
            }
        }
    }

    found.into_iter().collect()
}

fn canonical(mut cycle: Vec<FunctionId>) -> Vec<FunctionId> {
    if let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(pos, _)| pos)
    {
        cycle.rotate_left(min_pos);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(edges: &[(&str, &[&str])]) -> BTreeMap<FunctionId, BTreeSet<FunctionId>> {
        edges
            .iter()
            .map(|(id, deps)| {
                (
                    FunctionId::new(*id),
                    deps.iter().map(|d| FunctionId::new(*d)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_acyclic() {
        let forward = index(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);
        assert!(find_cycles(&forward).is_empty());
    }

    #[test]
    fn test_self_loop() {
        let forward = index(&[("A", &["A"])]);
        assert_eq!(find_cycles(&forward), vec![vec![FunctionId::new("A")]]);
    }

    #[test]
    fn test_cycle_rotated_to_smallest() {
        let forward = index(&[("C", &["A"]), ("A", &["B"]), ("B", &["C"])]);
        let cycles = find_cycles(&forward);
        assert_eq!(
            cycles,
            vec![vec![
                FunctionId::new("A"),
                FunctionId::new("B"),
                FunctionId::new("C")
            ]]
        );
    }

    #[test]
    fn test_dangling_not_expanded() {
        let forward = index(&[("A", &["ghost"])]);
        assert!(find_cycles(&forward).is_empty());
    }
}
