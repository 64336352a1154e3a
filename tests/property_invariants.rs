// Property tests for the Acyclicity and Deduplication invariants of §8 of the
// base spec: arbitrary small dependency graphs and arbitrary value sequences,
// not just the literal fixtures exercised by the unit/integration tests.

use std::collections::HashSet;
use std::sync::Arc;

use attribute_engine::{build_default_resolver, Attribute, AttributeId, AttributeValue, Dependency, DefinitionHandle, SimpleDefinitionBuilder};
use proptest::prelude::*;

fn reference_is_cyclic(n: usize, edges: &[(usize, usize)]) -> bool {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(from, to) in edges {
        adjacency[from].push(to);
    }
    let mut state = vec![0u8; n]; // 0 = unvisited, 1 = on stack, 2 = done

    fn visit(node: usize, adjacency: &[Vec<usize>], state: &mut [u8]) -> bool {
        state[node] = 1;
        for &next in &adjacency[node] {
            if state[next] == 1 {
                return true;
            }
            if state[next] == 0 && visit(next, adjacency, state) {
                return true;
            }
        }
        state[node] = 2;
        false
    }

    (0..n).any(|node| state[node] == 0 && visit(node, &adjacency, &mut state))
}

fn arb_attribute_value() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        Just(AttributeValue::EmptyNull),
        Just(AttributeValue::EmptyZeroLength),
        "[a-c]{1,3}".prop_map(AttributeValue::String),
    ]
}

proptest! {
    /// `initialize()` (here, `build_default_resolver`) succeeds iff the
    /// dependency graph built from the same edge set is a DAG, for arbitrary
    /// small graphs — not just the two-node fixture in the literal scenarios.
    #[test]
    fn acyclicity_matches_reference_dfs(
        n in 2usize..6,
        raw_edges in prop::collection::vec((0usize..6, 0usize..6), 0..10),
    ) {
        let edges: Vec<(usize, usize)> = raw_edges
            .into_iter()
            .filter(|&(from, to)| from < n && to < n && from != to)
            .collect();
        let cyclic = reference_is_cyclic(n, &edges);

        let definitions: Vec<DefinitionHandle> = (0..n)
            .map(|i| {
                let id = format!("n{i}");
                let mut builder = SimpleDefinitionBuilder::new(id.clone(), AttributeId::new(id.clone()).unwrap());
                for &(from, to) in &edges {
                    if from == i {
                        builder = builder.depends_on(Dependency::Attribute {
                            plugin_id: format!("n{to}"),
                            source_attribute_id: None,
                        });
                    }
                }
                Arc::new(builder.build().unwrap()) as DefinitionHandle
            })
            .collect();

        let result = build_default_resolver(definitions, vec![]);
        prop_assert_eq!(result.is_ok(), !cyclic);
    }

    /// `Attribute::finalize_values` always collapses to exactly the number of
    /// structurally-distinct values present in the input, regardless of
    /// duplicate count or ordering (null-stripping disabled here so the
    /// reference set isn't shrunk by a second, independent rule).
    #[test]
    fn finalize_values_dedups_to_structural_set_size(values in prop::collection::vec(arb_attribute_value(), 0..16)) {
        let mut attribute = Attribute::with_values(AttributeId::new("x").unwrap(), values.clone());
        attribute.finalize_values(false);

        let distinct: HashSet<AttributeValue> = values.into_iter().collect();
        prop_assert_eq!(attribute.values.len(), distinct.len());

        let mut seen = HashSet::new();
        for value in &attribute.values {
            prop_assert!(seen.insert(value.clone()), "finalize_values left a structural duplicate");
        }
    }
}
