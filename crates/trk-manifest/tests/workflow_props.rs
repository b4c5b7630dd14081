use proptest::prelude::*;
use trk_manifest::{ManifestError, State, Transition, Workflow};

const STATES: [&str; 5] = ["new", "active", "blocked", "resolved", "closed"];

fn edge_strategy() -> impl Strategy<Value = (usize, usize, Option<u8>)> {
    (0..STATES.len(), 0..STATES.len(), proptest::option::of(0u8..4))
}

fn build(edges: &[(usize, usize, Option<u8>)]) -> Result<Workflow, ManifestError> {
    Workflow::builder("generated")
        .states(STATES.iter().map(|s| State::new(*s)))
        .transitions(edges.iter().map(|(from, to, trigger)| {
            let edge = Transition::new(STATES[*from], STATES[*to]);
            match trigger {
                Some(t) => edge.with_trigger(format!("t{t}")),
                None => edge,
            }
        }))
        .build()
}

proptest! {
    #[test]
    fn prop_build_accepts_iff_triggers_unique_per_state(
        edges in proptest::collection::vec(edge_strategy(), 0..12)
    ) {
        let mut seen = std::collections::HashSet::new();
        let unique = edges
            .iter()
            .filter_map(|(from, _, t)| t.map(|t| (*from, t)))
            .all(|key| seen.insert(key));

        let result = build(&edges);
        if unique {
            prop_assert!(result.is_ok());
        } else {
            let is_duplicate_trigger =
                matches!(result, Err(ManifestError::DuplicateTrigger { .. }));
            prop_assert!(is_duplicate_trigger);
        }
    }

    #[test]
    fn prop_outgoing_partitions_edges(
        edges in proptest::collection::vec((0..STATES.len(), 0..STATES.len()), 0..12)
    ) {
        let edges: Vec<_> = edges.into_iter().map(|(f, t)| (f, t, None)).collect();
        let workflow = build(&edges).unwrap();

        let total: usize = STATES.iter().map(|s| workflow.outgoing(s).count()).sum();
        prop_assert_eq!(total, workflow.transitions().len());

        for state in STATES {
            prop_assert_eq!(
                workflow.is_terminal(state),
                !edges.iter().any(|(f, _, _)| STATES[*f] == state)
            );
        }
    }
}
