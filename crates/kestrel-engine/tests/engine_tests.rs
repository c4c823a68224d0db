//! End-to-end exploration scenarios.

mod common;
use common::*;

use kestrel_arg::{ArgId, WaitlistPolicy};
use kestrel_cfa::{Cfa, EdgeKind};
use kestrel_domain::{ConfigError, MergePolicy};
use kestrel_engine::{
    EngineError, EngineOptions, TransferErrorPolicy, Verdict, Verifier,
};

#[test]
fn two_branch_program_is_safe_and_reaches_every_node() {
    let cfa = two_branch_cfa();
    let analysis = SignAnalysis::new(vec![]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::unreachable(),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    assert!(matches!(report.verdict, Verdict::Safe));
    assert_eq!(report.termination.reason, "waitlist_exhausted");
    assert_eq!(report.statistics.targets_found, 0);
    assert_eq!(report.statistics.refinements, 0);
    // Both branches fully explored: one reached state per CFA node.
    assert_eq!(verifier.reached().len(), cfa.node_count());
    assert_eq!(verifier.checker().calls, 0);
    verifier.arg().check_invariants().unwrap();
}

#[test]
fn spurious_target_is_refined_away_to_safe() {
    let (cfa, error) = guarded_error_cfa("x := 0");
    let analysis = SignAnalysis::new(vec![error]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::new(vec![ScriptedChecker::infeasible(&["x <= 0"])]),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    assert!(matches!(report.verdict, Verdict::Safe));
    assert_eq!(report.statistics.refinements, 1);
    assert_eq!(report.statistics.spurious_targets, 1);
    assert_eq!(report.statistics.feasible_targets, 0);

    let audit = &report.refinements[0];
    assert_eq!(audit.verdict_class, "infeasible");
    assert_eq!(audit.interpolants, vec!["x <= 0".to_string()]);
    assert!(audit.removed_states > 0);
    assert!(audit.measure_after > audit.measure_before);
    assert!(audit.reached_after < audit.reached_before);

    // Under the strengthened precision the guarded branch is dead:
    // entry, the post-init node, and the safe branch end.
    assert_eq!(verifier.reached().len(), 3);
    verifier.arg().check_invariants().unwrap();
}

#[test]
fn feasible_target_is_reported_unsafe_with_the_trace() {
    let (cfa, error) = guarded_error_cfa("x := 1");
    let analysis = SignAnalysis::new(vec![error]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::new(vec![ScriptedChecker::feasible(&[("x", 1)])]),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    let Verdict::Unsafe { counterexample } = &report.verdict else {
        panic!("expected UNSAFE, got {}", report.verdict);
    };
    // The edge labels, read in order, reconstruct the original trace.
    let labels: Vec<&str> = counterexample.edge_labels().collect();
    assert_eq!(labels, vec!["x := 1", "assume x > 0", "skip"]);
    assert_eq!(counterexample.model, vec![("x".to_string(), 1)]);
    assert_eq!(report.termination.reason, "feasible_counterexample");
    assert_eq!(report.statistics.feasible_targets, 1);
    assert_eq!(report.statistics.refinements, 0);
}

#[test]
fn loop_with_widening_terminates_via_coverage() {
    let cfa = loop_cfa();
    let analysis = SignAnalysis::precise(vec![]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::unreachable(),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    assert!(matches!(report.verdict, Verdict::Safe));
    // The back edge is cut by subsumption, not by luck: at least one
    // covering was established.
    assert!(report.statistics.coverings >= 1);
    verifier.arg().check_invariants().unwrap();
}

#[test]
fn separate_merge_keeps_both_siblings() {
    let (cfa, merge_node) = diamond_cfa();
    let analysis = SignAnalysis::precise(vec![]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::unreachable(),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    assert!(matches!(report.verdict, Verdict::Safe));
    assert_eq!(report.statistics.merges, 0);

    let uncovered = uncovered_at(&verifier, merge_node);
    assert_eq!(uncovered.len(), 2);
}

#[test]
fn join_merge_replaces_both_siblings_with_their_join() {
    let (cfa, merge_node) = diamond_cfa();
    let analysis = SignAnalysis::precise(vec![]);
    let options = EngineOptions {
        merge: MergePolicy::Join,
        ..EngineOptions::default()
    };
    let mut verifier =
        Verifier::new(analysis, &cfa, ScriptedChecker::unreachable(), options).unwrap();

    let report = verifier.run().unwrap();
    assert!(matches!(report.verdict, Verdict::Safe));
    assert_eq!(report.statistics.merges, 1);

    let uncovered = uncovered_at(&verifier, merge_node);
    assert_eq!(uncovered.len(), 1);
    // The surviving entry dominates both branch values.
    let state = verifier.arg().state(uncovered[0]).unwrap();
    assert_eq!(state.sign, Sign::Top);
    verifier.arg().check_invariants().unwrap();
}

#[test]
fn unevaluable_edge_aborts_the_run_by_default() {
    let cfa = unknown_statement_cfa();
    let analysis = SignAnalysis::new(vec![]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::unreachable(),
        EngineOptions::default(),
    )
    .unwrap();

    let err = verifier.run().unwrap_err();
    assert!(matches!(err, EngineError::Transfer { .. }));
    verifier.arg().check_invariants().unwrap();
}

#[test]
fn skipped_unevaluable_edge_degrades_safe_to_unknown() {
    let cfa = unknown_statement_cfa();
    let analysis = SignAnalysis::new(vec![]);
    let options = EngineOptions {
        on_transfer_error: TransferErrorPolicy::SkipUnsound,
        ..EngineOptions::default()
    };
    let mut verifier =
        Verifier::new(analysis, &cfa, ScriptedChecker::unreachable(), options).unwrap();

    let report = verifier.run().unwrap();
    let Verdict::Unknown { reason } = &report.verdict else {
        panic!("expected UNKNOWN, got {}", report.verdict);
    };
    assert!(reason.contains("skipped"));
    assert_eq!(report.statistics.unsound_skips.len(), 1);
    assert_eq!(report.termination.reason, "waitlist_exhausted");
}

#[test]
fn shutdown_request_cancels_the_run_cleanly() {
    let cfa = two_branch_cfa();
    let analysis = SignAnalysis::new(vec![]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::unreachable(),
        EngineOptions::default(),
    )
    .unwrap();

    verifier.shutdown_token().request();
    let err = verifier.run().unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    // The graph is consistent, if incomplete.
    verifier.arg().check_invariants().unwrap();
}

#[test]
fn unknown_entry_function_is_rejected_at_construction() {
    let cfa = two_branch_cfa();
    let analysis = SignAnalysis::new(vec![]);
    let options = EngineOptions {
        entry_function: "does_not_exist".into(),
        ..EngineOptions::default()
    };
    let err = Verifier::new(analysis, &cfa, ScriptedChecker::unreachable(), options).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Config(ConfigError::UnknownEntryFunction(_))
    ));
}

#[test]
fn counterexamples_are_deterministic_across_runs() {
    let run = || {
        let (cfa, error) = guarded_error_cfa("x := 1");
        let analysis = SignAnalysis::new(vec![error]);
        let mut verifier = Verifier::new(
            analysis,
            &cfa,
            ScriptedChecker::new(vec![ScriptedChecker::feasible(&[("x", 1)])]),
            EngineOptions {
                waitlist: WaitlistPolicy::Bfs,
                ..EngineOptions::default()
            },
        )
        .unwrap();
        let report = verifier.run().unwrap();
        match report.verdict {
            Verdict::Unsafe { counterexample } => counterexample
                .edge_labels()
                .map(str::to_string)
                .collect::<Vec<_>>(),
            other => panic!("expected UNSAFE, got {other}"),
        }
    };
    assert_eq!(run(), run());
}

#[test]
fn initial_state_can_itself_be_the_target() {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    b.set_entry("main", n0).unwrap();
    let cfa = b.build().unwrap();

    let analysis = SignAnalysis::new(vec![n0]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::new(vec![ScriptedChecker::feasible(&[])]),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    let Verdict::Unsafe { counterexample } = &report.verdict else {
        panic!("expected UNSAFE, got {}", report.verdict);
    };
    assert_eq!(counterexample.steps.len(), 1);
    assert!(counterexample.steps[0].edge_label.is_none());
}

/// One node with an edge the analysis cannot interpret.
fn unknown_statement_cfa() -> Cfa {
    let mut b = Cfa::builder();
    let n0 = b.add_node("main");
    let n1 = b.add_node("main");
    b.add_edge(EdgeKind::Statement, n0, n1, "frobnicate y").unwrap();
    b.set_entry("main", n0).unwrap();
    b.build().unwrap()
}

fn uncovered_at<A, C>(verifier: &Verifier<'_, A, C>, node: kestrel_cfa::NodeId) -> Vec<ArgId>
where
    A: kestrel_engine::EngineAnalysis,
    C: kestrel_engine::FeasibilityCheck<A::State>,
{
    verifier
        .reached()
        .at_location(Some(node))
        .filter(|id| !verifier.arg().is_covered(*id).unwrap())
        .collect()
}

#[test]
fn run_reports_serialize_to_json() {
    let (cfa, error) = guarded_error_cfa("x := 1");
    let analysis = SignAnalysis::new(vec![error]);
    let mut verifier = Verifier::new(
        analysis,
        &cfa,
        ScriptedChecker::new(vec![ScriptedChecker::feasible(&[("x", 1)])]),
        EngineOptions::default(),
    )
    .unwrap();

    let report = verifier.run().unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["verdict"]["Unsafe"]["counterexample"]["model"][0][0], "x");
    assert!(json["statistics"]["transfer_calls"].as_u64().unwrap() > 0);
    assert_eq!(json["termination"]["reason"], "feasible_counterexample");
}
