use crate::access::{AccessMode, BodyGraph};
use crate::test::helpers::f32_buffer;

use ferry_device::BufferId;

fn ids(count: usize) -> Vec<BufferId> {
    (0..count).map(|i| f32_buffer(&format!("b{i}"), vec![0.0; 4]).1.id()).collect()
}

#[test]
fn join_lattice() {
    use AccessMode::*;
    assert_eq!(None.join(Read), Read);
    assert_eq!(Read.join(None), Read);
    assert_eq!(Read.join(Read), Read);
    assert_eq!(Write.join(Write), Write);
    assert_eq!(Read.join(Write), ReadWrite);
    assert_eq!(Write.join(Read), ReadWrite);
    assert_eq!(ReadWrite.join(Read), ReadWrite);
    assert_eq!(None.join(None), None);
}

#[test]
fn proven_read_only() {
    let bound = ids(2);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").reads(bound[0]).writes(bound[1]);

    let modes = graph.analyze(&bound);
    assert_eq!(modes[&bound[0]], AccessMode::Read);
    assert_eq!(modes[&bound[1]], AccessMode::Write);
}

#[test]
fn read_and_write_on_different_paths_joins_to_read_write() {
    // A conditional body reads on one path and writes on the other; the
    // analysis is flow-insensitive and must take the join.
    let bound = ids(1);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").calls("then_branch").calls("else_branch");
    graph.routine("then_branch").reads(bound[0]);
    graph.routine("else_branch").writes(bound[0]);

    let modes = graph.analyze(&bound);
    assert_eq!(modes[&bound[0]], AccessMode::ReadWrite);
}

#[test]
fn untouched_buffer_has_no_access() {
    let bound = ids(2);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").reads(bound[0]);

    let modes = graph.analyze(&bound);
    assert_eq!(modes[&bound[1]], AccessMode::None);
}

#[test]
fn opaque_call_degrades_everything() {
    // An indirect call could touch anything, including the buffer the
    // visible code only reads and the buffer it never mentions.
    let bound = ids(3);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").reads(bound[0]).calls_opaque();

    let modes = graph.analyze(&bound);
    for id in &bound {
        assert_eq!(modes[id], AccessMode::ReadWrite);
    }
}

#[test]
fn missing_callee_degrades_everything() {
    let bound = ids(2);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").writes(bound[1]).calls("not_in_graph");

    let modes = graph.analyze(&bound);
    assert_eq!(modes[&bound[0]], AccessMode::ReadWrite);
    assert_eq!(modes[&bound[1]], AccessMode::ReadWrite);
}

#[test]
fn recursive_call_graph_terminates() {
    let bound = ids(2);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").reads(bound[0]).calls("helper");
    graph.routine("helper").writes(bound[1]).calls("main");

    let modes = graph.analyze(&bound);
    assert_eq!(modes[&bound[0]], AccessMode::Read);
    assert_eq!(modes[&bound[1]], AccessMode::Write);
}

#[test]
fn unreachable_routine_is_ignored() {
    let bound = ids(1);
    let mut graph = BodyGraph::new("main");
    graph.routine("main").reads(bound[0]);
    // Declared but never called from the entry.
    graph.routine("orphan").writes(bound[0]);

    let modes = graph.analyze(&bound);
    assert_eq!(modes[&bound[0]], AccessMode::Read);
}
