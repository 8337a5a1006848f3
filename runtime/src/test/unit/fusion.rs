use std::cell::RefCell;
use std::rc::Rc;

use crate::access::BodyGraph;
use crate::error::Result;
use crate::kernel::{Kernel, PassContext};
use crate::session::KernelSession;
use crate::test::helpers::f32_buffer;
use crate::tracker::SyncState;

use ferry_device::BufferId;

/// `acc[i] += x[i]`, once per pass.
fn accumulate_kernel(src: BufferId, acc: BufferId) -> Kernel {
    let mut graph = BodyGraph::new("accumulate");
    graph.routine("accumulate").reads(src).reads_writes(acc);
    Kernel::new(graph, move |ctx: &PassContext<'_>| -> Result<()> {
        let x = ctx.read::<f32>(src)?;
        let mut a = ctx.write::<f32>(acc)?;
        for i in 0..ctx.range() {
            a[i] += x[i];
        }
        Ok(())
    })
}

#[test]
fn fused_run_matches_looped_single_passes() {
    let x0 = vec![1.0f32, 2.0, 3.0, 4.0];
    let a0 = vec![10.0f32, 20.0, 30.0, 40.0];
    let passes = 5;

    // Fused: one session-resident run.
    let (_hx, bx) = f32_buffer("x", x0.clone());
    let (ha, ba) = f32_buffer("acc", a0.clone());
    let mut fused = KernelSession::bind(accumulate_kernel(bx.id(), ba.id()), vec![bx, ba]).unwrap();
    fused.execute_with_passes(4, passes).unwrap();

    // Looped: the same passes as separate invocations.
    let (_hx2, bx2) = f32_buffer("x", x0);
    let (ha2, ba2) = f32_buffer("acc", a0);
    let mut looped =
        KernelSession::bind(accumulate_kernel(bx2.id(), ba2.id()), vec![bx2, ba2]).unwrap();
    for _ in 0..passes {
        looped.execute(4).unwrap();
    }

    let fused_bits: Vec<u32> = ha.to_vec().iter().map(|v| v.to_bits()).collect();
    let looped_bits: Vec<u32> = ha2.to_vec().iter().map(|v| v.to_bits()).collect();
    assert_eq!(fused_bits, looped_bits);
}

#[test]
fn fused_transfer_counts_are_independent_of_pass_count() {
    let (_hx, bx) = f32_buffer("x", vec![1.0; 4]);
    let (_ha, ba) = f32_buffer("acc", vec![0.0; 4]);
    let (src, acc) = (bx.id(), ba.id());

    let mut session = KernelSession::bind(accumulate_kernel(src, acc), vec![bx, ba]).unwrap();
    session.execute_with_passes(4, 7).unwrap();

    assert_eq!(session.stats(src).unwrap().to_device, 1);
    assert_eq!(session.stats(src).unwrap().to_host, 0);
    assert_eq!(session.stats(acc).unwrap().to_device, 1);
    assert_eq!(session.stats(acc).unwrap().to_host, 1);

    // A conservatively-scheduled loop of the same length pays per pass;
    // the fused run pays once. This is the point of the fused path.
    assert_eq!(session.state(src).unwrap(), SyncState::Synced);
    assert_eq!(session.state(acc).unwrap(), SyncState::Synced);
}

#[test]
fn pass_indices_are_monotonic_and_reset_per_run() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);

    let graph = BodyGraph::new("observe");
    let kernel = Kernel::new(graph, move |ctx: &PassContext<'_>| -> Result<()> {
        assert_eq!(ctx.pass_count(), if ctx.range() == 1 { 5 } else { 2 });
        record.borrow_mut().push(ctx.pass_id());
        Ok(())
    });

    let mut session = KernelSession::bind(kernel, Vec::new()).unwrap();
    session.execute_with_passes(1, 5).unwrap();
    assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4]);

    // The counter restarts with the next run.
    session.execute_with_passes(2, 2).unwrap();
    assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4, 0, 1]);
}

#[test]
fn alternating_buffers_ping_pong() {
    fn f(v: f32) -> f32 {
        2.0 * v + 1.0
    }

    let a0 = vec![1.0f32, 2.0, 3.0, 4.0];
    let b0 = vec![10.0f32, 20.0, 30.0, 40.0];

    let (ha, ba) = f32_buffer("a", a0.clone());
    let (hb, bb) = f32_buffer("b", b0.clone());
    let (ia, ib) = (ba.id(), bb.id());

    // Even passes write A from B, odd passes write B from A. Both
    // directions exist on some path, so both buffers analyze read-write.
    let mut graph = BodyGraph::new("ping_pong");
    graph.routine("ping_pong").calls("even_pass").calls("odd_pass");
    graph.routine("even_pass").reads(ib).writes(ia);
    graph.routine("odd_pass").reads(ia).writes(ib);

    let kernel = Kernel::new(graph, move |ctx: &PassContext<'_>| -> Result<()> {
        let (src, dst) = if ctx.pass_id() % 2 == 0 { (ib, ia) } else { (ia, ib) };
        let s = ctx.read::<f32>(src)?;
        let mut d = ctx.write::<f32>(dst)?;
        for i in 0..ctx.range() {
            d[i] = f(s[i]);
        }
        Ok(())
    });

    let mut session = KernelSession::bind(kernel, vec![ba, bb]).unwrap();
    session.execute_with_passes(4, 4).unwrap();

    // Host-side reference of the same four passes.
    let mut ra = a0;
    let mut rb = b0;
    for pass in 0..4 {
        if pass % 2 == 0 {
            for i in 0..4 {
                ra[i] = f(rb[i]);
            }
        } else {
            for i in 0..4 {
                rb[i] = f(ra[i]);
            }
        }
    }

    assert_eq!(ha.to_vec(), ra);
    assert_eq!(hb.to_vec(), rb);
}

#[test]
fn later_passes_observe_earlier_writes() {
    // Each pass shifts the buffer by one and stamps its index at the
    // front; the final contents prove the passes ran in order, each one
    // seeing its predecessor's output.
    let (h, b) = f32_buffer("trace", vec![0.0; 4]);
    let id = b.id();

    let mut graph = BodyGraph::new("shift");
    graph.routine("shift").reads_writes(id);
    let kernel = Kernel::new(graph, move |ctx: &PassContext<'_>| -> Result<()> {
        let mut v = ctx.write::<f32>(id)?;
        for i in (1..ctx.range()).rev() {
            v[i] = v[i - 1];
        }
        v[0] = ctx.pass_id() as f32 + 1.0;
        Ok(())
    });

    let mut session = KernelSession::bind(kernel, vec![b]).unwrap();
    session.execute_with_passes(4, 3).unwrap();

    assert_eq!(h.to_vec(), vec![3.0, 2.0, 1.0, 0.0]);
}
