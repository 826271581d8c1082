//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use crossbeam_channel::Receiver;
use streamexec::pipeline::{PipelineEvent, RequestKind};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Drain everything currently queued on an event receiver.
pub fn drain_events(rx: &Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    rx.try_iter().collect()
}

/// Count `End` events for one request kind.
pub fn count_completed(events: &[PipelineEvent], kind: RequestKind) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::End { request, .. } if *request == kind))
        .count()
}
