//! Integration tests for update scheduling, caching and failure handling

mod common;

use common::builders::{PassFilter, SourceBuilder, TestSource};
use common::{count_completed, drain_events};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use streamexec::config::ExecutiveConfig;
use streamexec::data::DataType;
use streamexec::filters::TemporalAccumulator;
use streamexec::pipeline::{
    AbortFlag, Algorithm, AlgorithmBase, Information, Pipeline, PipelineError, PipelineEvent,
    PipelineResult, PortLayout, Request, RequestKind, UpdateRequest,
};

fn value_of(pipeline: &Pipeline, id: streamexec::pipeline::NodeId) -> Option<f64> {
    let data = pipeline.output(id, 0)?;
    let value = data.point_data()?.get("value")?.first().copied();
    value
}

#[test]
fn test_repeated_update_executes_once() {
    let mut pipeline = Pipeline::default();
    let (source, source_counts, _) = SourceBuilder::poly().build();
    let (filter, filter_counts, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();

    pipeline.update(flt).unwrap();
    pipeline.update(flt).unwrap();

    assert_eq!(source_counts.data(), 1);
    assert_eq!(filter_counts.data(), 1);
    assert_eq!(source_counts.information(), 1);
    assert_eq!(value_of(&pipeline, flt), Some(1.0));
}

#[test]
fn test_parameter_change_reexecutes_downstream() {
    let mut pipeline = Pipeline::default();
    let (source, source_counts, _) = SourceBuilder::poly().build();
    let (filter, filter_counts, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();
    pipeline.update(flt).unwrap();

    pipeline
        .algorithm_mut::<TestSource>(src)
        .unwrap()
        .set_value(2.0);
    pipeline.update(flt).unwrap();

    assert_eq!(source_counts.data(), 2);
    assert_eq!(filter_counts.data(), 2);
    assert_eq!(value_of(&pipeline, flt), Some(2.0));
}

#[test]
fn test_modified_node_does_not_rerun_upstream() {
    let mut pipeline = Pipeline::default();
    let (source, source_counts, _) = SourceBuilder::poly().build();
    let (filter, filter_counts, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();
    pipeline.update(flt).unwrap();

    pipeline.modified(flt).unwrap();
    pipeline.update(flt).unwrap();

    assert_eq!(source_counts.data(), 1);
    assert_eq!(filter_counts.data(), 2);
}

#[test]
fn test_continue_executing_runs_within_one_update() {
    let mut pipeline = Pipeline::default();
    let (source, counts, _) = SourceBuilder::poly().continue_passes(3).build();
    let src = pipeline.add_algorithm(source);

    pipeline.update(src).unwrap();

    assert_eq!(counts.data(), 4);
    assert_eq!(counts.update_extent(), 1);
}

#[test]
fn test_continuing_source_feeds_filter_once() {
    let mut pipeline = Pipeline::default();
    let (source, source_counts, _) = SourceBuilder::poly().continue_passes(2).build();
    let (filter, filter_counts, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();

    pipeline.update(flt).unwrap();

    assert_eq!(source_counts.data(), 3);
    assert_eq!(filter_counts.data(), 1);
}

#[test]
fn test_continue_limit_is_an_error() {
    let config = ExecutiveConfig {
        max_continue_iterations: 3,
        ..ExecutiveConfig::default()
    };
    let mut pipeline = Pipeline::new(config);
    let (source, counts, _) = SourceBuilder::poly().continue_passes(10).build();
    let src = pipeline.add_algorithm(source);

    let err = pipeline.update(src).unwrap_err();

    assert!(matches!(
        err.root_cause(),
        PipelineError::ContinueLimitExceeded { limit: 3, .. }
    ));
    assert_eq!(counts.data(), 3);
}

#[test]
fn test_failed_continue_pass_commits_nothing() {
    let mut pipeline = Pipeline::default();
    let (source, counts, fail) = SourceBuilder::poly()
        .continue_passes(1)
        .value(2.0)
        .fail_on_pass(1)
        .build();
    let src = pipeline.add_algorithm(source);
    pipeline.update(src).unwrap();
    assert_eq!(value_of(&pipeline, src), Some(2.0));
    let before = pipeline.output(src, 0).unwrap();

    fail.store(true, Ordering::SeqCst);
    pipeline
        .algorithm_mut::<TestSource>(src)
        .unwrap()
        .set_value(3.0);
    assert!(pipeline.update(src).is_err());
    assert_eq!(counts.data(), 4);
    assert!(Arc::ptr_eq(&before, &pipeline.output(src, 0).unwrap()));
    assert_eq!(value_of(&pipeline, src), Some(2.0));

    // The failed execution left the output stale, so it runs again.
    fail.store(false, Ordering::SeqCst);
    pipeline.update(src).unwrap();
    assert_eq!(counts.data(), 6);
    assert_eq!(value_of(&pipeline, src), Some(3.0));
}

#[test]
fn test_continue_limit_commits_nothing() {
    let config = ExecutiveConfig {
        max_continue_iterations: 3,
        ..ExecutiveConfig::default()
    };
    let mut pipeline = Pipeline::new(config);
    let (source, counts, _) = SourceBuilder::poly().continue_passes(1).build();
    let src = pipeline.add_algorithm(source);
    pipeline.update(src).unwrap();
    let before = pipeline.output(src, 0).unwrap();
    assert_eq!(counts.data(), 2);

    pipeline
        .algorithm_mut::<TestSource>(src)
        .unwrap()
        .set_continue_passes(10);
    let err = pipeline.update(src).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        PipelineError::ContinueLimitExceeded { limit: 3, .. }
    ));
    assert!(Arc::ptr_eq(&before, &pipeline.output(src, 0).unwrap()));
    assert_eq!(value_of(&pipeline, src), Some(1.0));

    assert!(pipeline.update(src).is_err());
    assert_eq!(counts.data(), 8);
}

#[test]
fn test_accumulator_restarts_after_upstream_failure() {
    let mut pipeline = Pipeline::default();
    let (source, _, fail) = SourceBuilder::poly()
        .time_steps(vec![0.0, 1.0, 2.0])
        .fail_at_time(1.0)
        .build();
    let src = pipeline.add_algorithm(source);
    let acc = pipeline.add_algorithm(TemporalAccumulator::new("value"));
    pipeline.connect(src, 0, acc, 0).unwrap();
    pipeline.update(acc).unwrap();
    let before = pipeline.output(acc, 0).unwrap();

    fail.store(true, Ordering::SeqCst);
    pipeline
        .algorithm_mut::<TestSource>(src)
        .unwrap()
        .set_value(5.0);
    assert!(pipeline.update(acc).is_err());
    assert!(Arc::ptr_eq(&before, &pipeline.output(acc, 0).unwrap()));

    fail.store(false, Ordering::SeqCst);
    pipeline.update(acc).unwrap();
    let table = pipeline.output(acc, 0).unwrap();
    let columns = &table.as_table().unwrap().columns;
    assert_eq!(columns.get("time"), Some(&[0.0, 1.0, 2.0][..]));
    assert_eq!(columns.get("value"), Some(&[5.0, 5.0, 5.0][..]));
}

#[test]
fn test_failure_keeps_previous_output() {
    let mut pipeline = Pipeline::default();
    let (source, _, _) = SourceBuilder::poly().build();
    let (filter, _, fail) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();
    pipeline.update(flt).unwrap();
    let before = pipeline.output(flt, 0).unwrap();

    fail.store(true, Ordering::SeqCst);
    pipeline
        .algorithm_mut::<TestSource>(src)
        .unwrap()
        .set_value(3.0);
    let err = pipeline.update(flt).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("PassFilter"));
    assert!(message.contains("REQUEST_DATA"));
    assert!(matches!(err.root_cause(), PipelineError::Algorithm(_)));
    assert!(Arc::ptr_eq(&before, &pipeline.output(flt, 0).unwrap()));

    fail.store(false, Ordering::SeqCst);
    pipeline.update(flt).unwrap();
    assert_eq!(value_of(&pipeline, flt), Some(3.0));
}

#[test]
fn test_events_follow_protocol_order() {
    let mut pipeline = Pipeline::default();
    let events = pipeline.subscribe();
    let (source, _, _) = SourceBuilder::poly().build();
    let src = pipeline.add_algorithm(source);

    pipeline.update(src).unwrap();

    let completed: Vec<RequestKind> = drain_events(&events)
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::End { request, .. } => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(
        completed,
        vec![
            RequestKind::DataObject,
            RequestKind::Information,
            RequestKind::UpdateTime,
            RequestKind::TimeDependentInformation,
            RequestKind::UpdateExtent,
            RequestKind::Data,
        ]
    );
}

#[test]
fn test_failure_emits_error_event() {
    let mut pipeline = Pipeline::default();
    let events = pipeline.subscribe();
    let (source, _, fail) = SourceBuilder::poly().build();
    fail.store(true, Ordering::SeqCst);
    let src = pipeline.add_algorithm(source);

    assert!(pipeline.update(src).is_err());

    let received = drain_events(&events);
    let error = received.iter().find_map(|e| match e {
        PipelineEvent::Error {
            algorithm,
            request,
            message,
            ..
        } => Some((algorithm.clone(), *request, message.clone())),
        _ => None,
    });
    let (algorithm, request, message) = error.expect("no error event");
    assert_eq!(algorithm, "TestSource");
    assert_eq!(request, RequestKind::Data);
    assert!(message.contains("injected failure"));
    assert_eq!(count_completed(&received, RequestKind::Data), 0);
}

/// Source that raises the abort flag while producing its output.
struct AbortingSource {
    base: AlgorithmBase,
    flag: AbortFlag,
}

impl Algorithm for AbortingSource {
    fn class_name(&self) -> &str {
        "AbortingSource"
    }

    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.flag.abort();
        Ok(())
    }
}

#[test]
fn test_abort_stops_downstream_execution() {
    let mut pipeline = Pipeline::default();
    let src = pipeline.add_algorithm(AbortingSource {
        base: AlgorithmBase::new(PortLayout::source(DataType::PolyData)),
        flag: AbortFlag::new(),
    });
    let flag = pipeline.abort_flag();
    pipeline
        .algorithm_mut::<AbortingSource>(src)
        .unwrap()
        .flag = flag;
    let (filter, filter_counts, _) = PassFilter::new();
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();

    let err = pipeline.update(flt).unwrap_err();
    assert!(matches!(err.root_cause(), PipelineError::Aborted));
    assert_eq!(filter_counts.data(), 0);

    // The flag is reset per update and the source is already current.
    pipeline.update(flt).unwrap();
    assert_eq!(filter_counts.data(), 1);
}

#[test]
fn test_time_request_reexecutes_only_on_change() {
    let mut pipeline = Pipeline::default();
    let (source, counts, _) = SourceBuilder::poly()
        .time_steps(vec![0.0, 1.0, 2.0])
        .build();
    let src = pipeline.add_algorithm(source);

    pipeline.set_update_time_step(src, 0, 1.0).unwrap();
    pipeline.update(src).unwrap();
    pipeline.update(src).unwrap();
    assert_eq!(counts.data(), 1);
    assert_eq!(pipeline.output(src, 0).unwrap().info.time_step, Some(1.0));

    pipeline.set_update_time_step(src, 0, 2.0).unwrap();
    pipeline.update(src).unwrap();
    assert_eq!(counts.data(), 2);
    assert_eq!(pipeline.output(src, 0).unwrap().info.time_step, Some(2.0));

    // Snapped to 2.0 once; asking again for 1.5 reuses that result.
    pipeline.set_update_time_step(src, 0, 1.5).unwrap();
    pipeline.update(src).unwrap();
    pipeline.update(src).unwrap();
    assert_eq!(counts.data(), 3);
    assert_eq!(pipeline.output(src, 0).unwrap().info.time_step, Some(2.0));
}

#[test]
fn test_time_request_travels_upstream() {
    let mut pipeline = Pipeline::default();
    let (source, _, _) = SourceBuilder::poly()
        .time_steps(vec![10.0, 20.0, 30.0])
        .build();
    let (filter, _, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();

    pipeline.update_information(flt).unwrap();
    assert_eq!(pipeline.time_steps(flt, 0), Some(&[10.0, 20.0, 30.0][..]));
    assert_eq!(pipeline.time_range(flt, 0), Some([10.0, 30.0]));

    pipeline.set_update_time_step(flt, 0, 30.0).unwrap();
    pipeline.update(flt).unwrap();

    assert_eq!(pipeline.output(src, 0).unwrap().info.time_step, Some(30.0));
    assert_eq!(pipeline.output(flt, 0).unwrap().info.time_step, Some(30.0));
}

#[test]
fn test_time_propagates_without_executing() {
    let mut pipeline = Pipeline::default();
    let (source, source_counts, _) = SourceBuilder::poly()
        .time_steps(vec![0.0, 1.0, 2.0])
        .build();
    let (filter, filter_counts, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let flt = pipeline.add_algorithm(filter);
    pipeline.connect(src, 0, flt, 0).unwrap();

    pipeline.update_information(flt).unwrap();
    pipeline.set_update_time_step(flt, 0, 2.0).unwrap();
    pipeline.propagate_time(flt, 0).unwrap();
    pipeline.update_time_dependent_information(flt, 0).unwrap();

    let upstream = pipeline.output_information(src, 0).unwrap();
    assert_eq!(upstream.update_time_step, Some(2.0));
    assert_eq!(source_counts.data(), 0);
    assert_eq!(filter_counts.data(), 0);
}

#[test]
fn test_one_off_request_is_merged_before_update() {
    let mut pipeline = Pipeline::default();
    let (source, counts, _) = SourceBuilder::poly()
        .time_steps(vec![0.0, 1.0, 2.0])
        .build();
    let src = pipeline.add_algorithm(source);

    pipeline
        .update_with_request(src, 0, &UpdateRequest::time_step(1.0))
        .unwrap();

    assert_eq!(counts.data(), 1);
    assert_eq!(pipeline.output(src, 0).unwrap().info.time_step, Some(1.0));
    assert_eq!(
        pipeline.output_information(src, 0).unwrap().update_time_step,
        Some(1.0)
    );
}

#[test]
fn test_update_all_runs_shared_source_once() {
    let mut pipeline = Pipeline::default();
    let (source, source_counts, _) = SourceBuilder::poly().build();
    let (left, left_counts, _) = PassFilter::new();
    let (right, right_counts, _) = PassFilter::new();
    let src = pipeline.add_algorithm(source);
    let l = pipeline.add_algorithm(left);
    let r = pipeline.add_algorithm(right);
    pipeline.connect(src, 0, l, 0).unwrap();
    pipeline.connect(src, 0, r, 0).unwrap();

    pipeline.update_all().unwrap();

    assert_eq!(source_counts.data(), 1);
    assert_eq!(left_counts.data(), 1);
    assert_eq!(right_counts.data(), 1);
}

#[test]
fn test_unconnected_required_input_fails() {
    let mut pipeline = Pipeline::default();
    let (filter, counts, _) = PassFilter::new();
    let flt = pipeline.add_algorithm(filter);

    let err = pipeline.update(flt).unwrap_err();

    assert!(matches!(
        err.root_cause(),
        PipelineError::MissingInput { port: 0, .. }
    ));
    assert_eq!(counts.data(), 0);
}
