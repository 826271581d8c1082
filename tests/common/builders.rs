//! Test algorithms and builders for assembling pipelines

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use streamexec::data::{DataObject, DataType, Extent};
use streamexec::pipeline::time::resolve_time_index;
use streamexec::pipeline::{
    input_data, Algorithm, AlgorithmBase, Information, PipelineError, PipelineResult, PortLayout,
    Request,
};
use streamexec::reader::{reuse_or_create, ReaderAlgorithm, SimpleFileReader};

/// Shared invocation counters, readable after the algorithm moved into a pipeline.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub information: Arc<AtomicUsize>,
    pub update_extent: Arc<AtomicUsize>,
    pub data: Arc<AtomicUsize>,
}

impl Counters {
    pub fn information(&self) -> usize {
        self.information.load(Ordering::SeqCst)
    }

    pub fn update_extent(&self) -> usize {
        self.update_extent.load(Ordering::SeqCst)
    }

    pub fn data(&self) -> usize {
        self.data.load(Ordering::SeqCst)
    }
}

/// Source producing one point (poly data) or a constant image over the
/// requested extent.
pub struct TestSource {
    base: AlgorithmBase,
    whole_extent: Option<Extent>,
    time_steps: Option<Vec<f64>>,
    sub_extent: bool,
    whole_only: bool,
    continue_passes: usize,
    fail_on_pass: Option<usize>,
    fail_at_time: Option<f64>,
    value: f64,
    fail: Arc<AtomicBool>,
    counters: Counters,
}

impl TestSource {
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.base.modified();
    }

    pub fn set_continue_passes(&mut self, passes: usize) {
        self.continue_passes = passes;
        self.base.modified();
    }
}

impl Algorithm for TestSource {
    fn class_name(&self) -> &str {
        "TestSource"
    }

    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn request_information(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.counters.information.fetch_add(1, Ordering::SeqCst);
        let out = &mut outputs[0];
        out.whole_extent = self.whole_extent;
        out.can_produce_sub_extent = self.sub_extent;
        if let Some(steps) = &self.time_steps {
            out.set_time_steps(steps.clone());
        }
        Ok(())
    }

    fn request_update_extent(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.counters.update_extent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_data(
        &mut self,
        request: &mut Request,
        _inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.counters.data.fetch_add(1, Ordering::SeqCst);
        let out = &mut outputs[0];
        let time = self.time_steps.as_ref().and_then(|steps| {
            steps
                .get(resolve_time_index(steps, out.update_time_step))
                .copied()
        });

        let armed = self.fail.load(Ordering::SeqCst)
            && self.fail_on_pass.map_or(true, |pass| pass == request.pass)
            && self.fail_at_time.map_or(true, |t| time == Some(t));
        if armed {
            return Err(PipelineError::Algorithm("injected failure".to_string()));
        }

        // Passes that continue leave a -1.0 marker instead of the value.
        let continuing = request.pass < self.continue_passes;
        let extent = if self.whole_only {
            self.whole_extent
        } else {
            out.update_extent.or(self.whole_extent)
        };
        let value = if continuing { -1.0 } else { self.value };
        let data = out
            .data_object_mut()
            .ok_or_else(|| PipelineError::Algorithm("no output object".to_string()))?;
        data.info.time_step = time;
        if let Some(poly) = data.as_poly_data_mut() {
            poly.points = vec![[value, 0.0, 0.0]];
            poly.point_data.insert("value", vec![value]);
        } else if let (Some(image), Some(extent)) = (data.as_image_data_mut(), extent) {
            image.allocate_scalars("value", extent).fill(value);
        }

        request.continue_executing = continuing;
        Ok(())
    }
}

/// Builder for [`TestSource`]
pub struct SourceBuilder {
    data_type: DataType,
    whole_extent: Option<Extent>,
    time_steps: Option<Vec<f64>>,
    sub_extent: bool,
    whole_only: bool,
    continue_passes: usize,
    fail_on_pass: Option<usize>,
    fail_at_time: Option<f64>,
    value: f64,
}

impl SourceBuilder {
    pub fn poly() -> Self {
        Self {
            data_type: DataType::PolyData,
            whole_extent: None,
            time_steps: None,
            sub_extent: false,
            whole_only: false,
            continue_passes: 0,
            fail_on_pass: None,
            fail_at_time: None,
            value: 1.0,
        }
    }

    pub fn image(whole_extent: Extent) -> Self {
        Self {
            data_type: DataType::ImageData,
            whole_extent: Some(whole_extent),
            ..Self::poly()
        }
    }

    pub fn time_steps(mut self, steps: Vec<f64>) -> Self {
        self.time_steps = Some(steps);
        self
    }

    /// Advertise that any sub-extent can be produced.
    pub fn sub_extent(mut self) -> Self {
        self.sub_extent = true;
        self
    }

    /// Always produce the whole extent, whatever was requested.
    pub fn whole_only(mut self) -> Self {
        self.whole_only = true;
        self
    }

    /// Ask to continue executing this many times before finishing.
    pub fn continue_passes(mut self, passes: usize) -> Self {
        self.continue_passes = passes;
        self
    }

    /// Limit the failure switch to one continue-executing pass.
    pub fn fail_on_pass(mut self, pass: usize) -> Self {
        self.fail_on_pass = Some(pass);
        self
    }

    /// Limit the failure switch to requests resolving to time `t`.
    pub fn fail_at_time(mut self, t: f64) -> Self {
        self.fail_at_time = Some(t);
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Returns the source plus its counters and failure switch.
    pub fn build(self) -> (TestSource, Counters, Arc<AtomicBool>) {
        let counters = Counters::default();
        let fail = Arc::new(AtomicBool::new(false));
        let source = TestSource {
            base: AlgorithmBase::new(PortLayout::source(self.data_type)),
            whole_extent: self.whole_extent,
            time_steps: self.time_steps,
            sub_extent: self.sub_extent,
            whole_only: self.whole_only,
            continue_passes: self.continue_passes,
            fail_on_pass: self.fail_on_pass,
            fail_at_time: self.fail_at_time,
            value: self.value,
            fail: fail.clone(),
            counters: counters.clone(),
        };
        (source, counters, fail)
    }
}

/// Filter that copies its input through, counting executions.
pub struct PassFilter {
    base: AlgorithmBase,
    fail: Arc<AtomicBool>,
    counters: Counters,
}

impl PassFilter {
    pub fn new() -> (Self, Counters, Arc<AtomicBool>) {
        let counters = Counters::default();
        let fail = Arc::new(AtomicBool::new(false));
        let filter = Self {
            base: AlgorithmBase::new(PortLayout::pass_input_type()),
            fail: fail.clone(),
            counters: counters.clone(),
        };
        (filter, counters, fail)
    }
}

impl Algorithm for PassFilter {
    fn class_name(&self) -> &str {
        "PassFilter"
    }

    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn request_information(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.counters.information.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_update_extent(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.counters.update_extent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.counters.data.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::Algorithm("injected failure".to_string()));
        }
        let input = input_data(inputs, 0)
            .ok_or_else(|| PipelineError::Algorithm("no input".to_string()))?
            .clone();
        outputs[0].data_object = Some(Arc::new(input));
        Ok(())
    }
}

/// Reader that records the order of its calls and can fail one of them.
pub struct RecordingReader {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub fail_on: Option<&'static str>,
}

impl RecordingReader {
    pub fn new(fail_on: Option<&'static str>) -> (Self, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                calls: calls.clone(),
                fail_on,
            },
            calls,
        )
    }

    fn record(&self, call: &'static str) -> PipelineResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(call) {
            return Err(PipelineError::Parse(format!("{} failed", call)));
        }
        Ok(())
    }
}

impl ReaderAlgorithm for RecordingReader {
    fn class_name(&self) -> &str {
        "RecordingReader"
    }

    fn create_output(&mut self, current: Option<Arc<DataObject>>) -> PipelineResult<Arc<DataObject>> {
        reuse_or_create(current, DataType::PolyData)
    }

    fn read_meta_data(&mut self, _info: &mut Information) -> PipelineResult<()> {
        self.record("read_meta_data")
    }

    fn read_mesh(
        &mut self,
        _piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        _time_index: usize,
        _output: &mut DataObject,
    ) -> PipelineResult<()> {
        self.record("read_mesh")
    }

    fn read_points(
        &mut self,
        _piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        _time_index: usize,
        _output: &mut DataObject,
    ) -> PipelineResult<()> {
        self.record("read_points")
    }

    fn read_arrays(
        &mut self,
        _piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        _time_index: usize,
        _output: &mut DataObject,
    ) -> PipelineResult<()> {
        self.record("read_arrays")
    }
}

/// File hooks for an in-memory series: file `i` holds one point tagged
/// with payload `i` at time `times[i]`. Metadata and mesh reads are logged
/// as `"meta i"` and `"mesh i"`.
pub struct SeriesStub {
    files: Vec<PathBuf>,
    times: Vec<f64>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl SeriesStub {
    /// Returns the hooks and the file names they answer for.
    pub fn new(times: Vec<f64>) -> (Self, Vec<PathBuf>) {
        let files: Vec<PathBuf> = (0..times.len())
            .map(|i| PathBuf::from(format!("series_{}.pts", i)))
            .collect();
        (
            Self {
                files: files.clone(),
                times,
                calls: Arc::new(Mutex::new(Vec::new())),
            },
            files,
        )
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    fn log(&self, call: &str, index: usize) {
        self.calls.lock().unwrap().push(format!("{} {}", call, index));
    }

    fn index_of(&self, file: &Path) -> PipelineResult<usize> {
        self.files
            .iter()
            .position(|f| f == file)
            .ok_or_else(|| PipelineError::Parse(format!("unknown file {:?}", file)))
    }
}

impl SimpleFileReader for SeriesStub {
    fn class_name(&self) -> &'static str {
        "SeriesStub"
    }

    fn output_type(&self) -> DataType {
        DataType::PolyData
    }

    fn time_value(&mut self, file: &Path) -> f64 {
        self.index_of(file)
            .ok()
            .and_then(|i| self.times.get(i).copied())
            .unwrap_or(f64::NAN)
    }

    fn read_meta_data(&mut self, file: &Path, _info: &mut Information) -> PipelineResult<()> {
        let index = self.index_of(file)?;
        self.log("meta", index);
        Ok(())
    }

    fn read_mesh(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()> {
        let index = self.index_of(file)?;
        self.log("mesh", index);
        if let Some(poly) = output.as_poly_data_mut() {
            poly.points = vec![[index as f64, 0.0, 0.0]];
        }
        Ok(())
    }

    fn read_points(&mut self, _file: &Path, _output: &mut DataObject) -> PipelineResult<()> {
        Ok(())
    }

    fn read_arrays(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()> {
        let index = self.index_of(file)?;
        if let Some(poly) = output.as_poly_data_mut() {
            poly.point_data.insert("payload", vec![index as f64]);
        }
        Ok(())
    }
}
