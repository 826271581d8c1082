//! TemporalAccumulator: collect a global value over every input time step.
//!
//! One `Update` walks all time steps of the input: each `REQUEST_DATA` pass
//! folds in the data for the current step, points the input request at the
//! next step and asks to continue executing. The iteration itself lives in
//! [`MultiPassState`].

use crate::data::{DataObject, DataType};
use crate::pipeline::{
    input_data, input_information, Algorithm, AlgorithmBase, Information, InputPortInfo,
    OutputPortInfo, PipelineError, PipelineResult, PortLayout, Request,
};

/// Iteration over a list of time steps, one step per pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiPassState {
    steps: Vec<f64>,
    next: usize,
    running: bool,
}

impl MultiPassState {
    /// Begin a new iteration. An empty list still runs one pass.
    pub fn start(steps: Vec<f64>) -> Self {
        Self {
            steps,
            next: 0,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_more_work(&self) -> bool {
        self.running && self.next < self.steps.len().max(1)
    }

    /// Time the current pass should consume; `None` without time steps.
    pub fn current_time(&self) -> Option<f64> {
        self.steps.get(self.next).copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.steps.last().copied()
    }

    /// Move to the next step. Returns the new current time, if any.
    pub fn advance(&mut self) -> PipelineResult<Option<f64>> {
        if !self.has_more_work() {
            return Err(PipelineError::Algorithm(
                "advance called on a finished iteration".to_string(),
            ));
        }
        self.next += 1;
        Ok(self.current_time())
    }

    pub fn finish(&mut self) {
        self.running = false;
    }

    pub fn completed_steps(&self) -> usize {
        self.next
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len().max(1)
    }
}

/// Mean of a point array per input time step, as a two-column table
/// (`time`, array name).
pub struct TemporalAccumulator {
    base: AlgorithmBase,
    array_name: String,
    state: MultiPassState,
    times: Vec<f64>,
    means: Vec<f64>,
}

impl TemporalAccumulator {
    pub fn new(array_name: impl Into<String>) -> Self {
        let ports = PortLayout::new(
            vec![InputPortInfo::required("input", DataType::DataSet)],
            vec![OutputPortInfo::new("table", DataType::Table)],
        );
        Self {
            base: AlgorithmBase::new(ports),
            array_name: array_name.into(),
            state: MultiPassState::default(),
            times: Vec::new(),
            means: Vec::new(),
        }
    }

    pub fn array_name(&self) -> &str {
        &self.array_name
    }

    pub fn state(&self) -> &MultiPassState {
        &self.state
    }

    fn mean_of(&self, data: &DataObject) -> PipelineResult<f64> {
        let values = data
            .point_data()
            .and_then(|fields| fields.get(&self.array_name))
            .ok_or_else(|| {
                PipelineError::Algorithm(format!("no point array '{}'", self.array_name))
            })?;
        if values.is_empty() {
            return Ok(0.0);
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn write_table(&self, outputs: &mut [Information]) -> PipelineResult<()> {
        let table = outputs
            .get_mut(0)
            .and_then(|out| out.data_object_mut())
            .and_then(|data| data.as_table_mut())
            .ok_or(PipelineError::MissingDataObject {
                algorithm: "TemporalAccumulator".to_string(),
                port: 0,
            })?;
        table.columns.insert("time", self.times.clone());
        table.columns.insert(self.array_name.clone(), self.means.clone());
        Ok(())
    }
}

impl Algorithm for TemporalAccumulator {
    fn class_name(&self) -> &str {
        "TemporalAccumulator"
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
        // The table spans all steps; it is not itself time dependent.
        for out in outputs.iter_mut() {
            out.time_steps = None;
            out.time_range = None;
            out.time_dependent_information = false;
            out.whole_extent = None;
        }
        Ok(())
    }

    fn request_update_extent(
        &mut self,
        _request: &mut Request,
        inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let first = input_information(inputs, 0)
            .and_then(|info| info.time_steps.as_ref())
            .and_then(|steps| steps.first().copied());
        let time = if self.state.is_running() {
            self.state.current_time()
        } else if self.state.completed_steps() > 0 {
            // Whatever upstream delivered last is still good for a no-op update.
            self.state.last_time()
        } else {
            first
        };
        if let Some(time) = time {
            for input in inputs.iter_mut().flatten() {
                input.update_time_step = Some(time);
            }
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        // A new execution always starts over, even if an earlier one failed
        // part way through.
        if request.pass == 0 || !self.state.is_running() {
            let steps = input_information(inputs, 0)
                .and_then(|info| info.time_steps.clone())
                .unwrap_or_default();
            tracing::debug!("TemporalAccumulator starting over {} time steps", steps.len());
            self.state = MultiPassState::start(steps);
            self.times.clear();
            self.means.clear();
        }
        if request.abort_requested() {
            self.state.finish();
            return Err(PipelineError::Aborted);
        }

        let data = input_data(inputs, 0).ok_or(PipelineError::MissingInput {
            algorithm: "TemporalAccumulator".to_string(),
            port: 0,
        })?;
        let expected = self.state.current_time();
        let delivered = data.info.time_step;
        let ready = match (expected, delivered) {
            (Some(e), Some(d)) => e == d,
            _ => true,
        };

        if ready {
            let mean = match self.mean_of(data) {
                Ok(mean) => mean,
                Err(e) => {
                    self.state.finish();
                    return Err(e);
                }
            };
            self.times.push(expected.or(delivered).unwrap_or(0.0));
            self.means.push(mean);
            self.state.advance()?;
            request.update_progress(
                self.state.completed_steps() as f64 / self.state.total_steps() as f64,
            );
        }

        if self.state.has_more_work() {
            if let Some(next) = self.state.current_time() {
                for input in inputs.iter_mut().flatten() {
                    input.update_time_step = Some(next);
                }
            }
            request.continue_executing = true;
            return Ok(());
        }

        self.state.finish();
        self.write_table(outputs)
    }
}
