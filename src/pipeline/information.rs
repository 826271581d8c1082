//! Per-port pipeline information.
//!
//! [`Information`] is the explicit schema for everything the protocol passes
//! between an executive and its algorithm on one port: metadata published
//! during the information phase (whole extent, time steps), the consumer's
//! update request (update extent, piece, time) and the data object itself.
//!
//! Output information is owned by the producing node. Input information seen
//! by an algorithm is a copy of the upstream output information; request
//! fields written into it are pushed back upstream by the executive.

use crate::data::{DataObject, Extent};
use std::sync::Arc;

/// The downstream-owned part of an output's information. `None` fields are
/// left untouched when merged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRequest {
    pub extent: Option<Extent>,
    pub piece: Option<usize>,
    pub number_of_pieces: Option<usize>,
    pub ghost_levels: Option<usize>,
    pub time_step: Option<f64>,
    pub exact_extent: Option<bool>,
    /// Replace the producer's pending extent instead of combining with it.
    pub replace_extent: bool,
}

impl UpdateRequest {
    pub fn time_step(t: f64) -> Self {
        Self {
            time_step: Some(t),
            ..Self::default()
        }
    }

    pub fn extent(extent: Extent) -> Self {
        Self {
            extent: Some(extent),
            ..Self::default()
        }
    }

    pub fn piece(piece: usize, number_of_pieces: usize, ghost_levels: usize) -> Self {
        Self {
            piece: Some(piece),
            number_of_pieces: Some(number_of_pieces),
            ghost_levels: Some(ghost_levels),
            ..Self::default()
        }
    }
}

/// Piece partition resolved from an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceRequest {
    pub piece: usize,
    pub number_of_pieces: usize,
    pub ghost_levels: usize,
}

impl Default for PieceRequest {
    fn default() -> Self {
        Self {
            piece: 0,
            number_of_pieces: 1,
            ghost_levels: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Information {
    // Producer-owned metadata.
    pub whole_extent: Option<Extent>,
    pub time_steps: Option<Vec<f64>>,
    pub time_range: Option<[f64; 2]>,
    pub time_dependent_information: bool,
    pub can_handle_piece_request: bool,
    pub can_produce_sub_extent: bool,

    // Consumer-owned request.
    pub update_extent: Option<Extent>,
    /// Set once a consumer explicitly requested an extent or piece. Until then
    /// the request is recomputed from the whole extent on every propagation.
    pub update_extent_initialized: bool,
    pub update_piece: Option<usize>,
    pub update_number_of_pieces: Option<usize>,
    pub update_ghost_levels: Option<usize>,
    pub update_time_step: Option<f64>,
    pub exact_extent: bool,
    /// The update extent replaces, rather than joins, the combined extent.
    pub replace_update_extent: bool,

    // Executive bookkeeping.
    pub previous_update_time_step: Option<f64>,
    /// Union of the extents requested since a request was last satisfied
    /// without executing.
    pub combined_update_extent: Option<Extent>,

    pub data_object: Option<Arc<DataObject>>,
}

impl Information {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_object(&self) -> Option<&DataObject> {
        self.data_object.as_deref()
    }

    /// Mutable access to the data object, cloning it first if it is shared.
    pub fn data_object_mut(&mut self) -> Option<&mut DataObject> {
        self.data_object.as_mut().map(Arc::make_mut)
    }

    pub fn set_data_object(&mut self, data: DataObject) {
        self.data_object = Some(Arc::new(data));
    }

    pub fn has_time(&self) -> bool {
        self.time_range.is_some()
    }

    /// Publish time steps and derive the range from the first and last entry.
    pub fn set_time_steps(&mut self, steps: Vec<f64>) {
        self.time_range = match (steps.first(), steps.last()) {
            (Some(first), Some(last)) => Some([*first, *last]),
            _ => None,
        };
        self.time_steps = Some(steps);
    }

    pub fn set_update_extent(&mut self, extent: Extent) {
        self.update_extent = Some(extent);
        self.update_extent_initialized = true;
        self.replace_update_extent = false;
    }

    /// Request `extent` without combining it with other consumers' requests.
    pub fn replace_update_extent_with(&mut self, extent: Extent) {
        self.set_update_extent(extent);
        self.replace_update_extent = true;
    }

    /// Join the update extent into the combined extent and request the result.
    /// Empty requests are left alone.
    pub fn combine_update_extent(&mut self) {
        let Some(update) = self.update_extent.filter(|e| !e.is_empty()) else {
            return;
        };
        let combined = self
            .combined_update_extent
            .map_or(update, |combined| combined.union(&update));
        self.combined_update_extent = Some(combined);
        self.update_extent = Some(combined);
    }

    pub fn set_update_piece(&mut self, piece: usize, number_of_pieces: usize, ghost_levels: usize) {
        self.update_piece = Some(piece);
        self.update_number_of_pieces = Some(number_of_pieces);
        self.update_ghost_levels = Some(ghost_levels);
        self.update_extent_initialized = true;
    }

    /// Request the whole extent as piece 0 of 1.
    pub fn set_update_extent_to_whole(&mut self, ghost_levels: usize) {
        self.update_extent = self.whole_extent;
        self.update_piece = Some(0);
        self.update_number_of_pieces = Some(1);
        self.update_ghost_levels = Some(ghost_levels);
    }

    pub fn piece_request(&self) -> PieceRequest {
        PieceRequest {
            piece: self.update_piece.unwrap_or(0),
            number_of_pieces: self.update_number_of_pieces.unwrap_or(1).max(1),
            ghost_levels: self.update_ghost_levels.unwrap_or(0),
        }
    }

    pub fn update_request(&self) -> UpdateRequest {
        UpdateRequest {
            extent: self.update_extent,
            piece: self.update_piece,
            number_of_pieces: self.update_number_of_pieces,
            ghost_levels: self.update_ghost_levels,
            time_step: self.update_time_step,
            exact_extent: Some(self.exact_extent),
            replace_extent: self.replace_update_extent,
        }
    }

    /// Overwrite the request fields that `request` sets.
    pub fn merge_update_request(&mut self, request: &UpdateRequest) {
        if let Some(extent) = request.extent {
            if request.replace_extent {
                self.replace_update_extent_with(extent);
            } else {
                self.set_update_extent(extent);
            }
        }
        if let Some(piece) = request.piece {
            self.update_piece = Some(piece);
            self.update_extent_initialized = true;
        }
        if let Some(n) = request.number_of_pieces {
            self.update_number_of_pieces = Some(n);
        }
        if let Some(ghost) = request.ghost_levels {
            self.update_ghost_levels = Some(ghost);
        }
        if let Some(t) = request.time_step {
            self.update_time_step = Some(t);
        }
        if let Some(exact) = request.exact_extent {
            self.exact_extent = exact;
        }
    }

    /// Default information pass: inherit input metadata.
    pub fn copy_metadata_from(&mut self, input: &Information) {
        self.whole_extent = input.whole_extent;
        self.time_steps = input.time_steps.clone();
        self.time_range = input.time_range;
        self.time_dependent_information = input.time_dependent_information;
    }

    /// Default update-extent pass: forward the consumer's piece and time
    /// request upstream. Extents are handled by the executive since they only
    /// carry over between structured ports. The exact-extent flag belongs to
    /// each consumer and is not copied.
    pub fn copy_request_from(&mut self, output: &Information) {
        self.update_piece = output.update_piece;
        self.update_number_of_pieces = output.update_number_of_pieces;
        self.update_ghost_levels = output.update_ghost_levels;
        if output.update_time_step.is_some() {
            self.update_time_step = output.update_time_step;
        }
    }

    /// Drop all producer metadata before a fresh information pass.
    pub fn reset_pipeline_information(&mut self) {
        self.whole_extent = None;
        self.time_steps = None;
        self.time_range = None;
        self.time_dependent_information = false;
        self.can_handle_piece_request = false;
        self.can_produce_sub_extent = false;
        self.previous_update_time_step = None;
        self.combined_update_extent = None;
    }
}

/// First connection's information on input `port`.
pub fn input_information(inputs: &[Vec<Information>], port: usize) -> Option<&Information> {
    inputs.get(port)?.first()
}

/// First connection's data object on input `port`.
pub fn input_data(inputs: &[Vec<Information>], port: usize) -> Option<&DataObject> {
    input_information(inputs, port)?.data_object()
}
