//! Re-execution decisions.
//!
//! Pure functions over one output's [`Information`] and the node's
//! timestamps. The executive calls these before every data pass; keeping them
//! free of pipeline state makes the caching policy testable on its own.

use crate::data::{DataObject, ExtentType};
use crate::pipeline::information::Information;

/// Missing data or a modification newer than the last execution.
///
/// `newest_input` is the latest of the node's pipeline modification time and
/// the execution times of everything feeding it.
pub fn data_is_stale(info: &Information, data_time: u64, newest_input: u64) -> bool {
    info.data_object.is_none() || newest_input > data_time
}

/// Whether the delivered data fails to satisfy the current update request.
pub fn need_to_execute_data(info: &Information, data_time: u64, newest_input: u64) -> bool {
    if data_is_stale(info, data_time, newest_input) {
        return true;
    }
    let Some(data) = info.data_object() else {
        return true;
    };

    let requested = info.piece_request();
    let delivered = &data.info;
    if delivered.number_of_pieces != Some(requested.number_of_pieces) {
        return true;
    }
    if requested.number_of_pieces > 1 && delivered.ghost_levels < requested.ghost_levels {
        return true;
    }
    if requested.number_of_pieces != 1 && delivered.piece != Some(requested.piece) {
        return true;
    }

    if let Some(update) = info.update_extent {
        if data.extent_type() == ExtentType::Structured {
            match delivered.all_pieces_extent.or(delivered.extent) {
                None => return true,
                Some(extent) if !update.is_empty() && !extent.contains(&update) => return true,
                Some(_) => {}
            }
        }
    }

    need_to_execute_based_on_time(info, data)
}

/// Time part of the decision.
///
/// Outputs without a time range never re-execute for time. When the same time
/// was requested last time, the data is as good as it gets: the producer
/// already snapped that request to the step it could deliver. Otherwise the
/// delivered time must equal the requested one.
pub fn need_to_execute_based_on_time(info: &Information, data: &DataObject) -> bool {
    if info.time_range.is_none() {
        return false;
    }
    let Some(requested) = info.update_time_step else {
        return false;
    };
    let Some(delivered) = data.info.time_step else {
        return true;
    };
    if info.previous_update_time_step == Some(requested) {
        return false;
    }
    delivered != requested
}
