//! Input gate: whether the user may submit or edit right now.

use crate::state::{Composition, DispatchState};

/// Submission is allowed only when idle and there is something to send.
pub fn can_submit(dispatch: DispatchState, composition: &Composition) -> bool {
    dispatch == DispatchState::Idle && !composition.is_empty()
}

/// Text entry and attaching are locked while a request is outstanding.
pub fn can_edit(dispatch: DispatchState) -> bool {
    dispatch == DispatchState::Idle
}
