use crate::{Effect, Msg, RunPhase, RunState};

/// Pure update function: applies a message to the paging state and returns
/// the effects the orchestrator must perform next.
///
/// Messages that do not fit the current phase, or that answer a page other
/// than the outstanding one, are ignored.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    let effects = match msg {
        Msg::Sized { total } => {
            if state.phase() != RunPhase::Sizing {
                return (state, Vec::new());
            }
            match state.start_paging(total) {
                Some(page) => vec![Effect::FetchPage(page)],
                None => vec![Effect::Finish(state.stats())],
            }
        }
        Msg::PageReceived {
            page,
            received,
            skipped,
        } => {
            if state.phase() != RunPhase::Paging || state.in_flight() != Some(page) {
                return (state, Vec::new());
            }
            match state.record_page(page, received, skipped) {
                Some(next) => vec![Effect::FetchPage(next)],
                None => vec![Effect::Finish(state.stats())],
            }
        }
        Msg::PageFailed { page } => {
            if state.phase() != RunPhase::Paging || state.in_flight() != Some(page) {
                return (state, Vec::new());
            }
            state.abort();
            vec![Effect::Abort {
                offset: page.offset,
            }]
        }
    };

    (state, effects)
}
