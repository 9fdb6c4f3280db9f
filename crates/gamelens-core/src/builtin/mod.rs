//! Generator kinds every game can use without registering them.
//!
//! A game's [`GeneratorTable`] only needs its own kinds; the loader falls
//! back to [`table`] for anything it does not define.
//!
//! | Type | Kind | Output |
//! |------|------|--------|
//! | [`CountEvent`](count_event) | feature | occurrences of one event |
//! | [`Timespan`](timespan) | feature | seconds from first start to last end |
//! | [`StopwatchTimer`](stopwatch) | feature | time spent between start and end events |
//! | [`EventRatio`](event_ratio) | second-order feature | ratio of two features |
//! | [`IdleGap`](idle_gap) | detector | emits an event after a long pause |

use std::sync::LazyLock;

use tracing::error;

use crate::loader::GeneratorTable;

pub mod count_event;
pub mod event_ratio;
pub mod idle_gap;
pub mod stopwatch;
pub mod timespan;

/// Game id of the built-in table.
pub const BUILTIN_GAME_ID: &str = "BUILTIN";

static BUILTINS: LazyLock<GeneratorTable> = LazyLock::new(|| {
    let mut table = GeneratorTable::new(BUILTIN_GAME_ID);
    for descriptor in [
        count_event::descriptor(),
        timespan::descriptor(),
        stopwatch::descriptor(),
        event_ratio::descriptor(),
        idle_gap::descriptor(),
    ] {
        if let Err(err) = table.register(descriptor) {
            error!(%err, "inconsistent built-in generator table");
        }
    }
    table
});

/// The shared built-in table, built on first use.
pub fn table() -> &'static GeneratorTable {
    &BUILTINS
}
