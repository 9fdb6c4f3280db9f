//! Detectors: generators that watch the event stream and emit synthetic
//! events when a condition fires.

use core::fmt;
use std::sync::Arc;

use gamelens_types::Event;
use tracing::debug;

use crate::generator::{
    Generator, GeneratorArgs, GeneratorCore, GeneratorDescriptor, GeneratorParameters,
};

/// Receives every event a detector emits.
pub type TriggerCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// Game-specific detection logic.
pub trait DetectorLogic: Send {
    /// React to an event that already passed version and name gating.
    fn update(&mut self, event: &Event);

    /// Whether an event should be emitted now.
    fn trigger_condition(&self) -> bool;

    /// Build the event to emit and reset whatever made the condition fire.
    fn trigger_event(&mut self, triggering_event: &Event) -> Event;
}

/// A [`DetectorLogic`] bound to its instance parameters and callback.
pub struct Detector {
    core: GeneratorCore,
    logic: Box<dyn DetectorLogic>,
    callback: TriggerCallback,
    triggered: u64,
}

impl Detector {
    /// Wrap freshly constructed detection logic.
    pub fn new(
        params: GeneratorParameters,
        descriptor: Arc<GeneratorDescriptor>,
        args: GeneratorArgs,
        logic: Box<dyn DetectorLogic>,
        callback: TriggerCallback,
    ) -> Self {
        Self {
            core: GeneratorCore::new(params, descriptor, args),
            logic,
            callback,
            triggered: 0,
        }
    }

    /// Record the configured name this instance was expanded from
    /// (builder style).
    #[must_use]
    pub fn with_base_name(mut self, base_name: &str) -> Self {
        self.core.set_base_name(base_name);
        self
    }

    /// How many events this detector has emitted.
    pub const fn triggered(&self) -> u64 {
        self.triggered
    }
}

impl Generator for Detector {
    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn update_from_event(&mut self, event: &Event) {
        if !self.core.validate_event(event) {
            return;
        }
        self.logic.update(event);
        if self.logic.trigger_condition() {
            let generated = self.logic.trigger_event(event);
            debug!(
                detector = %self.core.params().name(),
                generated = %generated.event_name,
                trigger = %event.event_name,
                "detector fired"
            );
            self.triggered = self.triggered.saturating_add(1);
            (self.callback)(generated);
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name(), self.description())
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("name", &self.name())
            .field("type_name", &self.type_name())
            .field("triggered", &self.triggered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use gamelens_types::{EventData, EventSource, ExtractionMode};
    use parking_lot::Mutex;

    use super::*;
    use crate::error::GeneratorError;

    /// Fires on every second `fail` event.
    struct TwoFails {
        fails: u32,
    }

    impl DetectorLogic for TwoFails {
        fn update(&mut self, _event: &Event) {
            self.fails = self.fails.saturating_add(1);
        }

        fn trigger_condition(&self) -> bool {
            self.fails >= 2
        }

        fn trigger_event(&mut self, triggering_event: &Event) -> Event {
            self.fails = 0;
            Event::generated_from(triggering_event, "struggling", EventData::new())
        }
    }

    fn fails_only(_: &GeneratorArgs, _: ExtractionMode) -> Vec<String> {
        vec!["fail".to_owned()]
    }

    fn build(
        _: &GeneratorParameters,
        _: &GeneratorArgs,
    ) -> Result<Box<dyn DetectorLogic>, GeneratorError> {
        Ok(Box::new(TwoFails { fails: 0 }))
    }

    fn make_event(name: &str) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Event::new(name, ts, "s1").with_log_version("1").with_user("u1")
    }

    #[test]
    fn fires_through_callback_when_condition_holds() {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let mut detector = Detector::new(
            GeneratorParameters::new("Struggle", "two fails", ExtractionMode::Detector, None),
            Arc::new(GeneratorDescriptor::detector("TwoFails", fails_only, build)),
            GeneratorArgs::new(),
            Box::new(TwoFails { fails: 0 }),
            Arc::new(move |event: Event| sink.lock().push(event)),
        );

        for name in ["fail", "jump", "fail", "fail"] {
            detector.update_from_event(&make_event(name));
        }

        let emitted = emitted.lock();
        assert_eq!(emitted.len(), 1);
        let event = emitted.first().unwrap();
        assert_eq!(event.event_name, "struggling");
        assert_eq!(event.event_source, EventSource::Generated);
        assert_eq!(event.user_id.as_deref(), Some("u1"));
        assert_eq!(detector.triggered(), 1);
    }
}
