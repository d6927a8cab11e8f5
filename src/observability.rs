use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("folio.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("folio.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("folio.client.request_duration_seconds");

pub(crate) static ENGINE_SUBMISSIONS: Counter = Counter::new("folio.engine.submissions");
pub(crate) static ENGINE_REJECTED: Counter = Counter::new("folio.engine.rejected_submissions");
pub(crate) static ENGINE_FAILURES: Counter = Counter::new("folio.engine.failures");
pub(crate) static ENGINE_INJECTED: Counter = Counter::new("folio.engine.injected_questions");
pub(crate) static ENGINE_TURN_DURATION: Moments =
    Moments::new("folio.engine.turn_duration_seconds");

pub(crate) static REVEAL_TICKS: Counter = Counter::new("folio.reveal.ticks");
pub(crate) static REVEALS_CANCELLED: Counter = Counter::new("folio.reveal.cancelled");
pub(crate) static REVEAL_DURATION: Moments = Moments::new("folio.reveal.duration_seconds");

pub(crate) static BUS_PUBLISHES: Counter = Counter::new("folio.bus.publishes");
pub(crate) static BUS_DELIVERIES: Counter = Counter::new("folio.bus.deliveries");
pub(crate) static BUS_DROPPED: Counter = Counter::new("folio.bus.dropped");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&ENGINE_SUBMISSIONS);
    collector.register_counter(&ENGINE_REJECTED);
    collector.register_counter(&ENGINE_FAILURES);
    collector.register_counter(&ENGINE_INJECTED);
    collector.register_moments(&ENGINE_TURN_DURATION);

    collector.register_counter(&REVEAL_TICKS);
    collector.register_counter(&REVEALS_CANCELLED);
    collector.register_moments(&REVEAL_DURATION);

    collector.register_counter(&BUS_PUBLISHES);
    collector.register_counter(&BUS_DELIVERIES);
    collector.register_counter(&BUS_DROPPED);
}
