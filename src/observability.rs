use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("tutorchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("tutorchat.client.request_errors");
pub(crate) static CLIENT_IMAGE_PARTS: Counter = Counter::new("tutorchat.client.image_parts");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("tutorchat.client.request_duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("tutorchat.session.turns");
pub(crate) static SESSION_RESETS: Counter = Counter::new("tutorchat.session.resets");

pub(crate) static DISPATCH_COMPLETED: Counter = Counter::new("tutorchat.dispatch.completed");
pub(crate) static DISPATCH_FAILED: Counter = Counter::new("tutorchat.dispatch.failed");
pub(crate) static DISPATCH_REFUSED: Counter = Counter::new("tutorchat.dispatch.refused");

pub(crate) static INPUT_DECODE_ERRORS: Counter = Counter::new("tutorchat.input.decode_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_IMAGE_PARTS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_RESETS);

    collector.register_counter(&DISPATCH_COMPLETED);
    collector.register_counter(&DISPATCH_FAILED);
    collector.register_counter(&DISPATCH_REFUSED);

    collector.register_counter(&INPUT_DECODE_ERRORS);
}
