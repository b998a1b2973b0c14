//! Debug leaf action: logs the event and always succeeds.

pub(crate) fn run(event: &crate::event::EventRecord) {
    let value = event.to_value();
    tracing::info!(
        event.id = %event.id(),
        event.provider = %event.provider(),
        event = %serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        "debug: Event matched"
    );
}
