//! Mapping between dot-separated bus subjects and MQTT topics.
//!
//! Subject segments become topic levels. The single-segment wildcard `*`
//! becomes `+` and the trailing multi-segment wildcard `>` becomes `#`.

/// Convert a subject (or subject pattern) into an MQTT topic filter.
#[must_use]
pub fn subject_to_topic(subject: &str) -> String {
    subject
        .split('.')
        .map(|segment| match segment {
            "*" => "+",
            ">" => "#",
            other => other,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert a concrete MQTT topic back into a subject.
#[must_use]
pub fn topic_to_subject(topic: &str) -> String {
    topic.replace('/', ".")
}
