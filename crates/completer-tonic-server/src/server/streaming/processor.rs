use super::script::ResponseScript;
use completer_tonic_core::proto::Completion;
use uuid::Uuid;

/// Labels attached to the `model` field of emitted events.
///
/// The values are opaque to the service; they only let a host tell partial
/// chunks from the aggregate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLabels {
    pub delta: String,
    pub message: String,
}

/// Fresh identifier for a single event.
fn next_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds the delta event for one word of the script.
pub fn delta_event(word: &str, labels: &ModelLabels) -> Completion {
    Completion::delta(next_event_id(), &labels.delta, ResponseScript::delta_text(word))
}

/// Builds the terminal event carrying the whole script text.
pub fn message_event(script: &ResponseScript, labels: &ModelLabels) -> Completion {
    Completion::message(next_event_id(), &labels.message, script.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use completer_tonic_core::types::ROLE_ASSISTANT;

    fn labels() -> ModelLabels {
        ModelLabels {
            delta: "test".into(),
            message: "human".into(),
        }
    }

    #[test]
    fn delta_event_carries_word_and_label() {
        let event = delta_event("Please", &labels());

        assert_eq!(event.model, "test");
        assert!(event.message.is_none());
        let delta = event.delta.as_ref().unwrap();
        assert_eq!(delta.role, ROLE_ASSISTANT);
        assert_eq!(delta.content.len(), 1);
        assert_eq!(delta.content[0].text.as_deref(), Some("Please "));
        assert!(Uuid::parse_str(&event.id).is_ok());
    }

    #[test]
    fn message_event_carries_full_text() {
        let script = ResponseScript::new("a  b").unwrap();
        let event = message_event(&script, &labels());

        assert_eq!(event.model, "human");
        assert!(event.delta.is_none());
        assert_eq!(event.text(), "a  b");
        assert_eq!(event.message.as_ref().unwrap().role, ROLE_ASSISTANT);
    }

    #[test]
    fn every_event_gets_a_new_id() {
        let a = delta_event("x", &labels());
        let b = delta_event("x", &labels());
        assert_ne!(a.id, b.id);
    }
}
