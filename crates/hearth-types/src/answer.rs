use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Text shown to the owner and the matching text sent to speech synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub speech: String,
}

impl Answer {
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            speech: text.clone(),
            text,
        }
    }

    pub fn with_speech(text: impl Into<String>, speech: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speech: speech.into(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An entry of the answer queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAnswer {
    /// Message id, the target of later in-place replacements
    pub id: String,
    pub answer: Answer,
    pub end_of_turn: bool,
    /// Set by the router when the producing action allows rewriting
    pub paraphrasable: bool,
    pub widget: Option<Value>,
}

impl QueuedAnswer {
    pub fn new(answer: Answer, end_of_turn: bool) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4()),
            answer,
            end_of_turn,
            paraphrasable: false,
            widget: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn paraphrasable(mut self, paraphrasable: bool) -> Self {
        self.paraphrasable = paraphrasable;
        self
    }

    pub fn with_widget(mut self, widget: Option<Value>) -> Self {
        self.widget = widget;
        self
    }
}

/// Events emitted to the transport collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeliveryEvent {
    TypingStarted,
    TypingStopped,
    Answer {
        id: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        widget: Option<Value>,
        /// Id of a previously delivered message to update in place
        #[serde(skip_serializing_if = "Option::is_none")]
        replace: Option<String>,
    },
    Suggestions {
        items: Vec<String>,
    },
    Interruption,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(Answer::text("  The list   is empty ").word_count(), 4);
        assert!(Answer::text("   ").is_empty());
    }

    #[test]
    fn test_delivery_event_tag() {
        let event = DeliveryEvent::Answer {
            id: "msg-1".into(),
            text: "Done".into(),
            widget: None,
            replace: Some("msg-0".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "answer");
        assert_eq!(json["replace"], "msg-0");
        assert!(json.get("widget").is_none());
    }
}
