//! Conversation log
//!
//! A bounded sliding window of recent turns plus the data store skills
//! write to through `context_data`. Only what the state machine and the
//! skills need is kept; nothing is persisted.

use chrono::{DateTime, Utc};
use hearth_types::{Arguments, ConversationContext, Entity, Sentiment, Utterance};
use std::collections::VecDeque;
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

/// Number of turns kept in the window
pub const DEFAULT_MAX_TURNS: usize = 20;

// ============================================================================
// Turns
// ============================================================================

/// One owner utterance and what happened with it
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub utterance: String,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
    /// Arguments of every action run for this utterance
    pub action_arguments: Vec<Arguments>,
    /// Answers delivered while this turn was the latest
    pub answers: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn from_utterance(utterance: &Utterance) -> Self {
        Self {
            utterance: utterance.text.clone(),
            entities: utterance.entities.clone(),
            sentiment: utterance.sentiment.clone(),
            action_arguments: Vec::new(),
            answers: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Log
// ============================================================================

#[derive(Debug)]
pub struct ConversationLog {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
    data: Arguments,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: DEFAULT_MAX_TURNS,
            data: Arguments::new(),
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Open a new turn, dropping the oldest one when the window is full
    pub fn push_utterance(&mut self, utterance: &Utterance) {
        self.turns.push_back(ConversationTurn::from_utterance(utterance));
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// Attach the arguments of an executed action to the latest turn
    pub fn record_arguments(&mut self, arguments: Arguments) {
        if let Some(turn) = self.turns.back_mut() {
            turn.action_arguments.push(arguments);
        }
    }

    /// Attach a delivered answer to the latest turn
    pub fn record_answer(&mut self, text: impl Into<String>) {
        if let Some(turn) = self.turns.back_mut() {
            turn.answers.push(text.into());
        }
    }

    /// Merge skill-provided data, later values win
    pub fn merge_data(&mut self, data: Arguments) {
        debug!("Merging {} context data key(s)", data.len());
        self.data.extend(data);
    }

    pub fn data(&self) -> &Arguments {
        &self.data
    }

    /// Snapshot handed to skills through the intent file
    pub fn to_context(&self) -> ConversationContext {
        ConversationContext {
            utterances: self.turns.iter().map(|t| t.utterance.clone()).collect(),
            action_arguments: self
                .turns
                .iter()
                .flat_map(|t| t.action_arguments.iter().cloned())
                .collect(),
            entities: self
                .turns
                .iter()
                .flat_map(|t| t.entities.iter().cloned())
                .collect(),
            sentiments: self.turns.iter().map(|t| t.sentiment.clone()).collect(),
            data: self.data.clone(),
        }
    }

    /// Utterances from the latest occurrence of `start` onward.
    ///
    /// Falls back to the latest utterance alone when `start` already left
    /// the window.
    pub fn utterances_since(&self, start: &str) -> Vec<String> {
        let position = self.turns.iter().rposition(|t| t.utterance == start);
        let skip = match position {
            Some(index) => index,
            None => self.turns.len().saturating_sub(1),
        };
        self.turns
            .iter()
            .skip(skip)
            .map(|t| t.utterance.clone())
            .collect()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn say(log: &mut ConversationLog, text: &str) {
        log.push_utterance(&Utterance::new(text, "en"));
    }

    #[test]
    fn test_sliding_window() {
        let mut log = ConversationLog::new().with_max_turns(3);
        for i in 0..5 {
            say(&mut log, &format!("message {}", i));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.to_context().utterances,
            vec!["message 2", "message 3", "message 4"]
        );
    }

    #[test]
    fn test_utterances_since() {
        let mut log = ConversationLog::new();
        say(&mut log, "what time is it");
        say(&mut log, "add items to my list");
        say(&mut log, "milk and eggs");
        say(&mut log, "groceries");

        assert_eq!(
            log.utterances_since("add items to my list"),
            vec!["add items to my list", "milk and eggs", "groceries"]
        );
        assert_eq!(log.utterances_since("forgotten"), vec!["groceries"]);
    }

    #[test]
    fn test_context_collects_arguments_and_data() {
        let mut log = ConversationLog::new();
        say(&mut log, "set a timer for 10 minutes");
        let mut args = Arguments::new();
        args.insert("duration".into(), json!("10 minutes"));
        log.record_arguments(args);
        log.record_answer("Timer set");

        let mut data = Arguments::new();
        data.insert("timer_id".into(), json!(1));
        log.merge_data(data);

        let context = log.to_context();
        assert_eq!(context.action_arguments.len(), 1);
        assert_eq!(context.data.get("timer_id"), Some(&json!(1)));
        assert_eq!(log.turns().next().map(|t| t.answers.len()), Some(1));
    }
}
