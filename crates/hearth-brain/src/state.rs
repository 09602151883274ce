//! Conversation state owned by the intent router

use hearth_types::{Arguments, SkillActionRef};

/// Where the router stands between two utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No pending action
    Idle,
    /// A pending action still misses required parameters
    AwaitingSlot,
    /// A pending action waits for the next utterance (loop or flow step)
    AwaitingInput,
}

/// Remaining steps of a flow interrupted by a cross-skill jump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowCursor {
    pub skill: String,
    pub remaining: Vec<String>,
    /// Action the flow jumped to
    pub target: SkillActionRef,
}

impl FlowCursor {
    /// Whether finishing `action` hands control back to the flow
    pub fn resumes_after(&self, action: &SkillActionRef) -> bool {
        self.target.skill == action.skill
    }
}

/// Pending-action state of one conversation
///
/// `missing` and the keys of `collected` never overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pending: Option<SkillActionRef>,
    missing: Vec<String>,
    collected: Arguments,
    starting_utterance: Option<String>,
    flow_resume: Option<FlowCursor>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a pending action. The flow resume cursor is left untouched.
    pub fn arm(
        &mut self,
        action: SkillActionRef,
        missing: Vec<String>,
        collected: Arguments,
        starting_utterance: impl Into<String>,
    ) {
        self.missing = missing
            .into_iter()
            .filter(|name| !collected.contains_key(name))
            .collect();
        self.collected = collected;
        self.pending = Some(action);
        self.starting_utterance = Some(starting_utterance.into());
    }

    /// Merge filled slots, returning how many missing parameters they resolved.
    ///
    /// Nothing is merged when no missing parameter is resolved.
    pub fn apply_filled(&mut self, filled: Arguments) -> usize {
        let resolved = self
            .missing
            .iter()
            .filter(|name| filled.contains_key(*name))
            .count();
        if resolved == 0 {
            return 0;
        }
        self.missing.retain(|name| !filled.contains_key(name));
        self.collected.extend(filled);
        resolved
    }

    pub fn phase(&self) -> Phase {
        match (&self.pending, self.missing.is_empty()) {
            (None, _) => Phase::Idle,
            (Some(_), false) => Phase::AwaitingSlot,
            (Some(_), true) => Phase::AwaitingInput,
        }
    }

    pub fn pending(&self) -> Option<&SkillActionRef> {
        self.pending.as_ref()
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn first_missing(&self) -> Option<&str> {
        self.missing.first().map(String::as_str)
    }

    pub fn collected(&self) -> &Arguments {
        &self.collected
    }

    pub fn starting_utterance(&self) -> Option<&str> {
        self.starting_utterance.as_deref()
    }

    pub fn set_flow_resume(&mut self, cursor: FlowCursor) {
        self.flow_resume = Some(cursor);
    }

    pub fn take_flow_resume(&mut self) -> Option<FlowCursor> {
        self.flow_resume.take()
    }

    /// Remove the cursor, returning it only when `finished` resumes it
    pub fn take_flow_resume_for(&mut self, finished: &SkillActionRef) -> Option<FlowCursor> {
        self.flow_resume
            .take()
            .filter(|cursor| cursor.resumes_after(finished))
    }

    pub fn flow_resume(&self) -> Option<&FlowCursor> {
        self.flow_resume.as_ref()
    }

    /// Drop the pending action but keep the flow resume cursor
    pub fn clear_pending(&mut self) {
        self.pending = None;
        self.missing.clear();
        self.collected.clear();
        self.starting_utterance = None;
    }

    /// Back to idle
    pub fn clear(&mut self) {
        self.clear_pending();
        self.flow_resume = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, serde_json::Value)]) -> Arguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_arm_keeps_missing_and_collected_disjoint() {
        let mut state = ConversationState::new();
        state.arm(
            SkillActionRef::new("todo_list_skill", "add_todos"),
            vec!["list_name".into(), "items".into()],
            args(&[("items", json!(["milk"]))]),
            "add milk",
        );
        assert_eq!(state.missing(), &["list_name".to_string()]);
        assert_eq!(state.phase(), Phase::AwaitingSlot);
    }

    #[test]
    fn test_apply_filled() {
        let mut state = ConversationState::new();
        state.arm(
            SkillActionRef::new("s", "a"),
            vec!["x".into(), "y".into()],
            Arguments::new(),
            "start",
        );
        assert_eq!(state.apply_filled(args(&[("x", json!(1))])), 1);
        assert_eq!(state.first_missing(), Some("y"));
        assert_eq!(state.apply_filled(args(&[("y", json!(2))])), 1);
        assert_eq!(state.phase(), Phase::AwaitingInput);
        assert_eq!(state.collected().len(), 2);
    }

    #[test]
    fn test_clear_pending_keeps_flow_cursor() {
        let mut state = ConversationState::new();
        state.set_flow_resume(FlowCursor {
            skill: "s".into(),
            remaining: vec!["b".into()],
            target: SkillActionRef::new("other_skill", "x"),
        });
        state.arm(SkillActionRef::new("other_skill", "x"), vec![], Arguments::new(), "go");
        state.clear_pending();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.flow_resume().is_some());

        state.clear();
        assert!(state.flow_resume().is_none());
    }

    #[test]
    fn test_unresolving_fill_merges_nothing() {
        let mut state = ConversationState::new();
        state.arm(
            SkillActionRef::new("todo_list_skill", "add_todos"),
            vec!["list_name".into()],
            args(&[("items", json!(["milk"]))]),
            "add milk",
        );
        assert_eq!(state.apply_filled(args(&[("items", json!(["bread"]))])), 0);
        assert_eq!(state.collected().get("items"), Some(&json!(["milk"])));
        assert_eq!(state.missing(), &["list_name".to_string()]);

        let filled = args(&[("list_name", json!("groceries")), ("items", json!(["eggs"]))]);
        assert_eq!(state.apply_filled(filled), 1);
        assert_eq!(state.collected().get("items"), Some(&json!(["eggs"])));
    }

    #[test]
    fn test_flow_cursor_only_resumes_for_its_target_skill() {
        let cursor = FlowCursor {
            skill: "trip_planner_skill".into(),
            remaining: vec!["pack".into()],
            target: SkillActionRef::new("weather_skill", "forecast"),
        };
        let mut state = ConversationState::new();

        state.set_flow_resume(cursor.clone());
        assert!(state
            .take_flow_resume_for(&SkillActionRef::new("timer_skill", "set_timer"))
            .is_none());
        assert!(state.flow_resume().is_none());

        state.set_flow_resume(cursor.clone());
        assert_eq!(
            state.take_flow_resume_for(&SkillActionRef::new("weather_skill", "radar")),
            Some(cursor)
        );
    }
}
