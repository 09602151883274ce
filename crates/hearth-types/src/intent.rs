use crate::routing::SkillActionRef;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Turn identifier, unique per processed utterance
pub type TurnId = Uuid;

/// Action arguments and arbitrary context data
pub type Arguments = serde_json::Map<String, Value>;

/// Sentiment polarity detected on an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentVote {
    Positive,
    Neutral,
    Negative,
}

/// Sentiment analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub vote: Option<SentimentVote>,
    pub score: Option<f64>,
}

/// A named entity extracted from an utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity: String,
    #[serde(rename = "sourceText")]
    pub source_text: String,
    #[serde(default)]
    pub resolution: Value,
}

impl Entity {
    pub fn new(entity: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            source_text: source_text.into(),
            resolution: Value::Null,
        }
    }
}

/// An owner utterance as it enters the router
#[derive(Debug, Clone, Default)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
}

impl Utterance {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            entities: Vec::new(),
            sentiment: Sentiment::default(),
        }
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self
    }
}

/// Conversation-scoped history made visible to skills
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub utterances: Vec<String>,
    pub action_arguments: Vec<Arguments>,
    pub entities: Vec<Entity>,
    pub sentiments: Vec<Sentiment>,
    pub data: Arguments,
}

/// Date and time block derived when the intent file is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    pub lang: String,
    pub date: String,
    pub time: String,
    pub timestamp: i64,
    pub date_time: String,
    pub week_day: String,
}

impl TemporalContext {
    pub fn now(lang: &str) -> Self {
        Self::at(lang, Local::now())
    }

    pub fn at(lang: &str, now: DateTime<Local>) -> Self {
        Self {
            lang: lang.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            timestamp: now.timestamp_millis(),
            date_time: now.to_rfc3339(),
            week_day: now.format("%A").to_string(),
        }
    }
}

/// Declared parameter of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
}

/// Snapshot of one turn, filled in as routing decisions are made
///
/// Built from the utterance, then the skill is chosen, then the action and
/// its arguments. Handed by value to the skill process runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentContext {
    pub id: TurnId,
    pub lang: String,
    pub utterance: String,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
    pub skill_name: Option<String>,
    pub action_name: Option<String>,
    pub action_arguments: Arguments,
    pub parameters: Vec<ParameterSpec>,
    pub context: ConversationContext,
}

impl IntentContext {
    pub fn new(utterance: &Utterance, context: ConversationContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            lang: utterance.lang.clone(),
            utterance: utterance.text.clone(),
            entities: utterance.entities.clone(),
            sentiment: utterance.sentiment.clone(),
            skill_name: None,
            action_name: None,
            action_arguments: Arguments::new(),
            parameters: Vec::new(),
            context,
        }
    }

    pub fn set_skill(&mut self, skill_name: impl Into<String>) {
        self.skill_name = Some(skill_name.into());
        self.action_name = None;
        self.action_arguments.clear();
        self.parameters.clear();
    }

    pub fn set_action(
        &mut self,
        action_name: impl Into<String>,
        arguments: Arguments,
        parameters: Vec<ParameterSpec>,
    ) {
        self.action_name = Some(action_name.into());
        self.action_arguments = arguments;
        self.parameters = parameters;
    }

    /// The resolved `skill:action` pair, once both are chosen
    pub fn skill_action(&self) -> Option<SkillActionRef> {
        match (&self.skill_name, &self.action_name) {
            (Some(skill), Some(action)) => Some(SkillActionRef::new(skill, action)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_temporal_context_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap();
        let temporal = TemporalContext::at("en", now);
        assert_eq!(temporal.date, "2024-03-15");
        assert_eq!(temporal.time, "09:30:05");
        assert_eq!(temporal.week_day, "Friday");
        assert_eq!(temporal.timestamp, now.timestamp_millis());
    }

    #[test]
    fn test_set_skill_resets_action() {
        let utterance = Utterance::new("add milk to my list", "en");
        let mut ctx = IntentContext::new(&utterance, ConversationContext::default());
        ctx.set_skill("todo_list_skill");
        let mut args = Arguments::new();
        args.insert("items".into(), serde_json::json!(["milk"]));
        ctx.set_action("add_todos", args, Vec::new());
        assert_eq!(
            ctx.skill_action().map(|r| r.to_string()),
            Some("todo_list_skill:add_todos".to_string())
        );

        ctx.set_skill("timer_skill");
        assert!(ctx.action_name.is_none());
        assert!(ctx.action_arguments.is_empty());
    }

    #[test]
    fn test_entity_wire_name() {
        let entity = Entity::new("widgetid", "todos-1");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["sourceText"], "todos-1");
    }
}
