//! Fakes shared by the brain tests

use crate::delivery::{DeliverySink, SpeechSynthesizer};
use anyhow::Result;
use async_trait::async_trait;
use hearth_provider::{
    ActionCallingInput, Duty, DutyError, ParaphraseInput, SkillRouterInput, SlotFillingInput,
};
use hearth_runner::{RunnerError, SkillExecutor};
use hearth_skills::SkillConfig;
use hearth_types::{
    ActionCallingOutput, Arguments, DeliveryEvent, IntentContext, SkillActionRef, SkillOutput,
    SlotFillingOutput,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Output side
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DeliveryEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Texts of every answer event, replacements included
    pub fn answers(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DeliveryEvent::Answer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, event: DeliveryEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSpeech {
    async fn synthesize(&self, speech: &str, _end_of_turn: bool) -> Result<()> {
        self.spoken.lock().unwrap().push(speech.to_string());
        Ok(())
    }
}

pub struct UppercaseParaphraser;

#[async_trait]
impl Duty for UppercaseParaphraser {
    type Input = ParaphraseInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "uppercase"
    }

    async fn init(&self, _force: bool) -> Result<(), DutyError> {
        Ok(())
    }

    async fn execute(&self, input: ParaphraseInput) -> Result<String, DutyError> {
        Ok(input.text.to_uppercase())
    }
}

// ============================================================================
// Duties
// ============================================================================

/// Skill router answering with a fixed skill name
pub struct FixedSkillRouter {
    skill: Option<String>,
    calls: AtomicUsize,
}

impl FixedSkillRouter {
    pub fn new(skill: Option<&str>) -> Self {
        Self {
            skill: skill.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Duty for FixedSkillRouter {
    type Input = SkillRouterInput;
    type Output = Option<String>;

    fn name(&self) -> &'static str {
        "fixed_skill_router"
    }

    async fn init(&self, _force: bool) -> Result<(), DutyError> {
        Ok(())
    }

    async fn execute(&self, _input: SkillRouterInput) -> Result<Option<String>, DutyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.skill.clone())
    }
}

/// Action calling replaying scripted replies, `[NotFound]` once exhausted
#[derive(Default)]
pub struct ScriptedActionCalling {
    replies: Mutex<VecDeque<Vec<ActionCallingOutput>>>,
    calls: AtomicUsize,
}

impl ScriptedActionCalling {
    pub fn reply(self, outputs: Vec<ActionCallingOutput>) -> Self {
        self.replies.lock().unwrap().push_back(outputs);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Duty for ScriptedActionCalling {
    type Input = ActionCallingInput;
    type Output = Vec<ActionCallingOutput>;

    fn name(&self) -> &'static str {
        "scripted_action_calling"
    }

    async fn init(&self, _force: bool) -> Result<(), DutyError> {
        Ok(())
    }

    async fn execute(&self, _input: ActionCallingInput) -> Result<Vec<ActionCallingOutput>, DutyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| vec![ActionCallingOutput::NotFound]))
    }
}

/// Slot filling replaying scripted replies and recording what it was asked
#[derive(Default)]
pub struct ScriptedSlotFilling {
    replies: Mutex<VecDeque<SlotFillingOutput>>,
    asked: Mutex<Vec<SlotFillingInput>>,
}

impl ScriptedSlotFilling {
    pub fn fill(self, slots: Arguments) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(SlotFillingOutput::Success {
                filled_slots: slots,
            });
        self
    }

    pub fn not_found(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(SlotFillingOutput::NotFound);
        self
    }

    pub fn asked(&self) -> Vec<SlotFillingInput> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Duty for ScriptedSlotFilling {
    type Input = SlotFillingInput;
    type Output = SlotFillingOutput;

    fn name(&self) -> &'static str {
        "scripted_slot_filling"
    }

    async fn init(&self, _force: bool) -> Result<(), DutyError> {
        Ok(())
    }

    async fn execute(&self, input: SlotFillingInput) -> Result<SlotFillingOutput, DutyError> {
        self.asked.lock().unwrap().push(input);
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or(SlotFillingOutput::NotFound))
    }
}

// ============================================================================
// Executor
// ============================================================================

/// What a fake skill process does for one invocation
pub enum Script {
    /// Stream every output, the last one is the result
    Outputs(Vec<SkillOutput>),
    Fail,
}

/// Executor recording invocations and replaying scripts per `skill:action`
#[derive(Default)]
pub struct FakeExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    invocations: Mutex<Vec<(SkillActionRef, Arguments)>>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script(self, reference: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(reference.to_string())
            .or_default()
            .push_back(script);
        self
    }

    pub fn invocations(&self) -> Vec<(SkillActionRef, Arguments)> {
        self.invocations.lock().unwrap().clone()
    }

    /// `skill:action` of every invocation, in order
    pub fn invoked(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|(reference, _)| reference.to_string())
            .collect()
    }
}

#[async_trait]
impl SkillExecutor for FakeExecutor {
    async fn invoke(
        &self,
        intent: IntentContext,
        _skill: &SkillConfig,
        events: mpsc::UnboundedSender<SkillOutput>,
    ) -> hearth_runner::error::Result<SkillOutput> {
        let reference = intent.skill_action().ok_or(RunnerError::NoResult)?;
        self.invocations
            .lock()
            .unwrap()
            .push((reference.clone(), intent.action_arguments.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&reference.to_string())
            .and_then(VecDeque::pop_front);
        let outputs = match script {
            Some(Script::Outputs(outputs)) => outputs,
            Some(Script::Fail) => return Err(RunnerError::ExitStatus { code: Some(1) }),
            None => vec![SkillOutput::text(format!("done {}", reference.action))],
        };

        for output in &outputs {
            let _ = events.send(output.clone());
        }
        outputs.into_iter().last().ok_or(RunnerError::NoResult)
    }
}
