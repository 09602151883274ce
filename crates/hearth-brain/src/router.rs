//! Intent router
//!
//! Turns one owner utterance into skill action invocations:
//!
//! 1. A pending action first tries to fill its next missing parameter
//! 2. Otherwise the utterance is routed to a skill, then to its actions
//! 3. Every selected action is dispatched in order
//! 4. After an action ran, the skill may jump elsewhere, loop, or advance
//!    its flow; without any of these the turn ends and the state is cleared

use crate::conversation::ConversationLog;
use crate::state::{ConversationState, FlowCursor};
use crate::talk::AnswerQueue;
use futures::future::BoxFuture;
use hearth_provider::{
    ActionCallingInput, ActionSummary, Duty, SkillRouterInput, SkillSummary, SlotFillingInput,
};
use hearth_runner::SkillExecutor;
use hearth_skills::{ActionConfig, ActionType, SkillConfig, SkillRegistry};
use hearth_types::{
    ActionCallingOutput, Arguments, IntentContext, QueuedAnswer, SkillActionRef,
    SkillOutput, SlotFillingOutput, Utterance,
};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ============================================================================
// Collaborators
// ============================================================================

pub type SkillRouter = Arc<dyn Duty<Input = SkillRouterInput, Output = Option<String>>>;
pub type ActionCaller = Arc<dyn Duty<Input = ActionCallingInput, Output = Vec<ActionCallingOutput>>>;
pub type SlotFiller = Arc<dyn Duty<Input = SlotFillingInput, Output = SlotFillingOutput>>;

/// The completion duties the router calls
#[derive(Clone)]
pub struct Duties {
    pub skill_router: SkillRouter,
    pub action_calling: ActionCaller,
    pub slot_filling: SlotFiller,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Appended to skill names in `skill:action` references that omit it
    #[serde(default = "default_skill_suffix")]
    pub skill_suffix: String,
}

fn default_skill_suffix() -> String {
    "_skill".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            skill_suffix: default_skill_suffix(),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Every selected action ran and nothing is pending
    Completed,
    /// A pending action waits for the next utterance
    AwaitingInput,
    /// Nothing matched, the state was cleared
    NotFound,
    /// A skill invocation failed, the generic notice was spoken
    Failed,
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("a turn is already in flight")]
    Busy,

    #[error("unknown skill '{0}'")]
    UnknownSkill(String),

    #[error("unknown action '{0}'")]
    UnknownAction(SkillActionRef),
}

// ============================================================================
// Router
// ============================================================================

pub struct IntentRouter {
    config: RouterConfig,
    registry: Arc<dyn SkillRegistry>,
    duties: Duties,
    executor: Arc<dyn SkillExecutor>,
    queue: AnswerQueue,
    log: Arc<Mutex<ConversationLog>>,
    state: Mutex<ConversationState>,
    turn: tokio::sync::Mutex<()>,
}

impl IntentRouter {
    pub fn new(
        config: RouterConfig,
        registry: Arc<dyn SkillRegistry>,
        duties: Duties,
        executor: Arc<dyn SkillExecutor>,
        queue: AnswerQueue,
        log: Arc<Mutex<ConversationLog>>,
    ) -> Self {
        Self {
            config,
            registry,
            duties,
            executor,
            queue,
            log,
            state: Mutex::new(ConversationState::new()),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &AnswerQueue {
        &self.queue
    }

    /// Snapshot of the conversation state
    pub fn conversation_state(&self) -> ConversationState {
        self.state().clone()
    }

    /// Acquire the inference context ahead of the first utterance
    pub async fn warm_up(&self) {
        let (router, calling, filling) = tokio::join!(
            self.duties.skill_router.init(false),
            self.duties.action_calling.init(false),
            self.duties.slot_filling.init(false),
        );
        for (name, result) in [
            (self.duties.skill_router.name(), router),
            (self.duties.action_calling.name(), calling),
            (self.duties.slot_filling.name(), filling),
        ] {
            match result {
                Ok(()) => debug!("Duty {} ready", name),
                Err(e) => warn!("Failed to warm up duty {}: {}", name, e),
            }
        }
    }

    /// Process one owner utterance.
    ///
    /// Only one turn runs at a time; a second call while a turn is in
    /// flight is rejected with [`RouterError::Busy`] and changes nothing.
    pub async fn process_utterance(&self, utterance: Utterance) -> Result<TurnOutcome, RouterError> {
        let Ok(_turn) = self.turn.try_lock() else {
            warn!("Rejecting '{}', a turn is still in flight", utterance.text);
            return Err(RouterError::Busy);
        };

        if utterance.text.trim().is_empty() {
            return Ok(TurnOutcome::NotFound);
        }

        info!("Processing utterance: {}", utterance.text);
        let context = {
            let mut log = self.log();
            log.push_utterance(&utterance);
            log.to_context()
        };
        let mut intent = IntentContext::new(&utterance, context);

        if let Some(outcome) = self.continue_pending(&mut intent).await {
            return Ok(outcome);
        }
        Ok(self.route_fresh(&mut intent).await)
    }

    // ------------------------------------------------------------------------
    // Pending action
    // ------------------------------------------------------------------------

    /// `None` when the utterance does not serve the pending action
    async fn continue_pending(&self, intent: &mut IntentContext) -> Option<TurnOutcome> {
        let (pending, slot_name, start) = {
            let state = self.state();
            let pending = state.pending()?.clone();
            (
                pending,
                state.first_missing().map(str::to_string),
                state.starting_utterance().unwrap_or_default().to_string(),
            )
        };

        let Some(slot_name) = slot_name else {
            let collected = self.state().collected().clone();
            debug!("Resuming {} on new input", pending);
            self.state().clear_pending();
            return Some(self.execute_action(intent, pending, collected).await);
        };

        let action = match self.resolve(&pending) {
            Ok((_, action)) => action,
            Err(e) => {
                warn!("Dropping pending action: {}", e);
                self.state().clear();
                return None;
            }
        };
        let slot = action.parameter(&slot_name)?;

        let input = SlotFillingInput {
            utterance: intent.utterance.clone(),
            slot,
            history: self.log().utterances_since(&start),
        };
        let filled = match self.duties.slot_filling.execute(input).await {
            Ok(SlotFillingOutput::Success { filled_slots }) => filled_slots,
            Ok(SlotFillingOutput::NotFound) => {
                debug!("Utterance does not fill '{}', routing it afresh", slot_name);
                return None;
            }
            Err(e) => {
                warn!("Slot filling failed: {}", e);
                return None;
            }
        };

        let filled: Arguments = filled
            .into_iter()
            .filter(|(name, _)| action.parameters.contains_key(name))
            .collect();

        let (resolved, next_missing, collected) = {
            let mut state = self.state();
            let resolved = state.apply_filled(filled);
            (
                resolved,
                state.first_missing().map(str::to_string),
                state.collected().clone(),
            )
        };
        if resolved == 0 {
            debug!("Slot filling resolved nothing for '{}'", slot_name);
            return None;
        }

        match next_missing {
            Some(name) => {
                self.ask_for(&name);
                Some(TurnOutcome::AwaitingInput)
            }
            None => {
                self.state().clear_pending();
                Some(self.execute_action(intent, pending, collected).await)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Fresh routing
    // ------------------------------------------------------------------------

    async fn route_fresh(&self, intent: &mut IntentContext) -> TurnOutcome {
        let abandoned = self.state().take_flow_resume();
        if let Some(cursor) = abandoned {
            info!("Abandoning interrupted flow of {}", cursor.skill);
        }

        let skills = self
            .registry
            .skills()
            .into_iter()
            .map(|skill| SkillSummary {
                name: skill.name.clone(),
                description: skill.description.clone(),
            })
            .collect();
        let input = SkillRouterInput {
            utterance: intent.utterance.clone(),
            skills,
        };

        let skill_name = match self.duties.skill_router.execute(input).await {
            Ok(Some(name)) => name,
            Ok(None) => return self.not_found("no skill matches the utterance"),
            Err(e) => {
                warn!("Skill routing failed: {}", e);
                return self.not_found("skill routing failed");
            }
        };
        let Some(skill) = self.registry.skill(&skill_name) else {
            return self.not_found(&RouterError::UnknownSkill(skill_name).to_string());
        };
        info!("Routed to skill {}", skill.name);

        let outputs = match deterministic_shortcut(skill) {
            Some(output) => {
                debug!("Shortcut to {:?} without inference", output.action_name());
                vec![output]
            }
            None => self.select_actions(intent, skill).await,
        };

        self.dispatch_all(intent, &skill.name, outputs).await
    }

    async fn select_actions(
        &self,
        intent: &IntentContext,
        skill: &SkillConfig,
    ) -> Vec<ActionCallingOutput> {
        let actions = skill
            .actions
            .iter()
            .map(|(name, action)| ActionSummary {
                name: name.clone(),
                description: action.description.clone(),
                parameters: action.parameter_specs(),
            })
            .collect();
        let input = ActionCallingInput {
            utterance: intent.utterance.clone(),
            skill_name: skill.name.clone(),
            actions,
        };

        match self.duties.action_calling.execute(input).await {
            Ok(outputs) if !outputs.is_empty() => outputs,
            Ok(_) => vec![ActionCallingOutput::NotFound],
            Err(e) => {
                warn!("Action calling failed: {}", e);
                vec![ActionCallingOutput::NotFound]
            }
        }
    }

    /// Dispatch outputs in order, stopping at the first that waits or fails
    async fn dispatch_all(
        &self,
        intent: &mut IntentContext,
        skill_name: &str,
        outputs: Vec<ActionCallingOutput>,
    ) -> TurnOutcome {
        let mut outcome = TurnOutcome::NotFound;
        for output in outputs {
            outcome = self.dispatch(intent, skill_name, output).await;
            if matches!(outcome, TurnOutcome::AwaitingInput | TurnOutcome::Failed) {
                break;
            }
        }
        outcome
    }

    async fn dispatch(
        &self,
        intent: &mut IntentContext,
        skill_name: &str,
        output: ActionCallingOutput,
    ) -> TurnOutcome {
        match output {
            ActionCallingOutput::Success { name, arguments } => {
                self.execute_action(intent, SkillActionRef::new(skill_name, name), arguments)
                    .await
            }
            ActionCallingOutput::MissingParams {
                name,
                required_params,
                arguments,
            } => {
                let target = SkillActionRef::new(skill_name, name);
                if required_params.iter().all(|p| arguments.contains_key(p)) {
                    return self.execute_action(intent, target, arguments).await;
                }
                self.arm_and_ask(target, required_params, arguments, &intent.utterance)
            }
            ActionCallingOutput::NotFound => self.not_found("no action matches the utterance"),
        }
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    fn execute_action<'a>(
        &'a self,
        intent: &'a mut IntentContext,
        target: SkillActionRef,
        arguments: Arguments,
    ) -> BoxFuture<'a, TurnOutcome> {
        Box::pin(async move {
            let (skill, action) = match self.resolve(&target) {
                Ok(found) => found,
                Err(e) => return self.not_found(&e.to_string()),
            };

            intent.set_skill(&skill.name);
            intent.set_action(&target.action, arguments.clone(), action.parameter_specs());
            intent.context = self.log().to_context();
            self.log().record_arguments(arguments);
            info!("Executing {}", target);

            let paraphrasable = !action.is_loop && !action.has_slots();
            if action.action_type == ActionType::Dialog {
                let output = dialog_output(action);
                self.deliver_output(&output, paraphrasable).await;
                return self.after_action(intent, skill, action, &target, output).await;
            }

            let (tx, mut rx) = mpsc::unbounded_channel();
            let invocation = self.executor.invoke(intent.clone(), skill, tx);
            let forwarding = async {
                while let Some(output) = rx.recv().await {
                    self.deliver_output(&output, paraphrasable).await;
                }
            };
            let (result, ()) = tokio::join!(invocation, forwarding);

            match result {
                Ok(output) => self.after_action(intent, skill, action, &target, output).await,
                Err(e) => {
                    error!("Skill action {} failed: {}", target, e);
                    self.queue.say(error_notice(&skill.name, &self.config.skill_suffix), true);
                    self.state().clear();
                    TurnOutcome::Failed
                }
            }
        })
    }

    async fn deliver_output(&self, output: &SkillOutput, paraphrasable: bool) {
        if let Some(target) = output.replace_message_id.as_deref() {
            self.queue
                .replace(target, output.to_answer(), output.widget.clone())
                .await;
            return;
        }
        if !output.has_content() {
            return;
        }

        let mut queued = QueuedAnswer::new(output.to_answer(), !output.is_tool_output())
            .paraphrasable(paraphrasable)
            .with_widget(output.widget.clone());
        if let Some(id) = widget_id(output) {
            queued = queued.with_id(id);
        }
        self.queue.talk(queued);
    }

    /// Post-action transitions: jump, then loop, then flow, then terminate
    async fn after_action(
        &self,
        intent: &mut IntentContext,
        skill: &SkillConfig,
        action: &ActionConfig,
        target: &SkillActionRef,
        output: SkillOutput,
    ) -> TurnOutcome {
        let core = output.core();
        if let Some(data) = core.context_data {
            self.log().merge_data(data);
        }
        if let Some(suggestions) = core.suggestions {
            self.queue.suggest(suggestions);
        }

        if let Some(reference) = output.next_action() {
            match SkillActionRef::parse(reference, &skill.name, &self.config.skill_suffix) {
                Ok(next) => {
                    info!("{} jumps to {}", target, next);
                    self.state().clear_pending();
                    return self.jump(intent, next).await;
                }
                Err(e) => warn!("Ignoring next action of {}: {}", target, e),
            }
        }

        if action.is_loop && !output.breaks_loop() {
            debug!("{} stays in its loop", target);
            self.state().arm(
                target.clone(),
                action.required_parameters(),
                Arguments::new(),
                intent.utterance.clone(),
            );
            return TurnOutcome::AwaitingInput;
        }

        let rest = skill.flow_after(&target.action);
        if !rest.is_empty() {
            return self.advance_flow(intent, &skill.name, rest).await;
        }

        self.finish(intent, target).await
    }

    /// Run a referenced action, or arm it when it needs parameters
    async fn jump(&self, intent: &mut IntentContext, next: SkillActionRef) -> TurnOutcome {
        let required = match self.resolve(&next) {
            Ok((_, action)) => action.required_parameters(),
            Err(e) => return self.not_found(&e.to_string()),
        };
        if required.is_empty() {
            self.execute_action(intent, next, Arguments::new()).await
        } else {
            self.arm_and_ask(next, required, Arguments::new(), &intent.utterance)
        }
    }

    async fn advance_flow(
        &self,
        intent: &mut IntentContext,
        skill_name: &str,
        mut steps: Vec<String>,
    ) -> TurnOutcome {
        if steps.is_empty() {
            self.state().clear();
            return TurnOutcome::Completed;
        }
        let step = steps.remove(0);

        if SkillActionRef::is_qualified(&step) {
            let next = match SkillActionRef::parse(&step, skill_name, &self.config.skill_suffix) {
                Ok(next) => next,
                Err(e) => return self.not_found(&e.to_string()),
            };
            {
                let mut state = self.state();
                state.clear_pending();
                if !steps.is_empty() {
                    state.set_flow_resume(FlowCursor {
                        skill: skill_name.to_string(),
                        remaining: steps,
                        target: next.clone(),
                    });
                }
            }
            info!("Flow of {} continues in {}", skill_name, next);
            return self.jump(intent, next).await;
        }

        let next = SkillActionRef::new(skill_name, step);
        let required = match self.resolve(&next) {
            Ok((_, action)) => action.required_parameters(),
            Err(e) => return self.not_found(&e.to_string()),
        };
        debug!("Flow step {} armed", next);
        self.arm_and_ask(next, required, Arguments::new(), &intent.utterance)
    }

    /// Terminal transition; resumes the flow that jumped into `target`'s skill
    async fn finish(&self, intent: &mut IntentContext, target: &SkillActionRef) -> TurnOutcome {
        let cursor = self.state().take_flow_resume_for(target);
        match cursor {
            Some(cursor) => {
                info!("Resuming flow of {}", cursor.skill);
                self.advance_flow(intent, &cursor.skill, cursor.remaining)
                    .await
            }
            None => {
                self.state().clear();
                TurnOutcome::Completed
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn arm_and_ask(
        &self,
        target: SkillActionRef,
        missing: Vec<String>,
        collected: Arguments,
        utterance: &str,
    ) -> TurnOutcome {
        let first = {
            let mut state = self.state();
            state.arm(target, missing, collected, utterance);
            state.first_missing().map(str::to_string)
        };
        if let Some(name) = first {
            self.ask_for(&name);
        }
        TurnOutcome::AwaitingInput
    }

    fn ask_for(&self, parameter: &str) {
        debug!("Asking for parameter '{}'", parameter);
        self.queue.say(parameter_question(parameter), true);
    }

    fn not_found(&self, reason: &str) -> TurnOutcome {
        info!("Not found: {}", reason);
        self.state().clear();
        TurnOutcome::NotFound
    }

    fn resolve(&self, target: &SkillActionRef) -> Result<(&SkillConfig, &ActionConfig), RouterError> {
        let skill = self
            .registry
            .skill(&target.skill)
            .ok_or_else(|| RouterError::UnknownSkill(target.skill.clone()))?;
        let action = skill
            .action(&target.action)
            .ok_or_else(|| RouterError::UnknownAction(target.clone()))?;
        Ok((skill, action))
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self) -> MutexGuard<'_, ConversationLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

/// Pick an action without inference when the skill leaves no choice.
///
/// Either the skill has a single action without required parameters, or
/// its flow starts with a local action without required parameters.
pub fn deterministic_shortcut(skill: &SkillConfig) -> Option<ActionCallingOutput> {
    if skill.actions.len() == 1 {
        if let Some((name, action)) = skill.actions.first() {
            if action.required_parameters().is_empty() {
                return Some(ActionCallingOutput::success(name.clone()));
            }
        }
    }

    let first = skill.flow.first()?;
    if SkillActionRef::is_qualified(first) {
        return None;
    }
    let action = skill.action(first)?;
    action
        .required_parameters()
        .is_empty()
        .then(|| ActionCallingOutput::success(first.clone()))
}

fn dialog_output(action: &ActionConfig) -> SkillOutput {
    match action.answers.choose(&mut rand::thread_rng()) {
        Some(answer) => SkillOutput::text(answer.clone()),
        None => {
            warn!("Dialog action has no answers configured");
            SkillOutput::default()
        }
    }
}

fn parameter_question(parameter: &str) -> String {
    format!("What is the {}?", parameter.replace('_', " "))
}

/// Generic notice spoken when a skill invocation fails
fn error_notice(skill_name: &str, suffix: &str) -> String {
    let bare = skill_name.strip_suffix(suffix).unwrap_or(skill_name);
    format!("Sorry, the {} skill ran into a problem.", bare.replace('_', " "))
}

/// Widgets carry their own id, later replacements target it
fn widget_id(output: &SkillOutput) -> Option<String> {
    output
        .widget
        .as_ref()
        .and_then(|w| w.get("id"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
}
