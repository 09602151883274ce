use crate::config::Config;
use crate::console::{ConsoleSink, LoggedSpeech};
use anyhow::Result;
use hearth_brain::{AnswerQueue, ConversationLog, Duties, IntentRouter, RouterError, TurnOutcome};
use hearth_provider::{
    ActionCallingDuty, InferenceBackend, OpenAIBackend, ParaphraseDuty, SharedContext,
    SkillRouterDuty, SlotFillingDuty,
};
use hearth_runner::SkillProcessRunner;
use hearth_skills::SkillsRegistry;
use hearth_types::Utterance;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Gateway service - builds every component and runs the console loop
pub struct GatewayService {
    config: Config,
}

impl GatewayService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        hearth_logging::init_logging(&self.config.logging.level, self.config.logging.format)?;
        info!("Starting Hearth");

        let provider = self.config.providers.provider();
        info!("Inference provider: {:?} ({})", self.config.providers.default, provider.model());
        let backend: Arc<dyn InferenceBackend> = Arc::new(OpenAIBackend::new(provider));
        let context = SharedContext::new(backend, self.config.providers.idle_timeout());

        let duties = Duties {
            skill_router: Arc::new(SkillRouterDuty::new(context.clone())),
            action_calling: Arc::new(ActionCallingDuty::new(context.clone())),
            slot_filling: Arc::new(SlotFillingDuty::new(context.clone())),
        };

        let mut registry = SkillsRegistry::new();
        for dir in self.config.skills.expanded_directories() {
            registry = registry.add_directory(dir);
        }
        let mut registry = registry.with_personal_skills();
        if let Err(e) = registry.discover() {
            warn!("Failed to discover skills: {:#}", e);
        } else {
            info!("Discovered {} skills", registry.len());
        }

        let runner = SkillProcessRunner::new(self.config.runner.clone());

        let log = Arc::new(Mutex::new(ConversationLog::new()));
        let lang = self.config.assistant.lang.clone();
        let queue = AnswerQueue::new(
            self.config.talk.clone(),
            lang.clone(),
            Arc::new(ConsoleSink),
            log.clone(),
        )
        .with_speech(Arc::new(LoggedSpeech))
        .with_paraphraser(Arc::new(ParaphraseDuty::new(context.clone())));
        queue.set_muted(self.config.assistant.muted);

        let router = Arc::new(IntentRouter::new(
            self.config.assistant.router(),
            Arc::new(registry),
            duties,
            Arc::new(runner),
            queue,
            log,
        ));
        router.warm_up().await;

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
            info!("Received shutdown signal");
            signal_token.cancel();
        });

        info!("Ready. Type a request, /stop to interrupt, /mute or /unmute, /quit to exit");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            error!("Failed to read input: {}", e);
                            break;
                        }
                    };
                    match line.trim() {
                        "" => {}
                        "/quit" => break,
                        "/stop" => router.queue().interrupt().await,
                        "/mute" => router.queue().set_muted(true),
                        "/unmute" => router.queue().set_muted(false),
                        text => Self::spawn_turn(&router, Utterance::new(text, &lang)),
                    }
                }
            }
        }

        info!("Shutting down gracefully...");
        router.queue().drained().await;
        context.release().await;
        info!("Hearth stopped");
        Ok(())
    }

    /// Run one turn in the background so commands stay responsive
    fn spawn_turn(router: &Arc<IntentRouter>, utterance: Utterance) {
        let router = router.clone();
        tokio::spawn(async move {
            match router.process_utterance(utterance).await {
                Ok(TurnOutcome::NotFound) => {
                    router.queue().say("Sorry, I'm not sure how to help with that.", true);
                }
                Ok(outcome) => info!("Turn ended: {:?}", outcome),
                Err(RouterError::Busy) => {
                    router.queue().say("Hold on, I'm still working on your last request.", true);
                }
                Err(e) => error!("Turn failed: {}", e),
            }
        });
    }
}
