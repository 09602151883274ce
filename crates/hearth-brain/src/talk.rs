//! Answer queue and talk pipeline
//!
//! Answers are delivered strictly in arrival order by a single processing
//! task. Each entry may be rephrased, is preceded by a short typing pause,
//! goes to speech synthesis unless muted, and is then delivered.

use crate::conversation::ConversationLog;
use crate::delivery::{DeliverySink, SpeechSynthesizer};
use hearth_provider::{Duty, ParaphraseInput};
use hearth_types::{Answer, DeliveryEvent, QueuedAnswer};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Paraphrase duty as seen by the queue
pub type Paraphraser = Arc<dyn Duty<Input = ParaphraseInput, Output = String>>;

#[derive(Debug, Clone, Deserialize)]
pub struct TalkConfig {
    /// Rephrase eligible answers through the paraphrase duty
    #[serde(default)]
    pub paraphrase: bool,

    /// Shorter answers are never rephrased
    #[serde(default = "default_min_paraphrase_words")]
    pub min_paraphrase_words: usize,

    #[serde(default = "default_typing_delay_min_ms")]
    pub typing_delay_min_ms: u64,

    #[serde(default = "default_typing_delay_max_ms")]
    pub typing_delay_max_ms: u64,
}

fn default_min_paraphrase_words() -> usize {
    5
}

fn default_typing_delay_min_ms() -> u64 {
    100
}

fn default_typing_delay_max_ms() -> u64 {
    350
}

impl Default for TalkConfig {
    fn default() -> Self {
        Self {
            paraphrase: false,
            min_paraphrase_words: default_min_paraphrase_words(),
            typing_delay_min_ms: default_typing_delay_min_ms(),
            typing_delay_max_ms: default_typing_delay_max_ms(),
        }
    }
}

impl TalkConfig {
    fn typing_delay(&self) -> Duration {
        let min = self.typing_delay_min_ms.min(self.typing_delay_max_ms);
        let max = self.typing_delay_max_ms.max(min);
        let ms = rand::thread_rng().gen_range(min..=max);
        Duration::from_millis(ms)
    }
}

#[derive(Debug)]
enum Entry {
    Answer(QueuedAnswer),
    Suggestions(Vec<String>),
}

struct Inner {
    entries: Mutex<VecDeque<Entry>>,
    processing: AtomicBool,
    muted: AtomicBool,
    config: TalkConfig,
    lang: String,
    sink: Arc<dyn DeliverySink>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    paraphraser: Option<Paraphraser>,
    log: Arc<Mutex<ConversationLog>>,
    idle: Notify,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to the answer queue
#[derive(Clone)]
pub struct AnswerQueue {
    inner: Arc<Inner>,
}

impl AnswerQueue {
    pub fn new(
        config: TalkConfig,
        lang: impl Into<String>,
        sink: Arc<dyn DeliverySink>,
        log: Arc<Mutex<ConversationLog>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                muted: AtomicBool::new(false),
                config,
                lang: lang.into(),
                sink,
                speech: None,
                paraphraser: None,
                log,
                idle: Notify::new(),
            }),
        }
    }

    /// Builder: speech synthesis collaborator. Call before sharing the queue.
    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.speech = Some(speech);
        } else {
            warn!("Answer queue already shared, speech synthesizer ignored");
        }
        self
    }

    /// Builder: paraphrase duty. Call before sharing the queue.
    pub fn with_paraphraser(mut self, paraphraser: Paraphraser) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.paraphraser = Some(paraphraser);
        } else {
            warn!("Answer queue already shared, paraphraser ignored");
        }
        self
    }

    pub fn set_muted(&self, muted: bool) {
        info!("Speech {}", if muted { "muted" } else { "unmuted" });
        self.inner.muted.store(muted, Ordering::SeqCst);
    }

    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::SeqCst)
    }

    /// Queue an answer; starts a processing cycle unless one is running
    pub fn talk(&self, answer: QueuedAnswer) {
        self.push(Entry::Answer(answer));
    }

    /// Shorthand for a plain, non-rephrasable answer
    pub fn say(&self, text: impl Into<String>, end_of_turn: bool) {
        self.talk(QueuedAnswer::new(Answer::text(text), end_of_turn));
    }

    /// Queue a suggestion list behind the answers already waiting
    pub fn suggest(&self, items: Vec<String>) {
        if !items.is_empty() {
            self.push(Entry::Suggestions(items));
        }
    }

    /// Update a message in place.
    ///
    /// A message still waiting in the queue is rewritten; a delivered one is
    /// replaced through an answer event carrying the replace target.
    pub async fn replace(&self, target_id: &str, answer: Answer, widget: Option<Value>) {
        {
            let mut entries = self.inner.entries();
            let waiting = entries.iter_mut().find_map(|entry| match entry {
                Entry::Answer(queued) if queued.id == target_id => Some(queued),
                _ => None,
            });
            if let Some(queued) = waiting {
                debug!("Rewriting queued message {}", target_id);
                queued.answer = answer;
                if widget.is_some() {
                    queued.widget = widget;
                }
                return;
            }
        }

        debug!("Replacing delivered message {}", target_id);
        let event = DeliveryEvent::Answer {
            id: target_id.to_string(),
            text: answer.text,
            widget,
            replace: Some(target_id.to_string()),
        };
        if let Err(e) = self.inner.sink.deliver(event).await {
            warn!("Failed to deliver replacement of {}: {:#}", target_id, e);
        }
    }

    /// Drop every undelivered answer and signal the interruption
    pub async fn interrupt(&self) {
        let dropped = {
            let mut entries = self.inner.entries();
            let count = entries.len();
            entries.clear();
            count
        };
        info!("Interrupted, {} queued answer(s) dropped", dropped);
        if let Err(e) = self.inner.sink.deliver(DeliveryEvent::Interruption).await {
            warn!("Failed to deliver interruption: {:#}", e);
        }
    }

    /// Number of entries waiting
    pub fn pending(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    /// Wait until every queued entry has been delivered
    pub async fn drained(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if !self.is_processing() && self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, entry: Entry) {
        let mut entries = self.inner.entries();
        entries.push_back(entry);
        // Checked under the entries lock so the processing task cannot
        // observe an empty queue and stop between push and check
        if !self.inner.processing.swap(true, Ordering::SeqCst) {
            let inner = self.inner.clone();
            tokio::spawn(process(inner));
        }
    }
}

async fn process(inner: Arc<Inner>) {
    loop {
        let next = inner.entries().pop_front();
        match next {
            Some(Entry::Answer(answer)) => speak(&inner, answer).await,
            Some(Entry::Suggestions(items)) => {
                if let Err(e) = inner.sink.deliver(DeliveryEvent::Suggestions { items }).await {
                    warn!("Failed to deliver suggestions: {:#}", e);
                }
            }
            None => {
                if let Err(e) = inner.sink.deliver(DeliveryEvent::TypingStopped).await {
                    warn!("Failed to deliver typing stop: {:#}", e);
                }
                // Answers queued during the typing stop are picked up here
                let entries = inner.entries();
                if entries.is_empty() {
                    inner.processing.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    inner.idle.notify_waiters();
}

async fn speak(inner: &Inner, queued: QueuedAnswer) {
    let QueuedAnswer {
        id,
        answer,
        end_of_turn,
        paraphrasable,
        widget,
    } = queued;

    let answer = rephrase(inner, answer, paraphrasable).await;

    if let Err(e) = inner.sink.deliver(DeliveryEvent::TypingStarted).await {
        warn!("Failed to deliver typing start: {:#}", e);
    }
    tokio::time::sleep(inner.config.typing_delay()).await;

    if !inner.muted.load(Ordering::SeqCst) && !answer.speech.trim().is_empty() {
        if let Some(speech) = &inner.speech {
            if let Err(e) = speech.synthesize(&answer.speech, end_of_turn).await {
                warn!("Speech synthesis failed: {:#}", e);
            }
        }
    }

    info!("Talk: {}", answer.text);
    let event = DeliveryEvent::Answer {
        id,
        text: answer.text.clone(),
        widget,
        replace: None,
    };
    if let Err(e) = inner.sink.deliver(event).await {
        warn!("Failed to deliver answer: {:#}", e);
    }

    inner
        .log
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record_answer(answer.text);
}

async fn rephrase(inner: &Inner, answer: Answer, paraphrasable: bool) -> Answer {
    let Some(paraphraser) = &inner.paraphraser else {
        return answer;
    };
    if !paraphrasable
        || !inner.config.paraphrase
        || answer.word_count() < inner.config.min_paraphrase_words
    {
        return answer;
    }

    let input = ParaphraseInput {
        text: answer.text.clone(),
        lang: inner.lang.clone(),
    };
    match paraphraser.execute(input).await {
        Ok(text) => {
            debug!("Rephrased '{}' as '{}'", answer.text, text);
            Answer::text(text)
        }
        Err(e) => {
            warn!("Paraphrase failed, keeping original answer: {}", e);
            answer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, RecordingSpeech, UppercaseParaphraser};

    fn queue(sink: Arc<RecordingSink>, config: TalkConfig) -> AnswerQueue {
        AnswerQueue::new(config, "en", sink, Arc::new(Mutex::new(ConversationLog::new())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_delivery() {
        let sink = Arc::new(RecordingSink::default());
        let queue = queue(sink.clone(), TalkConfig::default());

        queue.say("first", false);
        queue.say("second", false);
        tokio::task::yield_now().await;
        queue.say("third", true);
        queue.drained().await;

        assert_eq!(sink.answers(), vec!["first", "second", "third"]);
        let events = sink.events();
        assert_eq!(events.first(), Some(&DeliveryEvent::TypingStarted));
        assert_eq!(events.last(), Some(&DeliveryEvent::TypingStopped));
        assert!(!queue.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paraphrase_rules() {
        let sink = Arc::new(RecordingSink::default());
        let config = TalkConfig {
            paraphrase: true,
            ..TalkConfig::default()
        };
        let queue = queue(sink.clone(), config).with_paraphraser(Arc::new(UppercaseParaphraser));

        queue.talk(QueuedAnswer::new(Answer::text("ok"), false).paraphrasable(true));
        queue.talk(
            QueuedAnswer::new(Answer::text("your list has three items in it"), false)
                .paraphrasable(true),
        );
        queue.talk(QueuedAnswer::new(Answer::text("what is the list name please"), true));
        queue.drained().await;

        assert_eq!(
            sink.answers(),
            vec![
                "ok",
                "YOUR LIST HAS THREE ITEMS IN IT",
                "what is the list name please"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_skips_speech() {
        let sink = Arc::new(RecordingSink::default());
        let speech = Arc::new(RecordingSpeech::default());
        let queue = queue(sink.clone(), TalkConfig::default()).with_speech(speech.clone());

        queue.say("spoken", false);
        queue.drained().await;
        queue.set_muted(true);
        queue.say("silent", true);
        queue.drained().await;

        assert_eq!(speech.spoken(), vec!["spoken"]);
        assert_eq!(sink.answers(), vec!["spoken", "silent"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_queued_and_delivered() {
        let sink = Arc::new(RecordingSink::default());
        let queue = queue(sink.clone(), TalkConfig::default());

        let progress = QueuedAnswer::new(Answer::text("Downloading 10%"), false).with_id("msg-progress");
        queue.talk(progress);
        queue.replace("msg-progress", Answer::text("Downloading 50%"), None).await;
        queue.drained().await;
        queue.replace("msg-progress", Answer::text("Downloaded"), None).await;

        assert_eq!(sink.answers(), vec!["Downloading 50%", "Downloaded"]);
        assert!(sink.events().contains(&DeliveryEvent::Answer {
            id: "msg-progress".into(),
            text: "Downloaded".into(),
            widget: None,
            replace: Some("msg-progress".into()),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_drops_pending() {
        let sink = Arc::new(RecordingSink::default());
        let queue = queue(sink.clone(), TalkConfig::default());

        queue.say("one", false);
        queue.say("two", false);
        queue.say("three", false);
        queue.interrupt().await;
        queue.drained().await;

        assert!(sink.events().contains(&DeliveryEvent::Interruption));
        assert!(sink.answers().len() <= 1);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggestions_follow_answers() {
        let sink = Arc::new(RecordingSink::default());
        let queue = queue(sink.clone(), TalkConfig::default());

        queue.say("Want to play again?", true);
        queue.suggest(vec!["Yes".into(), "No".into()]);
        queue.drained().await;

        let events = sink.events();
        let answer_at = events
            .iter()
            .position(|e| matches!(e, DeliveryEvent::Answer { .. }))
            .unwrap();
        let suggestions_at = events
            .iter()
            .position(|e| matches!(e, DeliveryEvent::Suggestions { .. }))
            .unwrap();
        assert!(answer_at < suggestions_at);
    }
}
