//! Scripted collaborators for orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream;
use tokio::sync::mpsc;

use parley_types::chat::{ChatSession, SessionId};
use parley_types::error::PersistenceError;
use parley_types::llm::{CompletionRequest, LlmError, StreamItem};

use crate::chat::repository::ChatRepository;
use crate::llm::client::ChatClient;
use crate::llm::stream::FragmentStream;

/// What the scripted client does for one `stream` call.
pub enum Script {
    Items(Vec<StreamItem>),
    Reject(LlmError),
    Gated(mpsc::UnboundedReceiver<StreamItem>),
}

impl Script {
    pub fn fragments(texts: &[&str]) -> Self {
        let mut items: Vec<StreamItem> = texts
            .iter()
            .map(|t| StreamItem::Fragment(t.to_string()))
            .collect();
        items.push(StreamItem::Complete);
        Script::Items(items)
    }

    /// A stream fed item by item through the returned sender.
    pub fn gated() -> (Self, mpsc::UnboundedSender<StreamItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Script::Gated(rx), tx)
    }
}

/// Client that replays one script per `stream` call and records requests.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedClient {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            requests: Arc::default(),
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Items(vec![StreamItem::Complete]));

        match script {
            Script::Items(items) => Ok(FragmentStream::from_items(items)),
            Script::Reject(err) => Err(err),
            Script::Gated(rx) => Ok(FragmentStream::new(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
        }
    }

    async fn chat(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("answer to: {}", request.messages.last().map(|m| m.content.as_str()).unwrap_or("")))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(vec!["scripted-1".to_string()])
    }
}

/// In-memory repository that counts saves and can be told to fail.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, ChatSession>>>,
    saves: Arc<AtomicUsize>,
    failing: bool,
}

impl MemoryRepository {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self, id: &SessionId) -> Option<ChatSession> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    pub fn insert(&self, session: ChatSession) {
        self.sessions.lock().unwrap().insert(session.id, session);
    }
}

impl ChatRepository for MemoryRepository {
    async fn save(&self, session: &ChatSession) -> Result<(), PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(PersistenceError::Storage("disk full".into()));
        }
        self.insert(session.clone());
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ChatSession>, PersistenceError> {
        Ok(self.stored(id))
    }

    async fn list(&self) -> Result<Vec<ChatSession>, PersistenceError> {
        let mut all: Vec<ChatSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .map(|s| ChatSession {
                messages: Vec::new(),
                ..s.clone()
            })
            .collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, PersistenceError> {
        Ok(self.sessions.lock().unwrap().remove(id).is_some())
    }
}

/// Wait until spawned persistence tasks have run `expected` saves.
pub async fn wait_for_saves(repository: &MemoryRepository, expected: usize) {
    for _ in 0..200 {
        if repository.saves() >= expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("expected {expected} saves, saw {}", repository.saves());
}
