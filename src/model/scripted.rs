//! Scripted model for tests: replays canned turns and records what it saw.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{AssistantTurn, ChatModel};
use crate::conversation::Message;
use crate::error::{AgentError, Result};
use crate::tools::ToolDescriptor;

pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<AssistantTurn>>>,
    /// Returned forever once the script runs out.
    repeat: Option<AssistantTurn>,
    snapshots: Mutex<Vec<Vec<Message>>>,
    catalogs: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<AssistantTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into_iter().map(Ok).collect()),
            repeat: None,
            snapshots: Mutex::new(Vec::new()),
            catalogs: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(turn: AssistantTurn) -> Self {
        Self {
            repeat: Some(turn),
            ..Self::new(Vec::new())
        }
    }

    pub fn failing(message: &str) -> Self {
        let model = Self::new(Vec::new());
        model
            .script
            .lock()
            .unwrap()
            .push_back(Err(AgentError::Model(message.to_string())));
        model
    }

    /// Every message list the model was called with, in call order.
    pub fn snapshots(&self) -> Vec<Vec<Message>> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Tool names offered on each call.
    pub fn catalogs(&self) -> Vec<Vec<String>> {
        self.catalogs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<AssistantTurn> {
        self.snapshots.lock().unwrap().push(messages.to_vec());
        self.catalogs
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(turn) => turn,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| AgentError::Model("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
