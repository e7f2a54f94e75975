//! Fakes das fronteiras assíncronas usados pelos testes

use async_trait::async_trait;
use ia_service::{ChatCompletion, ChatRequest, IaResult, IaServiceError};
use mensageria::ChatSender;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::services::email::EmailSender;
use crate::utils::AppResult;

pub enum FakeReply {
    Text(String),
    RateLimited,
    Failure,
}

/// Responde em ordem; sem respostas na fila, falha
#[derive(Default)]
pub struct FakeChat {
    replies: Mutex<VecDeque<FakeReply>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChat {
    pub fn replying(texts: &[&str]) -> Self {
        let chat = Self::default();
        for text in texts {
            chat.push(FakeReply::Text(text.to_string()));
        }
        chat
    }

    pub fn with(reply: FakeReply) -> Self {
        let chat = Self::default();
        chat.push(reply);
        chat
    }

    pub fn push(&self, reply: FakeReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, request: ChatRequest) -> IaResult<String> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(FakeReply::Text(text)) => Ok(text),
            Some(FakeReply::RateLimited) => Err(IaServiceError::RateLimited("429".to_string())),
            Some(FakeReply::Failure) | None => Err(IaServiceError::ApiError("falha simulada".to_string())),
        }
    }
}

/// Guarda as mensagens enviadas
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSender for RecordingSender {
    async fn send_text(&self, chat_id: &str, text: &str) -> mensageria::Result<()> {
        self.sent.lock().unwrap().push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmail {
    pub fn emails(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(format!("email-{}", sent.len()))
    }
}
