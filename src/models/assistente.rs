use serde::{Deserialize, Serialize};

/// Corpo de `POST /ia/chat`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatIaRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub gabinete_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatIaResponse {
    pub message: String,
    pub conversation_id: String,
}

/// Linha de `ia_messages`
#[derive(Debug, Clone, Deserialize)]
pub struct MensagemConversa {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Personalização do assistente (`meu_assessor_ia`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssessorConfig {
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub comportamento: Option<String>,
}
