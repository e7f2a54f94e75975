use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Etapas do Kanban de indicações, na ordem do fluxo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicacaoStatus {
    Criada,
    Formalizada,
    Protocolada,
    Pendente,
    Atendida,
}

impl IndicacaoStatus {
    pub const ALL: [IndicacaoStatus; 5] = [
        IndicacaoStatus::Criada,
        IndicacaoStatus::Formalizada,
        IndicacaoStatus::Protocolada,
        IndicacaoStatus::Pendente,
        IndicacaoStatus::Atendida,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicacaoStatus::Criada => "criada",
            IndicacaoStatus::Formalizada => "formalizada",
            IndicacaoStatus::Protocolada => "protocolada",
            IndicacaoStatus::Pendente => "pendente",
            IndicacaoStatus::Atendida => "atendida",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndicacaoStatus::Criada => "Criada",
            IndicacaoStatus::Formalizada => "Formalizada",
            IndicacaoStatus::Protocolada => "Protocolada",
            IndicacaoStatus::Pendente => "Pendente",
            IndicacaoStatus::Atendida => "Atendida",
        }
    }

    pub fn next(&self) -> Option<IndicacaoStatus> {
        match self {
            IndicacaoStatus::Criada => Some(IndicacaoStatus::Formalizada),
            IndicacaoStatus::Formalizada => Some(IndicacaoStatus::Protocolada),
            IndicacaoStatus::Protocolada => Some(IndicacaoStatus::Pendente),
            IndicacaoStatus::Pendente => Some(IndicacaoStatus::Atendida),
            IndicacaoStatus::Atendida => None,
        }
    }

    pub fn parse(value: &str) -> Option<IndicacaoStatus> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value.trim().to_lowercase())
    }
}

impl fmt::Display for IndicacaoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo de evento gravado em `indicacao_status_events.status`
pub const EVENTO_OBSERVACAO: &str = "observacao";

/// Linha de `indicacoes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicacao {
    pub id: String,
    pub gabinete_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub titulo: String,
    #[serde(default)]
    pub justificativa: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub endereco_rua: Option<String>,
    #[serde(default)]
    pub endereco_bairro: Option<String>,
    #[serde(default)]
    pub endereco_cep: Option<String>,
    #[serde(default)]
    pub eleitor_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub fotos_urls: Option<Vec<String>>,
    /// Status gravado na linha; o status efetivo vem dos eventos
    pub status: String,
    #[serde(default)]
    pub protocol: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Linha de `indicacao_status_events`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub indicacao_id: String,
    /// Um dos cinco status ou `observacao`
    pub status: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub protocolo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn is_observacao(&self) -> bool {
        self.status == EVENTO_OBSERVACAO
    }
}

/// Corpo de `POST /indicacoes`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovaIndicacao {
    pub gabinete_id: String,
    pub titulo: String,
    #[serde(default)]
    pub justificativa: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub endereco_rua: Option<String>,
    #[serde(default)]
    pub endereco_bairro: Option<String>,
    #[serde(default)]
    pub endereco_cep: Option<String>,
    #[serde(default)]
    pub eleitor_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub fotos_urls: Option<Vec<String>>,
}

/// Dados opcionais de uma mudança de status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusChangeOptions {
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub protocolo: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Corpo de `POST /indicacoes/:id/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverStatusRequest {
    pub status: IndicacaoStatus,
    #[serde(flatten)]
    pub options: StatusChangeOptions,
}

/// Indicação com os campos derivados do histórico
///
/// `indicacao.status` e `indicacao.protocol` já trazem os valores efetivos.
#[derive(Debug, Clone, Serialize)]
pub struct IndicacaoView {
    #[serde(flatten)]
    pub indicacao: Indicacao,
    #[serde(rename = "protocol_pdf_url")]
    pub pdf_url: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub eleitor_nome: Option<String>,
    pub status_history: Vec<StatusEvent>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusCount {
    pub status: IndicacaoStatus,
    pub label: &'static str,
    pub quantidade: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BairroRanking {
    pub bairro: String,
    pub quantidade: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndicacaoMetricas {
    pub total: usize,
    pub por_status: Vec<StatusCount>,
    pub taxa_atendimento: f64,
    /// Dias com uma casa decimal, ou "---" sem amostras
    pub lead_time_formalizacao: String,
    pub lead_time_protocolo: String,
    pub lead_time_atendimento: String,
    pub criadas_30_dias: usize,
    pub media_dia: String,
    pub media_semana: String,
    pub media_mes: usize,
    pub ranking_bairros: Vec<BairroRanking>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flow() {
        let mut status = IndicacaoStatus::Criada;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            visited.push(next);
            status = next;
        }
        assert_eq!(visited, IndicacaoStatus::ALL.to_vec());
        assert_eq!(IndicacaoStatus::Atendida.next(), None);
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&IndicacaoStatus::Protocolada).unwrap();
        assert_eq!(json, "\"protocolada\"");
        assert_eq!(IndicacaoStatus::parse(" Pendente "), Some(IndicacaoStatus::Pendente));
        assert_eq!(IndicacaoStatus::parse("observacao"), None);
    }

    #[test]
    fn test_mover_status_request_flatten() {
        let req: MoverStatusRequest = serde_json::from_value(serde_json::json!({
            "status": "protocolada",
            "protocolo": "123/2025"
        }))
        .unwrap();
        assert_eq!(req.status, IndicacaoStatus::Protocolada);
        assert_eq!(req.options.protocolo.as_deref(), Some("123/2025"));
    }
}
