use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Corpo de `POST /ia/acoes`
///
/// Sem `action`, o texto livre em `userText` é interpretado.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub gabinete_id: String,
    pub user_role: String,
    #[serde(default)]
    pub user_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Ação extraída de um texto (gramática manual ou IA)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedAction {
    pub action: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
}

fn empty_object() -> Value {
    json!({})
}

impl ParsedAction {
    pub fn new(action: impl Into<String>, parameters: Value) -> Self {
        Self {
            action: action.into(),
            parameters,
        }
    }

    pub fn chat(text: impl Into<String>) -> Self {
        Self::new("chat", json!({ "text": text.into() }))
    }

    /// Parâmetro textual não vazio (após trim)
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn param_list(&self, key: &str) -> Vec<String> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Cargos com acesso ao gabinete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cargo {
    Politico,
    ChefeGabinete,
    Assessor,
    Atendente,
}

impl Cargo {
    pub fn parse(value: &str) -> Option<Cargo> {
        match value.trim() {
            "politico" => Some(Cargo::Politico),
            "chefe_gabinete" => Some(Cargo::ChefeGabinete),
            "assessor" => Some(Cargo::Assessor),
            "atendente" => Some(Cargo::Atendente),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cargo::Politico => "politico",
            Cargo::ChefeGabinete => "chefe_gabinete",
            Cargo::Assessor => "assessor",
            Cargo::Atendente => "atendente",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_request_camel_case() {
        let req: ActionRequest = serde_json::from_value(json!({
            "userId": "u1",
            "gabineteId": "g1",
            "userRole": "assessor",
            "userText": "ajuda"
        }))
        .unwrap();
        assert_eq!(req.user_id, "u1");
        assert_eq!(req.user_text.as_deref(), Some("ajuda"));
        assert!(req.action.is_none());
    }

    #[test]
    fn test_parsed_action_defaults_parameters() {
        let parsed: ParsedAction = serde_json::from_str(r#"{"action":"obter_ajuda"}"#).unwrap();
        assert_eq!(parsed.parameters, json!({}));
        assert_eq!(parsed.param("nome"), None);
    }

    #[test]
    fn test_param_trims_and_skips_empty() {
        let parsed = ParsedAction::new("x", json!({"nome": "  Ana  ", "vazio": "   "}));
        assert_eq!(parsed.param("nome"), Some("Ana"));
        assert_eq!(parsed.param("vazio"), None);
    }
}
