use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Corpo de `POST /documentos/analisar`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalisarTemplateRequest {
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub template_type: Option<String>,
}

/// Dados da indicação enviados pelo editor de documentos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicacaoData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub endereco: Option<String>,
    #[serde(default)]
    pub justificativa: Option<String>,
    #[serde(default)]
    pub autor: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Corpo de `POST /documentos/gerar`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GerarDocumentoRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub gabinete_name: Option<String>,
    #[serde(default)]
    pub indicacao_data: Option<IndicacaoData>,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
    #[serde(default)]
    pub correction_prompt: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Linha de `document_templates`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub id: String,
    pub gabinete_id: String,
    #[serde(default)]
    pub original_pdf_url: Option<String>,
    #[serde(default)]
    pub template_analysis: Option<Value>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Campo variável identificado num modelo
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableField {
    #[serde(default, alias = "name")]
    pub field_name: String,
    #[serde(default, alias = "placeholder_found", skip_serializing_if = "Option::is_none")]
    pub placeholder_text: Option<String>,
    #[serde(default, alias = "position_description", skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

impl VariableField {
    fn new(name: &str, placeholder: &str, position: &str, field_type: &str) -> Self {
        Self {
            field_name: name.to_string(),
            placeholder_text: Some(placeholder.to_string()),
            position: Some(position.to_string()),
            field_type: Some(field_type.to_string()),
        }
    }
}

/// Resultado da análise de um modelo de PDF
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateAnalysis {
    #[serde(default)]
    pub fixed_elements: Vec<Value>,
    #[serde(default)]
    pub variable_fields: Vec<VariableField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_structure: Option<Value>,
    #[serde(default)]
    pub layout_preserved: bool,
    #[serde(default)]
    pub confidence: u32,
}

impl TemplateAnalysis {
    /// Análise usada quando a IA falha ou responde fora do formato
    pub fn default_for(template_type: &str) -> Self {
        let variable_fields = if template_type == "indicacao" {
            vec![
                VariableField::new("NUMERO_INDICACAO", "Nº XXX/XXXX", "cabeçalho superior direito", "text"),
                VariableField::new("ENDERECO", "[ENDEREÇO]", "primeiro parágrafo", "address"),
                VariableField::new("JUSTIFICATIVA", "[JUSTIFICATIVA]", "corpo do documento", "long_text"),
                VariableField::new("DATA", "[DATA]", "final do documento", "date"),
                VariableField::new("AUTOR", "[VEREADOR]", "assinatura", "text"),
            ]
        } else {
            vec![
                VariableField::new("NUMERO_DOCUMENTO", "Nº XXX/XXXX", "cabeçalho", "text"),
                VariableField::new("CONTEUDO", "[CONTEÚDO]", "corpo", "long_text"),
                VariableField::new("DATA", "[DATA]", "final", "date"),
            ]
        };

        Self {
            fixed_elements: vec![
                Value::from("Cabeçalho institucional"),
                Value::from("Logomarca"),
                Value::from("Rodapé de autenticação"),
                Value::from("Assinatura digital"),
            ],
            variable_fields,
            document_structure: None,
            layout_preserved: true,
            confidence: 80,
        }
    }
}

/// Substituição de um placeholder por um valor real
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Replacement {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}
