use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::utils::{AppError, AppResult};

/// Arquivo embutido no binário; `config/prompts.yaml` em disco tem precedência
const EMBEDDED_PROMPTS: &str = include_str!("../../config/prompts.yaml");

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Prompts {
    pub comandos_parser: String,
    pub assistente_sistema: String,
    pub analise_sistema: String,
    pub analise_template: String,
    pub justificativa_sistema: String,
    pub justificativa_gerar: String,
    pub correcao_sistema: String,
    pub correcao: String,
    pub revisao_sistema: String,
    pub revisao: String,
}

impl Prompts {
    /// Carrega os prompts de um arquivo YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("Failed to read prompt file: {}", e)))?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> AppResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse YAML: {}", e)))
    }

    /// `config/prompts.yaml` se existir, senão a cópia embutida
    pub fn load_default() -> AppResult<Self> {
        let path = Path::new("config/prompts.yaml");
        if path.exists() {
            return Self::from_file(path);
        }
        Self::embedded()
    }

    pub fn embedded() -> AppResult<Self> {
        Self::from_yaml(EMBEDDED_PROMPTS)
    }
}

/// Substitui `{chave}` pelos valores; chaves desconhecidas ficam intactas
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_prompts_parse() {
        let prompts = Prompts::embedded().unwrap();
        assert!(prompts.comandos_parser.contains("CARGO DO USUÁRIO: {cargo}"));
        assert!(prompts.assistente_sistema.contains("{gabinete_id}"));
        assert!(prompts.analise_template.contains("TEXTO DO PDF:"));
    }

    #[test]
    fn test_fill_keeps_unknown_braces() {
        let out = fill("Olá {nome}, placeholder {CAMPO} e {\"json\": 1}", &[("nome", "Ana")]);
        assert_eq!(out, "Olá Ana, placeholder {CAMPO} e {\"json\": 1}");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        assert!(matches!(
            Prompts::from_yaml("comandos_parser: ["),
            Err(AppError::ConfigError(_))
        ));
    }
}
