//! Preparação dos valores de uma indicação antes da renderização

use chrono::{Datelike, NaiveDate};
use ia_service::{ChatCompletion, ChatMessage, ChatRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::render::CamposRender;
use crate::config::prompts::fill;
use crate::config::Prompts;
use crate::models::{IndicacaoData, Replacement};
use crate::utils::logging::{log_ai_call, log_ai_error};

const MESES: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro", "outubro",
    "novembro", "dezembro",
];

static ABREVIACOES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bTrav\.\s*", "Travessa "),
        (r"(?i)\bRod\.\s*", "Rodovia "),
        (r"(?i)\bStr\.\s*", "Rua "),
        (r"(?i)\bEst\.\s*", "Estrada "),
        (r"(?i)\bAv\.\s*", "Avenida "),
        (r"(?i)\bAl\.\s*", "Alameda "),
        (r"(?i)\bPç\.\s*", "Praça "),
        (r"(?i)\bR\.\s*", "Rua "),
    ]
    .into_iter()
    .map(|(padrao, nome)| (Regex::new(padrao).expect("regex válida"), nome))
    .collect()
});

/// Placeholders usados quando o modelo não tem análise de campos
const PLACEHOLDERS_PADRAO: [(&str, &str); 6] = [
    ("NUMERO_INDICACAO", "XXX/XXXX"),
    ("TITULO", "[TÍTULO]"),
    ("ENDERECO", "[ENDEREÇO]"),
    ("JUSTIFICATIVA", "[JUSTIFICATIVA]"),
    ("DATA", "[DATA]"),
    ("AUTOR", "[NOME DO VEREADOR]"),
];

pub fn formatar_endereco(endereco: &str) -> String {
    let expandido = ABREVIACOES
        .iter()
        .fold(endereco.trim().to_string(), |acc, (regex, nome)| {
            regex.replace_all(&acc, *nome).into_owned()
        });

    expandido
        .split(',')
        .map(str::trim)
        .filter(|parte| !parte.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn formatar_data_extenso(data: NaiveDate, cidade: &str) -> String {
    format!(
        "{}, {:02} de {} de {}",
        cidade,
        data.day(),
        MESES[data.month0() as usize],
        data.year()
    )
}

fn justificativa_padrao(titulo: &str, endereco: &str) -> String {
    format!(
        "A presente indicação visa atender uma demanda importante da comunidade relacionada a {}. \n\
         A solicitação para o endereço {} se justifica pela necessidade de melhoria da qualidade de vida dos cidadãos e pelo interesse público envolvido. \n\
         É de fundamental importância que o poder público atenda às necessidades da população, promovendo melhorias que beneficiem a coletividade.",
        titulo, endereco
    )
}

/// Cliente de IA e prompts usados na redação
pub struct Redator<'a> {
    pub ia: Option<&'a dyn ChatCompletion>,
    pub prompts: &'a Prompts,
    pub model: &'a str,
}

impl Redator<'_> {
    /// Corrige, revisa ou gera a justificativa conforme o que já existe
    pub async fn justificativa(
        &self,
        titulo: &str,
        endereco: &str,
        original: Option<&str>,
        correcao: Option<&str>,
    ) -> String {
        let original = original.map(str::trim).filter(|t| !t.is_empty());
        let correcao = correcao.map(str::trim).filter(|c| !c.is_empty());

        match (original, correcao) {
            (Some(texto), Some(correcao)) => {
                let prompt = fill(
                    &self.prompts.correcao,
                    &[("texto", texto), ("correcao", correcao), ("titulo", titulo), ("endereco", endereco)],
                );
                self.pedir("correção de justificativa", &self.prompts.correcao_sistema, prompt, 0.2, 1500)
                    .await
                    .unwrap_or_else(|| texto.to_string())
            }
            (Some(texto), None) if texto.chars().count() >= 100 => {
                let prompt = fill(&self.prompts.revisao, &[("texto", texto)]);
                self.pedir("revisão de justificativa", &self.prompts.revisao_sistema, prompt, 0.1, 1000)
                    .await
                    .unwrap_or_else(|| texto.to_string())
            }
            (original, _) => {
                let prompt = fill(
                    &self.prompts.justificativa_gerar,
                    &[
                        ("titulo", titulo),
                        ("endereco", endereco),
                        ("original", original.unwrap_or("Não fornecida")),
                    ],
                );
                self.pedir("geração de justificativa", &self.prompts.justificativa_sistema, prompt, 0.2, 1500)
                    .await
                    .unwrap_or_else(|| justificativa_padrao(titulo, endereco))
            }
        }
    }

    async fn pedir(&self, proposito: &str, sistema: &str, prompt: String, temperature: f32, max_tokens: u32) -> Option<String> {
        let ia = self.ia?;
        let request = ChatRequest::new(vec![ChatMessage::system(sistema), ChatMessage::user(prompt)])
            .with_model(self.model)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        log_ai_call(proposito, self.model);
        match ia.complete(request).await {
            Ok(texto) if !texto.trim().is_empty() => Some(texto.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                log_ai_error(proposito, &e.to_string());
                None
            }
        }
    }
}

/// Valores calculados para a geração
pub struct Valores<'a> {
    pub numero: &'a str,
    pub indicacao: &'a IndicacaoData,
    pub endereco: &'a str,
    pub justificativa: &'a str,
    pub data: &'a str,
    pub gabinete_name: Option<&'a str>,
    pub logo_url: Option<&'a str>,
    pub photos: &'a [String],
}

/// Variáveis do documento; as do chamador sobrescrevem as calculadas
pub fn montar_variaveis(valores: &Valores<'_>, extras: Option<&Map<String, Value>>) -> Map<String, Value> {
    let autor = valores
        .indicacao
        .autor
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .or(valores.gabinete_name)
        .unwrap_or("");
    let logo = valores
        .logo_url
        .map(str::to_string)
        .or_else(|| extras.and_then(|e| e.get("logoUrl")).and_then(Value::as_str).map(str::to_string));

    let mut variaveis = Map::new();
    variaveis.insert("NUMERO_INDICACAO".into(), valores.numero.into());
    variaveis.insert("TITULO".into(), valores.indicacao.titulo.as_str().into());
    variaveis.insert("ENDERECO".into(), valores.endereco.into());
    variaveis.insert("JUSTIFICATIVA".into(), valores.justificativa.into());
    variaveis.insert("DATA".into(), valores.data.into());
    variaveis.insert("AUTOR".into(), autor.into());
    variaveis.insert("LOGO".into(), logo.map(Value::from).unwrap_or(Value::Null));
    variaveis.insert("FOTOS".into(), Value::from(valores.photos.to_vec()));

    if let Some(extras) = extras {
        for (chave, valor) in extras {
            variaveis.insert(chave.clone(), valor.clone());
        }
    }
    variaveis
}

fn texto_variavel(variaveis: &Map<String, Value>, chave: &str) -> Option<String> {
    match variaveis.get(chave)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Substituições a partir dos campos da análise ou da lista padrão
pub fn montar_substituicoes(analise: Option<&Value>, variaveis: &Map<String, Value>) -> Vec<Replacement> {
    let campos = analise
        .and_then(|a| a.get("variable_fields"))
        .and_then(Value::as_array)
        .filter(|campos| !campos.is_empty());

    let pares: Vec<(String, String)> = match campos {
        Some(campos) => campos
            .iter()
            .filter_map(|campo| {
                let nome = campo
                    .get("field_name")
                    .or_else(|| campo.get("name"))
                    .and_then(Value::as_str)?;
                let placeholder = campo
                    .get("placeholder_found")
                    .or_else(|| campo.get("placeholder_text"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("[{}]", nome));
                Some((nome.to_string(), placeholder))
            })
            .collect(),
        None => PLACEHOLDERS_PADRAO
            .iter()
            .map(|(nome, placeholder)| (nome.to_string(), placeholder.to_string()))
            .collect(),
    };

    pares
        .into_iter()
        .filter_map(|(field, old_value)| {
            let new_value = texto_variavel(variaveis, &field)?;
            Some(Replacement {
                field,
                old_value,
                new_value,
            })
        })
        .collect()
}

/// Carimbos vêm das substituições; o corpo é sempre reescrito
pub fn campos_render(substituicoes: &[Replacement], variaveis: &Map<String, Value>) -> CamposRender {
    let valor = |campo: &str| {
        substituicoes
            .iter()
            .find(|r| r.field == campo)
            .map(|r| r.new_value.clone())
    };
    let corpo = |campo: &str| valor(campo).or_else(|| texto_variavel(variaveis, campo));

    CamposRender {
        numero: valor("NUMERO_INDICACAO"),
        titulo: corpo("TITULO"),
        endereco: corpo("ENDERECO"),
        justificativa: corpo("JUSTIFICATIVA"),
        data: valor("DATA"),
        autor: valor("AUTOR"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeChat, FakeReply};
    use serde_json::json;

    #[test]
    fn test_formatar_endereco() {
        assert_eq!(
            formatar_endereco("R. das Palmeiras,120 ,  Jardim Camburi"),
            "Rua das Palmeiras, 120, Jardim Camburi"
        );
        assert_eq!(formatar_endereco("av.Norte Sul, 300"), "Avenida Norte Sul, 300");
        assert_eq!(formatar_endereco("Trav. São João"), "Travessa São João");
        assert_eq!(formatar_endereco("Rua Dr. Eurico"), "Rua Dr. Eurico");
    }

    #[test]
    fn test_formatar_data_extenso() {
        let data = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(formatar_data_extenso(data, "Vitória"), "Vitória, 05 de março de 2025");
    }

    fn redator<'a>(fake: &'a FakeChat, prompts: &'a Prompts) -> Redator<'a> {
        Redator {
            ia: Some(fake as &dyn ChatCompletion),
            prompts,
            model: "openai/gpt-4o",
        }
    }

    #[tokio::test]
    async fn test_justificativa_gerada_quando_curta() {
        let prompts = Prompts::embedded().unwrap();
        let fake = FakeChat::replying(&["Texto gerado."]);

        let texto = redator(&fake, &prompts)
            .justificativa("Poda de árvore", "Rua A", Some("curta"), None)
            .await;
        assert_eq!(texto, "Texto gerado.");

        let enviado = fake.last_request().unwrap();
        assert_eq!(enviado.max_tokens, Some(1500));
        assert!(enviado.messages[1].content.contains("JUSTIFICATIVA ORIGINAL: curta"));
    }

    #[tokio::test]
    async fn test_justificativa_revisada_ou_corrigida() {
        let prompts = Prompts::embedded().unwrap();
        let longa = "a".repeat(120);

        let fake = FakeChat::with(FakeReply::Failure);
        let texto = redator(&fake, &prompts).justificativa("T", "E", Some(longa.as_str()), None).await;
        assert_eq!(texto, longa);
        assert_eq!(fake.last_request().unwrap().temperature, Some(0.1));

        let fake = FakeChat::replying(&["corrigido"]);
        let texto = redator(&fake, &prompts)
            .justificativa("T", "E", Some("original"), Some("mais formal"))
            .await;
        assert_eq!(texto, "corrigido");
        assert!(fake.last_request().unwrap().messages[1].content.contains("mais formal"));
    }

    #[tokio::test]
    async fn test_justificativa_padrao_sem_ia() {
        let prompts = Prompts::embedded().unwrap();
        let redator = Redator {
            ia: None,
            prompts: &prompts,
            model: "m",
        };
        let texto = redator.justificativa("iluminação", "Rua B", None, None).await;
        assert!(texto.starts_with("A presente indicação visa atender"));
        assert!(texto.contains("relacionada a iluminação"));
        assert_eq!(texto.lines().count(), 3);
    }

    fn variaveis() -> Map<String, Value> {
        let indicacao = IndicacaoData {
            titulo: "Poda".to_string(),
            ..Default::default()
        };
        let photos = vec!["https://fotos/1.jpg".to_string()];
        let valores = Valores {
            numero: "001/2025",
            indicacao: &indicacao,
            endereco: "Rua A",
            justificativa: "Texto",
            data: "Vitória, 01 de janeiro de 2025",
            gabinete_name: Some("Gabinete da Vereadora Ana"),
            logo_url: None,
            photos: &photos,
        };
        let extras = json!({"logoUrl": "https://logo.png", "DATA": "data manual"});
        montar_variaveis(&valores, extras.as_object())
    }

    #[test]
    fn test_montar_variaveis() {
        let vars = variaveis();
        assert_eq!(vars["AUTOR"], "Gabinete da Vereadora Ana");
        assert_eq!(vars["LOGO"], "https://logo.png");
        assert_eq!(vars["DATA"], "data manual");
        assert_eq!(vars["FOTOS"], json!(["https://fotos/1.jpg"]));
    }

    #[test]
    fn test_substituicoes_da_analise_e_padrao() {
        let mut vars = variaveis();
        vars.insert("ENDERECO".into(), "".into());

        let analise = json!({"variable_fields": [
            {"field_name": "NUMERO_INDICACAO", "placeholder_found": "Nº ___/____"},
            {"name": "ENDERECO", "placeholder_text": "[ENDEREÇO]"},
            {"field_name": "CAMPO_EXTRA"}
        ]});
        let subs = montar_substituicoes(Some(&analise), &vars);
        assert_eq!(
            subs,
            vec![Replacement {
                field: "NUMERO_INDICACAO".into(),
                old_value: "Nº ___/____".into(),
                new_value: "001/2025".into(),
            }]
        );

        let padrao = montar_substituicoes(None, &vars);
        let campos: Vec<&str> = padrao.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(campos, vec!["NUMERO_INDICACAO", "TITULO", "JUSTIFICATIVA", "DATA", "AUTOR"]);
    }

    #[test]
    fn test_campos_render_usa_variaveis_no_corpo() {
        let vars = variaveis();
        let subs = vec![Replacement {
            field: "NUMERO_INDICACAO".into(),
            old_value: "XXX/XXXX".into(),
            new_value: "001/2025".into(),
        }];

        let campos = campos_render(&subs, &vars);
        assert_eq!(campos.numero.as_deref(), Some("001/2025"));
        assert_eq!(campos.titulo.as_deref(), Some("Poda"));
        assert_eq!(campos.justificativa.as_deref(), Some("Texto"));
        assert!(campos.data.is_none());
        assert!(campos.autor.is_none());
    }
}
