//! Análise de modelos de PDF: heurísticas locais sobre o texto extraído e
//! classificação de campos fixos e variáveis pela IA.

use aho_corasick::{AhoCorasick, MatchKind};
use ia_service::{parse_json_response, ChatCompletion, ChatMessage, ChatRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::prompts::fill;
use crate::config::Prompts;
use crate::models::TemplateAnalysis;
use crate::utils::logging::{log_ai_call, log_ai_error};

const PALAVRAS_TIPO: [(&str, &str); 8] = [
    ("indicação", "indicacao"),
    ("indicacao", "indicacao"),
    ("ofício", "oficio"),
    ("oficio", "oficio"),
    ("projeto de lei", "projeto_lei"),
    ("moção", "mocao"),
    ("mocao", "mocao"),
    ("requerimento", "requerimento"),
];

static DETECTOR_TIPO: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(PALAVRAS_TIPO.iter().map(|(palavra, _)| *palavra))
        .expect("padrões válidos")
});

static CABECALHO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(INDICAÇÃO|INDICACAO|OFÍCIO|OFICIO|PROJETO DE LEI|MOÇÃO|MOCAO)\s*N[ºo°.]*\s*(\d+|X+|_+)\s*/\s*(\d{4}|X{4}|_+)")
        .expect("regex válida")
});

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\[\]\n]{1,40}\]|\{[^{}\n]{1,40}\}|__[A-Za-zÀ-ÿ][A-Za-zÀ-ÿ_]{1,40}__|X{2,4}/X{2,4}").expect("regex válida")
});

static LINHA_ASSINATURA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(_{3,}|-{3,})\s*$").expect("regex válida"));

const MARCAS_RODAPE: [&str; 4] = ["gabinete", "câmara", "vereador", "prefeitura"];

/// Resultado das heurísticas locais, devolvido junto com a análise da IA
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Heuristica {
    pub tipo_detectado: String,
    pub cabecalho: Option<String>,
    pub rodape: Vec<String>,
    pub assinatura: Vec<String>,
    pub placeholders: Vec<String>,
}

/// Tipo mais citado no texto; empate fica com o que aparece primeiro
pub fn detect_document_type(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let mut contagem: Vec<(&'static str, usize, usize)> = Vec::new();

    for m in DETECTOR_TIPO.find_iter(&lower) {
        let tipo = PALAVRAS_TIPO[m.pattern().as_usize()].1;
        match contagem.iter_mut().find(|(t, _, _)| *t == tipo) {
            Some(entrada) => entrada.1 += 1,
            None => contagem.push((tipo, 1, m.start())),
        }
    }

    contagem
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
        .map(|(tipo, _, _)| tipo)
        .unwrap_or("indicacao")
}

pub fn find_header(text: &str) -> Option<String> {
    text.lines()
        .find(|linha| CABECALHO.is_match(linha))
        .map(|linha| linha.trim().to_string())
}

/// Últimas linhas com marcas institucionais, em ordem de leitura
pub fn find_footer(text: &str) -> Vec<String> {
    let linhas: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut rodape: Vec<String> = linhas
        .iter()
        .rev()
        .take(8)
        .filter(|linha| {
            let lower = linha.to_lowercase();
            MARCAS_RODAPE.iter().any(|marca| lower.contains(marca))
        })
        .map(|linha| linha.to_string())
        .collect();
    rodape.reverse();
    rodape
}

/// Linhas logo abaixo da linha de assinatura
pub fn find_signature(text: &str) -> Vec<String> {
    let linhas: Vec<&str> = text.lines().collect();
    let Some(pos) = linhas.iter().rposition(|l| LINHA_ASSINATURA.is_match(l)) else {
        return Vec::new();
    };
    linhas[pos + 1..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .take(3)
        .map(str::to_string)
        .collect()
}

/// Placeholders distintos na ordem em que aparecem
pub fn find_placeholders(text: &str) -> Vec<String> {
    let mut encontrados: Vec<String> = Vec::new();
    for m in PLACEHOLDER.find_iter(text) {
        let valor = m.as_str().to_string();
        if !encontrados.contains(&valor) {
            encontrados.push(valor);
        }
    }
    encontrados
}

pub fn heuristica(text: &str) -> Heuristica {
    Heuristica {
        tipo_detectado: detect_document_type(text).to_string(),
        cabecalho: find_header(text),
        rodape: find_footer(text),
        assinatura: find_signature(text),
        placeholders: find_placeholders(text),
    }
}

/// Classificação pela IA; sem IA ou em qualquer falha, a análise padrão do tipo
pub async fn analise_ia(
    ia: Option<&dyn ChatCompletion>,
    prompts: &Prompts,
    model: &str,
    template_type: &str,
    texto: &str,
) -> Value {
    let padrao = || serde_json::to_value(TemplateAnalysis::default_for(template_type)).unwrap_or(Value::Null);

    let Some(ia) = ia else {
        return padrao();
    };

    let prompt = fill(
        &prompts.analise_template,
        &[
            ("tipo", template_type),
            ("tipo_maiusculo", &template_type.to_uppercase()),
            ("texto", texto),
        ],
    );
    let request = ChatRequest::new(vec![
        ChatMessage::system(prompts.analise_sistema.as_str()),
        ChatMessage::user(prompt),
    ])
    .with_model(model)
    .with_temperature(0.1)
    .with_max_tokens(3000);

    log_ai_call("análise de modelo", model);
    match ia.complete(request).await {
        Ok(resposta) => match parse_json_response::<Value>(&resposta) {
            Ok(analise) if analise.is_object() => analise,
            Ok(_) => padrao(),
            Err(e) => {
                log_ai_error("análise de modelo", &e.to_string());
                padrao()
            }
        },
        Err(e) => {
            log_ai_error("análise de modelo", &e.to_string());
            padrao()
        }
    }
}
