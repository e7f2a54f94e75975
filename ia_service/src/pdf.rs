//! Extração de texto de PDFs
//!
//! Primeiro tenta o `lopdf`; se não sair texto, varre os blocos `BT ... ET`
//! do arquivo bruto.

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{IaResult, IaServiceError};

pub const NO_TEXT_MESSAGE: &str =
    "Não foi possível extrair texto do PDF. Arquivo pode estar em formato de imagem ou protegido.";

static TEXT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)BT\s*(.*?)\s*ET").expect("regex válida"));
static FONT_OP: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\w+\s+\d+(\.\d+)?\s+Tf").expect("regex válida"));
static POSITION_OP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(\.\d+)?\s+\d+(\.\d+)?\s+Td").expect("regex válida"));
static LEADING_OP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?\s+TL").expect("regex válida"));
static SHOW_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)\s*Tj").expect("regex válida"));
static SHOW_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\s*TJ").expect("regex válida"));
static LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]+)\)").expect("regex válida"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("regex válida"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\sÀ-ÿ.,;:!?()\[\]{}/\\-]").expect("regex válida"));

/// Extrai texto com `lopdf` (todas as páginas)
pub fn extract_pdf_text(pdf_bytes: &[u8]) -> IaResult<String> {
    tracing::info!("📄 Extraindo texto do PDF localmente: {} bytes", pdf_bytes.len());

    let document = Document::load_mem(pdf_bytes)
        .map_err(|e| IaServiceError::PdfError(format!("Failed to load PDF: {}", e)))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let text = document
        .extract_text(&page_numbers)
        .map_err(|e| IaServiceError::PdfError(format!("Failed to extract text: {}", e)))?;

    if text.trim().is_empty() {
        tracing::warn!("⚠️ Nenhum texto extraído do PDF (pode ser PDF de imagens/escaneado)");
        return Err(IaServiceError::PdfError(
            "PDF não contém texto extraível (pode ser PDF escaneado/imagem)".to_string(),
        ));
    }

    Ok(text)
}

/// Varredura bruta dos operadores de texto
pub fn extract_raw_text(pdf_bytes: &[u8]) -> String {
    // latin-1: cada byte vira um code point
    let raw: String = pdf_bytes.iter().map(|&b| b as char).collect();
    let mut content = String::new();

    for block in TEXT_BLOCK.captures_iter(&raw) {
        let Some(inner) = block.get(1) else { continue };
        let cleaned = FONT_OP.replace_all(inner.as_str(), "");
        let cleaned = POSITION_OP.replace_all(&cleaned, "");
        let cleaned = LEADING_OP.replace_all(&cleaned, "");
        let cleaned = SHOW_TEXT.replace_all(&cleaned, "$1 ");
        let cleaned = SHOW_ARRAY.replace_all(&cleaned, |caps: &regex::Captures| {
            format!("{} ", caps[1].replace(['(', ')'], ""))
        });
        content.push_str(&cleaned);
        content.push('\n');
    }

    if content.trim().chars().count() < 50 {
        for literal in LITERAL.captures_iter(&raw) {
            let value = &literal[1];
            if value.chars().count() > 2 {
                content.push_str(value);
                content.push(' ');
            }
        }
    }

    let collapsed = WHITESPACE.replace_all(&content, " ");
    DISALLOWED.replace_all(&collapsed, "").trim().to_string()
}

/// `lopdf` primeiro, depois a varredura bruta; nunca falha
pub fn extract_text(pdf_bytes: &[u8]) -> String {
    match extract_pdf_text(pdf_bytes) {
        Ok(text) => return text,
        Err(e) => tracing::debug!("lopdf sem texto, usando extração bruta: {}", e),
    }

    let raw = extract_raw_text(pdf_bytes);
    if raw.is_empty() {
        NO_TEXT_MESSAGE.to_string()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn build_pdf(line: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 712.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extract_text_from_generated_pdf() {
        let bytes = build_pdf("INDICACAO N 001/2025");
        let text = extract_text(&bytes);
        assert!(text.contains("INDICACAO"), "texto extraído: {}", text);
    }

    #[test]
    fn test_raw_extraction_reads_tj_and_tj_arrays() {
        let raw = b"%PDF-1.4\nstream\n\
            BT /F1 12 Tf 72 712 Td (Senhor Presidente da Camara Municipal) Tj ET\n\
            BT /F2 11 Tf 14 TL [(Indica ao Poder Executivo) -250 (a poda de arvores)] TJ ET\n\
            endstream";

        let text = extract_raw_text(raw);
        assert!(text.starts_with("Senhor Presidente da Camara Municipal"));
        assert!(text.contains("Indica ao Poder Executivo"));
        assert!(text.contains("a poda de arvores"));
        assert!(!text.contains("Tf"));
    }

    #[test]
    fn test_raw_extraction_falls_back_to_literals() {
        let raw = b"garbage (Vereador Joao) (ab) more garbage";
        assert_eq!(extract_raw_text(raw), "Vereador Joao");
    }

    #[test]
    fn test_unreadable_bytes_return_message() {
        assert_eq!(extract_text(b"\x00\x01\x02"), NO_TEXT_MESSAGE);
    }
}
