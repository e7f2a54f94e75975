//! Análise de modelos de PDF e geração de indicações a partir deles

pub mod analise;
pub mod geracao;
pub mod render;

use chrono::{DateTime, Datelike, Utc};
use futures_util::future::join_all;
use ia_service::{download_bytes, pdf, ChatCompletion};
use serde_json::{json, Value};
use std::sync::Arc;
use supabase::{Query, StorageBackend, TableBackend, TableBackendExt};
use tracing::{info, warn};

use crate::config::Prompts;
use crate::models::{AnalisarTemplateRequest, DocumentTemplate, GerarDocumentoRequest, IndicacaoData};
use crate::services::indicacoes::IndicacoesService;
use crate::utils::{AppError, AppResult};

use geracao::{campos_render, formatar_data_extenso, formatar_endereco, montar_substituicoes, montar_variaveis, Redator, Valores};
use render::{render_indicacao, FotoJpeg};

pub const TABELA_MODELOS: &str = "document_templates";
pub const TABELA_GERACOES: &str = "document_generations";

/// Sufixo aleatório evita que duas gerações no mesmo milissegundo se sobrescrevam
pub fn caminho_gerado(agora: DateTime<Utc>) -> String {
    let sufixo = uuid::Uuid::new_v4().simple().to_string();
    format!("generated/indicacao-{}-{}.pdf", agora.timestamp_millis(), &sufixo[..8])
}

pub struct DocumentosService {
    db: Arc<dyn TableBackend>,
    storage: Arc<dyn StorageBackend>,
    ia: Option<Arc<dyn ChatCompletion>>,
    http: reqwest::Client,
    prompts: Arc<Prompts>,
    document_model: String,
    cidade: String,
    bucket: String,
    indicacoes: IndicacoesService,
}

impl DocumentosService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<dyn TableBackend>,
        storage: Arc<dyn StorageBackend>,
        ia: Option<Arc<dyn ChatCompletion>>,
        http: reqwest::Client,
        prompts: Arc<Prompts>,
        document_model: impl Into<String>,
        cidade: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            indicacoes: IndicacoesService::new(db.clone()),
            db,
            storage,
            ia,
            http,
            prompts,
            document_model: document_model.into(),
            cidade: cidade.into(),
            bucket: bucket.into(),
        }
    }

    pub async fn analisar_template(&self, request: AnalisarTemplateRequest) -> AppResult<Value> {
        let (Some(pdf_url), Some(template_type)) = (
            request.pdf_url.filter(|u| !u.trim().is_empty()),
            request.template_type.filter(|t| !t.trim().is_empty()),
        ) else {
            return Err(AppError::ValidationError("pdfUrl e templateType são obrigatórios".to_string()));
        };

        info!("📄 Analisando modelo {} ({})", pdf_url, template_type);
        let bytes = download_bytes(&self.http, &pdf_url).await?;
        let texto = pdf::extract_text(&bytes);

        let heuristica = analise::heuristica(&texto);
        let analysis = analise::analise_ia(
            self.ia.as_deref(),
            &self.prompts,
            &self.document_model,
            &template_type,
            &texto,
        )
        .await;

        Ok(json!({
            "success": true,
            "analysis": analysis,
            "heuristica": heuristica,
            "message": "PDF template analyzed successfully",
        }))
    }

    pub async fn carregar_template(&self, template_id: &str) -> AppResult<DocumentTemplate> {
        self.db
            .select_one_as(TABELA_MODELOS, &Query::new().eq("id", template_id).limit(1))
            .await?
            .ok_or_else(|| AppError::NotFound("Template não encontrado".to_string()))
    }

    pub async fn gerar_documento(&self, request: GerarDocumentoRequest, user_id: Option<&str>) -> AppResult<Value> {
        let (Some(template_id), Some(indicacao)) = (
            request.template_id.clone().filter(|t| !t.trim().is_empty()),
            request.indicacao_data.clone(),
        ) else {
            return Err(AppError::ValidationError(
                "templateId e indicacaoData são obrigatórios".to_string(),
            ));
        };

        let template = self.carregar_template(&template_id).await?;

        match self.gerar(&template, &indicacao, &request, user_id).await {
            Ok(resposta) => Ok(resposta),
            Err(e) => {
                let registro = json!({
                    "template_id": template.id,
                    "gabinete_id": template.gabinete_id,
                    "related_entity_type": "indicacao",
                    "related_entity_id": indicacao.id,
                    "generation_status": "error",
                    "error_details": e.to_string(),
                    "created_by": user_id,
                });
                if let Err(erro_registro) = self.db.insert(TABELA_GERACOES, registro).await {
                    warn!("⚠️ Falha ao registrar erro de geração: {}", erro_registro);
                }
                Err(e)
            }
        }
    }

    async fn gerar(
        &self,
        template: &DocumentTemplate,
        indicacao: &IndicacaoData,
        request: &GerarDocumentoRequest,
        user_id: Option<&str>,
    ) -> AppResult<Value> {
        let agora = Utc::now();
        let numero = self
            .indicacoes
            .proximo_numero(&template.gabinete_id, agora.year())
            .await?;
        let endereco = formatar_endereco(indicacao.endereco.as_deref().unwrap_or(""));

        let redator = Redator {
            ia: self.ia.as_deref(),
            prompts: &self.prompts,
            model: &self.document_model,
        };
        let justificativa = redator
            .justificativa(
                &indicacao.titulo,
                &endereco,
                indicacao.justificativa.as_deref(),
                request.correction_prompt.as_deref(),
            )
            .await;
        let data = formatar_data_extenso(agora.date_naive(), &self.cidade);

        let variaveis = montar_variaveis(
            &Valores {
                numero: &numero,
                indicacao,
                endereco: &endereco,
                justificativa: &justificativa,
                data: &data,
                gabinete_name: request.gabinete_name.as_deref(),
                logo_url: template.logo_url.as_deref(),
                photos: &request.photos,
            },
            request.variables.as_ref(),
        );
        let substituicoes = montar_substituicoes(template.template_analysis.as_ref(), &variaveis);
        let campos = campos_render(&substituicoes, &variaveis);

        let pdf_url = template
            .original_pdf_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::ValidationError("Template sem PDF original".to_string()))?;
        let original = download_bytes(&self.http, pdf_url).await?;
        let fotos = self.baixar_fotos(&request.photos).await;

        let bytes = match render_indicacao(&original, &campos, &fotos) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("⚠️ Falha ao renderizar indicação, mantendo PDF original: {}", e);
                original
            }
        };

        let path = caminho_gerado(agora);
        self.storage
            .upload(&self.bucket, &path, bytes, "application/pdf", true)
            .await?;
        let url = self.storage.public_url(&self.bucket, &path);

        let geracao = self
            .db
            .insert(
                TABELA_GERACOES,
                json!({
                    "template_id": template.id,
                    "gabinete_id": template.gabinete_id,
                    "related_entity_type": "indicacao",
                    "related_entity_id": indicacao.id,
                    "variables_used": variaveis,
                    "generated_pdf_url": url,
                    "generation_status": "success",
                    "created_by": user_id,
                }),
            )
            .await?;

        info!("✅ Indicação {} gerada: {}", numero, url);
        Ok(json!({
            "success": true,
            "generatedPdfUrl": url,
            "variables": variaveis,
            "numeroIndicacao": numero,
            "generationId": geracao.get("id").cloned().unwrap_or(Value::Null),
        }))
    }

    /// Fotos que não baixam ou não são JPEG ficam de fora
    async fn baixar_fotos(&self, urls: &[String]) -> Vec<FotoJpeg> {
        let downloads = urls
            .iter()
            .filter(|u| !u.trim().is_empty())
            .map(|url| async move { (url, download_bytes(&self.http, url).await) });

        join_all(downloads)
            .await
            .into_iter()
            .filter_map(|(url, resultado)| match resultado {
                Ok(bytes) => {
                    let foto = FotoJpeg::from_bytes(bytes);
                    if foto.is_none() {
                        warn!("⚠️ Foto ignorada (não é JPEG): {}", url);
                    }
                    foto
                }
                Err(e) => {
                    warn!("⚠️ Foto ignorada ({}): {}", url, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::render::tests::{jpeg_minimo, modelo_pdf};
    use super::*;
    use crate::test_support::FakeChat;
    use httpmock::prelude::*;
    use supabase::MemoryBackend;

    fn service(db: Arc<MemoryBackend>, ia: Option<Arc<dyn ChatCompletion>>) -> DocumentosService {
        DocumentosService::new(
            db.clone(),
            db,
            ia,
            reqwest::Client::new(),
            Arc::new(Prompts::embedded().unwrap()),
            "openai/gpt-4o",
            "Vitória",
            "uploads",
        )
    }

    #[tokio::test]
    async fn test_analisar_template_campos_obrigatorios() {
        let service = service(Arc::new(MemoryBackend::new()), None);
        let erro = service
            .analisar_template(AnalisarTemplateRequest {
                pdf_url: Some("https://x/modelo.pdf".to_string()),
                template_type: None,
            })
            .await
            .unwrap_err();
        assert_eq!(erro.message(), "pdfUrl e templateType são obrigatórios");
    }

    #[tokio::test]
    async fn test_analisar_template_sem_ia_usa_padrao() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/modelo.pdf");
            then.status(200).body(modelo_pdf("INDICACAO N XXX/XXXX"));
        });

        let service = service(Arc::new(MemoryBackend::new()), None);
        let resposta = service
            .analisar_template(AnalisarTemplateRequest {
                pdf_url: Some(server.url("/modelo.pdf")),
                template_type: Some("indicacao".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(resposta["success"], true);
        assert_eq!(resposta["analysis"]["confidence"], 80);
        assert_eq!(resposta["heuristica"]["tipo_detectado"], "indicacao");
    }

    fn pedido(template_id: &str, photos: Vec<String>) -> GerarDocumentoRequest {
        GerarDocumentoRequest {
            template_id: Some(template_id.to_string()),
            gabinete_name: Some("Gabinete da Vereadora Ana".to_string()),
            indicacao_data: Some(IndicacaoData {
                id: Some("ind-1".to_string()),
                titulo: "Poda de árvores".to_string(),
                endereco: Some("R. das Palmeiras, 120".to_string()),
                ..Default::default()
            }),
            photos,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_gerar_documento_completo() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/modelo.pdf");
            then.status(200).body(modelo_pdf("modelo"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/foto.jpg");
            then.status(200).body(jpeg_minimo(400, 300));
        });
        server.mock(|when, then| {
            when.method(GET).path("/foto.png");
            then.status(200).body(b"\x89PNG\r\n\x1a\n".to_vec());
        });

        let db = Arc::new(MemoryBackend::new());
        db.seed(
            TABELA_MODELOS,
            vec![json!({"id": "t1", "gabinete_id": "gab-1", "original_pdf_url": server.url("/modelo.pdf")})],
        );
        db.seed("indicacoes", vec![json!({"id": "i0", "gabinete_id": "gab-1", "titulo": "Anterior"})]);

        let fake = Arc::new(FakeChat::replying(&["Justificativa redigida."]));
        let service = service(db.clone(), Some(fake.clone() as Arc<dyn ChatCompletion>));

        let resposta = service
            .gerar_documento(
                pedido("t1", vec![server.url("/foto.jpg"), server.url("/foto.png")]),
                Some("u1"),
            )
            .await
            .unwrap();

        let ano = Utc::now().year();
        assert_eq!(resposta["numeroIndicacao"], format!("002/{}", ano));
        assert_eq!(resposta["variables"]["ENDERECO"], "Rua das Palmeiras, 120");
        assert_eq!(resposta["variables"]["JUSTIFICATIVA"], "Justificativa redigida.");
        assert_eq!(resposta["variables"]["AUTOR"], "Gabinete da Vereadora Ana");

        let url = resposta["generatedPdfUrl"].as_str().unwrap();
        let path = url.split("/uploads/").nth(1).unwrap();
        assert!(path.starts_with("generated/indicacao-"));
        let objeto = db.object("uploads", path).unwrap();
        assert_eq!(objeto.content_type, "application/pdf");

        let gerado = lopdf::Document::load_mem(&objeto.bytes).unwrap();
        assert_eq!(gerado.get_pages().len(), 2);

        let geracao = &db.rows(TABELA_GERACOES)[0];
        assert_eq!(geracao["generation_status"], "success");
        assert_eq!(geracao["created_by"], "u1");
        assert_eq!(resposta["generationId"], geracao["id"]);
    }

    #[test]
    fn test_caminho_gerado_unico_no_mesmo_instante() {
        let agora = Utc::now();
        let a = caminho_gerado(agora);
        let b = caminho_gerado(agora);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("generated/indicacao-{}-", agora.timestamp_millis())));
        assert!(a.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_gerar_documento_template_inexistente() {
        let service = service(Arc::new(MemoryBackend::new()), None);
        assert!(matches!(
            service.gerar_documento(pedido("nao-existe", vec![]), None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.gerar_documento(GerarDocumentoRequest::default(), None).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_gerar_documento_registra_erro() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/modelo.pdf");
            then.status(404);
        });

        let db = Arc::new(MemoryBackend::new());
        db.seed(
            TABELA_MODELOS,
            vec![json!({"id": "t1", "gabinete_id": "gab-1", "original_pdf_url": server.url("/modelo.pdf")})],
        );
        let service = service(db.clone(), None);

        assert!(service.gerar_documento(pedido("t1", vec![]), Some("u1")).await.is_err());
        let geracao = &db.rows(TABELA_GERACOES)[0];
        assert_eq!(geracao["generation_status"], "error");
        assert!(geracao["error_details"].as_str().is_some());
    }
}
