//! Fluxo de indicações (Kanban de cinco etapas)
//!
//! O status efetivo de uma indicação é derivado do histórico em
//! `indicacao_status_events`: vale o último evento que não seja observação.
//! A coluna `indicacoes.status` é mantida em sincronia, mas serve apenas de
//! fallback para registros sem histórico.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::{
    BairroRanking, Eleitor, Indicacao, IndicacaoMetricas, IndicacaoStatus, IndicacaoView, NovaIndicacao,
    Perfil, StatusChangeOptions, StatusCount, StatusEvent, EVENTO_OBSERVACAO,
};
use crate::utils::logging::{log_error, log_info, log_status_changed};
use crate::utils::normalization::format_name_short;
use crate::utils::{AppError, AppResult};

pub const TABELA_INDICACOES: &str = "indicacoes";
pub const TABELA_EVENTOS: &str = "indicacao_status_events";

const NOTA_CRIACAO: &str = "Indicação criada e salva no sistema";
const SEM_AMOSTRAS: &str = "---";

/// Valores derivados do histórico de uma indicação
#[derive(Debug, Clone, PartialEq)]
pub struct EstadoDerivado {
    pub status: IndicacaoStatus,
    pub protocolo: Option<String>,
    pub pdf_url: Option<String>,
}

/// `events` deve estar em ordem cronológica
pub fn derivar_estado(indicacao: &Indicacao, events: &[StatusEvent]) -> EstadoDerivado {
    let status = events
        .iter()
        .rev()
        .filter(|e| !e.is_observacao())
        .find_map(|e| IndicacaoStatus::parse(&e.status))
        .or_else(|| IndicacaoStatus::parse(&indicacao.status))
        .unwrap_or(IndicacaoStatus::Criada);

    let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let protocolo = events
        .iter()
        .rev()
        .filter(|e| !e.is_observacao())
        .find_map(|e| non_empty(&e.protocolo))
        .or_else(|| non_empty(&indicacao.protocol));

    let pdf_url = events
        .iter()
        .rev()
        .filter(|e| !e.is_observacao())
        .find_map(|e| non_empty(&e.pdf_url));

    EstadoDerivado {
        status,
        protocolo,
        pdf_url,
    }
}

fn first_event_at(events: &[&StatusEvent], status: IndicacaoStatus) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|e| e.status == status.as_str())
        .map(|e| e.created_at)
        .min()
}

fn format_one_decimal(value: f64) -> String {
    format!("{:.1}", value)
}

pub struct IndicacoesService {
    db: Arc<dyn TableBackend>,
}

impl IndicacoesService {
    pub fn new(db: Arc<dyn TableBackend>) -> Self {
        Self { db }
    }

    /// Cria a indicação em `criada` e registra o evento inicial
    pub async fn criar(&self, nova: NovaIndicacao, user_id: Option<&str>) -> AppResult<Indicacao> {
        let titulo = nova.titulo.trim();
        if titulo.is_empty() {
            return Err(AppError::ValidationError("Título é obrigatório".to_string()));
        }
        if nova.gabinete_id.trim().is_empty() {
            return Err(AppError::ValidationError("gabinete_id é obrigatório".to_string()));
        }

        let mut row = Map::new();
        row.insert("gabinete_id".into(), json!(nova.gabinete_id));
        row.insert("titulo".into(), json!(titulo));
        row.insert("status".into(), json!(IndicacaoStatus::Criada.as_str()));
        if let Some(user_id) = user_id {
            row.insert("user_id".into(), json!(user_id));
        }
        let opcionais = [
            ("justificativa", &nova.justificativa),
            ("descricao", &nova.descricao),
            ("endereco_rua", &nova.endereco_rua),
            ("endereco_bairro", &nova.endereco_bairro),
            ("endereco_cep", &nova.endereco_cep),
            ("eleitor_id", &nova.eleitor_id),
            ("category", &nova.category),
            ("tag", &nova.tag),
        ];
        for (coluna, valor) in opcionais {
            if let Some(valor) = valor {
                row.insert(coluna.into(), json!(valor));
            }
        }
        if let Some(fotos) = &nova.fotos_urls {
            row.insert("fotos_urls".into(), json!(fotos));
        }

        let indicacao: Indicacao = self.db.insert_as(TABELA_INDICACOES, Value::Object(row)).await?;

        let evento = json!({
            "indicacao_id": indicacao.id,
            "status": IndicacaoStatus::Criada.as_str(),
            "user_id": user_id,
            "notes": NOTA_CRIACAO,
        });
        if let Err(e) = self.db.insert(TABELA_EVENTOS, evento).await {
            log_error(&format!("Falha ao registrar evento inicial da indicação {}: {}", indicacao.id, e));
        }

        log_info(&format!("📋 Indicação criada: {} ({})", indicacao.titulo, indicacao.id));
        Ok(indicacao)
    }

    pub async fn carregar(&self, id: &str) -> AppResult<Indicacao> {
        self.db
            .select_one_as(TABELA_INDICACOES, &Query::new().eq("id", id))
            .await?
            .ok_or_else(|| AppError::NotFound("Indicação não encontrada".to_string()))
    }

    /// Histórico em ordem cronológica
    pub async fn eventos(&self, id: &str) -> AppResult<Vec<StatusEvent>> {
        Ok(self
            .db
            .select_as(TABELA_EVENTOS, &Query::new().eq("indicacao_id", id).order("created_at", true))
            .await?)
    }

    /// Movimento livre do Kanban para qualquer outra etapa
    pub async fn mover_status(
        &self,
        id: &str,
        novo: IndicacaoStatus,
        user_id: Option<&str>,
        options: StatusChangeOptions,
    ) -> AppResult<StatusEvent> {
        let indicacao = self.carregar(id).await?;
        let eventos = self.eventos(id).await?;
        let atual = derivar_estado(&indicacao, &eventos).status;

        if atual == novo {
            return Err(AppError::ValidationError(format!(
                "Indicação já está no status {}",
                novo.label()
            )));
        }

        self.registrar_status(&indicacao, atual, novo, user_id, options).await
    }

    /// Avança para a próxima etapa do fluxo
    pub async fn avancar(&self, id: &str, user_id: Option<&str>, options: StatusChangeOptions) -> AppResult<StatusEvent> {
        let indicacao = self.carregar(id).await?;
        let eventos = self.eventos(id).await?;
        let atual = derivar_estado(&indicacao, &eventos).status;

        let proximo = atual
            .next()
            .ok_or_else(|| AppError::ValidationError("Indicação já foi atendida".to_string()))?;

        self.registrar_status(&indicacao, atual, proximo, user_id, options).await
    }

    async fn registrar_status(
        &self,
        indicacao: &Indicacao,
        atual: IndicacaoStatus,
        novo: IndicacaoStatus,
        user_id: Option<&str>,
        options: StatusChangeOptions,
    ) -> AppResult<StatusEvent> {
        let protocolo = options.protocolo.as_deref().map(str::trim).filter(|p| !p.is_empty());
        if novo == IndicacaoStatus::Protocolada && protocolo.is_none() {
            return Err(AppError::ValidationError(
                "Número de protocolo é obrigatório para protocolar".to_string(),
            ));
        }

        let mut evento = Map::new();
        evento.insert("indicacao_id".into(), json!(indicacao.id));
        evento.insert("status".into(), json!(novo.as_str()));
        evento.insert("user_id".into(), json!(user_id));
        if let Some(notes) = options.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            evento.insert("notes".into(), json!(notes));
        }
        if let Some(pdf_url) = options.pdf_url.as_deref().filter(|u| !u.is_empty()) {
            evento.insert("pdf_url".into(), json!(pdf_url));
        }
        if let Some(protocolo) = protocolo {
            evento.insert("protocolo".into(), json!(protocolo));
        }

        let registrado: StatusEvent = self.db.insert_as(TABELA_EVENTOS, Value::Object(evento)).await?;

        let mut patch = json!({ "status": novo.as_str() });
        if let Some(protocolo) = protocolo {
            patch["protocol"] = json!(protocolo);
        }
        self.db
            .update(TABELA_INDICACOES, &Query::new().eq("id", indicacao.id.as_str()), patch)
            .await?;

        log_status_changed(&indicacao.id, atual.as_str(), novo.as_str());
        Ok(registrado)
    }

    pub async fn adicionar_observacao(&self, id: &str, user_id: Option<&str>, notes: &str) -> AppResult<StatusEvent> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(AppError::ValidationError("Observação não pode ser vazia".to_string()));
        }

        let indicacao = self.carregar(id).await?;
        let evento = json!({
            "indicacao_id": indicacao.id,
            "status": EVENTO_OBSERVACAO,
            "user_id": user_id,
            "notes": notes,
        });

        Ok(self.db.insert_as(TABELA_EVENTOS, evento).await?)
    }

    /// Indicações do gabinete, mais recentes primeiro, com os campos derivados
    pub async fn listar(&self, gabinete_id: &str) -> AppResult<Vec<IndicacaoView>> {
        let indicacoes: Vec<Indicacao> = self
            .db
            .select_as(
                TABELA_INDICACOES,
                &Query::new().eq("gabinete_id", gabinete_id).order("created_at", false),
            )
            .await?;
        if indicacoes.is_empty() {
            return Ok(Vec::new());
        }

        let mut eventos = self.eventos_por_indicacao(&indicacoes).await?;

        let user_ids: Vec<String> = indicacoes.iter().filter_map(|i| i.user_id.clone()).collect();
        let nomes: HashMap<String, Option<String>> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            self.db
                .select_as::<Perfil>("profiles", &Query::new().select("user_id,full_name").in_("user_id", user_ids))
                .await?
                .into_iter()
                .map(|p| (p.user_id, p.full_name))
                .collect()
        };

        let eleitor_ids: Vec<String> = indicacoes.iter().filter_map(|i| i.eleitor_id.clone()).collect();
        let eleitores: HashMap<String, String> = if eleitor_ids.is_empty() {
            HashMap::new()
        } else {
            self.db
                .select_as::<Eleitor>("eleitores", &Query::new().in_("id", eleitor_ids))
                .await?
                .into_iter()
                .map(|e| (e.id, e.name))
                .collect()
        };

        let views = indicacoes
            .into_iter()
            .map(|mut indicacao| {
                let historico = eventos.remove(&indicacao.id).unwrap_or_default();
                let estado = derivar_estado(&indicacao, &historico);
                let user_name = format_name_short(
                    indicacao
                        .user_id
                        .as_ref()
                        .and_then(|uid| nomes.get(uid))
                        .and_then(|n| n.as_deref()),
                );
                let eleitor_nome = indicacao.eleitor_id.as_ref().and_then(|id| eleitores.get(id)).cloned();

                indicacao.status = estado.status.as_str().to_string();
                indicacao.protocol = estado.protocolo;

                IndicacaoView {
                    indicacao,
                    pdf_url: estado.pdf_url,
                    user_name,
                    eleitor_nome,
                    status_history: historico,
                }
            })
            .collect();

        Ok(views)
    }

    async fn eventos_por_indicacao(&self, indicacoes: &[Indicacao]) -> AppResult<HashMap<String, Vec<StatusEvent>>> {
        let ids: Vec<String> = indicacoes.iter().map(|i| i.id.clone()).collect();
        let eventos: Vec<StatusEvent> = self
            .db
            .select_as(
                TABELA_EVENTOS,
                &Query::new().in_("indicacao_id", ids).order("created_at", true),
            )
            .await?;

        let mut agrupados: HashMap<String, Vec<StatusEvent>> = HashMap::new();
        for evento in eventos {
            agrupados.entry(evento.indicacao_id.clone()).or_default().push(evento);
        }
        Ok(agrupados)
    }

    /// Próximo número sequencial no formato `NNN/AAAA`
    pub async fn proximo_numero(&self, gabinete_id: &str, year: i32) -> AppResult<String> {
        let total = self
            .db
            .count(TABELA_INDICACOES, &Query::new().eq("gabinete_id", gabinete_id))
            .await?;
        Ok(format!("{:03}/{}", total + 1, year))
    }

    pub async fn proximo_numero_atual(&self, gabinete_id: &str) -> AppResult<String> {
        self.proximo_numero(gabinete_id, Utc::now().year()).await
    }

    pub async fn metricas(&self, gabinete_id: &str, now: DateTime<Utc>) -> AppResult<IndicacaoMetricas> {
        let indicacoes: Vec<Indicacao> = self
            .db
            .select_as(TABELA_INDICACOES, &Query::new().eq("gabinete_id", gabinete_id))
            .await?;
        let eventos = if indicacoes.is_empty() {
            HashMap::new()
        } else {
            self.eventos_por_indicacao(&indicacoes).await?
        };

        Ok(calcular_metricas(&indicacoes, &eventos, now))
    }
}

/// Agregações do painel de indicações
pub fn calcular_metricas(
    indicacoes: &[Indicacao],
    eventos: &HashMap<String, Vec<StatusEvent>>,
    now: DateTime<Utc>,
) -> IndicacaoMetricas {
    let vazio: Vec<StatusEvent> = Vec::new();
    let total = indicacoes.len();

    let mut contagem: HashMap<IndicacaoStatus, usize> = HashMap::new();
    let transicoes = [
        (IndicacaoStatus::Criada, IndicacaoStatus::Formalizada),
        (IndicacaoStatus::Formalizada, IndicacaoStatus::Protocolada),
        (IndicacaoStatus::Protocolada, IndicacaoStatus::Atendida),
    ];
    let mut amostras: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut bairros: HashMap<String, usize> = HashMap::new();
    let inicio_janela = now - Duration::days(30);
    let mut criadas_30_dias = 0usize;

    for indicacao in indicacoes {
        let historico = eventos.get(&indicacao.id).unwrap_or(&vazio);
        let estado = derivar_estado(indicacao, historico);
        *contagem.entry(estado.status).or_default() += 1;

        let status_events: Vec<&StatusEvent> = historico.iter().filter(|e| !e.is_observacao()).collect();
        for (i, (de, para)) in transicoes.iter().enumerate() {
            let inicio = first_event_at(&status_events, *de);
            let fim = first_event_at(&status_events, *para);
            if let (Some(inicio), Some(fim)) = (inicio, fim) {
                let dias = (fim - inicio).num_seconds() as f64 / 86_400.0;
                if dias > 0.0 {
                    amostras[i].push(dias);
                }
            }
        }

        if indicacao.created_at >= inicio_janela {
            criadas_30_dias += 1;
        }

        let bairro = indicacao
            .endereco_bairro
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("Geral")
            .to_string();
        *bairros.entry(bairro).or_default() += 1;
    }

    let media = |valores: &Vec<f64>| {
        if valores.is_empty() {
            SEM_AMOSTRAS.to_string()
        } else {
            format_one_decimal(valores.iter().sum::<f64>() / valores.len() as f64)
        }
    };

    let atendidas = contagem.get(&IndicacaoStatus::Atendida).copied().unwrap_or(0);
    let taxa_atendimento = if total == 0 {
        0.0
    } else {
        atendidas as f64 / total as f64 * 100.0
    };

    let por_status = IndicacaoStatus::ALL
        .iter()
        .map(|s| StatusCount {
            status: *s,
            label: s.label(),
            quantidade: contagem.get(s).copied().unwrap_or(0),
        })
        .collect();

    let mut ranking_bairros: Vec<BairroRanking> = bairros
        .into_iter()
        .map(|(bairro, quantidade)| BairroRanking { bairro, quantidade })
        .collect();
    ranking_bairros.sort_by(|a, b| b.quantidade.cmp(&a.quantidade).then_with(|| a.bairro.cmp(&b.bairro)));
    ranking_bairros.truncate(10);

    IndicacaoMetricas {
        total,
        por_status,
        taxa_atendimento,
        lead_time_formalizacao: media(&amostras[0]),
        lead_time_protocolo: media(&amostras[1]),
        lead_time_atendimento: media(&amostras[2]),
        criadas_30_dias,
        media_dia: format_one_decimal(criadas_30_dias as f64 / 30.0),
        media_semana: format_one_decimal(criadas_30_dias as f64 / 4.0),
        media_mes: criadas_30_dias,
        ranking_bairros,
    }
}
