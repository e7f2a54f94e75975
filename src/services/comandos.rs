//! Interpretador de comandos do WhatsApp/Telegram
//!
//! Estratégia:
//! 1. Ação explícita (`action`) é executada diretamente
//! 2. Texto livre passa primeiro pela gramática manual (prefixos fixos)
//! 3. Sem correspondência, o texto vai para o parser de IA, que devolve
//!    `{action, parameters}` em JSON
//!
//! Toda ação bem-sucedida (exceto a ajuda) é registrada em `audit_log_whatsapp`.

use chrono::{DateTime, Utc};
use ia_service::{parse_json_response, ChatCompletion, ChatMessage, ChatRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use supabase::{Query, TableBackend};

use crate::config::prompts::fill;
use crate::config::Prompts;
use crate::models::{ActionRequest, ActionResponse, Cargo, NovaIndicacao, NovoEleitor, ParsedAction};
use crate::services::eleitores::EleitoresService;
use crate::services::indicacoes::IndicacoesService;
use crate::utils::logging::{log_ai_call, log_ai_error, log_command_parsed, log_error};
use crate::utils::normalization::remove_accents;
use crate::utils::{short_id, truncate_with_suffix, AppError};

const SIMILARITY_THRESHOLD: f64 = 0.75;
const MAX_SUGESTOES: usize = 3;

const FALHA_TECNICA: &str = "No momento tive um problema técnico, mas estou aqui para ajudar. Pode repetir?";
const APRESENTACAO: &str = "Sou o assistente IA do gabinete. Posso cadastrar eleitores, demandas, indicações e ideias. Diga por exemplo: \"cadastrar eleitor João Silva 11999999999 Rua das Flores, 123\".";
const NAO_ENTENDI: &str = "Não entendi muito bem. Se quiser ver exemplos, envie \"ajuda\".";

/// Comandos conhecidos, usados para sugerir alternativas
const CATALOGO: &[&str] = &[
    "ajuda",
    "meus eleitores",
    "minhas demandas",
    "minhas indicacoes",
    "minhas ideias",
    "minha agenda",
    "cadastrar eleitor",
    "criar indicacao",
    "registrar demanda",
    "cadastrar ideia",
    "status",
];

static TRAVESSAO: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-–—]").expect("regex válida"));

/// Quem está executando o comando
#[derive(Debug, Clone)]
pub struct Contexto {
    pub user_id: String,
    pub user_name: Option<String>,
    pub gabinete_id: String,
    pub role: String,
}

/// `titulo - descricao`: apenas o trecho entre o primeiro e o segundo traço vira descrição
fn split_titulo_descricao(rest: &str) -> (String, Option<String>) {
    let mut partes = TRAVESSAO.splitn(rest, 3);
    let titulo = partes.next().unwrap_or("").trim().to_string();
    let descricao = partes.next().map(str::trim).filter(|d| !d.is_empty()).map(str::to_string);
    (titulo, descricao)
}

/// Resto do texto original após um prefixo já confirmado em minúsculas
fn depois_do_prefixo<'a>(text: &'a str, prefixo: &str) -> &'a str {
    text.get(prefixo.len()..).unwrap_or("").trim()
}

/// Gramática manual (prefixos, sem diferenciar maiúsculas)
pub fn parse_manual(user_text: &str) -> Option<ParsedAction> {
    let text = user_text.trim();
    let lower = text.to_lowercase();

    if lower == "ajuda" || lower.starts_with("ajuda ") {
        return Some(ParsedAction::new("obter_ajuda", json!({})));
    }

    let listas = [
        (&["meus eleitores", "meus eleitor"][..], "eleitores"),
        (&["minhas demandas", "minha demanda"][..], "demandas"),
        (&["minhas indicacoes", "minhas indicações", "minha indicacao"][..], "indicacoes"),
        (&["minhas ideias", "minha ideia"][..], "ideias"),
    ];
    for (prefixos, tipo) in listas {
        if prefixos.iter().any(|p| lower.starts_with(p)) {
            return Some(ParsedAction::new("listar_itens", json!({ "tipo": tipo })));
        }
    }

    if lower == "agenda" || lower.starts_with("minha agenda") {
        return Some(ParsedAction::new("consultar_agenda", json!({})));
    }

    if lower.starts_with("status ") {
        let partes: Vec<&str> = text.split_whitespace().collect();
        if partes.len() >= 3 {
            return Some(ParsedAction::new(
                "consultar_status",
                json!({ "tipo": partes[1], "id": partes[2] }),
            ));
        }
    }

    if lower.starts_with("cadastrar eleitor") {
        let rest = depois_do_prefixo(text, "cadastrar eleitor");
        let nome = if rest.is_empty() { "Eleitor" } else { rest };
        return Some(ParsedAction::new("cadastrar_eleitor", json!({ "nome": nome })));
    }

    let com_titulo = [
        ("criar indicacao", "criar_indicacao"),
        ("criar indicação", "criar_indicacao"),
        ("registrar demanda", "registrar_demanda"),
        ("cadastrar ideia", "cadastrar_ideia"),
    ];
    for (prefixo, action) in com_titulo {
        if lower.starts_with(prefixo) {
            let (titulo, descricao) = split_titulo_descricao(depois_do_prefixo(text, prefixo));
            if !titulo.is_empty() {
                return Some(ParsedAction::new(action, json!({ "titulo": titulo, "descricao": descricao })));
            }
        }
    }

    None
}

/// Comandos do catálogo parecidos com o início do texto (Jaro-Winkler)
pub fn sugerir_comandos(user_text: &str) -> Vec<String> {
    let normalizado = remove_accents(&user_text.trim().to_lowercase());
    let palavras: Vec<&str> = normalizado.split_whitespace().collect();

    let mut candidatos: Vec<(f64, &str)> = CATALOGO
        .iter()
        .filter_map(|comando| {
            let n = comando.split_whitespace().count().min(palavras.len());
            if n == 0 {
                return None;
            }
            let inicio = palavras[..n].join(" ");
            let score = strsim::jaro_winkler(&inicio, comando);
            (score >= SIMILARITY_THRESHOLD).then_some((score, *comando))
        })
        .collect();

    candidatos.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    candidatos
        .into_iter()
        .take(MAX_SUGESTOES)
        .map(|(_, comando)| comando.to_string())
        .collect()
}

/// Permissão de criação por cargo; ideias também para atendentes
pub fn pode_executar(role: &str, action: &str) -> bool {
    let Some(cargo) = Cargo::parse(role) else {
        return false;
    };
    match action {
        "cadastrar_eleitor" | "criar_indicacao" | "registrar_demanda" => {
            matches!(cargo, Cargo::Politico | Cargo::ChefeGabinete | Cargo::Assessor)
        }
        _ => true,
    }
}

pub fn mensagem_sem_permissao(role: &str) -> String {
    format!(
        "❌ Você não tem permissão para executar esta ação.\n\nSeu cargo: {}\n\nDigite \"ajuda\" para ver os comandos disponíveis.",
        role
    )
}

pub fn texto_ajuda(role: &str) -> String {
    let mut message = String::from("🤖 *Agente IA Legisfy - WhatsApp*\n\n");
    message.push_str(&format!("📋 *Comandos disponíveis para {}:*\n\n", role));

    if matches!(role, "politico" | "chefe_gabinete" | "assessor") {
        message.push_str("👥 *Eleitores:*\n");
        message.push_str("• \"cadastrar eleitor [nome] [telefone] [endereço]\"\n");
        message.push_str("• \"meus eleitores\"\n\n");

        message.push_str("📋 *Indicações:*\n");
        message.push_str("• \"criar indicacao [título] - [descrição]\"\n");
        message.push_str("• \"minhas indicacoes\"\n\n");

        message.push_str("🎯 *Demandas:*\n");
        message.push_str("• \"registrar demanda [título] - [descrição]\"\n");
        message.push_str("• \"minhas demandas\"\n\n");
    }

    if matches!(role, "politico" | "chefe_gabinete" | "assessor" | "atendente") {
        message.push_str("💡 *Ideias:*\n");
        message.push_str("• \"cadastrar ideia [título] - [descrição]\"\n");
        message.push_str("• \"minhas ideias\"\n\n");
    }

    message.push_str("📊 *Consultas:*\n");
    message.push_str("• \"status [tipo] [id]\" - consultar status\n");
    message.push_str("• \"minha agenda\" - próximos compromissos\n");
    message.push_str("• \"ajuda\" - ver comandos\n\n");

    message.push_str("💬 *Exemplos:*\n");
    message.push_str("• \"cadastrar eleitor João Silva 11999999999 Rua das Flores, 123\"\n");
    message.push_str("• \"criar indicacao Iluminação na praça - Melhorar a iluminação da praça central\"\n");
    message.push_str("• \"status demanda a1b2c3d4\"\n\n");

    message.push_str("📧 Você também pode enviar áudios e imagens que serão processados automaticamente!");
    message
}

fn formatar_data(value: Option<&Value>) -> String {
    let raw = value.and_then(|v| v.as_str()).unwrap_or("");
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc).format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn texto(row: &Value, campo: &str) -> Option<String> {
    row.get(campo)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Tabela e emoji para `listar_itens`
fn tabela_listagem(tipo: &str) -> Option<(&'static str, &'static str)> {
    match remove_accents(&tipo.trim().to_lowercase()).as_str() {
        "eleitor" | "eleitores" => Some(("eleitores", "👥")),
        "demanda" | "demandas" => Some(("demandas", "🎯")),
        "indicacao" | "indicacoes" => Some(("indicacoes", "📋")),
        "ideia" | "ideias" => Some(("ideias", "💡")),
        _ => None,
    }
}

fn tabela_status(tipo: &str) -> Option<&'static str> {
    match remove_accents(&tipo.trim().to_lowercase()).as_str() {
        "demanda" | "demandas" => Some("demandas"),
        "indicacao" | "indicacoes" => Some("indicacoes"),
        "ideia" | "ideias" => Some("ideias"),
        _ => None,
    }
}

/// Lista em texto plano; aceita array JSON ou string com um array JSON
fn tags_param(parsed: &ParsedAction) -> Option<Vec<String>> {
    match parsed.parameters.get("tags") {
        Some(Value::Array(_)) => Some(parsed.param_list("tags")),
        Some(Value::String(raw)) => serde_json::from_str(raw).ok(),
        _ => None,
    }
}

pub struct ComandosService {
    db: Arc<dyn TableBackend>,
    ia: Option<Arc<dyn ChatCompletion>>,
    prompts: Arc<Prompts>,
    parser_model: String,
    indicacoes: IndicacoesService,
    eleitores: EleitoresService,
}

impl ComandosService {
    pub fn new(
        db: Arc<dyn TableBackend>,
        ia: Option<Arc<dyn ChatCompletion>>,
        prompts: Arc<Prompts>,
        parser_model: impl Into<String>,
    ) -> Self {
        Self {
            indicacoes: IndicacoesService::new(db.clone()),
            eleitores: EleitoresService::new(db.clone()),
            db,
            ia,
            prompts,
            parser_model: parser_model.into(),
        }
    }

    /// Parser de IA; nunca falha, degrada para a ação `chat`
    pub async fn parse_with_ai(&self, user_text: &str, role: &str, user_name: Option<&str>) -> ParsedAction {
        let Some(ia) = &self.ia else {
            return ParsedAction::new("chat", json!({}));
        };

        let system = fill(
            &self.prompts.comandos_parser,
            &[("cargo", role), ("nome", user_name.unwrap_or("Usuário"))],
        );
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user_text)])
            .with_model(self.parser_model.as_str())
            .with_max_tokens(500)
            .with_temperature(0.7);

        log_ai_call("parser de comandos", &self.parser_model);
        match ia.complete(request).await {
            Ok(content) => parse_json_response::<ParsedAction>(&content).unwrap_or_else(|_| ParsedAction::chat(content)),
            Err(e) => {
                log_ai_error("parser de comandos", &e.to_string());
                ParsedAction::chat(FALHA_TECNICA)
            }
        }
    }

    /// Ponto de entrada de `POST /ia/acoes` e dos webhooks
    pub async fn executar(&self, request: &ActionRequest) -> ActionResponse {
        let ctx = Contexto {
            user_id: request.user_id.clone(),
            user_name: request.user_name.clone(),
            gabinete_id: request.gabinete_id.clone(),
            role: request.user_role.clone(),
        };

        let explicita = request.action.as_deref().map(str::trim).filter(|a| !a.is_empty());
        let user_text = request.user_text.as_deref().map(str::trim).filter(|t| !t.is_empty());

        let (resultado, acao, parametros) = match (explicita, user_text) {
            (None, Some(text)) => {
                let parsed = match parse_manual(text) {
                    Some(parsed) => {
                        log_command_parsed("manual", &parsed.action);
                        parsed
                    }
                    None => {
                        let parsed = self.parse_with_ai(text, &ctx.role, ctx.user_name.as_deref()).await;
                        log_command_parsed("ia", &parsed.action);
                        parsed
                    }
                };

                if let Some(resposta) = self.resposta_especial(&parsed, text, &ctx) {
                    return resposta;
                }

                let resultado = self
                    .executar_acao(&parsed, &ctx)
                    .await
                    .unwrap_or_else(|| ActionResponse::ok(NAO_ENTENDI));
                (resultado, parsed.action.clone(), parsed.parameters.clone())
            }
            (action, _) => {
                let action = action.unwrap_or_default();
                let parameters = request.parameters.clone().unwrap_or_else(|| json!({}));
                let parsed = ParsedAction::new(action, parameters);
                let resultado = match self.executar_acao(&parsed, &ctx).await {
                    Some(resultado) if parsed.action != "chat" => resultado,
                    _ => ActionResponse::fail("Ação não reconhecida."),
                };
                (resultado, parsed.action, parsed.parameters)
            }
        };

        if resultado.success && acao != "obter_ajuda" {
            self.auditar(&ctx, &acao, parametros, resultado.data.clone()).await;
        }

        resultado
    }

    fn resposta_especial(&self, parsed: &ParsedAction, text: &str, ctx: &Contexto) -> Option<ActionResponse> {
        match parsed.action.as_str() {
            "sem_permissao" => Some(ActionResponse::fail(mensagem_sem_permissao(&ctx.role))),
            "esclarecer" => {
                let mut opcoes = parsed.param_list("opcoes");
                if opcoes.is_empty() {
                    opcoes = sugerir_comandos(text);
                }
                if opcoes.is_empty() {
                    opcoes.push("ajuda".to_string());
                }
                let lista = opcoes
                    .iter()
                    .enumerate()
                    .map(|(i, op)| format!("{}. {}", i + 1, op))
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(ActionResponse::fail(format!(
                    "🤔 Não entendi completamente. Você quis dizer:\n\n{}\n\nOu digite \"ajuda\" para ver todos os comandos.",
                    lista
                )))
            }
            "dados_faltantes" => {
                let campos = parsed
                    .param_list("campos_necessarios")
                    .iter()
                    .map(|c| format!("• {}", c))
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(ActionResponse::fail(format!(
                    "📝 Faltam algumas informações:\n\n{}\n\nTente novamente com os dados completos.",
                    campos
                )))
            }
            _ => None,
        }
    }

    /// `None` para ações desconhecidas
    async fn executar_acao(&self, parsed: &ParsedAction, ctx: &Contexto) -> Option<ActionResponse> {
        let action = parsed.action.as_str();
        if !pode_executar(&ctx.role, action)
            && matches!(action, "cadastrar_eleitor" | "criar_indicacao" | "registrar_demanda" | "cadastrar_ideia")
        {
            return Some(ActionResponse::fail(mensagem_sem_permissao(&ctx.role)));
        }

        let resposta = match action {
            "cadastrar_eleitor" => self.cadastrar_eleitor(parsed, ctx).await,
            "criar_indicacao" => self.criar_indicacao(parsed, ctx).await,
            "registrar_demanda" => self.registrar_demanda(parsed, ctx).await,
            "cadastrar_ideia" => self.cadastrar_ideia(parsed, ctx).await,
            "consultar_status" => self.consultar_status(parsed, ctx).await,
            "listar_itens" => self.listar_itens(parsed, ctx).await,
            "consultar_agenda" => self.consultar_agenda(ctx, Utc::now()).await,
            "obter_ajuda" => ActionResponse::ok(texto_ajuda(&ctx.role)),
            "chat" => ActionResponse::ok(parsed.param("text").unwrap_or(APRESENTACAO)),
            _ => return None,
        };
        Some(resposta)
    }

    async fn cadastrar_eleitor(&self, parsed: &ParsedAction, ctx: &Contexto) -> ActionResponse {
        let Some(nome) = parsed.param("nome") else {
            return ActionResponse::fail("Nome é obrigatório para cadastrar eleitor.");
        };

        let novo = NovoEleitor {
            gabinete_id: ctx.gabinete_id.clone(),
            name: nome.to_string(),
            whatsapp: parsed.param("telefone").map(str::to_string),
            address: parsed.param("endereco").map(str::to_string),
            tags: tags_param(parsed),
            ..Default::default()
        };

        match self.eleitores.criar_eleitor(novo, Some(ctx.user_id.as_str())).await {
            Ok(eleitor) => ActionResponse::ok_with(
                format!("✅ Eleitor {} cadastrado com sucesso!", nome),
                serde_json::to_value(&eleitor).unwrap_or(Value::Null),
            ),
            Err(AppError::Conflict(message)) => ActionResponse::fail(message),
            Err(e) => {
                log_error(&format!("Erro ao cadastrar eleitor: {}", e));
                ActionResponse::fail("Erro ao cadastrar eleitor. Tente novamente.")
            }
        }
    }

    async fn criar_indicacao(&self, parsed: &ParsedAction, ctx: &Contexto) -> ActionResponse {
        let Some(titulo) = parsed.param("titulo") else {
            return ActionResponse::fail("Título é obrigatório para criar indicação.");
        };

        let nova = NovaIndicacao {
            gabinete_id: ctx.gabinete_id.clone(),
            titulo: titulo.to_string(),
            descricao: parsed.param("descricao").map(str::to_string),
            ..Default::default()
        };

        match self.indicacoes.criar(nova, Some(ctx.user_id.as_str())).await {
            Ok(indicacao) => ActionResponse::ok_with(
                format!(
                    "📋 Indicação \"{}\" criada com sucesso!\n\nStatus: CRIADA\nID: {}",
                    titulo,
                    short_id(&indicacao.id)
                ),
                serde_json::to_value(&indicacao).unwrap_or(Value::Null),
            ),
            Err(e) => {
                log_error(&format!("Erro ao criar indicação: {}", e));
                ActionResponse::fail("Erro ao criar indicação. Tente novamente.")
            }
        }
    }

    async fn registrar_demanda(&self, parsed: &ParsedAction, ctx: &Contexto) -> ActionResponse {
        let Some(titulo) = parsed.param("titulo") else {
            return ActionResponse::fail("Título é obrigatório para registrar demanda.");
        };

        let row = json!({
            "gabinete_id": ctx.gabinete_id,
            "user_id": ctx.user_id,
            "titulo": titulo,
            "descricao": parsed.param("descricao"),
            "status": "aberta",
        });

        match self.db.insert("demandas", row).await {
            Ok(data) => {
                let id = texto(&data, "id").unwrap_or_default();
                ActionResponse::ok_with(
                    format!(
                        "🎯 Demanda \"{}\" registrada com sucesso!\n\nStatus: ABERTA\nID: {}",
                        titulo,
                        short_id(&id)
                    ),
                    data,
                )
            }
            Err(e) => {
                log_error(&format!("Erro ao registrar demanda: {}", e));
                ActionResponse::fail("Erro ao registrar demanda. Tente novamente.")
            }
        }
    }

    async fn cadastrar_ideia(&self, parsed: &ParsedAction, ctx: &Contexto) -> ActionResponse {
        let Some(titulo) = parsed.param("titulo") else {
            return ActionResponse::fail("Título é obrigatório para cadastrar ideia.");
        };

        let row = json!({
            "gabinete_id": ctx.gabinete_id,
            "user_id": ctx.user_id,
            "titulo": titulo,
            "descricao": parsed.param("descricao"),
            "origem": "whatsapp",
        });

        match self.db.insert("ideias", row).await {
            Ok(data) => {
                let id = texto(&data, "id").unwrap_or_default();
                ActionResponse::ok_with(
                    format!("💡 Ideia \"{}\" cadastrada com sucesso!\n\nID: {}", titulo, short_id(&id)),
                    data,
                )
            }
            Err(e) => {
                log_error(&format!("Erro ao cadastrar ideia: {}", e));
                ActionResponse::fail("Erro ao cadastrar ideia. Tente novamente.")
            }
        }
    }

    async fn consultar_status(&self, parsed: &ParsedAction, ctx: &Contexto) -> ActionResponse {
        let (Some(tipo), Some(id)) = (parsed.param("tipo"), parsed.param("id")) else {
            return ActionResponse::fail("Tipo e ID são obrigatórios para consultar status.");
        };
        let Some(tabela) = tabela_status(tipo) else {
            return ActionResponse::fail("Tipo inválido. Use: demanda, indicacao ou ideia.");
        };

        let query = Query::new()
            .eq("gabinete_id", ctx.gabinete_id.as_str())
            .eq_or_prefix("id", id)
            .limit(1);
        let row = match self.db.select_one(tabela, &query).await {
            Ok(Some(row)) => row,
            Ok(None) => return ActionResponse::fail(format!("{} não encontrada com ID: {}", tipo, id)),
            Err(e) => {
                log_error(&format!("Erro na consulta de status: {}", e));
                return ActionResponse::fail(format!("{} não encontrada com ID: {}", tipo, id));
            }
        };

        let mut message = format!("📊 Status de {}:\n\n", tipo);
        message.push_str(&format!("🏷️ Título: {}\n", texto(&row, "titulo").unwrap_or_default()));
        message.push_str(&format!("📅 Criado: {}\n", formatar_data(row.get("created_at"))));
        if let Some(status) = texto(&row, "status") {
            message.push_str(&format!("🔄 Status: {}\n", status));
        }
        if let Some(descricao) = texto(&row, "descricao") {
            message.push_str(&format!("📝 Descrição: {}\n", truncate_with_suffix(&descricao, 100, "...")));
        }

        ActionResponse::ok(message)
    }

    async fn listar_itens(&self, parsed: &ParsedAction, ctx: &Contexto) -> ActionResponse {
        let Some(tipo) = parsed.param("tipo") else {
            return ActionResponse::fail("Tipo é obrigatório. Use: eleitores, demandas, indicacoes ou ideias.");
        };
        let Some((tabela, emoji)) = tabela_listagem(tipo) else {
            return ActionResponse::fail("Tipo inválido. Use: eleitores, demandas, indicacoes ou ideias.");
        };

        let query = Query::new()
            .eq("gabinete_id", ctx.gabinete_id.as_str())
            .order("created_at", false)
            .limit(10);
        let rows = match self.db.select(tabela, &query).await {
            Ok(rows) => rows,
            Err(e) => {
                log_error(&format!("Erro na listagem: {}", e));
                return ActionResponse::fail("Erro ao buscar dados.");
            }
        };

        if rows.is_empty() {
            return ActionResponse::ok(format!("{} Nenhum(a) {} encontrado(a).", emoji, tipo));
        }

        let mut message = format!("{} Seus {} (últimos 10):\n\n", emoji, tipo);
        for (i, row) in rows.iter().enumerate() {
            let nome = texto(row, "titulo")
                .or_else(|| texto(row, "nome"))
                .or_else(|| texto(row, "name"))
                .unwrap_or_default();
            let status = texto(row, "status").map(|s| format!(" - {}", s)).unwrap_or_default();
            let id = texto(row, "id").unwrap_or_default();
            message.push_str(&format!(
                "{}. {}{}\n   📅 {} | ID: {}\n\n",
                i + 1,
                nome,
                status,
                formatar_data(row.get("created_at")),
                short_id(&id)
            ));
        }

        ActionResponse::ok(message)
    }

    /// Próximos 5 compromissos de `eventos`
    async fn consultar_agenda(&self, ctx: &Contexto, now: DateTime<Utc>) -> ActionResponse {
        let query = Query::new()
            .eq("gabinete_id", ctx.gabinete_id.as_str())
            .gte("data_inicio", now.to_rfc3339())
            .order("data_inicio", true)
            .limit(5);
        let rows = match self.db.select("eventos", &query).await {
            Ok(rows) => rows,
            Err(e) => {
                log_error(&format!("Erro ao consultar agenda: {}", e));
                return ActionResponse::fail("Erro ao acessar Agenda.");
            }
        };

        if rows.is_empty() {
            return ActionResponse::ok("📅 Nenhum compromisso agendado.");
        }

        let mut message = String::from("📅 *Próximos compromissos:*\n\n");
        for row in &rows {
            let quando = row
                .get("data_inicio")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.format("%d/%m %H:%M").to_string())
                .unwrap_or_default();
            let titulo = texto(row, "titulo").unwrap_or_default();
            let local = texto(row, "local").map(|l| format!(" ({})", l)).unwrap_or_default();
            message.push_str(&format!("• {} - {}{}\n", quando, titulo, local));
        }

        ActionResponse::ok(message.trim_end().to_string())
    }

    async fn auditar(&self, ctx: &Contexto, acao: &str, parameters: Value, data: Option<Value>) {
        let acao = if acao.is_empty() { "acao_ia" } else { acao };
        let row = json!({
            "usuario_id": ctx.user_id,
            "gabinete_id": ctx.gabinete_id,
            "acao": acao,
            "payload_resumido": {
                "action": acao,
                "parameters": parameters,
                "result": data,
            },
        });

        if let Err(e) = self.db.insert("audit_log_whatsapp", row).await {
            log_error(&format!("Falha ao registrar auditoria ({}): {}", acao, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeChat, FakeReply};
    use supabase::MemoryBackend;

    fn prompts() -> Arc<Prompts> {
        Arc::new(Prompts::embedded().unwrap())
    }

    fn service(ia: Option<Arc<FakeChat>>) -> (Arc<MemoryBackend>, ComandosService) {
        let db = Arc::new(MemoryBackend::new());
        let ia = ia.map(|fake| fake as Arc<dyn ChatCompletion>);
        (db.clone(), ComandosService::new(db, ia, prompts(), "openai/gpt-4o-mini"))
    }

    fn request(role: &str, text: &str) -> ActionRequest {
        ActionRequest {
            user_id: "u1".to_string(),
            user_name: Some("Ana".to_string()),
            gabinete_id: "gab-1".to_string(),
            user_role: role.to_string(),
            user_text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_manual_ajuda() {
        assert_eq!(parse_manual("Ajuda").unwrap().action, "obter_ajuda");
        assert_eq!(parse_manual("ajuda por favor").unwrap().action, "obter_ajuda");
        assert!(parse_manual("ajudante").is_none());
    }

    #[test]
    fn test_parse_manual_listagens() {
        let parsed = parse_manual("Minhas indicações").unwrap();
        assert_eq!(parsed.action, "listar_itens");
        assert_eq!(parsed.param("tipo"), Some("indicacoes"));
        assert_eq!(parse_manual("meus eleitores").unwrap().param("tipo"), Some("eleitores"));
        assert_eq!(parse_manual("minha agenda").unwrap().action, "consultar_agenda");
    }

    #[test]
    fn test_parse_manual_status_exige_tres_partes() {
        let parsed = parse_manual("status demanda a1b2c3d4").unwrap();
        assert_eq!(parsed.param("tipo"), Some("demanda"));
        assert_eq!(parsed.param("id"), Some("a1b2c3d4"));
        assert!(parse_manual("status demanda").is_none());
    }

    #[test]
    fn test_parse_manual_titulo_descricao() {
        let parsed = parse_manual("criar indicação Iluminação na praça - Melhorar a luz - urgente").unwrap();
        assert_eq!(parsed.action, "criar_indicacao");
        assert_eq!(parsed.param("titulo"), Some("Iluminação na praça"));
        assert_eq!(parsed.param("descricao"), Some("Melhorar a luz"));

        let sem_descricao = parse_manual("registrar demanda Buraco na rua").unwrap();
        assert_eq!(sem_descricao.param("titulo"), Some("Buraco na rua"));
        assert_eq!(sem_descricao.parameters["descricao"], Value::Null);

        assert!(parse_manual("cadastrar ideia - só descrição").is_none());
    }

    #[test]
    fn test_parse_manual_cadastrar_eleitor() {
        assert_eq!(
            parse_manual("Cadastrar eleitor João Silva").unwrap().param("nome"),
            Some("João Silva")
        );
        assert_eq!(parse_manual("cadastrar eleitor").unwrap().param("nome"), Some("Eleitor"));
    }

    #[test]
    fn test_sugerir_comandos() {
        let sugestoes = sugerir_comandos("cadastar eleitr Maria");
        assert_eq!(sugestoes.first().map(String::as_str), Some("cadastrar eleitor"));
        assert!(sugerir_comandos("").is_empty());
    }

    #[test]
    fn test_permissoes_por_cargo() {
        assert!(pode_executar("assessor", "registrar_demanda"));
        assert!(!pode_executar("atendente", "criar_indicacao"));
        assert!(pode_executar("atendente", "cadastrar_ideia"));
        assert!(!pode_executar("visitante", "cadastrar_ideia"));
    }

    #[test]
    fn test_texto_ajuda_por_cargo() {
        let atendente = texto_ajuda("atendente");
        assert!(atendente.contains("💡 *Ideias:*"));
        assert!(!atendente.contains("👥 *Eleitores:*"));
        assert!(texto_ajuda("politico").contains("👥 *Eleitores:*"));
    }

    #[tokio::test]
    async fn test_criar_indicacao_por_texto_com_auditoria() {
        let (db, service) = service(None);
        let resposta = service
            .executar(&request("assessor", "criar indicacao Poda de árvore - Rua 7"))
            .await;

        assert!(resposta.success);
        assert!(resposta.message.starts_with("📋 Indicação \"Poda de árvore\" criada com sucesso!"));
        assert_eq!(db.rows("indicacoes").len(), 1);
        assert_eq!(db.rows("indicacao_status_events").len(), 1);

        let audit = db.rows("audit_log_whatsapp");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0]["acao"], "criar_indicacao");
        assert_eq!(audit[0]["payload_resumido"]["parameters"]["titulo"], "Poda de árvore");
    }

    #[tokio::test]
    async fn test_ajuda_nao_e_auditada() {
        let (db, service) = service(None);
        let resposta = service.executar(&request("politico", "ajuda")).await;
        assert!(resposta.success);
        assert!(db.rows("audit_log_whatsapp").is_empty());
    }

    #[tokio::test]
    async fn test_atendente_sem_permissao() {
        let (db, service) = service(None);
        let resposta = service
            .executar(&request("atendente", "registrar demanda Calçada quebrada"))
            .await;
        assert!(!resposta.success);
        assert!(resposta.message.contains("Seu cargo: atendente"));
        assert!(db.rows("demandas").is_empty());
    }

    #[tokio::test]
    async fn test_cadastrar_eleitor_duplicado() {
        let (db, service) = service(None);
        db.seed(
            "eleitores",
            vec![json!({"id": "e1", "gabinete_id": "gab-1", "name": "Ana", "whatsapp": "5527999998888"})],
        );

        let mut req = request("assessor", "");
        req.user_text = None;
        req.action = Some("cadastrar_eleitor".to_string());
        req.parameters = Some(json!({"nome": "Outra", "telefone": "(27) 99999-8888"}));

        let resposta = service.executar(&req).await;
        assert!(!resposta.success);
        assert_eq!(resposta.message, "Já existe um eleitor com este telefone/WhatsApp: Ana");
    }

    #[tokio::test]
    async fn test_acao_explicita_desconhecida() {
        let (_, service) = service(None);
        let mut req = request("assessor", "");
        req.user_text = None;
        req.action = Some("apagar_tudo".to_string());

        let resposta = service.executar(&req).await;
        assert!(!resposta.success);
        assert_eq!(resposta.message, "Ação não reconhecida.");
    }

    #[tokio::test]
    async fn test_consultar_status_por_prefixo() {
        let (db, service) = service(None);
        db.seed(
            "demandas",
            vec![json!({
                "id": "a1b2c3d4-0000-0000-0000-000000000000",
                "gabinete_id": "gab-1",
                "titulo": "Buraco",
                "status": "aberta",
                "descricao": "x".repeat(120),
                "created_at": "2025-02-03T10:00:00Z"
            })],
        );

        let resposta = service.executar(&request("assessor", "status demanda a1b2c3d4")).await;
        assert!(resposta.success);
        assert!(resposta.message.contains("🏷️ Título: Buraco\n"));
        assert!(resposta.message.contains("📅 Criado: 03/02/2025\n"));
        assert!(resposta.message.contains(&format!("📝 Descrição: {}...\n", "x".repeat(100))));

        let nao_achou = service.executar(&request("assessor", "status ideia ffff")).await;
        assert_eq!(nao_achou.message, "ideia não encontrada com ID: ffff");

        let invalido = service.executar(&request("assessor", "status eleitor 1234")).await;
        assert_eq!(invalido.message, "Tipo inválido. Use: demanda, indicacao ou ideia.");
    }

    #[tokio::test]
    async fn test_listar_itens_vazio_e_preenchido() {
        let (db, service) = service(None);
        let vazio = service.executar(&request("assessor", "minhas ideias")).await;
        assert!(vazio.success);
        assert_eq!(vazio.message, "💡 Nenhum(a) ideias encontrado(a).");

        db.seed(
            "eleitores",
            vec![json!({"id": "12345678abc", "gabinete_id": "gab-1", "name": "João", "created_at": "2025-01-15T12:00:00Z"})],
        );
        let lista = service.executar(&request("assessor", "meus eleitores")).await;
        assert_eq!(
            lista.message,
            "👥 Seus eleitores (últimos 10):\n\n1. João\n   📅 15/01/2025 | ID: 12345678\n\n"
        );
    }

    #[tokio::test]
    async fn test_agenda_lista_proximos_eventos() {
        let (db, service) = service(None);
        db.seed(
            "eventos",
            vec![
                json!({"gabinete_id": "gab-1", "titulo": "Passado", "data_inicio": "2000-01-01T10:00:00Z"}),
                json!({"gabinete_id": "gab-1", "titulo": "Sessão", "local": "Câmara", "data_inicio": "2999-05-04T14:30:00Z"}),
            ],
        );

        let resposta = service.executar(&request("assessor", "agenda")).await;
        assert_eq!(resposta.message, "📅 *Próximos compromissos:*\n\n• 04/05 14:30 - Sessão (Câmara)");
    }

    #[tokio::test]
    async fn test_parser_ia_executa_acao() {
        let fake = Arc::new(FakeChat::replying(&[
            "```json\n{\"action\":\"cadastrar_ideia\",\"parameters\":{\"titulo\":\"Horta comunitária\"}}\n```",
        ]));
        let (db, service) = service(Some(fake.clone()));

        let resposta = service.executar(&request("atendente", "tive uma ideia de horta")).await;
        assert!(resposta.success);
        assert!(resposta.message.starts_with("💡 Ideia \"Horta comunitária\""));
        assert_eq!(db.rows("ideias")[0]["origem"], "whatsapp");

        let enviado = fake.last_request().unwrap();
        assert_eq!(enviado.max_tokens, Some(500));
        assert!(enviado.messages[0].content.contains("CARGO DO USUÁRIO: atendente"));
    }

    #[tokio::test]
    async fn test_parser_ia_texto_livre_vira_chat() {
        let fake = Arc::new(FakeChat::replying(&["Bom dia! Como posso ajudar?"]));
        let (_, service) = service(Some(fake));
        let resposta = service.executar(&request("assessor", "bom dia")).await;
        assert!(resposta.success);
        assert_eq!(resposta.message, "Bom dia! Como posso ajudar?");
    }

    #[tokio::test]
    async fn test_parser_ia_falha_tecnica() {
        let fake = Arc::new(FakeChat::with(FakeReply::Failure));
        let (_, service) = service(Some(fake));
        let parsed = service.parse_with_ai("oi", "assessor", None).await;
        assert_eq!(parsed, ParsedAction::chat(FALHA_TECNICA));
    }

    #[tokio::test]
    async fn test_esclarecer_sugere_do_catalogo() {
        let fake = Arc::new(FakeChat::replying(&[r#"{"action":"esclarecer","parameters":{}}"#]));
        let (_, service) = service(Some(fake));
        let resposta = service.executar(&request("assessor", "minhas demandsa")).await;
        assert!(!resposta.success);
        assert!(resposta.message.contains("1. minhas demandas"));
    }

    #[tokio::test]
    async fn test_dados_faltantes() {
        let fake = Arc::new(FakeChat::replying(&[
            r#"{"action":"dados_faltantes","parameters":{"campos_necessarios":["título da demanda"]}}"#,
        ]));
        let (_, service) = service(Some(fake));
        let resposta = service.executar(&request("assessor", "quero registrar")).await;
        assert_eq!(
            resposta.message,
            "📝 Faltam algumas informações:\n\n• título da demanda\n\nTente novamente com os dados completos."
        );
    }
}
