//! Cadastro de eleitores: duplicidade e bairros normalizados

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::{DuplicateCheck, DuplicateField, DuplicateQuery, Eleitor, ExistingVoter, NovoEleitor};
use crate::utils::logging::log_info;
use crate::utils::normalization::{are_equivalent_strings, normalize_email, normalize_for_storage, normalize_phone};
use crate::utils::{AppError, AppResult};

pub const TABELA_ELEITORES: &str = "eleitores";

/// "Já existe um eleitor com este {campo}: {nome}"
pub fn duplicate_message(field: DuplicateField, existing: &ExistingVoter) -> String {
    format!("Já existe um eleitor com este {}: {}", field.display_name(), existing.name)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct EleitoresService {
    db: Arc<dyn TableBackend>,
}

impl EleitoresService {
    pub fn new(db: Arc<dyn TableBackend>) -> Self {
        Self { db }
    }

    /// Verifica e-mail, WhatsApp e data de nascimento, nessa ordem
    pub async fn check_duplicate(&self, query: &DuplicateQuery) -> AppResult<DuplicateCheck> {
        let candidatos = [
            (DuplicateField::Email, non_empty(&query.email).map(normalize_email)),
            (DuplicateField::Whatsapp, non_empty(&query.whatsapp).map(normalize_phone)),
            (DuplicateField::BirthDate, non_empty(&query.birth_date).map(str::to_string)),
        ];

        for (field, valor) in candidatos {
            let Some(valor) = valor.filter(|v| !v.is_empty()) else {
                continue;
            };

            let mut filtro = Query::new()
                .select("id,name,email,whatsapp,birth_date")
                .eq("gabinete_id", query.gabinete_id.as_str())
                .eq(field.column(), valor.as_str())
                .limit(1);
            if let Some(exclude_id) = non_empty(&query.exclude_id) {
                filtro = filtro.neq("id", exclude_id);
            }

            if let Some(existing) = self.db.select_one_as::<ExistingVoter>(TABELA_ELEITORES, &filtro).await? {
                return Ok(DuplicateCheck {
                    is_duplicate: true,
                    duplicate_field: Some(field),
                    existing_voter: Some(existing),
                });
            }
        }

        Ok(DuplicateCheck::none())
    }

    pub async fn criar_eleitor(&self, novo: NovoEleitor, user_id: Option<&str>) -> AppResult<Eleitor> {
        let name = novo.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("Nome é obrigatório".to_string()));
        }
        if novo.gabinete_id.trim().is_empty() {
            return Err(AppError::ValidationError("gabinete_id é obrigatório".to_string()));
        }

        let email = non_empty(&novo.email).map(normalize_email);
        let whatsapp = non_empty(&novo.whatsapp).map(normalize_phone);

        let check = self
            .check_duplicate(&DuplicateQuery {
                gabinete_id: novo.gabinete_id.clone(),
                email: email.clone(),
                whatsapp: whatsapp.clone(),
                birth_date: novo.birth_date.clone(),
                exclude_id: None,
            })
            .await?;
        if let (Some(field), Some(existing)) = (check.duplicate_field, check.existing_voter.as_ref()) {
            return Err(AppError::Conflict(duplicate_message(field, existing)));
        }

        let mut row = Map::new();
        row.insert("gabinete_id".into(), json!(novo.gabinete_id));
        row.insert("name".into(), json!(name));
        if let Some(user_id) = user_id {
            row.insert("user_id".into(), json!(user_id));
        }
        if let Some(email) = email {
            row.insert("email".into(), json!(email));
        }
        if let Some(whatsapp) = whatsapp {
            row.insert("whatsapp".into(), json!(whatsapp));
        }
        if let Some(bairro) = non_empty(&novo.neighborhood) {
            row.insert("neighborhood".into(), json!(normalize_for_storage(bairro)));
        }
        if let Some(profissao) = non_empty(&novo.profession) {
            row.insert("profession".into(), json!(normalize_for_storage(profissao)));
        }
        let textos = [
            ("birth_date", &novo.birth_date),
            ("address", &novo.address),
            ("cidade", &novo.cidade),
            ("cep", &novo.cep),
            ("sex", &novo.sex),
            ("leader_type", &novo.leader_type),
            ("leader_subtype", &novo.leader_subtype),
            ("profile_photo_url", &novo.profile_photo_url),
        ];
        for (coluna, valor) in textos {
            if let Some(valor) = non_empty(valor) {
                row.insert(coluna.into(), json!(valor));
            }
        }
        if let Some(tags) = &novo.tags {
            row.insert("tags".into(), json!(tags));
        }
        if let Some(is_leader) = novo.is_leader {
            row.insert("is_leader".into(), json!(is_leader));
        }
        if let Some(social) = &novo.social_media {
            row.insert("social_media".into(), social.clone());
        }

        let eleitor: Eleitor = self.db.insert_as(TABELA_ELEITORES, Value::Object(row)).await?;
        log_info(&format!("👥 Eleitor cadastrado: {} ({})", eleitor.name, eleitor.id));
        Ok(eleitor)
    }

    /// Bairros já usados pelos eleitores do gabinete, sem repetição
    pub async fn bairros(&self, gabinete_id: &str) -> AppResult<Vec<String>> {
        let rows = self
            .db
            .select(
                TABELA_ELEITORES,
                &Query::new().select("neighborhood").eq("gabinete_id", gabinete_id),
            )
            .await?;

        let distintos: BTreeSet<String> = rows
            .iter()
            .filter_map(|r| r.get("neighborhood").and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        Ok(distintos.into_iter().collect())
    }

    /// Falha com 409 se já houver um bairro equivalente (acentos e caixa ignorados)
    pub async fn validar_bairro(&self, gabinete_id: &str, nome: &str) -> AppResult<String> {
        let nome = nome.trim();
        if nome.is_empty() {
            return Err(AppError::ValidationError("Nome do bairro é obrigatório".to_string()));
        }

        let existentes = self.bairros(gabinete_id).await?;
        if existentes.iter().any(|b| are_equivalent_strings(b, nome)) {
            return Err(AppError::Conflict("Esse bairro já existe".to_string()));
        }

        Ok(normalize_for_storage(nome))
    }
}
