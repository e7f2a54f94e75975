use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Linha de `eleitores`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Eleitor {
    pub id: String,
    pub gabinete_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub cep: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_leader: Option<bool>,
    #[serde(default)]
    pub leader_type: Option<String>,
    #[serde(default)]
    pub leader_subtype: Option<String>,
    #[serde(default)]
    pub social_media: Option<Value>,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Corpo de `POST /eleitores`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovoEleitor {
    pub gabinete_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub cep: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_leader: Option<bool>,
    #[serde(default)]
    pub leader_type: Option<String>,
    #[serde(default)]
    pub leader_subtype: Option<String>,
    #[serde(default)]
    pub social_media: Option<Value>,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
}

/// Corpo de `POST /eleitores/duplicidade`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateQuery {
    pub gabinete_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default, rename = "excludeId", alias = "exclude_id")]
    pub exclude_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateField {
    Email,
    Whatsapp,
    BirthDate,
}

impl DuplicateField {
    pub fn display_name(&self) -> &'static str {
        match self {
            DuplicateField::Email => "e-mail",
            DuplicateField::Whatsapp => "telefone/WhatsApp",
            DuplicateField::BirthDate => "data de nascimento",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            DuplicateField::Email => "email",
            DuplicateField::Whatsapp => "whatsapp",
            DuplicateField::BirthDate => "birth_date",
        }
    }
}

/// Resumo do eleitor já existente
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExistingVoter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateCheck {
    #[serde(rename = "isDuplicate")]
    pub is_duplicate: bool,
    #[serde(rename = "duplicateField", skip_serializing_if = "Option::is_none")]
    pub duplicate_field: Option<DuplicateField>,
    #[serde(rename = "existingVoter", skip_serializing_if = "Option::is_none")]
    pub existing_voter: Option<ExistingVoter>,
}

impl DuplicateCheck {
    pub fn none() -> Self {
        Self {
            is_duplicate: false,
            duplicate_field: None,
            existing_voter: None,
        }
    }
}

/// Corpo de `POST /eleitores/bairros/validar`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidarBairroRequest {
    pub gabinete_id: String,
    pub nome: String,
}
