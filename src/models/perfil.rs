use serde::{Deserialize, Serialize};

/// Linha de `profiles`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Perfil {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub main_role: Option<String>,
}

/// Linha de `gabinete_usuarios`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membro {
    pub gabinete_id: String,
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Linha de `gabinetes`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gabinete {
    pub id: String,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub politico_id: Option<String>,
}

impl Gabinete {
    pub fn display_name(&self) -> &str {
        self.nome.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or("seu gabinete")
    }
}

/// Vínculo Telegram ↔ usuário (`ia_telegram_users`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramVinculo {
    pub telegram_user_id: i64,
    pub user_id: String,
    pub gabinete_id: String,
}
