use serde::{Deserialize, Serialize};
use std::fmt;

/// Tipos de e-mail transacional suportados pelo dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailType {
    InvitePolitico,
    WelcomePolitico,
    InviteChefe,
    WelcomeChefe,
    InviteAssessor,
    WelcomeAssessor,
    TwoFactorCode,
}

impl EmailType {
    pub fn parse(value: &str) -> Option<EmailType> {
        match value {
            "invite_politico" => Some(EmailType::InvitePolitico),
            "welcome_politico" => Some(EmailType::WelcomePolitico),
            "invite_chefe" => Some(EmailType::InviteChefe),
            "welcome_chefe" => Some(EmailType::WelcomeChefe),
            "invite_assessor" => Some(EmailType::InviteAssessor),
            "welcome_assessor" => Some(EmailType::WelcomeAssessor),
            "2fa_code" => Some(EmailType::TwoFactorCode),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::InvitePolitico => "invite_politico",
            EmailType::WelcomePolitico => "welcome_politico",
            EmailType::InviteChefe => "invite_chefe",
            EmailType::WelcomeChefe => "welcome_chefe",
            EmailType::InviteAssessor => "invite_assessor",
            EmailType::WelcomeAssessor => "welcome_assessor",
            EmailType::TwoFactorCode => "2fa_code",
        }
    }

    /// Convite do cargo; atendente recebe o de assessor
    pub fn invite_for_role(role: &str) -> Option<EmailType> {
        match role {
            "politico" => Some(EmailType::InvitePolitico),
            "chefe_gabinete" => Some(EmailType::InviteChefe),
            "assessor" | "atendente" => Some(EmailType::InviteAssessor),
            _ => None,
        }
    }

    pub fn welcome_for_role(role: &str) -> Option<EmailType> {
        match role {
            "politico" => Some(EmailType::WelcomePolitico),
            "chefe_gabinete" => Some(EmailType::WelcomeChefe),
            "assessor" | "atendente" => Some(EmailType::WelcomeAssessor),
            _ => None,
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corpo de `POST /emails`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailRequest {
    #[serde(default, rename = "type")]
    pub email_type: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub cabinet: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Assunto e HTML prontos para envio
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Linha de `email_templates`
#[derive(Debug, Clone, Deserialize)]
pub struct EmailTemplateRow {
    pub subject: String,
    pub html_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_type_round_trip_names() {
        for name in [
            "invite_politico",
            "welcome_politico",
            "invite_chefe",
            "welcome_chefe",
            "invite_assessor",
            "welcome_assessor",
            "2fa_code",
        ] {
            assert_eq!(EmailType::parse(name).map(|t| t.as_str()), Some(name));
        }
        assert_eq!(EmailType::parse("newsletter"), None);
    }

    #[test]
    fn test_role_mapping() {
        assert_eq!(EmailType::invite_for_role("atendente"), Some(EmailType::InviteAssessor));
        assert_eq!(EmailType::welcome_for_role("chefe_gabinete"), Some(EmailType::WelcomeChefe));
        assert_eq!(EmailType::invite_for_role("admin"), None);
    }
}
