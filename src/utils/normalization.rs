//! Normalização de textos, telefones e e-mails
//!
//! Usado para gravar bairros/profissões de forma comparável e para detectar
//! eleitores duplicados independentemente de acentos e formatação.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Remove acentos via decomposição NFD
///
/// # Exemplos
/// ```
/// use gabinete_middleware::utils::normalization::remove_accents;
///
/// assert_eq!(remove_accents("Vitória"), "Vitoria");
/// assert_eq!(remove_accents("São Conçalo"), "Sao Concalo");
/// ```
pub fn remove_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Forma canônica para armazenamento e comparação
///
/// Sem acentos, minúsculo, apenas `[A-Za-z0-9_]` e espaços, espaços colapsados.
///
/// # Exemplos
/// ```
/// use gabinete_middleware::utils::normalization::normalize_for_storage;
///
/// assert_eq!(normalize_for_storage("  Jardim   Camburí! "), "jardim camburi");
/// assert_eq!(normalize_for_storage("Praia-do-Canto"), "praiadocanto");
/// ```
pub fn normalize_for_storage(text: &str) -> String {
    remove_accents(text)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Primeira letra de cada palavra maiúscula, o resto minúsculo
pub fn format_for_display(text: &str) -> String {
    text.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn are_equivalent_strings(a: &str, b: &str) -> bool {
    normalize_for_storage(a) == normalize_for_storage(b)
}

/// Apenas dígitos; números nacionais de 10/11 dígitos ganham o DDI 55
///
/// # Exemplos
/// ```
/// use gabinete_middleware::utils::normalization::normalize_phone;
///
/// assert_eq!(normalize_phone("(27) 99999-8888"), "5527999998888");
/// assert_eq!(normalize_phone("+55 27 99999-8888"), "5527999998888");
/// ```
pub fn normalize_phone(phone: &str) -> String {
    let digits = only_digits(phone);

    if (digits.len() == 10 || digits.len() == 11) && !digits.starts_with("55") {
        return format!("55{}", digits);
    }

    digits
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `(XX) XXXXX-XXXX` / `(XX) XXXX-XXXX`; outros formatos voltam como vieram
pub fn format_phone_display(phone: &str) -> String {
    let mut digits = only_digits(phone);

    if digits.len() == 13 && digits.starts_with("55") {
        digits = digits[2..].to_string();
    }

    match digits.len() {
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => phone.to_string(),
    }
}

/// Dois primeiros nomes, para saudações e listagens
pub fn format_name_short(full_name: Option<&str>) -> String {
    let parts: Vec<&str> = full_name.unwrap_or("").split_whitespace().take(2).collect();
    if parts.is_empty() {
        return "Usuário não identificado".to_string();
    }
    parts.join(" ")
}

pub fn only_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}
