/// Utilitários para cortar textos por caracteres (nunca no meio de um code point)

/// Primeiros `max_chars` caracteres
///
/// # Exemplo
/// ```
/// use gabinete_middleware::utils::string_utils::truncate_chars;
///
/// assert_eq!(truncate_chars("Iluminação pública", 10), "Iluminação");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Corta e adiciona o sufixo apenas quando o texto foi de fato cortado
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    let truncated = truncate_chars(s, max_chars);
    if truncated.len() < s.len() {
        format!("{}{}", truncated, suffix)
    } else {
        truncated.to_string()
    }
}

/// ID curto exibido nas respostas do bot (8 primeiros caracteres)
pub fn short_id(id: &str) -> &str {
    truncate_chars(id, 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_ascii() {
        let text = "Hello, World!";
        assert_eq!(truncate_chars(text, 5), "Hello");
        assert_eq!(truncate_chars(text, 100), text);
    }

    #[test]
    fn test_truncate_chars_utf8() {
        let text = "Olá, mundo! 🌍";
        assert_eq!(truncate_chars(text, 3), "Olá");
        assert_eq!(truncate_chars(text, 13), "Olá, mundo! 🌍");
    }

    #[test]
    fn test_truncate_with_suffix() {
        let text = "This is a very long text";
        assert_eq!(truncate_with_suffix(text, 9, "..."), "This is a...");
        assert_eq!(truncate_with_suffix("curto", 9, "..."), "curto");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("a1b2c3d4-e5f6-7890"), "a1b2c3d4");
        assert_eq!(short_id("abc"), "abc");
    }
}
