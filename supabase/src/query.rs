//! Query builder no estilo PostgREST
//!
//! O mesmo `Query` é renderizado como parâmetros de URL (cliente HTTP) ou
//! avaliado diretamente sobre linhas JSON (backend em memória).

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

/// Filtro sobre uma coluna
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    /// Padrão com `%` como curinga, sem diferenciar maiúsculas
    ILike(String, String),
    In(String, Vec<Value>),
    IsNull(String),
    /// `col = valor` OU `col` começa com `valor` (IDs curtos)
    EqOrPrefix(String, String),
}

#[derive(Debug, Clone, PartialEq)]
struct OrderBy {
    column: String,
    ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    columns: Option<String>,
    filters: Vec<Filter>,
    order: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.to_string(), value.into()));
        self
    }

    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gt(column.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.to_string(), value.into()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(column.to_string(), value.into()));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.to_string(), value.into()));
        self
    }

    pub fn ilike(mut self, column: &str, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column.to_string(), pattern.into()));
        self
    }

    pub fn in_<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn eq_or_prefix(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::EqOrPrefix(column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Parâmetros completos para GET (select, filtros, order, limit)
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];
        params.extend(self.filter_params());

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Apenas os filtros (PATCH/DELETE)
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| match f {
                Filter::Eq(c, v) => (c.clone(), format!("eq.{}", render(v))),
                Filter::Neq(c, v) => (c.clone(), format!("neq.{}", render(v))),
                Filter::Gt(c, v) => (c.clone(), format!("gt.{}", render(v))),
                Filter::Gte(c, v) => (c.clone(), format!("gte.{}", render(v))),
                Filter::Lt(c, v) => (c.clone(), format!("lt.{}", render(v))),
                Filter::Lte(c, v) => (c.clone(), format!("lte.{}", render(v))),
                Filter::ILike(c, p) => (c.clone(), format!("ilike.{}", p.replace('%', "*"))),
                Filter::In(c, values) => {
                    let list = values
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
                            other => render(other),
                        })
                        .collect::<Vec<_>>()
                        .join(",");
                    (c.clone(), format!("in.({})", list))
                }
                Filter::IsNull(c) => (c.clone(), "is.null".to_string()),
                Filter::EqOrPrefix(c, v) => (
                    "or".to_string(),
                    format!("({c}.eq.{v},{c}.ilike.{v}*)", c = c, v = v),
                ),
            })
            .collect()
    }

    /// Avalia os filtros sobre uma linha JSON
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| filter_matches(f, row))
    }

    /// Filtra, ordena e limita linhas em memória
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut selected: Vec<Value> = rows.iter().filter(|r| self.matches(r)).cloned().collect();

        if !self.order.is_empty() {
            selected.sort_by(|a, b| {
                for o in &self.order {
                    let ord = compare_values(
                        a.get(&o.column).unwrap_or(&Value::Null),
                        b.get(&o.column).unwrap_or(&Value::Null),
                    );
                    let ord = if o.ascending { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        selected
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_text(a), as_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn parse_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Ordenação: null primeiro, depois números, datas RFC 3339 e texto
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        _ => match (parse_datetime(a), parse_datetime(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => as_text(a).unwrap_or_default().cmp(&as_text(b).unwrap_or_default()),
        },
    }
}

/// `LIKE` sem diferenciar maiúsculas, `%` casa qualquer sequência
pub fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();

    // dp[j] = prefixo do padrão até i casa com t[..j]
    let mut dp = vec![false; t.len() + 1];
    dp[0] = true;

    for pc in &p {
        let mut next = vec![false; t.len() + 1];
        if *pc == '%' {
            let mut seen = false;
            for j in 0..=t.len() {
                seen = seen || dp[j];
                next[j] = seen;
            }
        } else {
            for j in 1..=t.len() {
                next[j] = dp[j - 1] && t[j - 1] == *pc;
            }
        }
        dp = next;
    }

    dp[t.len()]
}

fn filter_matches(filter: &Filter, row: &Value) -> bool {
    let field = |c: &str| row.get(c).unwrap_or(&Value::Null).clone();

    match filter {
        Filter::Eq(c, v) => loose_eq(&field(c), v),
        Filter::Neq(c, v) => !loose_eq(&field(c), v),
        Filter::Gt(c, v) => !field(c).is_null() && compare_values(&field(c), v) == Ordering::Greater,
        Filter::Gte(c, v) => !field(c).is_null() && compare_values(&field(c), v) != Ordering::Less,
        Filter::Lt(c, v) => !field(c).is_null() && compare_values(&field(c), v) == Ordering::Less,
        Filter::Lte(c, v) => !field(c).is_null() && compare_values(&field(c), v) != Ordering::Greater,
        Filter::ILike(c, p) => as_text(&field(c)).map(|s| like_match(p, &s)).unwrap_or(false),
        Filter::In(c, values) => {
            let current = field(c);
            values.iter().any(|v| loose_eq(&current, v))
        }
        Filter::IsNull(c) => field(c).is_null(),
        Filter::EqOrPrefix(c, v) => as_text(&field(c))
            .map(|s| s == *v || s.to_lowercase().starts_with(&v.to_lowercase()))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_params_renders_postgrest_syntax() {
        let q = Query::new()
            .select("id, titulo")
            .eq("gabinete_id", "g1")
            .ilike("email", "ana@x.com")
            .in_("status", ["criada", "atendida"])
            .order("created_at", false)
            .limit(10);

        let params = q.to_params();
        assert_eq!(params[0], ("select".to_string(), "id, titulo".to_string()));
        assert!(params.contains(&("gabinete_id".to_string(), "eq.g1".to_string())));
        assert!(params.contains(&("email".to_string(), "ilike.ana@x.com".to_string())));
        assert!(params.contains(&("status".to_string(), "in.(\"criada\",\"atendida\")".to_string())));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "10".to_string())));
    }

    #[test]
    fn test_eq_or_prefix_param() {
        let q = Query::new().eq_or_prefix("id", "a1b2");
        assert_eq!(
            q.filter_params(),
            vec![("or".to_string(), "(id.eq.a1b2,id.ilike.a1b2*)".to_string())]
        );
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("ana@x.com", "ANA@X.COM"));
        assert!(like_match("a1b2%", "a1b2c3d4"));
        assert!(like_match("%centro%", "Bairro Centro Sul"));
        assert!(!like_match("a1b2%", "xa1b2"));
    }

    #[test]
    fn test_apply_orders_by_datetime_and_limits() {
        let rows = vec![
            json!({"id": "1", "gabinete_id": "g", "created_at": "2024-01-02T10:00:00Z"}),
            json!({"id": "2", "gabinete_id": "g", "created_at": "2024-01-03T10:00:00.5+00:00"}),
            json!({"id": "3", "gabinete_id": "h", "created_at": "2024-01-04T10:00:00Z"}),
            json!({"id": "4", "gabinete_id": "g", "created_at": "2024-01-01T10:00:00Z"}),
        ];

        let result = Query::new()
            .eq("gabinete_id", "g")
            .order("created_at", false)
            .limit(2)
            .apply(&rows);

        let ids: Vec<&str> = result.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_range_filters_skip_nulls() {
        let rows = vec![
            json!({"id": "1", "expires_at": "2024-01-01T00:05:00Z", "used": false}),
            json!({"id": "2", "expires_at": null, "used": false}),
            json!({"id": "3", "expires_at": "2023-12-31T00:00:00Z", "used": false}),
        ];

        let result = Query::new()
            .gte("expires_at", "2024-01-01T00:00:00Z")
            .eq("used", false)
            .apply(&rows);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], "1");
    }
}
