//! Web search tools backed by the Tavily and Serper APIs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Tool;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("realty-crew/0.3")
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Parse the optional `urls` argument (array of strings).
fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tavily
// ─────────────────────────────────────────────────────────────────────────────

/// Tavily web search with an optional list of URLs to scope the query.
pub struct TavilySearch {
    api_key: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: http_client(),
        }
    }

    /// Search and format the response. Never fails: errors come back as text.
    pub async fn search(&self, query: &str, urls: &[String]) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return "Error: TAVILY_API_KEY no encontrada. Por favor, configúrala en tu archivo .env."
                .to_string();
        };

        let query = query.trim();
        if query.is_empty() && urls.is_empty() {
            return "Error: Se requiere 'search_query' o 'urls' para la búsqueda Tavily."
                .to_string();
        }

        match self.request(api_key, query, urls).await {
            Ok(response) => format_tavily_response(&response),
            Err(e) => {
                tracing::warn!("Tavily search failed: {:#}", e);
                format!(
                    "Ocurrió un error al realizar la búsqueda con Tavily: {:#}",
                    e
                )
            }
        }
    }

    async fn request(
        &self,
        api_key: &str,
        query: &str,
        urls: &[String],
    ) -> anyhow::Result<TavilyResponse> {
        let effective_query = if query.is_empty() {
            urls.join(" ")
        } else {
            query.to_string()
        };

        let mut body = json!({
            "query": effective_query,
            "search_depth": "advanced",
            "include_answer": true,
        });
        let domains = scope_domains(urls);
        if !domains.is_empty() {
            body["include_domains"] = json!(domains);
        }

        tracing::info!("Tavily search: {}", effective_query);
        let response = self
            .http
            .post(TAVILY_SEARCH_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("HTTP error {}: {}", status, text));
        }

        Ok(response.json().await?)
    }
}

/// Hosts of the scoping URLs, in order, without duplicates.
fn scope_domains(urls: &[String]) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for raw in urls {
        let host = url::Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| raw.trim_end_matches('/').to_string());
        if !domains.contains(&host) {
            domains.push(host);
        }
    }
    domains
}

pub(crate) fn format_tavily_response(response: &TavilyResponse) -> String {
    let mut formatted = String::new();

    if let Some(answer) = response.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        formatted.push_str(&format!("Answer: {}\n\n", answer));
    }

    if !response.results.is_empty() {
        formatted.push_str("Relevant Results:\n");
        for (i, result) in response.results.iter().enumerate() {
            formatted.push_str(&format!("{}. Title: {}\n", i + 1, result.title));
            formatted.push_str(&format!("   URL: {}\n", result.url));
            formatted.push_str(&format!("   Snippet: {}\n\n", result.content));
        }
    }

    if formatted.is_empty() {
        return "No se encontraron resultados para la consulta.".to_string();
    }
    formatted
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Performs a web search using Tavily. Input should be a search query string. An optional list of URLs can be provided to search within. Returns relevant search results and a concise answer."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "The search query"
                },
                "urls": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Optional: URLs whose sites the search is restricted to"
                }
            },
            "required": ["search_query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let query = args["search_query"]
            .as_str()
            .or_else(|| args["query"].as_str())
            .unwrap_or_default();
        let urls = string_list(&args["urls"]);

        Ok(self.search(query, &urls).await)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serper
// ─────────────────────────────────────────────────────────────────────────────

/// Google search through the Serper API.
pub struct SerperSearch {
    api_key: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SerperResponse {
    #[serde(default)]
    answer_box: Option<SerperAnswerBox>,
    #[serde(default)]
    knowledge_graph: Option<SerperKnowledgeGraph>,
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperAnswerBox {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperKnowledgeGraph {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: http_client(),
        }
    }

    pub async fn search(&self, query: &str, num_results: u64) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return "Error: SERPER_API_KEY no encontrada. Por favor, configúrala en tu archivo .env."
                .to_string();
        };

        let query = query.trim();
        if query.is_empty() {
            return "Error: Se requiere 'query' para la búsqueda Serper.".to_string();
        }

        match self.request(api_key, query, num_results).await {
            Ok(response) => format_serper_response(&response),
            Err(e) => {
                tracing::warn!("Serper search failed: {:#}", e);
                format!(
                    "Ocurrió un error al realizar la búsqueda con Serper: {:#}",
                    e
                )
            }
        }
    }

    async fn request(
        &self,
        api_key: &str,
        query: &str,
        num_results: u64,
    ) -> anyhow::Result<SerperResponse> {
        tracing::info!("Serper search: {}", query);
        let response = self
            .http
            .post(SERPER_SEARCH_URL)
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query, "num": num_results }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("HTTP error {}: {}", status, text));
        }

        Ok(response.json().await?)
    }
}

pub(crate) fn format_serper_response(response: &SerperResponse) -> String {
    let mut formatted = String::new();

    let answer = response
        .answer_box
        .as_ref()
        .and_then(|b| b.answer.as_deref().or(b.snippet.as_deref()));
    if let Some(answer) = answer {
        formatted.push_str(&format!("Answer: {}\n\n", answer));
    }

    if let Some(kg) = &response.knowledge_graph {
        if let Some(description) = kg.description.as_deref() {
            let title = kg.title.as_deref().unwrap_or("Knowledge Graph");
            formatted.push_str(&format!("{}: {}\n\n", title, description));
        }
    }

    if !response.organic.is_empty() {
        formatted.push_str("Search Results:\n");
        for (i, item) in response.organic.iter().enumerate() {
            formatted.push_str(&format!("{}. Title: {}\n", i + 1, item.title));
            formatted.push_str(&format!("   URL: {}\n", item.link));
            formatted.push_str(&format!("   Snippet: {}\n\n", item.snippet));
        }
    }

    if formatted.is_empty() {
        return "No se encontraron resultados para la consulta.".to_string();
    }
    formatted
}

#[async_trait]
impl Tool for SerperSearch {
    fn name(&self) -> &str {
        "serper_search"
    }

    fn description(&self) -> &str {
        "Searches Google through Serper. Input is a search query. Returns the answer box when available followed by titles, links and snippets of the organic results."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .or_else(|| args["search_query"].as_str())
            .unwrap_or_default();
        let num_results = args["num_results"].as_u64().unwrap_or(10).clamp(1, 100);

        Ok(self.search(query, num_results).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tavily_without_key_reports_missing_credential() {
        let tool = TavilySearch::new(None);
        let out = tool
            .execute(json!({"search_query": "casas en Pereira"}), Path::new("."))
            .await
            .unwrap();
        assert!(out.starts_with("Error:"));
        assert!(out.contains("TAVILY_API_KEY"));
    }

    #[tokio::test]
    async fn tavily_requires_query_or_urls() {
        let tool = TavilySearch::new(Some("tvly-test".to_string()));
        let out = tool.search("  ", &[]).await;
        assert!(out.contains("Se requiere 'search_query' o 'urls'"));
    }

    #[tokio::test]
    async fn serper_without_key_reports_missing_credential() {
        let tool = SerperSearch::new(None);
        let out = tool.search("apartamentos Cuba", 5).await;
        assert!(out.contains("SERPER_API_KEY"));
    }

    #[test]
    fn tavily_formats_answer_and_numbered_results() {
        let response: TavilyResponse = serde_json::from_value(json!({
            "answer": "Precios entre 250 y 500 millones.",
            "results": [
                {"title": "Casa en Cuba", "url": "https://example.com/1", "content": "3 habitaciones", "score": 0.9},
                {"title": "Apto en Pinares", "url": "https://example.com/2", "content": "Piso 8"}
            ]
        }))
        .unwrap();
        let out = format_tavily_response(&response);
        assert!(out.starts_with("Answer: Precios entre 250 y 500 millones.\n\n"));
        assert!(out.contains("Relevant Results:\n1. Title: Casa en Cuba\n   URL: https://example.com/1\n   Snippet: 3 habitaciones"));
        assert!(out.contains("2. Title: Apto en Pinares"));
    }

    #[test]
    fn tavily_empty_response_is_no_results() {
        let out = format_tavily_response(&TavilyResponse::default());
        assert_eq!(out, "No se encontraron resultados para la consulta.");
    }

    #[test]
    fn serper_formats_answer_box_and_organic() {
        let response: SerperResponse = serde_json::from_value(json!({
            "answerBox": {"snippet": "Estrato 4 promedio"},
            "organic": [{"title": "Fincaraiz", "link": "https://fincaraiz.com.co", "snippet": "Listados"}]
        }))
        .unwrap();
        let out = format_serper_response(&response);
        assert!(out.starts_with("Answer: Estrato 4 promedio"));
        assert!(out.contains("1. Title: Fincaraiz\n   URL: https://fincaraiz.com.co"));
        assert_eq!(
            format_serper_response(&SerperResponse::default()),
            "No se encontraron resultados para la consulta."
        );
    }

    #[test]
    fn scope_domains_extracts_hosts() {
        let urls = vec![
            "https://www.fincaraiz.com.co/venta/pereira".to_string(),
            "https://fincaraiz.com.co/otra".to_string(),
            "metrocuadrado.com".to_string(),
        ];
        assert_eq!(
            scope_domains(&urls),
            vec!["fincaraiz.com.co".to_string(), "metrocuadrado.com".to_string()]
        );
    }

    #[test]
    fn url_argument_ignores_non_strings() {
        assert_eq!(
            string_list(&json!(["https://a.co", 3, " ", "b.co"])),
            vec!["https://a.co".to_string(), "b.co".to_string()]
        );
        assert!(string_list(&Value::Null).is_empty());
    }
}
