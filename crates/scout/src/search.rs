//! Keyword search over the company catalog, exposed to the model as `search_startups`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::{AgentError, AgentResult, StoreResult};
use crate::models::company::CompanyRecord;
use crate::models::tool::Tool;
use crate::store::CompanyStore;
use crate::tool::ToolHandler;

pub const SEARCH_TOOL_NAME: &str = "search_startups";

/// How multiple keywords combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMatch {
    /// A record qualifies if it matches at least one keyword
    #[default]
    Any,
    /// A record qualifies only if it matches every keyword
    All,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub keyword_match: KeywordMatch,
    pub default_limit: usize,
    pub max_limit: usize,
    pub description_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keyword_match: KeywordMatch::Any,
            default_limit: 10,
            max_limit: 50,
            description_chars: 300,
        }
    }
}

/// Validated arguments of a search call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchArguments {
    pub keywords: Vec<String>,
    pub city: Option<String>,
    pub limit: usize,
}

impl SearchArguments {
    /// Validate untrusted arguments produced by the model
    pub fn from_value(arguments: &Value, config: &SearchConfig) -> AgentResult<Self> {
        let object = arguments.as_object().ok_or_else(|| {
            AgentError::InvalidParameters("arguments must be a JSON object".to_string())
        })?;

        let keywords = match object.get("keywords") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item.as_str().map(str::trim) {
                    Some(keyword) if !keyword.is_empty() => Ok(keyword.to_string()),
                    _ => Err(AgentError::InvalidParameters(format!(
                        "keywords must be non-empty strings, got {}",
                        item
                    ))),
                })
                .collect::<AgentResult<Vec<_>>>()?,
            Some(other) => {
                return Err(AgentError::InvalidParameters(format!(
                    "keywords must be an array of strings, got {}",
                    other
                )))
            }
            None => {
                return Err(AgentError::InvalidParameters(
                    "missing required argument: keywords".to_string(),
                ))
            }
        };

        let city = match object.get("city") {
            None | Some(Value::Null) => None,
            Some(Value::String(city)) if city.trim().is_empty() => None,
            Some(Value::String(city)) => Some(city.trim().to_string()),
            Some(other) => {
                return Err(AgentError::InvalidParameters(format!(
                    "city must be a string, got {}",
                    other
                )))
            }
        };

        let limit = match object.get("limit") {
            None | Some(Value::Null) => config.default_limit,
            Some(value) => match value.as_i64() {
                Some(limit) if limit > 0 => (limit as usize).min(config.max_limit),
                _ => {
                    return Err(AgentError::InvalidParameters(format!(
                        "limit must be a positive integer, got {}",
                        value
                    )))
                }
            },
        };

        if keywords.is_empty() && city.is_none() {
            return Err(AgentError::InvalidParameters(
                "provide at least one keyword or a city".to_string(),
            ));
        }

        Ok(Self {
            keywords,
            city,
            limit,
        })
    }
}

/// Case-insensitive keyword filter over name, description and excerpt text
struct Matcher {
    keywords: Vec<String>,
    city: Option<String>,
    mode: KeywordMatch,
}

impl Matcher {
    fn new(keywords: &[String], city: Option<&str>, mode: KeywordMatch) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            city: city.map(str::to_lowercase),
            mode,
        }
    }

    fn matches(&self, record: &CompanyRecord) -> bool {
        if let Some(city) = &self.city {
            if !record.location.to_lowercase().contains(city.as_str()) {
                return false;
            }
        }
        if self.keywords.is_empty() {
            return true;
        }

        let fields = [
            record.name.to_lowercase(),
            record.description.to_lowercase(),
            record.excerpt_text.to_lowercase(),
        ];
        let hit = |keyword: &String| fields.iter().any(|field| field.contains(keyword.as_str()));

        match self.mode {
            KeywordMatch::Any => self.keywords.iter().any(hit),
            KeywordMatch::All => self.keywords.iter().all(hit),
        }
    }
}

/// Searches a company store by keyword and city
#[derive(Clone)]
pub struct SearchTool {
    store: Arc<dyn CompanyStore>,
    config: SearchConfig,
    tool: Tool,
}

impl SearchTool {
    pub fn new(store: Arc<dyn CompanyStore>, config: SearchConfig) -> Self {
        let tool = Tool::new(
            SEARCH_TOOL_NAME,
            "Search the startup database using keywords and an optional city filter",
            json!({
                "type": "object",
                "required": ["keywords"],
                "properties": {
                    "keywords": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Search terms to match against company names, descriptions, and website text"
                    },
                    "city": {
                        "type": "string",
                        "description": "Optional city name to filter results"
                    },
                    "limit": {
                        "type": "integer",
                        "description": format!("Maximum number of results (default {}, at most {})", config.default_limit, config.max_limit),
                        "default": config.default_limit
                    }
                }
            }),
        );

        Self {
            store,
            config,
            tool,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Return up to `limit` matching records in catalog order
    pub fn search(
        &self,
        keywords: &[String],
        city: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<CompanyRecord>> {
        search_store(
            self.store.as_ref(),
            keywords,
            city,
            limit,
            self.config.keyword_match,
        )
    }
}

fn search_store(
    store: &dyn CompanyStore,
    keywords: &[String],
    city: Option<&str>,
    limit: usize,
    mode: KeywordMatch,
) -> StoreResult<Vec<CompanyRecord>> {
    let matcher = Matcher::new(keywords, city, mode);
    let mut results = Vec::new();
    if limit == 0 {
        return Ok(results);
    }

    store.scan(&mut |record| {
        if matcher.matches(record) {
            results.push(record.clone());
        }
        results.len() < limit
    })?;
    Ok(results)
}

#[async_trait]
impl ToolHandler for SearchTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    fn status(&self, arguments: &Value) -> Option<String> {
        let keywords: Vec<&str> = arguments
            .get("keywords")?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .collect();
        Some(format!(
            "\n\n🔍 *Searching database for: {}...*\n\n",
            keywords.join(", ")
        ))
    }

    async fn call(&self, arguments: Value) -> AgentResult<Value> {
        let args = SearchArguments::from_value(&arguments, &self.config)?;
        debug!(?args, "searching catalog");

        let store = Arc::clone(&self.store);
        let mode = self.config.keyword_match;
        let records = tokio::task::spawn_blocking(move || {
            search_store(
                store.as_ref(),
                &args.keywords,
                args.city.as_deref(),
                args.limit,
                mode,
            )
        })
        .await
        .map_err(|e| AgentError::ExecutionError(e.to_string()))?
        .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        let summaries: Vec<_> = records
            .iter()
            .map(|record| record.summary(self.config.description_chars))
            .collect();
        serde_json::to_value(summaries).map_err(|e| AgentError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::MemoryStore;

    fn catalog() -> Vec<CompanyRecord> {
        vec![
            CompanyRecord::new("Ledgerly")
                .with_description("Fintech platform for SMBs")
                .with_website("https://ledgerly.io")
                .with_location("New York, NY"),
            CompanyRecord::new("Taxo")
                .with_description("AI-assisted tax filing for freelancers")
                .with_location("Austin"),
            CompanyRecord::new("TaxBot")
                .with_description("Automated tax compliance")
                .with_excerpt("Our AI reads receipts")
                .with_location("New York"),
            CompanyRecord::new("Shipwise")
                .with_description("Logistics software")
                .with_location("Chicago"),
        ]
    }

    fn tool_with(mode: KeywordMatch) -> SearchTool {
        SearchTool::new(
            Arc::new(MemoryStore::new(catalog())),
            SearchConfig {
                keyword_match: mode,
                ..Default::default()
            },
        )
    }

    fn names(records: &[CompanyRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_substring_match() {
        let tool = tool_with(KeywordMatch::Any);
        let results = tool.search(&kw(&["fintech"]), None, 10).unwrap();
        assert_eq!(names(&results), vec!["Ledgerly"]);

        let results = tool.search(&kw(&["zzzznomatch"]), None, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_keyword_matches_any_field() {
        let tool = tool_with(KeywordMatch::Any);
        // name
        assert_eq!(
            names(&tool.search(&kw(&["shipwise"]), None, 10).unwrap()),
            vec!["Shipwise"]
        );
        // excerpt only
        assert_eq!(
            names(&tool.search(&kw(&["receipts"]), None, 10).unwrap()),
            vec!["TaxBot"]
        );
    }

    #[test]
    fn test_city_filter_is_always_conjunctive() {
        for mode in [KeywordMatch::Any, KeywordMatch::All] {
            let tool = tool_with(mode);
            let results = tool.search(&kw(&["ai", "tax"]), Some("New York"), 5).unwrap();
            assert!(results.iter().all(|r| r.location.contains("New York")));
            assert_eq!(names(&results), vec!["TaxBot"]);
        }
    }

    #[test]
    fn test_keyword_combinators() {
        let any = tool_with(KeywordMatch::Any);
        assert_eq!(
            names(&any.search(&kw(&["fintech", "logistics"]), None, 10).unwrap()),
            vec!["Ledgerly", "Shipwise"]
        );

        let all = tool_with(KeywordMatch::All);
        assert!(all
            .search(&kw(&["fintech", "logistics"]), None, 10)
            .unwrap()
            .is_empty());
        // each keyword may hit a different field
        assert_eq!(
            names(&all.search(&kw(&["tax", "receipts"]), None, 10).unwrap()),
            vec!["TaxBot"]
        );
    }

    #[test]
    fn test_limit_keeps_catalog_order() {
        let tool = tool_with(KeywordMatch::Any);
        let results = tool.search(&kw(&["tax"]), None, 1).unwrap();
        assert_eq!(names(&results), vec!["Taxo"]);
    }

    #[test]
    fn test_city_only_search() {
        let tool = tool_with(KeywordMatch::Any);
        let results = tool.search(&[], Some("new york"), 10).unwrap();
        assert_eq!(names(&results), vec!["Ledgerly", "TaxBot"]);
    }

    #[test]
    fn test_search_is_repeatable() {
        let tool = tool_with(KeywordMatch::Any);
        let first = tool.search(&kw(&["tax", "fintech"]), None, 10).unwrap();
        let second = tool.search(&kw(&["tax", "fintech"]), None, 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_argument_validation() {
        let config = SearchConfig::default();

        let args = SearchArguments::from_value(&json!({"keywords": ["ai"]}), &config).unwrap();
        assert_eq!(args.limit, 10);
        assert_eq!(args.city, None);

        let args = SearchArguments::from_value(
            &json!({"keywords": [" ai "], "city": "", "limit": 500}),
            &config,
        )
        .unwrap();
        assert_eq!(args.keywords, vec!["ai"]);
        assert_eq!(args.city, None);
        assert_eq!(args.limit, 50);

        let args =
            SearchArguments::from_value(&json!({"keywords": [], "city": "Boston"}), &config)
                .unwrap();
        assert_eq!(args.city.as_deref(), Some("Boston"));

        for bad in [
            json!({"keywords": ["ai"], "limit": -1}),
            json!({"keywords": ["ai"], "limit": 0}),
            json!({"keywords": ["ai"], "limit": "ten"}),
            json!({"keywords": []}),
            json!({"keywords": [""]}),
            json!({"keywords": [3]}),
            json!({"keywords": "ai"}),
            json!({"city": "Boston"}),
            json!({"keywords": ["ai"], "city": 7}),
            json!("{not json"),
        ] {
            let err = SearchArguments::from_value(&bad, &config).unwrap_err();
            assert!(
                matches!(err, AgentError::InvalidParameters(_)),
                "expected invalid parameters for {}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_call_returns_truncated_summaries() {
        let tool = SearchTool::new(
            Arc::new(MemoryStore::new(catalog())),
            SearchConfig {
                description_chars: 7,
                ..Default::default()
            },
        );

        let payload = tool
            .call(json!({"keywords": ["fintech"], "limit": 3}))
            .await
            .unwrap();

        assert_eq!(
            payload,
            json!([{
                "company_name": "Ledgerly",
                "description": "Fintech",
                "website_url": "https://ledgerly.io",
                "city": "New York, NY"
            }])
        );
    }

    struct BrokenStore;

    impl CompanyStore for BrokenStore {
        fn scan(&self, _visit: &mut dyn FnMut(&CompanyRecord) -> bool) -> StoreResult<()> {
            Err(StoreError::Poisoned)
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_execution_error() {
        let tool = SearchTool::new(Arc::new(BrokenStore), SearchConfig::default());
        let err = tool.call(json!({"keywords": ["ai"]})).await.unwrap_err();
        assert!(matches!(err, AgentError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_the_store() {
        let tool = SearchTool::new(Arc::new(BrokenStore), SearchConfig::default());
        let err = tool.call(json!({"keywords": []})).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[test]
    fn test_status_lists_keywords() {
        let tool = tool_with(KeywordMatch::Any);
        let status = tool
            .status(&json!({"keywords": ["fintech", "finance"]}))
            .unwrap();
        assert!(status.contains("fintech, finance"));
        assert!(tool.status(&json!("garbage")).is_none());
    }
}
