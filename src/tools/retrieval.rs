//! Retrieval tool handlers: routing, semantic search, metadata search, and
//! article lookup.
//!
//! All four read the vector store; store failures surface as "retrieval
//! unavailable" observations so a run never aborts on a flaky database.
//! User-visible observations are Traditional Chinese, matching the design
//! archive's audience.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{StoreError, ToolError};
use crate::llm::{ChatMessage, ChatRequest};
use crate::store::RetrievedDoc;
use crate::tools::executor::{Observation, ToolExecutor};

/// Result cap for structured metadata queries.
const METADATA_RESULT_LIMIT: usize = 20;

/// Prompt for the collection-routing tool. The design-area descriptions
/// mirror the ingestion corpus.
const ROUTER_TOOL_PROMPT: &str = r#"你是一個戰機設計領域的專家路由系統。根據工程師的問題和可用的設計領域資料庫列表，你的任務是選擇最相關的一個領域來回答問題。

工程師問題: "{query}"

可用的設計領域:
{collections}

設計領域說明：
- 空氣動力學: 機翼設計、升力係數、阻力分析、風洞數據、氣動外型、DATCOM 輸入檔
- 航電系統: 飛控系統、雷達、導航、感測器、航電架構、軟體程式碼
- 材料科學: 複合材料、合金、結構強度、耐熱材料、材料測試數據
- 武器掛載: 飛彈掛架、武器整合、電子作戰系統、掛載配置
- 推進系統: 引擎性能、推力向量、燃油系統、進氣道設計

請只回傳最適合的設計領域名稱，不要包含任何其他文字或解釋。"#;

static ARTICLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"第\s*(\d+)\s*條").unwrap_or_else(|e| unreachable!("{e}")),
        Regex::new(r"(?i)article\s*(\d+)").unwrap_or_else(|e| unreachable!("{e}")),
        Regex::new(r"(?i)art\.\s*(\d+)").unwrap_or_else(|e| unreachable!("{e}")),
    ]
});

/// Extracts an article number from free text, if present.
fn extract_article_number(text: &str) -> Option<String> {
    ARTICLE_PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn store_unavailable(name: &str, e: &StoreError) -> ToolError {
    ToolError::Execution {
        name: name.to_string(),
        message: format!("retrieval unavailable: {e}"),
    }
}

impl ToolExecutor {
    /// Formats retrieved documents as numbered citations with snippets.
    fn format_docs(&self, collection: &str, docs: &[RetrievedDoc]) -> String {
        let max_len = self.config.content_max_length;
        let parts: Vec<String> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let mut content = doc.content.clone();
                if content.chars().count() > max_len {
                    content = content.chars().take(max_len).collect::<String>() + "...";
                }
                let mut location = String::new();
                if let Some(page) = doc.metadata.get("page") {
                    location.push_str(&format!(", 頁碼: {page}"));
                }
                if let Some(section) = doc.metadata.get("section") {
                    location.push_str(&format!(", 章節: {section}"));
                }
                format!(
                    "=== 文件 {n} (來自『{collection}』領域) ===\n來源: {source}{location}\n相似度: {similarity:.3}\n內容:\n{content}\n",
                    n = i + 1,
                    source = doc.source,
                    similarity = doc.similarity,
                )
            })
            .collect();
        parts.join("\n---\n")
    }

    /// Picks the best design-area collection for a query via one chat call.
    pub(crate) async fn tool_design_area_router(
        &self,
        args: &str,
    ) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }
        const NAME: &str = "design_area_router";
        let args: Args = Self::parse_args(NAME, args)?;

        let collections = self
            .store
            .list_collections()
            .await
            .map_err(|e| store_unavailable(NAME, &e))?;
        if collections.is_empty() {
            return Ok(Observation::from(
                "錯誤: 資料庫中沒有找到任何設計領域。請先建立『空氣動力學』、『航電系統』等領域的資料庫。"
                    .to_string(),
            ));
        }

        let names: Vec<String> = collections.into_iter().map(|c| c.name).collect();
        let listing: String = names
            .iter()
            .map(|n| format!("- {n}\n"))
            .collect();
        let prompt = ROUTER_TOOL_PROMPT
            .replace("{query}", &args.query)
            .replace("{collections}", listing.trim_end());

        let request = ChatRequest {
            model: self.config.chat_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: Some(0.0),
            json_mode: false,
            tools: Vec::new(),
        };
        let reply = self
            .chat
            .complete(&request)
            .await
            .map_err(|e| ToolError::Execution {
                name: NAME.to_string(),
                message: e.to_string(),
            })?;

        // A tool-request reply carries no name; fall back to the first
        // collection, as for a hallucinated one.
        let selected = reply.text().unwrap_or_default().trim().to_string();
        let chosen = if names.iter().any(|n| n == &selected) {
            selected
        } else {
            names[0].clone()
        };
        Ok(Observation::from(chosen))
    }

    /// Semantic retrieval with citation formatting.
    pub(crate) async fn tool_retrieve_archive(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            collection: Option<String>,
            k: Option<usize>,
        }
        const NAME: &str = "retrieve_datcom_archive";
        let args: Args = Self::parse_args(NAME, args)?;

        let Some(collection) = args.collection.filter(|c| !c.is_empty()) else {
            return Ok(Observation::from(
                "請先使用 design_area_router 工具決定要搜尋的設計領域，再重新呼叫本工具並指定 collection。"
                    .to_string(),
            ));
        };
        let k = args.k.unwrap_or(self.config.top_k).max(1);

        let vector = self
            .embedder
            .embed_query(&args.query)
            .await
            .map_err(|e| ToolError::Execution {
                name: NAME.to_string(),
                message: format!("embedding failed: {e}"),
            })?;

        let docs = self
            .store
            .similarity_search(&collection, &vector, k, &Vec::new())
            .await
            .map_err(|e| store_unavailable(NAME, &e))?;

        if docs.is_empty() {
            return Ok(Observation::from(format!(
                "在『{collection}』領域中找不到相關的設計文件或程式碼。建議重新檢查查詢關鍵字或嘗試其他設計領域。"
            )));
        }

        let content = self.format_docs(&collection, &docs);
        Ok(Observation { content, docs })
    }

    /// Structured retrieval by exact metadata equality.
    pub(crate) async fn tool_metadata_search(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            collection: String,
            field: String,
            value: String,
        }
        const NAME: &str = "metadata_search";
        let args: Args = Self::parse_args(NAME, args)?;
        if args.field.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                name: NAME.to_string(),
                message: "a metadata field name is required".to_string(),
            });
        }

        let filter = vec![(args.field.clone(), args.value.clone())];
        let docs = self
            .store
            .metadata_lookup(&args.collection, &filter, METADATA_RESULT_LIMIT)
            .await
            .map_err(|e| store_unavailable(NAME, &e))?;

        if docs.is_empty() {
            return Ok(Observation::from(format!(
                "在 '{}' 中找不到符合條件的文件 ({}={})。",
                args.collection, args.field, args.value
            )));
        }

        let content = self.format_docs(&args.collection, &docs);
        Ok(Observation { content, docs })
    }

    /// Direct article lookup by number.
    pub(crate) async fn tool_article_lookup(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            reference: String,
            collection: Option<String>,
        }
        const NAME: &str = "article_lookup";
        let args: Args = Self::parse_args(NAME, args)?;

        let Some(number) = extract_article_number(&args.reference) else {
            return Ok(Observation::from(
                "無法從查詢中識別出條文編號。請改用 retrieve_datcom_archive 工具進行一般檢索。"
                    .to_string(),
            ));
        };
        let article_key = format!("第 {number} 條");

        let collection = match args.collection.filter(|c| !c.is_empty()) {
            Some(c) => c,
            None => {
                let collections = self
                    .store
                    .list_collections()
                    .await
                    .map_err(|e| store_unavailable(NAME, &e))?;
                match collections.into_iter().next() {
                    Some(c) => c.name,
                    None => {
                        return Ok(Observation::from(
                            "錯誤: 資料庫中沒有任何資料集可供查詢。".to_string(),
                        ));
                    }
                }
            }
        };

        let filter = vec![("article".to_string(), article_key.clone())];
        let docs = self
            .store
            .metadata_lookup(&collection, &filter, METADATA_RESULT_LIMIT)
            .await
            .map_err(|e| store_unavailable(NAME, &e))?;

        if docs.is_empty() {
            return Ok(Observation::from(format!(
                "在 '{collection}' 中找不到 {article_key}。"
            )));
        }

        let content = self.format_docs(&collection, &docs);
        Ok(Observation { content, docs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockChat, MockEmbedder, MockStore, test_config};
    use crate::tools::ToolCall;
    use std::sync::Arc;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn seeded_store() -> MockStore {
        let mut store = MockStore::empty();
        store.add_doc(
            "空氣動力學",
            "F-4 wing: S=530 ft2, A=2.8, taper 0.3, quarter-chord sweep 45 deg.",
            &[
                ("file_name", "f4_design_report.pdf"),
                ("section", "wing_geometry"),
                ("page", "12"),
            ],
            0.93,
        );
        store.add_doc(
            "空氣動力學",
            "FLTCON defines the flight condition matrix: NMACH, MACH, NALT, ALT, NALPHA, ALSCHD.",
            &[
                ("file_name", "datcom_manual.pdf"),
                ("section", "namelist_fltcon"),
                ("page", "55"),
            ],
            0.88,
        );
        store.add_doc(
            "法規",
            "第 24 條：無人機操作人員應遵守飛航安全規定。",
            &[
                ("file_name", "懲罰法.md"),
                ("article", "第 24 條"),
                ("page", "7"),
            ],
            0.0,
        );
        store
    }

    fn executor_with(store: MockStore, chat: MockChat) -> ToolExecutor {
        ToolExecutor::new(
            Arc::new(chat),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(store),
            test_config(),
        )
    }

    #[test]
    fn test_extract_article_number_formats() {
        assert_eq!(extract_article_number("第24條的內容"), Some("24".to_string()));
        assert_eq!(extract_article_number("第 24 條"), Some("24".to_string()));
        assert_eq!(extract_article_number("Article 24 says"), Some("24".to_string()));
        assert_eq!(extract_article_number("see art. 7"), Some("7".to_string()));
        assert_eq!(extract_article_number("wing sweep angle"), None);
    }

    #[tokio::test]
    async fn test_router_selects_valid_collection() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&["空氣動力學"]));
        let result = executor
            .execute(&call("design_area_router", r#"{"query":"wing sweep data"}"#))
            .await;
        assert!(!result.is_error, "got: {}", result.content);
        assert_eq!(result.content, "空氣動力學");
    }

    #[tokio::test]
    async fn test_router_falls_back_on_hallucinated_collection() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&["推進系統"]));
        let result = executor
            .execute(&call("design_area_router", r#"{"query":"wing sweep data"}"#))
            .await;
        assert!(!result.is_error);
        // MockStore lists collections sorted; the first is the fallback.
        assert_eq!(result.content, "法規");
    }

    #[tokio::test]
    async fn test_retrieve_formats_citations() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "retrieve_datcom_archive",
                r#"{"query":"F-4 wing geometry","collection":"空氣動力學"}"#,
            ))
            .await;
        assert!(!result.is_error, "got: {}", result.content);
        assert!(result.content.contains("=== 文件 1"));
        assert!(result.content.contains("來源: f4_design_report.pdf§wing_geometry"));
        assert_eq!(result.docs.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_without_collection_points_at_router() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call("retrieve_datcom_archive", r#"{"query":"wing"}"#))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("design_area_router"));
        assert!(result.docs.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_empty_collection_message() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "retrieve_datcom_archive",
                r#"{"query":"anything","collection":"材料科學"}"#,
            ))
            .await;
        // Unknown collection in the mock store behaves like the real
        // adapter: StoreError::UnknownCollection → error observation.
        assert!(result.is_error);
        assert!(result.content.contains("retrieval unavailable"));
    }

    #[tokio::test]
    async fn test_metadata_search_exact_match() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "metadata_search",
                r#"{"collection":"空氣動力學","field":"section","value":"namelist_fltcon"}"#,
            ))
            .await;
        assert!(!result.is_error, "got: {}", result.content);
        assert!(result.content.contains("datcom_manual.pdf"));
        assert_eq!(result.docs.len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_search_no_match_message() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "metadata_search",
                r#"{"collection":"空氣動力學","field":"section","value":"does_not_exist"}"#,
            ))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("找不到符合條件的文件"));
    }

    #[tokio::test]
    async fn test_article_lookup_found() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "article_lookup",
                r#"{"reference":"第24條的內容","collection":"法規"}"#,
            ))
            .await;
        assert!(!result.is_error, "got: {}", result.content);
        assert!(result.content.contains("第 24 條"));
        assert!(result.content.contains("懲罰法.md"));
    }

    #[tokio::test]
    async fn test_article_lookup_not_found() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "article_lookup",
                r#"{"reference":"article 99","collection":"法規"}"#,
            ))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("找不到 第 99 條"));
    }

    #[tokio::test]
    async fn test_article_lookup_no_reference() {
        let executor = executor_with(seeded_store(), MockChat::with_replies(&[]));
        let result = executor
            .execute(&call("article_lookup", r#"{"reference":"wing sweep"}"#))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("無法從查詢中識別出條文編號"));
    }

    #[tokio::test]
    async fn test_content_truncation() {
        let mut store = MockStore::empty();
        let long_text = "機翼設計資料 ".repeat(500);
        store.add_doc(
            "空氣動力學",
            &long_text,
            &[("file_name", "long.pdf"), ("section", "s1")],
            0.9,
        );
        let executor = executor_with(store, MockChat::with_replies(&[]));
        let result = executor
            .execute(&call(
                "retrieve_datcom_archive",
                r#"{"query":"機翼","collection":"空氣動力學"}"#,
            ))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("..."));
        // Truncated to content_max_length chars plus formatting overhead.
        assert!(result.content.chars().count() < long_text.chars().count());
    }
}
