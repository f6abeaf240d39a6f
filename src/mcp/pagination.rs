//! Cursor-following aggregation for the paged list operations
//!
//! `tools/list`, `resources/list`, and `prompts/list` all return one page of
//! items plus an optional `nextCursor`. [`collect_all`] is the single
//! routine that walks those pages for any of them: it starts without a
//! cursor, sends the same `_meta` on every request, skips `null` items, and
//! stops when the server stops returning a cursor. A failure on any page
//! aborts the whole run; partial results are never returned.

use std::future::Future;

use crate::error::{McpBenchError, Result};
use crate::mcp::types::{
    ListParams, ListPromptsResult, ListResourcesResult, ListToolsResult, McpTool, Meta, Prompt,
    Resource,
};

/// A single page from a cursor-paged list operation.
pub trait ListPage {
    /// The element type carried by the page.
    type Item;

    /// Split the page into its items (with `null` entries as `None`) and
    /// the cursor for the next page.
    fn into_page(self) -> (Vec<Option<Self::Item>>, Option<String>);
}

impl ListPage for ListToolsResult {
    type Item = McpTool;

    fn into_page(self) -> (Vec<Option<McpTool>>, Option<String>) {
        (self.tools, self.next_cursor)
    }
}

impl ListPage for ListResourcesResult {
    type Item = Resource;

    fn into_page(self) -> (Vec<Option<Resource>>, Option<String>) {
        (self.resources, self.next_cursor)
    }
}

impl ListPage for ListPromptsResult {
    type Item = Prompt;

    fn into_page(self) -> (Vec<Option<Prompt>>, Option<String>) {
        (self.prompts, self.next_cursor)
    }
}

/// Follow `nextCursor` until exhausted and return every item in order.
///
/// `fetch` is called once per page with `ListParams { cursor, meta }`;
/// the first call has no cursor and every call carries a clone of `meta`.
/// With `max_pages` set, needing page `max_pages + 1` fails with
/// [`McpBenchError::PaginationLimit`].
///
/// # Errors
///
/// Any fetch failure is returned under a [`McpBenchError::Aggregation`]
/// context naming the zero-based page index; the original error remains in
/// the chain.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::pagination::collect_all;
/// use mcpbench::mcp::types::{ListToolsResult, McpTool};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let tool = |name: &str| McpTool {
///     name: name.to_string(),
///     title: None,
///     description: None,
///     input_schema: serde_json::json!({}),
///     output_schema: None,
///     annotations: None,
///     meta: None,
/// };
/// let tools = collect_all(None, None, |params| {
///     let page = match params.cursor.as_deref() {
///         None => ListToolsResult {
///             tools: vec![Some(tool("a"))],
///             next_cursor: Some("c1".into()),
///             meta: None,
///         },
///         _ => ListToolsResult {
///             tools: vec![Some(tool("b"))],
///             next_cursor: None,
///             meta: None,
///         },
///     };
///     async move { Ok::<_, anyhow::Error>(page) }
/// })
/// .await?;
/// assert_eq!(tools.len(), 2);
/// # Ok(())
/// # }
/// ```
pub async fn collect_all<P, F, Fut>(
    meta: Option<Meta>,
    max_pages: Option<usize>,
    mut fetch: F,
) -> Result<Vec<P::Item>>
where
    P: ListPage,
    F: FnMut(ListParams) -> Fut,
    Fut: Future<Output = Result<P>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page = 0usize;

    loop {
        if let Some(limit) = max_pages {
            if page >= limit {
                return Err(McpBenchError::PaginationLimit { limit }.into());
            }
        }

        let params = ListParams {
            cursor: cursor.take(),
            meta: meta.clone(),
        };

        let result = match fetch(params).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("{e:#}");
                return Err(e.context(McpBenchError::Aggregation { page, message }));
            }
        };

        let (page_items, next) = result.into_page();
        items.extend(page_items.into_iter().flatten());
        page += 1;

        match next {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    tracing::debug!(pages = page, items = items.len(), "list aggregation complete");
    Ok(items)
}
