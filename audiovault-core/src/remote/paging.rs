//! Pagination collectors.
//!
//! Both collectors call the fetch function strictly in sequence and flatten the
//! pages in order. Per-item tolerance lives in the fetch functions: a record
//! with missing nested fields is skipped (or replaced by a placeholder) and
//! never aborts the listing.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

/// One page of an offset-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Fetch pages at offsets `0, page_size, 2 * page_size, ...` until a page
/// reports no next page.
pub async fn collect_offset_pages<T, F, Fut>(page_size: usize, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch(offset).await?;
        all.extend(page.items);
        if !page.has_next {
            break;
        }
        offset += page_size;
    }

    Ok(all)
}

/// Fetch pages by following provider-issued cursors, starting with `None`.
pub async fn collect_cursor_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<CursorPage<T>>>,
{
    let mut all = Vec::new();
    let mut cursor = None;

    loop {
        let page = fetch(cursor.take()).await?;
        all.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(all)
}

/// Decode each raw item, skipping (and logging) those that do not fit `T`.
pub fn decode_lenient<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!("Skipping malformed {} record: {}", what, e);
                None
            }
        })
        .collect()
}

/// String at `pointer` in each item, skipping items where it is missing or blank.
pub fn ids_at(items: &[Value], pointer: &str, what: &str) -> Vec<String> {
    let ids: Vec<String> = items
        .iter()
        .filter_map(|item| item.pointer(pointer).and_then(Value::as_str))
        .filter(|id| !id.trim().is_empty())
        .map(str::to_owned)
        .collect();

    let skipped = items.len() - ids.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} {} records without an id", skipped, what);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    #[tokio::test]
    async fn test_offset_pages_fetch_until_last() {
        let offsets = Mutex::new(Vec::new());
        let sizes = [50, 50, 7];

        let all = collect_offset_pages(50, |offset| {
            offsets.lock().push(offset);
            let index = offset / 50;
            async move {
                Ok(Page {
                    items: vec![index; sizes[index]],
                    has_next: index + 1 < sizes.len(),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(all.len(), 107);
        assert_eq!(*offsets.lock(), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_offset_pages_single_empty_page() {
        let all: Vec<u8> = collect_offset_pages(50, |_| async {
            Ok(Page {
                items: vec![],
                has_next: false,
            })
        })
        .await
        .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_offset_pages_propagate_errors() {
        let result: Result<Vec<u8>> = collect_offset_pages(50, |offset| async move {
            if offset == 0 {
                Ok(Page {
                    items: vec![1],
                    has_next: true,
                })
            } else {
                Err(crate::error::SyncError::SessionExpired)
            }
        })
        .await;
        assert!(matches!(result, Err(crate::error::SyncError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_cursor_pages_follow_cursor() {
        let seen = Mutex::new(Vec::new());

        let all = collect_cursor_pages(|cursor: Option<String>| {
            seen.lock().push(cursor.clone());
            async move {
                let page = match cursor.as_deref() {
                    None => CursorPage {
                        items: vec!["a", "b"],
                        next_cursor: Some("b".to_string()),
                    },
                    Some(_) => CursorPage {
                        items: vec!["c"],
                        next_cursor: None,
                    },
                };
                Ok(page)
            }
        })
        .await
        .unwrap();

        assert_eq!(all, vec!["a", "b", "c"]);
        assert_eq!(*seen.lock(), vec![None, Some("b".to_string())]);
    }

    #[test]
    fn test_decode_lenient_skips_bad_records() {
        #[derive(Deserialize)]
        struct Named {
            name: String,
        }

        let items = vec![json!({"name": "ok"}), json!({"other": 1}), json!(null)];
        let decoded: Vec<Named> = decode_lenient(items, "named");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "ok");
    }

    #[test]
    fn test_ids_at_skips_missing() {
        let items = vec![
            json!({"track": {"id": "a"}}),
            json!({"track": null}),
            json!({"track": {"id": null}}),
            json!({}),
            json!({"track": {"id": " "}}),
            json!({"track": {"id": "b"}}),
        ];
        assert_eq!(ids_at(&items, "/track/id", "track"), vec!["a", "b"]);
    }
}
