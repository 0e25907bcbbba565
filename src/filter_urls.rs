use crate::filters::{FilterState, SortSpec};

/// Overlay raw wire pairs onto an existing state and re-normalize.
/// Setting a key to its default (`all`, empty, unparseable) clears it.
/// Any change beyond `page` itself restarts paging at 1, including when
/// the change carried an explicit `page` of its own.
pub fn apply_changes(current: &FilterState, changes: &[(&str, &str)]) -> FilterState {
    let mut pairs: Vec<(String, String)> = current
        .to_query_pairs()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    for (key, value) in changes {
        pairs.retain(|(k, _)| k != key);
        pairs.push((key.to_string(), value.to_string()));
    }

    let mut next = FilterState::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if next.differs_beyond_page(current) {
        next.page = 1;
    }
    next
}

/// Canonical address of the search page for a given state.
pub fn search_href(state: &FilterState) -> String {
    let query = state.to_query_string();
    if query.is_empty() {
        "/search".to_string()
    } else {
        format!("/search?{}", query)
    }
}

/// Same state, different page. Page changes never reset the rest.
pub fn page_href(state: &FilterState, page: u32) -> String {
    let mut target = state.clone();
    target.page = page.max(1);
    search_href(&target)
}

/// Same filters, different ordering. Selecting a new sort restarts
/// paging; re-selecting the current one is a no-op link.
pub fn sort_href(state: &FilterState, sort: SortSpec) -> String {
    let value = sort.to_string();
    let next = apply_changes(state, &[("sort", value.as_str())]);
    search_href(&next)
}

pub fn clear_href() -> &'static str {
    "/search"
}
