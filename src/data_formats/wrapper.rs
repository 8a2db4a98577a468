use serde::{Deserialize, Serialize};

/// A page of results with links to its neighbours.
#[derive(Debug, Deserialize, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(results: Vec<T>, count: i64, path: &str, page: i64, limit: i64) -> Self {
        let link = |page: i64| format!("{path}?page={page}&limit={limit}");
        let next = (page.saturating_mul(limit) < count).then(|| link(page + 1));
        let previous = (page > 1).then(|| link(page - 1));
        Paginated {
            count,
            next,
            previous,
            results,
        }
    }
}
