pub mod request;
pub mod response;
pub mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PageParams {
    /// Returns `(page, limit, offset)`; pages start at 1.
    pub fn resolve(&self, default_limit: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).max(1);
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::PageParams;

    #[test]
    fn resolves_defaults_and_clamps() {
        assert_eq!(PageParams::default().resolve(6), (1, 6, 0));
        let params = PageParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(params.resolve(6), (3, 10, 20));
        let params = PageParams {
            page: Some(0),
            limit: Some(-5),
        };
        assert_eq!(params.resolve(6), (1, 1, 0));
        let params = PageParams {
            page: Some(i64::MAX),
            limit: Some(2),
        };
        assert_eq!(params.resolve(6), (i64::MAX, 2, i64::MAX));
    }
}
