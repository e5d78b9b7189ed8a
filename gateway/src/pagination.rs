//! Shared `?limit=&cursor=` query extraction for list endpoints.

use serde::Deserialize;
use waymark_core::store::{Cursor, CursorPagination};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl From<PageQuery> for CursorPagination {
    fn from(query: PageQuery) -> Self {
        CursorPagination::new(query.limit, query.cursor.map(Cursor))
    }
}
