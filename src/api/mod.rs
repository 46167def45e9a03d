pub mod history;
pub mod leave;
pub mod users;

use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number, starting at 1. Smaller values are treated as 1.
    pub page: Option<u64>,
}
