//! Production lines (read only)

use super::{DataSource, Entity};
use crate::models::ProductionLine;
use crate::remote::Order;
use crate::seed;

impl Entity for ProductionLine {
    const TABLE: &'static str = "production_lines";
    const ID_PREFIX: &'static str = "line";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        seed::production_lines()
    }
}

pub struct LinesRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> LinesRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    pub async fn get_all(&self, online: bool) -> Vec<ProductionLine> {
        if online {
            if let Some(rows) = self.ds.fetch_remote(ProductionLine::TABLE, "*", Order::asc("name")).await {
                return rows;
            }
        }
        self.ds.local::<ProductionLine>()
    }
}
