use serde::{Deserialize, Serialize};
use super::data_type::WarehouseType;

/// A named result column. The type is known when the producing backend
/// reports one; drivers that only hand back names leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub data_type: Option<WarehouseType>,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, data_type: Option<WarehouseType>) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn typed(name: impl Into<String>, data_type: WarehouseType) -> Self {
        Self::new(name, Some(data_type))
    }
}
