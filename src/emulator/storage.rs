use std::fs;
use std::path::Path;

use super::catalog::Catalog;
use super::WarehouseError;

/// Writes the whole catalog as a bincode snapshot.
pub fn save_snapshot(catalog: &Catalog, path: &Path) -> Result<(), WarehouseError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let encoded = bincode::serialize(catalog)
        .map_err(|e| WarehouseError::BinarySerialization(e.to_string()))?;
    fs::write(path, encoded)?;
    Ok(())
}

/// Reads a snapshot; `Ok(None)` when the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<Catalog>, WarehouseError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path)?;
    let catalog = bincode::deserialize(&data)
        .map_err(|e| WarehouseError::BinarySerialization(e.to_string()))?;
    Ok(Some(catalog))
}
