use crate::utils::error::{EtlError, Result};
use std::io::Write;
use std::path::Path;

/// 先寫到同目錄下的暫存檔再 rename，中途失敗不會留下半個檔案
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| EtlError::from(e.error))?;

    tracing::debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
