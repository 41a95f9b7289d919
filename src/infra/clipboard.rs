use crate::error::HangarError;
use arboard::Clipboard;

/// Copy captured pane text to the system clipboard
pub fn copy_text(text: &str) -> Result<(), HangarError> {
    let mut clipboard = Clipboard::new().map_err(|e| HangarError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text)
        .map_err(|e| HangarError::Clipboard(e.to_string()))?;
    Ok(())
}
