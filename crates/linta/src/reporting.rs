use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use linta_core::diagnostics::Diagnostic;

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write: {}", path.display()))
}

/// One `path:line:col: message` line per diagnostic.
pub fn render_text(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

pub fn render_json(diagnostics: &[Diagnostic]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(diagnostics).context("encode diagnostics")?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn emit_text(diagnostics: &[Diagnostic]) -> Result<()> {
    let text = render_text(diagnostics);
    std::io::stderr()
        .write_all(text.as_bytes())
        .context("write stderr")
}

pub fn emit_json(diagnostics: &[Diagnostic]) -> Result<()> {
    let bytes = render_json(diagnostics)?;
    std::io::stdout().write_all(&bytes).context("write stdout")
}
