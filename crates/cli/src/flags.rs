use clap::ValueEnum;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum EmbedMode {
    Stub,
    Onnx,
    Http,
}

impl EmbedMode {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Stub => "stub",
            EmbedMode::Onnx => "onnx",
            EmbedMode::Http => "http",
        }
    }
}

/// Parse `ID=NAME` for `--label`.
pub(crate) fn parse_label(raw: &str) -> Result<(usize, String), String> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME, got '{raw}'"))?;
    let id = id
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid cluster id '{id}': {e}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty label for cluster {id}"));
    }
    Ok((id, name.to_string()))
}
