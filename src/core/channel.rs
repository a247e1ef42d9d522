// Channel code normalization

use tracing::info;

/// Code substituted for channels whose component is not recognized.
pub const DEFAULT_CHANNEL: &str = "HHZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    Keep,
    RemapNorth,
    RemapEast,
    ForceDefault,
}

impl ChannelAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelAction::Keep => "keep",
            ChannelAction::RemapNorth => "remap 1 -> N",
            ChannelAction::RemapEast => "remap 2 -> E",
            ChannelAction::ForceDefault => "force default",
        }
    }
}

/// Maps a channel code onto one ending in `Z`, `N` or `E`.
///
/// `1`/`2` components become `N`/`E` keeping the band and instrument
/// prefix. Any other ending, or an empty code, is replaced whole by
/// [`DEFAULT_CHANNEL`], which drops the original prefix.
pub fn classify_channel(code: &str) -> (String, ChannelAction) {
    let Some(last) = code.chars().last() else {
        return (DEFAULT_CHANNEL.to_string(), ChannelAction::ForceDefault);
    };
    let prefix = &code[..code.len() - last.len_utf8()];

    match last.to_ascii_uppercase() {
        'Z' | 'N' | 'E' => (code.to_string(), ChannelAction::Keep),
        '1' => (format!("{prefix}N"), ChannelAction::RemapNorth),
        '2' => (format!("{prefix}E"), ChannelAction::RemapEast),
        _ => (DEFAULT_CHANNEL.to_string(), ChannelAction::ForceDefault),
    }
}

/// Normalizes `code` and logs the rewrite. `owner` is `NET.STA` for the log line.
pub fn normalize_channel(code: &str, owner: Option<&str>) -> (String, ChannelAction) {
    let (normalized, action) = classify_channel(code);
    match owner {
        Some(owner) => info!(
            "{} channel {:?}: {} ({})",
            owner,
            code,
            action.as_str(),
            normalized
        ),
        None => info!("channel {:?}: {} ({})", code, action.as_str(), normalized),
    }
    (normalized, action)
}
