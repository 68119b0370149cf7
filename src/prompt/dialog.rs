use secrecy::ExposeSecret;
use std::time::Duration;
use tokio::runtime::Handle;

use super::{NamePrompt, text::new_user_prompt};
use crate::config::PROMPT_TIMEOUT_SECS;

/// Extra time granted past the dialog's own timeout before the caller gives up.
const PROMPT_GRACE_SECS: u64 = 5;

/// Name prompt backed by a pinentry dialog.
pub struct PinentryPrompt {
    binary: String,
    runtime: Handle,
}

impl PinentryPrompt {
    pub fn new(binary: String, runtime: Handle) -> Self {
        Self { binary, runtime }
    }
}

impl NamePrompt for PinentryPrompt {
    /// Must be called from a blocking thread, never from inside an async task.
    fn ask_optional_name(&self) -> Option<String> {
        let bin = self.binary.clone();
        let join = self.runtime.spawn_blocking(move || ask_pinentry(&bin));
        // pinentry closes the dialog itself after PROMPT_TIMEOUT_SECS; this
        // bound only covers a pinentry that ignores its timeout option.
        let limit = Duration::from_secs(u64::from(PROMPT_TIMEOUT_SECS) + PROMPT_GRACE_SECS);
        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(limit, join).await });
        match result {
            Err(_) => {
                tracing::warn!("Name prompt timed out");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("Name prompt task failed: {e}");
                None
            }
            Ok(Ok(name)) => name,
        }
    }
}

fn ask_pinentry(bin: &str) -> Option<String> {
    let text = new_user_prompt();
    let Some(mut input) = pinentry::PassphraseInput::with_binary(bin) else {
        tracing::warn!(binary = bin, "pinentry binary not found");
        return None;
    };
    let answer = input
        .with_title(&text.title)
        .with_description(&text.description)
        .with_prompt(&text.prompt)
        .with_ok("Save")
        .with_cancel("Skip")
        .with_timeout(PROMPT_TIMEOUT_SECS)
        .interact();
    match answer {
        Ok(secret) => normalize_name(secret.expose_secret()),
        Err(e) => {
            tracing::debug!("Name prompt dismissed: {e}");
            None
        }
    }
}

pub(crate) fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() { None } else { Some(name.to_string()) }
}
