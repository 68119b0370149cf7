use std::path::Path;

use crate::config::Config;

/// Preflight checks. Problems that make the terminal useless are errors;
/// a missing actuator port is only a warning since access decisions still work.
pub fn check(cfg: &Config, data_dir: &Path) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();

    // Check 1: data dir writable
    let marker = data_dir.join(".cardgate-write-check");
    match std::fs::write(&marker, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
        }
        Err(e) => errors.push(format!(
            "cannot write to data dir {}: {e}\n  \
             → pass a writable directory with --data-dir",
            data_dir.display()
        )),
    }

    // Check 2: reader device readable
    if let Some(reader) = &cfg.reader {
        if let Err(e) = std::fs::File::open(reader) {
            errors.push(format!(
                "cannot open reader {}: {e}\n  \
                 → add yourself to the 'input' or 'dialout' group",
                reader.display()
            ));
        }
    }

    // Check 3: pinentry binary found
    if let Err(e) = std::process::Command::new(&cfg.pinentry)
        .arg("--version")
        .output()
    {
        errors.push(format!(
            "pinentry binary not found: '{}': {e}\n  \
             → install pinentry or pass --pinentry",
            cfg.pinentry
        ));
    }

    // Check 4: actuator port present
    if !cfg.serial_port.exists() {
        tracing::warn!(
            port = %cfg.serial_port.display(),
            "Serial port not present; door will not open until it appears"
        );
    }

    if errors.is_empty() {
        return Ok(());
    }

    for err in &errors {
        eprintln!("ERROR: {err}");
    }
    anyhow::bail!("{} preflight check(s) failed", errors.len());
}
