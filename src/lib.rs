pub mod actuator;
pub mod audit;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod input;
pub mod keystore;
pub mod notify;
pub mod prompt;
pub mod scanner;
pub mod store;

use std::path::Path;

use config::{ACCESS_LOG_FILE, KEY_FILE, LOCK_FILE};

/// Load (or create) the key in `data_dir` and open the credential store there.
pub fn open_store(data_dir: &Path) -> error::Result<store::CredentialStore> {
    std::fs::create_dir_all(data_dir)?;
    let key = keystore::obtain_key(&data_dir.join(KEY_FILE))?;
    Ok(store::CredentialStore::open(key, data_dir)?)
}

/// Print enrolled users and exit.
pub fn list_users(cfg: config::Config) -> anyhow::Result<()> {
    let data_dir = cfg.resolve_data_dir()?;
    let key_path = data_dir.join(KEY_FILE);
    if !key_path.exists() {
        println!("No credential store in {}", data_dir.display());
        return Ok(());
    }
    let store = open_store(&data_dir)?;

    println!(
        "Master: {}",
        if store.has_master()? { "enrolled" } else { "not set" }
    );
    let lines = engine::console::user_lines(&store)?;
    for line in &lines {
        println!("{line}");
    }
    println!("{} user(s)", lines.len());
    Ok(())
}

pub async fn run(cfg: config::Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting cardgate");

    let data_dir = cfg.resolve_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    // Preflight checks
    diagnostics::check(&cfg, &data_dir)?;

    // Single-instance lock
    let lock_dir = std::env::var("XDG_RUNTIME_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| data_dir.clone());
    let lock_path = lock_dir.join(LOCK_FILE);
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock.try_write().map_err(|_| {
        anyhow::anyhow!("cardgate is already running (lock: {})", lock_path.display())
    })?;

    let store = open_store(&data_dir)?;
    tracing::info!(
        master = store.has_master()?,
        users = store.user_count()?,
        "Credential store loaded"
    );

    let runtime = tokio::runtime::Handle::current();
    let notifier: Box<dyn notify::Notifier> = if cfg.notify_cmd.is_empty() {
        Box::new(notify::TracingNotifier)
    } else {
        Box::new(notify::DesktopNotifier::new(
            cfg.notify_cmd.clone(),
            runtime.clone(),
        ))
    };
    let io = engine::Collaborators {
        actuator: Box::new(actuator::SerialActuator::new(
            cfg.serial_port.clone(),
            cfg.baud_rate,
            cfg.hold(),
            runtime.clone(),
        )),
        notifier,
        log: Box::new(audit::FileEventLog::new(data_dir.join(ACCESS_LOG_FILE))),
        prompt: Box::new(prompt::PinentryPrompt::new(cfg.pinentry.clone(), runtime)),
    };
    let mut auth = engine::Engine::new(store, io)?;

    let transport = input::start_input_reader(cfg.reader.clone(), cfg.reader_baud_rate)?;
    let scan_window = cfg.scan_window();
    let engine_task = tokio::task::spawn_blocking(move || {
        engine::run_engine_loop(transport.incoming_rx, &mut auth, scan_window)
    });

    if let Err(e) = engine_task.await {
        return Err(anyhow::anyhow!("Engine loop panicked: {e}"));
    }
    match transport.task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(anyhow::anyhow!("Reader error: {e}")),
        Err(e) => return Err(anyhow::anyhow!("Reader task panicked: {e}")),
    }
    Ok(())
}
