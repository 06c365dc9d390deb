use fs2::FileExt;
use std::fs::File;
use std::path::PathBuf;

fn lock_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or(std::env::temp_dir());
    path.push("netpanel");
    path.push("session.lock");
    path
}

/// Takes the single-instance lock for an interactive session.
///
/// The lock is held as long as the returned file is alive.
pub fn acquire_session_lock() -> Result<File, String> {
    let lock_path = lock_path();
    if let Some(dir) = lock_path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {dir:?}: {e}"))?;
    }

    let file = File::create(&lock_path).map_err(|e| format!("Failed to create lock file: {e}"))?;

    // Exclusive lock; fails if another session holds it
    file.try_lock_exclusive()
        .map_err(|_| "Another netpanelctl session is already running".to_string())?;

    Ok(file)
}
