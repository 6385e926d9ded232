//! Directory helpers following the XDG Base Directory specification
//!
//! - Config: `~/.config/portgate/` - `config.json`

use directories::ProjectDirs;
use std::path::PathBuf;

pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "portgate", "portgate").map(|pd| pd.config_dir().to_path_buf())
}

/// Creates the config directory (mode 0o700 on Unix) if it is missing.
pub fn ensure_config_dir() -> std::io::Result<Option<PathBuf>> {
    let Some(dir) = get_config_dir() else {
        return Ok(None);
    };

    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        DirBuilder::new().mode(0o700).recursive(true).create(&dir)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(&dir)?;
    }

    Ok(Some(dir))
}
