use std::path::PathBuf;

pub fn config_dir() -> PathBuf {
    // Use ~/.config/tuner/ on macOS too (avoid the Application Support
    // folder so paths stay consistent across unix platforms).
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(temp_dir)
            .join(".config")
            .join("tuner")
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(temp_dir)
            .join("tuner")
    }
}

pub fn data_dir() -> PathBuf {
    // ~/.local/share/tuner/ (XDG standard), same reasoning as config_dir.
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(temp_dir)
            .join(".local")
            .join("share")
            .join("tuner")
    }
    #[cfg(windows)]
    {
        dirs::data_dir()
            .unwrap_or_else(temp_dir)
            .join("tuner")
    }
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}
