//! Platform-specific utilities for Mediagrab
//!
//! Cross-platform abstractions for:
//! - Application directories (state, tool install)
//! - Download output layout
//! - Executable naming

use std::path::PathBuf;

/// Returns the application support directory
/// - macOS: ~/Library/Application Support/Mediagrab
/// - Windows: %APPDATA%\Mediagrab
/// - Linux: ~/.local/share/mediagrab
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(if cfg!(target_os = "linux") {
            "mediagrab"
        } else {
            "Mediagrab"
        })
}

/// Directory the provisioned media toolchain is installed into
pub fn tool_install_dir() -> PathBuf {
    app_data_dir().join("ffmpeg")
}

/// File holding the Unix timestamp of the last release-feed check
pub fn update_check_file() -> PathBuf {
    app_data_dir().join("last_update_check.txt")
}

/// Root of the download output layout
/// - All platforms: ~/Downloads/Mediagrab
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("Mediagrab")
}

/// Appends the platform executable suffix to a bare tool name
pub fn exe_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

/// Check if a file is executable
pub fn is_executable(path: &std::path::Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(metadata) = std::fs::metadata(path) {
            let permissions = metadata.permissions();
            return permissions.mode() & 0o111 != 0;
        }
        false
    }

    #[cfg(not(unix))]
    {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_data_dir_is_named() {
        let dir = app_data_dir();
        let name = dir.file_name().unwrap().to_string_lossy().to_lowercase();
        assert_eq!(name, "mediagrab");
    }

    #[test]
    fn test_tool_install_dir_under_app_data() {
        assert!(tool_install_dir().starts_with(app_data_dir()));
    }

    #[test]
    fn test_exe_name_suffix() {
        let name = exe_name("ffmpeg");
        if cfg!(target_os = "windows") {
            assert_eq!(name, "ffmpeg.exe");
        } else {
            assert_eq!(name, "ffmpeg");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_is_executable_known_binary() {
        let path = std::path::Path::new("/bin/ls");
        if path.exists() {
            assert!(is_executable(path));
        }
    }
}
