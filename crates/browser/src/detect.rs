//! Locating a Chromium-based executable.

use std::path::PathBuf;

use crate::error::BrowserError;

/// Executable names searched on `PATH`. All of them speak CDP.
const EXECUTABLE_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chromium",
    "chromium-browser",
    "msedge",
    "microsoft-edge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const BUNDLE_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const BUNDLE_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const BUNDLE_PATHS: &[&str] = &[];

/// Find a browser executable.
///
/// Checks the configured path, then `$CHROME`, then well-known install
/// locations, then `PATH`. Install locations come before `PATH` because
/// `PATH` can hold stale wrapper scripts.
pub fn detect_browser(custom_path: Option<&str>) -> Option<PathBuf> {
    let mut explicit = custom_path
        .map(PathBuf::from)
        .into_iter()
        .chain(std::env::var_os("CHROME").map(PathBuf::from))
        .chain(BUNDLE_PATHS.iter().map(PathBuf::from));

    explicit
        .find(|p| p.exists())
        .or_else(|| EXECUTABLE_NAMES.iter().find_map(|n| which::which(n).ok()))
}

/// Like [`detect_browser`] but fails with install guidance.
pub fn require_browser(custom_path: Option<&str>) -> Result<PathBuf, BrowserError> {
    detect_browser(custom_path).ok_or_else(|| BrowserError::BrowserNotAvailable(install_hint()))
}

/// Platform-specific install guidance.
pub fn install_hint() -> String {
    let steps = if cfg!(target_os = "macos") {
        "brew install --cask google-chrome"
    } else if cfg!(target_os = "windows") {
        "winget install Google.Chrome"
    } else if cfg!(target_os = "linux") {
        "sudo apt install chromium-browser  (or: dnf install chromium / pacman -S chromium)"
    } else {
        "download from https://www.google.com/chrome/"
    };
    format!(
        "no Chromium-based browser found; install one ({steps}), \
         set `browser.chrome_path` in wayfarer.toml, or export CHROME=/path/to/browser"
    )
}
