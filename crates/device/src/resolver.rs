//! Derives device identifiers from client-observable signals.
//!
//! Both identifiers are deterministic pure functions of the signal set, so
//! the same device reliably reproduces the same values. The stable id is
//! computed from hardware-level signals only (OS, screen, platform) and
//! deliberately excludes the browser name, so that every browser on one
//! machine maps to the same stable id. The fingerprint adds browser-level
//! detail and is only used for fast equality checks.

use crate::error::{DeviceError, Result};
use devtrust_models::{DeviceIdentity, DeviceSignals};
use sha2::{Digest, Sha256};

/// Resolve a [`DeviceIdentity`] from raw client signals.
///
/// Fails with `InvalidSignals` when the user agent is empty or the screen
/// geometry is degenerate; a partial identity is never produced.
pub fn resolve(signals: &DeviceSignals) -> Result<DeviceIdentity> {
    let user_agent = signals.user_agent.trim();
    if user_agent.is_empty() {
        return Err(DeviceError::InvalidSignals(
            "empty user agent".to_string(),
        ));
    }
    if signals.screen_width == 0 || signals.screen_height == 0 {
        return Err(DeviceError::InvalidSignals(format!(
            "degenerate screen geometry {}x{}",
            signals.screen_width, signals.screen_height
        )));
    }

    let operating_system = classify_os(user_agent);
    let browser_name = classify_browser(user_agent);
    let device_type = classify_device_type(user_agent);
    let screen_resolution = signals.screen_resolution();
    let platform = signals.platform.trim().to_string();

    // Hardware-level signals only; browser deliberately excluded.
    let stable_id = digest(&[&operating_system, &screen_resolution, &platform]);

    let timezone = signals.timezone.as_deref().unwrap_or("");
    let cookies = if signals.cookies_enabled { "1" } else { "0" };
    let fingerprint = digest(&[
        &operating_system,
        &screen_resolution,
        &platform,
        &browser_name,
        timezone,
        cookies,
    ]);

    Ok(DeviceIdentity {
        stable_id,
        fingerprint,
        operating_system,
        screen_resolution,
        platform,
        device_type,
        browser_name,
    })
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.to_ascii_lowercase().as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn classify_os(user_agent: &str) -> String {
    let ua = user_agent.to_ascii_lowercase();

    let os = if ua.contains("windows nt 10") || ua.contains("windows nt 11") {
        "Windows 10/11"
    } else if ua.contains("windows") {
        "Windows"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("cros") {
        "ChromeOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown"
    };

    os.to_string()
}

fn classify_browser(user_agent: &str) -> String {
    let ua = user_agent.to_ascii_lowercase();

    // Order matters: Edge and Opera embed "chrome", Chrome embeds "safari".
    let browser = if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("firefox/") {
        "Firefox"
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        "Chrome"
    } else if ua.contains("safari/") {
        "Safari"
    } else {
        "Unknown"
    };

    browser.to_string()
}

fn classify_device_type(user_agent: &str) -> String {
    let ua = user_agent.to_ascii_lowercase();

    let device = if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else if ua.contains("mobile") || ua.contains("iphone") || ua.contains("android") {
        "mobile"
    } else {
        "desktop"
    };

    device.to_string()
}
