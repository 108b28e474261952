pub mod attachment;
pub mod category;
pub mod comment;
pub mod external_tool;
pub mod news;
pub mod page;
pub mod post;
pub mod session;
pub mod settings;
pub mod stock;
pub mod tag;
pub mod theme;
pub mod user;

/// Upper-cases `value` and checks it against an enum's allowed names.
/// The error reads like "Invalid category: foo".
pub fn normalize_enum(value: &str, allowed: &[&str], what: &str) -> Result<String, String> {
    let upper = value.trim().to_uppercase();
    if allowed.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(format!("Invalid {}: {}", what, value))
    }
}

/// Round to two decimal places (prices, percentages).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
