//! Phone number normalization for webhook authorization
//!
//! Inbound `From` values arrive as `whatsapp:+971 50 123 4567` and friends;
//! stored numbers are just as inconsistent. Both sides are reduced to bare
//! digits and compared with and without the country prefix.

/// Strip the channel scheme, `+`, spaces, parens and dashes.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .strip_prefix("whatsapp:")
        .unwrap_or(raw.trim())
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

/// All digit forms a number may be stored under: as-is, with the country
/// prefix added, and with it removed.
pub fn candidates(raw: &str, country_prefix: &str) -> Vec<String> {
    let digits = normalize(raw);
    if digits.is_empty() {
        return Vec::new();
    }
    let mut forms = vec![digits.clone()];
    if let Some(national) = digits.strip_prefix(country_prefix) {
        forms.push(national.to_string());
        forms.push(format!("0{national}"));
    } else {
        let national = digits.strip_prefix('0').unwrap_or(&digits);
        forms.push(format!("{country_prefix}{national}"));
    }
    forms
}

/// Whether a stored account number and an inbound `From` refer to the same
/// phone under any normalization.
pub fn matches(stored: &str, inbound: &str, country_prefix: &str) -> bool {
    let stored_forms = candidates(stored, country_prefix);
    let inbound_forms = candidates(inbound, country_prefix);
    stored_forms
        .iter()
        .any(|form| inbound_forms.contains(form))
}
