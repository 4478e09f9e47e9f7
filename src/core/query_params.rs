use std::collections::HashMap;

/// Parse query parameters from a raw query string (without the leading `?`).
///
/// Values are URL decoded. Multiple values for the same key are not
/// supported (only the last is kept).
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for param in query.split('&').filter(|p| !p.is_empty()) {
        if let Some(eq_idx) = param.find('=') {
            let key = &param[..eq_idx];
            let encoded_value = param[eq_idx + 1..].replace('+', " ");
            let decoded = urlencoding::decode(&encoded_value)
                .map(|v| v.into_owned())
                .unwrap_or(encoded_value);
            params.insert(key.to_string(), decoded);
        } else {
            // Flag parameter without value
            params.insert(param.to_string(), String::new());
        }
    }

    params
}

/// Get a non-empty string parameter with optional default
pub fn get_string(params: &HashMap<String, String>, key: &str, default: Option<&str>) -> Option<String> {
    params.get(key)
        .filter(|s| !s.is_empty())
        .cloned()
        .or_else(|| default.map(|d| d.to_string()))
}

/// Get a positive integer parameter, `None` when absent or invalid
pub fn get_page(params: &HashMap<String, String>, key: &str) -> Option<usize> {
    params.get(key)
        .and_then(|s| s.parse::<usize>().ok())
        .map(|n| n.max(1))
}
