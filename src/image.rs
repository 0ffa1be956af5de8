const JPEG_PREFIX: &str = "data:image/jpeg;base64,";

/// Normalizes an inbound image payload to a canonical data URI: any existing
/// prefix is stripped, whitespace and newlines removed, then the fixed JPEG
/// prefix re-applied.
pub fn normalize_data_uri(payload: &str) -> String {
    let stripped = payload.strip_prefix(JPEG_PREFIX).unwrap_or(payload);
    let cleaned: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    format!("{JPEG_PREFIX}{cleaned}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_prefix_to_bare_payload() {
        assert_eq!(normalize_data_uri("abcd1234"), "data:image/jpeg;base64,abcd1234");
    }

    #[test]
    fn keeps_single_prefix() {
        let input = "data:image/jpeg;base64,abcd1234";
        assert_eq!(normalize_data_uri(input), input);
    }

    #[test]
    fn strips_embedded_whitespace() {
        let input = "data:image/jpeg;base64, abcd\n1234\r\n ";
        assert_eq!(normalize_data_uri(input), "data:image/jpeg;base64,abcd1234");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_data_uri("ab cd\n");
        assert_eq!(normalize_data_uri(&once), once);
    }
}
