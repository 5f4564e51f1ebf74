use serde::de::DeserializeOwned;
use std::io::Read;

type InputResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Deserialize a JSON file into a typed input.
pub fn read_file<T: DeserializeOwned>(path: &str) -> InputResult<T> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Cannot read '{path}': {e}"))?;
    serde_json::from_str(&contents).map_err(|e| format!("Invalid JSON in '{path}': {e}").into())
}

/// `--input <file>` when given, else JSON piped on stdin. `None` when stdin
/// is a terminal or blank, so callers can build the input from flags.
pub fn read_optional<T: DeserializeOwned>(path: Option<&str>) -> InputResult<Option<T>> {
    if let Some(path) = path {
        return read_file(path).map(Some);
    }
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut piped = String::new();
    std::io::stdin().read_to_string(&mut piped)?;
    if piped.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(piped.trim())?))
}

/// Like [`read_optional`] for commands that have no flag-only form.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>, what: &str) -> InputResult<T> {
    read_optional(path)?
        .ok_or_else(|| format!("--input <file.json> or stdin required for {what}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_missing_file_names_the_path() {
        let err = read_file::<Value>("no/such/scenario.json").unwrap_err();
        assert!(err.to_string().contains("no/such/scenario.json"));
    }

    #[test]
    fn test_file_is_parsed() {
        let path = std::env::temp_dir().join("propcalc-input-test.json");
        std::fs::write(&path, r#"{"principal": "1000"}"#).unwrap();
        let value: Value = read_optional(path.to_str()).unwrap().unwrap();
        assert_eq!(value["principal"], "1000");
        std::fs::remove_file(&path).unwrap();
    }
}
