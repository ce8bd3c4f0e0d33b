//! YAML front matter at the top of a notes file.

use serde_yaml::Value;

use crate::error::{CoreError, Result};

const DELIMITER: &str = "---";

/// Front matter block, kept verbatim so it can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// The block including both delimiter lines and the trailing newline.
    pub raw: String,
    pub deck: Option<String>,
    pub title: Option<String>,
}

impl FrontMatter {
    /// Deck name requested by the file: `deck`, falling back to `title`.
    pub fn deck_name(&self) -> Option<&str> {
        self.deck.as_deref().or(self.title.as_deref())
    }
}

/// Split `text` into its front matter (if any) and the markdown body.
pub fn split_front_matter(text: &str) -> Result<(Option<FrontMatter>, &str)> {
    let mut lines = text.split_inclusive('\n');
    let yaml_start = match lines.next() {
        Some(first) if first.trim_end() == DELIMITER => first.len(),
        _ => return Ok((None, text)),
    };

    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let yaml = &text[yaml_start..offset];
            let end = offset + line.len();
            let front_matter = parse_fields(yaml, &text[..end])?;
            return Ok((Some(front_matter), &text[end..]));
        }
        offset += line.len();
    }

    // No closing delimiter: treat the whole file as body.
    Ok((None, text))
}

fn parse_fields(yaml: &str, raw: &str) -> Result<FrontMatter> {
    let mut front_matter = FrontMatter {
        raw: raw.to_string(),
        deck: None,
        title: None,
    };
    if yaml.trim().is_empty() {
        return Ok(front_matter);
    }

    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| CoreError::FrontMatter(e.to_string()))?;
    match value {
        Value::Mapping(map) => {
            front_matter.deck = map.get("deck").and_then(scalar_text);
            front_matter.title = map.get("title").and_then(scalar_text);
            Ok(front_matter)
        }
        Value::Null => Ok(front_matter),
        _ => Err(CoreError::FrontMatter(
            "expected key: value pairs".to_string(),
        )),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_front_matter() {
        let (front_matter, body) = split_front_matter("# Title\ntext\n").unwrap();
        assert!(front_matter.is_none());
        assert_eq!(body, "# Title\ntext\n");
    }

    #[test]
    fn deck_wins_over_title() {
        let text = "---\ntitle: Notes\ndeck: Rust\n---\n### Card\n";
        let (front_matter, body) = split_front_matter(text).unwrap();
        let front_matter = front_matter.unwrap();
        assert_eq!(front_matter.deck_name(), Some("Rust"));
        assert_eq!(front_matter.raw, "---\ntitle: Notes\ndeck: Rust\n---\n");
        assert_eq!(body, "### Card\n");
    }

    #[test]
    fn title_is_used_without_deck() {
        let text = "---\ntitle: Networking\ntags: [a, b]\n---\nbody";
        let (front_matter, _) = split_front_matter(text).unwrap();
        assert_eq!(front_matter.unwrap().deck_name(), Some("Networking"));
    }

    #[test]
    fn raw_block_is_preserved_byte_for_byte() {
        let text = "---\r\ntitle:   Spaced  \r\n# comment\r\n---\r\n\r\nbody";
        let (front_matter, body) = split_front_matter(text).unwrap();
        let front_matter = front_matter.unwrap();
        assert_eq!(format!("{}{}", front_matter.raw, body), text);
        assert_eq!(front_matter.deck_name(), Some("Spaced"));
    }

    #[test]
    fn empty_block_has_no_deck() {
        let (front_matter, body) = split_front_matter("---\n---\nbody").unwrap();
        assert_eq!(front_matter.unwrap().deck_name(), None);
        assert_eq!(body, "body");
    }

    #[test]
    fn unterminated_block_is_body() {
        let text = "---\ntitle: x\n### Card\n";
        let (front_matter, body) = split_front_matter(text).unwrap();
        assert!(front_matter.is_none());
        assert_eq!(body, text);
    }

    #[test]
    fn non_mapping_is_an_error() {
        let result = split_front_matter("---\n- a\n- b\n---\nbody");
        assert!(matches!(result, Err(CoreError::FrontMatter(_))));
    }
}
