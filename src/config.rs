//! Prompt configuration.
//!
//! Categories and their system prompts come from a YAML mapping:
//!
//! ```yaml
//! 난이도: |
//!   기사를 읽고 난이도를 상/중/하로 분류하고 ...
//! 논조: |
//!   기사의 논조를 분류하고 ...
//! ```
//!
//! File order is preserved so categories are processed deterministically.

use serde_yaml::Value;
use std::error::Error;

/// Ordered mapping of category name to system prompt.
#[derive(Debug, Clone)]
pub struct Prompts {
    entries: Vec<(String, String)>,
}

impl Prompts {
    /// Load prompts from a YAML file.
    pub fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse prompts from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn Error>> {
        let value: Value = serde_yaml::from_str(text)?;
        let mapping = value
            .as_mapping()
            .ok_or("Prompt file must be a mapping of category to prompt")?;

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, val) in mapping {
            let category = key
                .as_str()
                .ok_or("Prompt category names must be strings")?
                .to_string();
            let prompt = val
                .as_str()
                .ok_or_else(|| format!("Prompt for category '{category}' must be a string"))?
                .to_string();
            entries.push((category, prompt));
        }

        if entries.is_empty() {
            return Err("Prompt file contains no categories".into());
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The system prompt for a category, if configured.
    pub fn get(&self, category: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, p)| p.as_str())
    }

    /// Iterate (category, prompt) pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, p)| (c.as_str(), p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "\
난이도: 기사의 난이도를 상/중/하로 분류하세요.
논조: 기사의 논조를 분류하세요.
논쟁성: 기사의 논쟁성을 분류하세요.
";

    #[test]
    fn test_from_yaml_preserves_order() {
        let prompts = Prompts::from_yaml(YAML).unwrap();
        let categories: Vec<&str> = prompts.iter().map(|(c, _)| c).collect();
        assert_eq!(categories, vec!["난이도", "논조", "논쟁성"]);
    }

    #[test]
    fn test_get_known_and_unknown() {
        let prompts = Prompts::from_yaml(YAML).unwrap();
        assert!(prompts.get("논조").unwrap().contains("논조"));
        assert!(prompts.get("없는카테고리").is_none());
    }

    #[test]
    fn test_empty_mapping_rejected() {
        assert!(Prompts::from_yaml("{}").is_err());
    }

    #[test]
    fn test_non_mapping_rejected() {
        assert!(Prompts::from_yaml("- a\n- b\n").is_err());
    }

    #[test]
    fn test_non_string_prompt_rejected() {
        assert!(Prompts::from_yaml("난이도:\n  nested: true\n").is_err());
    }
}
