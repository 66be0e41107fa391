use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroImage {
    pub url: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub photographer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    pub title: String,
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub call_to_action: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPayload {
    pub run_id: String,
    #[serde(default)]
    pub hero: Option<HeroImage>,
    #[serde(default)]
    pub sections: Vec<DraftSection>,
    #[serde(default)]
    pub html: String,
}

impl DraftPayload {
    pub fn has_html(&self) -> bool {
        !self.html.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_missing_hero_and_html() {
        let draft: DraftPayload = serde_json::from_str(
            r#"{"run_id":"r9","hero":null,"sections":[{"title":"A","hook":"h","summary":"s","call_to_action":"Read","keywords":[],"source_url":"https://a.com"}]}"#,
        )
        .unwrap();
        assert!(draft.hero.is_none());
        assert!(!draft.has_html());
        assert_eq!(draft.sections[0].title, "A");
    }
}
