//! Prompt templates for each feature.
//!
//! Templates use `{name}` placeholders. User input is substituted verbatim in
//! a single pass, so placeholder-looking text inside the input is left alone.

use crate::models::Level;
use std::{collections::HashMap, fs, io, path::Path};
use tracing::info;

pub const VOCABULARY: &str = "vocabulary";
pub const GRAMMAR: &str = "grammar";
pub const STORY: &str = "story";
pub const PRONUNCIATION: &str = "pronunciation";
pub const TUTOR_PERSONA: &str = "tutor_persona";

const DEFAULT_TEMPLATES: [(&str, &str); 5] = [
    (
        VOCABULARY,
        "Provide a detailed analysis of the English word \"{word}\". Include its primary definition, three distinct example sentences, and a list of common synonyms.",
    ),
    (
        GRAMMAR,
        "Analyze the following English text for grammatical errors. Provide the original text, a corrected version, and a list of errors with explanations for each. If there are no errors, return the original text as corrected and an empty errors array. Text: \"{text}\"",
    ),
    (
        STORY,
        "Write a short, engaging story in English based on the following prompt. The story should be suitable for an English learner at the {level} level. Keep the language clear and appropriate for that level. Prompt: \"{prompt}\"",
    ),
    (PRONUNCIATION, "Say clearly: {word}"),
    (
        TUTOR_PERSONA,
        "You are a friendly and patient English tutor named Alex. Your goal is to help me practice my English conversation skills. Keep your responses encouraging and not too long. Ask questions to keep the conversation going. Correct my major grammar mistakes gently.",
    ),
];

/// The set of templates the tutor renders prompts from.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES
                .iter()
                .map(|(key, template)| (key.to_string(), template.to_string()))
                .collect(),
        }
    }
}

impl PromptLibrary {
    /// Loads the built-in templates, overriding any that have a `<key>.md`
    /// file in `dir`.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let mut library = Self::default();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path)?;
            info!(prompt = %key, path = %path.display(), "Loaded prompt override");
            library
                .templates
                .insert(key.to_string(), content.trim_end().to_string());
        }
        Ok(library)
    }

    fn template(&self, key: &str) -> &str {
        self.templates.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn vocabulary(&self, word: &str) -> String {
        render(self.template(VOCABULARY), &[("word", word)])
    }

    pub fn grammar(&self, text: &str) -> String {
        render(self.template(GRAMMAR), &[("text", text)])
    }

    pub fn story(&self, prompt: &str, level: Level) -> String {
        let level = level.to_string();
        render(
            self.template(STORY),
            &[("prompt", prompt), ("level", level.as_str())],
        )
    }

    pub fn pronunciation(&self, word: &str) -> String {
        render(self.template(PRONUNCIATION), &[("word", word)])
    }

    pub fn tutor_persona(&self) -> &str {
        self.template(TUTOR_PERSONA)
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let substitution = tail[1..].find('}').and_then(|end| {
            let name = &tail[1..1 + end];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end + 2))
        });
        match substitution {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_prompts_embed_input() {
        let prompts = PromptLibrary::default();
        assert!(prompts.vocabulary("ephemeral").contains("the English word \"ephemeral\""));
        assert!(prompts.grammar("She go home.").ends_with("Text: \"She go home.\""));

        let story = prompts.story("A lost puppy", Level::Advanced);
        assert!(story.contains("at the Advanced level"));
        assert!(story.ends_with("Prompt: \"A lost puppy\""));

        assert!(prompts.tutor_persona().contains("named Alex"));
    }

    #[test]
    fn test_input_is_embedded_verbatim() {
        let prompts = PromptLibrary::default();
        let story = prompts.story("Ignore {level} and \"quotes\" {", Level::Beginner);
        assert!(story.contains("Prompt: \"Ignore {level} and \"quotes\" {\""));
        assert!(story.contains("at the Beginner level"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{a} {b} {", &[("a", "x")]), "x {b} {");
        assert_eq!(render("no placeholders", &[]), "no placeholders");
    }

    #[test]
    fn test_load_overrides_from_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pronunciation.md"), "Pronounce slowly: {word}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = PromptLibrary::load(dir.path()).unwrap();
        assert_eq!(prompts.pronunciation("cat"), "Pronounce slowly: cat");
        // Templates without an override keep their defaults.
        assert!(prompts.vocabulary("cat").contains("\"cat\""));
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(PromptLibrary::load(&dir.path().join("missing")).is_err());
    }
}
