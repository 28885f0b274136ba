use crate::error::{Error, Result};
use crate::llm::LlmClient;
use crate::state::Story;
use std::fmt;

const TEMPERATURE: f32 = 0.9;

const DRAFT_SYSTEM: &str = "You are a storywriter. Given a short description, \
you can generate a story based on the idea in 75-100 words.";

const REVIEW_SYSTEM: &str = "You are a story critic. Given the generated story, \
it is your job to write feedback on how to improve the story. Pay attention to \
things such as:\n\
1. Is the length of the story within 75-100 words?\n\
2. Is the story engaging?";

const IMPROVE_SYSTEM: &str = "You are a storywriter. Given a generated story and \
a review from a critic, it is your job to improve the story. Make sure you set \
the story length to MAXIMUM 150 words.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genre {
    Mystery,
    Adventure,
    Fantasy,
    SciFi,
    Comedy,
    Horror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGroup {
    Children,
    Teen,
    Adult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Hindi,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Mystery,
        Genre::Adventure,
        Genre::Fantasy,
        Genre::SciFi,
        Genre::Comedy,
        Genre::Horror,
    ];
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Children, AgeGroup::Teen, AgeGroup::Adult];
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Hindi,
    ];
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Genre::Mystery => "Mystery",
            Genre::Adventure => "Adventure",
            Genre::Fantasy => "Fantasy",
            Genre::SciFi => "Sci-Fi",
            Genre::Comedy => "Comedy",
            Genre::Horror => "Horror",
        };
        f.write_str(s)
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgeGroup::Children => "Children",
            AgeGroup::Teen => "Teen",
            AgeGroup::Adult => "Adult",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Hindi => "Hindi",
        };
        f.write_str(s)
    }
}

/// Input to story generation. Either a free-form idea, or the full
/// genre/age-group/language selection (which takes precedence), must be set.
#[derive(Debug, Clone, Default)]
pub struct StoryRequest {
    pub idea: Option<String>,
    pub genre: Option<Genre>,
    pub age_group: Option<AgeGroup>,
    pub language: Option<Language>,
    pub extra_notes: Option<String>,
}

impl StoryRequest {
    pub fn from_idea(idea: impl Into<String>) -> Self {
        Self {
            idea: Some(idea.into()),
            ..Default::default()
        }
    }

    /// The seed sentence handed to the draft stage.
    pub fn compose_seed(&self) -> Result<String> {
        if let (Some(genre), Some(age), Some(language)) =
            (self.genre, self.age_group, self.language)
        {
            let mut seed = format!("Generate a {} {} story in {} language", age, genre, language);
            match self.extra_notes.as_deref().map(str::trim) {
                Some(notes) if !notes.is_empty() => {
                    seed.push_str(", with additional information: ");
                    seed.push_str(notes);
                }
                _ => {}
            }
            seed.push('.');
            return Ok(seed);
        }

        match self.idea.as_deref().map(str::trim) {
            Some(idea) if !idea.is_empty() => Ok(idea.to_string()),
            _ => Err(Error::Validation(
                "enter a story idea, or pick a genre, age group and language".into(),
            )),
        }
    }
}

pub struct StoryService {
    llm: Box<dyn LlmClient>,
}

impl StoryService {
    pub fn new(llm: Box<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Runs the draft -> critique -> rewrite chain and returns the final
    /// story. Each stage's plain-text output feeds the next; nothing is
    /// cached, identical requests call the API again.
    pub async fn generate_story(&self, request: &StoryRequest) -> Result<Story> {
        let seed = request.compose_seed()?;

        log::info!("drafting story for idea: {:.60}", seed);
        let draft = self
            .llm
            .complete(DRAFT_SYSTEM, &format!("Idea: {}", seed), TEMPERATURE)
            .await?;

        log::info!("critiquing draft ({} chars)", draft.len());
        let review = self
            .llm
            .complete(REVIEW_SYSTEM, &format!("Story: {}", draft), TEMPERATURE)
            .await?;

        log::info!("rewriting draft with critique");
        let improved = self
            .llm
            .complete(
                IMPROVE_SYSTEM,
                &format!("Story: {}\nReview: {}", draft, review),
                TEMPERATURE,
            )
            .await?;

        let text = improved.trim().to_string();
        if text.is_empty() {
            return Err(Error::upstream("llm", "final rewrite came back empty"));
        }
        Ok(Story { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockLlmClient {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, system: &str, user: &str, _temperature: f32) -> Result<String> {
            self.calls.lock().unwrap().push(user.to_string());

            if system == DRAFT_SYSTEM {
                Ok("A draft story.".to_string())
            } else if system == REVIEW_SYSTEM {
                Ok("Make it shorter.".to_string())
            } else {
                Ok("A better story.".to_string())
            }
        }
    }

    #[test]
    fn selection_triple_composes_fixed_prompt() {
        let request = StoryRequest {
            genre: Some(Genre::Mystery),
            age_group: Some(AgeGroup::Children),
            language: Some(Language::English),
            ..Default::default()
        };
        assert_eq!(
            request.compose_seed().unwrap(),
            "Generate a Children Mystery story in English language."
        );
    }

    #[test]
    fn extra_notes_are_appended() {
        let request = StoryRequest {
            genre: Some(Genre::Adventure),
            age_group: Some(AgeGroup::Teen),
            language: Some(Language::Spanish),
            extra_notes: Some("set on a sailboat".to_string()),
            ..Default::default()
        };
        assert_eq!(
            request.compose_seed().unwrap(),
            "Generate a Teen Adventure story in Spanish language, with additional information: set on a sailboat."
        );
    }

    #[test]
    fn selection_wins_over_idea() {
        let request = StoryRequest {
            idea: Some("a lighthouse keeper".to_string()),
            genre: Some(Genre::Horror),
            age_group: Some(AgeGroup::Adult),
            language: Some(Language::English),
            ..Default::default()
        };
        assert!(request.compose_seed().unwrap().starts_with("Generate a"));
    }

    #[test]
    fn empty_request_is_rejected_before_any_call() {
        let request = StoryRequest {
            idea: Some("   ".to_string()),
            genre: Some(Genre::Mystery),
            ..Default::default()
        };
        assert!(matches!(
            request.compose_seed().unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn chain_runs_three_stages_and_threads_outputs() {
        let mock = MockLlmClient::default();
        let calls = mock.calls.clone();
        let service = StoryService::new(Box::new(mock));

        let story = service
            .generate_story(&StoryRequest::from_idea("a hackathon story"))
            .await
            .unwrap();

        assert_eq!(story.text, "A better story.");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "Idea: a hackathon story");
        assert_eq!(calls[1], "Story: A draft story.");
        assert!(calls[2].contains("Story: A draft story."));
        assert!(calls[2].contains("Review: Make it shorter."));
    }

    #[tokio::test]
    async fn empty_request_never_reaches_the_llm() {
        let service = StoryService::new(Box::new(MockLlmClient::default()));
        let err = service
            .generate_story(&StoryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
