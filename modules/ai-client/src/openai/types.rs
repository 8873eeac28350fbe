use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<Message<'a>>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice.
    pub fn into_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_wins() {
        let raw = r#"{"choices": [
            {"index": 0, "message": {"role": "assistant", "content": "[UNFOLLOW]"}},
            {"index": 1, "message": {"role": "assistant", "content": "[FOLLOW]"}}
        ]}"#;
        let response: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_text().as_deref(), Some("[UNFOLLOW]"));
    }

    #[test]
    fn null_content_is_none() {
        let raw = r#"{"choices": [{"message": {"content": null}}]}"#;
        let response: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(response.into_text().is_none());
    }
}
