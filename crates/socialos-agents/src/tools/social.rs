use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::tools::{Tool, ToolError};

/// Number of idea templates `suggestPostIdeas` can draw from.
pub const MAX_POST_IDEAS: usize = 5;

const DEFAULT_IMAGE_STYLE: &str = "modern, vibrant";

fn parse_args<T: DeserializeOwned>(tool: &str, args: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// GeneratePostContent
// ---------------------------------------------------------------------------

fn tone_guidance(tone: &str) -> &'static str {
    match tone {
        "professional" => "Use professional and polished language",
        "creative" => "Be creative, use metaphors and vivid language",
        "humorous" => "Add humor and wit",
        _ => "Keep it friendly and conversational",
    }
}

fn target_length(length: &str) -> u32 {
    match length {
        "short" => 50,
        "long" => 300,
        _ => 150,
    }
}

/// Expand a post-writing brief. Unknown tones fall back to casual and unknown
/// lengths to medium.
pub fn generate_post_content(topic: &str, tone: &str, length: &str) -> String {
    format!(
        "Generate a social media post about \"{topic}\". {}. Target length: approximately {} characters. Make it engaging and authentic.",
        tone_guidance(tone),
        target_length(length)
    )
}

#[derive(Deserialize)]
struct PostContentArgs {
    topic: String,
    tone: String,
    length: String,
}

/// Writes a brief for a post in a given tone and length.
pub struct GeneratePostContent;

#[async_trait]
impl Tool for GeneratePostContent {
    fn name(&self) -> &str {
        "generatePostContent"
    }

    fn description(&self) -> &str {
        "Generate social media post content based on topic, tone, and length preferences"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic or theme for the post"
                },
                "tone": {
                    "type": "string",
                    "enum": ["casual", "professional", "creative", "humorous"],
                    "description": "The tone of the post"
                },
                "length": {
                    "type": "string",
                    "enum": ["short", "medium", "long"],
                    "description": "The desired length of the post"
                }
            },
            "required": ["topic", "tone", "length"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: PostContentArgs = parse_args(self.name(), args)?;
        Ok(generate_post_content(&args.topic, &args.tone, &args.length))
    }
}

// ---------------------------------------------------------------------------
// SuggestPostIdeas
// ---------------------------------------------------------------------------

/// Up to `count` ideas (never more than five), joined as a bulleted string.
/// The first two templates take the first two interests, with a fallback word
/// for any that is missing or empty.
/// A negative `count` drops that many ideas from the end.
pub fn suggest_post_ideas(interests: &[String], count: i64) -> String {
    let interest = |index: usize, fallback: &'static str| {
        interests
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
    };
    let first = interest(0, "technology");
    let second = interest(1, "innovation");

    let ideas = [
        format!("Share a thought about the future of AI in {first}"),
        format!("Ask your followers a question about {second}"),
        "Share a personal experience or learning from today".to_string(),
        "Recommend a resource or tool you find valuable".to_string(),
        "Celebrate a small win or achievement".to_string(),
    ];

    let take = if count < 0 {
        MAX_POST_IDEAS.saturating_sub(usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX))
    } else {
        usize::try_from(count).unwrap_or(usize::MAX).min(MAX_POST_IDEAS)
    };
    ideas[..take].join("\n- ")
}

#[derive(Deserialize)]
struct PostIdeasArgs {
    interests: Vec<String>,
    #[serde(default)]
    count: serde_json::Value,
}

/// Suggests post ideas from the user's interests.
pub struct SuggestPostIdeas;

#[async_trait]
impl Tool for SuggestPostIdeas {
    fn name(&self) -> &str {
        "suggestPostIdeas"
    }

    fn description(&self) -> &str {
        "Suggest post ideas based on user interests"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "interests": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "User's areas of interest"
                },
                "count": {
                    "type": "integer",
                    "default": 3,
                    "description": "Number of ideas to suggest"
                }
            },
            "required": ["interests"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: PostIdeasArgs = parse_args(self.name(), args)?;
        // Integral floats such as 4.0 pass validation, so read through f64 as well.
        let count = args
            .count
            .as_i64()
            .or_else(|| args.count.as_f64().map(|f| f as i64))
            .unwrap_or(3);
        Ok(suggest_post_ideas(&args.interests, count))
    }
}

// ---------------------------------------------------------------------------
// GenerateImagePrompt
// ---------------------------------------------------------------------------

pub fn generate_image_prompt(description: &str, style: &str) -> String {
    format!(
        "Create an image: {description}. Style: {style}. High quality, detailed, suitable for social media."
    )
}

#[derive(Deserialize)]
struct ImagePromptArgs {
    description: String,
    #[serde(default)]
    style: Option<String>,
}

/// Turns a description into a prompt for an image generation service.
pub struct GenerateImagePrompt;

#[async_trait]
impl Tool for GenerateImagePrompt {
    fn name(&self) -> &str {
        "generateImagePrompt"
    }

    fn description(&self) -> &str {
        "Generate an optimized image generation prompt"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "What the image should depict"
                },
                "style": {
                    "type": "string",
                    "default": DEFAULT_IMAGE_STYLE,
                    "description": "The artistic style of the image"
                }
            },
            "required": ["description"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: ImagePromptArgs = parse_args(self.name(), args)?;
        let style = args.style.as_deref().unwrap_or(DEFAULT_IMAGE_STYLE);
        Ok(generate_image_prompt(&args.description, style))
    }
}
