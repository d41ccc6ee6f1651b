//! System prompts and prompt assembly for each pipeline call
//!
//! System prompts set the model's role; the assembled user message carries the
//! request-specific details (query, description, code, failures).

use crate::core::history::ErrorHistory;
use crate::core::llm::{CompletionRequest, PromptKind};
use crate::models::{Category, FailureChannel, Resolution};

pub const SYSTEM_PROMPT_FEASIBILITY: &str = r#"You assess whether a request can be produced as a Manim (Community Edition v0.19) animation.
Manim handles mathematical plots, geometry, algorithm walkthroughs, text and LaTeX, physics diagrams and charts.
It cannot produce photorealism, character animation or anything that needs external images.

Classify the request into exactly one category:
GRAPH2D, GRAPH3D, PHYSICS, STATISTICS, COMPUTER_DATASTRUCTURE, TEXT.

Respond with a single JSON object and nothing else:
{"isFeasible": <bool>, "reason": "<why, addressed to the user>", "chatName": "<short title>", "category": "<CATEGORY>"}"#;

pub const SYSTEM_PROMPT_DESCRIBE: &str = r#"You turn an animation idea into a detailed, step-by-step scene description that a Manim v0.19 programmer can implement without guessing.
Cover every object, its position, color and size, the order and timing of every animation, and all on-screen text.
Objects and text must never overlap. Text is always 2D, even in 3D scenes.

Respond with a single JSON object: {"description": "<the full description>"}"#;

pub const SYSTEM_PROMPT_VALIDATE_DESCRIPTION: &str = r#"You review scene descriptions before they are handed to a Manim programmer.
A description is good when it is technically complete: every object, layout position, animation, order and timing is specified and nothing overlaps.

Respond with a single JSON object: {"isGood": <bool>, "error": "<what is missing or wrong, empty when good>"}"#;

pub const SYSTEM_PROMPT_REFINE_DESCRIPTION: &str = r#"You fix scene descriptions that a reviewer rejected.
Keep everything that was right, resolve every point the reviewer raised, and return the complete revised description.

Respond with a single JSON object: {"description": "<the full revised description>"}"#;

pub const SYSTEM_PROMPT_GENERATE_CODE: &str = r#"You are a Manim Community Edition v0.19 programmer. Output one complete Python file and nothing else.
Start with `from manim import *`. Define exactly one Scene subclass with the class name you are given.
Do not read files, use the network or import anything outside the standard library, numpy and manim.
Wrap the file in a ```python fence."#;

pub const SYSTEM_PROMPT_CHECK_CODE: &str = r#"You are a static reviewer for Manim Community Edition v0.19 code. Do not run the code.
Reject it only for errors that will certainly fail at render time: syntax errors, missing imports, removed or renamed APIs, wrong argument names, undefined variables, or a scene class name that does not match the one required.

Respond with a single JSON object: {"isCodeGood": <bool>, "errorMessage": "<the problems found, empty when good>"}"#;

pub const SYSTEM_PROMPT_REPAIR_CODE: &str = r#"You are a Manim Community Edition v0.19 programmer fixing a file that failed.
Read the current error and every previous failure. Do not reintroduce a fix that already failed.
Keep the scene class name unchanged. Output the complete corrected file in a ```python fence and nothing else."#;

/// Inputs shared by the code generation, review and repair prompts
#[derive(Debug, Clone, Copy)]
pub struct CodeContext<'a> {
    pub description: &'a str,
    pub category: Category,
    pub rules: &'a str,
    pub scene_name: &'a str,
    pub resolution: Resolution,
}

/// The failure that triggered a repair
#[derive(Debug, Clone, Copy)]
pub struct CurrentFailure<'a> {
    pub channel: FailureChannel,
    pub message: &'a str,
}

pub fn feasibility(query: &str) -> CompletionRequest {
    CompletionRequest::new(
        PromptKind::Feasibility,
        SYSTEM_PROMPT_FEASIBILITY,
        format!("## Request\n\n{}", query.trim()),
    )
}

pub fn describe(query: &str, category: Category) -> CompletionRequest {
    CompletionRequest::new(
        PromptKind::Describe,
        SYSTEM_PROMPT_DESCRIBE,
        format!(
            "## Category\n\n{} ({})\n\n## Request\n\n{}",
            category.display_name(),
            category.tag(),
            query.trim()
        ),
    )
}

pub fn validate_description(query: &str, description: &str) -> CompletionRequest {
    CompletionRequest::new(
        PromptKind::ValidateDescription,
        SYSTEM_PROMPT_VALIDATE_DESCRIPTION,
        format!(
            "## Original Request\n\n{}\n\n## Description To Review\n\n{}",
            query.trim(),
            description.trim()
        ),
    )
}

pub fn refine_description(query: &str, description: &str, error: &str) -> CompletionRequest {
    CompletionRequest::new(
        PromptKind::RefineDescription,
        SYSTEM_PROMPT_REFINE_DESCRIPTION,
        format!(
            "## Original Request\n\n{}\n\n## Rejected Description\n\n{}\n\n## Reviewer Feedback\n\n{}",
            query.trim(),
            description.trim(),
            error.trim()
        ),
    )
}

fn code_header(ctx: &CodeContext<'_>) -> String {
    format!(
        "## Scene Class Name\n\n{name} (file {name}.py)\n\n## Output Resolution\n\n{res}\n\n## {category} Rules\n\n{rules}\n\n## Scene Description\n\n{desc}\n",
        name = ctx.scene_name,
        res = ctx.resolution,
        category = ctx.category.display_name(),
        rules = ctx.rules.trim(),
        desc = ctx.description.trim(),
    )
}

/// First generation (or regeneration after a reset)
///
/// Failures from earlier generations are included so a restart does not
/// repeat them.
pub fn generate_code(ctx: &CodeContext<'_>, history: &ErrorHistory) -> CompletionRequest {
    let mut user = code_header(ctx);
    if !history.is_empty() {
        user.push_str("\n## Failures From A Previous Attempt\n\nAn earlier version of this scene failed as follows. Avoid these mistakes.\n\n");
        user.push_str(&history.render_all());
    }
    CompletionRequest::new(PromptKind::GenerateCode, SYSTEM_PROMPT_GENERATE_CODE, user)
}

pub fn check_code(ctx: &CodeContext<'_>, code: &str) -> CompletionRequest {
    CompletionRequest::new(
        PromptKind::CheckCode,
        SYSTEM_PROMPT_CHECK_CODE,
        format!(
            "## Required Scene Class Name\n\n{}\n\n## {} Rules\n\n{}\n\n## Code\n\n```python\n{}\n```",
            ctx.scene_name,
            ctx.category.display_name(),
            ctx.rules.trim(),
            code
        ),
    )
}

/// Repair prompt: current code, the current error and the full history of both channels
pub fn repair_code(
    ctx: &CodeContext<'_>,
    code: &str,
    current: Option<CurrentFailure<'_>>,
    history: &ErrorHistory,
) -> CompletionRequest {
    let mut user = code_header(ctx);
    user.push_str(&format!("\n## Current Code\n\n```python\n{}\n```\n", code));

    if let Some(failure) = current {
        user.push_str(&format!(
            "\n## Current {} Error\n\n{}\n\n{}\n",
            failure.channel.name(),
            failure.message.trim(),
            failure.channel.fix_instructions()
        ));
    }

    let rendered = history.render_all();
    if !rendered.is_empty() {
        user.push('\n');
        user.push_str(&rendered);
    }

    CompletionRequest::new(PromptKind::RepairCode, SYSTEM_PROMPT_REPAIR_CODE, user)
}
