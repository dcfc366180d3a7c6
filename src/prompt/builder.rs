use crate::catalog::TemplateCatalog;
use crate::errors::PoetryError;
use crate::imaging::SharedImage;
use crate::prompt::messages::{ChatMessage, ContentPart, Role};
use crate::session::state::Turn;

pub const ROLE_FRAMING: &str = "你是一位具备古典文学素养的多模态文案创作者";
pub const OBSERVE_DIRECTIVE: &str = "请仔细观察图片内容，抽取其中的关键意象、氛围与色彩。";
pub const FIDELITY_REMINDER: &str = "务必让诗词意象与图片内容高度匹配，避免虚假描述。";
pub const CLOSING_DIRECTIVE: &str = "最后，请按要求输出作品，不要额外解释。";

const TERMINAL_PUNCTUATION: [char; 4] = ['。', '！', '？', '；'];
const SUGGESTION_SEPARATOR: char = '；';

/// Rejects ids that are not in the catalog, format first.
pub fn check_inputs(
    catalog: &TemplateCatalog,
    format_id: &str,
    style_id: &str,
) -> Result<(), PoetryError> {
    if catalog.format(format_id).is_none() {
        return Err(PoetryError::InvalidFormat(format_id.to_string()));
    }
    if catalog.style(style_id).is_none() {
        return Err(PoetryError::InvalidStyle(style_id.to_string()));
    }
    Ok(())
}

pub fn validate_inputs(catalog: &TemplateCatalog, format_id: &str, style_id: &str) -> (bool, String) {
    match check_inputs(catalog, format_id, style_id) {
        Ok(()) => (true, String::new()),
        Err(err) => (false, err.to_string()),
    }
}

fn instruction_lines(format_instruction: &str, style_instruction: &str, user_instruction: &str) -> String {
    let mut lines = vec![
        ROLE_FRAMING.to_string(),
        OBSERVE_DIRECTIVE.to_string(),
        format!("作品格式要求：{format_instruction}"),
        format!("风格与语气参考：{style_instruction}"),
        FIDELITY_REMINDER.to_string(),
    ];

    let cleaned = user_instruction.trim();
    if !cleaned.is_empty() {
        lines.push(format!("附加灵感提示：{cleaned}"));
    }

    lines.push(CLOSING_DIRECTIVE.to_string());
    lines.join("\n")
}

/// Replays `history` and appends the image-bearing request for the next turn.
pub fn build_messages(
    catalog: &TemplateCatalog,
    image: &SharedImage,
    format_id: &str,
    style_id: &str,
    user_instruction: &str,
    history: &[Turn],
) -> Result<Vec<ChatMessage>, PoetryError> {
    let format_instruction = catalog.format_instruction(format_id);
    if format_instruction.is_empty() {
        return Err(PoetryError::InvalidFormat(format_id.to_string()));
    }
    let style_instruction = catalog.style_instruction(style_id);
    if style_instruction.is_empty() {
        return Err(PoetryError::InvalidStyle(style_id.to_string()));
    }

    let mut messages = Vec::with_capacity(history.len() * 2 + 1);
    for turn in history {
        messages.push(ChatMessage::text(Role::User, turn.user_text.clone()));
        // an empty reply marks a turn that is still in flight
        if !turn.assistant_text.is_empty() {
            messages.push(ChatMessage::text(Role::Assistant, turn.assistant_text.clone()));
        }
    }

    messages.push(ChatMessage {
        role: Role::User,
        content: vec![
            ContentPart::Image(image.clone()),
            ContentPart::Text(instruction_lines(
                format_instruction,
                style_instruction,
                user_instruction,
            )),
        ],
    });

    Ok(messages)
}

/// Merges a refinement snippet into the instruction box text.
pub fn apply_suggestion(current_text: &str, snippet: &str) -> String {
    let current = current_text.trim();
    if current.is_empty() {
        return snippet.to_string();
    }

    let mut merged = current.to_string();
    if !current.ends_with(TERMINAL_PUNCTUATION) {
        merged.push(SUGGESTION_SEPARATOR);
    }
    merged.push_str(snippet);
    merged
}
