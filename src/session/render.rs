use serde::Serialize;

use crate::imaging::ImageProfile;
use crate::session::state::{CreationEntry, RecentGallery};

pub const GALLERY_EMPTY_HTML: &str =
    "<div class='recent-empty'>暂无创作记录，快来上传图片吧～</div>";

const PROMPT_PREVIEW_CHARS: usize = 50;
const REPLY_PREVIEW_CHARS: usize = 100;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut iter = text.chars();
    let mut truncated: String = iter.by_ref().take(max_chars).collect();
    if iter.next().is_some() {
        truncated.push_str("...");
    }
    truncated
}

fn render_card(entry: &CreationEntry) -> String {
    let history = entry
        .history
        .iter()
        .map(|turn| {
            format!(
                "<strong>用户：</strong>{}<br><strong>AI：</strong>{}",
                escape_html(&turn.user_text),
                escape_html(&truncate_chars(&turn.assistant_text, REPLY_PREVIEW_CHARS))
            )
        })
        .collect::<Vec<_>>()
        .join("<br>");

    format!(
        "<div class=\"recent-card\">\
         <img src=\"{}\">\
         <div class=\"recent-title\">{} · {}</div>\
         <div class=\"recent-meta\">{}</div>\
         <div class=\"recent-meta\">灵感：{}</div>\
         <div class=\"recent-history\">{}</div>\
         </div>",
        escape_html(&entry.image_data_uri),
        escape_html(&entry.format_title),
        escape_html(&entry.style_title),
        escape_html(&entry.timestamp),
        escape_html(&truncate_chars(&entry.prompt_text, PROMPT_PREVIEW_CHARS)),
        history
    )
}

/// Newest-first card grid, or the empty placeholder.
pub fn render_gallery(gallery: &RecentGallery) -> String {
    if gallery.is_empty() {
        return GALLERY_EMPTY_HTML.to_string();
    }
    let cards: String = gallery.entries().map(render_card).collect();
    format!("<div class='recent-grid'>{cards}</div>")
}

/// The four analysis labels shown beside the uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisPills {
    pub tone: String,
    pub scene: String,
    pub mood: String,
    pub recommend: String,
}

impl AnalysisPills {
    pub fn placeholder(default_style_title: &str) -> Self {
        AnalysisPills {
            tone: "🍑 色调：<strong>等待上传</strong>".to_string(),
            scene: "🏞️ 场景：上传图片以分析场景".to_string(),
            mood: "💫 情感：生成后将展示情绪风格".to_string(),
            recommend: format!(
                "⭐ AI 推荐风格：<strong>{}</strong>",
                escape_html(default_style_title)
            ),
        }
    }

    pub fn from_profile(profile: &ImageProfile) -> Self {
        AnalysisPills {
            tone: format!(
                "{} 色调：<strong>{}</strong>",
                profile.tone.icon(),
                profile.tone.label()
            ),
            scene: format!("{} 场景：{}", profile.scene.icon(), profile.scene.label()),
            mood: format!("{} 情感：{}", profile.mood.icon(), profile.mood.label()),
            recommend: format!(
                "⭐ AI 推荐风格：<strong>{}</strong>",
                profile.style.label()
            ),
        }
    }

    pub fn lines(&self) -> [&str; 4] {
        [&self.tone, &self.scene, &self.mood, &self.recommend]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::profile::{Mood, Scene, StyleHint, Tone};
    use crate::session::state::Turn;

    fn entry(prompt: &str, reply: &str) -> CreationEntry {
        CreationEntry {
            format_id: "five-character quatrain".to_string(),
            format_title: "五言绝句".to_string(),
            style_id: "zen-ethereal".to_string(),
            style_title: "禅意空灵风".to_string(),
            prompt_text: prompt.to_string(),
            history: vec![Turn {
                user_text: prompt.to_string(),
                assistant_text: reply.to_string(),
            }],
            image_data_uri: "data:image/jpeg;base64,AAAA".to_string(),
            timestamp: "08:15:30".to_string(),
        }
    }

    #[test]
    fn empty_gallery_renders_placeholder() {
        assert_eq!(render_gallery(&RecentGallery::new(6)), GALLERY_EMPTY_HTML);
    }

    #[test]
    fn cards_are_newest_first_and_escaped() {
        let mut gallery = RecentGallery::new(6);
        gallery.push(entry("旧的", "山"));
        gallery.push(entry("<b>新的</b>", "水"));
        let html = render_gallery(&gallery);

        assert!(html.starts_with("<div class='recent-grid'>"));
        assert_eq!(html.matches("class=\"recent-card\"").count(), 2);
        assert!(html.contains("&lt;b&gt;新的&lt;/b&gt;"));
        assert!(!html.contains("<b>新的"));
        assert!(html.find("新的").unwrap() < html.find("旧的").unwrap());
        assert!(html.contains("五言绝句 · 禅意空灵风"));
        assert!(html.contains("08:15:30"));
    }

    #[test]
    fn long_prompt_and_reply_are_shortened() {
        let prompt = "月".repeat(60);
        let reply = "风".repeat(120);
        let mut gallery = RecentGallery::new(1);
        gallery.push(entry(&prompt, &reply));
        let html = render_gallery(&gallery);

        assert!(html.contains(&format!("灵感：{}...", "月".repeat(50))));
        assert!(html.contains(&format!("{}...", "风".repeat(100))));
        assert!(!html.contains(&"风".repeat(101)));
    }

    #[test]
    fn short_text_has_no_ellipsis() {
        assert_eq!(truncate_chars("短句", 50), "短句");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }

    #[test]
    fn pills_follow_the_profile() {
        let pills = AnalysisPills::from_profile(&ImageProfile {
            style: StyleHint::BoldGrandeur,
            tone: Tone::WarmBright,
            scene: Scene::SunsetSky,
            mood: Mood::Heroic,
        });
        assert_eq!(pills.tone, "🍑 色调：<strong>明丽暖意</strong>");
        assert_eq!(pills.scene, "🌅 场景：霞染天际");
        assert_eq!(pills.recommend, "⭐ AI 推荐风格：<strong>豪放壮阔风</strong>");

        let waiting = AnalysisPills::placeholder("婉约抒情风");
        assert_eq!(waiting.lines()[0], "🍑 色调：<strong>等待上传</strong>");
        assert_eq!(waiting.recommend, "⭐ AI 推荐风格：<strong>婉约抒情风</strong>");
    }
}
