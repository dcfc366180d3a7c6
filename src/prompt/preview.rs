use pulldown_cmark::{html, Options, Parser};

use crate::catalog::TemplateCatalog;

const MISSING_DESCRIPTION: &str = "无描述";

fn preview_line(title: &str, description: &str) -> String {
    format!("**{title}**：{description}")
}

pub fn format_preview(catalog: &TemplateCatalog, format_id: &str) -> String {
    match catalog.format(format_id) {
        Some(spec) => preview_line(&spec.title, &spec.description),
        None => preview_line(format_id, MISSING_DESCRIPTION),
    }
}

pub fn style_preview(catalog: &TemplateCatalog, style_id: &str) -> String {
    match catalog.style(style_id) {
        Some(spec) => preview_line(&spec.title, &spec.description),
        None => preview_line(style_id, MISSING_DESCRIPTION),
    }
}

pub fn render_preview_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty());
    let mut output = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut output, parser);
    output
}
