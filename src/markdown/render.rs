use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A heading in the lesson outline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// Anchor id set on the rendered heading
    pub anchor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedLesson {
    pub html: String,
    pub outline: Vec<Heading>,
    /// Fenced block languages, first-seen order
    pub code_languages: Vec<String>,
}

/// Render lesson markdown to HTML.
///
/// Raw HTML in the source is escaped and shown as text. Headings get
/// anchor ids derived from their text, deduplicated with a numeric suffix.
pub fn render_lesson(markdown: &str) -> RenderedLesson {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut events: Vec<Event> = Vec::new();
    let mut outline: Vec<Heading> = Vec::new();
    let mut code_languages: Vec<String> = Vec::new();

    // Index of the open heading's Start event and its text so far
    let mut open_heading: Option<(usize, u8, String)> = None;
    let mut anchors_seen: HashMap<String, usize> = HashMap::new();

    for event in Parser::new_ext(markdown, options) {
        let event = match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        };

        match &event {
            Event::Start(Tag::Heading { level, .. }) => {
                open_heading = Some((events.len(), heading_level_to_int(*level), String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((start, level, text)) = open_heading.take() {
                    let text = text.trim().to_string();
                    let anchor = unique_anchor(&slugify(&text), &mut anchors_seen);
                    if let Event::Start(Tag::Heading { id, .. }) = &mut events[start] {
                        *id = Some(CowStr::from(anchor.clone()));
                    }
                    outline.push(Heading { level, text, anchor });
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, heading_text)) = open_heading.as_mut() {
                    heading_text.push_str(text);
                }
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                // Info strings may carry attributes after the language
                let lang = info.split_whitespace().next().unwrap_or("");
                if !lang.is_empty() && !code_languages.iter().any(|l| l == lang) {
                    code_languages.push(lang.to_string());
                }
            }
            _ => {}
        }

        events.push(event);
    }

    let mut output = String::new();
    html::push_html(&mut output, events.into_iter());

    RenderedLesson {
        html: output,
        outline,
        code_languages,
    }
}

/// Lowercase, keep alphanumerics, join words with dashes
pub fn slugify(text: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());
    re.replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

fn unique_anchor(base: &str, seen: &mut HashMap<String, usize>) -> String {
    let base = if base.is_empty() { "section" } else { base };
    let count = seen.entry(base.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, *count - 1)
    }
}

/// Convert heading level enum to integer
fn heading_level_to_int(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
