//! Server-rendered HTML for the landing and chat pages.

use std::fmt::Write;

use lawontip_core::{Mode, Session, Turn};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

const TITLE: &str = "LAWONTIP - AI Legal Assistant";

const STYLE: &str = r"
* { box-sizing: border-box; font-family: Inter, system-ui, -apple-system, sans-serif; }
body {
  margin: 0; min-height: 100vh; color: rgba(255,255,255,0.95);
  background: linear-gradient(135deg, #0a0a0a 0%, #1a1a1a 30%, #2a2a2a 70%, #1a1a1a 100%);
}
a { color: #fff; }
main { max-width: 960px; margin: 0 auto; padding: 2rem; }
button, .button {
  background: #fff; color: #0a0a0a; border: none; border-radius: 12px;
  padding: 0.8rem 1.6rem; font-weight: 600; font-size: 1rem; cursor: pointer;
  text-decoration: none; display: inline-block;
}
button.secondary { background: transparent; color: #fff; border: 1px solid rgba(255,255,255,0.3); }
.hero { text-align: center; padding: 4rem 1rem 2rem; }
.hero-title { font-family: 'Playfair Display', Georgia, serif; font-size: 4rem; font-weight: 800; }
.hero-subtitle { font-size: 1.6rem; color: rgba(255,255,255,0.85); margin-top: 0.5rem; }
.hero-description { max-width: 640px; margin: 1.5rem auto; line-height: 1.7; color: rgba(255,255,255,0.8); }
.cta { text-align: center; margin: 2rem 0 3rem; }
.features-title { text-align: center; font-size: 2rem; font-weight: 700; margin-bottom: 2rem; }
.features-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(280px, 1fr)); gap: 1.5rem; }
.feature-card {
  background: linear-gradient(145deg, rgba(255,255,255,0.06) 0%, rgba(255,255,255,0.02) 100%);
  border: 1px solid rgba(255,255,255,0.1); border-radius: 18px; padding: 1.5rem;
}
.feature-icon { font-size: 2rem; }
.feature-card p { color: rgba(255,255,255,0.8); line-height: 1.6; }
.footer { text-align: center; margin-top: 3rem; padding: 1.5rem; color: rgba(255,255,255,0.6); font-size: 0.9rem; }
.chat-header { text-align: center; margin: 1rem 0 2rem; }
.chat-title { font-size: 2.4rem; font-weight: 800; }
.chat-subtitle { color: rgba(255,255,255,0.75); margin-top: 0.5rem; }
.modes { display: flex; justify-content: center; gap: 1.5rem; margin-bottom: 1rem; }
.modes h3 { width: 100%; text-align: center; }
.transcript { display: flex; flex-direction: column; gap: 1rem; margin-bottom: 2rem; }
.message { padding: 1rem 1.2rem; border-radius: 15px; line-height: 1.7; border: 1px solid rgba(255,255,255,0.1); }
.message.user { background: rgba(255,255,255,0.12); align-self: flex-end; max-width: 80%; }
.message.assistant { background: linear-gradient(145deg, rgba(255,255,255,0.05) 0%, rgba(255,255,255,0.02) 100%); }
.message.error { border-color: rgba(255,255,255,0.45); font-style: italic; }
.sources { margin-top: 0.8rem; font-size: 0.9rem; color: rgba(255,255,255,0.7); }
.sources li { margin: 0.2rem 0; }
textarea {
  width: 100%; min-height: 6rem; padding: 1rem; border-radius: 12px; font-size: 1rem;
  background: rgba(0,0,0,0.6); color: #fff; border: 1px solid rgba(255,255,255,0.25);
}
.actions { display: flex; gap: 1rem; margin-top: 1rem; flex-wrap: wrap; }
.empty { text-align: center; color: rgba(255,255,255,0.6); }
";

const FEATURES: [(&str, &str, &str); 4] = [
    (
        "📚",
        "Comprehensive Legal Research",
        "Access extensive legal databases and get instant answers to complex legal questions with proper citations and references from Indian legal system.",
    ),
    (
        "⚡",
        "24/7 Instant Assistance",
        "Get legal guidance anytime, anywhere. LAWONTIP is always ready to help with your legal questions and scenarios.",
    ),
    (
        "🔒",
        "Secure & Confidential",
        "Your conversations and documents are protected with enterprise-grade security and complete confidentiality.",
    ),
    (
        "🎯",
        "Specialized Knowledge",
        "Trained on extensive Indian legal databases covering criminal law, civil law, corporate law, contracts, and litigation.",
    ),
];

fn layout(body: &str) -> String {
    let mut out = String::with_capacity(STYLE.len() + body.len() + 256);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(out, "<title>{TITLE}</title>");
    out.push_str("<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n</head>\n<body>\n<main>\n");
    out.push_str(body);
    out.push_str("</main>\n</body>\n</html>\n");
    out
}

#[must_use]
pub(crate) fn landing_page() -> String {
    let mut body = String::from(
        "<div class=\"hero\">\n\
         <div class=\"hero-title\">⚖️ LAWONTIP</div>\n\
         <div class=\"hero-subtitle\">Your AI Legal Assistant</div>\n\
         <div class=\"hero-description\">Get instant legal guidance, document analysis, and answers \
         to your legal questions with advanced AI technology trained on comprehensive Indian legal \
         databases.</div>\n</div>\n\
         <div class=\"cta\"><a class=\"button\" href=\"/chat\">🚀 Start Chatting</a></div>\n\
         <div class=\"features\">\n<div class=\"features-title\">Why Choose LAWONTIP?</div>\n\
         <div class=\"features-grid\">\n",
    );
    for (icon, title, text) in FEATURES {
        let _ = writeln!(
            body,
            "<div class=\"feature-card\"><div class=\"feature-icon\">{icon}</div><h3>{}</h3><p>{}</p></div>",
            escape_html(title),
            escape_html(text)
        );
    }
    body.push_str("</div>\n</div>\n");
    body.push_str(
        "<div class=\"footer\"><p>&copy; 2025 LAWONTIP. All rights reserved. | \
         Not a substitute for professional legal advice.</p></div>\n",
    );
    layout(&body)
}

#[must_use]
pub(crate) fn chat_page(session: &Session) -> String {
    let mut body = String::from(
        "<form method=\"post\" action=\"/chat/back\"><button class=\"secondary\" type=\"submit\">← Back to Home</button></form>\n\
         <div class=\"chat-header\">\n<div class=\"chat-title\">⚖️ LAWONTIP Chat</div>\n\
         <div class=\"chat-subtitle\">Ask your legal questions or describe your scenario below</div>\n</div>\n",
    );

    body.push_str("<div class=\"transcript\">\n");
    if session.conversation.is_empty() {
        body.push_str("<p class=\"empty\">No messages yet.</p>\n");
    }
    for turn in session.conversation.turns() {
        render_turn(&mut body, turn);
    }
    body.push_str("</div>\n");

    body.push_str(
        "<form method=\"post\" action=\"/chat\">\n<div class=\"modes\"><h3>What would you like to do?</h3>\n",
    );
    for mode in Mode::ALL {
        let checked = if mode == session.mode { " checked" } else { "" };
        let _ = writeln!(
            body,
            "<label><input type=\"radio\" name=\"mode\" value=\"{}\"{checked}> {}</label>",
            mode.as_str(),
            mode.label()
        );
    }
    body.push_str(
        "</div>\n<textarea id=\"message\" name=\"message\" required \
         placeholder=\"Enter your legal question or scenario here...\"></textarea>\n\
         <div class=\"actions\"><button type=\"submit\">Send</button></div>\n</form>\n",
    );
    body.push_str(
        "<div class=\"actions\">\n\
         <form method=\"post\" action=\"/chat/clear\"><button class=\"secondary\" type=\"submit\">🗑️ Clear Chat</button></form>\n\
         <a class=\"button\" href=\"/chat#message\">📝 New Question</a>\n</div>\n",
    );
    layout(&body)
}

fn render_turn(out: &mut String, turn: &Turn) {
    let _ = writeln!(
        out,
        "<div class=\"message user\">{}</div>",
        escape_html(&turn.user).replace('\n', "<br>")
    );
    let class = if turn.is_error { "message assistant error" } else { "message assistant" };
    let _ = write!(out, "<div class=\"{class}\">{}", markdown_to_html(&turn.assistant));
    if !turn.sources.is_empty() {
        out.push_str("<div class=\"sources\">Sources:<ul>");
        for source in &turn.sources {
            let _ = write!(out, "<li>{}</li>", escape_html(&source.citation()));
        }
        out.push_str("</ul></div>");
    }
    out.push_str("</div>\n");
}

/// Render model output as HTML. Raw HTML in the input is shown as text.
#[must_use]
pub(crate) fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        other => other,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Keep relative URLs and the allowed schemes; anything else becomes `#`.
fn safe_destination(dest: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&dest) {
        dest
    } else {
        CowStr::Borrowed("#")
    }
}

fn is_safe_url(url: &str) -> bool {
    // Browsers drop control characters and whitespace before reading the scheme.
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_ascii_control() && !c.is_whitespace())
        .collect();
    match cleaned.split_once(':') {
        None => true,
        Some((scheme, _)) if scheme.contains(['/', '?', '#']) => true,
        Some((scheme, _)) => ALLOWED_SCHEMES
            .iter()
            .any(|allowed| scheme.eq_ignore_ascii_case(allowed)),
    }
}

#[must_use]
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
