//! HTML rendering of a quiz payload.

use super::GeneratedQuiz;
use crate::types::{GenerationRequest, GenerationResult};

const SEPARATOR: &str =
    r#"<hr style="margin-top: 1rem; margin-bottom: 1.5rem; border-top: 1px solid #e5e7eb;" />"#;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct Labels {
    book: &'static str,
    course: &'static str,
    answer: &'static str,
    references: &'static str,
}

fn labels(request: &GenerationRequest) -> Labels {
    if request.is_spanish() {
        Labels {
            book: "Libro:",
            course: "Curso:",
            answer: "Respuesta esperada",
            references: "Referencias (PDF)",
        }
    } else {
        Labels {
            book: "Book:",
            course: "Course:",
            answer: "Expected answer",
            references: "References (PDF)",
        }
    }
}

/// Renders a validated quiz into the document handed back to callers.
pub fn render_quiz(request: &GenerationRequest, quiz: &GeneratedQuiz, references: &[String]) -> GenerationResult {
    let l = labels(request);
    let mut html = format!("<h2>{}</h2>", escape(&quiz.title));
    html.push_str(&format!(
        "<p><strong>{}</strong> {}</p>",
        l.book,
        escape(request.material.trim())
    ));
    html.push_str(&format!(
        "<p><strong>{}</strong> {}</p>",
        l.course,
        escape(request.course.trim())
    ));
    html.push_str("<br /><br />");

    let last = quiz.questions.len().saturating_sub(1);
    for (i, q) in quiz.questions.iter().enumerate() {
        html.push_str(&format!(
            r#"<p style="margin-bottom: 1em;"><strong>{}. {}</strong></p>"#,
            i + 1,
            escape(q.question.trim())
        ));
        html.push_str(&format!(
            r#"<p style="margin-top: 0.5em; margin-bottom: 0.5em;"><strong>{}:</strong></p>"#,
            l.answer
        ));
        let answer = escape(&capitalize_first(q.expected_answer.trim())).replace('\n', "<br />");
        html.push_str(&format!(
            r#"<p style="margin-top: 0.25em; margin-bottom: 2em; text-align: justify;">{}</p>"#,
            answer
        ));
        if i < last {
            html.push_str(SEPARATOR);
        }
    }

    if !references.is_empty() {
        html.push_str(SEPARATOR);
        let refs: Vec<String> = references.iter().map(|r| escape(r)).collect();
        html.push_str(&format!(
            "<p><strong>{}:</strong> {}</p>",
            l.references,
            refs.join("; ")
        ));
    }

    GenerationResult::new(html, references.to_vec())
}
