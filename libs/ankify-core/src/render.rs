//! Markdown to HTML for note fields.
//!
//! MathJax spans (`\( … \)` and `\[ … \]`) are cut out before rendering and
//! put back untouched afterwards, so markdown never sees their backslashes or
//! underscores.

use pulldown_cmark::{html, Event, Options, Parser};

const INLINE: (&str, &str, &str) = ("\\(", "\\)", "INLINE");
const BLOCK: (&str, &str, &str) = ("\\[", "\\]", "BLOCK");

struct Equation {
    placeholder: String,
    replacement: String,
}

/// Render markdown to HTML, keeping math spans verbatim.
pub fn markdown_to_html(text: &str) -> String {
    let mut equations = Vec::new();
    let masked = extract_equations(text, INLINE, &mut equations);
    let masked = extract_equations(&masked, BLOCK, &mut equations);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    // Anki shows one line per source line, like the notes editor does.
    let parser = Parser::new_ext(&masked, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut rendered = String::with_capacity(masked.len() * 3 / 2);
    html::push_html(&mut rendered, parser);

    equations.iter().fold(rendered, |html, eq| {
        html.replace(&eq.placeholder, &eq.replacement)
    })
}

fn extract_equations(
    text: &str,
    (open, close, kind): (&str, &str, &str),
    equations: &mut Vec<Equation>,
) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut count = 0;

    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };

        count += 1;
        let placeholder = format!("%%{}-EQ-{}%%", kind, count);
        let body = &after_open[..end];
        equations.push(Equation {
            placeholder: placeholder.clone(),
            replacement: format!("{}{}{}", open, escape_template_braces(body), close),
        });

        result.push_str(&rest[..start]);
        result.push_str(&placeholder);
        rest = &after_open[end + close.len()..];
    }

    result.push_str(rest);
    result
}

/// Split `{{`/`}}` so Anki's template engine leaves them alone.
fn escape_template_braces(equation: &str) -> String {
    let mut result = equation.to_string();
    while result.contains("{{") {
        result = result.replace("{{", "{ {");
    }
    while result.contains("}}") {
        result = result.replace("}}", "} }");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_basic_markdown() {
        assert_eq!(markdown_to_html("**bold**"), "<p><strong>bold</strong></p>\n");
    }

    #[test]
    fn newlines_become_line_breaks() {
        assert_eq!(markdown_to_html("one\ntwo"), "<p>one<br />\ntwo</p>\n");
    }

    #[test]
    fn inline_math_is_preserved() {
        let html = markdown_to_html("Euler: \\(e^{i\\pi} + 1 = 0\\) and *more*");
        assert!(html.contains("\\(e^{i\\pi} + 1 = 0\\)"));
        assert!(html.contains("<em>more</em>"));
    }

    #[test]
    fn block_math_with_underscores_is_preserved() {
        let html = markdown_to_html("\\[a_1 + b_1 = c_1\\]");
        assert!(html.contains("\\[a_1 + b_1 = c_1\\]"));
        assert!(!html.contains("<em>"));
    }

    #[test]
    fn double_braces_are_split_inside_math() {
        let html = markdown_to_html("\\(\\frac{{a}}{b}\\)");
        assert!(html.contains("\\(\\frac{ {a} }{b}\\)"));
    }

    #[test]
    fn unmatched_delimiter_is_left_to_markdown() {
        let html = markdown_to_html("open \\( only");
        assert!(!html.contains("%%INLINE"));
    }

    #[test]
    fn fenced_code_is_rendered() {
        let html = markdown_to_html("```rust\nlet x = 1;\n```");
        assert!(html.contains("<pre><code class=\"language-rust\">let x = 1;\n</code></pre>"));
    }

    #[test]
    fn tables_are_enabled() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }
}
