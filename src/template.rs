//! `%name%` placeholder substitution used by script loading and config discovery.

use std::collections::BTreeMap;

/// Variables available to a template, keyed by placeholder name.
pub type TemplateContext = BTreeMap<String, String>;

/// Replace every `%key%` in `template` with its value from `context`.
///
/// Placeholders without a matching key are left untouched.
///
/// ```
/// use ttypace::template::{render, TemplateContext};
///
/// let mut context = TemplateContext::new();
/// context.insert("cmd".into(), "pwd".into());
/// assert_eq!(render("%cmd% && %other%", &context), "pwd && %other%");
/// ```
pub fn render(template: &str, context: &TemplateContext) -> String {
    render_with_tags(template, context, "%", "%")
}

/// Like [`render`], with custom start and end tags around each key.
pub fn render_with_tags(
    template: &str,
    context: &TemplateContext,
    start_tag: &str,
    end_tag: &str,
) -> String {
    let mut rendered = template.to_string();
    for (key, value) in context {
        let placeholder = format!("{start_tag}{key}{end_tag}");
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, value);
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> TemplateContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_placeholder() {
        assert_eq!(render("%cmd%", &context(&[("cmd", "pwd")])), "pwd");
    }

    #[test]
    fn test_repeated_placeholder() {
        let ctx = context(&[("x", "1")]);
        assert_eq!(render("%x% + %x%", &ctx), "1 + 1");
    }

    #[test]
    fn test_unknown_placeholder_untouched() {
        assert_eq!(render("echo %x%", &context(&[("y", "2")])), "echo %x%");
    }

    #[test]
    fn test_custom_tags() {
        let ctx = context(&[("name", "world")]);
        assert_eq!(render_with_tags("hi {{name}}", &ctx, "{{", "}}"), "hi world");
    }

    #[test]
    fn test_key_with_regex_characters_is_literal() {
        let ctx = context(&[("a.b", "dot")]);
        assert_eq!(render("%a.b% %axb%", &ctx), "dot %axb%");
    }
}
