//! Markdown rendering for content pages.

use comrak::{Options, markdown_to_html};

/// Render content-page markdown to HTML with GitHub Flavored Markdown
/// extensions.
///
/// Pages are written by content managers, not admins, so raw HTML in the
/// source is dropped rather than passed through.
#[must_use]
pub fn render(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    options.render.r#unsafe = false;

    markdown_to_html(content, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_gfm() {
        let html = render("# Returns\n\n~~30~~ 60 days\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>"));
        assert!(html.contains("<del>30</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_raw_html_is_not_passed_through() {
        let html = render("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }
}
