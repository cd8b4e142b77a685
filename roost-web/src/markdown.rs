use pulldown_cmark::{html, Options, Parser};

/// Convert Markdown text to safe HTML
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    ammonia::clean(&html_output)
}

/// Body of a stored record as HTML. Records edited with the WYSIWYG editor
/// already hold HTML and are returned untouched.
pub fn render_body(content: &str, markdown: bool) -> String {
    if markdown {
        markdown_to_html(content)
    } else {
        content.to_string()
    }
}

/// Create a Tera filter for Markdown conversion
pub fn make_markdown_filter() -> impl tera::Filter {
    |value: &tera::Value, _: &std::collections::HashMap<String, tera::Value>| match value.as_str() {
        Some(text) => Ok(tera::Value::String(markdown_to_html(text))),
        None => Err(tera::Error::msg("markdown filter expects a string")),
    }
}
