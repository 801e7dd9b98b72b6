//! Styled output sinks.

/// Receives a styled rendering of a tree, in document order.
///
/// `style_start` and `style_end` calls are properly nested. Every piece of
/// text, whitespace included, arrives through `style_string`.
pub trait StyleSink {
    fn style_start(&mut self, style: &str);

    fn style_end(&mut self, style: &str);

    /// `escape` is false only for text the sink may emit verbatim.
    /// `style` names the rule style the text belongs to, `description` the
    /// rule that produced it.
    fn style_string(&mut self, text: &str, escape: bool, style: Option<&str>, description: Option<&str>);
}

/// Renders styles as nested `<span class="...">` elements.
#[derive(Debug, Default, Clone)]
pub struct HtmlSink {
    out: String,
}

impl HtmlSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.out
    }

    fn escape_into(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                '&' => self.out.push_str("&amp;"),
                '"' => self.out.push_str("&quot;"),
                c => self.out.push(c),
            }
        }
    }
}

impl StyleSink for HtmlSink {
    fn style_start(&mut self, style: &str) {
        self.out.push_str("<span class=\"");
        self.escape_into(style);
        self.out.push_str("\">");
    }

    fn style_end(&mut self, _style: &str) {
        self.out.push_str("</span>");
    }

    fn style_string(&mut self, text: &str, escape: bool, style: Option<&str>, description: Option<&str>) {
        let wrapped = style.is_some() || description.is_some();
        if wrapped {
            self.out.push_str("<span");
            if let Some(style) = style {
                self.out.push_str(" class=\"");
                self.escape_into(style);
                self.out.push('"');
            }
            if let Some(description) = description {
                self.out.push_str(" title=\"");
                self.escape_into(description);
                self.out.push('"');
            }
            self.out.push('>');
        }
        if escape {
            self.escape_into(text);
        } else {
            self.out.push_str(text);
        }
        if wrapped {
            self.out.push_str("</span>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escapes_and_nests() {
        let mut sink = HtmlSink::new();
        sink.style_start("expr");
        sink.style_string("a<b", true, Some("op"), None);
        sink.style_string(" ", false, None, None);
        sink.style_end("expr");
        assert_eq!(
            sink.into_string(),
            "<span class=\"expr\"><span class=\"op\">a&lt;b</span> </span>"
        );
    }

    #[test]
    fn descriptions_become_titles() {
        let mut sink = HtmlSink::new();
        sink.style_string("x", true, None, Some("ident"));
        assert_eq!(sink.as_str(), "<span title=\"ident\">x</span>");
    }
}
