//! `miette` integration for parse errors.

use super::ParseError;
use crate::text::TextRange;
use miette::{Diagnostic, LabeledSpan, SourceSpan};
use std::fmt::Display;

fn source_span(range: TextRange) -> SourceSpan {
    SourceSpan::new(
        (u32::from(range.start()) as usize).into(),
        u32::from(range.len()) as usize,
    )
}

impl Diagnostic for ParseError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.code().as_str()))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = match self {
            Self::Expected { at_eof: true, .. } => "input ends here",
            Self::Expected { .. } => "expected here",
            Self::Unexpected { .. } | Self::TrailingInput { .. } => "not expected here",
            Self::Multiple { .. } => "no alternative matches here",
            Self::Budget { .. } => "stopped here",
        };
        let primary = LabeledSpan::new_with_span(Some(label.to_string()), source_span(self.span()));
        Some(Box::new(std::iter::once(primary)))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let expected = self.expected_list();
        (expected.len() > 1)
            .then(|| Box::new(format!("expected one of: {}", expected.join(", "))) as Box<dyn Display>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::range_of;

    #[test]
    fn diagnostics_carry_code_and_label() {
        let error = ParseError::expected(range_of(3, 4), "';'", false, None);
        assert_eq!(
            Diagnostic::code(&error).map(|c| c.to_string()).as_deref(),
            Some("parse::expected")
        );
        let labels: Vec<_> = error.labels().into_iter().flatten().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 3);
        assert_eq!(labels[0].len(), 1);
    }
}
