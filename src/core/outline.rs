//! core::outline
//!
//! Structure of a unit's text.
//!
//! # Outline language
//!
//! Units use a small indentation-based outline language. Each non-blank line
//! is either an element declaration or a body line:
//!
//! ```text
//! import std.io
//! type Greeter
//!     field name: String
//!     fn greet(to)
//!         print "hello"
//! ```
//!
//! A declaration is `<keyword> <name>[rest]`. Keywords map to kinds:
//! `type`/`class` → Type, `field`/`let` → Field, `fn`/`method` → Method,
//! `import`/`use` → Import. Lines indented deeper than a declaration belong
//! to it. Anything that is not a declaration is a body line of the enclosing
//! element, or of the unit itself at the top level.
//!
//! # Invariants
//!
//! - Parsing is total: every text has exactly one outline
//! - Content fingerprints cover an element's own lines, never its children
//! - Elements nest at most [`MAX_NESTING`] deep; deeper declarations are
//!   body lines of the deepest open element

use crate::core::types::{content_hash, ElementKind};

/// One parsed element and its nested elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedElement {
    pub kind: ElementKind,
    pub name: String,
    /// Fingerprint of the declaration line and body lines.
    pub content: String,
    pub children: Vec<ParsedElement>,
}

/// The parsed structure of a whole unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    /// Fingerprint of the unit's top-level body lines.
    pub content: String,
    pub elements: Vec<ParsedElement>,
}

/// Derives structure from unit text.
pub trait StructureParser: Send + Sync {
    /// Parse `text` into an outline. Must never fail.
    fn parse(&self, text: &str) -> Outline;
}

/// Deepest element nesting the parser produces.
pub const MAX_NESTING: usize = 64;

/// Parser for the indentation-based outline language.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineParser;

struct Frame {
    indent: usize,
    kind: ElementKind,
    name: String,
    lines: Vec<String>,
    children: Vec<ParsedElement>,
}

impl Frame {
    fn finish(self) -> ParsedElement {
        ParsedElement {
            kind: self.kind,
            name: self.name,
            content: content_hash(&self.lines.join("\n")),
            children: self.children,
        }
    }
}

impl StructureParser for OutlineParser {
    fn parse(&self, text: &str) -> Outline {
        let mut top_lines: Vec<String> = Vec::new();
        let mut top_elements: Vec<ParsedElement> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = indentation(raw);

            match declaration(trimmed) {
                Some((kind, name)) => {
                    while stack.last().is_some_and(|f| f.indent >= indent) {
                        close_frame(&mut stack, &mut top_elements);
                    }
                    if stack.len() >= MAX_NESTING {
                        if let Some(frame) = stack.last_mut() {
                            frame.lines.push(trimmed.to_string());
                        }
                        continue;
                    }
                    stack.push(Frame {
                        indent,
                        kind,
                        name,
                        lines: vec![trimmed.to_string()],
                        children: Vec::new(),
                    });
                }
                None => {
                    // A body line belongs to the nearest shallower declaration.
                    while stack.last().is_some_and(|f| f.indent >= indent) {
                        close_frame(&mut stack, &mut top_elements);
                    }
                    match stack.last_mut() {
                        Some(frame) => frame.lines.push(trimmed.to_string()),
                        None => top_lines.push(trimmed.to_string()),
                    }
                }
            }
        }

        while !stack.is_empty() {
            close_frame(&mut stack, &mut top_elements);
        }

        Outline {
            content: content_hash(&top_lines.join("\n")),
            elements: top_elements,
        }
    }
}

fn close_frame(stack: &mut Vec<Frame>, top: &mut Vec<ParsedElement>) {
    if let Some(frame) = stack.pop() {
        let element = frame.finish();
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => top.push(element),
        }
    }
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn keyword_kind(keyword: &str) -> Option<ElementKind> {
    match keyword {
        "type" | "class" => Some(ElementKind::Type),
        "field" | "let" => Some(ElementKind::Field),
        "fn" | "method" => Some(ElementKind::Method),
        "import" | "use" => Some(ElementKind::Import),
        _ => None,
    }
}

/// Split a trimmed line into a declaration, if it is one.
///
/// Imports take the whole dotted path as their name; other declarations take
/// an identifier optionally followed by a parenthesized parameter list.
fn declaration(line: &str) -> Option<(ElementKind, String)> {
    let (keyword, rest) = line.split_once(char::is_whitespace)?;
    let kind = keyword_kind(keyword)?;
    let rest = rest.trim_start();

    let name = if kind == ElementKind::Import {
        rest.split(|c: char| c.is_whitespace() || c == ';')
            .next()
            .unwrap_or_default()
            .to_string()
    } else {
        let ident_len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let mut name = rest[..ident_len].to_string();
        if !name.is_empty() && rest[ident_len..].starts_with('(') {
            if let Some(close) = rest[ident_len..].find(')') {
                name.push_str(&rest[ident_len..ident_len + close + 1]);
            }
        }
        name
    };

    if name.is_empty() {
        None
    } else {
        Some((kind, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(elements: &[ParsedElement]) -> Vec<(ElementKind, &str)> {
        elements.iter().map(|e| (e.kind, e.name.as_str())).collect()
    }

    #[test]
    fn empty_text_has_no_elements() {
        let outline = OutlineParser.parse("");
        assert!(outline.elements.is_empty());
        assert_eq!(outline, OutlineParser.parse("\n   \n"));
    }

    #[test]
    fn top_level_declarations() {
        let outline = OutlineParser.parse("import std.io\ntype A\nfn main()\n");
        assert_eq!(
            names(&outline.elements),
            vec![
                (ElementKind::Import, "std.io"),
                (ElementKind::Type, "A"),
                (ElementKind::Method, "main()"),
            ]
        );
    }

    #[test]
    fn indentation_nests_members() {
        let text = "type Greeter\n    field name: String\n    fn greet(to)\n        print to\ntype Other\n";
        let outline = OutlineParser.parse(text);
        assert_eq!(
            names(&outline.elements),
            vec![(ElementKind::Type, "Greeter"), (ElementKind::Type, "Other")]
        );
        let greeter = &outline.elements[0];
        assert_eq!(
            names(&greeter.children),
            vec![(ElementKind::Field, "name"), (ElementKind::Method, "greet(to)")]
        );
        assert!(greeter.children[1].children.is_empty());
    }

    #[test]
    fn tabs_count_as_indentation() {
        let outline = OutlineParser.parse("type A\n\tfield x\n");
        assert_eq!(outline.elements[0].children.len(), 1);
    }

    #[test]
    fn body_line_changes_only_owner_content() {
        let before = OutlineParser.parse("type A\n    fn f()\n        one\n");
        let after = OutlineParser.parse("type A\n    fn f()\n        two\n");
        assert_eq!(before.content, after.content);
        assert_eq!(before.elements[0].content, after.elements[0].content);
        assert_ne!(
            before.elements[0].children[0].content,
            after.elements[0].children[0].content
        );
    }

    #[test]
    fn top_level_body_changes_unit_content() {
        let before = OutlineParser.parse("// header\ntype A\n");
        let after = OutlineParser.parse("// other header\ntype A\n");
        assert_ne!(before.content, after.content);
        assert_eq!(before.elements, after.elements);
    }

    #[test]
    fn keyword_without_name_is_body() {
        let outline = OutlineParser.parse("type\nfn (\n");
        assert!(outline.elements.is_empty());
    }

    #[test]
    fn unknown_keyword_is_body() {
        let outline = OutlineParser.parse("struct A\n");
        assert!(outline.elements.is_empty());
    }

    #[test]
    fn dedent_closes_nested_elements() {
        let text = "type A\n    type B\n        field x\n    field y\nfield z\n";
        let outline = OutlineParser.parse(text);
        assert_eq!(
            names(&outline.elements),
            vec![(ElementKind::Type, "A"), (ElementKind::Field, "z")]
        );
        let a = &outline.elements[0];
        assert_eq!(
            names(&a.children),
            vec![(ElementKind::Type, "B"), (ElementKind::Field, "y")]
        );
        assert_eq!(names(&a.children[0].children), vec![(ElementKind::Field, "x")]);
    }

    #[test]
    fn nesting_is_capped() {
        let text: String = (0..3000)
            .map(|i| format!("{}type T{i}\n", " ".repeat(i)))
            .collect();
        let outline = OutlineParser.parse(&text);

        let mut depth = 0;
        let mut deepest = &outline.elements;
        let mut last = None;
        while let Some(element) = deepest.first() {
            depth += 1;
            last = Some(element);
            deepest = &element.children;
        }
        assert_eq!(depth, MAX_NESTING);

        let last = last.unwrap();
        assert_eq!(last.name, format!("T{}", MAX_NESTING - 1));
        let changed = text.replace("type T2999", "type Z2999");
        let reparsed = OutlineParser.parse(&changed);
        let mut other = &reparsed.elements[0];
        while let Some(child) = other.children.first() {
            other = child;
        }
        assert_ne!(other.content, last.content);
    }

    #[test]
    fn dedent_after_cap_nests_again() {
        let mut text: String = (0..=MAX_NESTING)
            .map(|i| format!("{}type T{i}\n", " ".repeat(i)))
            .collect();
        text.push_str(" type B\n");
        let outline = OutlineParser.parse(&text);
        assert_eq!(
            names(&outline.elements[0].children),
            vec![(ElementKind::Type, "T1"), (ElementKind::Type, "B")]
        );
    }
}
