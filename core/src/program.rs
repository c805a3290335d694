//! An ordered, editable collection of program lines.
//!
//! Line numbers are dense: every insertion or removal renumbers the tail and
//! rebuilds the label table wholesale, so label operands always resolve
//! against current positions and no line ever holds a stale back-reference.

use core::fmt;
use std::collections::HashMap;

use crate::instruction::{LineKind, ProgramLine};
use crate::parser::{ParseError, ParseErrorKind, ParsedLine, ProgramParseError, Span, parse_line_full};

/// Label name to declaration line number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    targets: HashMap<String, u64>,
}

impl LabelTable {
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.targets.get(name).copied()
    }

    fn clear(&mut self) {
        self.targets.clear();
    }

    fn insert(&mut self, name: &str, line: u64) {
        self.targets.insert(name.to_string(), line);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    lines: Vec<ProgramLine>,
    labels: LabelTable,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Parse a whole newline-delimited program. Blank and comment-only lines
    /// are skipped. Unlike line-by-line appending, loading a complete program
    /// eagerly validates that every referenced label is declared.
    pub fn parse(text: &str) -> Result<Self, ProgramParseError> {
        let mut program = Program::new();
        let mut references: Vec<(usize, String, Span)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let number = program.lines.len() as u64;
            let parsed = match parse_line_full(raw, number) {
                Ok(parsed) => parsed,
                Err(error) if error.kind == ParseErrorKind::Empty => continue,
                Err(error) => return Err(ProgramParseError { line: index, error }),
            };
            program
                .insert_parsed(parsed, |refs| {
                    references.extend(
                        refs.into_iter().map(|(name, span)| (index, name, span)),
                    );
                })
                .map_err(|error| ProgramParseError { line: index, error })?;
        }

        for (index, name, span) in references {
            if program.labels.resolve(&name).is_none() {
                return Err(ProgramParseError {
                    line: index,
                    error: ParseError::new(ParseErrorKind::UnknownLabel { name }, span),
                });
            }
        }
        Ok(program)
    }

    /// Parse one line of text and append it. Label references are *not*
    /// validated here — a forward reference is legal while a program is being
    /// written and resolves (or fails) at evaluation time.
    pub fn append_line(&mut self, text: &str) -> Result<&ProgramLine, ParseError> {
        let number = self.lines.len() as u64;
        let parsed = parse_line_full(text, number)?;
        self.insert_parsed(parsed, |_| {})?;
        Ok(self.lines.last().expect("a line was just appended"))
    }

    fn insert_parsed(
        &mut self,
        parsed: ParsedLine,
        collect_refs: impl FnOnce(Vec<(String, Span)>),
    ) -> Result<(), ParseError> {
        if let LineKind::Label(name) = parsed.line.kind()
            && self.labels.resolve(name).is_some()
        {
            let span = parsed
                .label_decl_span
                .expect("label declarations carry their name span");
            return Err(ParseError::new(
                ParseErrorKind::DuplicateLabel { name: name.clone() },
                span,
            ));
        }
        collect_refs(parsed.label_refs);
        self.lines.push(parsed.line);
        self.reindex();
        Ok(())
    }

    /// Remove a line. Subsequent lines are renumbered and shifted labels
    /// re-pointed; operands still referencing a removed label fail at
    /// evaluation time.
    ///
    /// Panics if `number` is out of bounds.
    pub fn remove_line(&mut self, number: u64) {
        self.lines.remove(number as usize);
        self.reindex();
    }

    /// Re-parse `text` in place of an existing line, keeping its breakpoint
    /// marker.
    ///
    /// Panics if `number` is out of bounds.
    pub fn replace_line(&mut self, number: u64, text: &str) -> Result<(), ParseError> {
        let parsed = parse_line_full(text, number)?;
        if let LineKind::Label(name) = parsed.line.kind()
            && let Some(existing) = self.labels.resolve(name)
            && existing != number
        {
            let span = parsed
                .label_decl_span
                .expect("label declarations carry their name span");
            return Err(ParseError::new(
                ParseErrorKind::DuplicateLabel { name: name.clone() },
                span,
            ));
        }
        let mut line = parsed.line;
        line.set_breakpoint(self.lines[number as usize].breakpoint());
        self.lines[number as usize] = line;
        self.reindex();
        Ok(())
    }

    /// Panics if `number` is out of bounds.
    pub fn toggle_breakpoint(&mut self, number: u64) {
        self.lines[number as usize].toggle_breakpoint();
    }

    pub fn line(&self, number: u64) -> Option<&ProgramLine> {
        self.lines.get(number as usize)
    }

    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    pub fn len(&self) -> u64 {
        self.lines.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn resolve_label(&self, name: &str) -> Option<u64> {
        self.labels.resolve(name)
    }

    /// Canonical source text; feeding it back through [`Program::parse`]
    /// reconstructs an equivalent program.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    fn reindex(&mut self) {
        for (number, line) in self.lines.iter_mut().enumerate() {
            line.set_number(number as u64);
        }
        self.labels.clear();
        for line in &self.lines {
            if let LineKind::Label(name) = line.kind() {
                self.labels.insert(name, line.number());
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    const COUNTDOWN: &str = indoc! {"
        movq $3, %rax
        loop_top:
        decq %rax
        jne loop_top
    "};

    #[test]
    fn parse_builds_dense_line_numbers_and_labels() {
        let program = Program::parse(COUNTDOWN).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(
            program.lines().iter().map(|l| l.number()).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(program.resolve_label("loop_top"), Some(1));
    }

    #[test]
    fn parse_skips_blank_and_comment_lines() {
        let program = Program::parse("\n# setup\nmovq $1, %rax\n\n").unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn parse_rejects_undefined_label_references() {
        let err = Program::parse("jmp nowhere\n").unwrap_err();
        assert_eq!(err.line, 0);
        assert_eq!(
            err.error.kind,
            ParseErrorKind::UnknownLabel { name: "nowhere".into() }
        );
        assert_eq!(err.error.span.str_of("jmp nowhere"), "nowhere");
    }

    #[test]
    fn parse_rejects_duplicate_labels() {
        let err = Program::parse("top:\ntop:\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(
            err.error.kind,
            ParseErrorKind::DuplicateLabel { name: "top".into() }
        );
    }

    #[test]
    fn append_allows_forward_references() {
        let mut program = Program::new();
        program.append_line("jmp later").unwrap();
        assert_eq!(program.resolve_label("later"), None);
        program.append_line("later:").unwrap();
        assert_eq!(program.resolve_label("later"), Some(1));
    }

    #[test]
    fn removal_renumbers_and_repoints_labels() {
        let mut program = Program::parse(COUNTDOWN).unwrap();
        program.remove_line(0);
        assert_eq!(program.len(), 3);
        assert_eq!(program.resolve_label("loop_top"), Some(0));
        assert_eq!(
            program.lines().iter().map(|l| l.number()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn removing_a_label_declaration_leaves_references_dangling() {
        let mut program = Program::parse(COUNTDOWN).unwrap();
        program.remove_line(1);
        assert_eq!(program.resolve_label("loop_top"), None);
    }

    #[test]
    fn replace_preserves_breakpoint() {
        let mut program = Program::parse(COUNTDOWN).unwrap();
        program.toggle_breakpoint(2);
        program.replace_line(2, "incq %rax").unwrap();
        let line = program.line(2).unwrap();
        assert!(line.breakpoint());
        assert_eq!(line.to_string(), "incq %rax");
    }

    #[test]
    fn round_trip_serialization() {
        let program = Program::parse(COUNTDOWN).unwrap();
        let reparsed = Program::parse(&program.to_text()).unwrap();
        assert_eq!(program, reparsed);
    }
}
