//! Grammar-driven parsing and lowering of one input line.
//!
//! The pest grammar (`x86.pest`) recognizes the surface shape of a line; the
//! lowering pass here turns the raw pairs into a typed [`ProgramLine`],
//! validating mnemonics, operand kinds, and operand sizes. An explicit size
//! suffix (`b`/`w`/`l`/`q`) always wins; without one the size is inferred
//! from a register operand, the way an assembler would.

use pest::Parser as PestParser;
use pest::iterators::Pair;
use tracing::trace;

use crate::instruction::{BinaryOp, Condition, LineKind, ProgramLine, UnaryOp};
use crate::machine::{self, Reg, RegSlice};
use crate::operand::{MemoryRef, Operand};
use crate::value::OpSize;

use super::error::{ParseError, ParseErrorKind, Span};

#[derive(pest_derive::Parser)]
#[grammar = "x86.pest"]
struct LineParser;

/// A lowered line plus the label names it references, with their spans.
/// The references feed whole-program validation.
pub(crate) struct ParsedLine {
    pub(crate) line: ProgramLine,
    pub(crate) label_refs: Vec<(String, Span)>,
    /// Span of the declared label name, when the line is a declaration.
    pub(crate) label_decl_span: Option<Span>,
}

/// Parse one line of source text into a typed program line numbered `number`.
pub fn parse_line(text: &str, number: u64) -> Result<ProgramLine, ParseError> {
    parse_line_full(text, number).map(|parsed| parsed.line)
}

pub(crate) fn parse_line_full(text: &str, number: u64) -> Result<ParsedLine, ParseError> {
    let mut pairs =
        LineParser::parse(Rule::line, text).map_err(|err| pest_error(err, text))?;
    let line = pairs.next().expect("grammar produces one line pair");

    let statement = line
        .into_inner()
        .find(|pair| !matches!(pair.as_rule(), Rule::EOI))
        .ok_or_else(|| ParseError::new(ParseErrorKind::Empty, Span::new(0, text.len())))?;

    let parsed = match statement.as_rule() {
        Rule::label_decl => {
            let ident = statement
                .into_inner()
                .next()
                .expect("grammar: label declaration contains an identifier");
            let kind = LineKind::Label(ident.as_str().to_string());
            ParsedLine {
                line: ProgramLine::new(number, kind),
                label_refs: Vec::new(),
                label_decl_span: Some(ident.as_span().into()),
            }
        }
        Rule::instruction => lower_instruction(statement, number)?,
        rule => unreachable!("unexpected statement rule {rule:?}"),
    };

    trace!(line = %parsed.line, number, "parsed");
    Ok(parsed)
}

/// Map a pest syntax error onto our span-carrying error type.
fn pest_error(err: pest::error::Error<Rule>, text: &str) -> ParseError {
    use pest::error::InputLocation;

    let (start, end) = match err.location {
        InputLocation::Pos(pos) => (pos, pos + 1),
        InputLocation::Span((start, end)) => (start, end),
    };
    let start = start.min(text.len());
    let end = end.min(text.len()).max(start);
    let message = err.variant.message().to_string();
    ParseError::new(ParseErrorKind::Syntax { message }, Span::new(start, end))
}

/// An operand as lowered from the grammar, before instruction-level checks.
struct RawOperand {
    operand: Operand,
    span: Span,
    /// Untruncated immediate value, kept for range checking.
    immediate: Option<i128>,
}

enum Resolved {
    Unary(UnaryOp, Option<OpSize>),
    Binary(BinaryOp, Option<OpSize>),
}

fn lower_instruction(pair: Pair<Rule>, number: u64) -> Result<ParsedLine, ParseError> {
    let mut inner = pair.into_inner();
    let mnemonic = inner.next().expect("grammar: instruction starts with a mnemonic");
    let mnemonic_span: Span = mnemonic.as_span().into();
    let mnemonic_text = mnemonic.as_str();

    let mut label_refs = Vec::new();
    let mut operands = Vec::new();
    for pair in inner {
        operands.push(lower_operand(pair, &mut label_refs)?);
    }

    let resolved = resolve_mnemonic(mnemonic_text).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::UnknownMnemonic { mnemonic: mnemonic_text.to_string() },
            Span::new(mnemonic_span.start(), mnemonic_span.end()),
        )
    })?;

    let kind = match resolved {
        Resolved::Unary(op, size) => {
            build_unary(op, size, operands, &mnemonic_span, mnemonic_text)?
        }
        Resolved::Binary(op, size) => {
            build_binary(op, size, operands, &mnemonic_span, mnemonic_text)?
        }
    };

    Ok(ParsedLine { line: ProgramLine::new(number, kind), label_refs, label_decl_span: None })
}

/// Resolve a mnemonic to an operation and, where the spelling pins one down,
/// an operand size. `set`/`j` families are recognized by condition suffix;
/// everything else is a base name with an optional size suffix.
fn resolve_mnemonic(m: &str) -> Option<Resolved> {
    match m {
        "jmp" => {
            return Some(Resolved::Unary(UnaryOp::Jump(Condition::Always), Some(OpSize::Quad)));
        }
        "call" => return Some(Resolved::Unary(UnaryOp::Call, Some(OpSize::Quad))),
        _ => {}
    }
    if let Some(suffix) = m.strip_prefix("set")
        && let Some(cond) = Condition::from_suffix(suffix)
    {
        return Some(Resolved::Unary(UnaryOp::Set(cond), Some(OpSize::Byte)));
    }
    if let Some(suffix) = m.strip_prefix('j')
        && let Some(cond) = Condition::from_suffix(suffix)
    {
        return Some(Resolved::Unary(UnaryOp::Jump(cond), Some(OpSize::Quad)));
    }

    if let Some(op) = unary_base(m) {
        return Some(Resolved::Unary(op, None));
    }
    if let Some(op) = binary_base(m) {
        return Some(Resolved::Binary(op, None));
    }

    if m.len() > 1 {
        let (base, suffix) = m.split_at(m.len() - 1);
        let suffix = suffix.chars().next().expect("suffix is one character");
        if let Some(size) = OpSize::from_suffix(suffix) {
            if let Some(op) = unary_base(base) {
                return Some(Resolved::Unary(op, Some(size)));
            }
            if let Some(op) = binary_base(base) {
                return Some(Resolved::Binary(op, Some(size)));
            }
        }
    }
    None
}

fn unary_base(base: &str) -> Option<UnaryOp> {
    match base {
        "inc" => Some(UnaryOp::Inc),
        "dec" => Some(UnaryOp::Dec),
        "neg" => Some(UnaryOp::Neg),
        "not" => Some(UnaryOp::Not),
        "push" => Some(UnaryOp::Push),
        "pop" => Some(UnaryOp::Pop),
        _ => None,
    }
}

fn binary_base(base: &str) -> Option<BinaryOp> {
    match base {
        "mov" => Some(BinaryOp::Mov),
        "lea" => Some(BinaryOp::Lea),
        "add" => Some(BinaryOp::Add),
        "sub" => Some(BinaryOp::Sub),
        "imul" => Some(BinaryOp::Imul),
        "cmp" => Some(BinaryOp::Cmp),
        "test" => Some(BinaryOp::Test),
        "and" => Some(BinaryOp::And),
        "or" => Some(BinaryOp::Or),
        "xor" => Some(BinaryOp::Xor),
        "sal" => Some(BinaryOp::Sal),
        "shl" => Some(BinaryOp::Shl),
        "sar" => Some(BinaryOp::Sar),
        "shr" => Some(BinaryOp::Shr),
        _ => None,
    }
}

fn lower_operand(
    pair: Pair<Rule>,
    label_refs: &mut Vec<(String, Span)>,
) -> Result<RawOperand, ParseError> {
    let span: Span = pair.as_span().into();
    match pair.as_rule() {
        Rule::register => {
            let slice = lower_register(&pair)?;
            Ok(RawOperand { operand: Operand::Register(slice), span, immediate: None })
        }
        Rule::immediate => {
            let text = &pair.as_str()[1..];
            let value = parse_number(text, &span)?;
            Ok(RawOperand {
                operand: Operand::Immediate(value as i64),
                span,
                immediate: Some(value),
            })
        }
        Rule::memory => lower_memory(pair, span),
        Rule::label_ref => {
            let name = pair.as_str().to_string();
            label_refs.push((name.clone(), span.clone()));
            Ok(RawOperand { operand: Operand::Label(name), span, immediate: None })
        }
        rule => unreachable!("unexpected operand rule {rule:?}"),
    }
}

fn lower_register(pair: &Pair<Rule>) -> Result<RegSlice, ParseError> {
    let name = &pair.as_str()[1..];
    machine::lookup(name).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::UnknownRegister { name: name.to_string() },
            pair.as_span().into(),
        )
    })
}

/// Memory address registers are always full-width.
fn lower_address_register(pair: &Pair<Rule>) -> Result<RegSlice, ParseError> {
    let slice = lower_register(pair)?;
    if slice.size != OpSize::Quad {
        return Err(ParseError::new(
            ParseErrorKind::InvalidOperand {
                message: "memory address registers must be 64-bit".to_string(),
            },
            pair.as_span().into(),
        ));
    }
    Ok(slice)
}

fn lower_memory(pair: Pair<Rule>, span: Span) -> Result<RawOperand, ParseError> {
    let mut displacement = 0i64;
    let mut base = None;
    let mut index = None;
    let mut scale = 1u8;

    for part in pair.into_inner() {
        let part_span: Span = part.as_span().into();
        match part.as_rule() {
            Rule::number if base.is_none() => {
                displacement = parse_number(part.as_str(), &part_span)? as i64;
            }
            Rule::number => {
                let value = parse_number(part.as_str(), &part_span)?;
                scale = match value {
                    1 | 2 | 4 | 8 => value as u8,
                    _ => {
                        return Err(ParseError::new(
                            ParseErrorKind::InvalidScale { scale: value as i64 },
                            part_span,
                        ));
                    }
                };
            }
            Rule::register if base.is_none() => base = Some(lower_address_register(&part)?),
            Rule::register => index = Some(lower_address_register(&part)?),
            rule => unreachable!("unexpected memory part {rule:?}"),
        }
    }

    let base = base.expect("grammar: memory reference has a base register");
    let operand = Operand::Memory(MemoryRef { displacement, base, index, scale });
    Ok(RawOperand { operand, span, immediate: None })
}

fn parse_number(text: &str, span: &Span) -> Result<i128, ParseError> {
    let invalid = || {
        ParseError::new(
            ParseErrorKind::InvalidNumber { text: text.to_string() },
            span.clone(),
        )
    };
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16).map_err(|_| invalid())?,
        None => digits.parse::<i128>().map_err(|_| invalid())?,
    };
    let value = if negative { -magnitude } else { magnitude };
    // Keep within what any 64-bit operand could express.
    if value > u64::MAX as i128 || value < i64::MIN as i128 {
        return Err(invalid());
    }
    Ok(value)
}

fn expect_arity(
    expected: usize,
    operands: &[RawOperand],
    mnemonic_span: &Span,
) -> Result<(), ParseError> {
    if operands.len() == expected {
        return Ok(());
    }
    let span = if operands.len() > expected {
        operands[expected].span.clone()
    } else {
        mnemonic_span.clone()
    };
    Err(ParseError::new(
        ParseErrorKind::OperandCount { expected, found: operands.len() },
        span,
    ))
}

fn invalid_operand(message: &str, span: &Span) -> ParseError {
    ParseError::new(
        ParseErrorKind::InvalidOperand { message: message.to_string() },
        span.clone(),
    )
}

/// Size of the first data-register operand, for suffixless mnemonics.
fn inferred_size<'a>(operands: impl IntoIterator<Item = &'a RawOperand>) -> Option<OpSize> {
    operands.into_iter().find_map(|raw| match raw.operand {
        Operand::Register(slice) => Some(slice.size),
        _ => None,
    })
}

fn missing_suffix(mnemonic: &str, span: &Span) -> ParseError {
    ParseError::new(
        ParseErrorKind::MissingSizeSuffix { mnemonic: mnemonic.to_string() },
        span.clone(),
    )
}

/// Check a data operand against the instruction's operand size.
fn check_size(size: OpSize, raw: &RawOperand) -> Result<(), ParseError> {
    match &raw.operand {
        Operand::Register(slice) if slice.size != size => Err(ParseError::new(
            ParseErrorKind::SizeMismatch { expected: size, found: slice.size },
            raw.span.clone(),
        )),
        Operand::Immediate(_) => {
            let value = raw.immediate.expect("immediate operands carry their raw value");
            let bits = size.bits();
            let fits = value >= -(1i128 << (bits - 1)) && value < (1i128 << bits);
            if fits {
                Ok(())
            } else {
                Err(ParseError::new(
                    ParseErrorKind::ImmediateOutOfRange { value, size },
                    raw.span.clone(),
                ))
            }
        }
        _ => Ok(()),
    }
}

fn build_unary(
    op: UnaryOp,
    size: Option<OpSize>,
    mut operands: Vec<RawOperand>,
    mnemonic_span: &Span,
    mnemonic: &str,
) -> Result<LineKind, ParseError> {
    expect_arity(1, &operands, mnemonic_span)?;
    let raw = operands.remove(0);

    match op {
        UnaryOp::Inc | UnaryOp::Dec | UnaryOp::Neg | UnaryOp::Not | UnaryOp::Pop
        | UnaryOp::Set(_) => match raw.operand {
            Operand::Immediate(_) => {
                return Err(ParseError::new(
                    ParseErrorKind::ImmediateDestination,
                    raw.span.clone(),
                ));
            }
            Operand::Label(_) => {
                return Err(invalid_operand(
                    "a label can only be a jump or call target",
                    &raw.span,
                ));
            }
            _ => {}
        },
        UnaryOp::Push => {
            if let Operand::Label(_) = raw.operand {
                return Err(invalid_operand(
                    "a label can only be a jump or call target",
                    &raw.span,
                ));
            }
        }
        UnaryOp::Call | UnaryOp::Jump(_) => {
            if !matches!(raw.operand, Operand::Label(_)) {
                return Err(invalid_operand("jump target must be a label", &raw.span));
            }
        }
    }

    let size = size
        .or_else(|| inferred_size([&raw]))
        .ok_or_else(|| missing_suffix(mnemonic, mnemonic_span))?;
    check_size(size, &raw)?;

    Ok(LineKind::Unary { op, size, operand: raw.operand })
}

fn build_binary(
    op: BinaryOp,
    size: Option<OpSize>,
    mut operands: Vec<RawOperand>,
    mnemonic_span: &Span,
    mnemonic: &str,
) -> Result<LineKind, ParseError> {
    expect_arity(2, &operands, mnemonic_span)?;
    let dst = operands.remove(1);
    let src = operands.remove(0);

    if let Operand::Immediate(_) = dst.operand {
        return Err(ParseError::new(ParseErrorKind::ImmediateDestination, dst.span.clone()));
    }
    for raw in [&src, &dst] {
        if let Operand::Label(_) = raw.operand {
            return Err(invalid_operand("a label can only be a jump or call target", &raw.span));
        }
    }

    let shift = matches!(op, BinaryOp::Sal | BinaryOp::Shl | BinaryOp::Sar | BinaryOp::Shr);
    if op == BinaryOp::Lea {
        if !matches!(src.operand, Operand::Memory(_)) {
            return Err(invalid_operand("lea source must be a memory reference", &src.span));
        }
        if !matches!(dst.operand, Operand::Register(_)) {
            return Err(invalid_operand("lea destination must be a register", &dst.span));
        }
    } else if shift {
        match src.operand {
            Operand::Immediate(_) => {}
            Operand::Register(slice)
                if slice.reg == Reg::Rcx && slice.size == OpSize::Byte => {}
            _ => {
                return Err(invalid_operand("shift count must be an immediate or %cl", &src.span));
            }
        }
    } else if matches!(src.operand, Operand::Memory(_)) && matches!(dst.operand, Operand::Memory(_))
    {
        return Err(invalid_operand("memory-to-memory operations are not supported", &src.span));
    }

    // The shift count never participates in sizing; everything else does.
    let sized_operands: Vec<&RawOperand> =
        if shift { vec![&dst] } else { vec![&src, &dst] };

    let size = size
        .or_else(|| inferred_size(sized_operands.iter().copied()))
        .ok_or_else(|| missing_suffix(mnemonic, mnemonic_span))?;
    for raw in sized_operands {
        check_size(size, raw)?;
    }
    if shift && let Operand::Immediate(_) = src.operand {
        check_size(size, &src)?;
    }

    Ok(LineKind::Binary { op, size, src: src.operand, dst: dst.operand })
}
