//! Assembly parser: line-oriented source text to typed instructions.
//!
//! One instruction per non-blank line; comments start with `;`, `#`, or
//! `//`; opcodes are case-insensitive; commas may carry whitespace on either
//! side. Blank and comment-only lines do not count as addresses.
//!
//! The parser checks grammar only. Range checks on immediates and addresses
//! are deferred to the simulation core, which knows the active word length.

use crate::cpu::isa::{Instruction, Reg};
use thiserror::Error;

/// Parse assembly source into an ordered instruction list.
///
/// Fails on the first invalid line, naming its 1-based line number.
pub fn parse(source: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut program = Vec::new();

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index + 1;
        let cleaned = strip_comment(raw_line).trim();
        if cleaned.is_empty() {
            continue;
        }
        program.push(parse_line(cleaned, line_no)?);
    }

    if program.is_empty() {
        return Err(ParseError::EmptyProgram);
    }

    Ok(program)
}

/// Drop a trailing comment introduced by `;`, `#`, or `//`.
fn strip_comment(line: &str) -> &str {
    let mut end = line.len();
    for marker in [";", "#", "//"] {
        if let Some(pos) = line.find(marker) {
            end = end.min(pos);
        }
    }
    &line[..end]
}

fn parse_line(line: &str, line_no: usize) -> Result<Instruction, ParseError> {
    let (op_raw, arg_text) = match line.split_once(char::is_whitespace) {
        Some((op, rest)) => (op, rest.trim()),
        None => (line, ""),
    };
    let op = op_raw.to_ascii_uppercase();

    match op.as_str() {
        "LDI" => {
            let (reg, value) = split_operands(arg_text, line_no, "LDI <A|B>, <number>")?;
            Ok(Instruction::Ldi {
                reg: parse_reg(reg, line_no, "LDI <A|B>, <number>")?,
                value: parse_signed(value, line_no, "LDI <A|B>, <number>")?,
            })
        }
        "ADD" => {
            let (dest, src) = split_operands(arg_text, line_no, "ADD <A|B>, <A|B>")?;
            Ok(Instruction::Add {
                dest: parse_reg(dest, line_no, "ADD <A|B>, <A|B>")?,
                src: parse_reg(src, line_no, "ADD <A|B>, <A|B>")?,
            })
        }
        "LOAD" => {
            let expected = "LOAD <A|B>, <address>' or 'LOAD <A|B>, [address]";
            let (reg, addr) = split_operands(arg_text, line_no, expected)?;
            Ok(Instruction::Load {
                reg: parse_reg(reg, line_no, expected)?,
                address: parse_address(addr, line_no, expected, true)?,
            })
        }
        "STORE" => {
            let expected = "STORE <A|B>, <address>' or 'STORE <A|B>, [address]";
            let (reg, addr) = split_operands(arg_text, line_no, expected)?;
            Ok(Instruction::Store {
                reg: parse_reg(reg, line_no, expected)?,
                address: parse_address(addr, line_no, expected, true)?,
            })
        }
        "JMP" => Ok(Instruction::Jmp {
            address: parse_address(arg_text, line_no, "JMP <address>", false)?,
        }),
        "JZ" => {
            let (reg, addr) = split_operands(arg_text, line_no, "JZ <A|B>, <address>")?;
            Ok(Instruction::Jz {
                reg: parse_reg(reg, line_no, "JZ <A|B>, <address>")?,
                address: parse_address(addr, line_no, "JZ <A|B>, <address>", false)?,
            })
        }
        "HLT" => {
            if !arg_text.is_empty() {
                return Err(ParseError::SyntaxError {
                    line: line_no,
                    message: "HLT takes no operands".to_string(),
                });
            }
            Ok(Instruction::Hlt)
        }
        _ => Err(ParseError::UnknownOpcode {
            line: line_no,
            opcode: op,
        }),
    }
}

/// Split `"X, Y"` into its two comma-separated operands.
fn split_operands<'a>(
    arg_text: &'a str,
    line_no: usize,
    expected: &str,
) -> Result<(&'a str, &'a str), ParseError> {
    match arg_text.split_once(',') {
        Some((first, second)) => {
            let (first, second) = (first.trim(), second.trim());
            if first.is_empty() || second.is_empty() || second.contains(',') {
                Err(expected_error(line_no, expected))
            } else {
                Ok((first, second))
            }
        }
        None => Err(expected_error(line_no, expected)),
    }
}

fn parse_reg(token: &str, line_no: usize, expected: &str) -> Result<Reg, ParseError> {
    match token.to_ascii_uppercase().as_str() {
        "A" => Ok(Reg::A),
        "B" => Ok(Reg::B),
        _ => Err(expected_error(line_no, expected)),
    }
}

fn parse_signed(token: &str, line_no: usize, expected: &str) -> Result<i32, ParseError> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(expected_error(line_no, expected));
    }
    token
        .parse::<i32>()
        .map_err(|_| expected_error(line_no, expected))
}

/// Parse an unsigned address, optionally in `[..]` brackets for the
/// memory-access opcodes.
fn parse_address(
    token: &str,
    line_no: usize,
    expected: &str,
    allow_brackets: bool,
) -> Result<usize, ParseError> {
    let token = token.trim();
    let digits = if allow_brackets && token.starts_with('[') && token.ends_with(']') {
        token[1..token.len() - 1].trim()
    } else {
        token
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(expected_error(line_no, expected));
    }
    digits
        .parse::<usize>()
        .map_err(|_| expected_error(line_no, expected))
}

fn expected_error(line_no: usize, expected: &str) -> ParseError {
    ParseError::SyntaxError {
        line: line_no,
        message: format!("expected '{}'", expected),
    }
}

/// Errors from parsing assembly source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("line {line}: unsupported opcode '{opcode}'")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("no instructions found in source")]
    EmptyProgram,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_program() {
        let source = "LDI A, 2\nLDI B, 3\nADD A, B\nSTORE A, 10\nHLT";
        let program = parse(source).unwrap();

        assert_eq!(
            program,
            vec![
                Instruction::Ldi { reg: Reg::A, value: 2 },
                Instruction::Ldi { reg: Reg::B, value: 3 },
                Instruction::Add { dest: Reg::A, src: Reg::B },
                Instruction::Store { reg: Reg::A, address: 10 },
                Instruction::Hlt,
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let source = r#"
            ; semicolon comment
            # hash comment
            // slash comment
            LDI A, 1   ; trailing
            STORE A, 4 # trailing
            HLT        // trailing
        "#;
        let program = parse(source).unwrap();
        assert_eq!(program.len(), 3);
        assert_eq!(program[2], Instruction::Hlt);
    }

    #[test]
    fn test_case_insensitive_and_loose_commas() {
        let program = parse("ldi b , -7\nadd B,a\nhlt").unwrap();
        assert_eq!(program[0], Instruction::Ldi { reg: Reg::B, value: -7 });
        assert_eq!(program[1], Instruction::Add { dest: Reg::B, src: Reg::A });
    }

    #[test]
    fn test_bracketed_addresses() {
        let program = parse("LOAD A, [20]\nSTORE B, [5]\nHLT").unwrap();
        assert_eq!(program[0], Instruction::Load { reg: Reg::A, address: 20 });
        assert_eq!(program[1], Instruction::Store { reg: Reg::B, address: 5 });
    }

    #[test]
    fn test_jmp_rejects_brackets() {
        assert!(matches!(
            parse("JMP [3]").unwrap_err(),
            ParseError::SyntaxError { line: 1, .. }
        ));
    }

    #[test]
    fn test_error_line_numbers() {
        let source = "LDI A, 1\n\nLDI C, 2";
        match parse(source).unwrap_err() {
            ParseError::SyntaxError { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_opcode() {
        match parse("MOV A, B").unwrap_err() {
            ParseError::UnknownOpcode { line, opcode } => {
                assert_eq!(line, 1);
                assert_eq!(opcode, "MOV");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_hlt_with_operand_fails() {
        assert!(matches!(
            parse("HLT A").unwrap_err(),
            ParseError::SyntaxError { line: 1, .. }
        ));
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(parse("").unwrap_err(), ParseError::EmptyProgram);
        assert_eq!(parse("; only comments\n\n").unwrap_err(), ParseError::EmptyProgram);
    }

    #[test]
    fn test_negative_address_rejected() {
        assert!(parse("JMP -3").is_err());
        assert!(parse("LOAD A, -1").is_err());
    }
}
