/// AQL lexer: tokenizes parameterized Astra Quantum Language source.
///
/// AQL is line-oriented: one statement per line. Comments begin with `//`
/// or `#` and run to end of line.
///
/// Recognized constructs:
///   - Keywords (case-insensitive): PARAM, QREG, H, X, Y, Z, S, SDG, T, SX,
///     RX, RY, RZ, PHASE, RXX, RYY, RZZ, RZX, CNOT, CZ, SWAP, CCX, CPAULI,
///     BARRIER
///   - Identifiers:        theta, a_1, …
///   - Integer literals:   0, 1, 2, …
///   - Float literals:     3.14159, 1e-3, 0.5
///   - Math constants:     PI, TAU, PI_2, PI_4, PI_8  (resolved to f64)
///   - Operators:          + - * / ( )
use crate::{Error, Result};
use std::f64::consts;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Directives
    Param, Qreg,
    // Fixed single-qubit gates
    H, X, Y, Z, S, Sdg, T, Sx,
    // Rotations
    Rx, Ry, Rz, Phase, Rxx, Ryy, Rzz, Rzx,
    // Multi-qubit gates
    Cnot, Cz, Swap, Ccx, CPauli,
    // Structural
    Barrier,
    // Literals and names
    Ident(String),
    Int(usize),
    Float(f64),
    // Expression operators
    Plus, Minus, Star, Slash, LParen, RParen,
}

impl Token {
    /// Display string used in error messages.
    pub fn display(&self) -> String {
        match self {
            Token::Param     => "PARAM".into(),
            Token::Qreg      => "QREG".into(),
            Token::H         => "H".into(),
            Token::X         => "X".into(),
            Token::Y         => "Y".into(),
            Token::Z         => "Z".into(),
            Token::S         => "S".into(),
            Token::Sdg       => "SDG".into(),
            Token::T         => "T".into(),
            Token::Sx        => "SX".into(),
            Token::Rx        => "RX".into(),
            Token::Ry        => "RY".into(),
            Token::Rz        => "RZ".into(),
            Token::Phase     => "PHASE".into(),
            Token::Rxx       => "RXX".into(),
            Token::Ryy       => "RYY".into(),
            Token::Rzz       => "RZZ".into(),
            Token::Rzx       => "RZX".into(),
            Token::Cnot      => "CNOT".into(),
            Token::Cz        => "CZ".into(),
            Token::Swap      => "SWAP".into(),
            Token::Ccx       => "CCX".into(),
            Token::CPauli    => "CPAULI".into(),
            Token::Barrier   => "BARRIER".into(),
            Token::Ident(s)  => s.clone(),
            Token::Int(n)    => n.to_string(),
            Token::Float(f)  => format!("{}", f),
            Token::Plus      => "+".into(),
            Token::Minus     => "-".into(),
            Token::Star      => "*".into(),
            Token::Slash     => "/".into(),
            Token::LParen    => "(".into(),
            Token::RParen    => ")".into(),
        }
    }

    /// True for gate and directive keywords.
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            Token::Ident(_) | Token::Int(_) | Token::Float(_)
                | Token::Plus | Token::Minus | Token::Star
                | Token::Slash | Token::LParen | Token::RParen
        )
    }
}

// ── Spanned token ─────────────────────────────────────────────────────────

/// A token annotated with its source line number (1-based) and raw text.
///
/// The raw text lets the parser read a keyword such as `x` or `t` back as a
/// parameter name inside an angle expression.
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub text: String,
}

// ── Public API ────────────────────────────────────────────────────────────

/// Tokenize an AQL source string.
///
/// Returns a `Vec` of statements, where each statement is a `Vec<Spanned>`
/// representing the tokens on one non-empty source line.
pub fn tokenize(source: &str) -> Result<Vec<Vec<Spanned>>> {
    let mut statements: Vec<Vec<Spanned>> = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_num = idx + 1;

        let content = strip_comment(line).trim();
        if content.is_empty() {
            continue;
        }

        let tokens = lex_line(content, line_num)?;
        if !tokens.is_empty() {
            statements.push(tokens);
        }
    }

    Ok(statements)
}

// ── Internal helpers ──────────────────────────────────────────────────────

/// Strip `//` and `#` comments from a source line.
fn strip_comment(line: &str) -> &str {
    let line = line.find("//").map_or(line, |p| &line[..p]);
    line.find('#').map_or(line, |p| &line[..p])
}

fn lex_line(content: &str, line: usize) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            '+' => { pos += 1; Token::Plus }
            '-' => { pos += 1; Token::Minus }
            '*' => { pos += 1; Token::Star }
            '/' => { pos += 1; Token::Slash }
            '(' => { pos += 1; Token::LParen }
            ')' => { pos += 1; Token::RParen }
            c if c.is_ascii_digit() || c == '.' => {
                pos = scan_number(&chars, pos);
                let word: String = chars[start..pos].iter().collect();
                lex_number(&word, line)?
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                lex_word(&word)
            }
            other => {
                return Err(Error::Lex {
                    line,
                    msg: format!("unexpected character '{other}'"),
                });
            }
        };

        tokens.push(Spanned { token, line, text: chars[start..pos].iter().collect() });
    }

    Ok(tokens)
}

/// Advance past a numeric literal: digits, one '.', optional exponent.
fn scan_number(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
        let mut next = pos + 1;
        if next < chars.len() && (chars[next] == '+' || chars[next] == '-') {
            next += 1;
        }
        if next < chars.len() && chars[next].is_ascii_digit() {
            pos = next;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

fn lex_number(word: &str, line: usize) -> Result<Token> {
    if let Ok(n) = word.parse::<usize>() {
        return Ok(Token::Int(n));
    }
    word.parse::<f64>().map(Token::Float).map_err(|_| Error::Lex {
        line,
        msg: format!("malformed number '{word}'"),
    })
}

/// Classify an identifier-shaped word.
fn lex_word(word: &str) -> Token {
    match word.to_ascii_uppercase().as_str() {
        "PARAM" | "PARAMS"      => Token::Param,
        "QREG"                  => Token::Qreg,
        "H"                     => Token::H,
        "X"                     => Token::X,
        "Y"                     => Token::Y,
        "Z"                     => Token::Z,
        "S"                     => Token::S,
        "SDG"                   => Token::Sdg,
        "T"                     => Token::T,
        "SX"                    => Token::Sx,
        "RX"                    => Token::Rx,
        "RY"                    => Token::Ry,
        "RZ"                    => Token::Rz,
        "PHASE" | "P"           => Token::Phase,
        "RXX"                   => Token::Rxx,
        "RYY"                   => Token::Ryy,
        "RZZ"                   => Token::Rzz,
        "RZX"                   => Token::Rzx,
        "CNOT"  | "CX"          => Token::Cnot,
        "CZ"                    => Token::Cz,
        "SWAP"                  => Token::Swap,
        "CCX"   | "TOFFOLI"     => Token::Ccx,
        "CPAULI"                => Token::CPauli,
        "BARRIER"               => Token::Barrier,

        // ── Math constants (resolved immediately to f64) ──────────────
        "PI"     => Token::Float(consts::PI),
        "TAU"    => Token::Float(consts::TAU),
        "PI_2"   => Token::Float(consts::FRAC_PI_2),
        "PI_4"   => Token::Float(consts::FRAC_PI_4),
        "PI_8"   => Token::Float(consts::PI / 8.0),

        _ => Token::Ident(word.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(source: &str) -> Vec<Vec<Spanned>> {
        tokenize(source).expect("tokenize failed")
    }

    #[test]
    fn test_basic_program() {
        let stmts = tok("PARAM theta\nQREG 2\nRX 0 theta\nCNOT 0 1");
        assert_eq!(stmts.len(), 4);
        assert_eq!(stmts[0][0].token, Token::Param);
        assert_eq!(stmts[0][1].token, Token::Ident("theta".into()));
        assert_eq!(stmts[1][1].token, Token::Int(2));
        assert_eq!(stmts[2][0].token, Token::Rx);
        assert_eq!(stmts[3][0].token, Token::Cnot);
    }

    #[test]
    fn test_comments_stripped() {
        let stmts = tok("QREG 2 // two qubits\nH 0 # hadamard");
        assert_eq!(stmts[0].len(), 2);
        assert_eq!(stmts[1].len(), 2);
    }

    #[test]
    fn test_blank_lines_skipped_and_line_numbers_kept() {
        let stmts = tok("\n\nQREG 1\n\nH 0\n\n");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0][0].line, 3);
        assert_eq!(stmts[1][0].line, 5);
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let stmts = tok("qreg 2\nsdg 0\ncx 0 1");
        assert_eq!(stmts[0][0].token, Token::Qreg);
        assert_eq!(stmts[1][0].token, Token::Sdg);
        assert_eq!(stmts[2][0].token, Token::Cnot);
    }

    #[test]
    fn test_expression_without_spaces() {
        let stmts = tok("RX 0 2*theta+PI_4");
        let kinds: Vec<&Token> = stmts[0].iter().map(|s| &s.token).collect();
        assert_eq!(
            kinds,
            vec![
                &Token::Rx,
                &Token::Int(0),
                &Token::Int(2),
                &Token::Star,
                &Token::Ident("theta".into()),
                &Token::Plus,
                &Token::Float(consts::FRAC_PI_4),
            ]
        );
    }

    #[test]
    fn test_scientific_float() {
        let stmts = tok("RZ 0 1.5e-3");
        assert_eq!(stmts[0][2].token, Token::Float(1.5e-3));
    }

    #[test]
    fn test_keyword_keeps_raw_text() {
        let stmts = tok("RY 0 t");
        assert_eq!(stmts[0][2].token, Token::T);
        assert_eq!(stmts[0][2].text, "t");
    }

    #[test]
    fn test_invalid_character_reports_line() {
        let result = tokenize("QREG 2\nH @0");
        assert!(matches!(result, Err(Error::Lex { line: 2, .. })));
    }

    #[test]
    fn test_malformed_number() {
        assert!(matches!(tokenize("RX 0 1.2.3"), Err(Error::Lex { .. })));
    }
}
