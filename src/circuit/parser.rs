/// AQL parser: converts a token stream into a validated parameterized Circuit.
///
/// Grammar (simplified BNF):
///   program        := param_decl* 'QREG' INT (param_decl | instruction)*
///   param_decl     := 'PARAM' IDENT+
///   instruction    := fixed_gate | rotation | two_qubit_rot | two_qubit
///                   | toffoli | cpauli | 'BARRIER'
///   fixed_gate     := ('H'|'X'|'Y'|'Z'|'S'|'SDG'|'T'|'SX') INT
///   rotation       := ('RX'|'RY'|'RZ'|'PHASE') INT expr
///   two_qubit_rot  := ('RXX'|'RYY'|'RZZ'|'RZX') INT INT expr
///   two_qubit      := ('CNOT'|'CZ'|'SWAP') INT INT
///   toffoli        := 'CCX' INT INT INT
///   cpauli         := 'CPAULI' INT PAULI_INDEX+        e.g. X1 Z2
///
///   expr           := term (('+'|'-') term)*
///   term           := unary (('*'|'/') unary)*
///   unary          := '-' unary | '+' unary | atom
///   atom           := NUMBER | CONSTANT | IDENT | '(' expr ')'
///
/// Angle expressions must stay linear in the parameters: a product needs one
/// constant side and a divisor must be a non-zero constant.
///
/// Validation:
///   - QREG declares 1–30 qubits, exactly once
///   - Parameters are declared with PARAM before use; names are unique
///   - All qubit indices in [0, num_qubits), no repeats within one gate
use super::ir::{Circuit, Instruction};
use super::lexer::{Spanned, Token};
use super::parameter::{ParamExpr, Parameter};
use crate::quantum_info::Pauli;
use crate::{Error, Result};

// ── Public API ────────────────────────────────────────────────────────────

/// Parse a token stream (output of the lexer) into a validated Circuit.
pub fn parse(statements: Vec<Vec<Spanned>>) -> Result<Circuit> {
    if statements.is_empty() {
        return Err(Error::validation(
            "empty program, expected 'QREG <n>' as first statement",
        ));
    }

    // PARAM lines may precede QREG; hold them until the register exists.
    let mut pending: Vec<(usize, String)> = Vec::new();
    let mut circuit: Option<Circuit> = None;

    for stmt in &statements {
        let line = stmt[0].line;
        match stmt[0].token {
            Token::Param => {
                let names = param_names(stmt)?;
                match circuit.as_mut() {
                    Some(qc) => {
                        for name in names {
                            declare(qc, line, name)?;
                        }
                    }
                    None => pending.extend(names.into_iter().map(|n| (line, n))),
                }
            }
            Token::Qreg => {
                if circuit.is_some() {
                    return Err(Error::validation(
                        "only one QREG declaration is allowed per program",
                    ));
                }
                if stmt.len() != 2 {
                    return Err(argc_error(stmt, 1));
                }
                let mut qc = Circuit::new(int_arg(&stmt[1])?)?;
                for (decl_line, name) in pending.drain(..) {
                    declare(&mut qc, decl_line, name)?;
                }
                circuit = Some(qc);
            }
            _ => {
                let qc = circuit.as_mut().ok_or_else(|| {
                    Error::validation("first non-PARAM statement must be 'QREG <n>'")
                })?;
                let instr = parse_instruction(stmt, qc)?;
                qc.push(instr)?;
            }
        }
    }

    circuit.ok_or_else(|| Error::validation("program has no 'QREG <n>' declaration"))
}

// ── Declarations ──────────────────────────────────────────────────────────

fn param_names(tokens: &[Spanned]) -> Result<Vec<String>> {
    if tokens.len() < 2 {
        return Err(Error::Parse {
            line: tokens[0].line,
            msg: "'PARAM' expects at least one parameter name".into(),
        });
    }
    tokens[1..].iter().map(ident_arg).collect()
}

fn declare(qc: &mut Circuit, line: usize, name: String) -> Result<()> {
    qc.add_parameter(Parameter::new(name)).map(|_| ()).map_err(|e| match e {
        Error::Validation(msg) => Error::validation(format!("line {line}: {msg}")),
        other => other,
    })
}

// ── Statement parser ──────────────────────────────────────────────────────

fn parse_instruction(tokens: &[Spanned], qc: &mut Circuit) -> Result<Instruction> {
    debug_assert!(!tokens.is_empty());
    let line = tokens[0].line;

    // Enforce exact argument count.
    let check_argc = |expected: usize| -> Result<()> {
        if tokens.len() != expected + 1 {
            Err(argc_error(tokens, expected))
        } else {
            Ok(())
        }
    };
    // Angle expression after `qubits` leading integer arguments.
    let angle_after = |qubits: usize, qc: &mut Circuit| -> Result<_> {
        if tokens.len() <= qubits + 1 {
            return Err(Error::Parse {
                line,
                msg: format!(
                    "'{}' expects {} qubit index(es) followed by an angle",
                    tokens[0].token.display(),
                    qubits
                ),
            });
        }
        let expr = parse_expression(&tokens[qubits + 1..], qc)?;
        Ok(qc.resolve(expr))
    };

    Ok(match &tokens[0].token {
        // ── Fixed single-qubit gates ───────────────────────────────────
        Token::H   => { check_argc(1)?; Instruction::H(int_arg(&tokens[1])?) }
        Token::X   => { check_argc(1)?; Instruction::X(int_arg(&tokens[1])?) }
        Token::Y   => { check_argc(1)?; Instruction::Y(int_arg(&tokens[1])?) }
        Token::Z   => { check_argc(1)?; Instruction::Z(int_arg(&tokens[1])?) }
        Token::S   => { check_argc(1)?; Instruction::S(int_arg(&tokens[1])?) }
        Token::Sdg => { check_argc(1)?; Instruction::Sdg(int_arg(&tokens[1])?) }
        Token::T   => { check_argc(1)?; Instruction::T(int_arg(&tokens[1])?) }
        Token::Sx  => { check_argc(1)?; Instruction::Sx(int_arg(&tokens[1])?) }

        // ── Rotations ──────────────────────────────────────────────────
        Token::Rx => { let angle = angle_after(1, qc)?; Instruction::Rx { qubit: int_arg(&tokens[1])?, angle } }
        Token::Ry => { let angle = angle_after(1, qc)?; Instruction::Ry { qubit: int_arg(&tokens[1])?, angle } }
        Token::Rz => { let angle = angle_after(1, qc)?; Instruction::Rz { qubit: int_arg(&tokens[1])?, angle } }
        Token::Phase => { let angle = angle_after(1, qc)?; Instruction::Phase { qubit: int_arg(&tokens[1])?, angle } }
        Token::Rxx | Token::Ryy | Token::Rzz | Token::Rzx => {
            let angle = angle_after(2, qc)?;
            let a = int_arg(&tokens[1])?;
            let b = int_arg(&tokens[2])?;
            match tokens[0].token {
                Token::Rxx => Instruction::Rxx { qubit_a: a, qubit_b: b, angle },
                Token::Ryy => Instruction::Ryy { qubit_a: a, qubit_b: b, angle },
                Token::Rzz => Instruction::Rzz { qubit_a: a, qubit_b: b, angle },
                _          => Instruction::Rzx { control: a, target: b, angle },
            }
        }

        // ── Two-qubit gates ────────────────────────────────────────────
        Token::Cnot => {
            check_argc(2)?;
            Instruction::Cnot { control: int_arg(&tokens[1])?, target: int_arg(&tokens[2])? }
        }
        Token::Cz => {
            check_argc(2)?;
            Instruction::Cz { control: int_arg(&tokens[1])?, target: int_arg(&tokens[2])? }
        }
        Token::Swap => {
            check_argc(2)?;
            Instruction::Swap { qubit_a: int_arg(&tokens[1])?, qubit_b: int_arg(&tokens[2])? }
        }

        // ── Toffoli ────────────────────────────────────────────────────
        Token::Ccx => {
            check_argc(3)?;
            Instruction::Toffoli {
                control0: int_arg(&tokens[1])?,
                control1: int_arg(&tokens[2])?,
                target:   int_arg(&tokens[3])?,
            }
        }

        // ── Controlled Pauli string: CPAULI <c> X1 Z2 … ────────────────
        Token::CPauli => {
            if tokens.len() < 3 {
                return Err(Error::Parse {
                    line,
                    msg: "'CPAULI' expects a control qubit and at least one Pauli target".into(),
                });
            }
            let control = int_arg(&tokens[1])?;
            let mut paulis = Vec::with_capacity(tokens.len() - 2);
            for tok in &tokens[2..] {
                if let Some(target) = pauli_arg(tok)? {
                    paulis.push(target);
                }
            }
            if paulis.is_empty() {
                return Err(Error::Parse {
                    line,
                    msg: "'CPAULI' needs at least one non-identity Pauli target".into(),
                });
            }
            Instruction::ControlledPauli { control, paulis }
        }

        // ── Structural ─────────────────────────────────────────────────
        Token::Barrier => Instruction::Barrier,

        // ── Anything else at statement start is an error ───────────────
        Token::Param | Token::Qreg => unreachable!("directives are handled by parse()"),
        Token::Ident(name) => return Err(Error::Parse {
            line,
            msg: format!("unknown mnemonic '{name}'"),
        }),
        other => return Err(Error::Parse {
            line,
            msg: format!("unexpected '{}' at start of statement, expected a gate mnemonic", other.display()),
        }),
    })
}

// ── Angle expressions ─────────────────────────────────────────────────────

struct ExprParser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    circuit: &'a Circuit,
}

fn parse_expression(tokens: &[Spanned], circuit: &Circuit) -> Result<ParamExpr> {
    let mut p = ExprParser { tokens, pos: 0, circuit };
    let expr = p.expr()?;
    if let Some(extra) = p.peek() {
        return Err(Error::Parse {
            line: extra.line,
            msg: format!("unexpected '{}' in angle expression", extra.text),
        });
    }
    Ok(expr)
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(0, |s| s.line)
    }

    fn expr(&mut self) -> Result<ParamExpr> {
        let mut lhs = self.term()?;
        while let Some(tok) = self.peek() {
            match tok.token {
                Token::Plus  => { self.pos += 1; lhs = lhs + self.term()?; }
                Token::Minus => { self.pos += 1; lhs = lhs - self.term()?; }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<ParamExpr> {
        let mut lhs = self.unary()?;
        while let Some(tok) = self.peek() {
            match tok.token {
                Token::Star => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = if lhs.is_constant() {
                        rhs * lhs.offset()
                    } else if rhs.is_constant() {
                        lhs * rhs.offset()
                    } else {
                        return Err(Error::Parse {
                            line: tok.line,
                            msg: "product of two parameters is not a linear angle".into(),
                        });
                    };
                }
                Token::Slash => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if !rhs.is_constant() {
                        return Err(Error::Parse {
                            line: tok.line,
                            msg: "division by a parameter is not a linear angle".into(),
                        });
                    }
                    if rhs.offset() == 0.0 {
                        return Err(Error::Parse {
                            line: tok.line,
                            msg: "division by zero in angle expression".into(),
                        });
                    }
                    lhs = lhs * (1.0 / rhs.offset());
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<ParamExpr> {
        match self.peek().map(|s| &s.token) {
            Some(Token::Minus) => { self.pos += 1; Ok(-self.unary()?) }
            Some(Token::Plus)  => { self.pos += 1; self.unary() }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<ParamExpr> {
        let line = self.line();
        let tok = self.peek().ok_or_else(|| Error::Parse {
            line,
            msg: "angle expression ended unexpectedly".into(),
        })?;
        self.pos += 1;

        match &tok.token {
            Token::Int(n)   => Ok(ParamExpr::constant(*n as f64)),
            Token::Float(f) => Ok(ParamExpr::constant(*f)),
            Token::LParen => {
                let inner = self.expr()?;
                match self.peek() {
                    Some(s) if s.token == Token::RParen => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(Error::Parse { line, msg: "missing ')' in angle expression".into() }),
                }
            }
            // Identifiers and keyword-shaped words name parameters here.
            t if matches!(t, Token::Ident(_)) || t.is_keyword() => {
                let param = Parameter::new(tok.text.clone());
                if self.circuit.parameter_index(&param).is_none() {
                    return Err(Error::validation(format!(
                        "line {line}: undeclared parameter '{}'",
                        tok.text
                    )));
                }
                Ok(ParamExpr::from(param))
            }
            _ => Err(Error::Parse {
                line,
                msg: format!("unexpected '{}' in angle expression", tok.text),
            }),
        }
    }
}

// ── Argument extractors ───────────────────────────────────────────────────

fn argc_error(tokens: &[Spanned], expected: usize) -> Error {
    Error::Parse {
        line: tokens[0].line,
        msg: format!(
            "'{}' expects {} argument(s), got {}",
            tokens[0].token.display(),
            expected,
            tokens.len() - 1
        ),
    }
}

/// Require a qubit index: a non-negative integer token.
fn int_arg(s: &Spanned) -> Result<usize> {
    match s.token {
        Token::Int(n) => Ok(n),
        _ => Err(Error::Parse {
            line: s.line,
            msg: format!("expected qubit index (non-negative integer), got '{}'", s.text),
        }),
    }
}

/// Require a parameter name: an identifier or keyword-shaped word.
fn ident_arg(s: &Spanned) -> Result<String> {
    match &s.token {
        Token::Ident(_) => Ok(s.text.clone()),
        t if t.is_keyword() => Ok(s.text.clone()),
        _ => Err(Error::Parse {
            line: s.line,
            msg: format!("expected parameter name, got '{}'", s.text),
        }),
    }
}

/// Parse a `<pauli><qubit>` target such as `X1`. Identity targets yield `None`.
fn pauli_arg(s: &Spanned) -> Result<Option<(usize, Pauli)>> {
    let bad = || Error::Parse {
        line: s.line,
        msg: format!("expected Pauli target such as 'X1', got '{}'", s.text),
    };
    let mut chars = s.text.chars();
    let pauli = chars.next().and_then(Pauli::from_char).ok_or_else(bad)?;
    let qubit = chars.as_str().parse::<usize>().map_err(|_| bad())?;
    Ok((pauli != Pauli::I).then_some((qubit, pauli)))
}

// ── Tests ─────────────────────────────────────────────────────────────────
