//! The condition language parser (spec §4.C).
//!
//! Recursive-descent over raw bytes, mirroring `c2_parse_*`'s pointer-
//! walking style from `original_source/src/c2.c` but returning
//! `Result<_, ParseError>` instead of writing into an out-parameter and
//! signalling failure through a null return, the way `toaruwm`'s own
//! parsing-flavoured code (e.g. `x/property.rs`'s `TryFrom` impls)
//! prefers `?`-propagation over sentinel returns.
//!
//! The two-slot precedence window spec.md §4.C describes is implemented
//! here as ordinary two-level precedence climbing (`parse_or_chain` /
//! `parse_and_chain`): hand-tracing both gives identical trees for
//! `A && B && C` and `A || B && C`, and precedence climbing is the
//! idiomatic Rust shape for a grammar intentionally capped at two
//! levels (Design Note §9 forbids a general shunting-yard upgrade, and
//! this implementation structurally cannot grow past two levels,
//! satisfying that restriction by construction).

use crate::ast::{BranchOp, CmpOp, Expr, Leaf, MatchMode, Pattern, Target};
use crate::error::ParseError;
use crate::window::Predefined;
use std::str::FromStr;

/// Nested groups deeper than this are rejected (spec §3, §4.C).
const MAX_DEPTH: usize = 10;

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    if let Some(expr) = try_parse_legacy(input) {
        return expr;
    }
    let mut p = Parser { src: input.as_bytes(), pos: 0, full: input, depth: 0 };
    p.skip_ws();
    let expr = p.parse_or_chain()?;
    p.skip_ws();
    if p.pos != p.src.len() {
        return Err(p.err("trailing characters after rule"));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a [u8],
    full: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(self.full.to_string(), self.pos, msg.into())
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let bytes = s.as_bytes();
        if self.src[self.pos..].starts_with(bytes) {
            self.pos += bytes.len();
            true
        } else {
            false
        }
    }

    /// `group := element (("&&"|"||") element)*`, split into two
    /// precedence tiers: `||` (loosest) over `&&` (tighter), matching
    /// spec §4.C: "`&&` binds tighter than `||`/XOR; left-to-right
    /// associativity."
    fn parse_or_chain(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and_chain()?;
        loop {
            self.skip_ws();
            let op = if self.eat_str("||") {
                BranchOp::Or
            } else if self.eat_str("XOR") {
                BranchOp::Xor
            } else {
                break;
            };
            self.skip_ws();
            let rhs = self.parse_and_chain()?;
            lhs = Expr::branch(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and_chain(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_element()?;
        loop {
            self.skip_ws();
            if self.eat_str("&&") {
                self.skip_ws();
                let rhs = self.parse_element()?;
                lhs = Expr::branch(BranchOp::And, lhs, rhs);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    /// `element := "(" group ")" | leaf | "!" element`.
    fn parse_element(&mut self) -> Result<Expr, ParseError> {
        self.skip_ws();
        let mut neg = false;
        while self.eat(b'!') {
            neg = !neg;
            self.skip_ws();
        }
        let mut expr = if self.eat(b'(') {
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(self.err("nested groups exceed maximum depth of 10"));
            }
            self.skip_ws();
            let inner = self.parse_or_chain()?;
            self.skip_ws();
            if !self.eat(b')') {
                return Err(self.err("expected closing ')'"));
            }
            self.depth -= 1;
            inner
        } else {
            self.parse_leaf()?
        };
        if neg {
            expr = expr.negate();
        }
        Ok(expr)
    }

    /// `leaf := target (":" format_spec)? operator pattern?`.
    fn parse_leaf(&mut self) -> Result<Expr, ParseError> {
        let (target, target_on_client, index) = self.parse_target()?;

        self.skip_ws();
        if self.eat(b':') {
            self.parse_legacy_type_spec()?;
        }

        self.skip_ws();
        let (op_neg, mode, case_insensitive, cmp) = self.parse_operator()?;

        // Match mode and case-insensitivity are only meaningful for `=`
        // (spec §3); this covers EXISTS and the relational operators alike,
        // e.g. `name *> 3` / `width ?> 3` / `x ^< 5` are all rejected.
        if !matches!(cmp, CmpOp::Eq) && (mode.is_some() || case_insensitive) {
            return Err(self.err("match-mode and case-insensitivity qualifiers are only allowed with '='"));
        }

        self.skip_ws();
        let pattern = if matches!(cmp, CmpOp::Exists) {
            Pattern::Undetermined
        } else {
            self.parse_pattern()?
        };

        if matches!(cmp, CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le) {
            if let Pattern::Str(_) = pattern {
                return Err(self.err("relational operators forbid string patterns"));
            }
        }

        let mode = mode.unwrap_or(MatchMode::Exact);

        if let Target::Predefined(p) = &target {
            if let Pattern::Str(_) = pattern {
                if !p.is_string() {
                    return Err(self.err("pattern type does not match predefined target's declared type"));
                }
            } else if let Pattern::Int(_) = pattern {
                if p.is_string() {
                    return Err(self.err("pattern type does not match predefined target's declared type"));
                }
            }
        }

        let leaf = Leaf::new(target, target_on_client, index, cmp, mode, case_insensitive, pattern);
        let mut expr = Expr::leaf(leaf);
        if op_neg {
            expr = expr.negate();
        }
        Ok(expr)
    }

    /// `target := IDENT ("@")? ("[" index "]")?`.
    fn parse_target(&mut self) -> Result<(Target, bool, i32), ParseError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_byte(c)) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected a target name"));
        }
        let name = std::str::from_utf8(&self.src[start..self.pos]).unwrap();

        let target_on_client = self.eat(b'@');

        // Absent brackets default to index 0 (the sole/first element);
        // `[*]` is the only way to request the wildcard `-1` (spec §4.C
        // scenario 3: a bare target with no brackets tracks index 0).
        let mut index: i32 = 0;
        let mut had_brackets = false;
        if self.eat(b'[') {
            had_brackets = true;
            self.skip_ws();
            if self.eat(b'*') {
                index = -1;
            } else {
                let num_start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                if self.pos == num_start {
                    return Err(self.err("expected an index or '*'"));
                }
                let digits = std::str::from_utf8(&self.src[num_start..self.pos]).unwrap();
                index = digits.parse::<i32>().map_err(|_| self.err("index out of range"))?;
            }
            self.skip_ws();
            if !self.eat(b']') {
                return Err(self.err("expected closing ']'"));
            }
        }

        let target = match Predefined::from_str(name) {
            Ok(p) => {
                if had_brackets {
                    return Err(self.err("predefined targets disallow index brackets"));
                }
                Target::Predefined(p)
            }
            Err(_) => Target::Atom(name.as_bytes().to_vec()),
        };

        Ok((target, target_on_client, index))
    }

    /// Deprecated `:FORMAT?TYPECHAR` legacy type-spec (spec §4.C),
    /// accepted but warned and otherwise ignored — the fetcher derives
    /// format/type from the live property reply, not from rule text.
    fn parse_legacy_type_spec(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.eat(b'?') {
            while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
                self.pos += 1;
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
                self.pos += 1;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a legacy type-spec after ':'"));
        }
        tracing::warn!("rule uses deprecated ':FORMAT?TYPE' legacy type-spec, ignoring");
        Ok(())
    }

    /// `operator := "!"? ("*"|"^"|"%"|"~")? "?"? ("="|">"|"<"|">="|"<="|ε)`.
    ///
    /// Returns `(negate, match_mode, case_insensitive, cmp)`. A `!` in
    /// operator position toggles the leaf's `neg` flag (spec §4.C).
    fn parse_operator(&mut self) -> Result<(bool, Option<MatchMode>, bool, CmpOp), ParseError> {
        let mut neg = false;
        if self.eat(b'!') {
            neg = true;
        }

        let mode = if self.eat(b'*') {
            Some(MatchMode::Contains)
        } else if self.eat(b'^') {
            Some(MatchMode::StartsWith)
        } else if self.eat(b'%') {
            Some(MatchMode::Wildcard)
        } else if self.eat(b'~') {
            Some(MatchMode::Pcre)
        } else {
            None
        };

        let case_insensitive = self.eat(b'?');

        let cmp = if self.eat_str(">=") {
            CmpOp::Ge
        } else if self.eat(b'>') {
            CmpOp::Gt
        } else if self.eat_str("<=") {
            CmpOp::Le
        } else if self.eat(b'<') {
            CmpOp::Lt
        } else if self.eat(b'=') {
            CmpOp::Eq
        } else if mode.is_some() || case_insensitive {
            return Err(self.err("match-mode qualifier requires an explicit comparison operator"));
        } else {
            CmpOp::Exists
        };

        Ok((neg, mode, case_insensitive, cmp))
    }

    /// `pattern := "true" | "false" | integer | string`.
    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.skip_ws();
        if self.eat_str("true") {
            return Ok(Pattern::Int(1));
        }
        if self.eat_str("false") {
            return Ok(Pattern::Int(0));
        }
        match self.peek() {
            Some(b'\'') | Some(b'"') => self.parse_string(),
            Some(b'r') if matches!(self.src.get(self.pos + 1), Some(b'\'') | Some(b'"')) => self.parse_string(),
            _ => self.parse_integer(),
        }
    }

    fn parse_string(&mut self) -> Result<Pattern, ParseError> {
        let raw = self.eat(b'r');
        let quote = self.bump().ok_or_else(|| self.err("expected a string literal"))?;
        if quote != b'\'' && quote != b'"' {
            return Err(self.err("expected opening quote"));
        }
        let mut out: Vec<u8> = Vec::new();
        loop {
            let c = self.bump().ok_or_else(|| self.err("unterminated string literal"))?;
            if c == quote {
                break;
            }
            if !raw && c == b'\\' {
                out.push(self.parse_escape()?);
            } else {
                out.push(c);
            }
        }
        Ok(Pattern::Str(out))
    }

    /// Standard backslash escapes plus `\oNN` (octal) and `\xHH` (hex).
    /// Values >127 sign-extend to a signed byte; >255 or ≤0 is an error
    /// (spec §4.C).
    fn parse_escape(&mut self) -> Result<u8, ParseError> {
        let c = self.bump().ok_or_else(|| self.err("unterminated escape sequence"))?;
        let byte = match c {
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'o' => {
                let d0 = self.bump().ok_or_else(|| self.err("incomplete \\oNN escape"))?;
                let d1 = self.bump().ok_or_else(|| self.err("incomplete \\oNN escape"))?;
                let v = octal_digit(d0)
                    .zip(octal_digit(d1))
                    .map(|(a, b)| a * 8 + b)
                    .ok_or_else(|| self.err("invalid octal digits in \\oNN escape"))?;
                return validate_escape_value(self, v as i32);
            }
            b'x' => {
                let d0 = self.bump().ok_or_else(|| self.err("incomplete \\xHH escape"))?;
                let d1 = self.bump().ok_or_else(|| self.err("incomplete \\xHH escape"))?;
                let v = hex_digit(d0)
                    .zip(hex_digit(d1))
                    .map(|(a, b)| a * 16 + b)
                    .ok_or_else(|| self.err("invalid hex digits in \\xHH escape"))?;
                return validate_escape_value(self, v as i32);
            }
            other => return Err(self.err(format!("unknown escape character '\\{}'", other as char))),
        };
        Ok(byte)
    }

    /// `strtol`-style integer with base auto-detection: `0x`/`0X` hex,
    /// leading `0` octal, else decimal. A trailing alphanumeric
    /// character right after the digits is an error (spec §4.C).
    fn parse_integer(&mut self) -> Result<Pattern, ParseError> {
        let start = self.pos;
        let negative = self.eat(b'-');
        let digits_start = self.pos;

        let (radix, prefix_len) = if self.src[self.pos..].starts_with(b"0x") || self.src[self.pos..].starts_with(b"0X") {
            (16, 2)
        } else if self.peek() == Some(b'0') && matches!(self.src.get(self.pos + 1), Some(c) if c.is_ascii_digit()) {
            (8, 1)
        } else {
            (10, 0)
        };
        self.pos += prefix_len;

        let num_start = self.pos;
        while matches!(self.peek(), Some(c) if (c as char).is_digit(radix)) {
            self.pos += 1;
        }
        if self.pos == num_start {
            return Err(self.err("expected an integer, 'true', 'false' or a string"));
        }
        let digits = std::str::from_utf8(&self.src[num_start..self.pos]).unwrap();
        let mut value = i64::from_str_radix(digits, radix).map_err(|_| self.err("integer literal out of range"))?;
        if negative {
            value = -value;
        }

        if matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            return Err(self.err("trailing characters after integer literal"));
        }
        let _ = digits_start;
        let _ = start;

        Ok(Pattern::Int(value))
    }
}

fn validate_escape_value(p: &Parser<'_>, v: i32) -> Result<u8, ParseError> {
    if v > 255 || v <= 0 {
        return Err(p.err("escape value out of range (must be 1..=255)"));
    }
    // Values > 127 sign-extend to a signed byte, per spec §4.C.
    Ok(v as u8)
}

fn octal_digit(c: u8) -> Option<i32> {
    if (b'0'..=b'7').contains(&c) {
        Some((c - b'0') as i32)
    } else {
        None
    }
}

fn hex_digit(c: u8) -> Option<i32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as i32),
        b'a'..=b'f' => Some((c - b'a' + 10) as i32),
        b'A'..=b'F' => Some((c - b'A' + 10) as i32),
        _ => None,
    }
}

fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Legacy form `L:mode[i]:string` where `L ∈ {n,i,g,r}` (spec §4.C,
/// §6). Tried whole-string before falling back to the main grammar,
/// since its own syntax is a strict subset that would otherwise be
/// ambiguous with a bare atom target named `n`/`i`/`g`/`r`.
fn try_parse_legacy(input: &str) -> Option<Result<Expr, ParseError>> {
    let bytes = input.as_bytes();
    if bytes.len() < 4 || bytes[1] != b':' {
        return None;
    }
    let target = match bytes[0] {
        b'n' => Predefined::Name,
        b'i' => Predefined::ClassI,
        b'g' => Predefined::ClassG,
        b'r' => Predefined::Role,
        _ => return None,
    };

    let mode = match bytes[2] {
        b'e' => MatchMode::Exact,
        b'a' => MatchMode::Contains,
        b's' => MatchMode::StartsWith,
        b'w' => MatchMode::Wildcard,
        b'p' => MatchMode::Pcre,
        _ => return None,
    };

    let mut idx = 3;
    let mut case_insensitive = false;
    if bytes.get(idx) == Some(&b'i') {
        case_insensitive = true;
        idx += 1;
    }
    if bytes.get(idx) != Some(&b':') {
        return None;
    }
    idx += 1;

    let pattern = input[idx..].as_bytes().to_vec();
    let leaf = Leaf::new(
        Target::Predefined(target),
        false,
        -1,
        CmpOp::Eq,
        mode,
        case_insensitive,
        Pattern::Str(pattern),
    );
    Some(Ok(Expr::leaf(leaf)))
}
