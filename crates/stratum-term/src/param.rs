// SPDX-License-Identifier: MIT
//
// Param — the terminfo parameter language.
//
// Parameterized capabilities (`cup`, `setaf`, `csr`, ...) are small
// stack programs. `format` runs one against up to nine arguments and
// returns the bytes to send:
//
//   %p1..%p9       push argument         %{n}  %'c'  push a constant
//   %d %o %x %X %s %c  pop and print, with printf-style flags,
//                      width and precision (`%2.2X`, `%:-3d`)
//   %+ %- %* %/ %m     arithmetic         %& %| %^ %~  bitwise
//   %= %< %> %A %O %!  comparison/logic   %l  string length
//   %i                 add one to the first two arguments
//   %Pa %ga            set/get variable (a-z dynamic, A-Z static)
//   %? c %t a %e b %;  conditional, `%e` chains allowed
//
// Padding markers (`$<5>`, `$<2*/>`) are not sent: output is flow
// controlled, so they only feed the motion cost model via `padding_ms`.

use std::borrow::Cow;

use thiserror::Error;

use crate::terminfo::cap_bytes;

/// A capability argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Number(i32),
    Str(String),
}

impl Default for Param {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl From<i32> for Param {
    fn from(n: i32) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl Param {
    fn number(&self) -> i32 {
        match self {
            Self::Number(n) => *n,
            Self::Str(_) => 0,
        }
    }
}

/// Errors from a malformed capability program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("stack underflow at '%{0}'")]
    StackUnderflow(char),
    #[error("unknown format code '%{0}'")]
    UnknownCode(char),
    #[error("bad variable name '{0}'")]
    BadVariable(char),
    #[error("unterminated '{0}'")]
    Unterminated(&'static str),
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Run `template` with numeric arguments.
///
/// # Errors
///
/// Returns a [`ParamError`] when the template is malformed.
pub fn format(template: &str, args: &[i32]) -> Result<Vec<u8>, ParamError> {
    let params: Vec<Param> = args.iter().copied().map(Param::Number).collect();
    format_with(template, &params)
}

/// Run `template` with arbitrary arguments.
///
/// # Errors
///
/// Returns a [`ParamError`] when the template is malformed.
pub fn format_with(template: &str, args: &[Param]) -> Result<Vec<u8>, ParamError> {
    let program = strip_padding(template);
    let out = Machine::new(args).run(&program)?;
    Ok(cap_bytes(&out))
}

/// Remove `$<..>` padding markers.
#[must_use]
pub fn strip_padding(template: &str) -> Cow<'_, str> {
    if !template.contains("$<") {
        return Cow::Borrowed(template);
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("$<") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('>') {
            Some(end) if is_padding_spec(&after[..end]) => rest = &after[end + 1..],
            _ => {
                out.push_str("$<");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Total padding requested by `template`, in milliseconds.
#[must_use]
pub fn padding_ms(template: &str) -> u32 {
    let mut total = 0.0f32;
    let mut rest = template;
    while let Some(start) = rest.find("$<") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('>') else { break };
        let spec = &after[..end];
        if is_padding_spec(spec) {
            let digits: String = spec
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            total += digits.parse::<f32>().unwrap_or(0.0);
        }
        rest = &after[end + 1..];
    }
    total as u32
}

fn is_padding_spec(spec: &str) -> bool {
    spec.starts_with(|c: char| c.is_ascii_digit())
        && spec.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '*' | '/'))
}

// ─── Stack machine ───────────────────────────────────────────────────────────

struct Machine {
    params: [Param; 9],
    stack: Vec<Param>,
    dynamic: [i32; 26],
    statics: [i32; 26],
    out: String,
}

impl Machine {
    fn new(args: &[Param]) -> Self {
        let mut params: [Param; 9] = Default::default();
        for (slot, arg) in params.iter_mut().zip(args) {
            slot.clone_from(arg);
        }
        Self {
            params,
            stack: Vec::new(),
            dynamic: [0; 26],
            statics: [0; 26],
            out: String::new(),
        }
    }

    fn pop(&mut self, code: char) -> Result<Param, ParamError> {
        self.stack.pop().ok_or(ParamError::StackUnderflow(code))
    }

    fn pop_number(&mut self, code: char) -> Result<i32, ParamError> {
        self.pop(code).map(|p| p.number())
    }

    fn push_number(&mut self, n: i32) {
        self.stack.push(Param::Number(n));
    }

    fn run(mut self, program: &str) -> Result<String, ParamError> {
        let chars: Vec<char> = program.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            i += 1;
            if c != '%' {
                self.out.push(c);
                continue;
            }
            let Some(&code) = chars.get(i) else {
                return Err(ParamError::Unterminated("%"));
            };
            i += 1;
            match code {
                '%' => self.out.push('%'),
                'c' => {
                    let n = self.pop_number(code)?;
                    // Zero would terminate the sequence on the C side;
                    // terminals expect the 0x80 alias.
                    let byte = if n == 0 { 0x80 } else { n as u8 };
                    self.out.push(char::from(byte));
                }
                'd' | 'o' | 'x' | 'X' | 's' => {
                    let value = self.pop(code)?;
                    self.out.push_str(&printf(&Spec::plain(code), &value));
                }
                ':' | '#' | ' ' | '.' | '0'..='9' => {
                    let start = i - 1;
                    let end = chars[start..]
                        .iter()
                        .position(|c| matches!(c, 'd' | 'o' | 'x' | 'X' | 's'))
                        .map(|p| start + p)
                        .ok_or(ParamError::Unterminated("%[flags]"))?;
                    let spec = Spec::parse(&chars[start..end], chars[end]);
                    let value = self.pop(chars[end])?;
                    self.out.push_str(&printf(&spec, &value));
                    i = end + 1;
                }
                'p' => {
                    let digit = chars.get(i).and_then(|d| d.to_digit(10));
                    let Some(n @ 1..=9) = digit else {
                        return Err(ParamError::UnknownCode('p'));
                    };
                    i += 1;
                    self.stack.push(self.params[n as usize - 1].clone());
                }
                'P' | 'g' => {
                    let var = *chars.get(i).ok_or(ParamError::Unterminated("%P"))?;
                    i += 1;
                    let slot = match var {
                        'a'..='z' => &mut self.dynamic[(var as u8 - b'a') as usize],
                        'A'..='Z' => &mut self.statics[(var as u8 - b'A') as usize],
                        _ => return Err(ParamError::BadVariable(var)),
                    };
                    if code == 'P' {
                        let value = self.stack.pop().ok_or(ParamError::StackUnderflow('P'))?;
                        *slot = value.number();
                    } else {
                        let value = *slot;
                        self.push_number(value);
                    }
                }
                '\'' => {
                    let ch = *chars.get(i).ok_or(ParamError::Unterminated("%'"))?;
                    if chars.get(i + 1) != Some(&'\'') {
                        return Err(ParamError::Unterminated("%'"));
                    }
                    i += 2;
                    self.push_number(ch as i32);
                }
                '{' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&c| c == '}')
                        .ok_or(ParamError::Unterminated("%{"))?;
                    let literal: String = chars[i..i + close].iter().collect();
                    i += close + 1;
                    self.push_number(literal.trim().parse().unwrap_or(0));
                }
                'l' => {
                    let len = match self.pop(code)? {
                        Param::Str(s) => s.chars().count() as i32,
                        Param::Number(_) => 0,
                    };
                    self.push_number(len);
                }
                '+' | '-' | '*' | '/' | 'm' | '&' | '|' | '^' | '=' | '<' | '>' | 'A' | 'O' => {
                    let b = self.pop_number(code)?;
                    let a = self.pop_number(code)?;
                    self.push_number(binary(code, a, b));
                }
                '!' => {
                    let a = self.pop_number(code)?;
                    self.push_number(i32::from(a == 0));
                }
                '~' => {
                    let a = self.pop_number(code)?;
                    self.push_number(!a);
                }
                'i' => {
                    for p in &mut self.params[..2] {
                        if let Param::Number(n) = p {
                            *n += 1;
                        }
                    }
                }
                '?' | ';' => {}
                't' => {
                    let cond = self.pop_number(code)?;
                    if cond == 0 {
                        i = skip_branch(&chars, i, true)?;
                    }
                }
                'e' => {
                    // Reached only after a taken then-part.
                    i = skip_branch(&chars, i, false)?;
                }
                other => return Err(ParamError::UnknownCode(other)),
            }
        }
        Ok(self.out)
    }
}

fn binary(op: char, a: i32, b: i32) -> i32 {
    match op {
        '+' => a.wrapping_add(b),
        '-' => a.wrapping_sub(b),
        '*' => a.wrapping_mul(b),
        '/' => a.checked_div(b).unwrap_or(0),
        'm' => a.checked_rem(b).unwrap_or(0),
        '&' => a & b,
        '|' => a | b,
        '^' => a ^ b,
        '=' => i32::from(a == b),
        '<' => i32::from(a < b),
        '>' => i32::from(a > b),
        'A' => i32::from(a != 0 && b != 0),
        'O' => i32::from(a != 0 || b != 0),
        _ => 0,
    }
}

/// Skip from a `%t` (false condition) to the matching else-part, or from
/// a `%e` to the matching `%;`. Returns the index after the marker.
fn skip_branch(chars: &[char], mut i: usize, stop_at_else: bool) -> Result<usize, ParamError> {
    let mut depth = 0usize;
    while i < chars.len() {
        if chars[i] != '%' {
            i += 1;
            continue;
        }
        let Some(&code) = chars.get(i + 1) else { break };
        i += 2;
        match code {
            '?' => depth += 1,
            ';' if depth == 0 => return Ok(i),
            ';' => depth -= 1,
            'e' if depth == 0 && stop_at_else => return Ok(i),
            _ => {}
        }
    }
    Err(ParamError::Unterminated("%?"))
}

// ─── printf subset ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conv: char,
}

impl Spec {
    fn plain(conv: char) -> Self {
        Self {
            conv,
            ..Self::default()
        }
    }

    fn parse(flags: &[char], conv: char) -> Self {
        let mut spec = Self::plain(conv);
        let mut i = 0;
        if flags.first() == Some(&':') {
            i = 1;
        }
        while let Some(&c) = flags.get(i) {
            match c {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alternate = true,
                '0' if spec.width == 0 => spec.zero = true,
                _ => break,
            }
            i += 1;
        }
        let digits = |from: &mut usize| {
            let mut n = 0usize;
            while let Some(d) = flags.get(*from).and_then(|c| c.to_digit(10)) {
                n = n * 10 + d as usize;
                *from += 1;
            }
            n
        };
        spec.width = digits(&mut i);
        if flags.get(i) == Some(&'.') {
            i += 1;
            spec.precision = Some(digits(&mut i));
        }
        spec
    }
}

fn printf(spec: &Spec, value: &Param) -> String {
    let body = match (spec.conv, value) {
        ('s', Param::Str(s)) => match spec.precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.clone(),
        },
        ('s', Param::Number(n)) => n.to_string(),
        (_, value) => {
            let n = value.number();
            let (digits, prefix) = match spec.conv {
                'o' => (format!("{:o}", n as u32), if spec.alternate { "0" } else { "" }),
                'x' => (format!("{:x}", n as u32), if spec.alternate { "0x" } else { "" }),
                'X' => (format!("{:X}", n as u32), if spec.alternate { "0X" } else { "" }),
                _ => (n.unsigned_abs().to_string(), ""),
            };
            let digits = match spec.precision {
                Some(p) if digits.len() < p => format!("{digits:0>p$}"),
                _ => digits,
            };
            let sign = if spec.conv == 'd' {
                if n < 0 {
                    "-"
                } else if spec.plus {
                    "+"
                } else if spec.space {
                    " "
                } else {
                    ""
                }
            } else {
                ""
            };
            if spec.zero && !spec.left && spec.precision.is_none() {
                let pad = spec.width.saturating_sub(sign.len() + prefix.len());
                format!("{sign}{prefix}{digits:0>pad$}")
            } else {
                format!("{sign}{prefix}{digits}")
            }
        }
    };
    let width = spec.width;
    if spec.left {
        format!("{body:<width$}")
    } else {
        format!("{body:>width$}")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
