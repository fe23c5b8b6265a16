//! printf-style formatting for the `strfmt` built-in and size rendering for `ls -h`.
//!
//! Handles `%[hh|h|l|ll]conversion` specifiers with the conversions
//! `s c d i u x X f` and `%%`. Backslash escapes in the format string
//! (`\n \t \r \\ \"`) are resolved before formatting.

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("not enough arguments for format specifier %{spec} (argument {index})")]
    MissingArgument { spec: String, index: usize },
    #[error("invalid value {value:?} for format specifier %{spec}")]
    InvalidValue { spec: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    VeryShort,
    Short,
    Default,
    Long,
}

impl Length {
    fn prefix(self) -> &'static str {
        match self {
            Length::VeryShort => "hh",
            Length::Short => "h",
            Length::Default => "",
            Length::Long => "l",
        }
    }
}

/// Format `format` with `args`, C `printf` style.
///
/// An unknown conversion is copied through literally, as is a `%` at the very
/// end of the string. Surplus arguments are ignored.
pub fn format_print(format: &str, args: &[String]) -> Result<String, FormatError> {
    let format = unescape(format);
    let mut output = String::new();
    let mut next_arg = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            output.push('%');
            continue;
        }

        let length = parse_length(&mut chars);
        let Some(conversion) = chars.next() else {
            output.push('%');
            output.push_str(length.prefix());
            break;
        };
        let spec = format!("{}{}", length.prefix(), conversion);

        if !matches!(conversion, 's' | 'c' | 'd' | 'i' | 'u' | 'x' | 'X' | 'f') {
            output.push('%');
            output.push_str(&spec);
            continue;
        }

        let arg = args.get(next_arg).ok_or_else(|| FormatError::MissingArgument {
            spec: spec.clone(),
            index: next_arg + 1,
        })?;
        next_arg += 1;
        let invalid = || FormatError::InvalidValue {
            spec: spec.clone(),
            value: arg.clone(),
        };

        match conversion {
            's' => output.push_str(arg),
            'c' => {
                let mut it = arg.chars();
                match (it.next(), it.next()) {
                    (Some(ch), None) => output.push(ch),
                    _ => return Err(invalid()),
                }
            }
            'd' | 'i' => output.push_str(&format_signed(arg, length).ok_or_else(invalid)?),
            'u' => output.push_str(&format_unsigned(arg, length).ok_or_else(invalid)?),
            'x' | 'X' => {
                let hex = format_hex(arg, length).ok_or_else(invalid)?;
                if conversion == 'X' {
                    output.push_str(&hex.to_uppercase());
                } else {
                    output.push_str(&hex);
                }
            }
            'f' => {
                let value: f64 = arg.trim().parse().map_err(|_| invalid())?;
                output.push_str(&value.to_string());
            }
            _ => unreachable!("conversion filtered above"),
        }
    }

    Ok(output)
}

fn parse_length(chars: &mut Peekable<Chars<'_>>) -> Length {
    match chars.peek() {
        Some('h') => {
            chars.next();
            if chars.peek() == Some(&'h') {
                chars.next();
                Length::VeryShort
            } else {
                Length::Short
            }
        }
        Some('l') => {
            chars.next();
            if chars.peek() == Some(&'l') {
                chars.next();
            }
            Length::Long
        }
        _ => Length::Default,
    }
}

fn format_signed(arg: &str, length: Length) -> Option<String> {
    let arg = arg.trim();
    Some(match length {
        Length::VeryShort => arg.parse::<i8>().ok()?.to_string(),
        Length::Short => arg.parse::<i16>().ok()?.to_string(),
        Length::Default => arg.parse::<i32>().ok()?.to_string(),
        Length::Long => arg.parse::<i64>().ok()?.to_string(),
    })
}

fn format_unsigned(arg: &str, length: Length) -> Option<String> {
    let arg = arg.trim();
    Some(match length {
        Length::VeryShort => arg.parse::<u8>().ok()?.to_string(),
        Length::Short => arg.parse::<u16>().ok()?.to_string(),
        Length::Default => arg.parse::<u32>().ok()?.to_string(),
        Length::Long => arg.parse::<u64>().ok()?.to_string(),
    })
}

/// Hex of a signed value; negatives come out in two's complement at the
/// width selected by `length`.
fn format_hex(arg: &str, length: Length) -> Option<String> {
    let arg = arg.trim();
    Some(match length {
        Length::VeryShort => format!("{:x}", arg.parse::<i8>().ok()?),
        Length::Short => format!("{:x}", arg.parse::<i16>().ok()?),
        Length::Default => format!("{:x}", arg.parse::<i32>().ok()?),
        Length::Long => format!("{:x}", arg.parse::<i64>().ok()?),
    })
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Renders a byte count with 1000-based units and one decimal, e.g. `1.5K`.
pub fn bytes_to_string(byte_count: i64) -> String {
    const SUFFIXES: [&str; 7] = ["B", "K", "M", "G", "T", "P", "E"];

    if byte_count == 0 {
        return "0B".to_string();
    }

    let magnitude = byte_count.unsigned_abs();
    let mut place = 0;
    while place + 1 < SUFFIXES.len() && magnitude >= 1000u64.pow(place as u32 + 1) {
        place += 1;
    }
    let mut num = (magnitude as f64 / 1000f64.powi(place as i32) * 10.0).round() / 10.0;
    if byte_count < 0 {
        num = -num;
    }

    if num.fract() == 0.0 {
        format!("{:.0}{}", num, SUFFIXES[place])
    } else {
        format!("{:.1}{}", num, SUFFIXES[place])
    }
}
