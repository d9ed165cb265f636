use ansi_term::Colour;

use crate::framework::MemData;

pub const GRN: Colour = Colour::Green;
pub const RED: Colour = Colour::Red;
pub const YEL: Colour = Colour::Yellow;
pub const GRAY: Colour = Colour::Fixed(244);

/// Parse numeric literal (decimal or `0x` hex, optionally negative) from
/// assembly source.
pub fn parse_literal(s: &str) -> Option<i64> {
    if let Ok(r) = s.parse() {
        return Some(r);
    }
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))?;
    let v = i64::from_str_radix(hex, 16).ok()?;
    Some(if neg { -v } else { v })
}

/// Zero values are greyed out so that live registers stand out.
pub fn format_reg_val(val: u32) -> String {
    let s = format!("{val:08x}");
    if val == 0 {
        GRAY.paint(s).to_string()
    } else {
        s
    }
}

pub fn format_flag(flag: bool) -> String {
    if flag {
        GRN.bold().paint("1").to_string()
    } else {
        GRAY.paint("0").to_string()
    }
}

/// Print every word that differs between two memory images.
pub fn mem_diff(left: &MemData, right: &MemData) {
    for (i, (l, r)) in left.words().iter().zip(right.words()).enumerate() {
        if l != r {
            println!("{:#06x}: {:08x} -> {:08x}", i << 2, l, r);
        }
    }
}

/// Print memory up to the last non-zero word.
pub fn mem_print(mem: &MemData) {
    let words = mem.words();
    let last = words.iter().rposition(|w| *w != 0).unwrap_or(0);
    for (i, w) in words.iter().enumerate().take(last + 1) {
        println!("{:#06x}: {:08x}", i << 2, w);
    }
}
